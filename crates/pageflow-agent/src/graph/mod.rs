//! Workflow graph engine: named nodes over a shared, owned state.
//!
//! A graph is a set of [`Node`]s, each with at most one outgoing [`Edge`]
//! (a fixed successor or a router that reads the state). [`StateGraph`]
//! walks it from the start node, merging each node's declared output into
//! the [`State`], until a dead end, a terminal node, or [`END`]. A hard step
//! ceiling bounds every traversal, including revision loops.

pub mod edge;
pub mod executor;
pub mod node;
pub mod state;

pub use edge::{Edge, END};
pub use executor::{ExecutionResult, StateGraph, StepRecord, DEFAULT_MAX_STEPS};
pub use node::{Node, NodeOutput};
pub use state::{State, StateDelta};
