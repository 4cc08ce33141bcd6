pub mod assembler;
pub mod comparison;
pub mod content;
pub mod critique;
pub mod graph;
pub mod parser;
pub mod pipeline;
pub mod qa;
pub mod retrieval;
pub mod template;

pub use assembler::AssemblerAgent;
pub use comparison::ComparisonAgent;
pub use content::{Blocks, ContentBlockAgent};
pub use critique::{route_after_critique, CritiqueAgent, Verdict};
pub use graph::{Edge, ExecutionResult, Node, NodeOutput, State, StateDelta, StateGraph, StepRecord, END};
pub use parser::ParserAgent;
pub use pipeline::{
    build_graph, run_pipeline, seed_state, Collaborators, Pipeline, PipelineOptions, PipelineRun,
    RunOutcome,
};
pub use qa::QaGenerator;
pub use retrieval::{RetrievalAgent, RetrievalReport};
