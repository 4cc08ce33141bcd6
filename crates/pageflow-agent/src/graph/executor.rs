use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, warn};

use pageflow_core::error::{PageflowError, Result};

use super::edge::{Edge, END};
use super::node::{Node, NodeOutput};
use super::state::State;

/// Default ceiling on node executions per invocation.
pub const DEFAULT_MAX_STEPS: usize = 200;

/// Record of a single node execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Which node was executed.
    pub node: String,
    /// 1-based position in the traversal.
    pub step: usize,
    /// Fields the node's output touched.
    pub wrote: Vec<String>,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of a completed traversal.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// The final state.
    pub state: State,
    /// Per-node records in execution order.
    pub steps: Vec<StepRecord>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

impl ExecutionResult {
    /// Names of the executed nodes, in order.
    pub fn path(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node.as_str()).collect()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// A directed graph of named nodes over a shared [`State`].
///
/// Nodes are registered once, before any invocation. Each node has at most
/// one outgoing [`Edge`]. Traversal starts at the start node (by default
/// the first node registered) and stops at a dead end, at [`END`], or when
/// the successor is in the terminal set. Terminal nodes are never executed
/// as successors.
pub struct StateGraph {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
    start: Option<String>,
    terminals: HashSet<String>,
    max_steps: usize,
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StateGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            start: None,
            terminals: HashSet::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Set the step ceiling.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Register a node. The first node registered becomes the start node
    /// unless [`StateGraph::set_start`] says otherwise.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        let name = node.name().to_string();
        if name == END {
            return Err(PageflowError::Configuration(format!(
                "'{}' is reserved and cannot name a node",
                END
            )));
        }
        if self.nodes.contains_key(&name) {
            return Err(PageflowError::Configuration(format!(
                "Node '{}' registered twice",
                name
            )));
        }
        if self.start.is_none() {
            self.start = Some(name.clone());
        }
        self.nodes.insert(name, node);
        Ok(())
    }

    /// Add a fixed successor edge.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> Result<()> {
        self.insert_edge(from.into(), Edge::linear(to))
    }

    /// Add a decision edge; `router` names the successor from the state.
    pub fn add_conditional_edge<F>(&mut self, from: impl Into<String>, router: F) -> Result<()>
    where
        F: Fn(&State) -> String + Send + Sync + 'static,
    {
        self.insert_edge(from.into(), Edge::conditional(router))
    }

    fn insert_edge(&mut self, from: String, edge: Edge) -> Result<()> {
        if let Some(existing) = self.edges.get(&from) {
            return Err(PageflowError::Configuration(format!(
                "Node '{}' already has an outgoing edge ({:?})",
                from, existing
            )));
        }
        self.edges.insert(from, edge);
        Ok(())
    }

    pub fn set_start(&mut self, name: impl Into<String>) {
        self.start = Some(name.into());
    }

    /// Flag a node as graph-ending: selecting it as a successor stops the
    /// traversal without running it.
    pub fn set_terminal(&mut self, name: impl Into<String>) {
        self.terminals.insert(name.into());
    }

    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check that every referenced name is registered.
    pub fn validate(&self) -> Result<()> {
        let start = self
            .start
            .as_deref()
            .ok_or_else(|| PageflowError::Configuration("No start node defined".to_string()))?;
        if !self.nodes.contains_key(start) {
            return Err(PageflowError::Configuration(format!(
                "Start node '{}' is not registered",
                start
            )));
        }

        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort();
        for from in sources {
            if !self.nodes.contains_key(from) {
                return Err(PageflowError::Configuration(format!(
                    "Edge from unregistered node '{}'",
                    from
                )));
            }
            if let Some(Edge::Linear(to)) = self.edges.get(from) {
                if to != END && !self.nodes.contains_key(to) {
                    return Err(PageflowError::Configuration(format!(
                        "Edge '{}' -> '{}' targets an unregistered node",
                        from, to
                    )));
                }
            }
        }

        let mut terminals: Vec<&String> = self.terminals.iter().collect();
        terminals.sort();
        for name in terminals {
            if !self.nodes.contains_key(name) {
                return Err(PageflowError::Configuration(format!(
                    "Terminal node '{}' is not registered",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Walk the graph from the start node.
    ///
    /// Fails with `Configuration` before running anything if the graph is
    /// malformed, with `UnknownNode` if a router names an unregistered node,
    /// and with `ExecutionLimitExceeded` once `max_steps` nodes have run
    /// without reaching a stop.
    pub fn invoke(&self, initial: State) -> Result<ExecutionResult> {
        self.validate()?;

        let start = Instant::now();
        let mut state = initial;
        let mut current = self.start.clone().unwrap_or_default();
        let mut steps: Vec<StepRecord> = Vec::new();
        let mut step = 0usize;

        loop {
            step += 1;
            if step > self.max_steps {
                warn!(
                    node = %current,
                    limit = self.max_steps,
                    "Step ceiling reached, aborting graph"
                );
                return Err(PageflowError::ExecutionLimitExceeded {
                    limit: self.max_steps,
                    node: current,
                });
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| PageflowError::UnknownNode(current.clone()))?;

            debug!(node = %current, step, "Executing graph node");

            let node_start = Instant::now();
            let output = node.run(&state)?;
            let wrote = apply_output(node, &mut state, output)?;
            let elapsed_ms = node_start.elapsed().as_millis() as u64;

            debug!(node = %current, step, elapsed_ms, wrote = ?wrote, "Node execution complete");

            steps.push(StepRecord {
                node: current.clone(),
                step,
                wrote,
                elapsed_ms,
            });

            let next = self.edges.get(&current).map(|edge| edge.resolve(&state));
            match next {
                None => {
                    debug!(node = %current, "No outgoing edge, graph complete");
                    break;
                }
                Some(next) if next == END => {
                    debug!(node = %current, "Routed to END, graph complete");
                    break;
                }
                Some(next) if self.terminals.contains(&next) => {
                    debug!(node = %current, terminal = %next, "Reached terminal node, graph complete");
                    break;
                }
                Some(next) => current = next,
            }
        }

        Ok(ExecutionResult {
            state,
            steps,
            total_elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Fold a node's output into the state, enforcing its write declaration.
/// Returns the fields that changed hands.
fn apply_output(node: &Node, state: &mut State, output: NodeOutput) -> Result<Vec<String>> {
    match output {
        NodeOutput::Update(delta) => {
            if let Some(field) = delta.keys().find(|k| !node.declares(k)) {
                return Err(PageflowError::UndeclaredWrite {
                    node: node.name().to_string(),
                    field: field.to_string(),
                });
            }
            let wrote: Vec<String> = delta.keys().map(String::from).collect();
            state.apply(delta);
            Ok(wrote)
        }
        NodeOutput::Replace(replacement) => {
            let wrote: Vec<String> = replacement.keys().map(String::from).collect();
            *state = replacement;
            Ok(wrote)
        }
        NodeOutput::Unchanged => Ok(vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::state::StateDelta;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn setter(name: &str, field: &'static str, value: serde_json::Value) -> Node {
        Node::new(name, move |_| {
            Ok(NodeOutput::Update(StateDelta::new().with(field, value.clone())))
        })
        .writes([field])
    }

    fn noop(name: &str) -> Node {
        Node::new(name, |_| Ok(NodeOutput::Unchanged))
    }

    #[test]
    fn test_graph_construction() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("parser")).unwrap();
        graph.add_node(noop("qa")).unwrap();
        graph.add_edge("parser", "qa").unwrap();

        assert_eq!(graph.start(), Some("parser"));
        assert_eq!(graph.node_count(), 2);
        assert!(graph.contains_node("qa"));
        assert_eq!(graph.max_steps(), DEFAULT_MAX_STEPS);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_no_start_node_is_configuration_error() {
        let graph = StateGraph::new();
        let err = graph.invoke(State::new()).unwrap_err();
        assert!(matches!(err, PageflowError::Configuration(_)));
    }

    #[test]
    fn test_unregistered_start_is_configuration_error() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("a")).unwrap();
        graph.set_start("ghost");
        assert!(matches!(
            graph.invoke(State::new()),
            Err(PageflowError::Configuration(_))
        ));
    }

    #[test]
    fn test_edge_to_unregistered_node_fails_fast() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let mut graph = StateGraph::new();
        graph
            .add_node(Node::new("a", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(NodeOutput::Unchanged)
            }))
            .unwrap();
        graph.add_edge("a", "missing").unwrap();

        assert!(matches!(
            graph.invoke(State::new()),
            Err(PageflowError::Configuration(_))
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_edge_from_unregistered_node_fails_fast() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("a")).unwrap();
        graph.add_edge("ghost", "a").unwrap();
        assert!(matches!(graph.validate(), Err(PageflowError::Configuration(_))));
    }

    #[test]
    fn test_unregistered_terminal_fails_fast() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("a")).unwrap();
        graph.set_terminal("ghost");
        assert!(matches!(graph.validate(), Err(PageflowError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("a")).unwrap();
        assert!(matches!(
            graph.add_node(noop("a")),
            Err(PageflowError::Configuration(_))
        ));
    }

    #[test]
    fn test_reserved_end_name_rejected() {
        let mut graph = StateGraph::new();
        assert!(graph.add_node(noop(END)).is_err());
    }

    #[test]
    fn test_second_outgoing_edge_rejected() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("a")).unwrap();
        graph.add_node(noop("b")).unwrap();
        graph.add_edge("a", "b").unwrap();
        assert!(graph
            .add_conditional_edge("a", |_| "b".to_string())
            .is_err());
        assert!(graph.add_edge("a", "a").is_err());
    }

    #[test]
    fn test_linear_chain_runs_in_order() {
        let mut graph = StateGraph::new();
        graph.add_node(setter("a", "x", json!(1))).unwrap();
        graph.add_node(setter("b", "y", json!(2))).unwrap();
        graph.add_node(setter("c", "z", json!(3))).unwrap();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "c").unwrap();

        let result = graph.invoke(State::new()).unwrap();
        assert_eq!(result.path(), vec!["a", "b", "c"]);
        assert_eq!(result.steps[2].step, 3);
        assert_eq!(result.steps[0].wrote, vec!["x"]);
        assert_eq!(result.state.get("z"), Some(&json!(3)));
    }

    #[test]
    fn test_terminal_successor_is_not_executed() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let mut graph = StateGraph::new();
        graph.add_node(setter("a", "x", json!(1))).unwrap();
        graph
            .add_node(Node::new("sink", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(NodeOutput::Unchanged)
            }))
            .unwrap();
        graph.add_edge("a", "sink").unwrap();
        graph.set_terminal("sink");

        let result = graph.invoke(State::new()).unwrap();
        assert_eq!(result.path(), vec!["a"]);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_end_sentinel_stops() {
        let mut graph = StateGraph::new();
        graph.add_node(setter("a", "x", json!(1))).unwrap();
        graph.add_node(noop("b")).unwrap();
        graph.add_edge("a", END).unwrap();

        let result = graph.invoke(State::new()).unwrap();
        assert_eq!(result.path(), vec!["a"]);
    }

    #[test]
    fn test_router_naming_unknown_node_fails() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("a")).unwrap();
        graph
            .add_conditional_edge("a", |_| "nowhere".to_string())
            .unwrap();

        let err = graph.invoke(State::new()).unwrap_err();
        assert!(matches!(err, PageflowError::UnknownNode(ref n) if n == "nowhere"));
    }

    #[test]
    fn test_undeclared_write_rejected_before_merge() {
        let mut graph = StateGraph::new();
        graph
            .add_node(
                Node::new("sneaky", |_| {
                    Ok(NodeOutput::Update(
                        StateDelta::new()
                            .with("allowed", json!(1))
                            .with("secret", json!(2)),
                    ))
                })
                .writes(["allowed"]),
            )
            .unwrap();

        let err = graph.invoke(State::new()).unwrap_err();
        assert!(matches!(
            err,
            PageflowError::UndeclaredWrite { ref node, ref field } if node == "sneaky" && field == "secret"
        ));
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut graph = StateGraph::new();
        graph.add_node(setter("a", "added", json!("new"))).unwrap();

        let mut seed = State::new();
        seed.set_str("raw_input", "kept");
        let result = graph.invoke(seed).unwrap();

        assert_eq!(result.state.get_str("raw_input"), Some("kept"));
        assert_eq!(result.state.get_str("added"), Some("new"));
    }

    #[test]
    fn test_replacement_supersedes_state() {
        let mut graph = StateGraph::new();
        graph
            .add_node(Node::new("reset", |_| {
                let mut fresh = State::new();
                fresh.set_str("only", "this");
                Ok(NodeOutput::Replace(fresh))
            }))
            .unwrap();

        let mut seed = State::new();
        seed.set_str("raw_input", "gone");
        let result = graph.invoke(seed).unwrap();

        assert_eq!(result.state.len(), 1);
        assert_eq!(result.state.get_str("only"), Some("this"));
        assert_eq!(result.steps[0].wrote, vec!["only"]);
    }

    #[test]
    fn test_unchanged_output_retains_state() {
        let mut graph = StateGraph::new();
        graph.add_node(noop("a")).unwrap();

        let mut seed = State::new();
        seed.set("approved", json!(false));
        let result = graph.invoke(seed.clone()).unwrap();
        assert_eq!(result.state, seed);
        assert!(result.steps[0].wrote.is_empty());
    }

    #[test]
    fn test_node_error_aborts_run() {
        let mut graph = StateGraph::new();
        graph
            .add_node(Node::new("parser", |_| {
                Err(PageflowError::Input("missing product name".into()))
            }))
            .unwrap();
        assert!(matches!(
            graph.invoke(State::new()),
            Err(PageflowError::Input(_))
        ));
    }

    #[test]
    fn test_ceiling_trips_after_exactly_max_steps() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let mut graph = StateGraph::new().with_max_steps(7);
        graph
            .add_node(Node::new("spin", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(NodeOutput::Unchanged)
            }))
            .unwrap();
        graph.add_conditional_edge("spin", |_| "spin".to_string()).unwrap();

        let err = graph.invoke(State::new()).unwrap_err();
        assert!(matches!(
            err,
            PageflowError::ExecutionLimitExceeded { limit: 7, ref node } if node == "spin"
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_each_invocation_gets_fresh_counter() {
        let mut graph = StateGraph::new().with_max_steps(3);
        graph.add_node(noop("a")).unwrap();
        graph.add_node(noop("b")).unwrap();
        graph.add_node(noop("c")).unwrap();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "c").unwrap();

        for _ in 0..3 {
            let result = graph.invoke(State::new()).unwrap();
            assert_eq!(result.step_count(), 3);
        }
    }

    #[test]
    fn test_explicit_start_overrides_first_node() {
        let mut graph = StateGraph::new();
        graph.add_node(setter("a", "x", json!("a"))).unwrap();
        graph.add_node(setter("b", "x", json!("b"))).unwrap();
        graph.set_start("b");

        let result = graph.invoke(State::new()).unwrap();
        assert_eq!(result.path(), vec!["b"]);
        assert_eq!(result.state.get_str("x"), Some("b"));
    }
}
