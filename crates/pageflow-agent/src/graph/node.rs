use pageflow_core::error::Result;

use super::state::{State, StateDelta};

/// What a node hands back to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    /// Merge these fields into the state. Every field must be declared in
    /// the node's `writes` list.
    Update(StateDelta),
    /// Supersede the state wholesale.
    Replace(State),
    /// Keep the state as it is.
    Unchanged,
}

type NodeFn = Box<dyn Fn(&State) -> Result<NodeOutput> + Send + Sync>;

/// A named step in the graph.
///
/// A node borrows the current state and returns its output; it never holds
/// on to the state. The fields it may write are declared up front so the
/// driver can merge its delta without guessing.
pub struct Node {
    name: String,
    writes: Vec<String>,
    func: NodeFn,
}

impl Node {
    /// Create a node that writes nothing until [`Node::writes`] is called.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&State) -> Result<NodeOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            writes: vec![],
            func: Box::new(func),
        }
    }

    /// Declare the fields this node writes.
    pub fn writes<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writes = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_writes(&self) -> &[String] {
        &self.writes
    }

    pub fn declares(&self, field: &str) -> bool {
        self.writes.iter().any(|w| w == field)
    }

    pub fn run(&self, state: &State) -> Result<NodeOutput> {
        (self.func)(state)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_builder() {
        let node = Node::new("qa", |_| Ok(NodeOutput::Unchanged)).writes(["qa_pairs"]);

        assert_eq!(node.name(), "qa");
        assert_eq!(node.declared_writes(), &["qa_pairs".to_string()]);
        assert!(node.declares("qa_pairs"));
        assert!(!node.declares("blocks"));
    }

    #[test]
    fn test_node_run_reads_state() {
        let node = Node::new("echo", |state: &State| {
            let name = state.get_str("name").unwrap_or("none").to_string();
            Ok(NodeOutput::Update(
                StateDelta::new().with("greeting", json!(format!("hi {}", name))),
            ))
        })
        .writes(["greeting"]);

        let mut state = State::new();
        state.set_str("name", "Ada");
        let out = node.run(&state).unwrap();
        assert_eq!(
            out,
            NodeOutput::Update(StateDelta::new().with("greeting", json!("hi Ada")))
        );
    }

    #[test]
    fn test_debug_omits_closure() {
        let node = Node::new("parser", |_| Ok(NodeOutput::Unchanged));
        let dbg = format!("{:?}", node);
        assert!(dbg.contains("parser"));
    }
}
