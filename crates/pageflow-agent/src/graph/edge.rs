use super::state::State;

/// Successor name meaning "no further edge": traversal stops without
/// naming a terminal node.
pub const END: &str = "__end__";

type RouterFn = Box<dyn Fn(&State) -> String + Send + Sync>;

/// The single outgoing rule of a node.
pub enum Edge {
    /// Always continue to the named node.
    Linear(String),
    /// Inspect the post-execution state and name the successor.
    Conditional(RouterFn),
}

impl Edge {
    pub fn linear(to: impl Into<String>) -> Self {
        Self::Linear(to.into())
    }

    pub fn conditional<F>(router: F) -> Self
    where
        F: Fn(&State) -> String + Send + Sync + 'static,
    {
        Self::Conditional(Box::new(router))
    }

    /// Name the successor for the given state.
    pub fn resolve(&self, state: &State) -> String {
        match self {
            Self::Linear(to) => to.clone(),
            Self::Conditional(router) => router(state),
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::Conditional(_))
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear(to) => f.debug_tuple("Linear").field(to).finish(),
            Self::Conditional(_) => f.write_str("Conditional(..)"),
        }
    }
}
