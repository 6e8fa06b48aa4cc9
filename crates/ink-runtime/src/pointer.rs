use ink_core::{Path, PathComponent};

use crate::graph::{NodeId, StoryGraph};

/// A position inside a container: `index == -1` addresses the container itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub container: NodeId,
    pub index: i32,
}

impl Pointer {
    pub fn new(container: NodeId, index: i32) -> Self {
        Self { container, index }
    }

    pub fn start_of(container: NodeId) -> Self {
        Self::new(container, 0)
    }

    /// Child at `index`, the container itself when it is empty or `index < 0`,
    /// nothing when `index` is past the end.
    pub fn resolve(&self, graph: &StoryGraph) -> Option<NodeId> {
        let container = graph.container(self.container);
        if self.index < 0 || container.content.is_empty() {
            return Some(self.container);
        }
        container.content.get(self.index as usize).copied()
    }

    pub fn path(&self, graph: &StoryGraph) -> Path {
        let path = graph.path_of(self.container);
        if self.index >= 0 {
            path.with_component(PathComponent::Index(self.index as usize))
        } else {
            path.clone()
        }
    }
}

#[cfg(test)]
mod pointer_tests {
    use super::*;

    #[test]
    fn resolves_children_container_and_past_end() {
        let graph = StoryGraph::from_json(r#"{"inkVersion":17,"root":[["^a","^b",null],[],null]}"#)
            .expect("graph should load");
        let inner = graph
            .content_at_path(&Path::parse("0"))
            .node()
            .expect("inner container");
        let empty = graph
            .content_at_path(&Path::parse("1"))
            .node()
            .expect("empty container");

        let first = Pointer::start_of(inner).resolve(&graph).expect("first child");
        assert_eq!(graph.path_of(first).to_string(), "0.0");
        assert_eq!(Pointer::new(inner, -1).resolve(&graph), Some(inner));
        assert_eq!(Pointer::new(inner, 2).resolve(&graph), None);
        assert_eq!(Pointer::start_of(empty).resolve(&graph), Some(empty));
        assert_eq!(Pointer::new(inner, 1).path(&graph).to_string(), "0.1");
        assert_eq!(Pointer::new(inner, -1).path(&graph).to_string(), "0");
    }
}
