use std::collections::BTreeMap;
use std::sync::Arc;

use ink_core::{InkError, Path, PathComponent};

use crate::list::ListDefinitions;
use crate::native_ops::NativeOp;
use crate::object::{
    ChoicePoint, ControlCommand, Divert, DivertKind, GlueKind, VariableAssignment,
    VariableReference,
};
use crate::pointer::Pointer;
use crate::value::Value;

/// Stable index of a node in a [`StoryGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

const COUNT_VISITS: i32 = 0x1;
const COUNT_TURNS: i32 = 0x2;
const COUNT_START_ONLY: i32 = 0x4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub name: Option<String>,
    pub content: Vec<NodeId>,
    /// Positional children that carry a name plus named-only children.
    pub named_content: BTreeMap<String, NodeId>,
    pub visits_should_be_counted: bool,
    pub turn_index_should_be_counted: bool,
    pub counting_at_start_only: bool,
}

impl Container {
    pub fn count_flags(&self) -> i32 {
        let mut flags = 0;
        if self.visits_should_be_counted {
            flags |= COUNT_VISITS;
        }
        if self.turn_index_should_be_counted {
            flags |= COUNT_TURNS;
        }
        if self.counting_at_start_only {
            flags |= COUNT_START_ONLY;
        }
        // Start-only on its own has no effect and is not written.
        if flags == COUNT_START_ONLY {
            flags = 0;
        }
        flags
    }

    pub fn set_count_flags(&mut self, flags: i32) {
        self.visits_should_be_counted = flags & COUNT_VISITS != 0;
        self.turn_index_should_be_counted = flags & COUNT_TURNS != 0;
        self.counting_at_start_only = flags & COUNT_START_ONLY != 0;
    }

    /// Named children that are not also positional.
    pub fn named_only_content(&self) -> impl Iterator<Item = (&String, NodeId)> {
        self.named_content
            .iter()
            .filter(|(_, id)| !self.content.contains(id))
            .map(|(name, id)| (name, *id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Container(Container),
    Value(Value),
    Void,
    Glue(GlueKind),
    Command(ControlCommand),
    Tag(String),
    Divert(Divert),
    ChoicePoint(ChoicePoint),
    VariableReference(VariableReference),
    VariableAssignment(VariableAssignment),
    NativeCall(NativeOp),
}

/// Outcome of a path lookup. An approximate result is the deepest node that
/// could still be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    found: NodeId,
    approximate: bool,
}

impl SearchResult {
    /// The node, only when the whole path resolved.
    pub fn node(&self) -> Option<NodeId> {
        (!self.approximate).then_some(self.found)
    }

    pub fn approximate_node(&self) -> NodeId {
        self.found
    }

    pub fn is_approximate(&self) -> bool {
        self.approximate
    }
}

/// The immutable content tree of a story.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryGraph {
    nodes: Vec<Content>,
    parents: Vec<Option<NodeId>>,
    index_in_parent: Vec<Option<usize>>,
    paths: Vec<Path>,
    root: NodeId,
    list_definitions: Arc<ListDefinitions>,
}

impl StoryGraph {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn content(&self, id: NodeId) -> &Content {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Content)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, content)| (NodeId(index as u32), content))
    }

    pub fn as_container(&self, id: NodeId) -> Option<&Container> {
        match self.content(id) {
            Content::Container(container) => Some(container),
            _ => None,
        }
    }

    /// Panics when `id` is not a container.
    pub fn container(&self, id: NodeId) -> &Container {
        self.as_container(id)
            .unwrap_or_else(|| panic!("node {:?} is not a container", id))
    }

    pub fn is_container(&self, id: NodeId) -> bool {
        self.as_container(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.index()]
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        self.index_in_parent[id.index()]
    }

    pub fn path_of(&self, id: NodeId) -> &Path {
        &self.paths[id.index()]
    }

    pub fn list_definitions(&self) -> &Arc<ListDefinitions> {
        &self.list_definitions
    }

    pub fn content_at_path(&self, path: &Path) -> SearchResult {
        self.content_at_components(path.components())
    }

    fn content_at_components(&self, components: &[PathComponent]) -> SearchResult {
        let mut current = self.root;
        for component in components {
            let Some(container) = self.as_container(current) else {
                return SearchResult {
                    found: current,
                    approximate: true,
                };
            };
            let next = match component {
                PathComponent::Index(index) => container.content.get(*index).copied(),
                PathComponent::Name(name) => container.named_content.get(name).copied(),
                PathComponent::Parent => self.parent(current),
            };
            match next {
                Some(next) => current = next,
                None => {
                    return SearchResult {
                        found: current,
                        approximate: true,
                    }
                }
            }
        }
        SearchResult {
            found: current,
            approximate: false,
        }
    }

    /// Absolute form of `path` as seen from `from`.
    pub fn absolute_path(&self, from: NodeId, path: &Path) -> Path {
        if path.is_relative() {
            let joined = self.path_of(from).join(path);
            Path::new(joined.components().to_vec(), false)
        } else {
            path.clone()
        }
    }

    pub fn resolve_path(&self, from: NodeId, path: &Path) -> SearchResult {
        self.content_at_path(&self.absolute_path(from, path))
    }

    /// Pointer for a jump target. A trailing index addresses a position in the
    /// container named by the rest of the path.
    pub fn pointer_at_path(&self, path: &Path) -> Result<(Pointer, SearchResult), InkError> {
        if path.is_empty() {
            return Err(InkError::new(
                "RUNTIME_PATH_NOT_FOUND",
                "Cannot point at an empty path.",
            ));
        }
        let components = path.components();
        let (used, result, index) = match path.last_component() {
            Some(PathComponent::Index(index)) => {
                let used = components.len() - 1;
                (used, self.content_at_components(&components[..used]), *index as i32)
            }
            _ => (components.len(), self.content_at_components(components), -1),
        };
        let found = result.approximate_node();
        if (found == self.root && used > 0) || !self.is_container(found) {
            return Err(InkError::new(
                "RUNTIME_PATH_NOT_FOUND",
                format!(
                    "Failed to find content at path '{}', and no approximation of it was possible.",
                    path
                ),
            ));
        }
        Ok((Pointer::new(found, index), result))
    }

    /// Tags at the very start of a story, knot or stitch.
    pub fn tags_at_start_of_flow_container(&self, path: &Path) -> Result<Vec<String>, InkError> {
        let result = self.content_at_path(path);
        let mut flow = match result.node() {
            Some(found) if self.is_container(found) => found,
            _ => {
                return Err(InkError::new(
                    "RUNTIME_PATH_NOT_FOUND",
                    format!("No container at path '{}' to read tags from.", path),
                ))
            }
        };
        while let Some(first) = self.container(flow).content.first() {
            if self.is_container(*first) {
                flow = *first;
            } else {
                break;
            }
        }

        let mut tags = Vec::new();
        for child in &self.container(flow).content {
            match self.content(*child) {
                Content::Tag(text) => tags.push(text.clone()),
                _ => break,
            }
        }
        Ok(tags)
    }
}

/// Collects nodes while a story file is being read, then builds the lookup
/// tables and resolves static targets.
#[derive(Debug, Default)]
pub(crate) struct GraphBuilder {
    nodes: Vec<Content>,
}

impl GraphBuilder {
    pub(crate) fn push(&mut self, content: Content) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(content);
        id
    }

    pub(crate) fn container_mut(&mut self, id: NodeId) -> &mut Container {
        match &mut self.nodes[id.index()] {
            Content::Container(container) => container,
            _ => panic!("node {:?} is not a container", id),
        }
    }

    pub(crate) fn container_name(&self, id: NodeId) -> Option<String> {
        match &self.nodes[id.index()] {
            Content::Container(container) => container.name.clone(),
            _ => None,
        }
    }

    pub(crate) fn finish(
        self,
        root: NodeId,
        list_definitions: ListDefinitions,
    ) -> Result<StoryGraph, InkError> {
        let count = self.nodes.len();
        let mut parents = vec![None; count];
        let mut index_in_parent = vec![None; count];
        let mut paths = vec![Path::root(); count];

        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let Content::Container(container) = &self.nodes[id.index()] else {
                continue;
            };
            let base = paths[id.index()].clone();
            for (index, child) in container.content.iter().enumerate() {
                parents[child.index()] = Some(id);
                index_in_parent[child.index()] = Some(index);
                let component = match &self.nodes[child.index()] {
                    Content::Container(Container {
                        name: Some(name), ..
                    }) => PathComponent::Name(name.clone()),
                    _ => PathComponent::Index(index),
                };
                paths[child.index()] = base.with_component(component);
                pending.push(*child);
            }
            for (name, child) in container.named_only_content() {
                parents[child.index()] = Some(id);
                paths[child.index()] = base.with_component(PathComponent::Name(name.clone()));
                pending.push(child);
            }
        }

        let mut graph = StoryGraph {
            nodes: self.nodes,
            parents,
            index_in_parent,
            paths,
            root,
            list_definitions: Arc::new(list_definitions),
        };
        graph.link();
        Ok(graph)
    }
}

enum Link {
    Divert(Option<Pointer>),
    Choice(Option<NodeId>),
    ReadCount(Option<NodeId>),
}

impl StoryGraph {
    fn link(&mut self) {
        let mut links = Vec::new();
        for index in 0..self.nodes.len() {
            let id = NodeId(index as u32);
            let link = match &self.nodes[index] {
                Content::Divert(Divert {
                    kind: DivertKind::Path { path, .. },
                    ..
                }) => Link::Divert(self.divert_pointer(id, path)),
                Content::ChoicePoint(choice) => {
                    Link::Choice(self.container_at(id, &choice.path_on_choice))
                }
                Content::VariableReference(VariableReference::ReadCount { path, .. }) => {
                    Link::ReadCount(self.container_at(id, path))
                }
                _ => continue,
            };
            links.push((index, link));
        }

        for (index, link) in links {
            match (&mut self.nodes[index], link) {
                (
                    Content::Divert(Divert {
                        kind: DivertKind::Path { pointer, .. },
                        ..
                    }),
                    Link::Divert(resolved),
                ) => *pointer = resolved,
                (Content::ChoicePoint(choice), Link::Choice(resolved)) => choice.target = resolved,
                (
                    Content::VariableReference(VariableReference::ReadCount { container, .. }),
                    Link::ReadCount(resolved),
                ) => *container = resolved,
                _ => {}
            }
        }
    }

    fn container_at(&self, from: NodeId, path: &Path) -> Option<NodeId> {
        self.resolve_path(from, path)
            .node()
            .filter(|found| self.is_container(*found))
    }

    fn divert_pointer(&self, from: NodeId, path: &Path) -> Option<Pointer> {
        let absolute = self.absolute_path(from, path);
        match absolute.last_component() {
            Some(PathComponent::Index(index)) => {
                let head = &absolute.components()[..absolute.len() - 1];
                let container = self.content_at_components(head).node()?;
                self.is_container(container)
                    .then(|| Pointer::new(container, *index as i32))
            }
            _ => {
                let result = self.content_at_path(&absolute);
                if result.is_approximate() {
                    log::warn!(
                        "divert target '{}' not found, approximated to '{}'",
                        absolute,
                        self.path_of(result.approximate_node())
                    );
                }
                let found = result.approximate_node();
                if found == self.root && !absolute.is_empty() && result.is_approximate() {
                    return None;
                }
                self.is_container(found).then(|| Pointer::start_of(found))
            }
        }
    }
}
