use std::fmt;

use serde::{Deserialize, Serialize};

const PARENT_ID: &str = "^";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathComponent {
    Index(usize),
    Name(String),
    Parent,
}

impl PathComponent {
    pub fn parse(raw: &str) -> Self {
        if raw == PARENT_ID {
            return Self::Parent;
        }
        match raw.parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(raw.to_string()),
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    pub fn is_parent(&self) -> bool {
        matches!(self, Self::Parent)
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Name(name) => f.write_str(name),
            Self::Parent => f.write_str(PARENT_ID),
        }
    }
}

/// Address of a node in the content tree.
///
/// Absolute paths start at the root container. Relative paths start at the
/// container nearest to the object resolving them and usually open with one or
/// more parent (`^`) components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Path {
    components: Vec<PathComponent>,
    relative: bool,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(components: Vec<PathComponent>, relative: bool) -> Self {
        Self {
            components,
            relative,
        }
    }

    /// Parses the dotted form, where a leading `.` marks a relative path.
    pub fn parse(raw: &str) -> Self {
        let (relative, body) = match raw.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let components = if body.is_empty() {
            Vec::new()
        } else {
            body.split('.').map(PathComponent::parse).collect()
        };
        Self {
            components,
            relative,
        }
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    pub fn component(&self, index: usize) -> Option<&PathComponent> {
        self.components.get(index)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn head(&self) -> Option<&PathComponent> {
        self.components.first()
    }

    pub fn last_component(&self) -> Option<&PathComponent> {
        self.components.last()
    }

    /// Everything after the first component, keeping relativity.
    pub fn tail(&self) -> Self {
        Self {
            components: self.components.iter().skip(1).cloned().collect(),
            relative: self.relative,
        }
    }

    pub fn with_component(&self, component: PathComponent) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self {
            components,
            relative: self.relative,
        }
    }

    /// Joins a relative path onto this one, consuming leading parent steps.
    pub fn join(&self, relative: &Path) -> Self {
        let mut components = self.components.clone();
        let mut rest = relative.components.iter().peekable();
        while let Some(PathComponent::Parent) = rest.peek() {
            components.pop();
            rest.next();
        }
        components.extend(rest.cloned());
        Self {
            components,
            relative: self.relative,
        }
    }

    pub fn components_string(&self) -> String {
        let joined = self
            .components
            .iter()
            .map(|component| component.to_string())
            .collect::<Vec<_>>()
            .join(".");
        if self.relative {
            format!(".{}", joined)
        } else {
            joined
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components_string())
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for Path {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Path> for String {
    fn from(value: Path) -> Self {
        value.components_string()
    }
}
