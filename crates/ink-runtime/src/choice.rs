use ink_core::Path;

use crate::callstack::Thread;

/// A choice offered to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub(crate) text: String,
    pub(crate) index: usize,
    pub(crate) source_path: String,
    pub(crate) target_path: Path,
    pub(crate) tags: Vec<String>,
    pub(crate) is_invisible_default: bool,
    pub(crate) original_thread_index: i32,
    /// Thread captured when the choice was generated; choosing resumes it.
    pub(crate) thread_at_generation: Thread,
}

impl Choice {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Position among the choices currently offered.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Path of the choice point that generated this choice.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn path_string_on_choice(&self) -> String {
        self.target_path.to_string()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_invisible_default(&self) -> bool {
        self.is_invisible_default
    }

    pub fn original_thread_index(&self) -> i32 {
        self.original_thread_index
    }
}
