//! Runtime for compiled ink stories.
//!
//! A [`Story`] walks an immutable [`StoryGraph`] one content object at a time,
//! collecting output lines and choices into a [`StoryState`] that can be
//! snapshotted, saved to JSON, and restored.

mod callstack;
mod choice;
mod graph;
mod json;
mod list;
mod native_ops;
mod object;
mod output;
mod pointer;
mod rng;
mod state_patch;
mod story;
mod story_state;
mod value;
mod variables_state;

pub use callstack::{CallStack, Element, Thread};
pub use choice::Choice;
pub use graph::{Container, Content, NodeId, SearchResult, StoryGraph};
pub use ink_core::{InkError, Path, PathComponent};
pub use list::{InkList, InkListItem, ListDefinition, ListDefinitions};
pub use native_ops::NativeOp;
pub use object::{
    ChoicePoint, ControlCommand, Divert, DivertKind, GlueKind, Object, PushPopType,
    VariableAssignment, VariableReference,
};
pub use pointer::Pointer;
pub use state_patch::StatePatch;
pub use story::{
    ExternalFunction, FunctionResult, HostFunctionRegistry, Story, StoryOptions, VariableObserver,
};
pub use story_state::StoryState;
pub use value::{Value, ValueType};
pub use variables_state::VariablesState;
