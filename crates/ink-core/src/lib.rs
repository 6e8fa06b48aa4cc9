pub mod error;
pub mod path;
pub mod types;

pub use error::InkError;
pub use path::{Path, PathComponent};
pub use types::*;
