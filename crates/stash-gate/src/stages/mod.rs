//! Built-in gate stages.

pub mod extension;
pub mod name;
pub mod size;

pub use extension::{extension_of, ExtensionStage};
pub use name::{sanitize_name, NameStage};
pub use size::{check_size, SizeStage};
