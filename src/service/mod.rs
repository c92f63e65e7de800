pub mod format;
pub mod pipeline;
pub mod validate;

pub use format::{FieldFormatter, FormatOutcome, ARTIFACT_KEY_SUFFIX, FILE_REMOVE_MARKER};
pub use pipeline::Dispatcher;
pub use validate::{ValidationResult, Validator, Violation};
