//! Errors reported while writing resources

use thiserror::Error;

use crate::annotation::AnnotationNameError;
use crate::writer::JsonNumberError;

type IoError = std::io::Error;

/// Error which occurred while writing a value
///
/// Apart from [`IoError`](Self::IoError) these errors are caused by the configuration of the
/// written types or by the written data. Writing must not be resumed after an error; bytes
/// which have already been drained to the output are not retracted.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WriteError {
    /// An IO error occurred while writing
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    /// A number value is not a valid JSON number
    ///
    /// The data of this enum variant is a message explaining why the number is not valid.
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    /// None of the resolution strategies of the writer provider supports the type
    #[error("no writer available for type {type_name}")]
    NoWriterAvailable {
        /// Name of the Rust type
        type_name: &'static str,
    },
    /// The name of a custom instance annotation is malformed
    #[error("invalid annotation name '{name}': {source}")]
    InvalidAnnotationName {
        /// The annotation name, without leading `@`
        name: String,
        /// The violated naming rule
        source: AnnotationNameError,
    },
    /// A custom `write_properties` hook did not complete
    ///
    /// Properties written by such a hook cannot be suspended and resumed.
    #[error("custom property writer of type {type_name} cannot be suspended")]
    UnsupportedSuspension {
        /// Name of the resource type
        type_name: String,
    },
    /// A property selector returned a name which is not a declared property
    #[error("type {type_name} has no property '{property}'")]
    UnknownProperty {
        /// Name of the resource type
        type_name: String,
        /// The unknown property name
        property: String,
    },
    /// A resource writer could not be derived from the shape of the type and the model
    #[error("cannot derive resource writer for type {type_name}: {reason}")]
    ReflectionFailed {
        /// Name of the Rust type
        type_name: &'static str,
        /// Explanation of the failure
        reason: String,
    },
}

impl From<JsonNumberError> for WriteError {
    fn from(error: JsonNumberError) -> Self {
        match error {
            JsonNumberError::InvalidNumber(message) => WriteError::InvalidNumber(message),
            JsonNumberError::IoError(error) => WriteError::IoError(error),
        }
    }
}
