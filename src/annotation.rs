//! Custom instance annotations
//!
//! Annotations of a resource are written as members named `@namespace.term`, annotations of
//! a property `P` as members named `P@namespace.term` directly before `P`.

use thiserror::Error;

use crate::error::WriteError;
use crate::state::WriteState;
use crate::value::{Annotations, OpenValue};
use crate::writer::JsonWriter;

/// Prefix of annotation terms reserved for the protocol
pub const RESERVED_PREFIX: &str = "odata.";

/// Violated naming rule of a custom annotation
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
pub enum AnnotationNameError {
    /// The name starts with `@`; the `@` is added when writing
    #[error("name must not start with '@'")]
    LeadingAt,
    /// The name starts with the reserved `odata.` prefix
    #[error("prefix 'odata.' is reserved")]
    ReservedPrefix,
    /// The name has no namespace, that is it contains no `.`
    #[error("name must be qualified with a namespace")]
    MissingNamespace,
}

/// Checks the name of a custom instance annotation
///
/// # Examples
/// ```
/// # use odata_resource_writer::annotation::*;
/// assert_eq!(validate_annotation_name("Core.Description"), Ok(()));
/// assert_eq!(validate_annotation_name("Description"), Err(AnnotationNameError::MissingNamespace));
/// assert_eq!(validate_annotation_name("odata.type"), Err(AnnotationNameError::ReservedPrefix));
/// ```
pub fn validate_annotation_name(name: &str) -> Result<(), AnnotationNameError> {
    if name.starts_with('@') {
        Err(AnnotationNameError::LeadingAt)
    } else if name.starts_with(RESERVED_PREFIX) {
        Err(AnnotationNameError::ReservedPrefix)
    } else if !name.contains('.') {
        Err(AnnotationNameError::MissingNamespace)
    } else {
        Ok(())
    }
}

type AnnotationBag<T> = dyn for<'a> Fn(&'a T) -> Option<&'a Annotations> + Send + Sync;
type AnnotationCallback<T> =
    dyn Fn(&T, &mut AnnotationWriter<'_>) -> Result<(), WriteError> + Send + Sync;

/// Source of the custom annotations of a resource or property
pub enum AnnotationSource<T> {
    /// Annotations stored in the resource; values are written with the writer the provider
    /// resolves for [`OpenValue`]
    Bag(Box<AnnotationBag<T>>),
    /// Annotations written by a callback
    Callback(Box<AnnotationCallback<T>>),
}

impl<T> AnnotationSource<T> {
    /// Creates a source reading an annotation bag from the resource
    pub fn bag<F>(get: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> Option<&'a Annotations> + Send + Sync + 'static,
    {
        AnnotationSource::Bag(Box::new(get))
    }

    /// Creates a source writing annotations with a callback
    ///
    /// # Examples
    /// ```
    /// # use odata_resource_writer::annotation::AnnotationSource;
    /// struct Order {
    ///     draft: bool,
    /// }
    ///
    /// let source = AnnotationSource::callback(|order: &Order, writer| {
    ///     if order.draft {
    ///         writer.string_annotation("Sales.state", "draft")?;
    ///     }
    ///     Ok(())
    /// });
    /// # let _ = (source, Order { draft: false });
    /// ```
    pub fn callback<F>(write: F) -> Self
    where
        F: Fn(&T, &mut AnnotationWriter<'_>) -> Result<(), WriteError> + Send + Sync + 'static,
    {
        AnnotationSource::Callback(Box::new(write))
    }

    /// Writes the annotations; `target` is the property name for property annotations
    pub(crate) fn write(
        &self,
        resource: &T,
        target: Option<&str>,
        state: &mut WriteState,
    ) -> Result<(), WriteError> {
        let mut writer = AnnotationWriter { state, target };
        match self {
            AnnotationSource::Bag(get) => {
                if let Some(annotations) = get(resource) {
                    for (name, value) in annotations {
                        writer.annotation(name, value)?;
                    }
                }
                Ok(())
            }
            AnnotationSource::Callback(write) => write(resource, &mut writer),
        }
    }
}

impl<T> std::fmt::Debug for AnnotationSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotationSource::Bag(_) => f.write_str("AnnotationSource::Bag"),
            AnnotationSource::Callback(_) => f.write_str("AnnotationSource::Callback"),
        }
    }
}

/// Writes custom annotations of one resource or property
pub struct AnnotationWriter<'s> {
    state: &'s mut WriteState,
    /// Annotated property; `None` for resource annotations
    target: Option<&'s str>,
}

impl AnnotationWriter<'_> {
    fn write_name(&mut self, name: &str) -> Result<(), WriteError> {
        validate_annotation_name(name).map_err(|source| WriteError::InvalidAnnotationName {
            name: name.to_owned(),
            source,
        })?;
        let member_name = match self.target {
            Some(target) => format!("{target}@{name}"),
            None => format!("@{name}"),
        };
        self.state.writer_mut().name(&member_name)?;
        Ok(())
    }

    /// Writes an annotation
    ///
    /// # Errors
    /// Returns [`WriteError::InvalidAnnotationName`] if the name is malformed, see
    /// [`validate_annotation_name`].
    pub fn annotation(&mut self, name: &str, value: &OpenValue) -> Result<(), WriteError> {
        self.write_name(name)?;
        let writer = self.state.provider().get_writer::<OpenValue>()?;
        writer.write(value, self.state)?;
        Ok(())
    }

    /// Writes an annotation with string value
    pub fn string_annotation(&mut self, name: &str, value: &str) -> Result<(), WriteError> {
        self.write_name(name)?;
        self.state.writer_mut().string_value(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["NS.term", "Org.OData.Core.V1.Description", "a.b", "odataX.term"] {
            assert_eq!(Ok(()), validate_annotation_name(name), "{name}");
        }
    }

    #[test]
    fn invalid_names() {
        assert_eq!(
            Err(AnnotationNameError::LeadingAt),
            validate_annotation_name("@NS.term")
        );
        // Leading '@' takes precedence over the other rules
        assert_eq!(
            Err(AnnotationNameError::LeadingAt),
            validate_annotation_name("@term")
        );
        assert_eq!(
            Err(AnnotationNameError::ReservedPrefix),
            validate_annotation_name("odata.etag")
        );
        assert_eq!(
            Err(AnnotationNameError::MissingNamespace),
            validate_annotation_name("term")
        );
        assert_eq!(
            Err(AnnotationNameError::MissingNamespace),
            validate_annotation_name("")
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            "prefix 'odata.' is reserved",
            AnnotationNameError::ReservedPrefix.to_string()
        );
    }
}
