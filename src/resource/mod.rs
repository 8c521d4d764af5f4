//! Writing resources as JSON objects
//!
//! A resource is written in phases, see [`StructuralPhase`]: the start token, metadata
//! (context URL, id, etag, custom annotations), the properties, annotations written after
//! the properties, and the end token. After every phase and after every property the writer
//! checks whether the output should be flushed; if so it saves its progress in its frame and
//! suspends. The next call with the same value and state continues at the saved position.
//!
//! # Examples
//! ```
//! # use odata_resource_writer::provider::{Writable, WriterProvider};
//! # use odata_resource_writer::resource::ResourceTypeInfo;
//! # use odata_resource_writer::state::WriteOptions;
//! struct Product {
//!     name: String,
//!     price: f64,
//! }
//! impl Writable for Product {}
//!
//! let provider = WriterProvider::builder()
//!     .register(
//!         ResourceTypeInfo::<Product>::new("Shop.Product")
//!             .property("Name", |p| &p.name)
//!             .property("Price", |p| &p.price),
//!     )
//!     .build();
//!
//! let product = Product {
//!     name: "Tea".to_owned(),
//!     price: 2.5,
//! };
//! let mut out = Vec::new();
//! provider.write_document(&product, &mut out, WriteOptions::default())?;
//! assert_eq!(String::from_utf8(out)?, r#"{"Name":"Tea","Price":2.5}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod property;
mod type_info;

pub use property::*;
pub use type_info::*;

use std::any::{type_name, Any};
use std::sync::Arc;

use tracing::trace;

use crate::error::WriteError;
use crate::provider::{ValueWriter, Writable, WriterKind};
use crate::stack::StructuralPhase;
use crate::state::WriteState;
use crate::value::OpenValue;
use crate::writer::JsonWriter;

/// Writer for a resource type described by [`ResourceTypeInfo`]
pub struct ResourceWriter<T> {
    info: Arc<ResourceTypeInfo<T>>,
}

impl<T: Writable> ResourceWriter<T> {
    /// Creates a writer for resources described by `info`
    pub fn new(info: Arc<ResourceTypeInfo<T>>) -> Self {
        ResourceWriter { info }
    }

    /// Gets the metadata stored in the current frame, or the metadata of this writer for a
    /// new frame
    fn frame_type_info(&self, state: &WriteState) -> Arc<ResourceTypeInfo<T>> {
        match &state.stack().current().type_info {
            Some(type_info) => match Arc::clone(type_info).downcast::<ResourceTypeInfo<T>>() {
                Ok(info) => info,
                Err(_) => panic!(
                    "Incorrect writer usage: Cannot resume write with a value of different type than {}",
                    type_name::<T>()
                ),
            },
            None => Arc::clone(&self.info),
        }
    }

    fn suspend(info: &ResourceTypeInfo<T>, state: &mut WriteState) -> bool {
        let depth = state.stack().depth();
        let frame = state.stack_mut().current_mut();
        trace!(
            type_name = info.type_name(),
            phase = %frame.phase,
            cursor = frame.child_cursor,
            depth,
            "suspending resource"
        );
        frame.is_continuation = true;
        state.stack_mut().pop(false);
        false
    }

    fn write_pre_value_metadata(
        info: &ResourceTypeInfo<T>,
        resource: &T,
        state: &mut WriteState,
    ) -> Result<(), WriteError> {
        if state.stack.is_top_level() {
            if let Some(context_url) = &state.options.context_url {
                state.writer.string_property("@odata.context", context_url)?;
            }
        }
        if let Some(id) = info.id.as_ref().and_then(|id| id(resource)) {
            state.writer.string_property("@odata.id", &id)?;
        }
        if let Some(etag) = info.etag.as_ref().and_then(|etag| etag(resource)) {
            state.writer.string_property("@odata.etag", &etag)?;
        }
        if let Some(annotations) = &info.pre_value_annotations {
            annotations.write(resource, None, state)?;
        }
        Ok(())
    }

    /// Writes the properties; returns false if writing has to be suspended
    fn write_properties(
        info: &ResourceTypeInfo<T>,
        resource: &T,
        state: &mut WriteState,
    ) -> Result<bool, WriteError> {
        if let Some(selector) = &info.property_selector {
            let selection = match state.stack().current().selection.clone() {
                Some(selection) => selection,
                None => {
                    let selection = selector(resource)
                        .iter()
                        .map(|name| {
                            info.find_property(name)
                                .map(PropertyInfo::index)
                                .ok_or_else(|| WriteError::UnknownProperty {
                                    type_name: info.type_name().to_owned(),
                                    property: name.clone(),
                                })
                        })
                        .collect::<Result<Arc<[usize]>, _>>()?;
                    state.stack_mut().current_mut().selection = Some(Arc::clone(&selection));
                    selection
                }
            };
            return Self::write_declared_properties(info, resource, state, Some(&*selection));
        }

        if let Some(write_properties) = &info.write_properties {
            return if write_properties(resource, state)? {
                Ok(true)
            } else {
                Err(WriteError::UnsupportedSuspension {
                    type_name: info.type_name().to_owned(),
                })
            };
        }

        if !Self::write_declared_properties(info, resource, state, None)? {
            return Ok(false);
        }
        Self::write_dynamic_properties(info, resource, state)
    }

    /// Writes declared properties starting at the child cursor; with `selection` only the
    /// properties with the selected indices are written, without evaluating skip conditions
    fn write_declared_properties(
        info: &ResourceTypeInfo<T>,
        resource: &T,
        state: &mut WriteState,
        selection: Option<&[usize]>,
    ) -> Result<bool, WriteError> {
        let count = selection.map_or(info.properties.len(), <[usize]>::len);
        let mut cursor = state.stack().current().child_cursor;

        while cursor < count {
            let index = selection.map_or(cursor, |selection| selection[cursor]);
            let property = &info.properties[index];
            // Skip condition was already evaluated when the value was started
            let in_progress = state.stack().current().current_property == Some(index);

            if in_progress || selection.is_some() || !property.should_skip(resource, state) {
                if !property.write(resource, state)? {
                    return Ok(false);
                }
                cursor += 1;
                state.stack_mut().current_mut().child_cursor = cursor;
                if state.should_flush() {
                    return Ok(false);
                }
            } else {
                cursor += 1;
                state.stack_mut().current_mut().child_cursor = cursor;
            }
        }
        Ok(true)
    }

    /// Writes open properties; the child cursor continues after the declared properties
    fn write_dynamic_properties(
        info: &ResourceTypeInfo<T>,
        resource: &T,
        state: &mut WriteState,
    ) -> Result<bool, WriteError> {
        let dynamic_properties = match info.dynamic_properties.as_ref().and_then(|get| get(resource)) {
            Some(dynamic_properties) => dynamic_properties,
            None => return Ok(true),
        };
        let declared_count = info.properties.len();
        let writer = state.provider().get_writer::<OpenValue>()?;

        let mut cursor = state.stack().current().child_cursor;
        while let Some((name, value)) = dynamic_properties.get_index(cursor - declared_count) {
            state.writer_mut().name(name)?;
            writer.write(value, state)?;
            cursor += 1;
            state.stack_mut().current_mut().child_cursor = cursor;
            if state.should_flush() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<T: Writable> ValueWriter<T> for ResourceWriter<T> {
    fn write(&self, resource: &T, state: &mut WriteState) -> Result<bool, WriteError> {
        state.stack_mut().push();
        let info = self.frame_type_info(state);

        let frame = state.stack_mut().current_mut();
        if frame.is_continuation {
            frame.is_continuation = false;
            trace!(
                type_name = info.type_name(),
                phase = %frame.phase,
                cursor = frame.child_cursor,
                "resuming resource"
            );
        }

        if state.stack().current().phase == StructuralPhase::NotStarted {
            let clause = if state.stack().is_top_level() {
                state.options().select_expand.clone()
            } else {
                state.child_select_expand.take()
            };
            if let Some(on_serializing) = &info.on_serializing {
                on_serializing(resource);
            }
            state.writer_mut().begin_object()?;

            let frame = state.stack_mut().current_mut();
            frame.select_expand = clause;
            frame.type_info = Some(Arc::clone(&info) as Arc<dyn Any + Send + Sync>);
            frame.phase = StructuralPhase::StartToken;
        }

        if state.stack().current().phase == StructuralPhase::StartToken {
            Self::write_pre_value_metadata(&info, resource, state)?;
            state.stack_mut().current_mut().phase = StructuralPhase::PreValueMetadataWritten;
            if state.should_flush() {
                return Ok(Self::suspend(&info, state));
            }
        }

        if state.stack().current().phase == StructuralPhase::PreValueMetadataWritten {
            if !Self::write_properties(&info, resource, state)? {
                return Ok(Self::suspend(&info, state));
            }
            state.stack_mut().current_mut().phase = StructuralPhase::PropertiesWritten;
            if state.should_flush() {
                return Ok(Self::suspend(&info, state));
            }
        }

        if state.stack().current().phase == StructuralPhase::PropertiesWritten {
            if let Some(annotations) = &info.post_value_annotations {
                annotations.write(resource, None, state)?;
            }
            state.stack_mut().current_mut().phase = StructuralPhase::PostValueMetadataWritten;
            if state.should_flush() {
                return Ok(Self::suspend(&info, state));
            }
        }

        state.writer_mut().end_object()?;
        state.stack_mut().current_mut().phase = StructuralPhase::EndToken;
        if let Some(on_serialized) = &info.on_serialized {
            on_serialized(resource);
        }
        state.stack_mut().pop(true);
        Ok(true)
    }

    fn kind(&self) -> WriterKind {
        WriterKind::Resource
    }
}

impl<T> std::fmt::Debug for ResourceWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceWriter")
            .field("info", &self.info)
            .finish()
    }
}
