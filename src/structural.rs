//! Writers for enums, collections and wrapper types

use std::sync::Arc;

use tracing::trace;

use crate::error::WriteError;
use crate::provider::{TypeShape, ValueWriter, Writable, WriterKind, WriterProvider};
use crate::stack::StructuralPhase;
use crate::state::WriteState;
use crate::writer::JsonWriter;

/// Writes an enum value as the string name of its member
pub(crate) struct EnumWriter<T> {
    name_of: fn(&T) -> &'static str,
}

impl<T> EnumWriter<T> {
    pub(crate) fn new(name_of: fn(&T) -> &'static str) -> Self {
        EnumWriter { name_of }
    }
}

impl<T: Writable> ValueWriter<T> for EnumWriter<T> {
    fn write(&self, value: &T, state: &mut WriteState) -> Result<bool, WriteError> {
        state.writer_mut().string_value((self.name_of)(value))?;
        Ok(true)
    }

    fn kind(&self) -> WriterKind {
        WriterKind::EnumValue
    }
}

/// Writes a `Vec` as JSON array
///
/// The writer occupies its own frame; the child cursor is the index of the next element, so
/// writing can suspend after every element and inside elements which suspend themselves.
pub(crate) struct EnumerableWriter<E> {
    element: Arc<dyn ValueWriter<E>>,
}

impl<E: Writable> EnumerableWriter<E> {
    fn suspend(state: &mut WriteState) -> bool {
        trace!(
            depth = state.stack().depth(),
            index = state.stack().current().child_cursor,
            "suspending collection"
        );
        state.stack_mut().current_mut().is_continuation = true;
        state.stack_mut().pop(false);
        false
    }
}

impl<E: Writable> ValueWriter<Vec<E>> for EnumerableWriter<E> {
    fn write(&self, values: &Vec<E>, state: &mut WriteState) -> Result<bool, WriteError> {
        state.stack_mut().push();
        state.stack_mut().current_mut().is_continuation = false;

        if state.stack().current().phase == StructuralPhase::NotStarted {
            let clause = if state.stack().is_top_level() {
                state.options().select_expand.clone()
            } else {
                state.child_select_expand.take()
            };
            state.writer_mut().begin_array()?;
            let frame = state.stack_mut().current_mut();
            frame.select_expand = clause;
            frame.phase = StructuralPhase::StartToken;
        }

        let mut index = state.stack().current().child_cursor;
        while let Some(value) = values.get(index) {
            state.child_select_expand = state.stack().current().select_expand.clone();
            if !self.element.write(value, state)? {
                return Ok(Self::suspend(state));
            }
            index += 1;
            state.stack_mut().current_mut().child_cursor = index;
            if state.should_flush() {
                return Ok(Self::suspend(state));
            }
        }

        state.writer_mut().end_array()?;
        state.stack_mut().current_mut().phase = StructuralPhase::EndToken;
        state.stack_mut().pop(true);
        Ok(true)
    }

    fn kind(&self) -> WriterKind {
        WriterKind::Enumerable
    }
}

fn build_enumerable<E: Writable>(
    provider: &WriterProvider,
) -> Result<Arc<dyn ValueWriter<Vec<E>>>, WriteError> {
    Ok(Arc::new(EnumerableWriter {
        element: provider.get_writer::<E>()?,
    }))
}

impl<E: Writable> Writable for Vec<E> {
    fn shape() -> TypeShape<Self> {
        TypeShape::Enumerable(build_enumerable::<E>)
    }
}

/// Writes `None` as `null`
pub(crate) struct NullableWriter<V> {
    inner: Arc<dyn ValueWriter<V>>,
}

impl<V: Writable> ValueWriter<Option<V>> for NullableWriter<V> {
    fn write(&self, value: &Option<V>, state: &mut WriteState) -> Result<bool, WriteError> {
        match value {
            Some(value) => self.inner.write(value, state),
            None => {
                state.writer_mut().null_value()?;
                Ok(true)
            }
        }
    }

    fn kind(&self) -> WriterKind {
        WriterKind::Nullable
    }
}

fn build_nullable<V: Writable>(
    provider: &WriterProvider,
) -> Result<Arc<dyn ValueWriter<Option<V>>>, WriteError> {
    Ok(Arc::new(NullableWriter {
        inner: provider.get_writer::<V>()?,
    }))
}

impl<V: Writable> Writable for Option<V> {
    fn shape() -> TypeShape<Self> {
        TypeShape::Nullable(build_nullable::<V>)
    }
}

/// Writes the value behind a `Box` with the writer of the value type
pub(crate) struct BoxedWriter<V> {
    inner: Arc<dyn ValueWriter<V>>,
}

impl<V: Writable> ValueWriter<Box<V>> for BoxedWriter<V> {
    fn write(&self, value: &Box<V>, state: &mut WriteState) -> Result<bool, WriteError> {
        self.inner.write(value, state)
    }

    fn kind(&self) -> WriterKind {
        self.inner.kind()
    }
}

fn build_boxed<V: Writable>(
    provider: &WriterProvider,
) -> Result<Arc<dyn ValueWriter<Box<V>>>, WriteError> {
    Ok(Arc::new(BoxedWriter {
        inner: provider.get_writer::<V>()?,
    }))
}

impl<V: Writable> Writable for Box<V> {
    fn shape() -> TypeShape<Self> {
        TypeShape::Boxed(build_boxed::<V>)
    }
}
