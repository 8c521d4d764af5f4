use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::annotation::AnnotationSource;
use crate::error::WriteError;
use crate::provider::{ValueWriter, Writable, WriterProvider};
use crate::state::WriteState;
use crate::writer::EncodedName;

type SkipPredicate<T> = dyn Fn(&T, &WriteState) -> bool + Send + Sync;

/// Value of a property, bound to the writer for its type
trait PropertyValue<T>: Send + Sync {
    fn write_value(&self, resource: &T, state: &mut WriteState) -> Result<bool, WriteError>;
}

struct BoundValue<T, V, F> {
    getter: F,
    /// Resolved on first write, so that metadata of recursive types can be created
    writer: OnceLock<Arc<dyn ValueWriter<V>>>,
    _resource: PhantomData<fn(&T)>,
}

impl<T, V: Writable, F> BoundValue<T, V, F> {
    fn writer(&self, provider: &WriterProvider) -> Result<&Arc<dyn ValueWriter<V>>, WriteError> {
        if let Some(writer) = self.writer.get() {
            return Ok(writer);
        }
        let writer = provider.get_writer::<V>()?;
        Ok(self.writer.get_or_init(|| writer))
    }
}

impl<T, V, F> PropertyValue<T> for BoundValue<T, V, F>
where
    V: Writable,
    F: for<'a> Fn(&'a T) -> &'a V + Send + Sync,
{
    fn write_value(&self, resource: &T, state: &mut WriteState) -> Result<bool, WriteError> {
        let writer = self.writer(state.provider())?;
        writer.write((self.getter)(resource), state)
    }
}

/// Metadata of a declared property of a resource type
///
/// # Examples
/// ```
/// # use odata_resource_writer::resource::PropertyInfo;
/// struct Order {
///     id: i32,
///     note: Option<String>,
/// }
///
/// let id = PropertyInfo::new("Id", |order: &Order| &order.id).key(true);
/// let note = PropertyInfo::new("Note", |order: &Order| &order.note)
///     .skip_if(|order, _state| order.note.is_none());
/// # let _ = (id, note, Order { id: 1, note: None });
/// ```
pub struct PropertyInfo<T> {
    name: EncodedName,
    /// Position within the declared properties of the type
    pub(crate) index: usize,
    value: Box<dyn PropertyValue<T>>,
    skip_if: Option<Box<SkipPredicate<T>>>,
    annotations: Option<AnnotationSource<T>>,
    is_key: bool,
    is_navigation: bool,
}

impl<T: 'static> PropertyInfo<T> {
    /// Creates a property whose value is obtained with `getter`
    pub fn new<V, F>(name: &str, getter: F) -> Self
    where
        V: Writable,
        F: for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
    {
        PropertyInfo {
            name: EncodedName::new(name),
            index: 0,
            value: Box::new(BoundValue {
                getter,
                writer: OnceLock::new(),
                _resource: PhantomData,
            }),
            skip_if: None,
            annotations: None,
            is_key: false,
            is_navigation: false,
        }
    }
}

impl<T> PropertyInfo<T> {
    /// Skips the property whenever `predicate` returns true
    ///
    /// The predicate may be evaluated more than once for the same resource and must not
    /// have side effects.
    pub fn skip_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T, &WriteState) -> bool + Send + Sync + 'static,
    {
        self.skip_if = Some(Box::new(predicate));
        self
    }

    /// Sets the source of the annotations written directly before the property
    pub fn annotations(mut self, annotations: AnnotationSource<T>) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Marks the property as key property; key properties are written regardless of the
    /// select clause
    pub fn key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    /// Marks the property as navigation property; when a select / expand clause applies,
    /// navigation properties are only written if they are expanded
    pub fn navigation(mut self, is_navigation: bool) -> Self {
        self.is_navigation = is_navigation;
        self
    }

    /// Gets the name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Gets the position within the declared properties of the type
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this is a key property
    pub fn is_key(&self) -> bool {
        self.is_key
    }

    /// Whether this is a navigation property
    pub fn is_navigation(&self) -> bool {
        self.is_navigation
    }

    pub(crate) fn should_skip(&self, resource: &T, state: &WriteState) -> bool {
        if let Some(clause) = &state.stack().current().select_expand {
            if !self.is_key {
                let name = self.name();
                if !clause.is_selected(name)
                    || (self.is_navigation && clause.expanded(name).is_none())
                {
                    return true;
                }
            }
        }
        self.skip_if
            .as_ref()
            .is_some_and(|skip_if| skip_if(resource, state))
    }

    /// Writes annotations, name and value; if the value was suspended before, only continues
    /// writing the value
    pub(crate) fn write(&self, resource: &T, state: &mut WriteState) -> Result<bool, WriteError> {
        if state.stack().current().current_property != Some(self.index) {
            if let Some(annotations) = &self.annotations {
                annotations.write(resource, Some(self.name()), state)?;
            }
            state.writer_mut().encoded_name(&self.name)?;

            let child_clause = state
                .stack()
                .current()
                .select_expand
                .as_ref()
                .and_then(|clause| clause.expanded(self.name()))
                .cloned();
            state.stack_mut().current_mut().current_property = Some(self.index);
            state.child_select_expand = child_clause;
        }

        let completed = self.value.write_value(resource, state)?;
        if completed {
            state.stack_mut().current_mut().current_property = None;
        }
        Ok(completed)
    }
}

impl<T> std::fmt::Debug for PropertyInfo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name())
            .field("index", &self.index)
            .field("is_key", &self.is_key)
            .field("is_navigation", &self.is_navigation)
            .field("has_skip_predicate", &self.skip_if.is_some())
            .field("annotations", &self.annotations)
            .finish()
    }
}
