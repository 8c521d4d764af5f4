use crate::annotation::AnnotationSource;
use crate::error::WriteError;
use crate::provider::Writable;
use crate::state::WriteState;
use crate::value::Annotations;

use super::PropertyInfo;

type DynamicProperties<T> = dyn for<'a> Fn(&'a T) -> Option<&'a Annotations> + Send + Sync;
type StringAccessor<T> = dyn Fn(&T) -> Option<String> + Send + Sync;
type Hook<T> = dyn Fn(&T) + Send + Sync;
type PropertySelector<T> = dyn Fn(&T) -> Vec<String> + Send + Sync;
type WritePropertiesHook<T> =
    dyn Fn(&T, &mut WriteState) -> Result<bool, WriteError> + Send + Sync;

/// Writer metadata of a resource type
///
/// Properties are produced by exactly one of the following, in order of priority:
/// 1. the [property selector](Self::property_selector), writing the selected declared
///    properties in the returned order
/// 2. the [custom `write_properties` hook](Self::write_properties)
/// 3. the declared properties in declaration order, skipping properties per select clause
///    and skip predicate, followed by the [dynamic properties](Self::dynamic_properties)
///
/// # Examples
/// ```
/// # use odata_resource_writer::resource::ResourceTypeInfo;
/// struct Customer {
///     id: i32,
///     name: String,
///     etag: String,
/// }
///
/// let info = ResourceTypeInfo::<Customer>::new("Sales.Customer")
///     .property("Id", |c| &c.id)
///     .property("Name", |c| &c.name)
///     .id(|c| Some(format!("Customers({})", c.id)))
///     .etag(|c| Some(c.etag.clone()));
///
/// assert_eq!(info.type_name(), "Sales.Customer");
/// assert_eq!(info.find_property("Name").map(|p| p.index()), Some(1));
/// # let _ = Customer { id: 1, name: String::new(), etag: String::new() };
/// ```
pub struct ResourceTypeInfo<T> {
    type_name: String,
    pub(crate) properties: Vec<PropertyInfo<T>>,
    pub(crate) dynamic_properties: Option<Box<DynamicProperties<T>>>,
    pub(crate) id: Option<Box<StringAccessor<T>>>,
    pub(crate) etag: Option<Box<StringAccessor<T>>>,
    pub(crate) pre_value_annotations: Option<AnnotationSource<T>>,
    pub(crate) post_value_annotations: Option<AnnotationSource<T>>,
    pub(crate) on_serializing: Option<Box<Hook<T>>>,
    pub(crate) on_serialized: Option<Box<Hook<T>>>,
    pub(crate) property_selector: Option<Box<PropertySelector<T>>>,
    pub(crate) write_properties: Option<Box<WritePropertiesHook<T>>>,
}

impl<T: 'static> ResourceTypeInfo<T> {
    /// Adds a declared property whose value is obtained with `getter`
    pub fn property<V, F>(self, name: &str, getter: F) -> Self
    where
        V: Writable,
        F: for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
    {
        self.property_with(PropertyInfo::new(name, getter))
    }
}

impl<T> ResourceTypeInfo<T> {
    /// Creates metadata without properties
    pub fn new(type_name: impl Into<String>) -> Self {
        ResourceTypeInfo {
            type_name: type_name.into(),
            properties: Vec::new(),
            dynamic_properties: None,
            id: None,
            etag: None,
            pre_value_annotations: None,
            post_value_annotations: None,
            on_serializing: None,
            on_serialized: None,
            property_selector: None,
            write_properties: None,
        }
    }

    /// Adds a declared property
    pub fn property_with(mut self, mut property: PropertyInfo<T>) -> Self {
        property.index = self.properties.len();
        self.properties.push(property);
        self
    }

    /// Sets the accessor for open properties, written after the declared properties
    pub fn dynamic_properties<F>(mut self, get: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> Option<&'a Annotations> + Send + Sync + 'static,
    {
        self.dynamic_properties = Some(Box::new(get));
        self
    }

    /// Sets the accessor for the `@odata.id` annotation
    pub fn id<F>(mut self, get: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.id = Some(Box::new(get));
        self
    }

    /// Sets the accessor for the `@odata.etag` annotation
    pub fn etag<F>(mut self, get: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.etag = Some(Box::new(get));
        self
    }

    /// Sets the annotations written before the properties
    pub fn pre_value_annotations(mut self, annotations: AnnotationSource<T>) -> Self {
        self.pre_value_annotations = Some(annotations);
        self
    }

    /// Sets the annotations written after the properties
    pub fn post_value_annotations(mut self, annotations: AnnotationSource<T>) -> Self {
        self.post_value_annotations = Some(annotations);
        self
    }

    /// Sets the hook called once before a resource is written
    pub fn on_serializing<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_serializing = Some(Box::new(hook));
        self
    }

    /// Sets the hook called once after a resource has been written completely
    pub fn on_serialized<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_serialized = Some(Box::new(hook));
        self
    }

    /// Sets the selector choosing which declared properties are written, and in which order
    ///
    /// The selector is called once per resource. Select clause, skip predicates and dynamic
    /// properties do not apply. Returning a name which is not a declared property makes the
    /// write fail with [`WriteError::UnknownProperty`].
    pub fn property_selector<F>(mut self, selector: F) -> Self
    where
        F: Fn(&T) -> Vec<String> + Send + Sync + 'static,
    {
        self.property_selector = Some(Box::new(selector));
        self
    }

    /// Sets a hook writing all properties of a resource
    ///
    /// The hook returns whether it completed. Such hooks cannot be suspended: if the hook
    /// returns `false` the write fails with [`WriteError::UnsupportedSuspension`].
    /// [`WriteState::write_property`] can be used to write the members.
    pub fn write_properties<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T, &mut WriteState) -> Result<bool, WriteError> + Send + Sync + 'static,
    {
        self.write_properties = Some(Box::new(hook));
        self
    }

    /// Gets the name of the type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Gets the declared properties
    pub fn properties(&self) -> &[PropertyInfo<T>] {
        &self.properties
    }

    /// Finds a declared property by name
    pub fn find_property(&self, name: &str) -> Option<&PropertyInfo<T>> {
        self.properties.iter().find(|p| p.name() == name)
    }
}

impl<T> std::fmt::Debug for ResourceTypeInfo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTypeInfo")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties)
            .field("has_dynamic_properties", &self.dynamic_properties.is_some())
            .field("has_property_selector", &self.property_selector.is_some())
            .field("has_write_properties", &self.write_properties.is_some())
            .finish_non_exhaustive()
    }
}
