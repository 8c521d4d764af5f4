//! Read-only model metadata and query options
//!
//! The writer only needs a few questions answered by the model: which model type a Rust type
//! maps to, whether a property exists on that type, and which properties form the key. The
//! [`EdmModel`] trait covers exactly these; [`InMemoryModel`] is a simple implementation.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::WriteError;
use crate::provider::Writable;
use crate::resource::{PropertyInfo, ResourceTypeInfo};

/// Kind of a model property
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum EdmPropertyKind {
    /// Primitive, enum, complex or collection valued property
    Structural,
    /// Navigation property; only written if expanded when a select / expand clause is used
    Navigation,
}

/// Model collaborator consulted when deriving resource writers
pub trait EdmModel: Send + Sync {
    /// Resolves the fully qualified model type name for a Rust type name as returned by
    /// [`std::any::type_name`]
    fn resolve_type(&self, rust_type_name: &str) -> Option<&str>;

    /// Finds a property of a model type
    fn find_property(&self, type_name: &str, property: &str) -> Option<EdmPropertyKind>;

    /// Gets the names of the key properties of a model type
    fn key_properties(&self, type_name: &str) -> Vec<String>;
}

/// Structured model type definition for [`InMemoryModel`]
#[derive(Clone, Debug)]
pub struct EdmStructuredType {
    name: String,
    keys: Vec<String>,
    properties: IndexMap<String, EdmPropertyKind>,
}

impl EdmStructuredType {
    /// Creates a type with the fully qualified name, for example `Sales.Customer`
    pub fn new(name: impl Into<String>) -> Self {
        EdmStructuredType {
            name: name.into(),
            keys: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    /// Adds a key property
    pub fn key(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.properties
            .insert(name.clone(), EdmPropertyKind::Structural);
        self.keys.push(name);
        self
    }

    /// Adds a structural property
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.properties
            .insert(name.into(), EdmPropertyKind::Structural);
        self
    }

    /// Adds a navigation property
    pub fn navigation_property(mut self, name: impl Into<String>) -> Self {
        self.properties
            .insert(name.into(), EdmPropertyKind::Navigation);
        self
    }
}

/// [`EdmModel`] backed by type definitions held in memory
///
/// # Examples
/// ```
/// # use odata_resource_writer::model::*;
/// struct Customer;
///
/// let model = InMemoryModel::builder()
///     .structured_type(
///         EdmStructuredType::new("Sales.Customer")
///             .key("Id")
///             .property("Name")
///             .navigation_property("Orders"),
///     )
///     .map_type::<Customer>("Sales.Customer")
///     .build();
///
/// let type_name = model.resolve_type(std::any::type_name::<Customer>());
/// assert_eq!(type_name, Some("Sales.Customer"));
/// assert_eq!(model.find_property("Sales.Customer", "Orders"), Some(EdmPropertyKind::Navigation));
/// assert_eq!(model.key_properties("Sales.Customer"), vec!["Id".to_owned()]);
/// # let _ = Customer;
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryModel {
    types: HashMap<String, EdmStructuredType>,
    /// Rust type name -> model type name
    type_mappings: HashMap<String, String>,
}

impl InMemoryModel {
    /// Creates a builder for a model
    pub fn builder() -> InMemoryModelBuilder {
        InMemoryModelBuilder {
            model: InMemoryModel::default(),
        }
    }
}

impl EdmModel for InMemoryModel {
    fn resolve_type(&self, rust_type_name: &str) -> Option<&str> {
        self.type_mappings.get(rust_type_name).map(String::as_str)
    }

    fn find_property(&self, type_name: &str, property: &str) -> Option<EdmPropertyKind> {
        self.types
            .get(type_name)
            .and_then(|t| t.properties.get(property))
            .copied()
    }

    fn key_properties(&self, type_name: &str) -> Vec<String> {
        self.types
            .get(type_name)
            .map(|t| t.keys.clone())
            .unwrap_or_default()
    }
}

/// Builder for [`InMemoryModel`]
#[derive(Debug)]
pub struct InMemoryModelBuilder {
    model: InMemoryModel,
}

impl InMemoryModelBuilder {
    /// Adds a structured type definition
    pub fn structured_type(mut self, structured_type: EdmStructuredType) -> Self {
        self.model
            .types
            .insert(structured_type.name.clone(), structured_type);
        self
    }

    /// Maps the Rust type `T` to a model type
    pub fn map_type<T: ?Sized>(mut self, model_type: impl Into<String>) -> Self {
        self.model
            .type_mappings
            .insert(type_name::<T>().to_owned(), model_type.into());
        self
    }

    /// Builds the model
    pub fn build(self) -> InMemoryModel {
        self.model
    }
}

/// Query option restricting and extending the properties written for a resource
///
/// Without explicit selection all properties are selected. Expanded navigation properties
/// are implicitly selected and carry the clause for the nested resources.
///
/// # Examples
/// ```
/// # use odata_resource_writer::model::SelectExpandClause;
/// let clause = SelectExpandClause::select(["Name"])
///     .expand("Orders", SelectExpandClause::select(["Total"]));
///
/// assert!(clause.is_selected("Name"));
/// assert!(clause.is_selected("Orders"));
/// assert!(!clause.is_selected("City"));
/// assert!(clause.expanded("Orders").unwrap().is_selected("Total"));
/// ```
#[derive(Clone, PartialEq, Default, Debug)]
pub struct SelectExpandClause {
    /// `None` if all properties are selected
    selected: Option<Vec<String>>,
    expanded: IndexMap<String, Arc<SelectExpandClause>>,
}

impl SelectExpandClause {
    /// Creates a clause selecting all properties and expanding nothing
    pub fn all() -> Self {
        SelectExpandClause::default()
    }

    /// Creates a clause selecting only the given properties
    pub fn select<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SelectExpandClause {
            selected: Some(names.into_iter().map(Into::into).collect()),
            expanded: IndexMap::new(),
        }
    }

    /// Expands a navigation property, applying `clause` to the nested resources
    pub fn expand(mut self, name: impl Into<String>, clause: SelectExpandClause) -> Self {
        self.expanded.insert(name.into(), Arc::new(clause));
        self
    }

    /// Whether the property is requested
    pub fn is_selected(&self, name: &str) -> bool {
        match &self.selected {
            None => true,
            Some(selected) => {
                selected.iter().any(|s| s == name) || self.expanded.contains_key(name)
            }
        }
    }

    /// Gets the clause for the nested resources of an expanded navigation property
    pub fn expanded(&self, name: &str) -> Option<&Arc<SelectExpandClause>> {
        self.expanded.get(name)
    }
}

/// Derives resource metadata for a plain data type from its declared fields
///
/// Without model all fields are kept. With model the Rust type has to map to a model type;
/// fields unknown to the model type are dropped and key properties are always written.
pub(crate) fn reflect_resource_type<T: Writable>(
    fields: Vec<PropertyInfo<T>>,
    model: Option<&dyn EdmModel>,
) -> Result<ResourceTypeInfo<T>, WriteError> {
    let rust_type_name = type_name::<T>();
    let model = match model {
        None => {
            let info = fields
                .into_iter()
                .fold(ResourceTypeInfo::new(rust_type_name), |info, field| {
                    info.property_with(field)
                });
            return Ok(info);
        }
        Some(model) => model,
    };

    let model_type = model
        .resolve_type(rust_type_name)
        .ok_or_else(|| WriteError::ReflectionFailed {
            type_name: rust_type_name,
            reason: "type is not part of the model".to_owned(),
        })?;

    let keys = model.key_properties(model_type);
    if let Some(missing) = keys
        .iter()
        .find(|key| !fields.iter().any(|f| f.name() == key.as_str()))
    {
        return Err(WriteError::ReflectionFailed {
            type_name: rust_type_name,
            reason: format!("key property '{missing}' of '{model_type}' is not a field"),
        });
    }

    let mut info = ResourceTypeInfo::new(model_type);
    for field in fields {
        let kind = match model.find_property(model_type, field.name()) {
            Some(kind) => kind,
            None => continue,
        };
        let is_key = keys.iter().any(|key| key.as_str() == field.name());
        info = info.property_with(
            field
                .key(is_key)
                .navigation(kind == EdmPropertyKind::Navigation),
        );
    }
    Ok(info)
}
