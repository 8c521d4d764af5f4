//! Resolution and caching of value writers
//!
//! A [`WriterProvider`] hands out a [`ValueWriter`] for every [`Writable`] type. Writers are
//! built on first use and cached per type; the provider is meant to be shared (as
//! `Arc<WriterProvider>`) by all documents written with the same configuration.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::error::WriteError;
use crate::model::{reflect_resource_type, EdmModel};
use crate::primitive::primitive_writer;
use crate::resource::{PropertyInfo, ResourceTypeInfo, ResourceWriter};
use crate::state::{WriteOptions, WriteState};
use crate::structural::EnumWriter;

/// Writer for values of type `T`
///
/// # Suspension
/// [`write`](Self::write) returns `Ok(false)` when it stopped because the output buffer
/// should be flushed. The caller then drains the output of the [`WriteState`] and calls
/// `write` again with the same value and the same state; the writer continues where it
/// stopped. `Ok(true)` means the value has been written completely.
pub trait ValueWriter<T>: Send + Sync {
    /// Writes the value, or continues writing it after a suspension
    fn write(&self, value: &T, state: &mut WriteState) -> Result<bool, WriteError>;

    /// Kind of this writer
    fn kind(&self) -> WriterKind;
}

/// Kind of a [`ValueWriter`]
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum WriterKind {
    /// `bool`
    Bool,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `f32`
    Single,
    /// `f64`
    Double,
    /// [`Decimal`](crate::primitive::Decimal)
    Decimal,
    /// `String`
    String,
    /// `chrono::NaiveDate`
    Date,
    /// `chrono::NaiveDateTime`
    DateTime,
    /// `chrono::DateTime` with offset or in UTC
    DateTimeOffset,
    /// [`ByteSequence`](crate::primitive::ByteSequence)
    ByteSequence,
    /// `url::Url`
    Uri,
    /// [`StreamedBinary`](crate::primitive::StreamedBinary)
    StreamedBinary,
    /// [`StreamedText`](crate::primitive::StreamedText)
    StreamedText,
    /// [`OpenValue`](crate::value::OpenValue)
    Object,
    /// Enum written as member name
    EnumValue,
    /// Collection written as JSON array
    Enumerable,
    /// `Option`
    Nullable,
    /// Resource written as JSON object
    Resource,
    /// Writer created by a custom [`WriterFactory`]
    Custom,
}

/// Creates the writer for a type with a structural [`TypeShape`]
pub type WriterBuilder<T> = fn(&WriterProvider) -> Result<Arc<dyn ValueWriter<T>>, WriteError>;

/// Structural shape of a [`Writable`] type
///
/// The shape lets the provider build a writer for types which have neither been registered
/// nor are created by a factory.
pub enum TypeShape<T> {
    /// Nothing is known about the type
    Unknown,
    /// Enum, written as the string returned by the function
    Enum(fn(&T) -> &'static str),
    /// Collection
    Enumerable(WriterBuilder<T>),
    /// Optional value
    Nullable(WriterBuilder<T>),
    /// Value behind a pointer
    Boxed(WriterBuilder<T>),
    /// Struct whose fields are listed by the function; a resource writer is derived from the
    /// fields, filtered by the model if the provider has one
    PlainData(fn() -> Vec<PropertyInfo<T>>),
}

/// Type which can be written by a [`WriterProvider`]
///
/// # Examples
/// ```
/// # use odata_resource_writer::provider::*;
/// # use odata_resource_writer::state::WriteOptions;
/// #[derive(Clone, Copy)]
/// enum Color {
///     Red,
///     Green,
/// }
///
/// impl Writable for Color {
///     fn shape() -> TypeShape<Self> {
///         TypeShape::Enum(|color| match color {
///             Color::Red => "Red",
///             Color::Green => "Green",
///         })
///     }
/// }
///
/// let provider = WriterProvider::builder().build();
/// let writer = provider.get_writer::<Color>()?;
/// assert_eq!(writer.kind(), WriterKind::EnumValue);
///
/// let mut out = Vec::new();
/// provider.write_document(&vec![Color::Green, Color::Red], &mut out, WriteOptions::default())?;
/// assert_eq!(out, br#"["Green","Red"]"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Writable: Sized + 'static {
    /// Gets the structural shape of this type
    fn shape() -> TypeShape<Self> {
        TypeShape::Unknown
    }
}

/// Type-erased `Arc<dyn ValueWriter<V>>`
pub struct ErasedWriter {
    type_id: TypeId,
    writer: Box<dyn Any + Send + Sync>,
}

impl ErasedWriter {
    /// Erases the type of a writer for `V`
    pub fn new<V: Writable>(writer: Arc<dyn ValueWriter<V>>) -> Self {
        ErasedWriter {
            type_id: TypeId::of::<V>(),
            writer: Box::new(writer),
        }
    }

    /// Gets the type of the values written by the writer
    pub fn value_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Gets the writer, if it writes values of type `V`
    pub fn downcast<V: Writable>(&self) -> Option<Arc<dyn ValueWriter<V>>> {
        self.writer
            .downcast_ref::<Arc<dyn ValueWriter<V>>>()
            .map(Arc::clone)
    }
}

impl Debug for ErasedWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedWriter")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// Pluggable creator of writers
///
/// Factories are consulted for types which are neither primitive nor have an enum or
/// collection [`TypeShape`]; the first factory returning `Some` wins.
pub trait WriterFactory: Send + Sync {
    /// Creates the writer for the type, or returns `None` if the type is not supported
    ///
    /// The returned writer must write values of the type identified by `type_id`.
    fn create(
        &self,
        type_id: TypeId,
        provider: &WriterProvider,
    ) -> Option<Result<ErasedWriter, WriteError>>;
}

/// Resolves and caches [`ValueWriter`]s
///
/// For a type without cached writer the writer is built by the first matching strategy:
/// 1. built-in writer for the primitive types
/// 2. writer for the [`TypeShape`] `Enum`, `Enumerable`, `Nullable` or `Boxed`
/// 3. registered [`WriterFactory`]s, in registration order
/// 4. resource writer for registered [`ResourceTypeInfo`]
/// 5. resource writer derived from the `PlainData` shape and the model
///
/// If no strategy applies [`WriteError::NoWriterAvailable`] is returned.
///
/// The provider can be used from multiple threads. When multiple threads build the writer for
/// the same type concurrently, the first cached writer is used by all of them.
pub struct WriterProvider {
    cache: RwLock<HashMap<TypeId, ErasedWriter>>,
    /// `Arc<ResourceTypeInfo<T>>` by `TypeId` of `T`
    registered: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    factories: Vec<Box<dyn WriterFactory>>,
    model: Option<Arc<dyn EdmModel>>,
}

impl WriterProvider {
    /// Creates a builder for a provider
    pub fn builder() -> WriterProviderBuilder {
        WriterProviderBuilder::default()
    }

    /// Gets the model of this provider
    pub fn model(&self) -> Option<&dyn EdmModel> {
        self.model.as_deref()
    }

    /// Gets the writer for `V`, building and caching it on first use
    ///
    /// # Errors
    /// Returns [`WriteError::NoWriterAvailable`] if no writer can be built for `V`, or the
    /// error of the strategy which failed to build it. Failures are not cached.
    pub fn get_writer<V: Writable>(&self) -> Result<Arc<dyn ValueWriter<V>>, WriteError> {
        let type_id = TypeId::of::<V>();
        if let Some(writer) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .and_then(ErasedWriter::downcast::<V>)
        {
            return Ok(writer);
        }

        // Lock is not held while building; builders resolve writers of nested types
        let writer = self.build_writer::<V>()?;
        debug!(
            type_name = type_name::<V>(),
            kind = %writer.kind(),
            "built value writer"
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = cache.get(&type_id).and_then(ErasedWriter::downcast::<V>) {
            return Ok(existing);
        }
        cache.insert(type_id, ErasedWriter::new(Arc::clone(&writer)));
        Ok(writer)
    }

    fn build_writer<V: Writable>(&self) -> Result<Arc<dyn ValueWriter<V>>, WriteError> {
        let type_id = TypeId::of::<V>();
        if let Some(writer) = primitive_writer(type_id).and_then(|w| w.downcast::<V>()) {
            return Ok(writer);
        }

        let shape = V::shape();
        match shape {
            TypeShape::Enum(name_of) => return Ok(Arc::new(EnumWriter::new(name_of))),
            TypeShape::Enumerable(build) | TypeShape::Nullable(build) | TypeShape::Boxed(build) => {
                return build(self)
            }
            TypeShape::Unknown | TypeShape::PlainData(_) => {}
        }

        for factory in &self.factories {
            if let Some(result) = factory.create(type_id, self) {
                return match result?.downcast::<V>() {
                    Some(writer) => Ok(writer),
                    None => panic!(
                        "Incorrect factory: Created writer does not write values of type {}",
                        type_name::<V>()
                    ),
                };
            }
        }

        if let Some(info) = self
            .registered
            .get(&type_id)
            .and_then(|info| info.downcast_ref::<Arc<ResourceTypeInfo<V>>>())
        {
            return Ok(Arc::new(ResourceWriter::new(Arc::clone(info))));
        }

        if let TypeShape::PlainData(fields) = shape {
            let info = reflect_resource_type(fields(), self.model())?;
            return Ok(Arc::new(ResourceWriter::new(Arc::new(info))));
        }

        Err(WriteError::NoWriterAvailable {
            type_name: type_name::<V>(),
        })
    }

    /// Number of writers in the cache
    pub fn cached_writer_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Writes a complete document to `out`
    ///
    /// Whenever the writer suspends, the buffered output is drained to `out` and writing is
    /// resumed, until the value has been written completely. `out` is flushed at the end.
    ///
    /// # Examples
    /// ```
    /// # use odata_resource_writer::provider::WriterProvider;
    /// # use odata_resource_writer::state::WriteOptions;
    /// let provider = WriterProvider::builder().build();
    /// let mut out = Vec::new();
    /// provider.write_document(&vec![1, 2, 3], &mut out, WriteOptions::default())?;
    /// assert_eq!(out, b"[1,2,3]");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn write_document<V: Writable, W: Write + ?Sized>(
        self: &Arc<Self>,
        value: &V,
        out: &mut W,
        options: WriteOptions,
    ) -> Result<(), WriteError> {
        let writer = self.get_writer::<V>()?;
        let mut state = WriteState::new(Arc::clone(self), options);

        let mut drain_count = 0_usize;
        while !writer.write(value, &mut state)? {
            drain_count += 1;
            trace!(
                drain_count,
                bytes = state.bytes_pending(),
                "draining output of suspended write"
            );
            state.drain_to(out)?;
        }
        state.drain_to(out)?;
        out.flush()?;
        Ok(())
    }
}

impl Debug for WriterProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterProvider")
            .field("cached_writers", &self.cached_writer_count())
            .field("registered_types", &self.registered.len())
            .field("factories", &self.factories.len())
            .field("has_model", &self.model.is_some())
            .finish()
    }
}

/// Builder for [`WriterProvider`]
#[derive(Default)]
pub struct WriterProviderBuilder {
    registered: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    factories: Vec<Box<dyn WriterFactory>>,
    model: Option<Arc<dyn EdmModel>>,
}

impl WriterProviderBuilder {
    /// Sets the model used for deriving resource writers of `PlainData` types
    pub fn model(mut self, model: Arc<dyn EdmModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Registers the resource metadata for `T`
    ///
    /// Registering metadata for the same type again replaces the previous metadata.
    pub fn register<T: Writable>(mut self, info: ResourceTypeInfo<T>) -> Self {
        self.registered
            .insert(TypeId::of::<T>(), Box::new(Arc::new(info)));
        self
    }

    /// Adds a writer factory
    pub fn factory(mut self, factory: impl WriterFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    /// Builds the provider
    pub fn build(self) -> Arc<WriterProvider> {
        Arc::new(WriterProvider {
            cache: RwLock::new(HashMap::new()),
            registered: self.registered,
            factories: self.factories,
            model: self.model,
        })
    }
}

impl Debug for WriterProviderBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterProviderBuilder")
            .field("registered_types", &self.registered.len())
            .field("factories", &self.factories.len())
            .finish_non_exhaustive()
    }
}
