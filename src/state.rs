//! Per-document write state

use std::io::Write;
use std::sync::Arc;

use crate::error::WriteError;
use crate::model::SelectExpandClause;
use crate::provider::{Writable, WriterProvider};
use crate::stack::WriteStack;
use crate::writer::{JsonWriter, SinkWriter, WriterSettings};

/// Default number of pending output bytes at which writers suspend
pub const DEFAULT_FLUSH_THRESHOLD: usize = 16 * 1024;

/// Settings for writing one document
///
/// To avoid repeating the default values for unchanged settings `..Default::default()` can
/// be used:
/// ```
/// # use odata_resource_writer::state::WriteOptions;
/// WriteOptions {
///     context_url: Some("https://example.com/$metadata#Customers/$entity".to_owned()),
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct WriteOptions {
    /// Value of the `@odata.context` annotation of the top-level resource
    pub context_url: Option<String>,
    /// Select / expand clause for the top-level value
    pub select_expand: Option<Arc<SelectExpandClause>>,
    /// Number of pending output bytes at which writers suspend, when no other
    /// [`FlushPolicy`] is set
    pub flush_threshold: usize,
    /// Settings of the JSON token writer
    pub writer_settings: WriterSettings,
}

impl Default for WriteOptions {
    /// Creates the default options
    ///
    /// - context URL: none
    /// - select / expand: none (all properties are written)
    /// - flush threshold: [`DEFAULT_FLUSH_THRESHOLD`]
    /// - writer settings: [`WriterSettings::default()`]
    fn default() -> Self {
        WriteOptions {
            context_url: None,
            select_expand: None,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            writer_settings: WriterSettings::default(),
        }
    }
}

/// Decides at every checkpoint whether writing should suspend so the output can be drained
pub trait FlushPolicy {
    /// Whether to suspend, given the number of output bytes not drained yet
    fn should_flush(&mut self, bytes_pending: usize) -> bool;
}

/// Suspends once the number of pending bytes reaches the threshold
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FlushThreshold(pub usize);

impl FlushPolicy for FlushThreshold {
    fn should_flush(&mut self, bytes_pending: usize) -> bool {
        bytes_pending >= self.0
    }
}

impl<F: FnMut(usize) -> bool> FlushPolicy for F {
    fn should_flush(&mut self, bytes_pending: usize) -> bool {
        self(bytes_pending)
    }
}

/// State of writing one document
///
/// Holds the output buffer and the progress of all values being written. After a writer
/// suspended, the same state has to be passed to the next call.
pub struct WriteState {
    pub(crate) writer: SinkWriter,
    pub(crate) stack: WriteStack,
    pub(crate) provider: Arc<WriterProvider>,
    pub(crate) options: WriteOptions,
    flush_policy: Box<dyn FlushPolicy>,
    /// Select / expand clause to be picked up by the next nested value which starts
    pub(crate) child_select_expand: Option<Arc<SelectExpandClause>>,
}

impl WriteState {
    /// Creates the state for a new document
    pub fn new(provider: Arc<WriterProvider>, options: WriteOptions) -> Self {
        WriteState {
            writer: SinkWriter::new(options.writer_settings.clone()),
            stack: WriteStack::new(),
            flush_policy: Box::new(FlushThreshold(options.flush_threshold)),
            provider,
            options,
            child_select_expand: None,
        }
    }

    /// Replaces the flush policy
    pub fn with_flush_policy(mut self, policy: impl FlushPolicy + 'static) -> Self {
        self.flush_policy = Box::new(policy);
        self
    }

    /// Whether writers should suspend now
    pub fn should_flush(&mut self) -> bool {
        let pending = self.writer.bytes_pending();
        self.flush_policy.should_flush(pending)
    }

    /// Gets the JSON writer
    pub fn writer_mut(&mut self) -> &mut SinkWriter {
        &mut self.writer
    }

    /// Gets the progress stack
    pub fn stack(&self) -> &WriteStack {
        &self.stack
    }

    /// Gets the progress stack for modification
    pub fn stack_mut(&mut self) -> &mut WriteStack {
        &mut self.stack
    }

    /// Gets the provider used for resolving writers
    pub fn provider(&self) -> &Arc<WriterProvider> {
        &self.provider
    }

    /// Gets the options of this document
    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Writes a member with the writer resolved for `V`
    ///
    /// Meant for custom property writing hooks. Returns `Ok(false)` if writing the value
    /// suspended; such hooks cannot be resumed, see
    /// [`ResourceTypeInfo::write_properties`](crate::resource::ResourceTypeInfo::write_properties).
    pub fn write_property<V: Writable>(&mut self, name: &str, value: &V) -> Result<bool, WriteError> {
        let writer = self.provider.get_writer::<V>()?;
        self.writer.name(name)?;
        self.child_select_expand = None;
        writer.write(value, self)
    }

    /// Number of written bytes which have not been drained yet
    pub fn bytes_pending(&self) -> usize {
        self.writer.bytes_pending()
    }

    /// Moves the written bytes to `out`
    pub fn drain_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<(), WriteError> {
        self.writer.drain_to(out)?;
        Ok(())
    }

    /// Takes the written bytes
    pub fn take_output(&mut self) -> Result<Vec<u8>, WriteError> {
        Ok(self.writer.take_output()?)
    }
}

impl std::fmt::Debug for WriteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteState")
            .field("writer", &self.writer)
            .field("stack", &self.stack)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
