//! JSON writer over an in-memory output buffer which also permits raw writes

use std::io::Write;

use super::*;

/// JSON writer which writes into an in-memory buffer and allows writing member values directly
/// to that buffer
///
/// Values such as large binary streams do not have to go through the token writer; they can be
/// written (for example base64 encoded) directly to the output buffer with
/// [`write_raw`](Self::write_raw), right after a member name has been written. The sink keeps
/// track of such writes and emits the `,` separator before the next member name.
///
/// Writing to the output buffer in between tokens means the wrapped [`JsonStreamWriter`]
/// cannot track the document structure anymore, therefore it is created with
/// [`WriterSettings::skip_validation`] enabled. Callers must produce a well-formed document.
///
/// # Examples
/// ```
/// # use odata_resource_writer::writer::*;
/// let mut sink = SinkWriter::new(WriterSettings::default());
/// sink.begin_object()?;
/// sink.name("a")?;
/// sink.number_value(1)?;
/// sink.name("raw")?;
/// assert!(sink.can_bypass());
/// sink.write_raw(|out| {
///     out.extend_from_slice(b"\"abc\"");
///     Ok(())
/// })?;
/// sink.name("b")?;
/// sink.null_value()?;
/// sink.end_object()?;
///
/// assert_eq!(sink.take_output()?, br#"{"a":1,"raw":"abc","b":null}"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SinkWriter {
    writer: JsonStreamWriter<Vec<u8>>,
    /// Whether the last member value was written directly to the output buffer; the
    /// next member name then has to be preceded by a separator
    bypassed_last_write: bool,
}

impl SinkWriter {
    /// Creates a sink writer
    ///
    /// [`skip_validation`](WriterSettings::skip_validation) of the given settings is ignored
    /// and always enabled.
    pub fn new(writer_settings: WriterSettings) -> Self {
        SinkWriter {
            writer: JsonStreamWriter::new_custom(
                Vec::new(),
                WriterSettings {
                    skip_validation: true,
                    ..writer_settings
                },
            ),
            bypassed_last_write: false,
        }
    }

    fn write_pending_separator(&mut self) -> Result<(), IoError> {
        if self.bypassed_last_write {
            self.writer.flush_buffer()?;
            self.writer.get_mut().push(b',');
            self.bypassed_last_write = false;
        }
        Ok(())
    }

    /// Whether a member value may currently be written with [`write_raw`](Self::write_raw)
    ///
    /// This is only the case directly after a member name has been written. Array elements
    /// and top-level values always have to be written through the token writer.
    pub fn can_bypass(&self) -> bool {
        !self.bypassed_last_write && self.writer.is_after_member_name()
    }

    /// Writes a member value directly to the output buffer
    ///
    /// Pending token writer data is moved to the output buffer first. `f` must append exactly
    /// one complete JSON value.
    ///
    /// # Panics
    /// Panics if [`can_bypass`](Self::can_bypass) is false.
    pub fn write_raw<R, F>(&mut self, f: F) -> Result<R, IoError>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<R, IoError>,
    {
        if !self.can_bypass() {
            panic!("Incorrect writer usage: Cannot write raw value when member value is not expected");
        }
        self.writer.flush_buffer()?;
        let result = f(self.writer.get_mut())?;
        self.signal_bypassed_write();
        Ok(result)
    }

    /// Records that a member value was written directly to the output buffer
    ///
    /// Only needed when the output buffer was written to without [`write_raw`](Self::write_raw).
    pub fn signal_bypassed_write(&mut self) {
        self.bypassed_last_write = true;
    }

    /// Writes a member whose value is a string
    pub fn string_property(&mut self, name: &str, value: &str) -> Result<(), IoError> {
        self.name(name)?;
        self.string_value(value)
    }

    /// Writes a member name which has been escaped before
    pub fn encoded_name(&mut self, name: &EncodedName) -> Result<(), IoError> {
        self.write_pending_separator()?;
        self.writer.encoded_name(name)
    }

    /// Gets the settings of the token writer
    pub fn writer_settings(&self) -> &WriterSettings {
        self.writer.writer_settings()
    }

    /// Number of written bytes which have not been drained yet
    pub fn bytes_pending(&self) -> usize {
        self.writer.buffered_len() + self.writer.get_ref().len()
    }

    /// Moves all written bytes to `out`
    pub fn drain_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<(), IoError> {
        self.writer.flush_buffer()?;
        let output = self.writer.get_mut();
        out.write_all(output)?;
        output.clear();
        Ok(())
    }

    /// Takes all written bytes, leaving the output buffer empty
    pub fn take_output(&mut self) -> Result<Vec<u8>, IoError> {
        self.writer.flush_buffer()?;
        Ok(std::mem::take(self.writer.get_mut()))
    }
}

impl JsonWriter for SinkWriter {
    fn begin_object(&mut self) -> Result<(), IoError> {
        self.bypassed_last_write = false;
        self.writer.begin_object()
    }

    fn end_object(&mut self) -> Result<(), IoError> {
        self.bypassed_last_write = false;
        self.writer.end_object()
    }

    fn begin_array(&mut self) -> Result<(), IoError> {
        self.bypassed_last_write = false;
        self.writer.begin_array()
    }

    fn end_array(&mut self) -> Result<(), IoError> {
        self.bypassed_last_write = false;
        self.writer.end_array()
    }

    fn name(&mut self, name: &str) -> Result<(), IoError> {
        self.write_pending_separator()?;
        self.writer.name(name)
    }

    fn null_value(&mut self) -> Result<(), IoError> {
        self.writer.null_value()
    }

    fn bool_value(&mut self, value: bool) -> Result<(), IoError> {
        self.writer.bool_value(value)
    }

    fn string_value(&mut self, value: &str) -> Result<(), IoError> {
        self.writer.string_value(value)
    }

    fn number_value_from_string(&mut self, value: &str) -> Result<(), JsonNumberError> {
        self.writer.number_value_from_string(value)
    }

    fn number_value<N: FiniteNumber>(&mut self, value: N) -> Result<(), IoError> {
        self.writer.number_value(value)
    }

    fn fp_number_value<N: FloatingPointNumber>(&mut self, value: N) -> Result<(), JsonNumberError> {
        self.writer.fp_number_value(value)
    }
}

impl std::fmt::Debug for SinkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkWriter")
            .field("writer", &self.writer)
            .field("bypassed_last_write", &self.bypassed_last_write)
            .finish()
    }
}
