//! Streaming implementation of [`JsonWriter`]

use std::io::Write;

use super::*;

/// Settings to customize the JSON writer behavior
///
/// These settings are used by [`JsonStreamWriter::new_custom`]. To avoid repeating the
/// default values for unchanged settings `..Default::default()` can be used:
/// ```
/// # use odata_resource_writer::writer::WriterSettings;
/// WriterSettings {
///     escape_all_non_ascii: true,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct WriterSettings {
    /// Whether to escape all control characters
    ///
    /// The JSON specification only requires that the Unicode control characters `0x00` to `0x1F`
    /// (inclusive) must be escaped in member names and string values. When this setting
    /// is enabled additionally all Unicode characters for which [`char::is_control`] returns
    /// true will be escaped.
    pub escape_all_control_chars: bool,

    /// Whether to escape all non-ASCII characters
    ///
    /// When enabled all Unicode characters in member names and string values whose code point
    /// is >= `0x80` are written as escape sequence.
    pub escape_all_non_ascii: bool,

    /// Whether to skip validating the structure of the written document
    ///
    /// By default the writer panics when it is used incorrectly, for example when a member
    /// name is written while a member value is expected. When bytes are written to the
    /// underlying writer without going through this JSON writer (see [`SinkWriter`]) the
    /// writer cannot track the document structure anymore; validation has to be skipped then,
    /// and the caller is responsible for producing well-formed JSON.
    pub skip_validation: bool,
}

impl Default for WriterSettings {
    /// Creates the default JSON writer settings
    ///
    /// - escape all control chars: false (= only control characters `0x00` to `0x1F` are escaped)
    /// - escape all non-ASCII: false
    /// - skip validation: false
    fn default() -> Self {
        WriterSettings {
            escape_all_control_chars: false,
            escape_all_non_ascii: false,
            skip_validation: false,
        }
    }
}

#[derive(PartialEq, Debug)]
pub(crate) enum StackValue {
    Array,
    Object,
}

pub(crate) const WRITER_BUF_SIZE: usize = 1024;

/// A member name which has been escaped once and can be written repeatedly
///
/// The escaped form only escapes the characters the JSON specification requires to be
/// escaped, regardless of the [`WriterSettings`] of the writer it is later written with.
///
/// # Examples
/// ```
/// # use odata_resource_writer::writer::*;
/// let name = EncodedName::new("quote\"d");
/// assert_eq!(name.as_str(), "quote\"d");
/// assert_eq!(name.encoded_bytes(), br#""quote\"d":"#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedName {
    name: String,
    /// `"<escaped name>":`
    encoded: Box<[u8]>,
}

impl EncodedName {
    /// Escapes the given member name
    pub fn new(name: &str) -> Self {
        let mut encoded = Vec::with_capacity(name.len() + 3);
        encoded.push(b'"');
        // Writing into a Vec cannot fail
        let _ = write_escaped(name, false, false, |bytes| {
            encoded.extend_from_slice(bytes);
            Ok(())
        });
        encoded.extend_from_slice(b"\":");

        EncodedName {
            name: name.to_owned(),
            encoded: encoded.into_boxed_slice(),
        }
    }

    /// Gets the original, unescaped name
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Gets the encoded bytes, consisting of the quoted escaped name followed by `:`
    pub fn encoded_bytes(&self) -> &[u8] {
        &self.encoded
    }
}

/// A JSON writer implementation which writes data to a [`Write`]
///
/// This writer internally buffers data; the buffer is written to the underlying writer
/// once it is full, when [`flush_buffer`](Self::flush_buffer) is called, or when the
/// document is finished with [`finish_document`](Self::finish_document).
///
/// The data written to the underlying writer will be valid UTF-8 data. No leading byte
/// order mark (BOM) is written.
pub struct JsonStreamWriter<W: Write> {
    writer: W,
    buf: [u8; WRITER_BUF_SIZE],
    /// Index (starting at 0) within [`buf`](Self::buf) where to write next,
    /// respectively how many bytes have already been written to the buffer
    buf_write_pos: usize,
    /// Whether at least one value has been written at top-level
    has_top_level_value: bool,
    /// Whether the next member name or array item has to be preceded by a `,`; true if
    /// the last token was a value or the end of a container
    needs_separator: bool,
    expects_member_name: bool,
    stack: Vec<StackValue>,

    writer_settings: WriterSettings,
}

// Implementation with public constructor and buffer methods
impl<W: Write> JsonStreamWriter<W> {
    /// Creates a JSON writer with [default settings](WriterSettings::default)
    pub fn new(writer: W) -> Self {
        JsonStreamWriter::new_custom(writer, WriterSettings::default())
    }

    /// Creates a JSON writer with custom settings
    pub fn new_custom(writer: W, writer_settings: WriterSettings) -> Self {
        Self {
            writer,
            buf: [0_u8; WRITER_BUF_SIZE],
            buf_write_pos: 0,
            has_top_level_value: false,
            needs_separator: false,
            expects_member_name: false,
            stack: Vec::with_capacity(16),
            writer_settings,
        }
    }

    /// Gets a reference to the underlying writer
    ///
    /// Data still in the internal buffer of this JSON writer has not been written
    /// to the underlying writer yet, see [`flush_buffer`](Self::flush_buffer).
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Gets a mutable reference to the underlying writer
    ///
    /// Writing to the underlying writer directly bypasses the structure tracking of this
    /// JSON writer. Call [`flush_buffer`](Self::flush_buffer) before to preserve the order
    /// of the written data.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Gets the settings of this writer
    pub fn writer_settings(&self) -> &WriterSettings {
        &self.writer_settings
    }

    /// Number of bytes in the internal buffer which have not been written to the
    /// underlying writer yet
    pub fn buffered_len(&self) -> usize {
        self.buf_write_pos
    }

    /// Writes the internal buffer to the underlying writer, without flushing the underlying writer
    pub fn flush_buffer(&mut self) -> Result<(), IoError> {
        // write_all retries on `ErrorKind::Interrupted`, as desired
        self.writer.write_all(&self.buf[0..self.buf_write_pos])?;
        self.buf_write_pos = 0;
        Ok(())
    }

    /// Unwrap the inner writer
    ///
    /// Data still in the internal buffer is discarded; call [`flush_buffer`](Self::flush_buffer)
    /// or [`finish_document`](Self::finish_document) before.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Ensures that the JSON document is complete and flushes the buffer
    ///
    /// # Panics
    /// Panics when validation is enabled and no top-level value has been written, or when
    /// the top-level value is incomplete.
    pub fn finish_document(mut self) -> Result<(), IoError> {
        if !self.writer_settings.skip_validation {
            if !self.stack.is_empty() {
                panic!("Incorrect writer usage: Cannot finish document when top-level value is not finished");
            }
            if !self.has_top_level_value {
                panic!("Incorrect writer usage: Cannot finish document when no value has been written yet");
            }
        }
        self.flush_buffer()?;
        self.writer.flush()
    }
}

// Implementation with low level byte writing methods
impl<W: Write> JsonStreamWriter<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        let mut pos = 0;
        while pos < bytes.len() {
            let copied_count = (self.buf.len() - self.buf_write_pos).min(bytes.len() - pos);
            self.buf[self.buf_write_pos..(self.buf_write_pos + copied_count)]
                .copy_from_slice(&bytes[pos..(pos + copied_count)]);
            self.buf_write_pos += copied_count;
            pos += copied_count;

            if self.buf_write_pos >= self.buf.len() {
                self.flush_buffer()?;
            }
        }

        Ok(())
    }

    fn write_string_value(&mut self, value: &str) -> Result<(), IoError> {
        let escape_all_control_chars = self.writer_settings.escape_all_control_chars;
        let escape_all_non_ascii = self.writer_settings.escape_all_non_ascii;

        self.write_bytes(b"\"")?;
        write_escaped(
            value,
            escape_all_control_chars,
            escape_all_non_ascii,
            |bytes| self.write_bytes(bytes),
        )?;
        self.write_bytes(b"\"")
    }
}

// Implementation with JSON structure state inspection methods, and general value methods
impl<W: Write> JsonStreamWriter<W> {
    fn is_in_array(&self) -> bool {
        self.stack.last() == Some(&StackValue::Array)
    }

    fn is_in_object(&self) -> bool {
        self.stack.last() == Some(&StackValue::Object)
    }

    fn validates(&self) -> bool {
        !self.writer_settings.skip_validation
    }

    /// Whether the last written token was a member name, that is, a member value is
    /// expected next
    pub fn is_after_member_name(&self) -> bool {
        self.is_in_object() && !self.expects_member_name
    }

    fn before_container_element(&mut self) -> Result<(), IoError> {
        if self.needs_separator {
            self.write_bytes(b",")?;
        }
        Ok(())
    }

    fn before_value(&mut self) -> Result<(), IoError> {
        if self.validates() {
            if self.expects_member_name {
                panic!("Incorrect writer usage: Cannot write value when name is expected");
            }
            if self.stack.is_empty() && self.has_top_level_value {
                panic!("Incorrect writer usage: Cannot write multiple top-level values");
            }
        }

        if self.is_in_array() {
            self.before_container_element()?;
        }
        if self.stack.is_empty() {
            self.has_top_level_value = true;
        }
        self.needs_separator = true;

        if self.is_in_object() {
            // After this value a name will be expected
            self.expects_member_name = true;
        }

        Ok(())
    }

    fn on_container_end(&mut self) {
        self.stack.pop();
        // Enclosing container is not empty since this method call here is processing its child
        self.needs_separator = true;
        // If after pop() call above currently in object, then expecting a member name
        self.expects_member_name = self.is_in_object();
    }

    fn before_name(&mut self) -> Result<(), IoError> {
        if self.validates() && !self.expects_member_name {
            panic!("Incorrect writer usage: Cannot write name when name is not expected");
        }
        self.before_container_element()
    }

    fn after_name(&mut self) {
        self.needs_separator = false;
        self.expects_member_name = false;
    }

    /// Writes a member name which has been escaped before
    ///
    /// Behaves the same way as [`name`](JsonWriter::name), except that the name is not
    /// escaped again.
    pub fn encoded_name(&mut self, name: &EncodedName) -> Result<(), IoError> {
        self.before_name()?;
        self.write_bytes(name.encoded_bytes())?;
        self.after_name();
        Ok(())
    }
}

impl<W: Write> JsonWriter for JsonStreamWriter<W> {
    fn begin_object(&mut self) -> Result<(), IoError> {
        self.before_value()?;
        self.stack.push(StackValue::Object);
        self.needs_separator = false;
        self.expects_member_name = true;
        self.write_bytes(b"{")
    }

    fn name(&mut self, name: &str) -> Result<(), IoError> {
        self.before_name()?;
        self.write_string_value(name)?;
        self.write_bytes(b":")?;
        self.after_name();
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), IoError> {
        if self.validates() {
            if !self.is_in_object() {
                panic!("Incorrect writer usage: Cannot end object when not inside object");
            }
            if !self.expects_member_name {
                panic!(
                    "Incorrect writer usage: Cannot end object when member value is expected"
                );
            }
        }
        self.on_container_end();
        self.write_bytes(b"}")
    }

    fn begin_array(&mut self) -> Result<(), IoError> {
        self.before_value()?;
        self.stack.push(StackValue::Array);
        self.needs_separator = false;

        // Clear this because it is only relevant for objects; will be restored when entering parent object (if any) again
        self.expects_member_name = false;

        self.write_bytes(b"[")
    }

    fn end_array(&mut self) -> Result<(), IoError> {
        if self.validates() && !self.is_in_array() {
            panic!("Incorrect writer usage: Cannot end array when not inside array");
        }
        self.on_container_end();
        self.write_bytes(b"]")
    }

    fn string_value(&mut self, value: &str) -> Result<(), IoError> {
        self.before_value()?;
        self.write_string_value(value)
    }

    fn bool_value(&mut self, value: bool) -> Result<(), IoError> {
        self.before_value()?;
        self.write_bytes(if value { b"true" } else { b"false" })
    }

    fn null_value(&mut self) -> Result<(), IoError> {
        self.before_value()?;
        self.write_bytes(b"null")
    }

    fn number_value<N: FiniteNumber>(&mut self, value: N) -> Result<(), IoError> {
        value.use_json_number(|number_str| {
            self.before_value()?;
            self.write_bytes(number_str.as_bytes())
        })
    }

    fn fp_number_value<N: FloatingPointNumber>(&mut self, value: N) -> Result<(), JsonNumberError> {
        value.use_json_number(|number_str| {
            self.before_value()?;
            self.write_bytes(number_str.as_bytes())
        })
    }

    fn number_value_from_string(&mut self, value: &str) -> Result<(), JsonNumberError> {
        if is_valid_json_number(value) {
            self.before_value()?;
            self.write_bytes(value.as_bytes())?;
            Ok(())
        } else {
            Err(JsonNumberError::InvalidNumber(format!(
                "invalid JSON number: {value}"
            )))
        }
    }
}

impl<W: Write> std::fmt::Debug for JsonStreamWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStreamWriter")
            .field("buf_count", &self.buf_write_pos)
            .field("needs_separator", &self.needs_separator)
            .field("expects_member_name", &self.expects_member_name)
            .field("stack", &self.stack)
            .field("writer_settings", &self.writer_settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn numbers() -> TestResult {
        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);

        json_writer.begin_array()?;
        json_writer.number_value(8_u8)?;
        json_writer.number_value(-8_i8)?;
        json_writer.number_value(-32_i32)?;
        json_writer.number_value(64_u64)?;
        json_writer.number_value(-128_i128)?;

        json_writer.fp_number_value(1.5_f32)?;
        json_writer.fp_number_value(-2.5_f64)?;

        json_writer.number_value_from_string("123.45e-12")?;

        json_writer.end_array()?;
        json_writer.finish_document()?;

        assert_eq!(
            "[8,-8,-32,64,-128,1.5,-2.5,123.45e-12]",
            String::from_utf8(writer)?
        );
        Ok(())
    }

    #[test]
    fn numbers_invalid() {
        fn assert_invalid_number(result: Result<(), JsonNumberError>, expected_message: &str) {
            match result {
                Ok(_) => panic!("Should have failed"),
                Err(e) => match e {
                    JsonNumberError::InvalidNumber(message) => {
                        assert_eq!(expected_message, message)
                    }
                    JsonNumberError::IoError(e) => panic!("Unexpected error: {e:?}"),
                },
            }
        }

        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);

        assert_invalid_number(
            json_writer.fp_number_value(f64::INFINITY),
            &format!("non-finite number: {}", f64::INFINITY),
        );
        assert_invalid_number(
            json_writer.number_value_from_string("NaN"),
            "invalid JSON number: NaN",
        );
        assert_invalid_number(
            json_writer.number_value_from_string("00"),
            "invalid JSON number: 00",
        );
    }

    #[test]
    fn objects_and_arrays() -> TestResult {
        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);
        json_writer.begin_object()?;

        json_writer.name("a")?;
        json_writer.number_value(1)?;

        json_writer.name("")?;
        json_writer.begin_array()?;
        json_writer.begin_object()?;
        json_writer.end_object()?;
        json_writer.bool_value(true)?;
        json_writer.null_value()?;
        json_writer.begin_array()?;
        json_writer.end_array()?;
        json_writer.end_array()?;

        json_writer.name("b")?;
        json_writer.begin_object()?;
        json_writer.name("c")?;
        json_writer.string_value("\"\n")?;
        json_writer.end_object()?;

        json_writer.end_object()?;
        json_writer.finish_document()?;

        assert_eq!(
            r#"{"a":1,"":[{},true,null,[]],"b":{"c":"\"\n"}}"#,
            String::from_utf8(writer)?
        );
        Ok(())
    }

    #[test]
    fn encoded_names() -> TestResult {
        let first = EncodedName::new("first");
        let escaped = EncodedName::new("tab\there");

        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);
        json_writer.begin_object()?;
        json_writer.encoded_name(&first)?;
        json_writer.number_value(1)?;
        json_writer.encoded_name(&escaped)?;
        json_writer.number_value(2)?;
        json_writer.name("plain")?;
        json_writer.number_value(3)?;
        json_writer.end_object()?;
        json_writer.finish_document()?;

        assert_eq!(
            r#"{"first":1,"tab\there":2,"plain":3}"#,
            String::from_utf8(writer)?
        );
        Ok(())
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage: Cannot end array when not inside array")]
    fn end_array_not_in_array() {
        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);
        json_writer.begin_object().unwrap();

        json_writer.end_array().unwrap();
    }

    #[test]
    #[should_panic(
        expected = "Incorrect writer usage: Cannot end object when member value is expected"
    )]
    fn end_object_expecting_value() {
        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);
        json_writer.begin_object().unwrap();
        json_writer.name("a").unwrap();

        json_writer.end_object().unwrap();
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage: Cannot write name when name is not expected")]
    fn name_after_name() {
        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);
        json_writer.begin_object().unwrap();
        json_writer.name("a").unwrap();

        json_writer.name("b").unwrap();
    }

    #[test]
    #[should_panic(
        expected = "Incorrect writer usage: Cannot finish document when top-level value is not finished"
    )]
    fn finish_incomplete_document() {
        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut writer);
        json_writer.begin_array().unwrap();

        json_writer.finish_document().unwrap();
    }

    #[test]
    fn skip_validation_name_after_name() -> TestResult {
        // Without validation a name directly after a name is accepted and not preceded by a
        // separator; this is what happens after a value was written around the writer
        let mut json_writer = JsonStreamWriter::new_custom(
            Vec::<u8>::new(),
            WriterSettings {
                skip_validation: true,
                ..Default::default()
            },
        );
        json_writer.begin_object()?;
        json_writer.name("a")?;
        json_writer.name("b")?;
        json_writer.number_value(1)?;
        json_writer.end_object()?;
        json_writer.flush_buffer()?;

        assert_eq!(r#"{"a":"b":1}"#, String::from_utf8(json_writer.into_inner())?);
        Ok(())
    }

    #[test]
    fn automatic_buffer_flush() -> TestResult {
        let mut json_writer = JsonStreamWriter::new(Vec::<u8>::new());
        let count = WRITER_BUF_SIZE + 2;

        json_writer.begin_array()?;
        for _ in 0..count {
            json_writer.bool_value(true)?;
        }
        assert_eq!(true, json_writer.get_ref().len() >= WRITER_BUF_SIZE);
        assert_eq!(true, json_writer.buffered_len() < WRITER_BUF_SIZE);
        json_writer.end_array()?;
        json_writer.flush_buffer()?;
        assert_eq!(0, json_writer.buffered_len());

        let json = String::from_utf8(json_writer.into_inner())?;
        assert_eq!("[".to_owned() + &"true,".repeat(count - 1) + "true]", json);
        Ok(())
    }

    #[test]
    fn escape_all_non_ascii() -> TestResult {
        let mut writer = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new_custom(
            &mut writer,
            WriterSettings {
                escape_all_non_ascii: true,
                ..Default::default()
            },
        );

        json_writer.begin_object()?;
        json_writer.name("\u{E4}")?;
        json_writer.string_value("\u{10FFFF}")?;
        json_writer.end_object()?;
        json_writer.finish_document()?;

        assert_eq!(r#"{"\u00E4":"\uDBFF\uDFFF"}"#, String::from_utf8(writer)?);
        Ok(())
    }
}
