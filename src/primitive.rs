//! Writers for scalar values
//!
//! All scalar types are converted to a [`Scalar`] and written by a single function; the
//! writer provider resolves them from a fixed table before consulting any factory.

use std::any::TypeId;
use std::fmt::{Debug, Formatter};
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::write::EncoderWriter;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use duplicate::duplicate_item;
use url::Url;

use crate::error::WriteError;
use crate::json_number::is_valid_json_number;
use crate::provider::{ErasedWriter, ValueWriter, Writable, WriterKind};
use crate::state::WriteState;
use crate::value::OpenValue;
use crate::writer::{write_escaped, JsonWriter, SinkWriter};

/// Decimal number, stored as its JSON number text to preserve scale and precision
///
/// # Examples
/// ```
/// # use odata_resource_writer::primitive::Decimal;
/// let price: Decimal = "19.90".parse()?;
/// assert_eq!(price.as_str(), "19.90");
/// assert!(Decimal::new("1,5").is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Decimal(String);

impl Decimal {
    /// Creates a decimal from its textual form
    ///
    /// # Errors
    /// Returns [`WriteError::InvalidNumber`] if `value` is not a valid JSON number.
    pub fn new(value: impl Into<String>) -> Result<Self, WriteError> {
        let value = value.into();
        if is_valid_json_number(&value) {
            Ok(Decimal(value))
        } else {
            Err(WriteError::InvalidNumber(format!("invalid decimal: {value}")))
        }
    }

    /// Gets the textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Decimal {
    type Err = WriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::new(s)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(value.to_string())
    }
}

/// Binary value, written as base64 string
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct ByteSequence(pub Vec<u8>);

impl From<Vec<u8>> for ByteSequence {
    fn from(value: Vec<u8>) -> Self {
        ByteSequence(value)
    }
}

type OpenReader = dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync;

/// Binary value which is read from a stream while it is written
///
/// The bytes are base64 encoded directly into the output buffer instead of going through the
/// JSON token writer. The stream is opened anew every time the value is written.
#[derive(Clone)]
pub struct StreamedBinary {
    open: Arc<OpenReader>,
}

impl StreamedBinary {
    /// Creates a value which opens its stream with `open`
    pub fn new<F, R>(open: F) -> Self
    where
        F: Fn() -> io::Result<R> + Send + Sync + 'static,
        R: Read + Send + 'static,
    {
        StreamedBinary {
            open: Arc::new(move || open().map(|reader| Box::new(reader) as Box<dyn Read + Send>)),
        }
    }

    /// Creates a value streaming the given in-memory bytes
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        StreamedBinary::new(move || Ok(io::Cursor::new(Arc::clone(&bytes))))
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        (self.open)()
    }
}

impl Debug for StreamedBinary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedBinary").finish_non_exhaustive()
    }
}

/// Large text value, escaped directly into the output buffer
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StreamedText(Arc<str>);

impl StreamedText {
    /// Creates a streamed text value
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        StreamedText(text.into())
    }

    /// Gets the text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Scalar value in the form it is written
#[non_exhaustive]
#[derive(Debug)]
pub enum Scalar<'a> {
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// Single precision floating point number
    Single(f32),
    /// Double precision floating point number
    Double(f64),
    /// Decimal number text
    Decimal(&'a str),
    /// String
    String(&'a str),
    /// Date without time, `yyyy-mm-dd`
    Date(NaiveDate),
    /// Date and time without offset
    DateTime(NaiveDateTime),
    /// Date and time with offset
    DateTimeOffset(DateTime<FixedOffset>),
    /// Binary data
    ByteSequence(&'a [u8]),
    /// URI
    Uri(&'a str),
    /// Binary stream
    StreamedBinary(&'a StreamedBinary),
    /// Large text
    StreamedText(&'a str),
    /// Untyped value
    Object(&'a OpenValue),
}

/// Scalar type with a built-in writer
///
/// This trait is sealed; it is implemented for the types listed in [`Scalar`].
pub trait Primitive: Writable + private::Sealed {
    /// Kind of the writer for this type
    const KIND: WriterKind;

    /// Converts this value for writing
    fn as_scalar(&self) -> Scalar<'_>;
}

mod private {
    pub trait Sealed {}
}

#[duplicate_item(
    primitive_type; [bool]; [i32]; [i64]; [f32]; [f64]; [Decimal]; [String]; [NaiveDate];
    [NaiveDateTime]; [DateTime<FixedOffset>]; [DateTime<Utc>]; [ByteSequence]; [Url];
    [StreamedBinary]; [StreamedText]; [OpenValue];
)]
impl private::Sealed for primitive_type {}

#[duplicate_item(
    primitive_type; [bool]; [i32]; [i64]; [f32]; [f64]; [Decimal]; [String]; [NaiveDate];
    [NaiveDateTime]; [DateTime<FixedOffset>]; [DateTime<Utc>]; [ByteSequence]; [Url];
    [StreamedBinary]; [StreamedText]; [OpenValue];
)]
impl Writable for primitive_type {}

#[duplicate_item(
    primitive_type           kind              scalar;
    [bool]                   [Bool]            [Scalar::Bool(*self)];
    [i32]                    [Int32]           [Scalar::Int32(*self)];
    [i64]                    [Int64]           [Scalar::Int64(*self)];
    [f32]                    [Single]          [Scalar::Single(*self)];
    [f64]                    [Double]          [Scalar::Double(*self)];
    [Decimal]                [Decimal]         [Scalar::Decimal(self.as_str())];
    [String]                 [String]          [Scalar::String(self)];
    [NaiveDate]              [Date]            [Scalar::Date(*self)];
    [NaiveDateTime]          [DateTime]        [Scalar::DateTime(*self)];
    [DateTime<FixedOffset>]  [DateTimeOffset]  [Scalar::DateTimeOffset(*self)];
    [DateTime<Utc>]          [DateTimeOffset]  [Scalar::DateTimeOffset(self.fixed_offset())];
    [ByteSequence]           [ByteSequence]    [Scalar::ByteSequence(&self.0)];
    [Url]                    [Uri]             [Scalar::Uri(self.as_str())];
    [StreamedBinary]         [StreamedBinary]  [Scalar::StreamedBinary(self)];
    [StreamedText]           [StreamedText]    [Scalar::StreamedText(self.as_str())];
    [OpenValue]              [Object]          [Scalar::Object(self)];
)]
impl Primitive for primitive_type {
    const KIND: WriterKind = WriterKind::kind;

    fn as_scalar(&self) -> Scalar<'_> {
        scalar
    }
}

/// Writes a floating point number; non-finite values are written as the strings
/// `NaN`, `INF` and `-INF`
pub(crate) fn write_fp_number(value: f64, writer: &mut SinkWriter) -> Result<(), WriteError> {
    if value.is_nan() {
        writer.string_value("NaN")?;
    } else if value.is_infinite() {
        writer.string_value(if value > 0.0 { "INF" } else { "-INF" })?;
    } else {
        writer.fp_number_value(value)?;
    }
    Ok(())
}

fn write_streamed_binary(value: &StreamedBinary, writer: &mut SinkWriter) -> Result<(), WriteError> {
    let mut reader = value.open()?;
    if writer.can_bypass() {
        writer.write_raw(|out| {
            out.push(b'"');
            {
                let mut encoder = EncoderWriter::new(&mut *out, &BASE64);
                io::copy(&mut reader, &mut encoder)?;
                encoder.finish()?;
            }
            out.push(b'"');
            Ok(())
        })?;
    } else {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        writer.string_value(&BASE64.encode(bytes))?;
    }
    Ok(())
}

fn write_streamed_text(value: &str, writer: &mut SinkWriter) -> Result<(), WriteError> {
    if writer.can_bypass() {
        let settings = writer.writer_settings().clone();
        writer.write_raw(|out| {
            out.push(b'"');
            write_escaped(
                value,
                settings.escape_all_control_chars,
                settings.escape_all_non_ascii,
                |bytes| out.write_all(bytes),
            )?;
            out.push(b'"');
            Ok(())
        })?;
    } else {
        writer.string_value(value)?;
    }
    Ok(())
}

/// Writes a scalar value
pub fn write_scalar(value: Scalar<'_>, writer: &mut SinkWriter) -> Result<(), WriteError> {
    match value {
        Scalar::Bool(value) => writer.bool_value(value)?,
        Scalar::Int32(value) => writer.number_value(value)?,
        Scalar::Int64(value) => writer.number_value(value)?,
        Scalar::Single(value) => {
            if value.is_finite() {
                writer.fp_number_value(value)?
            } else {
                write_fp_number(f64::from(value), writer)?
            }
        }
        Scalar::Double(value) => write_fp_number(value, writer)?,
        Scalar::Decimal(value) => writer.number_value_from_string(value)?,
        Scalar::String(value) | Scalar::Uri(value) => writer.string_value(value)?,
        Scalar::Date(value) => writer.string_value(&value.format("%Y-%m-%d").to_string())?,
        Scalar::DateTime(value) => {
            writer.string_value(&value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())?
        }
        Scalar::DateTimeOffset(value) => {
            writer.string_value(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))?
        }
        Scalar::ByteSequence(value) => writer.string_value(&BASE64.encode(value))?,
        Scalar::StreamedBinary(value) => write_streamed_binary(value, writer)?,
        Scalar::StreamedText(value) => write_streamed_text(value, writer)?,
        Scalar::Object(value) => value.write_to(writer)?,
    }
    Ok(())
}

/// Writer for a [`Primitive`] type
pub(crate) struct PrimitiveWriter<P> {
    _type: PhantomData<fn(&P)>,
}

impl<P: Primitive> ValueWriter<P> for PrimitiveWriter<P> {
    fn write(&self, value: &P, state: &mut WriteState) -> Result<bool, WriteError> {
        write_scalar(value.as_scalar(), state.writer_mut())?;
        Ok(true)
    }

    fn kind(&self) -> WriterKind {
        P::KIND
    }
}

fn erased_primitive_writer<P: Primitive>() -> ErasedWriter {
    ErasedWriter::new::<P>(Arc::new(PrimitiveWriter::<P> {
        _type: PhantomData,
    }))
}

type PrimitiveEntry = (fn() -> TypeId, fn() -> ErasedWriter);

const PRIMITIVE_WRITERS: [PrimitiveEntry; 16] = [
    (TypeId::of::<bool>, erased_primitive_writer::<bool>),
    (TypeId::of::<i32>, erased_primitive_writer::<i32>),
    (TypeId::of::<i64>, erased_primitive_writer::<i64>),
    (TypeId::of::<f32>, erased_primitive_writer::<f32>),
    (TypeId::of::<f64>, erased_primitive_writer::<f64>),
    (TypeId::of::<Decimal>, erased_primitive_writer::<Decimal>),
    (TypeId::of::<String>, erased_primitive_writer::<String>),
    (TypeId::of::<NaiveDate>, erased_primitive_writer::<NaiveDate>),
    (TypeId::of::<NaiveDateTime>, erased_primitive_writer::<NaiveDateTime>),
    (TypeId::of::<DateTime<FixedOffset>>, erased_primitive_writer::<DateTime<FixedOffset>>),
    (TypeId::of::<DateTime<Utc>>, erased_primitive_writer::<DateTime<Utc>>),
    (TypeId::of::<ByteSequence>, erased_primitive_writer::<ByteSequence>),
    (TypeId::of::<Url>, erased_primitive_writer::<Url>),
    (TypeId::of::<StreamedBinary>, erased_primitive_writer::<StreamedBinary>),
    (TypeId::of::<StreamedText>, erased_primitive_writer::<StreamedText>),
    (TypeId::of::<OpenValue>, erased_primitive_writer::<OpenValue>),
];

/// Creates the built-in writer for `type_id`, if it is a primitive type
pub(crate) fn primitive_writer(type_id: TypeId) -> Option<ErasedWriter> {
    PRIMITIVE_WRITERS
        .iter()
        .find(|(primitive_type_id, _)| primitive_type_id() == type_id)
        .map(|(_, create)| create())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WriterSettings;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn to_json<P: Primitive>(value: &P) -> String {
        let mut writer = SinkWriter::new(WriterSettings::default());
        write_scalar(value.as_scalar(), &mut writer).unwrap();
        String::from_utf8(writer.take_output().unwrap()).unwrap()
    }

    #[test]
    fn numbers() -> TestResult {
        assert_eq!("true", to_json(&true));
        assert_eq!("-3", to_json(&-3_i32));
        assert_eq!("9007199254740993", to_json(&9007199254740993_i64));
        assert_eq!("0.5", to_json(&0.5_f32));
        assert_eq!(r#""INF""#, to_json(&f32::INFINITY));
        assert_eq!(r#""NaN""#, to_json(&f64::NAN));
        assert_eq!("1.0e-3", to_json(&"1.0e-3".parse::<Decimal>()?));
        assert_eq!("42", to_json(&Decimal::from(42)));
        Ok(())
    }

    #[test]
    fn invalid_decimal() {
        match Decimal::new("1.") {
            Err(WriteError::InvalidNumber(message)) => assert_eq!("invalid decimal: 1.", message),
            result => panic!("Unexpected result: {result:?}"),
        }
    }

    #[test]
    fn dates() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(r#""2023-12-01""#, to_json(&date));

        let date_time = date.and_hms_milli_opt(8, 5, 3, 250).unwrap();
        assert_eq!(r#""2023-12-01T08:05:03.250""#, to_json(&date_time));
        assert_eq!(
            r#""2023-12-01T08:05:03""#,
            to_json(&date.and_hms_opt(8, 5, 3).unwrap())
        );

        let utc = date_time.and_utc();
        assert_eq!(r#""2023-12-01T08:05:03.250Z""#, to_json(&utc));
    }

    #[test]
    fn strings_and_binary() -> TestResult {
        assert_eq!(r#""a\"b""#, to_json(&"a\"b".to_owned()));
        assert_eq!(r#""AAEC""#, to_json(&ByteSequence(vec![0, 1, 2])));
        assert_eq!(
            r#""https://example.com/a?b=c""#,
            to_json(&Url::parse("https://example.com/a?b=c")?)
        );
        Ok(())
    }

    #[test]
    fn streamed_values_fall_back_outside_members() {
        assert_eq!(
            r#""AQIDBA==""#,
            to_json(&StreamedBinary::from_bytes(vec![1_u8, 2, 3, 4]))
        );
        assert_eq!(r#""line\n""#, to_json(&StreamedText::new("line\n")));
    }

    #[test]
    fn streamed_values_bypass() -> TestResult {
        let mut writer = SinkWriter::new(WriterSettings::default());
        writer.begin_object()?;
        writer.name("bin")?;
        write_scalar(
            Scalar::StreamedBinary(&StreamedBinary::from_bytes(vec![255_u8; 4])),
            &mut writer,
        )?;
        writer.name("text")?;
        write_scalar(Scalar::StreamedText("tab\t"), &mut writer)?;
        writer.name("after")?;
        writer.number_value(1)?;
        writer.end_object()?;

        assert_eq!(
            r#"{"bin":"/////w==","text":"tab\t","after":1}"#,
            String::from_utf8(writer.take_output()?)?
        );
        Ok(())
    }

    #[test]
    fn primitive_table() {
        assert!(primitive_writer(TypeId::of::<String>()).is_some());
        assert!(primitive_writer(TypeId::of::<OpenValue>()).is_some());
        assert!(primitive_writer(TypeId::of::<u8>()).is_none());
        assert!(primitive_writer(TypeId::of::<Vec<String>>()).is_none());
    }
}
