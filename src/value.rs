//! Untyped values for open properties and instance annotations

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use duplicate::duplicate_item;
use indexmap::IndexMap;

use crate::error::WriteError;
use crate::primitive::{write_fp_number, Decimal};
use crate::writer::{JsonWriter, SinkWriter};

/// Value whose structure is only known at runtime
///
/// Used for open (dynamic) properties, for instance annotation values and as fallback
/// when a value has no statically known type. Object members keep their insertion order.
///
/// # Examples
/// ```
/// # use odata_resource_writer::value::OpenValue;
/// # use indexmap::IndexMap;
/// let mut object = IndexMap::new();
/// object.insert("count".to_owned(), OpenValue::from(3));
/// object.insert("tags".to_owned(), OpenValue::Array(vec!["a".into(), OpenValue::Null]));
/// let value = OpenValue::Object(object);
/// # let _ = value;
/// ```
#[derive(Clone, PartialEq, Debug)]
pub enum OpenValue {
    /// JSON `null`
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// Floating point number; non-finite values are written as strings
    Double(f64),
    /// Decimal number
    Decimal(Decimal),
    /// String
    String(String),
    /// Date and time with offset
    DateTimeOffset(DateTime<FixedOffset>),
    /// Date without time
    Date(NaiveDate),
    /// Binary data, written base64 encoded
    Binary(Vec<u8>),
    /// Ordered collection of values
    Array(Vec<OpenValue>),
    /// Object with ordered members
    Object(IndexMap<String, OpenValue>),
}

/// Instance annotations by term name (without the leading `@`)
pub type Annotations = IndexMap<String, OpenValue>;

#[duplicate_item(
    source_type  variant;
    [bool]       [Bool];
    [i32]        [Int32];
    [i64]        [Int64];
    [f64]        [Double];
    [Decimal]    [Decimal];
    [String]     [String];
    [NaiveDate]  [Date];
    [DateTime<FixedOffset>] [DateTimeOffset];
)]
impl From<source_type> for OpenValue {
    fn from(value: source_type) -> Self {
        OpenValue::variant(value)
    }
}

impl From<&str> for OpenValue {
    fn from(value: &str) -> Self {
        OpenValue::String(value.to_owned())
    }
}

impl<V: Into<OpenValue>> From<Option<V>> for OpenValue {
    fn from(value: Option<V>) -> Self {
        value.map_or(OpenValue::Null, Into::into)
    }
}

impl OpenValue {
    /// Writes this value with the given writer
    pub(crate) fn write_to(&self, writer: &mut SinkWriter) -> Result<(), WriteError> {
        match self {
            OpenValue::Null => writer.null_value()?,
            OpenValue::Bool(value) => writer.bool_value(*value)?,
            OpenValue::Int32(value) => writer.number_value(*value)?,
            OpenValue::Int64(value) => writer.number_value(*value)?,
            OpenValue::Double(value) => write_fp_number(*value, writer)?,
            OpenValue::Decimal(value) => writer.number_value_from_string(value.as_str())?,
            OpenValue::String(value) => writer.string_value(value)?,
            OpenValue::DateTimeOffset(value) => {
                writer.string_value(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))?
            }
            OpenValue::Date(value) => writer.string_value(&value.format("%Y-%m-%d").to_string())?,
            OpenValue::Binary(value) => writer.string_value(&BASE64.encode(value))?,
            OpenValue::Array(values) => {
                writer.begin_array()?;
                for value in values {
                    value.write_to(writer)?;
                }
                writer.end_array()?;
            }
            OpenValue::Object(members) => {
                writer.begin_object()?;
                for (name, value) in members {
                    writer.name(name)?;
                    value.write_to(writer)?;
                }
                writer.end_object()?;
            }
        }
        Ok(())
    }
}
