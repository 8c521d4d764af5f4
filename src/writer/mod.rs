//! Module for writing JSON tokens
//!
//! [`JsonWriter`] is the general trait for low-level JSON token writers. [`JsonStreamWriter`] is
//! the buffered implementation of it, and [`SinkWriter`] wraps a `JsonStreamWriter` writing into
//! a shared output buffer which large values may also be written to directly, bypassing the
//! token writer.

use duplicate::duplicate_item;
use thiserror::Error;

use crate::json_number::is_valid_json_number;

mod sink;
mod stream_writer;
// Re-export implementations under `writer` module
pub use sink::*;
pub use stream_writer::*;

type IoError = std::io::Error;

/// A trait for JSON token writers
///
/// The methods of this writer can be divided into the following categories:
///
/// - Structure
///     - [`begin_object`](Self::begin_object), [`end_object`](Self::end_object): Starting and ending a JSON object
///     - [`begin_array`](Self::begin_array), [`end_array`](Self::end_array): Starting and ending a JSON array
///     - [`name`](Self::name): Writing a JSON object member name
/// - Values
///     - [`string_value`](Self::string_value): Writing a JSON string value
///     - [`number_value`](Self::number_value), [`fp_number_value`](Self::fp_number_value), [`number_value_from_string`](Self::number_value_from_string): Writing a JSON number value
///     - [`bool_value`](Self::bool_value): Writing a JSON boolean value
///     - [`null_value`](Self::null_value): Writing a JSON null value
///
/// # Examples
/// ```
/// # use odata_resource_writer::writer::*;
/// let mut writer = Vec::<u8>::new();
/// let mut json_writer = JsonStreamWriter::new(&mut writer);
///
/// json_writer.begin_object()?;
/// json_writer.name("a")?;
///
/// json_writer.begin_array()?;
/// json_writer.number_value(1)?;
/// json_writer.bool_value(true)?;
/// json_writer.end_array()?;
///
/// json_writer.end_object()?;
/// // Ensures that the JSON document is complete and flushes the buffer
/// json_writer.finish_document()?;
///
/// let json = String::from_utf8(writer)?;
/// assert_eq!(json, r#"{"a":[1,true]}"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Error handling
/// The methods of this writer return a [`Result::Err`] when an error occurs while writing
/// the JSON document. In most cases the error can only be an IO error which was caused
/// by the underlying writer. When encountering such an error, writing the JSON document
/// **must** be aborted.
///
/// # Panics
/// Implementations which validate the structure of the written document panic when used in
/// an incorrect way, for example when calling [`end_object`](Self::end_object) while writing
/// a JSON array.
pub trait JsonWriter {
    /// Begins writing a JSON object
    ///
    /// To write a member of the object first call [`name`](Self::name) to write the member name
    /// and afterwards one of the value writing methods to write the member value. At the end
    /// call [`end_object`](Self::end_object) to write the closing bracket of the JSON object.
    fn begin_object(&mut self) -> Result<(), IoError>;

    /// Writes the closing bracket `}` of the current JSON object
    fn end_object(&mut self) -> Result<(), IoError>;

    /// Begins writing a JSON array
    fn begin_array(&mut self) -> Result<(), IoError>;

    /// Writes the closing bracket `]` of the current JSON array
    fn end_array(&mut self) -> Result<(), IoError>;

    /// Writes the name of the next JSON object member
    ///
    /// Characters are automatically escaped in the JSON output if necessary. This method
    /// does not detect duplicate member names.
    fn name(&mut self, name: &str) -> Result<(), IoError>;

    /// Writes a JSON null value
    fn null_value(&mut self) -> Result<(), IoError>;

    /// Writes a JSON boolean value
    fn bool_value(&mut self, value: bool) -> Result<(), IoError>;

    /// Writes a JSON string value
    ///
    /// Characters are automatically escaped in the JSON output if necessary. For example
    /// the character U+0000 is written as `\u0000`.
    fn string_value(&mut self, value: &str) -> Result<(), IoError>;

    /// Writes the string representation of a JSON number value
    ///
    /// # Examples
    /// ```
    /// # use odata_resource_writer::writer::*;
    /// let mut writer = Vec::<u8>::new();
    /// let mut json_writer = JsonStreamWriter::new(&mut writer);
    ///
    /// json_writer.number_value_from_string("123.0e10")?;
    /// json_writer.finish_document()?;
    ///
    /// let json = String::from_utf8(writer)?;
    /// assert_eq!(json, "123.0e10");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// Returns a [`JsonNumberError::InvalidNumber`] when the provided string is not a valid
    /// JSON number.
    fn number_value_from_string(&mut self, value: &str) -> Result<(), JsonNumberError>;

    /// Writes an integral JSON number value
    fn number_value<N: FiniteNumber>(&mut self, value: N) -> Result<(), IoError>;

    /// Writes a floating point JSON number value
    ///
    /// # Errors
    /// Returns a [`JsonNumberError::InvalidNumber`] when the number is NaN or Infinity; JSON
    /// does not support these values.
    fn fp_number_value<N: FloatingPointNumber>(&mut self, value: N) -> Result<(), JsonNumberError>;
}

/// Sealed trait for finite number types such as `u32`
///
/// Values of this number type are finite and will therefore always be
/// valid JSON numbers.
pub trait FiniteNumber: private::Sealed {
    /// Converts this number to a JSON number string
    ///
    /// The JSON number string is passed to the given `consumer`.
    fn use_json_number<C: FnOnce(&str) -> Result<(), IoError>>(
        &self,
        consumer: C,
    ) -> Result<(), IoError>;
}

/// Sealed trait for floating point number types such as `f64`
pub trait FloatingPointNumber: private::Sealed {
    /// Converts this number to a JSON number string
    ///
    /// Returns an error if this number is not a valid JSON number, for example
    /// because it is NaN or Infinity.
    fn use_json_number<C: FnOnce(&str) -> Result<(), IoError>>(
        &self,
        consumer: C,
    ) -> Result<(), JsonNumberError>;
}

mod private {
    use super::*;

    // Sealed trait, see https://rust-lang.github.io/api-guidelines/future-proofing.html#sealed-traits-protect-against-downstream-implementations-c-sealed
    pub trait Sealed {}

    // Use `duplicate` crate to avoid repeating code for all supported types, see https://stackoverflow.com/a/61467564
    #[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [u64]; [i64]; [u128]; [i128]; [usize]; [isize]; [f32]; [f64])]
    impl Sealed for type_template {}
}

/// Error which occurred while writing a JSON number
#[derive(Error, Debug)]
pub enum JsonNumberError {
    /// The number is not a valid JSON number
    ///
    /// The data of this enum variant is a message explaining why the number is not valid.
    #[error("{0}")]
    InvalidNumber(String),
    /// An IO error occurred while writing the number
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
}

#[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [u64]; [i64]; [u128]; [i128]; [usize]; [isize])]
impl FiniteNumber for type_template {
    #[inline(always)]
    fn use_json_number<C: FnOnce(&str) -> Result<(), IoError>>(
        &self,
        consumer: C,
    ) -> Result<(), IoError> {
        let string = self.to_string();
        debug_assert!(
            is_valid_json_number(&string),
            "Unexpected: Not a valid JSON number: {string}"
        );
        consumer(&string)
    }
}

#[duplicate_item(type_template; [f32]; [f64])]
impl FloatingPointNumber for type_template {
    #[inline(always)]
    fn use_json_number<C: FnOnce(&str) -> Result<(), IoError>>(
        &self,
        consumer: C,
    ) -> Result<(), JsonNumberError> {
        if self.is_finite() {
            let string = self.to_string();
            debug_assert!(
                is_valid_json_number(&string),
                "Unexpected: Not a valid JSON number: {string}"
            );
            consumer(&string)?;
            Ok(())
        } else {
            Err(JsonNumberError::InvalidNumber(format!(
                "non-finite number: {self}"
            )))
        }
    }
}

/// Writes the bytes of a member name or string value, escaping characters where necessary
///
/// The output is passed to `sink` in pieces; unescaped runs of the input are passed as-is.
pub(crate) fn write_escaped<F>(
    value: &str,
    escape_all_control_chars: bool,
    escape_all_non_ascii: bool,
    mut sink: F,
) -> Result<(), IoError>
where
    F: FnMut(&[u8]) -> Result<(), IoError>,
{
    fn should_escape(c: char, escape_all_control_chars: bool, escape_all_non_ascii: bool) -> bool {
        matches!(c, '"' | '\\')
            // Control characters which must be escaped per JSON specification
            || matches!(c, '\u{0}'..='\u{1F}')
            || (escape_all_non_ascii && !c.is_ascii())
            || (escape_all_control_chars && c.is_control())
    }

    fn unicode_escape(value: u32) -> [u8; 6] {
        // For convenience `value` is u32, but it is actually u16
        debug_assert!(value <= u16::MAX as u32);

        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        [
            b'\\',
            b'u',
            HEX[(value >> 12 & 15) as usize],
            HEX[(value >> 8 & 15) as usize],
            HEX[(value >> 4 & 15) as usize],
            HEX[(value & 15) as usize],
        ]
    }

    let bytes = value.as_bytes();
    let mut next_to_write_index = 0;

    for (index, c) in value.char_indices() {
        if !should_escape(c, escape_all_control_chars, escape_all_non_ascii) {
            continue;
        }
        if index > next_to_write_index {
            sink(&bytes[next_to_write_index..index])?;
        }
        next_to_write_index = index + c.len_utf8();

        let escape: &[u8] = match c {
            '"' => b"\\\"",
            '\\' => b"\\\\",
            '\u{0008}' => b"\\b",
            '\u{000C}' => b"\\f",
            '\n' => b"\\n",
            '\r' => b"\\r",
            '\t' => b"\\t",
            '\0'..='\u{FFFF}' => {
                sink(&unicode_escape(c as u32))?;
                continue;
            }
            _ => {
                // Encode as surrogate pair
                let temp = (c as u32) - 0x10000;
                let high = (temp >> 10) + 0xD800;
                let low = (temp & ((1 << 10) - 1)) + 0xDC00;
                sink(&unicode_escape(high))?;
                sink(&unicode_escape(low))?;
                continue;
            }
        };
        sink(escape)?;
    }
    // Write remaining bytes
    if next_to_write_index < bytes.len() {
        sink(&bytes[next_to_write_index..])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Display;

    fn escape(value: &str, escape_all_control_chars: bool, escape_all_non_ascii: bool) -> String {
        let mut out = Vec::new();
        write_escaped(value, escape_all_control_chars, escape_all_non_ascii, |bytes| {
            out.extend_from_slice(bytes);
            Ok(())
        })
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn escaping() {
        assert_eq!("", escape("", false, false));
        assert_eq!("ab", escape("ab", false, false));
        assert_eq!(r#"\u0000\u001F"#, escape("\u{0000}\u{001F}", false, false));
        assert_eq!(
            r#"\"\\/\b\f\n\r\t"#,
            escape("\"\\/\u{0008}\u{000C}\n\r\t", false, false)
        );
        assert_eq!("\u{007F}\u{10FFFF}", escape("\u{007F}\u{10FFFF}", false, false));
        assert_eq!(r#"\u007F"#, escape("\u{007F}", true, false));
        assert_eq!(r#"a\u00E4\uDBFF\uDFFF"#, escape("a\u{E4}\u{10FFFF}", false, true));
    }

    #[test]
    fn numbers_strings() {
        fn assert_valid_number<T: FiniteNumber + Display>(number: T) {
            let mut number_string = String::new();
            number
                .use_json_number(|json_number| {
                    number_string.push_str(json_number);
                    Ok(())
                })
                .unwrap();

            assert_eq!(
                true,
                is_valid_json_number(&number_string),
                "Expected to be valid JSON number: {}",
                number
            );
        }

        assert_valid_number(i8::MIN);
        assert_valid_number(u8::MAX);
        assert_valid_number(i128::MIN);
        assert_valid_number(u128::MAX);
        assert_valid_number(isize::MIN);
        assert_valid_number(usize::MAX);

        fn assert_non_finite<T: FloatingPointNumber + Display>(number: T) {
            match number.use_json_number(|_| panic!("Should have failed for: {number}")) {
                Ok(_) => panic!("Should have failed for: {number}"),
                Err(e) => match e {
                    JsonNumberError::InvalidNumber(message) => {
                        assert_eq!(format!("non-finite number: {number}"), message)
                    }
                    JsonNumberError::IoError(e) => panic!("Unexpected error for '{number}': {e:?}"),
                },
            }
        }

        assert_non_finite(f32::NAN);
        assert_non_finite(f64::NEG_INFINITY);
        assert_non_finite(f64::INFINITY);
    }
}
