use thiserror::Error;

/// Errors raised while reading values from a byte stream.
///
/// Every variant leaves the stream misaligned, so callers treat them as fatal
/// for the buffer being read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// The buffer ended before the value was complete
    #[error("Unexpected end of input: needed {needed} bytes but only {remaining} remain")]
    Truncated { needed: usize, remaining: usize },

    /// A boolean or presence byte was neither 0 nor 1
    #[error("Invalid boolean/presence byte {value:#04x} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    /// A length-prefixed string did not contain valid UTF-8
    #[error("Length-prefixed string of {length} bytes is not valid UTF-8")]
    InvalidUtf8 { length: usize },

    /// A value was well-formed but outside the range its type accepts
    #[error("Value {value} out of range for {type_name}")]
    OutOfRange { type_name: &'static str, value: i64 },
}
