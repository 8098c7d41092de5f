//! Error types for the codec and schema layers.

use thiserror::Error;

/// Errors raised while decoding the binary object model or control-record framing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a complete value could be parsed.
    #[error("truncated input: need {needed} more byte(s)")]
    Truncated {
        /// Additional bytes required to make progress, when known.
        needed: usize,
    },

    /// The leading major-type tag byte is not one of the recognized tags.
    #[error("unknown major type tag: 0x{0:02X}")]
    UnknownMajorType(u8),

    /// A text value's bytes were not valid UTF-8.
    #[error("invalid utf-8 in text value")]
    InvalidUtf8,

    /// A length prefix declared a record larger than the configured maximum.
    #[error("record length {len} exceeds maximum {max}")]
    LengthExceeded {
        /// Declared length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A map key was not a text value (the object model only allows string keys).
    #[error("map key must be a text value")]
    NonStringMapKey,
}

/// Errors raised while validating or looking up schema-derived records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// No `MsgType` variant corresponds to the given opcode.
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// A decoded value did not match the shape required for its record type.
    #[error("invalid record shape for {0:?}")]
    InvalidRecordShape(crate::messages::MsgType),

    /// A required field was absent from a record's map.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field was present but did not hold the expected value shape.
    #[error("field `{field}` has the wrong type, expected {expected}")]
    WrongFieldType {
        /// Field name.
        field: &'static str,
        /// Human-readable expected shape, for the error message.
        expected: &'static str,
    },

    /// A field held a text value that is not one of its enum's recognized variants.
    #[error("field `{field}` has invalid value `{value}`")]
    InvalidEnumValue {
        /// Field name.
        field: &'static str,
        /// The offending text value.
        value: String,
    },
}
