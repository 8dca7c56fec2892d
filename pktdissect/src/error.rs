//! Decode and build errors.

use core::fmt;

use thiserror::Error;

/// Maximum number of bytes rendered into the hex dump of a [`DecodeError`].
pub const DUMP_WINDOW: usize = 64;

/// Render at most [`DUMP_WINDOW`] bytes of `bytes[offset..offset + length]`.
pub(crate) fn dump(bytes: &[u8], offset: usize, length: usize) -> String {
    let start = offset.min(bytes.len());
    let end = start
        .saturating_add(length.min(DUMP_WINDOW))
        .min(bytes.len());
    hex::encode(&bytes[start..end])
}

/// The raw data handed to a decoder does not describe a well-formed value.
///
/// Every variant carries the protocol name, the offset of the offending
/// window within the buffer and a hex dump of that window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes are available than the structure requires.
    #[error("{protocol}: need {need} bytes at offset {offset}, got {got} (data: [{dump}])")]
    TooShort {
        /// Name of the protocol being decoded.
        protocol: &'static str,
        /// Bytes required.
        need: usize,
        /// Bytes available.
        got: usize,
        /// Offset of the window in the buffer.
        offset: usize,
        /// Hex dump of the window, bounded.
        dump: String,
    },

    /// A field holds a value the format does not allow.
    #[error("{protocol}: invalid {field} {value} at offset {offset} (data: [{dump}])")]
    InvalidField {
        /// Name of the protocol being decoded.
        protocol: &'static str,
        /// Name of the field.
        field: &'static str,
        /// The offending value.
        value: u64,
        /// Offset of the window in the buffer.
        offset: usize,
        /// Hex dump of the window, bounded.
        dump: String,
    },

    /// A length field disagrees with the bytes that are actually available.
    #[error("{protocol}: {field} declares {declared} bytes but {available} are available at offset {offset} (data: [{dump}])")]
    InconsistentLength {
        /// Name of the protocol being decoded.
        protocol: &'static str,
        /// Name of the field.
        field: &'static str,
        /// Length the field declares.
        declared: usize,
        /// Bytes actually available.
        available: usize,
        /// Offset of the window in the buffer.
        offset: usize,
        /// Hex dump of the window, bounded.
        dump: String,
    },
}

impl DecodeError {
    /// Name of the protocol whose decoder failed.
    pub fn protocol(&self) -> &'static str {
        match self {
            DecodeError::TooShort { protocol, .. }
            | DecodeError::InvalidField { protocol, .. }
            | DecodeError::InconsistentLength { protocol, .. } => protocol,
        }
    }

    /// Offset of the offending window.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::TooShort { offset, .. }
            | DecodeError::InvalidField { offset, .. }
            | DecodeError::InconsistentLength { offset, .. } => *offset,
        }
    }

    pub(crate) fn too_short(
        protocol: &'static str,
        bytes: &[u8],
        offset: usize,
        need: usize,
        got: usize,
    ) -> Self {
        DecodeError::TooShort {
            protocol,
            need,
            got,
            offset,
            dump: dump(bytes, offset, got),
        }
    }

    pub(crate) fn invalid_field(
        protocol: &'static str,
        bytes: &[u8],
        offset: usize,
        field: &'static str,
        value: u64,
    ) -> Self {
        DecodeError::InvalidField {
            protocol,
            field,
            value,
            offset,
            dump: dump(bytes, offset, DUMP_WINDOW),
        }
    }

    pub(crate) fn inconsistent_length(
        protocol: &'static str,
        bytes: &[u8],
        offset: usize,
        field: &'static str,
        declared: usize,
        available: usize,
    ) -> Self {
        DecodeError::InconsistentLength {
            protocol,
            field,
            declared,
            available,
            offset,
            dump: dump(bytes, offset, available),
        }
    }
}

/// A single problem found by a builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A required field was never set.
    Missing(&'static str),
    /// A field does not fit into its bit width.
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// The offending value.
        value: u64,
        /// Largest value the field can hold.
        max: u64,
    },
    /// A field value conflicts with the rest of the builder.
    Invalid {
        /// Name of the field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
    /// The payload builder failed.
    Payload(Box<BuildError>),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing(field) => write!(f, "missing {}", field),
            Violation::OutOfRange { field, value, max } => {
                write!(f, "{} = {} exceeds {}", field, value, max)
            }
            Violation::Invalid { field, reason } => write!(f, "{}: {}", field, reason),
            Violation::Payload(err) => write!(f, "payload: {}", err),
        }
    }
}

/// A builder could not produce a value.
///
/// All violations found during validation are reported together.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot build {protocol}: {}", join(.violations))]
pub struct BuildError {
    /// The protocol whose builder failed.
    pub protocol: &'static str,
    /// Everything that was wrong, in field order.
    pub violations: Vec<Violation>,
}

impl BuildError {
    /// Names of the required fields that were left unset.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::Missing(field) => Some(*field),
                _ => None,
            })
            .collect()
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
