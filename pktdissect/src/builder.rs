//! The builder protocol.
//!
//! Every packet type has a mutable builder with one optional slot per field.
//! `build()` validates the builder, builds the payload builder first, then
//! applies the requested corrections (length fields, checksums, padding) and
//! produces an immutable packet. Builders can be pre-populated from an
//! existing packet with [`Packet::builder`](crate::Packet::builder) or the
//! concrete `to_builder()` methods.

use core::fmt;

use crate::bits::BitField;
use crate::error::{BuildError, Violation};
use crate::packet::Packet;

/// A builder that can produce a boxed packet, usable as a payload builder.
pub trait PacketBuilder: fmt::Debug + Send {
    /// Name of the protocol produced by this builder.
    fn name(&self) -> &'static str;

    /// Validate and build.
    fn build_packet(self: Box<Self>) -> Result<Box<dyn Packet>, BuildError>;

    /// The builder of the encapsulated packet, if any.
    fn payload_builder(&self) -> Option<&dyn PacketBuilder>;

    /// Mutable access to the builder of the encapsulated packet.
    fn payload_builder_mut(&mut self) -> Option<&mut (dyn PacketBuilder + 'static)>;
}

/// Builders with a length field that can be recomputed at build time.
pub trait LengthBuilder: Sized {
    /// Recompute the length fields from the built content.
    fn correct_length_at_build(self, value: bool) -> Self;
}

/// Builders with a checksum field that can be recomputed at build time.
pub trait ChecksumBuilder: Sized {
    /// Recompute the checksum from the built content.
    fn correct_checksum_at_build(self, value: bool) -> Self;
}

/// Collects builder violations so that all of them are reported at once.
#[derive(Debug)]
pub(crate) struct FieldCheck {
    protocol: &'static str,
    violations: Vec<Violation>,
}

impl FieldCheck {
    pub(crate) fn new(protocol: &'static str) -> Self {
        Self {
            protocol,
            violations: Vec::new(),
        }
    }

    /// Take a required value, recording it as missing when unset.
    pub(crate) fn require<T: Default>(&mut self, field: &'static str, value: Option<T>) -> T {
        self.require_or(field, value, T::default())
    }

    /// Same as `require`, with an explicit placeholder for types without `Default`.
    pub(crate) fn require_or<T>(&mut self, field: &'static str, value: Option<T>, placeholder: T) -> T {
        match value {
            Some(v) => v,
            None => {
                self.violations.push(Violation::Missing(field));
                placeholder
            }
        }
    }

    /// Check that `value` fits into `bits`.
    pub(crate) fn bits(&mut self, field: &'static str, value: u32, bits: BitField) -> u32 {
        if !bits.fits(value) {
            self.violations.push(Violation::OutOfRange {
                field,
                value: value as u64,
                max: bits.max() as u64,
            });
        }
        value & bits.max()
    }

    /// Check that `value <= max`.
    pub(crate) fn max(&mut self, field: &'static str, value: u64, max: u64) {
        if value > max {
            self.violations
                .push(Violation::OutOfRange { field, value, max });
        }
    }

    pub(crate) fn invalid(&mut self, field: &'static str, reason: &'static str) {
        self.violations.push(Violation::Invalid { field, reason });
    }

    pub(crate) fn finish(self) -> Result<(), BuildError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(BuildError {
                protocol: self.protocol,
                violations: self.violations,
            })
        }
    }
}

/// Build an optional payload builder, attributing its failure to `protocol`.
pub(crate) fn build_payload(
    protocol: &'static str,
    payload: Option<Box<dyn PacketBuilder>>,
) -> Result<Option<Box<dyn Packet>>, BuildError> {
    match payload {
        None => Ok(None),
        Some(builder) => builder.build_packet().map(Some).map_err(|e| BuildError {
            protocol,
            violations: vec![Violation::Payload(Box::new(e))],
        }),
    }
}
