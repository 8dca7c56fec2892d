//! Packets whose bytes are kept without interpretation.
//!
//! The bytes are held in a shared [`Bytes`] buffer so cloning a decoded tree
//! does not copy opaque payloads.

use bytes::Bytes;

use crate::builder::{FieldCheck, PacketBuilder};
use crate::error::{BuildError, DecodeError};
use crate::memo::Memo;
use crate::packet::{Header, Packet};

fn clamp(bytes: &[u8], offset: usize, length: usize) -> &[u8] {
    let end = offset.saturating_add(length).min(bytes.len());
    let start = offset.min(end);
    &bytes[start..end]
}

/// Bytes for which no decoder is registered.
#[derive(Debug, Clone)]
pub struct UnknownPacket {
    data: Bytes,
    memo: Memo,
}

impl UnknownPacket {
    /// Copy `bytes[offset..offset + length]`. Never fails; the window is
    /// clamped to the buffer.
    pub fn new(bytes: &[u8], offset: usize, length: usize) -> Self {
        Self::from_shared(Bytes::copy_from_slice(clamp(bytes, offset, length)))
    }

    /// Wrap owned bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::from_shared(Bytes::from(data))
    }

    /// Wrap a shared buffer without copying it.
    pub fn from_shared(data: Bytes) -> Self {
        Self {
            data,
            memo: Memo::new(),
        }
    }

    /// The wrapped bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// A builder holding a copy of the wrapped bytes.
    pub fn to_builder(&self) -> UnknownPacketBuilder {
        UnknownPacketBuilder::new().data(self.data.to_vec())
    }
}

impl Packet for UnknownPacket {
    packet_object_methods!("Unknown");

    fn header(&self) -> Option<&dyn Header> {
        None
    }

    fn payload(&self) -> Option<&dyn Packet> {
        None
    }

    fn builder(&self) -> Box<dyn PacketBuilder> {
        Box::new(self.to_builder())
    }

    fn trailer_len(&self) -> usize {
        self.data.len()
    }

    fn write_trailer(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
    }

    fn raw_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Builds an [`UnknownPacket`] from raw bytes.
#[derive(Debug, Clone, Default)]
pub struct UnknownPacketBuilder {
    data: Option<Vec<u8>>,
}

impl UnknownPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bytes. Required.
    pub fn data(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.data = Some(value.into());
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<UnknownPacket, BuildError> {
        let mut check = FieldCheck::new("Unknown");
        let data = check.require("data", self.data);
        check.finish()?;
        Ok(UnknownPacket::from_vec(data))
    }
}

packet_builder!(UnknownPacketBuilder, "Unknown");

/// Bytes whose decoder failed, together with the reason.
///
/// Produced in place of a payload so that a broken inner layer never makes
/// the outer layers undecodable.
#[derive(Debug, Clone)]
pub struct MalformedPacket {
    data: Bytes,
    error: DecodeError,
    memo: Memo,
}

impl MalformedPacket {
    /// Copy `bytes[offset..offset + length]` (clamped) and keep `error`.
    pub fn new(bytes: &[u8], offset: usize, length: usize, error: DecodeError) -> Self {
        Self {
            data: Bytes::copy_from_slice(clamp(bytes, offset, length)),
            error,
            memo: Memo::new(),
        }
    }

    /// The undecodable bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Why decoding failed.
    pub fn error(&self) -> &DecodeError {
        &self.error
    }
}

impl Packet for MalformedPacket {
    packet_object_methods!("Malformed");

    fn header(&self) -> Option<&dyn Header> {
        None
    }

    fn payload(&self) -> Option<&dyn Packet> {
        None
    }

    /// Malformed data has no fields to edit, the builder carries the bytes
    /// over as an [`UnknownPacket`].
    fn builder(&self) -> Box<dyn PacketBuilder> {
        Box::new(UnknownPacketBuilder::new().data(self.data.to_vec()))
    }

    fn trailer_len(&self) -> usize {
        self.data.len()
    }

    fn write_trailer(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
    }

    fn raw_bytes(&self) -> &[u8] {
        &self.data
    }
}

value_eq!(Packet: UnknownPacket, MalformedPacket);
