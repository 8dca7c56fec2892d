//! SCTP common header and chunk list, RFC 9260.
//!
//! Chunks are kept generic (type, flags, value). The checksum is CRC-32C by
//! default and Adler-32 when [`SctpChecksum::Adler32`] is configured.

use crate::builder::{ChecksumBuilder, FieldCheck, PacketBuilder};
use crate::checksum_utils;
use crate::codec::Reader;
use crate::config::{DissectConfig, SctpChecksum};
use crate::error::{BuildError, DecodeError};
use crate::factory::{decode_boxed, Decode, DecodeCtx, PacketFactories};
use crate::ip::IpProtocol;
use crate::memo::Memo;
use crate::packet::{Header, Packet};

enum_sim! {
    /// Chunk types of RFC 9260.
    pub struct SctpChunkType (u8) {
        /// Payload data.
        DATA = 0,
        /// Initiation.
        INIT = 1,
        /// Initiation acknowledgement.
        INIT_ACK = 2,
        /// Selective acknowledgement.
        SACK = 3,
        /// Heartbeat request.
        HEARTBEAT = 4,
        /// Heartbeat acknowledgement.
        HEARTBEAT_ACK = 5,
        /// Abort.
        ABORT = 6,
        /// Shutdown.
        SHUTDOWN = 7,
        /// Shutdown acknowledgement.
        SHUTDOWN_ACK = 8,
        /// Operation error.
        ERROR = 9,
        /// State cookie.
        COOKIE_ECHO = 10,
        /// Cookie acknowledgement.
        COOKIE_ACK = 11,
        /// Shutdown complete.
        SHUTDOWN_COMPLETE = 14,
    }
}

/// Length of the SCTP common header.
pub const SCTP_HEADER_LEN: usize = 12;
/// Length of a chunk header.
pub const SCTP_CHUNK_HEADER_LEN: usize = 4;

const CHECKSUM_AT: usize = 8;

const PROTOCOL: &str = "SCTP";

/// One chunk. `padding` holds the bytes that align the next chunk to four
/// octets, as found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SctpChunk {
    chunk_type: SctpChunkType,
    flags: u8,
    length: u16,
    value: Vec<u8>,
    padding: Vec<u8>,
}

impl SctpChunk {
    /// A chunk with a correct length field and zero padding.
    pub fn new(chunk_type: SctpChunkType, flags: u8, value: impl Into<Vec<u8>>) -> Self {
        let value = value.into();
        let length = (SCTP_CHUNK_HEADER_LEN + value.len()).min(u16::MAX as usize) as u16;
        let padding = vec![0; (4 - value.len() % 4) % 4];
        Self {
            chunk_type,
            flags,
            length,
            value,
            padding,
        }
    }

    /// Chunk type.
    pub fn chunk_type(&self) -> SctpChunkType {
        self.chunk_type
    }

    /// Chunk flags.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// The length field: header and value, without padding.
    pub fn length_field(&self) -> u16 {
        self.length
    }

    /// Chunk value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Alignment bytes after the value.
    pub fn padding(&self) -> &[u8] {
        &self.padding
    }

    /// Number of bytes the chunk occupies on the wire.
    pub fn length(&self) -> usize {
        SCTP_CHUNK_HEADER_LEN + self.value.len() + self.padding.len()
    }

    /// Append the wire representation.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.chunk_type.raw());
        out.push(self.flags);
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.value);
        out.extend_from_slice(&self.padding);
    }

    fn decode(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(SCTP_CHUNK_HEADER_LEN)?;
        let length = r.u16(2)?;
        let len = length as usize;
        if len < SCTP_CHUNK_HEADER_LEN {
            return Err(r.invalid(2, "chunk length", len as u64));
        }
        if len > r.len() {
            return Err(r.inconsistent(2, "chunk length", len));
        }
        // the padding of the last chunk may be missing from a capture
        let pad_len = ((4 - len % 4) % 4).min(r.len() - len);
        Ok(Self {
            chunk_type: r.u8(0)?.into(),
            flags: r.u8(1)?,
            length,
            value: r.slice(SCTP_CHUNK_HEADER_LEN, len - SCTP_CHUNK_HEADER_LEN)?.to_vec(),
            padding: r.slice(len, pad_len)?.to_vec(),
        })
    }
}

/// Ports, verification tag, checksum and chunks.
#[derive(Debug, Clone)]
pub struct SctpHeader {
    src_port: u16,
    dst_port: u16,
    verification_tag: u32,
    checksum: u32,
    chunks: Vec<SctpChunk>,
    truncated: bool,
    memo: Memo,
}

impl SctpHeader {
    /// Source port.
    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    /// Destination port.
    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    /// Verification tag.
    pub fn verification_tag(&self) -> u32 {
        self.verification_tag
    }

    /// The checksum field read in network byte order.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// The decoded chunks.
    pub fn chunks(&self) -> &[SctpChunk] {
        &self.chunks
    }

    /// Whether decoding stopped at an undecodable chunk.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Header for SctpHeader {
    header_object_methods!(PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.src_port.to_be_bytes());
        out.extend_from_slice(&self.dst_port.to_be_bytes());
        out.extend_from_slice(&self.verification_tag.to_be_bytes());
        out.extend_from_slice(&self.checksum.to_be_bytes());
        for chunk in &self.chunks {
            chunk.write_to(out);
        }
    }

    fn calc_length(&self) -> usize {
        SCTP_HEADER_LEN + self.chunks.iter().map(|c| c.length()).sum::<usize>()
    }
}

// The checksum field value `algorithm` yields for `packet`, whose own
// checksum field is ignored.
fn calc_checksum(algorithm: SctpChecksum, packet: &[u8]) -> u32 {
    let mut data = packet.to_vec();
    if let Some(field) = data.get_mut(CHECKSUM_AT..CHECKSUM_AT + 4) {
        field.fill(0);
    }
    match algorithm {
        // CRC-32C goes on the wire least significant byte first
        SctpChecksum::Crc32c => checksum_utils::crc32c(&data).swap_bytes(),
        SctpChecksum::Adler32 => checksum_utils::adler32(&data),
    }
}

/// An SCTP packet.
///
/// Bytes after the last decodable chunk are kept as a trailer.
#[derive(Debug, Clone)]
pub struct SctpPacket {
    header: SctpHeader,
    trailer: Vec<u8>,
    algorithm: SctpChecksum,
    memo: Memo,
}

impl SctpPacket {
    /// The common header and chunks.
    pub fn header(&self) -> &SctpHeader {
        &self.header
    }

    /// Source port.
    pub fn src_port(&self) -> u16 {
        self.header.src_port
    }

    /// Destination port.
    pub fn dst_port(&self) -> u16 {
        self.header.dst_port
    }

    /// The decoded chunks.
    pub fn chunks(&self) -> &[SctpChunk] {
        &self.header.chunks
    }

    /// Bytes following the chunk list.
    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    /// The checksum algorithm in effect when the packet was decoded or built.
    pub fn checksum_algorithm(&self) -> SctpChecksum {
        self.algorithm
    }

    /// Whether the checksum matches the packet.
    ///
    /// A zero checksum is accepted only when `accept_zero` is set.
    pub fn has_valid_checksum(&self, accept_zero: bool) -> bool {
        self.has_valid_checksum_with(self.algorithm, accept_zero)
    }

    /// Same as [`SctpPacket::has_valid_checksum`] with an explicit algorithm.
    pub fn has_valid_checksum_with(&self, algorithm: SctpChecksum, accept_zero: bool) -> bool {
        if self.header.checksum == 0 && accept_zero {
            return true;
        }
        calc_checksum(algorithm, self.raw_bytes()) == self.header.checksum
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> SctpPacketBuilder {
        let h = &self.header;
        SctpPacketBuilder {
            src_port: Some(h.src_port),
            dst_port: Some(h.dst_port),
            verification_tag: Some(h.verification_tag),
            checksum: Some(h.checksum),
            chunks: h.chunks.clone(),
            algorithm: Some(self.algorithm),
            correct_checksum_at_build: false,
        }
    }
}

impl Decode for SctpPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(PROTOCOL, bytes, offset, length)?;
        r.require(SCTP_HEADER_LEN)?;

        let mut chunks = Vec::new();
        let mut at = SCTP_HEADER_LEN;
        let mut truncated = false;
        while at < r.len() {
            let chunk_r = r.sub("SCTP chunk", at, r.len() - at)?;
            match SctpChunk::decode(&chunk_r) {
                Ok(chunk) => {
                    at += chunk.length();
                    chunks.push(chunk);
                }
                Err(error) => {
                    tracing::warn!(
                        protocol = PROTOCOL,
                        offset = offset + at,
                        %error,
                        "chunk list truncated"
                    );
                    truncated = true;
                    break;
                }
            }
        }

        Ok(Self {
            header: SctpHeader {
                src_port: r.u16(0)?,
                dst_port: r.u16(2)?,
                verification_tag: r.u32(4)?,
                checksum: r.u32(CHECKSUM_AT)?,
                chunks,
                truncated,
                memo: Memo::new(),
            },
            trailer: r.rest(at)?.to_vec(),
            algorithm: ctx.config().get_sctp_checksum(),
            memo: Memo::new(),
        })
    }
}

impl Packet for SctpPacket {
    packet_object_methods!(PROTOCOL);

    fn header(&self) -> Option<&dyn Header> {
        Some(&self.header)
    }

    fn payload(&self) -> Option<&dyn Packet> {
        None
    }

    fn builder(&self) -> Box<dyn PacketBuilder> {
        Box::new(self.to_builder())
    }

    fn trailer_len(&self) -> usize {
        self.trailer.len()
    }

    fn write_trailer(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.trailer);
    }
}

value_eq!(Header: SctpHeader);
value_eq!(Packet: SctpPacket);

/// Builds an [`SctpPacket`].
#[derive(Debug, Default)]
pub struct SctpPacketBuilder {
    src_port: Option<u16>,
    dst_port: Option<u16>,
    verification_tag: Option<u32>,
    checksum: Option<u32>,
    chunks: Vec<SctpChunk>,
    algorithm: Option<SctpChecksum>,
    correct_checksum_at_build: bool,
}

impl SctpPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source port. Required.
    pub fn src_port(mut self, value: u16) -> Self {
        self.src_port = Some(value);
        self
    }

    /// Set the destination port. Required.
    pub fn dst_port(mut self, value: u16) -> Self {
        self.dst_port = Some(value);
        self
    }

    /// Set the verification tag. Required.
    pub fn verification_tag(mut self, value: u32) -> Self {
        self.verification_tag = Some(value);
        self
    }

    /// Set the checksum field. Required unless the checksum is corrected.
    pub fn checksum(mut self, value: u32) -> Self {
        self.checksum = Some(value);
        self
    }

    /// Append a chunk.
    pub fn chunk(mut self, value: SctpChunk) -> Self {
        self.chunks.push(value);
        self
    }

    /// Replace the chunk list.
    pub fn chunks(mut self, value: Vec<SctpChunk>) -> Self {
        self.chunks = value;
        self
    }

    /// Override the process-wide checksum algorithm.
    pub fn checksum_algorithm(mut self, value: SctpChecksum) -> Self {
        self.algorithm = Some(value);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<SctpPacket, BuildError> {
        let mut check = FieldCheck::new(PROTOCOL);
        let src_port = check.require("src_port", self.src_port);
        let dst_port = check.require("dst_port", self.dst_port);
        let verification_tag = check.require("verification_tag", self.verification_tag);
        let checksum = if self.correct_checksum_at_build {
            0
        } else {
            check.require("checksum", self.checksum)
        };
        for chunk in &self.chunks {
            check.max(
                "chunk length",
                (SCTP_CHUNK_HEADER_LEN + chunk.value.len()) as u64,
                u16::MAX as u64,
            );
        }
        check.finish()?;

        let algorithm = self
            .algorithm
            .unwrap_or_else(|| DissectConfig::global().get_sctp_checksum());
        let mut header = SctpHeader {
            src_port,
            dst_port,
            verification_tag,
            checksum,
            chunks: self.chunks,
            truncated: false,
            memo: Memo::new(),
        };
        if self.correct_checksum_at_build {
            let checksum = calc_checksum(algorithm, header.raw_bytes());
            header = SctpHeader {
                checksum,
                memo: Memo::new(),
                ..header
            };
        }

        Ok(SctpPacket {
            header,
            trailer: Vec::new(),
            algorithm,
            memo: Memo::new(),
        })
    }
}

impl ChecksumBuilder for SctpPacketBuilder {
    fn correct_checksum_at_build(mut self, value: bool) -> Self {
        self.correct_checksum_at_build = value;
        self
    }
}

packet_builder!(SctpPacketBuilder, PROTOCOL);

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .ip_numbers
        .register(IpProtocol::SCTP, decode_boxed::<SctpPacket>);
}

#[cfg(test)]
mod tests {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::*;

    // INIT chunk from port 5000 to 5001, checksum computed with CRC-32C
    fn init_packet() -> SctpPacket {
        SctpPacketBuilder::new()
            .src_port(5000)
            .dst_port(5001)
            .verification_tag(0)
            .chunk(SctpChunk::new(
                SctpChunkType::INIT,
                0,
                vec![0x12, 0x34, 0x56, 0x78, 0, 0, 0x80, 0, 0, 10, 0, 10, 0, 0, 0, 1],
            ))
            .checksum_algorithm(SctpChecksum::Crc32c)
            .correct_checksum_at_build(true)
            .build()
            .unwrap()
    }

    #[test]
    fn crc32c_checksum() {
        let pkt = init_packet();
        assert!(pkt.has_valid_checksum(false));
        assert!(!pkt.has_valid_checksum_with(SctpChecksum::Adler32, false));

        let mut bytes = pkt.raw_data();
        assert_eq!(bytes.len(), 32);
        let config = DissectConfig::new().sctp_checksum(SctpChecksum::Crc32c);
        let factories = PacketFactories::with_defaults();
        let ctx = DecodeCtx::new(&factories, &config);
        let decoded = SctpPacket::decode_with(&bytes, 0, bytes.len(), &ctx).unwrap();
        assert_eq!(decoded, pkt);
        assert!(decoded.has_valid_checksum(false));

        bytes[20] ^= 0xff;
        let decoded = SctpPacket::decode_with(&bytes, 0, bytes.len(), &ctx).unwrap();
        assert!(!decoded.has_valid_checksum(false));
    }

    #[test]
    fn crc32c_byte_order() {
        let pkt = init_packet();
        let bytes = pkt.raw_data();
        let mut zeroed = bytes.clone();
        zeroed[8..12].fill(0);
        let crc = checksum_utils::crc32c(&zeroed);
        assert_eq!(&bytes[8..12], &crc.to_le_bytes());
        assert_eq!(NetworkEndian::read_u32(&bytes[8..12]), pkt.header().checksum());
    }

    #[test]
    fn adler32_checksum() {
        let pkt = SctpPacketBuilder::new()
            .src_port(1)
            .dst_port(2)
            .verification_tag(0xdeadbeef)
            .chunk(SctpChunk::new(SctpChunkType::COOKIE_ACK, 0, vec![]))
            .checksum_algorithm(SctpChecksum::Adler32)
            .correct_checksum_at_build(true)
            .build()
            .unwrap();
        let mut zeroed = pkt.raw_data();
        zeroed[8..12].fill(0);
        assert_eq!(pkt.header().checksum(), checksum_utils::adler32(&zeroed));
        assert!(pkt.has_valid_checksum(false));
    }

    #[test]
    fn zero_checksum() {
        let bytes = [0x13, 0x88, 0x13, 0x89, 0, 0, 0, 1, 0, 0, 0, 0];
        let pkt = SctpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert!(pkt.chunks().is_empty());
        assert!(pkt.has_valid_checksum(true));
        assert!(!pkt.has_valid_checksum(false));
    }

    #[test]
    fn chunk_padding_and_truncation() {
        let mut bytes = vec![0x13, 0x88, 0x13, 0x89, 0, 0, 0, 1, 0, 0, 0, 0];
        // DATA chunk with 5 value bytes and 3 bytes of padding
        bytes.extend_from_slice(&[0, 3, 0, 9, 1, 2, 3, 4, 5, 0, 0, 0]);
        // chunk claiming 2 bytes of length
        bytes.extend_from_slice(&[6, 0, 0, 2]);

        let pkt = SctpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(pkt.chunks().len(), 1);
        let chunk = &pkt.chunks()[0];
        assert_eq!(chunk.chunk_type(), SctpChunkType::DATA);
        assert_eq!(chunk.flags(), 3);
        assert_eq!(chunk.value(), &[1, 2, 3, 4, 5]);
        assert_eq!(chunk.padding(), &[0, 0, 0]);
        assert!(pkt.header().is_truncated());
        assert_eq!(pkt.trailer(), &[6, 0, 0, 2]);
        assert_eq!(pkt.raw_bytes(), &bytes[..]);
    }

    #[test]
    fn missing_padding_on_last_chunk() {
        let mut bytes = vec![0x13, 0x88, 0x13, 0x89, 0, 0, 0, 1, 0, 0, 0, 0];
        bytes.extend_from_slice(&[0, 3, 0, 6, 1, 2]);
        let pkt = SctpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert!(!pkt.header().is_truncated());
        assert!(pkt.chunks()[0].padding().is_empty());
        assert_eq!(pkt.raw_bytes(), &bytes[..]);
    }
}
