//! GTPv1-U, TS 29.281.
//!
//! The optional sequence number, N-PDU number and next extension type are
//! present when any of the E, S or PN flags is set. Extension headers form a
//! chain, each announcing the type of the next one; the chain is decoded
//! through the `gtpv1_extensions` registry. A G-PDU carries an IP packet
//! dispatched on its version nibble.

use crate::bits::BitField;
use crate::builder::{build_payload, FieldCheck, LengthBuilder, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{decode_boxed, Decode, DecodeCtx, PacketFactories};
use crate::ip::IpVersion;
use crate::memo::Memo;
use crate::opaque::UnknownPacket;
use crate::packet::{Header, Packet};

mod ext;
pub use ext::{
    decode_unknown_extension, DlPduSessionInfo, GtpExtension, GtpExtensionType, PduSessionInfo,
    UlPduSessionInfo, UlTimeStamps, PDU_TYPE_DL, PDU_TYPE_UL,
};

enum_sim! {
    /// GTPv1-U message types.
    pub struct GtpV1MsgType (u8) {
        /// Echo request.
        ECHO_REQUEST = 1,
        /// Echo response.
        ECHO_RESPONSE = 2,
        /// Error indication.
        ERROR_INDICATION = 26,
        /// Supported extension headers notification.
        SUPPORTED_EXT_HEADERS_NOTIFICATION = 31,
        /// End marker.
        END_MARKER = 254,
        /// Encapsulated user data.
        G_PDU = 255,
    }
}

/// Length of the mandatory part of the header.
pub const GTPV1_HEADER_LEN: usize = 8;
/// Length of the optional sequence number, N-PDU number and next type.
pub const GTPV1_OPTIONAL_LEN: usize = 4;
/// The registered GTP-U port.
pub const GTPV1_U_PORT: u16 = 2152;

const VERSION: BitField = BitField::new(5, 3);
const PROTOCOL_TYPE: BitField = BitField::flag(4);
const RESERVED: BitField = BitField::flag(3);
const EXT_FLAG: BitField = BitField::flag(2);
const SEQ_FLAG: BitField = BitField::flag(1);
const NPDU_FLAG: BitField = BitField::flag(0);

const PROTOCOL: &str = "GTPv1";

/// The GTPv1 header with its extension headers.
#[derive(Debug, Clone)]
pub struct GtpV1Header {
    version: u8,
    protocol_type: bool,
    reserved: bool,
    ext_flag: bool,
    seq_flag: bool,
    npdu_flag: bool,
    message_type: GtpV1MsgType,
    length: u16,
    teid: u32,
    sequence_number: u16,
    npdu_number: u8,
    next_ext_type: GtpExtensionType,
    extensions: Vec<GtpExtension>,
    chain_tail: GtpExtensionType,
    truncated: bool,
    memo: Memo,
}

impl GtpV1Header {
    fn has_optional(&self) -> bool {
        self.ext_flag || self.seq_flag || self.npdu_flag
    }

    /// Version, 1 for GTPv1.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The PT flag: GTP rather than GTP'.
    pub fn protocol_type(&self) -> bool {
        self.protocol_type
    }

    /// The reserved bit, kept as found.
    pub fn reserved(&self) -> bool {
        self.reserved
    }

    /// The E flag.
    pub fn ext_flag(&self) -> bool {
        self.ext_flag
    }

    /// The S flag.
    pub fn seq_flag(&self) -> bool {
        self.seq_flag
    }

    /// The PN flag.
    pub fn npdu_flag(&self) -> bool {
        self.npdu_flag
    }

    /// Message type.
    pub fn message_type(&self) -> GtpV1MsgType {
        self.message_type
    }

    /// Length of everything after the mandatory header, as found.
    pub fn length_field(&self) -> u16 {
        self.length
    }

    /// Tunnel endpoint identifier.
    pub fn teid(&self) -> u32 {
        self.teid
    }

    /// Sequence number, when the S flag is set.
    pub fn sequence_number(&self) -> Option<u16> {
        self.seq_flag.then_some(self.sequence_number)
    }

    /// N-PDU number, when the PN flag is set.
    pub fn npdu_number(&self) -> Option<u8> {
        self.npdu_flag.then_some(self.npdu_number)
    }

    /// Type of the first extension header.
    pub fn next_ext_type(&self) -> GtpExtensionType {
        self.next_ext_type
    }

    /// The decoded extension headers.
    pub fn extensions(&self) -> &[GtpExtension] {
        &self.extensions
    }

    /// Whether decoding stopped at an undecodable extension header.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Header for GtpV1Header {
    header_object_methods!(PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        let mut flags = VERSION.put(0, self.version as u32);
        flags = PROTOCOL_TYPE.put_flag(flags, self.protocol_type);
        flags = RESERVED.put_flag(flags, self.reserved);
        flags = EXT_FLAG.put_flag(flags, self.ext_flag);
        flags = SEQ_FLAG.put_flag(flags, self.seq_flag);
        flags = NPDU_FLAG.put_flag(flags, self.npdu_flag);
        out.push(flags as u8);
        out.push(self.message_type.raw());
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.teid.to_be_bytes());
        if self.has_optional() {
            out.extend_from_slice(&self.sequence_number.to_be_bytes());
            out.push(self.npdu_number);
            out.push(self.next_ext_type.raw());
        }
        for (i, ext) in self.extensions.iter().enumerate() {
            let next = self
                .extensions
                .get(i + 1)
                .map_or(self.chain_tail, |e| e.ext_type());
            ext.write_to(next, out);
        }
    }

    fn calc_length(&self) -> usize {
        let optional = if self.has_optional() {
            GTPV1_OPTIONAL_LEN
        } else {
            0
        };
        GTPV1_HEADER_LEN + optional + self.extensions.iter().map(|e| e.length()).sum::<usize>()
    }
}

/// A GTPv1-U message.
#[derive(Debug, Clone)]
pub struct GtpV1Packet {
    header: GtpV1Header,
    payload: Option<Box<dyn Packet>>,
    trailer: Vec<u8>,
    memo: Memo,
}

impl GtpV1Packet {
    /// The GTPv1 header.
    pub fn header(&self) -> &GtpV1Header {
        &self.header
    }

    /// Message type.
    pub fn message_type(&self) -> GtpV1MsgType {
        self.header.message_type
    }

    /// Tunnel endpoint identifier.
    pub fn teid(&self) -> u32 {
        self.header.teid
    }

    /// The decoded extension headers.
    pub fn extensions(&self) -> &[GtpExtension] {
        &self.header.extensions
    }

    /// Bytes following the message inside the enclosing window.
    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> GtpV1PacketBuilder {
        let h = &self.header;
        GtpV1PacketBuilder {
            version: h.version,
            protocol_type: h.protocol_type,
            reserved: h.reserved,
            ext_flag: Some(h.ext_flag),
            seq_flag: h.seq_flag,
            npdu_flag: h.npdu_flag,
            message_type: Some(h.message_type),
            length: Some(h.length),
            teid: Some(h.teid),
            sequence_number: h.sequence_number,
            npdu_number: h.npdu_number,
            next_ext_type: Some(h.next_ext_type),
            extensions: h.extensions.clone(),
            chain_tail: h.chain_tail,
            payload: self.payload.as_ref().map(|p| p.builder()),
            trailer: self.trailer.clone(),
            correct_length_at_build: false,
        }
    }
}

impl Decode for GtpV1Packet {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(PROTOCOL, bytes, offset, length)?;
        r.require(GTPV1_HEADER_LEN)?;
        let flags = r.u8(0)? as u32;
        let mut header = GtpV1Header {
            version: VERSION.get(flags) as u8,
            protocol_type: PROTOCOL_TYPE.is_set(flags),
            reserved: RESERVED.is_set(flags),
            ext_flag: EXT_FLAG.is_set(flags),
            seq_flag: SEQ_FLAG.is_set(flags),
            npdu_flag: NPDU_FLAG.is_set(flags),
            message_type: r.u8(1)?.into(),
            length: r.u16(2)?,
            teid: r.u32(4)?,
            sequence_number: 0,
            npdu_number: 0,
            next_ext_type: GtpExtensionType::NO_MORE,
            extensions: Vec::new(),
            chain_tail: GtpExtensionType::NO_MORE,
            truncated: false,
            memo: Memo::new(),
        };

        let mut at = GTPV1_HEADER_LEN;
        if header.has_optional() {
            r.require(GTPV1_HEADER_LEN + GTPV1_OPTIONAL_LEN)?;
            header.sequence_number = r.u16(8)?;
            header.npdu_number = r.u8(10)?;
            header.next_ext_type = r.u8(11)?.into();
            at += GTPV1_OPTIONAL_LEN;
        }

        let declared = GTPV1_HEADER_LEN + header.length as usize;
        let extent = if declared > r.len() {
            tracing::debug!(
                protocol = PROTOCOL,
                offset,
                declared,
                available = r.len(),
                "message exceeds captured data"
            );
            r.len()
        } else {
            declared
        };
        let extent = extent.max(at);

        if header.ext_flag {
            let (extensions, tail, truncated) = ext::decode_extensions(
                bytes,
                offset + at,
                extent - at,
                header.next_ext_type,
                ctx,
            );
            at += extensions.iter().map(|e| e.length()).sum::<usize>();
            header.extensions = extensions;
            header.chain_tail = tail;
            header.truncated = truncated;
        }

        let payload_len = extent - at;
        let payload: Option<Box<dyn Packet>> = if payload_len == 0 {
            None
        } else if header.message_type == GtpV1MsgType::G_PDU && !header.truncated {
            let version = IpVersion::from(r.u8(at)? >> 4);
            ctx.decode_payload(
                &ctx.factories().ip_versions,
                version,
                bytes,
                offset + at,
                payload_len,
            )
        } else {
            Some(Box::new(UnknownPacket::new(bytes, offset + at, payload_len)))
        };

        Ok(Self {
            header,
            payload,
            trailer: r.rest(extent)?.to_vec(),
            memo: Memo::new(),
        })
    }
}

impl Packet for GtpV1Packet {
    packet_object_methods!(PROTOCOL);

    fn header(&self) -> Option<&dyn Header> {
        Some(&self.header)
    }

    fn payload(&self) -> Option<&dyn Packet> {
        self.payload.as_deref()
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

value_eq!(Header: GtpV1Header);
value_eq!(Packet: GtpV1Packet);

/// Builds a [`GtpV1Packet`].
#[derive(Debug)]
pub struct GtpV1PacketBuilder {
    version: u8,
    protocol_type: bool,
    reserved: bool,
    ext_flag: Option<bool>,
    seq_flag: bool,
    npdu_flag: bool,
    message_type: Option<GtpV1MsgType>,
    length: Option<u16>,
    teid: Option<u32>,
    sequence_number: u16,
    npdu_number: u8,
    next_ext_type: Option<GtpExtensionType>,
    extensions: Vec<GtpExtension>,
    chain_tail: GtpExtensionType,
    payload: Option<Box<dyn PacketBuilder>>,
    trailer: Vec<u8>,
    correct_length_at_build: bool,
}

impl Default for GtpV1PacketBuilder {
    fn default() -> Self {
        Self {
            version: 1,
            protocol_type: true,
            reserved: false,
            ext_flag: None,
            seq_flag: false,
            npdu_flag: false,
            message_type: None,
            length: None,
            teid: None,
            sequence_number: 0,
            npdu_number: 0,
            next_ext_type: None,
            extensions: Vec::new(),
            chain_tail: GtpExtensionType::NO_MORE,
            payload: None,
            trailer: Vec::new(),
            correct_length_at_build: false,
        }
    }
}

impl GtpV1PacketBuilder {
    /// A builder for a GTPv1 (version 1, PT set) message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the 3-bit version. Defaults to 1.
    pub fn version(mut self, value: u8) -> Self {
        self.version = value;
        self
    }

    /// Set the PT flag. Defaults to set.
    pub fn protocol_type(mut self, value: bool) -> Self {
        self.protocol_type = value;
        self
    }

    /// Set the reserved bit. Defaults to clear.
    pub fn reserved(mut self, value: bool) -> Self {
        self.reserved = value;
        self
    }

    /// Set the E flag. Defaults to set exactly when extensions are present.
    pub fn ext_flag(mut self, value: bool) -> Self {
        self.ext_flag = Some(value);
        self
    }

    /// Set the message type. Required.
    pub fn message_type(mut self, value: GtpV1MsgType) -> Self {
        self.message_type = Some(value);
        self
    }

    /// Set the length field. Required unless the length is corrected.
    pub fn length(mut self, value: u16) -> Self {
        self.length = Some(value);
        self
    }

    /// Set the tunnel endpoint identifier. Required.
    pub fn teid(mut self, value: u32) -> Self {
        self.teid = Some(value);
        self
    }

    /// Set the sequence number and the S flag.
    pub fn sequence_number(mut self, value: u16) -> Self {
        self.sequence_number = value;
        self.seq_flag = true;
        self
    }

    /// Set the N-PDU number and the PN flag.
    pub fn npdu_number(mut self, value: u8) -> Self {
        self.npdu_number = value;
        self.npdu_flag = true;
        self
    }

    /// Set the next extension header type of the optional word.
    ///
    /// Only used when no extension headers are set; otherwise the type of the
    /// first extension is written.
    pub fn next_ext_type(mut self, value: GtpExtensionType) -> Self {
        self.next_ext_type = Some(value);
        self
    }

    /// Set the next extension header type written by the last extension.
    /// Defaults to no more extensions.
    pub fn chain_tail(mut self, value: GtpExtensionType) -> Self {
        self.chain_tail = value;
        self
    }

    /// Append an extension header.
    pub fn extension(mut self, value: GtpExtension) -> Self {
        self.extensions.push(value);
        self
    }

    /// Replace the extension headers.
    pub fn extensions(mut self, value: Vec<GtpExtension>) -> Self {
        self.extensions = value;
        self
    }

    /// Set the payload builder.
    pub fn payload(mut self, value: impl PacketBuilder + 'static) -> Self {
        self.payload = Some(Box::new(value));
        self
    }

    /// Set bytes written after the message.
    pub fn trailer(mut self, value: Vec<u8>) -> Self {
        self.trailer = value;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<GtpV1Packet, BuildError> {
        let mut check = FieldCheck::new(PROTOCOL);
        let version = check.bits("version", self.version as u32, VERSION) as u8;
        let message_type = check.require_or("message_type", self.message_type, GtpV1MsgType::G_PDU);
        let teid = check.require("teid", self.teid);
        let length = if self.correct_length_at_build {
            None
        } else {
            Some(check.require("length", self.length))
        };
        let ext_flag = self.ext_flag.unwrap_or(!self.extensions.is_empty());
        if !ext_flag && !self.extensions.is_empty() {
            check.invalid("ext_flag", "extension headers need the E flag");
        }
        for ext in &self.extensions {
            if ext.length() % 4 != 0 {
                check.invalid("extension length", "not a multiple of 4 octets");
            }
            check.max("extension length", (ext.length() / 4) as u64, u8::MAX as u64);
        }
        check.finish()?;

        let payload = build_payload(PROTOCOL, self.payload)?;
        let mut header = GtpV1Header {
            version,
            protocol_type: self.protocol_type,
            reserved: self.reserved,
            ext_flag,
            seq_flag: self.seq_flag,
            npdu_flag: self.npdu_flag,
            message_type,
            length: 0,
            teid,
            sequence_number: self.sequence_number,
            npdu_number: self.npdu_number,
            next_ext_type: self.extensions.first().map_or(
                self.next_ext_type.unwrap_or(GtpExtensionType::NO_MORE),
                |e| e.ext_type(),
            ),
            extensions: self.extensions,
            chain_tail: self.chain_tail,
            truncated: false,
            memo: Memo::new(),
        };
        header.length = match length {
            Some(length) => length,
            None => {
                let total = header.calc_length() - GTPV1_HEADER_LEN
                    + payload.as_ref().map_or(0, |p| p.length());
                let mut check = FieldCheck::new(PROTOCOL);
                check.max("length", total as u64, u16::MAX as u64);
                check.finish()?;
                total as u16
            }
        };

        Ok(GtpV1Packet {
            header,
            payload,
            trailer: self.trailer,
            memo: Memo::new(),
        })
    }
}

impl LengthBuilder for GtpV1PacketBuilder {
    fn correct_length_at_build(mut self, value: bool) -> Self {
        self.correct_length_at_build = value;
        self
    }
}

packet_builder!(GtpV1PacketBuilder, PROTOCOL, payload);

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .udp_ports
        .register(GTPV1_U_PORT, decode_boxed::<GtpV1Packet>);
    ext::register(factories);
}
