//! ICMPv6 common header and the representative message bodies.

use std::net::{IpAddr, Ipv6Addr};

use crate::builder::{build_payload, ChecksumBuilder, FieldCheck, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{decode_boxed, Decode, DecodeCtx, PacketFactories};
use crate::ip::{IpProtocol, PseudoHeader};
use crate::memo::Memo;
use crate::packet::{Header, Packet};

enum_sim! {
    /// See https://www.iana.org/assignments/icmpv6-parameters/icmpv6-parameters.xhtml
    pub struct Icmpv6MsgType (u8) {
        /// Destination unreachable.
        DST_UNREACHABLE = 1,
        /// Packet too big.
        PKT_TOO_BIG = 2,
        /// Time exceeded.
        TIME_EXCEED =  3,
        /// Parameter problem.
        PARAM_PROBLEM = 4,
        /// Echo request.
        ECHO_REQUEST = 128,
        /// Echo reply.
        ECHO_REPLY =    129,
        /// Router solicitation.
        NDP_ROUTER_SOLICIT = 133,
        /// Router advertisement.
        NDP_ROUTER_ADV = 134,
        /// Neighbor solicitation.
        NDP_NEIGHBOR_SOLICIT = 135,
        /// Neighbor advertisement.
        NDP_NEIGHBOR_ADV = 136,
        /// Redirect.
        NDP_REDIRECT = 137,
    }
}

mod echo;
pub use echo::{Icmpv6EchoHeader, Icmpv6EchoPacket, Icmpv6EchoPacketBuilder, ICMPV6_ECHO_HEADER_LEN};

pub mod ndp;

/// Length of the ICMPv6 common header.
pub const ICMPV6_HEADER_LEN: usize = 4;

const PROTOCOL: &str = "ICMPv6";

fn calc_checksum(src: Ipv6Addr, dst: Ipv6Addr, segments: &[&[u8]]) -> Option<u16> {
    let length = segments.iter().map(|s| s.len()).sum();
    PseudoHeader::new(IpAddr::V6(src), IpAddr::V6(dst), IpProtocol::ICMPV6, length)
        .map(|ph| ph.checksum(segments))
}

/// Type, code and checksum.
#[derive(Debug, Clone)]
pub struct Icmpv6CommonHeader {
    icmp_type: Icmpv6MsgType,
    code: u8,
    checksum: u16,
    memo: Memo,
}

impl Icmpv6CommonHeader {
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(ICMPV6_HEADER_LEN)?;
        Ok(Self {
            icmp_type: r.u8(0)?.into(),
            code: r.u8(1)?,
            checksum: r.u16(2)?,
            memo: Memo::new(),
        })
    }

    /// Message type.
    pub fn icmp_type(&self) -> Icmpv6MsgType {
        self.icmp_type
    }

    /// Message code.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Checksum, as found.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }
}

impl Header for Icmpv6CommonHeader {
    header_object_methods!(PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.icmp_type.raw());
        out.push(self.code);
        out.extend_from_slice(&self.checksum.to_be_bytes());
    }

    fn calc_length(&self) -> usize {
        ICMPV6_HEADER_LEN
    }
}

/// An ICMPv6 message. The body is dispatched on the message type.
#[derive(Debug, Clone)]
pub struct Icmpv6CommonPacket {
    header: Icmpv6CommonHeader,
    payload: Option<Box<dyn Packet>>,
    memo: Memo,
}

impl Icmpv6CommonPacket {
    /// The common header.
    pub fn header(&self) -> &Icmpv6CommonHeader {
        &self.header
    }

    /// Message type.
    pub fn icmp_type(&self) -> Icmpv6MsgType {
        self.header.icmp_type
    }

    /// Whether the checksum matches the message under the pseudo-header of
    /// `src` and `dst`.
    pub fn has_valid_checksum(&self, src: Ipv6Addr, dst: Ipv6Addr) -> bool {
        calc_checksum(src, dst, &[self.raw_bytes()]) == Some(0)
    }

    /// A builder holding the fields of this packet.
    ///
    /// The addresses are not part of the message, set them before enabling
    /// checksum correction.
    pub fn to_builder(&self) -> Icmpv6CommonPacketBuilder {
        Icmpv6CommonPacketBuilder {
            icmp_type: Some(self.header.icmp_type),
            code: Some(self.header.code),
            checksum: Some(self.header.checksum),
            src_addr: None,
            dst_addr: None,
            payload: self.payload.as_ref().map(|p| p.builder()),
            correct_checksum_at_build: false,
        }
    }
}

impl Decode for Icmpv6CommonPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(PROTOCOL, bytes, offset, length)?;
        let header = Icmpv6CommonHeader::parse(&r)?;
        let payload = ctx.decode_payload(
            &ctx.factories().icmpv6_types,
            header.icmp_type,
            bytes,
            offset + ICMPV6_HEADER_LEN,
            r.len() - ICMPV6_HEADER_LEN,
        );
        Ok(Self {
            header,
            payload,
            memo: Memo::new(),
        })
    }
}

impl Packet for Icmpv6CommonPacket {
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
}

value_eq!(Header: Icmpv6CommonHeader);
value_eq!(Packet: Icmpv6CommonPacket);

/// Builds an [`Icmpv6CommonPacket`].
#[derive(Debug, Default)]
pub struct Icmpv6CommonPacketBuilder {
    icmp_type: Option<Icmpv6MsgType>,
    code: Option<u8>,
    checksum: Option<u16>,
    src_addr: Option<Ipv6Addr>,
    dst_addr: Option<Ipv6Addr>,
    payload: Option<Box<dyn PacketBuilder>>,
    correct_checksum_at_build: bool,
}

impl Icmpv6CommonPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message type. Required.
    pub fn icmp_type(mut self, value: Icmpv6MsgType) -> Self {
        self.icmp_type = Some(value);
        self
    }

    /// Set the code. Required.
    pub fn code(mut self, value: u8) -> Self {
        self.code = Some(value);
        self
    }

    /// Set the checksum. Required unless the checksum is corrected.
    pub fn checksum(mut self, value: u16) -> Self {
        self.checksum = Some(value);
        self
    }

    /// Source address of the enclosing IPv6 packet, used for checksum correction.
    pub fn src_addr(mut self, value: Ipv6Addr) -> Self {
        self.src_addr = Some(value);
        self
    }

    /// Destination address of the enclosing IPv6 packet, used for checksum correction.
    pub fn dst_addr(mut self, value: Ipv6Addr) -> Self {
        self.dst_addr = Some(value);
        self
    }

    /// Set the message body builder.
    pub fn payload(mut self, value: impl PacketBuilder + 'static) -> Self {
        self.payload = Some(Box::new(value));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Icmpv6CommonPacket, BuildError> {
        let mut check = FieldCheck::new(PROTOCOL);
        let icmp_type = check.require_or("icmp_type", self.icmp_type, Icmpv6MsgType::from(0));
        let code = check.require("code", self.code);
        let addrs = if self.correct_checksum_at_build {
            Some((
                check.require_or("src_addr", self.src_addr, Ipv6Addr::UNSPECIFIED),
                check.require_or("dst_addr", self.dst_addr, Ipv6Addr::UNSPECIFIED),
            ))
        } else {
            None
        };
        let checksum = if addrs.is_some() {
            0
        } else {
            check.require("checksum", self.checksum)
        };
        check.finish()?;

        let payload = build_payload(PROTOCOL, self.payload)?;
        let mut header = Icmpv6CommonHeader {
            icmp_type,
            code,
            checksum,
            memo: Memo::new(),
        };
        if let Some((src, dst)) = addrs {
            let body = payload.as_ref().map_or(&[][..], |p| p.raw_bytes());
            let mut check = FieldCheck::new(PROTOCOL);
            let total = ICMPV6_HEADER_LEN + body.len();
            check.max("length", total as u64, u32::MAX as u64);
            check.finish()?;
            let checksum = calc_checksum(src, dst, &[header.raw_bytes(), body]).unwrap_or(0);
            header = Icmpv6CommonHeader {
                checksum,
                memo: Memo::new(),
                ..header
            };
        }

        Ok(Icmpv6CommonPacket {
            header,
            payload,
            memo: Memo::new(),
        })
    }
}

impl ChecksumBuilder for Icmpv6CommonPacketBuilder {
    fn correct_checksum_at_build(mut self, value: bool) -> Self {
        self.correct_checksum_at_build = value;
        self
    }
}

packet_builder!(Icmpv6CommonPacketBuilder, PROTOCOL, payload);

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .ip_numbers
        .register(IpProtocol::ICMPV6, decode_boxed::<Icmpv6CommonPacket>);
    factories
        .icmpv6_types
        .register(Icmpv6MsgType::ECHO_REQUEST, decode_boxed::<Icmpv6EchoPacket>)
        .register(Icmpv6MsgType::ECHO_REPLY, decode_boxed::<Icmpv6EchoPacket>)
        .register(
            Icmpv6MsgType::NDP_NEIGHBOR_SOLICIT,
            decode_boxed::<ndp::NeighborSolicitationPacket>,
        )
        .register(
            Icmpv6MsgType::NDP_NEIGHBOR_ADV,
            decode_boxed::<ndp::NeighborAdvertisementPacket>,
        );
    ndp::register_options(factories);
}
