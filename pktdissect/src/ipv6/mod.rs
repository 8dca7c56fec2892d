//! IPv6 and its extension headers.

use std::net::Ipv6Addr;

use crate::bits::BitField;
use crate::builder::{build_payload, FieldCheck, LengthBuilder, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{decode_boxed, Decode, DecodeCtx, PacketFactories};
use crate::ip::{IpProtocol, IpVersion};
use crate::memo::Memo;
use crate::packet::{Header, Packet};

pub mod ext;

/// Length of the fixed IPv6 header.
pub const IPV6_HEADER_LEN: usize = 40;

const VERSION: BitField = BitField::new(28, 4);
const TRAFFIC_CLASS: BitField = BitField::new(20, 8);
const FLOW_LABEL: BitField = BitField::new(0, 20);

/// The fixed IPv6 header.
#[derive(Debug, Clone)]
pub struct Ipv6Header {
    version: u8,
    traffic_class: u8,
    flow_label: u32,
    payload_len: u16,
    next_header: IpProtocol,
    hop_limit: u8,
    src_addr: Ipv6Addr,
    dst_addr: Ipv6Addr,
    memo: Memo,
}

impl Ipv6Header {
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(IPV6_HEADER_LEN)?;
        let word = r.u32(0)?;
        Ok(Self {
            version: VERSION.get(word) as u8,
            traffic_class: TRAFFIC_CLASS.get(word) as u8,
            flow_label: FLOW_LABEL.get(word),
            payload_len: r.u16(4)?,
            next_header: r.u8(6)?.into(),
            hop_limit: r.u8(7)?,
            src_addr: r.ipv6_addr(8)?,
            dst_addr: r.ipv6_addr(24)?,
            memo: Memo::new(),
        })
    }

    /// The version nibble, as found on the wire.
    pub fn version(&self) -> IpVersion {
        self.version.into()
    }

    /// Traffic class.
    pub fn traffic_class(&self) -> u8 {
        self.traffic_class
    }

    /// The 20-bit flow label.
    pub fn flow_label(&self) -> u32 {
        self.flow_label
    }

    /// Declared payload length. Zero for jumbograms.
    pub fn payload_len(&self) -> u16 {
        self.payload_len
    }

    /// Type of the first extension header or upper-layer protocol.
    pub fn next_header(&self) -> IpProtocol {
        self.next_header
    }

    /// Hop limit.
    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    /// Source address.
    pub fn src_addr(&self) -> Ipv6Addr {
        self.src_addr
    }

    /// Destination address.
    pub fn dst_addr(&self) -> Ipv6Addr {
        self.dst_addr
    }
}

impl Header for Ipv6Header {
    header_object_methods!("IPv6");

    fn write_to(&self, out: &mut Vec<u8>) {
        let mut word = 0;
        word = VERSION.put(word, self.version as u32);
        word = TRAFFIC_CLASS.put(word, self.traffic_class as u32);
        word = FLOW_LABEL.put(word, self.flow_label);
        out.extend_from_slice(&word.to_be_bytes());
        out.extend_from_slice(&self.payload_len.to_be_bytes());
        out.push(self.next_header.raw());
        out.push(self.hop_limit);
        out.extend_from_slice(&self.src_addr.octets());
        out.extend_from_slice(&self.dst_addr.octets());
    }

    fn calc_length(&self) -> usize {
        IPV6_HEADER_LEN
    }
}

/// An IPv6 packet.
#[derive(Debug, Clone)]
pub struct Ipv6Packet {
    header: Ipv6Header,
    payload: Option<Box<dyn Packet>>,
    memo: Memo,
}

impl Ipv6Packet {
    /// The fixed header.
    pub fn header(&self) -> &Ipv6Header {
        &self.header
    }

    /// Source address.
    pub fn src_addr(&self) -> Ipv6Addr {
        self.header.src_addr
    }

    /// Destination address.
    pub fn dst_addr(&self) -> Ipv6Addr {
        self.header.dst_addr
    }

    /// Type of the payload.
    pub fn next_header(&self) -> IpProtocol {
        self.header.next_header
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> Ipv6PacketBuilder {
        let h = &self.header;
        Ipv6PacketBuilder {
            version: h.version,
            traffic_class: Some(h.traffic_class),
            flow_label: Some(h.flow_label),
            payload_len: Some(h.payload_len),
            next_header: Some(h.next_header),
            hop_limit: Some(h.hop_limit),
            src_addr: Some(h.src_addr),
            dst_addr: Some(h.dst_addr),
            payload: self.payload.as_ref().map(|p| p.builder()),
            correct_length_at_build: false,
        }
    }
}

impl Decode for Ipv6Packet {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new("IPv6", bytes, offset, length)?;
        let header = Ipv6Header::parse(&r)?;

        let available = r.len() - IPV6_HEADER_LEN;
        let payload_len = match header.payload_len as usize {
            // jumbogram, the real length is in a hop-by-hop option
            0 => available,
            declared if declared > available => {
                tracing::debug!(
                    protocol = "IPv6",
                    offset,
                    declared,
                    available,
                    "payload length exceeds captured data"
                );
                available
            }
            declared => declared,
        };

        let payload = ctx.decode_payload(
            &ctx.factories().ip_numbers,
            header.next_header,
            bytes,
            offset + IPV6_HEADER_LEN,
            payload_len,
        );

        Ok(Self {
            header,
            payload,
            memo: Memo::new(),
        })
    }
}

impl Packet for Ipv6Packet {
    packet_object_methods!("IPv6");

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

value_eq!(Header: Ipv6Header);
value_eq!(Packet: Ipv6Packet);

/// Builds an [`Ipv6Packet`].
#[derive(Debug)]
pub struct Ipv6PacketBuilder {
    version: u8,
    traffic_class: Option<u8>,
    flow_label: Option<u32>,
    payload_len: Option<u16>,
    next_header: Option<IpProtocol>,
    hop_limit: Option<u8>,
    src_addr: Option<Ipv6Addr>,
    dst_addr: Option<Ipv6Addr>,
    payload: Option<Box<dyn PacketBuilder>>,
    correct_length_at_build: bool,
}

impl Default for Ipv6PacketBuilder {
    fn default() -> Self {
        Self {
            version: IpVersion::V6.raw(),
            traffic_class: None,
            flow_label: None,
            payload_len: None,
            next_header: None,
            hop_limit: None,
            src_addr: None,
            dst_addr: None,
            payload: None,
            correct_length_at_build: false,
        }
    }
}

impl Ipv6PacketBuilder {
    /// An empty builder. The version defaults to 6.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the version nibble.
    pub fn version(mut self, value: u8) -> Self {
        self.version = value;
        self
    }

    /// Set the traffic class. Required.
    pub fn traffic_class(mut self, value: u8) -> Self {
        self.traffic_class = Some(value);
        self
    }

    /// Set the 20-bit flow label. Required.
    pub fn flow_label(mut self, value: u32) -> Self {
        self.flow_label = Some(value);
        self
    }

    /// Set the payload length. Required unless the length is corrected.
    pub fn payload_len(mut self, value: u16) -> Self {
        self.payload_len = Some(value);
        self
    }

    /// Set the next header. Required.
    pub fn next_header(mut self, value: IpProtocol) -> Self {
        self.next_header = Some(value);
        self
    }

    /// Set the hop limit. Required.
    pub fn hop_limit(mut self, value: u8) -> Self {
        self.hop_limit = Some(value);
        self
    }

    /// Set the source address. Required.
    pub fn src_addr(mut self, value: Ipv6Addr) -> Self {
        self.src_addr = Some(value);
        self
    }

    /// Set the destination address. Required.
    pub fn dst_addr(mut self, value: Ipv6Addr) -> Self {
        self.dst_addr = Some(value);
        self
    }

    /// Set the payload builder.
    pub fn payload(mut self, value: impl PacketBuilder + 'static) -> Self {
        self.payload = Some(Box::new(value));
        self
    }

    /// Set or clear the payload builder.
    pub fn payload_boxed(mut self, value: Option<Box<dyn PacketBuilder>>) -> Self {
        self.payload = value;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Ipv6Packet, BuildError> {
        let mut check = FieldCheck::new("IPv6");
        let version = check.bits("version", self.version as u32, VERSION) as u8;
        let traffic_class = check.require("traffic_class", self.traffic_class);
        let flow_label = check.require("flow_label", self.flow_label);
        let flow_label = check.bits("flow_label", flow_label, FLOW_LABEL);
        let declared_len = if self.correct_length_at_build {
            None
        } else {
            Some(check.require("payload_len", self.payload_len))
        };
        let next_header = check.require_or("next_header", self.next_header, IpProtocol::IPV6_NO_NXT);
        let hop_limit = check.require("hop_limit", self.hop_limit);
        let src_addr = check.require_or("src_addr", self.src_addr, Ipv6Addr::UNSPECIFIED);
        let dst_addr = check.require_or("dst_addr", self.dst_addr, Ipv6Addr::UNSPECIFIED);
        check.finish()?;

        let payload = build_payload("IPv6", self.payload)?;
        let payload_len = match declared_len {
            Some(len) => len,
            None => {
                let len = payload.as_ref().map_or(0, |p| p.length());
                let mut check = FieldCheck::new("IPv6");
                check.max("payload_len", len as u64, u16::MAX as u64);
                check.finish()?;
                len as u16
            }
        };

        Ok(Ipv6Packet {
            header: Ipv6Header {
                version,
                traffic_class,
                flow_label,
                payload_len,
                next_header,
                hop_limit,
                src_addr,
                dst_addr,
                memo: Memo::new(),
            },
            payload,
            memo: Memo::new(),
        })
    }
}

impl LengthBuilder for Ipv6PacketBuilder {
    fn correct_length_at_build(mut self, value: bool) -> Self {
        self.correct_length_at_build = value;
        self
    }
}

packet_builder!(Ipv6PacketBuilder, "IPv6", payload);

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .ip_numbers
        .register(IpProtocol::HOPOPT, decode_boxed::<ext::Ipv6HopByHopPacket>)
        .register(IpProtocol::IPV6_ROUTE, decode_boxed::<ext::Ipv6RoutingPacket>)
        .register(IpProtocol::IPV6_FRAG, decode_boxed::<ext::Ipv6FragmentPacket>)
        .register(IpProtocol::IPV6_OPTS, decode_boxed::<ext::Ipv6DestOptionsPacket>)
        .register(IpProtocol::IPV6, decode_boxed::<Ipv6Packet>);
    factories
        .ip_versions
        .register(IpVersion::V6, decode_boxed::<Ipv6Packet>);
    ext::register_options(factories);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opaque::{UnknownPacket, UnknownPacketBuilder};
    use crate::packet::PacketExt;

    fn sample_builder() -> Ipv6PacketBuilder {
        Ipv6PacketBuilder::new()
            .traffic_class(0xb8)
            .flow_label(0x12345)
            .next_header(IpProtocol::from(253))
            .hop_limit(64)
            .src_addr(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))
            .dst_addr(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 2))
            .payload(UnknownPacketBuilder::new().data(vec![1, 2, 3, 4, 5]))
    }

    #[test]
    fn build_then_decode() {
        let pkt = sample_builder().correct_length_at_build(true).build().unwrap();
        assert_eq!(pkt.header().payload_len(), 5);
        assert_eq!(pkt.length(), 45);

        let bytes = pkt.raw_data();
        assert_eq!(&bytes[..4], &[0x6b, 0x81, 0x23, 0x45]);

        let decoded = Ipv6Packet::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(decoded.header().version(), IpVersion::V6);
        assert_eq!(decoded.header().traffic_class(), 0xb8);
        assert_eq!(decoded.header().flow_label(), 0x12345);
        assert_eq!(decoded, pkt);
        assert_eq!(decoded.get::<UnknownPacket>().unwrap().data(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn trailing_bytes_are_not_payload() {
        let pkt = sample_builder().correct_length_at_build(true).build().unwrap();
        let mut bytes = pkt.raw_data();
        bytes.extend_from_slice(&[0; 7]);
        let decoded = Ipv6Packet::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(decoded.length(), 45);
    }

    #[test]
    fn truncated_payload_is_clamped() {
        let pkt = sample_builder().payload_len(100).build().unwrap();
        let bytes = pkt.raw_data();
        let decoded = Ipv6Packet::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(decoded.header().payload_len(), 100);
        assert_eq!(decoded.payload().unwrap().length(), 5);
        assert_eq!(decoded.raw_data(), bytes);
    }

    #[test]
    fn jumbo_payload_takes_the_rest() {
        let pkt = sample_builder().payload_len(0).build().unwrap();
        let bytes = pkt.raw_data();
        let decoded = Ipv6Packet::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(decoded.payload().unwrap().length(), 5);
    }

    #[test]
    fn out_of_range_fields() {
        let err = sample_builder()
            .flow_label(0x100000)
            .version(16)
            .correct_length_at_build(true)
            .build()
            .unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(err.to_string().contains("flow_label"));
    }

    #[test]
    fn missing_fields() {
        let err = Ipv6PacketBuilder::new().hop_limit(1).build().unwrap_err();
        assert_eq!(
            err.missing_fields(),
            vec!["traffic_class", "flow_label", "payload_len", "next_header", "src_addr", "dst_addr"]
        );
    }

    #[test]
    fn too_short() {
        let bytes = [0x60u8; IPV6_HEADER_LEN];
        for len in 0..IPV6_HEADER_LEN {
            assert!(Ipv6Packet::decode(&bytes, 0, len).is_err());
        }
        assert!(Ipv6Packet::decode(&bytes, 0, IPV6_HEADER_LEN).is_ok());
    }
}
