//! UDP, RFC 768.

use std::net::IpAddr;

use crate::builder::{build_payload, ChecksumBuilder, FieldCheck, LengthBuilder, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{decode_boxed, Decode, DecodeCtx, PacketFactories};
use crate::ip::{IpProtocol, PseudoHeader};
use crate::memo::Memo;
use crate::packet::{Header, Packet};

/// Length of the UDP header.
pub const UDP_HEADER_LEN: usize = 8;

const PROTOCOL: &str = "UDP";

/// Ports, length and checksum.
#[derive(Debug, Clone)]
pub struct UdpHeader {
    src_port: u16,
    dst_port: u16,
    length: u16,
    checksum: u16,
    memo: Memo,
}

impl UdpHeader {
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(UDP_HEADER_LEN)?;
        Ok(Self {
            src_port: r.u16(0)?,
            dst_port: r.u16(2)?,
            length: r.u16(4)?,
            checksum: r.u16(6)?,
            memo: Memo::new(),
        })
    }

    /// Source port.
    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    /// Destination port.
    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    /// The length field, as found.
    pub fn length_field(&self) -> u16 {
        self.length
    }

    /// The checksum field, as found.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }
}

impl Header for UdpHeader {
    header_object_methods!(PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.src_port.to_be_bytes());
        out.extend_from_slice(&self.dst_port.to_be_bytes());
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.checksum.to_be_bytes());
    }

    fn calc_length(&self) -> usize {
        UDP_HEADER_LEN
    }
}

/// A UDP datagram.
///
/// The payload is dispatched on the destination port when a decoder is
/// registered for it, then on the source port. Bytes of the enclosing window
/// beyond the UDP length are kept as a trailer.
#[derive(Debug, Clone)]
pub struct UdpPacket {
    header: UdpHeader,
    payload: Option<Box<dyn Packet>>,
    trailer: Vec<u8>,
    memo: Memo,
}

impl UdpPacket {
    /// The UDP header.
    pub fn header(&self) -> &UdpHeader {
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

    /// Bytes following the datagram inside the enclosing window.
    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    /// Whether the checksum matches the datagram under the pseudo-header of
    /// `src` and `dst`.
    ///
    /// A zero checksum means "not computed"; it is accepted only when
    /// `accept_zero` is set.
    pub fn has_valid_checksum(&self, src: IpAddr, dst: IpAddr, accept_zero: bool) -> bool {
        if self.header.checksum == 0 {
            return accept_zero;
        }
        let raw = self.raw_bytes();
        let datagram = &raw[..raw.len() - self.trailer.len()];
        PseudoHeader::new(src, dst, IpProtocol::UDP, datagram.len())
            .map_or(false, |ph| ph.checksum(&[datagram]) == 0)
    }

    /// A builder holding the fields of this packet.
    ///
    /// The addresses are not part of the datagram, set them before enabling
    /// checksum correction.
    pub fn to_builder(&self) -> UdpPacketBuilder {
        UdpPacketBuilder {
            src_port: Some(self.header.src_port),
            dst_port: Some(self.header.dst_port),
            length: Some(self.header.length),
            checksum: Some(self.header.checksum),
            src_addr: None,
            dst_addr: None,
            payload: self.payload.as_ref().map(|p| p.builder()),
            correct_length_at_build: false,
            correct_checksum_at_build: false,
        }
    }
}

impl Decode for UdpPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(PROTOCOL, bytes, offset, length)?;
        let header = UdpHeader::parse(&r)?;

        let declared = header.length as usize;
        let extent = if (UDP_HEADER_LEN..=r.len()).contains(&declared) {
            declared
        } else {
            tracing::debug!(
                protocol = PROTOCOL,
                offset,
                declared,
                available = r.len(),
                "length field out of range, using the available bytes"
            );
            r.len()
        };

        let ports = &ctx.factories().udp_ports;
        let port = if !ports.contains(header.dst_port) && ports.contains(header.src_port) {
            header.src_port
        } else {
            header.dst_port
        };
        let payload = ctx.decode_payload(
            ports,
            port,
            bytes,
            offset + UDP_HEADER_LEN,
            extent - UDP_HEADER_LEN,
        );
        let trailer = r.rest(extent)?.to_vec();

        Ok(Self {
            header,
            payload,
            trailer,
            memo: Memo::new(),
        })
    }
}

impl Packet for UdpPacket {
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

value_eq!(Header: UdpHeader);
value_eq!(Packet: UdpPacket);

/// Builds a [`UdpPacket`].
#[derive(Debug, Default)]
pub struct UdpPacketBuilder {
    src_port: Option<u16>,
    dst_port: Option<u16>,
    length: Option<u16>,
    checksum: Option<u16>,
    src_addr: Option<IpAddr>,
    dst_addr: Option<IpAddr>,
    payload: Option<Box<dyn PacketBuilder>>,
    correct_length_at_build: bool,
    correct_checksum_at_build: bool,
}

impl UdpPacketBuilder {
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

    /// Set the length field. Required unless the length is corrected.
    pub fn length(mut self, value: u16) -> Self {
        self.length = Some(value);
        self
    }

    /// Set the checksum. Required unless the checksum is corrected.
    pub fn checksum(mut self, value: u16) -> Self {
        self.checksum = Some(value);
        self
    }

    /// Source address of the enclosing IP packet, used for checksum correction.
    pub fn src_addr(mut self, value: IpAddr) -> Self {
        self.src_addr = Some(value);
        self
    }

    /// Destination address of the enclosing IP packet, used for checksum correction.
    pub fn dst_addr(mut self, value: IpAddr) -> Self {
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
    pub fn build(self) -> Result<UdpPacket, BuildError> {
        let mut check = FieldCheck::new(PROTOCOL);
        let src_port = check.require("src_port", self.src_port);
        let dst_port = check.require("dst_port", self.dst_port);
        let length = if self.correct_length_at_build {
            None
        } else {
            Some(check.require("length", self.length))
        };
        let addrs = if self.correct_checksum_at_build {
            let placeholder = IpAddr::from([0u8; 4]);
            let src = check.require_or("src_addr", self.src_addr, placeholder);
            let dst = check.require_or("dst_addr", self.dst_addr, placeholder);
            if src.is_ipv4() != dst.is_ipv4() {
                check.invalid("dst_addr", "address families differ");
            }
            Some((src, dst))
        } else {
            None
        };
        let checksum = match addrs {
            Some(_) => 0,
            None => check.require("checksum", self.checksum),
        };
        check.finish()?;

        let payload = build_payload(PROTOCOL, self.payload)?;
        let total = UDP_HEADER_LEN + payload.as_ref().map_or(0, |p| p.length());
        let length = match length {
            Some(length) => length,
            None => {
                let mut check = FieldCheck::new(PROTOCOL);
                check.max("length", total as u64, u16::MAX as u64);
                check.finish()?;
                total as u16
            }
        };

        let mut header = UdpHeader {
            src_port,
            dst_port,
            length,
            checksum,
            memo: Memo::new(),
        };
        if let Some((src, dst)) = addrs {
            let body = payload.as_ref().map_or(&[][..], |p| p.raw_bytes());
            let computed = PseudoHeader::new(src, dst, IpProtocol::UDP, total)
                .map_or(0, |ph| ph.checksum(&[header.raw_bytes(), body]));
            // zero is reserved for "no checksum"
            let checksum = if computed == 0 { 0xffff } else { computed };
            header = UdpHeader {
                checksum,
                memo: Memo::new(),
                ..header
            };
        }

        Ok(UdpPacket {
            header,
            payload,
            trailer: Vec::new(),
            memo: Memo::new(),
        })
    }
}

impl LengthBuilder for UdpPacketBuilder {
    fn correct_length_at_build(mut self, value: bool) -> Self {
        self.correct_length_at_build = value;
        self
    }
}

impl ChecksumBuilder for UdpPacketBuilder {
    fn correct_checksum_at_build(mut self, value: bool) -> Self {
        self.correct_checksum_at_build = value;
        self
    }
}

packet_builder!(UdpPacketBuilder, PROTOCOL, payload);

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .ip_numbers
        .register(IpProtocol::UDP, decode_boxed::<UdpPacket>);
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::opaque::{UnknownPacket, UnknownPacketBuilder};
    use crate::packet::PacketExt;

    fn v6_addrs() -> (IpAddr, IpAddr) {
        (
            IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
            IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2)),
        )
    }

    #[test]
    fn corrected_checksum_validates() {
        let (src, dst) = v6_addrs();
        let pkt = UdpPacketBuilder::new()
            .src_port(5353)
            .dst_port(5353)
            .src_addr(src)
            .dst_addr(dst)
            .payload(UnknownPacketBuilder::new().data(&b"hello"[..]))
            .correct_length_at_build(true)
            .correct_checksum_at_build(true)
            .build()
            .unwrap();
        assert_eq!(pkt.header().length_field(), 13);
        assert_ne!(pkt.header().checksum(), 0);
        assert!(pkt.has_valid_checksum(src, dst, false));

        let mut bytes = pkt.raw_data();
        let decoded = UdpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(decoded, pkt);
        assert!(decoded.has_valid_checksum(src, dst, false));

        bytes[10] ^= 0x01;
        let decoded = UdpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert!(!decoded.has_valid_checksum(src, dst, false));
    }

    #[test]
    fn ipv4_pseudo_header() {
        let src = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100));
        let dst = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        let pkt = UdpPacketBuilder::new()
            .src_port(40000)
            .dst_port(53)
            .src_addr(src)
            .dst_addr(dst)
            .payload(UnknownPacketBuilder::new().data(vec![0xab; 7]))
            .correct_length_at_build(true)
            .correct_checksum_at_build(true)
            .build()
            .unwrap();
        assert!(pkt.has_valid_checksum(src, dst, false));
        assert!(!pkt.has_valid_checksum(src, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)), false));
    }

    #[test]
    fn zero_checksum() {
        let (src, dst) = v6_addrs();
        let bytes = [0x13, 0x88, 0x13, 0x89, 0x00, 0x08, 0x00, 0x00];
        let pkt = UdpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert!(pkt.payload().is_none());
        assert!(!pkt.has_valid_checksum(src, dst, false));
        assert!(pkt.has_valid_checksum(src, dst, true));
    }

    #[test]
    fn bad_length_uses_available_bytes() {
        let bytes = [0x13, 0x88, 0x13, 0x89, 0x00, 0x04, 0x00, 0x00, 1, 2, 3];
        let pkt = UdpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(pkt.header().length_field(), 4);
        assert_eq!(pkt.payload().unwrap().raw_bytes(), &[1, 2, 3]);
        assert_eq!(pkt.raw_bytes(), &bytes[..]);

        let bytes = [0x13, 0x88, 0x13, 0x89, 0x00, 0x40, 0x00, 0x00, 1, 2, 3];
        let pkt = UdpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(pkt.payload().unwrap().raw_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn short_length_keeps_trailer() {
        let bytes = [0x13, 0x88, 0x13, 0x89, 0x00, 0x09, 0x00, 0x00, 1, 2, 3];
        let pkt = UdpPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(pkt.payload().unwrap().raw_bytes(), &[1]);
        assert_eq!(pkt.trailer(), &[2, 3]);
        assert_eq!(pkt.raw_bytes(), &bytes[..]);
    }

    #[test]
    fn source_port_dispatch() {
        let mut factories = PacketFactories::empty();
        factories.udp_ports.register(7, decode_boxed::<UdpPacket>);
        let config = crate::config::DissectConfig::new();
        let ctx = DecodeCtx::new(&factories, &config);

        let mut bytes = vec![0x00, 0x07, 0x30, 0x39, 0x00, 0x10, 0x00, 0x00];
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x08, 0x00, 0x00]);
        let pkt = UdpPacket::decode_with(&bytes, 0, bytes.len(), &ctx).unwrap();
        let inner = pkt.payload().unwrap().downcast_ref::<UdpPacket>().unwrap();
        assert_eq!(inner.dst_port(), 2);

        // neither port registered
        bytes[1] = 8;
        let pkt = UdpPacket::decode_with(&bytes, 0, bytes.len(), &ctx).unwrap();
        assert!(pkt.payload().unwrap().is::<UnknownPacket>());
    }

    #[test]
    fn missing_fields() {
        let err = UdpPacketBuilder::new()
            .correct_checksum_at_build(true)
            .build()
            .unwrap_err();
        assert_eq!(
            err.missing_fields(),
            vec!["src_port", "dst_port", "length", "src_addr", "dst_addr"]
        );
    }
}
