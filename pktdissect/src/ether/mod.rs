//! Ethernet II frames.

use core::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::builder::{build_payload, FieldCheck, PacketBuilder};
use crate::checksum_utils;
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{decode_boxed, Decode, DecodeCtx, PacketFactories};
use crate::memo::Memo;
use crate::opaque::UnknownPacket;
use crate::packet::{Header, Packet};

enum_sim! {
    /// An enum-like type for representing Ethertype in Ethernet frame.
    pub struct EtherType (u16) {
        /// Frame payload is Arp protocol.
        ARP =  0x0806,
        /// Frame payload is Ipv4 protocol.
        IPV4 = 0x0800,
        /// Frame payload is Ipv6 protocol.
        IPV6 = 0x86DD,
    }
}

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct EtherAddr(pub [u8; 6]);

impl EtherAddr {
    /// The broadcast address.
    pub const BROADCAST: EtherAddr = EtherAddr([0xff; 6]);

    /// Construct an Ethernet address from the first six octets of `data`.
    ///
    /// # Panics
    /// The function panics if `data` is shorter than six octets.
    pub fn from_bytes(data: &[u8]) -> EtherAddr {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(&data[..6]);
        EtherAddr(bytes)
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() || self.is_multicast())
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the 'multicast' bit in the OUI is set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Parse a string with the form 'Aa:0b:Cc:11:02:33' into `EtherAddr`.
    pub fn parse_from<T: AsRef<str>>(s: T) -> Option<Self> {
        let mut result = [0; 6];
        let mut parts = s.as_ref().split(':');
        for byte in result.iter_mut() {
            let part = parts.next()?;
            if part.len() != 2 {
                return None;
            }
            *byte = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(result))
    }
}

impl fmt::Display for EtherAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
        )
    }
}

/// Length of the Ethernet II header.
pub const ETHER_HEADER_LEN: usize = 14;
/// Smallest payload (including pad) of a frame on the wire.
pub const MIN_ETHER_PAYLOAD_LEN: usize = 46;
/// Length of the frame check sequence.
pub const ETHER_FCS_LEN: usize = 4;

/// The Ethernet II header.
#[derive(Debug, Clone)]
pub struct EthernetHeader {
    dst_addr: EtherAddr,
    src_addr: EtherAddr,
    ether_type: EtherType,
    memo: Memo,
}

impl EthernetHeader {
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(ETHER_HEADER_LEN)?;
        Ok(Self {
            dst_addr: r.mac_addr(0)?,
            src_addr: r.mac_addr(6)?,
            ether_type: r.u16(12)?.into(),
            memo: Memo::new(),
        })
    }

    /// Destination address.
    pub fn dst_addr(&self) -> EtherAddr {
        self.dst_addr
    }

    /// Source address.
    pub fn src_addr(&self) -> EtherAddr {
        self.src_addr
    }

    /// Type of the payload.
    pub fn ether_type(&self) -> EtherType {
        self.ether_type
    }
}

impl Header for EthernetHeader {
    header_object_methods!("Ethernet");

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.dst_addr.as_bytes());
        out.extend_from_slice(self.src_addr.as_bytes());
        out.extend_from_slice(&self.ether_type.raw().to_be_bytes());
    }

    fn calc_length(&self) -> usize {
        ETHER_HEADER_LEN
    }
}

/// An Ethernet II frame with its payload, pad and optional FCS.
#[derive(Debug, Clone)]
pub struct EthernetPacket {
    header: EthernetHeader,
    payload: Option<Box<dyn Packet>>,
    pad: Vec<u8>,
    fcs: Option<u32>,
    memo: Memo,
}

impl EthernetPacket {
    /// Decode a frame whose last four bytes are the frame check sequence.
    pub fn decode_with_fcs(bytes: &[u8], offset: usize, length: usize) -> Result<Self, DecodeError> {
        Self::decode_frame(bytes, offset, length, &DecodeCtx::global(), true)
    }

    /// Same as [`EthernetPacket::decode_with_fcs`] with explicit registries.
    pub fn decode_with_fcs_ctx(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        Self::decode_frame(bytes, offset, length, ctx, true)
    }

    fn decode_frame(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
        with_fcs: bool,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new("Ethernet", bytes, offset, length)?;
        let fcs_len = if with_fcs { ETHER_FCS_LEN } else { 0 };
        r.require(ETHER_HEADER_LEN + fcs_len)?;
        let header = EthernetHeader::parse(&r)?;

        let body_len = r.len() - ETHER_HEADER_LEN - fcs_len;
        let fcs = if with_fcs {
            Some(r.u32_in::<LittleEndian>(r.len() - ETHER_FCS_LEN)?)
        } else {
            None
        };

        let payload = ctx.decode_payload(
            &ctx.factories().ether_types,
            header.ether_type,
            bytes,
            offset + ETHER_HEADER_LEN,
            body_len,
        );
        let body = r.slice(ETHER_HEADER_LEN, body_len)?;
        let payload = payload.map(|p| {
            if body.starts_with(p.raw_bytes()) {
                p
            } else {
                tracing::warn!(
                    protocol = "Ethernet",
                    offset,
                    inner = p.name(),
                    "payload does not re-encode to the captured bytes, kept opaque"
                );
                Box::new(UnknownPacket::new(bytes, offset + ETHER_HEADER_LEN, body_len))
                    as Box<dyn Packet>
            }
        });
        // whatever the payload does not claim is pad
        let used = payload.as_ref().map_or(0, |p| p.raw_bytes().len());
        let pad = body[used..].to_vec();

        Ok(Self {
            header,
            payload,
            pad,
            fcs,
            memo: Memo::new(),
        })
    }

    /// The Ethernet header.
    pub fn header(&self) -> &EthernetHeader {
        &self.header
    }

    /// Destination address.
    pub fn dst_addr(&self) -> EtherAddr {
        self.header.dst_addr
    }

    /// Source address.
    pub fn src_addr(&self) -> EtherAddr {
        self.header.src_addr
    }

    /// Type of the payload.
    pub fn ether_type(&self) -> EtherType {
        self.header.ether_type
    }

    /// Bytes between the payload and the FCS.
    pub fn pad(&self) -> &[u8] {
        &self.pad
    }

    /// The frame check sequence, if the frame carries one.
    pub fn fcs(&self) -> Option<u32> {
        self.fcs
    }

    fn calc_fcs(header: &EthernetHeader, payload: Option<&dyn Packet>, pad: &[u8]) -> u32 {
        checksum_utils::crc32_segments(&[
            header.raw_bytes(),
            payload.map_or(&[][..], |p| p.raw_bytes()),
            pad,
        ])
    }

    /// Whether the frame carries an FCS matching its content.
    pub fn has_valid_fcs(&self) -> bool {
        match self.fcs {
            Some(fcs) => Self::calc_fcs(&self.header, self.payload.as_deref(), &self.pad) == fcs,
            None => false,
        }
    }

    /// A builder holding the fields of this frame.
    pub fn to_builder(&self) -> EthernetPacketBuilder {
        EthernetPacketBuilder {
            dst_addr: Some(self.header.dst_addr),
            src_addr: Some(self.header.src_addr),
            ether_type: Some(self.header.ether_type),
            payload: self.payload.as_ref().map(|p| p.builder()),
            pad: self.pad.clone(),
            padding_at_build: false,
            fcs: self.fcs,
            fcs_at_build: false,
        }
    }
}

impl Decode for EthernetPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        Self::decode_frame(bytes, offset, length, ctx, false)
    }
}

impl Packet for EthernetPacket {
    packet_object_methods!("Ethernet");

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
        self.pad.len() + self.fcs.map_or(0, |_| ETHER_FCS_LEN)
    }

    fn write_trailer(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.pad);
        if let Some(fcs) = self.fcs {
            let mut buf = [0; ETHER_FCS_LEN];
            LittleEndian::write_u32(&mut buf, fcs);
            out.extend_from_slice(&buf);
        }
    }
}

value_eq!(Header: EthernetHeader);
value_eq!(Packet: EthernetPacket);

/// Builds an [`EthernetPacket`].
#[derive(Debug, Default)]
pub struct EthernetPacketBuilder {
    dst_addr: Option<EtherAddr>,
    src_addr: Option<EtherAddr>,
    ether_type: Option<EtherType>,
    payload: Option<Box<dyn PacketBuilder>>,
    pad: Vec<u8>,
    padding_at_build: bool,
    fcs: Option<u32>,
    fcs_at_build: bool,
}

impl EthernetPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the destination address. Required.
    pub fn dst_addr(mut self, value: EtherAddr) -> Self {
        self.dst_addr = Some(value);
        self
    }

    /// Set the source address. Required.
    pub fn src_addr(mut self, value: EtherAddr) -> Self {
        self.src_addr = Some(value);
        self
    }

    /// Set the EtherType. Required.
    pub fn ether_type(mut self, value: EtherType) -> Self {
        self.ether_type = Some(value);
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

    /// Set explicit pad bytes, used unless `padding_at_build` is enabled.
    pub fn pad(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.pad = value.into();
        self
    }

    /// Pad the payload with zeros up to the minimum frame size.
    pub fn padding_at_build(mut self, value: bool) -> Self {
        self.padding_at_build = value;
        self
    }

    /// Set an explicit FCS, used unless `fcs_at_build` is enabled.
    pub fn fcs(mut self, value: Option<u32>) -> Self {
        self.fcs = value;
        self
    }

    /// Compute and append the FCS.
    pub fn fcs_at_build(mut self, value: bool) -> Self {
        self.fcs_at_build = value;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<EthernetPacket, BuildError> {
        let mut check = FieldCheck::new("Ethernet");
        let dst_addr = check.require("dst_addr", self.dst_addr);
        let src_addr = check.require("src_addr", self.src_addr);
        let ether_type = check.require_or("ether_type", self.ether_type, EtherType::from(0));
        check.finish()?;

        let payload = build_payload("Ethernet", self.payload)?;
        let header = EthernetHeader {
            dst_addr,
            src_addr,
            ether_type,
            memo: Memo::new(),
        };

        let pad = if self.padding_at_build {
            let payload_len = payload.as_ref().map_or(0, |p| p.length());
            vec![0; MIN_ETHER_PAYLOAD_LEN.saturating_sub(payload_len)]
        } else {
            self.pad
        };

        let fcs = if self.fcs_at_build {
            Some(EthernetPacket::calc_fcs(&header, payload.as_deref(), &pad))
        } else {
            self.fcs
        };

        Ok(EthernetPacket {
            header,
            payload,
            pad,
            fcs,
            memo: Memo::new(),
        })
    }
}

packet_builder!(EthernetPacketBuilder, "Ethernet", payload);

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .ether_types
        .register(EtherType::ARP, decode_boxed::<crate::arp::ArpPacket>)
        .register(EtherType::IPV6, decode_boxed::<crate::ipv6::Ipv6Packet>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opaque::UnknownPacketBuilder;
    use crate::packet::PacketExt;

    static FRAME_BYTES: [u8; 64] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x08, 0x00, 0xaa,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0xff,
    ];

    #[test]
    fn packet_parse() {
        let ethpkt = EthernetPacket::decode(&FRAME_BYTES, 0, FRAME_BYTES.len()).unwrap();
        assert_eq!(
            ethpkt.dst_addr(),
            EtherAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06])
        );
        assert_eq!(
            ethpkt.src_addr(),
            EtherAddr([0x11, 0x12, 0x13, 0x14, 0x15, 0x16])
        );
        assert_eq!(ethpkt.ether_type(), EtherType::IPV4);

        // no IPv4 decoder is registered
        let next = ethpkt.get::<UnknownPacket>().unwrap();
        assert_eq!(next.data(), &FRAME_BYTES[ETHER_HEADER_LEN..]);
        assert!(ethpkt.pad().is_empty());
        assert_eq!(ethpkt.length(), 64);
        assert_eq!(ethpkt.raw_bytes(), &FRAME_BYTES[..]);
    }

    #[test]
    fn packet_build() {
        let ethpkt = EthernetPacketBuilder::new()
            .dst_addr(EtherAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]))
            .src_addr(EtherAddr([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]))
            .ether_type(EtherType::IPV4)
            .payload(UnknownPacketBuilder::new().data(&FRAME_BYTES[ETHER_HEADER_LEN..]))
            .build()
            .unwrap();
        assert_eq!(ethpkt.raw_bytes(), &FRAME_BYTES[..]);
    }

    #[test]
    fn padding_at_build_fills_minimum_payload() {
        let ethpkt = EthernetPacketBuilder::new()
            .dst_addr(EtherAddr::BROADCAST)
            .src_addr(EtherAddr([0x02, 0, 0, 0, 0, 1]))
            .ether_type(EtherType::IPV4)
            .payload(UnknownPacketBuilder::new().data(vec![0xaa; 10]))
            .padding_at_build(true)
            .build()
            .unwrap();
        assert_eq!(ethpkt.pad().len(), 36);
        assert_eq!(ethpkt.length(), 60);
    }

    #[test]
    fn fcs_round_trip() {
        let ethpkt = EthernetPacketBuilder::new()
            .dst_addr(EtherAddr::BROADCAST)
            .src_addr(EtherAddr([0x02, 0, 0, 0, 0, 1]))
            .ether_type(EtherType::IPV4)
            .padding_at_build(true)
            .fcs_at_build(true)
            .build()
            .unwrap();
        assert_eq!(ethpkt.length(), 64);
        assert!(ethpkt.has_valid_fcs());

        let bytes = ethpkt.raw_data();
        // the CRC residue of a frame followed by its FCS
        assert_eq!(checksum_utils::crc32(&bytes), 0x2144_df1c);

        let decoded = EthernetPacket::decode_with_fcs(&bytes, 0, bytes.len()).unwrap();
        assert!(decoded.has_valid_fcs());
        assert_eq!(decoded.fcs(), ethpkt.fcs());
        assert_eq!(decoded.raw_data(), bytes);

        let mut corrupted = bytes.clone();
        corrupted[20] ^= 0x01;
        let decoded = EthernetPacket::decode_with_fcs(&corrupted, 0, corrupted.len()).unwrap();
        assert!(!decoded.has_valid_fcs());
    }

    #[test]
    fn missing_fields_are_listed() {
        let err = EthernetPacketBuilder::new()
            .src_addr(EtherAddr::BROADCAST)
            .build()
            .unwrap_err();
        assert_eq!(err.missing_fields(), vec!["dst_addr", "ether_type"]);
    }

    #[test]
    fn etheraddr_parse_from() {
        let s = "Aa:Bb:Cc:11:22:33";
        assert_eq!(
            EtherAddr::parse_from(s),
            Some(EtherAddr::from_bytes(&[0xAa, 0xBb, 0xCc, 0x11, 0x22, 0x33]))
        );
        let s = "Aa:Bb:Cc:11:22";
        assert_eq!(EtherAddr::parse_from(s), None);
        let s = "Aaa:Bb:Cc:11:22:33";
        assert_eq!(EtherAddr::parse_from(s), None);
        let s = "Zaa:Bb:Cc:11:22:33";
        assert_eq!(EtherAddr::parse_from(s), None);
        let s = "a:Bb:Cc:11:22:33";
        assert_eq!(EtherAddr::parse_from(s), None);
        assert_eq!(EtherAddr::BROADCAST.to_string(), "ff:ff:ff:ff:ff:ff");
    }

    #[test]
    fn bounds_rejection() {
        for len in 0..ETHER_HEADER_LEN {
            assert!(EthernetPacket::decode(&FRAME_BYTES, 0, len).is_err());
        }
        assert!(EthernetPacket::decode_with_fcs(&FRAME_BYTES, 0, 17).is_err());
        assert!(EthernetPacket::decode(&FRAME_BYTES, 60, 14).is_err());
    }

    #[test]
    fn lossy_payload_decoder_falls_back_to_opaque() {
        fn scrambles(
            _bytes: &[u8],
            _offset: usize,
            length: usize,
            _ctx: &DecodeCtx<'_>,
        ) -> Result<Box<dyn Packet>, DecodeError> {
            Ok(Box::new(UnknownPacket::from_vec(vec![0x5a; length / 2])))
        }

        let mut factories = PacketFactories::empty();
        factories.ether_types.register(EtherType::IPV4, scrambles);
        let config = crate::config::DissectConfig::new();
        let ctx = DecodeCtx::new(&factories, &config);

        let eth = EthernetPacket::decode_with(&FRAME_BYTES, 0, FRAME_BYTES.len(), &ctx).unwrap();
        let payload = eth.payload().unwrap().downcast_ref::<UnknownPacket>().unwrap();
        assert_eq!(payload.data(), &FRAME_BYTES[ETHER_HEADER_LEN..]);
        assert!(eth.pad().is_empty());
        assert_eq!(eth.raw_bytes(), &FRAME_BYTES[..]);
    }
}
