use crate::bits::BitField;
use crate::builder::{build_payload, FieldCheck, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{Decode, DecodeCtx};
use crate::ip::IpProtocol;
use crate::memo::Memo;
use crate::opaque::UnknownPacket;
use crate::packet::{Header, Packet};

/// Length of the fragment header.
pub const IPV6_FRAG_HEADER_LEN: usize = 8;

const FRAG_OFFSET: BitField = BitField::new(3, 13);
const RES: BitField = BitField::new(1, 2);
const MORE_FRAGMENTS: BitField = BitField::flag(0);

const PROTOCOL: &str = "IPv6 Fragment";

/// The fragment extension header.
#[derive(Debug, Clone)]
pub struct Ipv6FragHeader {
    next_header: IpProtocol,
    reserved: u8,
    frag_offset: u16,
    res: u8,
    more_frags: bool,
    identification: u32,
    memo: Memo,
}

impl Ipv6FragHeader {
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(IPV6_FRAG_HEADER_LEN)?;
        let word = r.u16(2)? as u32;
        Ok(Self {
            next_header: r.u8(0)?.into(),
            reserved: r.u8(1)?,
            frag_offset: FRAG_OFFSET.get(word) as u16,
            res: RES.get(word) as u8,
            more_frags: MORE_FRAGMENTS.is_set(word),
            identification: r.u32(4)?,
            memo: Memo::new(),
        })
    }

    /// Type of the next header.
    pub fn next_header(&self) -> IpProtocol {
        self.next_header
    }

    /// The reserved byte, kept as found.
    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    /// Offset of the fragment in 8-octet units.
    pub fn frag_offset(&self) -> u16 {
        self.frag_offset
    }

    /// The two reserved bits, kept as found.
    pub fn res(&self) -> u8 {
        self.res
    }

    /// The M flag.
    pub fn more_frags(&self) -> bool {
        self.more_frags
    }

    /// Identification shared by all fragments of a packet.
    pub fn identification(&self) -> u32 {
        self.identification
    }
}

impl Header for Ipv6FragHeader {
    header_object_methods!(PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.next_header.raw());
        out.push(self.reserved);
        let mut word = 0;
        word = FRAG_OFFSET.put(word, self.frag_offset as u32);
        word = RES.put(word, self.res as u32);
        word = MORE_FRAGMENTS.put_flag(word, self.more_frags);
        out.extend_from_slice(&(word as u16).to_be_bytes());
        out.extend_from_slice(&self.identification.to_be_bytes());
    }

    fn calc_length(&self) -> usize {
        IPV6_FRAG_HEADER_LEN
    }
}

/// A fragment header with its payload.
///
/// Only the first fragment is decoded further; the payload of any other
/// fragment is kept as an [`UnknownPacket`].
#[derive(Debug, Clone)]
pub struct Ipv6FragmentPacket {
    header: Ipv6FragHeader,
    payload: Option<Box<dyn Packet>>,
    memo: Memo,
}

impl Ipv6FragmentPacket {
    /// The fragment header.
    pub fn header(&self) -> &Ipv6FragHeader {
        &self.header
    }

    /// Type of the payload.
    pub fn next_header(&self) -> IpProtocol {
        self.header.next_header
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> Ipv6FragmentPacketBuilder {
        let h = &self.header;
        Ipv6FragmentPacketBuilder {
            next_header: Some(h.next_header),
            reserved: h.reserved,
            frag_offset: Some(h.frag_offset),
            res: h.res,
            more_frags: Some(h.more_frags),
            identification: Some(h.identification),
            payload: self.payload.as_ref().map(|p| p.builder()),
        }
    }
}

impl Decode for Ipv6FragmentPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(PROTOCOL, bytes, offset, length)?;
        let header = Ipv6FragHeader::parse(&r)?;
        let payload_off = offset + IPV6_FRAG_HEADER_LEN;
        let payload_len = r.len() - IPV6_FRAG_HEADER_LEN;

        let payload: Option<Box<dyn Packet>> = if header.frag_offset == 0 {
            ctx.decode_payload(
                &ctx.factories().ip_numbers,
                header.next_header,
                bytes,
                payload_off,
                payload_len,
            )
        } else if payload_len > 0 {
            Some(Box::new(UnknownPacket::new(bytes, payload_off, payload_len)))
        } else {
            None
        };

        Ok(Self {
            header,
            payload,
            memo: Memo::new(),
        })
    }
}

impl Packet for Ipv6FragmentPacket {
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

value_eq!(Header: Ipv6FragHeader);
value_eq!(Packet: Ipv6FragmentPacket);

/// Builds an [`Ipv6FragmentPacket`].
#[derive(Debug, Default)]
pub struct Ipv6FragmentPacketBuilder {
    next_header: Option<IpProtocol>,
    reserved: u8,
    frag_offset: Option<u16>,
    res: u8,
    more_frags: Option<bool>,
    identification: Option<u32>,
    payload: Option<Box<dyn PacketBuilder>>,
}

impl Ipv6FragmentPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next header. Required.
    pub fn next_header(mut self, value: IpProtocol) -> Self {
        self.next_header = Some(value);
        self
    }

    /// Set the reserved byte. Defaults to zero.
    pub fn reserved(mut self, value: u8) -> Self {
        self.reserved = value;
        self
    }

    /// Set the 13-bit fragment offset. Required.
    pub fn frag_offset(mut self, value: u16) -> Self {
        self.frag_offset = Some(value);
        self
    }

    /// Set the two reserved bits. Defaults to zero.
    pub fn res(mut self, value: u8) -> Self {
        self.res = value;
        self
    }

    /// Set the M flag. Required.
    pub fn more_frags(mut self, value: bool) -> Self {
        self.more_frags = Some(value);
        self
    }

    /// Set the identification. Required.
    pub fn identification(mut self, value: u32) -> Self {
        self.identification = Some(value);
        self
    }

    /// Set the payload builder.
    pub fn payload(mut self, value: impl PacketBuilder + 'static) -> Self {
        self.payload = Some(Box::new(value));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Ipv6FragmentPacket, BuildError> {
        let mut check = FieldCheck::new(PROTOCOL);
        let next_header = check.require_or("next_header", self.next_header, IpProtocol::IPV6_NO_NXT);
        let frag_offset: u16 = check.require("frag_offset", self.frag_offset);
        let frag_offset = check.bits("frag_offset", frag_offset as u32, FRAG_OFFSET) as u16;
        let res = check.bits("res", self.res as u32, RES) as u8;
        let more_frags = check.require("more_frags", self.more_frags);
        let identification = check.require("identification", self.identification);
        check.finish()?;

        let payload = build_payload(PROTOCOL, self.payload)?;
        Ok(Ipv6FragmentPacket {
            header: Ipv6FragHeader {
                next_header,
                reserved: self.reserved,
                frag_offset,
                res,
                more_frags,
                identification,
                memo: Memo::new(),
            },
            payload,
            memo: Memo::new(),
        })
    }
}

packet_builder!(Ipv6FragmentPacketBuilder, PROTOCOL, payload);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketExt;

    #[test]
    fn header_fields() {
        // next header UDP, offset 185 (1480 bytes), M set, id 0xdeadbeef
        let bytes = [17, 0, 0x05, 0xc9, 0xde, 0xad, 0xbe, 0xef, 1, 2, 3];
        let pkt = Ipv6FragmentPacket::decode(&bytes, 0, bytes.len()).unwrap();
        let h = pkt.header();
        assert_eq!(h.next_header(), IpProtocol::UDP);
        assert_eq!(h.frag_offset(), 185);
        assert_eq!(h.res(), 0);
        assert!(h.more_frags());
        assert_eq!(h.identification(), 0xdead_beef);

        // non-first fragments are not dispatched
        assert!(pkt.payload().unwrap().is::<UnknownPacket>());
        assert_eq!(pkt.raw_bytes(), &bytes[..]);
        assert_eq!(pkt.to_builder().build().unwrap(), pkt);
    }

    #[test]
    fn reserved_bits_survive() {
        let bytes = [59, 0xff, 0x00, 0x06, 0, 0, 0, 1];
        let pkt = Ipv6FragmentPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(pkt.header().reserved(), 0xff);
        assert_eq!(pkt.header().res(), 3);
        assert!(!pkt.header().more_frags());
        assert_eq!(pkt.raw_bytes(), &bytes[..]);
    }

    #[test]
    fn offset_range_is_checked() {
        let err = Ipv6FragmentPacketBuilder::new()
            .next_header(IpProtocol::UDP)
            .frag_offset(0x2000)
            .more_frags(false)
            .identification(1)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("frag_offset"));
    }
}
