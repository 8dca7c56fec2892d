//! Neighbor discovery messages, RFC 4861.
//!
//! Only neighbor solicitation and advertisement have dedicated decoders; the
//! other NDP message bodies are kept opaque. Options are decoded through the
//! `ndp_options` registry.

use std::net::Ipv6Addr;

use crate::bits::BitField;
use crate::builder::{FieldCheck, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{Decode, DecodeCtx, PacketFactories};
use crate::memo::Memo;
use crate::packet::{Header, Packet};

mod option;
pub use option::{
    decode_unknown_option, NdpOption, NdpOptionType, PrefixInfo, NDP_MTU_LEN, NDP_PREFIX_INFO_LEN,
};

/// Length of the fixed part of a neighbor solicitation or advertisement.
pub const NDP_NEIGHBOR_FIXED_LEN: usize = 20;

const ROUTER: BitField = BitField::flag(31);
const SOLICITED: BitField = BitField::flag(30);
const OVERRIDE: BitField = BitField::flag(29);
const NA_RESERVED: BitField = BitField::new(0, 29);

fn options_len(options: &[NdpOption]) -> usize {
    options.iter().map(|o| o.length()).sum()
}

// Bytes of the option region left over after the decoded options.
fn unparsed_tail(r: &Reader<'_>, options: &[NdpOption]) -> Result<Vec<u8>, DecodeError> {
    let at = (NDP_NEIGHBOR_FIXED_LEN + options_len(options)).min(r.len());
    Ok(r.slice(at, r.len() - at)?.to_vec())
}

fn write_options(options: &[NdpOption], out: &mut Vec<u8>) {
    for option in options {
        option.write_to(out);
    }
}

fn check_options(check: &mut FieldCheck, options: &[NdpOption]) {
    for option in options {
        if option.length() % 8 != 0 {
            check.invalid("option length", "not a multiple of 8 octets");
        }
        check.max("option length", (option.length() / 8) as u64, u8::MAX as u64);
    }
}

const NS_PROTOCOL: &str = "NDP Neighbor Solicitation";

/// Target address and options of a neighbor solicitation.
#[derive(Debug, Clone)]
pub struct NeighborSolicitationHeader {
    reserved: u32,
    target_addr: Ipv6Addr,
    options: Vec<NdpOption>,
    truncated: bool,
    memo: Memo,
}

impl NeighborSolicitationHeader {
    /// The reserved word, kept as found.
    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Address whose link-layer address is requested.
    pub fn target_addr(&self) -> Ipv6Addr {
        self.target_addr
    }

    /// The decoded options.
    pub fn options(&self) -> &[NdpOption] {
        &self.options
    }

    /// Whether decoding stopped at an undecodable option.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Header for NeighborSolicitationHeader {
    header_object_methods!(NS_PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.reserved.to_be_bytes());
        out.extend_from_slice(&self.target_addr.octets());
        write_options(&self.options, out);
    }

    fn calc_length(&self) -> usize {
        NDP_NEIGHBOR_FIXED_LEN + options_len(&self.options)
    }
}

/// Body of a neighbor solicitation.
///
/// Option bytes that could not be decoded are kept as a trailer.
#[derive(Debug, Clone)]
pub struct NeighborSolicitationPacket {
    header: NeighborSolicitationHeader,
    trailer: Vec<u8>,
    memo: Memo,
}

impl NeighborSolicitationPacket {
    /// The message fields.
    pub fn header(&self) -> &NeighborSolicitationHeader {
        &self.header
    }

    /// Address whose link-layer address is requested.
    pub fn target_addr(&self) -> Ipv6Addr {
        self.header.target_addr
    }

    /// The decoded options.
    pub fn options(&self) -> &[NdpOption] {
        &self.header.options
    }

    /// Option bytes following the last decoded option.
    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> NeighborSolicitationPacketBuilder {
        NeighborSolicitationPacketBuilder {
            reserved: self.header.reserved,
            target_addr: Some(self.header.target_addr),
            options: self.header.options.clone(),
            trailer: self.trailer.clone(),
        }
    }
}

impl Decode for NeighborSolicitationPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(NS_PROTOCOL, bytes, offset, length)?;
        r.require(NDP_NEIGHBOR_FIXED_LEN)?;
        let (options, truncated) = option::decode_options(
            NS_PROTOCOL,
            bytes,
            offset + NDP_NEIGHBOR_FIXED_LEN,
            r.len() - NDP_NEIGHBOR_FIXED_LEN,
            ctx,
        );
        let trailer = unparsed_tail(&r, &options)?;
        Ok(Self {
            header: NeighborSolicitationHeader {
                reserved: r.u32(0)?,
                target_addr: r.ipv6_addr(4)?,
                options,
                truncated,
                memo: Memo::new(),
            },
            trailer,
            memo: Memo::new(),
        })
    }
}

impl Packet for NeighborSolicitationPacket {
    packet_object_methods!(NS_PROTOCOL);

    fn header(&self) -> Option<&dyn Header> {
        Some(&self.header)
    }

    fn payload(&self) -> Option<&dyn Packet> {
        None
    }

    fn trailer_len(&self) -> usize {
        self.trailer.len()
    }

    fn write_trailer(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.trailer);
    }

    fn builder(&self) -> Box<dyn PacketBuilder> {
        Box::new(self.to_builder())
    }
}

value_eq!(Header: NeighborSolicitationHeader);
value_eq!(Packet: NeighborSolicitationPacket);

/// Builds a [`NeighborSolicitationPacket`].
#[derive(Debug, Default)]
pub struct NeighborSolicitationPacketBuilder {
    reserved: u32,
    target_addr: Option<Ipv6Addr>,
    options: Vec<NdpOption>,
    trailer: Vec<u8>,
}

impl NeighborSolicitationPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reserved word. Defaults to zero.
    pub fn reserved(mut self, value: u32) -> Self {
        self.reserved = value;
        self
    }

    /// Set the target address. Required.
    pub fn target_addr(mut self, value: Ipv6Addr) -> Self {
        self.target_addr = Some(value);
        self
    }

    /// Append an option.
    pub fn option(mut self, value: NdpOption) -> Self {
        self.options.push(value);
        self
    }

    /// Replace the option list.
    pub fn options(mut self, value: Vec<NdpOption>) -> Self {
        self.options = value;
        self
    }

    /// Set raw bytes written after the options.
    pub fn trailer(mut self, value: Vec<u8>) -> Self {
        self.trailer = value;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<NeighborSolicitationPacket, BuildError> {
        let mut check = FieldCheck::new(NS_PROTOCOL);
        let target_addr = check.require_or("target_addr", self.target_addr, Ipv6Addr::UNSPECIFIED);
        check_options(&mut check, &self.options);
        check.finish()?;

        Ok(NeighborSolicitationPacket {
            header: NeighborSolicitationHeader {
                reserved: self.reserved,
                target_addr,
                options: self.options,
                truncated: false,
                memo: Memo::new(),
            },
            trailer: self.trailer,
            memo: Memo::new(),
        })
    }
}

packet_builder!(NeighborSolicitationPacketBuilder, NS_PROTOCOL);

const NA_PROTOCOL: &str = "NDP Neighbor Advertisement";

/// Flags, target address and options of a neighbor advertisement.
#[derive(Debug, Clone)]
pub struct NeighborAdvertisementHeader {
    router: bool,
    solicited: bool,
    override_flag: bool,
    reserved: u32,
    target_addr: Ipv6Addr,
    options: Vec<NdpOption>,
    truncated: bool,
    memo: Memo,
}

impl NeighborAdvertisementHeader {
    /// The R flag: the sender is a router.
    pub fn router(&self) -> bool {
        self.router
    }

    /// The S flag: sent in response to a solicitation.
    pub fn solicited(&self) -> bool {
        self.solicited
    }

    /// The O flag: override existing cache entries.
    pub fn override_flag(&self) -> bool {
        self.override_flag
    }

    /// The 29 reserved bits, kept as found.
    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Address whose link-layer address is advertised.
    pub fn target_addr(&self) -> Ipv6Addr {
        self.target_addr
    }

    /// The decoded options.
    pub fn options(&self) -> &[NdpOption] {
        &self.options
    }

    /// Whether decoding stopped at an undecodable option.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Header for NeighborAdvertisementHeader {
    header_object_methods!(NA_PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        let mut word = 0;
        word = ROUTER.put_flag(word, self.router);
        word = SOLICITED.put_flag(word, self.solicited);
        word = OVERRIDE.put_flag(word, self.override_flag);
        word = NA_RESERVED.put(word, self.reserved);
        out.extend_from_slice(&word.to_be_bytes());
        out.extend_from_slice(&self.target_addr.octets());
        write_options(&self.options, out);
    }

    fn calc_length(&self) -> usize {
        NDP_NEIGHBOR_FIXED_LEN + options_len(&self.options)
    }
}

/// Body of a neighbor advertisement.
///
/// Option bytes that could not be decoded are kept as a trailer.
#[derive(Debug, Clone)]
pub struct NeighborAdvertisementPacket {
    header: NeighborAdvertisementHeader,
    trailer: Vec<u8>,
    memo: Memo,
}

impl NeighborAdvertisementPacket {
    /// The message fields.
    pub fn header(&self) -> &NeighborAdvertisementHeader {
        &self.header
    }

    /// Address whose link-layer address is advertised.
    pub fn target_addr(&self) -> Ipv6Addr {
        self.header.target_addr
    }

    /// The decoded options.
    pub fn options(&self) -> &[NdpOption] {
        &self.header.options
    }

    /// Option bytes following the last decoded option.
    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> NeighborAdvertisementPacketBuilder {
        let h = &self.header;
        NeighborAdvertisementPacketBuilder {
            router: h.router,
            solicited: h.solicited,
            override_flag: h.override_flag,
            reserved: h.reserved,
            target_addr: Some(h.target_addr),
            options: h.options.clone(),
            trailer: self.trailer.clone(),
        }
    }
}

impl Decode for NeighborAdvertisementPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(NA_PROTOCOL, bytes, offset, length)?;
        r.require(NDP_NEIGHBOR_FIXED_LEN)?;
        let word = r.u32(0)?;
        let (options, truncated) = option::decode_options(
            NA_PROTOCOL,
            bytes,
            offset + NDP_NEIGHBOR_FIXED_LEN,
            r.len() - NDP_NEIGHBOR_FIXED_LEN,
            ctx,
        );
        let trailer = unparsed_tail(&r, &options)?;
        Ok(Self {
            header: NeighborAdvertisementHeader {
                router: ROUTER.is_set(word),
                solicited: SOLICITED.is_set(word),
                override_flag: OVERRIDE.is_set(word),
                reserved: NA_RESERVED.get(word),
                target_addr: r.ipv6_addr(4)?,
                options,
                truncated,
                memo: Memo::new(),
            },
            trailer,
            memo: Memo::new(),
        })
    }
}

impl Packet for NeighborAdvertisementPacket {
    packet_object_methods!(NA_PROTOCOL);

    fn header(&self) -> Option<&dyn Header> {
        Some(&self.header)
    }

    fn payload(&self) -> Option<&dyn Packet> {
        None
    }

    fn trailer_len(&self) -> usize {
        self.trailer.len()
    }

    fn write_trailer(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.trailer);
    }

    fn builder(&self) -> Box<dyn PacketBuilder> {
        Box::new(self.to_builder())
    }
}

value_eq!(Header: NeighborAdvertisementHeader);
value_eq!(Packet: NeighborAdvertisementPacket);

/// Builds a [`NeighborAdvertisementPacket`].
#[derive(Debug, Default)]
pub struct NeighborAdvertisementPacketBuilder {
    router: bool,
    solicited: bool,
    override_flag: bool,
    reserved: u32,
    target_addr: Option<Ipv6Addr>,
    options: Vec<NdpOption>,
    trailer: Vec<u8>,
}

impl NeighborAdvertisementPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the R flag.
    pub fn router(mut self, value: bool) -> Self {
        self.router = value;
        self
    }

    /// Set the S flag.
    pub fn solicited(mut self, value: bool) -> Self {
        self.solicited = value;
        self
    }

    /// Set the O flag.
    pub fn override_flag(mut self, value: bool) -> Self {
        self.override_flag = value;
        self
    }

    /// Set the 29 reserved bits. Defaults to zero.
    pub fn reserved(mut self, value: u32) -> Self {
        self.reserved = value;
        self
    }

    /// Set the target address. Required.
    pub fn target_addr(mut self, value: Ipv6Addr) -> Self {
        self.target_addr = Some(value);
        self
    }

    /// Append an option.
    pub fn option(mut self, value: NdpOption) -> Self {
        self.options.push(value);
        self
    }

    /// Replace the option list.
    pub fn options(mut self, value: Vec<NdpOption>) -> Self {
        self.options = value;
        self
    }

    /// Set raw bytes written after the options.
    pub fn trailer(mut self, value: Vec<u8>) -> Self {
        self.trailer = value;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<NeighborAdvertisementPacket, BuildError> {
        let mut check = FieldCheck::new(NA_PROTOCOL);
        let target_addr = check.require_or("target_addr", self.target_addr, Ipv6Addr::UNSPECIFIED);
        let reserved = check.bits("reserved", self.reserved, NA_RESERVED);
        check_options(&mut check, &self.options);
        check.finish()?;

        Ok(NeighborAdvertisementPacket {
            header: NeighborAdvertisementHeader {
                router: self.router,
                solicited: self.solicited,
                override_flag: self.override_flag,
                reserved,
                target_addr,
                options: self.options,
                truncated: false,
                memo: Memo::new(),
            },
            trailer: self.trailer,
            memo: Memo::new(),
        })
    }
}

packet_builder!(NeighborAdvertisementPacketBuilder, NA_PROTOCOL);

pub(crate) fn register_options(factories: &mut PacketFactories) {
    option::register(factories);
}
