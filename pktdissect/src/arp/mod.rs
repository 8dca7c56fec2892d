//! Arp protocol.

use std::net::Ipv4Addr;

use crate::builder::{FieldCheck, LengthBuilder, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::ether::{EtherAddr, EtherType};
use crate::factory::{Decode, DecodeCtx};
use crate::memo::Memo;
use crate::packet::{Header, Packet};

enum_sim! {
    /// Hardware type of the arp protocol.
    pub struct Hardware (u16) {
        /// The contained hardware address is Ethernet address.
        ETHERNET = 1
    }
}

enum_sim! {
    /// Operation type of the arp protocol.
    pub struct Operation (u16) {
        /// Arp request.
        REQUEST = 1,
        /// Arp response.
        REPLY = 2
    }
}

/// Length of an Ethernet/IPv4 ARP message.
pub const ARP_HEADER_LEN: usize = 28;

const ETHER_ADDR_LEN: u8 = 6;
const IPV4_ADDR_LEN: u8 = 4;

/// The fields of an Ethernet/IPv4 ARP message.
///
/// The address length fields are kept as decoded; the address layout is
/// always 6-byte hardware and 4-byte protocol addresses.
#[derive(Debug, Clone)]
pub struct ArpHeader {
    hardware_type: Hardware,
    protocol_type: EtherType,
    hardware_addr_len: u8,
    protocol_addr_len: u8,
    operation: Operation,
    sender_ether_addr: EtherAddr,
    sender_ipv4_addr: Ipv4Addr,
    target_ether_addr: EtherAddr,
    target_ipv4_addr: Ipv4Addr,
    memo: Memo,
}

impl ArpHeader {
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(ARP_HEADER_LEN)?;
        Ok(Self {
            hardware_type: r.u16(0)?.into(),
            protocol_type: r.u16(2)?.into(),
            hardware_addr_len: r.u8(4)?,
            protocol_addr_len: r.u8(5)?,
            operation: r.u16(6)?.into(),
            sender_ether_addr: r.mac_addr(8)?,
            sender_ipv4_addr: r.ipv4_addr(14)?,
            target_ether_addr: r.mac_addr(18)?,
            target_ipv4_addr: r.ipv4_addr(24)?,
            memo: Memo::new(),
        })
    }

    /// Hardware type.
    pub fn hardware_type(&self) -> Hardware {
        self.hardware_type
    }

    /// Protocol type.
    pub fn protocol_type(&self) -> EtherType {
        self.protocol_type
    }

    /// Declared hardware address length.
    pub fn hardware_addr_len(&self) -> u8 {
        self.hardware_addr_len
    }

    /// Declared protocol address length.
    pub fn protocol_addr_len(&self) -> u8 {
        self.protocol_addr_len
    }

    /// Operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Sender hardware address.
    pub fn sender_ether_addr(&self) -> EtherAddr {
        self.sender_ether_addr
    }

    /// Sender protocol address.
    pub fn sender_ipv4_addr(&self) -> Ipv4Addr {
        self.sender_ipv4_addr
    }

    /// Target hardware address.
    pub fn target_ether_addr(&self) -> EtherAddr {
        self.target_ether_addr
    }

    /// Target protocol address.
    pub fn target_ipv4_addr(&self) -> Ipv4Addr {
        self.target_ipv4_addr
    }
}

impl Header for ArpHeader {
    header_object_methods!("ARP");

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hardware_type.raw().to_be_bytes());
        out.extend_from_slice(&self.protocol_type.raw().to_be_bytes());
        out.push(self.hardware_addr_len);
        out.push(self.protocol_addr_len);
        out.extend_from_slice(&self.operation.raw().to_be_bytes());
        out.extend_from_slice(self.sender_ether_addr.as_bytes());
        out.extend_from_slice(&self.sender_ipv4_addr.octets());
        out.extend_from_slice(self.target_ether_addr.as_bytes());
        out.extend_from_slice(&self.target_ipv4_addr.octets());
    }

    fn calc_length(&self) -> usize {
        ARP_HEADER_LEN
    }
}

/// An ARP message. It has no payload.
#[derive(Debug, Clone)]
pub struct ArpPacket {
    header: ArpHeader,
    memo: Memo,
}

impl ArpPacket {
    /// The ARP fields.
    pub fn header(&self) -> &ArpHeader {
        &self.header
    }

    /// A builder holding the fields of this message.
    pub fn to_builder(&self) -> ArpPacketBuilder {
        let h = &self.header;
        ArpPacketBuilder {
            hardware_type: Some(h.hardware_type),
            protocol_type: Some(h.protocol_type),
            hardware_addr_len: Some(h.hardware_addr_len),
            protocol_addr_len: Some(h.protocol_addr_len),
            operation: Some(h.operation),
            sender_ether_addr: Some(h.sender_ether_addr),
            sender_ipv4_addr: Some(h.sender_ipv4_addr),
            target_ether_addr: Some(h.target_ether_addr),
            target_ipv4_addr: Some(h.target_ipv4_addr),
            correct_length_at_build: false,
        }
    }
}

impl Decode for ArpPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        _ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new("ARP", bytes, offset, length)?;
        Ok(Self {
            header: ArpHeader::parse(&r)?,
            memo: Memo::new(),
        })
    }
}

impl Packet for ArpPacket {
    packet_object_methods!("ARP");

    fn header(&self) -> Option<&dyn Header> {
        Some(&self.header)
    }

    fn payload(&self) -> Option<&dyn Packet> {
        None
    }

    fn builder(&self) -> Box<dyn PacketBuilder> {
        Box::new(self.to_builder())
    }
}

value_eq!(Header: ArpHeader);
value_eq!(Packet: ArpPacket);

/// Builds an [`ArpPacket`].
#[derive(Debug, Clone, Default)]
pub struct ArpPacketBuilder {
    hardware_type: Option<Hardware>,
    protocol_type: Option<EtherType>,
    hardware_addr_len: Option<u8>,
    protocol_addr_len: Option<u8>,
    operation: Option<Operation>,
    sender_ether_addr: Option<EtherAddr>,
    sender_ipv4_addr: Option<Ipv4Addr>,
    target_ether_addr: Option<EtherAddr>,
    target_ipv4_addr: Option<Ipv4Addr>,
    correct_length_at_build: bool,
}

impl ArpPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hardware type. Required.
    pub fn hardware_type(mut self, value: Hardware) -> Self {
        self.hardware_type = Some(value);
        self
    }

    /// Set the protocol type. Required.
    pub fn protocol_type(mut self, value: EtherType) -> Self {
        self.protocol_type = Some(value);
        self
    }

    /// Set the hardware address length. Required unless lengths are corrected.
    pub fn hardware_addr_len(mut self, value: u8) -> Self {
        self.hardware_addr_len = Some(value);
        self
    }

    /// Set the protocol address length. Required unless lengths are corrected.
    pub fn protocol_addr_len(mut self, value: u8) -> Self {
        self.protocol_addr_len = Some(value);
        self
    }

    /// Set the operation. Required.
    pub fn operation(mut self, value: Operation) -> Self {
        self.operation = Some(value);
        self
    }

    /// Set the sender hardware address. Required.
    pub fn sender_ether_addr(mut self, value: EtherAddr) -> Self {
        self.sender_ether_addr = Some(value);
        self
    }

    /// Set the sender protocol address. Required.
    pub fn sender_ipv4_addr(mut self, value: Ipv4Addr) -> Self {
        self.sender_ipv4_addr = Some(value);
        self
    }

    /// Set the target hardware address. Required.
    pub fn target_ether_addr(mut self, value: EtherAddr) -> Self {
        self.target_ether_addr = Some(value);
        self
    }

    /// Set the target protocol address. Required.
    pub fn target_ipv4_addr(mut self, value: Ipv4Addr) -> Self {
        self.target_ipv4_addr = Some(value);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<ArpPacket, BuildError> {
        let mut check = FieldCheck::new("ARP");
        let hardware_type = check.require_or("hardware_type", self.hardware_type, Hardware::ETHERNET);
        let protocol_type =
            check.require_or("protocol_type", self.protocol_type, EtherType::IPV4);
        let (hardware_addr_len, protocol_addr_len) = if self.correct_length_at_build {
            (ETHER_ADDR_LEN, IPV4_ADDR_LEN)
        } else {
            (
                check.require("hardware_addr_len", self.hardware_addr_len),
                check.require("protocol_addr_len", self.protocol_addr_len),
            )
        };
        let operation = check.require_or("operation", self.operation, Operation::REQUEST);
        let sender_ether_addr = check.require("sender_ether_addr", self.sender_ether_addr);
        let sender_ipv4_addr =
            check.require_or("sender_ipv4_addr", self.sender_ipv4_addr, Ipv4Addr::UNSPECIFIED);
        let target_ether_addr = check.require("target_ether_addr", self.target_ether_addr);
        let target_ipv4_addr =
            check.require_or("target_ipv4_addr", self.target_ipv4_addr, Ipv4Addr::UNSPECIFIED);
        check.finish()?;

        Ok(ArpPacket {
            header: ArpHeader {
                hardware_type,
                protocol_type,
                hardware_addr_len,
                protocol_addr_len,
                operation,
                sender_ether_addr,
                sender_ipv4_addr,
                target_ether_addr,
                target_ipv4_addr,
                memo: Memo::new(),
            },
            memo: Memo::new(),
        })
    }
}

impl LengthBuilder for ArpPacketBuilder {
    fn correct_length_at_build(mut self, value: bool) -> Self {
        self.correct_length_at_build = value;
        self
    }
}

packet_builder!(ArpPacketBuilder, "ARP");
