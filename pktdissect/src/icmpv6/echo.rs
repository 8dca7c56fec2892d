use crate::builder::{build_payload, FieldCheck, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{Decode, DecodeCtx};
use crate::memo::Memo;
use crate::opaque::{UnknownPacket, UnknownPacketBuilder};
use crate::packet::{Header, Packet};

/// Length of the identifier and sequence number.
pub const ICMPV6_ECHO_HEADER_LEN: usize = 4;

const PROTOCOL: &str = "ICMPv6 Echo";

/// Identifier and sequence number of an echo request or reply.
#[derive(Debug, Clone)]
pub struct Icmpv6EchoHeader {
    identifier: u16,
    sequence_number: u16,
    memo: Memo,
}

impl Icmpv6EchoHeader {
    /// Identifier matching replies to requests.
    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Sequence number.
    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }
}

impl Header for Icmpv6EchoHeader {
    header_object_methods!(PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.identifier.to_be_bytes());
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
    }

    fn calc_length(&self) -> usize {
        ICMPV6_ECHO_HEADER_LEN
    }
}

/// Body of an echo request or reply. The echoed data is an [`UnknownPacket`].
#[derive(Debug, Clone)]
pub struct Icmpv6EchoPacket {
    header: Icmpv6EchoHeader,
    payload: Option<Box<dyn Packet>>,
    memo: Memo,
}

impl Icmpv6EchoPacket {
    /// The echo header.
    pub fn header(&self) -> &Icmpv6EchoHeader {
        &self.header
    }

    /// The echoed data, empty when there is none.
    pub fn data(&self) -> &[u8] {
        self.payload.as_ref().map_or(&[], |p| p.raw_bytes())
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> Icmpv6EchoPacketBuilder {
        Icmpv6EchoPacketBuilder {
            identifier: Some(self.header.identifier),
            sequence_number: Some(self.header.sequence_number),
            payload: self.payload.as_ref().map(|p| p.builder()),
        }
    }
}

impl Decode for Icmpv6EchoPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        _ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(PROTOCOL, bytes, offset, length)?;
        r.require(ICMPV6_ECHO_HEADER_LEN)?;
        let header = Icmpv6EchoHeader {
            identifier: r.u16(0)?,
            sequence_number: r.u16(2)?,
            memo: Memo::new(),
        };
        let data = r.rest(ICMPV6_ECHO_HEADER_LEN)?;
        let payload: Option<Box<dyn Packet>> = if data.is_empty() {
            None
        } else {
            Some(Box::new(UnknownPacket::from_vec(data.to_vec())))
        };
        Ok(Self {
            header,
            payload,
            memo: Memo::new(),
        })
    }
}

impl Packet for Icmpv6EchoPacket {
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

value_eq!(Header: Icmpv6EchoHeader);
value_eq!(Packet: Icmpv6EchoPacket);

/// Builds an [`Icmpv6EchoPacket`].
#[derive(Debug, Default)]
pub struct Icmpv6EchoPacketBuilder {
    identifier: Option<u16>,
    sequence_number: Option<u16>,
    payload: Option<Box<dyn PacketBuilder>>,
}

impl Icmpv6EchoPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifier. Required.
    pub fn identifier(mut self, value: u16) -> Self {
        self.identifier = Some(value);
        self
    }

    /// Set the sequence number. Required.
    pub fn sequence_number(mut self, value: u16) -> Self {
        self.sequence_number = Some(value);
        self
    }

    /// Set the echoed data.
    pub fn data(self, value: impl Into<Vec<u8>>) -> Self {
        self.payload(UnknownPacketBuilder::new().data(value))
    }

    /// Set the payload builder.
    pub fn payload(mut self, value: impl PacketBuilder + 'static) -> Self {
        self.payload = Some(Box::new(value));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Icmpv6EchoPacket, BuildError> {
        let mut check = FieldCheck::new(PROTOCOL);
        let identifier = check.require("identifier", self.identifier);
        let sequence_number = check.require("sequence_number", self.sequence_number);
        check.finish()?;

        Ok(Icmpv6EchoPacket {
            header: Icmpv6EchoHeader {
                identifier,
                sequence_number,
                memo: Memo::new(),
            },
            payload: build_payload(PROTOCOL, self.payload)?,
            memo: Memo::new(),
        })
    }
}

packet_builder!(Icmpv6EchoPacketBuilder, PROTOCOL, payload);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_without_data() {
        let bytes = [0x00, 0x2a, 0x00, 0x07];
        let pkt = Icmpv6EchoPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(pkt.header().identifier(), 42);
        assert_eq!(pkt.header().sequence_number(), 7);
        assert!(pkt.payload().is_none());
        assert!(pkt.data().is_empty());
        assert_eq!(pkt.to_builder().build().unwrap(), pkt);
    }

    #[test]
    fn missing_identifier() {
        let err = Icmpv6EchoPacketBuilder::new()
            .sequence_number(1)
            .build()
            .unwrap_err();
        assert_eq!(err.missing_fields(), vec!["identifier"]);
    }
}
