use std::net::Ipv6Addr;

use crate::builder::{build_payload, FieldCheck, LengthBuilder, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{Decode, DecodeCtx};
use crate::ip::IpProtocol;
use crate::memo::Memo;
use crate::packet::{Header, Packet};

use super::ext_header_extent;

enum_sim! {
    /// Routing header type.
    pub struct Ipv6RoutingType (u8) {
        /// Source route, deprecated by RFC 5095.
        TYPE0 = 0,
        /// Mobile IPv6 home address, RFC 6275.
        TYPE2 = 2,
        /// RPL source route, RFC 6554.
        RPL = 3,
        /// Segment routing, RFC 8754.
        SRH = 4,
    }
}

/// The type-specific part of a routing header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoutingData {
    /// Type 0: a reserved word followed by a list of addresses.
    Type0 {
        /// The reserved word, kept as found.
        reserved: u32,
        /// The addresses to visit.
        addresses: Vec<Ipv6Addr>,
    },
    /// Any other type, kept as raw bytes.
    Unknown {
        /// The routing type.
        routing_type: Ipv6RoutingType,
        /// Everything after the segments left field.
        data: Vec<u8>,
    },
}

impl RoutingData {
    /// The routing type byte.
    pub fn routing_type(&self) -> Ipv6RoutingType {
        match self {
            RoutingData::Type0 { .. } => Ipv6RoutingType::TYPE0,
            RoutingData::Unknown { routing_type, .. } => *routing_type,
        }
    }

    /// Number of bytes on the wire.
    pub fn length(&self) -> usize {
        match self {
            RoutingData::Type0 { addresses, .. } => 4 + 16 * addresses.len(),
            RoutingData::Unknown { data, .. } => data.len(),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            RoutingData::Type0 {
                reserved,
                addresses,
            } => {
                out.extend_from_slice(&reserved.to_be_bytes());
                for addr in addresses {
                    out.extend_from_slice(&addr.octets());
                }
            }
            RoutingData::Unknown { data, .. } => out.extend_from_slice(data),
        }
    }
}

const PROTOCOL: &str = "IPv6 Routing";

/// The routing extension header.
#[derive(Debug, Clone)]
pub struct Ipv6RoutingHeader {
    next_header: IpProtocol,
    hdr_ext_len: u8,
    segments_left: u8,
    data: RoutingData,
    memo: Memo,
}

impl Ipv6RoutingHeader {
    fn parse(r: &Reader<'_>) -> Result<Self, DecodeError> {
        r.require(4)?;
        let hdr_ext_len = r.u8(1)?;
        let extent = ext_header_extent(hdr_ext_len);
        if extent > r.len() {
            return Err(r.inconsistent(0, "hdr_ext_len", extent));
        }
        let routing_type = Ipv6RoutingType::from(r.u8(2)?);
        let data = if routing_type == Ipv6RoutingType::TYPE0 {
            // 8 * hdr_ext_len bytes of addresses
            if hdr_ext_len % 2 != 0 {
                return Err(r.invalid(1, "hdr_ext_len", hdr_ext_len as u64));
            }
            let addresses = (0..hdr_ext_len as usize / 2)
                .map(|i| r.ipv6_addr(8 + 16 * i))
                .collect::<Result<Vec<_>, _>>()?;
            RoutingData::Type0 {
                reserved: r.u32(4)?,
                addresses,
            }
        } else {
            RoutingData::Unknown {
                routing_type,
                data: r.slice(4, extent - 4)?.to_vec(),
            }
        };
        Ok(Self {
            next_header: r.u8(0)?.into(),
            hdr_ext_len,
            segments_left: r.u8(3)?,
            data,
            memo: Memo::new(),
        })
    }

    /// Type of the next header.
    pub fn next_header(&self) -> IpProtocol {
        self.next_header
    }

    /// Length in 8-octet units, not counting the first 8 octets.
    pub fn hdr_ext_len(&self) -> u8 {
        self.hdr_ext_len
    }

    /// The routing type.
    pub fn routing_type(&self) -> Ipv6RoutingType {
        self.data.routing_type()
    }

    /// Number of route segments remaining.
    pub fn segments_left(&self) -> u8 {
        self.segments_left
    }

    /// The type-specific data.
    pub fn data(&self) -> &RoutingData {
        &self.data
    }
}

impl Header for Ipv6RoutingHeader {
    header_object_methods!(PROTOCOL);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.next_header.raw());
        out.push(self.hdr_ext_len);
        out.push(self.data.routing_type().raw());
        out.push(self.segments_left);
        self.data.write_to(out);
    }

    fn calc_length(&self) -> usize {
        4 + self.data.length()
    }
}

/// A routing extension header with its payload.
#[derive(Debug, Clone)]
pub struct Ipv6RoutingPacket {
    header: Ipv6RoutingHeader,
    payload: Option<Box<dyn Packet>>,
    memo: Memo,
}

impl Ipv6RoutingPacket {
    /// The routing header.
    pub fn header(&self) -> &Ipv6RoutingHeader {
        &self.header
    }

    /// Type of the payload.
    pub fn next_header(&self) -> IpProtocol {
        self.header.next_header
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> Ipv6RoutingPacketBuilder {
        Ipv6RoutingPacketBuilder {
            next_header: Some(self.header.next_header),
            hdr_ext_len: Some(self.header.hdr_ext_len),
            segments_left: Some(self.header.segments_left),
            data: Some(self.header.data.clone()),
            payload: self.payload.as_ref().map(|p| p.builder()),
            correct_length_at_build: false,
        }
    }
}

impl Decode for Ipv6RoutingPacket {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(PROTOCOL, bytes, offset, length)?;
        let header = Ipv6RoutingHeader::parse(&r)?;
        let extent = ext_header_extent(header.hdr_ext_len);
        let payload = ctx.decode_payload(
            &ctx.factories().ip_numbers,
            header.next_header,
            bytes,
            offset + extent,
            r.len() - extent,
        );
        Ok(Self {
            header,
            payload,
            memo: Memo::new(),
        })
    }
}

impl Packet for Ipv6RoutingPacket {
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

value_eq!(Header: Ipv6RoutingHeader);
value_eq!(Packet: Ipv6RoutingPacket);

/// Builds an [`Ipv6RoutingPacket`].
#[derive(Debug, Default)]
pub struct Ipv6RoutingPacketBuilder {
    next_header: Option<IpProtocol>,
    hdr_ext_len: Option<u8>,
    segments_left: Option<u8>,
    data: Option<RoutingData>,
    payload: Option<Box<dyn PacketBuilder>>,
    correct_length_at_build: bool,
}

impl Ipv6RoutingPacketBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next header. Required.
    pub fn next_header(mut self, value: IpProtocol) -> Self {
        self.next_header = Some(value);
        self
    }

    /// Set the length in 8-octet units. Required unless the length is corrected.
    pub fn hdr_ext_len(mut self, value: u8) -> Self {
        self.hdr_ext_len = Some(value);
        self
    }

    /// Set the number of segments left. Required.
    pub fn segments_left(mut self, value: u8) -> Self {
        self.segments_left = Some(value);
        self
    }

    /// Set the type-specific data. Required.
    pub fn data(mut self, value: RoutingData) -> Self {
        self.data = Some(value);
        self
    }

    /// Set the payload builder.
    pub fn payload(mut self, value: impl PacketBuilder + 'static) -> Self {
        self.payload = Some(Box::new(value));
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Ipv6RoutingPacket, BuildError> {
        let mut check = FieldCheck::new(PROTOCOL);
        let next_header = check.require_or("next_header", self.next_header, IpProtocol::IPV6_NO_NXT);
        let segments_left = check.require("segments_left", self.segments_left);
        let data = check.require_or(
            "data",
            self.data,
            RoutingData::Unknown {
                routing_type: Ipv6RoutingType::TYPE0,
                data: Vec::new(),
            },
        );
        let hdr_ext_len = if self.correct_length_at_build {
            let len = 4 + data.length();
            if len % 8 != 0 {
                check.invalid("data", "length is not a multiple of 8 octets");
            }
            let units = (len / 8).saturating_sub(1);
            check.max("hdr_ext_len", units as u64, u8::MAX as u64);
            units as u8
        } else {
            check.require("hdr_ext_len", self.hdr_ext_len)
        };
        check.finish()?;

        let payload = build_payload(PROTOCOL, self.payload)?;
        Ok(Ipv6RoutingPacket {
            header: Ipv6RoutingHeader {
                next_header,
                hdr_ext_len,
                segments_left,
                data,
                memo: Memo::new(),
            },
            payload,
            memo: Memo::new(),
        })
    }
}

impl LengthBuilder for Ipv6RoutingPacketBuilder {
    fn correct_length_at_build(mut self, value: bool) -> Self {
        self.correct_length_at_build = value;
        self
    }
}

packet_builder!(Ipv6RoutingPacketBuilder, PROTOCOL, payload);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type0_round_trip() {
        let addrs = vec![
            Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
            Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2),
        ];
        let pkt = Ipv6RoutingPacketBuilder::new()
            .next_header(IpProtocol::IPV6_NO_NXT)
            .segments_left(2)
            .data(RoutingData::Type0 {
                reserved: 0,
                addresses: addrs.clone(),
            })
            .correct_length_at_build(true)
            .build()
            .unwrap();
        assert_eq!(pkt.header().hdr_ext_len(), 4);
        assert_eq!(pkt.length(), 40);

        let bytes = pkt.raw_data();
        let decoded = Ipv6RoutingPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(decoded, pkt);
        match decoded.header().data() {
            RoutingData::Type0 { addresses, .. } => assert_eq!(addresses, &addrs),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_type_kept_raw() {
        let bytes = [59, 0, 4, 1, 0xde, 0xad, 0xbe, 0xef];
        let pkt = Ipv6RoutingPacket::decode(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(pkt.header().routing_type(), Ipv6RoutingType::SRH);
        assert_eq!(
            pkt.header().data(),
            &RoutingData::Unknown {
                routing_type: Ipv6RoutingType::SRH,
                data: vec![0xde, 0xad, 0xbe, 0xef],
            }
        );
        assert_eq!(pkt.raw_bytes(), &bytes[..]);
    }

    #[test]
    fn malformed_headers() {
        // odd hdr_ext_len for type 0
        let mut bytes = vec![59, 1, 0, 0];
        bytes.extend_from_slice(&[0; 12]);
        assert!(Ipv6RoutingPacket::decode(&bytes, 0, bytes.len()).is_err());

        // extent beyond the buffer
        let bytes = [59, 2, 0, 0, 0, 0, 0, 0];
        let err = Ipv6RoutingPacket::decode(&bytes, 0, bytes.len()).unwrap_err();
        assert!(matches!(err, DecodeError::InconsistentLength { declared: 24, .. }));
    }

    #[test]
    fn bad_data_length_is_rejected() {
        let err = Ipv6RoutingPacketBuilder::new()
            .next_header(IpProtocol::IPV6_NO_NXT)
            .segments_left(0)
            .data(RoutingData::Unknown {
                routing_type: Ipv6RoutingType::SRH,
                data: vec![0; 3],
            })
            .correct_length_at_build(true)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("multiple of 8"));
    }
}
