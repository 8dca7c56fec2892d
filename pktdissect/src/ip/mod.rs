//! Numbers and checksum helpers shared by IPv4 and IPv6 upper layers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use byteorder::{ByteOrder, NetworkEndian};

use crate::checksum_utils::{combine, from_slice, from_slices};

enum_sim! {
    /// An enum-like type for representing different protocols in IPv4/v6.
    pub struct IpProtocol (u8) {
        /// IP packet payload is Hop-by-hop extention number.
        HOPOPT = 0,

        /// IP packet payload is ICMP protocol.
        ICMP = 1,

        /// IP packet payload is TCP protocol.
        TCP = 6,

        /// IP packet payload is UDP protocol.
        UDP =  17,

        /// IP packet payload is IPv6.
        IPV6 = 41,

        /// IP packet payload is IPv6 Route.
        IPV6_ROUTE = 43,

        /// IP packet payload is IPv6 Fragmentation.
        IPV6_FRAG = 44,

        /// IP packet payload is ICMPv6.
        ICMPV6 = 58,

        /// IP packet payload is IPv6 no extention.
        IPV6_NO_NXT = 59,

        /// IP packet payload is IPv6 OPTS.
        IPV6_OPTS = 60,

        /// IP packet payload is SCTP.
        SCTP = 132,
    }
}

enum_sim! {
    /// The version nibble leading every IP packet.
    pub struct IpVersion (u8) {
        /// IPv4.
        V4 = 4,
        /// IPv6.
        V6 = 6,
    }
}

/// The pseudo-header prepended to an upper-layer packet for checksumming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoHeader {
    /// RFC 768: src, dst, zero, protocol, 16-bit length.
    V4 {
        /// Source address.
        src: Ipv4Addr,
        /// Destination address.
        dst: Ipv4Addr,
        /// Upper-layer protocol.
        protocol: IpProtocol,
        /// Upper-layer length.
        length: u16,
    },
    /// RFC 8200 8.1: src, dst, 32-bit length, three zeros, next header.
    V6 {
        /// Source address.
        src: Ipv6Addr,
        /// Final destination address.
        dst: Ipv6Addr,
        /// Upper-layer protocol.
        next_header: IpProtocol,
        /// Upper-layer length.
        length: u32,
    },
}

impl PseudoHeader {
    /// Pair `src` and `dst` with the upper-layer `protocol` and `length`.
    ///
    /// Returns `None` when the address families differ or `length` does not
    /// fit into the length field of the family.
    pub fn new(src: IpAddr, dst: IpAddr, protocol: IpProtocol, length: usize) -> Option<Self> {
        match (src, dst) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => Some(PseudoHeader::V4 {
                src,
                dst,
                protocol,
                length: u16::try_from(length).ok()?,
            }),
            (IpAddr::V6(src), IpAddr::V6(dst)) => Some(PseudoHeader::V6 {
                src,
                dst,
                next_header: protocol,
                length: u32::try_from(length).ok()?,
            }),
            _ => None,
        }
    }

    /// The one's complement sum of the pseudo-header (not complemented).
    pub fn calc_checksum(&self) -> u16 {
        match self {
            PseudoHeader::V4 {
                src,
                dst,
                protocol,
                length,
            } => {
                let mut proto_len = [0u8; 4];
                proto_len[1] = protocol.raw();
                NetworkEndian::write_u16(&mut proto_len[2..4], *length);
                combine(&[
                    from_slice(&src.octets()),
                    from_slice(&dst.octets()),
                    from_slice(&proto_len[..]),
                ])
            }
            PseudoHeader::V6 {
                src,
                dst,
                next_header,
                length,
            } => {
                let mut len_nh = [0u8; 8];
                NetworkEndian::write_u32(&mut len_nh[0..4], *length);
                len_nh[7] = next_header.raw();
                combine(&[
                    from_slice(&src.octets()),
                    from_slice(&dst.octets()),
                    from_slice(&len_nh[..]),
                ])
            }
        }
    }

    /// The final Internet checksum of `segments` under this pseudo-header.
    ///
    /// The checksum field inside `segments` must be zero when computing a
    /// checksum; a correct checksum in place makes the result zero.
    pub fn checksum(&self, segments: &[&[u8]]) -> u16 {
        !combine(&[self.calc_checksum(), from_slices(segments)])
    }
}
