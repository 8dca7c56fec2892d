use std::net::Ipv6Addr;

use crate::bits::BitField;
use crate::codec::Reader;
use crate::error::DecodeError;
use crate::ether::EtherAddr;
use crate::factory::{DecodeCtx, PacketFactories};

enum_sim! {
    /// Type of a neighbor discovery option.
    pub struct NdpOptionType (u8) {
        /// Source link-layer address.
        SRC_LINK_ADDR = 1,
        /// Target link-layer address.
        DST_LINK_ADDR = 2,
        /// Prefix information.
        PREFIX_INFO = 3,
        /// Redirected header.
        REDIRECTED_HDR = 4,
        /// MTU.
        MTU = 5,
    }
}

/// Length of the prefix information option.
pub const NDP_PREFIX_INFO_LEN: usize = 32;
/// Length of the MTU option.
pub const NDP_MTU_LEN: usize = 8;

const L_FLAG: BitField = BitField::flag(7);
const A_FLAG: BitField = BitField::flag(6);
const PREFIX_RESERVED: BitField = BitField::new(0, 6);

/// Content of the prefix information option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefixInfo {
    /// Number of leading bits of the prefix that are valid.
    pub prefix_len: u8,
    /// On-link flag.
    pub l_flag: bool,
    /// Autonomous address-configuration flag.
    pub a_flag: bool,
    /// The six reserved bits after the flags.
    pub reserved1: u8,
    /// Valid lifetime in seconds.
    pub valid_lifetime: u32,
    /// Preferred lifetime in seconds.
    pub preferred_lifetime: u32,
    /// The reserved word before the prefix.
    pub reserved2: u32,
    /// The prefix.
    pub prefix: Ipv6Addr,
}

/// One option of a neighbor discovery message.
///
/// The option length counts units of 8 octets including the type and
/// length bytes; `data` holds everything after those two bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NdpOption {
    /// Source link-layer address, including any trailing padding.
    SrcLinkAddr(Vec<u8>),
    /// Target link-layer address, including any trailing padding.
    DstLinkAddr(Vec<u8>),
    /// Prefix information.
    PrefixInfo(PrefixInfo),
    /// MTU.
    Mtu {
        /// The reserved 16 bits.
        reserved: u16,
        /// The recommended MTU.
        mtu: u32,
    },
    /// An option without a dedicated decoder.
    Unknown {
        /// Option type.
        option_type: NdpOptionType,
        /// Option data.
        data: Vec<u8>,
    },
}

impl NdpOption {
    /// A source link-layer address option carrying an Ethernet address.
    pub fn src_link_addr(addr: EtherAddr) -> Self {
        NdpOption::SrcLinkAddr(addr.as_bytes().to_vec())
    }

    /// A target link-layer address option carrying an Ethernet address.
    pub fn dst_link_addr(addr: EtherAddr) -> Self {
        NdpOption::DstLinkAddr(addr.as_bytes().to_vec())
    }

    /// The option type byte.
    pub fn option_type(&self) -> NdpOptionType {
        match self {
            NdpOption::SrcLinkAddr(_) => NdpOptionType::SRC_LINK_ADDR,
            NdpOption::DstLinkAddr(_) => NdpOptionType::DST_LINK_ADDR,
            NdpOption::PrefixInfo(_) => NdpOptionType::PREFIX_INFO,
            NdpOption::Mtu { .. } => NdpOptionType::MTU,
            NdpOption::Unknown { option_type, .. } => *option_type,
        }
    }

    /// The link-layer address as an Ethernet address, for the two link-layer
    /// address options holding at least six bytes.
    pub fn ether_addr(&self) -> Option<EtherAddr> {
        match self {
            NdpOption::SrcLinkAddr(data) | NdpOption::DstLinkAddr(data) if data.len() >= 6 => {
                Some(EtherAddr::from_bytes(data))
            }
            _ => None,
        }
    }

    /// Number of bytes the option occupies on the wire.
    pub fn length(&self) -> usize {
        match self {
            NdpOption::SrcLinkAddr(data)
            | NdpOption::DstLinkAddr(data)
            | NdpOption::Unknown { data, .. } => 2 + data.len(),
            NdpOption::PrefixInfo(_) => NDP_PREFIX_INFO_LEN,
            NdpOption::Mtu { .. } => NDP_MTU_LEN,
        }
    }

    /// Append the wire representation. The length byte is the wire length in
    /// 8-octet units, rounded down; builders reject lengths that are not a
    /// multiple of 8.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.option_type().raw());
        out.push((self.length() / 8) as u8);
        match self {
            NdpOption::SrcLinkAddr(data)
            | NdpOption::DstLinkAddr(data)
            | NdpOption::Unknown { data, .. } => out.extend_from_slice(data),
            NdpOption::PrefixInfo(info) => {
                out.push(info.prefix_len);
                let mut flags = 0;
                flags = L_FLAG.put_flag(flags, info.l_flag);
                flags = A_FLAG.put_flag(flags, info.a_flag);
                flags = PREFIX_RESERVED.put(flags, info.reserved1 as u32);
                out.push(flags as u8);
                out.extend_from_slice(&info.valid_lifetime.to_be_bytes());
                out.extend_from_slice(&info.preferred_lifetime.to_be_bytes());
                out.extend_from_slice(&info.reserved2.to_be_bytes());
                out.extend_from_slice(&info.prefix.octets());
            }
            NdpOption::Mtu { reserved, mtu } => {
                out.extend_from_slice(&reserved.to_be_bytes());
                out.extend_from_slice(&mtu.to_be_bytes());
            }
        }
    }
}

const PROTOCOL: &str = "NDP option";

// Checks the length byte and returns the data after type and length.
fn option_data<'a>(r: &Reader<'a>) -> Result<&'a [u8], DecodeError> {
    r.require(2)?;
    let units = r.u8(1)?;
    if units == 0 {
        return Err(r.invalid(1, "option length", 0));
    }
    let len = units as usize * 8;
    if len > r.len() {
        return Err(r.inconsistent(1, "option length", len));
    }
    r.slice(2, len - 2)
}

fn decode_src_link_addr(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<NdpOption, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    Ok(NdpOption::SrcLinkAddr(option_data(&r)?.to_vec()))
}

fn decode_dst_link_addr(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<NdpOption, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    Ok(NdpOption::DstLinkAddr(option_data(&r)?.to_vec()))
}

fn decode_prefix_info(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<NdpOption, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    let data = option_data(&r)?;
    if data.len() + 2 != NDP_PREFIX_INFO_LEN {
        return Err(r.invalid(1, "prefix information length", r.u8(1)? as u64));
    }
    let flags = r.u8(3)? as u32;
    Ok(NdpOption::PrefixInfo(PrefixInfo {
        prefix_len: r.u8(2)?,
        l_flag: L_FLAG.is_set(flags),
        a_flag: A_FLAG.is_set(flags),
        reserved1: PREFIX_RESERVED.get(flags) as u8,
        valid_lifetime: r.u32(4)?,
        preferred_lifetime: r.u32(8)?,
        reserved2: r.u32(12)?,
        prefix: r.ipv6_addr(16)?,
    }))
}

fn decode_mtu(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<NdpOption, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    let data = option_data(&r)?;
    if data.len() + 2 != NDP_MTU_LEN {
        return Err(r.invalid(1, "MTU option length", r.u8(1)? as u64));
    }
    Ok(NdpOption::Mtu {
        reserved: r.u16(2)?,
        mtu: r.u32(4)?,
    })
}

/// The catch-all of the NDP option registry.
pub fn decode_unknown_option(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<NdpOption, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    let data = option_data(&r)?;
    Ok(NdpOption::Unknown {
        option_type: r.u8(0)?.into(),
        data: data.to_vec(),
    })
}

/// Decode options from `bytes[offset..offset + length]` until the region is
/// exhausted or an option fails to decode.
pub(crate) fn decode_options(
    protocol: &'static str,
    bytes: &[u8],
    offset: usize,
    length: usize,
    ctx: &DecodeCtx<'_>,
) -> (Vec<NdpOption>, bool) {
    let registry = &ctx.factories().ndp_options;
    let mut options = Vec::new();
    let mut at = 0;
    while at < length {
        let Some(&option_type) = bytes.get(offset + at) else {
            return (options, true);
        };
        match registry.decode(option_type.into(), bytes, offset + at, length - at, ctx) {
            Ok(option) => {
                at += option.length();
                options.push(option);
            }
            Err(error) => {
                tracing::warn!(
                    protocol,
                    offset = offset + at,
                    %error,
                    "option list truncated"
                );
                return (options, true);
            }
        }
    }
    (options, false)
}

pub(crate) fn register(factories: &mut PacketFactories) {
    factories
        .ndp_options
        .register(NdpOptionType::SRC_LINK_ADDR, decode_src_link_addr)
        .register(NdpOptionType::DST_LINK_ADDR, decode_dst_link_addr)
        .register(NdpOptionType::PREFIX_INFO, decode_prefix_info)
        .register(NdpOptionType::MTU, decode_mtu);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_info_and_mtu() {
        let mut bytes = vec![3, 4, 64, 0xc0, 0, 0, 0x0e, 0x10, 0, 0, 0x07, 0x08, 0, 0, 0, 0];
        bytes.extend_from_slice(&Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0).octets());
        bytes.extend_from_slice(&[5, 1, 0, 0, 0, 0, 0x05, 0xdc]);

        let (options, truncated) =
            decode_options("Test", &bytes, 0, bytes.len(), &DecodeCtx::global());
        assert!(!truncated);
        assert_eq!(
            options,
            vec![
                NdpOption::PrefixInfo(PrefixInfo {
                    prefix_len: 64,
                    l_flag: true,
                    a_flag: true,
                    reserved1: 0,
                    valid_lifetime: 3600,
                    preferred_lifetime: 1800,
                    reserved2: 0,
                    prefix: Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0),
                }),
                NdpOption::Mtu {
                    reserved: 0,
                    mtu: 1500,
                },
            ]
        );
        let mut out = Vec::new();
        options.iter().for_each(|o| o.write_to(&mut out));
        assert_eq!(out, bytes);
    }

    #[test]
    fn zero_length_stops_the_list() {
        let bytes = [1, 1, 0, 1, 2, 3, 4, 5, 99, 0, 0, 0, 0, 0, 0, 0];
        let (options, truncated) =
            decode_options("Test", &bytes, 0, bytes.len(), &DecodeCtx::global());
        assert!(truncated);
        assert_eq!(options.len(), 1);
        assert_eq!(
            options[0].ether_addr(),
            Some(EtherAddr([0, 1, 2, 3, 4, 5]))
        );
    }

    #[test]
    fn unknown_option_kept() {
        let bytes = [99, 1, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let option = decode_unknown_option(&bytes, 0, bytes.len(), &DecodeCtx::global()).unwrap();
        assert_eq!(option.option_type(), NdpOptionType::from(99));
        assert_eq!(option.length(), 8);
        assert!(option.ether_addr().is_none());
    }

    #[test]
    fn mtu_with_wrong_length() {
        let bytes = [5, 2, 0, 0, 0, 0, 5, 0xdc, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            decode_mtu(&bytes, 0, bytes.len(), &DecodeCtx::global()),
            Err(DecodeError::InvalidField { .. })
        ));
    }
}
