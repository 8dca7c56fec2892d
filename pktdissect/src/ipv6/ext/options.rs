use crate::codec::Reader;
use crate::error::DecodeError;
use crate::factory::{DecodeCtx, PacketFactories};

enum_sim! {
    /// Type of an option carried in hop-by-hop and destination options headers.
    pub struct Ipv6OptionType (u8) {
        /// A single byte of padding.
        PAD1 = 0,
        /// Several bytes of padding.
        PADN = 1,
        /// Router alert, RFC 2711.
        ROUTER_ALERT = 5,
        /// Jumbo payload, RFC 2675.
        JUMBO_PAYLOAD = 0xc2,
    }
}

impl Ipv6OptionType {
    /// The two high-order bits: what a node that does not recognize the
    /// option must do.
    pub const fn action(&self) -> u8 {
        self.0 >> 6
    }

    /// Whether the option data may change en route.
    pub const fn may_change(&self) -> bool {
        self.0 & 0x20 != 0
    }
}

/// One option of a hop-by-hop or destination options header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ipv6Option {
    /// A single zero byte.
    Pad1,
    /// Padding. The bytes are kept as found.
    PadN(Vec<u8>),
    /// Router alert with its 16-bit value.
    RouterAlert(u16),
    /// An option without a dedicated decoder.
    Unknown {
        /// Option type.
        option_type: Ipv6OptionType,
        /// Option data.
        data: Vec<u8>,
    },
}

/// Length of the router alert option data.
pub const ROUTER_ALERT_DATA_LEN: usize = 2;

impl Ipv6Option {
    /// The option type byte.
    pub fn option_type(&self) -> Ipv6OptionType {
        match self {
            Ipv6Option::Pad1 => Ipv6OptionType::PAD1,
            Ipv6Option::PadN(_) => Ipv6OptionType::PADN,
            Ipv6Option::RouterAlert(_) => Ipv6OptionType::ROUTER_ALERT,
            Ipv6Option::Unknown { option_type, .. } => *option_type,
        }
    }

    /// Number of bytes the option occupies on the wire.
    pub fn length(&self) -> usize {
        match self {
            Ipv6Option::Pad1 => 1,
            Ipv6Option::PadN(data) => 2 + data.len(),
            Ipv6Option::RouterAlert(_) => 2 + ROUTER_ALERT_DATA_LEN,
            Ipv6Option::Unknown { data, .. } => 2 + data.len(),
        }
    }

    /// Padding of `len` bytes.
    pub fn padding(len: usize) -> Option<Self> {
        match len {
            0 => None,
            1 => Some(Ipv6Option::Pad1),
            n => Some(Ipv6Option::PadN(vec![0; n - 2])),
        }
    }

    /// Append the wire representation.
    ///
    /// Data longer than 255 bytes cannot be encoded; builders reject it.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.option_type().raw());
        match self {
            Ipv6Option::Pad1 => {}
            Ipv6Option::PadN(data) | Ipv6Option::Unknown { data, .. } => {
                out.push(data.len() as u8);
                out.extend_from_slice(data);
            }
            Ipv6Option::RouterAlert(value) => {
                out.push(ROUTER_ALERT_DATA_LEN as u8);
                out.extend_from_slice(&value.to_be_bytes());
            }
        }
    }

    pub(crate) fn data_len(&self) -> usize {
        self.length().saturating_sub(2)
    }
}

const PROTOCOL: &str = "IPv6 option";

// Reads the type and length bytes and the data they announce.
fn tlv<'a>(r: &Reader<'a>) -> Result<&'a [u8], DecodeError> {
    r.require(2)?;
    let len = r.u8(1)? as usize;
    if len + 2 > r.len() {
        return Err(r.inconsistent(2, "option data length", len));
    }
    r.slice(2, len)
}

fn decode_pad1(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<Ipv6Option, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    r.require(1)?;
    Ok(Ipv6Option::Pad1)
}

fn decode_padn(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<Ipv6Option, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    Ok(Ipv6Option::PadN(tlv(&r)?.to_vec()))
}

fn decode_router_alert(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<Ipv6Option, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    let data = tlv(&r)?;
    if data.len() != ROUTER_ALERT_DATA_LEN {
        return Err(r.invalid(1, "router alert length", data.len() as u64));
    }
    Ok(Ipv6Option::RouterAlert(r.u16(2)?))
}

/// The catch-all of the IPv6 option registry.
pub fn decode_unknown_option(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<Ipv6Option, DecodeError> {
    let r = Reader::new(PROTOCOL, bytes, offset, length)?;
    let data = tlv(&r)?;
    Ok(Ipv6Option::Unknown {
        option_type: r.u8(0)?.into(),
        data: data.to_vec(),
    })
}

/// Decode options from `bytes[offset..offset + length]` until the region is
/// exhausted or an option fails to decode.
///
/// Returns the options decoded so far and whether the list was cut short.
pub(crate) fn decode_options(
    protocol: &'static str,
    bytes: &[u8],
    offset: usize,
    length: usize,
    ctx: &DecodeCtx<'_>,
) -> (Vec<Ipv6Option>, bool) {
    let registry = &ctx.factories().ipv6_options;
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
        .ipv6_options
        .register(Ipv6OptionType::PAD1, decode_pad1)
        .register(Ipv6OptionType::PADN, decode_padn)
        .register(Ipv6OptionType::ROUTER_ALERT, decode_router_alert);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_list() {
        let bytes = [0x00, 0x05, 0x02, 0x00, 0x00, 0x01, 0x01, 0x00, 0x3e, 0x01, 0xaa];
        let (options, truncated) = decode_options("Test", &bytes, 0, bytes.len(), &DecodeCtx::global());
        assert!(!truncated);
        assert_eq!(
            options,
            vec![
                Ipv6Option::Pad1,
                Ipv6Option::RouterAlert(0),
                Ipv6Option::PadN(vec![0]),
                Ipv6Option::Unknown {
                    option_type: Ipv6OptionType::from(0x3e),
                    data: vec![0xaa],
                },
            ]
        );
        let mut out = Vec::new();
        options.iter().for_each(|o| o.write_to(&mut out));
        assert_eq!(out, bytes);
    }

    #[test]
    fn bad_router_alert_stops_the_list() {
        let bytes = [0x01, 0x00, 0x05, 0x01, 0x00];
        let (options, truncated) = decode_options("Test", &bytes, 0, bytes.len(), &DecodeCtx::global());
        assert!(truncated);
        assert_eq!(options, vec![Ipv6Option::PadN(vec![])]);
    }

    #[test]
    fn option_type_bits() {
        assert_eq!(Ipv6OptionType::JUMBO_PAYLOAD.action(), 3);
        assert!(!Ipv6OptionType::JUMBO_PAYLOAD.may_change());
        assert_eq!(Ipv6Option::padding(1), Some(Ipv6Option::Pad1));
        assert_eq!(Ipv6Option::padding(4).map(|o| o.length()), Some(4));
    }
}
