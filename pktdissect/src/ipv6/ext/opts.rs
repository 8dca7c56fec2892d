use core::fmt;
use core::marker::PhantomData;

use crate::builder::{build_payload, FieldCheck, LengthBuilder, PacketBuilder};
use crate::codec::Reader;
use crate::error::{BuildError, DecodeError};
use crate::factory::{Decode, DecodeCtx};
use crate::ip::IpProtocol;
use crate::memo::Memo;
use crate::packet::{Header, Packet};

use super::options::{decode_options, Ipv6Option};
use super::ext_header_extent;

/// Distinguishes the two extension headers that carry an option list.
pub trait OptionsKind: fmt::Debug + Clone + Copy + Default + Send + Sync + 'static {
    /// Protocol name used in errors and logs.
    const NAME: &'static str;
}

/// Marker of the hop-by-hop options header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HopByHop;

impl OptionsKind for HopByHop {
    const NAME: &'static str = "IPv6 Hop-by-Hop Options";
}

/// Marker of the destination options header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestOptions;

impl OptionsKind for DestOptions {
    const NAME: &'static str = "IPv6 Destination Options";
}

/// Next header, length and option list of an options extension header.
///
/// The header length covers the decoded options only. When the option list
/// had to be cut short, it is smaller than `(hdr_ext_len + 1) * 8`.
#[derive(Debug, Clone)]
pub struct Ipv6OptionsHeader<K> {
    next_header: IpProtocol,
    hdr_ext_len: u8,
    options: Vec<Ipv6Option>,
    truncated: bool,
    memo: Memo,
    kind: PhantomData<K>,
}

impl<K: OptionsKind> Ipv6OptionsHeader<K> {
    /// Type of the next header.
    pub fn next_header(&self) -> IpProtocol {
        self.next_header
    }

    /// Declared length in 8-octet units, not counting the first 8 octets.
    pub fn hdr_ext_len(&self) -> u8 {
        self.hdr_ext_len
    }

    /// The decoded options.
    pub fn options(&self) -> &[Ipv6Option] {
        &self.options
    }

    /// Whether decoding stopped at an undecodable option.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl<K: OptionsKind> Header for Ipv6OptionsHeader<K> {
    header_object_methods!(K::NAME);

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.next_header.raw());
        out.push(self.hdr_ext_len);
        for option in &self.options {
            option.write_to(out);
        }
    }

    fn calc_length(&self) -> usize {
        2 + self.options.iter().map(|o| o.length()).sum::<usize>()
    }
}

/// A hop-by-hop or destination options header with its payload.
///
/// Bytes of the declared extent that follow an undecodable option are kept
/// between the header and the payload.
#[derive(Debug, Clone)]
pub struct Ipv6OptionsPacket<K> {
    header: Ipv6OptionsHeader<K>,
    unparsed: Vec<u8>,
    payload: Option<Box<dyn Packet>>,
    memo: Memo,
}

/// The hop-by-hop options header.
pub type Ipv6HopByHopPacket = Ipv6OptionsPacket<HopByHop>;
/// The destination options header.
pub type Ipv6DestOptionsPacket = Ipv6OptionsPacket<DestOptions>;

impl<K: OptionsKind> Ipv6OptionsPacket<K> {
    /// The extension header.
    pub fn header(&self) -> &Ipv6OptionsHeader<K> {
        &self.header
    }

    /// Type of the payload.
    pub fn next_header(&self) -> IpProtocol {
        self.header.next_header
    }

    /// The decoded options.
    pub fn options(&self) -> &[Ipv6Option] {
        &self.header.options
    }

    /// Bytes of the extent after the last decoded option.
    pub fn unparsed(&self) -> &[u8] {
        &self.unparsed
    }

    /// A builder holding the fields of this packet.
    pub fn to_builder(&self) -> Ipv6OptionsPacketBuilder<K> {
        Ipv6OptionsPacketBuilder {
            next_header: Some(self.header.next_header),
            hdr_ext_len: Some(self.header.hdr_ext_len),
            options: self.header.options.clone(),
            unparsed: self.unparsed.clone(),
            payload: self.payload.as_ref().map(|p| p.builder()),
            correct_length_at_build: false,
            kind: PhantomData,
        }
    }
}

impl<K: OptionsKind> Decode for Ipv6OptionsPacket<K> {
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError> {
        let r = Reader::new(K::NAME, bytes, offset, length)?;
        r.require(2)?;
        let next_header = IpProtocol::from(r.u8(0)?);
        let hdr_ext_len = r.u8(1)?;
        let extent = ext_header_extent(hdr_ext_len);

        let region = if extent > r.len() {
            tracing::warn!(
                protocol = K::NAME,
                offset,
                extent,
                available = r.len(),
                "options header exceeds captured data"
            );
            r.len()
        } else {
            extent
        };
        let (options, mut truncated) = decode_options(K::NAME, bytes, offset + 2, region - 2, ctx);
        truncated |= region < extent;
        let consumed = (2 + options.iter().map(|o| o.length()).sum::<usize>()).min(region);
        let unparsed = r.slice(consumed, region - consumed)?.to_vec();

        let payload = if extent <= r.len() {
            ctx.decode_payload(
                &ctx.factories().ip_numbers,
                next_header,
                bytes,
                offset + extent,
                r.len() - extent,
            )
        } else {
            None
        };

        Ok(Self {
            header: Ipv6OptionsHeader {
                next_header,
                hdr_ext_len,
                options,
                truncated,
                memo: Memo::new(),
                kind: PhantomData,
            },
            unparsed,
            payload,
            memo: Memo::new(),
        })
    }
}

impl<K: OptionsKind> Packet for Ipv6OptionsPacket<K> {
    packet_object_methods!(K::NAME);

    fn header(&self) -> Option<&dyn Header> {
        Some(&self.header)
    }

    fn payload(&self) -> Option<&dyn Packet> {
        self.payload.as_deref()
    }

    fn builder(&self) -> Box<dyn PacketBuilder> {
        Box::new(self.to_builder())
    }

    fn calc_length(&self) -> usize {
        self.header.length() + self.unparsed.len() + self.payload.as_ref().map_or(0, |p| p.length())
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.header.raw_bytes());
        out.extend_from_slice(&self.unparsed);
        if let Some(payload) = &self.payload {
            out.extend_from_slice(payload.raw_bytes());
        }
    }
}

impl<K: OptionsKind> PartialEq for Ipv6OptionsPacket<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw_bytes() == other.raw_bytes()
    }
}

impl<K: OptionsKind> Eq for Ipv6OptionsPacket<K> {}

/// Builds an [`Ipv6OptionsPacket`].
#[derive(Debug, Default)]
pub struct Ipv6OptionsPacketBuilder<K> {
    next_header: Option<IpProtocol>,
    hdr_ext_len: Option<u8>,
    options: Vec<Ipv6Option>,
    unparsed: Vec<u8>,
    payload: Option<Box<dyn PacketBuilder>>,
    correct_length_at_build: bool,
    kind: PhantomData<K>,
}

/// Builds an [`Ipv6HopByHopPacket`].
pub type Ipv6HopByHopPacketBuilder = Ipv6OptionsPacketBuilder<HopByHop>;
/// Builds an [`Ipv6DestOptionsPacket`].
pub type Ipv6DestOptionsPacketBuilder = Ipv6OptionsPacketBuilder<DestOptions>;

impl<K: OptionsKind> Ipv6OptionsPacketBuilder<K> {
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

    /// Append an option.
    pub fn option(mut self, value: Ipv6Option) -> Self {
        self.options.push(value);
        self
    }

    /// Replace the option list.
    pub fn options(mut self, value: Vec<Ipv6Option>) -> Self {
        self.options = value;
        self
    }

    /// Set raw bytes written after the options, inside the extent.
    pub fn unparsed(mut self, value: Vec<u8>) -> Self {
        self.unparsed = value;
        self
    }

    /// Set the payload builder.
    pub fn payload(mut self, value: impl PacketBuilder + 'static) -> Self {
        self.payload = Some(Box::new(value));
        self
    }

    /// Validate and build.
    ///
    /// With length correction the option list is padded so that options and
    /// unparsed bytes fill a multiple of 8 octets.
    pub fn build(self) -> Result<Ipv6OptionsPacket<K>, BuildError> {
        let mut check = FieldCheck::new(K::NAME);
        let next_header = check.require_or("next_header", self.next_header, IpProtocol::IPV6_NO_NXT);
        for option in &self.options {
            check.max("option data length", option.data_len() as u64, u8::MAX as u64);
        }
        let mut options = self.options;
        let hdr_ext_len = if self.correct_length_at_build {
            let len = 2 + options.iter().map(|o| o.length()).sum::<usize>() + self.unparsed.len();
            options.extend(Ipv6Option::padding((8 - len % 8) % 8));
            let units = (len + 7) / 8 - 1;
            check.max("hdr_ext_len", units as u64, u8::MAX as u64);
            units as u8
        } else {
            check.require("hdr_ext_len", self.hdr_ext_len)
        };
        check.finish()?;

        let payload = build_payload(K::NAME, self.payload)?;
        Ok(Ipv6OptionsPacket {
            header: Ipv6OptionsHeader {
                next_header,
                hdr_ext_len,
                options,
                truncated: false,
                memo: Memo::new(),
                kind: PhantomData,
            },
            unparsed: self.unparsed,
            payload,
            memo: Memo::new(),
        })
    }
}

impl<K: OptionsKind> LengthBuilder for Ipv6OptionsPacketBuilder<K> {
    fn correct_length_at_build(mut self, value: bool) -> Self {
        self.correct_length_at_build = value;
        self
    }
}

impl<K: OptionsKind> PacketBuilder for Ipv6OptionsPacketBuilder<K> {
    fn name(&self) -> &'static str {
        K::NAME
    }

    fn build_packet(self: Box<Self>) -> Result<Box<dyn Packet>, BuildError> {
        Ok(Box::new((*self).build()?))
    }

    fn payload_builder(&self) -> Option<&dyn PacketBuilder> {
        self.payload.as_deref()
    }

    fn payload_builder_mut(&mut self) -> Option<&mut (dyn PacketBuilder + 'static)> {
        self.payload.as_deref_mut()
    }
}
