//! Type-keyed decoder registries.
//!
//! A decoder that reaches its payload reads a key from its own header (the
//! EtherType, the IPv6 next header, a UDP port, ...) and looks it up in the
//! matching [`Registry`]. Registries fall back to a catch-all decoder for
//! unregistered keys. Payload decoding never fails: an error from the inner
//! decoder is kept as a [`MalformedPacket`] holding the bytes.
//!
//! The default registries are built once and shared by the whole process.
//! Custom registries can be assembled with [`PacketFactories::with_defaults`]
//! or [`PacketFactories::empty`] and passed through a [`DecodeCtx`].

use core::fmt;
use core::hash::Hash;
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::config::DissectConfig;
use crate::error::DecodeError;
use crate::ether::EtherType;
use crate::gtpv1::{GtpExtension, GtpExtensionType};
use crate::icmpv6::ndp::{NdpOption, NdpOptionType};
use crate::icmpv6::Icmpv6MsgType;
use crate::ip::{IpProtocol, IpVersion};
use crate::ipv6::ext::{Ipv6Option, Ipv6OptionType};
use crate::opaque::{MalformedPacket, UnknownPacket};
use crate::packet::Packet;

/// Decode one value of type `T` from `bytes[offset..offset + length]`.
pub type DecodeFn<T> = fn(&[u8], usize, usize, &DecodeCtx<'_>) -> Result<T, DecodeError>;

/// A value type with a decoder.
pub trait Decode: Sized {
    /// Decode from `bytes[offset..offset + length]` with explicit registries
    /// and configuration.
    fn decode_with(
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<Self, DecodeError>;

    /// Decode with the process-wide registries and configuration.
    fn decode(bytes: &[u8], offset: usize, length: usize) -> Result<Self, DecodeError> {
        Self::decode_with(bytes, offset, length, &DecodeCtx::global())
    }

    /// Decode all of `bytes`.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(bytes, 0, bytes.len())
    }
}

/// Adapts a concrete decoder to a [`DecodeFn`] producing boxed packets.
pub fn decode_boxed<P: Decode + Packet>(
    bytes: &[u8],
    offset: usize,
    length: usize,
    ctx: &DecodeCtx<'_>,
) -> Result<Box<dyn Packet>, DecodeError> {
    Ok(Box::new(P::decode_with(bytes, offset, length, ctx)?))
}

/// The catch-all of every packet registry.
pub fn decode_unknown(
    bytes: &[u8],
    offset: usize,
    length: usize,
    _ctx: &DecodeCtx<'_>,
) -> Result<Box<dyn Packet>, DecodeError> {
    Ok(Box::new(UnknownPacket::new(bytes, offset, length)))
}

/// Maps the keys of one number space to decoders.
pub struct Registry<K, T> {
    space: &'static str,
    decoders: HashMap<K, DecodeFn<T>>,
    fallback: DecodeFn<T>,
}

impl<K, T> Registry<K, T>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    /// An empty registry for the number space `space`.
    pub fn new(space: &'static str, fallback: DecodeFn<T>) -> Self {
        Self {
            space,
            decoders: HashMap::new(),
            fallback,
        }
    }

    /// Name of the number space.
    pub fn space(&self) -> &'static str {
        self.space
    }

    /// Register `decoder` for `key`, replacing any previous one.
    pub fn register(&mut self, key: K, decoder: DecodeFn<T>) -> &mut Self {
        self.decoders.insert(key, decoder);
        self
    }

    /// Remove the decoder for `key`.
    pub fn unregister(&mut self, key: K) -> Option<DecodeFn<T>> {
        self.decoders.remove(&key)
    }

    /// Replace the catch-all decoder.
    pub fn set_fallback(&mut self, fallback: DecodeFn<T>) -> &mut Self {
        self.fallback = fallback;
        self
    }

    /// Whether a decoder is registered for `key`.
    pub fn contains(&self, key: K) -> bool {
        self.decoders.contains_key(&key)
    }

    /// The decoder registered for `key`, or the catch-all.
    pub fn get(&self, key: K) -> DecodeFn<T> {
        self.decoders.get(&key).copied().unwrap_or(self.fallback)
    }

    /// Decode with the decoder registered for `key`.
    pub fn decode(
        &self,
        key: K,
        bytes: &[u8],
        offset: usize,
        length: usize,
        ctx: &DecodeCtx<'_>,
    ) -> Result<T, DecodeError> {
        match self.decoders.get(&key) {
            Some(decoder) => decoder(bytes, offset, length, ctx),
            None => {
                tracing::trace!(space = self.space, key = %key, "no decoder registered");
                (self.fallback)(bytes, offset, length, ctx)
            }
        }
    }
}

impl<K: fmt::Display, T> fmt::Debug for Registry<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.decoders.keys().map(|k| k.to_string()).collect();
        keys.sort();
        f.debug_struct("Registry")
            .field("space", &self.space)
            .field("keys", &keys)
            .finish()
    }
}

/// Every registry consulted while decoding.
#[derive(Debug)]
pub struct PacketFactories {
    /// Ethernet payloads, keyed by EtherType.
    pub ether_types: Registry<EtherType, Box<dyn Packet>>,
    /// IPv6 and extension header payloads, keyed by next header.
    pub ip_numbers: Registry<IpProtocol, Box<dyn Packet>>,
    /// UDP payloads, keyed by port.
    pub udp_ports: Registry<u16, Box<dyn Packet>>,
    /// ICMPv6 message bodies, keyed by ICMPv6 type.
    pub icmpv6_types: Registry<Icmpv6MsgType, Box<dyn Packet>>,
    /// Tunnelled IP packets, keyed by the version nibble.
    pub ip_versions: Registry<IpVersion, Box<dyn Packet>>,
    /// Hop-by-hop and destination options.
    pub ipv6_options: Registry<Ipv6OptionType, Ipv6Option>,
    /// Neighbor discovery options.
    pub ndp_options: Registry<NdpOptionType, NdpOption>,
    /// GTPv1 extension headers.
    pub gtpv1_extensions: Registry<GtpExtensionType, GtpExtension>,
}

static GLOBAL: Lazy<PacketFactories> = Lazy::new(PacketFactories::with_defaults);

impl PacketFactories {
    /// Registries holding only the catch-all decoders.
    pub fn empty() -> Self {
        Self {
            ether_types: Registry::new("EtherType", decode_unknown),
            ip_numbers: Registry::new("IpProtocol", decode_unknown),
            udp_ports: Registry::new("UdpPort", decode_unknown),
            icmpv6_types: Registry::new("Icmpv6MsgType", decode_unknown),
            ip_versions: Registry::new("IpVersion", decode_unknown),
            ipv6_options: Registry::new("Ipv6OptionType", crate::ipv6::ext::decode_unknown_option),
            ndp_options: Registry::new("NdpOptionType", crate::icmpv6::ndp::decode_unknown_option),
            gtpv1_extensions: Registry::new(
                "GtpExtensionType",
                crate::gtpv1::decode_unknown_extension,
            ),
        }
    }

    /// Registries holding every decoder of this crate.
    pub fn with_defaults() -> Self {
        let mut factories = Self::empty();
        crate::ether::register(&mut factories);
        crate::ipv6::register(&mut factories);
        crate::icmpv6::register(&mut factories);
        crate::udp::register(&mut factories);
        crate::sctp::register(&mut factories);
        crate::gtpv1::register(&mut factories);
        factories
    }

    /// The process-wide default registries.
    pub fn global() -> &'static PacketFactories {
        &GLOBAL
    }
}

impl Default for PacketFactories {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Registries, configuration and nesting depth of an ongoing decode.
#[derive(Debug, Clone, Copy)]
pub struct DecodeCtx<'a> {
    factories: &'a PacketFactories,
    config: &'a DissectConfig,
    depth: usize,
}

impl<'a> DecodeCtx<'a> {
    /// Start decoding at depth zero.
    pub fn new(factories: &'a PacketFactories, config: &'a DissectConfig) -> Self {
        Self {
            factories,
            config,
            depth: 0,
        }
    }

    /// The process-wide registries and configuration.
    pub fn global() -> DecodeCtx<'static> {
        DecodeCtx::new(PacketFactories::global(), DissectConfig::global())
    }

    /// The registries.
    pub fn factories(&self) -> &'a PacketFactories {
        self.factories
    }

    /// The configuration.
    pub fn config(&self) -> &'a DissectConfig {
        self.config
    }

    /// Number of enclosing layers of the value being decoded.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Decode the payload `bytes[offset..offset + length]` of a packet.
    ///
    /// Returns `None` for an empty payload. Never fails: a decoder error
    /// yields a [`MalformedPacket`] and a payload nested deeper than the
    /// configured maximum is kept as an [`UnknownPacket`].
    pub fn decode_payload<K>(
        &self,
        registry: &Registry<K, Box<dyn Packet>>,
        key: K,
        bytes: &[u8],
        offset: usize,
        length: usize,
    ) -> Option<Box<dyn Packet>>
    where
        K: Copy + Eq + Hash + fmt::Display,
    {
        if length == 0 {
            return None;
        }
        if self.depth >= self.config.get_max_depth() {
            tracing::warn!(
                space = registry.space(),
                key = %key,
                depth = self.depth,
                "maximum decoding depth reached, payload kept opaque"
            );
            return Some(Box::new(UnknownPacket::new(bytes, offset, length)));
        }
        let nested = DecodeCtx {
            depth: self.depth + 1,
            ..*self
        };
        match registry.decode(key, bytes, offset, length, &nested) {
            Ok(packet) => Some(packet),
            Err(error) => {
                tracing::debug!(
                    space = registry.space(),
                    key = %key,
                    %error,
                    "payload kept as malformed"
                );
                Some(Box::new(MalformedPacket::new(bytes, offset, length, error)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketExt;

    #[test]
    fn unregistered_key_uses_fallback() {
        let factories = PacketFactories::empty();
        let config = DissectConfig::new();
        let ctx = DecodeCtx::new(&factories, &config);
        let bytes = [0u8, 1, 2, 3];
        let payload = ctx
            .decode_payload(&factories.ether_types, EtherType::IPV6, &bytes, 1, 3)
            .unwrap();
        assert!(payload.is::<UnknownPacket>());
        assert_eq!(payload.raw_data(), vec![1, 2, 3]);
        assert!(ctx
            .decode_payload(&factories.ether_types, EtherType::IPV6, &bytes, 4, 0)
            .is_none());
    }

    #[test]
    fn decoder_error_becomes_malformed() {
        fn always_fails(
            bytes: &[u8],
            offset: usize,
            length: usize,
            _ctx: &DecodeCtx<'_>,
        ) -> Result<Box<dyn Packet>, DecodeError> {
            Err(DecodeError::too_short("Test", bytes, offset, length + 1, length))
        }

        let mut factories = PacketFactories::empty();
        factories.udp_ports.register(9, always_fails);
        assert!(factories.udp_ports.contains(9));
        let config = DissectConfig::new();
        let ctx = DecodeCtx::new(&factories, &config);
        let payload = ctx
            .decode_payload(&factories.udp_ports, 9, &[7u8; 4], 0, 4)
            .unwrap();
        let malformed = payload.downcast_ref::<MalformedPacket>().unwrap();
        assert_eq!(malformed.error().protocol(), "Test");
        assert_eq!(malformed.data(), &[7; 4]);
    }

    #[test]
    fn depth_limit_keeps_payload_opaque() {
        let factories = PacketFactories::with_defaults();
        let config = DissectConfig::new().max_depth(0);
        let ctx = DecodeCtx::new(&factories, &config);
        let payload = ctx
            .decode_payload(&factories.ether_types, EtherType::IPV6, &[0x60; 40], 0, 40)
            .unwrap();
        assert!(payload.is::<UnknownPacket>());
    }

    #[test]
    fn registry_debug_lists_keys() {
        let factories = PacketFactories::with_defaults();
        let dbg = format!("{:?}", factories.udp_ports);
        assert!(dbg.contains("2152"));
    }
}
