#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! Decode network packets into typed layer chains and build them back into
//! exact wire bytes.
//!
//! A decoded frame is a chain of immutable [`Packet`] values, each layer
//! holding its header and the packet it encapsulates. Payload decoders are
//! looked up in the registries of [`PacketFactories`]; bytes no decoder
//! claims are kept as an [`UnknownPacket`], bytes a decoder rejects as a
//! [`MalformedPacket`]. Every packet converts into a builder that can edit
//! fields and recompute lengths and checksums before producing a new value.
//!
//! ```
//! use pktdissect::ether::EthernetPacket;
//! use pktdissect::{Decode, Packet};
//!
//! let mut frame = vec![0u8; 60];
//! frame[12..14].copy_from_slice(&[0x88, 0xb5]);
//! let pkt = EthernetPacket::decode(&frame, 0, frame.len()).unwrap();
//! assert_eq!(pkt.length(), 60);
//! assert_eq!(pkt.raw_bytes(), &frame[..]);
//! ```

#[macro_use]
mod macros;

pub mod bits;
pub mod builder;
pub mod checksum_utils;
pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod memo;
pub mod opaque;
pub mod packet;

pub mod arp;
pub mod ether;
pub mod gtpv1;
pub mod icmpv6;
pub mod ip;
pub mod ipv6;
pub mod sctp;
pub mod udp;

pub use builder::{ChecksumBuilder, LengthBuilder, PacketBuilder};
pub use config::{DissectConfig, SctpChecksum};
pub use error::{BuildError, DecodeError, Violation};
pub use factory::{Decode, DecodeCtx, PacketFactories, Registry};
pub use memo::Memo;
pub use opaque::{MalformedPacket, UnknownPacket, UnknownPacketBuilder};
pub use packet::{Header, Packet, PacketExt};
