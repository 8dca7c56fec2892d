//! The immutable value model shared by every protocol.
//!
//! A [`Packet`] is an optional [`Header`], an optional payload (itself a
//! packet) and optional trailing bytes such as padding or a frame check
//! sequence. Values are built once, either by a decoder or by a builder, and
//! never change afterwards. Derived values (length, wire bytes, hex string,
//! hash) are computed on first use and cached in a [`Memo`].

use core::any::{Any, TypeId};
use core::fmt;

use crate::builder::PacketBuilder;
use crate::memo::Memo;

/// The control information of one protocol layer.
pub trait Header: Any + fmt::Debug + Send + Sync {
    /// Name of the protocol.
    fn name(&self) -> &'static str;

    /// The cache of derived values.
    fn memo(&self) -> &Memo;

    /// Upcast for downcasting to the concrete header type.
    fn as_any(&self) -> &dyn Any;

    /// Append every field in wire order.
    fn write_to(&self, out: &mut Vec<u8>);

    /// Compute the header length. Only called once per value.
    fn calc_length(&self) -> usize {
        self.raw_bytes().len()
    }

    /// Length of the header in bytes.
    fn length(&self) -> usize {
        self.memo().length(|| self.calc_length())
    }

    /// Read-only view of the cached wire bytes.
    fn raw_bytes(&self) -> &[u8] {
        self.memo().raw(|| {
            let mut out = Vec::new();
            self.write_to(&mut out);
            out
        })
    }

    /// A fresh copy of the wire bytes.
    fn raw_data(&self) -> Vec<u8> {
        self.raw_bytes().to_vec()
    }

    /// Lowercase hex rendering of the wire bytes.
    fn hex_string(&self) -> &str {
        self.memo().hex(self.raw_bytes())
    }

    /// Hash of the wire bytes.
    fn hash_code(&self) -> u64 {
        self.memo().hash_code(self.raw_bytes())
    }
}

/// One layer of a decoded or built packet, owning everything it encapsulates.
pub trait Packet: Any + fmt::Debug + Send + Sync {
    /// Name of the protocol.
    fn name(&self) -> &'static str;

    /// The cache of derived values.
    fn memo(&self) -> &Memo;

    /// Upcast for downcasting to the concrete packet type.
    fn as_any(&self) -> &dyn Any;

    /// Clone into a new box.
    fn clone_packet(&self) -> Box<dyn Packet>;

    /// The header of this layer, if the protocol has one.
    fn header(&self) -> Option<&dyn Header>;

    /// The encapsulated packet, if any.
    fn payload(&self) -> Option<&dyn Packet>;

    /// A builder pre-populated with the fields of this packet.
    fn builder(&self) -> Box<dyn PacketBuilder>;

    /// Number of bytes following the payload (padding, trailer, FCS).
    fn trailer_len(&self) -> usize {
        0
    }

    /// Append the bytes following the payload.
    fn write_trailer(&self, _out: &mut Vec<u8>) {}

    /// Compute the packet length. Only called once per value.
    fn calc_length(&self) -> usize {
        self.header().map_or(0, |h| h.length())
            + self.payload().map_or(0, |p| p.length())
            + self.trailer_len()
    }

    /// Append header, payload and trailer in wire order.
    fn write_to(&self, out: &mut Vec<u8>) {
        if let Some(header) = self.header() {
            out.extend_from_slice(header.raw_bytes());
        }
        if let Some(payload) = self.payload() {
            out.extend_from_slice(payload.raw_bytes());
        }
        self.write_trailer(out);
    }

    /// Length of the packet in bytes.
    fn length(&self) -> usize {
        self.memo().length(|| self.calc_length())
    }

    /// Read-only view of the cached wire bytes.
    fn raw_bytes(&self) -> &[u8] {
        self.memo().raw(|| {
            let mut out = Vec::with_capacity(self.length());
            self.write_to(&mut out);
            out
        })
    }

    /// A fresh copy of the wire bytes.
    fn raw_data(&self) -> Vec<u8> {
        self.raw_bytes().to_vec()
    }

    /// Same as [`Packet::raw_data`].
    fn to_bytes(&self) -> Vec<u8> {
        self.raw_data()
    }

    /// Lowercase hex rendering of the wire bytes.
    fn hex_string(&self) -> &str {
        self.memo().hex(self.raw_bytes())
    }

    /// Hash of the wire bytes.
    fn hash_code(&self) -> u64 {
        self.memo().hash_code(self.raw_bytes())
    }
}

impl Clone for Box<dyn Packet> {
    fn clone(&self) -> Self {
        self.clone_packet()
    }
}

impl PartialEq for dyn Packet {
    fn eq(&self, other: &Self) -> bool {
        Any::type_id(self.as_any()) == Any::type_id(other.as_any())
            && self.raw_bytes() == other.raw_bytes()
    }
}

impl Eq for dyn Packet {}

/// Iterator over an encapsulation chain, outermost layer first.
#[derive(Debug, Clone)]
pub struct Layers<'a> {
    next: Option<&'a dyn Packet>,
}

impl<'a> Iterator for Layers<'a> {
    type Item = &'a dyn Packet;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.payload();
        Some(current)
    }
}

impl core::iter::FusedIterator for Layers<'_> {}

/// Navigation over the encapsulation chain of a packet.
pub trait PacketExt {
    /// Walk the chain starting at this packet. Each call starts over.
    fn layers(&self) -> Layers<'_>;

    /// Whether this packet is of type `P`.
    fn is<P: Packet>(&self) -> bool {
        self.layers()
            .next()
            .map_or(false, |p| Any::type_id(p.as_any()) == TypeId::of::<P>())
    }

    /// Downcast this packet to `P`.
    fn downcast_ref<P: Packet>(&self) -> Option<&P> {
        self.layers().next()?.as_any().downcast_ref::<P>()
    }

    /// The first layer of type `P`.
    fn get<P: Packet>(&self) -> Option<&P> {
        self.layers().find_map(|p| p.as_any().downcast_ref::<P>())
    }

    /// The first layer matching `pred`.
    fn find<F: FnMut(&dyn Packet) -> bool>(&self, mut pred: F) -> Option<&dyn Packet> {
        self.layers().find(|p| pred(*p))
    }

    /// Whether any layer is of type `P`.
    fn contains<P: Packet>(&self) -> bool {
        self.get::<P>().is_some()
    }

    /// The layer immediately enclosing the first layer of type `P`.
    fn outer_of<P: Packet>(&self) -> Option<&dyn Packet> {
        let mut outer = None;
        for layer in self.layers() {
            if layer.as_any().is::<P>() {
                return outer;
            }
            outer = Some(layer);
        }
        None
    }
}

impl<T: Packet> PacketExt for T {
    fn layers(&self) -> Layers<'_> {
        Layers { next: Some(self) }
    }
}

impl PacketExt for dyn Packet {
    fn layers(&self) -> Layers<'_> {
        Layers { next: Some(self) }
    }
}
