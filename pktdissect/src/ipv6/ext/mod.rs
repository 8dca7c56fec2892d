//! The Ipv6 extension headers.
//!
//! Hop-by-hop and destination options headers share one implementation
//! parameterized by [`OptionsKind`]. Their option lists are decoded through
//! the `ipv6_options` registry and stop at the first undecodable option.

mod options;
pub use options::{decode_unknown_option, Ipv6Option, Ipv6OptionType, ROUTER_ALERT_DATA_LEN};

mod opts;
pub use opts::{
    DestOptions, HopByHop, Ipv6DestOptionsPacket, Ipv6DestOptionsPacketBuilder,
    Ipv6HopByHopPacket, Ipv6HopByHopPacketBuilder, Ipv6OptionsHeader, Ipv6OptionsPacket,
    Ipv6OptionsPacketBuilder, OptionsKind,
};

mod routing;
pub use routing::{
    Ipv6RoutingHeader, Ipv6RoutingPacket, Ipv6RoutingPacketBuilder, Ipv6RoutingType, RoutingData,
};

mod frag;
pub use frag::{Ipv6FragHeader, Ipv6FragmentPacket, Ipv6FragmentPacketBuilder, IPV6_FRAG_HEADER_LEN};

use crate::factory::PacketFactories;

// Extension headers declare their length in 8-octet units, not counting the
// first 8 octets.
#[inline]
fn ext_header_extent(hdr_ext_len: u8) -> usize {
    (hdr_ext_len as usize + 1) * 8
}

pub(crate) fn register_options(factories: &mut PacketFactories) {
    options::register(factories);
}
