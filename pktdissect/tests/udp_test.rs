mod common;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use common::*;
use smoltcp::wire;

use pktdissect::ether::*;
use pktdissect::gtpv1::GtpV1Packet;
use pktdissect::ipv6::*;
use pktdissect::udp::*;
use pktdissect::{
    ChecksumBuilder, Decode, LengthBuilder, Packet, PacketExt, UnknownPacket, UnknownPacketBuilder,
};

const UDP_OFFSET: usize = ETHER_HEADER_LEN + IPV6_HEADER_LEN;

fn smol_addr(addr: Ipv6Addr) -> wire::IpAddress {
    wire::IpAddress::Ipv6(wire::Ipv6Address::from_bytes(&addr.octets()))
}

#[test]
fn udp_parse_and_verify() {
    let frame = file_to_packet("eth_ipv6_udp_gtpu.dat");
    let eth = EthernetPacket::decode(&frame, 0, frame.len()).unwrap();
    let ipv6 = eth.get::<Ipv6Packet>().unwrap();
    let udp = eth.get::<UdpPacket>().unwrap();

    assert_eq!(udp.src_port(), 2152);
    assert_eq!(udp.dst_port(), 2152);
    assert_eq!(udp.header().length_field() as usize, frame.len() - UDP_OFFSET);
    assert_eq!(udp.header().checksum(), 0xb92d);
    assert!(udp.trailer().is_empty());
    assert!(udp.payload().unwrap().is::<GtpV1Packet>());

    let src = IpAddr::V6(ipv6.src_addr());
    let dst = IpAddr::V6(ipv6.dst_addr());
    assert!(udp.has_valid_checksum(src, dst, false));

    let smol = wire::UdpPacket::new_checked(&frame[UDP_OFFSET..]).unwrap();
    assert!(smol.verify_checksum(&smol_addr(ipv6.src_addr()), &smol_addr(ipv6.dst_addr())));
}

#[test]
fn checksum_matches_smoltcp() {
    let src = Ipv6Addr::from_str("2001:db8::10").unwrap();
    let dst = Ipv6Addr::from_str("2001:db8::20").unwrap();
    let data: Vec<u8> = (0..45u8).collect();

    let udp = UdpPacketBuilder::new()
        .src_port(53000)
        .dst_port(7777)
        .src_addr(IpAddr::V6(src))
        .dst_addr(IpAddr::V6(dst))
        .payload(UnknownPacketBuilder::new().data(data.clone()))
        .correct_length_at_build(true)
        .correct_checksum_at_build(true)
        .build()
        .unwrap();
    assert_eq!(udp.header().length_field(), 53);

    let mut bytes = udp.raw_data();
    let ours = udp.header().checksum();
    {
        let mut smol = wire::UdpPacket::new_unchecked(&mut bytes[..]);
        smol.set_checksum(0);
        smol.fill_checksum(&smol_addr(src), &smol_addr(dst));
        assert_eq!(smol.checksum(), ours);
    }
    assert_eq!(bytes, udp.raw_data());
    assert!(udp.has_valid_checksum(IpAddr::V6(src), IpAddr::V6(dst), false));
}

#[test]
fn flipped_payload_byte_invalidates() {
    let frame = file_to_packet("eth_ipv6_udp_gtpu.dat");
    let eth = EthernetPacket::decode(&frame, 0, frame.len()).unwrap();
    let ipv6 = eth.get::<Ipv6Packet>().unwrap();
    let src = IpAddr::V6(ipv6.src_addr());
    let dst = IpAddr::V6(ipv6.dst_addr());

    let mut broken = frame.clone();
    let last = broken.len() - 1;
    broken[last] ^= 0x01;
    let udp = UdpPacket::decode(&broken, UDP_OFFSET, broken.len() - UDP_OFFSET).unwrap();
    assert!(!udp.has_valid_checksum(src, dst, false));

    let smol = wire::UdpPacket::new_checked(&broken[UDP_OFFSET..]).unwrap();
    assert!(!smol.verify_checksum(&smol_addr(ipv6.src_addr()), &smol_addr(ipv6.dst_addr())));
}

#[test]
fn zero_checksum_is_optional() {
    let src = IpAddr::V6(Ipv6Addr::from_str("2001:db8::1").unwrap());
    let dst = IpAddr::V6(Ipv6Addr::from_str("2001:db8::2").unwrap());
    let udp = UdpPacketBuilder::new()
        .src_port(1)
        .dst_port(2)
        .checksum(0)
        .payload(UnknownPacketBuilder::new().data(vec![1, 2, 3]))
        .correct_length_at_build(true)
        .build()
        .unwrap();
    assert!(udp.has_valid_checksum(src, dst, true));
    assert!(!udp.has_valid_checksum(src, dst, false));
}

#[test]
fn length_field_bounds_the_payload() {
    // length 10 leaves two payload bytes and a two byte trailer
    let bytes = [0x9c, 0x40, 0x1e, 0x61, 0x00, 0x0a, 0x00, 0x00, 0xaa, 0xbb, 0xcc, 0xdd];
    let udp = UdpPacket::decode(&bytes, 0, bytes.len()).unwrap();
    let payload = udp.payload().unwrap().downcast_ref::<UnknownPacket>().unwrap();
    assert_eq!(payload.data(), &[0xaa, 0xbb]);
    assert_eq!(udp.trailer(), &[0xcc, 0xdd]);
    assert_eq!(udp.raw_bytes(), &bytes[..]);

    // a length beyond the captured bytes falls back to what is there
    let mut long = bytes;
    long[5] = 0x40;
    let udp = UdpPacket::decode(&long, 0, long.len()).unwrap();
    assert_eq!(udp.header().length_field(), 0x40);
    assert_eq!(udp.payload().unwrap().length(), 4);
    assert!(udp.trailer().is_empty());
    assert_eq!(udp.raw_bytes(), &long[..]);

    for len in 0..UDP_HEADER_LEN {
        assert!(UdpPacket::decode(&bytes, 0, len).is_err());
    }
}
