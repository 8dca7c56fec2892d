mod common;
use std::net::Ipv6Addr;
use std::str::FromStr;

use common::*;

use pktdissect::ether::*;
use pktdissect::icmpv6::ndp::*;
use pktdissect::icmpv6::*;
use pktdissect::ip::*;
use pktdissect::ipv6::*;
use pktdissect::{ChecksumBuilder, Decode, LengthBuilder, Packet, PacketExt, UnknownPacket};

#[test]
fn neighbor_solicitation_parse() {
    let frame = file_to_packet("eth_ipv6_icmpv6_ns.dat");
    let eth = EthernetPacket::decode(&frame, 0, frame.len()).unwrap();
    assert_eq!(eth.dst_addr(), EtherAddr([0x33, 0x33, 0xff, 0x00, 0x00, 0x02]));
    assert!(eth.dst_addr().is_multicast());

    let ipv6 = eth.get::<Ipv6Packet>().unwrap();
    assert_eq!(ipv6.next_header(), IpProtocol::ICMPV6);
    assert_eq!(ipv6.header().hop_limit(), 255);

    let icmp = eth.get::<Icmpv6CommonPacket>().unwrap();
    assert_eq!(icmp.icmp_type(), Icmpv6MsgType::NDP_NEIGHBOR_SOLICIT);
    assert_eq!(icmp.header().code(), 0);
    assert_eq!(icmp.header().checksum(), 0xdac8);
    assert!(icmp.has_valid_checksum(ipv6.src_addr(), ipv6.dst_addr()));
    assert!(!icmp.has_valid_checksum(ipv6.dst_addr(), ipv6.dst_addr()));

    let ns = eth.get::<NeighborSolicitationPacket>().unwrap();
    assert_eq!(ns.target_addr(), Ipv6Addr::from_str("2001:db8::2").unwrap());
    assert_eq!(ns.header().reserved(), 0);
    assert!(!ns.header().is_truncated());
    assert_eq!(ns.options().len(), 1);
    assert_eq!(ns.options()[0].option_type(), NdpOptionType::SRC_LINK_ADDR);
    assert_eq!(
        ns.options()[0].ether_addr(),
        Some(EtherAddr([0x00, 0x1b, 0x21, 0x11, 0x22, 0x33]))
    );

    assert_eq!(eth.raw_bytes(), &frame[..]);
}

#[test]
fn neighbor_solicitation_rebuild() {
    let frame = file_to_packet("eth_ipv6_icmpv6_ns.dat");
    let eth = EthernetPacket::decode(&frame, 0, frame.len()).unwrap();
    let ipv6 = eth.get::<Ipv6Packet>().unwrap();
    let icmp = eth.get::<Icmpv6CommonPacket>().unwrap();

    let rebuilt = icmp
        .to_builder()
        .src_addr(ipv6.src_addr())
        .dst_addr(ipv6.dst_addr())
        .correct_checksum_at_build(true)
        .build()
        .unwrap();
    assert_eq!(&rebuilt, icmp);

    let built = Icmpv6CommonPacketBuilder::new()
        .icmp_type(Icmpv6MsgType::NDP_NEIGHBOR_SOLICIT)
        .code(0)
        .src_addr(ipv6.src_addr())
        .dst_addr(ipv6.dst_addr())
        .payload(
            NeighborSolicitationPacketBuilder::new()
                .target_addr(Ipv6Addr::from_str("2001:db8::2").unwrap())
                .option(NdpOption::src_link_addr(EtherAddr([
                    0x00, 0x1b, 0x21, 0x11, 0x22, 0x33,
                ]))),
        )
        .correct_checksum_at_build(true)
        .build()
        .unwrap();
    assert_eq!(built.raw_bytes(), icmp.raw_bytes());
}

#[test]
fn neighbor_advertisement_in_ipv6() {
    let src = Ipv6Addr::from_str("2001:db8::2").unwrap();
    let dst = Ipv6Addr::from_str("2001:db8::1").unwrap();
    let pkt = Ipv6PacketBuilder::new()
        .traffic_class(0)
        .flow_label(0)
        .next_header(IpProtocol::ICMPV6)
        .hop_limit(255)
        .src_addr(src)
        .dst_addr(dst)
        .payload(
            Icmpv6CommonPacketBuilder::new()
                .icmp_type(Icmpv6MsgType::NDP_NEIGHBOR_ADV)
                .code(0)
                .src_addr(src)
                .dst_addr(dst)
                .payload(
                    NeighborAdvertisementPacketBuilder::new()
                        .solicited(true)
                        .override_flag(true)
                        .target_addr(src)
                        .option(NdpOption::dst_link_addr(EtherAddr([
                            0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc,
                        ]))),
                )
                .correct_checksum_at_build(true),
        )
        .correct_length_at_build(true)
        .build()
        .unwrap();
    assert_eq!(pkt.header().payload_len(), 32);

    let bytes = pkt.raw_data();
    // flags word: S and O set
    assert_eq!(&bytes[44..48], &[0x60, 0, 0, 0]);

    let decoded = Ipv6Packet::decode(&bytes, 0, bytes.len()).unwrap();
    let icmp = decoded.get::<Icmpv6CommonPacket>().unwrap();
    assert!(icmp.has_valid_checksum(src, dst));
    let na = decoded.get::<NeighborAdvertisementPacket>().unwrap();
    assert!(!na.header().router());
    assert!(na.header().solicited());
    assert!(na.header().override_flag());
    assert_eq!(
        na.options()[0].ether_addr(),
        Some(EtherAddr([0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]))
    );
    assert_eq!(decoded, pkt);
}

#[test]
fn echo_request_and_unknown_type() {
    let src = Ipv6Addr::from_str("fd00::1").unwrap();
    let dst = Ipv6Addr::from_str("fd00::2").unwrap();
    let echo = Icmpv6CommonPacketBuilder::new()
        .icmp_type(Icmpv6MsgType::ECHO_REQUEST)
        .code(0)
        .src_addr(src)
        .dst_addr(dst)
        .payload(
            Icmpv6EchoPacketBuilder::new()
                .identifier(0x1234)
                .sequence_number(1)
                .data(b"abcdefgh".to_vec()),
        )
        .correct_checksum_at_build(true)
        .build()
        .unwrap();
    assert_eq!(echo.header().checksum(), 0xe1e5);
    let body = echo.get::<Icmpv6EchoPacket>().unwrap();
    assert_eq!(body.header().identifier(), 0x1234);
    assert_eq!(body.data(), b"abcdefgh");

    // router advertisements have no decoder and stay opaque
    let bytes = [134, 0, 0, 0, 64, 0, 0x07, 0x08];
    let icmp = Icmpv6CommonPacket::decode(&bytes, 0, bytes.len()).unwrap();
    assert_eq!(icmp.icmp_type(), Icmpv6MsgType::NDP_ROUTER_ADV);
    let opaque = icmp.payload().unwrap().downcast_ref::<UnknownPacket>().unwrap();
    assert_eq!(opaque.data(), &bytes[4..]);
}
