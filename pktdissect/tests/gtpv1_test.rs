mod common;
use std::net::Ipv6Addr;
use std::str::FromStr;

use common::*;

use pktdissect::ether::*;
use pktdissect::gtpv1::*;
use pktdissect::icmpv6::*;
use pktdissect::ip::*;
use pktdissect::ipv6::*;
use pktdissect::udp::*;
use pktdissect::{
    ChecksumBuilder, Decode, DecodeCtx, DissectConfig, Header, LengthBuilder, Packet, PacketExt,
    PacketFactories, UnknownPacket,
};

const GTP_OFFSET: usize = ETHER_HEADER_LEN + IPV6_HEADER_LEN + UDP_HEADER_LEN;

#[test]
fn g_pdu_parse() {
    let frame = file_to_packet("eth_ipv6_udp_gtpu.dat");
    let eth = EthernetPacket::decode(&frame, 0, frame.len()).unwrap();

    let names: Vec<_> = eth.layers().map(|p| p.name()).collect();
    assert_eq!(
        names,
        vec!["Ethernet", "IPv6", "UDP", "GTPv1", "IPv6", "ICMPv6", "ICMPv6 Echo", "Unknown"]
    );

    let gtp = eth.get::<GtpV1Packet>().unwrap();
    let h = gtp.header();
    assert_eq!(h.version(), 1);
    assert!(h.protocol_type());
    assert!(h.ext_flag());
    assert!(!h.seq_flag());
    assert!(!h.npdu_flag());
    assert_eq!(h.message_type(), GtpV1MsgType::G_PDU);
    assert_eq!(h.length_field(), 64);
    assert_eq!(h.teid(), 1);
    assert_eq!(h.sequence_number(), None);
    assert_eq!(h.next_ext_type(), GtpExtensionType::PDU_SESSION_CONTAINER);
    assert_eq!(h.length(), 16);
    assert_eq!(
        gtp.extensions(),
        &[GtpExtension::pdu_session_container(PduSessionInfo::Uplink(
            UlPduSessionInfo {
                qfi: 9,
                ..UlPduSessionInfo::default()
            }
        ))]
    );

    let inner = gtp.payload().unwrap().downcast_ref::<Ipv6Packet>().unwrap();
    assert_eq!(inner.src_addr(), Ipv6Addr::from_str("fd00::1").unwrap());
    let icmp = inner.get::<Icmpv6CommonPacket>().unwrap();
    assert!(icmp.has_valid_checksum(inner.src_addr(), inner.dst_addr()));
    let echo = inner.get::<Icmpv6EchoPacket>().unwrap();
    assert_eq!(echo.header().identifier(), 0x1234);
    assert_eq!(echo.data(), b"abcdefgh");

    assert_eq!(eth.raw_bytes(), &frame[..]);
}

#[test]
fn g_pdu_build() {
    let frame = file_to_packet("eth_ipv6_udp_gtpu.dat");
    let outer_src = Ipv6Addr::from_str("2001:db8::1").unwrap();
    let outer_dst = Ipv6Addr::from_str("2001:db8::2").unwrap();
    let inner_src = Ipv6Addr::from_str("fd00::1").unwrap();
    let inner_dst = Ipv6Addr::from_str("fd00::2").unwrap();

    let icmp = Icmpv6CommonPacketBuilder::new()
        .icmp_type(Icmpv6MsgType::ECHO_REQUEST)
        .code(0)
        .src_addr(inner_src)
        .dst_addr(inner_dst)
        .payload(
            Icmpv6EchoPacketBuilder::new()
                .identifier(0x1234)
                .sequence_number(1)
                .data(b"abcdefgh".to_vec()),
        )
        .correct_checksum_at_build(true);
    let inner = Ipv6PacketBuilder::new()
        .traffic_class(0)
        .flow_label(0)
        .next_header(IpProtocol::ICMPV6)
        .hop_limit(64)
        .src_addr(inner_src)
        .dst_addr(inner_dst)
        .payload(icmp)
        .correct_length_at_build(true);
    let gtp = GtpV1PacketBuilder::new()
        .message_type(GtpV1MsgType::G_PDU)
        .teid(1)
        .extension(GtpExtension::pdu_session_container(PduSessionInfo::Uplink(
            UlPduSessionInfo {
                qfi: 9,
                ..UlPduSessionInfo::default()
            },
        )))
        .payload(inner)
        .correct_length_at_build(true);
    let udp = UdpPacketBuilder::new()
        .src_port(GTPV1_U_PORT)
        .dst_port(GTPV1_U_PORT)
        .src_addr(outer_src.into())
        .dst_addr(outer_dst.into())
        .payload(gtp)
        .correct_length_at_build(true)
        .correct_checksum_at_build(true);
    let outer = Ipv6PacketBuilder::new()
        .traffic_class(0)
        .flow_label(0)
        .next_header(IpProtocol::UDP)
        .hop_limit(64)
        .src_addr(outer_src)
        .dst_addr(outer_dst)
        .payload(udp)
        .correct_length_at_build(true);
    let eth = EthernetPacketBuilder::new()
        .dst_addr(EtherAddr([0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]))
        .src_addr(EtherAddr([0x00, 0x1b, 0x21, 0x11, 0x22, 0x33]))
        .ether_type(EtherType::IPV6)
        .payload(outer)
        .build()
        .unwrap();

    assert_eq!(eth.raw_data(), frame);
}

#[test]
fn fixed_size_extension_lengths() {
    let factories = PacketFactories::global();
    let ctx = DecodeCtx::global();

    // UDP port: one unit, 2152, no more extensions
    let ok = [0x01, 0x08, 0x68, 0x00];
    let ext = factories
        .gtpv1_extensions
        .decode(GtpExtensionType::UDP_PORT, &ok, 0, ok.len(), &ctx)
        .unwrap();
    assert_eq!(ext, GtpExtension::UdpPort(2152));
    assert_eq!(ext.length(), 4);

    let mut longer = vec![0u8; 12];
    longer[..4].copy_from_slice(&ok);
    for units in [0u8, 2, 3] {
        longer[0] = units;
        for ext_type in [
            GtpExtensionType::UDP_PORT,
            GtpExtensionType::PDU_NUMBER,
            GtpExtensionType::SERVICE_CLASS_INDICATOR,
        ] {
            assert!(factories
                .gtpv1_extensions
                .decode(ext_type, &longer, 0, longer.len(), &ctx)
                .is_err());
        }
    }
}

#[test]
fn unknown_extension_accepts_any_length() {
    let ctx = DecodeCtx::global();
    let bytes = [0x02, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x00];
    let ext = PacketFactories::global()
        .gtpv1_extensions
        .decode(GtpExtensionType::RAN_CONTAINER, &bytes, 0, bytes.len(), &ctx)
        .unwrap();
    assert_eq!(ext.length(), 8);
    assert_eq!(ext.ext_type(), GtpExtensionType::NO_MORE);
    assert!(decode_unknown_extension(&[0x00, 0, 0, 0], 0, 4, &ctx).is_err());
}

#[test]
fn depth_limit_keeps_inner_packet_opaque() {
    let frame = file_to_packet("eth_ipv6_udp_gtpu.dat");
    let config = DissectConfig::new().max_depth(3);
    let ctx = DecodeCtx::new(PacketFactories::global(), &config);
    let eth = EthernetPacket::decode_with(&frame, 0, frame.len(), &ctx).unwrap();

    let gtp = eth.get::<GtpV1Packet>().unwrap();
    assert!(gtp.payload().unwrap().is::<UnknownPacket>());
    assert!(!eth.contains::<Icmpv6CommonPacket>());
    assert_eq!(eth.raw_bytes(), &frame[..]);
}

#[test]
fn unregistered_port_stays_opaque() {
    let frame = file_to_packet("eth_ipv6_udp_gtpu.dat");
    let factories = PacketFactories::empty();
    let config = DissectConfig::new();
    let ctx = DecodeCtx::new(&factories, &config);

    let udp = UdpPacket::decode_with(
        &frame,
        ETHER_HEADER_LEN + IPV6_HEADER_LEN,
        frame.len() - ETHER_HEADER_LEN - IPV6_HEADER_LEN,
        &ctx,
    )
    .unwrap();
    let payload = udp.payload().unwrap().downcast_ref::<UnknownPacket>().unwrap();
    assert_eq!(payload.data(), &frame[GTP_OFFSET..]);
}
