mod common;
use common::*;

use pktdissect::ether::*;
use pktdissect::ip::*;
use pktdissect::ipv6::*;
use pktdissect::sctp::*;
use pktdissect::{
    ChecksumBuilder, Decode, DecodeCtx, DissectConfig, Packet, PacketExt, PacketFactories,
    SctpChecksum,
};

const SCTP_OFFSET: usize = ETHER_HEADER_LEN + IPV6_HEADER_LEN;

#[test]
fn init_chunk_parse() {
    let frame = file_to_packet("eth_ipv6_sctp_init.dat");
    let eth = EthernetPacket::decode(&frame, 0, frame.len()).unwrap();
    assert_eq!(eth.get::<Ipv6Packet>().unwrap().next_header(), IpProtocol::SCTP);

    let sctp = eth.get::<SctpPacket>().unwrap();
    assert_eq!(sctp.src_port(), 5000);
    assert_eq!(sctp.dst_port(), 38412);
    assert_eq!(sctp.header().verification_tag(), 0);
    // the CRC-32C 0xbe9e8020 is carried least significant byte first
    assert_eq!(&frame[SCTP_OFFSET + 8..SCTP_OFFSET + 12], &[0x20, 0x80, 0x9e, 0xbe]);
    assert_eq!(sctp.header().checksum(), 0x2080_9ebe);
    assert_eq!(sctp.checksum_algorithm(), SctpChecksum::Crc32c);
    assert!(sctp.has_valid_checksum(false));
    assert!(!sctp.has_valid_checksum_with(SctpChecksum::Adler32, false));

    assert_eq!(sctp.chunks().len(), 1);
    let init = &sctp.chunks()[0];
    assert_eq!(init.chunk_type(), SctpChunkType::INIT);
    assert_eq!(init.length_field(), 20);
    assert_eq!(&init.value()[..4], &[0x3a, 0x5c, 0x7e, 0x01]);
    assert!(init.padding().is_empty());
    assert!(!sctp.header().is_truncated());
    assert!(sctp.trailer().is_empty());

    assert_eq!(eth.raw_bytes(), &frame[..]);
}

#[test]
fn corrupted_chunk_fails_checksum() {
    let mut frame = file_to_packet("eth_ipv6_sctp_init.dat");
    let last = frame.len() - 1;
    frame[last] ^= 0xff;
    let sctp = SctpPacket::decode(&frame, SCTP_OFFSET, frame.len() - SCTP_OFFSET).unwrap();
    assert!(!sctp.has_valid_checksum(false));
}

#[test]
fn rebuild_with_both_algorithms() {
    let frame = file_to_packet("eth_ipv6_sctp_init.dat");
    let sctp = SctpPacket::decode(&frame, SCTP_OFFSET, frame.len() - SCTP_OFFSET).unwrap();

    let same = sctp
        .to_builder()
        .checksum(0)
        .correct_checksum_at_build(true)
        .build()
        .unwrap();
    assert_eq!(same, sctp);

    let adler = sctp
        .to_builder()
        .checksum_algorithm(SctpChecksum::Adler32)
        .correct_checksum_at_build(true)
        .build()
        .unwrap();
    assert_eq!(adler.checksum_algorithm(), SctpChecksum::Adler32);
    assert!(adler.has_valid_checksum(false));
    assert!(!adler.has_valid_checksum_with(SctpChecksum::Crc32c, false));

    // the algorithm of a decoded packet comes from the decoding configuration
    let bytes = adler.raw_data();
    let config = DissectConfig::new().sctp_checksum(SctpChecksum::Adler32);
    let ctx = DecodeCtx::new(PacketFactories::global(), &config);
    let decoded = SctpPacket::decode_with(&bytes, 0, bytes.len(), &ctx).unwrap();
    assert_eq!(decoded.checksum_algorithm(), SctpChecksum::Adler32);
    assert!(decoded.has_valid_checksum(false));
}

#[test]
fn chunks_are_padded() {
    let sctp = SctpPacketBuilder::new()
        .src_port(2905)
        .dst_port(2905)
        .verification_tag(0x0102_0304)
        .chunk(SctpChunk::new(SctpChunkType::DATA, 0x03, vec![0xaa; 5]))
        .chunk(SctpChunk::new(SctpChunkType::COOKIE_ACK, 0, Vec::new()))
        .correct_checksum_at_build(true)
        .build()
        .unwrap();
    assert_eq!(sctp.length(), 12 + 12 + 4);
    assert_eq!(sctp.chunks()[0].length_field(), 9);
    assert_eq!(sctp.chunks()[0].padding(), &[0, 0, 0]);

    let bytes = sctp.raw_data();
    let decoded = SctpPacket::decode(&bytes, 0, bytes.len()).unwrap();
    assert_eq!(decoded.chunks(), sctp.chunks());
    assert!(decoded.has_valid_checksum(false));

    for len in 0..SCTP_HEADER_LEN {
        assert!(SctpPacket::decode(&bytes, 0, len).is_err());
    }
}
