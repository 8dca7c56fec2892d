//! Provide utility functions for calculating packet checksums.
//!
//! The RFC 1071 helpers are taken from smoltcp. CRC-32 uses `crc32fast` and
//! CRC-32C uses `crc32c`. Adler-32 for SCTP is implemented here.

use byteorder::{ByteOrder, NetworkEndian};

/// Compute an RFC 1071 compliant checksum (without the final complement).
///
/// Adapted from smoltcp::wire::ip::checksum::data, renamed to from_slice.
/// The sum is folded after every chunk, so the accumulator never overflows.
pub fn from_slice(mut data: &[u8]) -> u16 {
    let mut accum = 0;

    // For each 32-byte chunk...
    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        // ... take by 2 bytes and sum them.
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }
        accum = propagate_carries(accum) as u32;

        data = &data[CHUNK_SIZE..];
    }

    // Sum the rest that does not fit the last 32-byte chunk,
    // taking by 2 bytes.
    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    // Add the last remaining odd byte, if any.
    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Compute an RFC 1071 checksum (without the final complement) over the
/// concatenation of `segments`.
///
/// Segments may have odd lengths; an odd byte at the end of one segment is
/// paired with the first byte of the next. A final odd byte is padded with a
/// zero, the padding itself is never part of any length.
pub fn from_slices(segments: &[&[u8]]) -> u16 {
    let mut accum = 0;
    let mut tail_byte = None;

    for segment in segments.iter().filter(|s| !s.is_empty()) {
        tail_byte = from_slice_with_tail_byte(segment, &mut accum, tail_byte);
    }

    if let Some(byte) = tail_byte {
        accum += (byte as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 compliant checksums.
///
/// This function is copied from smoltcp::wire::ip::checksum::combine function
/// without modification.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

// A helper for working with multi-segment memory buffer.
// `data` must not be empty.
fn from_slice_with_tail_byte(
    mut data: &[u8],
    accum: &mut u32,
    tail_byte: Option<u8>,
) -> Option<u8> {
    if let Some(byte) = tail_byte {
        let byte_array = [byte, data[0]];
        data = &data[1..];
        *accum += NetworkEndian::read_u16(&byte_array[..]) as u32;
    }

    for words in data.chunks(32) {
        let mut d = words;
        while d.len() >= 2 {
            *accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }
        // fold per chunk
        *accum = propagate_carries(*accum) as u32;
    }
    if data.len() % 2 == 1 {
        data.last().copied()
    } else {
        None
    }
}

// This function is copied from smoltcp::wire::ip::checksum::propagate_carries
// function without modification.
fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// CRC-32 (IEEE 802.3), as used by the Ethernet frame check sequence.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// CRC-32 over the concatenation of `segments`.
pub fn crc32_segments(segments: &[&[u8]]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for segment in segments {
        hasher.update(segment);
    }
    hasher.finalize()
}

/// CRC-32C (Castagnoli), as used by SCTP.
#[inline]
pub fn crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

const ADLER_MOD: u32 = 65521;
// largest n such that 255 * n * (n + 1) / 2 + (n + 1) * (ADLER_MOD - 1) fits in u32
const ADLER_NMAX: usize = 5552;

/// Adler-32, the SCTP checksum of RFC 2960.
pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(ADLER_NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }
    (b << 16) | a
}
