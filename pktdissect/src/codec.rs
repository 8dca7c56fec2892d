//! Bounds-checked reads of network fields.
//!
//! The free functions follow the style of the `byteorder` crate, but check
//! `offset + N <= bytes.len()` instead of panicking. [`Reader`] wraps a
//! `(bytes, offset, length)` window with the name of the protocol being
//! decoded, so that a failed read turns into a [`DecodeError`].

use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{ByteOrder, NetworkEndian};

use crate::error::DecodeError;
use crate::ether::EtherAddr;

/// A read reached past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Where the read started.
    pub offset: usize,
    /// How many bytes the read needed.
    pub need: usize,
    /// Length of the buffer.
    pub len: usize,
}

#[inline]
fn field(bytes: &[u8], offset: usize, need: usize) -> Result<&[u8], OutOfBounds> {
    match offset.checked_add(need) {
        Some(end) if end <= bytes.len() => Ok(&bytes[offset..end]),
        _ => Err(OutOfBounds {
            offset,
            need,
            len: bytes.len(),
        }),
    }
}

/// Borrow `need` bytes starting at `offset`.
#[inline]
pub fn get_slice(bytes: &[u8], offset: usize, need: usize) -> Result<&[u8], OutOfBounds> {
    field(bytes, offset, need)
}

/// Read 1 byte at `offset`.
#[inline]
pub fn get_u8(bytes: &[u8], offset: usize) -> Result<u8, OutOfBounds> {
    field(bytes, offset, 1).map(|data| data[0])
}

/// Read 2 bytes at `offset` in byte order `B`.
#[inline]
pub fn get_u16<B: ByteOrder>(bytes: &[u8], offset: usize) -> Result<u16, OutOfBounds> {
    field(bytes, offset, 2).map(B::read_u16)
}

/// Read 3 bytes at `offset` in byte order `B`.
#[inline]
pub fn get_u24<B: ByteOrder>(bytes: &[u8], offset: usize) -> Result<u32, OutOfBounds> {
    field(bytes, offset, 3).map(B::read_u24)
}

/// Read 4 bytes at `offset` in byte order `B`.
#[inline]
pub fn get_u32<B: ByteOrder>(bytes: &[u8], offset: usize) -> Result<u32, OutOfBounds> {
    field(bytes, offset, 4).map(B::read_u32)
}

/// Read 8 bytes at `offset` in byte order `B`.
#[inline]
pub fn get_u64<B: ByteOrder>(bytes: &[u8], offset: usize) -> Result<u64, OutOfBounds> {
    field(bytes, offset, 8).map(B::read_u64)
}

/// Read an `n`-byte unsigned integer (`1 <= n <= 8`) at `offset` in byte order `B`.
#[inline]
pub fn get_uint<B: ByteOrder>(bytes: &[u8], offset: usize, n: usize) -> Result<u64, OutOfBounds> {
    if n == 0 || n > 8 {
        return Err(OutOfBounds {
            offset,
            need: n,
            len: bytes.len(),
        });
    }
    field(bytes, offset, n).map(|data| B::read_uint(data, n))
}

/// Read a 6-byte MAC address at `offset`.
#[inline]
pub fn get_mac_addr(bytes: &[u8], offset: usize) -> Result<EtherAddr, OutOfBounds> {
    field(bytes, offset, 6).map(EtherAddr::from_bytes)
}

/// Read an IPv4 address at `offset`.
#[inline]
pub fn get_ipv4_addr(bytes: &[u8], offset: usize) -> Result<Ipv4Addr, OutOfBounds> {
    field(bytes, offset, 4).map(|data| Ipv4Addr::new(data[0], data[1], data[2], data[3]))
}

/// Read an IPv6 address at `offset`.
#[inline]
pub fn get_ipv6_addr(bytes: &[u8], offset: usize) -> Result<Ipv6Addr, OutOfBounds> {
    field(bytes, offset, 16).map(|data| {
        let mut octets = [0; 16];
        octets.copy_from_slice(data);
        Ipv6Addr::from(octets)
    })
}

/// A bounded view over `bytes[offset..offset + length]` used by decoders.
///
/// Positions passed to the accessors are relative to the start of the
/// window. Reads never look past the end of the window, even if the
/// underlying buffer is longer.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    protocol: &'static str,
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Validate the window and wrap it.
    pub fn new(
        protocol: &'static str,
        bytes: &'a [u8],
        offset: usize,
        length: usize,
    ) -> Result<Self, DecodeError> {
        match offset.checked_add(length) {
            Some(end) if end <= bytes.len() => Ok(Self {
                protocol,
                buf: &bytes[..end],
                offset,
            }),
            _ => Err(DecodeError::inconsistent_length(
                protocol,
                bytes,
                offset,
                "window",
                length,
                bytes.len().saturating_sub(offset),
            )),
        }
    }

    /// Create a reader over the same buffer for another protocol.
    pub fn sub(&self, protocol: &'static str, at: usize, length: usize) -> Result<Self, DecodeError> {
        Reader::new(protocol, self.buf, self.offset + at, length)
    }

    /// Name of the protocol being decoded.
    #[inline]
    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    /// Absolute offset of the window in the underlying buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Whether the window is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying buffer, cut at the end of the window.
    #[inline]
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// The bytes of the window.
    #[inline]
    pub fn window(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }

    /// Fail unless the window holds at least `need` bytes.
    pub fn require(&self, need: usize) -> Result<(), DecodeError> {
        if self.len() < need {
            Err(DecodeError::too_short(
                self.protocol,
                self.buf,
                self.offset,
                need,
                self.len(),
            ))
        } else {
            Ok(())
        }
    }

    /// Build an [`DecodeError::InvalidField`] for the field at `at`.
    pub fn invalid(&self, at: usize, field: &'static str, value: u64) -> DecodeError {
        DecodeError::invalid_field(self.protocol, self.buf, self.offset + at, field, value)
    }

    /// Build an [`DecodeError::InconsistentLength`] for the length field at `at`.
    pub fn inconsistent(&self, at: usize, field: &'static str, declared: usize) -> DecodeError {
        DecodeError::inconsistent_length(
            self.protocol,
            self.buf,
            self.offset,
            field,
            declared,
            self.len().saturating_sub(at),
        )
    }

    #[inline]
    fn map<T>(&self, res: Result<T, OutOfBounds>) -> Result<T, DecodeError> {
        res.map_err(|e| {
            DecodeError::too_short(
                self.protocol,
                self.buf,
                self.offset,
                e.offset.saturating_add(e.need) - self.offset,
                self.len(),
            )
        })
    }

    /// Borrow `need` bytes at `at`.
    #[inline]
    pub fn slice(&self, at: usize, need: usize) -> Result<&'a [u8], DecodeError> {
        let buf = self.buf;
        self.map(get_slice(buf, self.offset + at, need))
    }

    /// Borrow everything from `at` to the end of the window.
    #[inline]
    pub fn rest(&self, at: usize) -> Result<&'a [u8], DecodeError> {
        self.require(at)?;
        Ok(&self.buf[self.offset + at..])
    }

    /// Read a byte at `at`.
    #[inline]
    pub fn u8(&self, at: usize) -> Result<u8, DecodeError> {
        self.map(get_u8(self.buf, self.offset + at))
    }

    /// Read a big-endian `u16` at `at`.
    #[inline]
    pub fn u16(&self, at: usize) -> Result<u16, DecodeError> {
        self.map(get_u16::<NetworkEndian>(self.buf, self.offset + at))
    }

    /// Read a big-endian 24-bit value at `at`.
    #[inline]
    pub fn u24(&self, at: usize) -> Result<u32, DecodeError> {
        self.map(get_u24::<NetworkEndian>(self.buf, self.offset + at))
    }

    /// Read a big-endian `u32` at `at`.
    #[inline]
    pub fn u32(&self, at: usize) -> Result<u32, DecodeError> {
        self.map(get_u32::<NetworkEndian>(self.buf, self.offset + at))
    }

    /// Read a big-endian `u64` at `at`.
    #[inline]
    pub fn u64(&self, at: usize) -> Result<u64, DecodeError> {
        self.map(get_u64::<NetworkEndian>(self.buf, self.offset + at))
    }

    /// Read a `u16` at `at` in byte order `B`.
    #[inline]
    pub fn u16_in<B: ByteOrder>(&self, at: usize) -> Result<u16, DecodeError> {
        self.map(get_u16::<B>(self.buf, self.offset + at))
    }

    /// Read a `u32` at `at` in byte order `B`.
    #[inline]
    pub fn u32_in<B: ByteOrder>(&self, at: usize) -> Result<u32, DecodeError> {
        self.map(get_u32::<B>(self.buf, self.offset + at))
    }

    /// Read a MAC address at `at`.
    #[inline]
    pub fn mac_addr(&self, at: usize) -> Result<EtherAddr, DecodeError> {
        self.map(get_mac_addr(self.buf, self.offset + at))
    }

    /// Read an IPv4 address at `at`.
    #[inline]
    pub fn ipv4_addr(&self, at: usize) -> Result<Ipv4Addr, DecodeError> {
        self.map(get_ipv4_addr(self.buf, self.offset + at))
    }

    /// Read an IPv6 address at `at`.
    #[inline]
    pub fn ipv6_addr(&self, at: usize) -> Result<Ipv6Addr, DecodeError> {
        self.map(get_ipv6_addr(self.buf, self.offset + at))
    }
}
