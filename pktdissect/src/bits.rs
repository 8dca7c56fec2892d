//! Named sub-fields packed into a byte or a multi-byte word.

/// A `width`-bit field located `shift` bits above the least significant bit
/// of its containing word.
///
/// Decoding extracts the field, encoding ORs it back into an accumulator.
/// Bits not covered by any named field of a word are kept by the caller as a
/// "reserved" field, so re-encoding reproduces them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    shift: u32,
    width: u32,
}

impl BitField {
    /// Describe a field. `shift + width` must not exceed 32.
    pub const fn new(shift: u32, width: u32) -> Self {
        assert!(width > 0 && shift + width <= 32);
        Self { shift, width }
    }

    /// A single-bit flag at position `bit`.
    pub const fn flag(bit: u32) -> Self {
        Self::new(bit, 1)
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max(&self) -> u32 {
        if self.width == 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// The field mask in word position.
    #[inline]
    pub const fn mask(&self) -> u32 {
        self.max() << self.shift
    }

    /// Whether `value` fits into the field.
    #[inline]
    pub const fn fits(&self, value: u32) -> bool {
        value <= self.max()
    }

    /// Extract the field from `word`.
    #[inline]
    pub const fn get(&self, word: u32) -> u32 {
        (word >> self.shift) & self.max()
    }

    /// Extract a single-bit field from `word` as a flag.
    #[inline]
    pub const fn is_set(&self, word: u32) -> bool {
        self.get(word) != 0
    }

    /// OR `value` into `acc`. Bits of `value` beyond the field width are dropped.
    #[inline]
    pub const fn put(&self, acc: u32, value: u32) -> u32 {
        acc | ((value & self.max()) << self.shift)
    }

    /// OR a flag into `acc`.
    #[inline]
    pub const fn put_flag(&self, acc: u32, value: bool) -> u32 {
        self.put(acc, value as u32)
    }
}
