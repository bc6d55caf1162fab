/// A key usable by this index: an unsigned, fixed-width integer.
///
/// Implemented for `u32` and `u64`. Arithmetic that could overflow at the
/// top of the key range (range widths, CHT shifts) is done by widening to
/// `u128` rather than wrapping, so `max_key == K::MAX` is handled correctly.
pub trait Key:
    Copy + Clone + Ord + Eq + std::fmt::Debug + std::hash::Hash + Send + Sync + 'static
{
    /// Number of bits in this key's representation.
    const BITS: u32;

    /// Zero, for defaults.
    const ZERO: Self;

    /// Widen to `u128` for overflow-safe arithmetic.
    fn as_u128(self) -> u128;

    /// Narrow back down from `u128`. Panics if the value doesn't fit; only
    /// used internally on values already known to fit in `K`.
    fn from_u128(value: u128) -> Self;

    /// Read this key from a little-endian byte buffer of exactly `Self::BITS / 8` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Write this key as little-endian bytes of exactly `Self::BITS / 8` bytes.
    fn write_le(self, bytes: &mut [u8]);
}

impl Key for u32 {
    const BITS: u32 = 32;
    const ZERO: Self = 0;

    fn as_u128(self) -> u128 {
        u128::from(self)
    }

    fn from_u128(value: u128) -> Self {
        value as Self
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        Self::from_le_bytes(buf)
    }

    fn write_le(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.to_le_bytes());
    }
}

impl Key for u64 {
    const BITS: u32 = 64;
    const ZERO: Self = 0;

    fn as_u128(self) -> u128 {
        u128::from(self)
    }

    fn from_u128(value: u128) -> Self {
        value as Self
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        Self::from_le_bytes(buf)
    }

    fn write_le(self, bytes: &mut [u8]) {
        bytes[..8].copy_from_slice(&self.to_le_bytes());
    }
}
