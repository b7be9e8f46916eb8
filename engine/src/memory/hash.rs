//! The streaming hash primitive behind structural term identity.
//!
//! Every interned term carries a precomputed 64-bit FNV-1a hash of its logical value, used for
//! cheap equality short-circuits, interning, invocation fingerprints and state fingerprints. The
//! byte-level folding is fixed (little-endian) so hashes are stable across platforms and can be
//! persisted or compared between embeddings.

/// FNV-1a 64-bit offset basis.
const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const PRIME: u64 = 0x0000_0100_0000_01b3;

/// A streaming FNV-1a hasher with chainable writers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hasher(u64);

impl Hasher {
    /// Creates a hasher seeded with the offset basis.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(OFFSET_BASIS)
    }

    /// Folds a single byte into the state.
    #[inline]
    #[must_use]
    pub const fn write_byte(self, byte: u8) -> Self {
        Self((self.0 ^ byte as u64).wrapping_mul(PRIME))
    }

    /// Folds a byte slice into the state.
    #[inline]
    #[must_use]
    pub fn write_bytes(self, bytes: &[u8]) -> Self {
        bytes.iter().fold(self, |hasher, &byte| hasher.write_byte(byte))
    }

    /// Folds a 32-bit integer into the state, little-endian.
    #[inline]
    #[must_use]
    pub fn write_u32(self, value: u32) -> Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Folds a 64-bit integer into the state, little-endian.
    #[inline]
    #[must_use]
    pub fn write_u64(self, value: u64) -> Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Folds a signed 64-bit integer into the state, little-endian.
    #[inline]
    #[must_use]
    pub fn write_i64(self, value: i64) -> Self {
        self.write_u64(value as u64)
    }

    /// Folds a float into the state by reinterpreting its bits.
    ///
    /// Bit reinterpretation means `NaN` hashes to itself and `0.0`/`-0.0` hash differently,
    /// matching the structural (not numeric) equality of float terms.
    #[inline]
    #[must_use]
    pub fn write_f64(self, value: f64) -> Self {
        self.write_u64(value.to_bits())
    }

    /// Folds a previously computed hash into the state.
    #[inline]
    #[must_use]
    pub fn write_hash(self, hash: u64) -> Self {
        self.write_u64(hash)
    }

    /// Returns the accumulated hash.
    #[inline]
    #[must_use]
    pub const fn finish(self) -> u64 {
        self.0
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_the_offset_basis() {
        assert_eq!(Hasher::new().finish(), 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn known_vectors() {
        // Reference values for the standard 64-bit FNV-1a parameters.
        assert_eq!(Hasher::new().write_byte(b'a').finish(), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(Hasher::new().write_bytes(b"foobar").finish(), 0x85dd_5e13_c8ba_a9ac);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let streamed = Hasher::new().write_byte(b'f').write_bytes(b"oo").write_bytes(b"bar").finish();
        assert_eq!(streamed, Hasher::new().write_bytes(b"foobar").finish());
    }

    #[test]
    fn integers_fold_little_endian() {
        assert_eq!(Hasher::new().write_u32(0x0403_0201).finish(), Hasher::new().write_bytes(&[1, 2, 3, 4]).finish());
        assert_eq!(
            Hasher::new().write_i64(-1).finish(),
            Hasher::new().write_bytes(&[0xff; 8]).finish()
        );
    }

    #[test]
    fn floats_hash_their_bits() {
        assert_eq!(Hasher::new().write_f64(f64::NAN).finish(), Hasher::new().write_f64(f64::NAN).finish());
        assert_ne!(Hasher::new().write_f64(0.0).finish(), Hasher::new().write_f64(-0.0).finish());
        assert_eq!(Hasher::new().write_f64(1.5).finish(), Hasher::new().write_u64(1.5_f64.to_bits()).finish());
    }
}
