use std::fmt;

/// The passphrase byte sum is reduced by this modulus to form the seed.
pub const SEED_MODULUS: u64 = 1_000_000;

/// Keyed, reversible byte-wise stream transform.
///
/// A scalar seed is derived by summing the passphrase bytes modulo
/// [`SEED_MODULUS`]. Byte `i` of the input is shifted by
/// `passphrase[i % len] * seed (mod 256)`; decoding subtracts the same
/// shift. The keystream therefore repeats with the passphrase length.
///
/// Weak by construction: use it to deter casual inspection only.
#[derive(Clone)]
pub struct ByteTransform {
    /// Per-position shift, one entry per passphrase byte.
    shifts: Vec<u8>,
}

impl ByteTransform {
    /// Build a transform from a passphrase. Empty passphrases are rejected.
    pub fn new(passphrase: &str) -> CryptoResult<Self> {
        let key = passphrase.as_bytes();
        if key.is_empty() {
            return Err(CryptoError::EmptyPassphrase);
        }

        let seed = Self::seed_of(key);
        let shifts = key
            .iter()
            .map(|&b| ((u64::from(b) * seed) % 256) as u8)
            .collect();

        Ok(Self { shifts })
    }

    /// Keystream seed: the passphrase byte sum modulo [`SEED_MODULUS`].
    pub fn seed_of(key: &[u8]) -> u64 {
        key.iter().map(|&b| u64::from(b)).sum::<u64>() % SEED_MODULUS
    }

    /// Obfuscate `plaintext`.
    pub fn encode(&self, plaintext: &[u8]) -> Vec<u8> {
        plaintext
            .iter()
            .zip(self.shifts.iter().cycle())
            .map(|(&b, &shift)| b.wrapping_add(shift))
            .collect()
    }

    /// Reverse [`encode`](Self::encode). Wrapping subtraction is floor
    /// modulo 256, so negative intermediates land back in range.
    pub fn decode(&self, ciphertext: &[u8]) -> Vec<u8> {
        ciphertext
            .iter()
            .zip(self.shifts.iter().cycle())
            .map(|(&b, &shift)| b.wrapping_sub(shift))
            .collect()
    }

    /// In-place variant of [`encode`](Self::encode).
    pub fn encode_in_place(&self, buf: &mut [u8]) {
        for (b, &shift) in buf.iter_mut().zip(self.shifts.iter().cycle()) {
            *b = b.wrapping_add(shift);
        }
    }

    /// In-place variant of [`decode`](Self::decode).
    pub fn decode_in_place(&self, buf: &mut [u8]) {
        for (b, &shift) in buf.iter_mut().zip(self.shifts.iter().cycle()) {
            *b = b.wrapping_sub(shift);
        }
    }

    /// Length of the repeating keystream (the passphrase length in bytes).
    pub fn period(&self) -> usize {
        self.shifts.len()
    }
}

// Never print key-derived material.
impl fmt::Debug for ByteTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteTransform")
            .field("period", &self.period())
            .finish_non_exhaustive()
    }
}

/// Errors from transform construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("passphrase must not be empty")]
    EmptyPassphrase,
}

/// Result alias for transform operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
