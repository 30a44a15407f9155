//! Finite-field Diffie-Hellman key agreement over the fixed MODP groups.
//!
//! The local public value `e = g^x mod p` and the shared secret `K = f^x mod p` are both
//! produced in the SSH `mpint` encoding. The peer value `f` is expected as the payload of its
//! `mpint`, i.e. with the length prefix already removed.

use alloc::vec::Vec;
use core::fmt;

use num_bigint_dig::BigUint;
use num_traits::One;
use rand::{CryptoRng, RngCore};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use super::{DhGroup, KexError};
use crate::utils::encode_mpint;

// CONSTANTS
// ================================================================================================

/// Upper bound on rejection sampling rounds when drawing a private exponent.
///
/// All supported primes start with 64 set bits, so a single round succeeds except with
/// negligible probability. Running out of rounds means the random source is broken.
const MAX_SAMPLING_ATTEMPTS: usize = 64;

// SECRET KEY
// ================================================================================================

/// Private exponent for finite-field Diffie-Hellman in one of the [DhGroup]s.
///
/// The exponent is wiped from memory when the key is dropped. The group prime is parsed once on
/// construction and reused for every exponentiation.
pub struct DhSecretKey {
    group: DhGroup,
    prime: BigUint,
    exponent: Zeroizing<BigUint>,
}

impl DhSecretKey {
    /// Draws a private exponent uniformly at random from `[2, p - 2]` using the provided RNG.
    ///
    /// # Errors
    /// Returns [KexError::EntropyFailure] if the RNG reports a failure or keeps producing values
    /// outside of the range.
    pub fn with_rng<R: CryptoRng + RngCore>(
        group: DhGroup,
        rng: &mut R,
    ) -> Result<Self, KexError> {
        let prime = group.prime();
        let exponent = sample_exponent(&prime, rng)?;
        Ok(Self { group, prime, exponent })
    }

    /// Builds a key from a caller-chosen exponent.
    #[cfg(test)]
    pub(crate) fn from_exponent(group: DhGroup, exponent: BigUint) -> Self {
        Self { group, prime: group.prime(), exponent: Zeroizing::new(exponent) }
    }

    pub fn group(&self) -> DhGroup {
        self.group
    }

    /// Returns the public value `g^x mod p` encoded as an `mpint`.
    pub fn public_value(&self) -> Result<Vec<u8>, KexError> {
        let e = public_value(&self.group.generator(), &self.exponent, &self.prime);
        Ok(encode_mpint(&e.to_bytes_be())?)
    }

    /// Computes the shared secret `f^x mod p` from the peer value `f` and returns it encoded as
    /// an `mpint`.
    ///
    /// # Errors
    /// Returns [KexError::InvalidPeerValue] if `peer_value` is empty, would be read as a negative
    /// `mpint`, or does not lie strictly between 1 and `p - 1`.
    pub fn diffie_hellman(&self, peer_value: &[u8]) -> Result<Zeroizing<Vec<u8>>, KexError> {
        let f = decode_peer_value(peer_value)?;
        let one = BigUint::one();

        if f <= one || f >= &self.prime - &one {
            return Err(KexError::invalid_peer_value("value is outside of the range (1, p - 1)"));
        }

        let k = Zeroizing::new(f.modpow(&self.exponent, &self.prime));
        let magnitude = Zeroizing::new(k.to_bytes_be());

        Ok(Zeroizing::new(encode_mpint(&magnitude)?))
    }
}

impl ZeroizeOnDrop for DhSecretKey {}

impl fmt::Debug for DhSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<elided secret for DhSecretKey>")
    }
}

// HELPERS
// ================================================================================================

fn public_value(generator: &BigUint, exponent: &BigUint, prime: &BigUint) -> BigUint {
    generator.modpow(exponent, prime)
}

fn decode_peer_value(bytes: &[u8]) -> Result<BigUint, KexError> {
    match bytes.first() {
        None => Err(KexError::invalid_peer_value("value is empty")),
        Some(&b) if b & 0x80 != 0 => Err(KexError::invalid_peer_value("value is negative")),
        Some(_) => Ok(BigUint::from_bytes_be(bytes)),
    }
}

/// Rejection-samples an integer in `[2, prime - 2]`.
fn sample_exponent<R: CryptoRng + RngCore>(
    prime: &BigUint,
    rng: &mut R,
) -> Result<Zeroizing<BigUint>, KexError> {
    let bits = prime.bits();
    let num_bytes = bits.div_ceil(8);
    // clear the unused high bits of the first byte so that most candidates fall below `prime`
    let top_mask = 0xff_u8 >> (num_bytes * 8 - bits);

    let lower = BigUint::from(2u32);
    let upper = prime - &BigUint::one();

    let mut buf = Zeroizing::new(vec![0_u8; num_bytes]);
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        rng.try_fill_bytes(&mut buf).map_err(|_| KexError::EntropyFailure)?;
        buf[0] &= top_mask;

        // rejected candidates are wiped when dropped
        let candidate = Zeroizing::new(BigUint::from_bytes_be(&buf));
        if *candidate >= lower && *candidate < upper {
            return Ok(candidate);
        }
    }

    Err(KexError::EntropyFailure)
}

// TESTS
// ================================================================================================
