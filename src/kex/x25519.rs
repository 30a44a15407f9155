//! X25519 (Elliptic Curve Diffie-Hellman over Curve25519) key agreement, as used by
//! `curve25519-sha256@libssh.org` (RFC 8731).
//!
//! The public value travels as an SSH `string` holding the raw 32-byte point, while the shared
//! secret is handed to the key derivation as an `mpint` built from the 32 output bytes read as an
//! unsigned big-endian integer.

use alloc::vec::Vec;
use core::fmt;

use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use super::KexError;
use crate::utils::encode_mpint;

// CONSTANTS
// ================================================================================================

/// Size of X25519 scalars, points and shared secrets in bytes.
pub const KEY_BYTES: usize = 32;

// CLAMPING
// ================================================================================================

/// Applies the X25519 clamping to `scalar` in place (RFC 7748 §5).
///
/// Clears the three low bits of the first byte, clears the top bit of the last byte and sets its
/// second-highest bit.
pub fn clamp(scalar: &mut [u8; KEY_BYTES]) {
    scalar[0] &= 0b1111_1000;
    scalar[31] &= 0b0111_1111;
    scalar[31] |= 0b0100_0000;
}

// SECRET KEY
// ================================================================================================

/// Clamped X25519 private scalar.
///
/// This type implements `ZeroizeOnDrop` because the inner `x25519_dalek::StaticSecret`
/// implements it, ensuring the scalar is securely wiped from memory when dropped.
pub struct Curve25519SecretKey {
    inner: StaticSecret,
}

impl Curve25519SecretKey {
    /// Generates a new scalar from 32 bytes of the provided RNG.
    ///
    /// # Errors
    /// Returns [KexError::EntropyFailure] if the RNG fails to produce the bytes.
    pub fn with_rng<R: CryptoRng + RngCore>(rng: &mut R) -> Result<Self, KexError> {
        let mut bytes = Zeroizing::new([0_u8; KEY_BYTES]);
        rng.try_fill_bytes(&mut *bytes).map_err(|_| KexError::EntropyFailure)?;

        Ok(Self::from_bytes(&mut bytes))
    }

    /// Clamps `bytes` and uses them as the private scalar.
    pub(crate) fn from_bytes(bytes: &mut [u8; KEY_BYTES]) -> Self {
        clamp(bytes);
        Self { inner: StaticSecret::from(*bytes) }
    }

    #[cfg(test)]
    pub(crate) fn scalar_bytes(&self) -> [u8; KEY_BYTES] {
        self.inner.to_bytes()
    }

    /// Returns the public point, i.e. the scalar multiplied with the curve base point.
    pub fn public_key(&self) -> [u8; KEY_BYTES] {
        PublicKey::from(&self.inner).to_bytes()
    }

    /// Multiplies the scalar with the peer's point and returns the result encoded as an `mpint`.
    ///
    /// # Errors
    /// Returns [KexError::InvalidPeerValue] if `peer_value` is not exactly 32 bytes long, or if the
    /// resulting point is all zeros (the peer sent a point of small order).
    pub fn diffie_hellman(&self, peer_value: &[u8]) -> Result<Zeroizing<Vec<u8>>, KexError> {
        let point: [u8; KEY_BYTES] = peer_value.try_into().map_err(|_| {
            KexError::invalid_peer_value(format_args!(
                "expected {KEY_BYTES} bytes, found {}",
                peer_value.len()
            ))
        })?;

        let shared = self.inner.diffie_hellman(&PublicKey::from(point));
        if !shared.was_contributory() {
            return Err(KexError::invalid_peer_value("point of small order"));
        }

        Ok(Zeroizing::new(encode_mpint(shared.as_bytes())?))
    }
}

impl ZeroizeOnDrop for Curve25519SecretKey {}

impl fmt::Debug for Curve25519SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<elided secret for Curve25519SecretKey>")
    }
}

// TESTS
// ================================================================================================
