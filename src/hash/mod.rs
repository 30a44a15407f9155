//! Hash functions bound to a key exchange.
//!
//! Every key exchange method fixes one hash algorithm, which is then used both for the exchange
//! hash `H` and for the key derivation function. [KexDigest] wraps the three algorithms used by
//! the supported methods behind a single incremental interface.

use alloc::vec::Vec;
use core::fmt;

use sha2::Digest;


// HASH ALGORITHM
// ================================================================================================

/// Hash algorithms which can be negotiated as part of a key exchange method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Returns the size of the digest in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// DIGEST
// ================================================================================================

/// Incremental hasher for one of the [HashAlgorithm]s.
///
/// Data is fed with [KexDigest::update]; [KexDigest::finalize_reset] produces the digest and
/// leaves the hasher ready for the next input, so one instance serves all key derivation blocks
/// of an exchange.
#[derive(Clone)]
pub struct KexDigest {
    state: DigestState,
}

#[derive(Clone)]
enum DigestState {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl KexDigest {
    /// Returns a fresh hasher for the specified algorithm.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha1 => DigestState::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => DigestState::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha512 => DigestState::Sha512(sha2::Sha512::new()),
        };
        Self { state }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self.state {
            DigestState::Sha1(_) => HashAlgorithm::Sha1,
            DigestState::Sha256(_) => HashAlgorithm::Sha256,
            DigestState::Sha512(_) => HashAlgorithm::Sha512,
        }
    }

    /// Returns the size of the digest in bytes.
    pub fn output_len(&self) -> usize {
        self.algorithm().output_len()
    }

    /// Absorbs `data` into the hasher state.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            DigestState::Sha1(h) => Digest::update(h, data),
            DigestState::Sha256(h) => Digest::update(h, data),
            DigestState::Sha512(h) => Digest::update(h, data),
        }
    }

    /// Appends the digest of everything absorbed so far to `out` and resets the hasher.
    pub fn finalize_into_reset(&mut self, out: &mut Vec<u8>) {
        match &mut self.state {
            DigestState::Sha1(h) => out.extend_from_slice(&h.finalize_reset()),
            DigestState::Sha256(h) => out.extend_from_slice(&h.finalize_reset()),
            DigestState::Sha512(h) => out.extend_from_slice(&h.finalize_reset()),
        }
    }

    /// Returns the digest of everything absorbed so far and resets the hasher.
    pub fn finalize_reset(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.output_len());
        self.finalize_into_reset(&mut out);
        out
    }

    /// Hashes `data` in one shot, discarding anything previously absorbed.
    pub fn hash(&mut self, data: &[u8]) -> Vec<u8> {
        self.hash_iter(core::iter::once(data))
    }

    /// Hashes the concatenation of `parts` in one shot, discarding anything previously absorbed.
    pub fn hash_parts(&mut self, parts: &[&[u8]]) -> Vec<u8> {
        self.hash_iter(parts.iter().copied())
    }

    fn hash_iter<'a>(&mut self, slices: impl Iterator<Item = &'a [u8]>) -> Vec<u8> {
        self.reset();
        for slice in slices {
            self.update(slice);
        }
        self.finalize_reset()
    }

    /// Discards any absorbed data.
    pub fn reset(&mut self) {
        match &mut self.state {
            DigestState::Sha1(h) => Digest::reset(h),
            DigestState::Sha256(h) => Digest::reset(h),
            DigestState::Sha512(h) => Digest::reset(h),
        }
    }
}

impl fmt::Debug for KexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KexDigest").field("algorithm", &self.algorithm()).finish()
    }
}
