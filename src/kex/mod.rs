//! SSH key exchange: algorithm registry, key agreement and session key derivation.
//!
//! A [KeyExchange] is created from a negotiated [KexAlgorithm], which generates the local key
//! pair. Its encoded public value is sent to the peer, the peer's public value is fed back
//! through [KeyExchange::compute_shared_secret], and once the transport has computed the exchange
//! hash the session keys are derived with [KeyExchange::derive_key] or
//! [KeyExchange::derive_session_keys].
//!
//! # Examples
//!
//! ```
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//! use ssh_kex::{KeyExchange, KeyRole, resolve, utils::read_exact_string};
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(0);
//! let algorithm = resolve("curve25519-sha256@libssh.org").unwrap();
//!
//! let mut client = KeyExchange::with_rng(algorithm, &mut rng).unwrap();
//! let mut server = KeyExchange::with_rng(algorithm, &mut rng).unwrap();
//!
//! let server_public = read_exact_string(server.public_value()).unwrap().to_vec();
//! let client_public = read_exact_string(client.public_value()).unwrap().to_vec();
//! client.compute_shared_secret(&server_public).unwrap();
//! server.compute_shared_secret(&client_public).unwrap();
//!
//! let exchange_hash = client.hash(b"transcript");
//! let session_id = exchange_hash.clone();
//! let key = client
//!     .derive_key(&exchange_hash, &session_id, KeyRole::EncryptionClientToServer, 32)
//!     .unwrap();
//! assert_eq!(key.len(), 32);
//! ```

use alloc::{string::ToString, vec::Vec};
use core::{fmt, str::FromStr};

use rand::{CryptoRng, RngCore};
use tracing::{debug, warn};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::{
    hash::{HashAlgorithm, KexDigest},
    utils::{encode_string, read_exact_string},
};

mod dh;
mod error;
mod groups;
mod kdf;
mod x25519;

#[cfg(test)]
mod tests;

pub use dh::DhSecretKey;
pub use error::KexError;
pub use groups::{DhGroup, GENERATOR};
pub use kdf::{KeyLengths, KeyRole, SessionKeys, derive_key, derive_session_keys};
pub use x25519::{Curve25519SecretKey, KEY_BYTES as CURVE25519_KEY_BYTES, clamp};

// ALGORITHM NAMES
// ================================================================================================

pub const CURVE25519_SHA256_LIBSSH: &str = "curve25519-sha256@libssh.org";
pub const DH_GROUP16_SHA512: &str = "diffie-hellman-group16-sha512";
pub const DH_GROUP14_SHA256: &str = "diffie-hellman-group14-sha256";
pub const DH_GROUP14_SHA1: &str = "diffie-hellman-group14-sha1";
pub const DH_GROUP1_SHA1: &str = "diffie-hellman-group1-sha1";

/// Comma-separated list of the supported algorithms in order of preference, as advertised in
/// `SSH_MSG_KEXINIT`.
pub const SUPPORTED_ALGORITHMS: &str = "curve25519-sha256@libssh.org,\
                                        diffie-hellman-group16-sha512,\
                                        diffie-hellman-group14-sha256,\
                                        diffie-hellman-group14-sha1,\
                                        diffie-hellman-group1-sha1";

// ALGORITHM REGISTRY
// ================================================================================================

/// Supported key exchange methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KexAlgorithm {
    Curve25519Sha256,
    DhGroup16Sha512,
    DhGroup14Sha256,
    DhGroup14Sha1,
    DhGroup1Sha1,
}

impl KexAlgorithm {
    /// All supported methods, most preferred first.
    pub const ALL: [KexAlgorithm; 5] = [
        KexAlgorithm::Curve25519Sha256,
        KexAlgorithm::DhGroup16Sha512,
        KexAlgorithm::DhGroup14Sha256,
        KexAlgorithm::DhGroup14Sha1,
        KexAlgorithm::DhGroup1Sha1,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            KexAlgorithm::Curve25519Sha256 => CURVE25519_SHA256_LIBSSH,
            KexAlgorithm::DhGroup16Sha512 => DH_GROUP16_SHA512,
            KexAlgorithm::DhGroup14Sha256 => DH_GROUP14_SHA256,
            KexAlgorithm::DhGroup14Sha1 => DH_GROUP14_SHA1,
            KexAlgorithm::DhGroup1Sha1 => DH_GROUP1_SHA1,
        }
    }

    /// Looks up a method by its exact (case-sensitive) name.
    pub fn from_name(name: &str) -> Result<Self, KexError> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == name)
            .ok_or_else(|| KexError::UnsupportedAlgorithm(name.to_string()))
    }

    /// Returns the hash used for the exchange hash and the key derivation.
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            KexAlgorithm::Curve25519Sha256 | KexAlgorithm::DhGroup14Sha256 => HashAlgorithm::Sha256,
            KexAlgorithm::DhGroup16Sha512 => HashAlgorithm::Sha512,
            KexAlgorithm::DhGroup14Sha1 | KexAlgorithm::DhGroup1Sha1 => HashAlgorithm::Sha1,
        }
    }

    /// Returns the MODP group for finite-field methods, or `None` for Curve25519.
    pub const fn group(self) -> Option<DhGroup> {
        match self {
            KexAlgorithm::Curve25519Sha256 => None,
            KexAlgorithm::DhGroup16Sha512 => Some(DhGroup::Group16),
            KexAlgorithm::DhGroup14Sha256 | KexAlgorithm::DhGroup14Sha1 => Some(DhGroup::Group14),
            KexAlgorithm::DhGroup1Sha1 => Some(DhGroup::Group1),
        }
    }

    /// Starts a new key exchange with this method, generating the local key pair with `rng`.
    pub fn start<R: CryptoRng + RngCore>(self, rng: &mut R) -> Result<KeyExchange, KexError> {
        KeyExchange::with_rng(self, rng)
    }
}

impl fmt::Display for KexAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KexAlgorithm {
    type Err = KexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl TryFrom<&str> for KexAlgorithm {
    type Error = KexError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_name(value)
    }
}

/// Resolves a negotiated algorithm name.
///
/// # Errors
/// Returns [KexError::UnsupportedAlgorithm] if the name is not one of [SUPPORTED_ALGORITHMS].
pub fn resolve(name: &str) -> Result<KexAlgorithm, KexError> {
    KexAlgorithm::from_name(name)
}

// SHARED SECRET
// ================================================================================================

/// The `mpint` encoded shared secret `K` of a key exchange.
///
/// The bytes are wiped from memory when dropped.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for SharedSecret {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl ZeroizeOnDrop for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<elided secret for SharedSecret>")
    }
}

// KEY EXCHANGE
// ================================================================================================

enum Engine {
    FiniteField(DhSecretKey),
    Curve25519(Curve25519SecretKey),
}

/// State of one key exchange attempt.
///
/// The private exponent or scalar and the shared secret are wiped when the exchange is dropped,
/// whether it completed or was abandoned after an error. The hasher is left reset after every
/// exchange hash and key derivation, but its internal buffers are not zeroized.
pub struct KeyExchange {
    algorithm: KexAlgorithm,
    digest: KexDigest,
    engine: Engine,
    public_value: Vec<u8>,
    shared_secret: Option<SharedSecret>,
}

impl KeyExchange {
    /// Starts a key exchange using the thread-local OS-seeded random number generator.
    #[cfg(feature = "std")]
    pub fn new(algorithm: KexAlgorithm) -> Result<Self, KexError> {
        let mut rng = rand::thread_rng();
        Self::with_rng(algorithm, &mut rng)
    }

    /// Resolves `name` and starts a key exchange using the thread-local random number generator.
    #[cfg(feature = "std")]
    pub fn from_name(name: &str) -> Result<Self, KexError> {
        Self::new(resolve(name)?)
    }

    /// Starts a key exchange, generating the local key pair with the provided RNG.
    ///
    /// # Errors
    /// Returns [KexError::EntropyFailure] if the RNG fails.
    pub fn with_rng<R: CryptoRng + RngCore>(
        algorithm: KexAlgorithm,
        rng: &mut R,
    ) -> Result<Self, KexError> {
        let (engine, public_value) = match algorithm.group() {
            Some(group) => {
                let sk = DhSecretKey::with_rng(group, rng)?;
                let public_value = sk.public_value()?;
                (Engine::FiniteField(sk), public_value)
            },
            None => {
                let sk = Curve25519SecretKey::with_rng(rng)?;
                let public_value = encode_string(&sk.public_key())?;
                (Engine::Curve25519(sk), public_value)
            },
        };

        debug!(
            algorithm = algorithm.name(),
            public_value_len = public_value.len(),
            "generated key exchange key pair"
        );

        Ok(Self {
            algorithm,
            digest: KexDigest::new(algorithm.hash_algorithm()),
            engine,
            public_value,
            shared_secret: None,
        })
    }

    pub fn algorithm(&self) -> KexAlgorithm {
        self.algorithm
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.digest.algorithm()
    }

    /// Returns the local public value in its wire encoding: an `mpint` for the finite-field
    /// methods, a 32-byte `string` for Curve25519.
    pub fn public_value(&self) -> &[u8] {
        &self.public_value
    }

    /// Returns the shared secret, if it has been computed.
    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        self.shared_secret.as_ref()
    }

    /// Computes the shared secret from the peer's public value.
    ///
    /// `peer_value` is the content of the peer's `mpint` (finite-field) or `string` (Curve25519),
    /// without the 4-byte length prefix.
    ///
    /// # Errors
    /// Returns an error if the shared secret was already computed, or
    /// [KexError::InvalidPeerValue] if the peer value is rejected.
    pub fn compute_shared_secret(&mut self, peer_value: &[u8]) -> Result<&SharedSecret, KexError> {
        if self.shared_secret.is_some() {
            return Err(KexError::SharedSecretAlreadyComputed);
        }

        let secret = match &self.engine {
            Engine::FiniteField(sk) => sk.diffie_hellman(peer_value),
            Engine::Curve25519(sk) => sk.diffie_hellman(peer_value),
        }
        .inspect_err(|err| {
            warn!(algorithm = self.algorithm.name(), %err, "rejected peer public value")
        })?;

        debug!(
            algorithm = self.algorithm.name(),
            shared_secret_len = secret.len(),
            "computed shared secret"
        );

        Ok(&*self.shared_secret.insert(SharedSecret(secret)))
    }

    /// Computes the shared secret from the peer's public value still carrying its 4-byte length
    /// prefix, as it appears in `SSH_MSG_KEXDH_INIT` and `SSH_MSG_KEXDH_REPLY`.
    pub fn compute_shared_secret_from_wire(
        &mut self,
        encoded: &[u8],
    ) -> Result<&SharedSecret, KexError> {
        let peer_value = read_exact_string(encoded).map_err(KexError::invalid_peer_value)?;
        self.compute_shared_secret(peer_value)
    }

    /// Hashes `data` with the hash of the negotiated method, e.g. to compute the exchange hash.
    pub fn hash(&mut self, data: &[u8]) -> Vec<u8> {
        self.digest.hash(data)
    }

    /// Hashes the concatenation of `parts` with the hash of the negotiated method.
    pub fn hash_parts(&mut self, parts: &[&[u8]]) -> Vec<u8> {
        self.digest.hash_parts(parts)
    }

    /// Derives `len` bytes of key material for `flag` (usually a [KeyRole]).
    ///
    /// # Errors
    /// Returns an error if the shared secret has not been computed yet, or if `exchange_hash`
    /// does not have the output length of the negotiated hash.
    pub fn derive_key(
        &mut self,
        exchange_hash: &[u8],
        session_id: &[u8],
        flag: impl Into<u8>,
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, KexError> {
        self.check_exchange_hash(exchange_hash)?;
        let secret = self.shared_secret.as_ref().ok_or(KexError::SharedSecretNotComputed)?;

        let flag = flag.into();
        debug!(algorithm = self.algorithm.name(), flag, len, "deriving session key");

        Ok(derive_key(&mut self.digest, secret.as_bytes(), exchange_hash, session_id, flag, len))
    }

    /// Derives all six session keys with the given lengths.
    pub fn derive_session_keys(
        &mut self,
        exchange_hash: &[u8],
        session_id: &[u8],
        lengths: &KeyLengths,
    ) -> Result<SessionKeys, KexError> {
        self.check_exchange_hash(exchange_hash)?;
        let secret = self.shared_secret.as_ref().ok_or(KexError::SharedSecretNotComputed)?;

        debug!(algorithm = self.algorithm.name(), ?lengths, "deriving session keys");

        Ok(derive_session_keys(
            &mut self.digest,
            secret.as_bytes(),
            exchange_hash,
            session_id,
            lengths,
        ))
    }

    fn check_exchange_hash(&self, exchange_hash: &[u8]) -> Result<(), KexError> {
        let expected = self.digest.output_len();
        if exchange_hash.len() != expected {
            return Err(KexError::InvalidExchangeHashLength {
                expected,
                actual: exchange_hash.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExchange")
            .field("algorithm", &self.algorithm)
            .field("public_value_len", &self.public_value.len())
            .field("shared_secret", &self.shared_secret)
            .finish_non_exhaustive()
    }
}
