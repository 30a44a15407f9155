//! Session key derivation (RFC 4253 §7.2).
//!
//! Each key is computed as
//!
//! ```text
//! K1 = HASH(K || H || flag || session_id)
//! K2 = HASH(K || H || K1)
//! K3 = HASH(K || H || K1 || K2)
//! ...
//! key = K1 || K2 || K3 || ...
//! ```
//!
//! truncated to the requested length, where `K` is the `mpint` encoded shared secret and `H` the
//! exchange hash.

use alloc::vec::Vec;
use core::fmt;

use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::hash::KexDigest;

// KEY ROLES
// ================================================================================================

/// The six keys derived at the end of a key exchange, identified by their direction flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyRole {
    /// Initial IV, client to server.
    IvClientToServer = b'A',
    /// Initial IV, server to client.
    IvServerToClient = b'B',
    /// Encryption key, client to server.
    EncryptionClientToServer = b'C',
    /// Encryption key, server to client.
    EncryptionServerToClient = b'D',
    /// Integrity key, client to server.
    IntegrityClientToServer = b'E',
    /// Integrity key, server to client.
    IntegrityServerToClient = b'F',
}

impl KeyRole {
    pub const ALL: [KeyRole; 6] = [
        KeyRole::IvClientToServer,
        KeyRole::IvServerToClient,
        KeyRole::EncryptionClientToServer,
        KeyRole::EncryptionServerToClient,
        KeyRole::IntegrityClientToServer,
        KeyRole::IntegrityServerToClient,
    ];

    /// Returns the single byte mixed into the first hash block for this key.
    pub const fn flag(self) -> u8 {
        self as u8
    }

    const fn index(self) -> usize {
        (self as u8 - b'A') as usize
    }
}

impl From<KeyRole> for u8 {
    fn from(role: KeyRole) -> Self {
        role.flag()
    }
}

// DERIVATION
// ================================================================================================

/// Derives `len` bytes of key material for the given direction `flag`.
///
/// `shared_secret` and `exchange_hash` are hashed exactly as given, so the shared secret must
/// already be `mpint` encoded. The digest is left reset.
pub fn derive_key(
    digest: &mut KexDigest,
    shared_secret: &[u8],
    exchange_hash: &[u8],
    session_id: &[u8],
    flag: u8,
    len: usize,
) -> Zeroizing<Vec<u8>> {
    digest.reset();

    let hash_len = digest.output_len();
    let mut out = Zeroizing::new(Vec::with_capacity(len.div_ceil(hash_len) * hash_len));

    while out.len() < len {
        digest.update(shared_secret);
        digest.update(exchange_hash);
        if out.is_empty() {
            digest.update(&[flag]);
            digest.update(session_id);
        } else {
            digest.update(&out);
        }
        digest.finalize_into_reset(&mut out);
    }

    debug_assert_eq!(out.len(), len.div_ceil(hash_len) * hash_len);
    out.truncate(len);
    out
}

// SESSION KEYS
// ================================================================================================

/// Requested length, in bytes, of each of the six session keys.
///
/// A length of zero skips the key, e.g. for an AEAD cipher that needs no separate integrity key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyLengths {
    pub iv_client_to_server: usize,
    pub iv_server_to_client: usize,
    pub encryption_client_to_server: usize,
    pub encryption_server_to_client: usize,
    pub integrity_client_to_server: usize,
    pub integrity_server_to_client: usize,
}

impl KeyLengths {
    /// Returns lengths which are the same in both directions.
    pub const fn symmetric(iv: usize, encryption: usize, integrity: usize) -> Self {
        Self {
            iv_client_to_server: iv,
            iv_server_to_client: iv,
            encryption_client_to_server: encryption,
            encryption_server_to_client: encryption,
            integrity_client_to_server: integrity,
            integrity_server_to_client: integrity,
        }
    }

    pub const fn get(&self, role: KeyRole) -> usize {
        match role {
            KeyRole::IvClientToServer => self.iv_client_to_server,
            KeyRole::IvServerToClient => self.iv_server_to_client,
            KeyRole::EncryptionClientToServer => self.encryption_client_to_server,
            KeyRole::EncryptionServerToClient => self.encryption_server_to_client,
            KeyRole::IntegrityClientToServer => self.integrity_client_to_server,
            KeyRole::IntegrityServerToClient => self.integrity_server_to_client,
        }
    }
}

/// The six keys derived at the end of a key exchange.
///
/// All keys are wiped from memory when this struct is dropped.
pub struct SessionKeys {
    keys: [Zeroizing<Vec<u8>>; 6],
}

impl SessionKeys {
    pub fn get(&self, role: KeyRole) -> &[u8] {
        &self.keys[role.index()]
    }
}

impl ZeroizeOnDrop for SessionKeys {}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<elided secret for SessionKeys>")
    }
}

/// Derives all six session keys with the given lengths.
pub fn derive_session_keys(
    digest: &mut KexDigest,
    shared_secret: &[u8],
    exchange_hash: &[u8],
    session_id: &[u8],
    lengths: &KeyLengths,
) -> SessionKeys {
    let keys = KeyRole::ALL.map(|role| {
        derive_key(
            digest,
            shared_secret,
            exchange_hash,
            session_id,
            role.flag(),
            lengths.get(role),
        )
    });
    SessionKeys { keys }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::hash::HashAlgorithm;

    const SECRET: &[u8] = &[0, 0, 0, 3, 0x01, 0x02, 0x03];

    #[test]
    fn first_block_layout() {
        let h = [0x11_u8; 32];
        let session_id = [0x22_u8; 32];
        let mut digest = KexDigest::new(HashAlgorithm::Sha256);

        let key = derive_key(&mut digest, SECRET, &h, &session_id, b'C', 32);

        let mut expected = Sha256::new();
        expected.update(SECRET);
        expected.update(h);
        expected.update([b'C']);
        expected.update(session_id);
        assert_eq!(key.as_slice(), expected.finalize().as_slice());
    }

    #[test]
    fn later_blocks_hash_all_previous_output() {
        let h = [0x33_u8; 32];
        let session_id = [0x44_u8; 32];
        let mut digest = KexDigest::new(HashAlgorithm::Sha256);

        let key = derive_key(&mut digest, SECRET, &h, &session_id, b'A', 96);
        assert_eq!(key.len(), 96);

        let k2 = Sha256::new().chain_update(SECRET).chain_update(h).chain_update(&key[..32]);
        assert_eq!(&key[32..64], k2.finalize().as_slice());

        let k3 = Sha256::new().chain_update(SECRET).chain_update(h).chain_update(&key[..64]);
        assert_eq!(&key[64..96], k3.finalize().as_slice());
    }

    #[test]
    fn zero_length() {
        let mut digest = KexDigest::new(HashAlgorithm::Sha1);
        assert!(derive_key(&mut digest, SECRET, &[0; 20], &[0; 20], b'A', 0).is_empty());
    }

    #[test]
    fn flags_produce_distinct_keys() {
        let mut digest = KexDigest::new(HashAlgorithm::Sha512);
        let lengths = KeyLengths::symmetric(16, 32, 64);
        let keys = derive_session_keys(&mut digest, SECRET, &[7; 64], &[8; 64], &lengths);

        for role in KeyRole::ALL {
            assert_eq!(keys.get(role).len(), lengths.get(role));
        }
        assert_ne!(
            keys.get(KeyRole::EncryptionClientToServer),
            keys.get(KeyRole::EncryptionServerToClient)
        );
        assert_eq!(format!("{keys:?}"), "<elided secret for SessionKeys>");
    }

    #[test]
    fn role_flags() {
        let flags: Vec<u8> = KeyRole::ALL.iter().map(|r| r.flag()).collect();
        assert_eq!(flags, b"ABCDEF");
        for (i, role) in KeyRole::ALL.into_iter().enumerate() {
            assert_eq!(role.index(), i);
            assert_eq!(u8::from(role), b'A' + i as u8);
        }
    }

    proptest! {
        #[test]
        fn derivation_is_deterministic_and_prefix_stable(
            secret in prop::collection::vec(any::<u8>(), 1..80),
            h in any::<[u8; 20]>(),
            session_id in any::<[u8; 20]>(),
            flag in b'A'..=b'F',
            len in 0usize..200,
        ) {
            for algorithm in [HashAlgorithm::Sha1, HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
                let mut digest = KexDigest::new(algorithm);

                let a = derive_key(&mut digest, &secret, &h, &session_id, flag, len);
                let b = derive_key(&mut digest, &secret, &h, &session_id, flag, len);
                prop_assert_eq!(a.len(), len);
                prop_assert_eq!(&*a, &*b);

                // a longer key starts with the shorter one
                let single = derive_key(&mut digest, &secret, &h, &session_id, flag, 1);
                let longer = derive_key(&mut digest, &secret, &h, &session_id, flag, len + 1);
                prop_assert_eq!(longer[0], single[0]);
                prop_assert_eq!(&longer[..len], &a[..]);
            }
        }
    }
}
