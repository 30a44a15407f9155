use alloc::{string::ToString, vec::Vec};
use core::num::NonZeroU32;

use assert_matches::assert_matches;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::*;
use crate::utils::{decode_mpint, read_exact_string};

// TEST INFRASTRUCTURE
// ================================================================================================

/// An RNG whose fallible interface always reports a failure.
struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        0
    }
    fn next_u64(&mut self) -> u64 {
        0
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }
    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        Err(NonZeroU32::new(rand::Error::CUSTOM_START).unwrap().into())
    }
}

impl CryptoRng for FailingRng {}

/// Extracts the value a peer would read from our wire-encoded public value.
fn peer_view(exchange: &KeyExchange) -> Vec<u8> {
    match exchange.algorithm().group() {
        Some(_) => decode_mpint(exchange.public_value()).unwrap().to_vec(),
        None => read_exact_string(exchange.public_value()).unwrap().to_vec(),
    }
}

fn run_exchange(algorithm: KexAlgorithm, seed: u64) -> (KeyExchange, KeyExchange) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut client = KeyExchange::with_rng(algorithm, &mut rng).unwrap();
    let mut server = KeyExchange::with_rng(algorithm, &mut rng).unwrap();

    let client_public = peer_view(&client);
    let server_public = peer_view(&server);
    client.compute_shared_secret(&server_public).unwrap();
    server.compute_shared_secret(&client_public).unwrap();

    (client, server)
}

// REGISTRY
// ================================================================================================

#[test]
fn resolve_every_supported_name() {
    for algorithm in KexAlgorithm::ALL {
        assert_eq!(resolve(algorithm.name()).unwrap(), algorithm);
        assert_eq!(algorithm.name().parse::<KexAlgorithm>().unwrap(), algorithm);
        assert_eq!(KexAlgorithm::try_from(algorithm.name()).unwrap(), algorithm);
        assert_eq!(algorithm.to_string(), algorithm.name());
    }
}

#[test]
fn capability_string_lists_algorithms_in_order() {
    let names: Vec<&str> = KexAlgorithm::ALL.iter().map(|a| a.name()).collect();
    assert_eq!(SUPPORTED_ALGORITHMS, names.join(","));
    assert_eq!(
        SUPPORTED_ALGORITHMS.split(',').next(),
        Some("curve25519-sha256@libssh.org")
    );
}

#[test]
fn unknown_names_are_rejected() {
    for name in [
        "",
        "diffie-hellman-group14-sha384",
        "Curve25519-sha256@libssh.org",
        "curve25519-sha256",
        "diffie-hellman-group1-sha1 ",
        SUPPORTED_ALGORITHMS,
    ] {
        assert_eq!(resolve(name), Err(KexError::UnsupportedAlgorithm(name.to_string())));
    }
}

#[test]
fn algorithm_parameters() {
    use KexAlgorithm::*;

    assert_eq!(Curve25519Sha256.hash_algorithm(), HashAlgorithm::Sha256);
    assert_eq!(DhGroup16Sha512.hash_algorithm(), HashAlgorithm::Sha512);
    assert_eq!(DhGroup14Sha256.hash_algorithm(), HashAlgorithm::Sha256);
    assert_eq!(DhGroup14Sha1.hash_algorithm(), HashAlgorithm::Sha1);
    assert_eq!(DhGroup1Sha1.hash_algorithm(), HashAlgorithm::Sha1);

    assert_eq!(Curve25519Sha256.group(), None);
    assert_eq!(DhGroup16Sha512.group(), Some(DhGroup::Group16));
    assert_eq!(DhGroup14Sha256.group(), Some(DhGroup::Group14));
    assert_eq!(DhGroup14Sha1.group(), Some(DhGroup::Group14));
    assert_eq!(DhGroup1Sha1.group(), Some(DhGroup::Group1));
}

// KEY AGREEMENT
// ================================================================================================

#[test]
fn all_algorithms_agree_on_shared_secret() {
    for (seed, algorithm) in KexAlgorithm::ALL.into_iter().enumerate() {
        let (client, server) = run_exchange(algorithm, seed as u64);

        let k1 = client.shared_secret().unwrap();
        let k2 = server.shared_secret().unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes(), "{algorithm}");

        // shared secrets are always valid non-negative mpints
        assert!(decode_mpint(k1.as_bytes()).is_ok());
    }
}

#[test]
fn public_value_encoding() {
    let mut rng = ChaCha20Rng::seed_from_u64(9);

    let curve = KeyExchange::with_rng(KexAlgorithm::Curve25519Sha256, &mut rng).unwrap();
    assert_eq!(curve.public_value().len(), 36);
    assert_eq!(curve.public_value()[..4], [0, 0, 0, 32]);

    let dh = KeyExchange::with_rng(KexAlgorithm::DhGroup14Sha256, &mut rng).unwrap();
    let body_len = u32::from_be_bytes(dh.public_value()[..4].try_into().unwrap()) as usize;
    assert_eq!(dh.public_value().len(), 4 + body_len);
    assert!(body_len <= 257);
    assert!(decode_mpint(dh.public_value()).is_ok());
}

#[test]
fn shared_secret_from_wire() {
    let mut rng = ChaCha20Rng::seed_from_u64(10);
    let mut client = KeyExchange::with_rng(KexAlgorithm::DhGroup1Sha1, &mut rng).unwrap();
    let mut server = KeyExchange::with_rng(KexAlgorithm::DhGroup1Sha1, &mut rng).unwrap();

    let server_wire = server.public_value().to_vec();
    let client_wire = client.public_value().to_vec();
    let k1 = client.compute_shared_secret_from_wire(&server_wire).unwrap().as_bytes().to_vec();
    let k2 = server.compute_shared_secret_from_wire(&client_wire).unwrap().as_bytes().to_vec();
    assert_eq!(k1, k2);

    let mut other = KeyExchange::with_rng(KexAlgorithm::DhGroup1Sha1, &mut rng).unwrap();
    let mut trailing = server_wire.clone();
    trailing.push(0);
    assert_matches!(
        other.compute_shared_secret_from_wire(&trailing),
        Err(KexError::InvalidPeerValue(_))
    );
    assert_matches!(
        other.compute_shared_secret_from_wire(&server_wire[..10]),
        Err(KexError::InvalidPeerValue(_))
    );
    assert!(other.shared_secret().is_none());
}

#[test]
fn curve25519_rejects_wrong_peer_length() {
    let mut rng = ChaCha20Rng::seed_from_u64(12);
    let mut exchange = KeyExchange::with_rng(KexAlgorithm::Curve25519Sha256, &mut rng).unwrap();

    for len in [31, 33] {
        assert_matches!(
            exchange.compute_shared_secret(&vec![1; len]),
            Err(KexError::InvalidPeerValue(_))
        );
    }
    assert!(exchange.shared_secret().is_none());

    // a failed attempt leaves the exchange usable
    assert!(exchange.compute_shared_secret(&[9; 32]).is_ok());
}

#[test]
fn shared_secret_is_computed_once() {
    let (mut client, server) = run_exchange(KexAlgorithm::Curve25519Sha256, 13);
    let before = client.shared_secret().unwrap().as_bytes().to_vec();

    assert_matches!(
        client.compute_shared_secret(&peer_view(&server)),
        Err(KexError::SharedSecretAlreadyComputed)
    );
    assert_eq!(client.shared_secret().unwrap().as_bytes(), before.as_slice());
}

#[test]
fn entropy_failure_is_fatal() {
    for algorithm in KexAlgorithm::ALL {
        assert_matches!(
            KeyExchange::with_rng(algorithm, &mut FailingRng),
            Err(KexError::EntropyFailure)
        );
    }
}

// KEY DERIVATION
// ================================================================================================

#[test]
fn both_sides_derive_identical_keys() {
    for (seed, algorithm) in KexAlgorithm::ALL.into_iter().enumerate() {
        let (mut client, mut server) = run_exchange(algorithm, 100 + seed as u64);

        let exchange_hash = client.hash_parts(&[b"client", b"server"]);
        assert_eq!(exchange_hash.len(), algorithm.hash_algorithm().output_len());
        assert_eq!(server.hash(b"clientserver"), exchange_hash);

        let lengths = KeyLengths::symmetric(16, 32, algorithm.hash_algorithm().output_len());
        let client_keys =
            client.derive_session_keys(&exchange_hash, &exchange_hash, &lengths).unwrap();
        let server_keys =
            server.derive_session_keys(&exchange_hash, &exchange_hash, &lengths).unwrap();

        for role in KeyRole::ALL {
            assert_eq!(client_keys.get(role), server_keys.get(role));
            assert_eq!(client_keys.get(role).len(), lengths.get(role));

            let single = client.derive_key(&exchange_hash, &exchange_hash, role, lengths.get(role));
            assert_eq!(single.unwrap().as_slice(), client_keys.get(role));
        }
    }
}

#[test]
fn derivation_matches_free_function() {
    let (mut client, _) = run_exchange(KexAlgorithm::DhGroup14Sha1, 21);
    let h = [0x5c_u8; 20];
    let session_id = [0xa3_u8; 20];

    let key = client.derive_key(&h, &session_id, b'C', 45).unwrap();
    let mut digest = KexDigest::new(HashAlgorithm::Sha1);
    let expected = derive_key(
        &mut digest,
        client.shared_secret().unwrap().as_bytes(),
        &h,
        &session_id,
        b'C',
        45,
    );
    assert_eq!(*key, *expected);
    assert_eq!(key.len(), 45);
}

#[test]
fn derivation_requires_shared_secret() {
    let mut rng = ChaCha20Rng::seed_from_u64(30);
    let mut exchange = KeyExchange::with_rng(KexAlgorithm::DhGroup14Sha256, &mut rng).unwrap();

    assert_matches!(
        exchange.derive_key(&[0; 32], &[0; 32], KeyRole::IvClientToServer, 16),
        Err(KexError::SharedSecretNotComputed)
    );
    assert_matches!(
        exchange.derive_session_keys(&[0; 32], &[0; 32], &KeyLengths::default()),
        Err(KexError::SharedSecretNotComputed)
    );
}

#[test]
fn derivation_checks_exchange_hash_length() {
    let (mut client, _) = run_exchange(KexAlgorithm::Curve25519Sha256, 31);

    assert_matches!(
        client.derive_key(&[0; 20], &[0; 32], KeyRole::IvClientToServer, 16),
        Err(KexError::InvalidExchangeHashLength { expected: 32, actual: 20 })
    );

    // the session id keeps the length of the first exchange hash, which may differ after a rekey
    assert!(client.derive_key(&[0; 32], &[0; 20], KeyRole::IvClientToServer, 16).is_ok());
}

#[test]
fn hasher_is_left_reset() {
    for (seed, algorithm) in KexAlgorithm::ALL.into_iter().enumerate() {
        let (mut client, _) = run_exchange(algorithm, 50 + seed as u64);
        let empty = KexDigest::new(algorithm.hash_algorithm()).finalize_reset();

        let h = client.hash_parts(&[b"transcript"]);
        assert_eq!(client.digest.clone().finalize_reset(), empty);

        client.derive_session_keys(&h, &h, &KeyLengths::symmetric(16, 32, 20)).unwrap();
        assert_eq!(client.digest.clone().finalize_reset(), empty, "{algorithm}");
    }
}

#[test]
fn debug_output_hides_secrets() {
    let (client, _) = run_exchange(KexAlgorithm::Curve25519Sha256, 40);
    let output = format!("{client:?}");

    assert!(output.contains("Curve25519Sha256"));
    assert!(output.contains("<elided secret for SharedSecret>"));
}
