#![no_std]

#[macro_use]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod hash;
pub mod kex;
pub mod utils;

// RE-EXPORTS
// ================================================================================================

pub use hash::{HashAlgorithm, KexDigest};
pub use kex::{
    KexAlgorithm, KexError, KeyExchange, KeyLengths, KeyRole, SUPPORTED_ALGORITHMS, SessionKeys,
    SharedSecret, resolve,
};
pub use zeroize;

// TESTS
// ================================================================================================

#[test]
#[should_panic]
fn debug_assert_is_checked() {
    // enforce the release checks to always have `RUSTFLAGS="-C debug-assertions".
    //
    // the mpint encoder and the key derivation loop rely on `debug_assert` for their internal
    // length bookkeeping, and we want those assertions exercised by the test suite.
    debug_assert!(false);
}
