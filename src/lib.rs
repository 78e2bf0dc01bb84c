//! # S/KEY one-time passwords
//!
//! Implements the S/KEY one-time-password scheme: a seed and a secret
//! passphrase are crunched into a 64-bit starting key, a one-way function
//! is applied iteratively to produce a finite chain of passwords, and
//! each password is rendered either as six short dictionary words (with
//! an embedded two-bit checksum) or as sixteen hex digits. A server
//! stores only the key for the last accepted iteration, challenges for
//! the iteration below it, and checks a response by folding it once:
//! the server can validate passwords but never derive future ones,
//! and no password is ever accepted twice.
//!
//! The construction is bit-for-bit the historical one (and, with MD4,
//! identical to the OTP computation of RFC 2289), so this crate
//! interoperates with deployed S/KEY calculators and key files.
//!
//! ## Computing a response
//!
//! A challenge names the iteration to produce and the public seed, e.g.
//! `"98 test"`:
//!
//! ```rust
//! use skey::{words, Challenge};
//!
//! let challenge: Challenge = "98 test".parse().unwrap();
//! let key = skey::derive(&challenge.seed, "This is a test.", challenge.count);
//! assert_eq!(words::encode(key).join(" "), "HUGH IOTA LONE EMIT TELL MILT");
//! assert_eq!(key.to_hex_grouped(), "9C53 DEC7 BDCE 8F77");
//! ```
//!
//! ## Verifying on the server
//!
//! ```rust
//! use skey::{Authenticator, MemoryKeyStore};
//!
//! let auth = Authenticator::new(MemoryKeyStore::new());
//! auth.provision("karn", "test", "This is a test.", 99).unwrap();
//!
//! let challenge = auth.issue_challenge("karn").unwrap();
//! assert_eq!(challenge.to_string(), "98 test");
//!
//! // The supplicant answers in word or hex form; a success advances the
//! // stored record, so the same response can never be accepted again.
//! auth.verify("karn", "HUGH IOTA LONE EMIT TELL MILT", &challenge).unwrap();
//! assert!(auth.verify("karn", "HUGH IOTA LONE EMIT TELL MILT", &challenge).is_err());
//! ```
//!
//! ## Security
//!
//! The digest underneath is MD4, which is how the deployed wire format is
//! defined; the hash chain's one-way property is as strong as MD4's
//! pre-image resistance, which remains far stronger than its broken
//! collision resistance. Verification compares keys in constant time.

pub mod auth;
pub mod chain;
pub mod dict;
pub mod error;
pub mod key;
pub mod store;
pub mod words;

pub use auth::{decode_response, Authenticator, Challenge};
pub use chain::{advance_by, derive, fold, key_crunch};
pub use error::{AuthError, DecodeError, InputError, StoreError};
pub use key::Key;
pub use store::{FileKeyStore, KeyStore, MemoryKeyStore, UserRecord};
