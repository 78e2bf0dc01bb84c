//! Key derivation and the iterated one-way function.
//!
//! The shared secret (seed + passphrase) is crunched into a 64-bit
//! starting key; [`fold`] is the one-way step that walks the chain. Both
//! are pure functions with no shared state and are safe to call from any
//! thread.

use cow_utils::CowUtils;
use md4::{Digest, Md4};

use crate::key::Key;

/// Crunches seed and passphrase into the starting key.
///
/// The seed is ASCII-lowercased, the passphrase appended with no
/// separator, and every byte masked to seven bits before hashing. The
/// 128-bit digest is folded to 64 bits by XOR-ing its two halves
/// word-wise.
///
/// Accepts any inputs, including empty ones; length and character policy
/// belongs to the provisioning caller.
pub fn key_crunch(seed: &str, passphrase: &str) -> Key {
    let seed = seed.cow_to_ascii_lowercase();
    let mut buf = Vec::with_capacity(seed.len() + passphrase.len());
    buf.extend_from_slice(seed.as_bytes());
    buf.extend_from_slice(passphrase.as_bytes());
    for byte in &mut buf {
        *byte &= 0x7f;
    }
    let digest = Md4::digest(&buf);
    fold_digest(&digest)
}

/// The one-way step: hashes exactly the 8 key bytes and folds to 64 bits.
///
/// Deterministic and, per the underlying digest, not invertible in
/// practice. Anyone holding the key for iteration `n` can compute
/// iteration `n + 1` but nothing below `n`.
pub fn fold(key: Key) -> Key {
    let digest = Md4::digest(key.as_bytes());
    fold_digest(&digest)
}

/// Folds a 128-bit digest to 64 bits: word 0 ^ word 2, word 1 ^ word 3,
/// serialized little-endian regardless of host byte order.
fn fold_digest(digest: &[u8]) -> Key {
    let word = |i: usize| u32::from_le_bytes([digest[i], digest[i + 1], digest[i + 2], digest[i + 3]]);
    let lo = word(0) ^ word(8);
    let hi = word(4) ^ word(12);
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&lo.to_le_bytes());
    out[4..].copy_from_slice(&hi.to_le_bytes());
    Key::from_bytes(out)
}

/// The key at iteration `n` of the chain for this seed and passphrase.
///
/// `n = 0` is the crunched starting key.
pub fn derive(seed: &str, passphrase: &str, n: u32) -> Key {
    advance_by(key_crunch(seed, passphrase), n)
}

/// Applies [`fold`] `steps` times from an arbitrary key.
///
/// Chain composition is associative, so
/// `advance_by(derive(s, p, a), b) == derive(s, p, a + b)`. Lets a run of
/// consecutive passwords be printed without re-crunching the passphrase.
pub fn advance_by(key: Key, steps: u32) -> Key {
    let mut key = key;
    for _ in 0..steps {
        key = fold(key);
    }
    key
}
