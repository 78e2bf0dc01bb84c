//! Error types.

use thiserror::Error;

/// Errors from decoding a submitted one-time-password response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A word is not in the dictionary, or abbreviates more than one entry.
    #[error("unknown word: {word}")]
    UnknownWord {
        /// The offending input token.
        word: String,
    },

    /// The embedded two checksum bits disagree with the decoded value.
    #[error("word checksum mismatch")]
    ChecksumMismatch,

    /// Hex form with a non-hex digit or the wrong number of digits.
    #[error("invalid hex password")]
    InvalidHex,

    /// The response is neither six words nor sixteen hex digits.
    #[error("response is neither word nor hex form")]
    MalformedResponse,

    /// A challenge line that is not `"<count> <seed>"`.
    #[error("malformed challenge line")]
    MalformedChallenge,
}

/// Provisioning-input policy violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Username is empty or not printable whitespace-free ASCII.
    #[error("invalid username: {reason}")]
    InvalidUsername {
        /// What the username violated.
        reason: &'static str,
    },

    /// Seed is empty, too long, or not ASCII alphanumeric.
    #[error("invalid seed: {reason}")]
    InvalidSeed {
        /// What the seed violated.
        reason: &'static str,
    },

    /// Passphrase shorter than the required minimum.
    #[error("passphrase must be at least {min} characters")]
    PassphraseTooShort {
        /// The enforced minimum length.
        min: usize,
    },
}

/// Errors from the persistent key store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record for the named user.
    #[error("no record for user: {username}")]
    NotFound {
        /// The user that was looked up.
        username: String,
    },

    /// A record for the user exists but does not parse.
    #[error("corrupt record for user: {username}")]
    CorruptRecord {
        /// The user whose record is damaged.
        username: String,
    },

    /// Underlying file I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from challenge issue and response verification.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user has no record in the key store.
    #[error("unknown user: {username}")]
    UnknownUser {
        /// The user that attempted to authenticate.
        username: String,
    },

    /// The sequence count has reached zero; the user must be re-keyed.
    #[error("password chain exhausted")]
    ChainExhausted,

    /// The response could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The folded response does not match the stored key.
    ///
    /// Deliberately does not distinguish a wrong passphrase from a stale,
    /// already-superseded response.
    #[error("authentication failed")]
    AuthFailure,

    /// Provisioning input rejected.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The key store failed.
    #[error(transparent)]
    Store(StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let err = DecodeError::UnknownWord { word: "CHRIS".to_string() };
        assert_eq!(err.to_string(), "unknown word: CHRIS");
    }

    #[test]
    fn auth_failure_reveals_nothing() {
        assert_eq!(AuthError::AuthFailure.to_string(), "authentication failed");
    }
}
