//! Challenge issue and response verification.
//!
//! The verifier never needs the passphrase. It keeps only the key at the
//! last accepted iteration, challenges for the iteration below it, and
//! checks a response by applying the one-way [`fold`] once: a match
//! proves the response is the pre-image of the stored key. On success
//! count and key advance together in the store; on failure nothing moves,
//! which is also what rejects a replay of any superseded response.

use core::fmt;
use core::str::FromStr;

use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::chain::{derive, fold};
use crate::error::{AuthError, DecodeError, InputError, StoreError};
use crate::key::Key;
use crate::store::{KeyStore, UserRecord};
use crate::words;

/// Longest seed accepted at provisioning time.
pub const MAX_SEED_LEN: usize = 16;

/// Shortest passphrase accepted at provisioning time.
pub const MIN_PASSPHRASE_LEN: usize = 10;

/// The longest challenge line worth parsing. Anything bigger is noise.
const MAX_CHALLENGE_LEN: usize = 64;

/// What a supplicant must answer: produce the OTP at iteration `count`
/// for `seed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// The iteration the supplicant must produce.
    pub count: u32,
    /// The public seed to crunch with the passphrase.
    pub seed: String,
}

impl fmt::Display for Challenge {
    /// The wire form, e.g. `"88 ka9q2"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.seed)
    }
}

impl FromStr for Challenge {
    type Err = DecodeError;

    /// Parses the wire form `"<count> <seed>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_CHALLENGE_LEN {
            return Err(DecodeError::MalformedChallenge);
        }
        let mut tokens = s.split_ascii_whitespace();
        let count = tokens
            .next()
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or(DecodeError::MalformedChallenge)?;
        let seed = tokens.next().ok_or(DecodeError::MalformedChallenge)?;
        if tokens.next().is_some() {
            return Err(DecodeError::MalformedChallenge);
        }
        Ok(Self { count, seed: seed.to_string() })
    }
}

/// Decodes a submitted response in either rendering.
///
/// Exactly six whitespace-separated tokens are the word form, whose
/// `UnknownWord`/`ChecksumMismatch` failures surface as-is so a caller
/// can tell a typo from a wrong password. Anything else must be the hex
/// form; hex that does not parse is `MalformedResponse`.
pub fn decode_response(response: &str) -> Result<Key, DecodeError> {
    let tokens: Vec<&str> = response.split_ascii_whitespace().collect();
    if let [w0, w1, w2, w3, w4, w5] = tokens[..] {
        return words::decode(&[w0, w1, w2, w3, w4, w5]);
    }
    Key::from_hex(response).map_err(|_| DecodeError::MalformedResponse)
}

/// Server-side authenticator over a [`KeyStore`].
pub struct Authenticator<S> {
    store: S,
}

impl<S: KeyStore> Authenticator<S> {
    /// Wraps a key store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Provisions (or re-keys) a user: validates the inputs, derives the
    /// key at `count`, and registers the record.
    ///
    /// The seed must be non-empty ASCII alphanumeric of at most
    /// [`MAX_SEED_LEN`] characters and is stored lowercase; the
    /// passphrase must be at least [`MIN_PASSPHRASE_LEN`] characters.
    pub fn provision(&self, username: &str, seed: &str, passphrase: &str, count: u32) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(InputError::InvalidUsername { reason: "empty" }.into());
        }
        if !username.chars().all(|c| c.is_ascii_graphic()) {
            // The key file is whitespace-delimited, one line per user.
            return Err(InputError::InvalidUsername { reason: "not printable whitespace-free ASCII" }.into());
        }
        if seed.is_empty() {
            return Err(InputError::InvalidSeed { reason: "empty" }.into());
        }
        if seed.len() > MAX_SEED_LEN {
            return Err(InputError::InvalidSeed { reason: "longer than 16 characters" }.into());
        }
        if !seed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InputError::InvalidSeed { reason: "not ASCII alphanumeric" }.into());
        }
        if passphrase.len() < MIN_PASSPHRASE_LEN {
            return Err(InputError::PassphraseTooShort { min: MIN_PASSPHRASE_LEN }.into());
        }
        let seed = seed.to_ascii_lowercase();
        let key = derive(&seed, passphrase, count);
        let record = UserRecord { username: username.to_string(), seed, count, key };
        self.store.register(&record).map_err(|err| store_error(username, err))?;
        info!(user = username, count, "user provisioned");
        Ok(())
    }

    /// Builds the challenge for a user's next authentication attempt.
    ///
    /// The stored record holds the last accepted iteration; the challenge
    /// carries the iteration below it, the one the supplicant must now
    /// produce. Reading never mutates the store.
    pub fn issue_challenge(&self, username: &str) -> Result<Challenge, AuthError> {
        let record = self.store.lookup(username).map_err(|err| store_error(username, err))?;
        if record.count == 0 {
            warn!(user = username, "password chain exhausted");
            return Err(AuthError::ChainExhausted);
        }
        let challenge = Challenge { count: record.count - 1, seed: record.seed };
        debug!(user = username, count = challenge.count, "challenge issued");
        Ok(challenge)
    }

    /// Verifies a response against the current record and, on success,
    /// commits the advanced state.
    ///
    /// The record is re-read and is authoritative; the challenge argument
    /// is the attempt this response answers. One call is one terminal
    /// outcome. A failed attempt is final and leaves the store exactly
    /// as it was, so retrying means a fresh challenge cycle.
    pub fn verify(&self, username: &str, response: &str, challenge: &Challenge) -> Result<(), AuthError> {
        let record = self.store.lookup(username).map_err(|err| store_error(username, err))?;
        if record.count == 0 {
            return Err(AuthError::ChainExhausted);
        }
        if challenge.count != record.count - 1 {
            // Another login landed since this challenge was issued; the
            // compare below cannot succeed for a superseded response.
            debug!(user = username, challenged = challenge.count, stored = record.count, "stale challenge");
        }
        let decoded = decode_response(response)?;
        let folded = fold(decoded);
        if !bool::from(folded.ct_eq(&record.key)) {
            warn!(user = username, count = record.count, "authentication failed");
            return Err(AuthError::AuthFailure);
        }
        self.store
            .commit(username, record.count - 1, decoded)
            .map_err(|err| store_error(username, err))?;
        info!(user = username, count = record.count - 1, "authentication succeeded");
        Ok(())
    }
}

fn store_error(username: &str, err: StoreError) -> AuthError {
    match err {
        StoreError::NotFound { .. } => AuthError::UnknownUser { username: username.to_string() },
        other => AuthError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKeyStore;

    const PASSPHRASE: &str = "This is a test.";

    fn provisioned(count: u32) -> Authenticator<MemoryKeyStore> {
        let auth = Authenticator::new(MemoryKeyStore::new());
        auth.provision("karn", "TeSt", PASSPHRASE, count).unwrap();
        auth
    }

    fn answer(challenge: &Challenge) -> String {
        words::encode(derive(&challenge.seed, PASSPHRASE, challenge.count)).join(" ")
    }

    #[test]
    fn challenge_names_count_below_stored() {
        let auth = provisioned(99);
        let challenge = auth.issue_challenge("karn").unwrap();
        assert_eq!(challenge, Challenge { count: 98, seed: "test".to_string() });
        assert_eq!(challenge.to_string(), "98 test");
    }

    #[test]
    fn challenge_parses_from_wire_form() {
        let challenge: Challenge = "88 ka9q2".parse().unwrap();
        assert_eq!(challenge, Challenge { count: 88, seed: "ka9q2".to_string() });
        assert!("88".parse::<Challenge>().is_err());
        assert!("ka9q2 88".parse::<Challenge>().is_err());
        assert!("88 ka9q2 extra".parse::<Challenge>().is_err());
    }

    #[test]
    fn verify_accepts_word_response_and_advances() {
        let auth = provisioned(99);
        let challenge = auth.issue_challenge("karn").unwrap();
        auth.verify("karn", &answer(&challenge), &challenge).unwrap();

        let record = auth.store().lookup("karn").unwrap();
        assert_eq!(record.count, 98);
        assert_eq!(record.key, derive("test", PASSPHRASE, 98));
    }

    #[test]
    fn verify_accepts_hex_response() {
        let auth = provisioned(99);
        let challenge = auth.issue_challenge("karn").unwrap();
        let hex = derive("test", PASSPHRASE, 98).to_hex_grouped();
        auth.verify("karn", &hex, &challenge).unwrap();
        assert_eq!(auth.store().lookup("karn").unwrap().count, 98);
    }

    #[test]
    fn wrong_passphrase_fails_without_mutation() {
        let auth = provisioned(99);
        let before = auth.store().lookup("karn").unwrap();
        let challenge = auth.issue_challenge("karn").unwrap();
        let wrong = words::encode(derive("test", "not the passphrase", 98)).join(" ");
        let err = auth.verify("karn", &wrong, &challenge).unwrap_err();
        assert!(matches!(err, AuthError::AuthFailure));
        assert_eq!(auth.store().lookup("karn").unwrap(), before);
    }

    #[test]
    fn replay_of_superseded_response_fails() {
        let auth = provisioned(99);
        let challenge = auth.issue_challenge("karn").unwrap();
        let response = answer(&challenge);
        auth.verify("karn", &response, &challenge).unwrap();
        let err = auth.verify("karn", &response, &challenge).unwrap_err();
        assert!(matches!(err, AuthError::AuthFailure));
        assert_eq!(auth.store().lookup("karn").unwrap().count, 98);
    }

    #[test]
    fn typo_is_distinguishable_from_wrong_password() {
        let auth = provisioned(99);
        let challenge = auth.issue_challenge("karn").unwrap();
        let mut tokens: Vec<String> = answer(&challenge).split_whitespace().map(String::from).collect();
        tokens[2] = "CHRIS".to_string();
        let err = auth.verify("karn", &tokens.join(" "), &challenge).unwrap_err();
        assert!(matches!(err, AuthError::Decode(DecodeError::UnknownWord { .. })));
    }

    #[test]
    fn garbage_response_is_malformed() {
        let auth = provisioned(99);
        let challenge = auth.issue_challenge("karn").unwrap();
        let err = auth.verify("karn", "not hex at all", &challenge).unwrap_err();
        assert!(matches!(err, AuthError::Decode(DecodeError::MalformedResponse)));
    }

    #[test]
    fn unknown_user_is_surfaced() {
        let auth = provisioned(99);
        assert!(matches!(auth.issue_challenge("haller"), Err(AuthError::UnknownUser { .. })));
    }

    #[test]
    fn exhausted_chain_blocks_challenge_and_leaves_store() {
        let auth = provisioned(0);
        let before = auth.store().lookup("karn").unwrap();
        assert!(matches!(auth.issue_challenge("karn"), Err(AuthError::ChainExhausted)));
        assert_eq!(auth.store().lookup("karn").unwrap(), before);
    }

    #[test]
    fn count_one_still_challenges_for_iteration_zero() {
        let auth = provisioned(1);
        let challenge = auth.issue_challenge("karn").unwrap();
        assert_eq!(challenge.count, 0);
        auth.verify("karn", &answer(&challenge), &challenge).unwrap();
        // Now exhausted.
        assert!(matches!(auth.issue_challenge("karn"), Err(AuthError::ChainExhausted)));
    }

    #[test]
    fn provision_rejects_bad_inputs() {
        let auth = Authenticator::new(MemoryKeyStore::new());
        assert!(matches!(
            auth.provision("phil karn", "ka9q2", PASSPHRASE, 99),
            Err(AuthError::Input(InputError::InvalidUsername { .. }))
        ));
        assert!(matches!(
            auth.provision("karn", "", PASSPHRASE, 99),
            Err(AuthError::Input(InputError::InvalidSeed { .. }))
        ));
        assert!(matches!(
            auth.provision("karn", "seed with spaces", PASSPHRASE, 99),
            Err(AuthError::Input(InputError::InvalidSeed { .. }))
        ));
        assert!(matches!(
            auth.provision("karn", "averyveryverylongseed", PASSPHRASE, 99),
            Err(AuthError::Input(InputError::InvalidSeed { .. }))
        ));
        assert!(matches!(
            auth.provision("karn", "ka9q2", "short", 99),
            Err(AuthError::Input(InputError::PassphraseTooShort { .. }))
        ));
    }
}
