//! End-to-end login protocol tests over the on-disk key store.
//!
//! The invariants checked here are the scheme's contract:
//! - a success moves count down by exactly one and stores the proven key
//! - a failure of any kind moves nothing
//! - a response is only ever accepted once

use std::sync::Arc;
use std::thread;

use skey::{derive, words, AuthError, Authenticator, FileKeyStore, KeyStore, UserRecord};

const PASSPHRASE: &str = "This is a test.";

fn file_auth(dir: &tempfile::TempDir) -> Authenticator<FileKeyStore> {
    Authenticator::new(FileKeyStore::new(dir.path().join("skeykeys")))
}

/// What the supplicant would type for this challenge.
fn answer(challenge: &skey::Challenge, passphrase: &str) -> String {
    words::encode(derive(&challenge.seed, passphrase, challenge.count)).join(" ")
}

/// Oracle: the record must hold the key for exactly its stored count.
fn assert_consistent(record: &UserRecord, passphrase: &str) {
    assert_eq!(record.key, derive(&record.seed, passphrase, record.count));
}

#[test]
fn chain_is_consumed_one_login_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let auth = file_auth(&dir);
    auth.provision("karn", "test", PASSPHRASE, 99).unwrap();

    for expected in (95..99).rev() {
        let challenge = auth.issue_challenge("karn").unwrap();
        assert_eq!(challenge.count, expected);
        auth.verify("karn", &answer(&challenge, PASSPHRASE), &challenge).unwrap();

        let record = auth.store().lookup("karn").unwrap();
        assert_eq!(record.count, expected);
        assert_consistent(&record, PASSPHRASE);
    }
}

#[test]
fn replayed_response_is_rejected_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let auth = file_auth(&dir);
    auth.provision("karn", "test", PASSPHRASE, 99).unwrap();

    let challenge = auth.issue_challenge("karn").unwrap();
    let response = answer(&challenge, PASSPHRASE);
    auth.verify("karn", &response, &challenge).unwrap();

    // Same response against the advanced record: the fold of the decoded
    // key no longer matches the stored key.
    let err = auth.verify("karn", &response, &challenge).unwrap_err();
    assert!(matches!(err, AuthError::AuthFailure));
    assert_eq!(auth.store().lookup("karn").unwrap().count, 98);
}

#[test]
fn failed_attempt_never_moves_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let auth = file_auth(&dir);
    auth.provision("karn", "test", PASSPHRASE, 99).unwrap();
    let before = auth.store().lookup("karn").unwrap();

    let challenge = auth.issue_challenge("karn").unwrap();
    for bad in [
        answer(&challenge, "wrong passphrase").as_str(),
        "OMEN US HORN OMIT BACK AHOY",
        "C848 666B 6435 0A93",
    ] {
        assert!(auth.verify("karn", bad, &challenge).is_err());
        assert_eq!(auth.store().lookup("karn").unwrap(), before);
    }

    // The chain still works after the failures.
    auth.verify("karn", &answer(&challenge, PASSPHRASE), &challenge).unwrap();
}

#[test]
fn hex_and_word_responses_are_interchangeable() {
    let dir = tempfile::tempdir().unwrap();
    let auth = file_auth(&dir);
    auth.provision("karn", "test", PASSPHRASE, 99).unwrap();

    let challenge = auth.issue_challenge("karn").unwrap();
    let hex = derive(&challenge.seed, PASSPHRASE, challenge.count).to_hex_grouped();
    auth.verify("karn", &hex, &challenge).unwrap();

    let challenge = auth.issue_challenge("karn").unwrap();
    auth.verify("karn", &answer(&challenge, PASSPHRASE), &challenge).unwrap();

    assert_eq!(auth.store().lookup("karn").unwrap().count, 97);
}

#[test]
fn exhausted_user_must_be_rekeyed() {
    let dir = tempfile::tempdir().unwrap();
    let auth = file_auth(&dir);
    auth.provision("karn", "test", PASSPHRASE, 1).unwrap();

    let challenge = auth.issue_challenge("karn").unwrap();
    assert_eq!(challenge.count, 0);
    auth.verify("karn", &answer(&challenge, PASSPHRASE), &challenge).unwrap();

    assert!(matches!(auth.issue_challenge("karn"), Err(AuthError::ChainExhausted)));

    // Re-keying with a fresh seed restores service.
    auth.provision("karn", "ka9q3", PASSPHRASE, 99).unwrap();
    let challenge = auth.issue_challenge("karn").unwrap();
    assert_eq!((challenge.count, challenge.seed.as_str()), (98, "ka9q3"));
}

#[test]
fn users_advance_independently_under_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let auth = Arc::new(file_auth(&dir));
    let users = ["karn", "haller", "walden", "chasin"];
    for user in users {
        auth.provision(user, "test", PASSPHRASE, 50).unwrap();
    }

    let handles: Vec<_> = users
        .iter()
        .map(|&user| {
            let auth = Arc::clone(&auth);
            thread::spawn(move || {
                for _ in 0..5 {
                    let challenge = auth.issue_challenge(user).unwrap();
                    let response = answer(&challenge, PASSPHRASE);
                    auth.verify(user, &response, &challenge).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for user in users {
        let record = auth.store().lookup(user).unwrap();
        assert_eq!(record.count, 45);
        assert_consistent(&record, PASSPHRASE);
    }
}

#[test]
fn key_file_round_trips_through_logins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skeykeys");
    {
        let auth = Authenticator::new(FileKeyStore::new(&path));
        auth.provision("karn", "test", PASSPHRASE, 99).unwrap();
        let challenge = auth.issue_challenge("karn").unwrap();
        auth.verify("karn", &answer(&challenge, PASSPHRASE), &challenge).unwrap();
    }

    // A later session over the same file picks up where the last ended.
    let auth = Authenticator::new(FileKeyStore::new(&path));
    let challenge = auth.issue_challenge("karn").unwrap();
    assert_eq!(challenge.count, 97);

    // The line is the interchange format: name, seed, decimal count, hex key.
    let contents = std::fs::read_to_string(&path).unwrap();
    let fields: Vec<&str> = contents.split_ascii_whitespace().collect();
    assert_eq!(fields[0], "karn");
    assert_eq!(fields[1], "test");
    assert_eq!(fields[2].parse::<u32>().unwrap(), 98);
    assert_eq!(fields[3].len(), 16);
}
