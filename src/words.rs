//! The six-word codec.
//!
//! A 64-bit key and a 2-bit checksum form a 66-bit string, consumed
//! most-significant-bit first as six 11-bit indices into the
//! [dictionary](crate::dict::DICTIONARY). The checksum rides in the two
//! low-order index bits of the last word, so word five encodes only nine
//! value bits.

use cow_utils::CowUtils;

use crate::dict::DICTIONARY;
use crate::error::DecodeError;
use crate::key::Key;

/// The 2-bit checksum over a key: the sum of all its 2-bit groups, mod 4.
///
/// Any single-bit corruption of the value moves one group by 1 or 2 and
/// therefore always changes the sum mod 4.
pub fn checksum(key: &Key) -> u8 {
    let sum: u32 = key
        .as_bytes()
        .iter()
        .map(|&b| u32::from(b & 0b11) + u32::from((b >> 2) & 0b11) + u32::from((b >> 4) & 0b11) + u32::from(b >> 6))
        .sum();
    (sum & 0b11) as u8
}

/// Encodes a key as six uppercase dictionary words.
pub fn encode(key: Key) -> [&'static str; 6] {
    let value = u64::from_be_bytes(*key.as_bytes());
    let packed = (u128::from(value) << 2) | u128::from(checksum(&key));
    let mut out = [""; 6];
    for (i, slot) in out.iter_mut().enumerate() {
        let index = (packed >> (11 * (5 - i))) & 0x7ff;
        *slot = DICTIONARY[index as usize];
    }
    out
}

/// Decodes six words back into a key, enforcing the checksum.
///
/// Fails with [`DecodeError::UnknownWord`] when a word cannot be resolved
/// and [`DecodeError::ChecksumMismatch`] when the two embedded checksum
/// bits disagree with the decoded value. A checksum failure is the main
/// typo detector and is always an error, never advisory.
pub fn decode(words: &[&str; 6]) -> Result<Key, DecodeError> {
    let mut packed: u128 = 0;
    for word in words {
        packed = (packed << 11) | u128::from(word_index(word)?);
    }
    let value = (packed >> 2) as u64;
    let embedded = (packed & 0b11) as u8;
    let key = Key::from_bytes(value.to_be_bytes());
    if checksum(&key) != embedded {
        return Err(DecodeError::ChecksumMismatch);
    }
    Ok(key)
}

/// Resolves one input token to its dictionary index.
///
/// The rule, total over all inputs: uppercase the token, case folding the
/// lookup; an exact dictionary match wins; a token longer than four
/// letters is recognized by its first four letters, exactly; a shorter
/// token is accepted as a prefix only when exactly one dictionary entry
/// starts with it. No match, or an ambiguous prefix, is `UnknownWord`,
/// never a nearest-match guess.
fn word_index(word: &str) -> Result<u16, DecodeError> {
    let unknown = || DecodeError::UnknownWord { word: word.to_string() };
    if word.is_empty() || !word.is_ascii() {
        return Err(unknown());
    }
    let upper = word.cow_to_ascii_uppercase();
    let token = upper.as_ref();
    if let Some(i) = DICTIONARY.iter().position(|w| *w == token) {
        return Ok(i as u16);
    }
    if token.len() > 4 {
        let head = &token[..4];
        return DICTIONARY
            .iter()
            .position(|w| *w == head)
            .map(|i| i as u16)
            .ok_or_else(unknown);
    }
    let mut matches = DICTIONARY.iter().enumerate().filter(|(_, w)| w.starts_with(token));
    match (matches.next(), matches.next()) {
        (Some((i, _)), None) => Ok(i as u16),
        _ => Err(unknown()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hex: &str) -> Key {
        Key::from_hex(hex).unwrap()
    }

    #[test]
    fn encodes_rfc_vector_values() {
        assert_eq!(encode(key("D1854218EBBB0B51")).join(" "), "ROME MUG FRED SCAN LIVE LACE");
        assert_eq!(encode(key("C5E612776E6C237A")).join(" "), "NOTE OUT IBIS SINK NAVE MODE");
        assert_eq!(encode(key("3F3BF4B4145FD74B")).join(" "), "TAG SLOW NOV MIN WOOL KENO");
    }

    #[test]
    fn decodes_historical_phrase() {
        // The documented response to challenge "88 ka9q2".
        let decoded = decode(&["OMEN", "US", "HORN", "OMIT", "BACK", "AHOY"]).unwrap();
        assert_eq!(decoded, key("C848666B64350A93"));
        assert_eq!(encode(decoded).join(" "), "OMEN US HORN OMIT BACK AHOY");
    }

    #[test]
    fn round_trips_rfc_vectors() {
        for hex in ["D1854218EBBB0B51", "63473EF01CD0B444", "849C79D4F6F55388", "0000000000000000", "FFFFFFFFFFFFFFFF"] {
            let k = key(hex);
            assert_eq!(decode(&encode(k)), Ok(k));
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let lower = decode(&["omen", "us", "horn", "omit", "back", "ahoy"]).unwrap();
        assert_eq!(lower, key("C848666B64350A93"));
    }

    #[test]
    fn accepts_unambiguous_prefix() {
        // AWRY is the only word starting with "AWR"; HORN the only "HOR".
        let full = decode(&["OMEN", "US", "HORN", "OMIT", "BACK", "AHOY"]).unwrap();
        let abbrev = decode(&["OMEN", "US", "HOR", "OMIT", "BACK", "AHOY"]).unwrap();
        assert_eq!(abbrev, full);
    }

    #[test]
    fn accepts_first_four_of_longer_token() {
        // "ROMEO" is recognized by its first four letters.
        let a = decode(&["ROME", "MUG", "FRED", "SCAN", "LIVE", "LACE"]).unwrap();
        let b = decode(&["ROMEO", "MUG", "FRED", "SCAN", "LIVE", "LACE"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_ambiguous_prefix() {
        // "AB" starts ABE, ABED, ABEL, ABET, ABLE, ABUT.
        let err = decode(&["AB", "US", "HORN", "OMIT", "BACK", "AHOY"]).unwrap_err();
        assert_eq!(err, DecodeError::UnknownWord { word: "AB".to_string() });
    }

    #[test]
    fn rejects_unknown_word() {
        let err = decode(&["OMEN", "US", "CHRIS", "OMIT", "BACK", "AHOY"]).unwrap_err();
        assert_eq!(err, DecodeError::UnknownWord { word: "CHRIS".to_string() });
    }

    #[test]
    fn detects_substituted_word() {
        // Swap the last word for its neighbor: the embedded checksum bits
        // shift under an unchanged value.
        let err = decode(&["OMEN", "US", "HORN", "OMIT", "BACK", "AHEM"]);
        assert_eq!(err, Err(DecodeError::ChecksumMismatch));
    }

    #[test]
    fn single_bit_flips_always_detected() {
        let k = key("C5E612776E6C237A");
        let original = encode(k);
        // Flip each bit of each full-value word index in turn. Every such
        // flip alters a 2-bit group of the value by 1 or 2, so the
        // checksum must catch all of them.
        for word_pos in 0..5 {
            let index = DICTIONARY
                .iter()
                .position(|w| *w == original[word_pos])
                .unwrap() as u16;
            for bit in 0..11 {
                let mut tampered = original;
                tampered[word_pos] = DICTIONARY[usize::from(index ^ (1 << bit))];
                assert_eq!(decode(&tampered), Err(DecodeError::ChecksumMismatch), "flip bit {bit} of word {word_pos}");
            }
        }
    }
}
