//! Property tests for the word and hex codecs.

use proptest::prelude::*;

use skey::{words, Key};

proptest! {
    /// Every 64-bit value survives the six-word round trip.
    #[test]
    fn word_round_trip(bytes in any::<[u8; 8]>()) {
        let key = Key::from_bytes(bytes);
        let encoded = words::encode(key);
        prop_assert_eq!(words::decode(&encoded), Ok(key));
    }

    /// Every 64-bit value survives the hex round trip, grouped or not.
    #[test]
    fn hex_round_trip(bytes in any::<[u8; 8]>()) {
        let key = Key::from_bytes(bytes);
        prop_assert_eq!(Key::from_hex(&key.to_hex()), Ok(key));
        prop_assert_eq!(Key::from_hex(&key.to_hex_grouped()), Ok(key));
    }

    /// Corrupting one bit of one value-carrying word index is always
    /// caught: the flip moves a 2-bit group of the value by 1 or 2, so
    /// the sum mod 4 can never come back around.
    #[test]
    fn single_bit_corruption_is_detected(
        bytes in any::<[u8; 8]>(),
        word_pos in 0usize..5,
        bit in 0u32..11,
    ) {
        let key = Key::from_bytes(bytes);
        let mut encoded = words::encode(key);
        let index = skey::dict::DICTIONARY
            .iter()
            .position(|w| *w == encoded[word_pos])
            .unwrap();
        encoded[word_pos] = skey::dict::DICTIONARY[index ^ (1 << bit)];
        prop_assert_eq!(words::decode(&encoded), Err(skey::DecodeError::ChecksumMismatch));
    }

    /// Word decoding tolerates the caller's case.
    #[test]
    fn word_decode_is_case_insensitive(bytes in any::<[u8; 8]>()) {
        let key = Key::from_bytes(bytes);
        let lowered: Vec<String> = words::encode(key).iter().map(|w| w.to_ascii_lowercase()).collect();
        let tokens: [&str; 6] = [
            &lowered[0], &lowered[1], &lowered[2], &lowered[3], &lowered[4], &lowered[5],
        ];
        prop_assert_eq!(words::decode(&tokens), Ok(key));
    }
}
