use once_cell::sync::Lazy;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use sealed_id::{is_token_segment, Codec, Error, KeyMaterial};

static CODEC: Lazy<Codec> =
    Lazy::new(|| Codec::new("prop", &KeyMaterial::from_key([5u8; 32])).expect("codec"));
static OTHER_KEY: Lazy<Codec> =
    Lazy::new(|| Codec::new("prop", &KeyMaterial::from_key([6u8; 32])).expect("codec"));

const BASE64URL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn bytes_roundtrip(identifier in proptest::collection::vec(any::<u8>(), 0..256)) {
        let token = CODEC.encode_bytes(&identifier).expect("encode");
        prop_assert!(is_token_segment(&token));
        prop_assert_eq!(CODEC.decode_bytes(&token), Ok(identifier));
    }

    #[test]
    fn integer_roundtrip(id in any::<i64>()) {
        let token = CODEC.encode(&id).expect("encode");
        prop_assert_eq!(CODEC.decode::<i64>(&token), Ok(id));
    }

    #[test]
    fn string_roundtrip(id in "\\PC{0,64}") {
        let token = CODEC.encode(&id).expect("encode");
        prop_assert!(is_token_segment(&token));
        prop_assert_eq!(CODEC.decode::<String>(&token), Ok(id));
    }

    #[test]
    fn single_character_tampering_is_detected(
        id in any::<u64>(),
        position in any::<prop::sample::Index>(),
        replacement in any::<prop::sample::Index>(),
    ) {
        let token = CODEC.encode(&id).expect("encode");
        let body_start = CODEC.prefix().len();
        let index = body_start + position.index(token.len() - body_start);
        let original = token.as_bytes()[index];
        let mut candidate = BASE64URL[replacement.index(BASE64URL.len())];
        if candidate == original {
            candidate = if original == b'A' { b'B' } else { b'A' };
        }

        let mut tampered = token.into_bytes();
        tampered[index] = candidate;
        let tampered = String::from_utf8(tampered).expect("ascii");
        prop_assert_eq!(CODEC.decode::<u64>(&tampered), Err(Error::AuthenticationFailed));
    }

    #[test]
    fn other_key_rejects(id in any::<u64>()) {
        let token = CODEC.encode(&id).expect("encode");
        prop_assert_eq!(OTHER_KEY.decode::<u64>(&token), Err(Error::AuthenticationFailed));
    }

    #[test]
    fn foreign_characters_are_malformed(
        id in any::<u64>(),
        position in any::<prop::sample::Index>(),
        bad in prop::sample::select(vec!['/', '?', ' ', '\t', '\n', '%', '+', '.', '#', 'é']),
    ) {
        let token = CODEC.encode(&id).expect("encode");
        let index = position.index(token.len() + 1);
        let mut tampered = token.clone();
        tampered.insert(index, bad);
        prop_assert_eq!(CODEC.decode::<u64>(&tampered), Err(Error::Malformed));
    }
}
