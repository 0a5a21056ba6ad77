use super::*;

#[test]
fn decode_token_reverses_known_scheme_tokens() {
    assert_eq!(decode_token("62717277").expect("decode"), "http");
    assert_eq!(decode_token("6271727775").expect("decode"), "https");
    assert_eq!(decode_token("3866607a744d7762727f67713d716473").expect("decode"), "/chat_server.php");
}

#[test]
fn decode_token_accepts_uppercase_hex() {
    assert_eq!(decode_token("6271727775").expect("lower"), decode_token("6271727775".to_uppercase().as_str()).expect("upper"));
}

#[test]
fn decode_token_of_empty_token_is_empty() {
    assert_eq!(decode_token("").expect("decode"), "");
}

#[test]
fn decode_token_rejects_odd_length() {
    assert_eq!(decode_token("627").expect_err("odd"), CodecError::OddLength(3));
}

#[test]
fn decode_token_rejects_non_hex_characters() {
    assert_eq!(decode_token("62zz").expect_err("non-hex"), CodecError::InvalidHex('z'));
    assert!(matches!(decode_token("+f").expect_err("sign"), CodecError::InvalidHex('+')));
}

#[test]
fn encode_then_decode_returns_original_address() {
    let address = "https://chat.example.net/rooms/chat_server.php";
    let token = encode_token(address).expect("encode");
    assert_eq!(decode_token(&token).expect("decode"), address);
}

#[test]
fn encode_token_matches_known_vectors() {
    assert_eq!(encode_token("hello").expect("encode"), "62646c6d71");
    assert_eq!(encode_token("Hello, World!").expect("encode"), "42646c6d713e315a75736c6532");
}

#[test]
fn position_index_restarts_for_every_token() {
    // "://" at position 0 of its own token differs from "://" encoded mid-string.
    let alone = encode_token("://").expect("encode");
    let joined = encode_token("https://").expect("encode");
    assert_eq!(alone, "2d393a");
    assert!(!joined.ends_with(&alone));
}

#[test]
fn decoding_without_rot13_stage_yields_garbage_not_error() {
    let token = encode_token("https").expect("encode");
    let bytes = parse_hex(&token).expect("hex");
    let unmasked: String = bytes.iter().zip(position_keys()).map(|(b, k)| char::from(b ^ k)).collect();
    assert_eq!(unmasked, "uggcf");
    assert_ne!(unmasked, "https");
}

#[test]
fn rot13_preserves_case_and_non_letters() {
    assert_eq!(rot13("Hello, World! 123"), "Uryyb, Jbeyq! 123");
    assert_eq!(rot13(&rot13("MixedCase_/.php")), "MixedCase_/.php");
}

#[test]
fn encode_token_rejects_characters_outside_latin1() {
    assert_eq!(encode_token("caf\u{0107}").expect_err("wide"), CodecError::Unencodable('\u{0107}'));
}

#[test]
fn encode_token_handles_latin1_characters() {
    let token = encode_token("caf\u{e9}").expect("encode");
    assert_eq!(decode_token(&token).expect("decode"), "caf\u{e9}");
}

#[test]
fn encode_address_splits_into_requested_pieces() {
    let tokens = encode_address("https://relay.example.org", 5).expect("encode");
    assert_eq!(tokens.len(), 5);
    let joined: String = tokens.iter().map(|t| decode_token(t).expect("decode")).collect();
    assert_eq!(joined, "https://relay.example.org");
}

#[test]
fn encode_address_clamps_piece_count() {
    assert_eq!(encode_address("abc", 0).expect("encode").len(), 1);
    assert_eq!(encode_address("abc", 10).expect("encode").len(), 3);
    assert!(encode_address("", 3).expect("encode").is_empty());
}
