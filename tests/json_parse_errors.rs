//! Purpose: Regression coverage for strict body decoding and failure classification.
//! Exports: Integration tests only.
//! Role: Lock the client-visible message for every decode failure kind.
//! Invariants: Oversize bodies report the ceiling regardless of content.
//! Invariants: Failed decodes never touch the destination.

use bodyguard::api::{DecodeError, decode, decode_into};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Named {
    name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Inner {
    count: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Outer {
    inner: Inner,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Movie {
    title: String,
    year: i32,
    runtime: u8,
    genres: Vec<String>,
    rating: Option<f64>,
}

fn decode_named(input: &[u8]) -> Result<Named, DecodeError> {
    decode(input, 1024)
}

#[test]
fn oversize_bodies_report_the_ceiling_regardless_of_content() {
    let valid_array = format!("[{}]", vec!["1"; 64].join(","));
    let padded_object = format!("{{\"name\":\"a\"}}{}", " ".repeat(64));
    let garbage = "x".repeat(64);
    let unknown_key = format!("{{\"extra\":\"{}\"}}", "y".repeat(64));

    for input in [valid_array, padded_object, garbage, unknown_key] {
        let err = decode::<serde_json::Value, _>(input.as_bytes(), 16).unwrap_err();
        assert_eq!(err, DecodeError::BodyTooLarge { limit_bytes: 16 }, "{input}");
        assert_eq!(err.to_string(), "body must not be larger than 16 bytes");
    }
}

#[test]
fn body_exactly_at_the_ceiling_is_accepted() {
    let input = br#"{"name":"a"}"#;
    let named: Named = decode(&input[..], input.len() as u64).expect("decode");
    assert_eq!(named.name, "a");
}

#[test]
fn empty_and_whitespace_bodies_are_empty() {
    for input in [&b""[..], &b"  \r\n\t"[..]] {
        let err = decode_named(input).unwrap_err();
        assert_eq!(err, DecodeError::EmptyBody);
        assert_eq!(err.to_string(), "body must not be empty");
    }
}

#[test]
fn unknown_key_is_named_in_the_message() {
    let err = decode_named(br#"{"name": "a", "extra": 1}"#).unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnknownField {
            name: "extra".to_string()
        }
    );
    assert_eq!(err.to_string(), "body contains unknown key extra");
}

#[test]
fn nested_unknown_key_reports_the_key_itself() {
    let err = decode::<Outer, _>(&br#"{"inner":{"count":1,"bogus":true}}"#[..], 1024).unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnknownField {
            name: "bogus".to_string()
        }
    );
}

#[test]
fn earlier_unknown_key_wins_over_later_type_error() {
    let err = decode_named(br#"{"extra":1,"name":5}"#).unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnknownField {
            name: "extra".to_string()
        }
    );
}

#[test]
fn syntax_errors_win_over_unknown_keys() {
    let err = decode_named(br#"{"extra":1,"name":}"#).unwrap_err();
    assert!(matches!(err, DecodeError::MalformedSyntax { .. }), "{err:?}");
}

#[test]
fn wrong_type_names_the_field() {
    let err = decode_named(br#"{"name": 123}"#).unwrap_err();
    match &err {
        DecodeError::TypeMismatch { field, .. } => assert_eq!(field.as_deref(), Some("name")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        r#"body contains incorrect JSON type for field "name""#
    );
}

#[test]
fn nested_type_errors_report_the_full_path() {
    let err = decode::<Outer, _>(&br#"{"inner":{"count":"x"}}"#[..], 1024).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"body contains incorrect JSON type for field "inner.count""#
    );

    let err =
        decode::<Outer, _>(&br#"{"inner":{"count":1},"tags":["a",2]}"#[..], 1024).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"body contains incorrect JSON type for field "tags[1]""#
    );
}

#[test]
fn out_of_range_numbers_are_type_mismatches() {
    let input = br#"{"title":"x","year":2000,"runtime":300,"genres":[],"rating":null}"#;
    let err = decode::<Movie, _>(&input[..], 1024).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"body contains incorrect JSON type for field "runtime""#
    );
}

#[test]
fn concatenated_values_are_trailing_data() {
    let err = decode_named(br#"{"name":"a"}{"name":"b"}"#).unwrap_err();
    assert_eq!(err, DecodeError::TrailingData);
    assert_eq!(err.to_string(), "body must only contain a single JSON value");

    let err = decode_named(br#"{"name":"a"} x"#).unwrap_err();
    assert_eq!(err, DecodeError::TrailingData);
}

#[test]
fn trailing_whitespace_is_allowed() {
    let named = decode_named(b"{\"name\":\"a\"}\n\n  ").expect("decode");
    assert_eq!(named.name, "a");
}

#[test]
fn truncated_bodies_are_badly_formed() {
    for input in [&br#"{"name":"a""#[..], &br#"{"name":"#[..], &br#"{"na"#[..]] {
        let err = decode_named(input).unwrap_err();
        assert!(
            err.to_string().contains("badly-formed JSON"),
            "unexpected message: {err}"
        );
        assert!(matches!(
            err,
            DecodeError::UnexpectedTruncation | DecodeError::MalformedSyntax { .. }
        ));
    }

    assert_eq!(
        decode_named(br#"{"name":"a""#).unwrap_err(),
        DecodeError::UnexpectedTruncation
    );
}

#[test]
fn syntax_errors_carry_a_one_based_offset() {
    let err = decode_named(br#"{"name" "a"}"#).unwrap_err();
    assert_eq!(err, DecodeError::MalformedSyntax { offset: 9 });
    assert_eq!(
        err.to_string(),
        "body contains badly-formed JSON (at character 9)"
    );

    let err = decode_named(b"<html>").unwrap_err();
    assert_eq!(err, DecodeError::MalformedSyntax { offset: 1 });
}

#[test]
fn missing_fields_pass_through_unclassified() {
    let err = decode_named(b"{}").unwrap_err();
    match err {
        DecodeError::Unclassified { raw } => assert!(raw.contains("missing field `name`"), "{raw}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

struct ResetAfter {
    data: &'static [u8],
}

impl Read for ResetAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

#[test]
fn stream_read_errors_are_unclassified() {
    let reader = ResetAfter {
        data: br#"{"name":"#,
    };
    let err = decode::<Named, _>(reader, 1024).unwrap_err();
    assert_eq!(
        err,
        DecodeError::Unclassified {
            raw: "connection reset by peer".to_string()
        }
    );
}

#[test]
fn decode_into_only_writes_on_success() {
    let mut dst = Named {
        name: "original".to_string(),
    };

    let err = decode_into(&br#"{"name":"new","extra":true}"#[..], 1024, &mut dst).unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnknownField {
            name: "extra".to_string()
        }
    );
    assert_eq!(dst.name, "original");

    decode_into(&br#"{"name":"new"}"#[..], 1024, &mut dst).expect("decode");
    assert_eq!(dst.name, "new");
}

#[test]
fn decoding_is_idempotent_and_round_trips() {
    let input = br#"{"title":"Casablanca","year":1942,"runtime":102,"genres":["drama","romance"],"rating":8.5}"#;
    let first: Movie = decode(&input[..], 1024).expect("first");
    let second: Movie = decode(&input[..], 1024).expect("second");
    assert_eq!(first, second);

    let encoded = serde_json::to_vec(&first).expect("encode");
    let again: Movie = decode(encoded.as_slice(), 1024).expect("round trip");
    assert_eq!(again, first);
}

#[test]
fn deny_unknown_fields_types_agree_with_generic_detection() {
    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Strict {
        #[allow(dead_code)]
        name: String,
    }

    let strict = decode::<Strict, _>(&br#"{"name":"a","extra":1}"#[..], 1024).unwrap_err();
    let generic = decode_named(br#"{"name":"a","extra":1}"#).unwrap_err();
    assert_eq!(strict, generic);
}

#[test]
fn backticked_keys_are_named_the_same_by_both_detectors() {
    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Strict {
        #[allow(dead_code)]
        name: String,
    }

    let input = br#"{"name":"a","a`b":1}"#;
    let strict = decode::<Strict, _>(&input[..], 1024).unwrap_err();
    let generic = decode_named(input).unwrap_err();
    assert_eq!(
        strict,
        DecodeError::UnknownField {
            name: "a`b".to_string()
        }
    );
    assert_eq!(strict, generic);
}

#[test]
fn numbers_beyond_float_range_are_type_mismatches() {
    let input = br#"{"title":"x","year":2000,"runtime":90,"genres":[],"rating":1e400}"#;
    let err = decode::<Movie, _>(&input[..], 1024).unwrap_err();
    assert!(
        matches!(&err, DecodeError::TypeMismatch { field: Some(field), .. } if field == "rating"),
        "{err:?}"
    );
    assert_eq!(
        err.to_string(),
        r#"body contains incorrect JSON type for field "rating""#
    );
}

#[test]
fn earlier_unknown_key_wins_over_out_of_range_number() {
    let input = br#"{"extra":1,"title":"x","year":2000,"runtime":90,"genres":[],"rating":1e400}"#;
    let err = decode::<Movie, _>(&input[..], 1024).unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnknownField {
            name: "extra".to_string()
        }
    );
}

// Flattened fields buffer their keys inside serde, so leftovers are dropped
// without reaching the ignored-key hook. Request body types avoid flatten.
#[test]
fn flattened_destinations_accept_leftover_keys() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Flat {
        #[serde(flatten)]
        base: Named,
        year: i32,
    }

    let flat: Flat = decode(&br#"{"name":"a","year":1,"extra":2}"#[..], 1024).expect("decode");
    assert_eq!(
        flat,
        Flat {
            base: Named {
                name: "a".to_string()
            },
            year: 1
        }
    );
}
