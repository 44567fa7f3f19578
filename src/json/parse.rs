//! Purpose: Strictly decode one JSON request body into a typed destination.
//! Exports: `decode`, `decode_into`, `DecodeError`, `DecoderMisuse`, `DEFAULT_MAX_BODY_BYTES`.
//! Role: Parser boundary that turns serde_json failures into a closed set of client messages.
//! Invariants: Each call yields either a fully decoded value or exactly one `DecodeError`.
//! Invariants: The destination is only written after the whole body has been accepted.
//! Invariants: Oversize bodies report `BodyTooLarge` whatever else is wrong with them.
//! Notes: `DecoderMisuse` is a panic, never a `DecodeError`; it flags a bug in the caller.

use std::fmt;
use std::io::Read;

use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::core::limit::LimitedReader;

pub const DEFAULT_MAX_BODY_BYTES: u64 = 1_048_576;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("body contains badly-formed JSON (at character {offset})")]
    MalformedSyntax { offset: u64 },
    #[error("body contains badly-formed JSON")]
    UnexpectedTruncation,
    #[error("{}", type_mismatch_message(.field, .offset))]
    TypeMismatch { field: Option<String>, offset: u64 },
    #[error("body must not be empty")]
    EmptyBody,
    #[error("body contains unknown key {name}")]
    UnknownField { name: String },
    #[error("body must not be larger than {limit_bytes} bytes")]
    BodyTooLarge { limit_bytes: u64 },
    #[error("body must only contain a single JSON value")]
    TrailingData,
    #[error("{raw}")]
    Unclassified { raw: String },
}

impl DecodeError {
    /// Stable label for logs and metrics; never shown to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::MalformedSyntax { .. } => "malformed_syntax",
            DecodeError::UnexpectedTruncation => "unexpected_truncation",
            DecodeError::TypeMismatch { .. } => "type_mismatch",
            DecodeError::EmptyBody => "empty_body",
            DecodeError::UnknownField { .. } => "unknown_field",
            DecodeError::BodyTooLarge { .. } => "body_too_large",
            DecodeError::TrailingData => "trailing_data",
            DecodeError::Unclassified { .. } => "unclassified",
        }
    }
}

fn type_mismatch_message(field: &Option<String>, offset: &u64) -> String {
    match field {
        Some(field) => format!("body contains incorrect JSON type for field {field:?}"),
        None => format!("body contains incorrect JSON type (at character {offset})"),
    }
}

/// Contract violation by the calling code. Raised as a panic payload message
/// and deliberately not convertible into `DecodeError`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecoderMisuse {
    reason: &'static str,
}

impl fmt::Display for DecoderMisuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strict decoder misuse: {}", self.reason)
    }
}

impl std::error::Error for DecoderMisuse {}

fn misuse(reason: &'static str) -> ! {
    panic!("{}", DecoderMisuse { reason })
}

/// Decodes `reader` into `dst`, replacing it only on success.
///
/// `limit_bytes` must be positive; zero is a caller bug and panics.
pub fn decode_into<T, R>(reader: R, limit_bytes: u64, dst: &mut T) -> Result<(), DecodeError>
where
    T: DeserializeOwned,
    R: Read,
{
    *dst = decode(reader, limit_bytes)?;
    Ok(())
}

/// Decodes exactly one JSON value of type `T` from at most `limit_bytes` of `reader`.
///
/// Object keys the destination does not declare are rejected, whether or not
/// the type opts into `#[serde(deny_unknown_fields)]`.
///
/// Pass an unbuffered or `BufReader`-wrapped reader; offsets in errors count the
/// bytes pulled from it. A syntax offset is the offending byte. A root type
/// mismatch offset lands at the end of the rejected value, or one byte past it
/// when the parser had to look ahead (`  123` into a string reports 5).
///
/// Keys swallowed by a `#[serde(flatten)]` field are dropped by serde before
/// any ignored-key hook runs, so such destinations accept unknown keys. Avoid
/// flatten in request body types.
pub fn decode<T, R>(reader: R, limit_bytes: u64) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
    R: Read,
{
    if limit_bytes == 0 {
        misuse("body size limit must be greater than zero");
    }

    let mut reader = LimitedReader::new(reader, limit_bytes);
    let outcome = decode_one::<T, _>(&mut reader);
    outcome.map_err(|failure| classify(failure, &mut reader))
}

/// Raw failure before classification. Holds everything the parser reported.
enum Failure {
    Parse {
        err: serde_path_to_error::Error<serde_json::Error>,
        ignored: Option<String>,
    },
    Ignored(String),
    Trailing(serde_json::Error),
}

fn decode_one<T, R>(reader: &mut LimitedReader<R>) -> Result<T, Failure>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut json = serde_json::Deserializer::from_reader(reader);

    let mut ignored: Option<String> = None;
    let result = {
        let mut on_ignored = |path: serde_ignored::Path<'_>| {
            if ignored.is_none() {
                ignored = Some(ignored_key(&path));
            }
        };
        let de = serde_ignored::Deserializer::new(&mut json, &mut on_ignored);
        serde_path_to_error::deserialize::<_, T>(de)
    };
    let value = match (result, ignored) {
        (Err(err), ignored) => return Err(Failure::Parse { err, ignored }),
        (Ok(_), Some(name)) => return Err(Failure::Ignored(name)),
        (Ok(value), None) => value,
    };

    json.end().map_err(Failure::Trailing)?;
    Ok(value)
}

fn ignored_key(path: &serde_ignored::Path<'_>) -> String {
    match path {
        serde_ignored::Path::Map { key, .. } => key.to_string(),
        other => other.to_string(),
    }
}

/// Maps a raw failure onto the client-facing taxonomy. First match wins:
/// the size ceiling, then syntax, truncation and emptiness (which concern the
/// whole document), then the first unknown key, type mismatches, and finally
/// the parser's own message.
fn classify<R: Read>(failure: Failure, reader: &mut LimitedReader<R>) -> DecodeError {
    let offset = reader.consumed();
    let saw_content = reader.saw_content();
    if reader.drain_exceeds_limit() {
        return DecodeError::BodyTooLarge {
            limit_bytes: reader.limit_bytes(),
        };
    }

    match failure {
        Failure::Ignored(name) => DecodeError::UnknownField { name },
        Failure::Trailing(err) if err.is_io() => DecodeError::Unclassified {
            raw: err.to_string(),
        },
        Failure::Trailing(_) => DecodeError::TrailingData,
        Failure::Parse { err, ignored } => {
            let field = field_path(err.path());
            let err = err.into_inner();
            let message = err.to_string();
            let diagnostic = Diagnostic::read(&message);
            // Out-of-range numbers are well-formed JSON that does not fit the field.
            let category = match (err.classify(), &diagnostic) {
                (Category::Syntax, Diagnostic::TypeMismatch) => Category::Data,
                (category, _) => category,
            };
            match (category, ignored, diagnostic) {
                (Category::Syntax, _, _) => DecodeError::MalformedSyntax { offset },
                (Category::Eof, _, _) if saw_content => DecodeError::UnexpectedTruncation,
                (Category::Eof, _, _) => DecodeError::EmptyBody,
                (Category::Data, Some(name), _) => DecodeError::UnknownField { name },
                (Category::Data, None, Diagnostic::TypeMismatch) => {
                    DecodeError::TypeMismatch { field, offset }
                }
                (Category::Data, None, Diagnostic::UnknownField(name)) => {
                    DecodeError::UnknownField { name }
                }
                (Category::Data, None, Diagnostic::Other) | (Category::Io, _, _) => {
                    DecodeError::Unclassified { raw: message }
                }
            }
        }
    }
}

fn field_path(path: &serde_path_to_error::Path) -> Option<String> {
    if path.iter().next().is_none() {
        return None;
    }
    Some(path.to_string())
}

// Parser diagnostic adapter. Everything that depends on the wording of
// serde / serde_json error messages lives below this line.

#[derive(Debug, Eq, PartialEq)]
enum Diagnostic {
    TypeMismatch,
    UnknownField(String),
    Other,
}

impl Diagnostic {
    fn read(message: &str) -> Self {
        if is_type_mismatch(message) {
            return Diagnostic::TypeMismatch;
        }
        match unknown_field_name(message) {
            Some(name) => Diagnostic::UnknownField(name.to_string()),
            None => Diagnostic::Other,
        }
    }
}

fn is_type_mismatch(message: &str) -> bool {
    const PREFIXES: [&str; 5] = [
        "invalid type:",
        "invalid value:",
        "invalid length",
        "unknown variant",
        "number out of range",
    ];
    PREFIXES.iter().any(|prefix| message.starts_with(prefix))
}

/// Pulls the key name out of serde's `unknown field` diagnostic.
///
/// The key itself may contain backticks, so the name ends at the last
/// closing backtick that serde's own suffix follows.
pub(crate) fn unknown_field_name(message: &str) -> Option<&str> {
    const SUFFIXES: [&str; 2] = ["`, expected", "`, there are no fields"];
    let rest = message.strip_prefix("unknown field `")?;
    let end = SUFFIXES
        .iter()
        .filter_map(|suffix| rest.rfind(suffix))
        .max()?;
    Some(&rest[..end])
}
