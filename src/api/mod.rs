//! Purpose: Define the stable public Rust API boundary for bodyguard.
//! Exports: Strict decoder, body size ceiling, HTTP responders and process errors.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path to decoder and responder internals.
//! Invariants: Internal modules remain private and are not directly exposed.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::limit::{LimitExceeded, LimitedReader};
pub use crate::http::body::read_json;
pub use crate::http::respond::{
    Envelope, NOT_FOUND_MESSAGE, RequestInfo, SERVER_ERROR_MESSAGE, bad_request_response,
    error_response, log_error, method_not_allowed_response, not_found_response,
    server_error_response, write_json,
};
pub use crate::json::parse::{
    DEFAULT_MAX_BODY_BYTES, DecodeError, DecoderMisuse, decode, decode_into,
};
