//! Purpose: Render JSON envelopes and error responses at the HTTP boundary.
//! Exports: `Envelope`, `RequestInfo`, `write_json`, `error_response` and status helpers.
//! Role: The only place route handlers turn errors into responses.
//! Invariants: Every error body is `{"error": <message>}`; internal details are only logged.
//! Invariants: A failed envelope write degrades to a bare 500 after logging.
//! Notes: Status/message pairs are a compatibility surface; change them additively.

use std::fmt;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::ser::SerializeMap;

pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";
pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";

/// Method and URI of the request being answered, kept for log correlation.
#[derive(Clone, Debug)]
pub struct RequestInfo {
    method: Method,
    uri: Uri,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

/// Single-key `{"<key>": value}` wrapper used for success and error bodies alike.
#[derive(Debug)]
pub struct Envelope<'a, T> {
    key: &'a str,
    value: T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn new(key: &'a str, value: T) -> Self {
        Self { key, value }
    }
}

impl<T: Serialize> Serialize for Envelope<'_, T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key, &self.value)?;
        map.end()
    }
}

/// Serializes `envelope` as the response body. Fails only if the value cannot
/// be represented as JSON.
pub fn write_json<T: Serialize>(
    status: StatusCode,
    envelope: &Envelope<'_, T>,
    headers: HeaderMap,
) -> Result<Response, serde_json::Error> {
    let mut body = serde_json::to_vec_pretty(envelope)?;
    body.push(b'\n');

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

pub fn log_error(request: &RequestInfo, err: &dyn fmt::Display) {
    tracing::error!(method = %request.method, uri = %request.uri, "{err}");
}

pub fn error_response<M: Serialize>(request: &RequestInfo, status: StatusCode, message: M) -> Response {
    match write_json(status, &Envelope::new("error", message), HeaderMap::new()) {
        Ok(response) => response,
        Err(err) => {
            log_error(request, &err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Logs `err` in full and answers with a generic 500.
pub fn server_error_response(request: &RequestInfo, err: &dyn fmt::Display) -> Response {
    log_error(request, err);
    error_response(request, StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
}

pub fn bad_request_response(request: &RequestInfo, err: &dyn fmt::Display) -> Response {
    error_response(request, StatusCode::BAD_REQUEST, err.to_string())
}

pub fn not_found_response(request: &RequestInfo) -> Response {
    error_response(request, StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
}

pub fn method_not_allowed_response(request: &RequestInfo) -> Response {
    let message = format!(
        "the {} method is not supported for this resource",
        request.method
    );
    error_response(request, StatusCode::METHOD_NOT_ALLOWED, message)
}
