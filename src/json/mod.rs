//! Purpose: JSON decoding boundary for inbound request bodies.
//! Exports: `parse` module with the strict decoder and its error classification.
//! Role: Single seam for parser usage so callsites never map serde_json errors ad hoc.
//! Invariants: Every request body is decoded through `parse::decode_into` or `parse::decode`.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
