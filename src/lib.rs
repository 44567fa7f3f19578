//! Purpose: Library crate behind the `bodyguard` CLI, server and tests.
//! Exports: `api` (strict JSON body decoding, error envelopes, process errors).
//! Role: Request-body guard for JSON HTTP APIs built on axum.
//! Invariants: Everything public goes through `api`; other modules are internal.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
mod core;
mod http;
mod json;
