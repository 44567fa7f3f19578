// Core modules: process errors and the body size ceiling.
pub mod error;
pub mod limit;
