//! Shared helpers for integration tests

#![allow(dead_code, unused_imports)]

pub mod lsp;
pub mod registry;

pub use lsp::*;
pub use registry::*;
