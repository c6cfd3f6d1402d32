//! LSP (Language Server Protocol) implementation layer
//!
//! This module handles communication with editors via LSP and turns analysis
//! reports into diagnostics and quick fixes.
//!
//! # Modules
//!
//! - [`backend`]: Main LSP backend implementing `LanguageServer` trait
//! - [`code_action`]: Converts planned fixes into code actions
//! - [`diagnostics`]: Renders analysis reports as diagnostics
//! - [`server`]: LSP server initialization and lifecycle

pub mod backend;
pub mod code_action;
pub mod diagnostics;
pub mod server;
