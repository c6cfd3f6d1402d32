//! Parser trait definition

#[cfg(test)]
use mockall::automock;

use crate::parser::types::Dependency;

/// Trait for parsing manifest files
#[cfg_attr(test, automock)]
pub trait Parser: Send + Sync {
    /// Parse the content and extract the declared dependencies
    fn parse(&self, content: &str) -> Result<Vec<Dependency>, ParseError>;
}

/// Error type for parsing operations
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to parse the file structure
    #[error("Failed to parse file: {0}")]
    ParseFailed(String),

    /// Tree-sitter related error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),
}
