pub mod concurrency;
pub mod config;
pub mod lsp;
pub mod parser;
pub mod version;
