//! Version management layer for dependency freshness and advisories
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│  Accessor   │◀────│  Assembler  │
//! │ (npm, cli)  │     │ (ttl cache) │     │  (analyze)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                           │         │
//!                                           ▼         ▼
//!                                   ┌──────────┐ ┌──────────┐
//!                                   │ Checker  │ │ Advisory │
//!                                   │(classify)│ │ (match)  │
//!                                   └──────────┘ └──────────┘
//! ```
//!
//! # Modules
//!
//! - [`accessor`]: Cached published versions, advisories and project state
//! - [`advisory`]: Advisory matching and remediation search
//! - [`assembler`]: Whole-manifest analysis producing an `AnalysisReport`
//! - [`cache`]: TTL entries and the keyed cache stores
//! - [`checker`]: Version classification of a declared range
//! - [`command`]: Package-manager subprocess execution
//! - [`error`]: Error types for registry and command operations
//! - [`fixes`]: Quick-fix descriptors for updates and installs
//! - [`package_manager`]: Package-manager detection and output parsing
//! - [`range`]: npm version range grammar
//! - [`registry`]: Registry trait for fetching versions and advisories
//! - [`registries`]: Concrete registry implementations
//! - [`semver`]: Bump classification between versions
//! - [`types`]: Common types like `PackageVersions` and `Advisory`

pub mod accessor;
pub mod advisory;
pub mod assembler;
pub mod cache;
pub mod checker;
pub mod command;
pub mod error;
pub mod fixes;
pub mod package_manager;
pub mod range;
pub mod registries;
pub mod registry;
pub mod semver;
pub mod types;
