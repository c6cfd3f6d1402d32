//! Registry trait for fetching package metadata and advisories

use std::collections::HashMap;

use indexmap::IndexMap;
#[cfg(test)]
use mockall::automock;

use crate::version::error::RegistryError;
use crate::version::types::{Advisory, PackageVersions};

/// Trait for fetching package data from a registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Fetches all published versions for a package
    ///
    /// # Returns
    /// * `Ok(PackageVersions)` - List of versions, ordered from oldest to newest
    /// * `Err(RegistryError)` - If the fetch fails or the registry refuses the package
    async fn fetch_all_versions(
        &self,
        package_name: &str,
    ) -> Result<PackageVersions, RegistryError>;

    /// Fetches advisories for many packages in one request
    ///
    /// # Arguments
    /// * `request` - Package name to the versions that should be checked
    ///
    /// # Returns
    /// Advisories keyed by package name. Packages without advisories may be absent.
    async fn fetch_advisories(
        &self,
        request: &IndexMap<String, Vec<String>>,
    ) -> Result<HashMap<String, Vec<Advisory>>, RegistryError>;
}
