//! Common types for the version layer

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};
use semver::Version;
use serde::Deserialize;

/// A fetch whose in-flight future is itself the cached value, so overlapping
/// callers await one shared outcome. `None` means the data was unavailable.
pub type SharedFetch<T> = Shared<BoxFuture<'static, Option<T>>>;

/// Installed package name to installed version, as reported by the package manager
pub type InstalledPackages = HashMap<String, String>;

/// Versions published for a package, sorted ascending by semver
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageVersions {
    pub versions: Vec<String>,
}

impl PackageVersions {
    pub fn new(versions: Vec<String>) -> Self {
        Self { versions }
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Parses every version, dropping the ones that are not valid semver
    pub fn parsed(&self) -> Vec<Version> {
        self.versions
            .iter()
            .filter_map(|v| Version::parse(v).ok())
            .collect()
    }
}

/// One known vulnerability record from the bulk advisory endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Advisory {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub severity: String,
    pub vulnerable_versions: String,
    #[serde(default)]
    pub cvss: Cvss,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Cvss {
    #[serde(default)]
    pub score: f64,
}

/// What is known about a dependency's installed copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledVersion {
    /// The listing failed or reported something that is not a version
    Unknown,
    /// The listing succeeded and does not include the package
    Missing,
    Version(Version),
}

impl InstalledVersion {
    pub fn lookup(installed: Option<&InstalledPackages>, name: &str) -> Self {
        let Some(installed) = installed else {
            return Self::Unknown;
        };
        match installed.get(name) {
            None => Self::Missing,
            Some(version) => Version::parse(version)
                .map(Self::Version)
                .unwrap_or(Self::Unknown),
        }
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Version(version) => Some(version),
            _ => None,
        }
    }
}
