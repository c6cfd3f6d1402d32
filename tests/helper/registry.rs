//! Registry and package-manager test doubles

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;

use dep_freshness_lsp::version::command::{CommandOutput, CommandRunner};
use dep_freshness_lsp::version::error::{CommandError, RegistryError};
use dep_freshness_lsp::version::registry::Registry;
use dep_freshness_lsp::version::types::{Advisory, Cvss, PackageVersions};

/// In-memory registry serving fixed versions and advisories
#[derive(Default)]
pub struct FakeRegistry {
    versions: HashMap<String, Vec<String>>,
    advisories: HashMap<String, Vec<Advisory>>,
    advisory_requests: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, package: &str, versions: Vec<&str>) -> Self {
        self.versions.insert(
            package.to_string(),
            versions.into_iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn with_advisory(mut self, package: &str, vulnerable_versions: &str, severity: &str) -> Self {
        self.advisories
            .entry(package.to_string())
            .or_default()
            .push(Advisory {
                id: Some(1096460),
                title: format!("Vulnerability in {package}"),
                url: "https://github.com/advisories/GHSA-jf85-cpcp-j695".to_string(),
                severity: severity.to_string(),
                vulnerable_versions: vulnerable_versions.to_string(),
                cvss: Cvss { score: 7.4 },
            });
        self
    }

    pub fn advisory_requests(&self) -> usize {
        self.advisory_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn fetch_all_versions(
        &self,
        package_name: &str,
    ) -> Result<PackageVersions, RegistryError> {
        match self.versions.get(package_name) {
            Some(versions) => Ok(PackageVersions::new(versions.clone())),
            None => Err(RegistryError::NotFound(package_name.to_string())),
        }
    }

    async fn fetch_advisories(
        &self,
        request: &IndexMap<String, Vec<String>>,
    ) -> Result<HashMap<String, Vec<Advisory>>, RegistryError> {
        self.advisory_requests.fetch_add(1, Ordering::SeqCst);
        Ok(request
            .keys()
            .filter_map(|name| Some((name.clone(), self.advisories.get(name)?.clone())))
            .collect())
    }
}

/// Package-manager stand-in answering `--version`, `ls` and `install`
pub struct FakeRunner {
    listing: String,
    available: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    /// `installed` lists `(name, version)` pairs reported by `ls`
    pub fn new(installed: &[(&str, &str)]) -> Self {
        let dependencies: serde_json::Map<String, serde_json::Value> = installed
            .iter()
            .map(|(name, version)| (name.to_string(), serde_json::json!({ "version": version })))
            .collect();
        Self {
            listing: serde_json::json!({ "name": "app", "dependencies": dependencies }).to_string(),
            available: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A machine where no package manager is installed
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(&[])
        }
    }

    /// Commands run so far, as `program arg...`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        _cwd: &Path,
        program: &str,
        args: Vec<String>,
    ) -> Result<CommandOutput, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")));

        Ok(match args.first().map(String::as_str) {
            Some("--version") if self.available => CommandOutput::ok("10.2.4\n"),
            Some("ls") => CommandOutput::ok(self.listing.clone()),
            Some("install") => CommandOutput::ok("added 1 package"),
            _ => CommandOutput::failed(""),
        })
    }
}
