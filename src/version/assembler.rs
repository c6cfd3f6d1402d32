//! Analysis of a whole manifest
//!
//! Runs the classifier over every analyzable dependency through a
//! [`ConcurrencyLimiter`], then matches advisories when enabled.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use semver::Version;
use tracing::{debug, info};

use crate::concurrency::ConcurrencyLimiter;
use crate::parser::traits::{ParseError, Parser};
use crate::parser::types::Dependency;
use crate::version::accessor::RegistryAccessor;
use crate::version::advisory::{Remediation, match_advisory};
use crate::version::checker::{Classification, ClassifyOptions, classify};
use crate::version::package_manager::PackageManager;
use crate::version::range::NpmRange;
use crate::version::types::{Advisory, InstalledPackages, InstalledVersion};

/// Manifest contents and the directory it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    pub project_root: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub dependency: Dependency,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryReport {
    pub dependency: Dependency,
    pub advisory: Advisory,
    pub remediation: Option<Remediation>,
}

/// Outcome of one analysis pass, in manifest order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisReport {
    pub classifications: Vec<DependencyReport>,
    pub advisories: Vec<AdvisoryReport>,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.classifications.is_empty() && self.advisories.is_empty()
    }
}

/// Drives classification and advisory matching for manifests
#[derive(Clone)]
pub struct Analyzer {
    accessor: RegistryAccessor,
    parser: Arc<dyn Parser>,
}

impl Analyzer {
    pub fn new(accessor: RegistryAccessor, parser: Arc<dyn Parser>) -> Self {
        Self { accessor, parser }
    }

    pub fn accessor(&self) -> &RegistryAccessor {
        &self.accessor
    }

    /// Analyzes one manifest.
    ///
    /// Dependencies whose registry data is unavailable are left out of the
    /// report. A project without a usable package manager yields an empty report.
    pub async fn analyze(&self, document: &ManifestDocument) -> Result<AnalysisReport, ParseError> {
        let root = &document.project_root;
        let settings = self.accessor.settings().snapshot();

        if self.accessor.get_package_manager(root).await == PackageManager::None {
            info!("No package manager available for {:?}, skipping analysis", root);
            return Ok(AnalysisReport::default());
        }

        let dependencies: Vec<Dependency> = self
            .parser
            .parse(&document.content)?
            .into_iter()
            .filter(|dependency| {
                let analyzable = dependency.is_analyzable();
                if !analyzable {
                    debug!(
                        "Skipping {}@{}: not analyzable",
                        dependency.name, dependency.declared_range
                    );
                }
                analyzable
            })
            .collect();

        let installed = self.accessor.get_installed_versions(root).await;
        let options = ClassifyOptions::from(&settings);
        let limiter = ConcurrencyLimiter::new(settings.parallel_processes_limit);

        let classifications: Vec<DependencyReport> = join_all(dependencies.iter().map(|dependency| {
            limiter.submit(self.classify_dependency(dependency, installed.as_deref(), options))
        }))
        .await
        .into_iter()
        .flatten()
        .collect();

        let advisories = if settings.identify_security_advisories {
            self.match_advisories(&dependencies, installed.as_deref()).await
        } else {
            Vec::new()
        };

        info!(
            "Analyzed {:?}: {} classified, {} advisories",
            root,
            classifications.len(),
            advisories.len()
        );

        Ok(AnalysisReport {
            classifications,
            advisories,
        })
    }

    async fn classify_dependency(
        &self,
        dependency: &Dependency,
        installed: Option<&InstalledPackages>,
        options: ClassifyOptions,
    ) -> Option<DependencyReport> {
        let declared = &dependency.declared_range;

        // Invalid ranges never need registry data
        let classification = if NpmRange::parse(declared).is_none() {
            Classification::InvalidRange
        } else {
            let Some(published) = self.accessor.get_published_versions(&dependency.name).await else {
                debug!("No published versions for {}, skipping", dependency.name);
                return None;
            };
            let installed = InstalledVersion::lookup(installed, &dependency.name);
            classify(declared, &published, &installed, options)
        };

        Some(DependencyReport {
            dependency: dependency.clone(),
            classification,
        })
    }

    async fn match_advisories(
        &self,
        dependencies: &[Dependency],
        installed: Option<&InstalledPackages>,
    ) -> Vec<AdvisoryReport> {
        let with_baseline: Vec<(&Dependency, Version)> = dependencies
            .iter()
            .filter_map(|dependency| {
                let installed = InstalledVersion::lookup(installed, &dependency.name);
                let baseline = match installed {
                    InstalledVersion::Version(version) => version,
                    _ => NpmRange::parse(&dependency.declared_range)?.min_version()?,
                };
                Some((dependency, baseline))
            })
            .collect();

        let names: Vec<String> = with_baseline
            .iter()
            .map(|(dependency, _)| dependency.name.clone())
            .collect();
        let advisories = self.accessor.get_advisories(&names).await;

        let mut reports = Vec::new();
        for (dependency, baseline) in with_baseline {
            let Some(known) = advisories.get(&dependency.name) else {
                continue;
            };
            if known.is_empty() {
                continue;
            }
            let published = self
                .accessor
                .get_published_versions(&dependency.name)
                .await
                .unwrap_or_default();

            if let Some(found) = match_advisory(&baseline, known, &published) {
                reports.push(AdvisoryReport {
                    dependency: dependency.clone(),
                    advisory: found.advisory,
                    remediation: found.remediation,
                });
            }
        }
        reports
    }
}
