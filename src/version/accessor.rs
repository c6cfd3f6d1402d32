//! Cached access to published versions, advisories and installed state

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::join_all;
use indexmap::IndexMap;
use semver::Version;
use tracing::{debug, info, warn};

use crate::config::{INSTALLED_CACHE_LIFETIME, SettingsHandle};
use crate::version::cache::{CacheStores, TtlEntry};
use crate::version::command::{CommandOutput, CommandRunner};
use crate::version::error::InstallError;
use crate::version::package_manager::{
    PNPM_LOCKFILE, PNPM_STORE_MARKER, PackageManager, is_version_probe_output,
    parse_installed_listing, parse_view_versions,
};
use crate::version::registry::Registry;
use crate::version::types::{Advisory, InstalledPackages, PackageVersions};

/// Resolves registry data and project state through the shared [`CacheStores`].
///
/// Fetches in flight are stored in the caches as shared futures, so callers
/// asking for the same key at the same time await a single external call.
#[derive(Clone)]
pub struct RegistryAccessor {
    registry: Arc<dyn Registry>,
    runner: Arc<dyn CommandRunner>,
    caches: Arc<CacheStores>,
    settings: SettingsHandle,
}

impl RegistryAccessor {
    pub fn new(
        registry: Arc<dyn Registry>,
        runner: Arc<dyn CommandRunner>,
        caches: Arc<CacheStores>,
        settings: SettingsHandle,
    ) -> Self {
        Self {
            registry,
            runner,
            caches,
            settings,
        }
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Returns every published version of `name`, sorted ascending.
    ///
    /// Falls back to `npm view` when the registry refuses or lacks the package.
    /// The outcome is cached for the configured lifetime, `None` included.
    pub async fn get_published_versions(&self, name: &str) -> Option<Arc<Vec<Version>>> {
        let lifetime = self.settings.snapshot().cache_lifetime();
        let fetch = self
            .caches
            .published
            .get_or_insert_with(name.to_string(), lifetime, || {
                let registry = Arc::clone(&self.registry);
                let runner = Arc::clone(&self.runner);
                let name = name.to_string();
                async move { fetch_published(registry.as_ref(), runner.as_ref(), &name).await }
                    .boxed()
                    .shared()
            });

        fetch.await
    }

    /// Detects which package manager drives the project at `root`.
    pub async fn get_package_manager(&self, root: &Path) -> PackageManager {
        let lifetime = self.settings.snapshot().cache_lifetime();
        let fetch = self
            .caches
            .package_managers
            .get_or_insert_with(root.to_path_buf(), lifetime, || {
                let accessor = self.clone();
                let root = root.to_path_buf();
                async move { Some(accessor.detect_package_manager(&root).await) }
                    .boxed()
                    .shared()
            });

        fetch.await.unwrap_or(PackageManager::None)
    }

    /// Lists the packages installed in the project at `root`.
    ///
    /// The outcome, failures included, is kept for a fixed hour or until the
    /// project is invalidated.
    pub async fn get_installed_versions(&self, root: &Path) -> Option<Arc<InstalledPackages>> {
        let fetch = self.caches.installed.get_or_insert_with(
            root.to_path_buf(),
            INSTALLED_CACHE_LIFETIME,
            || {
                let accessor = self.clone();
                let root = root.to_path_buf();
                async move { accessor.list_installed(&root).await }
                    .boxed()
                    .shared()
            },
        );

        fetch.await
    }

    /// Returns the advisories known for each of `names`.
    ///
    /// Packages without a valid cache entry are sent in one bulk request
    /// listing their stable published versions. Requested packages missing
    /// from the response are cached with no advisories. Packages whose
    /// entry could not be obtained are absent from the result.
    pub async fn get_advisories(&self, names: &[String]) -> HashMap<String, Arc<Vec<Advisory>>> {
        let lifetime = self.settings.snapshot().cache_lifetime();

        let mut stale: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !self.caches.advisories.contains_valid(*name, lifetime))
            .collect();
        stale.sort_unstable();
        stale.dedup();

        let published = join_all(stale.into_iter().map(|name| async move {
            (name, self.get_published_versions(name).await)
        }))
        .await;

        let request: IndexMap<String, Vec<String>> = published
            .into_iter()
            .filter_map(|(name, versions)| {
                let stable = versions?
                    .iter()
                    .filter(|version| version.pre.is_empty())
                    .map(ToString::to_string)
                    .collect();
                Some((name.to_string(), stable))
            })
            .collect();

        if !request.is_empty() {
            debug!("Requesting advisories for {} packages", request.len());
            match self.registry.fetch_advisories(&request).await {
                Ok(response) => {
                    for (name, advisories) in response {
                        self.caches.advisories.insert(name, Arc::new(advisories));
                    }
                    for name in request.keys() {
                        if !self.caches.advisories.contains_valid(name.as_str(), lifetime) {
                            self.caches.advisories.insert(name.clone(), Arc::default());
                        }
                    }
                }
                Err(e) => warn!("Failed to fetch advisories: {}", e),
            }
        }

        names
            .iter()
            .filter_map(|name| {
                self.caches
                    .advisories
                    .get(name.as_str())
                    .map(|advisories| (name.clone(), advisories))
            })
            .collect()
    }

    /// Runs the package manager's install command in `root` and drops the
    /// project's cached state afterwards.
    pub async fn install(&self, root: &Path) -> Result<CommandOutput, InstallError> {
        let manager = self.get_package_manager(root).await;
        let program = manager.program().ok_or(InstallError::NoPackageManager)?;

        info!("Running `{} install` in {:?}", program, root);
        let output = self
            .runner
            .run(root, program, PackageManager::install_args())
            .await;
        self.invalidate_project(root);

        Ok(output?)
    }

    /// Forgets the package manager and installed state cached for `root`.
    pub fn invalidate_project(&self, root: &Path) {
        debug!("Invalidating project state for {:?}", root);
        self.caches.package_managers.invalidate(root);
        self.caches.installed.invalidate(root);
    }

    async fn detect_package_manager(&self, root: &Path) -> PackageManager {
        let pnpm_layout = path_exists(&root.join(PNPM_STORE_MARKER)).await
            || path_exists(&root.join(PNPM_LOCKFILE)).await;

        let manager = if pnpm_layout && self.supports("pnpm", root).await {
            PackageManager::Pnpm
        } else if self.supports("npm", root).await {
            PackageManager::Npm
        } else {
            PackageManager::None
        };

        info!("Detected package manager {:?} for {:?}", manager, root);
        manager
    }

    /// Probes `<program> --version`, remembering every answer until the
    /// cache lifetime passes.
    async fn supports(&self, program: &str, cwd: &Path) -> bool {
        let lifetime = self.settings.snapshot().cache_lifetime();
        {
            let mut support = self.manager_support();
            if !support.is_valid(lifetime) {
                *support = TtlEntry::new(HashMap::new());
            } else if let Some(&known) = support.value().get(program) {
                return known;
            }
        }

        let supported = self
            .runner
            .run(cwd, program, vec!["--version".to_string()])
            .await
            .inspect_err(|e| debug!("{} is not available: {}", program, e))
            .is_ok_and(|output| output.success && is_version_probe_output(&output.stdout));

        self.manager_support()
            .value_mut()
            .insert(program.to_string(), supported);
        supported
    }

    fn manager_support(&self) -> MutexGuard<'_, TtlEntry<HashMap<String, bool>>> {
        self.caches
            .manager_support
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn list_installed(&self, root: &Path) -> Option<Arc<InstalledPackages>> {
        let manager = self.get_package_manager(root).await;
        let Some(program) = manager.program() else {
            debug!("No package manager for {:?}, installed state unknown", root);
            return None;
        };

        let output = self
            .runner
            .run(root, program, PackageManager::list_args())
            .await
            .inspect_err(|e| warn!("Failed to list installed packages in {:?}: {}", root, e))
            .ok()?;

        let installed = parse_installed_listing(&output.stdout);
        if installed.is_none() {
            warn!("Unreadable `{} ls` output in {:?}", program, root);
        }
        installed.map(Arc::new)
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn fetch_published(
    registry: &dyn Registry,
    runner: &dyn CommandRunner,
    name: &str,
) -> Option<Arc<Vec<Version>>> {
    let versions = match registry.fetch_all_versions(name).await {
        Ok(versions) if !versions.is_empty() => versions,
        Ok(_) => {
            info!("Registry listed no versions for {}, trying npm view", name);
            PackageVersions::new(view_versions(runner, name).await?)
        }
        Err(e) => {
            info!("Registry lookup for {} failed ({}), trying npm view", name, e);
            PackageVersions::new(view_versions(runner, name).await?)
        }
    };

    let mut versions = versions.parsed();
    versions.sort();
    Some(Arc::new(versions))
}

/// Asks the npm CLI, which honours the user's registry configuration
async fn view_versions(runner: &dyn CommandRunner, name: &str) -> Option<Vec<String>> {
    let args = ["view", "--json", name, "versions"].map(String::from).to_vec();
    let output = runner
        .run(Path::new("."), "npm", args)
        .await
        .inspect_err(|e| warn!("npm view failed for {}: {}", name, e))
        .ok()
        .filter(|output| output.success)?;

    let versions = parse_view_versions(&output.stdout);
    if versions.is_none() {
        warn!("Unreadable npm view output for {}", name);
    }
    versions
}
