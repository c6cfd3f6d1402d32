//! Version classification for declared dependencies

use semver::Version;

use crate::config::{BumpLevel, Settings};
use crate::version::range::NpmRange;
use crate::version::semver::latest_upgrade;
use crate::version::types::InstalledVersion;

/// Configuration the classifier depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub level: BumpLevel,
    pub major_update_protection: bool,
}

impl From<&Settings> for ClassifyOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            level: settings.level,
            major_update_protection: settings.major_update_protection,
        }
    }
}

/// Suggested newer version for a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    pub version: Version,
    /// Target major exceeds the installed (or declared) major
    pub is_major: bool,
    /// Major update protection hid a newer major version
    pub excluded_major: bool,
    /// The target is what is installed already, only the manifest lags behind
    pub already_installed: bool,
}

/// Freshness state of one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Declared range is not a valid npm range
    InvalidRange,
    /// Nothing published satisfies the range. `target` is the published
    /// release to move to instead, if any.
    Unpublished {
        version: Version,
        target: Option<UpdateTarget>,
    },
    /// Manifest is fine but the installed copy is missing or outside the range
    NeedsInstall { version: Version },
    NeedsUpdate(UpdateTarget),
    /// The resolved version is the highest published one
    AtMax,
    /// Declared range pins a prerelease and nothing newer exists
    Prerelease,
    Satisfied,
}

/// Classifies a declared range against the published versions.
///
/// The current version is the lowest version the range admits. Newer
/// versions are upgrades when their bump from it reaches `options.level`.
/// Prereleases are only candidates when the current version is one.
pub fn classify(
    declared: &str,
    published: &[Version],
    installed: &InstalledVersion,
    options: ClassifyOptions,
) -> Classification {
    let Some(range) = NpmRange::parse(declared) else {
        return Classification::InvalidRange;
    };
    let Some(current) = range.min_version() else {
        return Classification::InvalidRange;
    };

    let allow_prerelease = !current.pre.is_empty();
    let candidates: Vec<&Version> = published
        .iter()
        .filter(|v| allow_prerelease || v.pre.is_empty())
        .collect();

    if !published.contains(&current) && !published.iter().any(|v| range.satisfies(v)) {
        return Classification::Unpublished {
            target: replacement(&current, &candidates, installed, options),
            version: current,
        };
    }

    let (target, excluded_major) = if range.is_unbounded() {
        (None, false)
    } else {
        let latest = latest_upgrade(&current, candidates.iter().copied(), options.level, false);
        let latest_same_major =
            latest_upgrade(&current, candidates.iter().copied(), options.level, true);
        match (options.major_update_protection, latest_same_major, latest) {
            (true, Some(same), Some(any)) => (Some(same), any.major != same.major),
            (_, _, any) => (any, false),
        }
    };

    if let Some(target) = target {
        return Classification::NeedsUpdate(update_target(
            target,
            &current,
            installed,
            excluded_major,
        ));
    }

    let install_needed = match installed {
        InstalledVersion::Unknown => false,
        InstalledVersion::Missing => true,
        InstalledVersion::Version(version) => !range.satisfies(version),
    };
    if install_needed {
        let version = candidates
            .iter()
            .copied()
            .filter(|v| range.satisfies(v))
            .max()
            .unwrap_or(&current);
        return Classification::NeedsInstall {
            version: version.clone(),
        };
    }

    if allow_prerelease {
        return Classification::Prerelease;
    }

    let resolved = installed.version().unwrap_or(&current);
    match candidates.iter().max() {
        Some(highest) if *highest > resolved => Classification::Satisfied,
        _ => Classification::AtMax,
    }
}

/// Highest published release for a range nothing satisfies. Under major
/// update protection the current major wins when it has releases.
fn replacement(
    current: &Version,
    candidates: &[&Version],
    installed: &InstalledVersion,
    options: ClassifyOptions,
) -> Option<UpdateTarget> {
    let latest = candidates.iter().copied().max()?;
    let same_major = candidates
        .iter()
        .copied()
        .filter(|v| v.major == current.major)
        .max();

    let (target, excluded_major) = match (options.major_update_protection, same_major) {
        (true, Some(same)) => (same, latest.major != same.major),
        _ => (latest, false),
    };
    Some(update_target(target, current, installed, excluded_major))
}

fn update_target(
    target: &Version,
    current: &Version,
    installed: &InstalledVersion,
    excluded_major: bool,
) -> UpdateTarget {
    let baseline = installed.version().unwrap_or(current);
    UpdateTarget {
        version: target.clone(),
        is_major: target.major > baseline.major,
        excluded_major,
        already_installed: installed.version() == Some(target),
    }
}
