//! Matching versions against security advisories

use semver::Version;
use tracing::debug;

use crate::version::range::NpmRange;
use crate::version::types::Advisory;

/// Nearest version not covered by any advisory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    Upgrade(Version),
    Downgrade(Version),
}

impl Remediation {
    pub fn version(&self) -> &Version {
        match self {
            Remediation::Upgrade(version) | Remediation::Downgrade(version) => version,
        }
    }

    pub fn is_downgrade(&self) -> bool {
        matches!(self, Remediation::Downgrade(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryMatch {
    pub advisory: Advisory,
    pub remediation: Option<Remediation>,
}

/// Finds the first advisory covering `version` and the closest clean version.
///
/// Clean versions are published stable versions no advisory covers. The
/// smallest clean version above `version` wins; failing that, the largest
/// clean version below it.
pub fn match_advisory(
    version: &Version,
    advisories: &[Advisory],
    published: &[Version],
) -> Option<AdvisoryMatch> {
    let ranges: Vec<(&Advisory, NpmRange)> = advisories
        .iter()
        .filter_map(|advisory| match NpmRange::parse(&advisory.vulnerable_versions) {
            Some(range) => Some((advisory, range)),
            None => {
                debug!(
                    "Ignoring advisory with unparseable range {:?}",
                    advisory.vulnerable_versions
                );
                None
            }
        })
        .collect();

    let (advisory, _) = ranges.iter().find(|(_, range)| range.contains(version))?;

    let clean: Vec<&Version> = published
        .iter()
        .filter(|v| v.pre.is_empty())
        .filter(|v| !ranges.iter().any(|(_, range)| range.satisfies(v)))
        .collect();

    let remediation = clean
        .iter()
        .filter(|v| **v > version)
        .min()
        .map(|v| Remediation::Upgrade((*v).clone()))
        .or_else(|| {
            clean
                .iter()
                .filter(|v| **v < version)
                .max()
                .map(|v| Remediation::Downgrade((*v).clone()))
        });

    Some(AdvisoryMatch {
        advisory: (*advisory).clone(),
        remediation,
    })
}
