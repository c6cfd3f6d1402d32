use semver::Version;

use crate::config::BumpLevel;

/// Release bump needed to go from `from` to `to`.
///
/// Returns `None` unless `to` is newer. Prerelease-only differences count
/// as a patch bump.
pub fn release_bump(from: &Version, to: &Version) -> Option<BumpLevel> {
    if to <= from {
        return None;
    }

    Some(if to.major != from.major {
        BumpLevel::Major
    } else if to.minor != from.minor {
        BumpLevel::Minor
    } else {
        BumpLevel::Patch
    })
}

/// Highest candidate newer than `current` whose bump reaches `level`.
///
/// With `same_major`, only candidates sharing `current`'s major are considered.
pub fn latest_upgrade<'a>(
    current: &Version,
    candidates: impl IntoIterator<Item = &'a Version>,
    level: BumpLevel,
    same_major: bool,
) -> Option<&'a Version> {
    candidates
        .into_iter()
        .filter(|v| !same_major || v.major == current.major)
        .filter(|v| release_bump(current, v).is_some_and(|bump| bump >= level))
        .max()
}
