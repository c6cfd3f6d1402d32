//! Package-manager detection and installed-listing parsing

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::version::types::InstalledPackages;

/// Present when pnpm laid out `node_modules`
pub const PNPM_STORE_MARKER: &str = "node_modules/.pnpm";

pub const PNPM_LOCKFILE: &str = "pnpm-lock.yaml";

static PLAIN_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Npm,
    Pnpm,
    None,
}

impl PackageManager {
    pub fn program(&self) -> Option<&'static str> {
        match self {
            PackageManager::Npm => Some("npm"),
            PackageManager::Pnpm => Some("pnpm"),
            PackageManager::None => None,
        }
    }

    pub fn list_args() -> Vec<String> {
        ["ls", "--json", "--depth=0"].map(String::from).to_vec()
    }

    pub fn install_args() -> Vec<String> {
        vec!["install".to_string()]
    }
}

/// True when a `--version` probe printed a plain `x.y.z` version
pub fn is_version_probe_output(stdout: &str) -> bool {
    PLAIN_VERSION.is_match(stdout.trim_end())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Listing {
    dependencies: Option<serde_json::Map<String, serde_json::Value>>,
    dev_dependencies: Option<serde_json::Map<String, serde_json::Value>>,
    peer_dependencies: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Parses the output of `<pm> ls --json --depth=0`.
///
/// npm prints an object, pnpm an array of projects (the first one is used).
/// Some pnpm versions print warnings before the JSON, so when the whole
/// output does not parse, parsing is retried after each newline.
pub fn parse_installed_listing(stdout: &str) -> Option<InstalledPackages> {
    let value = parse_trailing_json(stdout)?;
    let project = match value {
        serde_json::Value::Array(mut projects) if !projects.is_empty() => projects.swap_remove(0),
        serde_json::Value::Object(_) => value,
        _ => return None,
    };

    let listing: Listing = serde_json::from_value(project)
        .inspect_err(|e| debug!("Unexpected listing shape: {}", e))
        .ok()?;

    let installed = [
        listing.dependencies,
        listing.dev_dependencies,
        listing.peer_dependencies,
    ]
    .into_iter()
    .flatten()
    .flatten()
    .filter_map(|(name, entry)| {
        let version = entry.get("version")?.as_str()?.to_string();
        Some((name, version))
    })
    .collect();

    Some(installed)
}

fn parse_trailing_json(stdout: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(stdout) {
        return Some(value);
    }

    stdout
        .match_indices('\n')
        .find_map(|(index, _)| serde_json::from_str(&stdout[index + 1..]).ok())
}

/// Parses `npm view --json <name> versions`, which prints a bare string when
/// only one version exists.
pub fn parse_view_versions(stdout: &str) -> Option<Vec<String>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match serde_json::from_str(stdout.trim()).ok()? {
        OneOrMany::One(version) => Some(vec![version]),
        OneOrMany::Many(versions) => Some(versions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10.2.4\n", true)]
    #[case("8.15.1", true)]
    #[case("10.2.4-beta.1", false)]
    #[case("command not found", false)]
    #[case("", false)]
    fn is_version_probe_output_accepts_plain_versions(#[case] stdout: &str, #[case] expected: bool) {
        assert_eq!(is_version_probe_output(stdout), expected);
    }

    #[test]
    fn parse_installed_listing_reads_npm_object() {
        let stdout = r#"{
            "name": "app",
            "dependencies": { "lodash": { "version": "4.17.21" } },
            "devDependencies": { "typescript": { "version": "5.3.3" } }
        }"#;

        let installed = parse_installed_listing(stdout).unwrap();

        assert_eq!(installed.len(), 2);
        assert_eq!(installed["lodash"], "4.17.21");
        assert_eq!(installed["typescript"], "5.3.3");
    }

    #[test]
    fn parse_installed_listing_reads_first_pnpm_project() {
        let stdout = r#"[
            {
                "name": "app",
                "dependencies": { "react": { "version": "18.2.0" } },
                "peerDependencies": { "react-dom": { "version": "18.2.0" } }
            },
            { "name": "other", "dependencies": { "vue": { "version": "3.4.0" } } }
        ]"#;

        let installed = parse_installed_listing(stdout).unwrap();

        assert_eq!(installed.len(), 2);
        assert_eq!(installed["react-dom"], "18.2.0");
        assert!(!installed.contains_key("vue"));
    }

    #[test]
    fn parse_installed_listing_skips_leading_warnings() {
        let stdout = "WARN  Issue while reading \"/app/.npmrc\"\nWARN another one\n{\"dependencies\":{\"lodash\":{\"version\":\"4.17.21\"}}}";

        let installed = parse_installed_listing(stdout).unwrap();

        assert_eq!(installed["lodash"], "4.17.21");
    }

    #[test]
    fn parse_installed_listing_treats_missing_sections_as_empty() {
        let installed = parse_installed_listing(r#"{ "name": "app" }"#).unwrap();

        assert!(installed.is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("npm ERR! code ENOENT")]
    #[case("[]")]
    #[case("42")]
    fn parse_installed_listing_rejects_unusable_output(#[case] stdout: &str) {
        assert_eq!(parse_installed_listing(stdout), None);
    }

    #[rstest]
    #[case(r#"["1.0.0", "1.0.1"]"#, Some(vec!["1.0.0", "1.0.1"]))]
    #[case("\"1.0.0\"\n", Some(vec!["1.0.0"]))]
    #[case("npm ERR! 404", None)]
    fn parse_view_versions_accepts_array_or_single_string(
        #[case] stdout: &str,
        #[case] expected: Option<Vec<&str>>,
    ) {
        let expected = expected.map(|versions| versions.into_iter().map(String::from).collect());
        assert_eq!(parse_view_versions(stdout), expected);
    }
}
