//! Common types for parsers

use std::sync::LazyLock;

use regex::Regex;

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@[a-z0-9-*~][a-z0-9-*._~]*/)?[a-z0-9-~][a-z0-9-._~]*$").unwrap()
});

/// `scheme:` prefix such as `file:`, `git+ssh:` or `workspace:`
static PROTOCOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9+.-]*:").unwrap());

/// `user/repo` or `user/repo#ref`
static GITHUB_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+/[\w.-]+(?:#\S+)?$").unwrap());

/// Section of the manifest a dependency is declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// `dependencies`
    Direct,
    /// `devDependencies`
    Dev,
    /// `peerDependencies`
    Peer,
    /// `optionalDependencies`
    Optional,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::Direct,
        DependencyKind::Dev,
        DependencyKind::Peer,
        DependencyKind::Optional,
    ];

    /// Returns the manifest field name of the section
    pub fn field_name(&self) -> &'static str {
        match self {
            DependencyKind::Direct => "dependencies",
            DependencyKind::Dev => "devDependencies",
            DependencyKind::Peer => "peerDependencies",
            DependencyKind::Optional => "optionalDependencies",
        }
    }

    pub fn from_field_name(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.field_name() == field)
    }
}

/// Returns true when `uri` points at an npm manifest
pub fn is_manifest_uri(uri: &str) -> bool {
    uri.ends_with("/package.json")
}

/// A dependency declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Package name (e.g., "lodash", "@types/node")
    pub name: String,
    /// Version range as written, with any `npm:` alias prefix removed
    pub declared_range: String,
    pub kind: DependencyKind,
    /// Byte offset of the range in the source (start)
    pub start_offset: usize,
    /// Byte offset of the range in the source (end)
    pub end_offset: usize,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed)
    pub column: usize,
}

impl Dependency {
    /// Column right after the declared range
    pub fn end_column(&self) -> usize {
        self.column + (self.end_offset - self.start_offset)
    }

    pub fn is_name_valid(&self) -> bool {
        PACKAGE_NAME.is_match(&self.name)
    }

    /// Ranges with alternatives or several comparators are left alone
    pub fn is_range_complex(&self) -> bool {
        let range = self.declared_range.trim();
        range.contains("||") || range.contains(char::is_whitespace)
    }

    /// Directory paths, protocol URLs and GitHub shorthands
    pub fn is_range_ignorable(&self) -> bool {
        let range = self.declared_range.trim();
        ["./", "../", "~/", "/"]
            .iter()
            .any(|prefix| range.starts_with(prefix))
            || PROTOCOL.is_match(range)
            || GITHUB_SHORTHAND.is_match(range)
    }

    /// Whether the dependency takes part in version analysis at all
    pub fn is_analyzable(&self) -> bool {
        self.is_name_valid() && !self.is_range_complex() && !self.is_range_ignorable()
    }
}
