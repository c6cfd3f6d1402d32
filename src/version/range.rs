//! npm version range
//!
//! Supports the npm range grammar:
//! - `1.2.3`, `=1.2.3`, `v1.2.3` - exact match
//! - `^1.2.3` - compatible with version (>=1.2.3 <2.0.0, narrower for 0.x)
//! - `~1.2.3` - approximately equivalent (>=1.2.3 <1.3.0)
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `1.2.x`, `1.x`, `1`, `*`, `` - wildcards and partial versions
//! - `1.2.3 - 2.3.4` - hyphen ranges
//! - `>=1.0.0 <2.0.0` - whitespace joins comparators (AND)
//! - `^1.0.0 || ^2.0.0` - alternatives (OR)

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};

/// `>= 1.2.3` is written `>=1.2.3` before tokenizing
static OPERATOR_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(>=|<=|>|<|=|\^|~)\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Below every release and prerelease of the version's `major.minor.patch`
    Below,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, version: &Version) -> bool {
        let ordering = precedence(version, &self.version);
        match self.op {
            Op::Eq => ordering == Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
            Op::Below => triple(version) < triple(&self.version),
        }
    }
}

/// Semver precedence, ignoring build metadata
fn precedence(a: &Version, b: &Version) -> Ordering {
    triple(a).cmp(&triple(b)).then_with(|| a.pre.cmp(&b.pre))
}

fn triple(version: &Version) -> (u64, u64, u64) {
    (version.major, version.minor, version.patch)
}

/// A version where trailing parts may be missing or wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn parse(text: &str) -> Option<Self> {
        let text = text.strip_prefix('v').unwrap_or(text);
        if text.is_empty() {
            return None;
        }

        let without_build = text.split_once('+').map_or(text, |(head, _)| head);
        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return None;
        }

        let mut numbers = [None; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = match *part {
                "x" | "X" | "*" => break,
                digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                    Some(digits.parse::<u64>().ok()?)
                }
                _ => return None,
            };
        }

        let [major, minor, patch] = numbers;
        let pre = match pre {
            Some(pre) if patch.is_some() => Prerelease::new(pre).ok()?,
            Some(_) => return None,
            None => Prerelease::EMPTY,
        };

        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    /// Missing parts padded with zeros
    fn floor(&self) -> Version {
        Version {
            pre: self.pre.clone(),
            ..Version::new(
                self.major.unwrap_or(0),
                self.minor.unwrap_or(0),
                self.patch.unwrap_or(0),
            )
        }
    }

    fn full(&self) -> Option<Version> {
        self.patch.map(|_| self.floor())
    }

    /// First version past the wildcard part, e.g. `1.2.x` -> `1.3.0`
    fn next_step(&self) -> Option<Version> {
        match (self.major, self.minor) {
            (None, _) => None,
            (Some(major), None) => Some(Version::new(major + 1, 0, 0)),
            (Some(major), Some(minor)) => Some(Version::new(major, minor + 1, 0)),
        }
    }

    fn exact(&self) -> Vec<Comparator> {
        if let Some(version) = self.full() {
            return vec![Comparator::new(Op::Eq, version)];
        }
        self.wildcard()
    }

    fn wildcard(&self) -> Vec<Comparator> {
        match self.next_step() {
            Some(ceiling) => vec![
                Comparator::new(Op::Gte, self.floor()),
                Comparator::new(Op::Below, ceiling),
            ],
            None => vec![],
        }
    }

    fn caret(&self) -> Vec<Comparator> {
        let ceiling = match (self.major, self.minor, self.patch) {
            (None, _, _) => return vec![],
            (Some(0), Some(0), Some(patch)) => Version::new(0, 0, patch + 1),
            (Some(0), Some(minor), _) => Version::new(0, minor + 1, 0),
            (Some(major), _, _) => Version::new(major + 1, 0, 0),
        };
        vec![
            Comparator::new(Op::Gte, self.floor()),
            Comparator::new(Op::Below, ceiling),
        ]
    }

    fn tilde(&self) -> Vec<Comparator> {
        self.wildcard_at_minor()
            .unwrap_or_else(|| self.wildcard())
    }

    fn wildcard_at_minor(&self) -> Option<Vec<Comparator>> {
        let (major, minor) = (self.major?, self.minor?);
        Some(vec![
            Comparator::new(Op::Gte, self.floor()),
            Comparator::new(Op::Below, Version::new(major, minor + 1, 0)),
        ])
    }

    fn greater(&self) -> Vec<Comparator> {
        if let Some(version) = self.full() {
            return vec![Comparator::new(Op::Gt, version)];
        }
        match self.next_step() {
            Some(next) => vec![Comparator::new(Op::Gte, next)],
            None => vec![nothing()],
        }
    }

    fn at_least(&self) -> Vec<Comparator> {
        if self.major.is_none() {
            return vec![];
        }
        vec![Comparator::new(Op::Gte, self.floor())]
    }

    fn less(&self) -> Vec<Comparator> {
        if let Some(version) = self.full() {
            return vec![Comparator::new(Op::Lt, version)];
        }
        if self.major.is_none() {
            return vec![nothing()];
        }
        vec![Comparator::new(Op::Below, self.floor())]
    }

    fn at_most(&self) -> Vec<Comparator> {
        if let Some(version) = self.full() {
            return vec![Comparator::new(Op::Lte, version)];
        }
        match self.next_step() {
            Some(ceiling) => vec![Comparator::new(Op::Below, ceiling)],
            None => vec![],
        }
    }
}

fn nothing() -> Comparator {
    Comparator::new(Op::Below, Version::new(0, 0, 0))
}

/// Parsed npm range: alternatives of comparator sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmRange {
    sets: Vec<Vec<Comparator>>,
}

impl NpmRange {
    /// Parses a declared range. Returns `None` for text npm would reject.
    pub fn parse(text: &str) -> Option<Self> {
        let sets = text
            .split("||")
            .map(parse_set)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { sets })
    }

    /// npm satisfaction: prereleases only match a set that names a
    /// prerelease of the same `major.minor.patch`.
    pub fn satisfies(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| {
            set_matches(set, version)
                && (version.pre.is_empty()
                    || set.iter().any(|c| {
                        !c.version.pre.is_empty() && triple(&c.version) == triple(version)
                    }))
        })
    }

    /// Comparator test without the prerelease restriction
    pub fn contains(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| set_matches(set, version))
    }

    /// True when some alternative has no upper or lower bound at all (`*`, `x`, ``)
    pub fn is_unbounded(&self) -> bool {
        self.sets.iter().any(|set| set.is_empty())
    }

    /// Lowest version the range admits, `None` when it admits nothing
    pub fn min_version(&self) -> Option<Version> {
        self.sets.iter().filter_map(|set| set_min(set)).min_by(precedence)
    }
}

fn set_matches(set: &[Comparator], version: &Version) -> bool {
    set.iter().all(|c| c.matches(version))
}

fn set_min(set: &[Comparator]) -> Option<Version> {
    let mut candidates = vec![Version::new(0, 0, 0)];
    for comparator in set {
        match comparator.op {
            Op::Eq | Op::Gte => candidates.push(comparator.version.clone()),
            Op::Gt => candidates.push(successor(&comparator.version)),
            Op::Lt | Op::Lte | Op::Below => {}
        }
    }

    candidates
        .into_iter()
        .filter(|candidate| set_matches(set, candidate))
        .min_by(precedence)
}

/// Smallest version strictly greater than `version`
fn successor(version: &Version) -> Version {
    if version.pre.is_empty() {
        return Version::new(version.major, version.minor, version.patch + 1);
    }
    let pre = Prerelease::new(&format!("{}.0", version.pre)).unwrap_or_else(|_| version.pre.clone());
    Version {
        pre,
        ..Version::new(version.major, version.minor, version.patch)
    }
}

fn parse_set(text: &str) -> Option<Vec<Comparator>> {
    let text = OPERATOR_SPACE.replace_all(text.trim(), "$1");

    if let Some((from, to)) = text.split_once(" - ") {
        return parse_hyphen(from.trim(), to.trim());
    }

    let mut comparators = Vec::new();
    for token in text.split_whitespace() {
        comparators.extend(parse_token(token)?);
    }
    Some(comparators)
}

fn parse_hyphen(from: &str, to: &str) -> Option<Vec<Comparator>> {
    let from = parse_hyphen_bound(from)?;
    let to = parse_hyphen_bound(to)?;

    let mut comparators = from.at_least();
    comparators.extend(to.at_most());
    Some(comparators)
}

fn parse_hyphen_bound(text: &str) -> Option<Partial> {
    let text = text.strip_prefix('=').unwrap_or(text);
    Partial::parse(text)
}

fn parse_token(token: &str) -> Option<Vec<Comparator>> {
    const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "^", "~"];

    let (operator, rest) = OPERATORS
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token));
    let partial = Partial::parse(rest)?;

    Some(match operator {
        "^" => partial.caret(),
        "~" => partial.tilde(),
        ">" => partial.greater(),
        ">=" => partial.at_least(),
        "<" => partial.less(),
        "<=" => partial.at_most(),
        _ => partial.exact(),
    })
}
