//! Bulk-fix and install descriptors derived from an analysis report

use std::path::Path;

use semver::Version;

use crate::concurrency::any_of;
use crate::parser::types::Dependency;
use crate::version::accessor::RegistryAccessor;
use crate::version::assembler::AnalysisReport;
use crate::version::checker::{Classification, UpdateTarget};
use crate::version::types::InstalledVersion;

/// Replacement of one declared range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEdit {
    pub dependency: Dependency,
    pub version: Version,
    /// New range text, keeping the original operator
    pub new_text: String,
}

/// One quick fix offered to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixAction {
    pub title: String,
    pub edits: Vec<VersionEdit>,
    pub preferred: bool,
    /// Run the package manager install command after applying the edits
    pub install: bool,
}

/// Operator kept when a range is rewritten
pub fn version_prefix(range: &str) -> &str {
    let range = range.trim_start();
    [">=", "<=", "=", "^", "~"]
        .into_iter()
        .find(|prefix| range.starts_with(prefix))
        .unwrap_or("")
}

struct Fixable<'a> {
    dependency: &'a Dependency,
    target: &'a UpdateTarget,
}

impl Fixable<'_> {
    fn edit(&self) -> VersionEdit {
        VersionEdit {
            dependency: self.dependency.clone(),
            version: self.target.version.clone(),
            new_text: format!(
                "{}{}",
                version_prefix(&self.dependency.declared_range),
                self.target.version
            ),
        }
    }
}

/// Plans the quick fixes for the dependencies `is_selected` accepts.
///
/// Outdated and unpublished dependencies with a target are both fixable.
/// Update actions are flagged to run the install command when any of their
/// targets turns out to be installed already.
pub async fn plan_fixes(
    accessor: &RegistryAccessor,
    project_root: &Path,
    report: &AnalysisReport,
    is_selected: impl Fn(&Dependency) -> bool,
    major_update_protection: bool,
) -> Vec<FixAction> {
    let fixable: Vec<Fixable> = report
        .classifications
        .iter()
        .filter_map(|r| match &r.classification {
            Classification::NeedsUpdate(target)
            | Classification::Unpublished {
                target: Some(target),
                ..
            } => Some(Fixable {
                dependency: &r.dependency,
                target,
            }),
            _ => None,
        })
        .collect();

    let requires_install = report
        .classifications
        .iter()
        .filter(|r| matches!(r.classification, Classification::NeedsInstall { .. }))
        .filter(|r| is_selected(&r.dependency))
        .count();

    let selected: Vec<&Fixable> = fixable
        .iter()
        .filter(|f| is_selected(f.dependency))
        .collect();

    let mut actions = Vec::new();

    if !selected.is_empty() {
        let selected_count = if selected.len() == 1 {
            actions.push(single_update(selected[0], major_update_protection));
            1
        } else {
            let (kept, warning) = filter_majors(selected, major_update_protection);
            if kept.len() == 1 {
                actions.push(single_update(kept[0], major_update_protection));
            } else {
                actions.push(many_updates(
                    format!("Update {} selected packages{}", kept.len(), warning),
                    &kept,
                ));
            }
            kept.len()
        };

        if fixable.len() > 1 && fixable.len() > selected_count {
            let (kept, warning) = filter_majors(fixable.iter().collect(), major_update_protection);
            if kept.len() > selected_count {
                actions.push(many_updates(
                    format!("Update all {} packages{}", kept.len(), warning),
                    &kept,
                ));
            }
        }

        for action in &mut actions {
            action.install = any_target_installed(accessor, project_root, &action.edits).await;
        }
    }

    if requires_install > 0 {
        actions.push(install_action(requires_install));
    }

    actions
}

/// Drops major updates under protection when non-major ones remain
fn filter_majors<'a, 'b>(
    candidates: Vec<&'a Fixable<'b>>,
    protection: bool,
) -> (Vec<&'a Fixable<'b>>, &'static str) {
    if !protection {
        return (candidates, "");
    }
    let majors = candidates.iter().filter(|f| f.target.is_major).count();
    if majors == 0 {
        (candidates, "")
    } else if majors < candidates.len() {
        let kept = candidates.into_iter().filter(|f| !f.target.is_major).collect();
        (kept, " (excluding major)")
    } else {
        (candidates, " (major)")
    }
}

fn single_update(fixable: &Fixable, protection: bool) -> FixAction {
    let warning = if protection && fixable.target.is_major {
        " (major)"
    } else {
        ""
    };
    FixAction {
        title: format!(
            "Update \"{}\" to {}{}",
            fixable.dependency.name, fixable.target.version, warning
        ),
        edits: vec![fixable.edit()],
        preferred: true,
        install: false,
    }
}

fn many_updates(title: String, fixables: &[&Fixable]) -> FixAction {
    FixAction {
        title,
        edits: fixables.iter().map(|f| f.edit()).collect(),
        preferred: false,
        install: false,
    }
}

fn install_action(count: usize) -> FixAction {
    FixAction {
        title: if count == 1 {
            "Install package".to_string()
        } else {
            "Install packages".to_string()
        },
        edits: Vec::new(),
        preferred: false,
        install: true,
    }
}

async fn any_target_installed(
    accessor: &RegistryAccessor,
    project_root: &Path,
    edits: &[VersionEdit],
) -> bool {
    any_of(edits.iter().map(|edit| async move {
        let installed = accessor.get_installed_versions(project_root).await;
        InstalledVersion::lookup(installed.as_deref(), &edit.dependency.name).version()
            == Some(&edit.version)
    }))
    .await
}
