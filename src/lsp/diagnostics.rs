//! Diagnostic rendering for analysis reports

use tower_lsp::lsp_types::{
    CodeDescription, Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, Url,
};

use crate::parser::types::Dependency;
use crate::version::advisory::Remediation;
use crate::version::assembler::{AdvisoryReport, AnalysisReport, DependencyReport};
use crate::version::checker::Classification;
use crate::version::types::Advisory;

const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Converts a report into diagnostics, classifications first then advisories
pub fn report_diagnostics(report: &AnalysisReport) -> Vec<Diagnostic> {
    report
        .classifications
        .iter()
        .filter_map(classification_diagnostic)
        .chain(report.advisories.iter().map(advisory_diagnostic))
        .collect()
}

/// Range covering the declared version text of `dependency`
pub fn dependency_range(dependency: &Dependency) -> Range {
    Range {
        start: Position {
            line: dependency.line as u32,
            character: dependency.column as u32,
        },
        end: Position {
            line: dependency.line as u32,
            character: dependency.end_column() as u32,
        },
    }
}

fn classification_diagnostic(report: &DependencyReport) -> Option<Diagnostic> {
    let name = &report.dependency.name;
    let (severity, message) = match &report.classification {
        Classification::InvalidRange => (
            DiagnosticSeverity::ERROR,
            "Invalid package version.".to_string(),
        ),
        Classification::Unpublished { .. } => (
            DiagnosticSeverity::ERROR,
            "Package version not available.".to_string(),
        ),
        Classification::NeedsInstall { version } => (
            DiagnosticSeverity::INFORMATION,
            format!(
                "Ready-to-install package \"{name}\" at version {version}. Just run your package manager install command."
            ),
        ),
        Classification::NeedsUpdate(target) => (
            DiagnosticSeverity::WARNING,
            format!(
                "Newer version of \"{name}\" is available: {}.",
                target.version
            ),
        ),
        Classification::Prerelease => (
            DiagnosticSeverity::INFORMATION,
            format!("Pre-release version of \"{name}\"."),
        ),
        Classification::AtMax | Classification::Satisfied => return None,
    };

    Some(create_diagnostic(&report.dependency, severity, message))
}

fn advisory_diagnostic(report: &AdvisoryReport) -> Diagnostic {
    let mut diagnostic = create_diagnostic(
        &report.dependency,
        DiagnosticSeverity::ERROR,
        advisory_message(&report.advisory, report.remediation.as_ref()),
    );
    diagnostic.code = report
        .advisory
        .id
        .map(|id| NumberOrString::String(id.to_string()));
    diagnostic.code_description = Url::parse(&report.advisory.url)
        .ok()
        .map(|href| CodeDescription { href });
    diagnostic
}

/// Advisory text: severity and score, then what the user can do about it
pub fn advisory_message(advisory: &Advisory, remediation: Option<&Remediation>) -> String {
    let mut message = format!(
        "Security advisory: this package version has a known flaw of level {}/{:.1}.",
        advisory.severity.to_uppercase(),
        advisory.cvss.score
    );

    match remediation {
        Some(Remediation::Upgrade(version)) => {
            message.push_str(&format!(" Please upgrade to version {version} or higher."));
        }
        Some(Remediation::Downgrade(version)) => {
            message.push_str(&format!(
                " No fix available yet. If possible, downgrade to version {version}."
            ));
        }
        None => message.push_str(" No fix available yet."),
    }

    message
}

fn create_diagnostic(
    dependency: &Dependency,
    severity: DiagnosticSeverity,
    message: String,
) -> Diagnostic {
    Diagnostic {
        range: dependency_range(dependency),
        severity: Some(severity),
        source: Some(PACKAGE_NAME.to_string()),
        message,
        ..Default::default()
    }
}
