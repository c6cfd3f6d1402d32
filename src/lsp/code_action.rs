//! Code action generation for version updates and installs

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, Command, Diagnostic, Range, TextEdit, Url, WorkspaceEdit,
};

use crate::lsp::diagnostics::dependency_range;
use crate::parser::types::Dependency;
use crate::version::fixes::FixAction;

/// Command that runs the project's package manager install
pub const INSTALL_COMMAND: &str = "dep-freshness.install";

/// Returns true when the selection touches the declared range of `dependency`
pub fn selection_touches(selection: &Range, dependency: &Dependency) -> bool {
    let span = dependency_range(dependency);
    span.start <= selection.end && selection.start <= span.end
}

/// Converts a planned fix into an LSP code action on `uri`.
///
/// Diagnostics whose range overlaps one of the edits are attached so the
/// client can show the action as their fix.
pub fn to_code_action(action: &FixAction, uri: &Url, diagnostics: &[Diagnostic]) -> CodeAction {
    let edit = (!action.edits.is_empty()).then(|| {
        let text_edits: Vec<TextEdit> = action
            .edits
            .iter()
            .map(|edit| TextEdit {
                range: dependency_range(&edit.dependency),
                new_text: edit.new_text.clone(),
            })
            .collect();

        let mut changes = HashMap::new();
        changes.insert(uri.clone(), text_edits);
        WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }
    });

    let related: Vec<Diagnostic> = diagnostics
        .iter()
        .filter(|diagnostic| {
            action
                .edits
                .iter()
                .any(|edit| selection_touches(&diagnostic.range, &edit.dependency))
        })
        .cloned()
        .collect();

    CodeAction {
        title: action.title.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: (!related.is_empty()).then_some(related),
        edit,
        command: action.install.then(|| install_command(uri)),
        is_preferred: action.preferred.then_some(true),
        ..Default::default()
    }
}

fn install_command(uri: &Url) -> Command {
    Command {
        title: "Install packages".to_string(),
        command: INSTALL_COMMAND.to_string(),
        arguments: Some(vec![serde_json::Value::String(uri.to_string())]),
    }
}
