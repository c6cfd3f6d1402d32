//! LSP E2E tests
//!
//! These tests verify the LSP protocol communication through tower-lsp's Service layer.
//! Uses a temporary project directory, a fake registry and a fake package manager.

mod helper;

use std::sync::Arc;

use tempfile::TempDir;
use tower::Service;
use tower_lsp::LspService;
use tower_lsp::lsp_types::*;

use dep_freshness_lsp::config::Settings;
use dep_freshness_lsp::lsp::backend::Backend;
use dep_freshness_lsp::lsp::code_action::INSTALL_COMMAND;
use helper::*;

const MANIFEST: &str = r#"{
  "dependencies": {
    "lodash": "^4.17.0",
    "react": "18.2.0"
  }
}"#;

fn registry() -> FakeRegistry {
    FakeRegistry::new()
        .with_versions("lodash", vec!["4.17.0", "4.17.21"])
        .with_versions("react", vec!["18.2.0"])
}

struct Harness {
    _project: TempDir,
    uri: String,
    service: LspService<Backend>,
    notifications: tokio::sync::mpsc::Receiver<tower_lsp::jsonrpc::Request>,
    runner: Arc<FakeRunner>,
}

async fn start(registry: FakeRegistry, installed: &[(&str, &str)]) -> Harness {
    let project = TempDir::new().unwrap();
    let uri = manifest_uri(project.path());
    let registry = Arc::new(registry);
    let runner = Arc::new(FakeRunner::new(installed));

    let (mut service, socket) = {
        let runner = runner.clone();
        LspService::build(move |client| {
            Backend::build(client, registry, runner, Settings::default())
        })
        .finish()
    };
    let notifications = spawn_notification_collector(socket);

    let init_response = service.call(create_initialize_request(1)).await.unwrap();
    assert!(init_response.is_some());
    service
        .call(create_initialized_notification())
        .await
        .unwrap();

    Harness {
        _project: project,
        uri,
        service,
        notifications,
        runner,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_open_publishes_update_and_install_diagnostics() {
    let mut harness = start(registry(), &[("lodash", "4.17.21")]).await;

    harness
        .service
        .call(create_did_open_notification(&harness.uri, MANIFEST))
        .await
        .unwrap();

    let params = wait_for_diagnostics(&mut harness.notifications).await;
    let summary: Vec<_> = params
        .diagnostics
        .iter()
        .map(|d| (d.range.start.line, d.severity, d.message.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (
                2,
                Some(DiagnosticSeverity::WARNING),
                "Newer version of \"lodash\" is available: 4.17.21."
            ),
            (
                3,
                Some(DiagnosticSeverity::INFORMATION),
                "Ready-to-install package \"react\" at version 18.2.0. Just run your package manager install command."
            ),
        ]
    );
    assert_eq!(
        params.diagnostics[0].range,
        Range {
            start: Position {
                line: 2,
                character: 15
            },
            end: Position {
                line: 2,
                character: 22
            },
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_open_publishes_security_advisory() {
    let registry = FakeRegistry::new()
        .with_versions("lodash", vec!["4.17.4", "4.17.12", "4.17.21"])
        .with_advisory("lodash", "<4.17.12", "high");
    let mut harness = start(registry, &[("lodash", "4.17.4")]).await;

    let content = r#"{
  "dependencies": {
    "lodash": "4.17.4"
  }
}"#;
    harness
        .service
        .call(create_did_open_notification(&harness.uri, content))
        .await
        .unwrap();

    let params = wait_for_diagnostics(&mut harness.notifications).await;
    let advisory = params
        .diagnostics
        .iter()
        .find(|d| d.severity == Some(DiagnosticSeverity::ERROR))
        .expect("Expected advisory diagnostic");
    assert_eq!(
        advisory.message,
        "Security advisory: this package version has a known flaw of level HIGH/7.4. Please upgrade to version 4.17.12 or higher."
    );
    assert_eq!(
        advisory.code_description.as_ref().map(|d| d.href.as_str()),
        Some("https://github.com/advisories/GHSA-jf85-cpcp-j695")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_change_republishes_diagnostics() {
    let mut harness = start(registry(), &[("lodash", "4.17.21"), ("react", "18.2.0")]).await;

    let current = r#"{
  "dependencies": {
    "lodash": "^4.17.21"
  }
}"#;
    harness
        .service
        .call(create_did_open_notification(&harness.uri, current))
        .await
        .unwrap();
    let params = wait_for_diagnostics(&mut harness.notifications).await;
    assert!(params.diagnostics.is_empty());

    harness
        .service
        .call(create_did_change_notification(&harness.uri, MANIFEST, 2))
        .await
        .unwrap();
    let params = wait_for_diagnostics(&mut harness.notifications).await;
    assert_eq!(params.diagnostics.len(), 1);
    assert_eq!(
        params.diagnostics[0].message,
        "Newer version of \"lodash\" is available: 4.17.21."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_code_action_offers_update_with_install() {
    let mut harness = start(registry(), &[("lodash", "4.17.21")]).await;

    harness
        .service
        .call(create_did_open_notification(&harness.uri, MANIFEST))
        .await
        .unwrap();
    wait_for_diagnostics(&mut harness.notifications).await;

    let response = harness
        .service
        .call(create_code_action_request(2, &harness.uri, 2, 17))
        .await
        .unwrap()
        .expect("Expected codeAction response");
    let (_, result) = response.into_parts();
    let actions: CodeActionResponse = serde_json::from_value(result.unwrap()).unwrap();

    assert_eq!(actions.len(), 1);
    let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
        panic!("Expected a code action");
    };
    assert_eq!(action.title, "Update \"lodash\" to 4.17.21");
    assert_eq!(action.is_preferred, Some(true));

    let changes = action.edit.as_ref().unwrap().changes.as_ref().unwrap();
    let edits = &changes[&harness.uri.parse::<Url>().unwrap()];
    assert_eq!(edits[0].new_text, "^4.17.21");

    let command = action.command.as_ref().expect("Expected install command");
    assert_eq!(command.command, INSTALL_COMMAND);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_execute_install_runs_package_manager() {
    let mut harness = start(registry(), &[("lodash", "4.17.21")]).await;

    harness
        .service
        .call(create_did_open_notification(&harness.uri, MANIFEST))
        .await
        .unwrap();
    wait_for_diagnostics(&mut harness.notifications).await;

    harness
        .service
        .call(create_execute_command_request(
            3,
            INSTALL_COMMAND,
            vec![serde_json::json!(harness.uri)],
        ))
        .await
        .unwrap();

    let notification = wait_for_notification(&mut harness.notifications, "window/showMessage")
        .await
        .expect("Expected showMessage notification");
    let params: ShowMessageParams =
        serde_json::from_value(notification.params().unwrap().clone()).unwrap();
    assert_eq!(params.typ, MessageType::INFO);
    assert_eq!(params.message, "Packages installed successfully.");
    assert!(harness.runner.calls().contains(&"npm install".to_string()));

    // The manifest is analyzed again after the install
    wait_for_diagnostics(&mut harness.notifications).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_configuration_change_disables_advisories() {
    let registry = FakeRegistry::new()
        .with_versions("lodash", vec!["4.17.4", "4.17.12"])
        .with_advisory("lodash", "<4.17.12", "moderate");
    let mut harness = start(registry, &[("lodash", "4.17.4")]).await;

    let content = r#"{
  "devDependencies": {
    "lodash": "~4.17.4"
  }
}"#;
    harness
        .service
        .call(create_did_open_notification(&harness.uri, content))
        .await
        .unwrap();
    let params = wait_for_diagnostics(&mut harness.notifications).await;
    assert_eq!(params.diagnostics.len(), 2);

    harness
        .service
        .call(create_did_change_configuration_notification(
            serde_json::json!({ "depFreshness": { "identifySecurityAdvisories": false } }),
        ))
        .await
        .unwrap();

    let params = wait_for_diagnostics(&mut harness.notifications).await;
    assert_eq!(params.diagnostics.len(), 1);
    assert_eq!(
        params.diagnostics[0].severity,
        Some(DiagnosticSeverity::WARNING)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_watched_file_change_refreshes_installed_state() {
    let mut harness = start(registry(), &[("lodash", "4.17.21")]).await;

    harness
        .service
        .call(create_did_open_notification(&harness.uri, MANIFEST))
        .await
        .unwrap();
    wait_for_diagnostics(&mut harness.notifications).await;
    let listings_before = harness
        .runner
        .calls()
        .iter()
        .filter(|call| call.starts_with("npm ls"))
        .count();

    harness
        .service
        .call(create_did_change_watched_files_notification(&harness.uri))
        .await
        .unwrap();
    wait_for_diagnostics(&mut harness.notifications).await;

    let listings_after = harness
        .runner
        .calls()
        .iter()
        .filter(|call| call.starts_with("npm ls"))
        .count();
    assert_eq!(listings_after, listings_before + 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_close_clears_diagnostics() {
    let mut harness = start(registry(), &[("lodash", "4.17.21")]).await;

    harness
        .service
        .call(create_did_open_notification(&harness.uri, MANIFEST))
        .await
        .unwrap();
    let params = wait_for_diagnostics(&mut harness.notifications).await;
    assert!(!params.diagnostics.is_empty());

    harness
        .service
        .call(create_did_close_notification(&harness.uri))
        .await
        .unwrap();
    let params = wait_for_diagnostics(&mut harness.notifications).await;
    assert!(params.diagnostics.is_empty());
}
