use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, error, info, warn};

use crate::concurrency::CoalescingScheduler;
use crate::config::{ANALYSIS_COOLDOWN_MS, ANALYSIS_WAIT_MS, Settings, SettingsHandle};
use crate::lsp::code_action::{INSTALL_COMMAND, selection_touches, to_code_action};
use crate::lsp::diagnostics::report_diagnostics;
use crate::parser::package_json::PackageJsonParser;
use crate::parser::types::is_manifest_uri;
use crate::version::accessor::RegistryAccessor;
use crate::version::assembler::{AnalysisReport, Analyzer, ManifestDocument};
use crate::version::cache::CacheStores;
use crate::version::command::{CommandRunner, ProcessCommandRunner};
use crate::version::fixes::plan_fixes;
use crate::version::registries::NpmRegistry;
use crate::version::registry::Registry;

/// Files whose changes invalidate a project's package manager or installed state
const WATCHED_GLOBS: [&str; 4] = [
    "**/package.json",
    "**/package-lock.json",
    "**/pnpm-lock.yaml",
    "**/node_modules",
];

const WATCHED_FILES_REGISTRATION_ID: &str = "dep-freshness-watched-files";

type Shared<T> = Arc<Mutex<T>>;

pub struct Backend {
    client: Client,
    settings: SettingsHandle,
    analyzer: Analyzer,
    /// Client accepts dynamic registration of file watchers
    watch_files: AtomicBool,
    documents: Shared<HashMap<Url, String>>,
    reports: Shared<HashMap<Url, AnalysisReport>>,
    schedulers: Mutex<HashMap<Url, CoalescingScheduler<ManifestDocument>>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::build(
            client,
            Arc::new(NpmRegistry::default()),
            Arc::new(ProcessCommandRunner),
            Settings::default(),
        )
    }

    /// Build a Backend with a custom registry and command runner
    pub fn build(
        client: Client,
        registry: Arc<dyn Registry>,
        runner: Arc<dyn CommandRunner>,
        settings: Settings,
    ) -> Self {
        let settings = SettingsHandle::new(settings);
        let accessor = RegistryAccessor::new(
            registry,
            runner,
            Arc::new(CacheStores::default()),
            settings.clone(),
        );
        Self {
            client,
            settings,
            analyzer: Analyzer::new(accessor, Arc::new(PackageJsonParser::new())),
            watch_files: AtomicBool::new(false),
            documents: Arc::default(),
            reports: Arc::default(),
            schedulers: Mutex::default(),
        }
    }

    pub fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                },
            )),
            code_action_provider: Some(CodeActionProviderCapability::Options(
                CodeActionOptions {
                    code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                    ..Default::default()
                },
            )),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: vec![INSTALL_COMMAND.to_string()],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Stores the latest content of a manifest and queues its analysis
    fn schedule_analysis(&self, uri: Url, content: String) {
        let Some(project_root) = project_root(&uri) else {
            warn!("Cannot resolve project root of {}", uri);
            return;
        };

        lock(&self.documents).insert(uri.clone(), content.clone());

        let scheduler = lock(&self.schedulers)
            .entry(uri.clone())
            .or_insert_with(|| self.analysis_scheduler(uri))
            .clone();

        tokio::spawn(async move {
            scheduler
                .trigger(ManifestDocument {
                    project_root,
                    content,
                })
                .await;
        });
    }

    fn reanalyze_open_documents(&self) {
        let documents: Vec<(Url, String)> = lock(&self.documents)
            .iter()
            .map(|(uri, content)| (uri.clone(), content.clone()))
            .collect();

        info!("Re-analyzing {} open manifests", documents.len());
        for (uri, content) in documents {
            self.schedule_analysis(uri, content);
        }
    }

    fn analysis_scheduler(&self, uri: Url) -> CoalescingScheduler<ManifestDocument> {
        let client = self.client.clone();
        let analyzer = self.analyzer.clone();
        let documents = Arc::clone(&self.documents);
        let reports = Arc::clone(&self.reports);

        CoalescingScheduler::new(
            Duration::from_millis(ANALYSIS_WAIT_MS),
            Duration::from_millis(ANALYSIS_COOLDOWN_MS),
            move |document: ManifestDocument| {
                let client = client.clone();
                let analyzer = analyzer.clone();
                let documents = Arc::clone(&documents);
                let reports = Arc::clone(&reports);
                let uri = uri.clone();

                async move {
                    let report = analyzer.analyze(&document).await?;

                    if !lock(&documents).contains_key(&uri) {
                        debug!("{} was closed during analysis, dropping report", uri);
                        return Ok(());
                    }

                    let diagnostics = report_diagnostics(&report);
                    lock(&reports).insert(uri.clone(), report);

                    client
                        .log_message(
                            MessageType::LOG,
                            format!("Publishing {} diagnostics for {}", diagnostics.len(), uri),
                        )
                        .await;
                    client.publish_diagnostics(uri, diagnostics, None).await;
                    Ok(())
                }
            },
        )
    }

    fn register_file_watchers(&self) {
        let watchers = WATCHED_GLOBS
            .iter()
            .map(|glob| FileSystemWatcher {
                glob_pattern: GlobPattern::String(glob.to_string()),
                kind: None,
            })
            .collect();
        let options = DidChangeWatchedFilesRegistrationOptions { watchers };

        let registration = Registration {
            id: WATCHED_FILES_REGISTRATION_ID.to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(options)
                .inspect_err(|e| error!("Failed to encode watcher options: {}", e))
                .ok(),
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.register_capability(vec![registration]).await {
                warn!("Failed to register file watchers: {}", e);
            }
        });
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.client
            .log_message(MessageType::INFO, "LSP server initializing")
            .await;

        if let Some(options) = &params.initialization_options {
            self.settings.replace(Settings::from_value(options));
        }

        let dynamic_watchers = params
            .capabilities
            .workspace
            .as_ref()
            .and_then(|workspace| workspace.did_change_watched_files.as_ref())
            .and_then(|watched| watched.dynamic_registration)
            .unwrap_or(false);
        self.watch_files.store(dynamic_watchers, Ordering::Relaxed);

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "LSP server initialized")
            .await;

        if self.watch_files.load(Ordering::Relaxed) {
            self.register_file_watchers();
        } else {
            info!("Client does not support dynamic file watchers");
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.client
            .log_message(MessageType::INFO, "LSP server shutting down")
            .await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_manifest_uri(uri.as_str()) {
            return;
        }

        self.client
            .log_message(MessageType::LOG, format!("Document opened: {}", uri))
            .await;

        self.schedule_analysis(uri, params.text_document.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_manifest_uri(uri.as_str()) {
            return;
        }

        // With FULL sync mode, the last content change contains the full document text
        let Some(content) = params.content_changes.into_iter().last().map(|c| c.text) else {
            return;
        };

        self.client
            .log_message(MessageType::LOG, format!("Document changed: {}", uri))
            .await;

        self.schedule_analysis(uri, content);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_manifest_uri(uri.as_str()) {
            return;
        }

        let content = match params.text {
            Some(text) => Some(text),
            None => lock(&self.documents).get(&uri).cloned(),
        };
        if let Some(content) = content {
            self.schedule_analysis(uri, content);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;

        let was_open = lock(&self.documents).remove(&uri).is_some();
        lock(&self.reports).remove(&uri);
        lock(&self.schedulers).remove(&uri);

        if was_open {
            self.client.publish_diagnostics(uri, Vec::new(), None).await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let settings = Settings::from_value(&params.settings);
        info!("Configuration changed: {:?}", settings);
        self.settings.replace(settings);
        self.reanalyze_open_documents();
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in &params.changes {
            let Some(root) = project_root(&change.uri) else {
                continue;
            };
            self.analyzer.accessor().invalidate_project(&root);
        }
        self.reanalyze_open_documents();
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let Some(root) = project_root(&uri) else {
            return Ok(None);
        };
        let Some(report) = lock(&self.reports).get(&uri).cloned() else {
            debug!("No analysis available yet for {}", uri);
            return Ok(None);
        };

        let selection = params.range;
        let protection = self.settings.snapshot().major_update_protection;
        let fixes = plan_fixes(
            self.analyzer.accessor(),
            &root,
            &report,
            |dependency| selection_touches(&selection, dependency),
            protection,
        )
        .await;

        if fixes.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            fixes
                .iter()
                .map(|fix| {
                    CodeActionOrCommand::CodeAction(to_code_action(
                        fix,
                        &uri,
                        &params.context.diagnostics,
                    ))
                })
                .collect(),
        ))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        if params.command != INSTALL_COMMAND {
            warn!("Unknown command: {}", params.command);
            return Err(Error::method_not_found());
        }

        let Some(root) = params
            .arguments
            .first()
            .and_then(|argument| argument.as_str())
            .and_then(|uri| Url::parse(uri).ok())
            .and_then(|uri| project_root(&uri))
        else {
            return Err(Error::invalid_params("Expected the manifest URI"));
        };

        let (message_type, message) = match self.analyzer.accessor().install(&root).await {
            Ok(output) if output.success => {
                (MessageType::INFO, "Packages installed successfully.".to_string())
            }
            Ok(_) => (MessageType::ERROR, "Package installation failed.".to_string()),
            Err(e) => {
                error!("Install in {:?} failed: {}", root, e);
                (MessageType::ERROR, format!("Package installation failed: {e}"))
            }
        };
        self.client.show_message(message_type, message).await;

        self.reanalyze_open_documents();
        Ok(None)
    }
}

/// Directory holding the manifest or watched file at `uri`
fn project_root(uri: &Url) -> Option<PathBuf> {
    uri.to_file_path().ok()?.parent().map(Path::to_path_buf)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("file:///work/app/package.json", Some("/work/app"))]
    #[case("file:///work/app/node_modules", Some("/work/app"))]
    #[case("untitled:package.json", None)]
    fn project_root_returns_parent_directory(#[case] uri: &str, #[case] expected: Option<&str>) {
        let uri = Url::parse(uri).unwrap();
        assert_eq!(project_root(&uri), expected.map(PathBuf::from));
    }

    #[test]
    fn server_capabilities_advertise_install_command() {
        let capabilities = Backend::server_capabilities();

        assert_eq!(
            capabilities.execute_command_provider.unwrap().commands,
            vec![INSTALL_COMMAND.to_string()]
        );
        assert!(capabilities.code_action_provider.is_some());
    }
}
