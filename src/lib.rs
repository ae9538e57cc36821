pub mod application;
pub mod domain;
pub mod infrastructure;

use application::background::BackgroundService;
use application::commands::AppState;
use application::host::Host;
use application::overlay::OverlayController;
use application::rule_sync::RuleSynchronizer;
use infrastructure::error::InfraError;
use infrastructure::gemini_client::ReqwestGeminiClient;
use infrastructure::logging::init_logging;
use infrastructure::page_fetcher::ReqwestPageFetcher;
use infrastructure::rule_engine::InMemoryRuleEngine;
use infrastructure::runtime::ChannelRuntime;
use std::sync::Arc;
use tokio::io::BufReader;

/// Boots the workspace in the current directory and serves the host protocol
/// on stdin/stdout until stdin closes.
pub async fn run() -> Result<(), InfraError> {
    let workspace_root = std::env::current_dir()?;
    let (runtime, runtime_events) = ChannelRuntime::new();
    let runtime = Arc::new(runtime);
    let app_state = Arc::new(AppState::new(workspace_root, runtime.clone())?);
    init_logging(&app_state.config().log_level)?;

    let config = app_state.config().clone();
    let preferences = app_state.preferences().clone();
    let synchronizer = RuleSynchronizer::new(Arc::new(InMemoryRuleEngine::default()), preferences.clone())
        .with_priority(config.rule_priority);
    let background = Arc::new(BackgroundService::new(
        preferences.clone(),
        synchronizer,
        runtime.clone(),
        runtime,
    ));

    let overlay = match ReqwestGeminiClient::from_config(&config.summarizer) {
        Ok(client) => Some(Arc::new(OverlayController::new(
            Arc::new(client),
            Arc::new(ReqwestPageFetcher::new()?),
            preferences.load_appearance()?,
        ))),
        Err(error) => {
            tracing::warn!(%error, "summarizer disabled; page summaries unavailable");
            None
        }
    };

    tracing::info!(
        app = %config.app_name,
        database = %app_state.database_path().display(),
        "starting host"
    );
    Host::new(app_state, background, overlay)
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), runtime_events)
        .await
}
