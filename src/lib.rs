pub mod appdb;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod security;

use std::sync::Arc;

use anyhow::Context;

use crate::appdb::AppDatabase;
use crate::config::GatewayConfig;
use crate::db::connectors::MySqlConnectorFactory;
use crate::db::translator::NaturalLanguageTranslator;
use crate::gateway::Gateway;
use crate::llm::{LlmClient, OpenAiClient};

/// Wire the gateway from configuration and serve HTTP until the listener fails.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let registry = AppDatabase::init(config.data_dir.clone())?;
    let settings = config.settings();

    let llm: Option<Arc<dyn LlmClient>> = match config.api_key() {
        Some(key) => {
            let client = OpenAiClient::new(
                key,
                config.openai_base_url.as_str(),
                config.openai_model.as_str(),
                config.llm_timeout(),
            )
            .context("Failed to build LLM client")?;
            log::info!("Natural-language queries enabled (model {})", client.model());
            let client: Arc<dyn LlmClient> = Arc::new(client);
            Some(client)
        }
        None => {
            log::warn!("OPENAI_API_KEY not set; natural-language queries are disabled");
            None
        }
    };

    let gateway = Gateway::new(
        Arc::new(registry),
        Arc::new(MySqlConnectorFactory),
        NaturalLanguageTranslator::new(llm, settings.guard),
        settings,
    );
    let app = commands::router(Arc::new(gateway));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    log::info!("Listening on http://{}", config.bind);

    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}
