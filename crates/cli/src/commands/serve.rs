//! `hindsight serve` — Start the HTTP API server.

use hindsight_agent::Orchestrator;
use hindsight_config::AppConfig;
use hindsight_core::{ChatGateway, EmbeddingGateway};
use hindsight_gateway::ApiState;
use hindsight_providers::{
    OpenAiChatGateway, OpenAiEmbeddingGateway, RetryingChatGateway, RetryingEmbeddingGateway,
};
use hindsight_retrieval::{PeekEngine, TurnHydrator};
use hindsight_store::PgStore;
use std::sync::Arc;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load_default().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let embedder = OpenAiEmbeddingGateway::new(
        config.embedding.provider.clone(),
        config.embedding.base_url.clone(),
        config.embedding.api_key.clone().unwrap_or_default(),
        config.embedding.model.clone(),
        config.embedding.dimension,
    )?;
    let embedder: Arc<dyn EmbeddingGateway> = Arc::new(RetryingEmbeddingGateway::new(
        Arc::new(embedder),
        config.retry.clone(),
    ));

    let chat = OpenAiChatGateway::new(
        config.chat.base_url.clone(),
        config.chat.api_key.clone().unwrap_or_default(),
    )?;
    let chat: Arc<dyn ChatGateway> = Arc::new(RetryingChatGateway::new(
        Arc::new(chat),
        config.retry.clone(),
    ));

    let peek = Arc::new(PeekEngine::new(
        embedder,
        store.clone(),
        config.retrieval.clone(),
    ));
    let hydrator = Arc::new(TurnHydrator::new(store.clone(), config.retrieval.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        chat,
        peek.clone(),
        hydrator.clone(),
        store.clone(),
        config.chat.clone(),
        config.retrieval.clone(),
        config.budget.clone(),
    ));

    let state = Arc::new(ApiState {
        peek,
        hydrator,
        orchestrator,
        ledger: store,
    });

    println!("🔎 Hindsight");
    println!(
        "   Listening: {}:{}",
        config.server.host, config.server.port
    );
    println!(
        "   Embedding: {} / {} ({} dims)",
        config.embedding.provider, config.embedding.model, config.embedding.dimension
    );
    println!("   Chat:      {}", config.chat.model);

    hindsight_gateway::serve(&config.server, state).await?;

    Ok(())
}
