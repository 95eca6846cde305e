//! `hindsight peek` — One-shot semantic search against the archive.

use hindsight_config::AppConfig;
use hindsight_core::EmbeddingGateway;
use hindsight_providers::{OpenAiEmbeddingGateway, RetryingEmbeddingGateway};
use hindsight_retrieval::{PeekEngine, PeekParams};
use hindsight_store::PgStore;
use std::sync::Arc;

pub async fn run(
    query: String,
    top_k: Option<usize>,
    bin_days: Option<u32>,
    snippets: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_default().map_err(|e| format!("Failed to load config: {e}"))?;

    let store = Arc::new(PgStore::connect(&config.database_url).await?);

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

    let engine = PeekEngine::new(embedder, store, config.retrieval.clone());

    let params = PeekParams {
        query: query.clone(),
        top_k,
        top_n_snippets: snippets,
        bin_days,
        ..Default::default()
    };
    let result = engine.peek(&params).await?;

    println!("🔍 \"{query}\" — {} matching turns", result.histogram.total);
    println!();

    if !result.histogram.buckets.is_empty() {
        let max_count = result
            .histogram
            .buckets
            .iter()
            .map(|b| b.count)
            .max()
            .unwrap_or(1)
            .max(1);
        println!(
            "Timeline ({}-day buckets):",
            result.histogram.bin_days
        );
        for bucket in &result.histogram.buckets {
            let bar_len = (bucket.count * 40).div_ceil(max_count);
            println!(
                "  {}  {:>5}  {}",
                bucket.start.format("%Y-%m-%d"),
                bucket.count,
                "█".repeat(bar_len)
            );
        }
        println!();
    }

    for (i, m) in result.matches.iter().enumerate() {
        let when = m
            .create_time
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".into());
        println!("{:>2}. [{:.3}] {}  turn {}", i + 1, m.score, when, m.turn_id);
        println!("    {}", m.user_snippet);
        if let Some(reply) = &m.assistant_snippet {
            println!("    ↳ {reply}");
        }
    }

    Ok(())
}
