//! `hindsight sessions` — List chat sessions.

use hindsight_config::AppConfig;
use hindsight_core::SessionLedger;
use hindsight_store::PgStore;

pub async fn run(include_archived: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_default().map_err(|e| format!("Failed to load config: {e}"))?;

    let store = PgStore::connect(&config.database_url).await?;
    let sessions = store.list_sessions(include_archived).await?;

    if sessions.is_empty() {
        println!("No sessions yet. Start one with POST /v1/chat.");
        return Ok(());
    }

    println!("💬 Sessions ({})", sessions.len());
    for s in sessions {
        let mut flags = String::new();
        if s.pinned {
            flags.push_str(" 📌");
        }
        if s.archived {
            flags.push_str(" [archived]");
        }
        println!(
            "  {}  {:>4} msgs  {}  {}{}",
            s.id,
            s.message_count,
            s.updated_at.format("%Y-%m-%d %H:%M"),
            s.title.as_deref().unwrap_or("(untitled)"),
            flags
        );
    }

    Ok(())
}
