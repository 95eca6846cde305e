//! # Hindsight Agent
//!
//! The multi-pass orchestration loop. A chat request resolves its session,
//! replays finalized history, and then alternates model rounds with tool
//! rounds (`peek` probes, `hydrate_turn` expansions under the context
//! budget) until the model streams a final answer. The finalized exchange is
//! persisted once, after the answer completes, and the stream closes with a
//! metadata event carrying the citation set.

pub mod locks;
pub mod orchestrator;
pub mod prompt;
pub mod state;

pub use locks::SessionLocks;
pub use orchestrator::Orchestrator;
pub use prompt::SYSTEM_PROMPT;
pub use state::{OrchestrationState, Phase};
