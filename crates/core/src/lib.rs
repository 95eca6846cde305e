//! # Hindsight Core
//!
//! Domain types, traits, and error definitions for the Hindsight
//! conversation-archive engine. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (embedding gateway, chat-completion gateway,
//! vector store, session ledger) is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod gateway;
pub mod id;
pub mod message;
pub mod session;
pub mod store;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, GatewayError, LedgerError, Result, StoreError};
pub use event::ChatEvent;
pub use gateway::{
    ChatGateway, ChatRequest, ChatResponse, EmbeddingGateway, StreamChunk, ToolDefinition, Usage,
};
pub use id::{ConversationId, MessageId, SessionId, TurnId};
pub use message::{Message, MessageToolCall, Role};
pub use session::{PersistedExchange, SessionDetail, SessionMessage, SessionPatch, SessionSummary};
pub use store::{NeighborHit, SessionLedger, TurnFilter, TurnRecord, VectorStore};
pub use turn::{Histogram, HistogramBucket, HydratedTurn, PeekResult, TurnCandidate};
