//! # Hindsight Store
//!
//! Storage backends for the [`VectorStore`] and [`SessionLedger`] traits:
//! PostgreSQL + pgvector for production, and a brute-force in-memory backend
//! for tests and fixtures.
//!
//! [`VectorStore`]: hindsight_core::VectorStore
//! [`SessionLedger`]: hindsight_core::SessionLedger

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;
