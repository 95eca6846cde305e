//! # Hindsight Retrieval
//!
//! The retrieval engine: semantic peek with time histograms, turn
//! hydration, and context budgeting. Everything here is read-only and
//! deterministic for fixed inputs against unchanged data — the agent loop
//! builds on these guarantees.

pub mod budget;
pub mod commands;
pub mod histogram;
pub mod hydrate;
pub mod peek;
pub mod token;

pub use budget::{BudgetCaps, BudgetOutcome, ExcludedTurn, ExclusionReason};
pub use commands::{
    parse_tool_call, tool_palette, ToolCommand, AGENT_DEFAULT_BIN_DAYS, HYDRATE_TOOL_NAME,
    PEEK_TOOL_NAME,
};
pub use hydrate::TurnHydrator;
pub use peek::{PeekEngine, PeekParams};
