//! Per-session append serialization.
//!
//! Concurrent chats against the same session must not interleave their
//! ledger appends. Each session gets one async mutex, held only across the
//! single append call; requests for different sessions never contend.

use hindsight_core::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The append mutex for one session, created on first use.
    ///
    /// Entries no request holds anymore (map holds the only `Arc`) are
    /// dropped on the way in, so the map tracks only in-flight sessions.
    pub fn for_session(&self, session_id: SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("session lock map poisoned");
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().expect("session lock map poisoned").len()
    }
}
