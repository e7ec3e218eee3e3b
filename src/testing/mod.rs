//! Fixtures shared by unit tests, integration tests and the in-memory server

use std::sync::Arc;

use crate::app::AppState;
use crate::config::AppConfig;
use crate::database::MemoryStore;

/// Deterministic v4-shaped uuid for fixture row `n`
pub fn fixture_uuid(n: i64) -> String {
    format!("00000000-0000-4000-8000-{:012}", n)
}

/// Development config over a memory store seeded with `users` rows
pub fn memory_state(users: i64) -> AppState {
    AppState::new(AppConfig::development(), Arc::new(MemoryStore::seeded_users(users)))
}
