// handlers/auth/mod.rs - Token and profile handlers

pub mod profile;  // GET/PUT/PATCH /auth
pub mod register; // POST /auth
pub mod token;    // GET/POST/PUT/DELETE /auth/token

pub use profile::{profile, profile_update};
pub use register::register;
pub use token::{token_create, token_delete, token_refresh, token_register};

use axum::{extract::ConnectInfo, http::HeaderMap};
use serde_json::Value;
use std::net::SocketAddr;

use crate::app::AppState;
use crate::database::store::{now_timestamp, Row};
use crate::database::DatabaseError;

/// Client address: first `X-Forwarded-For` hop, else the peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

/// Stamp `last_login_at`/`last_login_ip` on a successful sign-in
pub async fn record_login(state: &AppState, user: &Row, ip: Option<String>) -> Result<(), DatabaseError> {
    let Some(uuid) = user.get("uuid").and_then(Value::as_str) else {
        return Ok(());
    };
    let mut values = Row::new();
    values.insert("last_login_at".into(), now_timestamp());
    values.insert("last_login_ip".into(), ip.map(Value::String).unwrap_or(Value::Null));
    state.users.update(uuid, values).await?;
    Ok(())
}

#[cfg(test)]
mod tests;
