//! Token issuance and verification for API users.
//!
//! Tokens are HS256 JWTs whose subject is the user uuid. Revoked tokens are
//! remembered by SHA-256 digest until they would have expired anyway.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::manager::DatabaseError;
use crate::database::store::Row;
use crate::database::Repository;
use crate::validation::is_email;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token not provided")]
    MissingToken,

    #[error("Token is invalid")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("user or password is invalid")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token encoding failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User uuid
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Body of every token response
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Numeric logins are phones, email-shaped ones are emails
    pub fn login_column(&self) -> &'static str {
        let username = self.username.trim();
        if !username.is_empty() && username.parse::<f64>().is_ok() {
            "phone"
        } else if is_email(username) {
            "email"
        } else {
            "username"
        }
    }
}

pub struct Auth {
    users: Repository,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
    remember_ttl_minutes: i64,
    // digest -> exp
    revoked: Mutex<HashMap<String, i64>>,
}

impl Auth {
    pub fn new(users: Repository, security: &SecurityConfig) -> Self {
        Self {
            users,
            encoding_key: EncodingKey::from_secret(security.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(security.jwt_secret.as_bytes()),
            ttl_minutes: security.jwt_ttl_minutes,
            remember_ttl_minutes: security.jwt_remember_ttl_minutes,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    /// Check credentials and issue a token for the matching live user
    pub async fn attempt(&self, credentials: &Credentials, remember: bool) -> Result<(AccessToken, Row), AuthError> {
        let column = credentials.login_column();
        let user = self
            .users
            .select_by(column, credentials.username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user.get("password").and_then(|v| v.as_str()).unwrap_or_default();
        if !verify_password(&credentials.password, hash) {
            debug!("Rejected login by {}", column);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.login(&user, remember)?;
        Ok((token, user))
    }

    /// Issue a token for a user without checking a password
    pub fn login(&self, user: &Row, remember: bool) -> Result<AccessToken, AuthError> {
        let uuid = user
            .get(self.users.descriptor().key_column)
            .and_then(|v| v.as_str())
            .ok_or(AuthError::UserNotFound)?;
        let minutes = if remember { self.remember_ttl_minutes } else { self.ttl_minutes };
        self.issue(uuid, minutes * 60)
    }

    /// Revoke `token` and issue a fresh one with the same lifetime
    pub fn refresh(&self, token: &str) -> Result<AccessToken, AuthError> {
        let claims = self.decode(token)?;
        self.revoke(token, claims.exp);
        self.issue(&claims.sub, claims.exp - claims.iat)
    }

    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.decode(token)?;
        self.revoke(token, claims.exp);
        info!("Token revoked for {}", claims.sub);
        Ok(())
    }

    /// Live user the token was issued to
    pub async fn current_user(&self, token: &str) -> Result<Row, AuthError> {
        let claims = self.decode(token)?;
        self.users.select_one(&claims.sub).await?.ok_or(AuthError::UserNotFound)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        if self.is_revoked(token) {
            return Err(AuthError::RevokedToken);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })?;
        Ok(data.claims)
    }

    fn issue(&self, subject: &str, lifetime_seconds: i64) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(lifetime_seconds)).timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encode(e.to_string()))?;
        Ok(AccessToken { access_token, token_type: "bearer", expires_in: lifetime_seconds })
    }

    fn revoke(&self, token: &str, exp: i64) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked.retain(|_, expires| *expires > now);
        revoked.insert(token_digest(token), exp);
    }

    fn is_revoked(&self, token: &str) -> bool {
        let revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked.contains_key(&token_digest(token))
    }
}

fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// False for a wrong password and for an unparsable hash
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::memory::MemoryStore;
    use crate::database::models::USER_RESOURCE;
    use crate::testing::fixture_uuid;
    use std::sync::Arc;

    fn auth() -> Auth {
        let repo = Repository::new(&USER_RESOURCE, Arc::new(MemoryStore::seeded_users(3)));
        Auth::new(repo, &AppConfig::development().security)
    }

    fn credentials(username: &str, password: &str) -> Credentials {
        Credentials { username: username.to_string(), password: password.to_string() }
    }

    #[test]
    fn login_column_follows_the_username_shape() {
        assert_eq!(credentials("0800000001", "x").login_column(), "phone");
        assert_eq!(credentials("user1@example.com", "x").login_column(), "email");
        assert_eq!(credentials("user1", "x").login_column(), "username");
    }

    #[test]
    fn hashes_verify() {
        let hash = hash_password("secret").unwrap();
        assert!(verify_password("secret", &hash));
        assert!(!verify_password("Secret", &hash));
        assert!(!verify_password("secret", "not-a-hash"));
    }

    #[tokio::test]
    async fn attempt_accepts_any_login_column() {
        let auth = auth();
        for login in ["user2", "user2@example.com", "0800000002"] {
            let (token, user) = auth.attempt(&credentials(login, "password"), false).await.unwrap();
            assert_eq!(token.token_type, "bearer");
            assert_eq!(token.expires_in, 3600);
            assert_eq!(user["uuid"], fixture_uuid(2));
        }
        let (token, _) = auth.attempt(&credentials("user2", "password"), true).await.unwrap();
        assert_eq!(token.expires_in, 10080 * 60);
    }

    #[tokio::test]
    async fn attempt_rejects_bad_credentials() {
        let auth = auth();
        assert!(matches!(
            auth.attempt(&credentials("user2", "wrong"), false).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.attempt(&credentials("nobody", "password"), false).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn current_user_follows_the_subject() {
        let auth = auth();
        let (token, _) = auth.attempt(&credentials("user3", "password"), false).await.unwrap();
        let user = auth.current_user(&token.access_token).await.unwrap();
        assert_eq!(user["username"], "user3");
        assert!(matches!(auth.current_user("garbage").await, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn logout_revokes_the_token() {
        let auth = auth();
        let token = auth.issue(&fixture_uuid(1), 60).unwrap();
        auth.logout(&token.access_token).unwrap();
        assert!(matches!(auth.decode(&token.access_token), Err(AuthError::RevokedToken)));
    }

    #[test]
    fn refresh_replaces_the_token() {
        let auth = auth();
        let token = auth.issue(&fixture_uuid(1), 600).unwrap();
        let fresh = auth.refresh(&token.access_token).unwrap();
        assert_ne!(fresh.access_token, token.access_token);
        assert_eq!(fresh.expires_in, 600);
        assert_eq!(auth.decode(&fresh.access_token).unwrap().sub, fixture_uuid(1));
        assert!(matches!(auth.refresh(&token.access_token), Err(AuthError::RevokedToken)));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let auth = auth();
        let token = auth.issue(&fixture_uuid(1), -10).unwrap();
        assert!(matches!(auth.decode(&token.access_token), Err(AuthError::ExpiredToken)));
    }
}
