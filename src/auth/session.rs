//! # Session Management
//!
//! Server-side sessions referenced by an opaque cookie id.
//!
//! The raw id only ever lives in the client's cookie; the store keys
//! sessions by its SHA-256 hash. A session records, per workspace, the
//! access code the caller authenticated with so the resolver can compare
//! it against the currently configured one.
//!
//! ## Invariants
//! - Sessions expire at their stated time; expired sessions are never returned
//! - Destroying a session invalidates it immediately

use std::collections::HashMap;
use std::sync::RwLock;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::crypto::{generate_token, hash_token};
use super::errors::{AuthError, AuthResult};

/// Per-workspace authorization state held in a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSession {
    /// Access code the caller logged in with
    pub access_auth_code: String,
}

/// Session payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Workspace directory -> authorization state
    pub workspaces: HashMap<String, WorkspaceSession>,
}

impl SessionData {
    /// Session data authorizing a single workspace
    pub fn for_workspace(workspace: &str, access_auth_code: &str) -> Self {
        let mut workspaces = HashMap::new();
        workspaces.insert(
            workspace.to_string(),
            WorkspaceSession {
                access_auth_code: access_auth_code.to_string(),
            },
        );
        Self { workspaces }
    }

    pub fn workspace(&self, workspace: &str) -> Option<&WorkspaceSession> {
        self.workspaces.get(workspace)
    }
}

/// Session model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Hash of the cookie id
    #[serde(skip_serializing)]
    pub id_hash: String,

    pub data: SessionData,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cookie carrying the session id
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: i64,

    /// Mark the cookie `Secure` (served over TLS)
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_name() -> String {
    "kernelgate".to_string()
}

fn default_session_ttl_secs() -> i64 {
    60 * 60 * 24 * 7
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_secs: default_session_ttl_secs(),
            secure: false,
        }
    }
}

impl SessionConfig {
    /// `Set-Cookie` value establishing a session
    pub fn session_cookie(&self, raw_id: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name, raw_id, self.ttl_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value clearing the session cookie
    pub fn expired_cookie(&self) -> String {
        format!("{}=; Path=/; Max-Age=0; HttpOnly", self.cookie_name)
    }
}

/// Extract a named cookie from request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// Session store trait
///
/// Implementations must be safe under concurrent reads and writes.
pub trait SessionStore: Send + Sync {
    /// Create a session and return the raw id to hand to the client
    fn create(&self, data: SessionData) -> AuthResult<String>;

    /// Look up a live session by raw id
    fn get(&self, raw_id: &str) -> AuthResult<Option<Session>>;

    /// Destroy a session; returns whether it existed
    fn destroy(&self, raw_id: &str) -> AuthResult<bool>;

    /// Delete expired sessions
    fn purge_expired(&self) -> AuthResult<usize>;
}

/// In-memory session store
#[derive(Debug)]
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_ttl(Duration::seconds(config.ttl_secs))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, data: SessionData) -> AuthResult<String> {
        let raw_id = generate_token();
        let now = Utc::now();
        let session = Session {
            id_hash: hash_token(&raw_id),
            data,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| AuthError::StorageError("Lock poisoned".to_string()))?;
        sessions.insert(session.id_hash.clone(), session);
        Ok(raw_id)
    }

    fn get(&self, raw_id: &str) -> AuthResult<Option<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| AuthError::StorageError("Lock poisoned".to_string()))?;
        Ok(sessions
            .get(&hash_token(raw_id))
            .filter(|s| !s.is_expired())
            .cloned())
    }

    fn destroy(&self, raw_id: &str) -> AuthResult<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| AuthError::StorageError("Lock poisoned".to_string()))?;
        Ok(sessions.remove(&hash_token(raw_id)).is_some())
    }

    fn purge_expired(&self) -> AuthResult<usize> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| AuthError::StorageError("Lock poisoned".to_string()))?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_create_and_get_session() {
        let store = InMemorySessionStore::default();
        let raw_id = store
            .create(SessionData::for_workspace("/ws", "1234"))
            .unwrap();

        let session = store.get(&raw_id).unwrap().unwrap();
        assert_eq!(session.data.workspace("/ws").unwrap().access_auth_code, "1234");
        assert_ne!(session.id_hash, raw_id);
        assert!(store.get("unknown").unwrap().is_none());
    }

    #[test]
    fn test_destroy_invalidates_immediately() {
        let store = InMemorySessionStore::default();
        let raw_id = store.create(SessionData::default()).unwrap();

        assert!(store.destroy(&raw_id).unwrap());
        assert!(store.get(&raw_id).unwrap().is_none());
        assert!(!store.destroy(&raw_id).unwrap());
    }

    #[test]
    fn test_expired_sessions_hidden_and_purged() {
        let store = InMemorySessionStore::with_ttl(Duration::seconds(-1));
        let raw_id = store.create(SessionData::default()).unwrap();

        assert!(store.get(&raw_id).unwrap().is_none());
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cookie_value_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; kernelgate=abc123; other=x"),
        );

        assert_eq!(cookie_value(&headers, "kernelgate").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = SessionConfig {
            secure: true,
            ..SessionConfig::default()
        };
        let cookie = config.session_cookie("abc");
        assert!(cookie.starts_with("kernelgate=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(config.expired_cookie().contains("Max-Age=0"));
    }
}
