//! # Credential Resolver
//!
//! Turns a raw request into a [`Role`] plus optional token claims.
//!
//! Resolution order:
//! 1. a structurally valid bearer token (`X-Auth-Token`, or `Authorization: Bearer`)
//! 2. a session cookie whose stored access code matches the configured one
//! 3. `Visitor`
//!
//! Resolution never fails. A bad or missing credential degrades the caller
//! to `Visitor` and leaves the accept/reject decision to the gate.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use tracing::{debug, warn};

use super::crypto::constant_time_str_eq;
use super::jwt::{TokenClaims, TokenManager};
use super::role::Role;
use super::session::{cookie_value, SessionData, SessionStore};

/// Header carrying a gateway token
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Where a resolved role came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Signed bearer token
    Token,
    /// Server-side session referenced by cookie
    Session,
    /// Nothing usable was presented
    Anonymous,
}

/// Outcome of credential resolution, attached to each request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuth {
    pub role: Role,
    pub claims: Option<TokenClaims>,
    pub source: CredentialSource,
}

impl ResolvedAuth {
    pub fn visitor() -> Self {
        Self {
            role: Role::Visitor,
            claims: None,
            source: CredentialSource::Anonymous,
        }
    }
}

/// Resolves request credentials to a role
pub struct CredentialResolver {
    tokens: TokenManager,
    sessions: Arc<dyn SessionStore>,
    cookie_name: String,
    workspace: String,
    access_auth_code: String,
}

impl CredentialResolver {
    pub fn new(
        tokens: TokenManager,
        sessions: Arc<dyn SessionStore>,
        cookie_name: impl Into<String>,
        workspace: impl Into<String>,
        access_auth_code: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            sessions,
            cookie_name: cookie_name.into(),
            workspace: workspace.into(),
            access_auth_code: access_auth_code.into(),
        }
    }

    /// Resolve the caller's role from request headers
    pub fn resolve(&self, headers: &HeaderMap) -> ResolvedAuth {
        if let Some(claims) = bearer_token(headers).and_then(|t| self.resolve_token(t)) {
            return ResolvedAuth {
                role: claims.role,
                claims: Some(claims),
                source: CredentialSource::Token,
            };
        }

        if let Some(role) = self.session_role(headers) {
            return ResolvedAuth {
                role,
                claims: None,
                source: CredentialSource::Session,
            };
        }

        ResolvedAuth::visitor()
    }

    /// Validate a raw token, discarding the failure reason
    pub fn resolve_token(&self, token: &str) -> Option<TokenClaims> {
        match self.tokens.validate_token(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "ignoring invalid auth token");
                None
            }
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// True when the workspace is protected by an access code
    pub fn requires_access_code(&self) -> bool {
        !self.access_auth_code.is_empty()
    }

    /// Compare a submitted access code with the configured one; any code
    /// is accepted when none is configured
    pub fn access_code_matches(&self, code: &str) -> bool {
        !self.requires_access_code() || constant_time_str_eq(code, &self.access_auth_code)
    }

    /// Value recorded in a new session for later comparison
    pub fn session_data(&self) -> SessionData {
        SessionData::for_workspace(&self.workspace, &self.access_auth_code)
    }

    fn session_role(&self, headers: &HeaderMap) -> Option<Role> {
        let raw_id = cookie_value(headers, &self.cookie_name)?;
        let session = match self.sessions.get(&raw_id) {
            Ok(session) => session?,
            Err(e) => {
                warn!(error = %e, "session lookup failed");
                return None;
            }
        };

        let stored = session.data.workspace(&self.workspace)?;
        if constant_time_str_eq(&stored.access_auth_code, &self.access_auth_code) {
            Some(Role::Administrator)
        } else {
            None
        }
    }
}

/// Raw bearer token presented with the request, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtConfig;
    use crate::auth::session::InMemorySessionStore;
    use axum::http::HeaderValue;
    use chrono::Duration;

    const WORKSPACE: &str = "/workspace";

    fn resolver(access_code: &str) -> CredentialResolver {
        CredentialResolver::new(
            TokenManager::new(JwtConfig::default()),
            Arc::new(InMemorySessionStore::default()),
            "kernelgate",
            WORKSPACE,
            access_code,
        )
    }

    fn with_token(headers: &mut HeaderMap, token: &str) {
        headers.insert(AUTH_TOKEN_HEADER, HeaderValue::from_str(token).unwrap());
    }

    fn with_cookie(headers: &mut HeaderMap, id: &str) {
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("kernelgate={}", id)).unwrap(),
        );
    }

    #[test]
    fn test_no_credentials_is_visitor() {
        let resolver = resolver("secret");
        let auth = resolver.resolve(&HeaderMap::new());
        assert_eq!(auth, ResolvedAuth::visitor());
    }

    #[test]
    fn test_open_workspace_without_session_is_visitor() {
        let resolver = resolver("");
        assert_eq!(resolver.resolve(&HeaderMap::new()), ResolvedAuth::visitor());
    }

    #[test]
    fn test_open_workspace_session_is_administrator() {
        let resolver = resolver("");
        let id = resolver.sessions().create(resolver.session_data()).unwrap();
        let mut headers = HeaderMap::new();
        with_cookie(&mut headers, &id);

        let auth = resolver.resolve(&headers);
        assert_eq!(auth.role, Role::Administrator);
        assert_eq!(auth.source, CredentialSource::Session);
    }

    #[test]
    fn test_unknown_session_is_visitor() {
        let resolver = resolver("");
        let mut headers = HeaderMap::new();
        with_cookie(&mut headers, "never-issued");

        assert_eq!(resolver.resolve(&headers).role, Role::Visitor);
    }

    #[test]
    fn test_valid_token_sets_role_and_claims() {
        let resolver = resolver("secret");
        let token = resolver.tokens().issue(Role::Reader).unwrap();
        let mut headers = HeaderMap::new();
        with_token(&mut headers, &token);

        let auth = resolver.resolve(&headers);
        assert_eq!(auth.role, Role::Reader);
        assert_eq!(auth.source, CredentialSource::Token);
        assert_eq!(auth.claims.unwrap().role, Role::Reader);
    }

    #[test]
    fn test_authorization_bearer_fallback() {
        let resolver = resolver("secret");
        let token = resolver.tokens().issue(Role::Editor).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        assert_eq!(resolver.resolve(&headers).role, Role::Editor);
    }

    #[test]
    fn test_session_with_matching_code_is_administrator() {
        let resolver = resolver("secret");
        let id = resolver
            .sessions()
            .create(SessionData::for_workspace(WORKSPACE, "secret"))
            .unwrap();
        let mut headers = HeaderMap::new();
        with_cookie(&mut headers, &id);

        let auth = resolver.resolve(&headers);
        assert_eq!(auth.role, Role::Administrator);
        assert_eq!(auth.source, CredentialSource::Session);
    }

    #[test]
    fn test_session_with_stale_code_is_visitor() {
        let resolver = resolver("secret");
        let id = resolver
            .sessions()
            .create(SessionData::for_workspace(WORKSPACE, "old-code"))
            .unwrap();
        let mut headers = HeaderMap::new();
        with_cookie(&mut headers, &id);

        assert_eq!(resolver.resolve(&headers).role, Role::Visitor);
    }

    #[test]
    fn test_session_for_other_workspace_is_visitor() {
        let resolver = resolver("secret");
        let id = resolver
            .sessions()
            .create(SessionData::for_workspace("/elsewhere", "secret"))
            .unwrap();
        let mut headers = HeaderMap::new();
        with_cookie(&mut headers, &id);

        assert_eq!(resolver.resolve(&headers).role, Role::Visitor);
    }

    #[test]
    fn test_token_overrides_session() {
        let resolver = resolver("secret");
        let id = resolver
            .sessions()
            .create(SessionData::for_workspace(WORKSPACE, "secret"))
            .unwrap();
        let token = resolver.tokens().issue(Role::Reader).unwrap();
        let mut headers = HeaderMap::new();
        with_cookie(&mut headers, &id);
        with_token(&mut headers, &token);

        assert_eq!(resolver.resolve(&headers).role, Role::Reader);
    }

    #[test]
    fn test_invalid_token_falls_back_to_session() {
        let resolver = resolver("secret");
        let id = resolver
            .sessions()
            .create(SessionData::for_workspace(WORKSPACE, "secret"))
            .unwrap();
        let expired = resolver
            .tokens()
            .issue_with_ttl(Role::Reader, None, Duration::hours(-2))
            .unwrap();
        let mut headers = HeaderMap::new();
        with_cookie(&mut headers, &id);
        with_token(&mut headers, &expired);

        let auth = resolver.resolve(&headers);
        assert_eq!(auth.role, Role::Administrator);
        assert!(auth.claims.is_none());
    }

    #[test]
    fn test_garbage_token_without_session_is_visitor() {
        let resolver = resolver("secret");
        let mut headers = HeaderMap::new();
        with_token(&mut headers, "not-a-jwt");

        assert_eq!(resolver.resolve(&headers).role, Role::Visitor);
    }
}
