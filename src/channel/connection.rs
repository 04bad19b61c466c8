//! # Command Channel
//!
//! Lifecycle of one persistent connection:
//!
//! ```text
//! Connecting --admit--> Admitted --activate--> Active --close--> Closed
//!      \______________________reject__________________________/
//! ```
//!
//! Admission accepts a caller whose resolved role is Administrator, Editor
//! or Reader, or an auth-page keep-alive (`?app=<name>&id=auth`). Once
//! active, each text message is decoded, looked up and dispatched. Every
//! message yields exactly one reply; no per-message failure closes the
//! connection.
//!
//! Mutating commands are re-checked per message against the read-only
//! flag and the caller's effective role. The effective role comes from,
//! in order: a valid token inside the envelope, the upgrade token
//! re-validated now, the role fixed at admission.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Query;
use axum::http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::command::{CommandContext, CommandRegistry};
use super::envelope::{abbreviate, CommandEnvelope, ResultEnvelope};
use super::errors::{ChannelError, ChannelResult};
use super::registry::{ConnectionInfo, ConnectionRegistry, Outbound, PushScope};
use crate::auth::{
    authorize, bearer_token, CredentialResolver, CredentialSource, ResolvedAuth, Role, RoleSet,
};
use crate::lang::Lang;
use crate::policy::ReadOnlyGate;

/// Connection tag value marking an auth-page keep-alive
pub const AUTH_KEEPALIVE_ID: &str = "auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Admitted,
    Active,
    Closed,
}

impl ConnectionState {
    fn can_transition_to(self, to: ConnectionState) -> bool {
        matches!(
            (self, to),
            (ConnectionState::Connecting, ConnectionState::Admitted)
                | (ConnectionState::Admitted, ConnectionState::Active)
                | (ConnectionState::Connecting, ConnectionState::Closed)
                | (ConnectionState::Admitted, ConnectionState::Closed)
                | (ConnectionState::Active, ConnectionState::Closed)
        )
    }
}

/// Client-supplied identification from the upgrade query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTag {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl ConnectionTag {
    /// Parse `app`/`id` from a request URI; malformed queries yield an empty tag
    pub fn from_uri(uri: &Uri) -> Self {
        Query::<ConnectionTag>::try_from_uri(uri)
            .map(|Query(tag)| tag)
            .unwrap_or_default()
    }

    pub fn has_app(&self) -> bool {
        self.app.as_deref().is_some_and(|a| !a.is_empty())
    }

    /// An auth-page connection that only keeps the login page alive
    pub fn is_auth_keepalive(&self) -> bool {
        self.has_app() && self.id.as_deref() == Some(AUTH_KEEPALIVE_ID)
    }
}

/// What the transport hands over when a client asks to upgrade
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    /// Credentials already resolved for the upgrade request
    pub auth: ResolvedAuth,
    /// Raw upgrade token, kept only when it is what `auth` came from
    pub token: Option<String>,
    pub tag: ConnectionTag,
    pub remote: String,
}

impl AdmissionRequest {
    pub fn new(
        auth: ResolvedAuth,
        headers: &HeaderMap,
        tag: ConnectionTag,
        remote: impl Into<String>,
    ) -> Self {
        let token = match auth.source {
            CredentialSource::Token => bearer_token(headers).map(str::to_string),
            _ => None,
        };
        Self {
            auth,
            token,
            tag,
            remote: remote.into(),
        }
    }
}

/// One command-channel connection
#[derive(Debug)]
pub struct Connection {
    info: ConnectionInfo,
    /// Token presented at upgrade, re-validated on each mutating command
    token: Option<String>,
    state: ConnectionState,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, to: ConnectionState) -> ChannelResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(ChannelError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

/// Admission, dispatch and push for the command channel
pub struct CommandChannel {
    resolver: Arc<CredentialResolver>,
    read_only: Arc<ReadOnlyGate>,
    commands: CommandRegistry,
    registry: Arc<ConnectionRegistry>,
    lang: Lang,
}

impl CommandChannel {
    pub fn new(
        resolver: Arc<CredentialResolver>,
        read_only: Arc<ReadOnlyGate>,
        commands: CommandRegistry,
        lang: Lang,
    ) -> Self {
        Self {
            resolver,
            read_only,
            commands,
            registry: Arc::new(ConnectionRegistry::default()),
            lang,
        }
    }

    /// Decide whether an upgrade may proceed
    pub fn admit(&self, request: AdmissionRequest) -> ChannelResult<Connection> {
        let auth = request.auth;
        let keepalive = request.tag.is_auth_keepalive();

        let mut connection = Connection {
            info: ConnectionInfo {
                id: Uuid::new_v4(),
                tag: request.tag,
                role: auth.role,
                remote: request.remote,
            },
            token: request.token,
            state: ConnectionState::Connecting,
        };

        if !authorize(auth.role, RoleSet::AUTHENTICATED) && !keepalive {
            warn!(
                remote = %connection.info.remote,
                app = ?connection.info.tag.app,
                "rejecting unauthenticated command channel"
            );
            connection.transition(ConnectionState::Closed)?;
            return Err(ChannelError::Unauthenticated);
        }

        connection.transition(ConnectionState::Admitted)?;
        debug!(
            connection = %connection.info.id,
            role = %auth.role,
            keepalive,
            "command channel admitted"
        );
        Ok(connection)
    }

    /// Register an admitted connection for push; returns its outbound queue
    pub fn activate(&self, connection: &mut Connection) -> ChannelResult<mpsc::Receiver<Outbound>> {
        connection.transition(ConnectionState::Active)?;
        let rx = self.registry.register(connection.info.clone());
        info!(
            connection = %connection.info.id,
            app = ?connection.info.tag.app,
            total = self.registry.len(),
            "command channel active"
        );
        Ok(rx)
    }

    /// Process one inbound text message and produce its reply
    pub async fn handle_message(&self, connection: &Connection, text: &str) -> ResultEnvelope {
        let start = Instant::now();
        trace!(connection = %connection.info.id, message = %abbreviate(text), "command received");

        if connection.state != ConnectionState::Active {
            return ResultEnvelope::error("connection is not active");
        }

        let envelope = match CommandEnvelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "undecodable command message");
                return ResultEnvelope::bad_request();
            }
        };

        if !connection.info.tag.has_app() {
            return ResultEnvelope::bad_request();
        }

        let Some(handler) = self.commands.get(&envelope.cmd) else {
            warn!(cmd = %envelope.cmd, "unknown command");
            return ResultEnvelope::unknown_command(&envelope.cmd).answering(&envelope);
        };

        let role = self.effective_role(connection, &envelope);
        if !handler.is_read() && self.mutation_denied(role) {
            debug!(cmd = %envelope.cmd, role = %role, "mutating command denied");
            return ResultEnvelope::error(self.lang.read_only_denied()).answering(&envelope);
        }

        trace!(
            cmd = %envelope.cmd,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "command parsed"
        );

        let ctx = CommandContext {
            envelope: envelope.clone(),
            connection: connection.info.clone(),
            role,
            registry: Arc::clone(&self.registry),
        };
        handler.exec(ctx).await.answering(&envelope)
    }

    /// Move to Closed and drop the registration; `true` only the first time
    pub fn close(&self, connection: &mut Connection) -> bool {
        if connection.state == ConnectionState::Closed {
            return false;
        }
        let was_active = connection.state == ConnectionState::Active;
        connection.state = ConnectionState::Closed;

        if was_active && self.registry.remove(connection.info.id) {
            info!(
                connection = %connection.info.id,
                total = self.registry.len(),
                "command channel closed"
            );
        }
        true
    }

    /// Server-initiated message to the connections in `scope`
    pub fn push(&self, payload: &ResultEnvelope, scope: &PushScope) -> usize {
        self.registry.push(payload, scope)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    fn effective_role(&self, connection: &Connection, envelope: &CommandEnvelope) -> Role {
        envelope
            .token
            .as_deref()
            .or(connection.token.as_deref())
            .and_then(|t| self.resolver.resolve_token(t))
            .map(|claims| claims.role)
            .unwrap_or(connection.info.role)
    }

    fn mutation_denied(&self, role: Role) -> bool {
        self.read_only.is_locked() || !role.can_write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{InMemorySessionStore, JwtConfig, TokenManager, AUTH_TOKEN_HEADER};

    fn channel(access_code: &str) -> CommandChannel {
        let resolver = CredentialResolver::new(
            TokenManager::new(JwtConfig::default()),
            Arc::new(InMemorySessionStore::default()),
            "kernelgate",
            "/workspace",
            access_code,
        );
        CommandChannel::new(
            Arc::new(resolver),
            Arc::new(ReadOnlyGate::default()),
            CommandRegistry::with_builtins(),
            Lang::EnUs,
        )
    }

    fn request_with(channel: &CommandChannel, query: &str, headers: HeaderMap) -> AdmissionRequest {
        let uri: Uri = format!("/ws{}", query).parse().unwrap();
        AdmissionRequest::new(
            channel.resolver.resolve(&headers),
            &headers,
            ConnectionTag::from_uri(&uri),
            "127.0.0.1:9",
        )
    }

    fn request(channel: &CommandChannel, query: &str) -> AdmissionRequest {
        request_with(channel, query, HeaderMap::new())
    }

    fn admitted(channel: &CommandChannel, role: Role) -> Connection {
        let token = channel.resolver.tokens().issue(role).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, token.parse().unwrap());
        channel.admit(request_with(channel, "?app=a", headers)).unwrap()
    }

    #[test]
    fn test_tag_parsing() {
        let tag = ConnectionTag::from_uri(&"/ws?app=abc&id=auth".parse().unwrap());
        assert_eq!(tag.app.as_deref(), Some("abc"));
        assert!(tag.is_auth_keepalive());

        let tag = ConnectionTag::from_uri(&"/ws?id=auth".parse().unwrap());
        assert!(!tag.is_auth_keepalive());
        assert!(!ConnectionTag::from_uri(&"/ws".parse().unwrap()).has_app());
    }

    #[test]
    fn test_open_workspace_still_requires_credentials() {
        let channel = channel("");
        assert_eq!(
            channel.admit(request(&channel, "?app=a")).unwrap_err(),
            ChannelError::Unauthenticated
        );

        let connection = admitted(&channel, Role::Administrator);
        assert_eq!(connection.state(), ConnectionState::Admitted);
        assert_eq!(connection.info().role, Role::Administrator);
    }

    #[test]
    fn test_admission_uses_resolved_role() {
        let channel = channel("secret");
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, "not-a-jwt".parse().unwrap());
        let mut req = request_with(&channel, "?app=a", headers);
        assert!(req.token.is_none());

        req.auth = ResolvedAuth {
            role: Role::Editor,
            claims: None,
            source: CredentialSource::Session,
        };
        let connection = channel.admit(req).unwrap();
        assert_eq!(connection.info().role, Role::Editor);
    }

    #[test]
    fn test_visitor_rejected_unless_keepalive() {
        let channel = channel("secret");
        assert_eq!(
            channel.admit(request(&channel, "?app=a")).unwrap_err(),
            ChannelError::Unauthenticated
        );

        let keepalive = channel.admit(request(&channel, "?app=a&id=auth")).unwrap();
        assert_eq!(keepalive.info().role, Role::Visitor);
    }

    #[test]
    fn test_reader_token_admitted() {
        let channel = channel("secret");
        let connection = admitted(&channel, Role::Reader);
        assert_eq!(connection.info().role, Role::Reader);
        assert!(connection.token.is_some());
    }

    #[test]
    fn test_activate_requires_admitted() {
        let channel = channel("");
        let mut connection = admitted(&channel, Role::Editor);
        let _rx = channel.activate(&mut connection).unwrap();

        assert!(matches!(
            channel.activate(&mut connection),
            Err(ChannelError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_close_twice() {
        let channel = channel("");
        let mut connection = admitted(&channel, Role::Editor);
        let _rx = channel.activate(&mut connection).unwrap();

        assert!(channel.close(&mut connection));
        assert!(!channel.close(&mut connection));
        assert!(channel.registry().is_empty());
    }

    #[tokio::test]
    async fn test_message_before_activate() {
        let channel = channel("");
        let connection = admitted(&channel, Role::Editor);
        let reply = channel
            .handle_message(&connection, r#"{"cmd":"ping","reqId":1,"param":{}}"#)
            .await;
        assert!(!reply.is_ok());
    }
}
