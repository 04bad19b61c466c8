//! Command Channel Dispatch Tests
//!
//! Exercise admission, dispatch and push on a `CommandChannel` without a
//! transport. Every message must produce exactly one reply and no
//! per-message failure may end the connection.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, Uri};
use serde_json::{json, Value};

use kernelgate::auth::{
    CredentialResolver, InMemorySessionStore, JwtConfig, Role, TokenManager, AUTH_TOKEN_HEADER,
};
use kernelgate::channel::{
    AdmissionRequest, ChannelError, CommandChannel, CommandRegistry, Connection, ConnectionState,
    ConnectionTag, Outbound, PushScope, ResultEnvelope,
};
use kernelgate::lang::Lang;
use kernelgate::policy::ReadOnlyGate;

// =============================================================================
// Helpers
// =============================================================================

struct Fixture {
    channel: CommandChannel,
    resolver: Arc<CredentialResolver>,
    read_only: Arc<ReadOnlyGate>,
}

fn fixture() -> Fixture {
    let mut commands = CommandRegistry::with_builtins();
    commands.register_fn("setAttr", false, |ctx| async move {
        ResultEnvelope::ok(json!({ "by": ctx.role }))
    });
    commands.register_fn("echo", true, |ctx| async move {
        ResultEnvelope::ok(Value::Object(ctx.envelope.param))
    });

    let resolver = Arc::new(CredentialResolver::new(
        TokenManager::new(JwtConfig::default()),
        Arc::new(InMemorySessionStore::default()),
        "kernelgate",
        "/workspace",
        "s3cret",
    ));
    let read_only = Arc::new(ReadOnlyGate::default());
    let channel = CommandChannel::new(
        Arc::clone(&resolver),
        Arc::clone(&read_only),
        commands,
        Lang::EnUs,
    );

    Fixture {
        channel,
        resolver,
        read_only,
    }
}

fn admission(fx: &Fixture, query: &str, token: Option<&str>) -> AdmissionRequest {
    let uri: Uri = format!("/ws{}", query).parse().unwrap();
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert(AUTH_TOKEN_HEADER, HeaderValue::from_str(token).unwrap());
    }
    AdmissionRequest::new(
        fx.resolver.resolve(&headers),
        &headers,
        ConnectionTag::from_uri(&uri),
        "127.0.0.1:50000",
    )
}

/// Admit and activate a connection for `role`
fn open(fx: &Fixture, role: Role, query: &str) -> (Connection, tokio::sync::mpsc::Receiver<Outbound>) {
    let token = fx.resolver.tokens().issue(role).unwrap();
    let mut conn = fx.channel.admit(admission(fx, query, Some(&token))).unwrap();
    let rx = fx.channel.activate(&mut conn).unwrap();
    (conn, rx)
}

// =============================================================================
// Admission
// =============================================================================

#[test]
fn test_visitor_rejected() {
    let fx = fixture();
    let err = fx.channel.admit(admission(&fx, "?app=desk", None)).unwrap_err();
    assert_eq!(err, ChannelError::Unauthenticated);
    assert!(fx.channel.registry().is_empty());
}

#[test]
fn test_keepalive_visitor_admitted() {
    let fx = fixture();
    let mut conn = fx.channel.admit(admission(&fx, "?app=desk&id=auth", None)).unwrap();
    assert_eq!(conn.state(), ConnectionState::Admitted);
    assert_eq!(conn.info().role, Role::Visitor);

    fx.channel.activate(&mut conn).unwrap();
    assert_eq!(conn.state(), ConnectionState::Active);
    assert_eq!(fx.channel.registry().len(), 1);
}

#[test]
fn test_invalid_token_rejected() {
    let fx = fixture();
    let err = fx
        .channel
        .admit(admission(&fx, "?app=desk", Some("garbage")))
        .unwrap_err();
    assert_eq!(err, ChannelError::Unauthenticated);
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_ping_echoes_req_id() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Reader, "?app=desk");

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"ping","reqId":7,"param":{}}"#)
        .await;

    assert!(reply.is_ok());
    assert_eq!(reply.cmd.as_deref(), Some("ping"));
    assert_eq!(reply.req_id, Some(7.into()));
    assert_eq!(reply.data, Some(json!({ "pong": true })));
}

#[tokio::test]
async fn test_malformed_message_is_bad_request() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Editor, "?app=desk");

    for text in ["not json", r#"{"reqId":1}"#, r#"{"cmd":"ping","reqId":"x"}"#] {
        let reply = fx.channel.handle_message(&conn, text).await;
        assert_eq!(reply.code, -1);
        assert_eq!(reply.msg, "Bad Request");
        assert!(reply.req_id.is_none());
    }

    // Still usable
    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"ping","reqId":2}"#)
        .await;
    assert!(reply.is_ok());
}

#[tokio::test]
async fn test_missing_app_tag_is_bad_request() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Editor, "");

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"ping","reqId":1}"#)
        .await;
    assert_eq!(reply.msg, "Bad Request");
}

#[tokio::test]
async fn test_unknown_command() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Editor, "?app=desk");

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"nope","reqId":3}"#)
        .await;

    assert_eq!(reply.code, -1);
    assert!(reply.msg.contains("nope"));
    assert_eq!(reply.cmd.as_deref(), Some("nope"));
    assert_eq!(reply.req_id, Some(3.into()));
}

#[tokio::test]
async fn test_params_reach_handler() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Reader, "?app=desk");

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"echo","reqId":4,"param":{"id":"20240101"}}"#)
        .await;
    assert_eq!(reply.data, Some(json!({ "id": "20240101" })));
}

// =============================================================================
// Mutation policy
// =============================================================================

#[tokio::test]
async fn test_reader_cannot_mutate() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Reader, "?app=desk");

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"setAttr","reqId":5}"#)
        .await;

    assert_eq!(reply.code, -1);
    assert_eq!(reply.msg, Lang::EnUs.read_only_denied());
    assert_eq!(reply.req_id, Some(5.into()));
    assert_eq!(conn.state(), ConnectionState::Active);
}

#[tokio::test]
async fn test_reader_denied_while_locked_keeps_connection() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Reader, "?app=desk");
    fx.read_only.set(true);

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"setAttr","reqId":10}"#)
        .await;
    assert_eq!(reply.code, -1);
    assert_eq!(reply.req_id, Some(10.into()));
    assert_eq!(conn.state(), ConnectionState::Active);
    assert!(fx.channel.registry().contains(conn.id()));

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"echo","reqId":11,"param":{"n":1}}"#)
        .await;
    assert!(reply.is_ok());
    assert_eq!(reply.req_id, Some(11.into()));
    assert_eq!(reply.data, Some(json!({ "n": 1 })));
}

#[tokio::test]
async fn test_read_only_denies_editor_then_allows_after_unlock() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Editor, "?app=desk");

    fx.read_only.set(true);
    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"setAttr","reqId":1}"#)
        .await;
    assert_eq!(reply.code, -1);

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"ping","reqId":2}"#)
        .await;
    assert!(reply.is_ok());

    fx.read_only.set(false);
    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"setAttr","reqId":3}"#)
        .await;
    assert!(reply.is_ok());
    assert_eq!(reply.data, Some(json!({ "by": "editor" })));
}

#[tokio::test]
async fn test_envelope_token_overrides_connection_role() {
    let fx = fixture();
    let (conn, _rx) = open(&fx, Role::Reader, "?app=desk");
    let admin = fx.resolver.tokens().issue(Role::Administrator).unwrap();

    let text = json!({ "cmd": "setAttr", "reqId": 9, "token": admin }).to_string();
    let reply = fx.channel.handle_message(&conn, &text).await;

    assert!(reply.is_ok());
    assert_eq!(reply.data, Some(json!({ "by": "administrator" })));
}

// =============================================================================
// Push and close
// =============================================================================

#[tokio::test]
async fn test_push_reaches_scoped_connections() {
    let fx = fixture();
    let (desk, mut desk_rx) = open(&fx, Role::Reader, "?app=desk");
    let (_phone, mut phone_rx) = open(&fx, Role::Reader, "?app=phone");

    let event = ResultEnvelope::ok(json!({ "event": "reload" }));
    assert_eq!(fx.channel.push(&event, &PushScope::App("desk".into())), 1);
    match desk_rx.recv().await.unwrap() {
        Outbound::Text(text) => assert!(text.contains("reload")),
        other => panic!("unexpected outbound {:?}", other),
    }
    assert!(phone_rx.try_recv().is_err());

    assert_eq!(fx.channel.push(&event, &PushScope::AllExcept(desk.id())), 1);
    assert!(phone_rx.try_recv().is_ok());
}

#[tokio::test]
async fn test_close_is_idempotent_and_stops_push() {
    let fx = fixture();
    let (mut conn, _rx) = open(&fx, Role::Editor, "?app=desk");
    let id = conn.id();

    assert!(fx.channel.close(&mut conn));
    assert!(!fx.channel.close(&mut conn));
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(!fx.channel.registry().contains(id));

    let event = ResultEnvelope::ok(Value::Null);
    assert_eq!(fx.channel.push(&event, &PushScope::Connection(id)), 0);

    let reply = fx
        .channel
        .handle_message(&conn, r#"{"cmd":"ping","reqId":1}"#)
        .await;
    assert_eq!(reply.code, -1);
}
