//! Command Channel End-to-End Tests
//!
//! Boot the gateway on an ephemeral port and talk to `/ws` with a real
//! WebSocket client.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use kernelgate::auth::Role;
use kernelgate::channel::{PushScope, ResultEnvelope};
use kernelgate::http_server::{GatewayConfig, HttpServer};

struct Running {
    addr: SocketAddr,
    token: String,
    channel: std::sync::Arc<kernelgate::channel::CommandChannel>,
}

async fn boot() -> Running {
    let mut config = GatewayConfig::with_port(0);
    config.access_auth_code = "s3cret".to_string();
    let server = HttpServer::with_config(config);

    let token = server
        .state()
        .resolver
        .tokens()
        .issue(Role::Editor)
        .unwrap();
    let channel = server.state().channel.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    Running {
        addr,
        token,
        channel,
    }
}

fn text_json(msg: Message) -> Value {
    match msg {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_command_round_trip() {
    let gw = boot().await;

    let mut request = format!("ws://{}/ws?app=desk", gw.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-auth-token", gw.token.parse().unwrap());

    let (mut ws, _) = connect_async(request).await.unwrap();

    ws.send(Message::Text(
        json!({ "cmd": "ping", "reqId": 1, "param": {} }).to_string(),
    ))
    .await
    .unwrap();

    let reply = text_json(ws.next().await.unwrap().unwrap());
    assert_eq!(reply["code"], 0);
    assert_eq!(reply["cmd"], "ping");
    assert_eq!(reply["reqId"], 1);

    ws.send(Message::Text("{broken".to_string())).await.unwrap();
    let reply = text_json(ws.next().await.unwrap().unwrap());
    assert_eq!(reply["msg"], "Bad Request");

    ws.send(Message::Text(
        json!({ "cmd": "whoami", "reqId": 2 }).to_string(),
    ))
    .await
    .unwrap();
    let reply = text_json(ws.next().await.unwrap().unwrap());
    assert_eq!(reply["data"]["role"], "editor");
    assert_eq!(reply["data"]["app"], "desk");

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_push_delivered_over_socket() {
    let gw = boot().await;

    let mut request = format!("ws://{}/ws?app=desk", gw.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-auth-token", gw.token.parse().unwrap());
    let (mut ws, _) = connect_async(request).await.unwrap();

    // Round trip first so the connection is registered
    ws.send(Message::Text(json!({ "cmd": "ping", "reqId": 1 }).to_string()))
        .await
        .unwrap();
    ws.next().await.unwrap().unwrap();

    let event = ResultEnvelope::ok(json!({ "event": "reload" }));
    assert_eq!(gw.channel.push(&event, &PushScope::All), 1);

    let pushed = text_json(ws.next().await.unwrap().unwrap());
    assert_eq!(pushed["data"]["event"], "reload");
    assert!(pushed.get("reqId").is_none());
}

#[tokio::test]
async fn test_unauthenticated_client_gets_close_frame() {
    let gw = boot().await;

    let url = format!("ws://{}/ws?app=desk", gw.addr);
    let (mut ws, _) = connect_async(url).await.unwrap();

    match ws.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert_eq!(frame.reason, "unauthenticated");
        }
        other => panic!("expected close frame, got {:?}", other),
    }
    assert!(gw.channel.registry().is_empty());
}
