//! Command channel upgrade endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, OriginalUri, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Extension;

use super::state::GatewayState;
use crate::auth::ResolvedAuth;
use crate::channel::{run_connection, AdmissionRequest, ConnectionTag};

pub const CHANNEL_PATH: &str = "/ws";

/// `GET /ws`: upgrade, then admit inside the socket so a rejected client
/// receives an explicit close frame
pub async fn channel_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<ResolvedAuth>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let remote = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let admission = AdmissionRequest::new(auth, &headers, ConnectionTag::from_uri(&uri), remote);
    let channel = Arc::clone(&state.channel);

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_connection(socket, channel, admission))
}
