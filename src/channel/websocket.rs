//! WebSocket transport for the command channel.

use std::borrow::Cow;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use super::connection::{AdmissionRequest, CommandChannel};
use super::errors::ChannelError;
use super::registry::Outbound;

/// Drive one upgraded socket until either side closes
pub async fn run_connection(
    mut socket: WebSocket,
    channel: Arc<CommandChannel>,
    admission: AdmissionRequest,
) {
    let mut connection = match channel.admit(admission) {
        Ok(connection) => connection,
        Err(e) => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: Cow::Owned(e.to_string()),
                })))
                .await;
            return;
        }
    };

    let mut outbound = match channel.activate(&mut connection) {
        Ok(rx) => rx,
        Err(e) => {
            warn!(error = %e, "failed to activate command channel");
            channel.close(&mut connection);
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let reply = channel.handle_message(&connection, &text).await;
                        if let Err(e) = sender.send(Message::Text(reply.to_json())).await {
                            debug!(error = %ChannelError::SendFailed(e.to_string()), "reply dropped");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection = %connection.id(), error = %e, "socket read failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            frame = outbound.recv() => {
                match frame {
                    Some(Outbound::Text(text)) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    channel.close(&mut connection);
}
