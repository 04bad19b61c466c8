//! # Command Channel Module
//!
//! Persistent WebSocket connection carrying request/response commands and
//! server-initiated pushes.
//!
//! ## Components
//! - **envelope**: request and result wire shapes
//! - **command**: handler trait and name table
//! - **connection**: admission, lifecycle and dispatch
//! - **registry**: admitted connections, used for push
//! - **websocket**: axum transport loop

pub mod command;
pub mod connection;
pub mod envelope;
pub mod errors;
pub mod registry;
pub mod websocket;

pub use command::{CommandContext, CommandFuture, CommandHandler, CommandRegistry};
pub use connection::{AdmissionRequest, CommandChannel, Connection, ConnectionState, ConnectionTag};
pub use envelope::{CommandEnvelope, ResultEnvelope};
pub use errors::{ChannelError, ChannelResult};
pub use registry::{ConnectionInfo, ConnectionRegistry, Outbound, PushScope};
pub use websocket::run_connection;
