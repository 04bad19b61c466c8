//! kernelgate - single-port protocol gateway
//!
//! Serves a control API, a WebSocket command channel and the WebDAV,
//! CalDAV and CardDAV file-synchronization protocols on one port, under
//! one authentication, authorization, read-only and CORS policy.

pub mod auth;
pub mod channel;
pub mod cli;
pub mod http_server;
pub mod lang;
pub mod policy;
