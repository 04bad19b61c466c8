//! # Kernel Gateway HTTP Server Module
//!
//! One listening port serving every protocol family under a shared
//! authentication, authorization, read-only and CORS policy.
//!
//! # Endpoints
//!
//! - `/` - Redirect to the client build matching the user agent
//! - `/check-auth` - Login page
//! - `/ws` - Command channel
//! - `/api/*` - Control API (serialized)
//! - `/webdav/*`, `/caldav/*`, `/carddav/*` - File-synchronization protocols
//! - `/.well-known/caldav`, `/.well-known/carddav` - Discovery
//! - `/upload`, `/assets/*`, `/stage/*` and other static roots

pub mod api_routes;
pub mod backend;
pub mod branch;
pub mod channel_routes;
pub mod config;
pub mod dav_routes;
pub mod errors;
pub mod middleware;
pub mod page_routes;
pub mod server;
pub mod state;
pub mod static_routes;

pub use api_routes::{ApiCall, ApiContext, ApiRouter};
pub use backend::{backend_fn, ProtocolBackend, StaticDir, StaticFile, Unavailable, UploadDir};
pub use branch::{Branch, BranchTable};
pub use config::GatewayConfig;
pub use dav_routes::DavBackends;
pub use errors::{GatewayError, GatewayResult};
pub use server::{BootMode, BootOutcome, HttpServer, HttpServerBuilder};
pub use state::GatewayState;
