//! # Policy Module
//!
//! Gateway-wide policies applied uniformly across protocol families:
//! method vocabularies and their classification, the read-only gate, and
//! the CORS policy.

pub mod cors;
pub mod errors;
pub mod methods;
pub mod readonly;

pub use cors::cors_middleware;
pub use errors::{PolicyError, PolicyResult};
pub use methods::{path_matches_prefix, MethodClass, ProtocolFamily};
pub use readonly::ReadOnlyGate;
