//! # Auth Module
//!
//! Roles, credential resolution (token first, then session cookie) and the
//! authorization gate shared by every protocol branch.

pub mod crypto;
pub mod errors;
pub mod gate;
pub mod jwt;
pub mod resolver;
pub mod role;
pub mod session;

pub use errors::{AuthError, AuthResult};
pub use gate::authorize;
pub use jwt::{JwtConfig, TokenClaims, TokenManager};
pub use resolver::{bearer_token, CredentialResolver, CredentialSource, ResolvedAuth, AUTH_TOKEN_HEADER};
pub use role::{Role, RoleSet};
pub use session::{InMemorySessionStore, Session, SessionConfig, SessionData, SessionStore};
