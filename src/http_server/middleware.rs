//! Credential resolution middleware.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::trace;

use super::state::GatewayState;

/// Attach the caller's [`ResolvedAuth`](crate::auth::ResolvedAuth) to the request
pub async fn resolve_credentials(
    State(state): State<Arc<GatewayState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth = state.resolver.resolve(req.headers());
    trace!(path = %req.uri().path(), role = %auth.role, source = ?auth.source, "credentials resolved");
    req.extensions_mut().insert(auth);
    next.run(req).await
}
