//! # Protocol Backends
//!
//! The collaborators a branch hands an authorized request to. The gateway
//! knows nothing about their semantics; a backend sees only requests that
//! already passed method, role and read-only checks.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, warn};

use crate::channel::ResultEnvelope;

/// Future returned by a backend
pub type BackendFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A protocol or collaborator implementation behind a branch
pub trait ProtocolBackend: Send + Sync {
    fn serve(&self, req: Request) -> BackendFuture;
}

struct FnBackend<F>(F);

impl<F, Fut> ProtocolBackend for FnBackend<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn serve(&self, req: Request) -> BackendFuture {
        Box::pin((self.0)(req))
    }
}

/// Wrap an async closure as a backend
pub fn backend_fn<F, Fut>(f: F) -> Arc<dyn ProtocolBackend>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(FnBackend(f))
}

/// Placeholder for a protocol nobody plugged in
#[derive(Debug, Clone)]
pub struct Unavailable {
    name: &'static str,
}

impl Unavailable {
    pub fn new(name: &'static str) -> Arc<dyn ProtocolBackend> {
        Arc::new(Self { name })
    }
}

impl ProtocolBackend for Unavailable {
    fn serve(&self, _req: Request) -> BackendFuture {
        let msg = format!("{} backend is not configured", self.name);
        Box::pin(async move { (StatusCode::NOT_IMPLEMENTED, msg).into_response() })
    }
}

/// Rewrite the request URI relative to `prefix`, keeping the query
fn strip_prefix(req: &mut Request, prefix: &str) {
    let path = req.uri().path();
    let rest = path.strip_prefix(prefix.trim_end_matches('/')).unwrap_or(path);
    let rest = if rest.is_empty() { "/" } else { rest };

    let path_and_query = match req.uri().query() {
        Some(q) => format!("{}?{}", rest, q),
        None => rest.to_string(),
    };

    if let Ok(uri) = Uri::builder().path_and_query(path_and_query).build() {
        *req.uri_mut() = uri;
    }
}

/// Directory served under a URL prefix
#[derive(Debug, Clone)]
pub struct StaticDir {
    prefix: String,
    root: PathBuf,
    deny_root: bool,
}

impl StaticDir {
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.into(),
            deny_root: false,
        }
    }

    /// Refuse a request for the bare prefix (no directory listing)
    pub fn deny_root(mut self) -> Self {
        self.deny_root = true;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ProtocolBackend for StaticDir {
    fn serve(&self, mut req: Request) -> BackendFuture {
        strip_prefix(&mut req, &self.prefix);
        if self.deny_root && req.uri().path() == "/" {
            return Box::pin(async { StatusCode::FORBIDDEN.into_response() });
        }

        let service = ServeDir::new(&self.root);
        Box::pin(async move {
            match service.oneshot(req).await {
                Ok(res) => res.map(Body::new),
                Err(never) => match never {},
            }
        })
    }
}

/// A single fixed file
#[derive(Debug, Clone)]
pub struct StaticFile {
    path: PathBuf,
}

impl StaticFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProtocolBackend for StaticFile {
    fn serve(&self, req: Request) -> BackendFuture {
        let service = ServeFile::new(&self.path);
        Box::pin(async move {
            match service.oneshot(req).await {
                Ok(res) => res.map(Body::new),
                Err(never) => match never {},
            }
        })
    }
}

/// Multipart upload stored under a directory
///
/// Replies `{succMap: {original: stored}, errFiles: [..]}` inside a result
/// envelope. Stored names are flattened to their final path component.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProtocolBackend for UploadDir {
    fn serve(&self, req: Request) -> BackendFuture {
        let root = self.root.clone();
        Box::pin(async move {
            let mut multipart = match Multipart::from_request(req, &()).await {
                Ok(multipart) => multipart,
                Err(rejection) => return rejection.into_response(),
            };

            if let Err(e) = tokio::fs::create_dir_all(&root).await {
                error!(dir = %root.display(), error = %e, "cannot create upload directory");
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(ResultEnvelope::error(e.to_string())))
                    .into_response();
            }

            let mut succ_map = BTreeMap::new();
            let mut err_files = Vec::new();

            loop {
                let field = match multipart.next_field().await {
                    Ok(Some(field)) => field,
                    Ok(None) => break,
                    Err(e) => {
                        return (StatusCode::BAD_REQUEST, Json(ResultEnvelope::error(e.to_string())))
                            .into_response();
                    }
                };

                let Some(original) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let Some(stored) = Path::new(&original)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                else {
                    err_files.push(original);
                    continue;
                };

                let data = match field.bytes().await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(file = %original, error = %e, "upload field read failed");
                        err_files.push(original);
                        continue;
                    }
                };

                match tokio::fs::write(root.join(&stored), &data).await {
                    Ok(()) => {
                        succ_map.insert(original, format!("assets/{}", stored));
                    }
                    Err(e) => {
                        warn!(file = %original, error = %e, "upload write failed");
                        err_files.push(original);
                    }
                }
            }

            Json(ResultEnvelope::ok(json!({
                "succMap": succ_map,
                "errFiles": err_files,
            })))
            .into_response()
        })
    }
}
