//! # Control API
//!
//! JSON endpoints under `/api`. The router has its own route table: each
//! route names its method, its accepted roles and whether it mutates.
//! The whole table sits behind one branch, which the gateway serializes.
//!
//! Built-in routes:
//! - `POST /api/system/loginAuth`  `{authCode}` → session cookie
//! - `POST /api/system/logoutAuth` → session destroyed, cookie cleared
//! - `POST /api/system/setReadOnly` `{readOnly}` (Administrator)
//! - `GET  /api/system/version`

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::backend::{BackendFuture, ProtocolBackend};
use crate::auth::session::cookie_value;
use crate::auth::{
    authorize, CredentialResolver, ResolvedAuth, RoleSet, SessionConfig, SessionStore,
};
use crate::channel::ResultEnvelope;
use crate::lang::Lang;
use crate::policy::{MethodClass, ReadOnlyGate};

/// Largest accepted API request body
const API_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// What API handlers can reach
pub struct ApiContext {
    pub resolver: Arc<CredentialResolver>,
    pub read_only: Arc<ReadOnlyGate>,
    pub session: SessionConfig,
    pub lang: Lang,
}

/// One decoded API request
pub struct ApiCall {
    pub ctx: Arc<ApiContext>,
    pub auth: ResolvedAuth,
    pub headers: HeaderMap,
    /// JSON body, `Null` when empty
    pub body: Value,
}

pub type ApiFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

type ApiHandler = Arc<dyn Fn(ApiCall) -> ApiFuture + Send + Sync>;

#[derive(Clone)]
struct ApiRoute {
    method: Method,
    path: String,
    requirement: RoleSet,
    class: MethodClass,
    handler: ApiHandler,
}

/// Control API route table
#[derive(Clone)]
pub struct ApiRouter {
    ctx: Arc<ApiContext>,
    routes: Vec<ApiRoute>,
}

pub fn api_ok(data: Value) -> Response {
    Json(ResultEnvelope::ok(data)).into_response()
}

pub fn api_error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ResultEnvelope::error(msg))).into_response()
}

impl ApiRouter {
    pub fn new(ctx: ApiContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            routes: Vec::new(),
        }
    }

    /// Router with the session and system routes installed
    pub fn with_builtins(ctx: ApiContext) -> Self {
        Self::new(ctx)
            // Login, logout and unlocking must stay reachable while locked
            .route(
                Method::POST,
                "/api/system/loginAuth",
                RoleSet::ANY,
                MethodClass::Safe,
                login_auth,
            )
            .route(
                Method::POST,
                "/api/system/logoutAuth",
                RoleSet::ANY,
                MethodClass::Safe,
                logout_auth,
            )
            .route(
                Method::POST,
                "/api/system/setReadOnly",
                RoleSet::ADMINISTRATOR,
                MethodClass::Safe,
                set_read_only,
            )
            .route(
                Method::GET,
                "/api/system/version",
                RoleSet::ANY,
                MethodClass::Safe,
                version,
            )
    }

    /// Add a route; the requirement is mandatory
    pub fn route<F, Fut>(
        mut self,
        method: Method,
        path: &str,
        requirement: RoleSet,
        class: MethodClass,
        handler: F,
    ) -> Self
    where
        F: Fn(ApiCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.routes.retain(|r| !(r.method == method && r.path == path));
        self.routes.push(ApiRoute {
            method,
            path: path.to_string(),
            requirement,
            class,
            handler: Arc::new(move |call| Box::pin(handler(call)) as ApiFuture),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn lookup(&self, method: &Method, path: &str) -> Result<&ApiRoute, StatusCode> {
        let mut path_known = false;
        for route in self.routes.iter().filter(|r| r.path == path) {
            path_known = true;
            if route.method == *method {
                return Ok(route);
            }
        }
        if path_known {
            Err(StatusCode::METHOD_NOT_ALLOWED)
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }
}

impl ProtocolBackend for ApiRouter {
    fn serve(&self, req: Request) -> BackendFuture {
        let route = match self.lookup(req.method(), req.uri().path()) {
            Ok(route) => route.clone(),
            Err(status) => {
                let msg = status.canonical_reason().unwrap_or("").to_string();
                return Box::pin(async move { api_error(status, msg) });
            }
        };
        let ctx = Arc::clone(&self.ctx);

        Box::pin(async move {
            let auth = req
                .extensions()
                .get::<ResolvedAuth>()
                .cloned()
                .unwrap_or_else(ResolvedAuth::visitor);

            if !authorize(auth.role, route.requirement) {
                return api_error(StatusCode::FORBIDDEN, ctx.lang.forbidden());
            }

            if route.class.is_mutating() && ctx.read_only.is_locked() {
                return api_error(StatusCode::FORBIDDEN, ctx.lang.read_only_denied());
            }

            let (parts, body) = req.into_parts();
            let bytes = match to_bytes(body, API_BODY_LIMIT).await {
                Ok(bytes) => bytes,
                Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
            };
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                match serde_json::from_slice(&bytes) {
                    Ok(body) => body,
                    Err(_) => return api_error(StatusCode::BAD_REQUEST, "Bad Request"),
                }
            };

            (route.handler)(ApiCall {
                ctx,
                auth,
                headers: parts.headers,
                body,
            })
            .await
        })
    }
}

// ==================
// Handlers
// ==================

async fn login_auth(call: ApiCall) -> Response {
    let resolver = &call.ctx.resolver;
    let code = call
        .body
        .get("authCode")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if !resolver.access_code_matches(code) {
        warn!("login with incorrect access code");
        return Json(ResultEnvelope::error(call.ctx.lang.invalid_access_code())).into_response();
    }

    let raw_id = match resolver.sessions().create(resolver.session_data()) {
        Ok(raw_id) => raw_id,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut res = api_ok(Value::Null);
    if let Ok(cookie) = HeaderValue::from_str(&call.ctx.session.session_cookie(&raw_id)) {
        res.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    info!("session login");
    res
}

async fn logout_auth(call: ApiCall) -> Response {
    if let Some(raw_id) = cookie_value(&call.headers, &call.ctx.session.cookie_name) {
        if let Err(e) = call.ctx.resolver.sessions().destroy(&raw_id) {
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    }

    let mut res = api_ok(Value::Null);
    if let Ok(cookie) = HeaderValue::from_str(&call.ctx.session.expired_cookie()) {
        res.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    res
}

async fn set_read_only(call: ApiCall) -> Response {
    let Some(read_only) = call.body.get("readOnly").and_then(Value::as_bool) else {
        return api_error(StatusCode::BAD_REQUEST, "Bad Request");
    };
    call.ctx.read_only.set(read_only);
    api_ok(json!({ "readOnly": read_only }))
}

async fn version(_call: ApiCall) -> Response {
    api_ok(json!({ "version": env!("CARGO_PKG_VERSION") }))
}
