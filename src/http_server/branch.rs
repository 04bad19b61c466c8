//! # Protocol Router
//!
//! Every request that is not a page or the command channel lands here and
//! is matched against the branch table by longest path prefix. A branch
//! cannot be built without a role requirement, and dispatch runs the same
//! sequence for every branch before its backend sees the request:
//!
//! 1. method in the branch's set, else 405
//! 2. resolved role in the branch's requirement, else 403
//! 3. read-only gate for mutating verbs, else 403
//! 4. single-flight gate, for serialized branches
//!
//! Unmatched paths are 404.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error};

use super::backend::ProtocolBackend;
use super::state::GatewayState;
use crate::auth::{authorize, ResolvedAuth, RoleSet};
use crate::channel::ResultEnvelope;
use crate::policy::{path_matches_prefix, PolicyError, ProtocolFamily};

/// One routable protocol root
#[derive(Clone)]
pub struct Branch {
    name: &'static str,
    prefix: String,
    family: ProtocolFamily,
    methods: &'static [&'static str],
    requirement: RoleSet,
    gate_mutations: bool,
    serialized: bool,
    backend: Arc<dyn ProtocolBackend>,
}

impl Branch {
    /// New branch accepting the family's full method set
    pub fn new(
        name: &'static str,
        prefix: impl Into<String>,
        family: ProtocolFamily,
        requirement: RoleSet,
        backend: Arc<dyn ProtocolBackend>,
    ) -> Self {
        Self {
            name,
            prefix: prefix.into(),
            family,
            methods: family.methods(),
            requirement,
            gate_mutations: true,
            serialized: false,
            backend,
        }
    }

    /// Restrict to a subset of the family's verbs
    pub fn methods(mut self, methods: &'static [&'static str]) -> Self {
        self.methods = methods;
        self
    }

    /// Leave read-only enforcement to the backend's own route table
    pub fn gated_by_backend(mut self) -> Self {
        self.gate_mutations = false;
        self
    }

    /// Run requests one at a time behind the single-flight gate
    pub fn serialized(mut self) -> Self {
        self.serialized = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn family(&self) -> ProtocolFamily {
        self.family
    }

    pub fn requirement(&self) -> RoleSet {
        self.requirement
    }

    pub fn is_serialized(&self) -> bool {
        self.serialized
    }

    fn allows(&self, method: &Method) -> bool {
        self.methods.contains(&method.as_str())
    }

    fn allow_header(&self) -> String {
        self.methods.join(", ")
    }
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("family", &self.family)
            .field("requirement", &self.requirement)
            .field("serialized", &self.serialized)
            .finish()
    }
}

/// Branches ordered for longest-prefix matching
#[derive(Debug, Clone, Default)]
pub struct BranchTable {
    branches: Vec<Branch>,
}

impl BranchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch; a branch with the same prefix is replaced
    pub fn insert(&mut self, branch: Branch) {
        self.branches.retain(|b| b.prefix != branch.prefix);
        self.branches.push(branch);
        self.branches
            .sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
    }

    pub fn with(mut self, branch: Branch) -> Self {
        self.insert(branch);
        self
    }

    /// Longest registered prefix of `path`
    pub fn select(&self, path: &str) -> Option<&Branch> {
        self.branches
            .iter()
            .find(|b| path_matches_prefix(path, &b.prefix))
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter()
    }
}

fn envelope_response(status: StatusCode, msg: &str) -> Response {
    (status, Json(ResultEnvelope::error(msg))).into_response()
}

/// Router fallback: gate and hand off to the matched branch
pub async fn dispatch(State(state): State<Arc<GatewayState>>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let Some(branch) = state.branches.select(&path).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let method = req.method().clone();
    if !branch.allows(&method) {
        let mut res = StatusCode::METHOD_NOT_ALLOWED.into_response();
        if let Ok(allow) = HeaderValue::from_str(&branch.allow_header()) {
            res.headers_mut().insert(header::ALLOW, allow);
        }
        return res;
    }

    let auth = req
        .extensions()
        .get::<ResolvedAuth>()
        .cloned()
        .unwrap_or_else(ResolvedAuth::visitor);

    if !authorize(auth.role, branch.requirement) {
        debug!(branch = branch.name, role = %auth.role, path = %path, "forbidden");
        return envelope_response(StatusCode::FORBIDDEN, state.lang.forbidden());
    }

    if branch.gate_mutations {
        if let Err(e) = state.read_only.check_method(branch.family, &method) {
            debug!(branch = branch.name, method = %method, error = %e, "denied by policy");
            return match e {
                PolicyError::ReadOnly => {
                    envelope_response(StatusCode::FORBIDDEN, state.lang.read_only_denied())
                }
                PolicyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED.into_response(),
            };
        }
    }

    let res = if branch.serialized {
        // Semaphore is closed only on shutdown
        let Ok(_permit) = state.api_gate.acquire().await else {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        };
        branch.backend.serve(req).await
    } else {
        branch.backend.serve(req).await
    };

    if res.status().is_server_error() {
        error!(
            branch = branch.name,
            method = %method,
            path = %path,
            status = res.status().as_u16(),
            "backend failed"
        );
    }
    res
}
