//! # HTTP Server
//!
//! Assembles the gateway: shared state, the branch table and the axum
//! router, then binds the single listening port.
//!
//! Layer order, outermost first: request tracing, CORS (answers
//! preflights), credential resolution, then routes. Everything that is not
//! `/`, `/check-auth` or `/ws` falls through to the branch dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::api_routes::{ApiContext, ApiRouter};
use super::backend::{ProtocolBackend, UploadDir};
use super::branch::{dispatch, Branch, BranchTable};
use super::channel_routes::{channel_upgrade, CHANNEL_PATH};
use super::config::GatewayConfig;
use super::dav_routes::{dav_branches, DavBackends};
use super::errors::{GatewayError, GatewayResult};
use super::middleware::resolve_credentials;
use super::page_routes::{auth_page, root_redirect, AUTH_PAGE_PATH};
use super::state::GatewayState;
use super::static_routes::{static_branches, upload_branch};
use crate::auth::{CredentialResolver, InMemorySessionStore, RoleSet, SessionStore, TokenManager};
use crate::channel::{CommandChannel, CommandRegistry};
use crate::policy::{cors_middleware, ProtocolFamily, ReadOnlyGate};

/// Prefix of the control API branch
pub const API_PREFIX: &str = "/api";

/// How often expired sessions are purged
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 10);

/// What to do when the listening port cannot be bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Fail with [`GatewayError::Bind`]
    Strict,
    /// Log and return without serving
    Lenient,
}

/// How [`HttpServer::start`] finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// The listener ran until the accept loop ended
    Served,
    /// Lenient boot skipped serving because the port was unavailable
    Skipped,
}

type ApiExtension = Box<dyn FnOnce(ApiRouter) -> ApiRouter + Send>;

/// Collects the pluggable collaborators before the server is built
pub struct HttpServerBuilder {
    config: GatewayConfig,
    commands: CommandRegistry,
    dav: DavBackends,
    upload: Option<Arc<dyn ProtocolBackend>>,
    api_extensions: Vec<ApiExtension>,
    branches: Vec<Branch>,
}

impl HttpServerBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            commands: CommandRegistry::with_builtins(),
            dav: DavBackends::default(),
            upload: None,
            api_extensions: Vec::new(),
            branches: Vec::new(),
        }
    }

    /// Replace the command table
    pub fn commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = commands;
        self
    }

    pub fn dav_backends(mut self, dav: DavBackends) -> Self {
        self.dav = dav;
        self
    }

    pub fn upload_backend(mut self, backend: Arc<dyn ProtocolBackend>) -> Self {
        self.upload = Some(backend);
        self
    }

    /// Add routes to the control API table
    pub fn api_routes<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ApiRouter) -> ApiRouter + Send + 'static,
    {
        self.api_extensions.push(Box::new(f));
        self
    }

    /// Add a branch; replaces any built-in branch with the same prefix
    pub fn branch(mut self, branch: Branch) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn build(self) -> HttpServer {
        let config = self.config;

        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(&config.session));
        let resolver = Arc::new(CredentialResolver::new(
            TokenManager::new(config.jwt.clone()),
            sessions,
            config.session.cookie_name.clone(),
            config.workspace_key(),
            config.access_auth_code.clone(),
        ));
        let read_only = Arc::new(ReadOnlyGate::new(config.read_only));
        let channel = Arc::new(CommandChannel::new(
            Arc::clone(&resolver),
            Arc::clone(&read_only),
            self.commands,
            config.lang,
        ));

        let mut api = ApiRouter::with_builtins(ApiContext {
            resolver: Arc::clone(&resolver),
            read_only: Arc::clone(&read_only),
            session: config.session.clone(),
            lang: config.lang,
        });
        for extend in self.api_extensions {
            api = extend(api);
        }

        let upload = self
            .upload
            .unwrap_or_else(|| Arc::new(UploadDir::new(config.data_dir.join("assets"))));

        let mut branches = BranchTable::new();
        for branch in dav_branches(&self.dav)
            .into_iter()
            .chain(static_branches(&config))
        {
            branches.insert(branch);
        }
        branches.insert(upload_branch(upload));
        branches.insert(
            Branch::new(
                "api",
                API_PREFIX,
                ProtocolFamily::Generic,
                RoleSet::ANY,
                Arc::new(api),
            )
            .gated_by_backend()
            .serialized(),
        );
        for branch in self.branches {
            branches.insert(branch);
        }

        let state = Arc::new(GatewayState {
            lang: config.lang,
            config,
            resolver,
            read_only,
            channel,
            branches,
            api_gate: Semaphore::new(1),
        });
        let router = build_router(Arc::clone(&state));

        HttpServer { state, router }
    }
}

fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(root_redirect))
        .route(AUTH_PAGE_PATH, get(auth_page))
        .route(CHANNEL_PATH, get(channel_upgrade))
        .fallback(dispatch)
        .layer(from_fn_with_state(Arc::clone(&state), resolve_credentials))
        .layer(from_fn(cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The gateway, ready to serve
pub struct HttpServer {
    state: Arc<GatewayState>,
    router: Router,
}

impl HttpServer {
    pub fn builder(config: GatewayConfig) -> HttpServerBuilder {
        HttpServerBuilder::new(config)
    }

    /// Create a new HTTP server with custom configuration
    pub fn with_config(config: GatewayConfig) -> Self {
        HttpServerBuilder::new(config).build()
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.state.config.socket_addr()
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address and serve, honoring `mode` on bind failure
    pub async fn start(self, mode: BootMode) -> GatewayResult<BootOutcome> {
        let addr = self.state.config.parse_socket_addr()?;
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!(addr = %addr, error = %source, "bind listener failed");
                return match mode {
                    BootMode::Lenient => {
                        warn!(addr = %addr, "port unavailable, continuing without the gateway");
                        Ok(BootOutcome::Skipped)
                    }
                    BootMode::Strict => Err(GatewayError::Bind { addr, source }),
                };
            }
        };

        self.serve(listener).await?;
        Ok(BootOutcome::Served)
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> GatewayResult<()> {
        let addr = listener.local_addr()?;
        info!(pid = std::process::id(), addr = %addr, "kernel gateway is booting");

        let sessions = Arc::clone(self.state.resolver.sessions());
        let purge = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                match sessions.purge_expired() {
                    Ok(0) => {}
                    Ok(n) => debug!(purged = n, "expired sessions removed"),
                    Err(e) => warn!(error = %e, "session purge failed"),
                }
            }
        });

        let result = axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;

        purge.abort();
        result.map_err(GatewayError::from)
    }
}
