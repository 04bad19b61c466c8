//! # Command Handlers
//!
//! Named handlers reachable over the command channel. Each handler declares
//! whether it only reads; everything else is treated as mutating and goes
//! through the read-only re-check before it runs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;

use super::envelope::{CommandEnvelope, ResultEnvelope};
use super::registry::{ConnectionInfo, ConnectionRegistry};
use crate::auth::Role;

/// Future returned by a command handler
pub type CommandFuture = Pin<Box<dyn Future<Output = ResultEnvelope> + Send + 'static>>;

/// Everything a handler may look at while running one command
#[derive(Clone)]
pub struct CommandContext {
    pub envelope: CommandEnvelope,
    pub connection: ConnectionInfo,
    /// Role in effect for this message after per-message token checks
    pub role: Role,
    pub registry: Arc<ConnectionRegistry>,
}

/// A command reachable over the channel
pub trait CommandHandler: Send + Sync {
    /// True when the command never changes workspace state
    fn is_read(&self) -> bool;

    /// Run the command. The reply is tagged with `cmd`/`reqId` by the caller.
    fn exec(&self, ctx: CommandContext) -> CommandFuture;
}

/// Adapter turning an async closure into a [`CommandHandler`]
struct FnCommand<F> {
    read: bool,
    f: F,
}

impl<F, Fut> CommandHandler for FnCommand<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = ResultEnvelope> + Send + 'static,
{
    fn is_read(&self) -> bool {
        self.read
    }

    fn exec(&self, ctx: CommandContext) -> CommandFuture {
        Box::pin((self.f)(ctx))
    }
}

/// Name → handler table
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in commands
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_fn("ping", true, |_ctx| async {
            ResultEnvelope::ok(json!({ "pong": true }))
        });
        registry.register_fn("whoami", true, |ctx| async move {
            ResultEnvelope::ok(json!({
                "connection": ctx.connection.id.to_string(),
                "app": ctx.connection.tag.app,
                "role": ctx.role,
            }))
        });
        registry
    }

    /// Add or replace a handler
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Register an async closure as a handler
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, read: bool, f: F)
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResultEnvelope> + Send + 'static,
    {
        self.register(name, Arc::new(FnCommand { read, f }));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}
