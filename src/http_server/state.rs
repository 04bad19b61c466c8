//! Shared gateway state.

use std::sync::Arc;

use tokio::sync::Semaphore;

use super::branch::BranchTable;
use super::config::GatewayConfig;
use crate::auth::CredentialResolver;
use crate::channel::CommandChannel;
use crate::lang::Lang;
use crate::policy::ReadOnlyGate;

/// State shared by every handler and middleware
pub struct GatewayState {
    pub config: GatewayConfig,
    pub resolver: Arc<CredentialResolver>,
    pub read_only: Arc<ReadOnlyGate>,
    pub channel: Arc<CommandChannel>,
    pub branches: BranchTable,
    /// Single-flight gate for serialized branches; FIFO by acquisition
    pub api_gate: Semaphore,
    pub lang: Lang,
}
