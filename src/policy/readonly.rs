//! # Read-Only Gate
//!
//! A process-wide lock. While set, every operation classified as mutating
//! is denied for every role, Administrator included.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::Method;
use tracing::info;

use super::errors::{PolicyError, PolicyResult};
use super::methods::{MethodClass, ProtocolFamily};

#[derive(Debug, Default)]
pub struct ReadOnlyGate {
    locked: AtomicBool,
}

impl ReadOnlyGate {
    pub fn new(locked: bool) -> Self {
        Self {
            locked: AtomicBool::new(locked),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Set the flag; returns the previous value
    pub fn set(&self, locked: bool) -> bool {
        let previous = self.locked.swap(locked, Ordering::SeqCst);
        if previous != locked {
            info!(read_only = locked, "read-only mode changed");
        }
        previous
    }

    /// Allow or deny an operation of the given class
    pub fn check(&self, class: MethodClass) -> PolicyResult<()> {
        if class.is_mutating() && self.is_locked() {
            Err(PolicyError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Classify `method` within `family`, then [`check`](Self::check) it
    pub fn check_method(&self, family: ProtocolFamily, method: &Method) -> PolicyResult<()> {
        match family.classify(method) {
            Some(class) => self.check(class),
            None => Err(PolicyError::MethodNotAllowed(method.to_string())),
        }
    }
}
