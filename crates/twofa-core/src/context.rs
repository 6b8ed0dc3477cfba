//! Scheduling-context descriptors.
//!
//! The host has one latency-sensitive context (a game server's main tick
//! thread, for instance) that must never wait on store I/O. Data sources are
//! handed a [`SchedulingContext`] and refuse blocking work when it reports
//! that the caller is on that context.

use std::thread::{self, ThreadId};

use crate::{Error, Result};

pub trait SchedulingContext: Send + Sync {
  /// Whether the current caller is running on the primary context.
  fn is_primary(&self) -> bool;
}

/// Treats one OS thread as primary.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryThread {
  id: ThreadId,
}

impl PrimaryThread {
  /// Mark the calling thread as the primary context.
  pub fn current() -> Self { Self { id: thread::current().id() } }

  pub fn new(id: ThreadId) -> Self { Self { id } }
}

impl SchedulingContext for PrimaryThread {
  fn is_primary(&self) -> bool { thread::current().id() == self.id }
}

/// No primary context: every caller may block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl SchedulingContext for Unrestricted {
  fn is_primary(&self) -> bool { false }
}

/// Fail with [`Error::ThreadingViolation`] if called on the primary context.
pub fn ensure_off_primary(context: &dyn SchedulingContext, operation: &'static str) -> Result<()> {
  if context.is_primary() {
    tracing::error!(operation, "blocking store operation attempted on the primary context");
    return Err(Error::ThreadingViolation { operation });
  }
  Ok(())
}
