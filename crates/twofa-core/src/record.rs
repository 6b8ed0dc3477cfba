//! The mutable two-factor record and its dirty-tracking observer.
//!
//! An [`AuthRecord`] is a cheap, cloneable handle to one identity's state.
//! Every setter updates the in-memory field and then synchronously notifies
//! the record's [`DirtyObserver`]. The record holds only a weak reference to
//! its observer, so a record outliving its data source simply stops
//! reporting.

use std::{
  fmt,
  net::IpAddr,
  sync::{Arc, Weak},
};

use parking_lot::Mutex;
use uuid::Uuid;

// ─── Observer ────────────────────────────────────────────────────────────────

/// Receives a record every time one of its setters runs.
pub trait DirtyObserver: Send + Sync {
  fn mark_dirty(&self, record: &AuthRecord);
}

// ─── State ───────────────────────────────────────────────────────────────────

/// The mutable attributes of a record, detached from its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordState {
  /// Address of the last successful verification.
  pub last_address: Option<IpAddr>,
  /// Shared TOTP secret; `None` until enrolment completes.
  pub secret:       Option<String>,
  /// Administrative lock-out flag.
  pub locked:       bool,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One identity's two-factor state.
///
/// Clones share the same underlying state; a mutation through any clone is
/// visible through all of them.
#[derive(Clone)]
pub struct AuthRecord {
  inner: Arc<Inner>,
}

struct Inner {
  identity: Uuid,
  state:    Mutex<RecordState>,
  observer: Weak<dyn DirtyObserver>,
}

impl AuthRecord {
  pub fn new(identity: Uuid, state: RecordState, observer: Weak<dyn DirtyObserver>) -> Self {
    Self {
      inner: Arc::new(Inner {
        identity,
        state: Mutex::new(state),
        observer,
      }),
    }
  }

  pub fn identity(&self) -> Uuid { self.inner.identity }

  pub fn last_address(&self) -> Option<IpAddr> { self.inner.state.lock().last_address }

  pub fn secret(&self) -> Option<String> { self.inner.state.lock().secret.clone() }

  pub fn is_locked(&self) -> bool { self.inner.state.lock().locked }

  /// Copy of the current mutable state.
  pub fn snapshot(&self) -> RecordState { self.inner.state.lock().clone() }

  pub fn set_last_address(&self, address: Option<IpAddr>) {
    self.inner.state.lock().last_address = address;
    self.notify();
  }

  pub fn set_secret(&self, secret: Option<String>) {
    self.inner.state.lock().secret = secret;
    self.notify();
  }

  pub fn set_locked(&self, locked: bool) {
    self.inner.state.lock().locked = locked;
    self.notify();
  }

  /// Whether `self` and `other` are handles to the same entity.
  pub fn same_entity(&self, other: &AuthRecord) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }

  // The state lock must be released before this runs: observers may snapshot.
  fn notify(&self) {
    if let Some(observer) = self.inner.observer.upgrade() {
      observer.mark_dirty(self);
    }
  }
}

impl fmt::Debug for AuthRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.snapshot();
    f.debug_struct("AuthRecord")
      .field("identity", &self.inner.identity)
      .field("last_address", &state.last_address)
      .field("enrolled", &state.secret.is_some())
      .field("locked", &state.locked)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[derive(Default)]
  struct Counter {
    calls: AtomicUsize,
  }

  impl DirtyObserver for Counter {
    fn mark_dirty(&self, record: &AuthRecord) {
      // Reading back must not deadlock against the setter.
      let _ = record.snapshot();
      self.calls.fetch_add(1, Ordering::SeqCst);
    }
  }

  fn record_with(counter: &Arc<Counter>) -> AuthRecord {
    let observer: Weak<Counter> = Arc::downgrade(counter);
    AuthRecord::new(Uuid::new_v4(), RecordState::default(), observer)
  }

  #[test]
  fn every_setter_notifies_once() {
    let counter = Arc::new(Counter::default());
    let record = record_with(&counter);

    record.set_secret(Some("ABCDEFGHIJKLMNOP".into()));
    record.set_last_address(Some("203.0.113.5".parse().unwrap()));
    record.set_locked(true);

    assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
    assert_eq!(record.secret().as_deref(), Some("ABCDEFGHIJKLMNOP"));
    assert_eq!(record.last_address(), Some("203.0.113.5".parse().unwrap()));
    assert!(record.is_locked());
  }

  #[test]
  fn getters_do_not_notify() {
    let counter = Arc::new(Counter::default());
    let record = record_with(&counter);

    let _ = record.identity();
    let _ = record.secret();
    let _ = record.last_address();
    let _ = record.is_locked();

    assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn clones_share_state() {
    let counter = Arc::new(Counter::default());
    let record = record_with(&counter);
    let other = record.clone();

    other.set_locked(true);
    assert!(record.is_locked());
    assert!(record.same_entity(&other));
  }

  #[test]
  fn dropped_observer_is_ignored() {
    let counter = Arc::new(Counter::default());
    let record = record_with(&counter);
    drop(counter);

    record.set_locked(true);
    assert!(record.is_locked());
  }

  #[test]
  fn debug_hides_secret() {
    let counter = Arc::new(Counter::default());
    let record = record_with(&counter);
    record.set_secret(Some("ABCDEFGHIJKLMNOP".into()));

    let rendered = format!("{record:?}");
    assert!(!rendered.contains("ABCDEFGHIJKLMNOP"));
    assert!(rendered.contains("enrolled: true"));
  }
}
