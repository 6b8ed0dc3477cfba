//! Write-back buffer for dirty records and pending deletions.
//!
//! Mutations accumulate here between flushes. [`WriteBackBuffer::take`]
//! swaps both pending sets for empty ones under their locks and returns a
//! [`FlushBatch`]; the caller performs I/O on the batch without holding any
//! lock, so concurrent mutators land in the fresh sets.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::record::{AuthRecord, DirtyObserver, RecordState};

// ─── Buffer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct WriteBackBuffer {
  updates:   Mutex<HashMap<Uuid, AuthRecord>>,
  deletions: Mutex<HashSet<Uuid>>,
}

/// Number of entries currently staged in each set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
  pub updates:   usize,
  pub deletions: usize,
}

impl PendingCounts {
  pub fn is_empty(&self) -> bool { self.updates == 0 && self.deletions == 0 }
}

impl WriteBackBuffer {
  pub fn new() -> Self { Self::default() }

  /// Stage `record` for upsert. A later call for the same identity replaces
  /// the earlier handle rather than adding a second entry.
  pub fn stage_update(&self, record: &AuthRecord) {
    self.updates.lock().insert(record.identity(), record.clone());
  }

  /// Stage `identity` for deletion. Pending updates are left alone; the
  /// deletion wins when the batch is built.
  pub fn stage_deletion(&self, identity: Uuid) { self.deletions.lock().insert(identity); }

  pub fn pending(&self) -> PendingCounts {
    PendingCounts {
      updates:   self.updates.lock().len(),
      deletions: self.deletions.lock().len(),
    }
  }

  /// Capture and clear both pending sets.
  ///
  /// Deletions are swapped before updates. A mutation staged before a
  /// deletion of the same identity therefore never lands in a later batch
  /// than that deletion.
  pub fn take(&self) -> FlushBatch {
    let deletions = std::mem::take(&mut *self.deletions.lock());
    let updates = std::mem::take(&mut *self.updates.lock());
    FlushBatch::new(updates, deletions)
  }
}

impl DirtyObserver for WriteBackBuffer {
  fn mark_dirty(&self, record: &AuthRecord) { self.stage_update(record); }
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// A staged upsert: the record's state as of the swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRow {
  pub identity: Uuid,
  pub state:    RecordState,
}

/// The writes a single flush must apply, in deterministic identity order.
#[derive(Debug, Default)]
pub struct FlushBatch {
  pub deletions: Vec<Uuid>,
  pub upserts:   Vec<StagedRow>,
  /// Updates discarded because the same identity was staged for deletion.
  pub dropped:   usize,
}

impl FlushBatch {
  fn new(updates: HashMap<Uuid, AuthRecord>, deletions: HashSet<Uuid>) -> Self {
    let mut dropped = 0;
    let mut upserts: Vec<StagedRow> = updates
      .into_values()
      .filter(|record| {
        let doomed = deletions.contains(&record.identity());
        dropped += usize::from(doomed);
        !doomed
      })
      .map(|record| StagedRow {
        identity: record.identity(),
        state:    record.snapshot(),
      })
      .collect();
    upserts.sort_by_key(|row| row.identity);

    let mut deletions: Vec<Uuid> = deletions.into_iter().collect();
    deletions.sort();

    Self { deletions, upserts, dropped }
  }

  pub fn is_empty(&self) -> bool { self.deletions.is_empty() && self.upserts.is_empty() }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Arc, Weak,
      atomic::{AtomicBool, Ordering},
    },
    thread,
  };

  use super::*;

  fn buffer() -> Arc<WriteBackBuffer> { Arc::new(WriteBackBuffer::new()) }

  fn record(buffer: &Arc<WriteBackBuffer>, identity: Uuid) -> AuthRecord {
    let observer: Weak<WriteBackBuffer> = Arc::downgrade(buffer);
    AuthRecord::new(identity, RecordState::default(), observer)
  }

  #[test]
  fn mutation_stages_record_once() {
    let buf = buffer();
    let rec = record(&buf, Uuid::new_v4());

    rec.set_secret(Some("ABCDEFGHIJKLMNOP".into()));
    rec.set_locked(true);
    rec.set_locked(false);

    assert_eq!(buf.pending(), PendingCounts { updates: 1, deletions: 0 });
  }

  #[test]
  fn batch_reflects_latest_state() {
    let buf = buffer();
    let rec = record(&buf, Uuid::new_v4());

    rec.set_secret(Some("AAAAAAAAAAAAAAAA".into()));
    rec.set_secret(Some("BBBBBBBBBBBBBBBB".into()));

    let batch = buf.take();
    assert_eq!(batch.upserts.len(), 1);
    assert_eq!(
      batch.upserts[0].state.secret.as_deref(),
      Some("BBBBBBBBBBBBBBBB")
    );
  }

  #[test]
  fn deletion_wins_over_update() {
    let buf = buffer();
    let id = Uuid::new_v4();
    let rec = record(&buf, id);

    rec.set_locked(true);
    buf.stage_deletion(id);

    let batch = buf.take();
    assert!(batch.upserts.is_empty());
    assert_eq!(batch.deletions, vec![id]);
    assert_eq!(batch.dropped, 1);
  }

  #[test]
  fn update_after_deletion_in_same_cycle_is_still_dropped() {
    let buf = buffer();
    let id = Uuid::new_v4();
    let rec = record(&buf, id);

    buf.stage_deletion(id);
    rec.set_secret(Some("ABCDEFGHIJKLMNOP".into()));

    let batch = buf.take();
    assert!(batch.upserts.is_empty());
    assert_eq!(batch.deletions, vec![id]);
  }

  #[test]
  fn take_clears_both_sets() {
    let buf = buffer();
    record(&buf, Uuid::new_v4()).set_locked(true);
    buf.stage_deletion(Uuid::new_v4());

    assert!(!buf.take().is_empty());
    assert!(buf.pending().is_empty());
    assert!(buf.take().is_empty());
  }

  #[test]
  fn mutation_after_take_goes_to_next_batch() {
    let buf = buffer();
    let rec = record(&buf, Uuid::new_v4());

    rec.set_locked(true);
    let first = buf.take();
    rec.set_locked(false);
    let second = buf.take();

    assert_eq!(first.upserts.len(), 1);
    assert_eq!(second.upserts.len(), 1);
    assert!(!second.upserts[0].state.locked);
  }

  #[test]
  fn batch_is_sorted_by_identity() {
    let buf = buffer();
    for n in [5u128, 1, 3] {
      record(&buf, Uuid::from_u128(n)).set_locked(true);
      buf.stage_deletion(Uuid::from_u128(n + 100));
    }

    let batch = buf.take();
    let upserted: Vec<_> = batch.upserts.iter().map(|r| r.identity.as_u128()).collect();
    let deleted: Vec<_> = batch.deletions.iter().map(|id| id.as_u128()).collect();
    assert_eq!(upserted, vec![1, 3, 5]);
    assert_eq!(deleted, vec![101, 103, 105]);
  }

  #[test]
  fn concurrent_mutators_lose_nothing() {
    let buf = buffer();
    let threads = 8;
    let per_thread = 200;

    let handles: Vec<_> = (0..threads)
      .map(|t| {
        let buf = buf.clone();
        thread::spawn(move || {
          let mut taken = Vec::new();
          for i in 0..per_thread {
            let id = Uuid::from_u128((t * per_thread + i) as u128);
            record(&buf, id).set_locked(true);
            if i % 50 == 0 {
              taken.push(buf.take());
            }
          }
          taken
        })
      })
      .collect();

    let mut seen = HashSet::new();
    for handle in handles {
      for batch in handle.join().unwrap() {
        for row in batch.upserts {
          assert!(seen.insert(row.identity), "identity flushed twice");
        }
      }
    }
    for row in buf.take().upserts {
      assert!(seen.insert(row.identity), "identity flushed twice");
    }

    assert_eq!(seen.len(), threads * per_thread);
  }

  #[test]
  fn mutate_then_destroy_never_resurrects_under_concurrent_take() {
    let buf = buffer();
    let done = Arc::new(AtomicBool::new(false));

    let flusher = {
      let buf = buf.clone();
      let done = done.clone();
      thread::spawn(move || {
        let mut batches = Vec::new();
        while !done.load(Ordering::SeqCst) {
          batches.push(buf.take());
        }
        batches
      })
    };

    for n in 0..20_000u128 {
      let id = Uuid::from_u128(n);
      record(&buf, id).set_locked(true);
      buf.stage_deletion(id);
    }
    done.store(true, Ordering::SeqCst);

    let mut batches = flusher.join().unwrap();
    batches.push(buf.take());

    // Replay in flush order: deletions, then upserts, batch by batch.
    let mut stored = HashSet::new();
    for batch in batches {
      for id in &batch.deletions {
        stored.remove(id);
      }
      for row in &batch.upserts {
        stored.insert(row.identity);
      }
    }
    assert!(stored.is_empty(), "{} deleted identities came back", stored.len());
  }
}
