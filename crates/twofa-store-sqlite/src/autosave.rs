//! Periodic background flushing.

use std::{sync::Arc, time::Duration};

use tokio::{
  sync::oneshot,
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tracing::{debug, warn};
use twofa_core::source::UserDataSource;

/// Handle to a running autosave task.
///
/// Dropping the handle also stops the task, after one last flush.
pub struct AutosaveHandle {
  stop: oneshot::Sender<()>,
  task: JoinHandle<()>,
}

impl AutosaveHandle {
  /// Stop the task, waiting for its final flush to finish.
  pub async fn shutdown(self) {
    let Self { stop, task } = self;
    let _ = stop.send(());
    if let Err(e) = task.await {
      warn!(error = %e, "autosave task did not shut down cleanly");
    }
  }
}

/// Spawn a task that calls [`save`](UserDataSource::save) every `interval`.
///
/// Failures are logged and the next tick tries again; nothing is retried in
/// between.
pub fn spawn_autosave<S>(source: Arc<S>, interval: Duration) -> AutosaveHandle
where
  S: UserDataSource + 'static,
{
  let (stop, mut stopped) = oneshot::channel::<()>();

  let task = tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
      tokio::select! {
        _ = ticker.tick() => {
          if let Err(e) = source.save().await {
            warn!(error = %e, "autosave failed");
          }
        }
        _ = &mut stopped => break,
      }
    }

    if let Err(e) = source.save().await {
      warn!(error = %e, "final autosave failed");
    }
    debug!("autosave stopped");
  });

  AutosaveHandle { stop, task }
}
