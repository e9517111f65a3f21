//! The dispatch loop: wakes on an explicit trigger or a 30 s heartbeat,
//! whichever comes first (spec.md §4.3).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::error;

use crate::cycle::Dispatcher;
use crate::trigger::{channel, DispatchTrigger};

const HEARTBEAT: Duration = Duration::from_secs(30);

/// Spawns the dispatch loop and returns a [`DispatchTrigger`] callers use to
/// request an immediate wake (e.g. after a task is created or an agent goes
/// idle) instead of waiting out the heartbeat. `is_emperor` gates every
/// wake: dispatching is emperor-only work (spec.md §4.3, §4.7), and a
/// failover simply starts ticking on whichever node the watch channel
/// reports as the new emperor.
pub fn spawn(dispatcher: Arc<Dispatcher>, is_emperor: watch::Receiver<bool>) -> DispatchTrigger {
    let (trigger, mut source) = channel();

    tokio::spawn(async move {
        let mut ticker = interval(HEARTBEAT);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                woken = source.recv() => {
                    if woken.is_none() {
                        break;
                    }
                }
            }
            if !*is_emperor.borrow() {
                continue;
            }
            if let Err(e) = dispatcher.run_cycle().await {
                error!(error = %e, "dispatch cycle failed");
            }
        }
    });

    trigger
}
