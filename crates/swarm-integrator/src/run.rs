//! Background integration sweep: periodically scans for parents in
//! `Merging` and drives each through [`integrate_parent`] (spec.md §4.4).
//! Restart-safe by construction — a parent still `Merging` on this node
//! resumes from wherever `merge_attempts` left off; one a peer already
//! finished reports [`crate::IntegrationOutcome::LostRace`] and is skipped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use swarm_model::{LamportClock, TaskStatus};
use swarm_store::Store;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::collaborator::GitCollaborator;
use crate::integrate::integrate_parent;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns the integration sweep loop. `is_emperor` gates every tick the
/// same way dispatch is gated (spec.md §4.3, §4.7) — only the emperor
/// drives merges; a failover simply starts a new sweep on the winner.
pub fn spawn(
    store: Arc<Store>,
    clock: Arc<LamportClock>,
    collaborator: Arc<dyn GitCollaborator>,
    is_emperor: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if !*is_emperor.borrow() {
                continue;
            }

            let merging = match store.list_by_status(TaskStatus::Merging) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(error = %e, "failed to list merging tasks");
                    continue;
                }
            };

            for parent in merging {
                let workbench_root = PathBuf::from(&parent.project_path);
                match integrate_parent(&store, &clock, parent.id, &workbench_root, collaborator.as_ref()).await {
                    Ok(outcome) => debug!(parent_id = %parent.id, ?outcome, "integration attempt finished"),
                    Err(e) => warn!(parent_id = %parent.id, error = %e, "integration attempt failed"),
                }
            }
        }
    });
}
