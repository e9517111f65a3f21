//! A coalesced 1-slot trigger (spec.md §4.3: "a single coroutine bound to a
//! 1-slot channel"). `trigger()` never blocks: if a wake is already
//! pending, another push is a no-op.

use tokio::sync::mpsc;

#[derive(Clone)]
pub struct DispatchTrigger {
    tx: mpsc::Sender<()>,
}

pub struct DispatchTriggerSource {
    rx: mpsc::Receiver<()>,
}

pub fn channel() -> (DispatchTrigger, DispatchTriggerSource) {
    let (tx, rx) = mpsc::channel(1);
    (DispatchTrigger { tx }, DispatchTriggerSource { rx })
}

impl DispatchTrigger {
    /// Non-blocking push. A full channel means a wake is already queued, so
    /// the extra push is simply dropped.
    pub fn fire(&self) {
        let _ = self.tx.try_send(());
    }
}

impl DispatchTriggerSource {
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}
