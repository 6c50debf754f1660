//! Debounced persistence writer.
//!
//! Snapshots sent to the writer wait for a quiet period; each new one
//! restarts the timer and replaces the previous. When the timer fires the
//! snapshot goes to the gateway. At most one write runs at a time; a
//! snapshot that becomes due during a write waits in a single slot, and
//! only the newest one is kept there.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::error::Result;
use crate::model::Project;
use crate::storage::{Gateway, Source};

/// In-flight flag plus a last-writer-wins slot.
#[derive(Debug)]
pub struct SaveQueue<T> {
    in_flight: bool,
    queued: Option<T>,
}

impl<T> Default for SaveQueue<T> {
    fn default() -> Self {
        Self {
            in_flight: false,
            queued: None,
        }
    }
}

impl<T> SaveQueue<T> {
    /// Returns the snapshot back when it should be written now. Otherwise
    /// it replaces whatever was queued.
    pub fn request(&mut self, snapshot: T) -> Option<T> {
        if self.in_flight {
            self.queued = Some(snapshot);
            None
        } else {
            self.in_flight = true;
            Some(snapshot)
        }
    }

    /// Mark the running write finished. Returns the queued snapshot, which
    /// the caller must start writing immediately.
    pub fn complete(&mut self) -> Option<T> {
        match self.queued.take() {
            Some(next) => Some(next),
            None => {
                self.in_flight = false;
                None
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub writes: usize,
    pub failures: usize,
    pub last_source: Option<Source>,
}

enum Command {
    Save(Vec<Project>),
    Flush(oneshot::Sender<()>),
}

/// Handle to a running writer task.
pub struct Writer {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<WriterStats>,
}

impl Writer {
    /// Spawn the writer on the current tokio runtime.
    pub fn spawn(gateway: Arc<Gateway>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(gateway, debounce, rx));
        Self { tx, task }
    }

    /// Schedule a snapshot. Never blocks.
    pub fn save(&self, snapshot: Vec<Project>) {
        if self.tx.send(Command::Save(snapshot)).is_err() {
            debug!("writer stopped, snapshot discarded");
        }
    }

    /// Write any pending snapshot now and wait until the writer is idle.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush, stop the task, and report what it did.
    pub async fn shutdown(self) -> WriterStats {
        drop(self.tx);
        self.task.await.unwrap_or_default()
    }
}

fn spawn_write(
    gateway: &Arc<Gateway>,
    done: &mpsc::UnboundedSender<Result<Source>>,
    snapshot: Vec<Project>,
) {
    let gateway = Arc::clone(gateway);
    let done = done.clone();
    tokio::task::spawn_blocking(move || {
        let _ = done.send(gateway.save(&snapshot));
    });
}

async fn run(
    gateway: Arc<Gateway>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) -> WriterStats {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Result<Source>>();
    let mut queue: SaveQueue<Vec<Project>> = SaveQueue::default();
    let mut pending: Option<Vec<Project>> = None;
    let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();
    let mut closed = false;
    let mut stats = WriterStats::default();

    let timer = tokio::time::sleep(debounce);
    tokio::pin!(timer);

    loop {
        let idle = pending.is_none() && queue.is_idle();
        if idle {
            for waiter in waiters.drain(..) {
                let _ = waiter.send(());
            }
            if closed {
                break;
            }
        }

        tokio::select! {
            command = rx.recv(), if !closed => match command {
                Some(Command::Save(snapshot)) => {
                    pending = Some(snapshot);
                    timer.as_mut().reset(Instant::now() + debounce);
                }
                Some(Command::Flush(ack)) => {
                    waiters.push(ack);
                    if let Some(snapshot) = pending.take().and_then(|s| queue.request(s)) {
                        spawn_write(&gateway, &done_tx, snapshot);
                    }
                }
                None => {
                    closed = true;
                    if let Some(snapshot) = pending.take().and_then(|s| queue.request(s)) {
                        spawn_write(&gateway, &done_tx, snapshot);
                    }
                }
            },
            () = &mut timer, if pending.is_some() => {
                if let Some(snapshot) = pending.take().and_then(|s| queue.request(s)) {
                    spawn_write(&gateway, &done_tx, snapshot);
                }
            }
            Some(result) = done_rx.recv(), if !queue.is_idle() => {
                match result {
                    Ok(source) => {
                        stats.writes += 1;
                        stats.last_source = Some(source);
                    }
                    // Retried naturally by the next snapshot.
                    Err(err) => {
                        stats.failures += 1;
                        error!(error = %err, "save failed");
                    }
                }
                if let Some(next) = queue.complete() {
                    spawn_write(&gateway, &done_tx, next);
                }
            }
        }
    }

    stats
}
