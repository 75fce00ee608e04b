//! Queue ingress and the worker pool.
//!
//! The transport is at-least-once and external; here it is modeled as a
//! JSON-envelope channel. The consumer hands each record to a blocking
//! worker, capped at the configured pool size. Shutdown stops intake, then
//! gives in-flight workers five seconds to drain before aborting them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore as WorkerPermits, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::errors::{LedgerError, LedgerResult};
use crate::types::Envelope;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// In-process queue endpoint handed to producers (the ops API and tests).
pub struct QueuePublisher {
    sender: mpsc::Sender<String>,
}

impl QueuePublisher {
    pub async fn publish(&self, envelope: &Envelope) -> LedgerResult<()> {
        let raw = serde_json::to_string(envelope)?;
        self.sender
            .send(raw)
            .await
            .map_err(|_| LedgerError::Internal("queue consumer is gone".to_string()))
    }
}

pub fn queue_channel(capacity: usize) -> (Arc<QueuePublisher>, mpsc::Receiver<String>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (Arc::new(QueuePublisher { sender }), receiver)
}

pub struct QueueConsumer {
    dispatcher: Arc<Dispatcher>,
    workers: usize,
}

impl QueueConsumer {
    pub fn new(dispatcher: Arc<Dispatcher>, workers: usize) -> Self {
        Self {
            dispatcher,
            workers: workers.max(1),
        }
    }

    pub async fn run(self, mut receiver: mpsc::Receiver<String>, mut shutdown: watch::Receiver<bool>) {
        info!(workers = self.workers, "queue consumer started");
        let permits = Arc::new(WorkerPermits::new(self.workers));
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                record = receiver.recv() => {
                    let Some(raw) = record else { break };
                    while tasks.try_join_next().is_some() {}
                    let Ok(permit) = permits.clone().acquire_owned().await else { break };
                    let dispatcher = self.dispatcher.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        if tokio::task::spawn_blocking(move || dispatcher.dispatch_json(&raw))
                            .await
                            .is_err()
                        {
                            warn!("queue worker panicked");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let drain = async {
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("forcing shutdown of queue workers");
            tasks.abort_all();
        }
        info!("queue consumer stopped");
    }
}
