use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use relay_cache::Cache;
use relay_types::{Checkpoint, RelayResult, StreamEvent};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{BoxEventStream, Stream};

/// Bounded so a slow checkpoint writer applies backpressure to the
/// publisher side rather than letting the queue grow without limit (spec
/// §4.5: "the spec requires it be bounded (e.g. 1024) with backpressure on
/// the publisher").
const CHANNEL_CAPACITY: usize = 1024;

fn checkpoint_key(topic: &str) -> String {
    format!("checkpoint-{topic}")
}

/// Decorates a `Stream` with durable resume: persists the latest processed
/// checkpoint per topic so a subscriber can resume after a restart (spec
/// §4.5). Owns exactly one background checkpoint-writer task, per spec §5.
pub struct CheckpointingStream<S> {
    inner: Arc<S>,
    cache: Arc<dyn Cache>,
    writer_tx: mpsc::Sender<(String, Checkpoint)>,
    shutdown: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl<S> CheckpointingStream<S>
where
    S: Stream + 'static,
{
    pub fn new(inner: Arc<S>, cache: Arc<dyn Cache>) -> Self {
        let (writer_tx, writer_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = tokio::spawn(run_writer(writer_rx, cache.clone(), shutdown_rx));

        Self {
            inner,
            cache,
            writer_tx,
            shutdown: Mutex::new(Some((shutdown_tx, worker))),
        }
    }

    pub async fn publish(&self, topic: &str, event: StreamEvent) -> RelayResult<()> {
        self.inner.publish(topic, event).await
    }

    /// Subscribes to `topic`, resuming from the persisted checkpoint when
    /// the caller supplies none, and calls `on_receive` for every event in
    /// order. After each successful call, enqueues a (topic, checkpoint)
    /// record for the background writer — the "enqueue onto an internal
    /// channel" step from spec §4.5. The send is backpressured: if the
    /// channel is full this blocks the publisher side until the writer
    /// drains it (spec §4.5).
    pub async fn subscribe_and_run<F, Fut>(
        &self,
        topic: &str,
        from_checkpoint: Option<Checkpoint>,
        mut on_receive: F,
    ) -> RelayResult<()>
    where
        F: FnMut(StreamEvent) -> Fut + Send,
        Fut: Future<Output = RelayResult<()>> + Send,
    {
        let checkpoint = match from_checkpoint {
            Some(c) if !c.is_empty() => c,
            _ => self.load_checkpoint(topic).await?,
        };

        let mut events = self.inner.subscribe(topic, checkpoint).await?;
        while let Some(event) = events.next().await {
            let observed = event.checkpoint.clone();
            on_receive(event).await?;

            if self.writer_tx.send((topic.to_string(), observed)).await.is_err() {
                warn!(topic, "checkpoint writer task is gone; checkpoint update dropped");
            }
        }
        Ok(())
    }

    /// Pull-based counterpart to `subscribe_and_run`, for callers that want
    /// a `BoxEventStream` to hand onward rather than driving a callback
    /// themselves — e.g. the serving path (`ProxyServiceImpl::stream`) and
    /// replica fan-in consumers (spec §1, §4.5: "checkpoint-based
    /// resumption"). Resumes from the persisted checkpoint when the caller
    /// supplies none, and enqueues a (topic, checkpoint) record for the
    /// background writer as each event is yielded, same as
    /// `subscribe_and_run`.
    pub async fn subscribe(&self, topic: &str, from_checkpoint: Option<Checkpoint>) -> RelayResult<BoxEventStream> {
        let checkpoint = match from_checkpoint {
            Some(c) if !c.is_empty() => c,
            _ => self.load_checkpoint(topic).await?,
        };

        let events = self.inner.subscribe(topic, checkpoint).await?;
        let writer_tx = self.writer_tx.clone();
        let topic = topic.to_string();

        let stream = futures_util::stream::unfold((events, writer_tx, topic), |(mut events, writer_tx, topic)| async move {
            let event = events.next().await?;
            let observed = event.checkpoint.clone();
            if writer_tx.send((topic.clone(), observed)).await.is_err() {
                warn!(topic, "checkpoint writer task is gone; checkpoint update dropped");
            }
            Some((event, (events, writer_tx, topic)))
        });

        Ok(Box::pin(stream))
    }

    async fn load_checkpoint(&self, topic: &str) -> RelayResult<Checkpoint> {
        match self.cache.get(&checkpoint_key(topic)).await? {
            Some(bytes) => Ok(Checkpoint(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(Checkpoint::empty()),
        }
    }

    /// Stops the background checkpoint-writer task and waits for it to
    /// exit before returning (spec §9: "tie lifetime to an explicit
    /// Shutdown() returning only after the task has exited"). Idempotent:
    /// a second call is a no-op.
    pub async fn shutdown(&self) {
        if let Some((tx, handle)) = self.shutdown.lock().await.take() {
            let _ = tx.send(());
            let _ = handle.await;
        }
    }
}

/// Drains the checkpoint channel: for each record, only persists it if it is
/// not older than whatever is currently stored, so persisted checkpoints are
/// monotonically non-decreasing even when delivery briefly reorders events
/// across races (spec §4.5, §9).
async fn run_writer(
    mut writer_rx: mpsc::Receiver<(String, Checkpoint)>,
    cache: Arc<dyn Cache>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            record = writer_rx.recv() => {
                match record {
                    Some((topic, checkpoint)) => {
                        if let Err(e) = maybe_persist(&cache, &topic, &checkpoint).await {
                            warn!(topic, error = %e, "failed to persist checkpoint");
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn maybe_persist(cache: &Arc<dyn Cache>, topic: &str, checkpoint: &Checkpoint) -> RelayResult<()> {
    let key = checkpoint_key(topic);
    let stored = match cache.get(&key).await? {
        Some(bytes) => Checkpoint(String::from_utf8_lossy(&bytes).into_owned()),
        None => Checkpoint::empty(),
    };

    if stored.is_same_or_newer(checkpoint) {
        return Ok(());
    }

    cache.set(&key, checkpoint.as_str().as_bytes().to_vec()).await
}
