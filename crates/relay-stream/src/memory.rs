use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use relay_types::{Checkpoint, RelayResult, StreamEvent};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::{BoxEventStream, Stream};

const CHANNEL_CAPACITY: usize = 1024;

/// In-process backend over `tokio::sync::broadcast`, one channel per topic,
/// created lazily on first publish or subscribe (grounded in the teacher's
/// `stream_broadcast.rs`, which fans SSE updates out to many subscribers the
/// same way).
pub struct MemoryStream {
    topics: DashMap<String, broadcast::Sender<StreamEvent>>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<StreamEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stream for MemoryStream {
    async fn publish(&self, topic: &str, event: StreamEvent) -> RelayResult<()> {
        let sender = self.sender_for(topic);
        // No receivers is not an error: it's legitimate to publish to a
        // topic nobody is currently subscribed to.
        let _ = sender.send(event);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, from_checkpoint: Checkpoint) -> RelayResult<BoxEventStream> {
        if !from_checkpoint.is_empty() {
            debug!(topic, "in-memory backend cannot replay; resuming from tail regardless of checkpoint");
        }

        let receiver = self.sender_for(topic).subscribe();
        let events = BroadcastStream::new(receiver).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(_lagged) => {
                    warn!("subscriber lagged behind the broadcast channel; events were dropped");
                    None
                }
            }
        });
        Ok(Box::pin(events))
    }
}
