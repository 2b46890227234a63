//! Bridges an upstream SSE source — one connection per API key, maintained
//! by an embedded feature-flag SDK — into the `Stream` (spec §4.6).
//! Grounded in the teacher's `delta_refresh.rs`, which drives
//! `eventsource-client` the same way: a `ClientBuilder` per upstream
//! connection, auto-reconnect with bounded exponential backoff, and a
//! `match` over the `SSE` enum that only acts on `SSE::Event`.

use std::time::Duration;

use eventsource_client::Client as _;
use futures_util::StreamExt;
use relay_stream::Stream;
use relay_types::{Checkpoint, EnvironmentId, RelayError, RelayResult, StreamEvent};
use tracing::{debug, info, warn};

fn reconnect_opts() -> eventsource_client::ReconnectOptions {
    eventsource_client::ReconnectOptions::reconnect(true)
        .retry_initial(true)
        .delay(Duration::from_secs(1))
        .delay_max(Duration::from_secs(30))
        .backoff_factor(2)
        .build()
}

/// One `EventListener` runs one upstream SSE connection, republishing its
/// events onto `topic` for however many replicas subscribe.
pub struct EventListener<S> {
    stream: S,
    topic: String,
    environment: EnvironmentId,
}

impl<S> EventListener<S>
where
    S: Stream,
{
    pub fn new(stream: S, topic: impl Into<String>, environment: EnvironmentId) -> Self {
        Self {
            stream,
            topic: topic.into(),
            environment,
        }
    }

    /// Opens the upstream SSE connection and republishes every event until
    /// the connection terminates with a non-retriable error. Reconnection
    /// with backoff is the `eventsource-client` crate's own responsibility
    /// (spec §4.6, §9); this loop only sees the logical event stream.
    pub async fn listen(&self, streaming_url: &str, api_key: &str) -> RelayResult<()> {
        let client = eventsource_client::ClientBuilder::for_url(streaming_url)
            .map_err(|e| RelayError::config(format!("invalid streaming url: {e}")))?
            .header("Authorization", api_key)
            .map_err(|e| RelayError::config(format!("invalid api key header: {e}")))?
            .reconnect(reconnect_opts())
            .build();

        let mut events = client.stream();
        while let Some(event) = events.next().await {
            match event {
                Ok(eventsource_client::SSE::Event(event)) => {
                    if let Err(e) = self.republish(&event).await {
                        warn!(topic = %self.topic, error = %e, "failed to publish sse event; upstream will retry");
                        return Err(e);
                    }
                }
                Ok(eventsource_client::SSE::Connected(_)) => {
                    debug!(topic = %self.topic, "sse connection established");
                }
                Ok(eventsource_client::SSE::Comment(_)) => {}
                Err(e) => {
                    info!(topic = %self.topic, error = %e, "sse stream ended");
                    return Err(RelayError::transient(format!("sse stream error: {e}")));
                }
            }
        }
        Ok(())
    }

    async fn republish(&self, event: &eventsource_client::Event) -> RelayResult<()> {
        let body = wire_body(&event.data);
        let checkpoint = event
            .id
            .as_deref()
            .map(|id| Checkpoint(id.to_string()))
            .unwrap_or_else(Checkpoint::empty);

        let stream_event = StreamEvent::new(checkpoint, self.environment.as_str(), body);
        self.stream.publish(&self.topic, stream_event).await
    }
}

/// Reconstructs the wire body downstream SDKs expect: `event: *\ndata:
/// <data>\n\n` (spec §4.6). The event-type field is always the literal `*`
/// wildcard regardless of the upstream SSE event's own type — downstream
/// consumers of this republished body dispatch on topic, not event name.
fn wire_body(data: &str) -> String {
    format!("event: *\ndata: {data}\n\n")
}
