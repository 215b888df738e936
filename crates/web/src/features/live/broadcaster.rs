//! In-process transport for live events, fanned out to SSE subscribers.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::sse::Event;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use storage::services::{EventPublisher, PublishError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

#[derive(Clone)]
pub struct LiveBroadcaster {
    tx: broadcast::Sender<Arc<ChannelMessage>>,
}

impl LiveBroadcaster {
    /// `capacity` bounds how far a slow subscriber may lag before it skips events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        info!("Live broadcaster initialized with capacity {}", capacity);
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events of one channel, converted to SSE frames.
    pub fn subscribe(
        &self,
        channel: String,
    ) -> impl Stream<Item = Result<Event, Infallible>> + use<> {
        let stream = BroadcastStream::new(self.tx.subscribe());

        stream.filter_map(move |result| {
            let channel = channel.clone();
            async move {
                match result {
                    Ok(message) if message.channel == channel => Event::default()
                        .event(&message.event)
                        .json_data(&message.payload)
                        .ok()
                        .map(Ok),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(%channel, "Live subscriber lagged: {:?}", e);
                        None
                    }
                }
            }
        })
    }
}

#[async_trait]
impl EventPublisher for LiveBroadcaster {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let message = Arc::new(ChannelMessage {
            channel: channel.to_string(),
            event: event.to_string(),
            payload: payload.clone(),
        });

        // No subscribers is not a delivery failure; events are at-most-once.
        match self.tx.send(message) {
            Ok(count) => debug!(channel, event, "Delivered to {} subscribers", count),
            Err(_) => debug!(channel, event, "No live subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_subscribers_only_see_their_channel() {
        let broadcaster = LiveBroadcaster::new(16);
        let mut stream = Box::pin(broadcaster.subscribe("competition.a".to_string()));
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster
            .publish("competition.b", "vote-cast", &json!({"n": 1}))
            .await
            .unwrap();
        broadcaster
            .publish("competition.a", "chat-message", &json!({"n": 2}))
            .await
            .unwrap();

        let frame = stream.next().await.unwrap().unwrap();
        let rendered = format!("{:?}", frame);
        assert!(rendered.contains("chat-message"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let broadcaster = LiveBroadcaster::new(4);
        assert!(
            broadcaster
                .publish("competition.x", "status-changed", &json!({}))
                .await
                .is_ok()
        );
    }
}
