//! The message-destination capability the pager renders onto, and the reaction
//! event bus backing its `wait_for` primitive.
//!
//! Chat-platform adapters implement [`MessageSurface`]; the gateway event
//! handler publishes reactions into an [`EventBus`] that surfaces subscribe to.

use crate::errors::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Platform message identifier.
pub type MessageId = u64;
/// Platform user identifier.
pub type UserId = u64;

const EVENT_BUS_CAPACITY: usize = 256;

/// Content for one message: plain text or an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Content(String),
    Embed { description: String, footer: String },
}

/// A reaction added to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message_id: MessageId,
    pub user_id: UserId,
    /// Whether the reacting account is a bot.
    pub from_bot: bool,
    pub emoji: String,
}

/// Where rendered output goes: one channel-like destination.
pub trait MessageSurface: Clone + Send + Sync + 'static {
    /// The account this surface posts as.
    fn bot_user(&self) -> UserId;

    fn send(&self, body: &Rendered) -> impl Future<Output = Result<MessageId>> + Send;

    fn edit(&self, message: MessageId, body: &Rendered)
    -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, message: MessageId) -> impl Future<Output = Result<()>> + Send;

    fn add_reaction(&self, message: MessageId, emoji: &str)
    -> impl Future<Output = Result<()>> + Send;

    /// Removes `user`'s reaction. Fails with [`Error::Forbidden`] when the
    /// surface lacks permission to do so.
    fn remove_reaction(
        &self,
        message: MessageId,
        emoji: &str,
        user: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Waits for the first reaction accepted by `check`, failing with
    /// [`Error::Timeout`] once `timeout` passes.
    fn wait_for_reaction<F>(
        &self,
        timeout: Duration,
        check: F,
    ) -> impl Future<Output = Result<ReactionEvent>> + Send
    where
        F: Fn(&ReactionEvent) -> bool + Send + Sync + 'static;
}

/// Fan-out of reaction events to every interested waiter.
#[derive(Debug, Clone)]
pub struct EventBus {
    reactions: broadcast::Sender<ReactionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (reactions, _) = broadcast::channel(capacity);
        Self { reactions }
    }

    /// Delivers an event to current subscribers, returning how many saw it.
    pub fn publish(&self, event: ReactionEvent) -> usize {
        self.reactions.send(event).unwrap_or(0)
    }

    /// Registers a named listener for reaction events.
    #[must_use]
    pub fn subscribe(&self, listener: &str) -> broadcast::Receiver<ReactionEvent> {
        debug!("{listener} subscribed to reaction events");
        self.reactions.subscribe()
    }

    /// Number of listeners currently registered.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.reactions.receiver_count()
    }

    /// Waits for a matching reaction published after this call.
    pub async fn wait_for<F>(&self, timeout: Duration, check: F) -> Result<ReactionEvent>
    where
        F: Fn(&ReactionEvent) -> bool + Send,
    {
        let mut receiver = self.subscribe("wait_for");
        let deadline = Instant::now() + timeout;

        loop {
            match tokio::time::timeout_at(deadline, receiver.recv()).await {
                Err(_) => return Err(Error::Timeout(timeout)),
                Ok(Ok(event)) if check(&event) => return Ok(event),
                Ok(Ok(_)) => {}
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!("Reaction listener lagged, skipped {skipped} events");
                }
                Ok(Err(RecvError::Closed)) => return Err(Error::EventsClosed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(message_id: MessageId, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            message_id,
            user_id: 7,
            from_bot: false,
            emoji: emoji.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_skips_rejected_events() -> Result<()> {
        let bus = EventBus::default();
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move {
                bus.wait_for(Duration::from_secs(5), |event| event.message_id == 2)
                    .await
            })
        };
        while bus.listener_count() == 0 {
            tokio::task::yield_now().await;
        }

        bus.publish(reaction(1, "a"));
        bus.publish(reaction(2, "b"));

        let event = waiter.await.expect("waiter task")?;
        assert_eq!(event.emoji, "b");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let bus = EventBus::default();
        let result = bus.wait_for(Duration::from_secs(3), |_| true).await;
        assert!(matches!(result, Err(Error::Timeout(d)) if d == Duration::from_secs(3)));
    }

    #[test]
    fn test_publish_without_listeners_is_dropped() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(reaction(1, "a")), 0);
    }
}
