//! Shared test utilities for the inspector bot.
//!
//! This module provides a recording in-memory [`MessageSurface`] and the
//! tracing setup used across unit tests.

use crate::core::surface::{EventBus, MessageId, MessageSurface, ReactionEvent, Rendered, UserId};
use crate::errors::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// One operation performed against a [`MockSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Send(MessageId, Rendered),
    Edit(MessageId, Rendered),
    Delete(MessageId),
    AddReaction(MessageId, String),
    RemoveReaction(MessageId, String, UserId),
}

#[derive(Default)]
struct Recorded {
    calls: Vec<SurfaceCall>,
    messages: HashMap<MessageId, Rendered>,
    reactions: HashMap<MessageId, Vec<String>>,
}

/// Holds calls back until the test lets them through.
#[derive(Clone)]
struct Gate {
    permits: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
}

impl Gate {
    fn closed() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn pass(&self) {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An in-memory surface that records every call.
#[derive(Clone)]
pub struct MockSurface {
    bot_user: UserId,
    events: EventBus,
    next_id: Arc<AtomicU64>,
    recorded: Arc<Mutex<Recorded>>,
    forbid_reaction_removal: bool,
    send_gate: Option<Gate>,
    edit_gate: Option<Gate>,
}

impl MockSurface {
    pub fn new(bot_user: UserId) -> Self {
        Self {
            bot_user,
            events: EventBus::default(),
            next_id: Arc::new(AtomicU64::new(1000)),
            recorded: Arc::new(Mutex::new(Recorded::default())),
            forbid_reaction_removal: false,
            send_gate: None,
            edit_gate: None,
        }
    }

    /// Makes every `send` wait for [`Self::release_sends`].
    pub fn hold_sends(mut self) -> Self {
        self.send_gate = Some(Gate::closed());
        self
    }

    /// Makes every `edit` wait for [`Self::release_edits`].
    pub fn hold_edits(mut self) -> Self {
        self.edit_gate = Some(Gate::closed());
        self
    }

    pub fn release_sends(&self, count: usize) {
        if let Some(gate) = &self.send_gate {
            gate.permits.add_permits(count);
        }
    }

    pub fn release_edits(&self, count: usize) {
        if let Some(gate) = &self.edit_gate {
            gate.permits.add_permits(count);
        }
    }

    /// Sends currently held back.
    pub fn waiting_sends(&self) -> usize {
        self.send_gate
            .as_ref()
            .map_or(0, |gate| gate.waiting.load(Ordering::SeqCst))
    }

    /// Edits currently held back.
    pub fn waiting_edits(&self) -> usize {
        self.edit_gate
            .as_ref()
            .map_or(0, |gate| gate.waiting.load(Ordering::SeqCst))
    }

    /// Every edit made so far, in order.
    pub fn edits(&self) -> Vec<(MessageId, Rendered)> {
        self.recorded()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Edit(message, body) => Some((*message, body.clone())),
                _ => None,
            })
            .collect()
    }

    /// Makes `remove_reaction` fail as if permissions were missing.
    pub fn forbid_reaction_removal(mut self) -> Self {
        self.forbid_reaction_removal = true;
        self
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("mock surface lock")
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.recorded().calls.clone()
    }

    /// Everything sent as new messages, in order.
    pub fn sent(&self) -> Vec<Rendered> {
        self.recorded()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Send(_, body) => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    /// The latest content of a live message.
    pub fn current(&self, message: MessageId) -> Option<Rendered> {
        self.recorded().messages.get(&message).cloned()
    }

    pub fn reactions(&self, message: MessageId) -> Vec<String> {
        self.recorded()
            .reactions
            .get(&message)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_deleted(&self, message: MessageId) -> bool {
        self.recorded()
            .calls
            .iter()
            .any(|call| *call == SurfaceCall::Delete(message))
    }

    /// Publishes a reaction once someone is listening.
    pub async fn react(&self, message: MessageId, user: UserId, emoji: &str) {
        self.publish(message, user, false, emoji).await;
    }

    pub async fn react_as_bot(&self, message: MessageId, user: UserId, emoji: &str) {
        self.publish(message, user, true, emoji).await;
    }

    async fn publish(&self, message: MessageId, user: UserId, from_bot: bool, emoji: &str) {
        while self.events.listener_count() == 0 {
            tokio::task::yield_now().await;
        }
        self.events.publish(ReactionEvent {
            message_id: message,
            user_id: user,
            from_bot,
            emoji: emoji.to_string(),
        });
    }
}

impl MessageSurface for MockSurface {
    fn bot_user(&self) -> UserId {
        self.bot_user
    }

    async fn send(&self, body: &Rendered) -> Result<MessageId> {
        if let Some(gate) = &self.send_gate {
            gate.pass().await;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut recorded = self.recorded();
        recorded.calls.push(SurfaceCall::Send(id, body.clone()));
        recorded.messages.insert(id, body.clone());
        Ok(id)
    }

    async fn edit(&self, message: MessageId, body: &Rendered) -> Result<()> {
        if let Some(gate) = &self.edit_gate {
            gate.pass().await;
        }
        let mut recorded = self.recorded();
        recorded.calls.push(SurfaceCall::Edit(message, body.clone()));
        recorded.messages.insert(message, body.clone());
        Ok(())
    }

    async fn delete(&self, message: MessageId) -> Result<()> {
        let mut recorded = self.recorded();
        recorded.calls.push(SurfaceCall::Delete(message));
        recorded.messages.remove(&message);
        Ok(())
    }

    async fn add_reaction(&self, message: MessageId, emoji: &str) -> Result<()> {
        let mut recorded = self.recorded();
        recorded
            .calls
            .push(SurfaceCall::AddReaction(message, emoji.to_string()));
        let reactions = recorded.reactions.entry(message).or_default();
        if !reactions.iter().any(|existing| existing == emoji) {
            reactions.push(emoji.to_string());
        }
        Ok(())
    }

    async fn remove_reaction(&self, message: MessageId, emoji: &str, user: UserId) -> Result<()> {
        if self.forbid_reaction_removal {
            return Err(Error::Forbidden("Missing Permissions".to_string()));
        }
        self.recorded().calls.push(SurfaceCall::RemoveReaction(
            message,
            emoji.to_string(),
            user,
        ));
        Ok(())
    }

    fn wait_for_reaction<F>(
        &self,
        timeout: Duration,
        check: F,
    ) -> impl Future<Output = Result<ReactionEvent>> + Send
    where
        F: Fn(&ReactionEvent) -> bool + Send + Sync + 'static,
    {
        let events = self.events.clone();
        async move { events.wait_for(timeout, check).await }
    }
}
