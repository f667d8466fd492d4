//! [`MessageSurface`] backed by a Discord channel.

use crate::bot::Context;
use crate::core::surface::{EventBus, MessageId, MessageSurface, ReactionEvent, Rendered, UserId};
use crate::errors::Result;
use poise::serenity_prelude as serenity;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A channel the bot can post, edit and react in.
#[derive(Clone)]
pub struct DiscordSurface {
    http: Arc<serenity::Http>,
    channel: serenity::ChannelId,
    bot_user: UserId,
    events: EventBus,
}

impl DiscordSurface {
    #[must_use]
    pub fn new(
        http: Arc<serenity::Http>,
        channel: serenity::ChannelId,
        bot_user: UserId,
        events: EventBus,
    ) -> Self {
        Self {
            http,
            channel,
            bot_user,
            events,
        }
    }

    /// The channel a command was invoked in.
    #[must_use]
    pub fn from_context(ctx: Context<'_>) -> Self {
        Self::new(
            Arc::clone(&ctx.serenity_context().http),
            ctx.channel_id(),
            ctx.framework().bot_id.get(),
            ctx.data().events.clone(),
        )
    }

    fn unicode(emoji: &str) -> serenity::ReactionType {
        serenity::ReactionType::Unicode(emoji.to_string())
    }
}

fn create_message(body: &Rendered) -> serenity::CreateMessage {
    match body {
        Rendered::Content(content) => serenity::CreateMessage::new().content(content),
        Rendered::Embed {
            description,
            footer,
        } => serenity::CreateMessage::new().embed(
            serenity::CreateEmbed::new()
                .description(description)
                .footer(serenity::CreateEmbedFooter::new(footer)),
        ),
    }
}

fn edit_message(body: &Rendered) -> serenity::EditMessage {
    match body {
        Rendered::Content(content) => serenity::EditMessage::new().content(content),
        Rendered::Embed {
            description,
            footer,
        } => serenity::EditMessage::new().embed(
            serenity::CreateEmbed::new()
                .description(description)
                .footer(serenity::CreateEmbedFooter::new(footer)),
        ),
    }
}

impl MessageSurface for DiscordSurface {
    fn bot_user(&self) -> UserId {
        self.bot_user
    }

    async fn send(&self, body: &Rendered) -> Result<MessageId> {
        let message = self
            .channel
            .send_message(self.http.as_ref(), create_message(body))
            .await?;
        Ok(message.id.get())
    }

    async fn edit(&self, message: MessageId, body: &Rendered) -> Result<()> {
        self.channel
            .edit_message(
                self.http.as_ref(),
                serenity::MessageId::new(message),
                edit_message(body),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, message: MessageId) -> Result<()> {
        self.channel
            .delete_message(self.http.as_ref(), serenity::MessageId::new(message))
            .await?;
        Ok(())
    }

    async fn add_reaction(&self, message: MessageId, emoji: &str) -> Result<()> {
        self.channel
            .create_reaction(
                self.http.as_ref(),
                serenity::MessageId::new(message),
                Self::unicode(emoji),
            )
            .await?;
        Ok(())
    }

    async fn remove_reaction(&self, message: MessageId, emoji: &str, user: UserId) -> Result<()> {
        self.channel
            .delete_reaction(
                self.http.as_ref(),
                serenity::MessageId::new(message),
                Some(serenity::UserId::new(user)),
                Self::unicode(emoji),
            )
            .await?;
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
