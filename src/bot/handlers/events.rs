//! Forwards gateway events into the core.
//!
//! Reactions are republished on the [`EventBus`](crate::core::surface::EventBus)
//! so any pager waiting on a message can see them.

use crate::bot::BotData;
use crate::core::surface::ReactionEvent;
use crate::errors::{Error, Result};
use poise::serenity_prelude as serenity;
use tracing::{debug, info};

/// Name of a Unicode emoji. Custom emoji never drive navigation.
#[must_use]
pub fn unicode_emoji(reaction: &serenity::ReactionType) -> Option<String> {
    match reaction {
        serenity::ReactionType::Unicode(name) => Some(name.clone()),
        _ => None,
    }
}

fn reaction_event(reaction: &serenity::Reaction, bot_id: serenity::UserId) -> Option<ReactionEvent> {
    let user_id = reaction.user_id?;
    let emoji = unicode_emoji(&reaction.emoji)?;
    let from_bot = user_id == bot_id
        || reaction
            .member
            .as_ref()
            .is_some_and(|member| member.user.bot);

    Some(ReactionEvent {
        message_id: reaction.message_id.get(),
        user_id: user_id.get(),
        from_bot,
        emoji,
    })
}

/// Poise event hook.
pub async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("Logged in as {}", data_about_bot.user.name);
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Some(event) = reaction_event(add_reaction, framework.bot_id) {
                let delivered = data.events.publish(event);
                debug!(
                    "Reaction on message {} delivered to {delivered} listeners",
                    add_reaction.message_id
                );
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unicode_emoji_are_named() {
        let unicode = serenity::ReactionType::Unicode("\u{23f9}".to_string());
        assert_eq!(unicode_emoji(&unicode).as_deref(), Some("\u{23f9}"));

        let custom = serenity::ReactionType::Custom {
            animated: false,
            id: serenity::EmojiId::new(1),
            name: Some("blob".to_string()),
        };
        assert!(unicode_emoji(&custom).is_none());
    }
}
