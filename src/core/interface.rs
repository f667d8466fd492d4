//! Reaction-driven interactive pager.
//!
//! A [`PaginatorInterface`] owns exactly one live message on a
//! [`MessageSurface`]. It renders the current page there, follows navigation
//! reactions in a background loop, and keeps the message in sync while more
//! lines arrive. Closing the message or idling past the timeout deletes it and
//! ends the loop.

use crate::core::paginator::{LineOptions, Paginator};
use crate::core::surface::{MessageId, MessageSurface, ReactionEvent, Rendered, UserId};
use crate::errors::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Content limit for plain-text pages.
pub const TEXT_PAGE_LIMIT: usize = 2000;
/// Description limit for embed pages.
pub const EMBED_PAGE_LIMIT: usize = 2048;
/// How long the navigation loop waits for a reaction.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

const MAX_CONCURRENT_UPDATES: usize = 2;
const UPDATE_BACKOFF: Duration = Duration::from_secs(1);
const CREATION_STAGGER: Duration = Duration::from_millis(500);

/// The navigation controls attached to a paginated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiSettings {
    pub start: String,
    pub back: String,
    pub forward: String,
    pub end: String,
    pub close: String,
}

impl Default for EmojiSettings {
    fn default() -> Self {
        Self {
            start: "\u{23ee}".to_string(),
            back: "\u{25c0}".to_string(),
            forward: "\u{25b6}".to_string(),
            end: "\u{23ed}".to_string(),
            close: "\u{23f9}".to_string(),
        }
    }
}

impl EmojiSettings {
    fn navigation(&self) -> [&str; 4] {
        [&self.start, &self.back, &self.forward, &self.end]
    }

    fn contains(&self, emoji: &str) -> bool {
        emoji == self.close || self.navigation().contains(&emoji)
    }
}

/// How a page is placed into the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderStyle {
    /// Page text as message content with a trailing `Page X/Y` line.
    #[default]
    Text,
    /// Page text as an embed description with a `Page X/Y` footer.
    Embed,
}

struct PagerState {
    paginator: Paginator,
    display_page: usize,
    message: Option<MessageId>,
    sent_page_reactions: bool,
}

impl PagerState {
    fn pages(&self) -> Vec<String> {
        let pages = self.paginator.pages();
        if pages.is_empty() {
            vec![self.paginator.blank_page()]
        } else {
            pages
        }
    }

    fn page_count(&self) -> usize {
        self.paginator.page_count().max(1)
    }

    fn display_page(&mut self) -> usize {
        self.display_page = self.display_page.min(self.page_count() - 1);
        self.display_page
    }

    fn render(&mut self, style: RenderStyle) -> Rendered {
        let display_page = self.display_page();
        let pages = self.pages();
        let indicator = format!("Page {}/{}", display_page + 1, pages.len());
        let page = pages.into_iter().nth(display_page).unwrap_or_default();

        match style {
            RenderStyle::Text => Rendered::Content(format!("{page}\n{indicator}")),
            RenderStyle::Embed => Rendered::Embed {
                description: page,
                footer: indicator,
            },
        }
    }
}

struct Shared<S> {
    surface: S,
    owner: Option<UserId>,
    emojis: EmojiSettings,
    style: RenderStyle,
    idle_timeout: Duration,
    state: Mutex<PagerState>,
    update_lock: Semaphore,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Configures a [`PaginatorInterface`] before validation.
pub struct PaginatorInterfaceBuilder<S> {
    surface: S,
    paginator: Paginator,
    owner: Option<UserId>,
    emojis: EmojiSettings,
    style: RenderStyle,
    idle_timeout: Duration,
}

impl<S: MessageSurface> PaginatorInterfaceBuilder<S> {
    /// Restricts navigation to one user.
    #[must_use]
    pub const fn owner(mut self, owner: Option<UserId>) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn emojis(mut self, emojis: EmojiSettings) -> Self {
        self.emojis = emojis;
        self
    }

    #[must_use]
    pub const fn style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub const fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Validates the page size against the render style's limit.
    pub fn build(self) -> Result<PaginatorInterface<S>> {
        let (page_size, limit) = match self.style {
            RenderStyle::Text => {
                let count = self.paginator.page_count().max(1);
                let indicator = format!("\nPage {count}/{count}").chars().count();
                (self.paginator.max_size() + indicator, TEXT_PAGE_LIMIT)
            }
            RenderStyle::Embed => (self.paginator.max_size(), EMBED_PAGE_LIMIT),
        };
        if page_size > limit {
            return Err(Error::InvalidPaginator { page_size, limit });
        }

        Ok(PaginatorInterface {
            inner: Arc::new(Shared {
                surface: self.surface,
                owner: self.owner,
                emojis: self.emojis,
                style: self.style,
                idle_timeout: self.idle_timeout,
                state: Mutex::new(PagerState {
                    paginator: self.paginator,
                    display_page: 0,
                    message: None,
                    sent_page_reactions: false,
                }),
                update_lock: Semaphore::new(MAX_CONCURRENT_UPDATES),
                task: Mutex::new(None),
            }),
        })
    }
}

/// A paginated, navigable view over a [`Paginator`].
///
/// Cloning yields another handle to the same view.
pub struct PaginatorInterface<S> {
    inner: Arc<Shared<S>>,
}

impl<S> Clone for PaginatorInterface<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: MessageSurface> PaginatorInterface<S> {
    #[must_use]
    pub fn builder(surface: S, paginator: Paginator) -> PaginatorInterfaceBuilder<S> {
        PaginatorInterfaceBuilder {
            surface,
            paginator,
            owner: None,
            emojis: EmojiSettings::default(),
            style: RenderStyle::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    fn state(&self) -> MutexGuard<'_, PagerState> {
        // state stays consistent even if a holder panicked
        self.inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn pages(&self) -> Vec<String> {
        self.state().pages()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state().page_count()
    }

    /// The displayed page index, clamped to the current page count.
    #[must_use]
    pub fn display_page(&self) -> usize {
        self.state().display_page()
    }

    pub fn set_display_page(&self, page: usize) {
        let mut state = self.state();
        state.display_page = page.min(state.page_count() - 1);
    }

    /// The live message, once sent.
    #[must_use]
    pub fn message(&self) -> Option<MessageId> {
        self.state().message
    }

    /// What the message shows for the current display page.
    #[must_use]
    pub fn render(&self) -> Rendered {
        self.state().render(self.inner.style)
    }

    /// Whether the navigation loop has ended.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.task_slot()
            .as_ref()
            .is_some_and(JoinHandle::is_finished)
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Appends a line, following it with a re-render if the last page is on display.
    pub fn add_line(&self, line: &str) -> Result<()> {
        self.add_line_with(line, LineOptions::default())
    }

    pub fn add_line_with(&self, line: &str, options: LineOptions) -> Result<()> {
        let follow = {
            let mut state = self.state();
            let display_page = state.display_page();
            let page_count = state.page_count();

            state.paginator.add_line_with(line, options)?;

            if display_page + 1 == page_count {
                state.display_page = state.page_count() - 1;
                true
            } else {
                false
            }
        };

        if follow {
            self.spawn_update();
        }
        Ok(())
    }

    /// Sends the current page as a new message and starts listening for navigation.
    ///
    /// Calling this again replaces the previous navigation loop.
    pub async fn send_to(&self) -> Result<()> {
        let body = self.render();
        let message = self.inner.surface.send(&body).await?;
        self.state().message = Some(message);
        debug!("Paginator sent as message {message}");

        self.inner
            .surface
            .add_reaction(message, &self.inner.emojis.close)
            .await?;

        let send_navigation = {
            let mut state = self.state();
            let needed = !state.sent_page_reactions && state.page_count() > 1;
            if needed {
                state.sent_page_reactions = true;
            }
            needed
        };
        if send_navigation {
            self.add_navigation_reactions(message).await?;
        }

        let this = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = this.wait_loop(message).await {
                warn!("Paginator navigation loop for message {message} ended: {e}");
            }
        });
        if let Some(previous) = self.task_slot().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn add_navigation_reactions(&self, message: MessageId) -> Result<()> {
        for emoji in self.inner.emojis.navigation() {
            self.inner.surface.add_reaction(message, emoji).await?;
        }
        Ok(())
    }

    fn reaction_check(&self, message: MessageId) -> impl Fn(&ReactionEvent) -> bool + use<S> {
        let emojis = self.inner.emojis.clone();
        let owner = self.inner.owner;
        let bot_user = self.inner.surface.bot_user();

        move |event: &ReactionEvent| {
            let owner_check = owner.map_or(!event.from_bot, |owner| owner == event.user_id);

            event.message_id == message
                && emojis.contains(&event.emoji)
                && event.user_id != bot_user
                && owner_check
        }
    }

    async fn wait_loop(&self, message: MessageId) -> Result<()> {
        let emojis = &self.inner.emojis;

        loop {
            let outcome = self
                .inner
                .surface
                .wait_for_reaction(self.inner.idle_timeout, self.reaction_check(message))
                .await;

            let event = match outcome {
                Ok(event) => event,
                Err(Error::Timeout(_)) => {
                    info!("Paginator message {message} idled out");
                    self.inner.surface.delete(message).await?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if event.emoji == emojis.close {
                debug!("Paginator message {message} closed by {}", event.user_id);
                self.inner.surface.delete(message).await?;
                return Ok(());
            }

            {
                let mut state = self.state();
                let last = state.page_count() - 1;
                let current = state.display_page();
                state.display_page = if event.emoji == emojis.start {
                    0
                } else if event.emoji == emojis.end {
                    last
                } else if event.emoji == emojis.back {
                    current.saturating_sub(1)
                } else {
                    (current + 1).min(last)
                };
            }

            self.spawn_update();

            match self
                .inner
                .surface
                .remove_reaction(message, &event.emoji, event.user_id)
                .await
            {
                Ok(()) => {}
                Err(Error::Forbidden(reason)) => {
                    debug!("Could not remove navigation reaction: {reason}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn spawn_update(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.update().await {
                warn!("Paginator update failed: {e}");
            }
        });
    }

    /// Re-renders the current page into the live message.
    ///
    /// At most two renders run at once; a call made while both are in flight
    /// returns immediately.
    pub async fn update(&self) -> Result<()> {
        let Ok(_permit) = self.inner.update_lock.try_acquire() else {
            return Ok(());
        };

        if self.inner.update_lock.available_permits() == 0 {
            // this render exhausted the ceiling, let the other one land first
            tokio::time::sleep(UPDATE_BACKOFF).await;
        }

        if self.message().is_none() {
            // sending is still in flight
            tokio::time::sleep(CREATION_STAGGER).await;
        }
        let Some(message) = self.message() else {
            debug!("Paginator update skipped, no message to edit yet");
            return Ok(());
        };

        let send_navigation = {
            let mut state = self.state();
            let needed = !state.sent_page_reactions && state.page_count() > 1;
            if needed {
                state.sent_page_reactions = true;
            }
            needed
        };
        if send_navigation {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.add_navigation_reactions(message).await {
                    warn!("Could not attach navigation reactions: {e}");
                }
            });
        }

        let body = self.render();
        self.inner.surface.edit(message, &body).await
    }
}
