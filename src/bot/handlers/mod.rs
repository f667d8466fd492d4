//! Discord gateway event handlers
//!
//! Non-command events the bot listens to, chiefly reactions that drive
//! paginated messages.

/// Gateway event routing into the reaction event bus
pub mod events;

pub use events::event_handler;
