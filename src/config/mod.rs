/// Database connection management for the `sql` command
pub mod database;

/// Application settings from config.toml
pub mod settings;

pub use settings::{AppConfig, PagerConfig, ShellConfig, load_app_configuration};
