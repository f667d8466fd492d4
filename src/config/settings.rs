//! Application settings loaded from a TOML file.
//!
//! The file is optional: every field has a default, so a bot can start with
//! nothing but `DISCORD_BOT_TOKEN` in the environment.

use crate::core::{interface::DEFAULT_IDLE_TIMEOUT, shell::DEFAULT_TIMEOUT};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "INSPECTOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// Accepted `pager.max_size` values. The top leaves room for a four-digit
/// page indicator under the 2000 character message limit.
pub const PAGE_SIZE_RANGE: RangeInclusive<usize> = 100..=1985;

/// Top-level bot configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Command prefix, e.g. `ci!`.
    pub prefix: String,
    /// User ids allowed to run owner-only commands, in addition to the
    /// application owner.
    pub owners: Vec<u64>,
    pub shell: ShellConfig,
    pub pager: PagerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefix: "ci!".to_string(),
            owners: Vec::new(),
            shell: ShellConfig::default(),
            pager: PagerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Overall output budget of one command.
    pub timeout_secs: u64,
    /// Shell used instead of `$SHELL`.
    pub program: Option<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            program: None,
        }
    }
}

impl ShellConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PagerConfig {
    /// Page size used for command output.
    pub max_size: usize,
    /// How long a pager waits for navigation before deleting itself.
    pub idle_timeout_secs: u64,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            max_size: 1985,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
        }
    }
}

impl PagerConfig {
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Parses a configuration document.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents)
        .map_err(|e| Error::Config(format!("Failed to parse TOML configuration: {e}")))?;

    if config.prefix.is_empty() {
        return Err(Error::Config("prefix must not be empty".to_string()));
    }
    if config.shell.timeout_secs == 0 {
        return Err(Error::Config("shell.timeout_secs must be positive".to_string()));
    }
    if !PAGE_SIZE_RANGE.contains(&config.pager.max_size) {
        return Err(Error::Config(format!(
            "pager.max_size must be between {} and {}, got {}",
            PAGE_SIZE_RANGE.start(),
            PAGE_SIZE_RANGE.end(),
            config.pager.max_size
        )));
    }
    Ok(config)
}

/// Loads configuration from `path`, falling back to defaults if it does not exist.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);

    if !path_ref.exists() {
        info!("No configuration file at {:?}, using defaults", path_ref);
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path_ref)
        .map_err(|e| Error::Config(format!("Failed to read config file {path_ref:?}: {e}")))?;
    parse_config(&contents)
}

/// Loads configuration from `$INSPECTOR_CONFIG` or `config.toml`.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() -> Result<()> {
        let config = parse_config("")?;
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.prefix, "ci!");
        assert_eq!(config.shell.timeout(), Duration::from_secs(90));
        assert_eq!(config.pager.max_size, 1985);
        assert_eq!(config.pager.idle_timeout(), Duration::from_secs(3600));
        Ok(())
    }

    #[test]
    fn test_partial_document_overrides() -> Result<()> {
        let config = parse_config(
            r#"
            prefix = "!"
            owners = [1234]

            [shell]
            timeout_secs = 10
            program = "/bin/sh"
            "#,
        )?;
        assert_eq!(config.prefix, "!");
        assert_eq!(config.owners, vec![1234]);
        assert_eq!(config.shell.program.as_deref(), Some("/bin/sh"));
        assert_eq!(config.shell.timeout_secs, 10);
        assert_eq!(config.pager, PagerConfig::default());
        Ok(())
    }

    #[test]
    fn test_invalid_documents_are_rejected() {
        assert!(matches!(parse_config("prefix = 3"), Err(Error::Config(_))));
        assert!(matches!(parse_config("prefix = \"\""), Err(Error::Config(_))));
        assert!(matches!(
            parse_config("[shell]\ntimeout_secs = 0"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_pager_size_must_fit_a_message() -> Result<()> {
        let error = parse_config("[pager]\nmax_size = 1995").expect_err("too large");
        assert!(error.to_string().contains("pager.max_size"));
        assert!(matches!(parse_config("[pager]\nmax_size = 10"), Err(Error::Config(_))));

        assert_eq!(parse_config("[pager]\nmax_size = 1985")?.pager.max_size, 1985);
        assert_eq!(parse_config("[pager]\nmax_size = 500")?.pager.max_size, 500);
        Ok(())
    }

    #[test]
    fn test_load_config_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "prefix = \"py!\"")?;
        assert_eq!(load_config(file.path())?.prefix, "py!");

        let missing = load_config("/no/such/inspector.toml")?;
        assert_eq!(missing, AppConfig::default());
        Ok(())
    }
}
