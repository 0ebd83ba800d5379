//! Application-level configuration loading, including the story hint table.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARLOR_BACK_CONFIG_PATH";
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// One round of a story game: what the player is asked for, and how the answer is
/// stitched into the assembled story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    /// Prompt shown to the player before they write this round's value.
    pub prompt: String,
    /// Text inserted before the value in the assembled story.
    pub prefix: String,
    /// Text inserted after the value in the assembled story.
    pub suffix: String,
}

impl Hint {
    /// Convenience constructor used by the defaults and tests.
    pub fn new(prompt: &str, prefix: &str, suffix: &str) -> Self {
        Self {
            prompt: prompt.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    hints: Vec<Hint>,
    token_ttl: Duration,
    store_timeout: Duration,
}

impl AppConfig {
    /// Build a configuration from explicit values.
    pub fn new(hints: Vec<Hint>, token_ttl: Duration, store_timeout: Duration) -> Self {
        Self {
            hints,
            token_ttl,
            store_timeout,
        }
    }

    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        rounds = app_config.hints.len(),
                        "loaded story hints from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Ordered hint table; its length is the number of rounds in a story game.
    pub fn hints(&self) -> &[Hint] {
        &self.hints
    }

    /// Number of rounds every player must submit before a story game completes.
    pub fn rounds(&self) -> usize {
        self.hints.len()
    }

    /// Hint for the round at `index`, if the game has that many rounds.
    pub fn hint(&self, index: usize) -> Option<&Hint> {
        self.hints.get(index)
    }

    /// Lifetime of issued credentials.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Upper bound on a single store transaction.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hints: default_hints(),
            token_ttl: DEFAULT_TOKEN_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    hints: Vec<RawHint>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    token_ttl_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    store_timeout_ms: Option<Duration>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let hints = if value.hints.is_empty() {
            warn!("config declares no story hints; using built-in table");
            default_hints()
        } else {
            value.hints.into_iter().map(Into::into).collect()
        };
        Self {
            hints,
            token_ttl: value.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL),
            store_timeout: value.store_timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single round inside the configuration file.
struct RawHint {
    prompt: String,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    suffix: String,
}

impl From<RawHint> for Hint {
    fn from(value: RawHint) -> Self {
        Self {
            prompt: value.prompt,
            prefix: value.prefix,
            suffix: value.suffix,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in hint table shipped with the binary.
fn default_hints() -> Vec<Hint> {
    vec![
        Hint::new("Name someone, real or imaginary", "", " "),
        Hint::new("Who did they meet?", "met ", " "),
        Hint::new("Where did they meet?", "at ", ". "),
        Hint::new("What did the first one say?", "The first said \"", "\". "),
        Hint::new(
            "What did the second one reply?",
            "The second replied \"",
            "\". ",
        ),
        Hint::new("What happened in the end?", "In the end, ", "."),
    ]
}
