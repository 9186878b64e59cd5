//! Runtime configuration.
//!
//! Loaded once at startup from a TOML file and treated as immutable afterwards.
//! Every section falls back to device defaults when omitted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::Credentials;
use crate::presenter::{Alignment, TextEffect};
use crate::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.twitch.tv";
pub const DEFAULT_AUTH_BASE: &str = "https://id.twitch.tv";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_MAX_BACKOFF_EXPONENT: u32 = 6;
pub const DEFAULT_STALE_AFTER_INTERVALS: u32 = 3;

pub const DEFAULT_ZONES: u8 = 2;
pub const DEFAULT_SCROLL_SPEED_MS: u16 = 100;
pub const DEFAULT_SCROLL_PAUSE_MS: u16 = 5000;
pub const DEFAULT_REFRESH_MS: u64 = 250;

/// Heart glyph, first byte is the column count.
pub const HEART_GLYPH: [u8; 9] = [0x0A, 0x1C, 0x3E, 0x7E, 0xFC, 0xFC, 0x7E, 0x3E, 0x1C];
/// Twitch brand glyph, first byte is the column count.
pub const BRAND_GLYPH: [u8; 9] = [0x0A, 0x3F, 0x21, 0xE1, 0x8D, 0x41, 0x2D, 0x21, 0x1F];

const REDACTED: &str = "********";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub twitch: TwitchConfig,
    pub poll: PollConfig,
    pub display: DisplayConfig,
}

/// Twitch application credentials and endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Login name of the channel to follow.
    pub channel_login: String,
    /// Broadcaster id, when already known. Skips the user lookup.
    pub channel_id: Option<String>,
    pub api_base: String,
    pub auth_base: String,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            channel_login: String::new(),
            channel_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
        }
    }
}

impl TwitchConfig {
    /// Build the immutable credential set used by the auth and stats clients.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.client_id, &self.client_secret, &self.channel_login)
    }
}

/// Polling cadence, timeouts and backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Base interval between fetch cycles.
    pub interval_secs: u64,
    /// Upper bound for every network call.
    pub request_timeout_secs: u64,
    /// Tokens are refreshed this long before they actually expire.
    pub token_safety_margin_secs: u64,
    /// Backoff multiplier is capped at `2^max_backoff_exponent`.
    pub max_backoff_exponent: u32,
    /// Data older than this many base intervals is flagged stale.
    pub stale_after_intervals: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_safety_margin_secs: DEFAULT_TOKEN_SAFETY_MARGIN_SECS,
            max_backoff_exponent: DEFAULT_MAX_BACKOFF_EXPONENT,
            stale_after_intervals: DEFAULT_STALE_AFTER_INTERVALS,
        }
    }
}

impl PollConfig {
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[inline]
    pub fn token_safety_margin(&self) -> Duration {
        Duration::from_secs(self.token_safety_margin_secs)
    }

    /// Largest multiplier the backoff may reach.
    pub fn max_backoff_multiplier(&self) -> u32 {
        1u32.checked_shl(self.max_backoff_exponent).unwrap_or(u32::MAX)
    }

    /// Age after which the last good snapshot is reported as stale.
    pub fn stale_after(&self) -> Duration {
        self.interval()
            .checked_mul(self.stale_after_intervals)
            .unwrap_or(Duration::MAX)
    }
}

/// LED matrix layout and text presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Number of display zones. Zone 0 carries the glyph when more than one exists.
    pub zones: u8,
    pub scroll_speed_ms: u16,
    pub scroll_pause_ms: u16,
    pub alignment: Alignment,
    pub effect: TextEffect,
    /// How often a frame is handed to the renderer.
    pub refresh_ms: u64,
    pub heart: Vec<u8>,
    pub brand: Vec<u8>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            zones: DEFAULT_ZONES,
            scroll_speed_ms: DEFAULT_SCROLL_SPEED_MS,
            scroll_pause_ms: DEFAULT_SCROLL_PAUSE_MS,
            alignment: Alignment::default(),
            effect: TextEffect::default(),
            refresh_ms: DEFAULT_REFRESH_MS,
            heart: HEART_GLYPH.to_vec(),
            brand: BRAND_GLYPH.to_vec(),
        }
    }
}

impl DisplayConfig {
    #[inline]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }
}

impl TickerConfig {
    /// Parse a configuration document. Does not validate.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check values that would make the poller misbehave.
    pub fn validate(&self) -> Result<()> {
        let twitch = &self.twitch;
        if twitch.client_id.trim().is_empty() {
            return Err(Error::config("twitch.client_id must not be empty"));
        }
        if twitch.client_secret.trim().is_empty() {
            return Err(Error::config("twitch.client_secret must not be empty"));
        }
        if twitch.channel_login.trim().is_empty() {
            return Err(Error::config("twitch.channel_login must not be empty"));
        }
        url::Url::parse(&twitch.api_base)?;
        url::Url::parse(&twitch.auth_base)?;

        if self.poll.interval_secs == 0 {
            return Err(Error::config("poll.interval_secs must be greater than 0"));
        }
        if self.poll.request_timeout_secs == 0 {
            return Err(Error::config(
                "poll.request_timeout_secs must be greater than 0",
            ));
        }
        if self.poll.max_backoff_exponent > 31 {
            return Err(Error::config("poll.max_backoff_exponent must be at most 31"));
        }
        if self.poll.stale_after_intervals == 0 {
            return Err(Error::config(
                "poll.stale_after_intervals must be greater than 0",
            ));
        }
        if self.display.zones == 0 {
            return Err(Error::config("display.zones must be greater than 0"));
        }
        Ok(())
    }

    /// Copy with secrets masked, for printing.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.twitch.client_secret.is_empty() {
            copy.twitch.client_secret = REDACTED.to_string();
        }
        copy
    }

    /// Render as TOML with secrets masked.
    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }
}
