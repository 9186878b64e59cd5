use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ticker_engine::TickerConfig;

pub const APP_NAME: &str = "twitch-ticker";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Shows live Twitch viewer and follower counts on a scrolling display.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TWITCH_TICKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write daily rotated log files to this directory
    #[arg(long, global = true, env = "TWITCH_TICKER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Twitch application client id
    #[arg(long, global = true, env = "TWITCH_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Twitch application client secret
    #[arg(long, global = true, env = "TWITCH_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Login name of the channel to follow
    #[arg(long, global = true, env = "TWITCH_CHANNEL")]
    pub channel: Option<String>,

    /// Seconds between fetch cycles
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Poll and display until interrupted (default)
    Run,

    /// Run a single fetch cycle and exit non-zero on failure
    Check,

    /// Manage the configuration file
    Config {
        /// Print the effective configuration with secrets masked
        #[arg(long)]
        show: bool,

        /// Write a default configuration file if none exists
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

impl Args {
    /// Config file to use: `--config`, else the per-user config directory.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
        })
    }

    /// Apply command line and environment overrides on top of the file config.
    pub fn apply_overrides(&self, config: &mut TickerConfig) {
        if let Some(client_id) = &self.client_id {
            config.twitch.client_id = client_id.clone();
        }
        if let Some(client_secret) = &self.client_secret {
            config.twitch.client_secret = client_secret.clone();
        }
        if let Some(channel) = &self.channel {
            // A cached broadcaster id belongs to the file's login.
            if !config.twitch.channel_login.eq_ignore_ascii_case(channel) {
                config.twitch.channel_id = None;
            }
            config.twitch.channel_login = channel.clone();
        }
        if let Some(interval) = self.interval {
            config.poll.interval_secs = interval;
        }
    }

    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
