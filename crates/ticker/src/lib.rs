//! Ticker engine: polls Twitch channel statistics for an LED matrix display.
//!
//! The engine authenticates with the OAuth2 client-credentials flow, fetches
//! the live viewer count and the follower total at a fixed interval, and
//! formats the latest reading for a scrolling text display.
//!
//! ## Core Types
//!
//! - [`TokenStore`] - Cached app access token with a refresh safety margin
//! - [`AuthClient`] - Keeps the token store fresh through a [`TokenExchange`]
//! - [`StatsClient`] - Helix implementation of [`StatsApi`]
//! - [`PollScheduler`] - Fetch cycle state machine with backoff and staleness
//! - [`DisplayPresenter`] - Turns a [`StatusSnapshot`] into a [`Frame`]
//!
//! ## Running
//!
//! - [`TickerService`] - Single-task loop driving the scheduler and a [`Renderer`]
//! - [`helix_scheduler`] - Scheduler wired to the real Twitch endpoints
//!
//! Network, authorization and payload errors are absorbed by the scheduler and
//! surface only as display state. [`Error`] covers startup problems.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod presenter;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod token;

pub use auth::{AuthClient, AuthError, Credentials, HelixTokenExchange, TokenExchange, TokenGrant};
pub use config::{DisplayConfig, PollConfig, TickerConfig, TwitchConfig};
pub use error::{Error, Result};
pub use presenter::{
    Alignment, DisplayPresenter, Frame, Glyph, GlyphKind, Icon, Renderer, TextEffect,
};
pub use scheduler::{
    CycleOutcome, FailureKind, PollPhase, PollScheduler, PollState, StatusSnapshot, backoff_delay,
};
pub use service::{HelixScheduler, TickerService, clock_now, helix_scheduler};
pub use stats::{ChannelStats, StatsApi, StatsClient, StatsError};
pub use token::{AccessToken, TokenStore};
