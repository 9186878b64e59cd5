//! Channel statistics retrieval.
//!
//! [`StatsApi`] is the seam the scheduler polls through. [`StatsClient`] is the
//! Helix implementation: it resolves the broadcaster id once, then reads the
//! live viewer count and the follower total on every cycle.

use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::http::endpoint;
use crate::token::AccessToken;

pub const USERS_PATH: &str = "helix/users";
pub const STREAMS_PATH: &str = "helix/streams";
pub const FOLLOWERS_PATH: &str = "helix/channels/followers";

const HEADER_CLIENT_ID: &str = "Client-Id";
const PARAM_LOGIN: &str = "login";
const PARAM_USER_ID: &str = "user_id";
const PARAM_BROADCASTER_ID: &str = "broadcaster_id";
const PARAM_FIRST: &str = "first";
const STREAM_TYPE_LIVE: &str = "live";

/// One consistent reading of a channel.
///
/// Built only after every request of a cycle succeeded and never modified
/// afterwards, so viewers and followers always come from the same fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    pub viewer_count: u64,
    pub follower_count: u64,
    /// Whether the channel was broadcasting when fetched.
    pub is_live: bool,
    pub fetched_at: Instant,
}

impl ChannelStats {
    pub fn new(viewer_count: u64, follower_count: u64, fetched_at: Instant) -> Self {
        Self {
            viewer_count,
            follower_count,
            is_live: viewer_count > 0,
            fetched_at,
        }
    }

    pub fn with_live(mut self, is_live: bool) -> Self {
        self.is_live = is_live;
        self
    }
}

/// Errors raised while fetching channel statistics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// Connection failure, timeout or server-side error.
    #[error("Network error: {0}")]
    Network(String),

    /// The API refused the access token.
    #[error("Access token rejected")]
    Unauthorized,

    /// No channel exists with the configured login.
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// The response did not have the expected shape.
    #[error("Malformed stats response: {0}")]
    MalformedResponse(String),
}

impl StatsError {
    /// Check if the next cycle may succeed without intervention.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::MalformedResponse(_))
    }
}

impl From<reqwest::Error> for StatsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Source of channel statistics.
#[async_trait]
pub trait StatsApi: Send + Sync {
    /// Fetch the current statistics of `channel_login` using `token`.
    async fn fetch_stats(
        &self,
        token: &AccessToken,
        channel_login: &str,
        now: Instant,
    ) -> Result<ChannelStats, StatsError>;
}

#[derive(Debug, Deserialize)]
struct DataPage<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StreamRecord {
    #[serde(default)]
    viewer_count: u64,
    #[serde(rename = "type", default)]
    stream_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowersPage {
    total: u64,
}

/// Twitch Helix statistics client.
#[derive(Debug)]
pub struct StatsClient {
    client: Client,
    client_id: String,
    users_url: Url,
    streams_url: Url,
    followers_url: Url,
    /// `(login, broadcaster id)` once resolved or configured.
    broadcaster: RwLock<Option<(String, String)>>,
}

impl StatsClient {
    pub fn new(client: Client, api_base: &str, client_id: impl Into<String>) -> crate::Result<Self> {
        Ok(Self {
            client,
            client_id: client_id.into(),
            users_url: endpoint(api_base, USERS_PATH)?,
            streams_url: endpoint(api_base, STREAMS_PATH)?,
            followers_url: endpoint(api_base, FOLLOWERS_PATH)?,
            broadcaster: RwLock::new(None),
        })
    }

    /// Use a known broadcaster id for `channel_login` instead of looking it up.
    pub fn with_channel_id(self, channel_login: impl Into<String>, channel_id: impl Into<String>) -> Self {
        *self.broadcaster.write() = Some((channel_login.into(), channel_id.into()));
        self
    }

    /// Broadcaster id resolved for `channel_login`, if any.
    pub fn cached_channel_id(&self, channel_login: &str) -> Option<String> {
        self.broadcaster
            .read()
            .as_ref()
            .filter(|(login, _)| login.eq_ignore_ascii_case(channel_login))
            .map(|(_, id)| id.clone())
    }

    async fn resolve_broadcaster(
        &self,
        token: &AccessToken,
        channel_login: &str,
    ) -> Result<String, StatsError> {
        if let Some(id) = self.cached_channel_id(channel_login) {
            return Ok(id);
        }

        let mut url = self.users_url.clone();
        url.query_pairs_mut().append_pair(PARAM_LOGIN, channel_login);
        let page: DataPage<UserRecord> = self.get_json(url, token).await?;
        let user = page
            .data
            .into_iter()
            .next()
            .ok_or_else(|| StatsError::ChannelNotFound(channel_login.to_string()))?;

        info!(channel = %channel_login, broadcaster_id = %user.id, "Resolved broadcaster id");
        *self.broadcaster.write() = Some((channel_login.to_string(), user.id.clone()));
        Ok(user.id)
    }

    async fn viewer_count(&self, token: &AccessToken, broadcaster_id: &str) -> Result<(u64, bool), StatsError> {
        let mut url = self.streams_url.clone();
        url.query_pairs_mut().append_pair(PARAM_USER_ID, broadcaster_id);
        let page: DataPage<StreamRecord> = self.get_json(url, token).await?;

        // No stream record means the channel is offline.
        Ok(match page.data.into_iter().next() {
            Some(stream) => {
                let live = stream
                    .stream_type
                    .as_deref()
                    .is_none_or(|kind| kind == STREAM_TYPE_LIVE);
                (stream.viewer_count, live)
            }
            None => (0, false),
        })
    }

    async fn follower_count(&self, token: &AccessToken, broadcaster_id: &str) -> Result<u64, StatsError> {
        let mut url = self.followers_url.clone();
        url.query_pairs_mut()
            .append_pair(PARAM_BROADCASTER_ID, broadcaster_id)
            .append_pair(PARAM_FIRST, "1");
        let page: FollowersPage = self.get_json(url, token).await?;
        Ok(page.total)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, token: &AccessToken) -> Result<T, StatsError> {
        debug!(url = %url, "Helix request");
        let response = self
            .client
            .get(url)
            .bearer_auth(token.value())
            .header(HEADER_CLIENT_ID, &self.client_id)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| StatsError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl StatsApi for StatsClient {
    async fn fetch_stats(
        &self,
        token: &AccessToken,
        channel_login: &str,
        now: Instant,
    ) -> Result<ChannelStats, StatsError> {
        let broadcaster_id = self.resolve_broadcaster(token, channel_login).await?;

        let (viewers, followers) = tokio::join!(
            self.viewer_count(token, &broadcaster_id),
            self.follower_count(token, &broadcaster_id)
        );
        let ((viewer_count, is_live), follower_count) = join_results(viewers, followers)?;

        Ok(ChannelStats::new(viewer_count, follower_count, now).with_live(is_live))
    }
}

/// Combine the two concurrent lookups. A rejected token on either side is
/// reported over any other error so the caller refreshes it.
fn join_results<A, B>(
    first: Result<A, StatsError>,
    second: Result<B, StatsError>,
) -> Result<(A, B), StatsError> {
    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(StatsError::Unauthorized), _) | (_, Err(StatsError::Unauthorized)) => {
            Err(StatsError::Unauthorized)
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

fn classify_status(status: StatusCode, body: &str) -> StatsError {
    match status {
        StatusCode::UNAUTHORIZED => StatsError::Unauthorized,
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            StatsError::Network(format!("HTTP {}", s.as_u16()))
        }
        s => StatsError::MalformedResponse(format!("HTTP {}: {}", s.as_u16(), body.trim())),
    }
}
