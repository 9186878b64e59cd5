//! Access token cache.

use std::fmt;
use std::time::{Duration, Instant};

/// An OAuth2 app access token and the instant it stops being accepted.
///
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Token issued at `now` that lives for `expires_in`.
    pub fn issued(value: impl Into<String>, now: Instant, expires_in: Duration) -> Self {
        Self::new(value, now + expires_in)
    }

    /// Raw bearer value.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[inline]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Holds the current access token for the lifetime of the process.
///
/// A token is usable only while `now < expires_at - safety_margin`, so a token
/// handed out never expires while the request using it is in flight.
#[derive(Debug)]
pub struct TokenStore {
    token: Option<AccessToken>,
    safety_margin: Duration,
}

impl TokenStore {
    pub fn new(safety_margin: Duration) -> Self {
        Self {
            token: None,
            safety_margin,
        }
    }

    /// Current token, valid or not.
    pub fn get(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn set(&mut self, token: AccessToken) {
        self.token = Some(token);
    }

    /// Drop the current token, e.g. after the API rejected it.
    pub fn invalidate(&mut self) {
        self.token = None;
    }

    pub fn is_valid(&self, now: Instant) -> bool {
        self.token.as_ref().is_some_and(|token| {
            token
                .expires_at
                .checked_sub(self.safety_margin)
                .is_some_and(|usable_until| now < usable_until)
        })
    }

    /// The token, only if it is valid at `now`.
    pub fn valid_token(&self, now: Instant) -> Option<&AccessToken> {
        if self.is_valid(now) {
            self.token.as_ref()
        } else {
            None
        }
    }

    #[inline]
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }
}
