//! Poll state machine.
//!
//! One cycle walks `Idle → Authenticating → Fetching → Updated | Failed` and
//! returns to `Idle`. All auth and stats errors end here: they become a
//! [`FailureKind`], adjust the backoff and never propagate further.
//!
//! The scheduler is the only mutator of the token store and of the latest
//! [`ChannelStats`] snapshot. Readers get an `Arc` to a complete snapshot, so a
//! half-updated reading can never be observed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::auth::{AuthClient, AuthError, Credentials, TokenExchange};
use crate::config::PollConfig;
use crate::stats::{ChannelStats, StatsApi, StatsError};
use crate::token::{AccessToken, TokenStore};

/// Why a cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection error or timeout.
    Network,
    /// Credentials rejected by the authorization server.
    Configuration,
    /// Access token rejected twice in one cycle.
    Unauthorized,
    /// The configured channel does not exist.
    ChannelNotFound,
    /// Unexpected payload from either endpoint.
    MalformedResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Configuration => "configuration",
            Self::Unauthorized => "unauthorized",
            Self::ChannelNotFound => "channel_not_found",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AuthError> for FailureKind {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::Network(_) => Self::Network,
            AuthError::Rejected { .. } => Self::Configuration,
            AuthError::MalformedResponse(_) => Self::MalformedResponse,
        }
    }
}

impl From<&StatsError> for FailureKind {
    fn from(err: &StatsError) -> Self {
        match err {
            StatsError::Network(_) => Self::Network,
            StatsError::Unauthorized => Self::Unauthorized,
            StatsError::ChannelNotFound(_) => Self::ChannelNotFound,
            StatsError::MalformedResponse(_) => Self::MalformedResponse,
        }
    }
}

/// Where the scheduler is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Authenticating,
    Fetching,
    Updated,
    Failed(FailureKind),
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::Fetching => f.write_str("fetching"),
            Self::Updated => f.write_str("updated"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Updated(Arc<ChannelStats>),
    Failed(FailureKind),
}

impl CycleOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Success bookkeeping that drives backoff and staleness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollState {
    pub last_success: Option<Instant>,
    pub consecutive_failures: u32,
}

/// Read-only view handed to the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Most recent successful reading, kept across failures.
    pub stats: Option<Arc<ChannelStats>>,
    pub stale: bool,
    pub phase: PollPhase,
    pub last_failure: Option<FailureKind>,
    /// Credentials were rejected and no token has been issued since.
    pub credentials_rejected: bool,
    pub consecutive_failures: u32,
    /// Time until the next cycle is due, `None` if due now.
    pub next_attempt_in: Option<Duration>,
}

impl StatusSnapshot {
    /// Credentials are known to be bad. Stays set across later failures of
    /// other kinds until a token exchange succeeds.
    #[inline]
    pub fn config_error(&self) -> bool {
        self.credentials_rejected
    }

    /// The configured channel does not exist.
    #[inline]
    pub fn channel_missing(&self) -> bool {
        self.last_failure == Some(FailureKind::ChannelNotFound)
    }
}

/// Delay before the next cycle after `failures` consecutive failures:
/// `base × min(2^failures, 2^max_exponent)`.
pub fn backoff_delay(base: Duration, failures: u32, max_exponent: u32) -> Duration {
    let multiplier = 1u32
        .checked_shl(failures.min(max_exponent))
        .unwrap_or(u32::MAX);
    base.saturating_mul(multiplier)
}

/// Drives fetch cycles and owns every piece of mutable poll state.
pub struct PollScheduler<E, S> {
    config: PollConfig,
    credentials: Credentials,
    auth: AuthClient<E>,
    stats_api: S,
    tokens: TokenStore,
    latest: Option<Arc<ChannelStats>>,
    state: PollState,
    phase: PollPhase,
    last_failure: Option<FailureKind>,
    /// Set by a credential rejection, cleared only by an issued token.
    credentials_rejected: bool,
    /// `None` until the first cycle, meaning due immediately.
    next_attempt_at: Option<Instant>,
}

impl<E, S> PollScheduler<E, S>
where
    E: TokenExchange,
    S: StatsApi,
{
    pub fn new(config: PollConfig, credentials: Credentials, exchange: E, stats_api: S) -> Self {
        let tokens = TokenStore::new(config.token_safety_margin());
        Self {
            config,
            credentials,
            auth: AuthClient::new(exchange),
            stats_api,
            tokens,
            latest: None,
            state: PollState::default(),
            phase: PollPhase::Idle,
            last_failure: None,
            credentials_rejected: false,
            next_attempt_at: None,
        }
    }

    #[inline]
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    #[inline]
    pub fn state(&self) -> PollState {
        self.state
    }

    #[inline]
    pub fn latest(&self) -> Option<Arc<ChannelStats>> {
        self.latest.clone()
    }

    #[inline]
    pub fn next_attempt_at(&self) -> Option<Instant> {
        self.next_attempt_at
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Check whether a cycle should start at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.phase == PollPhase::Idle && self.next_attempt_at.is_none_or(|at| now >= at)
    }

    /// Whether the last good snapshot is older than the staleness threshold.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.state
            .last_success
            .is_some_and(|at| now.saturating_duration_since(at) > self.config.stale_after())
    }

    /// Snapshot for the presenter.
    pub fn status(&self, now: Instant) -> StatusSnapshot {
        StatusSnapshot {
            stats: self.latest.clone(),
            stale: self.is_stale(now),
            phase: self.phase,
            last_failure: self.last_failure,
            credentials_rejected: self.credentials_rejected,
            consecutive_failures: self.state.consecutive_failures,
            next_attempt_in: self
                .next_attempt_at
                .map(|at| at.saturating_duration_since(now))
                .filter(|d| !d.is_zero()),
        }
    }

    /// Run a cycle if one is due at `now`.
    pub async fn poll(&mut self, now: Instant) -> Option<CycleOutcome> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.run_cycle(now).await)
    }

    /// Run one full cycle, regardless of schedule.
    ///
    /// A token rejected by the stats endpoint is dropped and re-requested once;
    /// a second rejection fails the cycle.
    pub async fn run_cycle(&mut self, now: Instant) -> CycleOutcome {
        let mut reauthenticated = false;

        loop {
            self.transition(PollPhase::Authenticating);
            let token = match self.authenticate(now).await {
                Ok(token) => {
                    if self.credentials_rejected {
                        info!("Credentials accepted again");
                        self.credentials_rejected = false;
                    }
                    token
                }
                Err(err) => {
                    let kind = FailureKind::from(&err);
                    if err.is_configuration_error() {
                        self.credentials_rejected = true;
                        error!(error = %err, "Twitch rejected the configured credentials");
                    } else {
                        warn!(error = %err, "Authentication failed");
                    }
                    return self.fail(now, kind);
                }
            };

            self.transition(PollPhase::Fetching);
            match self.fetch(&token, now).await {
                Ok(stats) => return self.succeed(now, stats),
                Err(StatsError::Unauthorized) if !reauthenticated => {
                    warn!("Access token rejected, re-authenticating");
                    self.tokens.invalidate();
                    reauthenticated = true;
                }
                Err(err) => {
                    match &err {
                        StatsError::ChannelNotFound(login) => {
                            warn!(channel = %login, "Channel not found, skipping cycle");
                        }
                        StatsError::Unauthorized => {
                            self.tokens.invalidate();
                            warn!("Access token rejected again after refresh");
                        }
                        other => warn!(error = %other, "Failed to fetch channel stats"),
                    }
                    return self.fail(now, FailureKind::from(&err));
                }
            }
        }
    }

    async fn authenticate(&mut self, now: Instant) -> Result<AccessToken, AuthError> {
        let timeout = self.config.request_timeout();
        let fut = self.auth.ensure_token(&mut self.tokens, &self.credentials, now);
        bounded(timeout, fut)
            .await
            .unwrap_or_else(|| Err(AuthError::Network(format!("timed out after {timeout:?}"))))
    }

    async fn fetch(&self, token: &AccessToken, now: Instant) -> Result<ChannelStats, StatsError> {
        let timeout = self.config.request_timeout();
        let fut = self
            .stats_api
            .fetch_stats(token, &self.credentials.channel_login, now);
        bounded(timeout, fut)
            .await
            .unwrap_or_else(|| Err(StatsError::Network(format!("timed out after {timeout:?}"))))
    }

    fn succeed(&mut self, now: Instant, stats: ChannelStats) -> CycleOutcome {
        let stats = Arc::new(stats);
        info!(
            viewers = stats.viewer_count,
            followers = stats.follower_count,
            live = stats.is_live,
            "Channel stats updated"
        );
        self.latest = Some(stats.clone());
        self.state = PollState {
            last_success: Some(now),
            consecutive_failures: 0,
        };
        self.last_failure = None;
        self.next_attempt_at = Some(now + self.config.interval());
        self.transition(PollPhase::Updated);
        self.transition(PollPhase::Idle);
        CycleOutcome::Updated(stats)
    }

    fn fail(&mut self, now: Instant, kind: FailureKind) -> CycleOutcome {
        let base = self.config.interval();
        let max_exponent = self.config.max_backoff_exponent;

        let delay = if self.credentials_rejected {
            // No token since the rejection; the same credentials will keep failing.
            self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
            base.saturating_mul(self.config.max_backoff_multiplier())
        } else if kind == FailureKind::ChannelNotFound {
            // Stable condition, not worth backing off for.
            base
        } else {
            self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
            backoff_delay(base, self.state.consecutive_failures, max_exponent)
        };

        debug!(
            kind = %kind,
            failures = self.state.consecutive_failures,
            retry_in_secs = delay.as_secs(),
            "Cycle failed"
        );
        self.last_failure = Some(kind);
        self.next_attempt_at = Some(now + delay);
        self.transition(PollPhase::Failed(kind));
        self.transition(PollPhase::Idle);
        CycleOutcome::Failed(kind)
    }

    fn transition(&mut self, to: PollPhase) {
        debug!(from = %self.phase, to = %to, "Poll phase");
        self.phase = to;
    }
}

/// Await `fut` for at most `timeout`; `None` on expiry.
async fn bounded<F: Future>(timeout: Duration, fut: F) -> Option<F::Output> {
    if timeout.is_zero() {
        return Some(fut.await);
    }
    tokio::time::timeout(timeout, fut).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenGrant;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    const BASE: Duration = Duration::from_secs(60);

    /// Replays scripted results; repeats the last one when the script runs out.
    #[derive(Clone)]
    struct Script<T> {
        results: Arc<Mutex<VecDeque<T>>>,
        calls: Arc<AtomicU32>,
    }

    impl<T: Clone> Script<T> {
        fn new(results: Vec<T>) -> Self {
            Self {
                results: Arc::new(Mutex::new(results.into())),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn next(&self) -> T {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock();
            if results.len() > 1 {
                results.pop_front().unwrap()
            } else {
                results.front().cloned().unwrap()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    type StatsResult = Result<(u64, u64), StatsError>;

    #[async_trait]
    impl TokenExchange for Script<Result<TokenGrant, AuthError>> {
        async fn exchange(&self, _credentials: &Credentials) -> Result<TokenGrant, AuthError> {
            self.next()
        }
    }

    #[async_trait]
    impl StatsApi for Script<StatsResult> {
        async fn fetch_stats(
            &self,
            token: &AccessToken,
            _channel_login: &str,
            now: Instant,
        ) -> Result<ChannelStats, StatsError> {
            assert!(token.expires_at() > now, "expired token handed to stats");
            self.next()
                .map(|(viewers, followers)| ChannelStats::new(viewers, followers, now))
        }
    }

    fn grant(secs: u64) -> Result<TokenGrant, AuthError> {
        Ok(TokenGrant {
            access_token: "token".to_string(),
            expires_in: Duration::from_secs(secs),
        })
    }

    fn rejected() -> Result<TokenGrant, AuthError> {
        Err(AuthError::Rejected {
            status: 403,
            message: "invalid client secret".to_string(),
        })
    }

    fn scheduler(
        auth: Vec<Result<TokenGrant, AuthError>>,
        stats: Vec<StatsResult>,
    ) -> (
        PollScheduler<Script<Result<TokenGrant, AuthError>>, Script<StatsResult>>,
        Script<Result<TokenGrant, AuthError>>,
        Script<StatsResult>,
    ) {
        let auth = Script::new(auth);
        let stats = Script::new(stats);
        let scheduler = PollScheduler::new(
            PollConfig::default(),
            Credentials::new("id", "secret", "channel"),
            auth.clone(),
            stats.clone(),
        );
        (scheduler, auth, stats)
    }

    #[test]
    fn backoff_formula() {
        for n in 0..=10u32 {
            let expected = BASE * 2u32.pow(n).min(64);
            assert_eq!(backoff_delay(BASE, n, 6), expected, "failures = {n}");
        }
    }

    #[test]
    fn backoff_saturates_for_huge_exponents() {
        assert_eq!(backoff_delay(BASE, 100, 40), BASE * u32::MAX);
        assert_eq!(backoff_delay(Duration::MAX, 3, 6), Duration::MAX);
    }

    #[tokio::test]
    async fn first_cycle_updates_and_schedules_next() {
        let (mut scheduler, auth, _) = scheduler(vec![grant(3600)], vec![Ok((42, 100))]);
        let t0 = Instant::now();

        assert!(scheduler.is_due(t0));
        let outcome = scheduler.poll(t0).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(auth.calls(), 1);
        assert_eq!(scheduler.phase(), PollPhase::Idle);
        assert_eq!(scheduler.state().last_success, Some(t0));
        assert_eq!(scheduler.next_attempt_at(), Some(t0 + BASE));

        assert!(scheduler.poll(t0 + BASE - Duration::from_secs(1)).await.is_none());
        assert!(scheduler.poll(t0 + BASE).await.is_some());
        assert_eq!(auth.calls(), 1, "cached token reused");
    }

    #[tokio::test]
    async fn reauthenticates_after_token_expiry() {
        let (mut scheduler, auth, _) = scheduler(vec![grant(3600)], vec![Ok((42, 100))]);
        let t0 = Instant::now();

        scheduler.run_cycle(t0).await;
        let later = t0 + Duration::from_secs(3601);
        let outcome = scheduler.run_cycle(later).await;

        assert!(outcome.is_success());
        assert_eq!(auth.calls(), 2);
        assert!(scheduler.tokens().is_valid(later));
    }

    #[tokio::test]
    async fn single_unauthorized_triggers_one_reauth() {
        let (mut scheduler, auth, stats) = scheduler(
            vec![grant(3600)],
            vec![Err(StatsError::Unauthorized), Ok((5, 6))],
        );
        let outcome = scheduler.run_cycle(Instant::now()).await;

        assert!(outcome.is_success());
        assert_eq!(auth.calls(), 2);
        assert_eq!(stats.calls(), 2);
        assert_eq!(scheduler.state().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn second_unauthorized_fails_cycle() {
        let (mut scheduler, auth, stats) =
            scheduler(vec![grant(3600)], vec![Err(StatsError::Unauthorized)]);
        let t0 = Instant::now();
        let outcome = scheduler.run_cycle(t0).await;

        assert_eq!(outcome, CycleOutcome::Failed(FailureKind::Unauthorized));
        assert_eq!(auth.calls(), 2, "exactly one re-authentication");
        assert_eq!(stats.calls(), 2);
        assert_eq!(scheduler.state().consecutive_failures, 1);
        assert_eq!(scheduler.next_attempt_at(), Some(t0 + BASE * 2));
        assert!(scheduler.tokens().get().is_none());
    }

    #[tokio::test]
    async fn auth_rejection_waits_full_backoff_window() {
        let (mut scheduler, auth, stats) = scheduler(vec![rejected()], vec![Ok((1, 1))]);
        let t0 = Instant::now();
        let window = BASE * 64;

        let outcome = scheduler.poll(t0).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Failed(FailureKind::Configuration));
        assert!(scheduler.status(t0).config_error());
        assert_eq!(auth.calls(), 1);

        for offset in [BASE, BASE * 10, window - Duration::from_secs(1)] {
            assert!(scheduler.poll(t0 + offset).await.is_none());
        }
        assert_eq!(auth.calls(), 1, "no attempts inside the window");

        scheduler.poll(t0 + window).await.unwrap();
        assert_eq!(auth.calls(), 2, "exactly one attempt at the boundary");
        assert_eq!(stats.calls(), 0);
    }

    #[tokio::test]
    async fn rejection_stays_visible_until_a_token_is_issued() {
        let (mut scheduler, auth, _) = scheduler(
            vec![
                rejected(),
                Err(AuthError::Network("connection reset".into())),
                grant(3600),
            ],
            vec![Ok((1, 1))],
        );
        let t0 = Instant::now();
        let window = BASE * 64;

        scheduler.poll(t0).await.unwrap();
        let outcome = scheduler.poll(t0 + window).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Failed(FailureKind::Network));

        let status = scheduler.status(t0 + window);
        assert!(status.config_error(), "network blip must not hide the rejection");
        assert_eq!(status.next_attempt_in, Some(window));
        assert_eq!(auth.calls(), 2);

        let outcome = scheduler.poll(t0 + window * 2).await.unwrap();
        assert!(outcome.is_success());
        assert!(!scheduler.status(t0 + window * 2).config_error());
    }

    #[tokio::test]
    async fn network_failures_back_off_exponentially() {
        let (mut scheduler, _, _) =
            scheduler(vec![grant(3600)], vec![Err(StatsError::Network("down".into()))]);
        let mut now = Instant::now();

        for n in 1..=8u32 {
            let outcome = scheduler.run_cycle(now).await;
            assert_eq!(outcome, CycleOutcome::Failed(FailureKind::Network));
            let delay = scheduler.next_attempt_at().unwrap() - now;
            assert_eq!(delay, BASE * 2u32.pow(n).min(64));
            now += delay;
        }
    }

    #[tokio::test]
    async fn channel_not_found_keeps_normal_interval() {
        let (mut scheduler, _, _) = scheduler(
            vec![grant(3600)],
            vec![Err(StatsError::ChannelNotFound("channel".into()))],
        );
        let t0 = Instant::now();
        let outcome = scheduler.run_cycle(t0).await;

        assert_eq!(outcome, CycleOutcome::Failed(FailureKind::ChannelNotFound));
        assert_eq!(scheduler.state().consecutive_failures, 0);
        assert_eq!(scheduler.next_attempt_at(), Some(t0 + BASE));
        assert!(scheduler.status(t0).channel_missing());
    }

    #[tokio::test]
    async fn failure_keeps_previous_stats() {
        let (mut scheduler, _, _) = scheduler(
            vec![grant(3600)],
            vec![Ok((42, 100)), Err(StatsError::MalformedResponse("?".into()))],
        );
        let t0 = Instant::now();
        scheduler.run_cycle(t0).await;
        scheduler.run_cycle(t0 + BASE).await;

        let status = scheduler.status(t0 + BASE);
        let stats = status.stats.unwrap();
        assert_eq!((stats.viewer_count, stats.follower_count), (42, 100));
        assert_eq!(status.last_failure, Some(FailureKind::MalformedResponse));
    }

    #[tokio::test]
    async fn staleness_boundary() {
        let (mut scheduler, _, _) = scheduler(vec![grant(3600)], vec![Ok((1, 2))]);
        let t0 = Instant::now();
        assert!(!scheduler.is_stale(t0), "no data is not stale");

        scheduler.run_cycle(t0).await;
        let threshold = BASE * 3;
        assert!(!scheduler.is_stale(t0 + threshold));
        assert!(scheduler.is_stale(t0 + threshold + Duration::from_nanos(1)));
        assert!(scheduler.status(t0 + threshold + Duration::from_secs(1)).stale);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stats_call_times_out_as_network_error() {
        struct Hanging;

        #[async_trait]
        impl StatsApi for Hanging {
            async fn fetch_stats(
                &self,
                _token: &AccessToken,
                _channel_login: &str,
                _now: Instant,
            ) -> Result<ChannelStats, StatsError> {
                std::future::pending().await
            }
        }

        let mut scheduler = PollScheduler::new(
            PollConfig::default(),
            Credentials::new("id", "secret", "channel"),
            Script::new(vec![grant(3600)]),
            Hanging,
        );
        let outcome = scheduler.run_cycle(Instant::now()).await;
        assert_eq!(outcome, CycleOutcome::Failed(FailureKind::Network));
    }

    fn stats_result() -> impl Strategy<Value = StatsResult> {
        prop_oneof![
            (0u64..10_000, 0u64..10_000).prop_map(Ok),
            Just(Err(StatsError::Network("down".into()))),
            Just(Err(StatsError::MalformedResponse("?".into()))),
            Just(Err(StatsError::Unauthorized)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_backoff_is_bounded(failures in 0u32..1000, base_secs in 1u64..3600) {
            let base = Duration::from_secs(base_secs);
            let delay = backoff_delay(base, failures, 6);
            prop_assert!(delay >= base);
            prop_assert!(delay <= base * 64);
            prop_assert_eq!(delay, base * 2u32.pow(failures.min(6)));
        }

        /// The published snapshot is always the latest successful reading, whole.
        #[test]
        fn prop_snapshot_is_latest_success(results in prop::collection::vec(stats_result(), 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            // Unauthorized is retried within a cycle, so feed one result per call
            // and track what a cycle should have published.
            let (mut scheduler, _, stats) = scheduler(vec![grant(3600)], results.clone());
            let mut expected: Option<(u64, u64)> = None;
            let mut now = Instant::now();

            while (stats.calls() as usize) < results.len() {
                let before = stats.calls() as usize;
                let outcome = rt.block_on(scheduler.run_cycle(now));
                let after = stats.calls() as usize;
                if let CycleOutcome::Updated(_) = outcome {
                    expected = results[(after - 1).min(results.len() - 1)].clone().ok();
                }
                prop_assert!(after > before);

                let shown = scheduler
                    .status(now)
                    .stats
                    .map(|s| (s.viewer_count, s.follower_count));
                prop_assert_eq!(shown, expected);
                now += Duration::from_secs(1);
            }
        }
    }
}
