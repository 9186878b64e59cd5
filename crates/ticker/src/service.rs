//! The ticker main loop.
//!
//! A single cooperative task owns the scheduler, the presenter and the
//! renderer. Each iteration polls when a cycle is due, then waits for the
//! earliest of: the next poll deadline, the display refresh tick, or
//! cancellation.

use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{HelixTokenExchange, TokenExchange};
use crate::config::TickerConfig;
use crate::http::build_client;
use crate::presenter::{DisplayPresenter, Frame, Renderer};
use crate::scheduler::{CycleOutcome, PollScheduler};
use crate::stats::{StatsApi, StatsClient};
use crate::Result;

/// Scheduler wired to the real Twitch endpoints.
pub type HelixScheduler = PollScheduler<HelixTokenExchange, StatsClient>;

/// Build a scheduler talking to Twitch with the given configuration.
pub fn helix_scheduler(config: &TickerConfig) -> Result<HelixScheduler> {
    config.validate()?;

    let twitch = &config.twitch;
    let client = build_client(config.poll.request_timeout())?;
    let exchange = HelixTokenExchange::new(client.clone(), &twitch.auth_base)?;
    let mut stats = StatsClient::new(client, &twitch.api_base, &twitch.client_id)?;
    if let Some(channel_id) = twitch.channel_id.as_deref() {
        stats = stats.with_channel_id(&twitch.channel_login, channel_id);
    }

    Ok(PollScheduler::new(
        config.poll.clone(),
        twitch.credentials(),
        exchange,
        stats,
    ))
}

/// Current time on the tokio clock, so paused test time drives the loop too.
pub fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub struct TickerService<E, S, R> {
    scheduler: PollScheduler<E, S>,
    presenter: DisplayPresenter,
    renderer: R,
    refresh: Duration,
    last_frame: Option<Frame>,
}

impl<E, S, R> TickerService<E, S, R>
where
    E: TokenExchange,
    S: StatsApi,
    R: Renderer,
{
    pub fn new(
        scheduler: PollScheduler<E, S>,
        presenter: DisplayPresenter,
        renderer: R,
        refresh: Duration,
    ) -> Self {
        Self {
            scheduler,
            presenter,
            renderer,
            refresh: refresh.max(Duration::from_millis(1)),
            last_frame: None,
        }
    }

    pub fn scheduler(&self) -> &PollScheduler<E, S> {
        &self.scheduler
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Run exactly one cycle and show the result.
    pub async fn run_once(&mut self) -> CycleOutcome {
        let outcome = self.scheduler.run_cycle(clock_now()).await;
        self.refresh_display(clock_now());
        outcome
    }

    /// Poll and render until `cancel` fires, then show the shutdown frame.
    ///
    /// Returns the renderer so callers can release the display.
    pub async fn run(mut self, cancel: CancellationToken) -> R {
        info!(
            channel = %self.scheduler.credentials().channel_login,
            interval_secs = self.scheduler.config().interval_secs,
            "Ticker started"
        );

        let mut refresh = tokio::time::interval(self.refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Some(outcome) = self.scheduler.poll(clock_now()).await {
                debug!(success = outcome.is_success(), "Cycle finished");
                self.refresh_display(clock_now());
            }

            // Due immediately when nothing is scheduled yet.
            let deadline = self
                .scheduler
                .next_attempt_at()
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(tokio::time::Instant::now);

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Ticker cancelled");
                    break;
                }

                _ = tokio::time::sleep_until(deadline) => {}

                _ = refresh.tick() => {
                    self.refresh_display(clock_now());
                }
            }
        }

        let frame = self.presenter.shutdown_frame();
        self.renderer.render(&frame);
        info!("Ticker stopped");
        self.renderer
    }

    /// Hand the current frame to the renderer if it changed.
    fn refresh_display(&mut self, now: Instant) {
        let frame = self.presenter.render_frame(&self.scheduler.status(now));
        if self.last_frame.as_ref() == Some(&frame) {
            return;
        }
        debug!(text = %frame.text, "Display updated");
        self.renderer.render(&frame);
        self.last_frame = Some(frame);
    }
}
