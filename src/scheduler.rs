//! Poll scheduler - paces "current height" requests.
//!
//! The scheduler only decides *when* a poll is due and builds the request; the
//! connector task sends it if the connection is up. A stopped scheduler never fires.
//! The first tick comes one full period after `start`, so over a span `D` a running
//! scheduler fires `floor(D / period)` times.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::protocol::{build_request, packet_type};

/// Timer that fires at a fixed period while started.
#[derive(Debug)]
pub struct PollScheduler {
    period: Duration,
    interval: Option<Interval>,
    polls_sent: u64,
}

impl PollScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
            polls_sent: 0,
        }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Arm the timer. No-op if already running.
    pub fn start(&mut self) {
        if self.interval.is_some() {
            return;
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Cancel the timer.
    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Wait for the next tick. Pending forever while stopped. Cancel safe.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Build a height request with a fresh token. Returns bytes and token.
    pub fn next_request(&self) -> (Bytes, u32) {
        build_request(packet_type::REQUEST_CURRENT_HEIGHT, &[])
    }

    /// Count a request that actually went out.
    pub fn record_sent(&mut self) {
        self.polls_sent += 1;
    }

    pub fn polls_sent(&self) -> u64 {
        self.polls_sent
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
