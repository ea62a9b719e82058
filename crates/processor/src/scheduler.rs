//! Window reset scheduling
//!
//! A group with a reset period archives and clears its accumulators on
//! a recurring boundary. This module computes the delay until the next
//! boundary — phase-aligned to an anchor date when one is configured —
//! and drives the rearm cycle against the external one-shot timer
//! mechanism. Timer registration is retried with capped exponential
//! backoff until it succeeds; transient failures during startup must
//! never lose a group's cadence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use statistician_types::ResetPeriod;

use crate::config::RetryConfig;
use crate::error::{ScheduleError, ScheduleResult};

/// Identity of a scheduled reset: one stream/group pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub stream: String,
    pub group: String,
}

impl GroupKey {
    pub fn new(stream: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream, self.group)
    }
}

/// The external one-shot timer mechanism
///
/// Registering arms a single fire for `key` after `delay`; rearming is
/// a fresh registration after each fire. Cancellation is not part of
/// the surface — a stale fire for a removed group is dropped by the
/// dispatcher instead.
#[async_trait]
pub trait TimerService: Send + Sync {
    async fn register(&self, key: GroupKey, delay: Duration) -> ScheduleResult<()>;
}

/// Delay until the next reset boundary
///
/// The period length is the distance from `now` to the naive next
/// boundary (calendar months/years plus fixed smaller units). Without
/// an anchor the delay is simply that length. With an anchor the
/// boundaries recur at the anchor's phase: for elapsed time `e` since
/// the anchor and period length `P`, the delay is `(P - e mod P) mod P`,
/// which satisfies `0 <= d < P` and `(now + d - anchor) mod P == 0`.
/// An anchor in the future falls out of the same arithmetic.
pub fn next_fire_delay(
    period: &ResetPeriod,
    anchor: Option<NaiveDateTime>,
    now: DateTime<Utc>,
) -> ScheduleResult<Duration> {
    let length = period.length_from(now).num_seconds();
    if length <= 0 {
        return Err(ScheduleError::EmptyPeriod);
    }

    let seconds = match anchor {
        None => length,
        Some(anchor) => {
            let elapsed = (now.naive_utc() - anchor).num_seconds();
            let remainder = elapsed.rem_euclid(length);
            (length - remainder) % length
        }
    };
    Ok(Duration::from_secs(seconds as u64))
}

/// Drives the reset cadence for one group
///
/// Owns the period, the optional anchor, and the retry policy. The
/// dispatcher calls [`ResetScheduler::arm`] once at registration and
/// again on every fire — before invoking the reset, so rearm jitter
/// never accumulates into the cadence.
#[derive(Debug, Clone)]
pub struct ResetScheduler {
    key: GroupKey,
    period: ResetPeriod,
    anchor: Option<NaiveDateTime>,
    retry: RetryConfig,
}

impl ResetScheduler {
    pub fn new(
        key: GroupKey,
        period: ResetPeriod,
        anchor: Option<NaiveDateTime>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            key,
            period,
            anchor,
            retry,
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Delay until the next boundary as seen from `now`
    pub fn delay_from(&self, now: DateTime<Utc>) -> ScheduleResult<Duration> {
        next_fire_delay(&self.period, self.anchor, now)
    }

    /// Register the next fire, retrying transient failures
    ///
    /// The delay is recomputed from the wall clock on every attempt, so
    /// time spent backing off never skews the boundary. An empty period
    /// is a permanent error and bubbles out; registration failures are
    /// retried indefinitely with capped exponential backoff.
    pub async fn arm<T: TimerService + ?Sized>(&self, timers: &T) -> ScheduleResult<()> {
        let mut backoffs = self.retry.delays();
        loop {
            let delay = self.delay_from(Utc::now())?;
            match timers.register(self.key.clone(), delay).await {
                Ok(()) => {
                    debug!(key = %self.key, delay_secs = delay.as_secs(), "reset timer armed");
                    return Ok(());
                }
                Err(err) => {
                    let backoff = backoffs
                        .next()
                        .unwrap_or(Duration::from_millis(self.retry.max_delay_ms));
                    warn!(
                        key = %self.key,
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "timer registration failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
