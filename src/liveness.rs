use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::session::LastRead;

/// Where a subscription stands with respect to incoming data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Subscribed, nothing accepted yet.
    Waiting,
    /// A frame was accepted within the silence threshold.
    Alive,
    /// Nothing accepted for longer than the silence threshold.
    TimedOut,
}

/// Watches a session's last-read timestamp and gives up once it goes stale.
#[derive(Debug, Clone)]
pub struct Watchdog {
    last_read: LastRead,
    check_interval: Duration,
    silence_threshold: Duration,
}

impl Watchdog {
    pub fn new(last_read: LastRead, check_interval: Duration, silence_threshold: Duration) -> Self {
        Self { last_read, check_interval, silence_threshold }
    }

    /// Classify the session at `now`.
    ///
    /// Before the first frame the silence is counted from the start of the
    /// subscription.
    pub fn check(&self, now: Instant) -> Liveness {
        let last = self.last_read.get();
        let since = now.saturating_duration_since(last.unwrap_or(self.last_read.origin()));
        if since > self.silence_threshold {
            Liveness::TimedOut
        } else if last.is_none() {
            Liveness::Waiting
        } else {
            Liveness::Alive
        }
    }

    /// Check every `check_interval` until the session times out.
    ///
    /// Only ever finishes with [`Error::LivenessTimeout`]; the caller decides
    /// whether to reconnect.
    pub async fn run(self) -> Error {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = Liveness::Waiting;

        loop {
            ticker.tick().await;
            let next = self.check(Instant::now());
            match (state, next) {
                (_, Liveness::TimedOut) => {
                    warn!(threshold_secs = self.silence_threshold.as_secs(), "no data received, giving up");
                    return Error::LivenessTimeout { silence: self.silence_threshold };
                }
                (Liveness::Waiting, Liveness::Alive) => info!("receiving data"),
                (a, b) if a != b => debug!(from = ?a, to = ?b, "liveness changed"),
                _ => {}
            }
            state = next;
        }
    }
}
