//! Inter-batch pacing.
//!
//! Every `every` successful child completions the pipeline pauses for a
//! random number of seconds in `[min_delay_secs, max_delay_secs]`. The counter
//! spans the whole run and ignores row boundaries.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::contract::Sleeper;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub every: u64,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            every: 50,
            min_delay_secs: 10,
            max_delay_secs: 40,
        }
    }
}

/// Run-wide completion counter that decides when to pause.
#[derive(Debug, Clone)]
pub struct Pacer {
    config: PacingConfig,
    completed: u64,
    paused_at: Option<u64>,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self {
            config,
            completed: 0,
            paused_at: None,
        }
    }

    /// Successful completions so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn record_success(&mut self) {
        self.completed += 1;
    }

    /// True when the counter sits on a positive multiple of `every` that has
    /// not been paused for yet.
    pub fn due(&self) -> bool {
        self.config.every > 0
            && self.completed > 0
            && self.completed % self.config.every == 0
            && self.paused_at != Some(self.completed)
    }

    fn pick_delay(&self) -> Duration {
        let (lo, hi) = (self.config.min_delay_secs, self.config.max_delay_secs);
        let secs = if lo >= hi {
            lo
        } else {
            rand::thread_rng().gen_range(lo..=hi)
        };
        Duration::from_secs(secs)
    }

    /// Sleeps if a pause is due. Returns the delay applied, if any.
    pub async fn pace<S>(&mut self, sleeper: &S) -> Option<Duration>
    where
        S: Sleeper + ?Sized,
    {
        if !self.due() {
            return None;
        }
        let delay = self.pick_delay();
        info!(
            completed = self.completed,
            delay_secs = delay.as_secs(),
            "[PACE] Pausing between batches"
        );
        sleeper.sleep(delay).await;
        self.paused_at = Some(self.completed);
        Some(delay)
    }
}
