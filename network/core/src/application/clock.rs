// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

//! Wall-clock timestamps derived from the tokio clock, so that paused-time
//! tests advance message timestamps together with timers.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Horizon used for deadlines too far away to represent.
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    origin: Instant,
    epoch: DateTime<Utc>,
}

impl RuntimeClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            epoch: Utc::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        self.epoch + chrono::Duration::from_std(elapsed).unwrap_or_default()
    }

    /// The tokio instant corresponding to `at`; past timestamps map to the
    /// clock origin and unrepresentable ones to [`FAR_FUTURE`] from now.
    pub fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        match at.signed_duration_since(self.epoch).to_std() {
            Ok(offset) => self
                .origin
                .checked_add(offset)
                .unwrap_or_else(|| Instant::now() + FAR_FUTURE),
            Err(_) => self.origin,
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::start()
    }
}
