// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Learning Engine
//!
//! Owns the agent's [`Sensitivity`] and is the only code path allowed to
//! mutate it. Transitions are driven exclusively by monitor [`Feedback`]:
//!
//! | Feedback | Effect |
//! |----------|--------|
//! | `false_alarm` | −0.10, floor 0.5 |
//! | `missed_event` | +0.10, ceiling 1.5 |
//! | `correct` | ±0.05 towards 1.0, never crossing it |
//!
//! Incoming feedback is parked in a single pending slot and applied at the
//! start of the next evaluation. A newer message replaces an unapplied one,
//! and anything not newer than the last applied message is dropped, so stale
//! feedback can never be applied after a fresher one.

use crate::domain::sensor::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Sensitivity multiplier in `[0.5, 1.5]`, stored in hundredths so repeated
/// steps stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sensitivity(u16);

impl Sensitivity {
    pub const MIN: Sensitivity = Sensitivity(50);
    pub const MAX: Sensitivity = Sensitivity(150);
    pub const NEUTRAL: Sensitivity = Sensitivity(100);

    const STEP: u16 = 10;
    const CONVERGE_STEP: u16 = 5;

    /// Build from a float, clamping into range and rounding to hundredths.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::NEUTRAL;
        }
        let hundredths = (value * 100.0).round().clamp(Self::MIN.0 as f64, Self::MAX.0 as f64);
        Self(hundredths as u16)
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    fn decreased(self) -> Self {
        Self(self.0.saturating_sub(Self::STEP).max(Self::MIN.0))
    }

    fn increased(self) -> Self {
        Self((self.0 + Self::STEP).min(Self::MAX.0))
    }

    fn converged(self) -> Self {
        use std::cmp::Ordering;
        match self.0.cmp(&Self::NEUTRAL.0) {
            Ordering::Less => Self((self.0 + Self::CONVERGE_STEP).min(Self::NEUTRAL.0)),
            Ordering::Greater => Self(self.0.saturating_sub(Self::CONVERGE_STEP).max(Self::NEUTRAL.0)),
            Ordering::Equal => self,
        }
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    FalseAlarm,
    MissedEvent,
    Correct,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::FalseAlarm => "false_alarm",
            FeedbackKind::MissedEvent => "missed_event",
            FeedbackKind::Correct => "correct",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "false_alarm" => Ok(FeedbackKind::FalseAlarm),
            "missed_event" => Ok(FeedbackKind::MissedEvent),
            "correct" => Ok(FeedbackKind::Correct),
            other => Err(format!("unknown feedback kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub agent_id: AgentId,
    pub kind: FeedbackKind,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of offering a feedback message to the pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackReceipt {
    Queued,
    /// Replaced an older, not yet applied message.
    Superseded,
    /// Not newer than what is already pending or applied.
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct LearningEngine {
    sensitivity: Sensitivity,
    pending: Option<Feedback>,
    last_applied_at: Option<DateTime<Utc>>,
    false_alarm_count: u32,
    missed_event_count: u32,
}

impl LearningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensitivity(sensitivity: Sensitivity) -> Self {
        Self {
            sensitivity,
            ..Self::default()
        }
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    pub fn false_alarm_count(&self) -> u32 {
        self.false_alarm_count
    }

    pub fn missed_event_count(&self) -> u32 {
        self.missed_event_count
    }

    pub fn pending(&self) -> Option<&Feedback> {
        self.pending.as_ref()
    }

    pub fn offer(&mut self, feedback: Feedback) -> FeedbackReceipt {
        if self.last_applied_at.is_some_and(|applied| feedback.timestamp <= applied) {
            debug!(kind = %feedback.kind, "Dropping feedback older than last applied");
            return FeedbackReceipt::Stale;
        }
        match &self.pending {
            Some(pending) if feedback.timestamp <= pending.timestamp => FeedbackReceipt::Stale,
            Some(_) => {
                self.pending = Some(feedback);
                FeedbackReceipt::Superseded
            }
            None => {
                self.pending = Some(feedback);
                FeedbackReceipt::Queued
            }
        }
    }

    /// Apply the pending feedback, if any. Returns the applied kind.
    pub fn apply_pending(&mut self) -> Option<FeedbackKind> {
        let feedback = self.pending.take()?;
        self.last_applied_at = Some(feedback.timestamp);
        self.apply(feedback.kind);
        Some(feedback.kind)
    }

    /// Apply one feedback transition immediately.
    pub fn apply(&mut self, kind: FeedbackKind) -> Sensitivity {
        let before = self.sensitivity;
        self.sensitivity = match kind {
            FeedbackKind::FalseAlarm => {
                self.false_alarm_count += 1;
                before.decreased()
            }
            FeedbackKind::MissedEvent => {
                self.missed_event_count += 1;
                before.increased()
            }
            FeedbackKind::Correct => before.converged(),
        };
        info!(%kind, from = %before, to = %self.sensitivity, "Applied feedback");
        metrics::counter!("stormnet_feedback_applied_total", "kind" => kind.as_str()).increment(1);
        self.sensitivity
    }

    /// Back to neutral sensitivity with cleared counters.
    pub fn reset(&mut self) {
        self.sensitivity = Sensitivity::NEUTRAL;
        self.pending = None;
        self.false_alarm_count = 0;
        self.missed_event_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn feedback(kind: FeedbackKind, at: DateTime<Utc>) -> Feedback {
        Feedback {
            agent_id: AgentId::new("meteo-1"),
            kind,
            timestamp: at,
        }
    }

    #[test]
    fn test_correct_at_neutral_is_unchanged() {
        let mut engine = LearningEngine::new();
        for _ in 0..3 {
            engine.apply(FeedbackKind::Correct);
        }
        assert_eq!(engine.sensitivity().value(), 1.0);
    }

    #[test]
    fn test_false_alarms_floor_at_half() {
        let mut engine = LearningEngine::new();
        engine.apply(FeedbackKind::FalseAlarm);
        assert_eq!(engine.sensitivity().value(), 0.9);

        for _ in 0..9 {
            engine.apply(FeedbackKind::FalseAlarm);
        }
        assert_eq!(engine.sensitivity().value(), 0.5);
        assert_eq!(engine.sensitivity(), Sensitivity::MIN);
        assert_eq!(engine.false_alarm_count(), 10);
    }

    #[test]
    fn test_missed_events_ceiling() {
        let mut engine = LearningEngine::new();
        for _ in 0..8 {
            engine.apply(FeedbackKind::MissedEvent);
        }
        assert_eq!(engine.sensitivity(), Sensitivity::MAX);
        assert_eq!(engine.sensitivity().value(), 1.5);
    }

    #[test]
    fn test_correct_converges_without_crossing_neutral() {
        let mut engine = LearningEngine::with_sensitivity(Sensitivity::from_f64(0.97));
        engine.apply(FeedbackKind::Correct);
        assert_eq!(engine.sensitivity().value(), 1.0);

        let mut engine = LearningEngine::with_sensitivity(Sensitivity::from_f64(1.2));
        engine.apply(FeedbackKind::Correct);
        assert_eq!(engine.sensitivity().value(), 1.15);
        for _ in 0..10 {
            engine.apply(FeedbackKind::Correct);
        }
        assert_eq!(engine.sensitivity().value(), 1.0);
    }

    #[test]
    fn test_sensitivity_stays_in_range_for_any_sequence() {
        let kinds = [FeedbackKind::FalseAlarm, FeedbackKind::MissedEvent, FeedbackKind::Correct];
        let mut engine = LearningEngine::new();
        // Deterministic pseudo-random walk over the three kinds.
        let mut state: u32 = 7;
        for _ in 0..500 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            engine.apply(kinds[(state >> 16) as usize % 3]);
            let value = engine.sensitivity().value();
            assert!((0.5..=1.5).contains(&value));
        }
    }

    #[test]
    fn test_from_f64_clamps() {
        assert_eq!(Sensitivity::from_f64(3.0), Sensitivity::MAX);
        assert_eq!(Sensitivity::from_f64(0.1), Sensitivity::MIN);
        assert_eq!(Sensitivity::from_f64(f64::NAN), Sensitivity::NEUTRAL);
    }

    #[test]
    fn test_only_newest_pending_feedback_is_applied() {
        let now = Utc::now();
        let mut engine = LearningEngine::new();

        assert_eq!(engine.offer(feedback(FeedbackKind::FalseAlarm, now)), FeedbackReceipt::Queued);
        assert_eq!(
            engine.offer(feedback(FeedbackKind::MissedEvent, now + Duration::seconds(1))),
            FeedbackReceipt::Superseded
        );
        assert_eq!(engine.apply_pending(), Some(FeedbackKind::MissedEvent));
        assert_eq!(engine.sensitivity().value(), 1.1);
        assert_eq!(engine.apply_pending(), None);
    }

    #[test]
    fn test_out_of_order_feedback_is_dropped() {
        let now = Utc::now();
        let mut engine = LearningEngine::new();

        engine.offer(feedback(FeedbackKind::FalseAlarm, now));
        engine.apply_pending();

        let late = feedback(FeedbackKind::MissedEvent, now - Duration::seconds(5));
        assert_eq!(engine.offer(late), FeedbackReceipt::Stale);
        assert!(engine.pending().is_none());

        engine.offer(feedback(FeedbackKind::Correct, now + Duration::seconds(1)));
        let older_than_pending = feedback(FeedbackKind::FalseAlarm, now + Duration::milliseconds(500));
        assert_eq!(engine.offer(older_than_pending), FeedbackReceipt::Stale);
        assert_eq!(engine.pending().map(|f| f.kind), Some(FeedbackKind::Correct));
    }

    #[test]
    fn test_reset_restores_neutral() {
        let mut engine = LearningEngine::new();
        engine.apply(FeedbackKind::FalseAlarm);
        engine.apply(FeedbackKind::MissedEvent);
        engine.reset();
        assert_eq!(engine.sensitivity(), Sensitivity::NEUTRAL);
        assert_eq!(engine.false_alarm_count(), 0);
        assert_eq!(engine.missed_event_count(), 0);
    }
}
