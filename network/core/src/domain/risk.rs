// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Risk Engine
//!
//! Derives a scalar risk in `[0, 1]` from the measurement window and the
//! agent's current sensitivity. Three independent sub-scores are computed and
//! averaged:
//!
//! | Factor | Grows with |
//! |--------|-----------|
//! | `pressure_risk` | average pressure decline per step across the window |
//! | `temp_risk` | distance of the latest temperature outside the normal band |
//! | `humidity_risk` | humidity above the high-humidity threshold, amplified when another factor is elevated |
//!
//! `risk = clamp01(mean(factors) * sensitivity)`. The computation is pure:
//! the same window and sensitivity always yield the same assessment.

use crate::domain::learning::Sensitivity;
use crate::domain::window::MeasurementWindow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clamp into `[0, 1]`; non-finite input maps to zero.
pub fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Average decline (hPa per reading) that saturates `pressure_risk`.
    pub pressure_drop_full_rate: f64,
    /// Lower edge of the normal temperature band (°C).
    pub normal_temp_min: f64,
    /// Upper edge of the normal temperature band (°C).
    pub normal_temp_max: f64,
    /// Distance outside the band (°C) that saturates `temp_risk`.
    pub temp_full_scale: f64,
    /// Relative humidity (%) above which `humidity_risk` starts growing.
    pub humidity_threshold: f64,
    /// A pressure or temperature score at or above this is "elevated".
    pub elevated_threshold: f64,
    /// Multiplier on `humidity_risk` when another factor is elevated.
    pub compound_factor: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            pressure_drop_full_rate: 2.5,
            normal_temp_min: 5.0,
            normal_temp_max: 25.0,
            temp_full_scale: 15.0,
            humidity_threshold: 80.0,
            elevated_threshold: 0.5,
            compound_factor: 1.5,
        }
    }
}

/// Human-readable band of a risk value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Stable,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_value(risk: f64) -> Self {
        if risk < 0.3 {
            RiskLevel::Stable
        } else if risk < 0.6 {
            RiskLevel::Moderate
        } else if risk < 0.8 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Stable => "stable",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub value: f64,
    pub pressure_risk: f64,
    pub temp_risk: f64,
    pub humidity_risk: f64,
}

impl RiskAssessment {
    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_value(self.value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    policy: RiskPolicy,
}

impl RiskEngine {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub fn assess(&self, window: &MeasurementWindow, sensitivity: Sensitivity) -> RiskAssessment {
        let pressure_risk = self.pressure_risk(window);
        let temp_risk = self.temp_risk(window);
        let humidity_risk = self.humidity_risk(window, pressure_risk, temp_risk);

        let mean = (pressure_risk + temp_risk + humidity_risk) / 3.0;
        RiskAssessment {
            value: clamp01(mean * sensitivity.value()),
            pressure_risk,
            temp_risk,
            humidity_risk,
        }
    }

    fn pressure_risk(&self, window: &MeasurementWindow) -> f64 {
        let (Some(first), Some(last)) = (window.oldest(), window.latest()) else {
            return 0.0;
        };
        let steps = window.len().saturating_sub(1);
        if steps == 0 || self.policy.pressure_drop_full_rate <= 0.0 {
            return 0.0;
        }
        let decline = first.pressure - last.pressure;
        if decline <= 0.0 {
            return 0.0;
        }
        let rate = decline / steps as f64;
        clamp01(rate / self.policy.pressure_drop_full_rate)
    }

    fn temp_risk(&self, window: &MeasurementWindow) -> f64 {
        let Some(latest) = window.latest() else {
            return 0.0;
        };
        let t = latest.temperature;
        let distance = if t < self.policy.normal_temp_min {
            self.policy.normal_temp_min - t
        } else if t > self.policy.normal_temp_max {
            t - self.policy.normal_temp_max
        } else {
            0.0
        };
        if self.policy.temp_full_scale <= 0.0 {
            return if distance > 0.0 { 1.0 } else { 0.0 };
        }
        clamp01(distance / self.policy.temp_full_scale)
    }

    fn humidity_risk(&self, window: &MeasurementWindow, pressure_risk: f64, temp_risk: f64) -> f64 {
        let Some(latest) = window.latest() else {
            return 0.0;
        };
        let excess = latest.humidity - self.policy.humidity_threshold;
        if excess <= 0.0 {
            return 0.0;
        }
        let span = (100.0 - self.policy.humidity_threshold).max(f64::EPSILON);
        let base = clamp01(excess / span);

        let elevated = self.policy.elevated_threshold;
        if pressure_risk >= elevated || temp_risk >= elevated {
            clamp01(base * self.policy.compound_factor)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sensor::Measurement;
    use chrono::Utc;

    fn window_of(readings: &[(f64, f64, f64)]) -> MeasurementWindow {
        let mut window = MeasurementWindow::default();
        for &(t, p, h) in readings {
            window.push(Measurement::new(Utc::now(), t, p, h));
        }
        window
    }

    #[test]
    fn test_empty_window_has_no_risk() {
        let engine = RiskEngine::default();
        let risk = engine.assess(&MeasurementWindow::default(), Sensitivity::default());
        assert_eq!(risk, RiskAssessment::default());
    }

    #[test]
    fn test_stable_or_rising_pressure_scores_zero() {
        let engine = RiskEngine::default();
        let stable = window_of(&[(15.0, 1010.0, 50.0), (15.0, 1010.0, 50.0)]);
        let rising = window_of(&[(15.0, 1000.0, 50.0), (15.0, 1008.0, 50.0)]);
        assert_eq!(engine.assess(&stable, Sensitivity::default()).pressure_risk, 0.0);
        assert_eq!(engine.assess(&rising, Sensitivity::default()).pressure_risk, 0.0);
    }

    #[test]
    fn test_steeper_pressure_drop_scores_higher() {
        let engine = RiskEngine::default();
        let gentle = window_of(&[(15.0, 1010.0, 50.0), (15.0, 1009.0, 50.0), (15.0, 1008.0, 50.0)]);
        let steep = window_of(&[(15.0, 1010.0, 50.0), (15.0, 1006.0, 50.0), (15.0, 1002.0, 50.0)]);
        let gentle_risk = engine.assess(&gentle, Sensitivity::default()).pressure_risk;
        let steep_risk = engine.assess(&steep, Sensitivity::default()).pressure_risk;
        assert!((gentle_risk - 0.4).abs() < 1e-9);
        assert_eq!(steep_risk, 1.0);
    }

    #[test]
    fn test_temperature_band_is_symmetric() {
        let engine = RiskEngine::default();
        let cold = window_of(&[(-2.5, 1010.0, 50.0)]);
        let hot = window_of(&[(32.5, 1010.0, 50.0)]);
        let normal = window_of(&[(18.0, 1010.0, 50.0)]);
        let cold_risk = engine.assess(&cold, Sensitivity::default()).temp_risk;
        let hot_risk = engine.assess(&hot, Sensitivity::default()).temp_risk;
        assert!((cold_risk - 0.5).abs() < 1e-9);
        assert!((hot_risk - cold_risk).abs() < 1e-9);
        assert_eq!(engine.assess(&normal, Sensitivity::default()).temp_risk, 0.0);
    }

    #[test]
    fn test_humidity_compounds_with_elevated_factor() {
        let engine = RiskEngine::default();
        let humid_only = window_of(&[(15.0, 1010.0, 90.0)]);
        let humid_and_cold = window_of(&[(-10.0, 1010.0, 90.0)]);
        let alone = engine.assess(&humid_only, Sensitivity::default()).humidity_risk;
        let compound = engine.assess(&humid_and_cold, Sensitivity::default()).humidity_risk;
        assert!((alone - 0.5).abs() < 1e-9);
        assert!((compound - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_composite_scales_with_sensitivity_and_clamps() {
        let engine = RiskEngine::default();
        let storm = window_of(&[(-20.0, 1010.0, 100.0), (-20.0, 990.0, 100.0)]);
        let full = engine.assess(&storm, Sensitivity::default());
        assert_eq!(full.value, 1.0);

        let mild = window_of(&[(15.0, 1010.0, 90.0)]);
        let low = engine.assess(&mild, Sensitivity::MIN);
        let high = engine.assess(&mild, Sensitivity::MAX);
        assert!(low.value < high.value);
        assert!((high.value - 0.5 / 3.0 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_risk_always_within_unit_interval() {
        let engine = RiskEngine::default();
        let temps = [-40.0, -5.0, 0.0, 15.0, 30.0, 45.0];
        let pressures = [930.0, 970.0, 1000.0, 1030.0];
        let humidities = [0.0, 50.0, 85.0, 100.0];
        for sensitivity in [Sensitivity::MIN, Sensitivity::default(), Sensitivity::MAX] {
            for &t in &temps {
                for &p in &pressures {
                    for &h in &humidities {
                        let window = window_of(&[(t, 1030.0, h), (t, p, h)]);
                        let risk = engine.assess(&window, sensitivity);
                        assert!((0.0..=1.0).contains(&risk.value));
                        assert!((0.0..=1.0).contains(&risk.humidity_risk));
                    }
                }
            }
        }
    }

    #[test]
    fn test_risk_level_labels() {
        assert_eq!(RiskLevel::from_value(0.1), RiskLevel::Stable);
        assert_eq!(RiskLevel::from_value(0.3), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_value(0.65), RiskLevel::High);
        assert_eq!(RiskLevel::from_value(0.8), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.to_string(), "critical");
    }
}
