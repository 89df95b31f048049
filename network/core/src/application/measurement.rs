// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

// Measurement Sources
//
// Where a sensor's readings come from. Real hardware is out of scope; the
// random source draws uniformly from plausible weather ranges and the
// scripted source replays a fixed sequence for tests and demos.

use crate::domain::sensor::Measurement;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::ops::RangeInclusive;

pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -15.0..=30.0;
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 20.0..=100.0;
pub const PRESSURE_RANGE: RangeInclusive<f64> = 930.0..=1030.0;

pub trait MeasurementSource: Send {
    fn sample(&mut self, at: DateTime<Utc>) -> Measurement;
}

/// Uniform random weather within [`TEMPERATURE_RANGE`], [`HUMIDITY_RANGE`]
/// and [`PRESSURE_RANGE`].
pub struct RandomWeatherSource {
    rng: StdRng,
}

impl RandomWeatherSource {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl MeasurementSource for RandomWeatherSource {
    fn sample(&mut self, at: DateTime<Utc>) -> Measurement {
        let temperature = round_tenth(self.rng.random_range(TEMPERATURE_RANGE));
        let humidity = self.rng.random_range(HUMIDITY_RANGE).trunc();
        let pressure = round_tenth(self.rng.random_range(PRESSURE_RANGE));
        Measurement::new(at, temperature, pressure, humidity)
    }
}

/// Replays `(temperature, pressure, humidity)` triples in order, then keeps
/// repeating the final one.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    remaining: VecDeque<(f64, f64, f64)>,
    last: (f64, f64, f64),
}

impl ScriptedSource {
    pub fn new(readings: impl IntoIterator<Item = (f64, f64, f64)>) -> Self {
        let remaining: VecDeque<_> = readings.into_iter().collect();
        let last = remaining.back().copied().unwrap_or((15.0, 1013.0, 50.0));
        Self { remaining, last }
    }

    /// A steady pressure fall with cold, saturated air: drives risk towards 1.
    pub fn storm() -> Self {
        Self::new((0..10).map(|i| (-12.0, 1010.0 - 4.0 * i as f64, 98.0)))
    }

    /// Mild, stable conditions: risk stays at zero.
    pub fn calm() -> Self {
        Self::new([(18.0, 1015.0, 45.0)])
    }
}

impl MeasurementSource for ScriptedSource {
    fn sample(&mut self, at: DateTime<Utc>) -> Measurement {
        let (temperature, pressure, humidity) = self.remaining.pop_front().unwrap_or(self.last);
        Measurement::new(at, temperature, pressure, humidity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_source_stays_in_range() {
        let mut source = RandomWeatherSource::new(Some(7));
        for _ in 0..500 {
            let m = source.sample(Utc::now());
            assert!(TEMPERATURE_RANGE.contains(&m.temperature));
            assert!(HUMIDITY_RANGE.contains(&m.humidity));
            assert!(PRESSURE_RANGE.contains(&m.pressure));
            assert_eq!(m.humidity.fract(), 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let now = Utc::now();
        let mut a = RandomWeatherSource::new(Some(42));
        let mut b = RandomWeatherSource::new(Some(42));
        for _ in 0..20 {
            assert_eq!(a.sample(now), b.sample(now));
        }
    }

    #[test]
    fn test_scripted_source_repeats_last_reading() {
        let now = Utc::now();
        let mut source = ScriptedSource::new([(1.0, 1000.0, 50.0), (2.0, 999.0, 60.0)]);
        assert_eq!(source.sample(now).temperature, 1.0);
        assert_eq!(source.sample(now).temperature, 2.0);
        assert_eq!(source.sample(now).pressure, 999.0);
    }
}
