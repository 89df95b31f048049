// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod clock;
pub mod measurement;
pub mod sensor_agent;
pub mod sensor_runtime;

// Re-export the sensor-side entry points for convenience
pub use clock::RuntimeClock;
pub use measurement::{MeasurementSource, RandomWeatherSource, ScriptedSource};
pub use sensor_agent::{adaptive_interval, AgentPhase, SensorAgent, StopReason};
pub use sensor_runtime::{SensorReport, SensorRuntime};
