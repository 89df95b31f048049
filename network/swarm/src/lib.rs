// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `stormnet-swarm` - Network Monitor
//!
//! Coordinates the sensors of one network: admits them into the six sector
//! slots, watches their beliefs and alerts, and closes the learning loop by
//! sending throttled corrective feedback.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `SectorPool`, `SensorRecord`, `ConnectionSupervisor`, `FeedbackAnalyzer` |
//! | [`application`] | Application | `MonitorService` message handling and `MonitorRuntime` dispatch loop |
//!
//! ## Key Concepts
//!
//! - **Sector**: one of six capacity slots; at most one agent each.
//! - **Last will**: an offline presence published by the transport for an
//!   agent that vanished. Handled like a graceful leave but flagged abnormal.
//! - **Cooldown**: at most one feedback message per agent per cooldown window.
//!
//! All monitor state is owned by one task; nothing here is shared.

pub mod domain;
pub mod application;

pub use domain::*;
