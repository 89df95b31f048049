// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Sensor-side intelligence for the stormnet weather network.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Risk, beliefs, consensus and learning per sensor, the wire
//!   vocabulary, the transport seam with its in-memory broker, and the
//!   sensor agent with its dispatch loop

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
