// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure sensor-side intelligence and the wire vocabulary shared with the
//! monitor.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Measurement window, risk, learning, beliefs, consensus,
//!   channel names, payloads, the transport seam and configuration

pub mod sensor;
pub mod window;
pub mod risk;
pub mod learning;
pub mod belief;
pub mod consensus;
pub mod topic;
pub mod payload;
pub mod transport;
pub mod config;
