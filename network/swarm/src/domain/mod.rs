// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Domain Layer
//!
//! Pure monitor-side types. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`sector_pool`] | `SectorPool` |
//! | [`record`] | `SensorRecord`, `AlertRecord`, `BeliefSnapshot` |
//! | [`supervisor`] | `ConnectionSupervisor`, `Admission`, `DisconnectKind`, summaries |
//! | [`feedback`] | `FeedbackAnalyzer`, `Classification`, `FeedbackDecision` |

pub mod sector_pool;
pub mod record;
pub mod supervisor;
pub mod feedback;

pub use feedback::*;
pub use record::*;
pub use sector_pool::*;
pub use supervisor::*;
