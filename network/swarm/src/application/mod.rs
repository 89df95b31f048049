// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod monitor_service;
pub mod monitor_runtime;

pub use monitor_runtime::{MonitorReport, MonitorRuntime, SHUTDOWN_REASON};
pub use monitor_service::{MonitorService, MonitorStats};
