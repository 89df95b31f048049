// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for stormnet CLI

pub mod config;
pub mod simulate;

pub use self::config::ConfigCommand;
pub use self::simulate::SimulateArgs;
