// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! stormnet CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers for the `stormnet` binary

pub mod commands;
