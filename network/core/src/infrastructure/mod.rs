// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod broker;

pub use broker::{BrokerSession, FilteredReceiver, InMemoryBroker};
