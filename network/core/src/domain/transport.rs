// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Transport Seam
//!
//! The publish-subscribe transport is an external collaborator. Agents and
//! the monitor only rely on:
//!
//! - non-blocking, fire-and-forget [`Transport::publish`];
//! - delivery to every current subscriber whose filter matches;
//! - a last-will presence message published on the client's behalf when it
//!   drops without calling [`Transport::disconnect`].
//!
//! `infrastructure::broker` provides the in-process implementation.

use crate::domain::payload::Envelope;
use crate::domain::topic::TopicFilter;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("receiver lagged by {0} messages (messages were dropped)")]
    Lagged(u64),
}

/// Inbound side of a subscription.
#[async_trait]
pub trait Inbox: Send {
    /// Next matching message. `Lagged` is recoverable; `Closed` is final.
    async fn recv(&mut self) -> Result<Envelope, TransportError>;
}

pub trait Transport: Send + Sync {
    fn publish(&self, envelope: Envelope);

    fn subscribe(&self, filters: Vec<TopicFilter>) -> Box<dyn Inbox>;

    /// Graceful disconnect: the last will is discarded, not published.
    fn disconnect(&self);
}
