// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! Monitor Runtime - dispatch loop for the [`MonitorService`]
//!
//! One task owns the service: inbound envelopes and the periodic feedback
//! scan are processed strictly one at a time, which keeps every supervisor
//! mutation serialised. On graceful shutdown a `shutdown` command is sent to
//! every occupied sector.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Event loop between the transport seam and the monitor service

use crate::application::monitor_service::{MonitorService, MonitorStats};
use crate::domain::supervisor::{NetworkSummary, SectorSummary};
use stormnet_core::application::RuntimeClock;
use stormnet_core::transport::{Inbox, Transport, TransportError};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SHUTDOWN_REASON: &str = "monitor shutting down";

/// Monitor state when its loop exits.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub stats: MonitorStats,
    pub sectors: Vec<SectorSummary>,
    pub network: NetworkSummary,
}

pub struct MonitorRuntime<T> {
    service: MonitorService,
    transport: T,
    clock: RuntimeClock,
    shutdown_token: CancellationToken,
}

impl<T: Transport + 'static> MonitorRuntime<T> {
    pub fn new(service: MonitorService, transport: T, clock: RuntimeClock) -> Self {
        Self {
            service,
            transport,
            clock,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Subscribe, then serve on a new task. Messages published after this
    /// returns are seen by the monitor.
    pub fn start(self) -> tokio::task::JoinHandle<MonitorReport> {
        let inbox = self.transport.subscribe(self.service.subscriptions());
        tokio::spawn(self.serve(inbox))
    }

    pub async fn run(self) -> MonitorReport {
        let inbox = self.transport.subscribe(self.service.subscriptions());
        self.serve(inbox).await
    }

    async fn serve(mut self, mut inbox: Box<dyn Inbox>) -> MonitorReport {
        let shutdown = self.shutdown_token.clone();
        let mut scan = interval(self.service.scan_interval());
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);
        scan.tick().await;

        info!(
            capacity = self.service.supervisor().capacity(),
            "Monitor listening for sensors"
        );

        let graceful = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping monitor");
                    break true;
                }
                received = inbox.recv() => match received {
                    Ok(envelope) => {
                        for reply in self.service.handle(&envelope, self.clock.now()) {
                            self.transport.publish(reply);
                        }
                    }
                    Err(TransportError::Lagged(n)) => {
                        warn!("Monitor missed {} messages", n);
                    }
                    Err(TransportError::Closed) => {
                        warn!("Transport closed, stopping monitor");
                        break false;
                    }
                },
                _ = scan.tick() => {
                    let feedback = self.service.scan(self.clock.now());
                    debug!("Feedback scan produced {} messages", feedback.len());
                    for envelope in feedback {
                        self.transport.publish(envelope);
                    }
                }
            }
        };

        if graceful {
            for command in self.service.shutdown_broadcast(SHUTDOWN_REASON) {
                self.transport.publish(command);
            }
        }
        self.transport.disconnect();

        let report = MonitorReport {
            stats: self.service.stats().clone(),
            sectors: self.service.sector_summaries(self.clock.now()),
            network: self.service.network_summary(),
        };
        info!("Monitor stopped: {:?}", report.stats);
        report
    }
}
