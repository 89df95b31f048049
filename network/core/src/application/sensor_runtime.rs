// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! Sensor Runtime - dispatch loop driving one [`SensorAgent`]
//!
//! Serialises every input of the agent onto one task: inbound envelopes,
//! the measurement tick (adaptive interval) and admission timers. Shutdown
//! is cooperative through a cancellation token; dropping the task instead
//! drops the transport and lets its last will speak for the agent.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Event loop between the transport seam and the agent state machine

use crate::application::clock::RuntimeClock;
use crate::application::measurement::MeasurementSource;
use crate::application::sensor_agent::{SensorAgent, StopReason};
use crate::domain::learning::Sensitivity;
use crate::domain::sensor::{AgentId, SectorId};
use crate::domain::transport::{Inbox, Transport, TransportError};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Final state of a sensor after its loop exits.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReport {
    pub agent_id: AgentId,
    pub sector: Option<SectorId>,
    pub stop_reason: StopReason,
    pub sensitivity: Sensitivity,
    pub alerts_emitted: u64,
    pub ticks: u64,
}

pub struct SensorRuntime<T, S> {
    agent: SensorAgent,
    transport: T,
    source: S,
    clock: RuntimeClock,
    shutdown_token: CancellationToken,
}

impl<T, S> SensorRuntime<T, S>
where
    T: Transport + 'static,
    S: MeasurementSource + 'static,
{
    pub fn new(agent: SensorAgent, transport: T, source: S, clock: RuntimeClock) -> Self {
        Self {
            agent,
            transport,
            source,
            clock,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Share an existing token, e.g. one cancelled by the host on Ctrl-C.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Subscribe, then drive the agent on a new task. The subscription is in
    /// place when this returns.
    pub fn start(self) -> tokio::task::JoinHandle<SensorReport> {
        let inbox = self.transport.subscribe(self.agent.subscriptions());
        tokio::spawn(self.drive(inbox))
    }

    pub async fn run(self) -> SensorReport {
        let inbox = self.transport.subscribe(self.agent.subscriptions());
        self.drive(inbox).await
    }

    async fn drive(mut self, mut inbox: Box<dyn Inbox>) -> SensorReport {
        let shutdown = self.shutdown_token.clone();
        self.transport.publish(self.agent.hello(self.clock.now()));
        info!("Sensor {} connected, waiting for sector assignment", self.agent.id());

        let mut next_tick = Instant::now();
        while !self.agent.is_stopped() {
            let wake = if self.agent.is_active() {
                next_tick
            } else {
                self.agent
                    .timer_deadline()
                    .map(|at| self.clock.instant_at(at))
                    .unwrap_or(next_tick)
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping sensor {}", self.agent.id());
                    self.agent.stop(StopReason::Cancelled);
                }
                received = inbox.recv() => match received {
                    Ok(envelope) => {
                        let was_active = self.agent.is_active();
                        self.agent.handle_message(&envelope, self.clock.now());
                        if !was_active && self.agent.is_active() {
                            next_tick = Instant::now();
                        }
                    }
                    Err(TransportError::Lagged(n)) => {
                        warn!("Sensor {} missed {} messages", self.agent.id(), n);
                    }
                    Err(TransportError::Closed) => {
                        self.agent.stop(StopReason::TransportClosed);
                    }
                },
                _ = sleep_until(wake) => {
                    let now = self.clock.now();
                    if self.agent.is_active() {
                        let measurement = self.source.sample(now);
                        for envelope in self.agent.on_tick(measurement, now) {
                            self.transport.publish(envelope);
                        }
                        let interval = self.agent.next_interval(now);
                        debug!("Sensor {} next publish in {:?}", self.agent.id(), interval);
                        next_tick = Instant::now() + interval;
                    } else {
                        for envelope in self.agent.poll_timers(now) {
                            self.transport.publish(envelope);
                        }
                    }
                }
            }
        }

        let stop_reason = self
            .agent
            .stop_reason()
            .cloned()
            .unwrap_or(StopReason::Cancelled);
        if stop_reason != StopReason::TransportClosed {
            self.transport.publish(self.agent.goodbye(self.clock.now()));
        }
        self.transport.disconnect();
        info!("Sensor {} stopped ({})", self.agent.id(), stop_reason);

        SensorReport {
            agent_id: self.agent.id().clone(),
            sector: self.agent.sector(),
            stop_reason,
            sensitivity: self.agent.sensitivity(),
            alerts_emitted: self.agent.alerts_emitted(),
            ticks: self.agent.ticks(),
        }
    }
}
