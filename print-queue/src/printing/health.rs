//! Printer health monitor
//!
//! Probes the printer on a fixed interval and notifies only on edges:
//! `unknown|online -> offline` and `offline -> online`. A stable state,
//! and the first `unknown -> online`, stay silent.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::adapter::PrinterAdapter;
use crate::notify::{EventNotifier, PrintEvent};

const OFFLINE_MESSAGE: &str = "Stampante non raggiungibile";

/// Process-local printer reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterHealthState {
    Unknown,
    Online,
    Offline,
}

/// Edge produced by one probe, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEdge {
    WentOnline,
    WentOffline,
}

impl PrinterHealthState {
    /// Next state for a probe result, with the edge to report
    pub fn transition(self, online: bool) -> (Self, Option<HealthEdge>) {
        match (self, online) {
            (PrinterHealthState::Offline, true) => {
                (PrinterHealthState::Online, Some(HealthEdge::WentOnline))
            }
            (_, true) => (PrinterHealthState::Online, None),
            (PrinterHealthState::Offline, false) => (PrinterHealthState::Offline, None),
            (_, false) => (PrinterHealthState::Offline, Some(HealthEdge::WentOffline)),
        }
    }
}

pub struct PrinterHealthMonitor {
    printer: Arc<dyn PrinterAdapter>,
    notifier: EventNotifier,
    interval: Duration,
    state: PrinterHealthState,
}

impl PrinterHealthMonitor {
    pub fn new(printer: Arc<dyn PrinterAdapter>, notifier: EventNotifier, interval: Duration) -> Self {
        Self {
            printer,
            notifier,
            interval,
            state: PrinterHealthState::Unknown,
        }
    }

    pub fn state(&self) -> PrinterHealthState {
        self.state
    }

    /// Probe once; returns the event sent, if the state changed edge-wise
    pub async fn check(&mut self) -> Option<PrintEvent> {
        let online = self.printer.probe().await;
        let (next, edge) = self.state.transition(online);
        self.state = next;

        let event = match edge? {
            HealthEdge::WentOffline => {
                tracing::error!(printer = %self.printer.describe(), "Printer OFFLINE");
                PrintEvent::PrinterOffline {
                    timestamp: Utc::now(),
                    message: OFFLINE_MESSAGE.to_string(),
                }
            }
            HealthEdge::WentOnline => {
                tracing::info!(printer = %self.printer.describe(), "Printer back ONLINE");
                PrintEvent::PrinterOnline {
                    timestamp: Utc::now(),
                }
            }
        };
        self.notifier.notify(&event).await;
        Some(event)
    }

    /// Run until shutdown. Not started for the mock printer.
    pub async fn run(mut self, shutdown: CancellationToken) {
        if self.printer.is_mock() {
            tracing::info!("Printer health monitor disabled (mock printer)");
            return;
        }
        tracing::info!(interval_secs = self.interval.as_secs(), "Printer health monitor started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }
        tracing::info!("Printer health monitor stopped");
    }
}
