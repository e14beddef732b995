//! Event Notifier
//!
//! Best-effort fan-out of print outcomes and printer health to real-time
//! clients. Delivery is at most once and never blocks: a disconnected
//! transport drops events, and no publisher error or panic escapes
//! [`EventNotifier::notify`]. The job store stays the source of truth.

pub mod hub;

pub use hub::{ConnectionState, HubConfig, HubPublisher};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::PrintJob;

/// Audiences every event is delivered to
pub const ROOMS: [&str; 2] = ["monitor", "tablets"];

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("not connected to event hub")]
    NotConnected,

    #[error("outbound queue full")]
    QueueFull,

    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Event pushed to real-time clients
#[derive(Debug, Clone, PartialEq)]
pub enum PrintEvent {
    PrintSuccess(PrintJob),
    PrintFailed(PrintJob),
    PrinterOnline {
        timestamp: DateTime<Utc>,
    },
    PrinterOffline {
        timestamp: DateTime<Utc>,
        message: String,
    },
}

impl PrintEvent {
    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            PrintEvent::PrintSuccess(_) => "print:success",
            PrintEvent::PrintFailed(_) => "print:failed",
            PrintEvent::PrinterOnline { .. } => "printer:online",
            PrintEvent::PrinterOffline { .. } => "printer:offline",
        }
    }

    /// JSON payload: the job, or a timestamp for health events
    pub fn payload(&self) -> Value {
        match self {
            PrintEvent::PrintSuccess(job) | PrintEvent::PrintFailed(job) => {
                serde_json::to_value(job).unwrap_or_default()
            }
            PrintEvent::PrinterOnline { timestamp } => json!({
                "timestamp": timestamp.to_rfc3339(),
            }),
            PrintEvent::PrinterOffline { timestamp, message } => json!({
                "timestamp": timestamp.to_rfc3339(),
                "message": message,
            }),
        }
    }
}

/// Real-time transport seam
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand one event to the transport for one room
    async fn publish(&self, room: &str, event: &str, payload: &Value) -> NotifyResult<()>;

    /// Release the transport
    async fn close(&self) {}
}

/// Side-channel notifier shared by watchers and the health monitor
#[derive(Clone, Default)]
pub struct EventNotifier {
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl EventNotifier {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher: Some(publisher),
        }
    }

    /// Notifier that drops every event
    pub fn disabled() -> Self {
        Self { publisher: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    /// Publish to every room; `true` only if each hand-off succeeded
    pub async fn notify(&self, event: &PrintEvent) -> bool {
        let Some(publisher) = &self.publisher else {
            tracing::debug!(event = event.name(), "Notifier disabled, event dropped");
            return false;
        };

        let payload = event.payload();
        let mut delivered = true;

        for room in ROOMS {
            let attempt = AssertUnwindSafe(publisher.publish(room, event.name(), &payload))
                .catch_unwind()
                .await;
            match attempt {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = event.name(), room, error = %e, "Event not delivered");
                    delivered = false;
                }
                Err(_) => {
                    tracing::error!(event = event.name(), room, "Event publisher panicked");
                    delivered = false;
                }
            }
        }

        if delivered {
            tracing::debug!(event = event.name(), "Event published");
        }
        delivered
    }

    pub async fn close(&self) {
        if let Some(publisher) = &self.publisher {
            publisher.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PrintJobStatus;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<(String, String, Value)>>,
    }

    #[async_trait]
    impl EventPublisher for Recording {
        async fn publish(&self, room: &str, event: &str, payload: &Value) -> NotifyResult<()> {
            self.sent
                .lock()
                .push((room.to_string(), event.to_string(), payload.clone()));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventPublisher for Failing {
        async fn publish(&self, _: &str, _: &str, _: &Value) -> NotifyResult<()> {
            Err(NotifyError::NotConnected)
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventPublisher for Panicking {
        async fn publish(&self, _: &str, _: &str, _: &Value) -> NotifyResult<()> {
            panic!("socket exploded");
        }
    }

    fn job() -> PrintJob {
        PrintJob {
            id: 1,
            order_id: 42,
            status: PrintJobStatus::Printed,
            printer_name: None,
            attempts: 0,
            max_attempts: 3,
            error_message: None,
            error_stack: None,
            created_at: 1,
            started_at: Some(2),
            printed_at: Some(3),
            failed_at: None,
        }
    }

    #[tokio::test]
    async fn test_notify_reaches_both_rooms() {
        let recording = Arc::new(Recording::default());
        let notifier = EventNotifier::new(recording.clone());

        assert!(notifier.notify(&PrintEvent::PrintSuccess(job())).await);

        let sent = recording.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "monitor");
        assert_eq!(sent[1].0, "tablets");
        assert_eq!(sent[0].1, "print:success");
        assert_eq!(sent[0].2["order_id"], 42);
        assert_eq!(sent[0].2["status"], "printed");
    }

    #[tokio::test]
    async fn test_failures_and_panics_stay_inside() {
        let event = PrintEvent::PrinterOffline {
            timestamp: Utc::now(),
            message: "Stampante non raggiungibile".into(),
        };
        assert!(!EventNotifier::new(Arc::new(Failing)).notify(&event).await);
        assert!(!EventNotifier::new(Arc::new(Panicking)).notify(&event).await);
        assert!(!EventNotifier::disabled().notify(&event).await);
    }

    #[test]
    fn test_health_payloads() {
        let online = PrintEvent::PrinterOnline {
            timestamp: Utc::now(),
        };
        assert_eq!(online.name(), "printer:online");
        assert!(online.payload()["timestamp"].is_string());

        let offline = PrintEvent::PrinterOffline {
            timestamp: Utc::now(),
            message: "down".into(),
        };
        assert_eq!(offline.payload()["message"], "down");
    }
}
