//! Notification dispatch port
//!
//! Ledger and reconciliation services announce state changes residents should
//! hear about (an overdue quota, a matched bank transfer). Delivery is someone
//! else's job: callers go through [`dispatch`], which never lets a delivery
//! failure reach the ledger write that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::identifiers::{BuildingId, ResidentId, UserId};
use crate::ports::{DomainPort, PortError};

/// Who a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    Resident(ResidentId),
    /// Everyone with access to the building
    Building(BuildingId),
}

/// A message for residents or managers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl Notification {
    pub fn new(recipient: Recipient, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient,
            title: title.into(),
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Port for a notification delivery backend
#[async_trait]
pub trait Notifier: DomainPort {
    async fn notify(&self, notification: Notification) -> Result<(), PortError>;
}

/// Notifier that only writes the notification to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl DomainPort for TracingNotifier {}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), PortError> {
        info!(
            recipient = ?notification.recipient,
            title = %notification.title,
            "notification"
        );
        Ok(())
    }
}

/// Fire-and-forget delivery: failures are logged and swallowed
pub async fn dispatch(notifier: &dyn Notifier, notification: Notification) {
    let title = notification.title.clone();
    if let Err(e) = notifier.notify(notification).await {
        warn!(error = %e, title = %title, "notification delivery failed");
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Notifier that records every notification, optionally failing each call
    #[derive(Debug, Default, Clone)]
    pub struct RecordingNotifier {
        sent: Arc<RwLock<Vec<Notification>>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// A notifier whose deliveries always fail
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub async fn sent(&self) -> Vec<Notification> {
            self.sent.read().await.clone()
        }
    }

    impl DomainPort for RecordingNotifier {}

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: Notification) -> Result<(), PortError> {
            if self.fail {
                return Err(PortError::ServiceUnavailable {
                    service: "notifications".to_string(),
                });
            }
            self.sent.write().await.push(notification);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let notifier = RecordingNotifier::failing();
        dispatch(
            &notifier,
            Notification::new(Recipient::Building(BuildingId::new()), "Quota overdue", "March"),
        )
        .await;
        assert!(notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let notifier = RecordingNotifier::new();
        let building = BuildingId::new();
        dispatch(
            &notifier,
            Notification::new(Recipient::Building(building), "Quota overdue", "March")
                .with_link("/payments"),
        )
        .await;

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, Recipient::Building(building));
        assert_eq!(sent[0].link.as_deref(), Some("/payments"));
    }
}
