use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationReceived,
    ApplicationAccepted,
    ApplicationDeclined,
    LeaseSigned,
    PaymentSubmitted,
    PaymentFailed,
    LeaseActivated,
    TerminationStarted,
    LeaseExpired,
}

/// Payload handed to the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub to_user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Id of the application, lease or transaction the notice is about.
    pub subject_id: String,
    pub details: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(to_user_id: UserId, kind: NotificationKind, subject_id: impl Into<String>) -> Self {
        Self {
            to_user_id,
            kind,
            subject_id: subject_id.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook. Delivery is best effort.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}
