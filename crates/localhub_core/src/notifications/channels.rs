//! Delivery channels for rendered notifications.
//!
//! Real transports (SMTP, web-push HTTP) live outside the core; they plug in
//! through [`EmailSender`] and [`PushSender`]. The in-memory outboxes record
//! everything they are handed.

use crate::model::notification::SubscriptionInfo;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The push endpoint no longer exists (HTTP 410).
    Gone,
    Rejected(String),
    Transport(String),
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gone => write!(f, "subscription is gone"),
            Self::Rejected(reason) => write!(f, "delivery rejected: {reason}"),
            Self::Transport(reason) => write!(f, "transport failure: {reason}"),
        }
    }
}

impl Error for ChannelError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub from: String,
    pub to: String,
    /// Plain-text template candidates, most specific first.
    pub plain_templates: Vec<String>,
    /// HTML template candidates, most specific first.
    pub html_templates: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub subscription: SubscriptionInfo,
    /// Serialized web-push payload.
    pub payload: String,
    pub ttl_seconds: u32,
    pub vapid_admin_email: String,
}

pub trait EmailSender: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), ChannelError>;
}

pub trait PushSender: Send + Sync {
    fn push(&self, message: &PushMessage) -> Result<(), ChannelError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryEmailOutbox {
    sent: Mutex<Vec<EmailMessage>>,
}

impl MemoryEmailOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        lock(&self.sent).clone()
    }
}

impl EmailSender for MemoryEmailOutbox {
    fn send(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        lock(&self.sent).push(message.clone());
        Ok(())
    }
}

/// Records pushes; endpoints marked gone answer with [`ChannelError::Gone`].
#[derive(Debug, Default)]
pub struct MemoryPushOutbox {
    pushed: Mutex<Vec<PushMessage>>,
    gone: Mutex<BTreeSet<String>>,
}

impl MemoryPushOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_gone(&self, endpoint: impl Into<String>) {
        lock(&self.gone).insert(endpoint.into());
    }

    pub fn pushed(&self) -> Vec<PushMessage> {
        lock(&self.pushed).clone()
    }
}

impl PushSender for MemoryPushOutbox {
    fn push(&self, message: &PushMessage) -> Result<(), ChannelError> {
        if lock(&self.gone).contains(&message.subscription.endpoint) {
            return Err(ChannelError::Gone);
        }
        lock(&self.pushed).push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelError, MemoryPushOutbox, PushMessage, PushSender};
    use crate::model::notification::{SubscriptionInfo, SubscriptionKeys};

    fn message(endpoint: &str) -> PushMessage {
        PushMessage {
            subscription: SubscriptionInfo {
                endpoint: endpoint.to_string(),
                keys: SubscriptionKeys {
                    auth: "auth".to_string(),
                    p256dh: "key".to_string(),
                },
            },
            payload: "{}".to_string(),
            ttl_seconds: 60,
            vapid_admin_email: "admin@localhub.social".to_string(),
        }
    }

    #[test]
    fn gone_endpoints_are_refused() {
        let outbox = MemoryPushOutbox::new();
        outbox.mark_gone("https://push.example/dead");
        assert_eq!(
            outbox.push(&message("https://push.example/dead")),
            Err(ChannelError::Gone)
        );
        outbox
            .push(&message("https://push.example/live"))
            .expect("live endpoint");
        assert_eq!(outbox.pushed().len(), 1);
    }
}
