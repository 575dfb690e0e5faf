//! Requests to join a private community.

use super::now_ms;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state shared by join requests and invites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: Uuid,
    pub community_id: Uuid,
    pub sender_id: Uuid,
    pub status: RequestStatus,
    pub status_changed: i64,
    pub intro: String,
    pub created: i64,
}

impl JoinRequest {
    pub fn new(community_id: Uuid, sender_id: Uuid, intro: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            community_id,
            sender_id,
            status: RequestStatus::Pending,
            status_changed: now,
            intro: intro.into(),
            created: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}
