//! Email invitations to a community.

use super::join_request::RequestStatus;
use super::{is_valid_email, now_ms, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub community_id: Uuid,
    pub sender_id: Uuid,
    pub email: String,
    pub status: RequestStatus,
    /// Last time the invite email went out.
    pub sent: Option<i64>,
    pub created: i64,
}

impl Invite {
    pub fn new(community_id: Uuid, sender_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            community_id,
            sender_id,
            email: email.into().trim().to_lowercase(),
            status: RequestStatus::Pending,
            sent: None,
            created: now_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_valid_email(&self.email) {
            Ok(())
        } else {
            Err(ValidationError::InvalidEmail(self.email.clone()))
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}
