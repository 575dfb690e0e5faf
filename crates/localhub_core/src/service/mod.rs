//! Use-case services.
//!
//! # Responsibility
//! - Check permission rules, write through repositories and dispatch the
//!   notifications each use case produces.
//! - Keep callers decoupled from SQL and from delivery channels.
//!
//! # Invariants
//! - A denied action performs no writes.
//! - Notifications are dispatched only after the write they describe
//!   succeeded.

use crate::calendar::CalendarError;
use crate::model::notification::Notification;
use crate::notifications::{DispatchReport, Dispatcher, NotificationError};
use crate::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use crate::repo::RepoError;
use crate::rules::{PermissionDenied, Viewer};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod activity_service;
pub mod comment_service;
pub mod community_service;
pub mod event_service;
pub mod message_service;
pub mod notification_service;
pub mod poll_service;
pub mod user_service;

pub use activity_service::ActivityService;
pub use comment_service::CommentService;
pub use community_service::CommunityService;
pub use event_service::EventService;
pub use message_service::MessageService;
pub use notification_service::NotificationService;
pub use poll_service::PollService;
pub use user_service::UserService;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    PermissionDenied(PermissionDenied),
    NotFound { entity: &'static str, id: Uuid },
    InvalidInput(String),
    Repo(RepoError),
    Notification(NotificationError),
    Calendar(CalendarError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidInput(details) => write!(f, "invalid input: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Notification(err) => write!(f, "notification failure: {err}"),
            Self::Calendar(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PermissionDenied(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Notification(err) => Some(err),
            Self::Calendar(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PermissionDenied> for ServiceError {
    fn from(value: PermissionDenied) -> Self {
        Self::PermissionDenied(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::InvalidInput(err.to_string()),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

impl From<NotificationError> for ServiceError {
    fn from(value: NotificationError) -> Self {
        Self::Notification(value)
    }
}

impl From<CalendarError> for ServiceError {
    fn from(value: CalendarError) -> Self {
        Self::Calendar(value)
    }
}

/// Unwraps a lookup, reporting a missing record as [`ServiceError::NotFound`].
pub(crate) fn found<T>(value: Option<T>, entity: &'static str, id: Uuid) -> ServiceResult<T> {
    value.ok_or(ServiceError::NotFound { entity, id })
}

/// Resolves `user`'s active role in `community`.
pub fn viewer_for(conn: &Connection, user: Uuid, community: Uuid) -> ServiceResult<Viewer> {
    let role = SqliteCommunityRepository::new(conn).role_of(user, community)?;
    Ok(Viewer::new(user, role))
}

/// Dispatches `notifications` when there are any.
pub(crate) fn notify(
    conn: &Connection,
    dispatcher: &Dispatcher,
    notifications: Vec<Notification>,
) -> ServiceResult<DispatchReport> {
    if notifications.is_empty() {
        return Ok(DispatchReport::default());
    }
    Ok(dispatcher.dispatch(conn, notifications)?)
}
