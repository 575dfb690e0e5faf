//! Core domain logic for Localhub communities.
//! This crate owns the schema, the permission rules and notification
//! delivery; web layers build on its services.

pub mod calendar;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notifications;
pub mod repo;
pub mod rules;
pub mod service;
pub mod stream;
pub mod text;

pub use calendar::CalendarError;
pub use config::{ConfigError, Settings};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_from_settings, init_logging, logging_status, LoggingError,
};
pub use model::activity::{ActivityKind, ActivityRecord, AnyActivity, Photo, Poll, Post};
pub use model::community::{Community, Membership, Role};
pub use model::content::{ContentRef, ContentType};
pub use model::event::{Event, Repeats};
pub use model::notification::{Notification, Verb};
pub use model::user::User;
pub use notifications::{AdapterRegistry, Dispatcher};
pub use repo::{RepoError, RepoResult};
pub use rules::{PermissionDenied, Viewer};
pub use service::{ServiceError, ServiceResult};
pub use stream::{ActivityStream, Page, StreamItem, StreamQuery};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
