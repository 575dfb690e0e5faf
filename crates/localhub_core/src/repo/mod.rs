//! Repository contracts and their SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access per aggregate.
//! - Keep SQL inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate records before touching SQL.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Unique constraint violations surface as [`RepoError::Conflict`].

use crate::db::DbError;
use crate::model::content::{ContentRef, ContentType};
use crate::model::ValidationError;
use rusqlite::{ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod activity_repo;
pub mod comment_repo;
pub mod community_repo;
pub mod interaction_repo;
pub mod invite_repo;
pub mod join_request_repo;
pub mod message_repo;
pub mod notification_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    /// A unique constraint rejected the write.
    Conflict(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::Conflict(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            let unique = failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                );
            if unique {
                return Self::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "unique constraint failed".to_string()),
                );
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn get_uuid(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

pub(crate) fn get_opt_uuid(row: &Row<'_>, column: &str) -> RepoResult<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| parse_uuid(&text, column))
        .transpose()
}

pub(crate) fn parse_uuid(text: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{text}` in {column}")))
}

pub(crate) fn get_bool(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

/// Reads an `(object_type, object_id)` column pair.
pub(crate) fn get_content_ref(row: &Row<'_>) -> RepoResult<ContentRef> {
    let type_text: String = row.get("object_type")?;
    let content_type = ContentType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid content type `{type_text}` in object_type"))
    })?;
    Ok(ContentRef::new(content_type, get_uuid(row, "object_id")?))
}

/// `?, ?, ?` placeholder list for `IN` clauses.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Fails with `NotFound` when an UPDATE/DELETE touched no row.
pub(crate) fn ensure_changed(changed: usize, entity: &'static str, id: Uuid) -> RepoResult<()> {
    if changed == 0 {
        Err(RepoError::NotFound { entity, id })
    } else {
        Ok(())
    }
}
