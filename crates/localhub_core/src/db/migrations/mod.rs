//! Ordered schema scripts.
//!
//! Scripts run inside one transaction; a failure leaves the file at the
//! version it had before the call.

use crate::db::{schema_version, DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `(version, name, sql)`; versions start at 1 and increase by one.
const MIGRATIONS: &[(u32, &str, &str)] = &[
    (1, "accounts", include_str!("0001_accounts.sql")),
    (2, "activities", include_str!("0002_activities.sql")),
    (3, "interactions", include_str!("0003_interactions.sql")),
    (4, "messaging", include_str!("0004_messaging.sql")),
];

/// Highest schema version this build can write.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |(version, _, _)| *version)
}

/// Brings `conn` up to [`latest_version`].
///
/// Returns the versions that were applied, oldest first.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<_> = MIGRATIONS
        .iter()
        .filter(|(version, _, _)| *version > from)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for &&(version, name, sql) in &pending {
        tx.execute_batch(sql)
            .and_then(|()| tx.pragma_update(None, "user_version", version))
            .map_err(|source| DbError::Migration {
                version,
                name,
                source,
            })?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from={from} to={latest} applied={}",
        pending.len()
    );
    Ok(pending.iter().map(|(version, _, _)| *version).collect())
}

#[cfg(test)]
mod tests {
    use super::{latest_version, MIGRATIONS};

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, (version, name, sql)) in MIGRATIONS.iter().enumerate() {
            assert_eq!(*version as usize, index + 1, "migration {name}");
            assert!(!sql.trim().is_empty(), "migration {name} is empty");
        }
        assert_eq!(latest_version() as usize, MIGRATIONS.len());
    }
}
