//! Preference schema versions.
//!
//! # Invariants
//! - `MIGRATIONS` is ordered by strictly increasing `version`, starting at 1.
//! - All pending scripts commit in one transaction, or none do.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, Transaction};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "preferences",
    sql: include_str!("0001_preferences.sql"),
}];

/// Where a connection's schema stands relative to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    Current,
    Behind { from: u32, to: u32 },
    Ahead { found: u32 },
}

/// Newest schema version this build can write.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

pub fn schema_state(conn: &Connection) -> DbResult<SchemaState> {
    let found = current_user_version(conn)?;
    let latest = latest_version();
    Ok(match found {
        found if found == latest => SchemaState::Current,
        found if found < latest => SchemaState::Behind {
            from: found,
            to: latest,
        },
        found => SchemaState::Ahead { found },
    })
}

/// Brings `conn` up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    match schema_state(conn)? {
        SchemaState::Current => Ok(()),
        SchemaState::Ahead { found } => Err(DbError::SchemaTooNew {
            found,
            supported: latest_version(),
        }),
        SchemaState::Behind { from, to } => {
            let tx = conn.transaction()?;
            for migration in MIGRATIONS.iter().skip_while(|m| m.version <= from) {
                run_step(&tx, migration)?;
            }
            tx.commit()?;
            info!("event=db_migrate module=db status=ok from_version={from} to_version={to}");
            Ok(())
        }
    }
}

fn run_step(tx: &Transaction<'_>, migration: &Migration) -> DbResult<()> {
    tx.execute_batch(migration.sql)
        .and_then(|()| tx.pragma_update(None, "user_version", migration.version))
        .map_err(|source| DbError::Migration {
            version: migration.version,
            name: migration.name,
            source,
        })?;
    debug!(
        "event=db_migrate_step module=db status=ok version={} name={}",
        migration.version, migration.name
    );
    Ok(())
}
