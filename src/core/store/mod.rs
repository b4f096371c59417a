mod agent;
mod case;
mod client;
mod hitl;
pub mod types;

pub use agent::AgentUpdate;
pub use case::{CaseFilter, CaseUpdate};
pub use client::ClientUpdate;
pub use hitl::HitlFilter;

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

/// Single persistence adapter for the whole back office. One SQLite
/// database, one connection, serialized behind a mutex.
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

/// Timestamps are stored as RFC 3339 UTC text with millisecond precision.
/// The fixed width keeps string comparison in SQL consistent with
/// chronological order.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow!("invalid timestamp {s:?}: {e}"))?
        .with_timezone(&Utc))
}

impl Store {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let db = Connection::open(db_path)?;
        Self::create_tables(&db)?;

        info!("Store ready at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        let db = Connection::open_in_memory().expect("open in-memory db");
        Self::create_tables(&db).expect("create tables");
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn create_tables(db: &Connection) -> Result<()> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS hitl_requests (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                requesting_agent TEXT NOT NULL,
                requesting_agent_id TEXT NOT NULL,
                related_case_id TEXT,
                related_client_id TEXT,
                description TEXT NOT NULL,
                context TEXT,
                proposed_action TEXT NOT NULL,
                suggestions TEXT NOT NULL DEFAULT '[]',
                human_response TEXT,
                human_decision TEXT,
                expires_at TEXT NOT NULL,
                conversation TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                agent_id TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                configuration TEXT,
                capabilities TEXT,
                last_active TEXT NOT NULL,
                parent_agent_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS cases (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                assigned_to TEXT,
                assigned_to_type TEXT,
                created_by TEXT NOT NULL,
                created_by_type TEXT NOT NULL,
                client_id TEXT NOT NULL,
                details TEXT,
                history TEXT NOT NULL DEFAULT '[]',
                resolved_at TEXT,
                resolution_time INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                client_id TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                address TEXT,
                contact TEXT,
                equipment TEXT NOT NULL DEFAULT '[]',
                technical_record TEXT NOT NULL,
                contract_info TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }
}
