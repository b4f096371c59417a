use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Deserialize;
use serde_json::Value;

use super::types::{
    AgentType, CasePriority, CaseRecord, CaseStatus, CaseType, ConversationEntry,
};
use super::{parse_ts, ts, Store};

/// Partial update; `updated_by_type` only attributes the history entry the
/// caller appends for a status change, it is not stored on the case itself.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseUpdate {
    pub title: Option<String>,
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub details: Option<Value>,
    pub updated_by_type: Option<AgentType>,
}

#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub case_type: Option<CaseType>,
    pub assigned_to: Option<String>,
}

const CASE_COLUMNS: &str = "id, title, type, status, priority, assigned_to, assigned_to_type, \
     created_by, created_by_type, client_id, details, history, resolved_at, resolution_time, \
     created_at, updated_at";

struct CaseRow {
    id: String,
    title: String,
    case_type: String,
    status: String,
    priority: String,
    assigned_to: Option<String>,
    assigned_to_type: Option<String>,
    created_by: String,
    created_by_type: String,
    client_id: String,
    details: Option<String>,
    history: String,
    resolved_at: Option<String>,
    resolution_time: Option<i64>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<CaseRow> {
    Ok(CaseRow {
        id: row.get(0)?,
        title: row.get(1)?,
        case_type: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        assigned_to: row.get(5)?,
        assigned_to_type: row.get(6)?,
        created_by: row.get(7)?,
        created_by_type: row.get(8)?,
        client_id: row.get(9)?,
        details: row.get(10)?,
        history: row.get(11)?,
        resolved_at: row.get(12)?,
        resolution_time: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn hydrate(raw: CaseRow) -> Result<CaseRecord> {
    Ok(CaseRecord {
        case_type: CaseType::parse(&raw.case_type)
            .ok_or_else(|| anyhow!("unknown case type {:?}", raw.case_type))?,
        status: CaseStatus::parse(&raw.status)
            .ok_or_else(|| anyhow!("unknown case status {:?}", raw.status))?,
        priority: CasePriority::parse(&raw.priority)
            .ok_or_else(|| anyhow!("unknown case priority {:?}", raw.priority))?,
        assigned_to_type: raw
            .assigned_to_type
            .as_deref()
            .map(|s| AgentType::parse(s).ok_or_else(|| anyhow!("unknown agent type {s:?}")))
            .transpose()?,
        created_by_type: AgentType::parse(&raw.created_by_type)
            .ok_or_else(|| anyhow!("unknown agent type {:?}", raw.created_by_type))?,
        details: raw
            .details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        history: serde_json::from_str::<Vec<ConversationEntry>>(&raw.history)?,
        resolved_at: raw.resolved_at.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&raw.created_at)?,
        updated_at: parse_ts(&raw.updated_at)?,
        id: raw.id,
        title: raw.title,
        assigned_to: raw.assigned_to,
        created_by: raw.created_by,
        client_id: raw.client_id,
        resolution_time: raw.resolution_time,
    })
}

impl Store {
    pub async fn insert_case(&self, case: &CaseRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO cases (id, title, type, status, priority, assigned_to, assigned_to_type, \
             created_by, created_by_type, client_id, details, history, resolved_at, \
             resolution_time, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                case.id,
                case.title,
                case.case_type.as_str(),
                case.status.as_str(),
                case.priority.as_str(),
                case.assigned_to,
                case.assigned_to_type.map(|t| t.as_str()),
                case.created_by,
                case.created_by_type.as_str(),
                case.client_id,
                case.details
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                serde_json::to_string(&case.history)?,
                case.resolved_at.map(ts),
                case.resolution_time,
                ts(case.created_at),
                ts(case.updated_at),
            ],
        )?;
        Ok(())
    }

    pub async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<CaseRecord>> {
        let mut sql = format!("SELECT {CASE_COLUMNS} FROM cases");
        let mut conditions = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            bind.push(status.as_str().to_string());
            conditions.push(format!("status = ?{}", bind.len()));
        }
        if let Some(case_type) = filter.case_type {
            bind.push(case_type.as_str().to_string());
            conditions.push(format!("type = ?{}", bind.len()));
        }
        if let Some(assigned_to) = &filter.assigned_to {
            bind.push(assigned_to.clone());
            conditions.push(format!("assigned_to = ?{}", bind.len()));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind.iter()), read_row)?;
        let mut cases = Vec::new();
        for row in rows {
            cases.push(hydrate(row?)?);
        }
        Ok(cases)
    }

    pub async fn get_case(&self, id: &str) -> Result<Option<CaseRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(hydrate(row?)?)),
            None => Ok(None),
        }
    }

    pub async fn update_case(
        &self,
        id: &str,
        update: &CaseUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut sets = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(title) = &update.title {
            bind.push(title.clone());
            sets.push(format!("title = ?{}", bind.len()));
        }
        if let Some(status) = update.status {
            bind.push(status.as_str().to_string());
            sets.push(format!("status = ?{}", bind.len()));
        }
        if let Some(priority) = update.priority {
            bind.push(priority.as_str().to_string());
            sets.push(format!("priority = ?{}", bind.len()));
        }
        if let Some(details) = &update.details {
            bind.push(serde_json::to_string(details)?);
            sets.push(format!("details = ?{}", bind.len()));
        }

        bind.push(ts(now));
        sets.push(format!("updated_at = ?{}", bind.len()));
        bind.push(id.to_string());
        let sql = format!(
            "UPDATE cases SET {} WHERE id = ?{}",
            sets.join(", "),
            bind.len()
        );

        let db = self.db.lock().await;
        let rows = db.execute(&sql, rusqlite::params_from_iter(bind.iter()))?;
        Ok(rows > 0)
    }

    pub async fn assign_case(
        &self,
        id: &str,
        agent_id: &str,
        agent_type: AgentType,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE cases SET assigned_to = ?1, assigned_to_type = ?2, status = 'in_progress', \
             updated_at = ?3 WHERE id = ?4",
            params![agent_id, agent_type.as_str(), ts(now), id],
        )?;
        Ok(rows > 0)
    }

    pub async fn resolve_case(
        &self,
        id: &str,
        resolved_at: DateTime<Utc>,
        resolution_time: i64,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE cases SET status = 'resolved', resolved_at = ?1, resolution_time = ?2, \
             updated_at = ?3 WHERE id = ?4",
            params![ts(resolved_at), resolution_time, ts(resolved_at), id],
        )?;
        Ok(rows > 0)
    }

    pub async fn append_case_history(
        &self,
        id: &str,
        entry: &ConversationEntry,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE cases SET history = json_insert(history, '$[#]', json(?1)), updated_at = ?2 \
             WHERE id = ?3",
            params![serde_json::to_string(entry)?, ts(now), id],
        )?;
        Ok(rows > 0)
    }
}
