use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Deserialize;
use serde_json::Value;

use super::types::{AgentRecord, AgentStatus, AgentType};
use super::{parse_ts, ts, Store};

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub status: Option<AgentStatus>,
    pub configuration: Option<Value>,
    pub capabilities: Option<Value>,
    pub parent_agent_id: Option<String>,
}

const AGENT_COLUMNS: &str = "id, name, agent_id, type, status, configuration, capabilities, \
     last_active, parent_agent_id, created_at, updated_at";

fn read_row(row: &Row<'_>) -> rusqlite::Result<(AgentRow, String, String)> {
    Ok((
        AgentRow {
            id: row.get(0)?,
            name: row.get(1)?,
            agent_id: row.get(2)?,
            agent_type: row.get(3)?,
            status: row.get(4)?,
            configuration: row.get(5)?,
            capabilities: row.get(6)?,
            last_active: row.get(7)?,
            parent_agent_id: row.get(8)?,
        },
        row.get(9)?,
        row.get(10)?,
    ))
}

struct AgentRow {
    id: String,
    name: String,
    agent_id: String,
    agent_type: String,
    status: String,
    configuration: Option<String>,
    capabilities: Option<String>,
    last_active: String,
    parent_agent_id: Option<String>,
}

fn hydrate(raw: AgentRow, created_at: String, updated_at: String) -> Result<AgentRecord> {
    Ok(AgentRecord {
        agent_type: AgentType::parse(&raw.agent_type)
            .ok_or_else(|| anyhow!("unknown agent type {:?}", raw.agent_type))?,
        status: AgentStatus::parse(&raw.status)
            .ok_or_else(|| anyhow!("unknown agent status {:?}", raw.status))?,
        configuration: raw
            .configuration
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        capabilities: raw
            .capabilities
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        last_active: parse_ts(&raw.last_active)?,
        id: raw.id,
        name: raw.name,
        agent_id: raw.agent_id,
        parent_agent_id: raw.parent_agent_id,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

impl Store {
    pub async fn insert_agent(&self, agent: &AgentRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agents (id, name, agent_id, type, status, configuration, capabilities, \
             last_active, parent_agent_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                agent.id,
                agent.name,
                agent.agent_id,
                agent.agent_type.as_str(),
                agent.status.as_str(),
                agent
                    .configuration
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                agent
                    .capabilities
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                ts(agent.last_active),
                agent.parent_agent_id,
                ts(agent.created_at),
                ts(agent.updated_at),
            ],
        )?;
        Ok(())
    }

    pub async fn list_agents(&self, agent_type: Option<AgentType>) -> Result<Vec<AgentRecord>> {
        let db = self.db.lock().await;
        let mut results = Vec::new();
        match agent_type {
            Some(agent_type) => {
                let mut stmt = db.prepare(&format!(
                    "SELECT {AGENT_COLUMNS} FROM agents WHERE type = ?1 \
                     ORDER BY created_at DESC, rowid DESC"
                ))?;
                let rows = stmt.query_map(params![agent_type.as_str()], read_row)?;
                for row in rows {
                    let (raw, created, updated) = row?;
                    results.push(hydrate(raw, created, updated)?);
                }
            }
            None => {
                let mut stmt = db.prepare(&format!(
                    "SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at DESC, rowid DESC"
                ))?;
                let rows = stmt.query_map([], read_row)?;
                for row in rows {
                    let (raw, created, updated) = row?;
                    results.push(hydrate(raw, created, updated)?);
                }
            }
        }
        Ok(results)
    }

    pub async fn get_agent(&self, id: &str) -> Result<Option<AgentRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => {
                let (raw, created, updated) = row?;
                Ok(Some(hydrate(raw, created, updated)?))
            }
            None => Ok(None),
        }
    }

    pub async fn update_agent(
        &self,
        id: &str,
        update: &AgentUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut sets = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(name) = &update.name {
            bind.push(name.clone());
            sets.push(format!("name = ?{}", bind.len()));
        }
        if let Some(status) = update.status {
            bind.push(status.as_str().to_string());
            sets.push(format!("status = ?{}", bind.len()));
        }
        if let Some(configuration) = &update.configuration {
            bind.push(serde_json::to_string(configuration)?);
            sets.push(format!("configuration = ?{}", bind.len()));
        }
        if let Some(capabilities) = &update.capabilities {
            bind.push(serde_json::to_string(capabilities)?);
            sets.push(format!("capabilities = ?{}", bind.len()));
        }
        if let Some(parent) = &update.parent_agent_id {
            bind.push(parent.clone());
            sets.push(format!("parent_agent_id = ?{}", bind.len()));
        }

        bind.push(ts(now));
        sets.push(format!("updated_at = ?{}", bind.len()));
        bind.push(id.to_string());
        let sql = format!(
            "UPDATE agents SET {} WHERE id = ?{}",
            sets.join(", "),
            bind.len()
        );

        let db = self.db.lock().await;
        let rows = db.execute(&sql, rusqlite::params_from_iter(bind.iter()))?;
        Ok(rows > 0)
    }

    pub async fn set_agent_status(
        &self,
        id: &str,
        status: AgentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE agents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), ts(now), id],
        )?;
        Ok(rows > 0)
    }

    pub async fn delete_agent(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
