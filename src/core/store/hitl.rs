use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::types::{
    AgentType, ConversationEntry, HitlRequestRecord, HitlRequestType, HitlStatus, HumanDecision,
    ProposedAction,
};
use super::{parse_ts, ts, Store};

/// Optional equality filter for request listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitlFilter {
    pub status: Option<HitlStatus>,
    pub request_type: Option<HitlRequestType>,
}

const REQUEST_COLUMNS: &str = "id, title, type, status, requesting_agent, requesting_agent_id, \
     related_case_id, related_client_id, description, context, proposed_action, suggestions, \
     human_response, human_decision, expires_at, conversation, created_at, updated_at";

struct RawRequestRow {
    id: String,
    title: String,
    request_type: String,
    status: String,
    requesting_agent: String,
    requesting_agent_id: String,
    related_case_id: Option<String>,
    related_client_id: Option<String>,
    description: String,
    context: Option<String>,
    proposed_action: String,
    suggestions: String,
    human_response: Option<String>,
    human_decision: Option<String>,
    expires_at: String,
    conversation: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRequestRow> {
    Ok(RawRequestRow {
        id: row.get(0)?,
        title: row.get(1)?,
        request_type: row.get(2)?,
        status: row.get(3)?,
        requesting_agent: row.get(4)?,
        requesting_agent_id: row.get(5)?,
        related_case_id: row.get(6)?,
        related_client_id: row.get(7)?,
        description: row.get(8)?,
        context: row.get(9)?,
        proposed_action: row.get(10)?,
        suggestions: row.get(11)?,
        human_response: row.get(12)?,
        human_decision: row.get(13)?,
        expires_at: row.get(14)?,
        conversation: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn hydrate(raw: RawRequestRow) -> Result<HitlRequestRecord> {
    let request_type = HitlRequestType::parse(&raw.request_type)
        .ok_or_else(|| anyhow!("unknown request type {:?}", raw.request_type))?;
    let status = HitlStatus::parse(&raw.status)
        .ok_or_else(|| anyhow!("unknown request status {:?}", raw.status))?;
    let requesting_agent = AgentType::parse(&raw.requesting_agent)
        .ok_or_else(|| anyhow!("unknown agent type {:?}", raw.requesting_agent))?;

    let proposed_action: ProposedAction = serde_json::from_str(&raw.proposed_action)?;
    let suggestions: Vec<String> = serde_json::from_str(&raw.suggestions)?;
    let conversation: Vec<ConversationEntry> = serde_json::from_str(&raw.conversation)?;
    let context = raw
        .context
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    let human_decision: Option<HumanDecision> = raw
        .human_decision
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    Ok(HitlRequestRecord {
        id: raw.id,
        title: raw.title,
        request_type,
        status,
        requesting_agent,
        requesting_agent_id: raw.requesting_agent_id,
        related_case_id: raw.related_case_id,
        related_client_id: raw.related_client_id,
        description: raw.description,
        context,
        proposed_action,
        suggestions,
        human_response: raw.human_response,
        human_decision,
        expires_at: parse_ts(&raw.expires_at)?,
        conversation,
        created_at: parse_ts(&raw.created_at)?,
        updated_at: parse_ts(&raw.updated_at)?,
    })
}

impl Store {
    pub async fn insert_request(&self, request: &HitlRequestRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO hitl_requests (id, title, type, status, requesting_agent, \
             requesting_agent_id, related_case_id, related_client_id, description, context, \
             proposed_action, suggestions, human_response, human_decision, expires_at, \
             conversation, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                request.id,
                request.title,
                request.request_type.as_str(),
                request.status.as_str(),
                request.requesting_agent.as_str(),
                request.requesting_agent_id,
                request.related_case_id,
                request.related_client_id,
                request.description,
                request
                    .context
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                serde_json::to_string(&request.proposed_action)?,
                serde_json::to_string(&request.suggestions)?,
                request.human_response,
                request
                    .human_decision
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                ts(request.expires_at),
                serde_json::to_string(&request.conversation)?,
                ts(request.created_at),
                ts(request.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Newest-created first. No pagination; the back office works on the
    /// full matching set.
    pub async fn list_requests(&self, filter: HitlFilter) -> Result<Vec<HitlRequestRecord>> {
        let mut sql = format!("SELECT {REQUEST_COLUMNS} FROM hitl_requests");
        let mut conditions = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            bind.push(status.as_str().to_string());
            conditions.push(format!("status = ?{}", bind.len()));
        }
        if let Some(request_type) = filter.request_type {
            bind.push(request_type.as_str().to_string());
            conditions.push(format!("type = ?{}", bind.len()));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind.iter()), read_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(hydrate(row?)?);
        }
        Ok(requests)
    }

    /// Pending requests whose deadline has not passed. Read-only view; the
    /// sweep is what actually transitions stale rows.
    pub async fn list_pending_requests(&self, now: DateTime<Utc>) -> Result<Vec<HitlRequestRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM hitl_requests \
             WHERE status = 'pending' AND expires_at > ?1 \
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![ts(now)], read_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(hydrate(row?)?);
        }
        Ok(requests)
    }

    pub async fn get_request(&self, id: &str) -> Result<Option<HitlRequestRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM hitl_requests WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(hydrate(row?)?)),
            None => Ok(None),
        }
    }

    /// Records the human decision as one conditional update. The
    /// `status = 'pending'` guard makes concurrent responders race safely:
    /// exactly one call matches the row, every other caller gets `false`.
    pub async fn record_decision(
        &self,
        id: &str,
        status: HitlStatus,
        decision: &HumanDecision,
        entry: &ConversationEntry,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE hitl_requests \
             SET status = ?1, human_decision = ?2, \
                 conversation = json_insert(conversation, '$[#]', json(?3)), \
                 updated_at = ?4 \
             WHERE id = ?5 AND status = 'pending'",
            params![
                status.as_str(),
                serde_json::to_string(decision)?,
                serde_json::to_string(entry)?,
                ts(now),
                id
            ],
        )?;
        Ok(rows > 0)
    }

    /// Appends regardless of status; terminal requests stay annotatable.
    pub async fn append_conversation(
        &self,
        id: &str,
        entry: &ConversationEntry,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE hitl_requests \
             SET conversation = json_insert(conversation, '$[#]', json(?1)), updated_at = ?2 \
             WHERE id = ?3",
            params![serde_json::to_string(entry)?, ts(now), id],
        )?;
        Ok(rows > 0)
    }

    /// Bulk conditional transition of stale pending requests. Safe to run
    /// concurrently with itself and with `record_decision`; both are
    /// conditioned on `status = 'pending'`.
    pub async fn expire_pending_before(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE hitl_requests SET status = 'expired', updated_at = ?1 \
             WHERE status = 'pending' AND expires_at < ?2",
            params![ts(now), ts(now)],
        )?;
        Ok(rows)
    }

    pub async fn request_status_counts(&self) -> Result<Vec<(String, i64)>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT status, COUNT(*) FROM hitl_requests GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    /// (createdAt, decidedAt) pairs for every decided request.
    pub async fn decision_latencies(&self) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT created_at, json_extract(human_decision, '$.decidedAt') \
             FROM hitl_requests \
             WHERE status IN ('approved', 'rejected') AND human_decision IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut latencies = Vec::new();
        for row in rows {
            let (created, decided) = row?;
            latencies.push((parse_ts(&created)?, parse_ts(&decided)?));
        }
        Ok(latencies)
    }

    #[cfg(test)]
    pub(crate) async fn force_expires_at(&self, id: &str, when: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE hitl_requests SET expires_at = ?1 WHERE id = ?2",
            params![ts(when), id],
        )?;
        Ok(rows > 0)
    }
}
