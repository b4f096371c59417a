use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::super::AppState;
use crate::core::error::ServiceError;
use crate::core::store::types::{AgentRecord, AgentStatus, AgentType};
use crate::core::store::AgentUpdate;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    pub agent_id: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub status: Option<AgentStatus>,
    pub configuration: Option<Value>,
    pub capabilities: Option<Value>,
    pub parent_agent_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ListAgentsQuery {
    #[serde(rename = "type")]
    agent_type: Option<AgentType>,
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Agent with ID {id} not found"))
}

pub async fn create_agent(
    State(state): State<AppState>,
    Json(payload): Json<CreateAgentRequest>,
) -> Result<Json<AgentRecord>, ServiceError> {
    if payload.name.trim().is_empty() {
        return Err(ServiceError::Validation("name is required".to_string()));
    }
    if payload.agent_id.trim().is_empty() {
        return Err(ServiceError::Validation("agentId is required".to_string()));
    }

    let now = Utc::now();
    let agent = AgentRecord {
        id: Uuid::new_v4().to_string(),
        name: payload.name,
        agent_id: payload.agent_id,
        agent_type: payload.agent_type,
        status: payload.status.unwrap_or(AgentStatus::Active),
        configuration: payload.configuration,
        capabilities: payload.capabilities,
        last_active: now,
        parent_agent_id: payload.parent_agent_id,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_agent(&agent).await?;
    Ok(Json(agent))
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> Result<Json<Vec<AgentRecord>>, ServiceError> {
    Ok(Json(state.store.list_agents(query.agent_type).await?))
}

pub async fn get_agent(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AgentRecord>, ServiceError> {
    state
        .store
        .get_agent(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn update_agent(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AgentUpdate>,
) -> Result<Json<AgentRecord>, ServiceError> {
    if !state.store.update_agent(&id, &payload, Utc::now()).await? {
        return Err(not_found(&id));
    }
    get_agent(Path(id), State(state)).await
}

pub async fn update_agent_status(
    Path((id, status)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<AgentRecord>, ServiceError> {
    let status = AgentStatus::parse(&status)
        .ok_or_else(|| ServiceError::Validation(format!("unknown agent status {status:?}")))?;
    if !state.store.set_agent_status(&id, status, Utc::now()).await? {
        return Err(not_found(&id));
    }
    get_agent(Path(id), State(state)).await
}

pub async fn delete_agent(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let removed = state.store.delete_agent(&id).await?;
    Ok(Json(serde_json::json!({ "success": removed })))
}
