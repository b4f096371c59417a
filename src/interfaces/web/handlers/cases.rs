use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::super::AppState;
use crate::core::error::ServiceError;
use crate::core::store::types::{
    AgentType, CasePriority, CaseRecord, CaseStatus, CaseType, ConversationEntry,
};
use crate::core::store::{CaseFilter, CaseUpdate};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub case_type: CaseType,
    pub priority: Option<CasePriority>,
    pub created_by: String,
    pub created_by_type: AgentType,
    pub client_id: String,
    pub details: Option<Value>,
}

#[derive(Deserialize)]
pub struct ListCasesQuery {
    status: Option<CaseStatus>,
    #[serde(rename = "type")]
    case_type: Option<CaseType>,
    #[serde(rename = "assignedTo")]
    assigned_to: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignQuery {
    assigner_type: Option<AgentType>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveCaseRequest {
    pub resolved_by: String,
    pub resolution: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCaseRequest {
    #[serde(rename = "type")]
    pub case_type: CaseType,
    pub client_id: String,
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Case with ID {id} not found"))
}

async fn persist_new_case(
    state: &AppState,
    payload: CreateCaseRequest,
) -> Result<CaseRecord, ServiceError> {
    if payload.title.trim().is_empty() {
        return Err(ServiceError::Validation("title is required".to_string()));
    }
    if payload.created_by.trim().is_empty() {
        return Err(ServiceError::Validation("createdBy is required".to_string()));
    }
    if payload.client_id.trim().is_empty() {
        return Err(ServiceError::Validation("clientId is required".to_string()));
    }

    let now = Utc::now();
    let case = CaseRecord {
        id: Uuid::new_v4().to_string(),
        title: payload.title,
        case_type: payload.case_type,
        status: CaseStatus::Created,
        priority: payload.priority.unwrap_or(CasePriority::Medium),
        assigned_to: None,
        assigned_to_type: None,
        created_by: payload.created_by,
        created_by_type: payload.created_by_type,
        client_id: payload.client_id,
        history: vec![ConversationEntry {
            message: "Case created".to_string(),
            from: payload.created_by_type.as_str().to_string(),
            timestamp: now,
            metadata: payload.details.clone(),
        }],
        details: payload.details,
        resolved_at: None,
        resolution_time: None,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_case(&case).await?;
    Ok(case)
}

pub async fn create_case(
    State(state): State<AppState>,
    Json(payload): Json<CreateCaseRequest>,
) -> Result<Json<CaseRecord>, ServiceError> {
    Ok(Json(persist_new_case(&state, payload).await?))
}

pub async fn list_cases(
    State(state): State<AppState>,
    Query(query): Query<ListCasesQuery>,
) -> Result<Json<Vec<CaseRecord>>, ServiceError> {
    let filter = CaseFilter {
        status: query.status,
        case_type: query.case_type,
        assigned_to: query.assigned_to,
    };
    Ok(Json(state.store.list_cases(&filter).await?))
}

pub async fn get_case(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CaseRecord>, ServiceError> {
    state
        .store
        .get_case(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn update_case(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<CaseUpdate>,
) -> Result<Json<CaseRecord>, ServiceError> {
    if !state.store.update_case(&id, &payload, Utc::now()).await? {
        return Err(not_found(&id));
    }

    if let Some(status) = payload.status {
        let author = payload.updated_by_type.unwrap_or(AgentType::System);
        state
            .store
            .append_case_history(
                &id,
                &ConversationEntry {
                    message: format!("Case status changed to {}", status.as_str()),
                    from: author.as_str().to_string(),
                    timestamp: Utc::now(),
                    metadata: Some(json!({ "status": status })),
                },
                Utc::now(),
            )
            .await?;
    }

    get_case(Path(id), State(state)).await
}

pub async fn assign_case(
    Path((id, agent_id)): Path<(String, String)>,
    Query(query): Query<AssignQuery>,
    State(state): State<AppState>,
) -> Result<Json<CaseRecord>, ServiceError> {
    let agent = state
        .store
        .get_agent(&agent_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Agent with ID {agent_id} not found")))?;

    if !state
        .store
        .assign_case(&id, &agent.id, agent.agent_type, Utc::now())
        .await?
    {
        return Err(not_found(&id));
    }

    let assigner = query.assigner_type.unwrap_or(AgentType::System);
    state
        .store
        .append_case_history(
            &id,
            &ConversationEntry {
                message: format!(
                    "Case assigned to {} ({})",
                    agent.name,
                    agent.agent_type.as_str()
                ),
                from: assigner.as_str().to_string(),
                timestamp: Utc::now(),
                metadata: Some(json!({
                    "assignedTo": agent.id,
                    "assignedToType": agent.agent_type,
                })),
            },
            Utc::now(),
        )
        .await?;

    get_case(Path(id), State(state)).await
}

pub async fn resolve_case(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ResolveCaseRequest>,
) -> Result<Json<CaseRecord>, ServiceError> {
    let case = state
        .store
        .get_case(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    let now = Utc::now();
    let resolution_time = (now - case.created_at).num_minutes();
    state.store.resolve_case(&id, now, resolution_time).await?;
    state
        .store
        .append_case_history(
            &id,
            &ConversationEntry {
                message: format!("Case resolved: {}", payload.resolution),
                from: AgentType::System.as_str().to_string(),
                timestamp: now,
                metadata: Some(json!({
                    "resolvedBy": payload.resolved_by,
                    "resolutionTime": resolution_time,
                })),
            },
            now,
        )
        .await?;

    get_case(Path(id), State(state)).await
}

pub async fn generate_case(
    State(state): State<AppState>,
    Json(payload): Json<GenerateCaseRequest>,
) -> Result<Json<CaseRecord>, ServiceError> {
    let template = case_template(payload.case_type, payload.client_id);
    Ok(Json(persist_new_case(&state, template).await?))
}

/// Canned starting points for frequent issue types; anything else becomes a
/// generic support case.
fn case_template(case_type: CaseType, client_id: String) -> CreateCaseRequest {
    let mut rng = rand::thread_rng();
    let (title, case_type, priority, details) = match case_type {
        CaseType::CameraOffline => (
            "Camera offline",
            CaseType::CameraOffline,
            CasePriority::High,
            Some(json!({
                "cameraId": format!("CAM-{}", rng.gen_range(1000..10000)),
                "lastSeen": Utc::now() - Duration::hours(rng.gen_range(0..24)),
                "location": "Entrance",
            })),
        ),
        CaseType::AlarmIssue => (
            "Alarm system issue",
            CaseType::AlarmIssue,
            CasePriority::Critical,
            Some(json!({
                "issueType": "false_alarm",
                "zone": rng.gen_range(1..9),
            })),
        ),
        _ => (
            "General support request",
            CaseType::Other,
            CasePriority::Medium,
            None,
        ),
    };

    CreateCaseRequest {
        title: title.to_string(),
        case_type,
        priority: Some(priority),
        created_by: "system".to_string(),
        created_by_type: AgentType::System,
        client_id,
        details,
    }
}
