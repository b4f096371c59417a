use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::super::AppState;
use crate::core::error::ServiceError;
use crate::core::store::types::{ClientRecord, ClientStatus, ClientType, TechnicalRecord};
use crate::core::store::ClientUpdate;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub status: Option<ClientStatus>,
    pub email: String,
    pub phone: String,
    pub address: Option<Value>,
    pub contact: Option<Value>,
    pub contract_info: Option<Value>,
}

#[derive(Deserialize)]
pub struct ListClientsQuery {
    #[serde(rename = "type")]
    client_type: Option<ClientType>,
    status: Option<ClientStatus>,
}

#[derive(Deserialize)]
pub struct TechnicalNoteRequest {
    pub note: String,
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Client with ID {id} not found"))
}

/// Business identifier in the shape the field teams already use:
/// `CLI` + trailing digits of the epoch millis + a random 3-digit suffix.
fn generate_client_id() -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("CLI{tail}{suffix:03}")
}

pub async fn create_client(
    State(state): State<AppState>,
    Json(payload): Json<CreateClientRequest>,
) -> Result<Json<ClientRecord>, ServiceError> {
    if payload.name.trim().is_empty() {
        return Err(ServiceError::Validation("name is required".to_string()));
    }
    if payload.email.trim().is_empty() {
        return Err(ServiceError::Validation("email is required".to_string()));
    }
    if payload.phone.trim().is_empty() {
        return Err(ServiceError::Validation("phone is required".to_string()));
    }

    let now = Utc::now();
    let client = ClientRecord {
        id: Uuid::new_v4().to_string(),
        name: payload.name,
        client_id: generate_client_id(),
        client_type: payload.client_type,
        status: payload.status.unwrap_or(ClientStatus::Active),
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
        contact: payload.contact,
        equipment: Vec::new(),
        technical_record: TechnicalRecord {
            installation_date: now,
            last_visit: None,
            total_visits: 0,
            common_issues: Vec::new(),
            notes: Vec::new(),
        },
        contract_info: payload.contract_info,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_client(&client).await?;
    Ok(Json(client))
}

pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Vec<ClientRecord>>, ServiceError> {
    Ok(Json(
        state
            .store
            .list_clients(query.client_type, query.status)
            .await?,
    ))
}

pub async fn get_client(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ClientRecord>, ServiceError> {
    state
        .store
        .get_client(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn get_client_by_business_id(
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ClientRecord>, ServiceError> {
    state
        .store
        .get_client_by_business_id(&client_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Client with clientId {client_id} not found"))
        })
}

pub async fn update_client(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ClientUpdate>,
) -> Result<Json<ClientRecord>, ServiceError> {
    if !state.store.update_client(&id, &payload, Utc::now()).await? {
        return Err(not_found(&id));
    }
    get_client(Path(id), State(state)).await
}

pub async fn delete_client(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let removed = state.store.delete_client(&id).await?;
    Ok(Json(serde_json::json!({ "success": removed })))
}

pub async fn add_equipment(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(equipment): Json<Value>,
) -> Result<Json<ClientRecord>, ServiceError> {
    if !state
        .store
        .append_equipment(&id, &equipment, Utc::now())
        .await?
    {
        return Err(not_found(&id));
    }
    get_client(Path(id), State(state)).await
}

pub async fn add_technical_note(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<TechnicalNoteRequest>,
) -> Result<Json<ClientRecord>, ServiceError> {
    if payload.note.trim().is_empty() {
        return Err(ServiceError::Validation("note is required".to_string()));
    }

    let client = state
        .store
        .get_client(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    let now = Utc::now();
    let mut record = client.technical_record;
    record
        .notes
        .push(format!("{}: {}", now.to_rfc3339(), payload.note));
    record.total_visits += 1;
    record.last_visit = Some(now);
    state.store.update_technical_record(&id, &record, now).await?;

    get_client(Path(id), State(state)).await
}

pub async fn get_client_history(
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let client = state
        .store
        .get_client_by_business_id(&client_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Client with clientId {client_id} not found"))
        })?;

    Ok(Json(json!({
        "client": client,
        "technicalRecord": client.technical_record,
        "equipment": client.equipment,
    })))
}
