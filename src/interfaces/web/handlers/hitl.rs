use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::super::AppState;
use crate::core::error::ServiceError;
use crate::core::hitl::{CreateHitlRequest, HitlStatistics, HumanResponse, NewConversationMessage};
use crate::core::store::types::{HitlRequestRecord, HitlRequestType, HitlStatus};
use crate::core::store::HitlFilter;

#[derive(Deserialize)]
pub struct ListRequestsQuery {
    status: Option<HitlStatus>,
    #[serde(rename = "type")]
    request_type: Option<HitlRequestType>,
}

pub async fn create_request(
    State(state): State<AppState>,
    Json(payload): Json<CreateHitlRequest>,
) -> Result<Json<HitlRequestRecord>, ServiceError> {
    Ok(Json(state.hitl.create_request(payload).await?))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<HitlRequestRecord>>, ServiceError> {
    let filter = HitlFilter {
        status: query.status,
        request_type: query.request_type,
    };
    Ok(Json(state.hitl.find_all(filter).await?))
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<HitlRequestRecord>>, ServiceError> {
    Ok(Json(state.hitl.find_pending().await?))
}

pub async fn get_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<HitlRequestRecord>, ServiceError> {
    Ok(Json(state.hitl.find_one(&id).await?))
}

pub async fn respond_to_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<HumanResponse>,
) -> Result<Json<HitlRequestRecord>, ServiceError> {
    Ok(Json(state.hitl.respond_to_request(&id, payload).await?))
}

pub async fn add_message(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<NewConversationMessage>,
) -> Result<Json<HitlRequestRecord>, ServiceError> {
    Ok(Json(state.hitl.add_conversation_message(&id, payload).await?))
}

pub async fn get_statistics(
    State(state): State<AppState>,
) -> Result<Json<HitlStatistics>, ServiceError> {
    Ok(Json(state.hitl.get_statistics().await?))
}

pub async fn expire_old_requests(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expired = state.hitl.expire_old_requests().await?;
    Ok(Json(serde_json::json!({
        "message": "Old requests expired successfully",
        "expired": expired,
    })))
}
