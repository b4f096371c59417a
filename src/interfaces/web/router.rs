use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware,
    middleware::Next,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers::{agents, cases, clients, hitl};
use super::AppState;

fn build_localhost_cors(api_port: u16, dashboard_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
        format!("http://127.0.0.1:{}", dashboard_port),
        format!("http://localhost:{}", dashboard_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/hitl/requests",
            post(hitl::create_request).get(hitl::list_requests),
        )
        .route("/hitl/requests/pending", get(hitl::list_pending))
        .route("/hitl/requests/{id}", get(hitl::get_request))
        .route("/hitl/requests/{id}/respond", put(hitl::respond_to_request))
        .route("/hitl/requests/{id}/message", post(hitl::add_message))
        .route("/hitl/statistics", get(hitl::get_statistics))
        .route("/hitl/expire-old", post(hitl::expire_old_requests))
        .route(
            "/agents",
            post(agents::create_agent).get(agents::list_agents),
        )
        .route(
            "/agents/{id}",
            get(agents::get_agent)
                .put(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route("/agents/{id}/status/{status}", put(agents::update_agent_status))
        .route("/cases", post(cases::create_case).get(cases::list_cases))
        .route("/cases/generate", post(cases::generate_case))
        .route("/cases/{id}", get(cases::get_case).put(cases::update_case))
        .route("/cases/{id}/assign/{agent_id}", post(cases::assign_case))
        .route("/cases/{id}/resolve", post(cases::resolve_case))
        .route(
            "/clients",
            post(clients::create_client).get(clients::list_clients),
        )
        .route(
            "/clients/by-client-id/{id}",
            get(clients::get_client_by_business_id),
        )
        .route(
            "/clients/{id}",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/clients/{id}/equipment", post(clients::add_equipment))
        .route(
            "/clients/{id}/technical-note",
            post(clients::add_technical_note),
        )
        .route("/clients/{id}/history", get(clients::get_client_history))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.api_port, state.dashboard_port))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hitl::HitlService;
    use crate::core::notify::LogNotifier;
    use crate::core::store::Store;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn test_state() -> AppState {
        let store = Arc::new(Store::in_memory());
        let hitl = Arc::new(HitlService::new(store.clone(), Arc::new(LogNotifier)));
        AppState {
            store,
            hitl,
            api_port: 8310,
            dashboard_port: 3000,
        }
    }

    async fn json_request(
        app: Router,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes).unwrap_or(serde_json::json!({}));
        (status, json)
    }

    fn hitl_request_body() -> serde_json::Value {
        json!({
            "title": "Approve camera reboot",
            "type": "decision_approval",
            "requestingAgent": "technician",
            "requestingAgentId": "tech-12",
            "description": "Camera at dock 4 is unresponsive",
            "proposedAction": {
                "action": "reboot_camera",
                "parameters": {"cameraId": "CAM-4411"},
                "reasoning": "No heartbeat for 20 minutes"
            }
        })
    }

    #[tokio::test]
    async fn security_headers_present_on_responses() {
        let app = build_api_router(test_state());
        let req = Request::builder()
            .method(Method::GET)
            .uri("/hitl/requests")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn create_and_fetch_hitl_request() {
        let state = test_state();

        let app = build_api_router(state.clone());
        let (status, created) =
            json_request(app, Method::POST, "/hitl/requests", Some(hitl_request_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["conversation"].as_array().unwrap().len(), 1);
        let id = created["id"].as_str().unwrap().to_string();

        let app = build_api_router(state);
        let (status, fetched) =
            json_request(app, Method::GET, &format!("/hitl/requests/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Approve camera reboot");
    }

    #[tokio::test]
    async fn create_rejects_blank_title_with_400() {
        let app = build_api_router(test_state());
        let mut body = hitl_request_body();
        body["title"] = json!("   ");
        let (status, json) = json_request(app, Method::POST, "/hitl/requests", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn create_rejects_unknown_enum_value() {
        let app = build_api_router(test_state());
        let mut body = hitl_request_body();
        body["type"] = json!("coffee_break");
        let (status, _) = json_request(app, Method::POST, "/hitl/requests", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn respond_twice_conflicts_and_unknown_id_is_404() {
        let state = test_state();

        let app = build_api_router(state.clone());
        let (_, created) =
            json_request(app, Method::POST, "/hitl/requests", Some(hitl_request_body())).await;
        let id = created["id"].as_str().unwrap().to_string();

        let respond = json!({
            "approved": true,
            "feedback": "reboot it",
            "decidedBy": "operator-7"
        });

        let app = build_api_router(state.clone());
        let (status, decided) = json_request(
            app,
            Method::PUT,
            &format!("/hitl/requests/{id}/respond"),
            Some(respond.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decided["status"], "approved");
        assert_eq!(decided["humanDecision"]["approved"], true);

        let app = build_api_router(state.clone());
        let (status, json_body) = json_request(
            app,
            Method::PUT,
            &format!("/hitl/requests/{id}/respond"),
            Some(respond.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_body["error"], "request is no longer pending");

        let app = build_api_router(state);
        let (status, _) = json_request(
            app,
            Method::PUT,
            "/hitl/requests/no-such-id/respond",
            Some(respond),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn conversation_message_appends_through_the_api() {
        let state = test_state();

        let app = build_api_router(state.clone());
        let (_, created) =
            json_request(app, Method::POST, "/hitl/requests", Some(hitl_request_body())).await;
        let id = created["id"].as_str().unwrap().to_string();

        let app = build_api_router(state);
        let (status, updated) = json_request(
            app,
            Method::POST,
            &format!("/hitl/requests/{id}/message"),
            Some(json!({"message": "any update?", "from": "operator-7"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["conversation"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_requests_filters_by_status() {
        let state = test_state();

        let app = build_api_router(state.clone());
        json_request(app, Method::POST, "/hitl/requests", Some(hitl_request_body())).await;

        let app = build_api_router(state.clone());
        let (status, pending) =
            json_request(app, Method::GET, "/hitl/requests?status=pending", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let app = build_api_router(state);
        let (_, approved) =
            json_request(app, Method::GET, "/hitl/requests?status=approved", None).await;
        assert_eq!(approved.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn statistics_start_all_zero_and_expire_old_reports_count() {
        let state = test_state();

        let app = build_api_router(state.clone());
        let (status, stats) = json_request(app, Method::GET, "/hitl/statistics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["statusCounts"]["pending"], 0);
        assert_eq!(stats["statusCounts"]["expired"], 0);
        assert_eq!(stats["averageResponseTimeMs"], 0.0);

        let app = build_api_router(state);
        let (status, swept) = json_request(app, Method::POST, "/hitl/expire-old", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(swept["expired"], 0);
        assert_eq!(swept["message"], "Old requests expired successfully");
    }

    #[tokio::test]
    async fn agent_crud_roundtrip() {
        let state = test_state();

        let app = build_api_router(state.clone());
        let (status, agent) = json_request(
            app,
            Method::POST,
            "/agents",
            Some(json!({
                "name": "Dispatch validator",
                "agentId": "AGT-17",
                "type": "validator"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(agent["status"], "active");
        let id = agent["id"].as_str().unwrap().to_string();

        let app = build_api_router(state.clone());
        let (status, updated) = json_request(
            app,
            Method::PUT,
            &format!("/agents/{id}/status/maintenance"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "maintenance");

        let app = build_api_router(state.clone());
        let (status, deleted) =
            json_request(app, Method::DELETE, &format!("/agents/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["success"], true);

        let app = build_api_router(state);
        let (status, _) = json_request(app, Method::GET, &format!("/agents/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn case_assignment_and_resolution_flow() {
        let state = test_state();

        let app = build_api_router(state.clone());
        let (_, agent) = json_request(
            app,
            Method::POST,
            "/agents",
            Some(json!({"name": "Field tech", "agentId": "AGT-2", "type": "technician"})),
        )
        .await;
        let agent_id = agent["id"].as_str().unwrap().to_string();

        let app = build_api_router(state.clone());
        let (status, case) = json_request(
            app,
            Method::POST,
            "/cases",
            Some(json!({
                "title": "Intercom static",
                "type": "intercom",
                "createdBy": "system",
                "createdByType": "system",
                "clientId": "client-9"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(case["status"], "created");
        assert_eq!(case["history"].as_array().unwrap().len(), 1);
        let case_id = case["id"].as_str().unwrap().to_string();

        let app = build_api_router(state.clone());
        let (status, assigned) = json_request(
            app,
            Method::POST,
            &format!("/cases/{case_id}/assign/{agent_id}?assignerType=validator"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(assigned["status"], "in_progress");
        assert_eq!(assigned["assignedToType"], "technician");
        assert_eq!(assigned["history"].as_array().unwrap().len(), 2);

        let app = build_api_router(state);
        let (status, resolved) = json_request(
            app,
            Method::POST,
            &format!("/cases/{case_id}/resolve"),
            Some(json!({"resolvedBy": "tech-2", "resolution": "replaced the panel"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["status"], "resolved");
        assert!(resolved["resolvedAt"].is_string());
        assert_eq!(resolved["history"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn generated_case_uses_template_defaults() {
        let app = build_api_router(test_state());
        let (status, case) = json_request(
            app,
            Method::POST,
            "/cases/generate",
            Some(json!({"type": "alarm_issue", "clientId": "client-3"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(case["title"], "Alarm system issue");
        assert_eq!(case["priority"], "critical");
        assert_eq!(case["createdBy"], "system");
    }

    #[tokio::test]
    async fn client_lifecycle_with_notes_and_equipment() {
        let state = test_state();

        let app = build_api_router(state.clone());
        let (status, client) = json_request(
            app,
            Method::POST,
            "/clients",
            Some(json!({
                "name": "Dockside Restaurant",
                "type": "restaurant",
                "email": "contact@dockside.example",
                "phone": "+1 555 0199"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = client["id"].as_str().unwrap().to_string();
        let business_id = client["clientId"].as_str().unwrap().to_string();
        assert!(business_id.starts_with("CLI"));

        let app = build_api_router(state.clone());
        let (status, found) = json_request(
            app,
            Method::GET,
            &format!("/clients/by-client-id/{business_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["id"].as_str().unwrap(), id);

        let app = build_api_router(state.clone());
        let (status, with_equipment) = json_request(
            app,
            Method::POST,
            &format!("/clients/{id}/equipment"),
            Some(json!({"type": "camera", "location": "Kitchen", "serialNumber": "SN-88"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(with_equipment["equipment"].as_array().unwrap().len(), 1);

        let app = build_api_router(state.clone());
        let (status, with_note) = json_request(
            app,
            Method::POST,
            &format!("/clients/{id}/technical-note"),
            Some(json!({"note": "swapped DVR drive"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(with_note["technicalRecord"]["totalVisits"], 1);
        assert!(with_note["technicalRecord"]["lastVisit"].is_string());

        let app = build_api_router(state);
        let (status, history) = json_request(
            app,
            Method::GET,
            &format!("/clients/{business_id}/history"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["equipment"].as_array().unwrap().len(), 1);
        assert_eq!(history["technicalRecord"]["totalVisits"], 1);
    }

    #[tokio::test]
    async fn api_route_contract_has_all_expected_paths() {
        let paths = [
            "/hitl/requests",
            "/hitl/requests/pending",
            "/hitl/requests/req-1",
            "/hitl/requests/req-1/respond",
            "/hitl/requests/req-1/message",
            "/hitl/statistics",
            "/hitl/expire-old",
            "/agents",
            "/agents/a-1",
            "/agents/a-1/status/active",
            "/cases",
            "/cases/generate",
            "/cases/c-1",
            "/cases/c-1/assign/a-1",
            "/cases/c-1/resolve",
            "/clients",
            "/clients/by-client-id/CLI1",
            "/clients/u-1",
            "/clients/u-1/equipment",
            "/clients/u-1/technical-note",
            "/clients/u-1/history",
        ];

        assert_eq!(paths.len(), 21, "Expected exactly 21 API routes");
        let unique: HashSet<&str> = paths.iter().copied().collect();
        assert_eq!(unique.len(), 21, "Duplicate routes found in route contract");

        let app = build_api_router(test_state());
        for path in paths {
            let req = Request::builder()
                .method(Method::PATCH)
                .uri(path)
                .body(Body::empty())
                .expect("request should build");
            let resp = app
                .clone()
                .oneshot(req)
                .await
                .expect("router oneshot should succeed");
            assert_ne!(
                resp.status(),
                StatusCode::NOT_FOUND,
                "Route missing from router: {}",
                path
            );
        }
    }
}
