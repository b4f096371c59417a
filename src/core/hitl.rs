use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::ServiceError;
use super::notify::{HitlEvent, Notifier};
use super::store::types::{
    AgentType, ConversationEntry, HitlRequestRecord, HitlRequestType, HitlStatus, HumanDecision,
    ProposedAction,
};
use super::store::{HitlFilter, Store};

/// Review window granted to human operators. Fixed at creation, not
/// configurable per request.
const RESPONSE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHitlRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub request_type: HitlRequestType,
    pub requesting_agent: AgentType,
    pub requesting_agent_id: String,
    pub related_case_id: Option<String>,
    pub related_client_id: Option<String>,
    pub description: String,
    pub context: Option<Value>,
    pub proposed_action: ProposedAction,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanResponse {
    pub approved: bool,
    #[serde(default)]
    pub feedback: String,
    pub decided_by: String,
    pub modifications: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewConversationMessage {
    pub message: String,
    pub from: String,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitlStatistics {
    pub status_counts: BTreeMap<String, i64>,
    pub average_response_time_ms: f64,
}

/// Owns the review-request lifecycle: creation, querying, decision
/// recording, conversation threading and the expiry sweep. Persistence and
/// notification are injected collaborators.
pub struct HitlService {
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
}

impl HitlService {
    pub fn new(store: Arc<Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn create_request(
        &self,
        input: CreateHitlRequest,
    ) -> Result<HitlRequestRecord, ServiceError> {
        if input.title.trim().is_empty() {
            return Err(ServiceError::Validation("title is required".to_string()));
        }
        if input.requesting_agent_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "requestingAgentId is required".to_string(),
            ));
        }
        if input.description.trim().is_empty() {
            return Err(ServiceError::Validation(
                "description is required".to_string(),
            ));
        }
        if input.proposed_action.action.trim().is_empty() {
            return Err(ServiceError::Validation(
                "proposedAction.action is required".to_string(),
            ));
        }

        let now = Utc::now();
        let request = HitlRequestRecord {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            request_type: input.request_type,
            status: HitlStatus::Pending,
            requesting_agent: input.requesting_agent,
            requesting_agent_id: input.requesting_agent_id,
            related_case_id: input.related_case_id,
            related_client_id: input.related_client_id,
            conversation: vec![ConversationEntry {
                message: format!("HITL request created: {}", input.description),
                from: input.requesting_agent.as_str().to_string(),
                timestamp: now,
                metadata: Some(json!({ "context": input.context })),
            }],
            description: input.description,
            context: input.context,
            proposed_action: input.proposed_action,
            suggestions: input.suggestions,
            human_response: None,
            human_decision: None,
            expires_at: now + Duration::hours(RESPONSE_WINDOW_HOURS),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_request(&request).await?;

        if let Err(e) = self
            .notifier
            .notify(HitlEvent::Created(request.clone()))
            .await
        {
            warn!("operator notification failed for {}: {e:#}", request.id);
        }

        Ok(request)
    }

    pub async fn find_all(
        &self,
        filter: HitlFilter,
    ) -> Result<Vec<HitlRequestRecord>, ServiceError> {
        Ok(self.store.list_requests(filter).await?)
    }

    pub async fn find_pending(&self) -> Result<Vec<HitlRequestRecord>, ServiceError> {
        Ok(self.store.list_pending_requests(Utc::now()).await?)
    }

    pub async fn find_one(&self, id: &str) -> Result<HitlRequestRecord, ServiceError> {
        self.store.get_request(id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("HITL request with ID {id} not found"))
        })
    }

    /// Records the human decision. The underlying update is conditional on
    /// the request still being pending, so at most one responder wins; a
    /// caller losing that race gets `InvalidStateError`.
    pub async fn respond_to_request(
        &self,
        id: &str,
        response: HumanResponse,
    ) -> Result<HitlRequestRecord, ServiceError> {
        if response.decided_by.trim().is_empty() {
            return Err(ServiceError::Validation(
                "decidedBy is required".to_string(),
            ));
        }

        // Distinguishes unknown id from a lost race up front.
        self.find_one(id).await?;

        let now = Utc::now();
        let status = if response.approved {
            HitlStatus::Approved
        } else {
            HitlStatus::Rejected
        };
        let decision = HumanDecision {
            approved: response.approved,
            modifications: response.modifications.clone(),
            feedback: response.feedback.clone(),
            decided_by: response.decided_by.clone(),
            decided_at: now,
        };
        let outcome = if response.approved {
            "APPROVED"
        } else {
            "REJECTED"
        };
        let entry = ConversationEntry {
            message: format!("Human decision: {} - {}", outcome, response.feedback),
            from: response.decided_by,
            timestamp: now,
            metadata: Some(json!({
                "approved": response.approved,
                "modifications": response.modifications,
            })),
        };

        let won = self
            .store
            .record_decision(id, status, &decision, &entry, now)
            .await?;
        if !won {
            return Err(ServiceError::InvalidState(
                "request is no longer pending".to_string(),
            ));
        }

        let updated = self.find_one(id).await?;
        if let Err(e) = self
            .notifier
            .notify(HitlEvent::Decided(updated.clone()))
            .await
        {
            warn!("agent notification failed for {}: {e:#}", updated.id);
        }

        Ok(updated)
    }

    /// Appends regardless of status; annotating terminal requests is allowed.
    pub async fn add_conversation_message(
        &self,
        id: &str,
        message: NewConversationMessage,
    ) -> Result<HitlRequestRecord, ServiceError> {
        if message.message.trim().is_empty() {
            return Err(ServiceError::Validation("message is required".to_string()));
        }
        if message.from.trim().is_empty() {
            return Err(ServiceError::Validation("from is required".to_string()));
        }

        let now = Utc::now();
        let entry = ConversationEntry {
            message: message.message,
            from: message.from,
            timestamp: now,
            metadata: message.metadata,
        };
        let appended = self.store.append_conversation(id, &entry, now).await?;
        if !appended {
            return Err(ServiceError::NotFound(format!(
                "HITL request with ID {id} not found"
            )));
        }
        self.find_one(id).await
    }

    /// Moves every pending request past its deadline to `expired`. No
    /// conversation entry is appended; the sweep is a system bookkeeping
    /// pass, not part of the dialogue. Idempotent.
    pub async fn expire_old_requests(&self) -> Result<usize, ServiceError> {
        let expired = self.store.expire_pending_before(Utc::now()).await?;
        info!("Expired {expired} old HITL requests");
        Ok(expired)
    }

    /// Counts per status (every status present, zero default) and average
    /// creation-to-decision latency over decided requests.
    pub async fn get_statistics(&self) -> Result<HitlStatistics, ServiceError> {
        let mut status_counts: BTreeMap<String, i64> = HitlStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in self.store.request_status_counts().await? {
            status_counts.insert(status, count);
        }

        let latencies = self.store.decision_latencies().await?;
        let average_response_time_ms = if latencies.is_empty() {
            0.0
        } else {
            let total: i64 = latencies
                .iter()
                .map(|(created, decided)| (*decided - *created).num_milliseconds())
                .sum();
            total as f64 / latencies.len() as f64
        };

        Ok(HitlStatistics {
            status_counts,
            average_response_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notify::LogNotifier;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct RecordingNotifier {
        events: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: HitlEvent) -> anyhow::Result<()> {
            let kind = match event {
                HitlEvent::Created(_) => "created",
                HitlEvent::Decided(_) => "decided",
            };
            self.events.lock().await.push(kind);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _event: HitlEvent) -> anyhow::Result<()> {
            Err(anyhow!("channel unreachable"))
        }
    }

    fn service() -> HitlService {
        HitlService::new(Arc::new(Store::in_memory()), Arc::new(LogNotifier))
    }

    fn create_input() -> CreateHitlRequest {
        CreateHitlRequest {
            title: "Approve config push".to_string(),
            request_type: HitlRequestType::ConfigurationChange,
            requesting_agent: AgentType::Technician,
            requesting_agent_id: "tech-3".to_string(),
            related_case_id: None,
            related_client_id: None,
            description: "Alarm panel needs a new zone map".to_string(),
            context: Some(json!({"zones": 8})),
            proposed_action: ProposedAction {
                action: "push_zone_map".to_string(),
                parameters: json!({"zones": 8}),
                reasoning: "Zone 5 misfires nightly".to_string(),
            },
            suggestions: Vec::new(),
        }
    }

    fn approval(decided_by: &str) -> HumanResponse {
        HumanResponse {
            approved: true,
            feedback: "go ahead".to_string(),
            decided_by: decided_by.to_string(),
            modifications: None,
        }
    }

    #[tokio::test]
    async fn created_request_is_pending_with_seeded_conversation() {
        let svc = service();
        let request = svc.create_request(create_input()).await.expect("create");

        assert_eq!(request.status, HitlStatus::Pending);
        assert_eq!(request.conversation.len(), 1);
        assert_eq!(request.conversation[0].from, "technician");
        assert_eq!(
            request.expires_at - request.created_at,
            Duration::hours(24)
        );
        assert!(request.human_decision.is_none());
    }

    #[tokio::test]
    async fn creation_rejects_empty_required_fields() {
        let svc = service();

        let mut input = create_input();
        input.title = "  ".to_string();
        assert!(matches!(
            svc.create_request(input).await,
            Err(ServiceError::Validation(_))
        ));

        let mut input = create_input();
        input.proposed_action.action = String::new();
        assert!(matches!(
            svc.create_request(input).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn approval_and_rejection_set_matching_terminal_states() {
        let svc = service();

        let approved = svc.create_request(create_input()).await.expect("create");
        let approved = svc
            .respond_to_request(&approved.id, approval("operator-1"))
            .await
            .expect("respond");
        assert_eq!(approved.status, HitlStatus::Approved);
        let decision = approved.human_decision.expect("decision");
        assert!(decision.approved);
        assert_eq!(decision.decided_by, "operator-1");

        let rejected = svc.create_request(create_input()).await.expect("create");
        let rejected = svc
            .respond_to_request(
                &rejected.id,
                HumanResponse {
                    approved: false,
                    feedback: "too risky".to_string(),
                    decided_by: "operator-2".to_string(),
                    modifications: None,
                },
            )
            .await
            .expect("respond");
        assert_eq!(rejected.status, HitlStatus::Rejected);
        assert!(!rejected.human_decision.expect("decision").approved);
    }

    #[tokio::test]
    async fn second_response_loses_and_first_decision_stands() {
        let svc = service();
        let request = svc.create_request(create_input()).await.expect("create");

        svc.respond_to_request(&request.id, approval("operator-1"))
            .await
            .expect("first response");

        let second = svc
            .respond_to_request(
                &request.id,
                HumanResponse {
                    approved: false,
                    feedback: "changed my mind".to_string(),
                    decided_by: "operator-2".to_string(),
                    modifications: None,
                },
            )
            .await;
        assert!(matches!(second, Err(ServiceError::InvalidState(_))));

        let stored = svc.find_one(&request.id).await.expect("find");
        assert_eq!(stored.status, HitlStatus::Approved);
        assert_eq!(
            stored.human_decision.expect("decision").decided_by,
            "operator-1"
        );
    }

    #[tokio::test]
    async fn responding_to_unknown_id_is_not_found() {
        let svc = service();
        let result = svc
            .respond_to_request("missing", approval("operator-1"))
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn conversation_appends_preserve_count_and_order() {
        let svc = service();
        let request = svc.create_request(create_input()).await.expect("create");

        for i in 0..3 {
            svc.add_conversation_message(
                &request.id,
                NewConversationMessage {
                    message: format!("note {i}"),
                    from: "operator-1".to_string(),
                    metadata: None,
                },
            )
            .await
            .expect("append");
        }

        let stored = svc.find_one(&request.id).await.expect("find");
        assert_eq!(stored.conversation.len(), 4);
        assert_eq!(stored.conversation[1].message, "note 0");
        assert_eq!(stored.conversation[3].message, "note 2");
    }

    #[tokio::test]
    async fn terminal_requests_stay_annotatable() {
        let svc = service();
        let request = svc.create_request(create_input()).await.expect("create");
        svc.respond_to_request(&request.id, approval("operator-1"))
            .await
            .expect("respond");

        let updated = svc
            .add_conversation_message(
                &request.id,
                NewConversationMessage {
                    message: "rollout completed".to_string(),
                    from: "tech-3".to_string(),
                    metadata: None,
                },
            )
            .await
            .expect("append after decision");
        assert_eq!(updated.status, HitlStatus::Approved);
        assert_eq!(updated.conversation.len(), 3);
    }

    #[tokio::test]
    async fn pending_view_hides_overdue_requests_without_expiring_them() {
        let svc = service();
        let store = svc.store.clone();
        let request = svc.create_request(create_input()).await.expect("create");
        store
            .force_expires_at(&request.id, Utc::now() - Duration::hours(1))
            .await
            .expect("force");

        let pending = svc.find_pending().await.expect("pending");
        assert!(pending.is_empty());

        // The view did not transition anything.
        let stored = svc.find_one(&request.id).await.expect("find");
        assert_eq!(stored.status, HitlStatus::Pending);
    }

    #[tokio::test]
    async fn expiry_sweep_is_idempotent_and_leaves_decisions_absent() {
        let svc = service();
        let store = svc.store.clone();

        let mut input = create_input();
        input.request_type = HitlRequestType::Escalation;
        input.requesting_agent = AgentType::System;
        let stale = svc.create_request(input).await.expect("create");
        store
            .force_expires_at(&stale.id, Utc::now() - Duration::hours(2))
            .await
            .expect("force");

        let live = svc.create_request(create_input()).await.expect("create");
        let decided = svc.create_request(create_input()).await.expect("create");
        svc.respond_to_request(&decided.id, approval("operator-1"))
            .await
            .expect("respond");

        assert_eq!(svc.expire_old_requests().await.expect("sweep"), 1);
        assert_eq!(svc.expire_old_requests().await.expect("sweep again"), 0);

        let stale = svc.find_one(&stale.id).await.expect("find");
        assert_eq!(stale.status, HitlStatus::Expired);
        assert!(stale.human_decision.is_none());
        assert_eq!(
            svc.find_one(&live.id).await.expect("find").status,
            HitlStatus::Pending
        );
        assert_eq!(
            svc.find_one(&decided.id).await.expect("find").status,
            HitlStatus::Approved
        );
    }

    #[tokio::test]
    async fn statistics_on_empty_set_are_all_zero() {
        let svc = service();
        let stats = svc.get_statistics().await.expect("stats");
        assert_eq!(stats.status_counts.len(), 5);
        assert!(stats.status_counts.values().all(|&c| c == 0));
        assert_eq!(stats.average_response_time_ms, 0.0);
    }

    #[tokio::test]
    async fn statistics_count_by_status_and_average_latency() {
        let svc = service();
        let a = svc.create_request(create_input()).await.expect("create");
        svc.create_request(create_input()).await.expect("create");
        svc.respond_to_request(&a.id, approval("operator-1"))
            .await
            .expect("respond");

        let stats = svc.get_statistics().await.expect("stats");
        assert_eq!(stats.status_counts["approved"], 1);
        assert_eq!(stats.status_counts["pending"], 1);
        assert_eq!(stats.status_counts["expired"], 0);
        assert!(stats.average_response_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn notifier_sees_created_and_decided_events() {
        let notifier = Arc::new(RecordingNotifier {
            events: Mutex::new(Vec::new()),
        });
        let svc = HitlService::new(Arc::new(Store::in_memory()), notifier.clone());

        let request = svc.create_request(create_input()).await.expect("create");
        svc.respond_to_request(&request.id, approval("operator-1"))
            .await
            .expect("respond");

        let events = notifier.events.lock().await;
        assert_eq!(*events, vec!["created", "decided"]);
    }

    #[tokio::test]
    async fn notifier_failure_never_fails_the_operation() {
        let svc = HitlService::new(Arc::new(Store::in_memory()), Arc::new(FailingNotifier));

        let request = svc.create_request(create_input()).await.expect("create");
        let decided = svc
            .respond_to_request(&request.id, approval("operator-1"))
            .await
            .expect("respond despite notifier failure");
        assert_eq!(decided.status, HitlStatus::Approved);
    }
}
