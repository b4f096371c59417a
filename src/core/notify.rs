use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::store::types::HitlRequestRecord;

/// Lifecycle events handed to the notification collaborator.
#[derive(Debug, Clone)]
pub enum HitlEvent {
    Created(HitlRequestRecord),
    Decided(HitlRequestRecord),
}

/// Fire-and-forget notification seam. Callers must treat failures as
/// non-fatal: a successful state transition is never reported as failed
/// because a notification did not go out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: HitlEvent) -> Result<()>;
}

/// Log-only implementation. Real channel dispatch (WhatsApp, Telegram)
/// would live behind the same trait.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: HitlEvent) -> Result<()> {
        match event {
            HitlEvent::Created(request) => {
                info!(
                    "HITL request {} awaits review: '{}' ({}) from {} <{}>, expires {}",
                    request.id,
                    request.title,
                    request.request_type.as_str(),
                    request.requesting_agent.as_str(),
                    request.requesting_agent_id,
                    request.expires_at,
                );
            }
            HitlEvent::Decided(request) => {
                let outcome = request
                    .human_decision
                    .as_ref()
                    .map(|d| if d.approved { "APPROVED" } else { "REJECTED" })
                    .unwrap_or("DECIDED");
                info!(
                    "Notifying agent {} about HITL decision on {}: {}",
                    request.requesting_agent_id, request.id, outcome,
                );
            }
        }
        Ok(())
    }
}
