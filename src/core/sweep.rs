use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::Job;
use tracing::warn;

use super::hitl::HitlService;

/// Cron job wrapping the expiry sweep. The service exposes the sweep as a
/// plain operation; scheduling lives out here with the rest of the runtime
/// wiring.
pub fn expiry_sweep_job(service: Arc<HitlService>, cron: &str) -> Result<Job> {
    let job = Job::new_async(cron, move |_uuid, mut _l| {
        let service = service.clone();
        Box::pin(async move {
            if let Err(e) = service.expire_old_requests().await {
                warn!("HITL expiry sweep failed: {e}");
            }
        })
    })?;
    Ok(job)
}
