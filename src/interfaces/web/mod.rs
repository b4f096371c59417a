mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::core::hitl::HitlService;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::Store;

pub struct ApiServer {
    store: Arc<Store>,
    hitl: Arc<HitlService>,
    api_host: String,
    api_port: u16,
    dashboard_port: u16,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<Store>,
    pub(crate) hitl: Arc<HitlService>,
    pub(crate) api_port: u16,
    pub(crate) dashboard_port: u16,
}

impl ApiServer {
    pub fn new(
        store: Arc<Store>,
        hitl: Arc<HitlService>,
        api_host: String,
        api_port: u16,
        dashboard_port: u16,
    ) -> Self {
        Self {
            store,
            hitl,
            api_host,
            api_port,
            dashboard_port,
        }
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let state = AppState {
            store: self.store.clone(),
            hitl: self.hitl.clone(),
            api_port: self.api_port,
            dashboard_port: self.dashboard_port,
        };
        let addr = format!("{}:{}", self.api_host, self.api_port);

        tokio::spawn(async move {
            let app = router::build_api_router(state);
            if let Ok(listener) = tokio::net::TcpListener::bind(&addr).await {
                info!("API Server running at http://{addr}");
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("API Server crashed: {}", e);
                }
            } else {
                tracing::error!("API Server could not bind {addr}");
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server shutting down...");
        Ok(())
    }
}
