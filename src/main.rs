mod config;
mod core;
mod interfaces;
mod logging;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::AppConfig;
use crate::core::hitl::HitlService;
use crate::core::lifecycle::LifecycleManager;
use crate::core::notify::LogNotifier;
use crate::core::store::Store;
use crate::core::sweep::expiry_sweep_job;
use crate::interfaces::web::ApiServer;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = AppConfig::load()?;
    info!("Starting WatchDesk backend");

    let store = Arc::new(Store::new(&config.db_path).await?);
    let hitl = Arc::new(HitlService::new(store.clone(), Arc::new(LogNotifier)));

    let mut lifecycle = LifecycleManager::new().await?;

    let api = ApiServer::new(
        store.clone(),
        hitl.clone(),
        config.api_host.clone(),
        config.api_port,
        config.dashboard_port,
    );
    lifecycle.attach(Arc::new(Mutex::new(api)));

    lifecycle
        .scheduler
        .add(expiry_sweep_job(hitl.clone(), &config.sweep_cron)?)
        .await?;

    lifecycle.start().await?;
    info!("WatchDesk ready on {}:{}", config.api_host, config.api_port);

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    info!("WatchDesk stopped");

    Ok(())
}
