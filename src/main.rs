// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

use drover::config::Config;
use drover::controller::AppBundleController;
use drover::images::BuildImageResolver;
use drover::webhooks::{AdmissionEngine, LogDiagnostics, WebhookServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting drover operator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: webhook_addr={} max_replicas={}",
        config.webhook_addr, config.settings.max_replicas
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let resolver = Arc::new(BuildImageResolver);

    // Admission engine behind the webhook endpoint
    let engine = Arc::new(AdmissionEngine::new(
        config.settings.clone(),
        resolver.clone(),
        Arc::new(LogDiagnostics),
    ));
    let server = WebhookServer::new(config.webhook_addr, engine);

    // Reconciliation pipeline behind the controller
    let controller = AppBundleController::new(client, resolver);

    info!("Starting admission webhook and controller...");

    // Run the webhook endpoint and the controller concurrently
    tokio::try_join!(server.run(), controller.run())?;

    // This should never be reached as both run forever
    warn!("Operator stopped unexpectedly");
    Ok(())
}
