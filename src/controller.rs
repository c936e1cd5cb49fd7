// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! AppBundle controller - watches AppBundles and runs the reconciliation
//! pipeline for each changed owner. The controller runtime serializes runs
//! per object, so at most one pipeline is in flight per AppBundle.

use futures::StreamExt;
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::constants::requeue;
use crate::error::{DroverError, Result};
use crate::images::ImageResolver;
use crate::reconcilers::{
    DeploymentReconciler, ReconcilePipeline, ReconcileResult, ServiceReconciler,
};
use crate::types::AppBundle;

pub struct AppBundleController {
    client: Client,
    pipeline: ReconcilePipeline,
}

impl AppBundleController {
    pub fn new(client: Client, resolver: Arc<dyn ImageResolver>) -> Self {
        let pipeline = ReconcilePipeline::new(vec![
            Box::new(DeploymentReconciler::new(client.clone(), resolver)),
            Box::new(ServiceReconciler::new(client.clone())),
        ]);

        Self { client, pipeline }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let apps: Api<AppBundle> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(apps, WatcherConfig::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled AppBundle: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(app: Arc<AppBundle>, ctx: Arc<AppBundleController>) -> Result<Action> {
    debug!(
        "Reconciling AppBundle {}/{}",
        app.namespace().unwrap_or_default(),
        app.name_any()
    );

    match ctx.pipeline.run(&app).await {
        ReconcileResult::Continue => Ok(Action::await_change()),
        ReconcileResult::RequeueAfter(delay, error) => {
            warn!(
                "Transient failure reconciling {}: {}, retrying in {:?}",
                app.name_any(),
                error,
                delay
            );
            Ok(Action::requeue(delay))
        }
        ReconcileResult::Abort(error) => Err(error),
    }
}

fn error_policy(app: Arc<AppBundle>, error: &DroverError, _ctx: Arc<AppBundleController>) -> Action {
    error!("Reconciliation aborted for {}: {}", app.name_any(), error);
    match error {
        // retrying cannot fix a defect, wait for the spec to change
        DroverError::Invariant(_) => Action::await_change(),
        _ => Action::requeue(Duration::from_secs(requeue::ERROR_SECS)),
    }
}
