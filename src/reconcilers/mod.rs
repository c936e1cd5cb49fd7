// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciler contract and the per-owner reconciliation pipeline.
//!
//! Each reconciler converges one child resource kind for one AppBundle by
//! recomputing desired state, listing observed state, and applying the
//! minimal create/update/delete actions. Every run starts from scratch, so
//! a cancelled or failed run is safely resumed by the next trigger.

pub mod deployment;
pub mod service;

pub use deployment::DeploymentReconciler;
pub use service::ServiceReconciler;

use async_trait::async_trait;
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::requeue;
use crate::error::DroverError;
use crate::types::AppBundle;

/// Outcome of one reconciler step.
#[derive(Debug)]
pub enum ReconcileResult {
    /// Converged; the next step in the pipeline may run
    Continue,
    /// Unrecoverable inconsistency; stop the pipeline, do not retry
    Abort(DroverError),
    /// Transient failure; stop the pipeline and retry after the delay
    RequeueAfter(Duration, DroverError),
}

impl ReconcileResult {
    pub fn should_abort(&self) -> bool {
        !matches!(self, ReconcileResult::Continue)
    }

    /// Transient store errors retry with the standard backoff
    pub fn transient(error: impl Into<DroverError>) -> Self {
        ReconcileResult::RequeueAfter(
            Duration::from_secs(requeue::TRANSIENT_SECS),
            error.into(),
        )
    }
}

#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Child resource kind this reconciler converges
    fn kind(&self) -> &'static str;

    async fn reconcile(&self, app: &AppBundle) -> ReconcileResult;
}

/// Ordered reconcilers for one owner. The first aborting result stops the
/// run and is handed back to the controller.
pub struct ReconcilePipeline {
    steps: Vec<Box<dyn Reconciler>>,
}

impl ReconcilePipeline {
    pub fn new(steps: Vec<Box<dyn Reconciler>>) -> Self {
        Self { steps }
    }

    pub async fn run(&self, app: &AppBundle) -> ReconcileResult {
        for step in &self.steps {
            debug!(
                "Running {} reconciler for AppBundle {}",
                step.kind(),
                app.name_any()
            );
            let result = step.reconcile(app).await;
            if result.should_abort() {
                warn!(
                    "{} reconciler stopped the pipeline for {}: {:?}",
                    step.kind(),
                    app.name_any(),
                    result
                );
                return result;
            }
        }
        ReconcileResult::Continue
    }
}
