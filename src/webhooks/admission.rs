// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admission engine: defaults and validates AppBundle writes.
//!
//! Create and update run the defaulting engine and then the validation rule
//! set; delete is always admitted. Rejections carry the full field error
//! list and are reported to the diagnostics sink, which never affects the
//! admission outcome.

use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::Settings;
use crate::error::{DroverError, Result};
use crate::images::ImageResolver;
use crate::types::AppBundle;
use crate::webhooks::default::apply_defaults;
use crate::webhooks::validate::{AppValidator, ValidationErrors};

/// Fire-and-forget failure reporting boundary
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, context: &str, errors: &ValidationErrors);
}

/// Default sink: reports through the log stream
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn report(&self, context: &str, errors: &ValidationErrors) {
        error!("{}: {}", context, errors);
    }
}

/// Which webhook endpoint a review arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewKind {
    Mutate,
    Validate,
}

pub struct AdmissionEngine {
    validator: AppValidator,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl AdmissionEngine {
    pub fn new(
        settings: Settings,
        resolver: Arc<dyn ImageResolver>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            validator: AppValidator::new(settings, resolver),
            diagnostics,
        }
    }

    /// Decode a serialized AdmissionReview, dispatch it, and encode the
    /// response review.
    pub fn review(&self, kind: ReviewKind, body: &[u8]) -> Result<Vec<u8>> {
        let review: AdmissionReview<AppBundle> = serde_json::from_slice(body)?;
        let request: AdmissionRequest<AppBundle> = review
            .try_into()
            .map_err(|e: kube::core::admission::ConvertAdmissionReviewError| {
                DroverError::AdmissionReview(e.to_string())
            })?;

        let response = match kind {
            ReviewKind::Mutate => self.mutate(&request),
            ReviewKind::Validate => self.validate(&request),
        };
        Ok(serde_json::to_vec(&response.into_review())?)
    }

    /// Mutating path: fill defaults and answer with a JSON patch.
    pub fn mutate(&self, request: &AdmissionRequest<AppBundle>) -> AdmissionResponse {
        let response = AdmissionResponse::from(request);
        let Some(app) = &request.object else {
            // nothing to default on delete
            return response;
        };

        debug!("Defaulting AppBundle {}", app.name_any());

        let mut defaulted = app.clone();
        apply_defaults(&mut defaulted.spec);

        let patch = match diff_patch(app, &defaulted) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("Failed to compute defaults patch: {}", e);
                return AdmissionResponse::from(request)
                    .deny(format!("failed to compute defaults: {}", e));
            }
        };

        match response.with_patch(patch) {
            Ok(patched) => patched,
            Err(e) => {
                warn!("Failed to attach defaults patch: {}", e);
                AdmissionResponse::from(request).deny(format!("failed to attach defaults: {}", e))
            }
        }
    }

    /// Validating path: delete is always admitted, create and update run the
    /// rule set against the defaulted object.
    pub fn validate(&self, request: &AdmissionRequest<AppBundle>) -> AdmissionResponse {
        let response = AdmissionResponse::from(request);
        if matches!(request.operation, Operation::Delete) {
            debug!("Admitting delete of {}", request.name);
            return response;
        }

        let Some(app) = &request.object else {
            return response.deny("no object attached to admission request");
        };

        // the mutating webhook runs first, but default again so the rules
        // never see unset fields
        let mut defaulted = app.clone();
        apply_defaults(&mut defaulted.spec);

        match self.validator.validate(&defaulted) {
            Ok(()) => {
                debug!("Admitting {} of {}", operation_name(&request.operation), app.name_any());
                response
            }
            Err(errors) => {
                self.diagnostics.report(
                    &format!(
                        "admission rejected AppBundle {}/{}",
                        app.namespace().unwrap_or_default(),
                        app.name_any()
                    ),
                    &errors,
                );
                response.deny(format!(
                    "AppBundle \"{}\" is invalid: {}",
                    app.name_any(),
                    errors
                ))
            }
        }
    }
}

fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "create",
        Operation::Update => "update",
        Operation::Delete => "delete",
        Operation::Connect => "connect",
    }
}

/// JSON patch turning `before` into `after`
fn diff_patch(before: &AppBundle, after: &AppBundle) -> Result<json_patch::Patch> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;
    Ok(json_patch::diff(&before, &after))
}
