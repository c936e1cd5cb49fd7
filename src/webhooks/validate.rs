// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Validation rule set for AppBundle specs.
//!
//! Rules are pure functions producing structured field errors. The four
//! top-level groups (name, annotations, spec, env overlay) are always all
//! attempted and their errors collected into one rejection; within a group
//! the first failing rule wins.

use kube::ResourceExt;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::config::Settings;
use crate::constants::{annotations, DEFAULT_MODULE, WEB_PROCESS};
use crate::images::ImageResolver;
use crate::types::{AppBundle, Process};

static APP_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z0-9-]{1,39}$").expect("invalid app name regex"));
static PROC_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z0-9]([-a-z0-9]){1,11}$").expect("invalid process name regex"));

/// One structured validation failure: field path, offending value, message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl FieldError {
    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        FieldError {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn not_supported(field: impl Into<String>, value: impl Into<String>, allowed: &[String]) -> Self {
        FieldError {
            field: field.into(),
            value: value.into(),
            message: format!("supported values: {}", allowed.join(", ")),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: invalid value \"{}\": {}",
            self.field, self.value, self.message
        )
    }
}

/// Full list of field errors for one rejected write
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// Lowercase a raw derived name and squash characters a DNS label rejects
fn dns_safe(name: &str) -> String {
    name.to_lowercase()
        .replace('_', "-")
        .trim_matches('-')
        .to_string()
}

pub struct AppValidator {
    settings: Settings,
    resolver: Arc<dyn ImageResolver>,
}

impl AppValidator {
    pub fn new(settings: Settings, resolver: Arc<dyn ImageResolver>) -> Self {
        Self { settings, resolver }
    }

    /// Run all rule groups and collect every produced error.
    pub fn validate(&self, app: &AppBundle) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if let Some(err) = self.validate_name(app) {
            errors.push(err);
        }
        if let Some(err) = self.validate_annotations(app) {
            errors.push(err);
        }
        if let Some(err) = self.validate_spec(app) {
            errors.push(err);
        }
        if let Some(err) = self.validate_env_overlay(app) {
            errors.push(err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    fn validate_name(&self, app: &AppBundle) -> Option<FieldError> {
        let name = app.name_any();
        if !APP_NAME_RE.is_match(&name) {
            return Some(FieldError::invalid(
                "metadata.name",
                name,
                format!("must match regex {}", APP_NAME_RE.as_str()),
            ));
        }
        None
    }

    /// The declared name must equal the name derived from the app-code and
    /// module-name annotations.
    fn validate_annotations(&self, app: &AppBundle) -> Option<FieldError> {
        let annotations = app.annotations();

        let Some(code) = annotations.get(annotations::APP_CODE) else {
            return Some(FieldError::invalid(
                "metadata.annotations",
                "",
                format!("missing {}", annotations::APP_CODE),
            ));
        };
        let Some(module) = annotations.get(annotations::MODULE_NAME) else {
            return Some(FieldError::invalid(
                "metadata.annotations",
                "",
                format!("missing {}", annotations::MODULE_NAME),
            ));
        };

        let raw = if module == DEFAULT_MODULE {
            code.clone()
        } else {
            format!("{}-m-{}", code, module)
        };
        let name = app.name_any();
        if name != dns_safe(&raw) {
            return Some(FieldError::invalid(
                "metadata.annotations",
                name.clone(),
                format!(
                    "{} and {} don't match metadata.name {}",
                    annotations::APP_CODE,
                    annotations::MODULE_NAME,
                    name
                ),
            ));
        }
        None
    }

    fn validate_spec(&self, app: &AppBundle) -> Option<FieldError> {
        let processes = &app.spec.processes;
        if processes.is_empty() {
            return Some(FieldError::invalid(
                "spec.processes",
                "",
                "processes can't be empty",
            ));
        }

        if let Some(err) = self.validate_build(app) {
            return Some(err);
        }

        let mut seen = HashSet::new();
        for (idx, process) in processes.iter().enumerate() {
            if let Some(err) = self.validate_process(process, idx) {
                return Some(err);
            }
            if !seen.insert(process.name.as_str()) {
                return Some(FieldError::invalid(
                    "spec.processes",
                    &process.name,
                    format!("process \"{}\" is duplicated", process.name),
                ));
            }
        }

        if !seen.contains(WEB_PROCESS) {
            return Some(FieldError::invalid(
                "spec.processes",
                "",
                format!("\"{}\" process is required", WEB_PROCESS),
            ));
        }

        for (idx, env) in app.spec.configuration.env.iter().enumerate() {
            if env.name.is_empty() {
                return Some(FieldError::invalid(
                    format!("spec.configuration.env[{}].name", idx),
                    "",
                    "name can't be empty",
                ));
            }
        }
        None
    }

    fn validate_build(&self, app: &AppBundle) -> Option<FieldError> {
        let policy = app.spec.build.image_pull_policy.as_deref().unwrap_or("");
        if !self
            .settings
            .allowed_pull_policies
            .iter()
            .any(|p| p == policy)
        {
            return Some(FieldError::not_supported(
                "spec.build.imagePullPolicy",
                policy,
                &self.settings.allowed_pull_policies,
            ));
        }

        for process in &app.spec.processes {
            if self.resolver.resolve(app, &process.name).is_none() {
                return Some(FieldError::invalid(
                    "spec.build",
                    &process.name,
                    format!("image not configured for process {}", process.name),
                ));
            }
        }
        None
    }

    fn validate_process(&self, process: &Process, idx: usize) -> Option<FieldError> {
        let path = format!("spec.processes[{}]", idx);

        if !PROC_NAME_RE.is_match(&process.name) {
            return Some(FieldError::invalid(
                format!("{}.name", path),
                &process.name,
                format!("must match regex {}", PROC_NAME_RE.as_str()),
            ));
        }

        let max = self.settings.max_replicas;
        if let Some(replicas) = process.replicas {
            if replicas > max {
                return Some(FieldError::invalid(
                    format!("{}.replicas", path),
                    replicas.to_string(),
                    format!("at most support {} replicas", max),
                ));
            }
        }

        let plan = process.res_quota_plan.as_deref().unwrap_or("");
        if !self.settings.allowed_quota_plans.iter().any(|p| p == plan) {
            return Some(FieldError::not_supported(
                format!("{}.resQuotaPlan", path),
                plan,
                &self.settings.allowed_quota_plans,
            ));
        }

        if let Some(scaling) = &process.autoscaling {
            if scaling.enabled {
                if scaling.min_replicas <= 0 {
                    return Some(FieldError::invalid(
                        format!("{}.autoscaling.minReplicas", path),
                        scaling.min_replicas.to_string(),
                        "minReplicas must be greater than 0",
                    ));
                }
                if scaling.max_replicas > max {
                    return Some(FieldError::invalid(
                        format!("{}.autoscaling.maxReplicas", path),
                        scaling.max_replicas.to_string(),
                        format!("at most support {} replicas", max),
                    ));
                }
                if scaling.min_replicas > scaling.max_replicas {
                    return Some(FieldError::invalid(
                        format!("{}.autoscaling.maxReplicas", path),
                        scaling.max_replicas.to_string(),
                        "maxReplicas must be greater than or equal to minReplicas",
                    ));
                }
                match scaling.policy.as_deref() {
                    None | Some("") => {
                        return Some(FieldError::invalid(
                            format!("{}.autoscaling.policy", path),
                            "",
                            "autoscaling policy is required",
                        ));
                    }
                    Some(policy)
                        if !self
                            .settings
                            .allowed_scaling_policies
                            .iter()
                            .any(|p| p == policy) =>
                    {
                        return Some(FieldError::not_supported(
                            format!("{}.autoscaling.policy", path),
                            policy,
                            &self.settings.allowed_scaling_policies,
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
        None
    }

    fn validate_env_overlay(&self, app: &AppBundle) -> Option<FieldError> {
        let Some(overlay) = &app.spec.env_overlay else {
            return None;
        };

        let known_env = |name: &str| self.settings.environments.iter().any(|e| e == name);
        let known_process = |name: &str| app.spec.processes.iter().any(|p| p.name == name);
        let max = self.settings.max_replicas;

        for (idx, env) in overlay.env_variables.iter().enumerate() {
            if !known_env(&env.env_name) {
                return Some(FieldError::invalid(
                    format!("spec.envOverlay.envVariables[{}].envName", idx),
                    &env.env_name,
                    "envName is invalid",
                ));
            }
        }

        for (idx, replicas) in overlay.replicas.iter().enumerate() {
            let path = format!("spec.envOverlay.replicas[{}]", idx);
            if !known_env(&replicas.env_name) {
                return Some(FieldError::invalid(
                    format!("{}.envName", path),
                    &replicas.env_name,
                    "envName is invalid",
                ));
            }
            if !known_process(&replicas.process) {
                return Some(FieldError::invalid(
                    format!("{}.process", path),
                    &replicas.process,
                    "process name is invalid",
                ));
            }
            if replicas.count > max {
                return Some(FieldError::invalid(
                    format!("{}.count", path),
                    replicas.count.to_string(),
                    format!("count can't be greater than {}", max),
                ));
            }
        }

        for (idx, scaling) in overlay.autoscaling.iter().enumerate() {
            let path = format!("spec.envOverlay.autoscaling[{}]", idx);
            if !known_env(&scaling.env_name) {
                return Some(FieldError::invalid(
                    format!("{}.envName", path),
                    &scaling.env_name,
                    "envName is invalid",
                ));
            }
            if !known_process(&scaling.process) {
                return Some(FieldError::invalid(
                    format!("{}.process", path),
                    &scaling.process,
                    "process name is invalid",
                ));
            }
            match scaling.policy.as_deref() {
                None | Some("") => {
                    return Some(FieldError::invalid(
                        format!("{}.policy", path),
                        "",
                        "autoscaling policy is required",
                    ));
                }
                Some(policy)
                    if !self
                        .settings
                        .allowed_scaling_policies
                        .iter()
                        .any(|p| p == policy) =>
                {
                    return Some(FieldError::not_supported(
                        format!("{}.policy", path),
                        policy,
                        &self.settings.allowed_scaling_policies,
                    ));
                }
                Some(_) => {}
            }
        }
        None
    }
}
