// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::constants::annotations;

/// Declarative description of a multi-process application. The admission
/// webhook defaults and validates every write; the reconcilers derive all
/// child resources from it.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "drover.geeko.me", version = "v1", kind = "AppBundle")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct AppBundleSpec {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub processes: Vec<Process>,
    #[serde(default)]
    pub configuration: AppConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_overlay: Option<EnvOverlay>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Image shared by all processes of this bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Unset until the mutating webhook fills it in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i32>,
    /// Unset is distinct from zero, so this stays optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res_quota_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<Autoscaling>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Autoscaling {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub min_replicas: i32,
    #[serde(default)]
    pub max_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub env: Vec<AppEnvVar>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppEnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Per-environment overrides; every entry references the base process set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvOverlay {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_variables: Vec<EnvVarOverlay>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<ReplicasOverlay>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub autoscaling: Vec<AutoscalingOverlay>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarOverlay {
    pub env_name: String,
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplicasOverlay {
    pub env_name: String,
    pub process: String,
    #[serde(default)]
    pub count: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingOverlay {
    pub env_name: String,
    pub process: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl AppBundle {
    /// Names of all declared processes, in declaration order
    pub fn process_names(&self) -> Vec<String> {
        self.spec.processes.iter().map(|p| p.name.clone()).collect()
    }

    pub fn app_code(&self) -> Option<String> {
        self.annotations().get(annotations::APP_CODE).cloned()
    }

    pub fn module_name(&self) -> Option<String> {
        self.annotations().get(annotations::MODULE_NAME).cloned()
    }
}
