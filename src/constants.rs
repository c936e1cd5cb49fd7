// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys used by drover
pub mod annotations {
    /// Application code the bundle name is derived from
    pub const APP_CODE: &str = "drover.geeko.me/app-code";
    /// Module name; "default" is the default module
    pub const MODULE_NAME: &str = "drover.geeko.me/module-name";
}

/// Label keys applied to every child resource of an AppBundle
pub mod labels {
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const APP_NAME: &str = "drover.geeko.me/app-name";
    pub const PROCESS_NAME: &str = "drover.geeko.me/process-name";
}

/// The operator name used in managed-by labels
pub const OPERATOR_NAME: &str = "drover";

/// Module name that maps to the bare app code
pub const DEFAULT_MODULE: &str = "default";

/// Process name every bundle must declare
pub const WEB_PROCESS: &str = "web";

/// Port a child Service exposes for each process
pub const SERVICE_PORT: i32 = 80;

/// Defaults filled in by the mutating webhook
pub mod defaults {
    pub const TARGET_PORT: i32 = 5000;
    pub const QUOTA_PLAN: &str = "default";
    pub const IMAGE_PULL_POLICY: &str = "IfNotPresent";
    pub const MAX_REPLICAS: i32 = 5;
}

/// Requeue delays for reconciliation retries
pub mod requeue {
    /// Delay after a transient store error
    pub const TRANSIENT_SECS: u64 = 30;
    /// Delay used by the controller error policy
    pub const ERROR_SECS: u64 = 60;
}
