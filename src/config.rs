// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;

use crate::constants::defaults;

/// Read-only snapshot of the cluster-wide policy the validator and
/// reconcilers are constructed with. Tests supply their own fixture.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Upper bound on declared (and overlay) replica counts
    pub max_replicas: i32,
    pub allowed_pull_policies: Vec<String>,
    pub allowed_quota_plans: Vec<String>,
    pub allowed_scaling_policies: Vec<String>,
    /// Environment names an overlay entry may reference
    pub environments: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_replicas: defaults::MAX_REPLICAS,
            allowed_pull_policies: vec![
                "Always".to_string(),
                "IfNotPresent".to_string(),
                "Never".to_string(),
            ],
            allowed_quota_plans: vec![
                "default".to_string(),
                "small".to_string(),
                "medium".to_string(),
                "large".to_string(),
            ],
            allowed_scaling_policies: vec!["default".to_string()],
            environments: vec!["stag".to_string(), "prod".to_string()],
        }
    }
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the admission webhook listens on
    pub webhook_addr: SocketAddr,
    pub settings: Settings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let webhook_addr = env::var("DROVER_WEBHOOK_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()
            .context("DROVER_WEBHOOK_ADDR is not a valid socket address")?;

        let mut settings = Settings::default();
        if let Ok(v) = env::var("DROVER_MAX_REPLICAS") {
            settings.max_replicas = v
                .parse()
                .context("DROVER_MAX_REPLICAS is not a valid integer")?;
        }

        Ok(Config {
            webhook_addr,
            settings,
        })
    }
}
