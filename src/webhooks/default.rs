// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Defaulting engine for AppBundle specs.
//!
//! Only fields observed as unset are filled, so re-applying to an already
//! defaulted spec is a no-op. Runs before validation on create and update,
//! never on delete.

use crate::constants::defaults;
use crate::types::AppBundleSpec;

pub fn apply_defaults(spec: &mut AppBundleSpec) {
    if spec.build.image_pull_policy.is_none() {
        spec.build.image_pull_policy = Some(defaults::IMAGE_PULL_POLICY.to_string());
    }

    for process in &mut spec.processes {
        if process.target_port.is_none() {
            process.target_port = Some(defaults::TARGET_PORT);
        }
        if process.res_quota_plan.is_none() {
            process.res_quota_plan = Some(defaults::QUOTA_PLAN.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildConfig, Process};

    fn make_spec() -> AppBundleSpec {
        AppBundleSpec {
            processes: vec![Process {
                name: "web".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_fills_unset_fields() {
        let mut spec = make_spec();
        apply_defaults(&mut spec);

        assert_eq!(
            spec.build.image_pull_policy.as_deref(),
            Some("IfNotPresent")
        );
        assert_eq!(spec.processes[0].target_port, Some(5000));
        assert_eq!(spec.processes[0].res_quota_plan.as_deref(), Some("default"));
    }

    #[test]
    fn test_preserves_set_fields() {
        let mut spec = AppBundleSpec {
            build: BuildConfig {
                image: None,
                image_pull_policy: Some("Always".to_string()),
            },
            processes: vec![Process {
                name: "web".to_string(),
                target_port: Some(8080),
                res_quota_plan: Some("large".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        apply_defaults(&mut spec);

        assert_eq!(spec.build.image_pull_policy.as_deref(), Some("Always"));
        assert_eq!(spec.processes[0].target_port, Some(8080));
        assert_eq!(spec.processes[0].res_quota_plan.as_deref(), Some("large"));
    }

    #[test]
    fn test_does_not_touch_replicas() {
        let mut spec = make_spec();
        apply_defaults(&mut spec);

        assert_eq!(spec.processes[0].replicas, None);
    }

    #[test]
    fn test_idempotent() {
        let mut once = make_spec();
        apply_defaults(&mut once);

        let mut twice = once.clone();
        apply_defaults(&mut twice);

        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }
}
