// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deterministic names and label sets for child resources of an AppBundle.
//!
//! Pure functions only. Both the reconcilers and their tests derive child
//! identity from here, so two calls with the same inputs must always agree.

use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::constants::{labels, OPERATOR_NAME};
use crate::types::AppBundle;

/// Name of the child resource owned by one process of an app
pub fn child_name(app: &AppBundle, process: &str) -> String {
    format!("{}--{}", app.name_any(), process)
}

/// Labels selecting every child resource of one app
pub fn app_labels(app: &AppBundle) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
        (labels::APP_NAME.to_string(), app.name_any()),
    ])
}

/// Labels selecting the children of one process of one app
pub fn process_labels(app: &AppBundle, process: &str) -> BTreeMap<String, String> {
    let mut set = app_labels(app);
    set.insert(labels::PROCESS_NAME.to_string(), process.to_string());
    set
}

/// Label selector string for listing all children of one app
pub fn app_selector(app: &AppBundle) -> String {
    app_labels(app)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
