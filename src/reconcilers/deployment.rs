// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployment reconciler - converges one Deployment per declared process.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{
    api::{DeleteParams, ListParams, ObjectMeta, PostParams},
    Api, Client, ResourceExt,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::constants::defaults;
use crate::error::{DroverError, Result};
use crate::images::ImageResolver;
use crate::reconcilers::{ReconcileResult, Reconciler};
use crate::resources;
use crate::types::{AppBundle, Process};

pub struct DeploymentReconciler {
    client: Client,
    resolver: Arc<dyn ImageResolver>,
}

impl DeploymentReconciler {
    pub fn new(client: Client, resolver: Arc<dyn ImageResolver>) -> Self {
        Self { client, resolver }
    }

    fn api(&self, app: &AppBundle) -> Api<Deployment> {
        let namespace = app.namespace().unwrap_or_default();
        Api::namespaced(self.client.clone(), &namespace)
    }

    /// Desired Deployments: one per declared process. Fails when a process
    /// has no resolvable image, which validation is supposed to rule out.
    fn wanted_deployments(&self, app: &AppBundle) -> Result<Vec<Deployment>> {
        app.spec
            .processes
            .iter()
            .map(|process| {
                let image = self.resolver.resolve(app, &process.name).ok_or_else(|| {
                    DroverError::Invariant(format!(
                        "no image resolved for admitted process {}",
                        process.name
                    ))
                })?;
                Ok(build_deployment(app, process, image))
            })
            .collect()
    }

    async fn list_current(&self, app: &AppBundle) -> Result<Vec<Deployment>> {
        let params = ListParams::default().labels(&resources::app_selector(app));
        Ok(self.api(app).list(&params).await?.items)
    }
}

#[async_trait]
impl Reconciler for DeploymentReconciler {
    fn kind(&self) -> &'static str {
        "Deployment"
    }

    async fn reconcile(&self, app: &AppBundle) -> ReconcileResult {
        let desired = match self.wanted_deployments(app) {
            Ok(deployments) if deployments.is_empty() => {
                // validation guarantees at least one process
                return ReconcileResult::Abort(DroverError::Invariant(format!(
                    "AppBundle {} produced no desired Deployments",
                    app.name_any()
                )));
            }
            Ok(deployments) => deployments,
            Err(e) => return ReconcileResult::Abort(e),
        };

        let observed = match self.list_current(app).await {
            Ok(deployments) => deployments,
            Err(e) => return ReconcileResult::transient(e),
        };

        let api = self.api(app);
        let namespace = app.namespace().unwrap_or_default();

        for want in &desired {
            let name = want.name_any();
            match observed.iter().find(|current| current.name_any() == name) {
                None => {
                    info!("Creating Deployment {}/{}", namespace, name);
                    if let Err(e) = api.create(&PostParams::default(), want).await {
                        return ReconcileResult::transient(e);
                    }
                }
                Some(current) if deployment_differs(current, want) => {
                    info!("Updating Deployment {}/{}", namespace, name);
                    let mut updated = want.clone();
                    updated.metadata.resource_version = current.metadata.resource_version.clone();
                    if let Err(e) = api.replace(&name, &PostParams::default(), &updated).await {
                        return ReconcileResult::transient(e);
                    }
                }
                Some(_) => {}
            }
        }

        for current in &observed {
            let name = current.name_any();
            if !desired.iter().any(|want| want.name_any() == name) {
                info!("Deleting orphaned Deployment {}/{}", namespace, name);
                if let Err(e) = api.delete(&name, &DeleteParams::default()).await {
                    return ReconcileResult::transient(e);
                }
            }
        }

        ReconcileResult::Continue
    }
}

fn build_deployment(app: &AppBundle, process: &Process, image: String) -> Deployment {
    let labels = resources::process_labels(app, &process.name);
    let target_port = process.target_port.unwrap_or(defaults::TARGET_PORT);
    let plan = process.res_quota_plan.as_deref().unwrap_or(defaults::QUOTA_PLAN);

    Deployment {
        metadata: ObjectMeta {
            name: Some(resources::child_name(app, &process.name)),
            namespace: app.namespace(),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(process.replicas.unwrap_or(1)),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: process.name.clone(),
                        image: Some(image),
                        image_pull_policy: app.spec.build.image_pull_policy.clone(),
                        ports: Some(vec![ContainerPort {
                            container_port: target_port,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        resources: Some(quota_requirements(plan)),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Cpu/memory limits for a resource quota plan
fn quota_requirements(plan: &str) -> ResourceRequirements {
    let (cpu, memory) = match plan {
        "small" => ("1", "512Mi"),
        "medium" => ("2", "1Gi"),
        "large" => ("4", "2Gi"),
        _ => ("500m", "256Mi"),
    };

    ResourceRequirements {
        limits: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])),
        ..Default::default()
    }
}

/// Compare only the fields the desired computation owns: replicas and the
/// container image, pull policy, ports and resources.
fn deployment_differs(current: &Deployment, want: &Deployment) -> bool {
    let current_spec = current.spec.as_ref();
    let want_spec = want.spec.as_ref();

    if current_spec.and_then(|s| s.replicas) != want_spec.and_then(|s| s.replicas) {
        return true;
    }

    let current_containers = current_spec
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| p.containers.as_slice())
        .unwrap_or_default();
    let want_containers = want_spec
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| p.containers.as_slice())
        .unwrap_or_default();

    containers_differ(current_containers, want_containers)
}

fn containers_differ(current: &[Container], want: &[Container]) -> bool {
    current.len() != want.len()
        || current.iter().zip(want).any(|(c, w)| {
            c.name != w.name
                || c.image != w.image
                || c.image_pull_policy != w.image_pull_policy
                || c.ports != w.ports
                || c.resources != w.resources
        })
}
