// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Service reconciler - converges one Service per declared process.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{
    api::{DeleteParams, ListParams, ObjectMeta, PostParams},
    Api, Client, ResourceExt,
};
use tracing::info;

use crate::constants::{defaults, SERVICE_PORT};
use crate::error::{DroverError, Result};
use crate::reconcilers::{ReconcileResult, Reconciler};
use crate::resources;
use crate::types::{AppBundle, Process};

pub struct ServiceReconciler {
    client: Client,
}

impl ServiceReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, app: &AppBundle) -> Api<Service> {
        let namespace = app.namespace().unwrap_or_default();
        Api::namespaced(self.client.clone(), &namespace)
    }

    /// Desired Services: one per declared process
    fn wanted_services(&self, app: &AppBundle) -> Vec<Service> {
        app.spec
            .processes
            .iter()
            .map(|process| build_service(app, process))
            .collect()
    }

    /// Observed Services carrying this app's labels
    async fn list_current(&self, app: &AppBundle) -> Result<Vec<Service>> {
        let params = ListParams::default().labels(&resources::app_selector(app));
        Ok(self.api(app).list(&params).await?.items)
    }
}

#[async_trait]
impl Reconciler for ServiceReconciler {
    fn kind(&self) -> &'static str {
        "Service"
    }

    async fn reconcile(&self, app: &AppBundle) -> ReconcileResult {
        let desired = self.wanted_services(app);
        if desired.is_empty() {
            // validation guarantees at least one process
            return ReconcileResult::Abort(DroverError::Invariant(format!(
                "AppBundle {} produced no desired Services",
                app.name_any()
            )));
        }

        let observed = match self.list_current(app).await {
            Ok(services) => services,
            Err(e) => return ReconcileResult::transient(e),
        };

        let api = self.api(app);
        let namespace = app.namespace().unwrap_or_default();

        for want in &desired {
            let name = want.name_any();
            match observed.iter().find(|current| current.name_any() == name) {
                None => {
                    info!("Creating Service {}/{}", namespace, name);
                    if let Err(e) = api.create(&PostParams::default(), want).await {
                        return ReconcileResult::transient(e);
                    }
                }
                Some(current) if service_differs(current, want) => {
                    info!("Updating Service {}/{}", namespace, name);
                    let mut updated = want.clone();
                    preserve_runtime_fields(current, &mut updated);
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
                info!("Deleting orphaned Service {}/{}", namespace, name);
                if let Err(e) = api.delete(&name, &DeleteParams::default()).await {
                    return ReconcileResult::transient(e);
                }
            }
        }

        ReconcileResult::Continue
    }
}

fn build_service(app: &AppBundle, process: &Process) -> Service {
    let labels = resources::process_labels(app, &process.name);
    let target_port = process.target_port.unwrap_or(defaults::TARGET_PORT);

    Service {
        metadata: ObjectMeta {
            name: Some(resources::child_name(app, &process.name)),
            namespace: app.namespace(),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(target_port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Only selector and ports are owned by the desired computation; drift in
/// any other field never triggers an update.
fn service_differs(current: &Service, want: &Service) -> bool {
    let current_spec = current.spec.as_ref();
    let want_spec = want.spec.as_ref();

    current_spec.and_then(|s| s.selector.as_ref()) != want_spec.and_then(|s| s.selector.as_ref())
        || current_spec.and_then(|s| s.ports.as_ref()) != want_spec.and_then(|s| s.ports.as_ref())
}

/// Keep fields the cluster assigns when replacing a Service
fn preserve_runtime_fields(current: &Service, updated: &mut Service) {
    updated.metadata.resource_version = current.metadata.resource_version.clone();
    if let (Some(current_spec), Some(updated_spec)) = (current.spec.as_ref(), updated.spec.as_mut())
    {
        updated_spec.cluster_ip = current_spec.cluster_ip.clone();
        updated_spec.cluster_ips = current_spec.cluster_ips.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::annotations;
    use crate::test_utils::{list_json, status_ok_json, MockService};
    use crate::types::{AppBundleSpec, BuildConfig};
    use std::collections::BTreeMap;

    fn make_process(name: &str, target_port: i32) -> Process {
        Process {
            name: name.to_string(),
            target_port: Some(target_port),
            ..Default::default()
        }
    }

    fn make_app(processes: Vec<Process>) -> AppBundle {
        AppBundle {
            metadata: ObjectMeta {
                name: Some("sample".to_string()),
                namespace: Some("default".to_string()),
                annotations: Some(BTreeMap::from([
                    (annotations::APP_CODE.to_string(), "sample".to_string()),
                    (annotations::MODULE_NAME.to_string(), "default".to_string()),
                ])),
                ..Default::default()
            },
            spec: AppBundleSpec {
                build: BuildConfig {
                    image: Some("nginx:latest".to_string()),
                    image_pull_policy: Some("IfNotPresent".to_string()),
                },
                processes,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_wanted_services_one_per_process() {
        let app = make_app(vec![make_process("web", 8000), make_process("worker", 9000)]);
        let reconciler = ServiceReconciler::new(MockService::new().into_client());

        let wanted = reconciler.wanted_services(&app);

        assert_eq!(wanted.len(), 2);
        assert_eq!(wanted[0].name_any(), "sample--web");
        assert_eq!(wanted[1].name_any(), "sample--worker");
    }

    #[test]
    fn test_build_service_shape() {
        let app = make_app(vec![make_process("web", 8000)]);
        let service = build_service(&app, &app.spec.processes[0]);

        let spec = service.spec.as_ref().unwrap();
        let port = &spec.ports.as_ref().unwrap()[0];
        assert_eq!(port.port, SERVICE_PORT);
        assert_eq!(port.target_port, Some(IntOrString::Int(8000)));
        assert_eq!(
            spec.selector.as_ref().unwrap().get("drover.geeko.me/process-name"),
            Some(&"web".to_string())
        );
        assert_eq!(
            service.metadata.labels.as_ref().unwrap().get("drover.geeko.me/app-name"),
            Some(&"sample".to_string())
        );
    }

    #[test]
    fn test_unset_target_port_uses_default() {
        let app = make_app(vec![Process {
            name: "web".to_string(),
            ..Default::default()
        }]);
        let service = build_service(&app, &app.spec.processes[0]);

        let spec = service.spec.as_ref().unwrap();
        assert_eq!(
            spec.ports.as_ref().unwrap()[0].target_port,
            Some(IntOrString::Int(defaults::TARGET_PORT))
        );
    }

    #[test]
    fn test_differs_on_owned_fields_only() {
        let app = make_app(vec![make_process("web", 8000)]);
        let want = build_service(&app, &app.spec.processes[0]);

        let mut same = want.clone();
        // runtime-owned drift must not trigger an update
        same.spec.as_mut().unwrap().cluster_ip = Some("10.0.0.1".to_string());
        same.metadata.resource_version = Some("42".to_string());
        assert!(!service_differs(&same, &want));

        let mut changed_selector = want.clone();
        changed_selector
            .spec
            .as_mut()
            .unwrap()
            .selector
            .as_mut()
            .unwrap()
            .insert("extra".to_string(), "label".to_string());
        assert!(service_differs(&changed_selector, &want));

        let mut changed_port = want.clone();
        changed_port.spec.as_mut().unwrap().ports.as_mut().unwrap()[0].target_port =
            Some(IntOrString::Int(9999));
        assert!(service_differs(&changed_port, &want));
    }

    #[test]
    fn test_update_preserves_cluster_assigned_fields() {
        let app = make_app(vec![make_process("web", 8000)]);
        let mut current = build_service(&app, &app.spec.processes[0]);
        current.spec.as_mut().unwrap().cluster_ip = Some("10.0.0.1".to_string());
        current.metadata.resource_version = Some("42".to_string());

        let mut updated = build_service(&app, &app.spec.processes[0]);
        preserve_runtime_fields(&current, &mut updated);

        assert_eq!(updated.spec.unwrap().cluster_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_reconcile_creates_missing_service() {
        let app = make_app(vec![make_process("web", 8000)]);
        let created = build_service(&app, &app.spec.processes[0]);

        let mock = MockService::new()
            .on_get(
                "/api/v1/namespaces/default/services",
                200,
                &list_json("ServiceList", &[]),
            )
            .on_post(
                "/api/v1/namespaces/default/services",
                201,
                &serde_json::to_string(&created).unwrap(),
            );

        let reconciler = ServiceReconciler::new(mock.clone().into_client());
        let result = reconciler.reconcile(&app).await;

        assert!(!result.should_abort());
        let requests = mock.requests();
        assert!(requests.contains(&(
            "POST".to_string(),
            "/api/v1/namespaces/default/services".to_string()
        )));
    }

    #[tokio::test]
    async fn test_reconcile_converged_takes_no_action() {
        let app = make_app(vec![make_process("web", 8000)]);
        let existing = build_service(&app, &app.spec.processes[0]);

        let mock = MockService::new().on_get(
            "/api/v1/namespaces/default/services",
            200,
            &list_json(
                "ServiceList",
                &[serde_json::to_value(&existing).unwrap()],
            ),
        );

        let reconciler = ServiceReconciler::new(mock.clone().into_client());
        let result = reconciler.reconcile(&app).await;

        assert!(!result.should_abort());
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "GET");
    }

    #[tokio::test]
    async fn test_reconcile_deletes_orphan() {
        let mut app = make_app(vec![make_process("web", 8000), make_process("worker", 9000)]);
        let web = build_service(&app, &app.spec.processes[0]);
        let orphan = build_service(&app, &app.spec.processes[1]);
        app.spec.processes.truncate(1);

        let mock = MockService::new()
            .on_get(
                "/api/v1/namespaces/default/services",
                200,
                &list_json(
                    "ServiceList",
                    &[
                        serde_json::to_value(&web).unwrap(),
                        serde_json::to_value(&orphan).unwrap(),
                    ],
                ),
            )
            .on_delete(
                "/api/v1/namespaces/default/services/sample--worker",
                200,
                &status_ok_json(),
            );

        let reconciler = ServiceReconciler::new(mock.clone().into_client());
        let result = reconciler.reconcile(&app).await;

        assert!(!result.should_abort());
        let requests = mock.requests();
        let deletes: Vec<_> = requests.iter().filter(|(m, _)| m == "DELETE").collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(
            deletes[0].1,
            "/api/v1/namespaces/default/services/sample--worker"
        );
    }

    #[tokio::test]
    async fn test_reconcile_no_processes_aborts() {
        let app = make_app(vec![]);
        let reconciler = ServiceReconciler::new(MockService::new().into_client());

        let result = reconciler.reconcile(&app).await;

        assert!(matches!(result, ReconcileResult::Abort(_)));
    }

    #[tokio::test]
    async fn test_reconcile_list_failure_requeues() {
        // no list response registered, the mock answers 404
        let app = make_app(vec![make_process("web", 8000)]);
        let reconciler = ServiceReconciler::new(MockService::new().into_client());

        let result = reconciler.reconcile(&app).await;

        assert!(matches!(result, ReconcileResult::RequeueAfter(_, _)));
    }
}
