use std::{collections::HashMap, path::Path};
use topology_analyzer_core::{
    is_network_address, ConfigMap, ConfigMapKeyRef, ExposureBuilder, ExposureMode, ResourceId,
    Service, ServicePort, TargetPort, Workload,
};
use topology_analyzer_k8s_api::{
    self as k8s, labels, Container, IntOrString, Labels, Manifest, ObjectMeta, Route,
    WorkloadParts,
};
use tracing::debug;

/// Accumulates the records extracted from decoded manifests.
#[derive(Debug)]
pub(crate) struct Records {
    pub workloads: Vec<Workload>,
    pub services: Vec<Service>,

    /// Indexed by `namespace/name`.
    pub config_maps: HashMap<String, ConfigMap>,

    pub exposure: ExposureBuilder,
}

// === impl Records ===

impl Records {
    pub fn new(mode: ExposureMode) -> Self {
        Self {
            workloads: Vec::new(),
            services: Vec::new(),
            config_maps: HashMap::new(),
            exposure: ExposureBuilder::new(mode),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty() && self.services.is_empty()
    }

    /// Records a decoded manifest, read from `file`.
    pub fn insert(&mut self, manifest: Manifest, file: &Path) {
        if let Some(parts) = manifest.workload_parts() {
            let mut workload = workload(parts);
            workload.file_path = file.to_path_buf();
            debug!(workload = %workload.id(), addrs = workload.network_addrs.len(), "Scanned");
            self.workloads.push(workload);
            return;
        }

        match manifest {
            Manifest::Service(svc) => {
                let mut svc = service(svc);
                svc.file_path = file.to_path_buf();
                debug!(service = %svc.id(), "Scanned");
                self.services.push(svc);
            }
            Manifest::ConfigMap(cm) => {
                let cm = config_map(cm);
                debug!(configmap = %cm.full_name, entries = cm.data.len(), "Scanned");
                self.config_maps.insert(cm.full_name.clone(), cm);
            }
            Manifest::Route(route) => self.expose_route(&route),
            Manifest::Ingress(ingress) => self.expose_ingress(&ingress),
            _ => {}
        }
    }

    fn expose_route(&mut self, route: &Route) {
        let ns = namespace(&route.metadata);
        for name in route.spec.backend_names() {
            debug!(ns, service = name, "Exposed by route");
            self.exposure.expose(ns, name);
        }
    }

    fn expose_ingress(&mut self, ingress: &k8s::Ingress) {
        let ns = namespace(&ingress.metadata);
        let spec = match ingress.spec.as_ref() {
            Some(spec) => spec,
            None => return,
        };

        let default = spec.default_backend.iter();
        let paths = spec
            .rules
            .iter()
            .flatten()
            .filter_map(|rule| rule.http.as_ref())
            .flat_map(|http| http.paths.iter().map(|path| &path.backend));
        for backend in default.chain(paths) {
            if let Some(svc) = backend.service.as_ref() {
                debug!(ns, service = %svc.name, "Exposed by ingress");
                self.exposure.expose(ns, &svc.name);
            }
        }
    }
}

fn namespace(meta: &ObjectMeta) -> &str {
    meta.namespace.as_deref().unwrap_or_default()
}

fn workload(parts: WorkloadParts<'_>) -> Workload {
    let WorkloadParts {
        kind,
        metadata,
        template,
    } = parts;
    let id = ResourceId::new(
        kind,
        namespace(metadata),
        metadata.name.clone().unwrap_or_default(),
    );
    let labels = template
        .and_then(|t| t.metadata.as_ref())
        .map(|m| Labels::from(m.labels.clone()))
        .unwrap_or_default();

    let mut workload = Workload::new(id, labels);
    let spec = match template.and_then(|t| t.spec.as_ref()) {
        Some(spec) => spec,
        None => return workload,
    };
    workload.service_account_name = spec.service_account_name.clone();
    for container in &spec.containers {
        scan_container(&mut workload, container);
    }
    workload
}

/// Collects the addresses and config map references of a container.
fn scan_container(workload: &mut Workload, container: &Container) {
    if container.image.is_some() {
        workload.image = container.image.clone();
    }

    for env in container.env.iter().flatten() {
        match env.value.as_deref() {
            Some(value) if !value.is_empty() => {
                if is_network_address(value) {
                    workload.network_addrs.push(value.to_string());
                }
            }
            _ => {
                let key_ref = env
                    .value_from
                    .as_ref()
                    .and_then(|from| from.config_map_key_ref.as_ref());
                if let Some(key_ref) = key_ref {
                    let name = key_ref.name.as_deref().unwrap_or_default();
                    if !name.is_empty() && !key_ref.key.is_empty() {
                        workload.config_map_key_refs.push(ConfigMapKeyRef {
                            name: name.to_string(),
                            key: key_ref.key.clone(),
                        });
                    }
                }
            }
        }
    }

    for env_from in container.env_from.iter().flatten() {
        if let Some(cm_ref) = env_from.config_map_ref.as_ref() {
            workload
                .config_map_refs
                .push(cm_ref.name.clone().unwrap_or_default());
        }
    }

    for arg in container.args.iter().flatten() {
        if is_network_address(arg) {
            workload.network_addrs.push(arg.clone());
        }
    }
}

fn service(svc: k8s::Service) -> Service {
    let k8s::Service { metadata, spec, .. } = svc;
    let id = ResourceId::new(
        "Service",
        namespace(&metadata),
        metadata.name.clone().unwrap_or_default(),
    );
    let spec = spec.unwrap_or_default();

    let mut svc = Service::new(id, spec.type_);
    svc.selectors = spec
        .selector
        .as_ref()
        .map(labels::flatten)
        .unwrap_or_default()
        .into_iter()
        .collect();
    svc.ports = spec
        .ports
        .into_iter()
        .flatten()
        .map(|port| ServicePort {
            port: port.port,
            target_port: port.target_port.map(|tp| match tp {
                IntOrString::Int(n) => TargetPort::Number(n),
                IntOrString::String(name) => TargetPort::Name(name),
            }),
            protocol: port
                .protocol
                .unwrap_or_else(|| ServicePort::DEFAULT_PROTOCOL.to_string()),
        })
        .collect();
    svc
}

fn config_map(cm: k8s::ConfigMap) -> ConfigMap {
    let full_name = ConfigMap::full_name(
        namespace(&cm.metadata),
        cm.metadata.name.as_deref().unwrap_or_default(),
    );
    let data = cm
        .data
        .into_iter()
        .flatten()
        .filter(|(_, value)| is_network_address(value))
        .collect();
    ConfigMap { full_name, data }
}
