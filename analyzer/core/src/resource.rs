use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::PathBuf,
};
use topology_analyzer_k8s_api::Labels;

/// Identifies a resource by kind, namespace and name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// A pod-owning resource, as far as connectivity is concerned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    #[serde(flatten)]
    id: ResourceId,

    /// The pod-template labels.
    pub labels: Labels,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Values from the pod spec that may be addresses of other workloads' services.
    pub network_addrs: Vec<String>,

    /// Names of config maps whose entries are all loaded into the environment.
    #[serde(skip)]
    pub config_map_refs: Vec<String>,

    /// Single config map entries loaded into the environment.
    #[serde(skip)]
    pub config_map_key_refs: Vec<ConfigMapKeyRef>,

    #[serde(rename = "filepath")]
    pub file_path: PathBuf,

    /// The ports through which this workload is reached by the discovered connections.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub used_ports: BTreeSet<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapKeyRef {
    pub name: String,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(flatten)]
    id: ResourceId,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    /// Flattened `key:value` selectors.
    pub selectors: Vec<String>,

    pub ports: Vec<ServicePort>,

    /// Reachable from outside the cluster.
    pub exposed_externally: bool,

    /// Reachable from any namespace within the cluster.
    pub exposed_to_cluster: bool,

    #[serde(rename = "filepath")]
    pub file_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub port: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<TargetPort>,

    pub protocol: String,
}

/// References a pod's port by number or by name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum TargetPort {
    Number(i32),
    Name(String),
}

/// The network-address entries of a config map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigMap {
    /// `namespace/name`
    pub full_name: String,
    pub data: BTreeMap<String, String>,
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

// === impl Workload ===

impl Workload {
    pub fn new(id: ResourceId, labels: Labels) -> Self {
        Self {
            id,
            labels,
            service_account_name: None,
            image: None,
            network_addrs: Vec::new(),
            config_map_refs: Vec::new(),
            config_map_key_refs: Vec::new(),
            file_path: PathBuf::new(),
            used_ports: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.id.name
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.id.namespace
    }
}

// === impl Service ===

impl Service {
    /// Creates a service with its type-derived exposure: `LoadBalancer` and `NodePort` services
    /// are reachable from outside the cluster.
    pub fn new(id: ResourceId, service_type: Option<String>) -> Self {
        let exposed_externally = matches!(
            service_type.as_deref(),
            Some("LoadBalancer") | Some("NodePort")
        );
        Self {
            id,
            service_type,
            selectors: Vec::new(),
            ports: Vec::new(),
            exposed_externally,
            exposed_to_cluster: false,
            file_path: PathBuf::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.id.name
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.id.namespace
    }
}

// === impl ServicePort ===

impl ServicePort {
    pub const DEFAULT_PROTOCOL: &'static str = "TCP";

    /// The port targeted on the service's pods: the target port if set, the service port
    /// otherwise.
    pub fn pod_port(&self) -> TargetPort {
        self.target_port
            .clone()
            .unwrap_or(TargetPort::Number(self.port))
    }
}

impl fmt::Display for TargetPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPort::Number(n) => fmt::Display::fmt(n, f),
            TargetPort::Name(n) => fmt::Display::fmt(n, f),
        }
    }
}

// === impl ConfigMap ===

impl ConfigMap {
    pub fn full_name(namespace: &str, name: &str) -> String {
        format!("{}/{}", namespace, name)
    }
}
