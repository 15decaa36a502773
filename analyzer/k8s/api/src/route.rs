use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An OpenShift route, exposing a service through the cluster's router.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub host: Option<String>,
    pub path: Option<String>,

    /// The primary backend the route points at.
    pub to: RouteTargetReference,

    /// Additional weighted backends.
    pub alternate_backends: Option<Vec<RouteTargetReference>>,

    pub port: Option<RoutePort>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    #[serde(default)]
    pub kind: String,
    pub name: String,
    pub weight: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    #[schemars(with = "String")]
    pub target_port: IntOrString,
}

// === impl RouteSpec ===

impl RouteSpec {
    /// Iterates over the names of every service this route sends traffic to.
    pub fn backend_names(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(&self.to)
            .chain(self.alternate_backends.iter().flatten())
            .map(|backend| backend.name.as_str())
    }
}
