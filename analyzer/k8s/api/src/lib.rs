#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod manifest;
pub mod route;

pub use self::{
    labels::Labels,
    manifest::{Manifest, TypeMeta, WorkloadParts},
    route::{Route, RouteSpec, RouteTargetReference},
};
pub use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        batch::v1::Job,
        core::v1::{
            ConfigMap, Container, PodSpec, PodTemplateSpec, ReplicationController, Service,
            ServicePort, ServiceSpec,
        },
        networking::v1::{
            Ingress, IngressBackend, NetworkPolicy, NetworkPolicyEgressRule,
            NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec,
        },
    },
    apimachinery::pkg::{
        apis::meta::v1::{LabelSelector, ObjectMeta},
        util::intstr::IntOrString,
    },
    List,
};
