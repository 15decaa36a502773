//! Topology Analyzer core
//!
//! Infers which workloads talk to which, given the records extracted from a set of manifests:
//!
//! - A `Service` fronts every workload whose pod-template labels contain all of the service's
//!   selectors.
//! - A workload calls a service when one of its discovered network addresses (an environment
//!   value, a container argument or a value inlined from a `ConfigMap`) is exactly the service's
//!   `name:port` endpoint.
//!
//! ```text
//! [ caller ] --(name:port)--> [ Service ] --(selectors)--> [ workload ]
//! ```
//!
//! Routes and Ingresses don't produce edges of their own; they widen the exposure of the services
//! they point at (see [`ExposureIntent`]).

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod addr;
pub mod connections;
pub mod exposure;
mod resource;
pub mod selector;

pub use self::{
    addr::is_network_address,
    connections::{discover_connections, Connection},
    exposure::{ExposureBuilder, ExposureIntent, ExposureMode},
    resource::{
        ConfigMap, ConfigMapKeyRef, ResourceId, Service, ServicePort, TargetPort, Workload,
    },
    selector::are_selectors_contained,
};
