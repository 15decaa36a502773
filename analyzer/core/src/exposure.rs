//! Service exposure implied by Routes and Ingresses.
//!
//! Exposure is computed in two phases. While manifests are scanned, every service targeted by a
//! Route or Ingress is recorded in an [`ExposureBuilder`]. A service may be declared before or
//! after the resources that expose it, so the recorded intent can only be applied once scanning
//! has finished: the builder is turned into an [`ExposureIntent`], which is consumed by
//! [`ExposureIntent::apply`].

use crate::Service;
use std::collections::HashMap;
use tracing::debug;

/// How a Route or Ingress exposes the services it targets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExposureMode {
    /// Targeted services become reachable from any namespace in the cluster.
    #[default]
    Internal,

    /// Targeted services become reachable from outside the cluster.
    External,
}

/// Records exposure while manifests are being scanned.
#[derive(Debug, Default)]
pub struct ExposureBuilder {
    mode: ExposureMode,
    by_ns: HashMap<String, HashMap<String, bool>>,
}

/// The exposure recorded over a complete scan: namespace -> service name -> whether the service is
/// exposed externally (otherwise, to the cluster).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExposureIntent {
    by_ns: HashMap<String, HashMap<String, bool>>,
}

// === impl ExposureMode ===

impl std::str::FromStr for ExposureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            s => Err(format!("invalid exposure mode: {}", s)),
        }
    }
}

// === impl ExposureBuilder ===

impl ExposureBuilder {
    pub fn new(mode: ExposureMode) -> Self {
        Self {
            mode,
            by_ns: HashMap::default(),
        }
    }

    /// Records that `service` in namespace `ns` is targeted by a Route or Ingress.
    pub fn expose(&mut self, ns: &str, service: &str) {
        let external = self.mode == ExposureMode::External;
        self.by_ns
            .entry(ns.to_string())
            .or_default()
            .insert(service.to_string(), external);
    }

    pub fn build(self) -> ExposureIntent {
        ExposureIntent { by_ns: self.by_ns }
    }
}

// === impl ExposureIntent ===

impl ExposureIntent {
    /// Returns the recorded exposure of a service: `Some(true)` if exposed externally,
    /// `Some(false)` if exposed to the cluster.
    pub fn get(&self, ns: &str, service: &str) -> Option<bool> {
        self.by_ns.get(ns)?.get(service).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ns.values().all(HashMap::is_empty)
    }

    /// Widens the exposure of every recorded service. Services that no Route or Ingress targets
    /// keep their type-derived exposure.
    pub fn apply(self, services: &mut [Service]) {
        for svc in services.iter_mut() {
            match self.get(svc.namespace(), svc.name()) {
                Some(true) => {
                    debug!(service = %svc.id(), "Exposing service externally");
                    svc.exposed_externally = true;
                }
                Some(false) => {
                    debug!(service = %svc.id(), "Exposing service to the cluster");
                    svc.exposed_to_cluster = true;
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceId;

    fn svc(ns: &str, name: &str, ty: Option<&str>) -> Service {
        Service::new(ResourceId::new("Service", ns, name), ty.map(String::from))
    }

    #[test]
    fn internal_mode_exposes_to_cluster() {
        let mut builder = ExposureBuilder::default();
        builder.expose("shop", "checkout");
        let intent = builder.build();
        assert_eq!(intent.get("shop", "checkout"), Some(false));

        let mut services = vec![svc("shop", "checkout", None)];
        intent.apply(&mut services);
        assert!(services[0].exposed_to_cluster);
        assert!(!services[0].exposed_externally);
    }

    #[test]
    fn external_mode_exposes_externally() {
        let mut builder = ExposureBuilder::new(ExposureMode::External);
        builder.expose("shop", "checkout");
        let mut services = vec![svc("shop", "checkout", None)];
        builder.build().apply(&mut services);
        assert!(services[0].exposed_externally);
        assert!(!services[0].exposed_to_cluster);
    }

    #[test]
    fn unexposed_services_keep_defaults() {
        let mut builder = ExposureBuilder::default();
        builder.expose("shop", "checkout");
        let mut services = vec![
            svc("shop", "cart", Some("LoadBalancer")),
            svc("other", "checkout", None),
        ];
        builder.build().apply(&mut services);
        assert!(services[0].exposed_externally);
        assert!(!services[0].exposed_to_cluster);
        assert!(!services[1].exposed_externally);
        assert!(!services[1].exposed_to_cluster);
    }

    #[test]
    fn parses_modes() {
        assert_eq!("internal".parse(), Ok(ExposureMode::Internal));
        assert_eq!("external".parse(), Ok(ExposureMode::External));
        assert!("public".parse::<ExposureMode>().is_err());
    }
}
