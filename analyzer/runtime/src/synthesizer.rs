use crate::Synthesizer;
use std::{path::Path, sync::Arc};
use topology_analyzer_core::{discover_connections, Connection, ExposureMode};
use topology_analyzer_k8s_api::NetworkPolicy;
use topology_analyzer_k8s_finder::{self as finder, FsWalker, ProcessingError, Resources, Walk};
use tracing::info;

/// Runs the whole analysis over manifest trees: finds resources, resolves config map references,
/// applies exposure, discovers connections and, optionally, synthesizes policies.
#[derive(Clone, Debug)]
pub struct PoliciesSynthesizer {
    fail_fast: bool,
    walker: Arc<dyn Walk + Send + Sync>,
    exposure_mode: ExposureMode,
    dns_port: Option<u16>,
}

/// The output of an analysis, along with every error encountered.
///
/// The output is empty if processing stopped.
#[derive(Debug)]
pub struct Outcome<T> {
    pub output: Vec<T>,
    pub errors: Vec<ProcessingError>,
}

// === impl PoliciesSynthesizer ===

impl Default for PoliciesSynthesizer {
    fn default() -> Self {
        Self {
            fail_fast: false,
            walker: Arc::new(FsWalker::default()),
            exposure_mode: ExposureMode::default(),
            dns_port: Some(Synthesizer::DEFAULT_DNS_PORT),
        }
    }
}

impl PoliciesSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops at the first error instead of collecting as many results as possible.
    pub fn with_fail_fast(self, fail_fast: bool) -> Self {
        Self { fail_fast, ..self }
    }

    pub fn with_walker(self, walker: Arc<dyn Walk + Send + Sync>) -> Self {
        Self { walker, ..self }
    }

    pub fn with_exposure_mode(self, exposure_mode: ExposureMode) -> Self {
        Self {
            exposure_mode,
            ..self
        }
    }

    /// Sets the port on which synthesized policies allow DNS egress; `None` omits the rule.
    pub fn with_dns_port(self, dns_port: Option<u16>) -> Self {
        Self { dns_port, ..self }
    }

    pub fn connections_from_paths<P: AsRef<Path>>(
        &self,
        paths: impl IntoIterator<Item = P>,
    ) -> Outcome<Connection> {
        let (output, errors) = match self.scan(paths) {
            Ok((resources, errors)) => (connections(resources), errors),
            Err(errors) => (Vec::new(), errors),
        };
        info!(connections = output.len(), errors = errors.len(), "Analyzed");
        Outcome { output, errors }
    }

    pub fn policies_from_paths<P: AsRef<Path>>(
        &self,
        paths: impl IntoIterator<Item = P>,
    ) -> Outcome<NetworkPolicy> {
        let (output, errors) = match self.scan(paths) {
            Ok((resources, errors)) => {
                let connections = connections(resources);
                let policies = Synthesizer::new(self.dns_port).synthesize(&connections);
                (policies, errors)
            }
            Err(errors) => (Vec::new(), errors),
        };
        info!(policies = output.len(), errors = errors.len(), "Synthesized");
        Outcome { output, errors }
    }

    /// Returns the resources found under `paths`, or only the errors if processing stopped.
    fn scan<P: AsRef<Path>>(
        &self,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<(Resources, Vec<ProcessingError>), Vec<ProcessingError>> {
        let config = finder::Config {
            fail_fast: self.fail_fast,
            exposure_mode: self.exposure_mode,
            walker: self.walker.clone(),
        };
        let scan = finder::find(paths, config);
        if scan.is_stopped() {
            return Err(scan.errors);
        }
        Ok((scan.resources, scan.errors))
    }
}

fn connections(resources: Resources) -> Vec<Connection> {
    let Resources {
        mut workloads,
        mut services,
        exposure,
        ..
    } = resources;
    exposure.apply(&mut services);
    discover_connections(&mut workloads, &services)
}

// === impl Outcome ===

impl<T> Outcome<T> {
    /// Returns the first fatal error, if any: the output must not be used.
    pub fn fatal_error(&self) -> Option<&ProcessingError> {
        self.errors.iter().find(|e| e.is_fatal())
    }

    /// Returns true if any error may have caused connections to be missed.
    pub fn has_severe_errors(&self) -> bool {
        self.errors.iter().any(|e| e.is_severe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use topology_analyzer_k8s_finder::ErrorKind;

    const SHOP: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: cart
  namespace: shop
spec:
  selector:
    matchLabels:
      app: cart
  template:
    metadata:
      labels:
        app: cart
    spec:
      containers:
        - name: server
          image: cart:1.0
---
apiVersion: v1
kind: Service
metadata:
  name: cart
  namespace: shop
spec:
  selector:
    app: cart
  ports:
    - port: 7070
      targetPort: 8080
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: frontend
  namespace: shop
spec:
  selector:
    matchLabels:
      app: frontend
  template:
    metadata:
      labels:
        app: frontend
    spec:
      containers:
        - name: server
          image: frontend:1.0
          env:
            - name: CART_ADDR
              value: http://cart:7070
---
apiVersion: v1
kind: Service
metadata:
  name: frontend
  namespace: shop
spec:
  selector:
    app: frontend
  ports:
    - port: 80
      targetPort: 8080
---
apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: frontend
  namespace: shop
spec:
  defaultBackend:
    service:
      name: frontend
      port:
        number: 80
"#;

    fn mk_tree(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("must create temp dir");
        fs::write(dir.path().join("shop.yaml"), content).expect("must write manifest");
        dir
    }

    #[test]
    fn discovers_connections() {
        let dir = mk_tree(SHOP);
        let outcome = PoliciesSynthesizer::new().connections_from_paths([dir.path()]);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

        let edges = outcome
            .output
            .iter()
            .map(|c| {
                (
                    c.source.as_ref().map(|s| s.name().to_string()),
                    c.target.name().to_string(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            edges,
            vec![
                (Some("frontend".to_string()), "cart".to_string()),
                (None, "frontend".to_string()),
            ]
        );
        // The ingress exposes the frontend to the cluster.
        assert!(outcome.output[1].link.exposed_to_cluster);
    }

    #[test]
    fn synthesizes_policies() {
        let dir = mk_tree(SHOP);
        let outcome = PoliciesSynthesizer::new()
            .with_dns_port(None)
            .policies_from_paths([dir.path()]);
        assert!(outcome.fatal_error().is_none());

        let names = outcome
            .output
            .iter()
            .map(|p| p.metadata.name.clone().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["cart-netpol", "frontend-netpol"]);
    }

    #[test]
    fn fail_fast_discards_output() {
        let dir = mk_tree(&format!("{}\n---\nname: not-a-resource\n", SHOP));

        let outcome = PoliciesSynthesizer::new()
            .with_fail_fast(true)
            .connections_from_paths([dir.path()]);
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.fatal_error().is_none());
        assert!(!outcome.has_severe_errors());

        let outcome = PoliciesSynthesizer::new().connections_from_paths([dir.path()]);
        assert_eq!(outcome.output.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn missing_path_is_fatal() {
        let dir = mk_tree(SHOP);
        let outcome =
            PoliciesSynthesizer::new().policies_from_paths([dir.path().join("missing")]);
        assert!(outcome.output.is_empty());
        let err = outcome.fatal_error().expect("error must be fatal");
        assert!(matches!(err.kind(), ErrorKind::AccessDir(_)));
    }
}
