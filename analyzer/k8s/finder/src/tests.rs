use super::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use topology_analyzer_core::ExposureMode;

const CART: &str = r#"
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
"#;

const CART_SVC: &str = r#"
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
"#;

const FRONTEND: &str = r#"
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
              valueFrom:
                configMapKeyRef:
                  name: addrs
                  key: cart
"#;

const ADDRS: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: addrs
  namespace: shop
data:
  cart: cart:7070
"#;

const ROUTE: &str = r#"
apiVersion: route.openshift.io/v1
kind: Route
metadata:
  name: cart
  namespace: shop
spec:
  to:
    kind: Service
    name: cart
"#;

/// Builds a manifest tree from `(relative path, content)` pairs.
fn mk_tree(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("must create temp dir");
    for (path, content) in files {
        let path = dir.path().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("must create dirs");
        }
        fs::write(&path, content).expect("must write manifest");
    }
    dir
}

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .finish(),
    )
}

fn mk_doc(docs: &[&str]) -> String {
    docs.join("\n---\n")
}

fn config(fail_fast: bool) -> Config {
    Config {
        fail_fast,
        ..Config::default()
    }
}

/// Replays a fixed sequence of visits, ignoring the root.
#[derive(Debug)]
struct ScriptedWalker(Vec<Scripted>);

#[derive(Debug)]
enum Scripted {
    File(PathBuf),
    Failed(PathBuf),
}

impl Walk for ScriptedWalker {
    fn walk(&self, _: &Path, visit: &mut dyn FnMut(Visit<'_>) -> Step) {
        for entry in &self.0 {
            let step = match entry {
                Scripted::File(path) => visit(Visit::File(path)),
                Scripted::Failed(path) => visit(Visit::Failed {
                    path,
                    error: io::ErrorKind::PermissionDenied.into(),
                }),
            };
            if step == Step::Stop {
                return;
            }
        }
    }
}

#[test]
fn finds_resources_across_files() {
    let dir = mk_tree(&[
        ("cart/deploy.yaml", mk_doc(&[CART, CART_SVC]).as_str()),
        ("frontend/deploy.yml", FRONTEND),
        ("frontend/values.yaml", ADDRS),
        ("README.md", "# not a manifest\n"),
    ]);

    let scan = find([dir.path()], config(false));
    assert!(scan.errors.is_empty(), "{:?}", scan.errors);

    let Resources {
        workloads,
        services,
        config_maps,
        ..
    } = scan.resources;
    let names = workloads.iter().map(|w| w.name()).collect::<Vec<_>>();
    assert_eq!(names, vec!["cart", "frontend"]);
    assert_eq!(workloads[0].file_path, Path::new("cart/deploy.yaml"));
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].file_path, Path::new("cart/deploy.yaml"));
    assert!(config_maps.contains_key("shop/addrs"));

    // The config map is declared after the workload referencing it.
    assert_eq!(workloads[1].network_addrs, vec!["cart:7070"]);
    assert!(workloads[1].config_map_key_refs.is_empty());
}

#[test]
fn route_exposes_service_declared_later() {
    let dir = mk_tree(&[("a-route.yaml", ROUTE), ("b-svc.yaml", CART_SVC)]);

    let scan = find([dir.path()], config(false));
    assert_eq!(scan.resources.exposure.get("shop", "cart"), Some(false));

    let mut services = scan.resources.services;
    scan.resources.exposure.apply(&mut services);
    assert!(services[0].exposed_to_cluster);
    assert!(!services[0].exposed_externally);
}

#[test]
fn external_exposure_mode() {
    let dir = mk_tree(&[("svc.yaml", mk_doc(&[ROUTE, CART_SVC]).as_str())]);

    let config = Config {
        exposure_mode: ExposureMode::External,
        ..Config::default()
    };
    let scan = find([dir.path()], config);
    assert_eq!(scan.resources.exposure.get("shop", "cart"), Some(true));
}

#[test]
fn best_effort_collects_every_error() {
    let dir = mk_tree(&[
        ("a.yaml", mk_doc(&[CART, "name: not-a-resource", "kind: Pod\napiVersion: v1"]).as_str()),
        ("b.yaml", mk_doc(&[CART_SVC, "kind: Service\napiVersion: v1\nspec: [oops]"]).as_str()),
        ("c.yaml", mk_doc(&[FRONTEND, "a: [b", ADDRS]).as_str()),
    ]);

    let _tracing = init_tracing();
    let scan = find([dir.path()], config(false));
    assert!(!scan.is_stopped());
    let kinds = scan
        .errors
        .iter()
        .map(|e| match e.kind() {
            ErrorKind::NotK8sResource(_) => "not-k8s",
            ErrorKind::ScanResource { .. } => "scan",
            ErrorKind::MalformedYaml(_) => "malformed",
            ErrorKind::ConfigMapNotFound { .. } => "cm-not-found",
            _ => "other",
        })
        .collect::<Vec<_>>();
    // The malformed document hides the config map that follows it.
    assert_eq!(kinds, vec!["not-k8s", "scan", "malformed", "cm-not-found"]);
    assert!(scan.fatal_error().is_none());

    let malformed = &scan.errors[2];
    assert!(malformed.is_severe());
    assert_eq!(malformed.location().file.as_deref(), Some(Path::new("c.yaml")));
    assert_eq!(malformed.location().document, Some(1));

    let names = scan
        .resources
        .workloads
        .iter()
        .map(|w| w.name())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["cart", "frontend"]);
    assert_eq!(scan.resources.services.len(), 1);
}

#[test]
fn fail_fast_returns_first_error_only() {
    let dir = mk_tree(&[
        ("a.yaml", CART),
        ("b.yaml", mk_doc(&[CART_SVC, "name: not-a-resource"]).as_str()),
        ("c.yaml", "a: [b"),
    ]);

    let scan = find([dir.path()], config(true));
    assert!(scan.is_stopped());
    assert_eq!(scan.errors.len(), 1);
    assert!(matches!(scan.errors[0].kind(), ErrorKind::NotK8sResource(_)));
    assert!(scan.resources.workloads.is_empty());
    assert!(scan.resources.services.is_empty());
    assert!(scan.resources.exposure.is_empty());
}

#[test]
fn fail_fast_stops_on_unresolved_config_map() {
    let dir = mk_tree(&[("frontend.yaml", FRONTEND)]);

    let scan = find([dir.path()], config(true));
    assert_eq!(scan.errors.len(), 1);
    assert!(matches!(
        scan.errors[0].kind(),
        ErrorKind::ConfigMapNotFound { .. }
    ));
    assert!(scan.resources.workloads.is_empty());
}

#[test]
fn missing_root_is_fatal() {
    let dir = mk_tree(&[]);
    let missing = dir.path().join("missing");

    let _tracing = init_tracing();

    // Fatal errors stop processing even when not failing fast.
    let scan = find([missing.as_path(), dir.path()], config(false));
    assert_eq!(scan.errors.len(), 1);
    let err = scan.fatal_error().expect("error must be fatal");
    assert!(err.is_severe());
    assert!(matches!(err.kind(), ErrorKind::AccessDir(_)));
    assert!(scan.resources.workloads.is_empty());
}

#[test]
fn inaccessible_subdirectory_is_skipped() {
    let dir = mk_tree(&[("cart.yaml", mk_doc(&[CART, CART_SVC]).as_str())]);
    let root = dir.path().to_path_buf();
    let walker = ScriptedWalker(vec![
        Scripted::Failed(root.join("private")),
        Scripted::File(root.join("cart.yaml")),
        Scripted::File(root.join("notes.txt")),
    ]);
    let config = Config {
        walker: Arc::new(walker),
        ..Config::default()
    };

    let scan = find([&root], config);
    assert_eq!(scan.errors.len(), 1);
    let err = &scan.errors[0];
    assert!(!err.is_fatal());
    assert!(err.is_severe());
    assert_eq!(err.location().file.as_deref(), Some(Path::new("private")));
    assert_eq!(scan.resources.workloads.len(), 1);
    assert_eq!(scan.resources.services.len(), 1);
}

#[test]
fn unreadable_file_is_severe() {
    let dir = mk_tree(&[("cart.yaml", CART)]);
    let root = dir.path().to_path_buf();
    let walker = ScriptedWalker(vec![
        Scripted::File(root.join("gone.yaml")),
        Scripted::File(root.join("cart.yaml")),
    ]);
    let config = Config {
        walker: Arc::new(walker),
        ..Config::default()
    };

    let scan = find([&root], config);
    assert_eq!(scan.errors.len(), 1);
    assert!(matches!(scan.errors[0].kind(), ErrorKind::ReadFile(_)));
    assert!(scan.errors[0].is_severe());
    assert_eq!(scan.resources.workloads.len(), 1);
}

#[test]
fn empty_tree_reports_nothing_found() {
    let dir = mk_tree(&[("notes.txt", "hello")]);

    let scan = find([dir.path()], config(false));
    let errors = scan
        .errors
        .iter()
        .map(|e| e.kind().to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        errors,
        vec!["no yaml files found", "no relevant Kubernetes resources found"]
    );
    assert!(scan.errors.iter().all(|e| !e.is_fatal() && !e.is_severe()));
}

#[test]
fn single_file_root() {
    let dir = mk_tree(&[("cart.yaml", mk_doc(&[CART, "name: x"]).as_str())]);
    let file = dir.path().join("cart.yaml");

    let scan = find([&file], config(false));
    assert_eq!(scan.resources.workloads.len(), 1);
    assert_eq!(scan.resources.workloads[0].file_path, Path::new("cart.yaml"));
    assert_eq!(
        scan.errors[0].location().file.as_deref(),
        Some(Path::new("cart.yaml"))
    );
}

#[test]
fn multiple_roots_share_resolution() {
    let cfg = mk_tree(&[("addrs.yaml", ADDRS)]);
    let apps = mk_tree(&[("frontend.yaml", FRONTEND)]);

    let scan = find([apps.path(), cfg.path()], config(true));
    assert!(scan.errors.is_empty(), "{:?}", scan.errors);
    assert_eq!(scan.resources.workloads[0].network_addrs, vec!["cart:7070"]);
}

#[test]
fn legacy_api_versions_are_scanned() {
    let legacy = CART.replace("apps/v1", "apps/v1beta2");
    let dir = mk_tree(&[("cart.yaml", mk_doc(&[legacy.as_str(), CART_SVC]).as_str())]);

    let scan = find([dir.path()], config(true));
    assert!(scan.errors.is_empty(), "{:?}", scan.errors);
    assert_eq!(scan.resources.workloads.len(), 1);
    assert_eq!(scan.resources.workloads[0].name(), "cart");
    assert_eq!(scan.resources.services.len(), 1);
}
