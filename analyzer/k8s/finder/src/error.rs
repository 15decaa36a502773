use std::{fmt, io, path::PathBuf};
use tracing::{error, warn};

/// An error encountered while locating, splitting or scanning manifests.
///
/// Every error carries as much location as is known, and two independent severity bits:
///
/// - a *fatal* error means the analysis output must not be used;
/// - a *severe* error means the output is usable, but some connections may be missing or wrong.
///
/// Errors are logged once, when they are created.
#[derive(Debug)]
pub struct ProcessingError {
    kind: ErrorKind,
    location: Location,
    fatal: bool,
    severe: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("no yaml files found")]
    NoYamlsFound,

    #[error("no relevant Kubernetes resources found")]
    NoK8sResourcesFound,

    #[error("error accessing directory")]
    AccessDir(#[source] io::Error),

    #[error("error reading file")]
    ReadFile(#[source] io::Error),

    #[error("YAML document is malformed")]
    MalformedYaml(#[source] serde_yaml::Error),

    #[error("YAML document is not a Kubernetes resource")]
    NotK8sResource(#[source] serde_yaml::Error),

    #[error("error scanning {kind} resource")]
    ScanResource {
        kind: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configmap {config_map} not found (referenced by {workload})")]
    ConfigMapNotFound { config_map: String, workload: String },

    #[error("configmap {config_map} does not have key {key} (referenced by {workload})")]
    ConfigMapKeyNotFound {
        config_map: String,
        key: String,
        workload: String,
    },
}

/// Where an error originates from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub file: Option<PathBuf>,

    /// 1-based.
    pub line: Option<usize>,

    /// 0-based, counting every document in the file.
    pub document: Option<usize>,
}

/// Signals that processing must stop, either because a fatal error occurred or because the first
/// error occurred in fail-fast mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stop(());

/// Accumulates errors, deciding after each one whether processing may continue.
#[derive(Debug, Default)]
pub struct Errors {
    fail_fast: bool,
    errors: Vec<ProcessingError>,
}

// === impl ProcessingError ===

impl ProcessingError {
    fn new(kind: ErrorKind, location: Location, fatal: bool, severe: bool) -> Self {
        let err = Self {
            kind,
            location,
            fatal,
            severe,
        };
        let source = std::error::Error::source(&err.kind).map(ToString::to_string);
        if fatal || severe {
            error!(fatal, error = source.as_deref(), "{}", err);
        } else {
            warn!(error = source.as_deref(), "{}", err);
        }
        err
    }

    pub fn no_yamls_found() -> Self {
        Self::new(ErrorKind::NoYamlsFound, Location::default(), false, false)
    }

    pub fn no_k8s_resources_found() -> Self {
        Self::new(
            ErrorKind::NoK8sResourcesFound,
            Location::default(),
            false,
            false,
        )
    }

    /// Fails to access a directory. Failing to access the scanned root is fatal.
    pub fn access_dir(path: impl Into<PathBuf>, error: io::Error, is_root: bool) -> Self {
        Self::new(
            ErrorKind::AccessDir(error),
            Location::file(path),
            is_root,
            true,
        )
    }

    pub fn read_file(path: impl Into<PathBuf>, error: io::Error) -> Self {
        Self::new(ErrorKind::ReadFile(error), Location::file(path), false, true)
    }

    pub fn malformed_yaml(
        path: impl Into<PathBuf>,
        line: usize,
        document: usize,
        error: serde_yaml::Error,
    ) -> Self {
        let location = Location {
            line: Some(line),
            document: Some(document),
            ..Location::file(path)
        };
        Self::new(ErrorKind::MalformedYaml(error), location, false, true)
    }

    pub fn not_k8s_resource(
        path: impl Into<PathBuf>,
        document: usize,
        error: serde_yaml::Error,
    ) -> Self {
        let location = Location {
            document: Some(document),
            ..Location::file(path)
        };
        Self::new(ErrorKind::NotK8sResource(error), location, false, false)
    }

    pub fn scan_resource(
        kind: impl Into<String>,
        path: impl Into<PathBuf>,
        document: usize,
        error: serde_yaml::Error,
    ) -> Self {
        let location = Location {
            document: Some(document),
            ..Location::file(path)
        };
        Self::new(
            ErrorKind::ScanResource {
                kind: kind.into(),
                source: error,
            },
            location,
            false,
            false,
        )
    }

    pub fn config_map_not_found(
        config_map: String,
        workload: String,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            ErrorKind::ConfigMapNotFound {
                config_map,
                workload,
            },
            Location::file(path),
            false,
            false,
        )
    }

    pub fn config_map_key_not_found(
        config_map: String,
        key: String,
        workload: String,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            ErrorKind::ConfigMapKeyNotFound {
                config_map,
                key,
                workload,
            },
            Location::file(path),
            false,
            false,
        )
    }

    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    #[inline]
    pub fn is_severe(&self) -> bool {
        self.severe
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.file.is_some() {
            write!(f, "{} ", self.location)?;
        }
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for ProcessingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

// === impl Location ===

impl Location {
    fn file(path: impl Into<PathBuf>) -> Self {
        let file = Some(path.into()).filter(|p| !p.as_os_str().is_empty());
        Self {
            file,
            ..Default::default()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = match self.file.as_ref() {
            Some(file) => file,
            None => return Ok(()),
        };
        write!(f, "in file: {}", file.display())?;
        if let Some(line) = self.line {
            write!(f, ", line: {}", line)?;
        }
        if let Some(document) = self.document {
            write!(f, ", document: {}", document)?;
        }
        Ok(())
    }
}

// === impl Stop ===

impl Stop {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

// === impl Errors ===

impl Errors {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            fail_fast,
            errors: Vec::new(),
        }
    }

    /// Records an error. Processing must stop if the error is fatal or if running in fail-fast
    /// mode.
    pub fn push(&mut self, error: ProcessingError) -> Result<(), Stop> {
        let stop = self.fail_fast || error.is_fatal();
        self.errors.push(error);
        if stop {
            return Err(Stop::new());
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_vec(self) -> Vec<ProcessingError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml_error() -> serde_yaml::Error {
        serde_yaml::from_str::<serde_yaml::Value>("a: [b").unwrap_err()
    }

    #[test]
    fn severities() {
        let err = ProcessingError::access_dir("manifests", io::ErrorKind::NotFound.into(), true);
        assert!(err.is_fatal());
        assert!(err.is_severe());

        let err = ProcessingError::access_dir("manifests/sub", io::ErrorKind::NotFound.into(), false);
        assert!(!err.is_fatal());
        assert!(err.is_severe());

        let err = ProcessingError::malformed_yaml("a.yaml", 3, 1, yaml_error());
        assert!(!err.is_fatal());
        assert!(err.is_severe());

        let err = ProcessingError::not_k8s_resource("a.yaml", 0, yaml_error());
        assert!(!err.is_fatal());
        assert!(!err.is_severe());

        let err = ProcessingError::no_yamls_found();
        assert!(!err.is_fatal());
        assert!(!err.is_severe());
    }

    #[test]
    fn displays_location() {
        let err = ProcessingError::malformed_yaml("a.yaml", 3, 1, yaml_error());
        assert_eq!(
            err.to_string(),
            "in file: a.yaml, line: 3, document: 1 YAML document is malformed"
        );
        assert_eq!(err.location().line, Some(3));
        assert_eq!(err.location().document, Some(1));

        let err = ProcessingError::config_map_not_found("shop/cfg".into(), "cart".into(), "");
        assert_eq!(
            err.to_string(),
            "configmap shop/cfg not found (referenced by cart)"
        );
        assert_eq!(err.location(), &Location::default());
    }

    #[test]
    fn fail_fast_stops_on_first_error() {
        let mut errors = Errors::new(true);
        assert!(errors.push(ProcessingError::no_yamls_found()).is_err());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn best_effort_stops_on_fatal_errors_only() {
        let mut errors = Errors::new(false);
        assert!(errors.push(ProcessingError::no_yamls_found()).is_ok());
        assert!(errors
            .push(ProcessingError::access_dir("sub", io::ErrorKind::PermissionDenied.into(), false))
            .is_ok());
        assert!(errors
            .push(ProcessingError::access_dir("root", io::ErrorKind::NotFound.into(), true))
            .is_err());
        assert_eq!(errors.len(), 3);
    }
}
