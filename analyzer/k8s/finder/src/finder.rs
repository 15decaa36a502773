use crate::{
    documents::{self, Document},
    error::{Errors, ProcessingError, Stop},
    resolve::resolve_config_maps,
    scan::Records,
    walk::{self, FsWalker, Walk},
};
use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::Arc,
};
use topology_analyzer_core::{ConfigMap, ExposureIntent, ExposureMode, Service, Workload};
use topology_analyzer_k8s_api::{Manifest, TypeMeta};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct Config {
    /// Stop at the first error, discarding everything found so far.
    pub fail_fast: bool,

    pub exposure_mode: ExposureMode,

    pub walker: Arc<dyn Walk + Send + Sync>,
}

/// Finds the resources relevant to connectivity analysis in one or more filesystem roots.
///
/// Roots are scanned one after the other with [`ResourceFinder::scan`]; the collected resources
/// are only available from [`ResourceFinder::finish`], once config map references have been
/// resolved and the exposure recorded from Routes and Ingresses is complete.
#[derive(Debug)]
pub struct ResourceFinder {
    walker: Arc<dyn Walk + Send + Sync>,
    records: Records,
    errors: Errors,
    stopped: bool,
}

/// Everything found by a [`ResourceFinder`].
#[derive(Debug, Default)]
pub struct Resources {
    pub workloads: Vec<Workload>,
    pub services: Vec<Service>,
    pub config_maps: HashMap<String, ConfigMap>,
    pub exposure: ExposureIntent,
}

#[derive(Debug)]
pub struct Scan {
    /// Empty if processing was stopped.
    pub resources: Resources,
    pub errors: Vec<ProcessingError>,
    stopped: bool,
}

/// Scans every root in `paths`.
pub fn find<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>, config: Config) -> Scan {
    let mut finder = ResourceFinder::new(config);
    for path in paths {
        if finder.scan(path.as_ref()).is_err() {
            break;
        }
    }
    finder.finish()
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        Self {
            fail_fast: false,
            exposure_mode: ExposureMode::default(),
            walker: Arc::new(FsWalker::default()),
        }
    }
}

// === impl ResourceFinder ===

impl ResourceFinder {
    pub fn new(config: Config) -> Self {
        Self {
            walker: config.walker,
            records: Records::new(config.exposure_mode),
            errors: Errors::new(config.fail_fast),
            stopped: false,
        }
    }

    /// Scans the manifests under `root`, which may be a directory or a single file.
    ///
    /// Once this returns an error, processing has stopped and further calls do nothing.
    pub fn scan(&mut self, root: &Path) -> Result<(), Stop> {
        if self.stopped {
            return Err(Stop::new());
        }
        let res = self.scan_root(root);
        self.stopped = res.is_err();
        res
    }

    fn scan_root(&mut self, root: &Path) -> Result<(), Stop> {
        debug!(root = %root.display(), "Scanning");
        let files = walk::locate(&*self.walker, root, &mut self.errors)?;
        if files.is_empty() {
            return self.errors.push(ProcessingError::no_yamls_found());
        }

        for file in &files {
            let rel = walk::relative(root, file);
            let src = match fs::read_to_string(file) {
                Ok(src) => src,
                Err(error) => {
                    self.errors.push(ProcessingError::read_file(rel, error))?;
                    continue;
                }
            };
            self.scan_file(&rel, &src)?;
        }
        Ok(())
    }

    fn scan_file(&mut self, rel: &Path, src: &str) -> Result<(), Stop> {
        for doc in documents::split(rel, src) {
            match doc {
                Ok(doc) => self.scan_document(rel, doc)?,
                Err(error) => self.errors.push(error)?,
            }
        }
        Ok(())
    }

    fn scan_document(&mut self, rel: &Path, doc: Document) -> Result<(), Stop> {
        let Document { index, value, .. } = doc;

        let meta = match TypeMeta::from_value(&value) {
            Ok(meta) => meta,
            Err(error) => {
                return self
                    .errors
                    .push(ProcessingError::not_k8s_resource(rel, index, error))
            }
        };
        let parse = match Manifest::parser(&meta.kind) {
            Some(parse) => parse,
            None => {
                info!(
                    file = %rel.display(),
                    document = index,
                    kind = %meta.kind,
                    "Skipping unsupported kind"
                );
                return Ok(());
            }
        };

        match parse(value) {
            Ok(manifest) => {
                self.records.insert(manifest, rel);
                Ok(())
            }
            Err(error) => self
                .errors
                .push(ProcessingError::scan_resource(meta.kind, rel, index, error)),
        }
    }

    /// Completes the scan: checks that something was found and resolves config map references.
    ///
    /// If processing was stopped, no resources are returned.
    pub fn finish(mut self) -> Scan {
        let res = if self.stopped {
            Err(Stop::new())
        } else {
            self.complete()
        };

        let stopped = res.is_err();
        let resources = match res {
            Ok(()) => Resources {
                workloads: self.records.workloads,
                services: self.records.services,
                config_maps: self.records.config_maps,
                exposure: self.records.exposure.build(),
            },
            Err(_) => Resources::default(),
        };
        debug!(
            workloads = resources.workloads.len(),
            services = resources.services.len(),
            errors = self.errors.len(),
            "Scan complete"
        );
        Scan {
            resources,
            errors: self.errors.into_vec(),
            stopped,
        }
    }

    fn complete(&mut self) -> Result<(), Stop> {
        if self.records.is_empty() {
            self.errors.push(ProcessingError::no_k8s_resources_found())?;
        }
        resolve_config_maps(
            &mut self.records.workloads,
            &self.records.config_maps,
            &mut self.errors,
        )
    }
}

// === impl Scan ===

impl Scan {
    /// Returns true if processing stopped before completing, either on a fatal error or on the
    /// first error when failing fast.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Returns the first fatal error, if any.
    pub fn fatal_error(&self) -> Option<&ProcessingError> {
        self.errors.iter().find(|e| e.is_fatal())
    }
}
