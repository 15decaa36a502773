//! Finds the Kubernetes resources relevant to connectivity analysis in manifest files.
//!
//! A scan proceeds in stages, each of which may record errors:
//!
//! - YAML files are located under each root (`walk`);
//! - each file is split into its documents (`documents`);
//! - each document is decoded and, if its kind is relevant, turned into a workload, service or
//!   config map record, or into exposure recorded from a Route or Ingress (`scan`);
//! - once every root is scanned, workloads' config map references are resolved into addresses
//!   (`resolve`).
//!
//! ```text
//! [ root ] -> [ file ] -> [ document ] -> [ Workload | Service | ConfigMap | Exposure ]
//! ```
//!
//! Errors are values carrying two severity bits. In fail-fast mode, the first error stops the
//! scan; otherwise only fatal errors do. A stopped scan returns no resources.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod documents;
mod error;
mod finder;
mod resolve;
mod scan;
pub mod walk;

#[cfg(test)]
mod tests;

pub use self::{
    error::{ErrorKind, Location, ProcessingError, Stop},
    finder::{find, Config, ResourceFinder, Resources, Scan},
    walk::{FsWalker, Step, Visit, Walk},
};
