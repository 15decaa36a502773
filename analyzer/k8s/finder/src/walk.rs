use crate::error::{Errors, ProcessingError, Stop};
use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, trace};

/// Traverses a directory tree, reporting every entry to a visitor.
///
/// Implementations must visit `root` itself first; the visitor controls how traversal proceeds.
pub trait Walk: std::fmt::Debug {
    fn walk(&self, root: &Path, visit: &mut dyn FnMut(Visit<'_>) -> Step);
}

#[derive(Debug)]
pub enum Visit<'p> {
    File(&'p Path),
    Dir(&'p Path),
    Failed { path: &'p Path, error: io::Error },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Continue,

    /// Do not descend into the directory just visited. Ignored for other entries.
    SkipDir,

    Stop,
}

/// Walks the filesystem in file-name order.
#[derive(Clone, Debug, Default)]
pub struct FsWalker(());

// === impl FsWalker ===

impl Walk for FsWalker {
    fn walk(&self, root: &Path, visit: &mut dyn FnMut(Visit<'_>) -> Step) {
        let mut entries = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let step = match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    match visit(Visit::Dir(entry.path())) {
                        Step::SkipDir => {
                            entries.skip_current_dir();
                            Step::Continue
                        }
                        step => step,
                    }
                }
                Ok(entry) => visit(Visit::File(entry.path())),
                Err(error) => {
                    let path = error.path().unwrap_or(root).to_path_buf();
                    let error = error
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                    visit(Visit::Failed {
                        path: &path,
                        error,
                    })
                }
            };
            if step == Step::Stop {
                return;
            }
        }
    }
}

/// Returns true if `path` names a YAML file.
pub fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Lists the YAML files under `root`, in traversal order.
///
/// Failing to access `root` is fatal; failing to access anything below it only skips that branch.
pub(crate) fn locate(
    walker: &dyn Walk,
    root: &Path,
    errors: &mut Errors,
) -> Result<Vec<PathBuf>, Stop> {
    let mut files = Vec::new();
    let mut result = Ok(());

    walker.walk(root, &mut |visit| match visit {
        Visit::File(path) => {
            if is_yaml(path) {
                trace!(path = %path.display(), "Found YAML file");
                files.push(path.to_path_buf());
            }
            Step::Continue
        }
        Visit::Dir(_) => Step::Continue,
        Visit::Failed { path, error } => {
            let is_root = path == root;
            let err = ProcessingError::access_dir(relative(root, path), error, is_root);
            match errors.push(err) {
                Ok(()) => Step::SkipDir,
                Err(stop) => {
                    result = Err(stop);
                    Step::Stop
                }
            }
        }
    });

    result?;
    debug!(root = %root.display(), files = files.len(), "Located manifests");
    Ok(files)
}

/// Formats `path` relative to the scanned `root`: the bare file name when `root` is the file
/// itself, the full path when it lies outside of `root`.
pub(crate) fn relative(root: &Path, path: &Path) -> PathBuf {
    if path == root {
        return match (root.is_file(), path.file_name()) {
            (true, Some(name)) => PathBuf::from(name),
            _ => path.to_path_buf(),
        };
    }
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}
