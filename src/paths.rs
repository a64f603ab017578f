//! Path normalisation between file URIs, absolute paths, and
//! project-relative paths.
//!
//! All in-memory processing works with absolute paths so the same file
//! compares equal regardless of where it came from; everything stored in the
//! graph is project-relative. Paths that escape the project root are
//! rejected with [`PathError::OutsideProject`] and filtered by callers.

use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("not a file:// URI: {0}")]
    NotFileUri(String),

    #[error("path escapes the project root: {}", .0.display())]
    OutsideProject(PathBuf),
}

/// Path conversions rooted at one project directory.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Root is canonicalised when it exists so URI-derived paths compare
    /// against a stable form.
    pub fn new(root: &Path) -> Self {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_str(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    pub fn project_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Project".to_string())
    }

    /// Decode a `file://` URI into an absolute path.
    pub fn uri_to_abs(&self, uri: &str) -> Result<PathBuf, PathError> {
        let url = Url::parse(uri).map_err(|_| PathError::NotFileUri(uri.to_string()))?;
        if url.scheme() != "file" {
            return Err(PathError::NotFileUri(uri.to_string()));
        }
        url.to_file_path()
            .map_err(|_| PathError::NotFileUri(uri.to_string()))
    }

    pub fn is_within_project(&self, abs: &Path) -> bool {
        abs.starts_with(&self.root)
    }

    /// Relativise an absolute path against the project root.
    ///
    /// The result never contains `..`; external paths are the error case.
    pub fn abs_to_rel(&self, abs: &Path) -> Result<PathBuf, PathError> {
        abs.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| PathError::OutsideProject(abs.to_path_buf()))
    }

    /// URI → project-relative path, in one step.
    pub fn uri_to_rel(&self, uri: &str) -> Result<PathBuf, PathError> {
        let abs = self.uri_to_abs(uri)?;
        self.abs_to_rel(&abs)
    }

    /// Graph-property form of a relative path (`/`-separated).
    pub fn rel_str(rel: &Path) -> String {
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        parts.join("/")
    }

    /// Ancestor folders of a relative file path, nearest first. The empty
    /// root component is excluded.
    pub fn ancestor_folders(rel: &Path) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        let mut parent = rel.parent();
        while let Some(p) = parent {
            if p.as_os_str().is_empty() {
                break;
            }
            folders.push(p.to_path_buf());
            parent = p.parent();
        }
        folders
    }
}
