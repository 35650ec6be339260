use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

/// Supplies the text of `#include`d sources.
///
/// Both lookups are synchronous and block the compile that asked for them.
pub trait IncludeResolver {
    /// Used for `#include "url"`.
    fn fetch_url(&self, url: &str) -> Result<String, IncludeError>;

    /// Used for `#include <name>`.
    fn resolve_library(&self, name: &str) -> Result<String, IncludeError>;
}

#[derive(thiserror::Error, Debug)]
pub enum IncludeError {
    #[error("library `{0}` not found")]
    LibraryNotFound(String),

    #[error("couldn't fetch `{url}`: {reason}")]
    Fetch { url: String, reason: String },

    #[error("error reading file `{}`: {io_error}", path.display())]
    Io { path: PathBuf, io_error: io::Error },
}

/// Rejects every include.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn fetch_url(&self, url: &str) -> Result<String, IncludeError> {
        Err(IncludeError::Fetch {
            url: url.to_owned(),
            reason: "includes are disabled".to_owned(),
        })
    }

    fn resolve_library(&self, name: &str) -> Result<String, IncludeError> {
        Err(IncludeError::LibraryNotFound(name.to_owned()))
    }
}

/// Maps URLs and library names onto a local directory tree.
#[derive(Debug, Clone)]
pub struct FsIncludeResolver {
    pub url_root: PathBuf,
    pub library_root: PathBuf,
}

impl IncludeResolver for FsIncludeResolver {
    fn fetch_url(&self, url: &str) -> Result<String, IncludeError> {
        let path = url_to_path(url, &self.url_root).ok_or_else(|| IncludeError::Fetch {
            url: url.to_owned(),
            reason: "empty path".to_owned(),
        })?;

        read(path)
    }

    fn resolve_library(&self, name: &str) -> Result<String, IncludeError> {
        let mut path = self.library_root.join(name);
        if path.extension().is_none() {
            path.set_extension("q");
        }

        if !path.is_file() {
            return Err(IncludeError::LibraryNotFound(name.to_owned()));
        }

        read(path)
    }
}

fn read(path: PathBuf) -> Result<String, IncludeError> {
    fs::read_to_string(&path).map_err(|io_error| IncludeError::Io { path, io_error })
}

fn url_to_path(url: &str, root: &Path) -> Option<PathBuf> {
    let rest = match url.split_once("://") {
        Some(("file", rest)) => return (!rest.is_empty()).then(|| PathBuf::from(rest)),
        // drop the host, keep the path
        Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
        None => url,
    };

    let rest = rest.trim_start_matches('/');
    (!rest.is_empty()).then(|| root.join(rest))
}

/// In-memory includes, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MapIncludeResolver {
    pub urls: HashMap<String, String>,
    pub libraries: HashMap<String, String>,
}

impl MapIncludeResolver {
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>, source: impl Into<String>) -> Self {
        self.urls.insert(url.into(), source.into());
        self
    }

    #[must_use]
    pub fn with_library(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.libraries.insert(name.into(), source.into());
        self
    }
}

impl IncludeResolver for MapIncludeResolver {
    fn fetch_url(&self, url: &str) -> Result<String, IncludeError> {
        self.urls.get(url).cloned().ok_or_else(|| IncludeError::Fetch {
            url: url.to_owned(),
            reason: "not found".to_owned(),
        })
    }

    fn resolve_library(&self, name: &str) -> Result<String, IncludeError> {
        self.libraries
            .get(name)
            .cloned()
            .ok_or_else(|| IncludeError::LibraryNotFound(name.to_owned()))
    }
}
