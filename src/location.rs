// src/location.rs

//! Repository location helpers
//!
//! Repositories are identified by URL. Locations given as plain filesystem
//! paths are converted to `file:` URLs, and comparisons ignore the
//! differences that do not change which repository is meant (scheme/host
//! case, a trailing slash, a fragment).

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Parse a location given either as a URL or as a filesystem path
pub fn parse(location: &str) -> Result<Url> {
    match Url::parse(location) {
        Ok(url) => Ok(normalize(&url)),
        Err(url::ParseError::RelativeUrlWithoutBase) => from_path(Path::new(location)),
        Err(_) => Err(Error::InvalidLocation(location.to_string())),
    }
}

/// Build a `file:` URL for a path, resolving relative paths against the
/// current directory
pub fn from_path(path: &Path) -> Result<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Url::from_file_path(&absolute)
        .map(|url| normalize(&url))
        .map_err(|()| Error::InvalidLocation(absolute.display().to_string()))
}

/// Convert a `file:` URL back into a path
///
/// Lenient about URLs that are not strictly hierarchical; returns `None` for
/// other schemes.
pub fn to_file(url: &Url) -> Option<PathBuf> {
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path()
        .ok()
        .or_else(|| Some(PathBuf::from(url.path())))
}

/// Canonical form used as a registry key
pub fn normalize(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }
    normalized
}

/// Whether two URLs name the same repository
pub fn same_location(a: &Url, b: &Url) -> bool {
    normalize(a) == normalize(b)
}
