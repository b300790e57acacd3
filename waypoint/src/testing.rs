//! In-memory [`VirtualFs`]/[`HttpClient`] doubles for hermetic tests (§2.6).
//!
//! Exposed as a public module (rather than behind `#[cfg(test)]`) so
//! integration tests in `tests/` — compiled as a separate crate — and
//! downstream consumers embedding this crate can build fixtures without
//! touching real disk or network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use waypoint_uri::AbsoluteUri;

use crate::error::LoaderError;
use crate::loader::{HttpClient, VirtualFs};

/// An in-memory filesystem keyed by path.
#[derive(Debug, Default)]
pub struct InMemoryFs(Mutex<HashMap<PathBuf, Vec<u8>>>);

impl InMemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.0.lock().unwrap().insert(path.into(), bytes.into());
    }
}

impl VirtualFs for InMemoryFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>, LoaderError> {
        self.0
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::FileNotFound {
                path: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found in InMemoryFs"),
            })
    }
}

/// An in-memory HTTP double keyed by absolute URI (fragment stripped).
#[derive(Debug, Default)]
pub struct InMemoryHttpClient(Mutex<HashMap<AbsoluteUri, Vec<u8>>>);

impl InMemoryHttpClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: AbsoluteUri, bytes: impl Into<Vec<u8>>) {
        self.0.lock().unwrap().insert(uri.without_fragment(), bytes.into());
    }
}

impl HttpClient for InMemoryHttpClient {
    fn get(&self, uri: &AbsoluteUri, _timeout: std::time::Duration) -> Result<Vec<u8>, LoaderError> {
        self.0
            .lock()
            .unwrap()
            .get(&uri.without_fragment())
            .cloned()
            .ok_or_else(|| LoaderError::HttpStatus {
                uri: uri.to_string(),
                status: 404,
            })
    }
}
