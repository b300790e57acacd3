//! Document Loader (§4.E): fetches and parses referenced documents from the
//! filesystem or HTTP, with caching delegated to the calling document's
//! [`RegistryProvider`] two-tier cache.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use waypoint_uri::AbsoluteUri;

use crate::error::LoaderError;
use crate::location::Location;

/// Filesystem abstraction so tests can substitute an in-memory filesystem.
/// The default implementation, [`OsFs`], delegates to `std::fs`.
pub trait VirtualFs: std::fmt::Debug + Send + Sync {
    /// # Errors
    /// Returns [`LoaderError::FileNotFound`] if `path` cannot be opened.
    fn read(&self, path: &Path) -> Result<Vec<u8>, LoaderError>;
}

#[derive(Debug, Default)]
pub struct OsFs;

impl VirtualFs for OsFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>, LoaderError> {
        std::fs::read(path).map_err(|source| LoaderError::FileNotFound {
            path: path.display().to_string(),
            source,
        })
    }
}

/// HTTP abstraction. The default implementation is backed by `reqwest`'s
/// blocking client (feature `http`) so the resolver itself stays
/// synchronous per the concurrency model.
pub trait HttpClient: std::fmt::Debug + Send + Sync {
    /// # Errors
    /// Returns [`LoaderError::HttpRequestFailed`] on transport failure or
    /// [`LoaderError::HttpStatus`] on a non-2xx response.
    fn get(&self, uri: &AbsoluteUri, timeout: std::time::Duration) -> Result<Vec<u8>, LoaderError>;
}

#[cfg(feature = "http")]
#[derive(Debug)]
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

#[cfg(feature = "http")]
impl HttpClient for ReqwestHttpClient {
    fn get(&self, uri: &AbsoluteUri, timeout: std::time::Duration) -> Result<Vec<u8>, LoaderError> {
        let url = uri.as_url().ok_or_else(|| LoaderError::UnsupportedScheme {
            scheme: uri.scheme().unwrap_or_default().to_owned(),
            uri: uri.to_string(),
        })?;
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .map_err(|source| LoaderError::HttpRequestFailed {
                uri: uri.to_string(),
                message: source.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::HttpStatus {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|source| LoaderError::HttpRequestFailed {
                uri: uri.to_string(),
                message: source.to_string(),
            })
    }
}

/// Parses fetched bytes as JSON or YAML, keeping source position
/// information for parse failures.
pub fn parse_document(uri: &AbsoluteUri, bytes: &[u8]) -> Result<Value, LoaderError> {
    let text = std::str::from_utf8(bytes).map_err(|source| LoaderError::ParseError {
        uri: uri.to_string(),
        message: source.to_string(),
        line: None,
        column: None,
    })?;

    #[cfg(feature = "yaml")]
    {
        if looks_like_json(text) {
            return parse_json(uri, text);
        }
        serde_yaml::from_str(text).map_err(|source| LoaderError::ParseError {
            uri: uri.to_string(),
            message: source.to_string(),
            line: source.location().map(|l| Location::from(&l)).and_then(|l| l.line),
            column: source.location().map(|l| Location::from(&l)).and_then(|l| l.column),
        })
    }
    #[cfg(not(feature = "yaml"))]
    {
        parse_json(uri, text)
    }
}

#[cfg(feature = "yaml")]
fn looks_like_json(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

fn parse_json(uri: &AbsoluteUri, text: &str) -> Result<Value, LoaderError> {
    serde_json::from_str(text).map_err(|source| LoaderError::ParseError {
        uri: uri.to_string(),
        message: source.to_string(),
        line: Some(source.line()),
        column: Some(source.column()),
    })
}

/// Dispatches a reference's URI to the HTTP client or the virtual
/// filesystem by scheme, normalizing filesystem paths with
/// `filepath.ToSlash`-equivalent handling.
#[derive(Debug)]
pub struct Loader {
    fs: std::sync::Arc<dyn VirtualFs>,
    http: Option<std::sync::Arc<dyn HttpClient>>,
    timeout: std::time::Duration,
}

impl Loader {
    #[must_use]
    pub fn new(
        fs: std::sync::Arc<dyn VirtualFs>,
        http: Option<std::sync::Arc<dyn HttpClient>>,
        timeout: std::time::Duration,
    ) -> Self {
        Self { fs, http, timeout }
    }

    /// Fetches `uri`, returning both the raw bytes (for re-parse/caching)
    /// and the parsed document.
    ///
    /// # Errors
    /// Returns [`LoaderError::UnsupportedScheme`] for a scheme with neither
    /// an HTTP client nor filesystem handling, or any error surfaced by the
    /// underlying fetch/parse step.
    pub fn load(&self, uri: &AbsoluteUri) -> Result<(Vec<u8>, Value), LoaderError> {
        let scheme = uri.scheme().unwrap_or_default();
        let bytes = match scheme {
            "http" | "https" => {
                let client = self.http.as_deref().ok_or_else(|| LoaderError::UnsupportedScheme {
                    scheme: scheme.to_owned(),
                    uri: uri.to_string(),
                })?;
                debug!(uri = %uri, "dispatching HTTP fetch");
                client.get(uri, self.timeout)?
            }
            "file" | "" => {
                let path = to_fs_path(uri);
                debug!(path = %path.display(), "dispatching filesystem fetch");
                self.fs.read(&path)?
            }
            other => {
                return Err(LoaderError::UnsupportedScheme {
                    scheme: other.to_owned(),
                    uri: uri.to_string(),
                });
            }
        };
        let parsed = parse_document(uri, &bytes)?;
        Ok((bytes, parsed))
    }
}

fn to_fs_path(uri: &AbsoluteUri) -> PathBuf {
    uri.as_url()
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(uri.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryFs;

    #[test]
    fn json_parses_over_yaml_fast_path() {
        let uri: AbsoluteUri = "file:///a.json".parse().unwrap();
        let value = parse_document(&uri, br#"{"type":"object"}"#).unwrap();
        assert_eq!(value["type"], "object");
    }

    #[test]
    fn missing_file_is_reported() {
        let fs = InMemoryFs::new();
        let loader = Loader::new(std::sync::Arc::new(fs), None, std::time::Duration::from_secs(1));
        let uri: AbsoluteUri = "file:///missing.json".parse().unwrap();
        let err = loader.load(&uri).unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound { .. }));
    }
}
