//! Error taxonomy for schema population, registration, and resolution.
//!
//! Every fallible boundary in this crate returns one of the enums below.
//! They compose via `#[from]` the way narrower errors (`UriError`,
//! `PointerError`) are absorbed into the broader [`ResolveError`], so callers
//! can match on a single type without losing the original cause.

use thiserror::Error;
use waypoint_uri::UriError;

/// Failures that can occur while populating a [`crate::schema::Schema`] tree
/// or registering it with a [`crate::registry::SchemaRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid $id \"{id}\" on schema at {path}: {source}")]
    InvalidId {
        id: String,
        path: String,
        #[source]
        source: UriError,
    },

    #[error("duplicate $id \"{uri}\": already registered to a different schema")]
    DuplicateId { uri: String },

    #[error("duplicate $anchor \"{anchor}\" in resource \"{base}\": already registered to a different schema")]
    DuplicateAnchor { base: String, anchor: String },
}

/// Failures navigating a JSON Pointer (RFC 6901) over a [`crate::schema::Schema`] tree.
#[derive(Debug, Error)]
pub enum PointerError {
    #[error("malformed JSON pointer \"{pointer}\": {source}")]
    Malformed {
        pointer: String,
        #[source]
        source: jsonptr::MalformedPointerError,
    },

    #[error("JSON pointer segment \"{segment}\" not found (pointer \"{pointer}\")")]
    NotFound { pointer: String, segment: String },

    #[error("JSON pointer segment \"{segment}\" expected an array index (pointer \"{pointer}\")")]
    IndexOutOfRange { pointer: String, segment: String },
}

/// Failures fetching or parsing an external document.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("no resolver configured for scheme \"{scheme}\" (uri \"{uri}\")")]
    UnsupportedScheme { scheme: String, uri: String },

    #[error("file not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http request to {uri} failed: {message}")]
    HttpRequestFailed { uri: String, message: String },

    #[error("http request to {uri} returned status {status}")]
    HttpStatus { uri: String, status: u16 },

    #[error("failed to parse document fetched from {uri}: {message}")]
    ParseError {
        uri: String,
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },
}

/// Errors surfaced by [`crate::resolver::Resolver::resolve`].
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("options.root_document is required to resolve fragment reference \"{reference}\"")]
    MissingRootDocument { reference: String },

    #[error("circular reference detected: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("resolution exceeded max depth of {max_depth} hops while resolving \"{reference}\"")]
    MaxDepthExceeded { reference: String, max_depth: usize },

    #[error("anchor \"{anchor}\" not found (searched base \"{base}\" and fallbacks)")]
    AnchorNotFound { base: String, anchor: String },

    #[error("resolved target at \"{uri}\" was neither a boolean schema nor a schema object ({found})")]
    UnresolvableTarget { uri: String, found: String },

    #[error("resolution was cancelled")]
    Cancelled,

    #[error("resolution deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Uri(#[from] UriError),

    #[error(transparent)]
    Pointer(#[from] PointerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Loader(#[from] LoaderError),
}
