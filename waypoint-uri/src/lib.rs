//! Value types and RFC 3986 algebra for the URIs used to address JSON Schema
//! resources: `$id`, `$ref`, and the base URIs they resolve against.
//!
//! This crate has no notion of JSON Schema itself — it only knows how to
//! parse, normalize, and resolve URIs and URNs. The JSON-Schema-specific
//! reference grammar (anchors vs. JSON pointers, `$defs` scoping, …) lives in
//! the `waypoint` crate.

#![deny(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]

mod absolute;
mod error;
mod uri;

pub use absolute::AbsoluteUri;
pub use error::UriError;
pub use uri::Uri;

/// True iff `value` parses as a URI with a scheme component (RFC 3986 §4.3
/// `absolute-URI`, ignoring the "no fragment" restriction — callers that care
/// about the fragment-less rule strip it themselves).
#[must_use]
pub fn is_absolute_uri(value: &str) -> bool {
    AbsoluteUri::parse(value).is_ok()
}

/// RFC 3986 §5 reference resolution of `reference` against `base`.
///
/// - `reference` absolute → returns it, normalized.
/// - `reference` empty → returns `base`, normalized.
/// - otherwise → merges `reference` onto `base` per RFC 3986 §5.2/§5.3,
///   preserving the trailing-slash ("directory") semantics of `base`.
pub fn resolve(base: &AbsoluteUri, reference: &str) -> Result<AbsoluteUri, UriError> {
    base.resolve(reference)
}
