use thiserror::Error;

/// Errors produced while parsing or resolving a URI.
#[derive(Debug, Clone, Error)]
pub enum UriError {
    /// `value` could not be parsed as either a [`url::Url`] or a
    /// [`urn::Urn`](urn::Urn).
    #[error("failed to parse \"{value}\" as a URI: {source}")]
    Parse {
        value: String,
        #[source]
        source: url::ParseError,
    },

    /// `value` started with `urn:` but failed URN-specific parsing.
    #[error("failed to parse \"{value}\" as a URN: {source}")]
    Urn {
        value: String,
        #[source]
        source: urn::Error,
    },

    /// RFC 3986 resolution was attempted against a `urn:` base with a
    /// relative reference; URNs have no standard relative-resolution
    /// algorithm (RFC 8141), so only absolute references or fragment-only
    /// references are supported against a URN base.
    #[error("cannot resolve relative reference \"{reference}\" against URN base \"{base}\"")]
    UrnRelativeResolution { base: String, reference: String },
}
