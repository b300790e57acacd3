use std::{fmt, str::FromStr};

use url::Url;
use urn::Urn;

use crate::error::UriError;

/// A URI in the form of a fully qualified [`Url`] or [`Urn`].
///
/// Mirrors the two concrete forms that `$id` and canonical schema references
/// take in the wild: `https://example.com/schema.json` and, less commonly,
/// `urn:uuid:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbsoluteUri {
    Url(Url),
    Urn(Urn),
}

impl AbsoluteUri {
    /// Parses `value` as an [`AbsoluteUri`].
    ///
    /// # Errors
    /// Returns [`UriError`] if `value` is not a valid absolute `Url` or
    /// `Urn`.
    pub fn parse(value: &str) -> Result<Self, UriError> {
        if value.starts_with("urn:") {
            return Urn::from_str(value)
                .map(Self::Urn)
                .map_err(|source| UriError::Urn {
                    value: value.to_string(),
                    source,
                });
        }
        Url::parse(value)
            .map(Self::Url)
            .map_err(|source| UriError::Parse {
                value: value.to_string(),
                source,
            })
    }

    /// Resolves `reference` against `self` as the base, per RFC 3986 §5.
    ///
    /// # Errors
    /// Returns [`UriError::UrnRelativeResolution`] if `self` is a `Urn` and
    /// `reference` is neither absolute nor a bare fragment.
    pub fn resolve(&self, reference: &str) -> Result<Self, UriError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(self.clone());
        }
        if let Ok(absolute) = Self::parse(reference) {
            return Ok(absolute);
        }
        match self {
            Self::Url(base) => {
                let resolved = base.join(reference).map_err(|source| UriError::Parse {
                    value: reference.to_string(),
                    source,
                })?;
                Ok(Self::Url(resolved))
            }
            Self::Urn(base) => {
                if let Some(frag) = reference.strip_prefix('#') {
                    let mut urn = base.clone();
                    urn.set_f_component(frag)
                        .map_err(|_| UriError::UrnRelativeResolution {
                            base: base.to_string(),
                            reference: reference.to_string(),
                        })?;
                    return Ok(Self::Urn(urn));
                }
                Err(UriError::UrnRelativeResolution {
                    base: base.to_string(),
                    reference: reference.to_string(),
                })
            }
        }
    }

    /// The scheme component (`https`, `urn`, …).
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::Url(url) => url.scheme(),
            Self::Urn(_) => "urn",
        }
    }

    /// The percent-encoded fragment, if present.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        match self {
            Self::Url(url) => url.fragment(),
            Self::Urn(urn) => urn.f_component(),
        }
    }

    /// Returns a copy of `self` with no fragment component.
    #[must_use]
    pub fn without_fragment(&self) -> Self {
        let mut cloned = self.clone();
        cloned.set_fragment(None);
        cloned
    }

    /// Sets (or clears) the fragment component.
    pub fn set_fragment(&mut self, fragment: Option<&str>) {
        match self {
            Self::Url(url) => url.set_fragment(fragment),
            Self::Urn(urn) => {
                // URN fragments cannot be cleared once set via the `urn`
                // crate's API; resetting to empty is the closest equivalent
                // and is never observed in practice since JSON Schema `$id`s
                // disallow fragments.
                let _ = urn.set_f_component(fragment.unwrap_or_default());
            }
        }
    }

    /// `true` iff this URI carries a non-root, non-empty path that ends
    /// without a trailing slash — i.e. the last path segment is a "file"
    /// rather than a "directory" for the purposes of relative resolution.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        match self {
            Self::Url(url) => url.path().ends_with('/'),
            Self::Urn(_) => false,
        }
    }

    /// The URL form, if this is a `Url` variant.
    #[must_use]
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            Self::Url(url) => Some(url),
            Self::Urn(_) => None,
        }
    }
}

impl fmt::Display for AbsoluteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Urn(urn) => write!(f, "{urn}"),
        }
    }
}

impl FromStr for AbsoluteUri {
    type Err = UriError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Url> for AbsoluteUri {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl From<Urn> for AbsoluteUri {
    fn from(urn: Urn) -> Self {
        Self::Urn(urn)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AbsoluteUri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for AbsoluteUri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Normalization law: resolving an already-absolute URI against any
        /// base returns that URI unchanged, regardless of the base — an
        /// absolute reference short-circuits RFC 3986 §5's merge step.
        #[test]
        fn resolving_an_absolute_uri_ignores_the_base(
            base_host in "[a-z]{1,8}",
            base_path in "[a-z/]{0,12}",
            target_host in "[a-z]{1,8}",
            target_path in "[a-z/]{0,12}",
        ) {
            let base = AbsoluteUri::parse(&format!("https://{base_host}/{base_path}")).unwrap();
            let target_str = format!("https://{target_host}/{target_path}");
            let target = AbsoluteUri::parse(&target_str).unwrap();
            let resolved = base.resolve(&target_str).unwrap();
            prop_assert_eq!(resolved, target);
        }

        /// Resolving twice in a row against the same base is equivalent to
        /// resolving once: re-parsing an already-normalized URI is a no-op.
        #[test]
        fn resolution_is_idempotent_on_its_own_output(
            host in "[a-z]{1,8}",
            path in "[a-z/]{0,12}",
            segment in "[a-z]{1,8}",
        ) {
            let base = AbsoluteUri::parse(&format!("https://{host}/{path}")).unwrap();
            let once = base.resolve(&segment).unwrap();
            let twice = once.resolve("").unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn trailing_slash_changes_resolution() {
        let with_slash = AbsoluteUri::parse("https://h/a/").unwrap();
        assert_eq!(
            with_slash.resolve("b").unwrap().to_string(),
            "https://h/a/b"
        );

        let without_slash = AbsoluteUri::parse("https://h/a").unwrap();
        assert_eq!(
            without_slash.resolve("b").unwrap().to_string(),
            "https://h/b"
        );
    }

    #[test]
    fn empty_reference_returns_base() {
        let base = AbsoluteUri::parse("https://h/a/b").unwrap();
        assert_eq!(base.resolve("").unwrap(), base);
    }

    #[test]
    fn absolute_reference_ignores_base() {
        let base = AbsoluteUri::parse("https://h/a/").unwrap();
        let resolved = base.resolve("https://other/x").unwrap();
        assert_eq!(resolved.to_string(), "https://other/x");
    }

    #[test]
    fn fragment_only_reference_keeps_path() {
        let base = AbsoluteUri::parse("https://h/a/b").unwrap();
        let resolved = base.resolve("#frag").unwrap();
        assert_eq!(resolved.to_string(), "https://h/a/b#frag");
    }

    #[test]
    fn urn_fragment_resolution() {
        let base = AbsoluteUri::parse("urn:example:1").unwrap();
        let resolved = base.resolve("#name").unwrap();
        assert_eq!(resolved.fragment(), Some("name"));
    }

    #[test]
    fn urn_relative_resolution_errors() {
        let base = AbsoluteUri::parse("urn:example:1").unwrap();
        assert!(base.resolve("sibling").is_err());
    }
}
