use std::fmt;

use crate::{absolute::AbsoluteUri, error::UriError};

/// Either an [`AbsoluteUri`] or an unresolved relative reference string.
///
/// `$ref` and `$id` values are parsed into a `Uri` as soon as they are read
/// off the wire; whether they carry a scheme is only known once parsing is
/// attempted, which is why this is a fallible two-variant type rather than a
/// plain `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Uri {
    Absolute(AbsoluteUri),
    Relative(String),
}

impl Uri {
    /// Parses `value`, classifying it as absolute or relative. Never fails:
    /// anything that isn't a valid absolute URI or URN is treated as a
    /// relative reference string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match AbsoluteUri::parse(value) {
            Ok(abs) => Self::Absolute(abs),
            Err(_) => Self::Relative(value.to_string()),
        }
    }

    #[must_use]
    pub fn is_absolute(&self) -> bool {
        matches!(self, Self::Absolute(_))
    }

    #[must_use]
    pub fn as_str_ref(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::Absolute(uri) => std::borrow::Cow::Owned(uri.to_string()),
            Self::Relative(s) => std::borrow::Cow::Borrowed(s),
        }
    }

    /// Resolves this URI against `base`, per RFC 3986 §5.
    ///
    /// # Errors
    /// See [`AbsoluteUri::resolve`].
    pub fn resolve_against(&self, base: &AbsoluteUri) -> Result<AbsoluteUri, UriError> {
        match self {
            Self::Absolute(uri) => Ok(uri.clone()),
            Self::Relative(s) => base.resolve(s),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(uri) => write!(f, "{uri}"),
            Self::Relative(s) => write!(f, "{s}"),
        }
    }
}

impl From<AbsoluteUri> for Uri {
    fn from(uri: AbsoluteUri) -> Self {
        Self::Absolute(uri)
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
