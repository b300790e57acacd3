//! Pure functions over the on-wire reference grammar (§6.1):
//!
//! ```text
//! reference   = [uri] ["#" fragment]
//! uri         = absolute-URI / relative-reference         (RFC 3986)
//! fragment    = anchor / json-pointer
//! anchor      = 1*( ALPHA / DIGIT / "_" / "-" / "." )     (must not start with "/")
//! json-pointer= *( "/" segment )                          (RFC 6901)
//! ```
//!
//! The URI half of this grammar (absoluteness, RFC 3986 resolution) is
//! delegated to `waypoint-uri`; everything here is specific to how JSON
//! Schema layers anchors and JSON pointers on top of a URI fragment.

pub use waypoint_uri::is_absolute_uri;

/// True iff `reference` is a bare anchor fragment: `#` followed by a
/// non-empty string that does not start with `/`.
#[must_use]
pub fn is_anchor_reference(reference: &str) -> bool {
    match reference.strip_prefix('#') {
        Some(rest) => !rest.is_empty() && !rest.starts_with('/'),
        None => false,
    }
}

/// The substring after `#`, or empty if there is no fragment or the fragment
/// is a JSON pointer (starts with `/`).
#[must_use]
pub fn extract_anchor(reference: &str) -> &str {
    match reference.split_once('#') {
        Some((_, frag)) if !frag.is_empty() && !frag.starts_with('/') => frag,
        _ => "",
    }
}

/// Splits `reference` into its URI and fragment parts at the first `#`.
///
/// The fragment retains its leading `/` when it is a JSON pointer; a bare
/// anchor fragment is returned without the `#`.
#[must_use]
pub fn split_reference(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((uri, fragment)) => (uri, fragment),
        None => (reference, ""),
    }
}

/// Trims the final `/segment` off a JSON pointer, per RFC 6901. Returns an
/// empty string when `pointer` is already the document root.
#[must_use]
pub fn get_parent_json_pointer(pointer: &str) -> &str {
    match pointer.rfind('/') {
        Some(idx) => &pointer[..idx],
        None => "",
    }
}

/// Un-escapes a single JSON pointer reference-token per RFC 6901 §4: `~1`
/// becomes `/`, `~0` becomes `~`.
#[must_use]
pub fn unescape_token(token: &str) -> std::borrow::Cow<'_, str> {
    if !token.contains('~') {
        return std::borrow::Cow::Borrowed(token);
    }
    std::borrow::Cow::Owned(token.replace("~1", "/").replace("~0", "~"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_detection() {
        assert!(is_anchor_reference("#myAnchor"));
        assert!(!is_anchor_reference("#/defs/foo"));
        assert!(!is_anchor_reference("#"));
        assert!(!is_anchor_reference("no-hash"));
    }

    #[test]
    fn anchor_extraction() {
        assert_eq!(extract_anchor("schema.json#myAnchor"), "myAnchor");
        assert_eq!(extract_anchor("#/defs/foo"), "");
        assert_eq!(extract_anchor("schema.json"), "");
    }

    #[test]
    fn reference_splitting() {
        assert_eq!(split_reference("a.json#/defs/b"), ("a.json", "/defs/b"));
        assert_eq!(split_reference("#/defs/b"), ("", "/defs/b"));
        assert_eq!(split_reference("a.json#anchor"), ("a.json", "anchor"));
        assert_eq!(split_reference("a.json"), ("a.json", ""));
    }

    #[test]
    fn parent_pointer() {
        assert_eq!(get_parent_json_pointer("/defs/foo"), "/defs");
        assert_eq!(get_parent_json_pointer("/defs"), "");
        assert_eq!(get_parent_json_pointer(""), "");
    }

    #[test]
    fn token_unescaping() {
        assert_eq!(unescape_token("a~1b~0c"), "a/b~c");
        assert_eq!(unescape_token("plain"), "plain");
    }
}
