//! Dialect-sensitive value types.
//!
//! The resolver itself is dialect-agnostic (§9: "the resolver does not need
//! [the dialect version], but error shapes may"), but the schema model has to
//! represent `exclusiveMinimum`/`exclusiveMaximum`, whose shape changed
//! between OpenAPI 3.0 (boolean, a sibling of `minimum`/`maximum`) and
//! OpenAPI 3.1+/JSON Schema 2020-12 (a number, replacing `minimum`/`maximum`
//! outright). Consumers that need to dispatch on this carry the dialect
//! version through their own validation context; this crate only models the
//! sum type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The OpenAPI/JSON-Schema dialect a document declares, as far as it affects
/// value shapes the resolver has to model. Carried by consumers through an
/// opaque context; the resolver never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectVersion {
    OpenApi30,
    OpenApi31,
    OpenApi32,
    JsonSchema2020_12,
}

/// `exclusiveMinimum`/`exclusiveMaximum`: a boolean in OpenAPI 3.0 (modifying
/// the meaning of the sibling `minimum`/`maximum`), a number in OpenAPI
/// 3.1+/2020-12 (standing alone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExclusiveBound {
    Flag(bool),
    Number(f64),
}

impl ExclusiveBound {
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(b) = value.as_bool() {
            return Some(Self::Flag(b));
        }
        value.as_f64().map(Self::Number)
    }
}
