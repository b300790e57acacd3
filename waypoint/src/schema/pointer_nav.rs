//! Generic JSON Pointer navigation (§4.D.iii) over the heterogeneous schema
//! tree: named struct fields, ordered maps, and arrays each need their own
//! dispatch, so navigation is expressed as a trait rather than one big match.

use crate::error::PointerError;
use crate::reference::unescape_token;

use super::core::Schema;
use super::json_schema::JsonSchema;

/// A schema node that can be stepped into by a single-segment keyword
/// (`not`, `if`, `items`, …) addressing exactly one child.
pub trait PointerNavigable {
    /// # Errors
    /// Returns [`PointerError::NotFound`] when `token` does not name a child
    /// of `self`.
    fn step(&self, token: &str, pointer: &str) -> Result<JsonSchema, PointerError>;
}

impl PointerNavigable for Schema {
    fn step(&self, token: &str, pointer: &str) -> Result<JsonSchema, PointerError> {
        let not_found = || PointerError::NotFound {
            pointer: pointer.to_owned(),
            segment: token.to_owned(),
        };
        match token {
            "not" => self.not.as_deref().cloned().ok_or_else(not_found),
            "if" => self.if_.as_deref().cloned().ok_or_else(not_found),
            "then" => self.then.as_deref().cloned().ok_or_else(not_found),
            "else" => self.else_.as_deref().cloned().ok_or_else(not_found),
            "additionalProperties" => self
                .additional_properties
                .as_deref()
                .cloned()
                .ok_or_else(not_found),
            "items" => self.items.as_deref().cloned().ok_or_else(not_found),
            "contains" => self.contains.as_deref().cloned().ok_or_else(not_found),
            "propertyNames" => self.property_names.as_deref().cloned().ok_or_else(not_found),
            "unevaluatedProperties" => self
                .unevaluated_properties
                .as_deref()
                .cloned()
                .ok_or_else(not_found),
            "unevaluatedItems" => self
                .unevaluated_items
                .as_deref()
                .cloned()
                .ok_or_else(not_found),
            _ => Err(not_found()),
        }
    }
}

/// Walks an RFC 6901 pointer (without its leading `#`) starting from `root`.
///
/// Container keywords that hold an ordered map (`$defs`, `properties`,
/// `patternProperties`, `dependentSchemas`) or an array (`allOf`, `oneOf`,
/// `anyOf`, `prefixItems`) consume two tokens at once — the keyword name and
/// the key/index beneath it — since the keyword name alone does not address
/// a schema node.
///
/// # Errors
/// Returns [`PointerError::Malformed`] if `pointer` fails to tokenize,
/// [`PointerError::NotFound`] for a missing segment, or
/// [`PointerError::IndexOutOfRange`] for an out-of-range array index.
pub fn navigate(root: &JsonSchema, pointer: &str) -> Result<JsonSchema, PointerError> {
    if pointer.is_empty() {
        return Ok(root.clone());
    }
    let ptr = jsonptr::Pointer::parse(pointer).map_err(|source| PointerError::Malformed {
        pointer: pointer.to_owned(),
        source,
    })?;

    let tokens: Vec<String> = ptr
        .tokens()
        .map(|t| unescape_token(t.encoded()).into_owned())
        .collect();

    let mut current = root.clone();
    let mut i = 0;
    while i < tokens.len() {
        let (next, consumed) = step_into(&current, &tokens[i..], pointer)?;
        current = next;
        i += consumed;
    }
    Ok(current)
}

fn step_into(
    current: &JsonSchema,
    remaining: &[String],
    pointer: &str,
) -> Result<(JsonSchema, usize), PointerError> {
    let token = &remaining[0];
    let not_found = || PointerError::NotFound {
        pointer: pointer.to_owned(),
        segment: token.clone(),
    };
    let schema = current.as_schema().ok_or_else(not_found)?;

    match token.as_str() {
        "$defs" | "definitions" => map_child(&schema.defs, remaining, pointer),
        "properties" => map_child(&schema.properties, remaining, pointer),
        "patternProperties" => map_child(&schema.pattern_properties, remaining, pointer),
        "dependentSchemas" => map_child(&schema.dependent_schemas, remaining, pointer),
        "allOf" => array_child(&schema.all_of, remaining, pointer),
        "oneOf" => array_child(&schema.one_of, remaining, pointer),
        "anyOf" => array_child(&schema.any_of, remaining, pointer),
        "prefixItems" => array_child(&schema.prefix_items, remaining, pointer),
        _ => schema.step(token, pointer).map(|s| (s, 1)),
    }
}

fn map_child(
    map: &indexmap::IndexMap<String, JsonSchema>,
    remaining: &[String],
    pointer: &str,
) -> Result<(JsonSchema, usize), PointerError> {
    let keyword = &remaining[0];
    let key = remaining.get(1).ok_or_else(|| PointerError::NotFound {
        pointer: pointer.to_owned(),
        segment: keyword.clone(),
    })?;
    map.get(key)
        .cloned()
        .map(|s| (s, 2))
        .ok_or_else(|| PointerError::NotFound {
            pointer: pointer.to_owned(),
            segment: key.clone(),
        })
}

fn array_child(
    items: &[JsonSchema],
    remaining: &[String],
    pointer: &str,
) -> Result<(JsonSchema, usize), PointerError> {
    let keyword = &remaining[0];
    let segment = remaining.get(1).ok_or_else(|| PointerError::NotFound {
        pointer: pointer.to_owned(),
        segment: keyword.clone(),
    })?;
    let index: usize = segment
        .parse()
        .map_err(|_| PointerError::IndexOutOfRange {
            pointer: pointer.to_owned(),
            segment: segment.clone(),
        })?;
    items
        .get(index)
        .cloned()
        .map(|s| (s, 2))
        .ok_or_else(|| PointerError::IndexOutOfRange {
            pointer: pointer.to_owned(),
            segment: segment.clone(),
        })
}
