//! Builds a [`Schema`] tree from a parsed `serde_json::Value` in document
//! order (§3 Lifecycle), deriving `$id`/`$anchor` and registering each node
//! before recursing into its children.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use waypoint_uri::AbsoluteUri;

use crate::document::RegistryProvider;
use crate::error::RegistryError;

use super::core::Schema;
use super::dialect::ExclusiveBound;
use super::json_schema::JsonSchema;

/// On-wire keywords modeled as structured fields; everything else lands in
/// `Schema::extra` (vendor extensions, `$schema`, `$comment`, …).
const KNOWN_KEYS: &[&str] = &[
    "$ref", "$id", "$anchor", "$defs", "definitions", "allOf", "oneOf", "anyOf", "not", "if",
    "then", "else", "properties", "patternProperties", "additionalProperties", "items",
    "prefixItems", "contains", "dependentSchemas", "propertyNames", "unevaluatedProperties",
    "unevaluatedItems", "title", "description", "examples", "enum", "const", "default", "format",
    "pattern", "multipleOf", "maximum", "minimum", "exclusiveMaximum", "exclusiveMinimum",
    "minLength", "maxLength", "minItems", "maxItems", "uniqueItems", "minProperties",
    "maxProperties", "required", "type", "discriminator", "xml", "externalDocs", "nullable",
    "readOnly", "writeOnly", "deprecated",
];

/// Populates a schema tree rooted at `value`, registering every node with
/// `owning_document`'s registry as it is built.
///
/// `parent` is the schema that textually contains `value` (§3 `Schema`'s DAG
/// invariant: "every child's parent is the JSONSchema that textually
/// contains it"); pass `None` at the document root. `GetReferenceChain`
/// filters this same link for reference-bearing ancestors, so `parent` is
/// set uniformly here rather than only at `$ref` nodes.
///
/// # Errors
/// Returns [`RegistryError`] on a malformed `$id`/`$id` resolution failure,
/// or on a duplicate `$id`/`$anchor` registration.
pub fn populate(
    value: &Value,
    parent_base_uri: Option<&AbsoluteUri>,
    parent: Option<Weak<Schema>>,
    owning_document: &Arc<dyn RegistryProvider>,
) -> Result<JsonSchema, RegistryError> {
    match value {
        Value::Bool(b) => Ok(JsonSchema::bool(*b)),
        Value::Object(map) => populate_object(map, parent_base_uri, parent, owning_document),
        // Not a valid schema node (malformed input); treat permissively as
        // the trivially-true schema rather than failing population.
        _ => Ok(JsonSchema::bool(true)),
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn populate_object(
    map: &Map<String, Value>,
    parent_base_uri: Option<&AbsoluteUri>,
    parent: Option<Weak<Schema>>,
    owning_document: &Arc<dyn RegistryProvider>,
) -> Result<JsonSchema, RegistryError> {
    let raw_id = str_field(map, "$id");

    let registry = owning_document.schema_registry();
    let effective_base = registry.compute_base(raw_id, parent_base_uri)?;

    let mut child_err: Option<RegistryError> = None;
    let schema_arc = Arc::new_cyclic(|weak_self| {
        build_schema(
            map,
            &effective_base,
            Some(weak_self.clone()),
            owning_document,
            &mut child_err,
        )
    });
    if let Some(err) = child_err {
        return Err(err);
    }

    schema_arc.set_parent(parent);
    schema_arc.set_effective_base_uri(effective_base.clone());
    schema_arc.set_owning_document(Some(owning_document));

    let wrapped = JsonSchema::object(schema_arc);
    registry.register(&wrapped, &effective_base)?;
    Ok(wrapped)
}

fn build_schema(
    map: &Map<String, Value>,
    effective_base: &AbsoluteUri,
    child_ancestor: Option<Weak<Schema>>,
    owning_document: &Arc<dyn RegistryProvider>,
    err_out: &mut Option<RegistryError>,
) -> Schema {
    let mut schema = Schema::default();

    schema.ref_ = str_field(map, "$ref")
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
    schema.id = str_field(map, "$id").map(str::to_owned);
    schema.anchor = str_field(map, "$anchor").map(str::to_owned);
    schema.title = str_field(map, "title").map(str::to_owned);
    schema.description = str_field(map, "description").map(str::to_owned);
    schema.format = str_field(map, "format").map(str::to_owned);
    schema.pattern = str_field(map, "pattern").map(str::to_owned);
    schema.const_ = map.get("const").cloned();
    schema.default = map.get("default").cloned();
    schema.enum_ = map
        .get("enum")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    schema.examples = map
        .get("examples")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    schema.types = match map.get("type") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
        _ => Vec::new(),
    };
    schema.required = map
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();
    schema.multiple_of = map.get("multipleOf").and_then(Value::as_f64);
    schema.maximum = map.get("maximum").and_then(Value::as_f64);
    schema.minimum = map.get("minimum").and_then(Value::as_f64);
    schema.exclusive_maximum = map.get("exclusiveMaximum").and_then(ExclusiveBound::from_value);
    schema.exclusive_minimum = map.get("exclusiveMinimum").and_then(ExclusiveBound::from_value);
    schema.min_length = map.get("minLength").and_then(Value::as_u64);
    schema.max_length = map.get("maxLength").and_then(Value::as_u64);
    schema.min_items = map.get("minItems").and_then(Value::as_u64);
    schema.max_items = map.get("maxItems").and_then(Value::as_u64);
    schema.unique_items = map.get("uniqueItems").and_then(Value::as_bool);
    schema.min_properties = map.get("minProperties").and_then(Value::as_u64);
    schema.max_properties = map.get("maxProperties").and_then(Value::as_u64);
    schema.discriminator = map.get("discriminator").cloned();
    schema.xml = map.get("xml").cloned();
    schema.external_docs = map.get("externalDocs").cloned();
    schema.nullable = map.get("nullable").and_then(Value::as_bool);
    schema.read_only = map.get("readOnly").and_then(Value::as_bool);
    schema.write_only = map.get("writeOnly").and_then(Value::as_bool);
    schema.deprecated = map.get("deprecated").and_then(Value::as_bool);

    for (k, v) in map {
        if !KNOWN_KEYS.contains(&k.as_str()) {
            schema.extra.insert(k.clone(), v.clone());
        }
    }

    schema.defs = populate_map(
        map.get("$defs").or_else(|| map.get("definitions")),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.properties = populate_map(
        map.get("properties"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.pattern_properties = populate_map(
        map.get("patternProperties"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.dependent_schemas = populate_map(
        map.get("dependentSchemas"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );

    schema.all_of = populate_vec(
        map.get("allOf"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.one_of = populate_vec(
        map.get("oneOf"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.any_of = populate_vec(
        map.get("anyOf"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.prefix_items = populate_vec(
        map.get("prefixItems"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );

    schema.not = populate_box(map.get("not"), effective_base, &child_ancestor, owning_document, err_out);
    schema.if_ = populate_box(map.get("if"), effective_base, &child_ancestor, owning_document, err_out);
    schema.then = populate_box(map.get("then"), effective_base, &child_ancestor, owning_document, err_out);
    schema.else_ = populate_box(map.get("else"), effective_base, &child_ancestor, owning_document, err_out);
    schema.additional_properties = populate_box(
        map.get("additionalProperties"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.items = populate_box(map.get("items"), effective_base, &child_ancestor, owning_document, err_out);
    schema.contains = populate_box(
        map.get("contains"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.property_names = populate_box(
        map.get("propertyNames"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.unevaluated_properties = populate_box(
        map.get("unevaluatedProperties"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );
    schema.unevaluated_items = populate_box(
        map.get("unevaluatedItems"),
        effective_base,
        &child_ancestor,
        owning_document,
        err_out,
    );

    schema
}

fn populate_child(
    value: &Value,
    effective_base: &AbsoluteUri,
    child_ancestor: &Option<Weak<Schema>>,
    owning_document: &Arc<dyn RegistryProvider>,
    err_out: &mut Option<RegistryError>,
) -> Option<JsonSchema> {
    match populate(
        value,
        Some(effective_base),
        child_ancestor.clone(),
        owning_document,
    ) {
        Ok(child) => Some(child),
        Err(err) => {
            if err_out.is_none() {
                *err_out = Some(err);
            }
            None
        }
    }
}

fn populate_map(
    value: Option<&Value>,
    effective_base: &AbsoluteUri,
    child_ancestor: &Option<Weak<Schema>>,
    owning_document: &Arc<dyn RegistryProvider>,
    err_out: &mut Option<RegistryError>,
) -> IndexMap<String, JsonSchema> {
    let Some(Value::Object(map)) = value else {
        return IndexMap::new();
    };
    let mut out = IndexMap::with_capacity(map.len());
    for (k, v) in map {
        if let Some(child) = populate_child(v, effective_base, child_ancestor, owning_document, err_out) {
            out.insert(k.clone(), child);
        }
    }
    out
}

fn populate_vec(
    value: Option<&Value>,
    effective_base: &AbsoluteUri,
    child_ancestor: &Option<Weak<Schema>>,
    owning_document: &Arc<dyn RegistryProvider>,
    err_out: &mut Option<RegistryError>,
) -> Vec<JsonSchema> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|v| populate_child(v, effective_base, child_ancestor, owning_document, err_out))
        .collect()
}

fn populate_box(
    value: Option<&Value>,
    effective_base: &AbsoluteUri,
    child_ancestor: &Option<Weak<Schema>>,
    owning_document: &Arc<dyn RegistryProvider>,
    err_out: &mut Option<RegistryError>,
) -> Option<Box<JsonSchema>> {
    let value = value?;
    populate_child(value, effective_base, child_ancestor, owning_document, err_out).map(Box::new)
}
