//! The `Schema` node: the full JSON Schema 2020-12 + OpenAPI 3.x vocabulary,
//! plus the ephemeral links the resolver maintains on top of it.

use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use waypoint_uri::AbsoluteUri;

use crate::document::RegistryProvider;
use crate::resolver::ResolveResult;

use super::dialect::ExclusiveBound;
use super::json_schema::JsonSchema;

/// A single JSON Schema node.
///
/// Every vocabulary field defaults to its "absent" representation (`None`,
/// empty `Vec`/`IndexMap`) so that a freshly-constructed `Schema` behaves
/// like the nil-safe receiver described in §4.A: there is no way to
/// construct a `Schema` that panics when its accessors are called.
#[derive(Debug, Default)]
pub struct Schema {
    // --- identity / referencing ---------------------------------------
    pub ref_: Option<String>,
    pub id: Option<String>,
    pub anchor: Option<String>,
    pub defs: IndexMap<String, JsonSchema>,

    // --- composition -----------------------------------------------------
    pub all_of: Vec<JsonSchema>,
    pub one_of: Vec<JsonSchema>,
    pub any_of: Vec<JsonSchema>,
    pub not: Option<Box<JsonSchema>>,
    pub if_: Option<Box<JsonSchema>>,
    pub then: Option<Box<JsonSchema>>,
    pub else_: Option<Box<JsonSchema>>,

    // --- object/array applicators ----------------------------------------
    pub properties: IndexMap<String, JsonSchema>,
    pub pattern_properties: IndexMap<String, JsonSchema>,
    pub additional_properties: Option<Box<JsonSchema>>,
    pub items: Option<Box<JsonSchema>>,
    pub prefix_items: Vec<JsonSchema>,
    pub contains: Option<Box<JsonSchema>>,
    pub dependent_schemas: IndexMap<String, JsonSchema>,
    pub property_names: Option<Box<JsonSchema>>,
    pub unevaluated_properties: Option<Box<JsonSchema>>,
    pub unevaluated_items: Option<Box<JsonSchema>>,

    // --- metadata ----------------------------------------------------------
    pub title: Option<String>,
    pub description: Option<String>,
    pub examples: Vec<Value>,
    pub enum_: Vec<Value>,
    pub const_: Option<Value>,
    pub default: Option<Value>,
    pub format: Option<String>,
    pub pattern: Option<String>,

    // --- numeric / string / array / object constraints ----------------------
    pub multiple_of: Option<f64>,
    pub maximum: Option<f64>,
    pub minimum: Option<f64>,
    pub exclusive_maximum: Option<ExclusiveBound>,
    pub exclusive_minimum: Option<ExclusiveBound>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: Option<bool>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub required: Vec<String>,
    pub types: Vec<String>,

    // --- OpenAPI-only --------------------------------------------------------
    pub discriminator: Option<Value>,
    pub xml: Option<Value>,
    pub external_docs: Option<Value>,
    pub nullable: Option<bool>,
    pub read_only: Option<bool>,
    pub write_only: Option<bool>,
    pub deprecated: Option<bool>,

    /// Catch-all for fields not otherwise modeled (vendor extensions,
    /// unrecognized keywords). Preserves `$schema`/`$comment` too.
    pub extra: Map<String, Value>,

    // --- ephemeral, non-serialized -------------------------------------------
    parent: RwLock<Option<Weak<Schema>>>,
    top_level_parent: RwLock<Option<Weak<Schema>>>,
    owning_document: RwLock<Option<Weak<dyn RegistryProvider>>>,
    effective_base_uri: RwLock<Option<AbsoluteUri>>,
    resolution_cache: RwLock<Option<ResolveResult>>,
}

impl Schema {
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.ref_.as_deref().is_some_and(|r| !r.is_empty())
    }

    /// `true` iff `$ref` is set and every other vocabulary field is absent.
    /// Used by the 3.0 linter (out of scope here), not by the resolver.
    #[must_use]
    pub fn is_reference_only(&self) -> bool {
        if !self.is_reference() {
            return false;
        }
        self.id.is_none()
            && self.anchor.is_none()
            && self.defs.is_empty()
            && self.all_of.is_empty()
            && self.one_of.is_empty()
            && self.any_of.is_empty()
            && self.not.is_none()
            && self.if_.is_none()
            && self.then.is_none()
            && self.else_.is_none()
            && self.properties.is_empty()
            && self.pattern_properties.is_empty()
            && self.additional_properties.is_none()
            && self.items.is_none()
            && self.prefix_items.is_empty()
            && self.contains.is_none()
            && self.dependent_schemas.is_empty()
            && self.property_names.is_none()
            && self.unevaluated_properties.is_none()
            && self.unevaluated_items.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.examples.is_empty()
            && self.enum_.is_empty()
            && self.const_.is_none()
            && self.default.is_none()
            && self.format.is_none()
            && self.pattern.is_none()
            && self.extra.is_empty()
    }

    /// Structural equality (§4.A `IsEqual`): recurses into children via
    /// `JsonSchema::is_equal`, treats absent and empty containers as equal,
    /// ignores ephemeral links and caches.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.ref_ == other.ref_
            && self.id == other.id
            && self.anchor == other.anchor
            && map_eq(&self.defs, &other.defs)
            && vec_eq(&self.all_of, &other.all_of)
            && vec_eq(&self.one_of, &other.one_of)
            && vec_eq(&self.any_of, &other.any_of)
            && opt_box_eq(&self.not, &other.not)
            && opt_box_eq(&self.if_, &other.if_)
            && opt_box_eq(&self.then, &other.then)
            && opt_box_eq(&self.else_, &other.else_)
            && map_eq(&self.properties, &other.properties)
            && map_eq(&self.pattern_properties, &other.pattern_properties)
            && opt_box_eq(&self.additional_properties, &other.additional_properties)
            && opt_box_eq(&self.items, &other.items)
            && vec_eq(&self.prefix_items, &other.prefix_items)
            && opt_box_eq(&self.contains, &other.contains)
            && map_eq(&self.dependent_schemas, &other.dependent_schemas)
            && opt_box_eq(&self.property_names, &other.property_names)
            && opt_box_eq(&self.unevaluated_properties, &other.unevaluated_properties)
            && opt_box_eq(&self.unevaluated_items, &other.unevaluated_items)
            && self.title == other.title
            && self.description == other.description
            && self.examples == other.examples
            && self.enum_ == other.enum_
            && self.const_ == other.const_
            && self.default == other.default
            && self.format == other.format
            && self.pattern == other.pattern
            && self.multiple_of == other.multiple_of
            && self.maximum == other.maximum
            && self.minimum == other.minimum
            && self.exclusive_maximum == other.exclusive_maximum
            && self.exclusive_minimum == other.exclusive_minimum
            && self.min_length == other.min_length
            && self.max_length == other.max_length
            && self.min_items == other.min_items
            && self.max_items == other.max_items
            && self.unique_items == other.unique_items
            && self.min_properties == other.min_properties
            && self.max_properties == other.max_properties
            && self.types == other.types
            && self.required == other.required
            && self.discriminator == other.discriminator
            && self.xml == other.xml
            && self.external_docs == other.external_docs
            && self.nullable == other.nullable
            && self.read_only == other.read_only
            && self.write_only == other.write_only
            && self.deprecated == other.deprecated
            && self.extra == other.extra
    }

    /// Duplicates `self` and its direct containers; child schemas are shared
    /// (cheap `Arc`/enum clones), not deep-copied.
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        Self {
            ref_: self.ref_.clone(),
            id: self.id.clone(),
            anchor: self.anchor.clone(),
            defs: self.defs.clone(),
            all_of: self.all_of.clone(),
            one_of: self.one_of.clone(),
            any_of: self.any_of.clone(),
            not: self.not.clone(),
            if_: self.if_.clone(),
            then: self.then.clone(),
            else_: self.else_.clone(),
            properties: self.properties.clone(),
            pattern_properties: self.pattern_properties.clone(),
            additional_properties: self.additional_properties.clone(),
            items: self.items.clone(),
            prefix_items: self.prefix_items.clone(),
            contains: self.contains.clone(),
            dependent_schemas: self.dependent_schemas.clone(),
            property_names: self.property_names.clone(),
            unevaluated_properties: self.unevaluated_properties.clone(),
            unevaluated_items: self.unevaluated_items.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            examples: self.examples.clone(),
            enum_: self.enum_.clone(),
            const_: self.const_.clone(),
            default: self.default.clone(),
            format: self.format.clone(),
            pattern: self.pattern.clone(),
            multiple_of: self.multiple_of,
            maximum: self.maximum,
            minimum: self.minimum,
            exclusive_maximum: self.exclusive_maximum.clone(),
            exclusive_minimum: self.exclusive_minimum.clone(),
            min_length: self.min_length,
            max_length: self.max_length,
            min_items: self.min_items,
            max_items: self.max_items,
            unique_items: self.unique_items,
            min_properties: self.min_properties,
            max_properties: self.max_properties,
            required: self.required.clone(),
            types: self.types.clone(),
            discriminator: self.discriminator.clone(),
            xml: self.xml.clone(),
            external_docs: self.external_docs.clone(),
            nullable: self.nullable,
            read_only: self.read_only,
            write_only: self.write_only,
            deprecated: self.deprecated,
            extra: self.extra.clone(),
            // ephemeral links are NOT copied; the copy starts unresolved and
            // unparented, matching "shallow copy shares child schema
            // references" but not resolution state.
            parent: RwLock::new(None),
            top_level_parent: RwLock::new(None),
            owning_document: RwLock::new(None),
            effective_base_uri: RwLock::new(None),
            resolution_cache: RwLock::new(None),
        }
    }

    // --- parent links -----------------------------------------------------

    /// The schema that textually contains this node (§3's DAG invariant).
    /// Population sets this for every node; a successful resolution hop
    /// overwrites a reference's target's `parent` with the reference itself,
    /// per §3 Lifecycle ("resolution mutates... the ephemeral parent/base
    /// links"). Nil-safe: never panics, returns `None` when unset (document
    /// root) or when the ancestor has been dropped.
    #[must_use]
    pub fn get_parent(&self) -> Option<Arc<Schema>> {
        self.parent.read().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// Accepts a `Weak` directly (rather than an `Arc`) because population
    /// sets a node's parent to an ancestor still under construction via
    /// `Arc::new_cyclic`, before any strong reference to it exists.
    pub fn set_parent(&self, parent: Option<Weak<Schema>>) {
        *self.parent.write().unwrap() = parent;
    }

    /// The outermost reference-bearing ancestor reached during the active
    /// resolution walk.
    #[must_use]
    pub fn get_top_level_parent(&self) -> Option<Arc<Schema>> {
        self.top_level_parent
            .read()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn set_top_level_parent(&self, parent: Option<Weak<Schema>>) {
        *self.top_level_parent.write().unwrap() = parent;
    }

    /// Walks `parent` links, accumulating reference-bearing ancestors,
    /// outermost-first. Terminates in the presence of a parent cycle by
    /// tracking visited node identities.
    #[must_use]
    pub fn get_reference_chain(self: &Arc<Self>) -> Vec<Arc<Schema>> {
        let mut chain = Vec::new();
        let mut visited: Vec<*const Schema> = Vec::new();
        let mut current = self.get_parent();
        while let Some(node) = current {
            let ptr = Arc::as_ptr(&node);
            if visited.contains(&ptr) {
                break;
            }
            visited.push(ptr);
            if node.is_reference() {
                chain.push(Arc::clone(&node));
            }
            current = node.get_parent();
        }
        chain.reverse();
        chain
    }

    /// The nearest reference in `get_reference_chain` (equivalently,
    /// `get_parent`, which is already filtered to be reference-bearing).
    #[must_use]
    pub fn get_immediate_reference(self: &Arc<Self>) -> Option<Arc<Schema>> {
        self.get_reference_chain().pop()
    }

    #[must_use]
    pub fn get_top_level_reference(self: &Arc<Self>) -> Option<Arc<Schema>> {
        self.get_reference_chain().into_iter().next()
    }

    // --- owning document ----------------------------------------------------

    /// Stores the owning document iff it implements [`RegistryProvider`];
    /// otherwise silently does nothing (a backward-compatibility contract
    /// inherited from §4.A).
    pub fn set_owning_document(&self, doc: Option<&Arc<dyn RegistryProvider>>) {
        *self.owning_document.write().unwrap() = doc.map(Arc::downgrade);
    }

    #[must_use]
    pub fn owning_document(&self) -> Option<Arc<dyn RegistryProvider>> {
        self.owning_document
            .read()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade)
    }

    // --- effective base URI --------------------------------------------------

    #[must_use]
    pub fn get_effective_base_uri(&self) -> Option<AbsoluteUri> {
        self.effective_base_uri.read().unwrap().clone()
    }

    pub fn set_effective_base_uri(&self, uri: AbsoluteUri) {
        *self.effective_base_uri.write().unwrap() = Some(uri);
    }

    // --- resolution cache -----------------------------------------------------

    #[must_use]
    pub fn cached_resolution(&self) -> Option<ResolveResult> {
        self.resolution_cache.read().unwrap().clone()
    }

    pub fn set_cached_resolution(&self, result: Option<ResolveResult>) {
        *self.resolution_cache.write().unwrap() = result;
    }
}

fn vec_eq(a: &[JsonSchema], b: &[JsonSchema]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_equal(y))
}

fn map_eq(a: &IndexMap<String, JsonSchema>, b: &IndexMap<String, JsonSchema>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .all(|(k, v)| b.get(k).is_some_and(|other| v.is_equal(other)))
}

fn opt_box_eq(a: &Option<Box<JsonSchema>>, b: &Option<Box<JsonSchema>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is_equal(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A cycle in `parent` links (never produced by `populate`, but not
    /// structurally prevented either) must not hang `get_reference_chain`.
    #[test]
    fn reference_chain_terminates_on_a_parent_cycle() {
        let mut a_ref = Schema::default();
        a_ref.ref_ = Some("#/b".to_owned());
        let a = Arc::new(a_ref);

        let mut b_ref = Schema::default();
        b_ref.ref_ = Some("#/a".to_owned());
        let b = Arc::new(b_ref);

        a.set_parent(Some(Arc::downgrade(&b)));
        b.set_parent(Some(Arc::downgrade(&a)));

        let chain = a.get_reference_chain();
        assert!(chain.len() <= 2);
    }

    #[test]
    fn non_reference_nodes_are_filtered_out_of_the_chain() {
        let root = Arc::new(Schema::default());

        let mut leaf = Schema::default();
        leaf.ref_ = Some("#/x".to_owned());
        let leaf = Arc::new(leaf);
        leaf.set_parent(Some(Arc::downgrade(&root)));

        assert!(leaf.get_reference_chain().is_empty());
    }
}
