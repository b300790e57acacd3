//! Per-document index of `$id`s and `$anchor`s (§4.B).

use std::collections::HashMap;
use std::sync::RwLock;

use waypoint_uri::AbsoluteUri;

use crate::error::RegistryError;
use crate::schema::JsonSchema;

/// Two maps guarded by a single readers-writer lock: `$id → schema` and
/// `(base URI, $anchor) → schema`. Writes happen only during population and
/// during external-document registry installation; reads happen throughout
/// resolution.
#[derive(Debug)]
pub struct SchemaRegistry {
    document_base_uri: AbsoluteUri,
    id_index: RwLock<HashMap<AbsoluteUri, JsonSchema>>,
    anchor_index: RwLock<HashMap<(AbsoluteUri, String), JsonSchema>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new(document_base_uri: AbsoluteUri) -> Self {
        Self {
            document_base_uri,
            id_index: RwLock::new(HashMap::new()),
            anchor_index: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn document_base_uri(&self) -> &AbsoluteUri {
        &self.document_base_uri
    }

    /// `computeBase` (§4.B): the effective base URI a schema with the given
    /// raw `$id` (and enclosing `parentBaseURI`) would be registered under.
    /// Pure — does not touch the registry's maps.
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidId`] if `raw_id` is present but fails
    /// to parse, or fails to resolve against the fallback base.
    pub fn compute_base(
        &self,
        raw_id: Option<&str>,
        parent_base_uri: Option<&AbsoluteUri>,
    ) -> Result<AbsoluteUri, RegistryError> {
        let Some(id) = raw_id.filter(|s| !s.is_empty()) else {
            return Ok(self.fallback_base(parent_base_uri));
        };
        if waypoint_uri::is_absolute_uri(id) {
            let uri = id.parse::<AbsoluteUri>().map_err(|source| RegistryError::InvalidId {
                id: id.to_owned(),
                path: String::new(),
                source,
            })?;
            return Ok(uri.without_fragment());
        }
        let base = self.fallback_base(parent_base_uri);
        let resolved = base
            .resolve(id)
            .map_err(|source| RegistryError::InvalidId {
                id: id.to_owned(),
                path: String::new(),
                source,
            })?;
        Ok(resolved.without_fragment())
    }

    fn fallback_base(&self, parent_base_uri: Option<&AbsoluteUri>) -> AbsoluteUri {
        parent_base_uri
            .cloned()
            .unwrap_or_else(|| self.document_base_uri.clone())
    }

    /// Inserts `schema` into the `$id`/`$anchor` indices under the already
    /// computed `effective_base`. Idempotent when the same schema (by
    /// pointer identity or structural equality) is registered twice;
    /// otherwise a conflicting registration is an error.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateId`] / [`RegistryError::DuplicateAnchor`]
    /// when a distinct schema is already registered under the same key.
    pub fn register(
        &self,
        schema: &JsonSchema,
        effective_base: &AbsoluteUri,
    ) -> Result<(), RegistryError> {
        if let Some(id) = schema.id().filter(|s| !s.is_empty()) {
            let _ = id;
            let mut map = self.id_index.write().unwrap();
            match map.get(effective_base) {
                Some(existing) if existing != schema => {
                    return Err(RegistryError::DuplicateId {
                        uri: effective_base.to_string(),
                    });
                }
                _ => {
                    map.insert(effective_base.clone(), schema.clone());
                }
            }
        }
        if let Some(anchor) = schema.anchor().filter(|s| !s.is_empty()) {
            let key = (effective_base.clone(), anchor.to_owned());
            let mut map = self.anchor_index.write().unwrap();
            match map.get(&key) {
                Some(existing) if existing != schema => {
                    return Err(RegistryError::DuplicateAnchor {
                        base: effective_base.to_string(),
                        anchor: anchor.to_owned(),
                    });
                }
                _ => {
                    map.insert(key, schema.clone());
                }
            }
        }
        Ok(())
    }

    /// Strips any fragment before lookup; case- and trailing-slash-sensitive.
    #[must_use]
    pub fn lookup_by_id(&self, uri: &AbsoluteUri) -> Option<JsonSchema> {
        let key = uri.without_fragment();
        self.id_index.read().unwrap().get(&key).cloned()
    }

    #[must_use]
    pub fn lookup_by_anchor(&self, base: &AbsoluteUri, anchor: &str) -> Option<JsonSchema> {
        let key = (base.without_fragment(), anchor.to_owned());
        self.anchor_index.read().unwrap().get(&key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn schema_with(id: Option<&str>, anchor: Option<&str>) -> JsonSchema {
        let mut s = Schema::default();
        s.id = id.map(str::to_owned);
        s.anchor = anchor.map(str::to_owned);
        JsonSchema::object(Arc::new(s))
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let doc_base: AbsoluteUri = "https://example.com/doc.json".parse().unwrap();
        let registry = SchemaRegistry::new(doc_base.clone());

        let schema = schema_with(Some("https://example.com/doc.json"), Some("foo"));
        registry.register(&schema, &doc_base).unwrap();

        assert_eq!(registry.lookup_by_id(&doc_base), Some(schema.clone()));
        assert_eq!(registry.lookup_by_anchor(&doc_base, "foo"), Some(schema));
        assert!(registry.lookup_by_anchor(&doc_base, "missing").is_none());
    }

    #[test]
    fn registering_the_same_schema_twice_is_idempotent() {
        let doc_base: AbsoluteUri = "https://example.com/doc.json".parse().unwrap();
        let registry = SchemaRegistry::new(doc_base.clone());
        let schema = schema_with(None, Some("foo"));

        registry.register(&schema, &doc_base).unwrap();
        registry.register(&schema, &doc_base).unwrap();
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let doc_base: AbsoluteUri = "https://example.com/doc.json".parse().unwrap();
        let registry = SchemaRegistry::new(doc_base.clone());

        registry
            .register(&schema_with(Some("x"), None), &doc_base)
            .unwrap();
        let err = registry
            .register(&schema_with(Some("y"), None), &doc_base)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn duplicate_anchor_is_rejected() {
        let doc_base: AbsoluteUri = "https://example.com/doc.json".parse().unwrap();
        let registry = SchemaRegistry::new(doc_base.clone());

        registry
            .register(&schema_with(None, Some("a")), &doc_base)
            .unwrap();
        let err = registry
            .register(&schema_with(Some("distinct"), Some("a")), &doc_base)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAnchor { .. }));
    }

    proptest! {
        /// Base-URI monotonicity: a relative `$id` always resolves to a
        /// descendant of (or equal to) its fallback base, never escaping it
        /// to an unrelated host.
        #[test]
        fn relative_id_resolves_under_its_fallback_base(
            host in "[a-z]{1,8}",
            parent_path in "[a-z]{1,6}",
            relative_id in "[a-z]{1,6}\\.json",
        ) {
            let doc_base: AbsoluteUri = format!("https://{host}/root.json").parse().unwrap();
            let registry = SchemaRegistry::new(doc_base.clone());
            let parent_base: AbsoluteUri = format!("https://{host}/{parent_path}/").parse().unwrap();

            let effective = registry.compute_base(Some(&relative_id), Some(&parent_base)).unwrap();
            prop_assert_eq!(effective.scheme(), parent_base.scheme());
            prop_assert!(effective.to_string().starts_with(&parent_base.to_string()));
        }

        /// With no `$id` at all, the effective base is exactly the fallback
        /// (parent base if present, else the document base) — base
        /// computation never invents a URI out of nothing.
        #[test]
        fn absent_id_falls_back_to_parent_or_document_base(
            host in "[a-z]{1,8}",
            parent_path in "[a-z]{1,6}",
        ) {
            let doc_base: AbsoluteUri = format!("https://{host}/root.json").parse().unwrap();
            let registry = SchemaRegistry::new(doc_base.clone());
            let parent_base: AbsoluteUri = format!("https://{host}/{parent_path}").parse().unwrap();

            prop_assert_eq!(registry.compute_base(None, Some(&parent_base)).unwrap(), parent_base);
            prop_assert_eq!(registry.compute_base(None, None).unwrap(), doc_base.clone());
        }
    }
}
