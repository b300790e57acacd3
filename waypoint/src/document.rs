//! The registry-provider capability (§6.3) and a concrete in-memory
//! [`Document`] implementing it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use waypoint_uri::AbsoluteUri;

use crate::registry::SchemaRegistry;
use crate::schema::JsonSchema;

/// Capability a type must expose to participate in resolution: its own
/// schema registry, its base URI, and a two-tier cache for externally
/// fetched documents (§4.E).
///
/// A schema's back-pointer to its owning document is a [`std::sync::Weak`]
/// reference (§9): the document owns the schema tree; a schema observing
/// its document must never extend the document's lifetime.
pub trait RegistryProvider: fmt::Debug + Send + Sync {
    fn schema_registry(&self) -> &SchemaRegistry;
    fn document_base_uri(&self) -> AbsoluteUri;
    fn root_schema(&self) -> Option<JsonSchema>;

    fn get_cached_reference_document(&self, key: &AbsoluteUri) -> Option<Vec<u8>>;
    fn store_reference_document_in_cache(&self, key: AbsoluteUri, bytes: Vec<u8>);
    fn get_cached_referenced_object(&self, key: &AbsoluteUri) -> Option<JsonSchema>;
    fn store_referenced_object_in_cache(&self, key: AbsoluteUri, object: JsonSchema);
    fn init_cache(&self);
}

/// A parsed document (root schema + registry + fetch caches), owning its
/// entire schema tree.
#[derive(Debug)]
pub struct Document {
    base_uri: AbsoluteUri,
    registry: SchemaRegistry,
    root: RwLock<Option<JsonSchema>>,
    bytes_cache: RwLock<HashMap<AbsoluteUri, Vec<u8>>>,
    object_cache: RwLock<HashMap<AbsoluteUri, JsonSchema>>,
}

impl Document {
    #[must_use]
    pub fn new(base_uri: AbsoluteUri) -> Arc<Self> {
        Arc::new(Self {
            registry: SchemaRegistry::new(base_uri.clone()),
            base_uri,
            root: RwLock::new(None),
            bytes_cache: RwLock::new(HashMap::new()),
            object_cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn set_root(&self, root: JsonSchema) {
        *self.root.write().unwrap() = Some(root);
    }

    #[must_use]
    pub fn root(&self) -> Option<JsonSchema> {
        self.root.read().unwrap().clone()
    }
}

impl RegistryProvider for Document {
    fn schema_registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn document_base_uri(&self) -> AbsoluteUri {
        self.base_uri.clone()
    }

    fn root_schema(&self) -> Option<JsonSchema> {
        self.root()
    }

    fn get_cached_reference_document(&self, key: &AbsoluteUri) -> Option<Vec<u8>> {
        self.bytes_cache.read().unwrap().get(key).cloned()
    }

    fn store_reference_document_in_cache(&self, key: AbsoluteUri, bytes: Vec<u8>) {
        self.bytes_cache.write().unwrap().insert(key, bytes);
    }

    fn get_cached_referenced_object(&self, key: &AbsoluteUri) -> Option<JsonSchema> {
        self.object_cache.read().unwrap().get(key).cloned()
    }

    fn store_referenced_object_in_cache(&self, key: AbsoluteUri, object: JsonSchema) {
        self.object_cache.write().unwrap().insert(key, object);
    }

    fn init_cache(&self) {
        self.bytes_cache.write().unwrap().clear();
        self.object_cache.write().unwrap().clear();
    }
}
