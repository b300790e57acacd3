//! End-to-end resolution scenarios (§8), exercised hermetically through
//! `waypoint::testing`'s in-memory filesystem/HTTP doubles.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use waypoint::testing::{InMemoryFs, InMemoryHttpClient};
use waypoint::{resolve, Context, Document, Loader, LoaderError, RegistryProvider, ResolveError, ResolveOptions, VirtualFs};
use waypoint_uri::AbsoluteUri;

fn loader(fs: InMemoryFs, http: Option<InMemoryHttpClient>) -> Arc<Loader> {
    let http: Option<Arc<dyn waypoint::HttpClient>> = http.map(|h| Arc::new(h) as Arc<dyn waypoint::HttpClient>);
    Arc::new(Loader::new(Arc::new(fs), http, Duration::from_secs(5)))
}

/// Wraps an [`InMemoryFs`], counting every `read` call, so a test can assert
/// on how many times the underlying filesystem was actually touched.
#[derive(Debug, Default)]
struct CountingFs {
    inner: InMemoryFs,
    reads: AtomicUsize,
}

impl CountingFs {
    fn new() -> Self {
        Self::default()
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl VirtualFs for CountingFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>, LoaderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(path)
    }
}

#[test]
fn local_defs_resolves_through_pointer() {
    let base: AbsoluteUri = "https://example.com/schema.json".parse().unwrap();
    let value = json!({
        "$defs": { "User": { "type": "object" } },
        "properties": { "u": { "$ref": "#/$defs/User" } }
    });

    let doc = Document::new(base);
    let provider: Arc<dyn RegistryProvider> = doc.clone();
    let root = waypoint::populate(&value, None, None, &provider).unwrap();
    doc.set_root(root.clone());

    let u_schema = root
        .as_schema()
        .unwrap()
        .properties
        .get("u")
        .unwrap()
        .as_schema()
        .unwrap()
        .clone();

    let options = ResolveOptions::new(loader(InMemoryFs::new(), None)).with_root_document(provider);
    let ctx = Context::new();
    let result = resolve(&u_schema, &ctx, &options).unwrap();

    assert_eq!(result.object.types(), &["object".to_string()]);
    let terminal = result.object.as_schema().unwrap();
    assert!(Arc::ptr_eq(&terminal.get_parent().unwrap(), &u_schema));
    assert!(Arc::ptr_eq(&terminal.get_top_level_parent().unwrap(), &u_schema));
}

#[test]
fn chained_defs_skips_the_intermediate_reference() {
    let base: AbsoluteUri = "https://example.com/schema.json".parse().unwrap();
    let value = json!({
        "$defs": {
            "ChainedRef": { "$ref": "#/$defs/ChainedTarget" },
            "ChainedTarget": {
                "type": "object",
                "properties": { "value": { "type": "string" } }
            }
        },
        "properties": { "chainedRef": { "$ref": "#/$defs/ChainedRef" } }
    });

    let doc = Document::new(base);
    let provider: Arc<dyn RegistryProvider> = doc.clone();
    let root = waypoint::populate(&value, None, None, &provider).unwrap();
    doc.set_root(root.clone());

    let chained_ref_schema = root
        .as_schema()
        .unwrap()
        .properties
        .get("chainedRef")
        .unwrap()
        .as_schema()
        .unwrap()
        .clone();

    let options = ResolveOptions::new(loader(InMemoryFs::new(), None)).with_root_document(provider);
    let ctx = Context::new();
    let result = resolve(&chained_ref_schema, &ctx, &options).unwrap();

    assert_eq!(result.object.types(), &["object".to_string()]);
    assert!(result.object.as_schema().unwrap().properties.contains_key("value"));
}

#[test]
fn sibling_references_to_the_same_external_document_share_one_fetch() {
    let base: AbsoluteUri = "file:///root.json".parse().unwrap();
    let value = json!({
        "properties": {
            "a": { "$ref": "shared.json#/$defs/Foo" },
            "b": { "$ref": "shared.json#/$defs/Bar" }
        }
    });

    let doc = Document::new(base);
    let provider: Arc<dyn RegistryProvider> = doc.clone();
    let root = waypoint::populate(&value, None, None, &provider).unwrap();
    doc.set_root(root.clone());

    let properties = &root.as_schema().unwrap().properties;
    let a_schema = properties.get("a").unwrap().as_schema().unwrap().clone();
    let b_schema = properties.get("b").unwrap().as_schema().unwrap().clone();

    let fs = Arc::new(CountingFs::new());
    fs.inner.insert(
        "/shared.json",
        br#"{"$defs":{"Foo":{"type":"string"},"Bar":{"type":"number"}}}"#.to_vec(),
    );
    let loader = Arc::new(Loader::new(fs.clone(), None, Duration::from_secs(5)));
    let options = ResolveOptions::new(loader).with_root_document(provider);
    let ctx = Context::new();

    let a_result = resolve(&a_schema, &ctx, &options).unwrap();
    let b_result = resolve(&b_schema, &ctx, &options).unwrap();

    assert_eq!(a_result.object.types(), &["string".to_string()]);
    assert_eq!(b_result.object.types(), &["number".to_string()]);
    assert_eq!(fs.reads(), 1, "second sibling reference should hit the cache, not the filesystem");
}

#[test]
fn external_reference_resolves_against_id_base_not_fetch_url() {
    let pet_base: AbsoluteUri = "https://example.com/api/v3/schemas/pet.json".parse().unwrap();
    let pet_value = json!({
        "$id": "https://example.com/api/v3/schemas/pet.json",
        "properties": { "name": { "$ref": "./components/name.json" } }
    });

    let pet_doc = Document::new(pet_base.clone());
    let pet_provider: Arc<dyn RegistryProvider> = pet_doc.clone();
    let pet_root = waypoint::populate(&pet_value, None, None, &pet_provider).unwrap();
    pet_doc.set_root(pet_root.clone());

    let name_schema = pet_root
        .as_schema()
        .unwrap()
        .properties
        .get("name")
        .unwrap()
        .as_schema()
        .unwrap()
        .clone();

    let name_uri: AbsoluteUri = "https://example.com/api/v3/schemas/components/name.json"
        .parse()
        .unwrap();
    let http = InMemoryHttpClient::new();
    http.insert(name_uri.clone(), br#"{"type":"string"}"#.to_vec());

    let options = ResolveOptions::new(loader(InMemoryFs::new(), Some(http))).with_root_document(pet_provider);
    let ctx = Context::new();
    let result = resolve(&name_schema, &ctx, &options).unwrap();

    assert_eq!(result.object.types(), &["string".to_string()]);
    assert_eq!(result.absolute_document_path, name_uri);
}

#[test]
fn anchor_in_external_file_resolves() {
    let root_base: AbsoluteUri = "file:///root.json".parse().unwrap();
    let root_value = json!({ "$ref": "schema.json#myAnchor" });

    let root_doc = Document::new(root_base);
    let root_provider: Arc<dyn RegistryProvider> = root_doc.clone();
    let root_wrapped = waypoint::populate(&root_value, None, None, &root_provider).unwrap();
    root_doc.set_root(root_wrapped.clone());
    let root_schema = root_wrapped.as_schema().unwrap().clone();

    let fs = InMemoryFs::new();
    fs.insert(
        "/schema.json",
        br#"{"$defs":{"foo":{"$anchor":"myAnchor","type":"string"}}}"#.to_vec(),
    );

    let options = ResolveOptions::new(loader(fs, None)).with_root_document(root_provider);
    let ctx = Context::new();
    let result = resolve(&root_schema, &ctx, &options).unwrap();

    assert_eq!(result.object.types(), &["string".to_string()]);
}

#[test]
fn circular_reference_is_detected() {
    let a_base: AbsoluteUri = "file:///a.yaml".parse().unwrap();
    let a_value = json!({ "$ref": "b.yaml" });

    let a_doc = Document::new(a_base);
    let a_provider: Arc<dyn RegistryProvider> = a_doc.clone();
    let a_wrapped = waypoint::populate(&a_value, None, None, &a_provider).unwrap();
    a_doc.set_root(a_wrapped.clone());
    let a_schema = a_wrapped.as_schema().unwrap().clone();

    let fs = InMemoryFs::new();
    fs.insert("/b.yaml", br#"{"$ref":"a.yaml"}"#.to_vec());

    let options = ResolveOptions::new(loader(fs, None)).with_root_document(a_provider);
    let ctx = Context::new();
    let err = resolve(&a_schema, &ctx, &options).unwrap_err();

    match err {
        ResolveError::CircularReference { chain } => {
            assert!(chain.iter().any(|k| k.contains("a.yaml")));
            assert!(chain.iter().any(|k| k.contains("b.yaml")));
        }
        other => panic!("expected CircularReference, got {other:?}"),
    }
}

#[test]
fn duplicate_anchor_in_same_resource_is_rejected() {
    let base: AbsoluteUri = "https://example.com/dup.json".parse().unwrap();
    let value = json!({
        "$id": "https://example.com/dup.json",
        "properties": {
            "a": { "$anchor": "x", "type": "string" },
            "b": { "$anchor": "x", "type": "number" }
        }
    });

    let doc = Document::new(base);
    let provider: Arc<dyn RegistryProvider> = doc.clone();
    let err = waypoint::populate(&value, None, None, &provider).unwrap_err();

    match err {
        waypoint::RegistryError::DuplicateAnchor { anchor, .. } => assert_eq!(anchor, "x"),
        other => panic!("expected DuplicateAnchor, got {other:?}"),
    }
}

