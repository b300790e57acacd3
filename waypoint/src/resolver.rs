//! The reference resolver (§4.D): a synchronous, recursive walk from a
//! reference-bearing [`Schema`] to its terminal target, suspending only at
//! [`crate::loader::Loader`] calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use waypoint_uri::AbsoluteUri;

use crate::document::{Document, RegistryProvider};
use crate::error::{PointerError, ResolveError};
use crate::loader::{parse_document, Loader};
use crate::reference::{extract_anchor, is_absolute_uri, is_anchor_reference, split_reference, unescape_token};
use crate::schema::{navigate, populate, JsonSchema, Schema};

/// Cancellation flag and deadline, carried by every public entry point
/// (§5): the resolver checks it between reference hops and before each
/// loader call. No async runtime is required — this is a plain shared flag
/// plus a timestamp.
#[derive(Debug, Clone)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ResolveError> {
        if self.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ResolveError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// The resolver's configuration surface (§2.4, §4.D).
#[derive(Clone)]
pub struct ResolveOptions {
    /// Base URI of the calling context; used when a schema has no
    /// `effectiveBaseURI` of its own (e.g. a bare node built outside
    /// population).
    pub target_location: Option<AbsoluteUri>,
    /// The owning document: registry provider and cache for this walk.
    pub root_document: Option<Arc<dyn RegistryProvider>>,
    /// Overrides `root_document` for nested walks (fragment-only references
    /// inside an already-fetched external document).
    pub target_document: Option<Arc<dyn RegistryProvider>>,
    pub loader: Arc<Loader>,
    pub max_depth: usize,
}

impl std::fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("target_location", &self.target_location)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl ResolveOptions {
    #[must_use]
    pub fn new(loader: Arc<Loader>) -> Self {
        Self {
            target_location: None,
            root_document: None,
            target_document: None,
            loader,
            max_depth: 100,
        }
    }

    #[must_use]
    pub fn with_root_document(mut self, doc: Arc<dyn RegistryProvider>) -> Self {
        self.root_document = Some(doc);
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// The outcome of a successful resolution (§3 `ResolveResult`).
#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub object: JsonSchema,
    pub absolute_document_path: AbsoluteUri,
    pub absolute_reference: AbsoluteUri,
    pub resolved_document: Option<Value>,
}

/// Thin, stateless wrapper pairing a [`ResolveOptions`] with the entry
/// point, so callers don't have to thread options through by hand.
#[derive(Debug, Clone)]
pub struct Resolver {
    options: ResolveOptions,
}

impl Resolver {
    #[must_use]
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    /// # Errors
    /// See [`resolve`].
    pub fn resolve(&self, schema: &Arc<Schema>, ctx: &Context) -> Result<ResolveResult, ResolveError> {
        resolve(schema, ctx, &self.options)
    }
}

/// Entry point (§4.D `Schema.Resolve`). Populates `schema`'s resolution
/// cache on success; leaves it untouched on failure.
///
/// # Errors
/// Returns the error kinds listed in §4.D's failure-semantics table.
#[instrument(skip(ctx, options), fields(reference = schema.ref_.as_deref().unwrap_or("")))]
pub fn resolve(schema: &Arc<Schema>, ctx: &Context, options: &ResolveOptions) -> Result<ResolveResult, ResolveError> {
    ctx.check()?;

    if let Some(cached) = schema.cached_resolution() {
        debug!("resolution cache hit");
        return Ok(cached);
    }

    if !schema.is_reference() {
        let result = terminal_result(schema, options)?;
        schema.set_cached_resolution(Some(result.clone()));
        return Ok(result);
    }

    // Seed the visitor set with this schema's own document-level location so
    // that a reference chain looping back to where it started (e.g. a.yaml
    // <-> b.yaml) is recognized even though nothing ever "departs to" the
    // starting node explicitly.
    let mut visited = Vec::new();
    if let Some(base) = schema.get_effective_base_uri() {
        visited.push(format!("{}#", base.without_fragment()));
    }
    let result = walk(schema, schema, schema, ctx, options, &mut visited, 0)?;
    schema.set_cached_resolution(Some(result.clone()));
    Ok(result)
}

fn terminal_result(schema: &Arc<Schema>, options: &ResolveOptions) -> Result<ResolveResult, ResolveError> {
    let doc_base = schema_base_or_fallback(schema, options, "")?;
    Ok(ResolveResult {
        object: JsonSchema::object(Arc::clone(schema)),
        absolute_document_path: doc_base.clone(),
        absolute_reference: doc_base,
        resolved_document: None,
    })
}

fn schema_base_or_fallback(
    schema: &Arc<Schema>,
    options: &ResolveOptions,
    reference: &str,
) -> Result<AbsoluteUri, ResolveError> {
    if let Some(base) = schema.get_effective_base_uri() {
        return Ok(base);
    }
    document_base(options, reference)
}

fn document_base(options: &ResolveOptions, reference: &str) -> Result<AbsoluteUri, ResolveError> {
    options
        .root_document
        .as_ref()
        .map(|d| d.document_base_uri())
        .or_else(|| options.target_location.clone())
        .ok_or_else(|| ResolveError::MissingRootDocument {
            reference: reference.to_owned(),
        })
}

/// State machine per node: `walk` is the `Resolving` state; it returns
/// either `Resolved` (`Ok`) or `Failed` (`Err`, cache left empty).
#[allow(clippy::too_many_arguments)]
fn walk(
    current: &Arc<Schema>,
    previous: &Arc<Schema>,
    first_caller: &Arc<Schema>,
    ctx: &Context,
    options: &ResolveOptions,
    visited: &mut Vec<String>,
    depth: usize,
) -> Result<ResolveResult, ResolveError> {
    ctx.check()?;

    if depth > options.max_depth {
        return Err(ResolveError::MaxDepthExceeded {
            reference: current.ref_.clone().unwrap_or_default(),
            max_depth: options.max_depth,
        });
    }

    if !current.is_reference() {
        let doc_base = schema_base_or_fallback(current, options, "")?;
        current.set_parent(Some(Arc::downgrade(previous)));
        current.set_top_level_parent(Some(Arc::downgrade(first_caller)));
        return Ok(ResolveResult {
            object: JsonSchema::object(Arc::clone(current)),
            absolute_document_path: doc_base.clone(),
            absolute_reference: doc_base,
            resolved_document: None,
        });
    }

    let r = current.ref_.clone().unwrap_or_default();
    let effective_base = schema_base_or_fallback(current, options, &r)?;

    let target_key = normalize_reference_key(&r, &effective_base)?;
    if visited.contains(&target_key) {
        let mut chain = visited.clone();
        chain.push(target_key);
        return Err(ResolveError::CircularReference { chain });
    }
    visited.push(target_key);

    let landed = land_reference(current, &r, &effective_base, options, ctx)?;

    match landed.object.as_schema() {
        Some(next) if next.is_reference() => {
            let next = Arc::clone(next);
            walk(&next, current, first_caller, ctx, options, visited, depth + 1)
        }
        _ => {
            if let Some(terminal) = landed.object.as_schema() {
                terminal.set_parent(Some(Arc::downgrade(current)));
                terminal.set_top_level_parent(Some(Arc::downgrade(first_caller)));
            }
            Ok(ResolveResult {
                object: landed.object,
                absolute_document_path: landed.absolute_document_path,
                absolute_reference: landed.absolute_reference,
                resolved_document: landed.resolved_document,
            })
        }
    }
}

fn normalize_reference_key(r: &str, effective_base: &AbsoluteUri) -> Result<String, ResolveError> {
    let (uri_part, frag) = split_reference(r);
    let base = if uri_part.is_empty() {
        effective_base.clone()
    } else if is_absolute_uri(uri_part) {
        uri_part.parse::<AbsoluteUri>()?
    } else {
        effective_base.resolve(uri_part)?
    };
    Ok(format!("{}#{frag}", base.without_fragment()))
}

/// One hop's landing spot: either a terminal schema or another reference,
/// plus the document-level context needed to build a [`ResolveResult`] if
/// it turns out to be terminal.
struct Landed {
    object: JsonSchema,
    absolute_document_path: AbsoluteUri,
    absolute_reference: AbsoluteUri,
    resolved_document: Option<Value>,
}

fn land_reference(
    current: &Arc<Schema>,
    r: &str,
    effective_base: &AbsoluteUri,
    options: &ResolveOptions,
    ctx: &Context,
) -> Result<Landed, ResolveError> {
    if let Some(landed) = registry_fast_path(r, effective_base, options)? {
        debug!(reference = r, "registry fast path hit");
        return Ok(landed);
    }

    let (uri_part, frag) = split_reference(r);

    if uri_part.is_empty() {
        if frag.starts_with("/$defs/") || frag.starts_with("/definitions/") {
            return try_resolve_local_defs(current, frag, effective_base);
        }
        if frag.starts_with('/') {
            return navigate_fragment_only(frag, effective_base, options);
        }
        return Err(ResolveError::AnchorNotFound {
            base: effective_base.to_string(),
            anchor: frag.to_owned(),
        });
    }

    let absolute_uri = if is_absolute_uri(uri_part) {
        uri_part.parse::<AbsoluteUri>()?
    } else {
        effective_base.resolve(uri_part)?
    };

    if frag.is_empty() {
        resolve_uri_only(&absolute_uri, options, ctx)
    } else if frag.starts_with('/') {
        resolve_external_ref_with_fragment(&absolute_uri, frag, options, ctx)
    } else {
        resolve_external_anchor(&absolute_uri, frag, options, ctx)
    }
}

/// §4.D step 4: consult the registry before falling back to fetch/navigate.
fn registry_fast_path(
    r: &str,
    effective_base: &AbsoluteUri,
    options: &ResolveOptions,
) -> Result<Option<Landed>, ResolveError> {
    let Some(root) = options.root_document.as_ref() else {
        return Ok(None);
    };
    let registry = root.schema_registry();

    let found = if is_anchor_reference(r) {
        let anchor = extract_anchor(r);
        registry
            .lookup_by_anchor(effective_base, anchor)
            .or_else(|| registry.lookup_by_anchor(&root.document_base_uri(), anchor))
    } else if is_absolute_uri(r) {
        let abs = r.parse::<AbsoluteUri>()?;
        registry.lookup_by_id(&abs)
    } else if !r.contains('#') {
        let resolved = effective_base.resolve(r)?;
        registry.lookup_by_id(&resolved)
    } else {
        None
    };

    Ok(found.map(|object| Landed {
        object,
        absolute_document_path: root.document_base_uri(),
        absolute_reference: effective_base.clone(),
        resolved_document: None,
    }))
}

/// §4.D.i: `#/$defs/Name[...]` scoped to the nearest `$id`-bearing resource,
/// falling back to the reference-bearing parent chain on a local miss.
fn try_resolve_local_defs(
    current: &Arc<Schema>,
    frag: &str,
    effective_base: &AbsoluteUri,
) -> Result<Landed, ResolveError> {
    let rest = frag.trim_start_matches('/');
    let mut parts = rest.splitn(2, '/');
    let _defs_keyword = parts.next().unwrap_or_default();
    let after_defs = parts.next().unwrap_or_default();
    let mut name_and_rest = after_defs.splitn(2, '/');
    let name_token = name_and_rest.next().unwrap_or_default();
    let name = unescape_token(name_token);
    let remaining_pointer = name_and_rest.next();

    let mut candidate = Some(Arc::clone(current));
    while let Some(node) = candidate {
        if let Some(target) = node.defs.get(name.as_ref()) {
            let object = match remaining_pointer {
                Some(rest_ptr) => navigate(target, &format!("/{rest_ptr}"))?,
                None => target.clone(),
            };
            return Ok(Landed {
                object,
                absolute_document_path: effective_base.clone(),
                absolute_reference: effective_base.clone(),
                resolved_document: None,
            });
        }
        candidate = node.get_parent();
    }

    Err(ResolveError::Pointer(PointerError::NotFound {
        pointer: frag.to_owned(),
        segment: name.into_owned(),
    }))
}

/// §4.D.iii: `#/...` navigated within `targetDocument`'s tree.
fn navigate_fragment_only(
    frag: &str,
    effective_base: &AbsoluteUri,
    options: &ResolveOptions,
) -> Result<Landed, ResolveError> {
    let doc = options
        .target_document
        .clone()
        .or_else(|| options.root_document.clone())
        .ok_or_else(|| ResolveError::MissingRootDocument {
            reference: format!("#{frag}"),
        })?;
    let root = doc.root_schema().ok_or_else(|| ResolveError::UnresolvableTarget {
        uri: doc.document_base_uri().to_string(),
        found: "document has no root schema".to_owned(),
    })?;
    let object = navigate(&root, frag)?;
    Ok(Landed {
        object,
        absolute_document_path: doc.document_base_uri(),
        absolute_reference: effective_base.clone(),
        resolved_document: None,
    })
}

/// Fetches `uri`, installs a fresh registry over the parsed document
/// (walking it once via [`crate::schema::populate::populate`] so every
/// nested `$id`/`$anchor` is registered), and returns it alongside the raw
/// parsed value.
///
/// Two-tier cache on `options.root_document` (§4.E): a hit on the
/// parsed-object tier reuses the already-populated registry/root (shared
/// across sibling references to the same `uri`, without a second fetch or a
/// second population pass); the bytes tier still backs a cheap, I/O-free
/// re-parse of the original document.
fn fetch_and_install_registry(
    uri: &AbsoluteUri,
    options: &ResolveOptions,
) -> Result<(Arc<dyn RegistryProvider>, Value), ResolveError> {
    if let Some(root_doc) = &options.root_document {
        if let Some(cached_root) = root_doc.get_cached_referenced_object(uri) {
            if let Some(owning_doc) = cached_root.as_schema().and_then(|s| s.owning_document()) {
                debug!(uri = %uri, "reference document cache hit");
                let value = match root_doc.get_cached_reference_document(uri) {
                    Some(bytes) => parse_document(uri, &bytes)?,
                    None => options.loader.load(uri)?.1,
                };
                return Ok((owning_doc, value));
            }
        }
    }

    let (bytes, value) = options.loader.load(uri)?;

    let canonical_base = value
        .get("$id")
        .and_then(Value::as_str)
        .filter(|s| is_absolute_uri(s))
        .map(str::parse::<AbsoluteUri>)
        .transpose()?
        .unwrap_or_else(|| uri.clone());

    let document = Document::new(canonical_base);
    let provider: Arc<dyn RegistryProvider> = document.clone();
    let root = populate(&value, None, None, &provider)?;
    document.set_root(root.clone());

    if let Some(root_doc) = &options.root_document {
        root_doc.store_reference_document_in_cache(uri.clone(), bytes);
        root_doc.store_referenced_object_in_cache(uri.clone(), root);
    }

    Ok((provider, value))
}

/// §4.D step 5 "URI only": fetch, register, return the document root.
fn resolve_uri_only(uri: &AbsoluteUri, options: &ResolveOptions, ctx: &Context) -> Result<Landed, ResolveError> {
    ctx.check()?;
    let (doc, value) = fetch_and_install_registry(uri, options)?;
    let root = doc.root_schema().ok_or_else(|| ResolveError::UnresolvableTarget {
        uri: uri.to_string(),
        found: "fetched document has no usable root schema".to_owned(),
    })?;
    Ok(Landed {
        object: root,
        absolute_document_path: doc.document_base_uri(),
        absolute_reference: doc.document_base_uri(),
        resolved_document: Some(value),
    })
}

/// §4.D.ii: external reference with a JSON-pointer fragment.
fn resolve_external_ref_with_fragment(
    uri: &AbsoluteUri,
    frag: &str,
    options: &ResolveOptions,
    ctx: &Context,
) -> Result<Landed, ResolveError> {
    ctx.check()?;
    let (doc, value) = fetch_and_install_registry(uri, options)?;
    let root = doc.root_schema().ok_or_else(|| ResolveError::UnresolvableTarget {
        uri: uri.to_string(),
        found: "fetched document has no usable root schema".to_owned(),
    })?;
    let object = navigate(&root, frag)?;
    if let Some(schema) = object.as_schema() {
        schema.set_owning_document(Some(&doc));
        schema.set_effective_base_uri(doc.document_base_uri());
    }
    Ok(Landed {
        object,
        absolute_document_path: doc.document_base_uri(),
        absolute_reference: doc.document_base_uri(),
        resolved_document: Some(value),
    })
}

/// §4.D.iv: external anchor lookup; falls through from the canonical `$id`
/// base to the raw fetch URL, since the two can legitimately differ.
fn resolve_external_anchor(
    uri: &AbsoluteUri,
    anchor: &str,
    options: &ResolveOptions,
    ctx: &Context,
) -> Result<Landed, ResolveError> {
    ctx.check()?;
    let (doc, value) = fetch_and_install_registry(uri, options)?;
    let canonical_base = doc.document_base_uri();
    let registry = doc.schema_registry();
    let found = registry.lookup_by_anchor(&canonical_base, anchor).or_else(|| {
        if &canonical_base != uri {
            warn!(anchor, canonical = %canonical_base, fetch = %uri, "anchor miss on canonical $id, retrying with fetch URL");
            registry.lookup_by_anchor(uri, anchor)
        } else {
            None
        }
    });
    let object = found.ok_or_else(|| ResolveError::AnchorNotFound {
        base: canonical_base.to_string(),
        anchor: anchor.to_owned(),
    })?;
    Ok(Landed {
        object,
        absolute_document_path: canonical_base.clone(),
        absolute_reference: canonical_base,
        resolved_document: Some(value),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::document::Document;
    use crate::loader::Loader;
    use crate::testing::InMemoryFs;

    use super::*;

    /// §8 Invariant 1: a second `resolve()` call on an already-resolved
    /// schema performs no I/O. Proven here by pointing the second call's
    /// loader at an empty filesystem that would error on any fetch.
    #[test]
    fn second_resolution_performs_no_io() {
        let base: AbsoluteUri = "file:///root.json".parse().unwrap();
        let value = json!({ "$ref": "other.json" });

        let doc = Document::new(base);
        let provider: Arc<dyn RegistryProvider> = doc.clone();
        let wrapped = populate(&value, None, None, &provider).unwrap();
        doc.set_root(wrapped.clone());
        let schema = wrapped.as_schema().unwrap().clone();

        let fs = InMemoryFs::new();
        fs.insert("/other.json", br#"{"type":"string"}"#.to_vec());
        let loader = Arc::new(Loader::new(Arc::new(fs), None, Duration::from_secs(5)));
        let options = ResolveOptions::new(loader).with_root_document(provider.clone());
        let ctx = Context::new();

        let first = resolve(&schema, &ctx, &options).unwrap();
        assert_eq!(first.object.types(), &["string".to_string()]);

        let empty_loader = Arc::new(Loader::new(Arc::new(InMemoryFs::new()), None, Duration::from_secs(5)));
        let second_options = ResolveOptions::new(empty_loader).with_root_document(provider);
        let second = resolve(&schema, &ctx, &second_options).unwrap();
        assert_eq!(second.object.types(), &["string".to_string()]);
    }

    /// The anchor-fallback path: a miss against the canonical `$id` base
    /// retries against the raw fetch URL.
    #[test]
    fn anchor_resolution_falls_back_to_fetch_url_on_canonical_miss() {
        let base: AbsoluteUri = "file:///root.json".parse().unwrap();
        let value = json!({ "$ref": "other.json#frag" });

        let doc = Document::new(base);
        let provider: Arc<dyn RegistryProvider> = doc.clone();
        let wrapped = populate(&value, None, None, &provider).unwrap();
        doc.set_root(wrapped.clone());
        let schema = wrapped.as_schema().unwrap().clone();

        let fs = InMemoryFs::new();
        // No `$id`, so the fetched document's canonical base is its fetch
        // URL already — the distinct-canonical-base branch is exercised by
        // Scenario 4 in `tests/resolution.rs`; here we confirm the anchor
        // is still found via the single (matching) base.
        fs.insert(
            "/other.json",
            br#"{"$defs":{"x":{"$anchor":"frag","type":"boolean"}}}"#.to_vec(),
        );
        let loader = Arc::new(Loader::new(Arc::new(fs), None, Duration::from_secs(5)));
        let options = ResolveOptions::new(loader).with_root_document(provider);
        let ctx = Context::new();

        let result = resolve(&schema, &ctx, &options).unwrap();
        assert_eq!(result.object.types(), &["boolean".to_string()]);
    }
}
