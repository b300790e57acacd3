//! JSON Schema reference resolution for OpenAPI 3.0/3.1/3.2 and standalone
//! JSON Schema 2020-12 documents.
//!
//! The schema tree ([`schema::Schema`]/[`schema::JsonSchema`]) is built once
//! by [`schema::populate`], indexed by [`registry::SchemaRegistry`], and
//! walked by [`resolver::resolve`] to dereference `$ref` chains across
//! local `$defs`, named anchors, canonical IDs, and external documents
//! fetched through [`loader::Loader`].

#![deny(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]

pub mod document;
pub mod error;
pub mod loader;
pub mod location;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod testing;

pub use document::{Document, RegistryProvider};
pub use error::{LoaderError, PointerError, RegistryError, ResolveError};
pub use loader::{HttpClient, Loader, OsFs, VirtualFs};
pub use location::Location;
pub use registry::SchemaRegistry;
pub use resolver::{resolve, Context, ResolveOptions, ResolveResult, Resolver};
pub use schema::{populate, Concrete, DialectVersion, ExclusiveBound, JsonSchema, Referenceable, Schema};

#[cfg(feature = "http")]
pub use loader::ReqwestHttpClient;
