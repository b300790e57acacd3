//! The schema tree: vocabulary model, polymorphic wrapper, population from
//! raw JSON, and generic JSON Pointer navigation over the tree.

mod core;
mod dialect;
mod json_schema;
mod pointer_nav;
mod populate;

pub use core::Schema;
pub use dialect::{DialectVersion, ExclusiveBound};
pub use json_schema::{Concrete, JsonSchema, NotConcreteError, Referenceable};
pub use pointer_nav::{navigate, PointerNavigable};
pub use populate::populate;
