//! `JsonSchema<K>`: the polymorphic {boolean, Schema} tagged variant, with a
//! capability marker that lets callers statically require "no `$ref`".

use std::{marker::PhantomData, sync::Arc};

use serde_json::Value;
use thiserror::Error;

use super::core::Schema;

mod sealed {
    pub trait Sealed {}
}

/// Marker for [`JsonSchema`]'s capability type parameter.
pub trait Capability: sealed::Sealed + 'static {}

/// May hold a `$ref`-bearing [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referenceable;
impl sealed::Sealed for Referenceable {}
impl Capability for Referenceable {}

/// Statically guaranteed not to hold a `$ref`-bearing [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concrete;
impl sealed::Sealed for Concrete {}
impl Capability for Concrete {}

/// Returned when a [`Referenceable`] `JsonSchema` wrapping a `$ref`-bearing
/// schema is converted to [`Concrete`].
#[derive(Debug, Clone, Error)]
#[error("schema carries a $ref and cannot be represented as a Concrete JsonSchema")]
pub struct NotConcreteError;

#[derive(Debug, Clone)]
enum Inner {
    Bool(bool),
    Object(Arc<Schema>),
}

/// A `JSONSchema<K>`: a boolean schema (`true`/`false`) or a full [`Schema`]
/// object, type-parametrized by whether it is statically known to be free of
/// `$ref`.
///
/// Invariant: a boolean variant matches everything (`true`) or nothing
/// (`false`) and has no children; it never carries a `$ref`.
#[derive(Debug, Clone)]
pub struct JsonSchema<K: Capability = Referenceable> {
    inner: Inner,
    _marker: PhantomData<K>,
}

impl<K: Capability> PartialEq for JsonSchema<K> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Inner::Bool(a), Inner::Bool(b)) => a == b,
            (Inner::Object(a), Inner::Object(b)) => Arc::ptr_eq(a, b) || a.is_equal(b),
            _ => false,
        }
    }
}

impl JsonSchema<Referenceable> {
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self {
            inner: Inner::Bool(value),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn object(schema: Arc<Schema>) -> Self {
        Self {
            inner: Inner::Object(schema),
            _marker: PhantomData,
        }
    }

    /// Attempts to narrow to [`Concrete`]; fails iff this wraps a
    /// `$ref`-bearing schema.
    ///
    /// # Errors
    /// Returns [`NotConcreteError`] if `self.is_reference()`.
    pub fn try_into_concrete(self) -> Result<JsonSchema<Concrete>, NotConcreteError> {
        if self.is_reference() {
            return Err(NotConcreteError);
        }
        Ok(JsonSchema {
            inner: self.inner,
            _marker: PhantomData,
        })
    }
}

impl JsonSchema<Concrete> {
    /// Constructs a `Concrete` schema, failing if `schema` carries a `$ref`.
    ///
    /// # Errors
    /// Returns [`NotConcreteError`] if `schema.is_reference()`.
    pub fn try_object(schema: Arc<Schema>) -> Result<Self, NotConcreteError> {
        if schema.is_reference() {
            return Err(NotConcreteError);
        }
        Ok(Self {
            inner: Inner::Object(schema),
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self {
            inner: Inner::Bool(value),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn into_referenceable(self) -> JsonSchema<Referenceable> {
        JsonSchema {
            inner: self.inner,
            _marker: PhantomData,
        }
    }
}

impl<K: Capability> JsonSchema<K> {
    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self.inner, Inner::Bool(_))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.inner {
            Inner::Bool(b) => Some(b),
            Inner::Object(_) => None,
        }
    }

    #[must_use]
    pub fn as_schema(&self) -> Option<&Arc<Schema>> {
        match &self.inner {
            Inner::Object(s) => Some(s),
            Inner::Bool(_) => None,
        }
    }

    /// `true` iff this is a `$ref`-bearing [`Schema`]; always `false` for a
    /// boolean schema.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.as_schema().is_some_and(|s| s.is_reference())
    }

    /// The raw `$ref` string, if any.
    #[must_use]
    pub fn ref_(&self) -> Option<&str> {
        self.as_schema().and_then(|s| s.ref_.as_deref())
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.as_schema().and_then(|s| s.id.as_deref())
    }

    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.as_schema().and_then(|s| s.anchor.as_deref())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.as_schema().and_then(|s| s.title.as_deref())
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.as_schema().and_then(|s| s.description.as_deref())
    }

    /// `type` normalized to a list; empty for a boolean schema or a schema
    /// without `type`.
    #[must_use]
    pub fn types(&self) -> &[String] {
        self.as_schema().map_or(&[], |s| s.types.as_slice())
    }

    #[must_use]
    pub fn required(&self) -> &[String] {
        self.as_schema().map_or(&[], |s| s.required.as_slice())
    }

    /// Looks up the raw `serde_json::Value` for a vocabulary-unaware field by
    /// on-wire name, falling back to the extension map. Used by the generic
    /// JSON Pointer navigator (§4.D.iii) for fields that are not modeled as
    /// structured accessors.
    #[must_use]
    pub fn extra_field(&self, name: &str) -> Option<&Value> {
        self.as_schema().and_then(|s| s.extra.get(name))
    }

    /// Structural equality per §4.A `IsEqual`: recurses into children,
    /// treats nil/empty containers as equal, ignores ephemeral links.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

impl<K: Capability> Default for JsonSchema<K> {
    fn default() -> Self {
        Self {
            inner: Inner::Bool(true),
            _marker: PhantomData,
        }
    }
}
