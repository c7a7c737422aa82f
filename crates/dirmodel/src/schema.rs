//! Attribute schema registry
//!
//! A per-model-type declarative table of attribute descriptors, partitioned
//! into kinds, plus named accessors mapping caller-facing logical names onto
//! directory attributes. Schemas are immutable once built; type hierarchies
//! share declarations by extending a parent schema into a new builder.
//!
//! Accessor declarations are validated at build time, so a misdeclared
//! logical name fails when the type is defined rather than on first access.

use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};
use crate::value::AttrKind;

/// A caller-facing alias for a directory attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    /// The directory attribute this accessor reads and writes.
    pub attribute: String,
    /// Whether assignment through this accessor is allowed.
    pub writable: bool,
}

/// How a name resolves against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedAttr {
    pub attribute: String,
    pub kind: AttrKind,
    pub writable: bool,
}

/// Immutable attribute descriptor table for one model type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSchema {
    kinds: BTreeMap<String, AttrKind>,
    accessors: BTreeMap<String, Accessor>,
}

impl AttributeSchema {
    /// Start an empty schema definition.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The declared kind of a directory attribute, if any.
    pub fn kind_of(&self, attribute: &str) -> Option<AttrKind> {
        self.kinds.get(attribute).copied()
    }

    /// Whether the name is declared, under any kind.
    pub fn is_declared(&self, attribute: &str) -> bool {
        self.kinds.contains_key(attribute)
    }

    /// Every directory-backed attribute: text, sequence, binary and boolean
    /// kinds. Computed attributes have no backing and are excluded.
    pub fn attributes(&self) -> Vec<&str> {
        self.kinds
            .iter()
            .filter(|(_, kind)| **kind != AttrKind::Computed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The set serialized by default: backed attributes plus computed ones.
    pub fn export_attributes(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }

    /// Look up a declared accessor by its logical name.
    pub fn accessor(&self, logical: &str) -> Option<&Accessor> {
        self.accessors.get(logical)
    }

    /// Resolve a caller-facing name: accessors take precedence, then direct
    /// attribute names. Unknown names fail closed with a schema error.
    pub(crate) fn resolve(&self, name: &str) -> ModelResult<ResolvedAttr> {
        if let Some(accessor) = self.accessors.get(name) {
            // Build-time validation guarantees the target is declared.
            let kind = self
                .kinds
                .get(&accessor.attribute)
                .copied()
                .ok_or_else(|| {
                    ModelError::schema(format!(
                        "accessor '{name}' targets undeclared attribute '{}'",
                        accessor.attribute
                    ))
                })?;
            return Ok(ResolvedAttr {
                attribute: accessor.attribute.clone(),
                kind,
                writable: accessor.writable,
            });
        }

        match self.kinds.get(name) {
            Some(kind) => Ok(ResolvedAttr {
                attribute: name.to_string(),
                kind: *kind,
                writable: true,
            }),
            None => Err(ModelError::schema(format!(
                "attribute '{name}' is not declared"
            ))),
        }
    }
}

/// Builder for [`AttributeSchema`].
///
/// Declarations merge by union; re-declaring a name moves it to the latest
/// kind, which is how a subtype narrows an inherited declaration.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    kinds: BTreeMap<String, AttrKind>,
    accessors: BTreeMap<String, Accessor>,
}

impl SchemaBuilder {
    /// Start a definition that inherits every declaration and accessor of a
    /// parent schema.
    #[must_use]
    pub fn extend(parent: &AttributeSchema) -> Self {
        SchemaBuilder {
            kinds: parent.kinds.clone(),
            accessors: parent.accessors.clone(),
        }
    }

    /// Declare attribute names under a kind.
    #[must_use]
    pub fn declare<I, S>(mut self, kind: AttrKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.kinds.insert(name.into(), kind);
        }
        self
    }

    /// Declare text attributes.
    #[must_use]
    pub fn text<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(AttrKind::Text, names)
    }

    /// Declare sequence attributes.
    #[must_use]
    pub fn sequence<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(AttrKind::Sequence, names)
    }

    /// Declare binary attributes.
    #[must_use]
    pub fn binary<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(AttrKind::Binary, names)
    }

    /// Declare boolean attributes.
    #[must_use]
    pub fn boolean<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(AttrKind::Boolean, names)
    }

    /// Declare computed attributes, exported but never stored or written.
    #[must_use]
    pub fn computed<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(AttrKind::Computed, names)
    }

    /// Declare a read-only accessor from a logical name to a directory
    /// attribute.
    #[must_use]
    pub fn accessor(mut self, logical: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.accessors.insert(
            logical.into(),
            Accessor {
                attribute: attribute.into(),
                writable: false,
            },
        );
        self
    }

    /// Declare a read-write accessor from a logical name to a directory
    /// attribute.
    #[must_use]
    pub fn writable_accessor(
        mut self,
        logical: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.accessors.insert(
            logical.into(),
            Accessor {
                attribute: attribute.into(),
                writable: true,
            },
        );
        self
    }

    /// Validate accessors and freeze the schema.
    pub fn build(self) -> ModelResult<AttributeSchema> {
        for (logical, accessor) in &self.accessors {
            match self.kinds.get(&accessor.attribute) {
                None => {
                    return Err(ModelError::schema(format!(
                        "accessor '{logical}' targets undeclared attribute '{}'",
                        accessor.attribute
                    )));
                }
                Some(AttrKind::Computed) => {
                    return Err(ModelError::schema(format!(
                        "accessor '{logical}' targets computed attribute '{}'",
                        accessor.attribute
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(AttributeSchema {
            kinds: self.kinds,
            accessors: self.accessors,
        })
    }
}
