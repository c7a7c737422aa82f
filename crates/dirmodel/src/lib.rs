//! # Directory Object Mapping
//!
//! A typed object-mapping layer over LDAP-style hierarchical directories.
//!
//! This crate turns raw directory records into schema-checked, change-
//! tracked entries: model types declare which attributes exist and how
//! they behave, sessions run searches and writes over a lazily opened
//! connection, and saves send only the minimal set of per-attribute
//! operations derived from what actually changed.
//!
//! ## Architecture
//!
//! - [`ModelType`] - Declarative description of one entry family:
//!   schema, bases, default filter, flags
//! - [`Entry`] - One typed record with a change log
//! - [`Model`] - A type bound to a session; lookups and the
//!   create/save/destroy/reload lifecycle
//! - [`Session`] - Lazy connection handling plus structured operation
//!   events
//! - [`DirectoryClient`] - The protocol seam; `dirmodel-ldap` provides
//!   the LDAP implementation
//! - [`JoinResolver`] - Read-only joins across two directory trees
//!
//! ## Example
//!
//! ```ignore
//! use dirmodel::prelude::*;
//!
//! let ty = Arc::new(
//!     ModelTypeBuilder::new("person")
//!         .base("ou=people,dc=example,dc=com")
//!         .filter(Filter::eq("objectClass", "person"))
//!         .text(["cn", "sn", "mail"])
//!         .sequence(["memberOf"])
//!         .writable_accessor("email", "mail")
//!         .build()?,
//! );
//!
//! let config = DirectoryConfig::new("ldap.example.com")
//!     .with_credentials("cn=service,dc=example,dc=com", secret);
//! let mut people = Model::new(config, ty, factory);
//!
//! if let Some(mut bob) = people.find("cn=bob,ou=people,dc=example,dc=com")? {
//!     bob.set("email", "bob@example.com")?;
//!     people.save(&mut bob)?;
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`value`] - Attribute kinds, typed values, coercion rules
//! - [`schema`] - Per-type attribute registry and accessors
//! - [`filter`] - Composable search filters
//! - [`config`] - Connection configuration
//! - [`client`] - Protocol-neutral client traits and wire types
//! - [`event`] - Structured session events and sinks
//! - [`session`] - Lazy connections and operation dispatch
//! - [`entry`] - Typed entries and change tracking
//! - [`model`] - Model types and the persistence lifecycle
//! - [`join`] - Cross-tree join resolution
//! - [`error`] - Error taxonomy

pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod filter;
pub mod join;
pub mod model;
pub mod schema;
pub mod session;
pub mod value;

pub use client::{ClientFactory, DirectoryClient, ModKind, ModOp, OpOutcome, Record, Scope};
pub use config::{DirectoryConfig, Encryption};
pub use entry::{ChangeLog, Entry};
pub use error::{ModelError, ModelResult};
pub use event::{EventSink, SessionEvent, TracingSink};
pub use filter::Filter;
pub use join::{
    ForeignKeySource, Joined, JoinResolver, PrimarySource, SecondarySource,
    DEFAULT_JOIN_THRESHOLD,
};
pub use model::{ComputedFn, Model, ModelType, ModelTypeBuilder};
pub use schema::{Accessor, AttributeSchema, SchemaBuilder};
pub use session::{SearchOptions, Session};
pub use value::{AttrKind, Value, ValueInput};

/// Prelude module for convenient imports.
///
/// ```
/// use dirmodel::prelude::*;
/// ```
pub mod prelude {
    // Values and schema
    pub use crate::schema::{Accessor, AttributeSchema, SchemaBuilder};
    pub use crate::value::{AttrKind, Value, ValueInput};

    // Filters
    pub use crate::filter::Filter;

    // Error handling
    pub use crate::error::{ModelError, ModelResult};

    // Client seam
    pub use crate::client::{
        ClientFactory, DirectoryClient, ModKind, ModOp, OpOutcome, Record, Scope,
    };

    // Configuration and events
    pub use crate::config::{DirectoryConfig, Encryption};
    pub use crate::event::{EventSink, SessionEvent, TracingSink};

    // Sessions, entries, models
    pub use crate::entry::{ChangeLog, Entry};
    pub use crate::model::{Model, ModelType, ModelTypeBuilder};
    pub use crate::session::{SearchOptions, Session};

    // Joins
    pub use crate::join::{
        ForeignKeySource, Joined, JoinResolver, PrimarySource, SecondarySource,
        DEFAULT_JOIN_THRESHOLD,
    };
}
