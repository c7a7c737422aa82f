//! # LDAP adapter for `dirmodel`
//!
//! Connects the protocol-neutral mapping layer to real LDAP servers via
//! `ldap3`'s synchronous facade, and adds the Active Directory semantics
//! most deployments need on top of it.
//!
//! - [`Ldap3Client`] / [`Ldap3ClientFactory`] - The
//!   [`DirectoryClient`](dirmodel::client::DirectoryClient) implementation
//! - [`ad`] - FILETIME conversions, `userAccountControl` predicates,
//!   `unicodePwd` password operations
//! - [`models`] - Ready-made person and group model types
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dirmodel::prelude::*;
//! use dirmodel_ldap::{models, Ldap3ClientFactory};
//!
//! let config = DirectoryConfig::new("ad.example.com")
//!     .with_implicit_tls()
//!     .with_credentials("cn=service,dc=example,dc=com", secret)
//!     .with_base("ou=people,dc=example,dc=com");
//!
//! let ty = Arc::new(models::person()?);
//! let mut people = Model::new(config, ty, Box::new(Ldap3ClientFactory));
//!
//! if let Some(bob) = people.find_by_account("bob")? {
//!     println!("{}", bob.export());
//! }
//! ```

pub mod ad;
pub mod client;
pub mod models;

pub use ad::AdPasswordOps;
pub use client::{Ldap3Client, Ldap3ClientFactory};
