//! Directory protocol client interface
//!
//! The seam between the mapping layer and a concrete wire protocol. The
//! session talks to a [`DirectoryClient`] and never to a protocol library
//! directly; adapters implement these traits (see the `dirmodel-ldap`
//! crate for the LDAP one).
//!
//! Directory-reported failures travel as an [`OpOutcome`] with
//! `success = false`, never as errors. `Err` is reserved for transport
//! trouble: lost connections, protocol violations, timeouts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::DirectoryConfig;
use crate::error::ModelResult;

/// How broadly a search traverses from its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// The base entry only.
    #[serde(rename = "base")]
    Base,
    /// Immediate children of the base, excluding the base itself.
    #[serde(rename = "one")]
    OneLevel,
    /// The base and its whole subtree.
    #[serde(rename = "sub")]
    Subtree,
}

impl Scope {
    /// Conventional LDAP URL scope token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Base => "base",
            Scope::OneLevel => "one",
            Scope::Subtree => "sub",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw directory record: a dn plus attribute values as byte strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Distinguished name of the record.
    pub dn: String,
    /// Attribute values, one list of byte strings per attribute.
    pub attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl Record {
    /// Create an empty record for a dn.
    pub fn new(dn: impl Into<String>) -> Self {
        Record {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Add raw values for an attribute.
    #[must_use]
    pub fn with_values<I, V>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.attrs
            .insert(attribute.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

/// The kind of a single modify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModKind {
    Add,
    Delete,
    Replace,
}

impl ModKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModKind::Add => "add",
            ModKind::Delete => "delete",
            ModKind::Replace => "replace",
        }
    }
}

/// One per-attribute operation inside a modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModOp {
    pub kind: ModKind,
    pub attribute: String,
    /// Values for add/replace; empty for a whole-attribute delete.
    pub values: Vec<Vec<u8>>,
}

impl ModOp {
    /// Add values to an attribute.
    pub fn add(attribute: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        ModOp {
            kind: ModKind::Add,
            attribute: attribute.into(),
            values,
        }
    }

    /// Remove an attribute entirely.
    pub fn delete(attribute: impl Into<String>) -> Self {
        ModOp {
            kind: ModKind::Delete,
            attribute: attribute.into(),
            values: Vec::new(),
        }
    }

    /// Remove specific values from an attribute.
    pub fn delete_values(attribute: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        ModOp {
            kind: ModKind::Delete,
            attribute: attribute.into(),
            values,
        }
    }

    /// Replace all values of an attribute.
    pub fn replace(attribute: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        ModOp {
            kind: ModKind::Replace,
            attribute: attribute.into(),
            values,
        }
    }
}

/// The directory's verdict on a write or bind operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpOutcome {
    /// Whether the directory accepted the operation.
    pub success: bool,
    /// Server-reported diagnostic, empty on clean success.
    pub message: String,
}

impl OpOutcome {
    /// A successful outcome.
    pub fn succeeded(message: impl Into<String>) -> Self {
        OpOutcome {
            success: true,
            message: message.into(),
        }
    }

    /// A directory-reported failure.
    pub fn failed(message: impl Into<String>) -> Self {
        OpOutcome {
            success: false,
            message: message.into(),
        }
    }
}

/// A live connection speaking the directory protocol.
///
/// Implementations are not required to be thread-safe; a session owns its
/// client and serializes access to it.
pub trait DirectoryClient: Send {
    /// Search under a base and return matching raw records.
    fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[String],
    ) -> ModelResult<Vec<Record>>;

    /// Add a new record.
    fn add(&mut self, dn: &str, attrs: &HashMap<String, Vec<Vec<u8>>>) -> ModelResult<OpOutcome>;

    /// Apply per-attribute operations to an existing record.
    fn modify(&mut self, dn: &str, ops: &[ModOp]) -> ModelResult<OpOutcome>;

    /// Delete a record.
    fn delete(&mut self, dn: &str) -> ModelResult<OpOutcome>;

    /// Verify a credential pair.
    ///
    /// The connection must remain usable under its originally configured
    /// identity afterwards; adapters re-bind as the service identity after
    /// the check when the protocol requires it.
    fn bind(&mut self, dn: &str, password: &str) -> ModelResult<OpOutcome>;

    /// Orderly teardown. Errors during teardown are ignored.
    fn unbind(&mut self);
}

/// Opens connections for sessions: connect plus initial bind.
pub trait ClientFactory: Send + Sync {
    /// Open a connection and bind as the configured identity.
    ///
    /// A failed initial bind is a connection error carrying the
    /// server-reported reason; it is never retried here.
    fn open(&self, config: &DirectoryConfig) -> ModelResult<Box<dyn DirectoryClient>>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-memory client shared by the unit tests.

    use super::*;
    use crate::error::ModelError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// One recorded search invocation.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct SearchCall {
        pub base: String,
        pub scope: Scope,
        pub filter: String,
        pub attrs: Vec<String>,
    }

    /// Shared state scripted by tests and inspected after the fact.
    #[derive(Debug)]
    pub(crate) struct MockState {
        pub open_count: usize,
        pub fail_open: Option<String>,
        pub fail_transport: bool,

        pub search_results: VecDeque<Vec<Record>>,
        pub add_outcome: OpOutcome,
        pub modify_outcome: OpOutcome,
        pub delete_outcome: OpOutcome,
        pub bind_outcome: OpOutcome,

        pub searches: Vec<SearchCall>,
        pub adds: Vec<(String, HashMap<String, Vec<Vec<u8>>>)>,
        pub modifies: Vec<(String, Vec<ModOp>)>,
        pub deletes: Vec<String>,
        pub binds: Vec<(String, String)>,
        pub unbinds: usize,
    }

    impl Default for MockState {
        fn default() -> Self {
            MockState {
                open_count: 0,
                fail_open: None,
                fail_transport: false,
                search_results: VecDeque::new(),
                add_outcome: OpOutcome::succeeded(""),
                modify_outcome: OpOutcome::succeeded(""),
                delete_outcome: OpOutcome::succeeded(""),
                bind_outcome: OpOutcome::succeeded(""),
                searches: Vec::new(),
                adds: Vec::new(),
                modifies: Vec::new(),
                deletes: Vec::new(),
                binds: Vec::new(),
                unbinds: 0,
            }
        }
    }

    pub(crate) struct MockClient {
        state: Arc<Mutex<MockState>>,
    }

    impl DirectoryClient for MockClient {
        fn search(
            &mut self,
            base: &str,
            scope: Scope,
            filter: &str,
            attrs: &[String],
        ) -> ModelResult<Vec<Record>> {
            let mut state = self.state.lock().unwrap();
            state.searches.push(SearchCall {
                base: base.to_string(),
                scope,
                filter: filter.to_string(),
                attrs: attrs.to_vec(),
            });
            if state.fail_transport {
                return Err(ModelError::client("mock transport failure"));
            }
            Ok(state.search_results.pop_front().unwrap_or_default())
        }

        fn add(
            &mut self,
            dn: &str,
            attrs: &HashMap<String, Vec<Vec<u8>>>,
        ) -> ModelResult<OpOutcome> {
            let mut state = self.state.lock().unwrap();
            state.adds.push((dn.to_string(), attrs.clone()));
            if state.fail_transport {
                return Err(ModelError::client("mock transport failure"));
            }
            Ok(state.add_outcome.clone())
        }

        fn modify(&mut self, dn: &str, ops: &[ModOp]) -> ModelResult<OpOutcome> {
            let mut state = self.state.lock().unwrap();
            state.modifies.push((dn.to_string(), ops.to_vec()));
            if state.fail_transport {
                return Err(ModelError::client("mock transport failure"));
            }
            Ok(state.modify_outcome.clone())
        }

        fn delete(&mut self, dn: &str) -> ModelResult<OpOutcome> {
            let mut state = self.state.lock().unwrap();
            state.deletes.push(dn.to_string());
            if state.fail_transport {
                return Err(ModelError::client("mock transport failure"));
            }
            Ok(state.delete_outcome.clone())
        }

        fn bind(&mut self, dn: &str, password: &str) -> ModelResult<OpOutcome> {
            let mut state = self.state.lock().unwrap();
            state.binds.push((dn.to_string(), password.to_string()));
            if state.fail_transport {
                return Err(ModelError::client("mock transport failure"));
            }
            Ok(state.bind_outcome.clone())
        }

        fn unbind(&mut self) {
            self.state.lock().unwrap().unbinds += 1;
        }
    }

    pub(crate) struct MockFactory {
        state: Arc<Mutex<MockState>>,
    }

    impl MockFactory {
        pub(crate) fn new() -> (Self, Arc<Mutex<MockState>>) {
            let state = Arc::new(Mutex::new(MockState::default()));
            (
                MockFactory {
                    state: Arc::clone(&state),
                },
                state,
            )
        }
    }

    impl ClientFactory for MockFactory {
        fn open(&self, config: &DirectoryConfig) -> ModelResult<Box<dyn DirectoryClient>> {
            let mut state = self.state.lock().unwrap();
            state.open_count += 1;
            if let Some(reason) = &state.fail_open {
                return Err(ModelError::connection(config.url(), reason.clone()));
            }
            Ok(Box::new(MockClient {
                state: Arc::clone(&self.state),
            }))
        }
    }
}
