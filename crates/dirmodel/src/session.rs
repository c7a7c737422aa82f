//! Directory sessions: lazy connections plus structured operation events
//!
//! A [`Session`] owns the connection lifecycle for one model type. The
//! underlying client opens on first use; opening connects and binds as
//! the identity from [`DirectoryConfig`], and a failed open surfaces as a
//! connection error without retry. Every operation emits one structured
//! [`SessionEvent`](crate::event::SessionEvent) through the configured
//! sink, with secrets and binary payloads redacted before they reach it.
//!
//! Directory verdicts and transport failures stay distinct throughout:
//! a write the server refuses returns an [`OpOutcome`] with the server's
//! diagnostic, while a broken transport returns an error.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::client::{ClientFactory, DirectoryClient, ModOp, OpOutcome, Record, Scope};
use crate::config::DirectoryConfig;
use crate::error::{ModelError, ModelResult};
use crate::event::{EventSink, SessionEvent, TracingSink};
use crate::filter::Filter;
use crate::model::ModelType;
use crate::value::{binary_marker, AttrKind};

/// Per-call overrides for [`Session::search`]. Anything left unset falls
/// back to the model type's defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    base: Option<String>,
    scope: Option<Scope>,
    filter: Option<Filter>,
    attrs: Option<Vec<String>>,
}

impl SearchOptions {
    pub fn new() -> Self {
        SearchOptions::default()
    }

    /// Search under this base instead of the type's first base.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Override the traversal scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Narrow the search. The type's default filter always applies; this
    /// is combined with it conjunctively, never substituted for it.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Request a specific attribute list instead of the full schema set.
    #[must_use]
    pub fn with_attrs(mut self, attrs: Vec<String>) -> Self {
        self.attrs = Some(attrs);
        self
    }
}

/// A lazily connected directory session bound to one model type.
pub struct Session {
    config: DirectoryConfig,
    ty: Arc<ModelType>,
    factory: Box<dyn ClientFactory>,
    client: Option<Box<dyn DirectoryClient>>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("model", &self.ty.name())
            .field("connected", &self.client.is_some())
            .finish()
    }
}

impl Session {
    /// Create a session. No connection is made until the first operation.
    pub fn new(
        config: DirectoryConfig,
        ty: Arc<ModelType>,
        factory: Box<dyn ClientFactory>,
    ) -> Session {
        Session {
            config,
            ty,
            factory,
            client: None,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the event sink. The default logs through `tracing`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Session {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn model_type(&self) -> &Arc<ModelType> {
        &self.ty
    }

    /// Whether the underlying connection has been opened.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// The bases searched for this type: the type's own bases, or the
    /// configured connection bases when the type declares none.
    pub fn search_bases(&self) -> Vec<String> {
        if self.ty.bases().is_empty() {
            self.config.base.clone()
        } else {
            self.ty.bases().to_vec()
        }
    }

    /// Run a search, applying the model type's defaults for anything the
    /// options leave unset. The type's default filter is always in force.
    #[instrument(level = "debug", skip_all, fields(model = %self.ty.name()))]
    pub fn search(&mut self, options: &SearchOptions) -> ModelResult<Vec<Record>> {
        let base = match &options.base {
            Some(base) => base.clone(),
            None => self.search_bases().first().cloned().unwrap_or_default(),
        };
        let scope = options.scope.unwrap_or_else(|| self.ty.scope());
        let rendered = self.effective_filter(options.filter.as_ref()).render();
        let attrs = match &options.attrs {
            Some(attrs) => attrs.clone(),
            None => self
                .ty
                .schema()
                .attributes()
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        };

        let client = self.client()?;
        let started = Instant::now();
        let result = client.search(&base, scope, &rendered, &attrs);
        let duration_ms = elapsed_ms(started);

        self.sink.emit(&SessionEvent::Search {
            base,
            scope,
            filter: rendered,
            result_count: result.as_ref().map_or(0, Vec::len),
            duration_ms,
        });
        result
    }

    /// Create a new record. The directory's verdict comes back as an
    /// outcome; only transport faults are errors.
    #[instrument(level = "debug", skip_all, fields(model = %self.ty.name(), dn = %dn))]
    pub fn add(
        &mut self,
        dn: &str,
        attrs: &HashMap<String, Vec<Vec<u8>>>,
    ) -> ModelResult<OpOutcome> {
        let changes = self.redact_add(attrs);
        let client = self.client()?;
        let started = Instant::now();
        let result = client.add(dn, attrs);
        let duration_ms = elapsed_ms(started);
        self.emit_mutate("add", dn, changes, &result, duration_ms);
        result
    }

    /// Apply per-attribute operations to an existing record.
    #[instrument(level = "debug", skip_all, fields(model = %self.ty.name(), dn = %dn))]
    pub fn modify(&mut self, dn: &str, ops: &[ModOp]) -> ModelResult<OpOutcome> {
        let changes = self.redact_ops(ops);
        let client = self.client()?;
        let started = Instant::now();
        let result = client.modify(dn, ops);
        let duration_ms = elapsed_ms(started);
        self.emit_mutate("modify", dn, changes, &result, duration_ms);
        result
    }

    /// Remove a record.
    #[instrument(level = "debug", skip_all, fields(model = %self.ty.name(), dn = %dn))]
    pub fn delete(&mut self, dn: &str) -> ModelResult<OpOutcome> {
        let client = self.client()?;
        let started = Instant::now();
        let result = client.delete(dn);
        let duration_ms = elapsed_ms(started);
        self.emit_mutate("delete", dn, serde_json::Value::Null, &result, duration_ms);
        result
    }

    /// Verify a credential pair against the directory. The session's own
    /// identity remains in force afterwards; the password never reaches
    /// the event stream.
    #[instrument(level = "debug", skip(self, password))]
    pub fn bind(&mut self, username: &str, password: &str) -> ModelResult<OpOutcome> {
        let client = self.client()?;
        let started = Instant::now();
        let result = client.bind(username, password);
        let duration_ms = elapsed_ms(started);

        let success = matches!(&result, Ok(outcome) if outcome.success);
        self.sink.emit(&SessionEvent::Bind {
            username: username.to_string(),
            success,
            duration_ms,
        });
        result
    }

    /// Tear down the connection, if any. The next operation reconnects.
    pub fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.unbind();
        }
    }

    /// The type's default filter, conjoined with a caller filter when one
    /// is given.
    fn effective_filter(&self, caller: Option<&Filter>) -> Filter {
        let base = self.ty.default_filter().clone();
        match caller {
            Some(extra) => base.and(extra.clone()),
            None => base,
        }
    }

    /// The live client, opening the connection on first use.
    fn client(&mut self) -> ModelResult<&mut (dyn DirectoryClient + 'static)> {
        if self.client.is_none() {
            let target = self.config.url();
            let started = Instant::now();
            let opened = self.factory.open(&self.config);
            let duration_ms = elapsed_ms(started);

            match opened {
                Ok(client) => {
                    self.sink.emit(&SessionEvent::Connect {
                        target,
                        success: true,
                        duration_ms,
                    });
                    self.client = Some(client);
                }
                Err(err) => {
                    self.sink.emit(&SessionEvent::Connect {
                        target,
                        success: false,
                        duration_ms,
                    });
                    return Err(err);
                }
            }
        }
        self.client
            .as_deref_mut()
            .ok_or_else(|| ModelError::client("connection handle missing after open"))
    }

    fn emit_mutate(
        &self,
        operation: &str,
        dn: &str,
        changes: serde_json::Value,
        result: &ModelResult<OpOutcome>,
        duration_ms: u64,
    ) {
        let (success, message) = match result {
            Ok(outcome) => (outcome.success, outcome.message.clone()),
            Err(err) => (false, err.to_string()),
        };
        self.sink.emit(&SessionEvent::Mutate {
            operation: operation.to_string(),
            dn: dn.to_string(),
            changes,
            success,
            message,
            duration_ms,
        });
    }

    /// Add payload rendered for the event stream, attribute-sorted, with
    /// binary values replaced by content-hash markers.
    fn redact_add(&self, attrs: &HashMap<String, Vec<Vec<u8>>>) -> serde_json::Value {
        let mut names: Vec<&String> = attrs.keys().collect();
        names.sort();

        let mut map = serde_json::Map::new();
        for name in names {
            let values: Vec<serde_json::Value> = attrs[name]
                .iter()
                .map(|value| json!(self.loggable_wire(name, value)))
                .collect();
            map.insert(name.clone(), serde_json::Value::Array(values));
        }
        serde_json::Value::Object(map)
    }

    /// Modify payload rendered for the event stream.
    fn redact_ops(&self, ops: &[ModOp]) -> serde_json::Value {
        let items: Vec<serde_json::Value> = ops
            .iter()
            .map(|op| {
                let values: Vec<serde_json::Value> = op
                    .values
                    .iter()
                    .map(|value| json!(self.loggable_wire(&op.attribute, value)))
                    .collect();
                json!({
                    "op": op.kind.as_str(),
                    "attribute": op.attribute,
                    "values": values,
                })
            })
            .collect();
        serde_json::Value::Array(items)
    }

    /// One wire value as it may appear in logs: binary-kind attributes
    /// and undecodable bytes become markers, everything else stays text.
    fn loggable_wire(&self, attribute: &str, value: &[u8]) -> String {
        if matches!(self.ty.schema().kind_of(attribute), Some(AttrKind::Binary)) {
            return binary_marker(value);
        }
        match std::str::from_utf8(value) {
            Ok(text) => text.to_string(),
            Err(_) => binary_marker(value),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
