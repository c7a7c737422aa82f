//! Model types and entry persistence
//!
//! A [`ModelType`] is the static description of one family of directory
//! entries: its attribute schema, search bases and scope, the default
//! filter every lookup must satisfy, and behavioral flags such as
//! read-only. Types are built once, shared behind an [`Arc`], and can
//! extend a parent type additively.
//!
//! A [`Model`] pairs a type with a [`Session`] and carries the entry
//! lifecycle: lookups return persisted entries, `create`/`save`/`destroy`
//! move an entry between transient and persisted, and `reload` replaces
//! local state from the directory. Failing variants return typed errors;
//! the `try_*` variants convert exactly their own failure class into
//! `Ok(false)` and propagate everything else untouched.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::client::{ClientFactory, OpOutcome, Scope};
use crate::config::DirectoryConfig;
use crate::entry::Entry;
use crate::error::{ModelError, ModelResult};
use crate::event::EventSink;
use crate::filter::Filter;
use crate::schema::{AttributeSchema, SchemaBuilder};
use crate::session::{SearchOptions, Session};
use crate::value::{coerce, AttrKind, Value, ValueInput};

/// Derivation for a computed attribute, evaluated against the live entry.
pub type ComputedFn = Arc<dyn Fn(&Entry) -> Option<Value> + Send + Sync>;

/// Static description of one family of directory entries.
pub struct ModelType {
    name: String,
    schema: AttributeSchema,
    bases: Vec<String>,
    scope: Scope,
    default_filter: Filter,
    read_only: bool,
    short_name_attribute: String,
    account_attribute: Option<String>,
    defaults: Vec<(String, Value)>,
    computed: BTreeMap<String, ComputedFn>,
}

impl std::fmt::Debug for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("bases", &self.bases)
            .field("scope", &self.scope)
            .field("filter", &self.default_filter.render())
            .field("read_only", &self.read_only)
            .field("short_name_attribute", &self.short_name_attribute)
            .field("account_attribute", &self.account_attribute)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Search bases declared on the type itself. May be empty, in which
    /// case sessions fall back to the connection's configured bases.
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The filter every lookup of this type must satisfy.
    pub fn default_filter(&self) -> &Filter {
        &self.default_filter
    }

    /// Read-only types never reach the directory on create or save.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The attribute named by the leading dn component of entries of this
    /// type.
    pub fn short_name_attribute(&self) -> &str {
        &self.short_name_attribute
    }

    /// The attribute used by account lookups, when declared.
    pub fn account_attribute(&self) -> Option<&str> {
        self.account_attribute.as_deref()
    }

    /// Evaluate a computed attribute against an entry.
    pub fn computed_value(&self, name: &str, entry: &Entry) -> Option<Value> {
        self.computed.get(name).and_then(|derive| derive(entry))
    }

    pub(crate) fn defaults(&self) -> &[(String, Value)] {
        &self.defaults
    }
}

/// Builder for [`ModelType`].
pub struct ModelTypeBuilder {
    name: String,
    schema: SchemaBuilder,
    bases: Vec<String>,
    scope: Scope,
    default_filter: Option<Filter>,
    read_only: bool,
    short_name_attribute: String,
    account_attribute: Option<String>,
    defaults: Vec<(String, ValueInput)>,
    computed: BTreeMap<String, ComputedFn>,
}

impl ModelTypeBuilder {
    /// Start a fresh type. Scope defaults to subtree and the short-name
    /// attribute to `cn`.
    pub fn new(name: impl Into<String>) -> Self {
        ModelTypeBuilder {
            name: name.into(),
            schema: AttributeSchema::builder(),
            bases: Vec::new(),
            scope: Scope::Subtree,
            default_filter: None,
            read_only: false,
            short_name_attribute: "cn".to_string(),
            account_attribute: None,
            defaults: Vec::new(),
            computed: BTreeMap::new(),
        }
    }

    /// Start a type that inherits everything from a parent: schema,
    /// accessors, bases, filter, flags, defaults and computed
    /// derivations. Later declarations add to or override the inherited
    /// ones; nothing is removed.
    pub fn extending(name: impl Into<String>, parent: &ModelType) -> Self {
        ModelTypeBuilder {
            name: name.into(),
            schema: SchemaBuilder::extend(&parent.schema),
            bases: parent.bases.clone(),
            scope: parent.scope,
            default_filter: Some(parent.default_filter.clone()),
            read_only: parent.read_only,
            short_name_attribute: parent.short_name_attribute.clone(),
            account_attribute: parent.account_attribute.clone(),
            defaults: parent
                .defaults
                .iter()
                .map(|(attribute, value)| (attribute.clone(), ValueInput::from(value.clone())))
                .collect(),
            computed: parent.computed.clone(),
        }
    }

    /// Add a search base.
    #[must_use]
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Add several search bases.
    #[must_use]
    pub fn bases<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bases.extend(bases.into_iter().map(Into::into));
        self
    }

    /// Replace the search scope.
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Replace the default filter. Without one, `(objectClass=*)` is
    /// used, so a filter is always in force.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.default_filter = Some(filter);
        self
    }

    /// Mark the type read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Replace the short-name attribute.
    #[must_use]
    pub fn short_name_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.short_name_attribute = attribute.into();
        self
    }

    /// Declare the attribute used by account lookups.
    #[must_use]
    pub fn account_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.account_attribute = Some(attribute.into());
        self
    }

    /// Declare text attributes.
    #[must_use]
    pub fn text<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = self.schema.text(names);
        self
    }

    /// Declare sequence attributes.
    #[must_use]
    pub fn sequence<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = self.schema.sequence(names);
        self
    }

    /// Declare binary attributes.
    #[must_use]
    pub fn binary<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = self.schema.binary(names);
        self
    }

    /// Declare boolean attributes.
    #[must_use]
    pub fn boolean<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = self.schema.boolean(names);
        self
    }

    /// Declare a read-only accessor from a logical name to an attribute.
    #[must_use]
    pub fn accessor(mut self, logical: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.schema = self.schema.accessor(logical, attribute);
        self
    }

    /// Declare a read-write accessor from a logical name to an attribute.
    #[must_use]
    pub fn writable_accessor(
        mut self,
        logical: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.schema = self.schema.writable_accessor(logical, attribute);
        self
    }

    /// Declare a computed attribute together with its derivation. It is
    /// exported and readable but never stored, diffed or written.
    #[must_use]
    pub fn computed(
        mut self,
        name: impl Into<String>,
        derive: impl Fn(&Entry) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        self.schema = self.schema.computed([name.clone()]);
        self.computed.insert(name, Arc::new(derive));
        self
    }

    /// Preset an attribute on freshly initialized entries of this type.
    #[must_use]
    pub fn default_value(
        mut self,
        attribute: impl Into<String>,
        value: impl Into<ValueInput>,
    ) -> Self {
        self.defaults.push((attribute.into(), value.into()));
        self
    }

    /// Validate the definition and freeze it.
    pub fn build(self) -> ModelResult<ModelType> {
        let schema = self.schema.build()?;

        require_backed(&schema, &self.short_name_attribute, "short-name attribute")?;
        if let Some(account) = &self.account_attribute {
            require_backed(&schema, account, "account attribute")?;
        }
        for name in self.computed.keys() {
            if schema.kind_of(name) != Some(AttrKind::Computed) {
                return Err(ModelError::schema(format!(
                    "derivation for '{name}' conflicts with its declared kind"
                )));
            }
        }

        let mut defaults = Vec::new();
        for (attribute, input) in self.defaults {
            let kind = schema.kind_of(&attribute).ok_or_else(|| {
                ModelError::schema(format!(
                    "default value targets undeclared attribute '{attribute}'"
                ))
            })?;
            if let Some(value) = coerce(&attribute, kind, input)? {
                defaults.push((attribute, value));
            }
        }

        Ok(ModelType {
            name: self.name,
            schema,
            bases: self.bases,
            scope: self.scope,
            default_filter: self
                .default_filter
                .unwrap_or_else(|| Filter::present("objectClass")),
            read_only: self.read_only,
            short_name_attribute: self.short_name_attribute,
            account_attribute: self.account_attribute,
            defaults,
            computed: self.computed,
        })
    }
}

fn require_backed(schema: &AttributeSchema, attribute: &str, role: &str) -> ModelResult<()> {
    match schema.kind_of(attribute) {
        None => Err(ModelError::schema(format!(
            "{role} '{attribute}' is not declared"
        ))),
        Some(AttrKind::Computed) => Err(ModelError::schema(format!(
            "{role} '{attribute}' cannot be computed"
        ))),
        Some(_) => Ok(()),
    }
}

/// One model type bound to a live session: the entry lifecycle lives
/// here.
#[derive(Debug)]
pub struct Model {
    session: Session,
    ty: Arc<ModelType>,
}

impl Model {
    /// Bind a type to a directory. The connection opens lazily on first
    /// use.
    pub fn new(
        config: DirectoryConfig,
        ty: Arc<ModelType>,
        factory: Box<dyn ClientFactory>,
    ) -> Model {
        Model {
            session: Session::new(config, Arc::clone(&ty), factory),
            ty,
        }
    }

    /// Replace the session's event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Model {
        self.session = self.session.with_sink(sink);
        self
    }

    pub fn model_type(&self) -> &Arc<ModelType> {
        &self.ty
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable session access, for operations layered on top of the model
    /// (directory-specific extensions issue their own modifies through
    /// this).
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Fetch one entry by dn: a base-scope search on the dn itself, with
    /// the type's default filter still in force. A dn outside the type's
    /// shape therefore comes back as `None`, not as a foreign entry.
    pub fn find(&mut self, dn: &str) -> ModelResult<Option<Entry>> {
        let options = SearchOptions::new().with_base(dn).with_scope(Scope::Base);
        let records = self.session.search(&options)?;
        Ok(records
            .first()
            .map(|record| Entry::from_record(Arc::clone(&self.ty), record, true)))
    }

    /// Fetch the first entry whose attribute equals a value, trying each
    /// search base in order.
    pub fn find_by(&mut self, attribute: &str, value: &str) -> ModelResult<Option<Entry>> {
        for base in self.session.search_bases() {
            let options = SearchOptions::new()
                .with_base(base)
                .with_filter(Filter::eq(attribute, value));
            let records = self.session.search(&options)?;
            if let Some(record) = records.first() {
                return Ok(Some(Entry::from_record(Arc::clone(&self.ty), record, true)));
            }
        }
        Ok(None)
    }

    /// Fetch by the type's account attribute. Fails with a schema error
    /// when the type declares none.
    pub fn find_by_account(&mut self, account: &str) -> ModelResult<Option<Entry>> {
        let attribute = self
            .ty
            .account_attribute()
            .ok_or_else(|| {
                ModelError::schema(format!(
                    "model type '{}' declares no account attribute",
                    self.ty.name()
                ))
            })?
            .to_string();
        self.find_by(&attribute, account)
    }

    /// Fetch by dn, or hand back a transient entry for that dn when the
    /// directory has none.
    pub fn find_or_initialize(&mut self, dn: &str) -> ModelResult<Entry> {
        match self.find(dn)? {
            Some(entry) => Ok(entry),
            None => Ok(self.new_entry(dn)),
        }
    }

    /// All entries matching a filter, across every search base.
    pub fn search(&mut self, filter: Filter) -> ModelResult<Vec<Entry>> {
        self.collect(Some(filter))
    }

    /// Every entry of this type, across every search base.
    pub fn all(&mut self) -> ModelResult<Vec<Entry>> {
        self.collect(None)
    }

    /// A transient entry of this type with defaults applied.
    pub fn new_entry(&self, dn: impl Into<String>) -> Entry {
        Entry::new(Arc::clone(&self.ty), dn)
    }

    /// Persist a transient entry as a new directory record.
    ///
    /// Already-persisted entries fail without touching the directory. On
    /// a read-only type the intended attributes are logged and the entry
    /// transitions locally as if the write had succeeded. A directory
    /// refusal becomes a create error carrying the server's diagnostic,
    /// and the change log survives for inspection.
    pub fn create(&mut self, entry: &mut Entry) -> ModelResult<()> {
        if entry.is_persisted() {
            return Err(ModelError::create_failed(
                entry.dn(),
                "entry is already persisted",
            ));
        }

        if self.ty.is_read_only() {
            info!(
                dn = %entry.dn(),
                changes = %entry.loggable_changes(),
                "read-only model, skipping directory create"
            );
            entry.set_persisted(true);
            entry.clear_changes();
            return Ok(());
        }

        let attrs = entry.attributes_for_add();
        let outcome = self.session.add(entry.dn(), &attrs)?;
        if outcome.success {
            entry.set_persisted(true);
            entry.clear_changes();
            Ok(())
        } else {
            Err(ModelError::create_failed(entry.dn(), outcome.message))
        }
    }

    /// Write pending changes to the directory.
    ///
    /// A transient entry routes through [`Model::create`]. Without
    /// pending changes this is a no-op that never touches the directory.
    /// On success the change log clears; on refusal it survives and a
    /// save error carries the server's diagnostic.
    pub fn save(&mut self, entry: &mut Entry) -> ModelResult<()> {
        if !entry.is_persisted() {
            return self.create(entry);
        }
        if !entry.has_changes() {
            return Ok(());
        }

        if self.ty.is_read_only() {
            info!(
                dn = %entry.dn(),
                changes = %entry.loggable_changes(),
                "read-only model, skipping directory modify"
            );
            entry.clear_changes();
            return Ok(());
        }

        let ops = entry.pending_ops();
        if ops.is_empty() {
            entry.clear_changes();
            return Ok(());
        }

        let outcome = self.session.modify(entry.dn(), &ops)?;
        if outcome.success {
            entry.clear_changes();
            Ok(())
        } else {
            Err(ModelError::save_failed(entry.dn(), outcome.message))
        }
    }

    /// Remove the entry's record from the directory.
    ///
    /// The read-only flag does not apply here; only create and save are
    /// short-circuited. On success the entry becomes transient again and
    /// may be re-created.
    pub fn destroy(&mut self, entry: &mut Entry) -> ModelResult<()> {
        if !entry.is_persisted() {
            return Err(ModelError::destroy_failed(
                entry.dn(),
                "entry is not persisted",
            ));
        }

        let outcome = self.session.delete(entry.dn())?;
        if outcome.success {
            entry.set_persisted(false);
            Ok(())
        } else {
            Err(ModelError::destroy_failed(entry.dn(), outcome.message))
        }
    }

    /// Replace the entry's local state from the directory, discarding
    /// pending changes. Fails when the record no longer exists.
    pub fn reload(&mut self, entry: &mut Entry) -> ModelResult<()> {
        let options = SearchOptions::new()
            .with_base(entry.dn())
            .with_scope(Scope::Base);
        let records = self.session.search(&options)?;
        match records.first() {
            Some(record) => {
                entry.assign_from_record(record);
                Ok(())
            }
            None => Err(ModelError::not_found(entry.dn())),
        }
    }

    /// [`Model::create`], with this type's own failure flattened to
    /// `Ok(false)`. Transport and schema errors still propagate.
    pub fn try_create(&mut self, entry: &mut Entry) -> ModelResult<bool> {
        match self.create(entry) {
            Ok(()) => Ok(true),
            Err(ModelError::CreateFailed { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// [`Model::save`], with save failures flattened to `Ok(false)`.
    /// Saving a transient entry routes through create, so its failure
    /// class is flattened as well.
    pub fn try_save(&mut self, entry: &mut Entry) -> ModelResult<bool> {
        match self.save(entry) {
            Ok(()) => Ok(true),
            Err(ModelError::SaveFailed { .. } | ModelError::CreateFailed { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// [`Model::destroy`], with destroy failures flattened to
    /// `Ok(false)`.
    pub fn try_destroy(&mut self, entry: &mut Entry) -> ModelResult<bool> {
        match self.destroy(entry) {
            Ok(()) => Ok(true),
            Err(ModelError::DestroyFailed { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Verify a credential pair against the directory.
    pub fn bind(&mut self, username: &str, password: &str) -> ModelResult<OpOutcome> {
        self.session.bind(username, password)
    }

    /// Tear down the connection, if open.
    pub fn close(&mut self) {
        self.session.close();
    }

    fn collect(&mut self, filter: Option<Filter>) -> ModelResult<Vec<Entry>> {
        let mut entries = Vec::new();
        for base in self.session.search_bases() {
            let mut options = SearchOptions::new().with_base(base);
            if let Some(filter) = &filter {
                options = options.with_filter(filter.clone());
            }
            for record in self.session.search(&options)? {
                entries.push(Entry::from_record(Arc::clone(&self.ty), &record, true));
            }
        }
        Ok(entries)
    }
}
