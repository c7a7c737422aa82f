//! Read-only joins across two directory trees
//!
//! A [`JoinResolver`] matches entries from a primary tree with entries
//! from a secondary tree whose foreign-key attribute holds the primary
//! entry's dn. Single lookups join with one targeted secondary fetch.
//! List lookups pick their strategy by result size: up to the threshold,
//! one targeted fetch per entry; strictly above it, a single bulk fetch
//! of the secondary tree joined in memory. The resolved view is
//! read-only; every write refuses with a not-supported error.

use serde_json::json;
use std::collections::HashMap;

use crate::client::OpOutcome;
use crate::entry::Entry;
use crate::error::{ModelError, ModelResult};
use crate::filter::Filter;
use crate::model::Model;
use crate::value::Value;

/// Largest list that still joins entry-by-entry.
pub const DEFAULT_JOIN_THRESHOLD: usize = 5;

/// The lookup side of a join. [`Model`] implements this directly.
pub trait PrimarySource {
    fn find(&mut self, dn: &str) -> ModelResult<Option<Entry>>;
    fn find_by(&mut self, attribute: &str, value: &str) -> ModelResult<Option<Entry>>;
    fn find_by_account(&mut self, account: &str) -> ModelResult<Option<Entry>>;
    fn search(&mut self, filter: Filter) -> ModelResult<Vec<Entry>>;
    fn all(&mut self) -> ModelResult<Vec<Entry>>;
}

impl PrimarySource for Model {
    fn find(&mut self, dn: &str) -> ModelResult<Option<Entry>> {
        Model::find(self, dn)
    }

    fn find_by(&mut self, attribute: &str, value: &str) -> ModelResult<Option<Entry>> {
        Model::find_by(self, attribute, value)
    }

    fn find_by_account(&mut self, account: &str) -> ModelResult<Option<Entry>> {
        Model::find_by_account(self, account)
    }

    fn search(&mut self, filter: Filter) -> ModelResult<Vec<Entry>> {
        Model::search(self, filter)
    }

    fn all(&mut self) -> ModelResult<Vec<Entry>> {
        Model::all(self)
    }
}

/// The annotation side of a join, addressed by primary dn.
pub trait SecondarySource {
    /// The secondary entry whose foreign key equals this primary dn.
    fn find_by_foreign_key(&mut self, dn: &str) -> ModelResult<Option<Entry>>;

    /// Every secondary entry, for bulk joins.
    fn fetch_all(&mut self) -> ModelResult<Vec<Entry>>;

    /// The foreign-key value carried by a fetched secondary entry.
    fn foreign_key_of(&self, entry: &Entry) -> ModelResult<Option<String>>;
}

/// A [`Model`] acting as secondary source through one of its text
/// attributes.
pub struct ForeignKeySource {
    model: Model,
    foreign_key: String,
}

impl ForeignKeySource {
    pub fn new(model: Model, foreign_key: impl Into<String>) -> Self {
        ForeignKeySource {
            model,
            foreign_key: foreign_key.into(),
        }
    }
}

impl SecondarySource for ForeignKeySource {
    fn find_by_foreign_key(&mut self, dn: &str) -> ModelResult<Option<Entry>> {
        let attribute = self.foreign_key.clone();
        self.model.find_by(&attribute, dn)
    }

    fn fetch_all(&mut self) -> ModelResult<Vec<Entry>> {
        self.model.all()
    }

    fn foreign_key_of(&self, entry: &Entry) -> ModelResult<Option<String>> {
        entry.text(&self.foreign_key)
    }
}

/// Joins primary lookups with secondary annotations. Read-only.
pub struct JoinResolver<P, S> {
    primary: P,
    secondary: S,
    threshold: usize,
}

impl<P: PrimarySource, S: SecondarySource> JoinResolver<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        JoinResolver {
            primary,
            secondary,
            threshold: DEFAULT_JOIN_THRESHOLD,
        }
    }

    /// Override the list size above which joins switch to one bulk fetch.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn find(&mut self, dn: &str) -> ModelResult<Option<Joined>> {
        match self.primary.find(dn)? {
            Some(primary) => Ok(Some(self.join_one(primary)?)),
            None => Ok(None),
        }
    }

    pub fn find_by(&mut self, attribute: &str, value: &str) -> ModelResult<Option<Joined>> {
        match self.primary.find_by(attribute, value)? {
            Some(primary) => Ok(Some(self.join_one(primary)?)),
            None => Ok(None),
        }
    }

    pub fn find_by_account(&mut self, account: &str) -> ModelResult<Option<Joined>> {
        match self.primary.find_by_account(account)? {
            Some(primary) => Ok(Some(self.join_one(primary)?)),
            None => Ok(None),
        }
    }

    pub fn search(&mut self, filter: Filter) -> ModelResult<Vec<Joined>> {
        let primaries = self.primary.search(filter)?;
        self.join_many(primaries)
    }

    pub fn all(&mut self) -> ModelResult<Vec<Joined>> {
        let primaries = self.primary.all()?;
        self.join_many(primaries)
    }

    /// Resolved views cannot create entries.
    pub fn create(&mut self, _entry: &mut Entry) -> ModelResult<()> {
        Err(ModelError::not_supported("create"))
    }

    /// Resolved views cannot save entries.
    pub fn save(&mut self, _entry: &mut Entry) -> ModelResult<()> {
        Err(ModelError::not_supported("save"))
    }

    /// Resolved views cannot destroy entries.
    pub fn destroy(&mut self, _entry: &mut Entry) -> ModelResult<()> {
        Err(ModelError::not_supported("destroy"))
    }

    /// Resolved views cannot verify credentials.
    pub fn bind(&mut self, _username: &str, _password: &str) -> ModelResult<OpOutcome> {
        Err(ModelError::not_supported("bind"))
    }

    /// Resolved views cannot initialize transient entries.
    pub fn find_or_initialize(&mut self, _dn: &str) -> ModelResult<Joined> {
        Err(ModelError::not_supported("find_or_initialize"))
    }

    fn join_one(&mut self, primary: Entry) -> ModelResult<Joined> {
        let secondary = self.secondary.find_by_foreign_key(primary.dn())?;
        Ok(Joined { primary, secondary })
    }

    fn join_many(&mut self, primaries: Vec<Entry>) -> ModelResult<Vec<Joined>> {
        if primaries.len() > self.threshold {
            let mut by_key: HashMap<String, Entry> = HashMap::new();
            for secondary in self.secondary.fetch_all()? {
                if let Some(key) = self.secondary.foreign_key_of(&secondary)? {
                    by_key.insert(key, secondary);
                }
            }
            return Ok(primaries
                .into_iter()
                .map(|primary| {
                    let secondary = by_key.remove(primary.dn());
                    Joined { primary, secondary }
                })
                .collect());
        }

        primaries
            .into_iter()
            .map(|primary| self.join_one(primary))
            .collect()
    }
}

/// A primary entry with its optional secondary annotation.
#[derive(Debug, Clone)]
pub struct Joined {
    primary: Entry,
    secondary: Option<Entry>,
}

impl Joined {
    pub fn primary(&self) -> &Entry {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Entry> {
        self.secondary.as_ref()
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// The primary entry's dn.
    pub fn dn(&self) -> &str {
        self.primary.dn()
    }

    /// Read an attribute, preferring the primary side. A name the primary
    /// schema rejects is retried against the secondary entry when one was
    /// joined.
    pub fn get(&self, name: &str) -> ModelResult<Option<Value>> {
        match self.primary.get(name) {
            Ok(value) => Ok(value),
            Err(primary_err) => match &self.secondary {
                Some(secondary) => secondary.get(name).map_err(|_| {
                    ModelError::schema(format!(
                        "attribute '{name}' is declared on neither side of the join"
                    ))
                }),
                None => Err(primary_err),
            },
        }
    }

    /// Merged export: the secondary entry's fields overlaid by the
    /// primary's, so the primary wins collisions, dn included.
    pub fn export(&self) -> serde_json::Value {
        let mut merged = match &self.secondary {
            Some(secondary) => secondary.export(),
            None => json!({}),
        };
        if let (serde_json::Value::Object(target), serde_json::Value::Object(overlay)) =
            (&mut merged, self.primary.export())
        {
            for (key, value) in overlay {
                target.insert(key, value);
            }
        }
        merged
    }
}
