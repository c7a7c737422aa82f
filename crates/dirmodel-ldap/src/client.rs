//! LDAP client adapter
//!
//! Implements [`DirectoryClient`] and [`ClientFactory`] over `ldap3`'s
//! synchronous connection. The mapping layer stays protocol-neutral; this
//! module is where its records, operations and outcomes meet the wire.
//!
//! Directory result codes become [`OpOutcome`] verdicts; only transport
//! faults (lost connections, protocol errors) become errors.

use ldap3::{LdapConn, LdapConnSettings, LdapResult, Mod, SearchEntry};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use dirmodel::client::{ClientFactory, DirectoryClient, ModKind, ModOp, OpOutcome, Record, Scope};
use dirmodel::config::{DirectoryConfig, Encryption};
use dirmodel::error::{ModelError, ModelResult};

/// LDAP result codes this adapter gives friendlier wording to.
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

/// One live LDAP connection bound as the configured service identity.
pub struct Ldap3Client {
    conn: LdapConn,
    /// Service identity to re-bind as after credential checks.
    service_dn: String,
    service_password: String,
}

impl Ldap3Client {
    /// Connect and bind per the configuration.
    ///
    /// The scheme follows the encryption mode: `ldaps` for implicit TLS,
    /// plain `ldap` otherwise, with `StartTLS` negotiated in-band when
    /// requested. A refused bind is a connection error carrying the
    /// server's diagnostic; it is not retried.
    pub fn connect(config: &DirectoryConfig) -> ModelResult<Self> {
        config.validate()?;

        let url = config.url();
        debug!(url = %url, "connecting to directory server");

        let mut settings =
            LdapConnSettings::new().set_starttls(config.encryption == Encryption::StartTls);
        if let Some(secs) = config.connect_timeout_secs {
            settings = settings.set_conn_timeout(Duration::from_secs(secs));
        }

        let mut conn = LdapConn::with_settings(settings, &url).map_err(|e| {
            ModelError::connection_with_source(&url, "connect failed", e)
        })?;

        let service_dn = config.username.clone().unwrap_or_default();
        let service_password = config.password.clone().unwrap_or_default();

        debug!(bind_dn = %service_dn, "performing initial bind");
        let result = conn
            .simple_bind(&service_dn, &service_password)
            .map_err(|e| ModelError::connection_with_source(&url, "bind failed", e))?;
        if result.rc != 0 {
            return Err(ModelError::connection(&url, describe(&result)));
        }

        info!(url = %url, "directory connection established");
        Ok(Ldap3Client {
            conn,
            service_dn,
            service_password,
        })
    }

    fn rebind_as_service(&mut self) -> ModelResult<()> {
        let result = self
            .conn
            .simple_bind(&self.service_dn, &self.service_password)
            .map_err(|e| {
                ModelError::connection_with_source(
                    &self.service_dn,
                    "service re-bind failed",
                    e,
                )
            })?;
        if result.rc != 0 {
            return Err(ModelError::connection(&self.service_dn, describe(&result)));
        }
        Ok(())
    }
}

impl DirectoryClient for Ldap3Client {
    fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[String],
    ) -> ModelResult<Vec<Record>> {
        let result = self
            .conn
            .search(base, scope_to_ldap(scope), filter, attrs.to_vec())
            .map_err(|e| {
                ModelError::client_with_source(format!("search under '{base}' failed"), e)
            })?;

        let ldap3::SearchResult(entries, res) = result;
        match res.rc {
            // 4 is sizeLimitExceeded: the entries before the limit are
            // still valid results.
            0 | 4 => Ok(entries
                .into_iter()
                .map(|entry| entry_to_record(SearchEntry::construct(entry)))
                .collect()),
            // A base dn that does not exist is an empty result, not a
            // fault: find-by-dn relies on this.
            RC_NO_SUCH_OBJECT => Ok(Vec::new()),
            _ => Err(ModelError::client(format!(
                "search under '{base}' failed: {}",
                describe(&res)
            ))),
        }
    }

    fn add(&mut self, dn: &str, attrs: &HashMap<String, Vec<Vec<u8>>>) -> ModelResult<OpOutcome> {
        let wire: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attrs
            .iter()
            .map(|(name, values)| {
                (
                    name.clone().into_bytes(),
                    values.iter().cloned().collect::<HashSet<_>>(),
                )
            })
            .collect();

        let result = self
            .conn
            .add(dn, wire)
            .map_err(|e| ModelError::client_with_source(format!("add of '{dn}' failed"), e))?;
        Ok(result_to_outcome(&result))
    }

    fn modify(&mut self, dn: &str, ops: &[ModOp]) -> ModelResult<OpOutcome> {
        let mods: Vec<Mod<Vec<u8>>> = ops.iter().map(op_to_mod).collect();
        let result = self
            .conn
            .modify(dn, mods)
            .map_err(|e| ModelError::client_with_source(format!("modify of '{dn}' failed"), e))?;
        Ok(result_to_outcome(&result))
    }

    fn delete(&mut self, dn: &str) -> ModelResult<OpOutcome> {
        let result = self
            .conn
            .delete(dn)
            .map_err(|e| ModelError::client_with_source(format!("delete of '{dn}' failed"), e))?;
        Ok(result_to_outcome(&result))
    }

    fn bind(&mut self, dn: &str, password: &str) -> ModelResult<OpOutcome> {
        let result = self
            .conn
            .simple_bind(dn, password)
            .map_err(|e| ModelError::client_with_source(format!("bind as '{dn}' failed"), e))?;
        let outcome = result_to_outcome(&result);

        // The check rebound the connection; restore the service identity
        // so subsequent operations keep working.
        self.rebind_as_service()?;
        Ok(outcome)
    }

    fn unbind(&mut self) {
        if let Err(e) = self.conn.unbind() {
            warn!(error = %e, "ignoring error during unbind");
        }
    }
}

/// Opens [`Ldap3Client`] connections for sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ldap3ClientFactory;

impl ClientFactory for Ldap3ClientFactory {
    fn open(&self, config: &DirectoryConfig) -> ModelResult<Box<dyn DirectoryClient>> {
        Ok(Box::new(Ldap3Client::connect(config)?))
    }
}

fn scope_to_ldap(scope: Scope) -> ldap3::Scope {
    match scope {
        Scope::Base => ldap3::Scope::Base,
        Scope::OneLevel => ldap3::Scope::OneLevel,
        Scope::Subtree => ldap3::Scope::Subtree,
    }
}

fn op_to_mod(op: &ModOp) -> Mod<Vec<u8>> {
    let attr = op.attribute.clone().into_bytes();
    let values: HashSet<Vec<u8>> = op.values.iter().cloned().collect();
    match op.kind {
        ModKind::Add => Mod::Add(attr, values),
        ModKind::Delete => Mod::Delete(attr, values),
        ModKind::Replace => Mod::Replace(attr, values),
    }
}

/// Merge an `ldap3` search entry's text and binary attributes into one
/// byte-string record. Attributes the server tagged binary win over any
/// text rendering of the same name.
fn entry_to_record(entry: SearchEntry) -> Record {
    let mut record = Record::new(entry.dn);
    for (name, values) in entry.attrs {
        record
            .attrs
            .insert(name, values.into_iter().map(String::into_bytes).collect());
    }
    for (name, values) in entry.bin_attrs {
        record.attrs.insert(name, values);
    }
    record
}

fn result_to_outcome(result: &LdapResult) -> OpOutcome {
    if result.rc == 0 {
        OpOutcome::succeeded(result.text.clone())
    } else {
        OpOutcome::failed(describe(result))
    }
}

/// Human-readable wording for a non-zero result, keeping the server text
/// when it has any.
fn describe(result: &LdapResult) -> String {
    let name = match result.rc {
        RC_NO_SUCH_OBJECT => "no such object",
        RC_INVALID_CREDENTIALS => "invalid credentials",
        RC_ENTRY_ALREADY_EXISTS => "entry already exists",
        50 => "insufficient access rights",
        53 => "unwilling to perform",
        _ => "error",
    };
    if result.text.is_empty() {
        format!("{name} (rc {})", result.rc)
    } else {
        format!("{name} (rc {}): {}", result.rc, result.text)
    }
}
