//! Ready-made Active Directory model types
//!
//! Declarative [`ModelType`] definitions for the two entry families most
//! AD deployments map: people and groups. Both extend a shared base type
//! carrying the attributes every AD object has, so host applications can
//! extend them further the same way (see [`ModelTypeBuilder::extending`]).
//!
//! Search bases are deliberately left empty here; the connection's
//! configured bases apply. Derived state such as account expiration or
//! group scope is exposed through computed attributes backed by the
//! predicates in [`crate::ad`].

use dirmodel::error::ModelResult;
use dirmodel::filter::Filter;
use dirmodel::model::{ModelType, ModelTypeBuilder};
use dirmodel::value::Value;

use crate::ad;

/// AD `groupType` flags.
pub mod group_type {
    pub const GLOBAL: u32 = 0x0000_0002;
    pub const DOMAIN_LOCAL: u32 = 0x0000_0004;
    pub const UNIVERSAL: u32 = 0x0000_0008;
    pub const SECURITY_ENABLED: u32 = 0x8000_0000;
}

/// The base type shared by all AD object families: naming, free-text
/// description, and the operational timestamps, surfaced as ISO-8601
/// computed values.
pub fn entity() -> ModelResult<ModelType> {
    ModelTypeBuilder::new("ad-entity")
        .text(["cn", "description", "whenCreated", "whenChanged"])
        .writable_accessor("description", "description")
        .computed("created_at", |entry| timestamp_of(entry, "whenCreated"))
        .computed("updated_at", |entry| timestamp_of(entry, "whenChanged"))
        .build()
}

/// An AD person: identification, contact attributes, and the account
/// policy fields (`userAccountControl`, `accountExpires`, password and
/// lockout bookkeeping) with predicates exposed as computed booleans.
pub fn person() -> ModelResult<ModelType> {
    ModelTypeBuilder::extending("ad-person", &entity()?)
        .filter(Filter::eq("objectClass", "person"))
        .text([
            "sn",
            "givenName",
            "displayName",
            "mail",
            "sAMAccountName",
            "userPrincipalName",
            "telephoneNumber",
            "title",
            "department",
            "accountExpires",
            "pwdLastSet",
            "userAccountControl",
            "badPwdCount",
            "badPasswordTime",
        ])
        .sequence(["memberOf", "proxyAddresses"])
        .account_attribute("sAMAccountName")
        .writable_accessor("email", "mail")
        .writable_accessor("display_name", "displayName")
        .writable_accessor("first_name", "givenName")
        .writable_accessor("last_name", "sn")
        .accessor("account_name", "sAMAccountName")
        .accessor("principal_name", "userPrincipalName")
        .accessor("groups", "memberOf")
        .computed("active", |entry| Some(Value::Bool(ad::is_active(entry))))
        .computed("disabled", |entry| {
            Some(Value::Bool(ad::is_disabled(entry)))
        })
        .computed("locked_out", |entry| {
            Some(Value::Bool(ad::is_locked_out(entry)))
        })
        .computed("password_expired", |entry| {
            Some(Value::Bool(ad::password_expired(entry)))
        })
        .computed("expiration", |entry| {
            ad::expiration(entry).map(|when| Value::Text(when.to_rfc3339()))
        })
        .build()
}

/// An AD group: membership, mail routing, and the `groupType` bitfield
/// with its kind and scope exposed as computed text.
pub fn group() -> ModelResult<ModelType> {
    ModelTypeBuilder::extending("ad-group", &entity()?)
        .filter(Filter::eq("objectClass", "group").and(Filter::present("cn")))
        .text([
            "name",
            "groupType",
            "mail",
            "targetAddress",
            "displayName",
            "sAMAccountName",
            "managedBy",
        ])
        .sequence(["member", "proxyAddresses"])
        .account_attribute("sAMAccountName")
        .writable_accessor("email", "mail")
        .writable_accessor("display_name", "displayName")
        .writable_accessor("members", "member")
        .accessor("account_name", "sAMAccountName")
        .accessor("managed_by", "managedBy")
        .default_value("groupType", group_type::GLOBAL.to_string())
        .computed("kind", |entry| {
            let kind = if group_flags(entry) & group_type::SECURITY_ENABLED != 0 {
                "security"
            } else {
                "distribution"
            };
            Some(Value::Text(kind.to_string()))
        })
        .computed("scope", |entry| {
            let flags = group_flags(entry);
            let scope = if flags & group_type::DOMAIN_LOCAL != 0 {
                "local"
            } else if flags & group_type::GLOBAL != 0 {
                "global"
            } else if flags & group_type::UNIVERSAL != 0 {
                "universal"
            } else {
                return None;
            };
            Some(Value::Text(scope.to_string()))
        })
        .build()
}

/// The entry's `groupType` bitfield, `0` when absent or unreadable.
#[must_use]
pub fn group_flags(entry: &dirmodel::entry::Entry) -> u32 {
    entry
        .text("groupType")
        .ok()
        .flatten()
        .and_then(|raw| raw.parse::<i64>().ok())
        .map_or(0, |raw| raw as u32)
}

fn timestamp_of(entry: &dirmodel::entry::Entry, attribute: &str) -> Option<Value> {
    entry
        .text(attribute)
        .ok()
        .flatten()
        .and_then(|raw| ad::from_generalized_time(&raw))
        .map(|when| Value::Text(when.to_rfc3339()))
}
