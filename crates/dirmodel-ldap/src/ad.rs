//! Active Directory semantics
//!
//! Helpers for the AD-specific encodings layered over plain LDAP:
//! FILETIME timestamps counted in 100-nanosecond ticks since 1601,
//! `userAccountControl` flag predicates, and `unicodePwd` password
//! operations (quoted UTF-16LE, LDAPS required).

use chrono::{DateTime, Utc};
use tracing::info;

use dirmodel::client::ModOp;
use dirmodel::config::Encryption;
use dirmodel::entry::Entry;
use dirmodel::error::{ModelError, ModelResult};
use dirmodel::model::Model;

/// Seconds between the AD epoch (1601-01-01) and the Unix epoch
/// (1970-01-01).
pub const EPOCH_OFFSET_SECS: i64 = 11_644_477_200;

/// FILETIME resolution: 100-nanosecond ticks.
pub const TICKS_PER_SEC: i64 = 10_000_000;

/// `accountExpires` value meaning "never".
const NEVER_EXPIRES: i64 = i64::MAX;

/// `userAccountControl` flags.
pub mod uac {
    pub const ACCOUNTDISABLE: u32 = 0x2;
    pub const LOCKOUT: u32 = 0x10;
    pub const PASSWD_CANT_CHANGE: u32 = 0x40;
    pub const NORMAL_ACCOUNT: u32 = 0x200;
    pub const DONT_EXPIRE_PASSWD: u32 = 0x1_0000;
    pub const PASSWORD_EXPIRED: u32 = 0x80_0000;
}

/// The current time as an AD FILETIME.
#[must_use]
pub fn filetime_now() -> i64 {
    to_filetime(Utc::now())
}

/// Convert a timestamp to an AD FILETIME.
#[must_use]
pub fn to_filetime(when: DateTime<Utc>) -> i64 {
    (when.timestamp() + EPOCH_OFFSET_SECS) * TICKS_PER_SEC
}

/// Convert an AD FILETIME to a timestamp. `0` and the "never" sentinel
/// have no point in time and come back as `None`.
#[must_use]
pub fn from_filetime(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime <= 0 || filetime == NEVER_EXPIRES {
        return None;
    }
    DateTime::from_timestamp(filetime / TICKS_PER_SEC - EPOCH_OFFSET_SECS, 0)
}

/// Convert an AD relative interval (negative 100-nanosecond ticks, as in
/// `lockoutDuration` or `maxPwdAge`) to seconds.
#[must_use]
pub fn interval_to_secs(interval: i64) -> i64 {
    interval.abs() / TICKS_PER_SEC
}

/// The entry's `userAccountControl` flags; `NORMAL_ACCOUNT` when the
/// attribute is absent or unreadable.
#[must_use]
pub fn account_flags(entry: &Entry) -> u32 {
    entry
        .text("userAccountControl")
        .ok()
        .flatten()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(uac::NORMAL_ACCOUNT)
}

#[must_use]
pub fn is_disabled(entry: &Entry) -> bool {
    account_flags(entry) & uac::ACCOUNTDISABLE != 0
}

#[must_use]
pub fn is_locked_out(entry: &Entry) -> bool {
    account_flags(entry) & uac::LOCKOUT != 0
}

#[must_use]
pub fn password_expires(entry: &Entry) -> bool {
    account_flags(entry) & uac::DONT_EXPIRE_PASSWD == 0
}

#[must_use]
pub fn password_expired(entry: &Entry) -> bool {
    account_flags(entry) & uac::PASSWORD_EXPIRED != 0
}

#[must_use]
pub fn can_change_password(entry: &Entry) -> bool {
    account_flags(entry) & uac::PASSWD_CANT_CHANGE == 0
}

/// When the account expires, per `accountExpires`. `None` for accounts
/// that never expire.
#[must_use]
pub fn expiration(entry: &Entry) -> Option<DateTime<Utc>> {
    filetime_attr(entry, "accountExpires")
}

/// Whether the account's expiration lies in the future (or it never
/// expires at all).
#[must_use]
pub fn is_active(entry: &Entry) -> bool {
    match entry.text("accountExpires").ok().flatten() {
        None => true,
        Some(raw) => match raw.parse::<i64>() {
            Ok(filetime) => from_filetime(filetime).is_none_or(|when| when > Utc::now()),
            Err(_) => false,
        },
    }
}

/// When the password was last set. `None` when `pwdLastSet` is `0`,
/// which AD uses for "must change at next logon".
#[must_use]
pub fn password_last_set(entry: &Entry) -> Option<DateTime<Utc>> {
    filetime_attr(entry, "pwdLastSet")
}

#[must_use]
pub fn failed_login_attempts(entry: &Entry) -> u32 {
    entry
        .text("badPwdCount")
        .ok()
        .flatten()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0)
}

#[must_use]
pub fn last_failed_login(entry: &Entry) -> Option<DateTime<Utc>> {
    filetime_attr(entry, "badPasswordTime")
}

fn filetime_attr(entry: &Entry, attribute: &str) -> Option<DateTime<Utc>> {
    entry
        .text(attribute)
        .ok()
        .flatten()
        .and_then(|raw| raw.parse().ok())
        .and_then(from_filetime)
}

/// Parse an LDAP GeneralizedTime value as AD renders it
/// (`20130327081316.0Z`).
#[must_use]
pub fn from_generalized_time(raw: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S%.fZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// The `userAccountControl` value for a freshly provisioned account.
#[must_use]
pub fn new_account_flags(disabled: bool) -> u32 {
    let mut flags = uac::NORMAL_ACCOUNT;
    if disabled {
        flags |= uac::ACCOUNTDISABLE;
    }
    flags
}

/// Encode a plaintext password for the `unicodePwd` attribute: the value
/// surrounded with double quotes, then encoded as UTF-16LE.
pub fn encode_password(password: &str) -> ModelResult<Vec<u8>> {
    if password.is_empty() {
        return Err(ModelError::schema("unicodePwd: password cannot be empty"));
    }
    let quoted = format!("\"{password}\"");
    Ok(quoted.encode_utf16().flat_map(u16::to_le_bytes).collect())
}

/// AD password management on a [`Model`].
///
/// AD accepts `unicodePwd` writes only over an encrypted connection, so
/// both operations refuse to run unless the model's connection uses
/// implicit TLS.
pub trait AdPasswordOps {
    /// Change a password the way the account holder does it: one modify
    /// deleting the old `unicodePwd` value and adding the new one, which
    /// makes AD enforce the old password.
    fn change_password(&mut self, dn: &str, old: &str, new: &str) -> ModelResult<()>;

    /// Administratively reset a password: a single `unicodePwd` replace.
    fn reset_password(&mut self, dn: &str, new: &str) -> ModelResult<()>;

    /// [`AdPasswordOps::change_password`] with refusals flattened to
    /// `Ok(false)`.
    fn try_change_password(&mut self, dn: &str, old: &str, new: &str) -> ModelResult<bool>;

    /// [`AdPasswordOps::reset_password`] with refusals flattened to
    /// `Ok(false)`.
    fn try_reset_password(&mut self, dn: &str, new: &str) -> ModelResult<bool>;
}

impl AdPasswordOps for Model {
    fn change_password(&mut self, dn: &str, old: &str, new: &str) -> ModelResult<()> {
        require_tls(self)?;
        let ops = vec![
            ModOp::delete_values("unicodePwd", vec![encode_password(old)?]),
            ModOp::add("unicodePwd", vec![encode_password(new)?]),
        ];
        apply_password_ops(self, dn, "password change", ops)
    }

    fn reset_password(&mut self, dn: &str, new: &str) -> ModelResult<()> {
        require_tls(self)?;
        let ops = vec![ModOp::replace("unicodePwd", vec![encode_password(new)?])];
        apply_password_ops(self, dn, "password reset", ops)
    }

    fn try_change_password(&mut self, dn: &str, old: &str, new: &str) -> ModelResult<bool> {
        flatten_refusal(self.change_password(dn, old, new))
    }

    fn try_reset_password(&mut self, dn: &str, new: &str) -> ModelResult<bool> {
        flatten_refusal(self.reset_password(dn, new))
    }
}

fn require_tls(model: &Model) -> ModelResult<()> {
    if model.session().config().encryption != Encryption::ImplicitTls {
        return Err(ModelError::not_supported(
            "password operations require an ldaps (implicit TLS) connection",
        ));
    }
    Ok(())
}

fn apply_password_ops(
    model: &mut Model,
    dn: &str,
    operation: &str,
    ops: Vec<ModOp>,
) -> ModelResult<()> {
    if model.model_type().is_read_only() {
        info!(dn = %dn, operation = %operation, "read-only model, skipping directory modify");
        return Ok(());
    }

    let outcome = model.session_mut().modify(dn, &ops)?;
    if outcome.success {
        Ok(())
    } else {
        Err(ModelError::save_failed(
            dn,
            format!("{operation} refused: {}", outcome.message),
        ))
    }
}

fn flatten_refusal(result: ModelResult<()>) -> ModelResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(ModelError::SaveFailed { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirmodel::model::ModelTypeBuilder;
    use std::sync::Arc;

    fn ad_entry(uac_value: &str) -> Entry {
        let ty = Arc::new(
            ModelTypeBuilder::new("ad-thing")
                .text([
                    "cn",
                    "userAccountControl",
                    "accountExpires",
                    "pwdLastSet",
                    "badPwdCount",
                    "badPasswordTime",
                ])
                .build()
                .unwrap(),
        );
        let mut entry = Entry::new(ty, "cn=bob,dc=example,dc=com");
        entry.set("userAccountControl", uac_value).unwrap();
        entry
    }

    #[test]
    fn test_filetime_round_trip() {
        let when = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let filetime = to_filetime(when);
        assert_eq!(from_filetime(filetime), Some(when));
    }

    #[test]
    fn test_filetime_sentinels_have_no_instant() {
        assert_eq!(from_filetime(0), None);
        assert_eq!(from_filetime(i64::MAX), None);
    }

    #[test]
    fn test_filetime_now_is_after_the_unix_epoch_offset() {
        assert!(filetime_now() > EPOCH_OFFSET_SECS * TICKS_PER_SEC);
    }

    #[test]
    fn test_interval_to_secs_handles_negative_intervals() {
        // 30 minutes of lockout, stored negated as AD does.
        assert_eq!(interval_to_secs(-18_000_000_000), 1800);
        assert_eq!(interval_to_secs(18_000_000_000), 1800);
    }

    #[test]
    fn test_account_flag_predicates() {
        let entry = ad_entry("512"); // NORMAL_ACCOUNT
        assert!(!is_disabled(&entry));
        assert!(!is_locked_out(&entry));
        assert!(password_expires(&entry));
        assert!(!password_expired(&entry));
        assert!(can_change_password(&entry));

        let entry = ad_entry("514"); // NORMAL_ACCOUNT | ACCOUNTDISABLE
        assert!(is_disabled(&entry));

        let entry = ad_entry("528"); // NORMAL_ACCOUNT | LOCKOUT
        assert!(is_locked_out(&entry));
        assert!(!is_disabled(&entry));

        let entry = ad_entry("66048"); // NORMAL_ACCOUNT | DONT_EXPIRE_PASSWD
        assert!(!password_expires(&entry));

        let entry = ad_entry("576"); // NORMAL_ACCOUNT | PASSWD_CANT_CHANGE
        assert!(!can_change_password(&entry));
    }

    #[test]
    fn test_account_flags_default_when_absent() {
        let ty = Arc::new(
            ModelTypeBuilder::new("ad-thing")
                .text(["cn", "userAccountControl"])
                .build()
                .unwrap(),
        );
        let entry = Entry::new(ty, "cn=bob,dc=example,dc=com");
        assert_eq!(account_flags(&entry), uac::NORMAL_ACCOUNT);
    }

    #[test]
    fn test_is_active_follows_expiration() {
        let mut entry = ad_entry("512");
        // Absent accountExpires: never expires.
        assert!(is_active(&entry));

        // The sentinel for "never".
        entry.set("accountExpires", i64::MAX.to_string()).unwrap();
        assert!(is_active(&entry));

        let future = to_filetime(Utc::now() + chrono::Duration::days(30));
        entry.set("accountExpires", future.to_string()).unwrap();
        assert!(is_active(&entry));
        assert!(expiration(&entry).unwrap() > Utc::now());

        let past = to_filetime(Utc::now() - chrono::Duration::days(30));
        entry.set("accountExpires", past.to_string()).unwrap();
        assert!(!is_active(&entry));
    }

    #[test]
    fn test_password_last_set_zero_means_must_change() {
        let mut entry = ad_entry("512");
        entry.set("pwdLastSet", "0").unwrap();
        assert_eq!(password_last_set(&entry), None);

        let when = to_filetime(DateTime::from_timestamp(1_600_000_000, 0).unwrap());
        entry.set("pwdLastSet", when.to_string()).unwrap();
        assert!(password_last_set(&entry).is_some());
    }

    #[test]
    fn test_failed_login_bookkeeping() {
        let mut entry = ad_entry("512");
        assert_eq!(failed_login_attempts(&entry), 0);

        entry.set("badPwdCount", "3").unwrap();
        entry
            .set("badPasswordTime", filetime_now().to_string())
            .unwrap();
        assert_eq!(failed_login_attempts(&entry), 3);
        assert!(last_failed_login(&entry).is_some());
    }

    #[test]
    fn test_generalized_time_parsing() {
        use chrono::TimeZone;

        let expected = Utc.with_ymd_and_hms(2013, 3, 27, 8, 13, 16).unwrap();
        assert_eq!(from_generalized_time("20130327081316.0Z"), Some(expected));
        assert_eq!(from_generalized_time("20130327081316Z"), Some(expected));
        assert_eq!(from_generalized_time("not a time"), None);
    }

    #[test]
    fn test_new_account_flags() {
        assert_eq!(new_account_flags(false), 0x200);
        assert_eq!(new_account_flags(true), 0x202);
    }

    #[test]
    fn test_encode_password_quotes_and_utf16le() {
        let encoded = encode_password("Test123!").unwrap();
        let expected: Vec<u8> = "\"Test123!\""
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        assert_eq!(encoded, expected);

        // Leading and trailing quote, little-endian.
        assert_eq!(&encoded[..2], [0x22, 0x00]);
        assert_eq!(&encoded[encoded.len() - 2..], [0x22, 0x00]);
    }

    #[test]
    fn test_encode_password_rejects_empty() {
        assert!(encode_password("").is_err());
    }

    #[test]
    fn test_encode_password_non_ascii() {
        let encoded = encode_password("Pässwörd!").unwrap();
        assert_eq!(encoded.len() % 2, 0);
    }
}
