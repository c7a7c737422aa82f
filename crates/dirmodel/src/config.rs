//! Directory connection configuration
//!
//! The structure consumed when a session establishes its connection.
//! Loading it from files or the environment is the host application's
//! concern; this type only defines the shape, defaults and validation.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Transport encryption mode for the directory connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encryption {
    /// Plain TCP, no encryption.
    #[default]
    None,
    /// TLS from the first byte (the `ldaps` scheme, usually port 636).
    #[serde(alias = "simple_tls")]
    ImplicitTls,
    /// Plain TCP upgraded in-band via `StartTLS`.
    #[serde(alias = "start_tls")]
    StartTls,
}

/// Configuration for one directory connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory server hostname or IP address.
    pub host: String,

    /// Directory server port (389 for plain and `StartTLS`, 636 for
    /// implicit TLS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport encryption mode.
    #[serde(default)]
    pub encryption: Encryption,

    /// Identity to bind as when the connection is established. Anonymous
    /// bind when absent.
    #[serde(default, alias = "bind_dn", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Credential for the bind identity.
    #[serde(
        default,
        alias = "bind_password",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<String>,

    /// Base distinguished names of the subtrees this connection works in.
    #[serde(default, alias = "bases")]
    pub base: Vec<String>,

    /// Connect timeout in seconds, passed through to the protocol client.
    /// The client's own default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field(
                "password",
                &self.password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("base", &self.base)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

fn default_port() -> u16 {
    389
}

impl DirectoryConfig {
    /// Create a new configuration for a host, with defaults everywhere else.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            encryption: Encryption::default(),
            username: None,
            password: None,
            base: Vec::new(),
            connect_timeout_secs: None,
        }
    }

    /// Set the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the encryption mode.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Enable implicit TLS and move to the conventional `ldaps` port when
    /// the port was not set explicitly.
    #[must_use]
    pub fn with_implicit_tls(mut self) -> Self {
        self.encryption = Encryption::ImplicitTls;
        if self.port == default_port() {
            self.port = 636;
        }
        self
    }

    /// Set the bind identity and credential.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Add a search base.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base.push(base.into());
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// The directory URL this configuration points at.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = match self.encryption {
            Encryption::ImplicitTls => "ldaps",
            Encryption::None | Encryption::StartTls => "ldap",
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> ModelResult<()> {
        if self.host.is_empty() {
            return Err(ModelError::schema("config: host is required"));
        }

        if self.port == 0 {
            return Err(ModelError::schema("config: port must be non-zero"));
        }

        if self.base.is_empty() {
            return Err(ModelError::schema(
                "config: at least one base dn is required",
            ));
        }

        if self.username.is_some() && self.password.is_none() {
            return Err(ModelError::schema(
                "config: username given without a password",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DirectoryConfig::new("dir.example.com");
        assert_eq!(config.port, 389);
        assert_eq!(config.encryption, Encryption::None);
        assert!(config.username.is_none());
        assert!(config.base.is_empty());
    }

    #[test]
    fn test_config_url() {
        let config = DirectoryConfig::new("dir.example.com");
        assert_eq!(config.url(), "ldap://dir.example.com:389");

        let tls = DirectoryConfig::new("dir.example.com").with_implicit_tls();
        assert_eq!(tls.url(), "ldaps://dir.example.com:636");

        // StartTLS upgrades in-band, the scheme stays plain.
        let starttls =
            DirectoryConfig::new("dir.example.com").with_encryption(Encryption::StartTls);
        assert_eq!(starttls.url(), "ldap://dir.example.com:389");
    }

    #[test]
    fn test_implicit_tls_respects_explicit_port() {
        let config = DirectoryConfig::new("dir.example.com")
            .with_port(10636)
            .with_implicit_tls();
        assert_eq!(config.port, 10636);
    }

    #[test]
    fn test_config_validation() {
        let config = DirectoryConfig::new("dir.example.com")
            .with_credentials("cn=svc,dc=example,dc=com", "secret")
            .with_base("dc=example,dc=com");
        assert!(config.validate().is_ok());

        assert!(DirectoryConfig::new("").validate().is_err());
        assert!(DirectoryConfig::new("dir.example.com").validate().is_err());

        let mut missing_password = config.clone();
        missing_password.password = None;
        assert!(missing_password.validate().is_err());
    }

    #[test]
    fn test_config_deserialization_with_aliases() {
        let json = r#"{
            "host": "dir.example.com",
            "encryption": "start-tls",
            "bind_dn": "cn=svc,dc=example,dc=com",
            "bind_password": "secret",
            "base": ["dc=example,dc=com", "dc=other,dc=com"]
        }"#;
        let config: DirectoryConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.port, 389);
        assert_eq!(config.encryption, Encryption::StartTls);
        assert_eq!(config.username.as_deref(), Some("cn=svc,dc=example,dc=com"));
        assert_eq!(config.base.len(), 2);
    }

    #[test]
    fn test_encryption_accepts_legacy_names() {
        let config: DirectoryConfig =
            serde_json::from_str(r#"{"host": "h", "encryption": "simple_tls"}"#).unwrap();
        assert_eq!(config.encryption, Encryption::ImplicitTls);

        let config: DirectoryConfig =
            serde_json::from_str(r#"{"host": "h", "encryption": "start_tls"}"#).unwrap();
        assert_eq!(config.encryption, Encryption::StartTls);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DirectoryConfig::new("dir.example.com")
            .with_credentials("cn=svc,dc=example,dc=com", "super-secret");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("***REDACTED***"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = DirectoryConfig::new("dir.example.com")
            .with_implicit_tls()
            .with_credentials("cn=svc,dc=example,dc=com", "secret")
            .with_base("dc=example,dc=com");

        let json = serde_json::to_string(&config).unwrap();
        let parsed: DirectoryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.host, "dir.example.com");
        assert_eq!(parsed.port, 636);
        assert_eq!(parsed.encryption, Encryption::ImplicitTls);
    }
}
