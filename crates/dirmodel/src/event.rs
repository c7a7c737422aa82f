//! Structured session events
//!
//! Every session operation emits exactly one event describing what was
//! attempted and how it went. Consumption is external: the default sink
//! forwards to `tracing`, hosts can install their own sink for metrics or
//! auditing. Change summaries carried by events are already redacted, so
//! sinks may log them verbatim.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::Scope;

/// One structured event per session operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A connection attempt (connect plus initial bind) completed.
    Connect {
        target: String,
        success: bool,
        duration_ms: u64,
    },

    /// One search round-trip completed.
    Search {
        base: String,
        scope: Scope,
        filter: String,
        result_count: usize,
        duration_ms: u64,
    },

    /// One mutating operation completed.
    Mutate {
        /// `add`, `modify` or `delete`.
        operation: String,
        dn: String,
        /// Redacted change summary; binary payloads appear as
        /// content-hash markers, never raw bytes.
        changes: serde_json::Value,
        success: bool,
        message: String,
        duration_ms: u64,
    },

    /// A credential check completed.
    Bind {
        username: String,
        success: bool,
        duration_ms: u64,
    },
}

/// Consumer of session events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SessionEvent);
}

/// Default sink: forwards every event to `tracing`.
///
/// Successful reads log at debug, successful writes at info, failures at
/// warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Connect {
                target,
                success,
                duration_ms,
            } => {
                if *success {
                    debug!(server = %target, duration_ms, "directory connection established");
                } else {
                    warn!(server = %target, duration_ms, "directory connection failed");
                }
            }
            SessionEvent::Search {
                base,
                scope,
                filter,
                result_count,
                duration_ms,
            } => {
                debug!(
                    base = %base,
                    scope = %scope,
                    filter = %filter,
                    result_count,
                    duration_ms,
                    "directory search"
                );
            }
            SessionEvent::Mutate {
                operation,
                dn,
                changes,
                success,
                message,
                duration_ms,
            } => {
                if *success {
                    info!(
                        operation = %operation,
                        dn = %dn,
                        changes = %changes,
                        duration_ms,
                        "directory write"
                    );
                } else {
                    warn!(
                        operation = %operation,
                        dn = %dn,
                        changes = %changes,
                        message = %message,
                        duration_ms,
                        "directory write rejected"
                    );
                }
            }
            SessionEvent::Bind {
                username,
                success,
                duration_ms,
            } => {
                if *success {
                    debug!(username = %username, duration_ms, "credential check passed");
                } else {
                    info!(username = %username, duration_ms, "credential check failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = SessionEvent::Search {
            base: "dc=example,dc=com".to_string(),
            scope: Scope::Subtree,
            filter: "(objectClass=*)".to_string(),
            result_count: 3,
            duration_ms: 12,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "search");
        assert_eq!(json["scope"], "sub");
        assert_eq!(json["result_count"], 3);
    }

    #[test]
    fn test_mutate_event_carries_changes() {
        let event = SessionEvent::Mutate {
            operation: "modify".to_string(),
            dn: "cn=bob,dc=example,dc=com".to_string(),
            changes: serde_json::json!({"mail": ["old@example.com", "new@example.com"]}),
            success: false,
            message: "unwilling to perform".to_string(),
            duration_ms: 4,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "mutate");
        assert_eq!(json["changes"]["mail"][1], "new@example.com");
    }

    #[test]
    fn test_tracing_sink_accepts_all_variants() {
        let sink = TracingSink;
        sink.emit(&SessionEvent::Connect {
            target: "ldap://h:389".to_string(),
            success: true,
            duration_ms: 1,
        });
        sink.emit(&SessionEvent::Bind {
            username: "cn=bob".to_string(),
            success: false,
            duration_ms: 2,
        });
    }
}
