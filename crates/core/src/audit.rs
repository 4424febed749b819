//! Audit trail vocabulary and snapshot helpers.
//!
//! This module lives in `core` (zero internal deps) so the in-memory store,
//! the PostgreSQL store and the HTTP layer all agree on action names,
//! subject kinds and what gets redacted.

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Action constants
// ---------------------------------------------------------------------------

/// Known actions for audit entries.
pub mod actions {
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const TRANSITION: &str = "transition";
    pub const CLOSE_EXPIRED: &str = "close_expired";
    pub const SUBMIT: &str = "submit";
    pub const ATTACH_DOCUMENT: &str = "attach_document";
    pub const START_REVIEW: &str = "start_review";
    pub const EVALUATE: &str = "evaluate";
    pub const CANCEL: &str = "cancel";
    pub const FINISH: &str = "finish";
    pub const START_EXECUTION: &str = "start_execution";
    pub const SEND: &str = "send";
    pub const SIGN: &str = "sign";
    pub const TERMINATE: &str = "terminate";
    pub const EXPIRE: &str = "expire";
    pub const INTEGRITY_ALERT: &str = "integrity_alert";
    pub const RECONCILIATION_REQUIRED: &str = "reconciliation_required";
}

/// Known subject kinds.
pub mod subjects {
    pub const CALL: &str = "call";
    pub const APPLICANT: &str = "applicant";
    pub const PROJECT: &str = "project";
    pub const CONTRACT: &str = "contract";

    pub const ALL: &[&str] = &[CALL, APPLICANT, PROJECT, CONTRACT];
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Keys whose values never reach the audit trail.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "authorization",
    "credential",
    "signature_payload",
];

/// Placeholder written in place of redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Replace the value of any key matching [`SENSITIVE_FIELDS`] with
/// [`REDACTED`], recursing into nested objects and arrays.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String(REDACTED.to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

/// Serialize an entity into a redacted audit snapshot.
pub fn snapshot<T: Serialize>(entity: &T) -> Result<serde_json::Value, CoreError> {
    let value = serde_json::to_value(entity)
        .map_err(|e| CoreError::Internal(format!("audit snapshot failed: {e}")))?;
    Ok(redact_sensitive_fields(&value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn redacts_nested_sensitive_keys() {
        let input = json!({
            "id": 4,
            "signature_payload": {"strokes": [1, 2, 3]},
            "meta": {"signing_token_hash": "abc", "ip": "10.0.0.1"},
            "history": [{"secret_note": "x", "status": "sent"}]
        });
        let out = redact_sensitive_fields(&input);
        assert_eq!(out["id"], 4);
        assert_eq!(out["signature_payload"], REDACTED);
        assert_eq!(out["meta"]["signing_token_hash"], REDACTED);
        assert_eq!(out["meta"]["ip"], "10.0.0.1");
        assert_eq!(out["history"][0]["secret_note"], REDACTED);
        assert_eq!(out["history"][0]["status"], "sent");
    }

    #[test]
    fn snapshot_serializes_and_redacts() {
        #[derive(Serialize)]
        struct Row {
            id: i64,
            password: &'static str,
        }
        let snap = snapshot(&Row { id: 1, password: "hunter2" }).unwrap();
        assert_eq!(snap, json!({"id": 1, "password": REDACTED}));
    }

    #[test]
    fn document_hash_is_not_sensitive() {
        let out = redact_sensitive_fields(&json!({"document_hash": "ff"}));
        assert_eq!(out["document_hash"], "ff");
    }
}
