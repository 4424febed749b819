//! Contract (contrato) models, DTOs and the signing token row.

use cultura_core::integrity::DocumentFields;
use cultura_core::status::{ContractKind, ContractStatus};
use cultura_core::types::{Date, DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Contract entity
// ---------------------------------------------------------------------------

/// A row from the `contracts` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Contract {
    pub id: DbId,
    pub project_id: DbId,
    pub contract_number: String,
    #[sqlx(rename = "kind_id", try_from = "i16")]
    pub kind: ContractKind,
    pub rendered_content: String,
    pub value: Money,
    pub validity_start: Date,
    pub validity_end: Date,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: ContractStatus,
    pub signed_at: Option<Timestamp>,
    pub signer_ip: Option<String>,
    pub signer_user_agent: Option<String>,
    pub signature_payload: Option<serde_json::Value>,
    pub document_hash: Option<String>,
    pub artifact_ref: Option<String>,
    pub sent_channels: Vec<String>,
    pub sent_at: Option<Timestamp>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Contract {
    /// The persisted fields covered by the document hash.
    pub fn document_fields(&self) -> DocumentFields<'_> {
        DocumentFields {
            contract_number: &self.contract_number,
            content: &self.rendered_content,
            value: self.value,
            validity_start: self.validity_start,
            validity_end: self.validity_end,
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request for creating a contract from an approved project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContract {
    pub project_id: DbId,
    pub kind: Option<ContractKind>,
    /// Contract text with `{{PLACEHOLDER}}` tokens.
    pub template: String,
    pub value: Money,
    pub validity_start: Date,
    pub validity_end: Date,
}

/// Request for editing an unsigned contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContract {
    pub template: Option<String>,
    pub value: Option<Money>,
    pub validity_start: Option<Date>,
    pub validity_end: Option<Date>,
}

/// Row values for a contract insert, after rendering.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub project_id: DbId,
    pub kind: ContractKind,
    pub rendered_content: String,
    pub value: Money,
    pub validity_start: Date,
    pub validity_end: Date,
    pub created_by: Option<DbId>,
}

/// Column changes for an unsigned contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractChanges {
    pub rendered_content: Option<String>,
    pub value: Option<Money>,
    pub validity_start: Option<Date>,
    pub validity_end: Option<Date>,
}

/// Signature columns written by the signing transaction.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub signed_at: Timestamp,
    pub signer_ip: String,
    pub signer_user_agent: Option<String>,
    pub signature_payload: serde_json::Value,
    pub document_hash: String,
}

// ---------------------------------------------------------------------------
// Signing token
// ---------------------------------------------------------------------------

/// A row from `contract_signing_tokens`. The plaintext is never stored.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct SigningToken {
    pub id: DbId,
    pub contract_id: DbId,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub used_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SigningToken {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Values for issuing (or replacing) a contract's signing token.
#[derive(Debug, Clone)]
pub struct NewSigningToken {
    pub token_hash: String,
    pub expires_at: Timestamp,
}
