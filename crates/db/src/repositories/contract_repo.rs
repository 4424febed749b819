//! Repositories for `contracts`, `contract_signing_tokens` and
//! `contract_number_sequences`.

use cultura_core::status::{ContractKind, ContractStatus};
use cultura_core::types::{Date, DbId, Timestamp};
use sqlx::PgExecutor;

use super::status_ids;
use crate::models::contract::{
    Contract, ContractChanges, NewContract, NewSigningToken, SignatureRecord, SigningToken,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const COLUMNS: &str = "\
    id, project_id, contract_number, kind_id, rendered_content, value, \
    validity_start, validity_end, status_id, signed_at, signer_ip, \
    signer_user_agent, signature_payload, document_hash, artifact_ref, \
    sent_channels, sent_at, created_by, created_at, updated_at";

const TOKEN_COLUMNS: &str =
    "id, contract_id, token_hash, expires_at, used_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// ContractRepo
// ---------------------------------------------------------------------------

/// Provides CRUD and status operations for contracts.
pub struct ContractRepo;

impl ContractRepo {
    /// Insert a contract in `draft` under an allocated number.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &NewContract,
        contract_number: &str,
    ) -> Result<Contract, sqlx::Error> {
        let query = format!(
            "INSERT INTO contracts \
                (project_id, contract_number, kind_id, rendered_content, value, \
                 validity_start, validity_end, status_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(input.project_id)
            .bind(contract_number)
            .bind(input.kind.id())
            .bind(&input.rendered_content)
            .bind(input.value)
            .bind(input.validity_start)
            .bind(input.validity_end)
            .bind(ContractStatus::Draft.id())
            .bind(input.created_by)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contracts WHERE id = $1");
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list_for_project<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: DbId,
    ) -> Result<Vec<Contract>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contracts WHERE project_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(project_id)
            .fetch_all(executor)
            .await
    }

    /// The project's execution contract that is neither expired nor terminated.
    pub async fn find_live_execution<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: DbId,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contracts \
             WHERE project_id = $1 AND kind_id = $2 AND NOT (status_id = ANY($3)) \
             LIMIT 1"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(project_id)
            .bind(ContractKind::Execution.id())
            .bind(status_ids(&[ContractStatus::Expired, ContractStatus::Terminated]))
            .fetch_optional(executor)
            .await
    }

    /// Apply term changes while the status is one of `expected`. The edited
    /// contract always lands back in `draft`.
    pub async fn update_terms<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        expected: &[ContractStatus],
        changes: &ContractChanges,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET \
                rendered_content = COALESCE($3, rendered_content), \
                value = COALESCE($4, value), \
                validity_start = COALESCE($5, validity_start), \
                validity_end = COALESCE($6, validity_end), \
                status_id = $7 \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(status_ids(expected))
            .bind(&changes.rendered_content)
            .bind(changes.value)
            .bind(changes.validity_start)
            .bind(changes.validity_end)
            .bind(ContractStatus::Draft.id())
            .fetch_optional(executor)
            .await
    }

    /// Store the locator of the latest rendering artifact.
    pub async fn set_artifact_ref<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        artifact_ref: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE contracts SET artifact_ref = $2 WHERE id = $1")
            .bind(id)
            .bind(artifact_ref)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move to `sent` (or stay there) and record the channels attempted.
    pub async fn mark_sent<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        from: &[ContractStatus],
        channels: &[String],
        sent_at: Timestamp,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET status_id = $3, sent_channels = $4, sent_at = $5 \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(status_ids(from))
            .bind(ContractStatus::Sent.id())
            .bind(channels)
            .bind(sent_at)
            .fetch_optional(executor)
            .await
    }

    /// Compare-and-swap into `signed`, writing every signature column.
    pub async fn sign<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        from: &[ContractStatus],
        signature: &SignatureRecord,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET \
                status_id = $3, \
                signed_at = $4, \
                signer_ip = $5, \
                signer_user_agent = $6, \
                signature_payload = $7, \
                document_hash = $8 \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(status_ids(from))
            .bind(ContractStatus::Signed.id())
            .bind(signature.signed_at)
            .bind(&signature.signer_ip)
            .bind(&signature.signer_user_agent)
            .bind(&signature.signature_payload)
            .bind(&signature.document_hash)
            .fetch_optional(executor)
            .await
    }

    /// Compare-and-swap the status from any of `from` to `to`.
    pub async fn transition<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        from: &[ContractStatus],
        to: ContractStatus,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET status_id = $3 \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(status_ids(from))
            .bind(to.id())
            .fetch_optional(executor)
            .await
    }

    /// Signed or active contracts whose validity ended before `today`.
    pub async fn list_lapsed<'e, E: PgExecutor<'e>>(
        executor: E,
        today: Date,
    ) -> Result<Vec<Contract>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contracts \
             WHERE status_id = ANY($1) AND validity_end < $2 \
             ORDER BY validity_end, id"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(status_ids(&[ContractStatus::Signed, ContractStatus::Active]))
            .bind(today)
            .fetch_all(executor)
            .await
    }

    pub async fn status_of<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<i16>, sqlx::Error> {
        sqlx::query_scalar("SELECT status_id FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}

// ---------------------------------------------------------------------------
// SigningTokenRepo
// ---------------------------------------------------------------------------

/// Stores the single live signing token of each contract.
pub struct SigningTokenRepo;

impl SigningTokenRepo {
    /// Issue a token, replacing whatever token the contract had before.
    pub async fn upsert<'e, E: PgExecutor<'e>>(
        executor: E,
        contract_id: DbId,
        token: &NewSigningToken,
    ) -> Result<SigningToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO contract_signing_tokens (contract_id, token_hash, expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (contract_id) DO UPDATE SET \
                token_hash = EXCLUDED.token_hash, \
                expires_at = EXCLUDED.expires_at, \
                used_at = NULL \
             RETURNING {TOKEN_COLUMNS}"
        );
        sqlx::query_as::<_, SigningToken>(&query)
            .bind(contract_id)
            .bind(&token.token_hash)
            .bind(token.expires_at)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_contract<'e, E: PgExecutor<'e>>(
        executor: E,
        contract_id: DbId,
    ) -> Result<Option<SigningToken>, sqlx::Error> {
        let query = format!(
            "SELECT {TOKEN_COLUMNS} FROM contract_signing_tokens WHERE contract_id = $1"
        );
        sqlx::query_as::<_, SigningToken>(&query)
            .bind(contract_id)
            .fetch_optional(executor)
            .await
    }

    /// Drop the contract's token so no link issued so far can sign.
    pub async fn revoke<'e, E: PgExecutor<'e>>(
        executor: E,
        contract_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contract_signing_tokens WHERE contract_id = $1")
            .bind(contract_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the token used if it is still the live, unexpired, unused one.
    pub async fn consume<'e, E: PgExecutor<'e>>(
        executor: E,
        contract_id: DbId,
        token_hash: &str,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE contract_signing_tokens SET used_at = $3 \
             WHERE contract_id = $1 AND token_hash = $2 \
               AND used_at IS NULL AND expires_at > $3",
        )
        .bind(contract_id)
        .bind(token_hash)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// ---------------------------------------------------------------------------
// ContractNumberRepo
// ---------------------------------------------------------------------------

/// Per-year contract number counter.
pub struct ContractNumberRepo;

impl ContractNumberRepo {
    /// Take the next sequence value for `year`, starting at 1.
    pub async fn next<'e, E: PgExecutor<'e>>(executor: E, year: i32) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO contract_number_sequences (year, last_value) VALUES ($1, 1) \
             ON CONFLICT (year) DO UPDATE \
                SET last_value = contract_number_sequences.last_value + 1 \
             RETURNING last_value",
        )
        .bind(year)
        .fetch_one(executor)
        .await
    }
}
