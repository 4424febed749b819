use chrono::{NaiveDate, TimeZone, Utc};
use cultura_core::status::{CallStatus, ContractKind, ContractStatus, LegalKind, ProjectStatus};
use cultura_core::types::Timestamp;
use cultura_db::models::applicant::{Applicant, CreateApplicant};
use cultura_db::models::audit::NewAuditEvent;
use cultura_db::models::call::{Call, CreateCall};
use cultura_db::models::contract::{Contract, NewContract, NewSigningToken, SignatureRecord};
use cultura_db::models::project::{CreateProject, Project};
use cultura_db::repositories::{
    ApplicantRepo, AuditEventRepo, CallRepo, ContractNumberRepo, ContractRepo, ProjectRepo,
    SigningTokenRepo,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

fn ts(y: i32, m: u32, d: u32) -> Timestamp {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seed_call(pool: &PgPool) -> Call {
    let input = CreateCall {
        title: "Edital Cultura 2024".into(),
        description: None,
        regulations: None,
        open_at: ts(2024, 1, 1),
        close_at: ts(2024, 1, 31),
        result_at: None,
        total_budget: Decimal::new(100_000, 0),
        required_document_categories: vec!["budget_sheet".into()],
        evaluation_criteria: None,
    };
    CallRepo::insert(pool, &input, Some(1)).await.unwrap()
}

async fn seed_applicant(pool: &PgPool, tax_id: &str, email: &str, code: &str) -> Applicant {
    let input = CreateApplicant {
        user_id: None,
        legal_kind: LegalKind::Individual,
        full_name: "Maria Souza".into(),
        tax_id: tax_id.into(),
        email: email.into(),
        phone: None,
        whatsapp: None,
        address: None,
        city: None,
        state: None,
        postal_code: None,
    };
    ApplicantRepo::insert(pool, &input, code).await.unwrap()
}

async fn seed_project(pool: &PgPool, call: &Call, applicant: &Applicant, code: &str) -> Project {
    let input = CreateProject {
        call_id: call.id,
        applicant_id: applicant.id,
        title: "Teatro na Praça".into(),
        description: None,
        objectives: None,
        justification: None,
        methodology: None,
        schedule: serde_json::Value::Null,
        budget: serde_json::Value::Null,
        requested_amount: Decimal::new(10_000, 0),
        counterpart_amount: Decimal::ZERO,
    };
    ProjectRepo::insert(pool, &input, code).await.unwrap()
}

async fn seed_contract(pool: &PgPool, project: &Project, number: &str) -> Result<Contract, sqlx::Error> {
    let input = NewContract {
        project_id: project.id,
        kind: ContractKind::Execution,
        rendered_content: "Contrato de fomento".into(),
        value: Decimal::new(8_000, 0),
        validity_start: date(2024, 3, 1),
        validity_end: date(2024, 12, 31),
        created_by: None,
    };
    ContractRepo::insert(pool, &input, number).await
}

#[sqlx::test(migrations = "./migrations")]
async fn call_transition_is_compare_and_swap(pool: PgPool) {
    let call = seed_call(&pool).await;
    assert_eq!(call.status, CallStatus::Draft);

    let published = CallRepo::transition(&pool, call.id, &[CallStatus::Draft], CallStatus::Published)
        .await
        .unwrap();
    assert_eq!(published.map(|c| c.status), Some(CallStatus::Published));

    let again = CallRepo::transition(&pool, call.id, &[CallStatus::Draft], CallStatus::Published)
        .await
        .unwrap();
    assert!(again.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn project_sequence_increments_per_call(pool: PgPool) {
    let call = seed_call(&pool).await;
    let first = CallRepo::next_project_sequence(&pool, call.id).await.unwrap();
    let second = CallRepo::next_project_sequence(&pool, call.id).await.unwrap();
    assert_eq!(first, Some(1));
    assert_eq!(second, Some(2));
    assert_eq!(CallRepo::next_project_sequence(&pool, 9_999).await.unwrap(), None);
}

#[sqlx::test(migrations = "./migrations")]
async fn one_project_per_applicant_and_call(pool: PgPool) {
    let call = seed_call(&pool).await;
    let applicant = seed_applicant(&pool, "52998224725", "maria@example.org", "FT1000001").await;
    seed_project(&pool, &call, &applicant, "PRJ-2024-1-0001").await;

    let input = CreateProject {
        call_id: call.id,
        applicant_id: applicant.id,
        title: "Outro".into(),
        description: None,
        objectives: None,
        justification: None,
        methodology: None,
        schedule: serde_json::Value::Null,
        budget: serde_json::Value::Null,
        requested_amount: Decimal::ONE,
        counterpart_amount: Decimal::ZERO,
    };
    let err = ProjectRepo::insert(&pool, &input, "PRJ-2024-1-0002").await.unwrap_err();
    assert_eq!(
        cultura_db::unique_violation_constraint(&err).as_deref(),
        Some("uq_projects_call_applicant")
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn contract_numbers_are_sequential_per_year(pool: PgPool) {
    assert_eq!(ContractNumberRepo::next(&pool, 2024).await.unwrap(), 1);
    assert_eq!(ContractNumberRepo::next(&pool, 2024).await.unwrap(), 2);
    assert_eq!(ContractNumberRepo::next(&pool, 2025).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn only_one_live_execution_contract(pool: PgPool) {
    let call = seed_call(&pool).await;
    let applicant = seed_applicant(&pool, "52998224725", "maria@example.org", "FT1000001").await;
    let project = seed_project(&pool, &call, &applicant, "PRJ-2024-1-0001").await;

    let first = seed_contract(&pool, &project, "CONT-2024-0001").await.unwrap();
    let err = seed_contract(&pool, &project, "CONT-2024-0002").await.unwrap_err();
    assert_eq!(
        cultura_db::unique_violation_constraint(&err).as_deref(),
        Some("uq_contracts_live_execution")
    );

    // Draft contracts cannot be terminated directly, so force the status.
    sqlx::query("UPDATE contracts SET status_id = $2 WHERE id = $1")
        .bind(first.id)
        .bind(ContractStatus::Terminated.id())
        .execute(&pool)
        .await
        .unwrap();
    assert!(seed_contract(&pool, &project, "CONT-2024-0003").await.is_ok());
}

#[sqlx::test(migrations = "./migrations")]
async fn signing_consumes_token_once(pool: PgPool) {
    let call = seed_call(&pool).await;
    let applicant = seed_applicant(&pool, "52998224725", "maria@example.org", "FT1000001").await;
    let project = seed_project(&pool, &call, &applicant, "PRJ-2024-1-0001").await;
    let contract = seed_contract(&pool, &project, "CONT-2024-0001").await.unwrap();

    let now = ts(2024, 2, 20);
    let token = NewSigningToken {
        token_hash: "a".repeat(64),
        expires_at: ts(2024, 2, 21),
    };
    SigningTokenRepo::upsert(&pool, contract.id, &token).await.unwrap();

    assert!(SigningTokenRepo::consume(&pool, contract.id, &token.token_hash, now).await.unwrap());
    assert!(!SigningTokenRepo::consume(&pool, contract.id, &token.token_hash, now).await.unwrap());

    // Re-issuing clears the used marker.
    let reissued = SigningTokenRepo::upsert(&pool, contract.id, &token).await.unwrap();
    assert!(reissued.used_at.is_none());

    let signature = SignatureRecord {
        signed_at: now,
        signer_ip: "203.0.113.9".into(),
        signer_user_agent: Some("test".into()),
        signature_payload: serde_json::json!({"strokes": [1, 2]}),
        document_hash: "b".repeat(64),
    };
    let from = [ContractStatus::Draft, ContractStatus::Sent];
    let signed = ContractRepo::sign(&pool, contract.id, &from, &signature).await.unwrap();
    assert_eq!(signed.map(|c| c.status), Some(ContractStatus::Signed));
    assert!(ContractRepo::sign(&pool, contract.id, &from, &signature).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn project_submit_only_from_draft(pool: PgPool) {
    let call = seed_call(&pool).await;
    let applicant = seed_applicant(&pool, "52998224725", "maria@example.org", "FT1000001").await;
    let project = seed_project(&pool, &call, &applicant, "PRJ-2024-1-0001").await;

    let submitted = ProjectRepo::submit(&pool, project.id, ts(2024, 1, 10)).await.unwrap();
    assert_eq!(submitted.map(|p| p.status), Some(ProjectStatus::Submitted));
    assert!(ProjectRepo::submit(&pool, project.id, ts(2024, 1, 11)).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn audit_events_are_append_only(pool: PgPool) {
    let entry = NewAuditEvent {
        actor_id: Some(1),
        action: "create".into(),
        subject_kind: "call".into(),
        subject_id: 1,
        before_snapshot: None,
        after_snapshot: Some(serde_json::json!({"id": 1})),
        ip_address: None,
        user_agent: None,
        occurred_at: ts(2024, 1, 1),
    };
    let row = AuditEventRepo::insert(&pool, &entry).await.unwrap();

    let update = sqlx::query("UPDATE audit_events SET action = 'tampered' WHERE id = $1")
        .bind(row.id)
        .execute(&pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM audit_events WHERE id = $1")
        .bind(row.id)
        .execute(&pool)
        .await;
    assert!(delete.is_err());

    let trail = AuditEventRepo::list_for_subject(&pool, "call", 1).await.unwrap();
    assert_eq!(trail.len(), 1);
}
