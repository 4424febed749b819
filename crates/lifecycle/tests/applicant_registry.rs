mod common;

use assert_matches::assert_matches;
use common::{admin, ctx, Harness, CPFS};
use cultura_core::capability::{Caller, Capabilities};
use cultura_core::error::CoreError;
use cultura_core::status::{ApplicantStatus, LegalKind};
use cultura_db::models::applicant::{ApplicantFilter, CreateApplicant, UpdateApplicant};
use cultura_events::names;

fn registration(tax_id: &str, kind: LegalKind) -> CreateApplicant {
    CreateApplicant {
        user_id: None,
        legal_kind: kind,
        full_name: "  Coletivo Cultural Boa Vista ".into(),
        tax_id: tax_id.into(),
        email: " Contato@BoaVista.org ".into(),
        phone: Some("  ".into()),
        whatsapp: None,
        address: None,
        city: Some("Recife".into()),
        state: Some("pe".into()),
        postal_code: Some("50000-000".into()),
    }
}

#[tokio::test]
async fn self_registration_normalizes_the_record() {
    let mut h = Harness::new();
    let (applicant, _) = h.applicant().await;

    assert_eq!(applicant.user_id, Some(101));
    assert_eq!(applicant.tax_id, "71460238001");
    assert_eq!(applicant.email, "artista101@example.org");
    assert_eq!(applicant.state.as_deref(), Some("SP"));
    assert_eq!(applicant.postal_code.as_deref(), Some("01001000"));
    assert_eq!(applicant.status, ApplicantStatus::Active);

    let code = &applicant.unique_code;
    assert!(code.starts_with("FT1"));
    assert_eq!(code.len(), 9);
    assert!(code[3..].chars().all(|c| c.is_ascii_digit()));

    assert_eq!(h.event_types(), vec![names::APPLICANT_REGISTERED.to_string()]);
}

#[tokio::test]
async fn managers_register_on_behalf_of_others() {
    let h = Harness::new();
    let created = h
        .services
        .applicants
        .register(
            &admin(),
            &ctx(),
            registration("11.222.333/0001-81", LegalKind::Organization),
        )
        .await
        .unwrap();

    assert_eq!(created.user_id, None);
    assert_eq!(created.tax_id, "11222333000181");
    assert_eq!(created.full_name, "Coletivo Cultural Boa Vista");
    assert_eq!(created.email, "contato@boavista.org");
    assert_eq!(created.phone, None);
    assert_eq!(created.state.as_deref(), Some("PE"));
}

#[tokio::test]
async fn a_user_registers_once() {
    let mut h = Harness::new();
    let (applicant, _) = h.applicant().await;
    let same_user = Caller::user(applicant.user_id.unwrap(), Capabilities::default());

    assert_matches!(
        h.services
            .applicants
            .register(&same_user, &ctx(), registration(CPFS[0], LegalKind::Individual))
            .await,
        Err(CoreError::Conflict(_))
    );
}

#[tokio::test]
async fn tax_ids_are_unique() {
    let mut h = Harness::new();
    let (applicant, _) = h.applicant().await;

    assert_matches!(
        h.services
            .applicants
            .register(
                &admin(),
                &ctx(),
                registration(&applicant.tax_id, LegalKind::Individual)
            )
            .await,
        Err(CoreError::Conflict(_))
    );
}

#[tokio::test]
async fn invalid_tax_ids_are_rejected() {
    let h = Harness::new();
    for bad in ["111.111.111-11", "529.982.247-24", "1234"] {
        assert_matches!(
            h.services
                .applicants
                .register(&admin(), &ctx(), registration(bad, LegalKind::Individual))
                .await,
            Err(CoreError::Validation { field, .. }) if field == "tax_id"
        );
    }
}

#[tokio::test]
async fn only_managers_change_status() {
    let mut h = Harness::new();
    let (applicant, owner) = h.applicant().await;

    let blocked = UpdateApplicant {
        status: Some(ApplicantStatus::Blocked),
        ..Default::default()
    };
    assert_matches!(
        h.services
            .applicants
            .update(&owner, &ctx(), applicant.id, blocked.clone())
            .await,
        Err(CoreError::PermissionDenied(_))
    );

    let updated = h
        .services
        .applicants
        .update(&admin(), &ctx(), applicant.id, blocked)
        .await
        .unwrap();
    assert_eq!(updated.status, ApplicantStatus::Blocked);

    let contact = h
        .services
        .applicants
        .update(
            &owner,
            &ctx(),
            applicant.id,
            UpdateApplicant {
                email: Some("Novo@Example.org".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(contact.email, "novo@example.org");
    assert_eq!(contact.status, ApplicantStatus::Blocked);
}

#[tokio::test]
async fn applicants_see_only_themselves() {
    let mut h = Harness::new();
    let (first, first_caller) = h.applicant().await;
    let (second, _) = h.applicant().await;

    assert_eq!(
        h.services
            .applicants
            .get(&first_caller, first.id)
            .await
            .unwrap()
            .id,
        first.id
    );
    assert_matches!(
        h.services.applicants.get(&first_caller, second.id).await,
        Err(CoreError::PermissionDenied(_))
    );
    assert_matches!(
        h.services
            .applicants
            .list(&first_caller, &ApplicantFilter::default())
            .await,
        Err(CoreError::PermissionDenied(_))
    );

    let all = h
        .services
        .applicants
        .list(&admin(), &ApplicantFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let found = h.services.applicants.find_for_user(101).await.unwrap();
    assert_eq!(found.map(|a| a.id), Some(first.id));
}
