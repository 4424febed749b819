#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use cultura_core::capability::{Caller, Capabilities};
use cultura_core::clock::FixedClock;
use cultura_core::config::LifecycleConfig;
use cultura_core::context::RequestContext;
use cultura_core::project::{Decision, EvaluationDecision};
use cultura_core::status::{CallStatus, LegalKind};
use cultura_core::types::Timestamp;
use cultura_db::models::applicant::{Applicant, CreateApplicant};
use cultura_db::models::call::{Call, CreateCall};
use cultura_db::models::contract::{Contract, CreateContract};
use cultura_db::models::project::{CreateProject, Project};
use cultura_events::{EventBus, LifecycleEvent};
use cultura_lifecycle::{
    CollaboratorError, Collaborators, LifecycleServices, MemoryStore, SendOutcome, Shared,
    SigningNotice, SigningNotifier,
};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::broadcast;

/// Valid CPFs for test applicants.
pub const CPFS: [&str; 6] = [
    "529.982.247-25",
    "123.456.789-09",
    "935.411.347-80",
    "111.444.777-35",
    "390.533.447-05",
    "714.602.380-01",
];

pub const TEMPLATE: &str = "Contrato entre {{APPLICANT_NAME}} ({{APPLICANT_TAX_ID}}) e a Fundação \
     para o projeto {{PROJECT_TITLE}} ({{PROJECT_CODE}}), edital {{CALL_TITLE}}, no valor de \
     {{CONTRACT_VALUE}}, vigente de {{VALIDITY_START}} a {{VALIDITY_END}}.";

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Timestamp {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn admin() -> Caller {
    Caller::user(1, Capabilities::all())
}

pub fn evaluator() -> Caller {
    Caller::user(2, Capabilities::for_role("evaluator"))
}

pub fn ctx() -> RequestContext {
    RequestContext::new("203.0.113.7", Some("lifecycle-tests".into()))
}

// ---------------------------------------------------------------------------
// Notifier double
// ---------------------------------------------------------------------------

/// Records every notice; fails on the configured channels.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<SigningNotice>>,
    pub failing_channels: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn fail_on(&self, channel: &str) {
        self.failing_channels.lock().unwrap().push(channel.to_string());
    }

    pub fn sent(&self) -> Vec<SigningNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl SigningNotifier for RecordingNotifier {
    async fn notify(&self, notice: &SigningNotice) -> Result<(), CollaboratorError> {
        if self
            .failing_channels
            .lock()
            .unwrap()
            .contains(&notice.channel)
        {
            return Err(CollaboratorError::Notify(format!(
                "{} gateway unreachable",
                notice.channel
            )));
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub store: Arc<MemoryStore>,
    pub events: broadcast::Receiver<LifecycleEvent>,
    pub services: LifecycleServices,
    pub notifier: Arc<RecordingNotifier>,
    pub artifacts: tempfile::TempDir,
    next_user: i64,
}

impl Harness {
    /// Services over a fresh in-memory store, clock at 2024-01-10 09:00 UTC.
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(ts(2024, 1, 10, 9, 0, 0)));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let bus = Arc::new(EventBus::default());
        let events = bus.subscribe();
        let notifier = Arc::new(RecordingNotifier::default());
        let artifacts = tempfile::tempdir().unwrap();

        let shared = Shared::new(store.clone(), bus, clock.clone(), LifecycleConfig::default());
        let collaborators =
            Collaborators::local(store.clone(), artifacts.path()).with_notifier(notifier.clone());
        let services = LifecycleServices::new(shared, collaborators);

        Self {
            clock,
            store,
            events,
            services,
            notifier,
            artifacts,
            next_user: 100,
        }
    }

    /// Drain every event published so far.
    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn event_types(&mut self) -> Vec<String> {
        self.drain_events()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    // -- Fixtures -----------------------------------------------------------

    pub fn call_input(&self, categories: &[&str]) -> CreateCall {
        CreateCall {
            title: "Edital de Fomento 2024".into(),
            description: Some("Apoio a projetos culturais".into()),
            regulations: None,
            open_at: ts(2024, 1, 1, 0, 0, 0),
            close_at: ts(2024, 1, 31, 23, 59, 59),
            result_at: None,
            total_budget: dec("500000.00"),
            required_document_categories: categories.iter().map(|c| c.to_string()).collect(),
            evaluation_criteria: None,
        }
    }

    /// A published call open through January 2024.
    pub async fn published_call(&self, categories: &[&str]) -> Call {
        let call = self
            .services
            .calls
            .create(&admin(), &ctx(), self.call_input(categories))
            .await
            .unwrap();
        self.services
            .calls
            .transition(&admin(), &ctx(), call.id, CallStatus::Published)
            .await
            .unwrap()
    }

    /// Self-register a new applicant and return it with its caller.
    pub async fn applicant(&mut self) -> (Applicant, Caller) {
        self.next_user += 1;
        let user_id = self.next_user;
        let index = (user_id as usize) % CPFS.len();
        let self_caller = Caller::user(user_id, Capabilities::default());
        let applicant = self
            .services
            .applicants
            .register(
                &self_caller,
                &ctx(),
                CreateApplicant {
                    user_id: None,
                    legal_kind: LegalKind::Individual,
                    full_name: format!("Artista {user_id}"),
                    tax_id: CPFS[index].into(),
                    email: format!("artista{user_id}@example.org"),
                    phone: Some("+55 11 99999-0000".into()),
                    whatsapp: Some("+55 11 98888-0000".into()),
                    address: Some("Rua das Flores, 10".into()),
                    city: Some("São Paulo".into()),
                    state: Some("sp".into()),
                    postal_code: Some("01001-000".into()),
                },
            )
            .await
            .unwrap();
        let caller = Caller::user(user_id, Capabilities::for_role("applicant"))
            .with_applicant(applicant.id);
        (applicant, caller)
    }

    pub fn project_input(&self, call: &Call, applicant: &Applicant) -> CreateProject {
        CreateProject {
            call_id: call.id,
            applicant_id: applicant.id,
            title: "Festival de Choro".into(),
            description: Some("Três noites de música instrumental".into()),
            objectives: Some("Difundir o choro".into()),
            justification: Some("Tradição local".into()),
            methodology: Some("Oficinas e apresentações".into()),
            schedule: json!([{"month": "março", "activity": "oficinas"}]),
            budget: json!({"cachês": "6000.00", "som": "4000.00"}),
            requested_amount: dec("10000.00"),
            counterpart_amount: dec("500.00"),
        }
    }

    /// A complete draft on `call`, with every required document attached.
    pub async fn draft_project(&self, call: &Call, owner: &Applicant, caller: &Caller) -> Project {
        let project = self
            .services
            .projects
            .create(caller, &ctx(), self.project_input(call, owner))
            .await
            .unwrap();
        self.attach_documents(&project, &call.required_document_categories)
            .await;
        project
    }

    pub async fn attach_documents(&self, project: &Project, categories: &[String]) {
        for category in categories {
            self.services
                .projects
                .attach_document(&admin(), &ctx(), project.id, category, &format!("{category}.pdf"))
                .await
                .unwrap();
        }
    }

    /// A project approved for 8000 of the 10000 requested.
    pub async fn approved_project(&mut self) -> (Project, Applicant, Caller) {
        let call = self.published_call(&["budget_sheet"]).await;
        let (owner, caller) = self.applicant().await;
        let project = self.draft_project(&call, &owner, &caller).await;
        self.services
            .projects
            .submit(&caller, &ctx(), project.id)
            .await
            .unwrap();
        let approved = self
            .services
            .projects
            .evaluate(&evaluator(), &ctx(), project.id, approval("8000.00"))
            .await
            .unwrap();
        (approved, owner, caller)
    }

    pub fn contract_input(&self, project: &Project) -> CreateContract {
        CreateContract {
            project_id: project.id,
            kind: None,
            template: TEMPLATE.into(),
            value: dec("8000.00"),
            validity_start: date(2024, 2, 1),
            validity_end: date(2024, 12, 31),
        }
    }

    /// An execution contract, sent over e-mail.
    pub async fn sent_contract(&mut self) -> (Contract, SendOutcome, Project) {
        let (project, _, _) = self.approved_project().await;
        let contract = self
            .services
            .contracts
            .create(&admin(), &ctx(), self.contract_input(&project))
            .await
            .unwrap();
        let outcome = self
            .services
            .contracts
            .send(&admin(), &ctx(), contract.id, &["email".to_string()])
            .await
            .unwrap();
        (outcome.contract.clone(), outcome, project)
    }
}

pub fn approval(amount: &str) -> EvaluationDecision {
    EvaluationDecision {
        decision: Decision::Approved,
        approved_amount: Some(dec(amount)),
        grade: Some(dec("8.75")),
        technical_opinion: Some("Projeto consistente".into()),
        reason: None,
    }
}

pub fn rejection(reason: &str) -> EvaluationDecision {
    EvaluationDecision {
        decision: Decision::Rejected,
        approved_amount: None,
        grade: Some(dec("4.00")),
        technical_opinion: None,
        reason: Some(reason.into()),
    }
}
