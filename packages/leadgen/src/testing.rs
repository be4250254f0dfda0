//! In-memory stores and recording collaborators for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::alerts::{AlertContext, Alerter};
use crate::companies::{Company, CompanyStore};
use crate::dedup::DuplicateEngine;
use crate::events::EventDispatcher;
use crate::jobs::job::{JobStatus, ScrapingJob};
use crate::jobs::store::JobStore;
use crate::metrics::JobMetrics;

/// Job store backed by a map.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, ScrapingJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, job: ScrapingJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    /// Flip the persisted status, as an outside cancellation actor would.
    pub async fn set_status(&self, id: Uuid, status: JobStatus) {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.status = status;
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<ScrapingJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn insert(&self, job: &ScrapingJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, job: &ScrapingJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.progress = progress;
        }
        Ok(())
    }

    async fn is_cancelled(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&id)
            .map(|job| job.status == JobStatus::Cancelled)
            .unwrap_or(false))
    }
}

/// Company store backed by a vec.
#[derive(Default)]
pub struct InMemoryCompanyStore {
    companies: RwLock<Vec<Company>>,
}

impl InMemoryCompanyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Company> {
        self.companies.read().await.clone()
    }

    pub async fn seed(&self, company: Company) {
        self.companies.write().await.push(company);
    }
}

#[async_trait]
impl CompanyStore for InMemoryCompanyStore {
    async fn find_by_name_city(&self, name: &str, city: Option<&str>) -> Result<Option<Company>> {
        Ok(self
            .companies
            .read()
            .await
            .iter()
            .find(|c| c.company_name == name && c.city.as_deref() == city)
            .cloned())
    }

    async fn insert(&self, fields: &HashMap<String, String>) -> Result<Company> {
        let company = Company::from_fields(fields);
        self.companies.write().await.push(company.clone());
        Ok(company)
    }

    async fn update_fields(&self, id: Uuid, fields: &HashMap<String, String>) -> Result<()> {
        let mut companies = self.companies.write().await;
        let Some(company) = companies.iter_mut().find(|c| c.id == id) else {
            anyhow::bail!("no company with id {id}");
        };

        let mut apply = |key: &str, slot: &mut Option<String>| {
            if let Some(value) = fields.get(key) {
                *slot = Some(value.clone());
            }
        };
        if let Some(name) = fields.get("company_name") {
            company.company_name = name.clone();
        }
        apply("city", &mut company.city);
        apply("website", &mut company.website);
        apply("phone", &mut company.phone);
        apply("email", &mut company.email);
        apply("address", &mut company.address);
        apply("postal_code", &mut company.postal_code);
        apply("description", &mut company.description);
        apply("industry", &mut company.industry);
        apply("lead_source", &mut company.lead_source);
        company.updated_at = chrono::Utc::now();

        Ok(())
    }
}

/// Dedup engine answering every lookup with the same scripted matches.
#[derive(Default)]
pub struct ScriptedDuplicateEngine {
    matches: Vec<(Company, f32)>,
    merges: Mutex<Vec<(Uuid, Uuid)>>,
    candidates: Mutex<Vec<(Uuid, Uuid, f32)>>,
}

impl ScriptedDuplicateEngine {
    pub fn new(matches: Vec<(Company, f32)>) -> Self {
        Self {
            matches,
            merges: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
        }
    }

    /// Recorded (primary, duplicate) id pairs.
    pub fn merges(&self) -> Vec<(Uuid, Uuid)> {
        self.merges.lock().expect("merges lock").clone()
    }

    /// Recorded (company, candidate, similarity) triples.
    pub fn candidates(&self) -> Vec<(Uuid, Uuid, f32)> {
        self.candidates.lock().expect("candidates lock").clone()
    }
}

#[async_trait]
impl DuplicateEngine for ScriptedDuplicateEngine {
    async fn find_duplicates(
        &self,
        _company: &Company,
        limit: usize,
    ) -> Result<Vec<(Company, f32)>> {
        Ok(self.matches.iter().take(limit).cloned().collect())
    }

    async fn merge_companies(&self, primary: &Company, duplicate: &Company) -> Result<()> {
        self.merges
            .lock()
            .expect("merges lock")
            .push((primary.id, duplicate.id));
        Ok(())
    }

    async fn create_duplicate_candidate(
        &self,
        company: &Company,
        duplicate: &Company,
        similarity: f32,
    ) -> Result<()> {
        self.candidates
            .lock()
            .expect("candidates lock")
            .push((company.id, duplicate.id, similarity));
        Ok(())
    }
}

/// Event sink that remembers everything it was given.
#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn dispatch_event(&self, event: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .expect("events lock")
            .push((event.to_string(), payload));
    }
}

/// Metrics sink that records which jobs were reported.
#[derive(Default)]
pub struct RecordingMetrics {
    recorded: Mutex<Vec<(Uuid, JobStatus)>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<(Uuid, JobStatus)> {
        self.recorded.lock().expect("metrics lock").clone()
    }
}

#[async_trait]
impl JobMetrics for RecordingMetrics {
    async fn record_job_metrics(&self, job: &ScrapingJob) -> Result<()> {
        self.recorded
            .lock()
            .expect("metrics lock")
            .push((job.id, job.status));
        Ok(())
    }
}

/// Alerter that records (template, dedup_key, error) triples.
#[derive(Default)]
pub struct RecordingAlerter {
    alerts: Mutex<Vec<(String, String, String)>>,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<(String, String, String)> {
        self.alerts.lock().expect("alerts lock").clone()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn send_templated_alert(&self, template: &str, context: &AlertContext) -> Result<()> {
        self.alerts.lock().expect("alerts lock").push((
            template.to_string(),
            context.dedup_key(),
            context.error.clone(),
        ));
        Ok(())
    }
}
