use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::documents::{document_key, DocumentKind, DocumentStorage};
use super::import::BoardRecord;
use super::meeting::CalendarProvider;
use crate::cache::{CacheField, SessionCache, SessionContext};
use crate::ids::HashKey;
use crate::store::{ApplicantId, CompanyId, Database, NewApplicant, PipelineEvent, Tables};
use crate::workflows::interviews::service::commit;
use crate::workflows::interviews::SchedulingError;
use crate::workflows::tenancy::team_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

/// Intake, document exchange, and meeting links for applicants.
pub struct ApplicantService<S, P, C> {
    database: Arc<Database>,
    storage: Arc<S>,
    calendar: Arc<P>,
    cache: Arc<C>,
}

impl<S, P, C> ApplicantService<S, P, C>
where
    S: DocumentStorage,
    P: CalendarProvider,
    C: SessionCache + 'static,
{
    pub fn new(database: Arc<Database>, storage: Arc<S>, calendar: Arc<P>, cache: Arc<C>) -> Self {
        Self {
            database,
            storage,
            calendar,
            cache,
        }
    }

    /// Upserts board rows into a team. New applicants start in the team's first
    /// status at round 0, then take the `imported` binding when the team has one.
    pub async fn import(
        &self,
        company_id: CompanyId,
        team: &HashKey,
        records: &[BoardRecord],
        now: DateTime<Utc>,
    ) -> Result<ImportSummary, SchedulingError> {
        let mut tx = self.database.begin().await;
        let team_id = team_id(&tx, company_id, team)?;
        let initial = tx
            .statuses_of(team_id)
            .first()
            .map(|status| status.id)
            .ok_or_else(|| SchedulingError::BadInput("team has no statuses".to_string()))?;
        let imported = tx.event_binding(team_id, PipelineEvent::Imported);

        let mut summary = ImportSummary::default();
        for record in records {
            let existing = tx
                .find_applicant(team_id, &record.site, &record.outer_id)
                .map(|applicant| applicant.id);
            match existing {
                Some(id) => {
                    if let Some(applicant) = tx.applicant_mut(id) {
                        applicant.name = record.name.clone();
                        applicant.email = record.email.clone();
                    }
                    summary.updated += 1;
                }
                None => {
                    let id = tx.insert_applicant(NewApplicant {
                        company_id,
                        team_id,
                        site: record.site.clone(),
                        outer_id: record.outer_id.clone(),
                        name: record.name.clone(),
                        email: record.email.clone(),
                        status_id: initial,
                        created_at: now,
                    })?;
                    if let Some(status) = imported {
                        tx.set_applicant_status(id, status)?;
                    }
                    summary.created += 1;
                }
            }
        }

        commit(tx)?;
        info!(
            team = %team,
            created = summary.created,
            updated = summary.updated,
            "board export imported"
        );
        Ok(summary)
    }

    /// Stores a document and records its key; fires `documents_submitted` when bound.
    pub async fn upload_document(
        &self,
        company_id: CompanyId,
        applicant: &HashKey,
        kind: DocumentKind,
        extension: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, SchedulingError> {
        if extension.trim().trim_start_matches('.').is_empty() {
            return Err(SchedulingError::BadInput(
                "document extension is required".to_string(),
            ));
        }
        {
            let tables = self.database.read().await;
            applicant_id(&tables, company_id, applicant)?;
        }

        let key = document_key(kind, applicant, extension);
        self.storage.put(&key, bytes, content_type).await?;

        let mut tx = self.database.begin().await;
        let id = applicant_id(&tx, company_id, applicant)?;
        let team_id = tx
            .applicant(id)
            .map(|row| row.team_id)
            .ok_or(SchedulingError::NotFound("applicant"))?;
        if let Some(row) = tx.applicant_mut(id) {
            match kind {
                DocumentKind::Resume => row.resume = Some(key.clone()),
                DocumentKind::CurriculumVitae => row.curriculum_vitae = Some(key.clone()),
            }
        }
        if let Some(status) = tx.event_binding(team_id, PipelineEvent::DocumentsSubmitted) {
            tx.set_applicant_status(id, status)?;
        }
        commit(tx)?;

        info!(applicant = %applicant, %key, "document stored");
        Ok(key)
    }

    pub async fn download_document(
        &self,
        company_id: CompanyId,
        applicant: &HashKey,
        kind: DocumentKind,
    ) -> Result<Vec<u8>, SchedulingError> {
        let key = {
            let tables = self.database.read().await;
            let id = applicant_id(&tables, company_id, applicant)?;
            let row = tables
                .applicant(id)
                .ok_or(SchedulingError::NotFound("applicant"))?;
            match kind {
                DocumentKind::Resume => row.resume.clone(),
                DocumentKind::CurriculumVitae => row.curriculum_vitae.clone(),
            }
            .ok_or(SchedulingError::NotFound("document"))?
        };
        Ok(self.storage.get(&key).await?)
    }

    /// Creates a meeting for the applicant's booked interview and stores its link.
    pub async fn publish_meeting_url(
        &self,
        session: &SessionContext,
        applicant: &HashKey,
    ) -> Result<String, SchedulingError> {
        let token = self
            .cache
            .get(session.user_hash_key.as_str(), CacheField::OauthRefreshToken)
            .await?
            .ok_or_else(|| {
                SchedulingError::BadInput("calendar access is not connected".to_string())
            })?;

        let (title, start, end) = {
            let tables = self.database.read().await;
            let id = applicant_id(&tables, session.company_id, applicant)?;
            let schedule = tables
                .applicant(id)
                .and_then(|row| row.schedule_id)
                .and_then(|schedule| tables.schedule(schedule))
                .ok_or(SchedulingError::NotFound("schedule"))?;
            (schedule.title.clone(), schedule.start, schedule.end)
        };

        let url = self
            .calendar
            .issue_meeting_url(&token, &title, start, end)
            .await
            .map_err(|err| {
                warn!(applicant = %applicant, error = %err, "meeting link not issued");
                err
            })?;

        let mut tx = self.database.begin().await;
        let id = applicant_id(&tx, session.company_id, applicant)?;
        if let Some(row) = tx.applicant_mut(id) {
            row.meet_url = Some(url.clone());
        }
        commit(tx)?;
        Ok(url)
    }
}

fn applicant_id(
    tables: &Tables,
    company_id: CompanyId,
    key: &HashKey,
) -> Result<ApplicantId, SchedulingError> {
    tables
        .applicant_by_key(company_id, key)
        .map(|applicant| applicant.id)
        .ok_or(SchedulingError::NotFound("applicant"))
}
