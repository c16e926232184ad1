//! Sync orchestrator used by CLI and daemon.
//!
//! One event is one unit of work:
//!
//! ```text
//! tokens → skill provider → user → upstream skills → per skill: catalog + upsert
//! ```
//!
//! Everything before the per-skill loop is a hard dependency; a failure there
//! aborts the event before any write. Inside the loop skills run one at a
//! time, and the first unresolved catalog entry or failed write aborts the
//! remaining skills. Writes already acknowledged are not rolled back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use skillsync_core::{Config, SkillProviderId, SyncEvent, UserId};

use crate::auth::{ClientCredentialsProvider, TokenProvider};
use crate::error::SyncError;
use crate::http::build_client;
use crate::members::{HttpMembersService, MembersService};
use crate::resolver::{find_skill_provider, find_user, SkillCatalog};
use crate::skills::fetch_skills;
use crate::store::{HttpProfileStore, ProfileStore};
use crate::throttle::WriteThrottle;
use crate::upsert::{upsert_skill, UpsertOutcome};

/// Remote collaborators of the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ProfileStore>,
    pub members: Arc<dyn MembersService>,
    /// Token for the profile store audience.
    pub store_token: Arc<dyn TokenProvider>,
    /// Token for the members service audience.
    pub members_token: Arc<dyn TokenProvider>,
}

/// Per-skill result inside a [`SyncReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillOutcome {
    pub skill: String,
    pub score: f64,
    #[serde(flatten)]
    pub outcome: UpsertOutcome,
}

/// Summary of one fully processed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub handle: String,
    pub user_id: UserId,
    pub skill_provider_id: SkillProviderId,
    pub outcomes: Vec<SkillOutcome>,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, UpsertOutcome::Created { .. }))
            .count()
    }

    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, UpsertOutcome::Updated { .. }))
            .count()
    }
}

/// Synchronizes one user's skills per event.
pub struct SkillSync {
    remote: Collaborators,
    skill_provider_name: String,
    throttle: WriteThrottle,
}

impl SkillSync {
    pub fn new(
        remote: Collaborators,
        skill_provider_name: impl Into<String>,
        throttle: WriteThrottle,
    ) -> Self {
        Self {
            remote,
            skill_provider_name: skill_provider_name.into(),
            throttle,
        }
    }

    /// Wire HTTP clients and client-credentials token providers from config.
    /// All four share one connection pool and the configured request timeout.
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let client = build_client(config.request_timeout())?;
        let remote = Collaborators {
            store: Arc::new(HttpProfileStore::new(
                client.clone(),
                &config.ubahn_api_url,
            )?),
            members: Arc::new(HttpMembersService::new(
                client.clone(),
                &config.members_api_url,
            )?),
            store_token: Arc::new(ClientCredentialsProvider::new(
                client.clone(),
                &config.auth,
                &config.auth.ubahn_audience,
            )?),
            members_token: Arc::new(ClientCredentialsProvider::new(
                client,
                &config.auth,
                &config.auth.topcoder_audience,
            )?),
        };
        Ok(Self::new(
            remote,
            config.skill_provider_name.clone(),
            WriteThrottle::fixed(config.sleep_time()),
        ))
    }

    pub fn skill_provider_name(&self) -> &str {
        &self.skill_provider_name
    }

    pub fn throttle(&self) -> WriteThrottle {
        self.throttle
    }

    /// Decode and validate a raw event, then process it. Nothing goes out on
    /// the wire when validation fails.
    pub async fn process_value(&self, raw: Value) -> Result<SyncReport, SyncError> {
        let event = SyncEvent::from_value(raw)?;
        self.process(&event).await
    }

    pub async fn process(&self, event: &SyncEvent) -> Result<SyncReport, SyncError> {
        event.validate()?;
        let span = tracing::info_span!("sync", handle = %event.handle());
        let result = self.run(event.handle()).instrument(span).await;
        if let Err(err) = &result {
            if err.is_retryable() {
                tracing::warn!(handle = %event.handle(), error = %err, "sync failed, retryable");
            } else {
                tracing::error!(handle = %event.handle(), error = %err, "sync failed");
            }
        }
        result
    }

    async fn run(&self, handle: &str) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let store = self.remote.store.as_ref();

        let members_token = self.remote.members_token.token().await?;
        let store_token = self.remote.store_token.token().await?;

        let provider = find_skill_provider(store, &self.skill_provider_name, &store_token)
            .await?
            .ok_or_else(|| SyncError::SkillProviderNotFound {
                name: self.skill_provider_name.clone(),
            })?;

        let user = find_user(store, handle, &store_token)
            .await?
            .ok_or_else(|| SyncError::UserNotFound {
                handle: handle.to_string(),
            })?;

        let skills = fetch_skills(self.remote.members.as_ref(), handle, &members_token).await?;
        tracing::info!(count = skills.len(), user_id = %user.id, "syncing skills");

        let mut catalog = SkillCatalog::new(store, &provider.id, &store_token);
        let mut outcomes = Vec::with_capacity(skills.len());
        for skill in skills {
            let entry = catalog.resolve(&skill.name).await?.ok_or_else(|| {
                SyncError::SkillNotFound {
                    name: skill.name.clone(),
                    skill_provider_id: provider.id.clone(),
                }
            })?;
            let outcome = upsert_skill(
                store,
                &self.throttle,
                &user.id,
                &entry.id,
                skill.score,
                &store_token,
            )
            .await?;
            outcomes.push(SkillOutcome {
                skill: skill.name,
                score: skill.score,
                outcome,
            });
        }

        let report = SyncReport {
            handle: handle.to_string(),
            user_id: user.id,
            skill_provider_id: provider.id,
            outcomes,
            duration_ms: whole_millis(started.elapsed()),
        };
        tracing::info!(
            created = report.created(),
            updated = report.updated(),
            duration_ms = report.duration_ms,
            "sync complete"
        );
        Ok(report)
    }
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`.
fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
