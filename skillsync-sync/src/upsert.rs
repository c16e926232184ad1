//! Skill upsert engine.
//!
//! ## `upsert_skill` protocol
//!
//! 1. Point lookup of the `(user, skill)` assignment.
//! 2. Absent → create with `metricValue = metric_value(score)`.
//! 3. Present → update `metricValue` in place.
//! 4. Pause for the write throttle interval (successful writes only).
//!
//! Running it twice with the same arguments leaves the store in the same
//! state as running it once: the second call updates, never duplicates.

use serde::Serialize;

use skillsync_core::{metric_value, SkillId, UserId};

use crate::auth::BearerToken;
use crate::error::SyncError;
use crate::store::ProfileStore;
use crate::throttle::WriteThrottle;

/// Outcome of a single upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum UpsertOutcome {
    /// No assignment existed; one was created.
    Created {
        skill_id: SkillId,
        metric_value: String,
    },
    /// An assignment existed and its metric value was overwritten.
    Updated {
        skill_id: SkillId,
        previous: Option<String>,
        metric_value: String,
    },
}

impl UpsertOutcome {
    pub fn metric_value(&self) -> &str {
        match self {
            UpsertOutcome::Created { metric_value, .. }
            | UpsertOutcome::Updated { metric_value, .. } => metric_value,
        }
    }
}

pub async fn upsert_skill(
    store: &dyn ProfileStore,
    throttle: &WriteThrottle,
    user_id: &UserId,
    skill_id: &SkillId,
    score: f64,
    token: &BearerToken,
) -> Result<UpsertOutcome, SyncError> {
    let value = metric_value(score);
    let existing = store.get_user_skill(user_id, skill_id, token).await?;

    let outcome = match existing {
        None => {
            store
                .create_user_skill(user_id, skill_id, &value, token)
                .await?;
            tracing::info!(user_id = %user_id, skill_id = %skill_id, metric_value = %value, "created user skill");
            UpsertOutcome::Created {
                skill_id: skill_id.clone(),
                metric_value: value,
            }
        }
        Some(current) => {
            store
                .update_user_skill(user_id, skill_id, &value, token)
                .await?;
            tracing::info!(
                user_id = %user_id,
                skill_id = %skill_id,
                previous = current.metric_value.as_deref().unwrap_or(""),
                metric_value = %value,
                "updated user skill",
            );
            UpsertOutcome::Updated {
                skill_id: skill_id.clone(),
                previous: current.metric_value,
                metric_value: value,
            }
        }
    };

    throttle.pause().await;
    Ok(outcome)
}
