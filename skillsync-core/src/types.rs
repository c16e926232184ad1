//! Domain types shared by the sync pipeline.
//!
//! Downstream records mirror the slice of the profile store's data model the
//! pipeline reads or writes; unknown fields in responses are ignored.
//! Identifiers are opaque strings wrapped in newtypes so a user id can never
//! be passed where a skill id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque downstream identifier of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque downstream identifier of a skill catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillId(pub String);

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SkillId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SkillId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque downstream identifier of a skill provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillProviderId(pub String);

impl fmt::Display for SkillProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SkillProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SkillProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Downstream records
// ---------------------------------------------------------------------------

/// A namespace for skill catalog entries, keyed by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProvider {
    pub id: SkillProviderId,
    pub name: String,
}

/// A downstream user, keyed by `handle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub handle: String,
}

/// A canonical skill, keyed by `(skill_provider_id, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCatalogEntry {
    pub id: SkillId,
    pub skill_provider_id: SkillProviderId,
    pub name: String,
}

/// "This user has this skill at this score", keyed by `(user_id, skill_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillAssignment {
    pub user_id: UserId,
    pub skill_id: SkillId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<String>,
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// One skill tag of a member, flattened from the members service skill map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDetail {
    pub name: String,
    pub score: f64,
}

impl SkillDetail {
    pub fn metric_value(&self) -> String {
        metric_value(self.score)
    }
}

/// Textual form of a score as stored in `metricValue`.
///
/// Shortest decimal representation that round-trips, independent of locale:
/// `4.2` → `"4.2"`, `5.0` → `"5"`.
pub fn metric_value(score: f64) -> String {
    format!("{score}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
