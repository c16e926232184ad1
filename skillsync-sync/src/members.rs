//! Upstream members service access.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::auth::BearerToken;
use crate::error::SyncError;
use crate::http::{build_client, describe, describe_status, join_segments, parse_base_url};

/// One entry of the members service skill map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSkill {
    pub tag_name: String,
    pub score: f64,
}

/// Skill map keyed by an opaque tag id.
pub type MemberSkillMap = BTreeMap<String, MemberSkill>;

#[derive(Debug, Deserialize)]
struct MemberSkillsResponse {
    skills: MemberSkillMap,
}

/// The members service, source of truth for skill tags and scores.
#[async_trait]
pub trait MembersService: Send + Sync {
    /// `GET <members>/{handle}/skills?fields=skills`; `None` when the
    /// member does not exist.
    async fn member_skills(
        &self,
        handle: &str,
        token: &BearerToken,
    ) -> Result<Option<MemberSkillMap>, SyncError>;
}

/// reqwest-backed [`MembersService`].
#[derive(Debug, Clone)]
pub struct HttpMembersService {
    client: Client,
    base: Url,
}

impl HttpMembersService {
    pub fn new(client: Client, base_url: &str) -> Result<Self, SyncError> {
        Ok(Self {
            client,
            base: parse_base_url(base_url)?,
        })
    }

    /// Build with a dedicated client using `timeout`.
    pub fn from_url(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        Self::new(build_client(timeout)?, base_url)
    }
}

#[async_trait]
impl MembersService for HttpMembersService {
    async fn member_skills(
        &self,
        handle: &str,
        token: &BearerToken,
    ) -> Result<Option<MemberSkillMap>, SyncError> {
        tracing::debug!(handle, "request GET member skills");

        let upstream_err = |reason: String| SyncError::Upstream {
            handle: handle.to_string(),
            reason,
        };

        let response = self
            .client
            .get(join_segments(&self.base, &[handle, "skills"]))
            .query(&[("fields", "skills")])
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| upstream_err(describe(&e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(upstream_err(describe_status(response).await));
        }

        let body: MemberSkillsResponse = response
            .json()
            .await
            .map_err(|e| upstream_err(describe(&e)))?;
        Ok(Some(body.skills))
    }
}
