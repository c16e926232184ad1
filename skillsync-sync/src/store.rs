//! Profile store access.
//!
//! [`ProfileStore`] exposes the raw operations the pipeline needs: three
//! attribute searches returning every candidate, a point lookup, and the two
//! writes. Disambiguation of search results lives in [`crate::resolver`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use skillsync_core::{
    SkillAssignment, SkillCatalogEntry, SkillId, SkillProvider, SkillProviderId, User, UserId,
};

use crate::auth::BearerToken;
use crate::error::SyncError;
use crate::http::{
    build_client, describe, describe_status, display_query, join_segments, parse_base_url,
};

/// The slice of the downstream profile store used by the pipeline.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `GET /skillsProviders?name=<name>`
    async fn search_skill_providers(
        &self,
        name: &str,
        token: &BearerToken,
    ) -> Result<Vec<SkillProvider>, SyncError>;

    /// `GET /users?handle=<handle>`
    async fn search_users(&self, handle: &str, token: &BearerToken)
        -> Result<Vec<User>, SyncError>;

    /// `GET /skills?skillProviderId=<id>&name=<name>`
    async fn search_skills(
        &self,
        skill_provider_id: &SkillProviderId,
        name: &str,
        token: &BearerToken,
    ) -> Result<Vec<SkillCatalogEntry>, SyncError>;

    /// `GET /users/{userId}/skills/{skillId}`; `None` when absent.
    async fn get_user_skill(
        &self,
        user_id: &UserId,
        skill_id: &SkillId,
        token: &BearerToken,
    ) -> Result<Option<SkillAssignment>, SyncError>;

    /// `POST /users/{userId}/skills`. Any 2xx is success; the body is not
    /// inspected.
    async fn create_user_skill(
        &self,
        user_id: &UserId,
        skill_id: &SkillId,
        metric_value: &str,
        token: &BearerToken,
    ) -> Result<(), SyncError>;

    /// `PATCH /users/{userId}/skills/{skillId}`
    async fn update_user_skill(
        &self,
        user_id: &UserId,
        skill_id: &SkillId,
        metric_value: &str,
        token: &BearerToken,
    ) -> Result<(), SyncError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserSkill<'a> {
    skill_id: &'a SkillId,
    metric_value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserSkill<'a> {
    metric_value: &'a str,
}

/// Point lookup body as the store returns it. Every field is optional; the
/// record only counts as present when it carries an `id`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUserSkill {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    metric_value: Option<Value>,
}

impl StoredUserSkill {
    /// `None` for empty bodies, non-objects and records without an `id`.
    fn parse(body: &str) -> Option<Self> {
        let record: Self = serde_json::from_str(body).ok()?;
        match &record.id {
            Some(Value::String(id)) if !id.is_empty() => Some(record),
            Some(Value::Number(_)) => Some(record),
            _ => None,
        }
    }

    fn into_assignment(self, user_id: &UserId, skill_id: &SkillId) -> SkillAssignment {
        let metric_value = match self.metric_value {
            Some(Value::String(v)) => Some(v),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        SkillAssignment {
            user_id: user_id.clone(),
            skill_id: skill_id.clone(),
            metric_value,
        }
    }
}

/// reqwest-backed [`ProfileStore`].
#[derive(Debug, Clone)]
pub struct HttpProfileStore {
    client: Client,
    base: Url,
}

impl HttpProfileStore {
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

    async fn search<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        token: &BearerToken,
    ) -> Result<Vec<T>, SyncError> {
        let shown = display_query(&format!("/{path}"), params);
        tracing::debug!(path = %shown, "request GET");

        let read_err = |reason: String| SyncError::DownstreamRead {
            path: shown.clone(),
            reason,
        };

        let response = self
            .client
            .get(join_segments(&self.base, &[path]))
            .query(params)
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| read_err(describe(&e)))?;

        // A search that matches nothing may come back as 404.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(read_err(describe_status(response).await));
        }
        response.json().await.map_err(|e| read_err(describe(&e)))
    }

    async fn write(
        &self,
        method: &'static str,
        segments: &[&str],
        body: &(impl Serialize + Sync),
        token: &BearerToken,
    ) -> Result<(), SyncError> {
        let path = format!("/{}", segments.join("/"));
        tracing::debug!(method, path = %path, "request write");

        let write_err = |reason: String| SyncError::DownstreamWrite {
            method,
            path: path.clone(),
            reason,
        };

        let url = join_segments(&self.base, segments);
        let request = match method {
            "PATCH" => self.client.patch(url),
            _ => self.client.post(url),
        };
        let response = request
            .json(body)
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| write_err(describe(&e)))?;

        if !response.status().is_success() {
            return Err(write_err(describe_status(response).await));
        }
        tracing::debug!(method, path = %path, status = %response.status(), "write accepted");
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    async fn search_skill_providers(
        &self,
        name: &str,
        token: &BearerToken,
    ) -> Result<Vec<SkillProvider>, SyncError> {
        self.search("skillsProviders", &[("name", name)], token).await
    }

    async fn search_users(
        &self,
        handle: &str,
        token: &BearerToken,
    ) -> Result<Vec<User>, SyncError> {
        self.search("users", &[("handle", handle)], token).await
    }

    async fn search_skills(
        &self,
        skill_provider_id: &SkillProviderId,
        name: &str,
        token: &BearerToken,
    ) -> Result<Vec<SkillCatalogEntry>, SyncError> {
        self.search(
            "skills",
            &[("skillProviderId", skill_provider_id.0.as_str()), ("name", name)],
            token,
        )
        .await
    }

    async fn get_user_skill(
        &self,
        user_id: &UserId,
        skill_id: &SkillId,
        token: &BearerToken,
    ) -> Result<Option<SkillAssignment>, SyncError> {
        let path = format!("/users/{user_id}/skills/{skill_id}");
        tracing::debug!(path = %path, "request GET");

        let read_err = |reason: String| SyncError::DownstreamRead {
            path: path.clone(),
            reason,
        };

        let url = join_segments(
            &self.base,
            &["users", user_id.0.as_str(), "skills", skill_id.0.as_str()],
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| read_err(describe(&e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(read_err(describe_status(response).await));
        }
        let body = response.text().await.map_err(|e| read_err(describe(&e)))?;
        let existing = StoredUserSkill::parse(&body);
        if existing.is_none() {
            tracing::debug!(path = %path, "no user skill record in response");
        }
        Ok(existing.map(|record| record.into_assignment(user_id, skill_id)))
    }

    async fn create_user_skill(
        &self,
        user_id: &UserId,
        skill_id: &SkillId,
        metric_value: &str,
        token: &BearerToken,
    ) -> Result<(), SyncError> {
        let body = CreateUserSkill {
            skill_id,
            metric_value,
        };
        self.write("POST", &["users", user_id.0.as_str(), "skills"], &body, token)
            .await
    }

    async fn update_user_skill(
        &self,
        user_id: &UserId,
        skill_id: &SkillId,
        metric_value: &str,
        token: &BearerToken,
    ) -> Result<(), SyncError> {
        let body = UpdateUserSkill { metric_value };
        self.write(
            "PATCH",
            &["users", user_id.0.as_str(), "skills", skill_id.0.as_str()],
            &body,
            token,
        )
        .await
    }
}
