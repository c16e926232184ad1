//! Identity and catalog resolution against the profile store.
//!
//! Every lookup goes through [`select_single`]:
//! 1. no candidates → `None`
//! 2. one candidate → that record, as returned
//! 3. several → the one whose fields equal the query, else `None`
//!
//! The third rule guards against a search index that is not unique.

use std::collections::HashMap;

use skillsync_core::{SkillCatalogEntry, SkillProvider, SkillProviderId, User};

use crate::auth::BearerToken;
use crate::error::SyncError;
use crate::store::ProfileStore;

/// Reduce a search result to at most one record.
pub fn select_single<T>(candidates: Vec<T>, is_exact: impl Fn(&T) -> bool) -> Option<T> {
    match candidates.len() {
        0 => None,
        1 => candidates.into_iter().next(),
        _ => candidates.into_iter().find(|candidate| is_exact(candidate)),
    }
}

pub async fn find_skill_provider(
    store: &dyn ProfileStore,
    name: &str,
    token: &BearerToken,
) -> Result<Option<SkillProvider>, SyncError> {
    let candidates = store.search_skill_providers(name, token).await?;
    Ok(select_single(candidates, |p| p.name == name))
}

pub async fn find_user(
    store: &dyn ProfileStore,
    handle: &str,
    token: &BearerToken,
) -> Result<Option<User>, SyncError> {
    let candidates = store.search_users(handle, token).await?;
    Ok(select_single(candidates, |u| u.handle == handle))
}

pub async fn find_skill(
    store: &dyn ProfileStore,
    skill_provider_id: &SkillProviderId,
    name: &str,
    token: &BearerToken,
) -> Result<Option<SkillCatalogEntry>, SyncError> {
    let candidates = store.search_skills(skill_provider_id, name, token).await?;
    Ok(select_single(candidates, |s| {
        &s.skill_provider_id == skill_provider_id && s.name == name
    }))
}

/// Catalog lookups for one event. The provider is fixed, so hits are cached
/// by skill name.
pub struct SkillCatalog<'a> {
    store: &'a dyn ProfileStore,
    skill_provider_id: &'a SkillProviderId,
    token: &'a BearerToken,
    cache: HashMap<String, SkillCatalogEntry>,
}

impl<'a> SkillCatalog<'a> {
    pub fn new(
        store: &'a dyn ProfileStore,
        skill_provider_id: &'a SkillProviderId,
        token: &'a BearerToken,
    ) -> Self {
        Self {
            store,
            skill_provider_id,
            token,
            cache: HashMap::new(),
        }
    }

    pub async fn resolve(&mut self, name: &str) -> Result<Option<SkillCatalogEntry>, SyncError> {
        if let Some(hit) = self.cache.get(name) {
            return Ok(Some(hit.clone()));
        }
        let found = find_skill(self.store, self.skill_provider_id, name, self.token).await?;
        if let Some(entry) = &found {
            self.cache.insert(name.to_string(), entry.clone());
        }
        Ok(found)
    }
}
