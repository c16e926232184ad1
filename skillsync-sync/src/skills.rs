//! Upstream skill fetch: flatten the members service skill map into
//! [`SkillDetail`]s.

use skillsync_core::SkillDetail;

use crate::auth::BearerToken;
use crate::error::SyncError;
use crate::members::{MemberSkillMap, MembersService};

/// Current skills of `handle`. An unknown member has no skills.
pub async fn fetch_skills(
    members: &dyn MembersService,
    handle: &str,
    token: &BearerToken,
) -> Result<Vec<SkillDetail>, SyncError> {
    match members.member_skills(handle, token).await? {
        Some(map) => {
            let skills = flatten(map);
            tracing::debug!(handle, count = skills.len(), "fetched member skills");
            Ok(skills)
        }
        None => {
            tracing::debug!(handle, "member not found upstream, no skills to sync");
            Ok(Vec::new())
        }
    }
}

fn flatten(map: MemberSkillMap) -> Vec<SkillDetail> {
    map.into_values()
        .map(|skill| SkillDetail {
            name: skill.tag_name,
            score: skill.score,
        })
        .collect()
}
