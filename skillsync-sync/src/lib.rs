//! # skillsync-sync
//!
//! Skill reconciliation between the members service and the profile store.
//!
//! Build a [`SkillSync`] (from [`Collaborators`] or straight from a
//! [`skillsync_core::Config`]) and hand it one [`skillsync_core::SyncEvent`]
//! per user.

pub mod auth;
pub mod error;
pub mod http;
pub mod members;
pub mod pipeline;
pub mod resolver;
pub mod skills;
pub mod store;
pub mod throttle;
pub mod upsert;

pub use auth::{BearerToken, ClientCredentialsProvider, StaticToken, TokenProvider};
pub use error::{ErrorClass, SyncError};
pub use members::{HttpMembersService, MemberSkill, MemberSkillMap, MembersService};
pub use pipeline::{Collaborators, SkillOutcome, SkillSync, SyncReport};
pub use store::{HttpProfileStore, ProfileStore};
pub use throttle::WriteThrottle;
pub use upsert::{upsert_skill, UpsertOutcome};
