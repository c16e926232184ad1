//! skillsync core library: domain types, inbound event validation,
//! configuration, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and downstream/upstream records
//! - [`event`]: [`SyncEvent`] parsing and validation
//! - [`config`]: layered YAML + environment configuration
//! - [`error`]: [`ConfigError`], [`EventError`]

pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, EventError};
pub use event::{SyncEvent, SyncPayload};
pub use types::{
    metric_value, SkillAssignment, SkillCatalogEntry, SkillDetail, SkillId, SkillProvider,
    SkillProviderId, User, UserId,
};
