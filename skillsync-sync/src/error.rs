//! Error types for skillsync-sync.

use thiserror::Error;

use skillsync_core::{EventError, SkillProviderId};

/// Coarse classification used by callers to decide on redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed inbound event; reprocessing cannot succeed.
    Validation,
    /// A required downstream record does not exist.
    NotFound,
    /// Token, members service or downstream read failure, including timeouts.
    Transient,
    /// A create/update call against the profile store failed.
    DownstreamWrite,
    /// Local setup problem (bad URL, missing credentials).
    Configuration,
}

/// All errors that can arise while processing one sync event.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The inbound event failed validation.
    #[error("invalid sync event: {0}")]
    Validation(#[from] EventError),

    #[error("cannot find skill provider with name {name}")]
    SkillProviderNotFound { name: String },

    #[error("cannot find user with handle {handle}")]
    UserNotFound { handle: String },

    #[error("cannot find skill with name {name} under skill provider id {skill_provider_id}")]
    SkillNotFound {
        name: String,
        skill_provider_id: SkillProviderId,
    },

    /// Bearer token acquisition failed.
    #[error("token request for audience {audience} failed: {reason}")]
    Token { audience: String, reason: String },

    /// Any members service failure other than "no such member".
    #[error("members service request for handle {handle} failed: {reason}")]
    Upstream { handle: String, reason: String },

    /// A lookup against the profile store failed.
    #[error("get {path} failed: {reason}")]
    DownstreamRead { path: String, reason: String },

    /// A create/update against the profile store failed.
    #[error("{method} {path} failed: {reason}")]
    DownstreamWrite {
        method: &'static str,
        path: String,
        reason: String,
    },

    /// Invalid local setup detected while wiring clients.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::Validation(_) => ErrorClass::Validation,
            SyncError::SkillProviderNotFound { .. }
            | SyncError::UserNotFound { .. }
            | SyncError::SkillNotFound { .. } => ErrorClass::NotFound,
            SyncError::Token { .. }
            | SyncError::Upstream { .. }
            | SyncError::DownstreamRead { .. } => ErrorClass::Transient,
            SyncError::DownstreamWrite { .. } => ErrorClass::DownstreamWrite,
            SyncError::Config(_) => ErrorClass::Configuration,
        }
    }

    /// Whether redelivering the same event may succeed. Writes are
    /// idempotent, so retrying after a partial write is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Transient | ErrorClass::DownstreamWrite
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_name_the_missing_record() {
        let err = SyncError::SkillProviderNotFound {
            name: "Topcoder".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot find skill provider with name Topcoder"
        );

        let err = SyncError::UserNotFound {
            handle: "jdoe".into(),
        };
        assert_eq!(err.to_string(), "cannot find user with handle jdoe");

        let err = SyncError::SkillNotFound {
            name: "Java".into(),
            skill_provider_id: SkillProviderId::from("P1"),
        };
        assert_eq!(
            err.to_string(),
            "cannot find skill with name Java under skill provider id P1"
        );
    }

    #[test]
    fn classification_drives_retry_policy() {
        let write = SyncError::DownstreamWrite {
            method: "POST",
            path: "/users/U1/skills".into(),
            reason: "status 500".into(),
        };
        assert_eq!(write.class(), ErrorClass::DownstreamWrite);
        assert!(write.is_retryable());

        let upstream = SyncError::Upstream {
            handle: "jdoe".into(),
            reason: "status 503".into(),
        };
        assert!(upstream.is_retryable());

        let missing = SyncError::UserNotFound {
            handle: "jdoe".into(),
        };
        assert_eq!(missing.class(), ErrorClass::NotFound);
        assert!(!missing.is_retryable());

        let config = SyncError::Config("bad url".into());
        assert!(!config.is_retryable());
    }
}
