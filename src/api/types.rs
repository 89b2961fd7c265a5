//! Shared types for the API layer.

use std::sync::Arc;

use crate::core_state::CoreState;

/// Header carrying the acting user's identifier. Authentication happens
/// upstream; this layer only records who acted.
pub const ACTING_USER_HEADER: &str = "X-Acting-User";

/// Header carrying the instructor PIN for time-travel and deletion routes.
pub const INSTRUCTOR_PIN_HEADER: &str = "X-Instructor-Pin";

/// Longest accepted acting-user identifier.
pub const MAX_ACTOR_LEN: usize = 64;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Acting user, injected into request extensions by the actor middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser(pub String);

impl ActingUser {
    /// Accepts short identifiers such as `nurse.kim` or `rn-204`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_ACTOR_LEN {
            return None;
        }
        let valid = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@'));
        valid.then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
