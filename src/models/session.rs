use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const REFRESH_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub session_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

crate::impl_entity!(Session {
    #[identity] session_id,
    user_id,
    created_at,
    expires_at,
    revoked_at,
});

/// Where a stored session stands at a given instant.
///
/// `ExpiringSoon` is a classification only; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    ExpiringSoon,
    Expired,
    Revoked,
}

impl Session {
    pub fn by_id(session_id: i64) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.is_revoked() {
            return SessionStatus::Revoked;
        }
        let remaining = self.expires_at - now;
        if remaining < Duration::zero() {
            SessionStatus::Expired
        } else if remaining < Duration::minutes(REFRESH_WINDOW_MINUTES) {
            SessionStatus::ExpiringSoon
        } else {
            SessionStatus::Active
        }
    }
}
