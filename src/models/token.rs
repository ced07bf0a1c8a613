use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};

/// Single-use, time-limited credential for joining an enterprise.
/// Only the bcrypt hash of the cleartext token is stored.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct InvitationToken {
    pub token_id: i32,
    pub enterprise_id: i32,
    pub token_hash: String,
    pub created_by_user_id: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

impl InvitationToken {
    /// A token is redeemable until it is marked used or its expiry passes,
    /// whichever comes first. Expiry is detected lazily at validation time.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(is_used: bool, expires_in: Duration) -> InvitationToken {
        let now = Utc::now();
        InvitationToken {
            token_id: 1,
            enterprise_id: 1,
            token_hash: "$2b$10$hash".to_string(),
            created_by_user_id: 1,
            created_at: now,
            expires_at: now + expires_in,
            is_used,
        }
    }

    #[test]
    fn fresh_token_is_redeemable() {
        let t = token(false, Duration::hours(1));
        assert!(t.is_redeemable(Utc::now()));
    }

    #[test]
    fn used_token_is_terminal_even_before_expiry() {
        let t = token(true, Duration::hours(1));
        assert!(!t.is_redeemable(Utc::now()));
    }

    #[test]
    fn expired_token_is_terminal_even_if_unused() {
        let t = token(false, Duration::hours(1));
        assert!(!t.is_redeemable(t.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let t = token(false, Duration::hours(1));
        assert!(!t.is_redeemable(t.expires_at));
    }
}
