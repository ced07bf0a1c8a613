use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    models::User,
    utils::verify_token,
};

/// Authenticated request scope. Handlers trust the enterprise_id/is_admin
/// resolved here; every downstream query is scoped by enterprise_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub enterprise_id: i32,
    pub is_admin: bool,
}

impl CurrentUser {
    fn from_user(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            enterprise_id: user.enterprise_id,
            is_admin: user.is_admin,
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

pub async fn get_current_user(cookies: &Cookies, db: &Database) -> Option<CurrentUser> {
    // Try to get JWT token from auth_token cookie
    let token = cookies.get("auth_token")?.value().to_string();

    let claims = verify_token(&token).ok()?;
    let user_id = claims.sub.parse::<i32>().ok()?;

    // Re-read the user row so enterprise scope and admin flag are current,
    // not whatever they were when the token was issued.
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await
        .ok()??;

    Some(CurrentUser::from_user(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            user_id: 1,
            username: "op".to_string(),
            email: "op@example.com".to_string(),
            first_name: None,
            last_name: None,
            enterprise_id: 1,
            is_admin,
        }
    }

    #[test]
    fn admin_check_gates_on_the_flag() {
        assert!(current_user(true).require_admin().is_ok());
        assert!(matches!(
            current_user(false).require_admin(),
            Err(AppError::Forbidden)
        ));
    }
}
