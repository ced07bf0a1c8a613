use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Application error taxonomy. Every handler funnels failures through this
/// type so HTTP status mapping lives in one place.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Admin privileges required")]
    Forbidden,
    #[error("{0}")]
    Internal(String),
    /// Deadlock or lock timeout. The whole transaction rolled back, so the
    /// caller may safely retry the operation.
    #[error("Transaction aborted, please retry: {0}")]
    Transaction(sqlx::Error),
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl AppError {
    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Unauthorized".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Transaction(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// Postgres error codes surfaced by the ledger store.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return AppError::NotFound("Record not found".to_string());
        }

        let details = match &err {
            sqlx::Error::Database(db_err) => Some((
                db_err.code().map(|code| code.to_string()),
                db_err.constraint().map(str::to_string),
            )),
            _ => None,
        };

        match details {
            Some((Some(code), constraint)) => match code.as_str() {
                UNIQUE_VIOLATION => {
                    let constraint = constraint.unwrap_or_default();
                    let message = if constraint.contains("username") {
                        "A user with this username already exists"
                    } else if constraint.contains("email") {
                        "A user with this email already exists"
                    } else {
                        "Record already exists"
                    };
                    AppError::Conflict(message.to_string())
                }
                FOREIGN_KEY_VIOLATION => {
                    AppError::Conflict("Referenced record does not exist".to_string())
                }
                DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE => AppError::Transaction(err),
                _ => AppError::Database(err),
            },
            _ => AppError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_taxonomy() {
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::unauthorized().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Database(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
