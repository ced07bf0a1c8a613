use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    middleware::get_current_user,
    models::{User, UserResponse},
    utils::hash_password,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenRequest {
    expires_in_hours: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusRequest {
    is_admin: bool,
}

/// Mints a one-time invitation token for the caller's enterprise. The
/// cleartext value is returned once and only its hash is stored.
pub async fn generate_invitation_token(
    State(db): State<Database>,
    cookies: Cookies,
    Json(body): Json<GenerateTokenRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;
    current_user.require_admin()?;

    let hours = body.expires_in_hours.unwrap_or(24);
    if hours < 1 {
        return Err(AppError::Validation(
            "Token lifetime must be at least one hour".to_string(),
        ));
    }

    let cleartext = Uuid::new_v4().simple().to_string();
    let token_hash = hash_password(&cleartext)
        .map_err(|_| AppError::Internal("Failed to generate token".to_string()))?;
    let expires_at = Utc::now() + Duration::hours(hours);

    let token_id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO invitation_tokens (enterprise_id, token_hash, created_by_user_id, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING token_id
        "#,
    )
    .bind(current_user.enterprise_id)
    .bind(&token_hash)
    .bind(current_user.user_id)
    .bind(expires_at)
    .fetch_one(&db)
    .await?;

    log::info!(
        "admin {} generated invitation token {} for enterprise {} (expires {})",
        current_user.user_id,
        token_id,
        current_user.enterprise_id,
        expires_at
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "invitationToken": cleartext,
            "tokenId": token_id,
            "expiresAt": expires_at
        })),
    ))
}

pub async fn list_enterprise_users(
    State(db): State<Database>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;
    current_user.require_admin()?;

    let users: Vec<UserResponse> =
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE enterprise_id = $1 ORDER BY user_id")
            .bind(current_user.enterprise_id)
            .fetch_all(&db)
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect();

    Ok(Json(json!({ "success": true, "users": users })))
}

pub async fn set_admin_status(
    State(db): State<Database>,
    cookies: Cookies,
    Path(user_id): Path<i32>,
    Json(body): Json<AdminStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;
    current_user.require_admin()?;

    if user_id == current_user.user_id {
        return Err(AppError::Validation(
            "You cannot change your own admin status".to_string(),
        ));
    }

    let result =
        sqlx::query("UPDATE users SET is_admin = $1 WHERE user_id = $2 AND enterprise_id = $3")
            .bind(body.is_admin)
            .bind(user_id)
            .bind(current_user.enterprise_id)
            .execute(&db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn delete_user(
    State(db): State<Database>,
    cookies: Cookies,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;
    current_user.require_admin()?;

    if user_id == current_user.user_id {
        return Err(AppError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE user_id = $1 AND enterprise_id = $2")
        .bind(user_id)
        .bind(current_user.enterprise_id)
        .execute(&db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    log::info!(
        "admin {} deleted user {} from enterprise {}",
        current_user.user_id,
        user_id,
        current_user.enterprise_id
    );

    Ok(Json(json!({ "success": true })))
}
