use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_cookies::Cookies;
use sqlx::FromRow;

use crate::{
    database::Database,
    error::AppError,
    middleware::get_current_user,
    utils::{hash_password, verify_password},
};

#[derive(Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    user_id: i32,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    enterprise_id: i32,
    enterprise_name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

pub async fn get_profile(
    State(db): State<Database>,
    cookies: Cookies,
) -> Result<Json<ProfileResponse>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let profile = sqlx::query_as::<_, ProfileResponse>(
        r#"
        SELECT u.user_id, u.username, u.email, u.first_name, u.last_name,
               u.enterprise_id, e.name AS enterprise_name
        FROM users u
        LEFT JOIN enterprises e ON u.enterprise_id = e.enterprise_id
        WHERE u.user_id = $1
        "#,
    )
    .bind(current_user.user_id)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}

pub async fn update_profile(
    State(db): State<Database>,
    cookies: Cookies,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let email = body.email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }

    sqlx::query("UPDATE users SET email = $1 WHERE user_id = $2")
        .bind(email)
        .bind(current_user.user_id)
        .execute(&db)
        .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn change_password(
    State(db): State<Database>,
    cookies: Cookies,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let password_hash =
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE user_id = $1")
            .bind(current_user.user_id)
            .fetch_one(&db)
            .await?;

    if !verify_password(&body.current_password, &password_hash).unwrap_or(false) {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    if body.new_password.is_empty() {
        return Err(AppError::Validation("New password is required".to_string()));
    }

    let new_hash = hash_password(&body.new_password)
        .map_err(|_| AppError::Internal("Failed to process password".to_string()))?;

    sqlx::query("UPDATE users SET password_hash = $1 WHERE user_id = $2")
        .bind(new_hash)
        .bind(current_user.user_id)
        .execute(&db)
        .await?;

    Ok(Json(json!({ "success": true })))
}
