use axum::{
    extract::State,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::{Cookie, Cookies};
use chrono::Utc;
use sqlx::{Postgres, Transaction};

use crate::{
    database::Database,
    error::AppError,
    middleware::get_current_user,
    models::{InvitationToken, User},
    utils::{create_token, hash_password, verify_password},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    username: String,
    password: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    // Exactly one enrollment path: a new enterprise by name, a token join,
    // or the legacy join-by-id.
    enterprise_name: Option<String>,
    enterprise_id: Option<i32>,
    invitation_token: Option<String>,
    join_existing: Option<bool>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

pub async fn register(
    State(db): State<Database>,
    cookies: Cookies,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    if body.username.trim().is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if body.email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if body.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    let password_hash = hash_password(&body.password)
        .map_err(|_| AppError::Internal("Failed to process password".to_string()))?;

    let mut tx = db.begin().await?;

    let (enterprise_id, is_admin) = if let Some(token) = body
        .invitation_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        let enterprise_id = body.enterprise_id.ok_or_else(|| {
            AppError::Validation("Enterprise id is required to join by invitation".to_string())
        })?;
        redeem_invitation_token(&mut tx, enterprise_id, token.trim()).await?;
        (enterprise_id, false)
    } else if body.join_existing.unwrap_or(false) {
        let enterprise_id = body.enterprise_id.ok_or_else(|| {
            AppError::Validation("A valid enterprise id is required to join".to_string())
        })?;
        (enterprise_id, false)
    } else {
        let name = body
            .enterprise_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                AppError::Validation(
                    "Enterprise name is required when creating a new enterprise".to_string(),
                )
            })?;
        let enterprise_id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO enterprises (name) VALUES ($1) RETURNING enterprise_id",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        // The founding user administers the new enterprise.
        (enterprise_id, true)
    };

    let user_id = insert_user(&mut tx, &body, &password_hash, enterprise_id, is_admin).await?;

    tx.commit().await?;

    log::info!(
        "registered user {} ({}) in enterprise {} (admin: {})",
        user_id,
        body.username,
        enterprise_id,
        is_admin
    );

    set_session_cookie(&cookies, user_id, body.username.clone())?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "userId": user_id,
            "username": body.username,
            "enterpriseId": enterprise_id,
            "isAdmin": is_admin
        }
    })))
}

pub async fn login(
    State(db): State<Database>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let user = authenticate_user(&db, &body.username, &body.password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    set_session_cookie(&cookies, user.user_id, user.username.clone())?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "userId": user.user_id,
            "username": user.username,
            "enterpriseId": user.enterprise_id,
            "isAdmin": user.is_admin
        }
    })))
}

pub async fn logout(cookies: Cookies) -> Json<Value> {
    cookies.remove(Cookie::from("auth_token"));
    Json(json!({ "success": true }))
}

pub async fn check_auth(State(db): State<Database>, cookies: Cookies) -> Json<Value> {
    match get_current_user(&cookies, &db).await {
        Some(user) => Json(json!({
            "authenticated": true,
            "userId": user.user_id,
            "username": user.username,
            "email": user.email,
            "firstName": user.first_name,
            "enterpriseId": user.enterprise_id,
            "isAdmin": user.is_admin
        })),
        None => Json(json!({ "authenticated": false })),
    }
}

async fn authenticate_user(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(db)
        .await?;

    match user {
        Some(user) if verify_password(password, &user.password_hash).unwrap_or(false) => {
            Ok(Some(user))
        }
        _ => Ok(None),
    }
}

async fn insert_user(
    tx: &mut Transaction<'_, Postgres>,
    body: &RegisterRequest,
    password_hash: &str,
    enterprise_id: i32,
    is_admin: bool,
) -> Result<i32, AppError> {
    let user_id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO users (username, password_hash, email, first_name, last_name, enterprise_id, is_admin)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING user_id
        "#,
    )
    .bind(body.username.trim())
    .bind(password_hash)
    .bind(body.email.trim())
    .bind(body.first_name.as_deref())
    .bind(body.last_name.as_deref())
    .bind(enterprise_id)
    .bind(is_admin)
    .fetch_one(&mut **tx)
    .await?;

    Ok(user_id)
}

/// Finds the matching unused token for the enterprise and marks it used.
/// The guarded UPDATE makes redemption single-use: when two registrations
/// race on the same token, only one sees a row change; the other fails.
async fn redeem_invitation_token(
    tx: &mut Transaction<'_, Postgres>,
    enterprise_id: i32,
    presented: &str,
) -> Result<(), AppError> {
    let candidates = sqlx::query_as::<_, InvitationToken>(
        "SELECT * FROM invitation_tokens WHERE enterprise_id = $1 AND is_used = false",
    )
    .bind(enterprise_id)
    .fetch_all(&mut **tx)
    .await?;

    let now = Utc::now();
    let matched = candidates
        .iter()
        .filter(|token| token.is_redeemable(now))
        .find(|token| verify_password(presented, &token.token_hash).unwrap_or(false));

    let Some(token) = matched else {
        return Err(AppError::Validation(
            "Invalid or expired invitation token".to_string(),
        ));
    };

    let result = sqlx::query(
        "UPDATE invitation_tokens SET is_used = true WHERE token_id = $1 AND is_used = false",
    )
    .bind(token.token_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        // A concurrent registration redeemed it first.
        return Err(AppError::Validation(
            "Invalid or expired invitation token".to_string(),
        ));
    }

    Ok(())
}

fn set_session_cookie(cookies: &Cookies, user_id: i32, username: String) -> Result<(), AppError> {
    let token = create_token(user_id, username)
        .map_err(|_| AppError::Internal("Failed to create session".to_string()))?;

    let cookie = Cookie::build(("auth_token", token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(24))
        .build();

    cookies.add(cookie);
    Ok(())
}
