use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    middleware::get_current_user,
    models::Category,
};

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    name: String,
}

pub async fn list_categories(
    State(db): State<Database>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE enterprise_id = $1 ORDER BY name",
    )
    .bind(current_user.enterprise_id)
    .fetch_all(&db)
    .await?;

    let data: Vec<Value> = categories
        .into_iter()
        .map(|category| json!({ "categoryId": category.category_id, "name": category.name }))
        .collect();

    Ok(Json(json!(data)))
}

pub async fn create_category(
    State(db): State<Database>,
    cookies: Cookies,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Category name is required".to_string()));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (enterprise_id, name)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(current_user.enterprise_id)
    .bind(name)
    .fetch_one(&db)
    .await?;

    Ok(Json(json!({
        "success": true,
        "categoryId": category.category_id,
        "name": category.name
    })))
}
