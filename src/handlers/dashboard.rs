use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    ledger::QuantityBand,
    middleware::get_current_user,
};

/// Dashboard counters. A failing sub-query degrades that counter to zero
/// instead of failing the whole response; partial data beats none here.
pub async fn dashboard_stats(
    State(db): State<Database>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;
    let enterprise_id = current_user.enterprise_id;

    let total_products = count_products(&db, enterprise_id, None).await;
    let in_stock = count_products(&db, enterprise_id, Some(QuantityBand::InStock)).await;
    let low_stock = count_products(&db, enterprise_id, Some(QuantityBand::LowStock)).await;
    let out_of_stock = count_products(&db, enterprise_id, Some(QuantityBand::OutOfStock)).await;

    let total_categories = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(DISTINCT category_id) FROM products WHERE enterprise_id = $1",
    )
    .bind(enterprise_id)
    .fetch_one(&db)
    .await
    .unwrap_or_else(|err| {
        log::warn!("dashboard stat totalCategories failed: {}", err);
        0
    });

    Ok(Json(json!({
        "totalProducts": total_products,
        "inStock": in_stock,
        "lowStock": low_stock,
        "outOfStock": out_of_stock,
        "totalCategories": total_categories
    })))
}

async fn count_products(db: &Database, enterprise_id: i32, band: Option<QuantityBand>) -> i64 {
    let mut sql = String::from("SELECT COUNT(*) FROM products WHERE enterprise_id = $1");
    if let Some(band) = band {
        sql.push_str(" AND ");
        sql.push_str(&band.sql_predicate("quantity"));
    }

    sqlx::query_scalar::<_, i64>(&sql)
        .bind(enterprise_id)
        .fetch_one(db)
        .await
        .unwrap_or_else(|err| {
            log::warn!("dashboard stat failed ({:?}): {}", band, err);
            0
        })
}
