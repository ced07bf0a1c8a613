use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_cookies::Cookies;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::{
    database::Database,
    error::AppError,
    ledger::{self, NewProduct, QuantityBand},
    middleware::get_current_user,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    name: String,
    category_id: i32,
    quantity: i32,
    price: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    quantity: i32,
}

#[derive(Deserialize)]
pub struct ProductListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    sort: Option<String>,
    order: Option<String>,
    search: Option<String>,
    category: Option<i32>,
    #[serde(rename = "quantityFilterType")]
    quantity_filter_type: Option<String>,
}

#[derive(FromRow)]
struct ProductListRow {
    product_id: i32,
    name: String,
    category_id: i32,
    quantity: i32,
    price: Decimal,
    enterprise_id: i32,
    created_date: DateTime<Utc>,
    category_name: Option<String>,
    total_count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductResponse {
    product_id: i32,
    name: String,
    category_id: i32,
    quantity: i32,
    price: Decimal,
    enterprise_id: i32,
    created_date: DateTime<Utc>,
    category_name: Option<String>,
}

impl From<ProductListRow> for ProductResponse {
    fn from(row: ProductListRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            category_id: row.category_id,
            quantity: row.quantity,
            price: row.price,
            enterprise_id: row.enterprise_id,
            created_date: row.created_date,
            category_name: row.category_name,
        }
    }
}

/// Maps an API sort value onto a real column. Anything outside the
/// allow-list falls back to the primary key, which also closes the
/// injection hole a raw ORDER BY interpolation would open.
pub(crate) fn sort_column(sort: Option<&str>) -> &'static str {
    match sort.unwrap_or("").to_lowercase().as_str() {
        "name" => "name",
        "quantity" => "quantity",
        "price" => "price",
        "createddate" => "created_date",
        "id" | "productid" => "product_id",
        _ => "product_id",
    }
}

pub(crate) fn sort_order(order: Option<&str>) -> &'static str {
    match order.unwrap_or("").to_uppercase().as_str() {
        "DESC" => "DESC",
        _ => "ASC",
    }
}

pub async fn create_product(
    State(db): State<Database>,
    cookies: Cookies,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let price = Decimal::try_from(body.price)
        .map_err(|_| AppError::Validation("Product price must be a valid number".to_string()))?;

    let product = NewProduct {
        name: body.name,
        category_id: body.category_id,
        quantity: body.quantity,
        price,
    };

    let product_id = ledger::create_product(
        &db,
        current_user.enterprise_id,
        current_user.user_id,
        &product,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "productId": product_id,
            "message": "Product added successfully"
        })),
    ))
}

pub async fn update_quantity(
    State(db): State<Database>,
    cookies: Cookies,
    Path(product_id): Path<i32>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    ledger::update_quantity(
        &db,
        current_user.enterprise_id,
        product_id,
        current_user.user_id,
        body.quantity,
        None,
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn list_products(
    State(db): State<Database>,
    cookies: Cookies,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let safe_sort = sort_column(query.sort.as_deref());
    let safe_order = sort_order(query.order.as_deref());

    let mut sql = String::from(
        r#"
        SELECT
            p.product_id,
            p.name,
            p.category_id,
            p.quantity,
            p.price,
            p.enterprise_id,
            p.created_date,
            c.name AS category_name,
            COUNT(*) OVER() AS total_count
        FROM products p
        LEFT JOIN categories c ON p.category_id = c.category_id
        WHERE p.enterprise_id = $1
        "#,
    );
    let mut bind_count = 2;

    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
    if search.is_some() {
        sql.push_str(&format!(" AND LOWER(p.name) LIKE LOWER(${})", bind_count));
        bind_count += 1;
    }

    if query.category.is_some() {
        sql.push_str(&format!(" AND p.category_id = ${}", bind_count));
        bind_count += 1;
    }

    if let Some(band) = query
        .quantity_filter_type
        .as_deref()
        .and_then(QuantityBand::parse_filter)
    {
        sql.push_str(" AND ");
        sql.push_str(&band.sql_predicate("p.quantity"));
    }

    sql.push_str(&format!(
        " ORDER BY {} {} LIMIT ${} OFFSET ${}",
        safe_sort,
        safe_order,
        bind_count,
        bind_count + 1
    ));

    let mut sqlx_query = sqlx::query_as::<_, ProductListRow>(&sql).bind(current_user.enterprise_id);

    if let Some(search) = search {
        sqlx_query = sqlx_query.bind(format!("%{}%", search.trim()));
    }
    if let Some(category_id) = query.category {
        sqlx_query = sqlx_query.bind(category_id);
    }

    let rows = sqlx_query.bind(limit).bind(offset).fetch_all(&db).await?;

    let total = rows.first().map(|row| row.total_count).unwrap_or(0);
    let total_pages = (total + limit - 1) / limit;
    let products: Vec<ProductResponse> = rows.into_iter().map(ProductResponse::from).collect();

    Ok(Json(json!({
        "products": products,
        "total": total,
        "page": page,
        "totalPages": total_pages
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_values_outside_the_allow_list_fall_back_to_id() {
        assert_eq!(sort_column(Some("name")), "name");
        assert_eq!(sort_column(Some("createdDate")), "created_date");
        assert_eq!(sort_column(Some("id")), "product_id");
        assert_eq!(sort_column(Some("price; DROP TABLE products")), "product_id");
        assert_eq!(sort_column(None), "product_id");
    }

    #[test]
    fn order_defaults_to_ascending() {
        assert_eq!(sort_order(Some("desc")), "DESC");
        assert_eq!(sort_order(Some("DESC")), "DESC");
        assert_eq!(sort_order(Some("sideways")), "ASC");
        assert_eq!(sort_order(None), "ASC");
    }
}
