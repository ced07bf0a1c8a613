use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_cookies::Cookies;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::{
    database::Database,
    error::AppError,
    ledger::{self, QuantityBand},
    middleware::get_current_user,
    models::LogAction,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilters {
    start_date: Option<String>,
    end_date: Option<String>,
    category_id: Option<i32>,
    user_id: Option<i32>,
    /// Comma-separated action names, e.g. "PRODUCT_ADDED,ADJUSTMENT_IN".
    action_types: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFilters {
    search: Option<String>,
    category_id: Option<i32>,
    quantity_filter_type: Option<String>,
    sort: Option<String>,
    order: Option<String>,
}

#[derive(FromRow)]
struct MovementRow {
    log_date: DateTime<Utc>,
    product_id: i32,
    product_name: String,
    category_name: Option<String>,
    action: String,
    report_user_id: Option<i32>,
    user_first_name: Option<String>,
    user_last_name: Option<String>,
    old_value: String,
    new_value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MovementEntry {
    log_date: DateTime<Utc>,
    product_id: i32,
    product_name: String,
    category_name: Option<String>,
    action: String,
    report_user_id: Option<i32>,
    user_first_name: Option<String>,
    user_last_name: Option<String>,
    old_quantity: String,
    new_quantity: String,
    quantity_change: i64,
}

impl From<MovementRow> for MovementEntry {
    fn from(row: MovementRow) -> Self {
        let quantity_change = ledger::quantity_change(&row.old_value, &row.new_value);
        Self {
            log_date: row.log_date,
            product_id: row.product_id,
            product_name: row.product_name,
            category_name: row.category_name,
            action: row.action,
            report_user_id: row.report_user_id,
            user_first_name: row.user_first_name,
            user_last_name: row.user_last_name,
            old_quantity: row.old_value,
            new_quantity: row.new_value,
            quantity_change,
        }
    }
}

#[derive(FromRow)]
struct InventoryRow {
    product_id: i32,
    product_name: String,
    category_name: Option<String>,
    quantity: i32,
    price: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InventoryEntry {
    product_id: i32,
    product_name: String,
    category_name: Option<String>,
    quantity: i32,
    price: Decimal,
    total_value: Decimal,
}

impl From<InventoryRow> for InventoryEntry {
    fn from(row: InventoryRow) -> Self {
        let total_value = Decimal::from(row.quantity) * row.price;
        Self {
            product_id: row.product_id,
            product_name: row.product_name,
            category_name: row.category_name,
            quantity: row.quantity,
            price: row.price,
            total_value,
        }
    }
}

/// Splits the comma-separated filter into known actions, dropping anything
/// outside the allow-list. `None` means no action filtering at all.
fn parse_action_types(raw: Option<&str>) -> Option<Vec<String>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let actions: Vec<String> = raw
        .split(',')
        .filter_map(|part| LogAction::parse(part.trim()))
        .map(|action| action.as_str().to_string())
        .collect();
    if actions.is_empty() {
        None
    } else {
        Some(actions)
    }
}

/// Sort mapping for the inventory report. The select list here aliases both
/// name columns (`product_name`, `category_name`), so a bare `name` from the
/// shared allow-list would be ambiguous between products and categories;
/// every entry must stay table-qualified.
fn inventory_sort_column(sort: Option<&str>) -> &'static str {
    match sort.unwrap_or("").to_lowercase().as_str() {
        "name" => "p.name",
        "quantity" => "p.quantity",
        "price" => "p.price",
        "createddate" => "p.created_date",
        "id" | "productid" => "p.product_id",
        _ => "p.product_id",
    }
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Invalid date: {}", s))),
    }
}

/// Historical movement, newest first; exact-timestamp ties are broken by
/// log_id so the most recently inserted row wins.
pub async fn product_movement(
    State(db): State<Database>,
    cookies: Cookies,
    Query(filters): Query<MovementFilters>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let start_date = parse_date(filters.start_date.as_deref())?;
    let end_date = parse_date(filters.end_date.as_deref())?;
    let action_types = parse_action_types(filters.action_types.as_deref());

    let mut sql = String::from(
        r#"
        SELECT
            l.log_date,
            l.product_id,
            p.name AS product_name,
            c.name AS category_name,
            l.action,
            l.user_id AS report_user_id,
            u.first_name AS user_first_name,
            u.last_name AS user_last_name,
            l.old_value,
            l.new_value
        FROM product_logs l
        JOIN products p ON l.product_id = p.product_id
        LEFT JOIN categories c ON p.category_id = c.category_id
        LEFT JOIN users u ON l.user_id = u.user_id
        WHERE p.enterprise_id = $1
        "#,
    );
    let mut bind_count = 2;

    if start_date.is_some() {
        sql.push_str(&format!(" AND DATE(l.log_date) >= ${}", bind_count));
        bind_count += 1;
    }
    if end_date.is_some() {
        sql.push_str(&format!(" AND DATE(l.log_date) <= ${}", bind_count));
        bind_count += 1;
    }
    if filters.category_id.is_some() {
        sql.push_str(&format!(" AND p.category_id = ${}", bind_count));
        bind_count += 1;
    }
    if filters.user_id.is_some() {
        sql.push_str(&format!(" AND l.user_id = ${}", bind_count));
        bind_count += 1;
    }
    if action_types.is_some() {
        sql.push_str(&format!(" AND l.action = ANY(${})", bind_count));
    }

    sql.push_str(" ORDER BY l.log_date DESC, l.log_id DESC");

    let mut sqlx_query = sqlx::query_as::<_, MovementRow>(&sql).bind(current_user.enterprise_id);

    if let Some(date) = start_date {
        sqlx_query = sqlx_query.bind(date);
    }
    if let Some(date) = end_date {
        sqlx_query = sqlx_query.bind(date);
    }
    if let Some(category_id) = filters.category_id {
        sqlx_query = sqlx_query.bind(category_id);
    }
    if let Some(user_id) = filters.user_id {
        sqlx_query = sqlx_query.bind(user_id);
    }
    if let Some(actions) = action_types {
        sqlx_query = sqlx_query.bind(actions);
    }

    let rows = sqlx_query.fetch_all(&db).await?;
    let data: Vec<MovementEntry> = rows.into_iter().map(MovementEntry::from).collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

/// Point-in-time inventory snapshot with per-row total value.
pub async fn inventory_on_hand(
    State(db): State<Database>,
    cookies: Cookies,
    Query(filters): Query<InventoryFilters>,
) -> Result<Json<Value>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let safe_sort = inventory_sort_column(filters.sort.as_deref());
    let safe_order = super::products::sort_order(filters.order.as_deref());

    let mut sql = String::from(
        r#"
        SELECT
            p.product_id,
            p.name AS product_name,
            c.name AS category_name,
            p.quantity,
            p.price
        FROM products p
        LEFT JOIN categories c ON p.category_id = c.category_id
        WHERE p.enterprise_id = $1
        "#,
    );
    let mut bind_count = 2;

    let search = filters.search.as_deref().filter(|s| !s.trim().is_empty());
    if search.is_some() {
        sql.push_str(&format!(" AND LOWER(p.name) LIKE LOWER(${})", bind_count));
        bind_count += 1;
    }
    if filters.category_id.is_some() {
        sql.push_str(&format!(" AND p.category_id = ${}", bind_count));
    }
    if let Some(band) = filters
        .quantity_filter_type
        .as_deref()
        .and_then(QuantityBand::parse_filter)
    {
        sql.push_str(" AND ");
        sql.push_str(&band.sql_predicate("p.quantity"));
    }

    sql.push_str(&format!(" ORDER BY {} {}", safe_sort, safe_order));

    let mut sqlx_query = sqlx::query_as::<_, InventoryRow>(&sql).bind(current_user.enterprise_id);

    if let Some(search) = search {
        sqlx_query = sqlx_query.bind(format!("%{}%", search.trim()));
    }
    if let Some(category_id) = filters.category_id {
        sqlx_query = sqlx_query.bind(category_id);
    }

    let rows = sqlx_query.fetch_all(&db).await?;
    let data: Vec<InventoryEntry> = rows.into_iter().map(InventoryEntry::from).collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_filter_keeps_only_known_actions() {
        assert_eq!(
            parse_action_types(Some("PRODUCT_ADDED,ADJUSTMENT_IN")),
            Some(vec![
                "PRODUCT_ADDED".to_string(),
                "ADJUSTMENT_IN".to_string()
            ])
        );
        assert_eq!(
            parse_action_types(Some("ADJUSTMENT_OUT,SALE,WRITE_OFF")),
            Some(vec!["ADJUSTMENT_OUT".to_string()])
        );
        assert_eq!(parse_action_types(Some("SALE")), None);
        assert_eq!(parse_action_types(Some("")), None);
        assert_eq!(parse_action_types(None), None);
    }

    #[test]
    fn inventory_sort_columns_are_table_qualified() {
        // The join aliases away the bare `name` output column, so every
        // allow-listed value must resolve to a qualified products column.
        assert_eq!(inventory_sort_column(Some("name")), "p.name");
        assert_eq!(inventory_sort_column(Some("quantity")), "p.quantity");
        assert_eq!(inventory_sort_column(Some("price")), "p.price");
        assert_eq!(inventory_sort_column(Some("createdDate")), "p.created_date");
        assert_eq!(inventory_sort_column(Some("id")), "p.product_id");
        assert_eq!(inventory_sort_column(Some("category_name")), "p.product_id");
        assert_eq!(inventory_sort_column(None), "p.product_id");
        for sort in ["name", "quantity", "price", "createdDate", "id", "bogus"] {
            assert!(inventory_sort_column(Some(sort)).starts_with("p."));
        }
    }

    #[test]
    fn dates_parse_or_reject_cleanly() {
        assert_eq!(
            parse_date(Some("2026-08-24")).unwrap(),
            Some(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap())
        );
        assert_eq!(parse_date(Some("  ")).unwrap(), None);
        assert_eq!(parse_date(None).unwrap(), None);
        assert!(parse_date(Some("24/08/2026")).is_err());
    }

    #[test]
    fn movement_entry_carries_the_signed_delta() {
        let row = MovementRow {
            log_date: Utc::now(),
            product_id: 1,
            product_name: "Hammer".to_string(),
            category_name: Some("Tools".to_string()),
            action: "ADJUSTMENT_OUT".to_string(),
            report_user_id: Some(7),
            user_first_name: None,
            user_last_name: None,
            old_value: "20".to_string(),
            new_value: "3".to_string(),
        };
        let entry = MovementEntry::from(row);
        assert_eq!(entry.quantity_change, -17);
        assert_eq!(entry.old_quantity, "20");
        assert_eq!(entry.new_quantity, "3");
    }

    #[test]
    fn inventory_entry_totals_quantity_times_price() {
        let row = InventoryRow {
            product_id: 1,
            product_name: "Hammer".to_string(),
            category_name: None,
            quantity: 20,
            price: Decimal::new(999, 2), // 9.99
        };
        let entry = InventoryEntry::from(row);
        assert_eq!(entry.total_value, Decimal::new(19980, 2)); // 199.80
    }
}
