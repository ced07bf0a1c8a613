//! Transactional core: the only path by which a product's quantity changes.
//! Every committed change is bracketed by exactly one append-only log row,
//! written in the same transaction as the quantity itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    database::Database,
    error::AppError,
    models::LogAction,
};

/// Upper bound of the low-stock band; above it a product counts as in stock.
pub const LOW_STOCK_MAX: i32 = 10;

// Stamped with clock_timestamp(), not NOW(): log_date must follow lock
// acquisition order so it stays non-decreasing with log_id, and NOW() is
// pinned at transaction start — before a blocked writer got the row lock.
const INSERT_ADJUSTMENT_LOG_SQL: &str = r#"
    INSERT INTO product_logs (product_id, user_id, action, old_value, new_value, log_date)
    VALUES ($1, $2, $3, $4, $5, clock_timestamp())
"#;

/// Three-way on-hand partition used by the product list, the inventory
/// report and the dashboard counters. All call sites share these boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityBand {
    OutOfStock,
    LowStock,
    InStock,
}

impl QuantityBand {
    pub fn of(quantity: i32) -> Self {
        if quantity == 0 {
            QuantityBand::OutOfStock
        } else if quantity <= LOW_STOCK_MAX {
            QuantityBand::LowStock
        } else {
            QuantityBand::InStock
        }
    }

    /// Filter value as sent by the API (`quantityFilterType`).
    pub fn parse_filter(s: &str) -> Option<Self> {
        match s {
            "outOfStock" => Some(QuantityBand::OutOfStock),
            "lowStock" => Some(QuantityBand::LowStock),
            "inStock" => Some(QuantityBand::InStock),
            _ => None,
        }
    }

    /// SQL predicate over a `quantity` column, shared by every query that
    /// filters or counts by band.
    pub fn sql_predicate(&self, column: &str) -> String {
        match self {
            QuantityBand::OutOfStock => format!("{column} = 0"),
            QuantityBand::LowStock => {
                format!("{column} <= {LOW_STOCK_MAX} AND {column} > 0")
            }
            QuantityBand::InStock => format!("{column} > {LOW_STOCK_MAX}"),
        }
    }
}

/// Derive the audit action from the sign of the delta. Deriving rather than
/// trusting caller intent keeps the trail self-consistent even when calling
/// code mislabels the operation. Equal values yield no action at all.
pub fn infer_action(old_quantity: i32, new_quantity: i32) -> Option<LogAction> {
    if new_quantity > old_quantity {
        Some(LogAction::AdjustmentIn)
    } else if new_quantity < old_quantity {
        Some(LogAction::AdjustmentOut)
    } else {
        None
    }
}

/// Resolves the action to log for a quantity write. A caller-forced action
/// wins over inference, but equal values are never logged, forced or not.
pub fn resolve_action(
    old_quantity: i32,
    new_quantity: i32,
    forced: Option<LogAction>,
) -> Option<LogAction> {
    if old_quantity == new_quantity {
        return None;
    }
    forced.or_else(|| infer_action(old_quantity, new_quantity))
}

/// Signed quantity delta recovered from the string-encoded log values.
pub fn quantity_change(old_value: &str, new_value: &str) -> i64 {
    let old: i64 = old_value.parse().unwrap_or(0);
    let new: i64 = new_value.parse().unwrap_or(0);
    new - old
}

#[derive(Debug)]
pub struct NewProduct {
    pub name: String,
    pub category_id: i32,
    pub quantity: i32,
    pub price: Decimal,
}

/// Inserts the product row and its PRODUCT_ADDED log entry in one
/// transaction. The log date is pinned to the product's creation timestamp
/// so report ordering aligns with product creation.
pub async fn create_product(
    db: &Database,
    enterprise_id: i32,
    user_id: i32,
    product: &NewProduct,
) -> Result<i32, AppError> {
    if product.name.trim().is_empty() {
        return Err(AppError::Validation("Product name is required".to_string()));
    }
    if product.quantity < 0 {
        return Err(AppError::Validation(
            "Product quantity must be >= 0".to_string(),
        ));
    }
    if product.price < Decimal::ZERO {
        return Err(AppError::Validation("Product price must be >= 0".to_string()));
    }

    let mut tx = db.begin().await?;

    let (product_id, created_date) = sqlx::query_as::<_, (i32, DateTime<Utc>)>(
        r#"
        INSERT INTO products (name, category_id, quantity, price, enterprise_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING product_id, created_date
        "#,
    )
    .bind(product.name.trim())
    .bind(product.category_id)
    .bind(product.quantity)
    .bind(product.price)
    .bind(enterprise_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO product_logs (product_id, user_id, action, old_value, new_value, log_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(product_id)
    .bind(user_id)
    .bind(LogAction::ProductAdded.as_str())
    .bind("0")
    .bind(product.quantity.to_string())
    .bind(created_date)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    log::info!(
        "product {} created in enterprise {} with quantity {}",
        product_id,
        enterprise_id,
        product.quantity
    );
    Ok(product_id)
}

/// Sets a product's quantity and appends the matching log row atomically.
///
/// The row is locked with SELECT ... FOR UPDATE before the read, so two
/// concurrent adjustments to the same product serialize: the second waits
/// for the first's commit, then observes the post-commit value. A no-op
/// write (new == old) updates nothing and logs nothing, even when the
/// caller forces an explicit action.
pub async fn update_quantity(
    db: &Database,
    enterprise_id: i32,
    product_id: i32,
    user_id: i32,
    new_quantity: i32,
    forced_action: Option<LogAction>,
) -> Result<(), AppError> {
    if new_quantity < 0 {
        return Err(AppError::Validation(
            "Product quantity must be >= 0".to_string(),
        ));
    }

    let mut tx = db.begin().await?;

    let old_quantity = sqlx::query_scalar::<_, i32>(
        "SELECT quantity FROM products WHERE product_id = $1 AND enterprise_id = $2 FOR UPDATE",
    )
    .bind(product_id)
    .bind(enterprise_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;

    let Some(action) = resolve_action(old_quantity, new_quantity, forced_action) else {
        // Idempotent no-op: nothing to write, nothing to log.
        tx.commit().await?;
        return Ok(());
    };

    sqlx::query("UPDATE products SET quantity = $1 WHERE product_id = $2")
        .bind(new_quantity)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(INSERT_ADJUSTMENT_LOG_SQL)
        .bind(product_id)
        .bind(user_id)
        .bind(action.as_str())
        .bind(old_quantity.to_string())
        .bind(new_quantity.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!(
        "product {} quantity {} -> {} ({}) by user {}",
        product_id,
        old_quantity,
        new_quantity,
        action.as_str(),
        user_id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_follows_the_sign_of_the_delta() {
        assert_eq!(infer_action(3, 20), Some(LogAction::AdjustmentIn));
        assert_eq!(infer_action(20, 3), Some(LogAction::AdjustmentOut));
        assert_eq!(infer_action(0, 1), Some(LogAction::AdjustmentIn));
        assert_eq!(infer_action(1, 0), Some(LogAction::AdjustmentOut));
    }

    #[test]
    fn equal_values_produce_no_action() {
        assert_eq!(infer_action(0, 0), None);
        assert_eq!(infer_action(7, 7), None);
    }

    #[test]
    fn forced_action_overrides_inference_but_not_equality() {
        assert_eq!(
            resolve_action(5, 2, Some(LogAction::AdjustmentIn)),
            Some(LogAction::AdjustmentIn)
        );
        assert_eq!(
            resolve_action(5, 2, None),
            Some(LogAction::AdjustmentOut)
        );
        // A no-op write is suppressed even when the caller insists.
        assert_eq!(resolve_action(7, 7, Some(LogAction::AdjustmentIn)), None);
        assert_eq!(resolve_action(7, 7, Some(LogAction::ProductAdded)), None);
    }

    #[test]
    fn bands_are_exhaustive_and_disjoint() {
        for quantity in 0..=100 {
            let band = QuantityBand::of(quantity);
            match quantity {
                0 => assert_eq!(band, QuantityBand::OutOfStock),
                1..=LOW_STOCK_MAX => assert_eq!(band, QuantityBand::LowStock),
                _ => assert_eq!(band, QuantityBand::InStock),
            }
        }
    }

    #[test]
    fn band_boundaries_match_the_sql_predicates() {
        assert_eq!(QuantityBand::of(0), QuantityBand::OutOfStock);
        assert_eq!(QuantityBand::of(1), QuantityBand::LowStock);
        assert_eq!(QuantityBand::of(10), QuantityBand::LowStock);
        assert_eq!(QuantityBand::of(11), QuantityBand::InStock);
        assert_eq!(
            QuantityBand::LowStock.sql_predicate("quantity"),
            "quantity <= 10 AND quantity > 0"
        );
        assert_eq!(QuantityBand::OutOfStock.sql_predicate("quantity"), "quantity = 0");
        assert_eq!(QuantityBand::InStock.sql_predicate("p.quantity"), "p.quantity > 10");
    }

    #[test]
    fn filter_values_map_to_bands() {
        assert_eq!(
            QuantityBand::parse_filter("outOfStock"),
            Some(QuantityBand::OutOfStock)
        );
        assert_eq!(
            QuantityBand::parse_filter("lowStock"),
            Some(QuantityBand::LowStock)
        );
        assert_eq!(
            QuantityBand::parse_filter("inStock"),
            Some(QuantityBand::InStock)
        );
        assert_eq!(QuantityBand::parse_filter("all"), None);
        assert_eq!(QuantityBand::parse_filter(""), None);
    }

    #[test]
    fn adjustment_logs_stamp_insertion_time_not_transaction_start() {
        // A writer that opened its transaction first but got the row lock
        // second must not stamp an earlier date onto a later log_id.
        assert!(INSERT_ADJUSTMENT_LOG_SQL.contains("clock_timestamp()"));
        assert!(!INSERT_ADJUSTMENT_LOG_SQL.contains("NOW()"));
    }

    #[test]
    fn quantity_change_is_signed() {
        assert_eq!(quantity_change("0", "5"), 5);
        assert_eq!(quantity_change("20", "3"), -17);
        assert_eq!(quantity_change("7", "7"), 0);
    }
}
