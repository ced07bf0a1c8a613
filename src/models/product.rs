use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub category_id: i32,
    pub name: String,
    pub enterprise_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    ProductAdded,
    AdjustmentIn,
    AdjustmentOut,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::ProductAdded => "PRODUCT_ADDED",
            LogAction::AdjustmentIn => "ADJUSTMENT_IN",
            LogAction::AdjustmentOut => "ADJUSTMENT_OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRODUCT_ADDED" => Some(LogAction::ProductAdded),
            "ADJUSTMENT_IN" => Some(LogAction::AdjustmentIn),
            "ADJUSTMENT_OUT" => Some(LogAction::AdjustmentOut),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_its_wire_name() {
        for action in [
            LogAction::ProductAdded,
            LogAction::AdjustmentIn,
            LogAction::AdjustmentOut,
        ] {
            assert_eq!(LogAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn unknown_action_names_are_rejected() {
        assert_eq!(LogAction::parse("SALE"), None);
        assert_eq!(LogAction::parse(""), None);
        assert_eq!(LogAction::parse("adjustment_in"), None);
    }
}
