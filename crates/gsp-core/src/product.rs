//! Order line items.

use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, OrderProductId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Pending,
    Added,
    Failed,
    NotFound,
}

impl ProductStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Pending => "pending",
            ProductStatus::Added => "added",
            ProductStatus::Failed => "failed",
            ProductStatus::NotFound => "not_found",
        }
    }
}

/// One product line within an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProduct {
    pub id: OrderProductId,
    pub order_id: OrderId,
    pub product_code: String,
    pub quantity: i32,
    pub status: ProductStatus,
    pub error_message: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
}

impl OrderProduct {
    /// Validate the quantity invariant (`>= 1`) before constructing a new
    /// product row.
    pub fn validate_quantity(quantity: i32) -> crate::error::Result<()> {
        if quantity < 1 {
            return Err(crate::error::CoreError::InvalidQuantity(quantity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        assert!(OrderProduct::validate_quantity(1).is_ok());
        assert!(OrderProduct::validate_quantity(0).is_err());
        assert!(OrderProduct::validate_quantity(-5).is_err());
    }
}
