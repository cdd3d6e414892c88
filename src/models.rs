use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub trading_active: bool,
    pub created_at: String,
    pub created_by: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSession {
    pub name: String,
    pub description: Option<String>,
    pub created_by: i64,
}

/// What `delete_session` removed, and what it left behind.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionDeletion {
    pub session_id: i64,
    pub products_removed: usize,
    pub limits_removed: usize,
    /// Orders of the session that stay in place after the session row is gone.
    pub orphaned_orders: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub session_id: i64,
    pub name: String,
    pub price: f64,
    /// Boxes still available. Not clamped at zero.
    pub stock: i64,
    pub created_at: String,
    pub created_by: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateProduct {
    pub session_id: i64,
    pub name: String,
    pub price: f64,
    pub stock: i64,
    pub created_by: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for buyer and manager screens.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Awaiting processing",
            OrderStatus::Processing => "In progress",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_completed(self) -> bool {
        self == OrderStatus::Completed
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    /// Six-digit code shown to buyers and managers.
    pub public_code: String,
    pub session_sequence: i64,
    pub user_id: i64,
    pub session_id: i64,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    /// `None` once the product has been deleted.
    pub product_name: Option<String>,
    pub quantity: i32,
    /// Price captured when the item was added.
    pub unit_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrder {
    pub user_id: i64,
    pub session_id: i64,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    pub fn total_boxes(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }
}

/// Outcome of a bulk "mark completed" request, bucketed per order id.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct BulkCompletion {
    pub success: Vec<i64>,
    pub already_completed: Vec<i64>,
    pub failed: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductSales {
    pub product_id: i64,
    pub name: String,
    pub price: f64,
    pub remaining_stock: i64,
    /// Boxes held by any live item, whatever the order status.
    pub boxes_reserved: i64,
    /// Boxes in completed orders.
    pub boxes_sold: i64,
    pub initial_stock: i64,
    pub revenue: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionSalesStats {
    pub session_id: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    pub processing_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    pub unique_customers: i64,
    /// Sum of completed order totals.
    pub revenue: f64,
    pub boxes_sold: i64,
    pub average_check: f64,
    pub products: Vec<ProductSales>,
}

/// A (user, session) pair whose cached limit disagrees with its completed orders.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LimitDrift {
    pub user_id: i64,
    pub session_id: i64,
    pub cached: i64,
    pub actual: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_stored_names() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("paid".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
