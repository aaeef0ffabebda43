//! Records owned by the catalog store.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthorId, CustomerId, ItemId, Money, OrderId, Result, StoreError};

/// An author of catalog items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
}

/// Mutable fields of an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDraft {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
}

impl AuthorDraft {
    pub fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(StoreError::Invalid(
                "author first_name and last_name are required".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn into_author(self, id: AuthorId) -> Author {
        Author {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
        }
    }
}

/// A customer who can place orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

/// Mutable fields of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl CustomerDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Invalid("customer name is required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(StoreError::Invalid(format!(
                "customer email '{}' is not valid",
                self.email
            )));
        }
        Ok(())
    }

    pub(crate) fn into_customer(self, id: CustomerId) -> Customer {
        Customer {
            id,
            name: self.name,
            email: self.email,
            street: self.street,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
        }
    }
}

/// A tag record. Tags are shared between items and never duplicated by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A catalog item as stored, with its author and tags resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub author: Author,
    pub tags: BTreeSet<String>,
    pub published_at: Option<NaiveDate>,
    #[serde(rename = "price_cents")]
    pub price: Money,
    pub quantity: u32,
}

/// Mutable fields of an item; used for both create and full-replace update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    pub author_id: AuthorId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<NaiveDate>,
    #[serde(rename = "price_cents")]
    pub price: Money,
    pub quantity: u32,
}

impl ItemDraft {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(StoreError::Invalid("item title is required".to_string()));
        }
        if self.price.is_negative() {
            return Err(StoreError::Invalid(format!(
                "item price {} must not be negative",
                self.price
            )));
        }
        Ok(())
    }

    /// Tag names trimmed, with blanks and duplicates removed.
    pub fn tag_names(&self) -> BTreeSet<String> {
        self.tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Outcome of [`crate::CatalogStore::decrement_or_delete_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StockChange {
    /// Quantity was above one and has been decremented.
    Decremented { remaining: u32 },
    /// Quantity was one or less; the item and its tag links are gone.
    Removed,
}

/// The status of an order in its lifecycle.
///
/// ```text
/// Pending ──► Processing ──► Shipped ──► Completed
///    │            │             │
///    └────────────┴─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns true if an order in this status may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::Pending, OrderStatus::Processing)
            | (OrderStatus::Processing, OrderStatus::Shipped)
            | (OrderStatus::Shipped, OrderStatus::Completed) => true,
            (current, OrderStatus::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(StoreError::Invalid(format!("unknown order status '{other}'"))),
        }
    }
}

/// One line of a committed order.
///
/// Title and unit price are captured at purchase time so the order stays
/// readable after the item is changed or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub title: String,
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    /// Returns `unit_price * quantity`, or `None` if it overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// Sums the line totals of an order.
///
/// Fails with `Invalid` when any product or partial sum overflows, so an
/// order can never be accepted against a wrapped total.
pub fn order_total(lines: &[OrderLine]) -> Result<Money> {
    lines
        .iter()
        .try_fold(Money::zero(), |acc, line| {
            line.line_total().and_then(|total| acc.checked_add(total))
        })
        .ok_or_else(|| StoreError::Invalid("order total overflows".to_string()))
}

/// A committed order with its customer and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer: Customer,
    pub status: OrderStatus,
    #[serde(rename = "total_cents")]
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

/// A requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Everything [`crate::CatalogStore::insert_order`] needs to commit an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub declared_total: Money,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    pub fn new(customer_id: CustomerId, declared_total: Money, lines: Vec<NewOrderLine>) -> Self {
        Self {
            customer_id,
            declared_total,
            created_at: Utc::now(),
            lines,
        }
    }

    /// Overrides the creation timestamp.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ItemDraft {
        ItemDraft {
            title: "Dune".to_string(),
            author_id: AuthorId::new(1),
            tags: vec![],
            published_at: None,
            price: Money::from_cents(1000),
            quantity: 3,
        }
    }

    #[test]
    fn tag_names_trim_and_dedupe() {
        let mut d = draft();
        d.tags = vec![
            " sci-fi".to_string(),
            "classic".to_string(),
            "sci-fi ".to_string(),
            "  ".to_string(),
        ];
        let names: Vec<_> = d.tag_names().into_iter().collect();
        assert_eq!(names, vec!["classic".to_string(), "sci-fi".to_string()]);
    }

    #[test]
    fn draft_rejects_blank_title_and_negative_price() {
        let mut d = draft();
        d.title = "  ".to_string();
        assert!(matches!(d.validate(), Err(StoreError::Invalid(_))));

        let mut d = draft();
        d.price = Money::from_cents(-1);
        assert!(matches!(d.validate(), Err(StoreError::Invalid(_))));

        assert!(draft().validate().is_ok());
    }

    #[test]
    fn customer_draft_requires_email() {
        let d = CustomerDraft {
            name: "Ada".to_string(),
            email: "ada.example.com".to_string(),
            street: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: String::new(),
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn status_transitions() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("Pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_line_total() {
        let line = OrderLine {
            item_id: ItemId::new(1),
            title: "Dune".to_string(),
            unit_price: Money::from_cents(1250),
            quantity: 4,
        };
        assert_eq!(line.line_total(), Some(Money::from_cents(5000)));
    }

    #[test]
    fn order_total_rejects_overflow() {
        let line = |price: i64, quantity: u32| OrderLine {
            item_id: ItemId::new(1),
            title: "Dune".to_string(),
            unit_price: Money::from_cents(price),
            quantity,
        };

        assert_eq!(
            order_total(&[line(1250, 4), line(100, 1)]).unwrap(),
            Money::from_cents(5100)
        );
        assert!(matches!(
            order_total(&[line((1 << 62) + 1, 4)]),
            Err(StoreError::Invalid(msg)) if msg == "order total overflows"
        ));
        assert!(matches!(
            order_total(&[line(i64::MAX, 1), line(1, 1)]),
            Err(StoreError::Invalid(_))
        ));
    }
}
