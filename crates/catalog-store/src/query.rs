//! Search criteria for catalog, customer and order lookups.

use crate::{Money, OrderStatus};

/// Builder for item searches.
///
/// All provided criteria are ANDed. Text fields match case-insensitively as
/// substrings. Price bounds are inclusive; a bound of zero counts as unset,
/// so a literal zero bound cannot be expressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSearch {
    /// Substring of the item title.
    pub title: Option<String>,

    /// Substring of the author's first name.
    pub author_first_name: Option<String>,

    /// Substring of the author's last name.
    pub author_last_name: Option<String>,

    /// Minimum price (inclusive).
    pub min_price: Option<Money>,

    /// Maximum price (inclusive).
    pub max_price: Option<Money>,
}

impl ItemSearch {
    /// Creates a new empty search.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author_first_name(mut self, name: impl Into<String>) -> Self {
        self.author_first_name = Some(name.into());
        self
    }

    pub fn author_last_name(mut self, name: impl Into<String>) -> Self {
        self.author_last_name = Some(name.into());
        self
    }

    pub fn min_price(mut self, price: Money) -> Self {
        self.min_price = Some(price);
        self
    }

    pub fn max_price(mut self, price: Money) -> Self {
        self.max_price = Some(price);
        self
    }

    /// Title filter, if set to something non-blank.
    pub fn title_filter(&self) -> Option<&str> {
        text_filter(&self.title)
    }

    pub fn author_first_name_filter(&self) -> Option<&str> {
        text_filter(&self.author_first_name)
    }

    pub fn author_last_name_filter(&self) -> Option<&str> {
        text_filter(&self.author_last_name)
    }

    /// Minimum price, if set to a positive amount.
    pub fn min_price_filter(&self) -> Option<Money> {
        self.min_price.filter(Money::is_positive)
    }

    /// Maximum price, if set to a positive amount.
    pub fn max_price_filter(&self) -> Option<Money> {
        self.max_price.filter(Money::is_positive)
    }

    /// Returns true if no effective criterion is set.
    pub fn is_empty(&self) -> bool {
        self.title_filter().is_none()
            && self.author_first_name_filter().is_none()
            && self.author_last_name_filter().is_none()
            && self.min_price_filter().is_none()
            && self.max_price_filter().is_none()
    }

    /// Applies every effective criterion to one candidate.
    pub fn matches(
        &self,
        title: &str,
        author_first_name: &str,
        author_last_name: &str,
        price: Money,
    ) -> bool {
        contains_ci(title, self.title_filter())
            && contains_ci(author_first_name, self.author_first_name_filter())
            && contains_ci(author_last_name, self.author_last_name_filter())
            && self.min_price_filter().is_none_or(|min| price >= min)
            && self.max_price_filter().is_none_or(|max| price <= max)
    }
}

/// Author search by name substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorSearch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AuthorSearch {
    pub fn matches(&self, first_name: &str, last_name: &str) -> bool {
        contains_ci(first_name, text_filter(&self.first_name))
            && contains_ci(last_name, text_filter(&self.last_name))
    }
}

/// Customer search by name and email substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerSearch {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CustomerSearch {
    pub fn matches(&self, name: &str, email: &str) -> bool {
        contains_ci(name, text_filter(&self.name)) && contains_ci(email, text_filter(&self.email))
    }
}

/// Order search by customer name substring and exact status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSearch {
    pub customer_name: Option<String>,
    pub status: Option<OrderStatus>,
}

impl OrderSearch {
    pub fn matches(&self, customer_name: &str, status: OrderStatus) -> bool {
        contains_ci(customer_name, text_filter(&self.customer_name))
            && self.status.is_none_or(|s| s == status)
    }
}

pub(crate) fn text_filter(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// SQL `ILIKE '%needle%'` pattern for a filter value.
pub(crate) fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        Some(needle) => haystack
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_search_matches_everything() {
        let search = ItemSearch::new();
        assert!(search.is_empty());
        assert!(search.matches("Anything", "A", "B", Money::from_cents(1)));
    }

    #[test]
    fn text_criteria_are_case_insensitive_substrings() {
        let search = ItemSearch::new().title("DUN").author_last_name("herb");
        assert!(search.matches("Dune Messiah", "Frank", "Herbert", Money::zero()));
        assert!(!search.matches("Foundation", "Isaac", "Asimov", Money::zero()));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let search = ItemSearch::new()
            .min_price(Money::from_cents(1000))
            .max_price(Money::from_cents(2000));
        assert!(search.matches("t", "f", "l", Money::from_cents(1000)));
        assert!(search.matches("t", "f", "l", Money::from_cents(2000)));
        assert!(!search.matches("t", "f", "l", Money::from_cents(999)));
        assert!(!search.matches("t", "f", "l", Money::from_cents(2001)));
    }

    #[test]
    fn zero_price_bound_is_unset() {
        let search = ItemSearch::new().max_price(Money::zero());
        assert!(search.is_empty());
        assert!(search.matches("t", "f", "l", Money::from_cents(10_000)));
    }

    #[test]
    fn blank_text_is_unset() {
        let search = ItemSearch::new().title("   ");
        assert!(search.is_empty());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn order_search_filters_status_exactly() {
        let search = OrderSearch {
            customer_name: Some("ada".to_string()),
            status: Some(OrderStatus::Pending),
        };
        assert!(search.matches("Ada Lovelace", OrderStatus::Pending));
        assert!(!search.matches("Ada Lovelace", OrderStatus::Shipped));
        assert!(!search.matches("Grace Hopper", OrderStatus::Pending));
    }
}
