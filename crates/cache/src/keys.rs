//! Cache key derivation.
//!
//! Keys are derived from the query shape only, so equal queries share an
//! entry regardless of how their criteria were spelled.

use catalog_store::{ItemId, ItemSearch, Money};

/// Key for the full item listing.
pub const ALL_ITEMS: &str = "items:all";

/// Prefix shared by every search result key.
pub const SEARCH_PREFIX: &str = "items:search:";

/// Key for one item.
pub fn item(id: ItemId) -> String {
    format!("item:{id}")
}

/// Key for a search result.
///
/// Text criteria are trimmed and lower-cased; unset values (blank text,
/// zero prices) render empty so they share a key with omitted criteria.
pub fn search(criteria: &ItemSearch) -> String {
    fn text(value: Option<&str>) -> String {
        value.map(str::to_lowercase).unwrap_or_default()
    }

    fn cents(value: Option<Money>) -> String {
        value.map(|m| m.cents().to_string()).unwrap_or_default()
    }

    format!(
        "{SEARCH_PREFIX}title={}|first={}|last={}|min={}|max={}",
        text(criteria.title_filter()),
        text(criteria.author_first_name_filter()),
        text(criteria.author_last_name_filter()),
        cents(criteria.min_price_filter()),
        cents(criteria.max_price_filter()),
    )
}

/// Keys that an item write can make stale.
///
/// Search keys are not enumerated; they expire with their TTL.
pub fn stale_after_item_write(id: ItemId) -> Vec<String> {
    vec![item(id), ALL_ITEMS.to_string()]
}
