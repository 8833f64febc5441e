//! Normalization of raw paginated payloads.
//!
//! The catalog endpoint is inconsistent about which pagination fields it
//! sends. Every field is resolved through its own ordered fallback chain
//! (payload value if valid, then caller context, then a derived value) so a
//! malformed payload degrades to defaults instead of failing.
//!
//! Counts and page numbers are whole: a numeric field only takes part in its
//! chain when it is a finite, integral JSON number (`2` or `2.0`). Fractions,
//! numeric strings and booleans are treated like a missing field.

use serde::Serialize;
use serde_json::Value;

/// Position of a raw item, handed to the per-item mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemContext {
    /// Zero-based position within the page.
    pub index: usize,
    /// Resolved page number.
    pub page: u32,
}

/// What the caller asked for, used when the payload does not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    pub page: u32,
    pub page_size: Option<u32>,
}

/// One fetch's normalized result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

/// Which values a numeric payload field may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validity {
    Positive,
    NonNegative,
}

/// Reads an integral, finite JSON number that satisfies `validity`.
fn coerce(value: Option<&Value>, validity: Validity) -> Option<u64> {
    let n = value?.as_f64()?;
    if !n.is_finite() || n.fract() != 0.0 || n > u64::MAX as f64 {
        return None;
    }
    let accepted = match validity {
        Validity::Positive => n > 0.0,
        Validity::NonNegative => n >= 0.0,
    };
    accepted.then_some(n as u64)
}

/// Payload `page` if positive, else the requested page.
pub(crate) fn resolve_page(raw: &Value, fallback: &Fallback) -> u32 {
    coerce(raw.get("page"), Validity::Positive)
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(fallback.page)
}

/// Payload `limit` if positive, else the requested size, else the item count.
pub(crate) fn resolve_page_size(raw: &Value, fallback: &Fallback, item_count: usize) -> u32 {
    coerce(raw.get("limit"), Validity::Positive)
        .and_then(|l| u32::try_from(l).ok())
        .or(fallback.page_size)
        .unwrap_or_else(|| u32::try_from(item_count).unwrap_or(u32::MAX))
}

/// Payload `total` if non-negative and integral, else the item count.
pub(crate) fn resolve_total(raw: &Value, item_count: usize) -> u64 {
    coerce(raw.get("total"), Validity::NonNegative).unwrap_or(item_count as u64)
}

/// Payload `totalPages` if non-negative, else `ceil(total / page_size)`.
///
/// Always 0 when the page size is 0.
pub(crate) fn resolve_total_pages(raw: &Value, total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    coerce(raw.get("totalPages"), Validity::NonNegative)
        .unwrap_or_else(|| total.div_ceil(u64::from(page_size)))
}

/// `page < total_pages` when the page count is known, else whether the page
/// came back full.
///
/// An explicit `totalPages: 0` lands in the second branch even when `total`
/// says otherwise.
pub(crate) fn resolve_has_more(page: u32, page_size: u32, total_pages: u64, item_count: usize) -> bool {
    if total_pages > 0 {
        u64::from(page) < total_pages
    } else {
        page_size > 0 && item_count == page_size as usize
    }
}

/// Converts a raw payload into a fully populated [`Page`].
///
/// Never fails: a missing payload, a non-object payload or a `results` that is
/// not an array all normalize to an empty page built from `fallback`.
pub fn normalize_page<T, F>(raw: Option<&Value>, fallback: Fallback, map_item: F) -> Page<T>
where
    F: Fn(&Value, ItemContext) -> T,
{
    let raw = raw.unwrap_or(&Value::Null);
    let raw_items: &[Value] = raw
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let page = resolve_page(raw, &fallback);
    let items: Vec<T> = raw_items
        .iter()
        .enumerate()
        .map(|(index, item)| map_item(item, ItemContext { index, page }))
        .collect();

    let page_size = resolve_page_size(raw, &fallback, raw_items.len());
    let total = resolve_total(raw, items.len());
    let total_pages = resolve_total_pages(raw, total, page_size);
    let has_more = resolve_has_more(page, page_size, total_pages, items.len());

    Page {
        items,
        total,
        page,
        page_size,
        has_more,
    }
}
