use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::page::ItemContext;

/// Title used when the payload carries neither `title` nor `name`.
pub const UNTITLED_PRODUCT: &str = "Untitled product";

/// Fields consulted, in order, when an item has no usable `id`.
const HINT_FIELDS: &[&str] = &["name", "title", "description", "category"];

/// Longest slug taken from a hint field.
const MAX_HINT_SLUG: usize = 32;

/// A catalog product as consumed by the result grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Product {
    /// Maps one raw result entry to a product.
    ///
    /// Total: any missing or mistyped field takes its default, and a raw
    /// value that is not an object yields a product made entirely of
    /// defaults. The identifier falls back to [`fallback_id`].
    pub fn from_raw(raw: &Value, ctx: ItemContext) -> Self {
        let title = string_field(raw, "title")
            .or_else(|| string_field(raw, "name"))
            .unwrap_or(UNTITLED_PRODUCT)
            .to_string();

        Self {
            id: natural_id(raw).unwrap_or_else(|| fallback_id(raw, ctx)),
            title,
            description: string_field(raw, "description").unwrap_or_default().to_string(),
            image: string_field(raw, "image").map(String::from),
            thumbnail: string_field(raw, "thumbnail").map(String::from),
            price: number_field(raw, "price").unwrap_or(0.0),
            rating: number_field(raw, "rating"),
            category: string_field(raw, "category").map(String::from),
        }
    }
}

fn string_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

fn number_field(raw: &Value, key: &str) -> Option<f64> {
    raw.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

/// The payload's own identifier: a non-blank string, or an integer.
fn natural_id(raw: &Value) -> Option<String> {
    match raw.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Synthesizes a deterministic identifier for an item without one.
///
/// The result depends only on the page, the item's position on that page and
/// the first non-blank hint field, so the same payload always yields the same
/// ids and two positions on one page never share an id.
pub fn fallback_id(raw: &Value, ctx: ItemContext) -> String {
    let hint = HINT_FIELDS
        .iter()
        .filter_map(|field| string_field(raw, field))
        .map(slugify)
        .find(|slug| !slug.is_empty());

    match hint {
        Some(slug) => format!("{}-page-{}-item-{}", slug, ctx.page, ctx.index),
        None => format!("page-{}-item-{}", ctx.page, ctx.index),
    }
}

/// Lowercase ASCII alphanumerics joined by single dashes.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for word in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if slug.len() >= MAX_HINT_SLUG {
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    slug.truncate(MAX_HINT_SLUG);
    slug.trim_end_matches('-').to_string()
}
