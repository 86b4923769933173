//! Product name composition and normalization.
//!
//! Identity fallback (when no metadata match exists) compares Stripe product
//! names against the composed `"{product_name} - {variant_name}"` form.
//! Both sides go through [`normalize_name`] so that punctuation, casing and
//! Unicode-width differences accumulated over years of manual edits do not
//! split one logical product into duplicates.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Characters stripped entirely during normalization.
const STRIPPED: &[char] = &[
    '\'', '"', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '[', ']', '(', ')', '{', '}',
    '|', '\\',
];

/// Compose the display name of a sellable unit: `"Tee - Black / M"`.
#[must_use]
pub fn composed_name(product_name: &str, variant_name: &str) -> String {
    format!("{product_name} - {variant_name}")
}

/// Normalize a product name for identity comparison.
///
/// NFKD-decomposes and drops combining marks, strips quote/apostrophe/
/// bracket/pipe/backslash characters, lowercases, and collapses runs of
/// whitespace into single spaces (trimming the ends).
///
/// ```
/// use tidewater_core::normalize_name;
///
/// assert_eq!(
///     normalize_name("  Caf\u{e9}  \"Tee\" - Black / M "),
///     "cafe tee - black / m"
/// );
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !STRIPPED.contains(c))
        .collect::<String>()
        .to_lowercase();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
