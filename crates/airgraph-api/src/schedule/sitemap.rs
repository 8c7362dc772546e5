//! Slot sitemap parsing.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

/// Regex extracting the slot ID from a `.../slots/{id}` URL.
#[allow(clippy::expect_used)]
static SLOT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://.+/slots/([^/?#\s]+)").expect("failed to compile slot URL regex")
});

/// `<urlset>` root element.
#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(rename = "url", default)]
    urls: Vec<UrlEntry>,
}

/// `<url>` entry.
#[derive(Debug, Deserialize)]
struct UrlEntry {
    loc: String,
}

/// Extracts slot IDs from a sitemap document, in document order.
///
/// Entries whose `<loc>` is not a slot URL are skipped.
///
/// # Errors
///
/// Returns an error if the document is not a well-formed `<urlset>`.
pub fn parse_sitemap_slot_ids(xml: &str) -> Result<Vec<String>> {
    let raw_result: std::result::Result<UrlSet, _> = quick_xml::de::from_str(xml);
    let urlset = raw_result.context("sitemap XML decoding failed")?;

    Ok(urlset
        .urls
        .iter()
        .filter_map(|entry| {
            let loc = entry.loc.trim();
            let id = SLOT_URL_RE
                .captures(loc)
                .and_then(|caps| caps.get(1))
                .map(|m| String::from(m.as_str()));
            if id.is_none() {
                tracing::debug!(loc, "skipping non-slot sitemap entry");
            }
            id
        })
        .collect())
}
