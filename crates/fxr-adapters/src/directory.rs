use std::collections::HashSet;

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::markup::{element_text, selector};
use crate::ExtractError;

/// One bank listed on a directory page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub label: String,
    pub href: String,
}

/// Bank label and detail link pairs from `li.bank_item` anchors. A label seen
/// twice keeps its first link.
pub fn extract_directory(body: &str) -> Result<Vec<DirectoryEntry>, ExtractError> {
    let document = Html::parse_document(body);
    let sel = selector("li.item.bank_item > a[href]")?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for anchor in document.select(&sel) {
        let label = element_text(anchor);
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if label.is_empty() || href.trim().is_empty() || !seen.insert(label.clone()) {
            continue;
        }
        out.push(DirectoryEntry {
            label,
            href: href.trim().to_string(),
        });
    }
    Ok(out)
}

/// Resolve a directory link against the site root.
pub fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}
