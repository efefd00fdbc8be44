use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// Matches a feed-link href and captures the kad id. The page emits the
/// links relative, so only the file name and query string are anchored;
/// absolute hrefs match the same tail.
static FEED_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"feed_kadoatie\.phtml\?kad_id=(\d+)$").expect("valid regex"));

/// Extract the set of kad ids currently visible on the page.
///
/// An empty set means no feed links were found, which (while authenticated)
/// the site guarantees cannot happen, so the caller treats it as a logged-out
/// session, not as an empty Kadoatery.
pub fn extract_ids(html: &str) -> BTreeSet<u64> {
    let document = Html::parse_document(html);
    let mut ids = BTreeSet::new();

    if let Ok(sel) = Selector::parse("a[href]") {
        for anchor in document.select(&sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(caps) = FEED_HREF.captures(href) else {
                continue;
            };
            match caps[1].parse::<u64>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => debug!(href, "feed link id does not fit u64, skipping"),
            }
        }
    }

    ids
}
