use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::FEED_LINK_PREFIX;
use crate::chat::ChatClient;
use crate::estimate::{RefreshEstimate, clock_label};

/// Render the refresh announcement: broadcast mention, page URL, primary
/// estimate, the five alternate windows, and one feed link per fresh kad.
pub fn format_announcement(
    page_url: &str,
    estimate: &RefreshEstimate,
    fresh: &BTreeSet<u64>,
) -> String {
    let alternates = estimate.alternates().map(clock_label).join(" | ");
    let mut message = format!(
        "@everyone {page_url}\n\nNext: {}\nAlternate: {}\n",
        clock_label(estimate.primary),
        alternates,
    );
    for id in fresh {
        message.push_str(&format!("\n{FEED_LINK_PREFIX}{id}"));
    }
    message
}

/// Delivers announcements to a single channel. Best effort only: failures
/// are logged and swallowed, never retried.
pub struct Notifier {
    chat: ChatClient,
    channel_id: String,
}

impl Notifier {
    pub fn new(chat: ChatClient, channel_id: String) -> Self {
        Self { chat, channel_id }
    }

    pub async fn announce(&self, content: &str) {
        let message = match self.chat.send_message(&self.channel_id, content).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "failed to deliver announcement");
                return;
            }
        };
        info!(message_id = %message.id, "announcement delivered");

        // Crossposting only works in announcement channels; anywhere else
        // the API declines and the message stays put.
        if let Err(e) = self.chat.crosspost(&self.channel_id, &message.id).await {
            debug!(error = %e, "crosspost declined");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::site_offset;
    use chrono::TimeZone;

    fn estimate_at_ten() -> RefreshEstimate {
        let reference = site_offset(-8)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 10, 10, 0, 0)
            .unwrap();
        RefreshEstimate::project(reference)
    }

    #[test]
    fn announcement_has_url_estimates_and_links() {
        let text = format_announcement(
            "https://example.com/kadoatery",
            &estimate_at_ten(),
            &BTreeSet::from([2718691, 2718692]),
        );
        assert_eq!(
            text,
            "@everyone https://example.com/kadoatery\n\
             \n\
             Next: 10:28 AM\n\
             Alternate: 10:35 AM | 10:42 AM | 10:49 AM | 10:56 AM | 11:03 AM\n\
             \n\
             https://www.neopets.com/games/kadoatery/feed_kadoatie.phtml?kad_id=2718691\n\
             https://www.neopets.com/games/kadoatery/feed_kadoatie.phtml?kad_id=2718692"
        );
    }

    #[test]
    fn links_come_out_in_ascending_id_order() {
        let text = format_announcement(
            "https://example.com",
            &estimate_at_ten(),
            &BTreeSet::from([30, 10, 20]),
        );
        let i10 = text.find("kad_id=10").unwrap();
        let i20 = text.find("kad_id=20").unwrap();
        let i30 = text.find("kad_id=30").unwrap();
        assert!(i10 < i20 && i20 < i30);
    }

    #[test]
    fn no_links_section_for_empty_fresh_set() {
        let text = format_announcement("https://example.com", &estimate_at_ten(), &BTreeSet::new());
        assert!(text.ends_with("11:03 AM\n"));
        assert!(!text.contains("kad_id"));
    }
}
