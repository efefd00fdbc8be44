use chrono::{DateTime, Duration, FixedOffset, Utc};

/// Minutes from a detected refresh to the primary next-refresh estimate.
pub const PRIMARY_OFFSET_MIN: i64 = 28;

/// Alternate-window offsets in minutes, relative to the primary estimate.
pub const ALTERNATE_OFFSETS_MIN: [i64; 5] = [7, 14, 21, 28, 35];

/// Next-refresh projection on the site's wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshEstimate {
    pub primary: DateTime<FixedOffset>,
}

impl RefreshEstimate {
    /// Project from a reference instant, usually "now" on the site clock.
    pub fn project(reference: DateTime<FixedOffset>) -> Self {
        Self {
            primary: reference + Duration::minutes(PRIMARY_OFFSET_MIN),
        }
    }

    /// The five alternate windows after the primary estimate.
    pub fn alternates(&self) -> [DateTime<FixedOffset>; 5] {
        ALTERNATE_OFFSETS_MIN.map(|m| self.primary + Duration::minutes(m))
    }
}

/// Fixed offset for the site clock, `None` when the configured hour count is
/// not a valid UTC offset.
pub fn site_offset(utc_offset_hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(utc_offset_hours * 3600)
}

/// Current time on the site clock.
pub fn site_now(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// Wall-clock label used in announcements, e.g. `10:28 AM`.
pub fn clock_label(t: DateTime<FixedOffset>) -> String {
    t.format("%I:%M %p").to_string()
}
