use std::collections::BTreeSet;

/// Detects a Kadoatery refresh by diffing each observation against a
/// baseline set of kad ids.
///
/// Policy: set difference. A refresh is reported when the observation
/// contains ids the baseline does not, and only then does the baseline
/// advance to the full observation. Identical successive observations leave
/// the baseline untouched, so repeated samples of the same page never churn
/// it. The first observation after construction or [`reset`](Self::reset)
/// only establishes the baseline and never counts as a refresh.
#[derive(Debug, Default)]
pub struct RefreshDetector {
    baseline: BTreeSet<u64>,
}

impl RefreshDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observation. Returns the fresh ids when a refresh was
    /// detected, `None` otherwise.
    pub fn observe(&mut self, latest: BTreeSet<u64>) -> Option<BTreeSet<u64>> {
        if self.baseline.is_empty() {
            self.baseline = latest;
            return None;
        }

        let fresh: BTreeSet<u64> = latest.difference(&self.baseline).copied().collect();
        if fresh.is_empty() {
            return None;
        }

        self.baseline = latest;
        Some(fresh)
    }

    /// Drop the baseline. The next observation establishes a new one without
    /// reporting a refresh; call this after every successful re-login.
    pub fn reset(&mut self) {
        self.baseline.clear();
    }

    /// The ids the next observation will be compared against.
    pub fn baseline(&self) -> &BTreeSet<u64> {
        &self.baseline
    }
}
