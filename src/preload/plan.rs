use std::collections::HashSet;

use super::task::PreloadPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierWindows {
    pub high: usize,
    pub low: usize,
}

impl Default for TierWindows {
    fn default() -> Self {
        Self { high: 2, low: 4 }
    }
}

/// Page image URLs split by fetch urgency, each tier in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierPlan {
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub low: Vec<String>,
    pub idle: Vec<String>,
}

impl TierPlan {
    pub fn tier(&self, priority: PreloadPriority) -> &[String] {
        match priority {
            PreloadPriority::Critical => &self.critical,
            PreloadPriority::High => &self.high,
            PreloadPriority::Low => &self.low,
            PreloadPriority::Idle => &self.idle,
        }
    }

    pub fn len(&self) -> usize {
        self.critical.len() + self.high.len() + self.low.len() + self.idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PreloadPriority, &str)> {
        [
            PreloadPriority::Critical,
            PreloadPriority::High,
            PreloadPriority::Low,
            PreloadPriority::Idle,
        ]
        .into_iter()
        .flat_map(move |priority| {
            self.tier(priority)
                .iter()
                .map(move |url| (priority, url.as_str()))
        })
    }
}

/// Partitions `page_urls[cursor..]` into contiguous tiers by distance from `cursor`.
///
/// `cursor` is the 0-based index of the first page on screen. Placeholders
/// (`None`) are skipped, and a URL repeated across pages is only planned in
/// its nearest tier.
pub fn plan_viewer_tiers(
    page_urls: &[Option<String>],
    cursor: usize,
    pages_per_spread: usize,
    windows: TierWindows,
) -> TierPlan {
    let len = page_urls.len();
    if cursor >= len {
        return TierPlan::default();
    }

    let critical_end = cursor.saturating_add(pages_per_spread.max(1)).min(len);
    let high_end = critical_end.saturating_add(windows.high).min(len);
    let low_end = high_end.saturating_add(windows.low).min(len);

    let mut seen = HashSet::new();
    let mut collect = |range: std::ops::Range<usize>| -> Vec<String> {
        page_urls[range]
            .iter()
            .flatten()
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect()
    };

    TierPlan {
        critical: collect(cursor..critical_end),
        high: collect(critical_end..high_end),
        low: collect(high_end..low_end),
        idle: collect(low_end..len),
    }
}
