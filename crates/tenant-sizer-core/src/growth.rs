use crate::model::UsageSample;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Growth reported when fewer than two daily samples are available.
pub const DEFAULT_GROWTH_PERCENT: i64 = 10;

/// Daily storage totals for one workload in chronological order.
///
/// Deleted samples are dropped before ordering. Samples that share a date are
/// summed, so a report with one row per date yields the raw series unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrowthSeries {
    days: Vec<(NaiveDate, u64)>,
}

impl GrowthSeries {
    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a UsageSample>,
    {
        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for sample in samples.into_iter().filter(|s| !s.deleted) {
            let total = by_day.entry(sample.date).or_insert(0);
            *total = total.saturating_add(sample.bytes);
        }
        Self {
            days: by_day.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn daily_totals(&self) -> Vec<u64> {
        self.days.iter().map(|(_, bytes)| *bytes).collect()
    }

    pub fn latest(&self) -> Option<(NaiveDate, u64)> {
        self.days.last().copied()
    }

    pub fn annual_growth_percent(&self) -> Option<i64> {
        annual_growth_percent(&self.daily_totals())
    }
}

/// Day-over-day percent change for each consecutive pair. A step out of a
/// zero-sized day contributes 0.
pub fn daily_growth_percentages(sizes: &[u64]) -> Vec<f64> {
    sizes
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            if prev == 0 {
                0.0
            } else {
                ((curr as f64 / prev as f64) - 1.0) * 100.0
            }
        })
        .collect()
}

/// Mean daily growth doubled and rounded up. `None` without at least one
/// day-over-day step.
pub fn annual_growth_percent(sizes: &[u64]) -> Option<i64> {
    let daily = daily_growth_percentages(sizes);
    if daily.is_empty() {
        return None;
    }
    let mean = daily.iter().sum::<f64>() / daily.len() as f64;
    Some((mean * 2.0).ceil() as i64)
}

pub fn estimate_growth(sizes: &[u64], default_percent: i64) -> i64 {
    annual_growth_percent(sizes).unwrap_or(default_percent)
}

/// Size after one year at the given growth rate, rounded up.
pub fn project(total_bytes: u64, growth_percent: i64) -> u64 {
    let scaled = total_bytes as i128 * (100 + growth_percent as i128);
    if scaled <= 0 {
        return 0;
    }
    let projected = (scaled + 99) / 100;
    u64::try_from(projected).unwrap_or(u64::MAX)
}
