use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::raster::IndexRaster;
use crate::scene::DateRange;

/// Calendar period of a bucket within the requested year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Month(u32),
    Year,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month(m) => write!(f, "month {}", m),
            Period::Year => write!(f, "year"),
        }
    }
}

/// Index rasters of one indicator acquired within a period.
#[derive(Debug, Clone)]
pub struct TemporalBucket {
    pub period: Period,
    pub range: DateRange,
    pub scenes: Vec<IndexRaster>,
}

impl TemporalBucket {
    pub fn new(period: Period, range: DateRange) -> Self {
        Self {
            period,
            range,
            scenes: Vec::new(),
        }
    }

    /// Scenes sorted by acquisition time, most recent last.
    pub fn sorted(mut self) -> Self {
        self.scenes.sort_by_key(|s| s.timestamp);
        self
    }
}

/// Whole calendar year `[Jan 1, Jan 1 next year)`.
pub fn year_range(year: i32) -> Option<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = start.checked_add_months(Months::new(12))?;
    Some(DateRange::new(start, end))
}

/// The twelve monthly windows of `year`, each `[first of month, first of
/// next month)`.
pub fn monthly_buckets(year: i32) -> Vec<TemporalBucket> {
    let Some(mut start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return Vec::new();
    };

    let mut buckets = Vec::with_capacity(12);
    for month in 1..=12 {
        let Some(end) = start.checked_add_months(Months::new(1)) else {
            break;
        };
        buckets.push(TemporalBucket::new(
            Period::Month(month),
            DateRange::new(start, end),
        ));
        start = end;
    }

    buckets
}

pub fn annual_bucket(year: i32) -> Option<TemporalBucket> {
    year_range(year).map(|range| TemporalBucket::new(Period::Year, range))
}

/// Distributes index rasters over the buckets whose range contains their
/// timestamp.
pub fn assign(buckets: &mut [TemporalBucket], rasters: impl IntoIterator<Item = IndexRaster>) {
    for raster in rasters {
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|b| b.range.contains(&raster.timestamp))
        {
            bucket.scenes.push(raster);
        }
    }
}
