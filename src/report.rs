use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::{AggregateResult, Period, Status};
use crate::indices::Indicator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub month: u32,
    pub value: Option<f64>,
    pub coverage_pct: f64,
    pub status: Status,
}

impl MonthlyPoint {
    fn from_result(result: &AggregateResult) -> Option<Self> {
        match result.period {
            Period::Month(month) => Some(Self {
                month,
                value: result.value,
                coverage_pct: result.coverage_pct,
                status: result.status,
            }),
            Period::Year => None,
        }
    }
}

/// Twelve points per indicator for one station and year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries {
    pub station: String,
    pub year: i32,
    pub cloud_perc: f64,
    pub monthly: BTreeMap<Indicator, Vec<MonthlyPoint>>,
}

impl MonthlySeries {
    pub fn assemble(
        station: &str,
        year: i32,
        cloud_perc: f64,
        results: &BTreeMap<Indicator, Vec<AggregateResult>>,
    ) -> Self {
        let monthly = results
            .iter()
            .map(|(indicator, results)| {
                let mut points: Vec<MonthlyPoint> =
                    results.iter().filter_map(MonthlyPoint::from_result).collect();
                points.sort_by_key(|p| p.month);
                (*indicator, points)
            })
            .collect();

        Self {
            station: station.to_string(),
            year,
            cloud_perc,
            monthly,
        }
    }

    pub fn point(&self, indicator: Indicator, month: u32) -> Option<&MonthlyPoint> {
        self.monthly
            .get(&indicator)?
            .iter()
            .find(|p| p.month == month)
    }
}

/// Annual value per indicator for one station and year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualSummary {
    pub station: String,
    pub year: i32,
    pub cloud_perc: f64,
    pub mean: BTreeMap<Indicator, Option<f64>>,
}

impl AnnualSummary {
    pub fn assemble(
        station: &str,
        year: i32,
        cloud_perc: f64,
        results: &BTreeMap<Indicator, Vec<AggregateResult>>,
    ) -> Self {
        let mean = results
            .iter()
            .map(|(indicator, results)| {
                let value = results
                    .iter()
                    .find(|r| r.period == Period::Year)
                    .and_then(|r| r.value);
                (*indicator, value)
            })
            .collect();

        Self {
            station: station.to_string(),
            year,
            cloud_perc,
            mean,
        }
    }
}
