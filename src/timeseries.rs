// 📈 Time Series Aggregator - Calendar-month revenue buckets
//
// Sparse series: a month appears only if at least one record landed in it.
// Output is ascending by period; every consumer downstream relies on that.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::period::YearMonth;
use crate::record::TransactionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// MONTH BUCKET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthBucket {
    pub period: YearMonth,
    pub total_amount: f64,
    pub record_count: usize,
}

// ============================================================================
// COMPENSATED SUM
// ============================================================================

/// Neumaier summation. Values are added in the order they are pushed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableSum {
    sum: f64,
    compensation: f64,
}

impl StableSum {
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl FromIterator<f64> for StableSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = StableSum::default();
        for value in iter {
            acc.add(value);
        }
        acc
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesAggregator;

impl TimeSeriesAggregator {
    pub fn new() -> Self {
        TimeSeriesAggregator
    }

    /// Bucket records by the calendar month of their timestamp.
    ///
    /// Records rejected by `filter` are skipped. A record that passes the
    /// filter without a timestamp is a contract violation: the filter was
    /// supposed to exclude it.
    pub fn aggregate<F>(
        &self,
        records: &[TransactionRecord],
        filter: F,
    ) -> AnalyticsResult<Vec<MonthBucket>>
    where
        F: Fn(&TransactionRecord) -> bool,
    {
        let mut buckets: BTreeMap<YearMonth, (StableSum, usize)> = BTreeMap::new();

        for record in records.iter().filter(|r| filter(*r)) {
            let timestamp = record.timestamp.as_ref().ok_or_else(|| {
                AnalyticsError::ContractViolation(format!(
                    "record {} passed the series filter without a timestamp",
                    record.order_ref
                ))
            })?;

            let entry = buckets
                .entry(YearMonth::from_datetime(timestamp))
                .or_insert((StableSum::default(), 0));
            entry.0.add(record.amount);
            entry.1 += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|(period, (sum, record_count))| MonthBucket {
                period,
                total_amount: sum.total(),
                record_count,
            })
            .collect())
    }

    /// Series over confirmed/locked records that carry a timestamp
    pub fn aggregate_qualifying(
        &self,
        records: &[TransactionRecord],
    ) -> AnalyticsResult<Vec<MonthBucket>> {
        self.aggregate(records, TransactionRecord::is_qualifying)
    }
}

/// The last `n` buckets of an ascending series
pub fn tail(series: &[MonthBucket], n: usize) -> &[MonthBucket] {
    &series[series.len().saturating_sub(n)..]
}

// ============================================================================
// TESTS
// ============================================================================
