// 📊 Dashboard Aggregator - KPIs, top-N rankings, status breakdown
//
// Windows are calendar-aligned: "monthly" means the calendar month of
// `as_of`, "yearly" its calendar year. Not rolling 30/365-day windows.
//
// Rankings sort descending by revenue with a stable sort, so equal revenue
// keeps first-seen order and the cut at position N is deterministic.

use crate::error::AnalyticsResult;
use crate::period::YearMonth;
use crate::record::TransactionRecord;
use crate::timeseries::{self, StableSum, TimeSeriesAggregator};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_CHART_MONTHS: usize = 12;

// ============================================================================
// KPI REPORT
// ============================================================================

/// Monetary fields keep full precision; they are rounded to cents only when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    #[serde(serialize_with = "serialize_cents")]
    pub total_revenue: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub monthly_revenue: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub yearly_revenue: f64,
    pub total_order_count: usize,
    pub monthly_order_count: usize,
    pub unique_customer_count: usize,
    #[serde(serialize_with = "serialize_cents")]
    pub avg_order_value: f64,
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn serialize_cents<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_cents(*value))
}

// ============================================================================
// RANKINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub name: String,
    pub metric_count: f64,
    pub metric_revenue: f64,
}

/// Per-name running totals
#[derive(Debug)]
struct EntityTotals {
    name: String,
    count: StableSum,
    revenue: StableSum,
}

/// Accumulates per-name totals, remembering first-seen order
#[derive(Debug, Default)]
struct RankingBuilder {
    entities: Vec<EntityTotals>,
    index: HashMap<String, usize>,
}

impl RankingBuilder {
    fn add(&mut self, name: &str, count: f64, revenue: f64) {
        let slot = match self.index.get(name) {
            Some(&slot) => slot,
            None => {
                self.entities.push(EntityTotals {
                    name: name.to_string(),
                    count: StableSum::default(),
                    revenue: StableSum::default(),
                });
                self.index.insert(name.to_string(), self.entities.len() - 1);
                self.entities.len() - 1
            }
        };
        let entity = &mut self.entities[slot];
        entity.count.add(count);
        entity.revenue.add(revenue);
    }

    fn into_top(self, n: usize) -> Vec<RankedEntity> {
        let entities = self
            .entities
            .into_iter()
            .map(|totals| RankedEntity {
                name: totals.name,
                metric_count: totals.count.total(),
                metric_revenue: totals.revenue.total(),
            })
            .collect();
        rank_top_n(entities, n)
    }
}

/// Descending by revenue; `sort_by` is stable so ties keep input order.
pub fn rank_top_n(mut entities: Vec<RankedEntity>, n: usize) -> Vec<RankedEntity> {
    entities.sort_by(|a, b| {
        b.metric_revenue
            .partial_cmp(&a.metric_revenue)
            .unwrap_or(Ordering::Equal)
    });
    entities.truncate(n);
    entities
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRanking {
    pub name: String,
    pub quantity: f64,
    pub revenue: f64,
}

impl From<RankedEntity> for ProductRanking {
    fn from(entity: RankedEntity) -> Self {
        ProductRanking {
            name: entity.name,
            quantity: entity.metric_count,
            revenue: entity.metric_revenue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRanking {
    pub name: String,
    pub orders: u64,
    pub revenue: f64,
}

impl From<RankedEntity> for CustomerRanking {
    fn from(entity: RankedEntity) -> Self {
        CustomerRanking {
            name: entity.name,
            // Sum of whole order counts
            orders: entity.metric_count as u64,
            revenue: entity.metric_revenue,
        }
    }
}

// ============================================================================
// CHART PAYLOADS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueChart {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardPayload {
    pub kpis: KpiReport,
    pub top_products: Vec<ProductRanking>,
    pub top_customers: Vec<CustomerRanking>,
    pub monthly_revenue_chart: RevenueChart,
    pub orders_by_status: Vec<StatusCount>,
}

impl DashboardPayload {
    /// No qualifying orders behind the numbers
    pub fn is_empty(&self) -> bool {
        self.kpis.total_order_count == 0
    }
}

// ============================================================================
// DASHBOARD AGGREGATOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub top_n: usize,
    pub chart_months: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            top_n: DEFAULT_TOP_N,
            chart_months: DEFAULT_CHART_MONTHS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardAggregator {
    config: DashboardConfig,
}

impl DashboardAggregator {
    pub fn new() -> Self {
        DashboardAggregator::default()
    }

    pub fn with_config(config: DashboardConfig) -> Self {
        DashboardAggregator { config }
    }

    /// Build the dashboard payload.
    ///
    /// `records` may contain non-qualifying orders; only confirmed/locked
    /// orders with a timestamp feed the KPIs, rankings and revenue chart.
    /// `all_records` feeds the status breakdown and is counted in full.
    pub fn summarize(
        &self,
        records: &[TransactionRecord],
        all_records: &[TransactionRecord],
        as_of: NaiveDateTime,
    ) -> AnalyticsResult<DashboardPayload> {
        let qualifying: Vec<&TransactionRecord> =
            records.iter().filter(|r| r.is_qualifying()).collect();

        let series = TimeSeriesAggregator::new().aggregate_qualifying(records)?;
        let recent = timeseries::tail(&series, self.config.chart_months);
        let monthly_revenue_chart = RevenueChart {
            labels: recent.iter().map(|b| b.period.label()).collect(),
            data: recent.iter().map(|b| b.total_amount).collect(),
        };

        Ok(DashboardPayload {
            kpis: compute_kpis(&qualifying, as_of),
            top_products: self
                .top_products(&qualifying)
                .into_iter()
                .map(ProductRanking::from)
                .collect(),
            top_customers: self
                .top_customers(&qualifying)
                .into_iter()
                .map(CustomerRanking::from)
                .collect(),
            monthly_revenue_chart,
            orders_by_status: status_breakdown(all_records),
        })
    }

    /// Line items grouped by product name; count = quantity sold
    pub fn top_products(&self, records: &[&TransactionRecord]) -> Vec<RankedEntity> {
        let mut builder = RankingBuilder::default();
        for line in records.iter().flat_map(|r| r.lines.iter()) {
            builder.add(line.display_name(), line.quantity, line.line_revenue);
        }
        builder.into_top(self.config.top_n)
    }

    /// Orders grouped by customer display name; count = number of orders
    pub fn top_customers(&self, records: &[&TransactionRecord]) -> Vec<RankedEntity> {
        let mut builder = RankingBuilder::default();
        for record in records {
            builder.add(record.customer_display_name(), 1.0, record.amount);
        }
        builder.into_top(self.config.top_n)
    }
}

/// KPIs over already-qualifying records
pub fn compute_kpis(records: &[&TransactionRecord], as_of: NaiveDateTime) -> KpiReport {
    let current_month = YearMonth::from_datetime(&as_of);
    let current_year = as_of.year();

    let mut total = StableSum::default();
    let mut monthly = StableSum::default();
    let mut yearly = StableSum::default();
    let mut monthly_order_count = 0;
    let mut customers: HashSet<&str> = HashSet::new();

    for record in records {
        total.add(record.amount);
        customers.insert(record.customer_id.as_str());

        if let Some(ts) = &record.timestamp {
            if ts.year() == current_year {
                yearly.add(record.amount);
            }
            if current_month.contains(ts) {
                monthly.add(record.amount);
                monthly_order_count += 1;
            }
        }
    }

    let total_order_count = records.len();
    let total_revenue = total.total();
    let avg_order_value = if total_order_count > 0 {
        total_revenue / total_order_count as f64
    } else {
        0.0
    };

    KpiReport {
        total_revenue,
        monthly_revenue: monthly.total(),
        yearly_revenue: yearly.total(),
        total_order_count,
        monthly_order_count,
        unique_customer_count: customers.len(),
        avg_order_value,
    }
}

/// Count every record once, grouped by status label in first-seen order
pub fn status_breakdown(records: &[TransactionRecord]) -> Vec<StatusCount> {
    let mut counts: Vec<StatusCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let label = record.status.label();
        match index.get(label) {
            Some(&slot) => counts[slot].count += 1,
            None => {
                index.insert(label, counts.len());
                counts.push(StatusCount {
                    status: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::*;
    use crate::record::{OrderStatus, UNKNOWN_NAME};

    fn order(
        order_ref: &str,
        month: u32,
        amount: f64,
        customer: &str,
        lines: Vec<crate::record::LineItem>,
    ) -> TransactionRecord {
        let mut record = create_test_record(
            order_ref,
            Some(at(2025, month, 10)),
            amount,
            OrderStatus::Confirmed,
            customer,
        );
        record.lines = lines;
        record
    }

    #[test]
    fn test_empty_input_gives_zeroed_report() {
        let payload = DashboardAggregator::new()
            .summarize(&[], &[], at(2025, 6, 15))
            .unwrap();

        assert_eq!(payload.kpis, KpiReport::default());
        assert_eq!(payload.kpis.avg_order_value, 0.0);
        assert!(payload.top_products.is_empty());
        assert!(payload.top_customers.is_empty());
        assert!(payload.monthly_revenue_chart.labels.is_empty());
        assert!(payload.orders_by_status.is_empty());
        assert!(payload.is_empty());
    }

    #[test]
    fn test_only_non_qualifying_records_still_count_statuses() {
        let drafts = vec![
            create_test_record("D1", Some(at(2025, 6, 1)), 50.0, OrderStatus::Draft, "a"),
            create_test_record("D2", None, 50.0, OrderStatus::Cancelled, "b"),
        ];

        let payload = DashboardAggregator::new()
            .summarize(&drafts, &drafts, at(2025, 6, 15))
            .unwrap();

        assert!(payload.is_empty());
        assert_eq!(payload.kpis.total_revenue, 0.0);
        assert_eq!(payload.orders_by_status.len(), 2);
    }

    #[test]
    fn test_kpis_use_calendar_windows() {
        let records = vec![
            create_test_record("A", Some(at(2024, 12, 31)), 100.0, OrderStatus::Confirmed, "ann"),
            create_test_record("B", Some(at(2025, 5, 31)), 200.0, OrderStatus::Locked, "bob"),
            create_test_record("C", Some(at(2025, 6, 1)), 300.0, OrderStatus::Confirmed, "ann"),
            create_test_record("D", Some(at(2025, 6, 2)), 999.0, OrderStatus::Draft, "cid"),
        ];

        let payload = DashboardAggregator::new()
            .summarize(&records, &records, at(2025, 6, 15))
            .unwrap();
        let kpis = payload.kpis;

        assert_eq!(kpis.total_revenue, 600.0);
        assert_eq!(kpis.monthly_revenue, 300.0);
        assert_eq!(kpis.yearly_revenue, 500.0);
        assert_eq!(kpis.total_order_count, 3);
        assert_eq!(kpis.monthly_order_count, 1);
        assert_eq!(kpis.unique_customer_count, 2);
        assert_eq!(kpis.avg_order_value, 200.0);
    }

    #[test]
    fn test_kpi_rounding_happens_at_serialization() {
        let records = vec![
            create_test_record("A", Some(at(2025, 1, 1)), 10.0, OrderStatus::Confirmed, "a"),
            create_test_record("B", Some(at(2025, 1, 2)), 10.0, OrderStatus::Confirmed, "a"),
            create_test_record("C", Some(at(2025, 1, 3)), 0.004, OrderStatus::Confirmed, "a"),
        ];
        let refs: Vec<&TransactionRecord> = records.iter().collect();
        let kpis = compute_kpis(&refs, at(2025, 1, 15));

        // Internal value keeps full precision
        assert!((kpis.avg_order_value - 20.004 / 3.0).abs() < 1e-12);

        let json = serde_json::to_value(&kpis).unwrap();
        assert_eq!(json["avg_order_value"], serde_json::json!(6.67));
        assert_eq!(json["total_revenue"], serde_json::json!(20.0));
        assert_eq!(json["total_order_count"], serde_json::json!(3));
    }

    #[test]
    fn test_top_products_group_and_map_unknown() {
        let records = vec![
            order("A", 1, 30.0, "ann", vec![line(Some("Widget"), 2.0, 20.0), line(None, 1.0, 10.0)]),
            order("B", 2, 50.0, "bob", vec![line(Some("Widget"), 3.0, 30.0), line(Some(""), 4.0, 20.0)]),
        ];

        let payload = DashboardAggregator::new()
            .summarize(&records, &records, at(2025, 6, 1))
            .unwrap();

        assert_eq!(payload.top_products.len(), 2);
        assert_eq!(payload.top_products[0].name, "Widget");
        assert_eq!(payload.top_products[0].quantity, 5.0);
        assert_eq!(payload.top_products[0].revenue, 50.0);
        assert_eq!(payload.top_products[1].name, UNKNOWN_NAME);
        assert_eq!(payload.top_products[1].quantity, 5.0);
        assert_eq!(payload.top_products[1].revenue, 30.0);
    }

    #[test]
    fn test_top_customers_count_orders() {
        let mut anonymous = order("C", 3, 500.0, "x", vec![]);
        anonymous.customer_name = None;
        let records = vec![
            order("A", 1, 100.0, "ann", vec![]),
            order("B", 2, 150.0, "ann", vec![]),
            anonymous,
        ];

        let payload = DashboardAggregator::new()
            .summarize(&records, &records, at(2025, 6, 1))
            .unwrap();

        assert_eq!(payload.top_customers[0].name, UNKNOWN_NAME);
        assert_eq!(payload.top_customers[0].orders, 1);
        assert_eq!(payload.top_customers[1].name, "ann");
        assert_eq!(payload.top_customers[1].orders, 2);
        assert_eq!(payload.top_customers[1].revenue, 250.0);
    }

    #[test]
    fn test_ranking_tie_at_cutoff_first_seen_wins() {
        let aggregator = DashboardAggregator::with_config(DashboardConfig {
            top_n: 2,
            chart_months: 12,
        });

        let big = order("A", 1, 100.0, "big", vec![]);
        let first = order("B", 1, 50.0, "first", vec![]);
        let second = order("C", 1, 50.0, "second", vec![]);

        let records = vec![big.clone(), first.clone(), second.clone()];
        let refs: Vec<&TransactionRecord> = records.iter().collect();
        let top = aggregator.top_customers(&refs);
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["big", "first"]);

        // Swap input order of the tied pair: the other one makes the cut
        let swapped = vec![big, second, first];
        let refs: Vec<&TransactionRecord> = swapped.iter().collect();
        let top = aggregator.top_customers(&refs);
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["big", "second"]);
    }

    #[test]
    fn test_product_tie_at_cutoff_first_seen_wins() {
        let aggregator = DashboardAggregator::with_config(DashboardConfig {
            top_n: 2,
            chart_months: 12,
        });

        let records = vec![order(
            "A",
            1,
            180.0,
            "ann",
            vec![
                line(Some("Gadget"), 1.0, 100.0),
                line(Some("Bolt"), 4.0, 40.0),
                line(Some("Nut"), 8.0, 40.0),
            ],
        )];
        let refs: Vec<&TransactionRecord> = records.iter().collect();
        let names: Vec<String> = aggregator.top_products(&refs).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Gadget", "Bolt"]);

        let mut swapped = records.clone();
        swapped[0].lines.swap(1, 2);
        let refs: Vec<&TransactionRecord> = swapped.iter().collect();
        let names: Vec<String> = aggregator.top_products(&refs).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Gadget", "Nut"]);
    }

    #[test]
    fn test_ranking_revenue_matches_total_revenue() {
        // Each 1.0 is below half an ulp of 1e16 and vanishes under naive summation
        let amounts = [1e16, 1.0, 1.0, 1.0, 1.0];
        let records: Vec<TransactionRecord> = amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| order(&format!("O{}", i), 1, amount, "ann", vec![]))
            .collect();
        let refs: Vec<&TransactionRecord> = records.iter().collect();

        let kpis = compute_kpis(&refs, at(2025, 1, 31));
        let top = DashboardAggregator::new().top_customers(&refs);

        assert_eq!(top.len(), 1);
        assert_eq!(top[0].metric_revenue, kpis.total_revenue);
        assert_eq!(top[0].metric_revenue, 1e16 + 4.0);
    }

    #[test]
    fn test_rankings_truncate_to_ten() {
        let records: Vec<TransactionRecord> = (0..15)
            .map(|i| order(&format!("O{}", i), 1, 10.0 + i as f64, &format!("c{}", i), vec![]))
            .collect();

        let payload = DashboardAggregator::new()
            .summarize(&records, &records, at(2025, 1, 31))
            .unwrap();

        assert_eq!(payload.top_customers.len(), DEFAULT_TOP_N);
        assert_eq!(payload.top_customers[0].name, "c14");
        assert_eq!(payload.top_customers[9].name, "c5");
    }

    #[test]
    fn test_status_breakdown_counts_every_record() {
        let all = vec![
            create_test_record("A", Some(at(2025, 1, 1)), 1.0, OrderStatus::Confirmed, "a"),
            create_test_record("B", None, 1.0, OrderStatus::Draft, "a"),
            create_test_record("C", None, 1.0, OrderStatus::Draft, "a"),
            create_test_record("D", None, 1.0, OrderStatus::Other("on_hold".to_string()), "a"),
            create_test_record("E", Some(at(2025, 1, 1)), 1.0, OrderStatus::Locked, "a"),
            create_test_record("F", None, 1.0, OrderStatus::Sent, "a"),
            create_test_record("G", None, 1.0, OrderStatus::Cancelled, "a"),
        ];

        let breakdown = status_breakdown(&all);
        let total: usize = breakdown.iter().map(|s| s.count).sum();
        assert_eq!(total, all.len());

        let labels: Vec<&str> = breakdown.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Sales Order", "Quotation", "on_hold", "Locked", "Quotation Sent", "Cancelled"]
        );
        assert_eq!(breakdown[1].count, 2);
    }

    #[test]
    fn test_revenue_chart_keeps_last_twelve_months() {
        let records: Vec<TransactionRecord> = (0..14u32)
            .map(|i| {
                let period = YearMonth::new(2024, 1).unwrap().plus_months(i);
                create_test_record(
                    &format!("O{}", i),
                    Some(at(period.year, period.month, 5)),
                    100.0 * (i + 1) as f64,
                    OrderStatus::Confirmed,
                    "a",
                )
            })
            .collect();

        let payload = DashboardAggregator::new()
            .summarize(&records, &records, at(2025, 2, 28))
            .unwrap();
        let chart = payload.monthly_revenue_chart;

        assert_eq!(chart.labels.len(), 12);
        assert_eq!(chart.labels.first().unwrap(), "2024-03");
        assert_eq!(chart.labels.last().unwrap(), "2025-02");
        assert_eq!(chart.data.last().copied(), Some(1400.0));
    }
}
