// 🎲 Order Simulation - Synthetic sales history for demos
//
// Generates `months` of confirmed orders ending the month before `as_of`,
// with a small monthly growth factor so the forecast has a trend to find.
// Seeded, so the same config always yields the same orders.

use crate::period::YearMonth;
use crate::record::{LineItem, OrderStatus, TransactionRecord};
use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const DEMO_CUSTOMERS: [(&str, &str); 5] = [
    ("C-RETAIL", "Demo Customer - Retail Corp"),
    ("C-WHOLESALE", "Demo Customer - Wholesale Inc"),
    ("C-ENTERPRISE", "Demo Customer - Enterprise Ltd"),
    ("C-SMALLBIZ", "Demo Customer - Small Business"),
    ("C-STARTUP", "Demo Customer - Startup Hub"),
];

const DEMO_PRODUCTS: [(&str, f64); 5] = [
    ("Demo Product - Basic", 99.99),
    ("Demo Product - Standard", 249.99),
    ("Demo Product - Premium", 499.99),
    ("Demo Product - Enterprise", 999.99),
    ("Demo Service - Consulting", 150.00),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub months: u32,
    pub orders_per_month_min: u32,
    pub orders_per_month_max: u32,
    pub lines_per_order_min: usize,
    pub lines_per_order_max: usize,
    /// Added to the order-count multiplier for each later month
    pub monthly_growth: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            months: 12,
            orders_per_month_min: 3,
            orders_per_month_max: 8,
            lines_per_order_min: 1,
            lines_per_order_max: 5,
            monthly_growth: 0.05,
            seed: 42,
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn order_time(period: YearMonth, day: u32, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(period.year, period.month, day)?.and_hms_opt(hour, minute, 0)
}

pub fn generate_orders(config: &SimulationConfig, as_of: NaiveDateTime) -> Vec<TransactionRecord> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let current = YearMonth::from_datetime(&as_of);
    let mut records = Vec::new();

    let min_orders = config.orders_per_month_min.min(config.orders_per_month_max);
    let max_lines = config.lines_per_order_max.clamp(1, DEMO_PRODUCTS.len());
    let min_lines = config.lines_per_order_min.clamp(1, max_lines);

    for offset in (1..=config.months).rev() {
        let period = current.minus_months(offset);
        let growth = 1.0 + (config.months - offset) as f64 * config.monthly_growth;
        let base: u32 = rng.gen_range(min_orders..=config.orders_per_month_max.max(min_orders));
        let order_count = (base as f64 * growth) as u32;

        for _ in 0..order_count {
            let day = rng.gen_range(1..=28);
            let hour = rng.gen_range(8..=18);
            let minute = rng.gen_range(0..=59);
            let (customer_id, customer_name) = DEMO_CUSTOMERS[rng.gen_range(0..DEMO_CUSTOMERS.len())];

            let line_count = rng.gen_range(min_lines..=max_lines);
            let lines: Vec<LineItem> = DEMO_PRODUCTS
                .choose_multiple(&mut rng, line_count)
                .map(|(name, list_price)| {
                    let quantity = rng.gen_range(1..=10) as f64;
                    let unit_price = round_cents(list_price * rng.gen_range(0.9..=1.1));
                    LineItem {
                        product_name: Some(name.to_string()),
                        quantity,
                        line_revenue: round_cents(quantity * unit_price),
                    }
                })
                .collect();
            let amount = round_cents(lines.iter().map(|l| l.line_revenue).sum());

            records.push(TransactionRecord {
                order_ref: format!("SIM{:05}", records.len() + 1),
                timestamp: order_time(period, day, hour, minute),
                amount,
                status: OrderStatus::Confirmed,
                customer_id: customer_id.to_string(),
                customer_name: Some(customer_name.to_string()),
                lines,
            });
        }
    }

    tracing::info!(orders = records.len(), months = config.months, "Simulated order history");
    records
}
