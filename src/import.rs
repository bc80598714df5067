// 📂 CSV Import - Flat order-line rows → TransactionRecords
//
// One row per order line. Rows sharing an order_ref merge into one record;
// order-level fields come from the first row, lines keep row order.
//
//   order_ref,timestamp,amount,status,customer_id,customer_name,product_name,quantity,line_revenue
//   SO001,2025-01-10 09:30:00,150.00,sale,C1,Retail Corp,Widget,2,100.00
//   SO001,2025-01-10 09:30:00,150.00,sale,C1,Retail Corp,Gadget,1,50.00

use crate::record::{LineItem, OrderStatus, TransactionRecord};
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsvOrderLine {
    pub order_ref: String,
    pub timestamp: Option<String>,
    pub amount: f64,
    pub status: String,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Option<f64>,
    pub line_revenue: Option<f64>,
}

/// Accepts "YYYY-MM-DD HH:MM:SS" (optional fractional seconds), the ISO "T"
/// separator, or a bare date (midnight)
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    bail!("Unrecognized timestamp {:?}", raw)
}

/// Merge flat rows into records, preserving first-seen order
pub fn records_from_rows(rows: Vec<CsvOrderLine>) -> Result<Vec<TransactionRecord>> {
    let mut records: Vec<TransactionRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.order_ref) {
            Some(&slot) => {
                if records[slot].amount != row.amount {
                    warn!(
                        order_ref = %row.order_ref,
                        "Order rows disagree on amount, keeping the first"
                    );
                }
                slot
            }
            None => {
                let timestamp = match row.timestamp.as_deref().map(str::trim) {
                    Some(raw) if !raw.is_empty() => Some(
                        parse_timestamp(raw)
                            .with_context(|| format!("Order {}", row.order_ref))?,
                    ),
                    _ => None,
                };
                records.push(TransactionRecord {
                    order_ref: row.order_ref.clone(),
                    timestamp,
                    amount: row.amount,
                    status: OrderStatus::from_raw(&row.status),
                    customer_id: row.customer_id.clone(),
                    customer_name: row.customer_name.clone(),
                    lines: Vec::new(),
                });
                index.insert(row.order_ref.clone(), records.len() - 1);
                records.len() - 1
            }
        };

        // Order-only rows carry no line data
        if row.product_name.is_some() || row.quantity.is_some() || row.line_revenue.is_some() {
            records[slot].lines.push(LineItem {
                product_name: row.product_name,
                quantity: row.quantity.unwrap_or(0.0),
                line_revenue: row.line_revenue.unwrap_or(0.0),
            });
        }
    }

    for record in &records {
        record.validate()?;
    }

    Ok(records)
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<TransactionRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: CsvOrderLine = result.context("Failed to deserialize order line")?;
        rows.push(row);
    }

    records_from_rows(rows)
}

/// Flatten records back to rows (one per line, or one bare row for line-less orders)
pub fn write_csv(csv_path: &Path, records: &[TransactionRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create CSV file {}", csv_path.display()))?;

    for record in records {
        let base = CsvOrderLine {
            order_ref: record.order_ref.clone(),
            timestamp: record
                .timestamp
                .map(|ts| ts.format(crate::db::TIMESTAMP_FORMAT).to_string()),
            amount: record.amount,
            status: record.status.as_raw().to_string(),
            customer_id: record.customer_id.clone(),
            customer_name: record.customer_name.clone(),
            product_name: None,
            quantity: None,
            line_revenue: None,
        };

        if record.lines.is_empty() {
            wtr.serialize(&base)?;
        }
        for line in &record.lines {
            wtr.serialize(CsvOrderLine {
                product_name: line.product_name.clone(),
                quantity: Some(line.quantity),
                line_revenue: Some(line.line_revenue),
                ..base.clone()
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}
