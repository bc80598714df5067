// 🧾 Transaction Records - The input contract of the analytics core
//
// Records are plain values: validated once at the data-source boundary,
// then only read. Aggregation never mutates them.

use crate::error::{AnalyticsError, AnalyticsResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Label used when a product or customer has no display name
pub const UNKNOWN_NAME: &str = "Unknown";

// ============================================================================
// ORDER STATUS
// ============================================================================

/// Lifecycle status of an order.
///
/// Unknown raw values are kept as `Other` so newer upstream states
/// flow through the status breakdown instead of failing the import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Draft,
    Sent,
    Confirmed,
    Locked,
    Cancelled,
    Other(String),
}

impl OrderStatus {
    /// Parse a raw status. Accepts the ERP spellings (sale/done/cancel) as aliases.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "draft" => OrderStatus::Draft,
            "sent" => OrderStatus::Sent,
            "confirmed" | "sale" => OrderStatus::Confirmed,
            "locked" | "done" => OrderStatus::Locked,
            "cancelled" | "cancel" => OrderStatus::Cancelled,
            _ => OrderStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_raw(&self) -> &str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Sent => "sent",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Locked => "locked",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Other(raw) => raw.as_str(),
        }
    }

    /// Human-readable label for the status breakdown chart
    pub fn label(&self) -> &str {
        match self {
            OrderStatus::Draft => "Quotation",
            OrderStatus::Sent => "Quotation Sent",
            OrderStatus::Confirmed => "Sales Order",
            OrderStatus::Locked => "Locked",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Other(raw) => raw.as_str(),
        }
    }

    /// Confirmed and locked orders count as revenue
    pub fn is_revenue(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Locked)
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        OrderStatus::from_raw(&raw)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_raw().to_string()
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_name: Option<String>,
    pub quantity: f64,
    pub line_revenue: f64,
}

impl LineItem {
    pub fn display_name(&self) -> &str {
        display_or_unknown(self.product_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// External order reference (used for import de-duplication)
    pub order_ref: String,
    pub timestamp: Option<NaiveDateTime>,
    pub amount: f64,
    pub status: OrderStatus,
    pub customer_id: String,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineItem>,
}

impl TransactionRecord {
    pub fn customer_display_name(&self) -> &str {
        display_or_unknown(self.customer_name.as_deref())
    }

    /// Confirmed/locked with a timestamp
    pub fn is_qualifying(&self) -> bool {
        self.status.is_revenue() && self.timestamp.is_some()
    }

    /// Shape check applied where records enter the system (store, CSV, API).
    pub fn validate(&self) -> AnalyticsResult<()> {
        let invalid = |reason: String| AnalyticsError::InvalidRecord {
            order_ref: self.order_ref.clone(),
            reason,
        };

        if self.customer_id.trim().is_empty() {
            return Err(invalid("customer_id is empty".to_string()));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(invalid(format!("amount must be non-negative, got {}", self.amount)));
        }
        for (position, line) in self.lines.iter().enumerate() {
            if !line.quantity.is_finite() || line.quantity < 0.0 {
                return Err(invalid(format!(
                    "line {} quantity must be non-negative, got {}",
                    position, line.quantity
                )));
            }
            if !line.line_revenue.is_finite() {
                return Err(invalid(format!("line {} revenue is not a number", position)));
            }
        }
        Ok(())
    }
}

fn display_or_unknown(name: Option<&str>) -> &str {
    match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => UNKNOWN_NAME,
    }
}

// ============================================================================
// DATA SOURCE BOUNDARY
// ============================================================================

/// Status/timestamp filter understood by every record source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// None = any status
    pub statuses: Option<Vec<OrderStatus>>,
    pub require_timestamp: bool,
}

impl RecordQuery {
    /// Every record, whatever its status
    pub fn all() -> Self {
        RecordQuery::default()
    }

    /// Confirmed/locked orders with a timestamp
    pub fn qualifying() -> Self {
        RecordQuery {
            statuses: Some(vec![OrderStatus::Confirmed, OrderStatus::Locked]),
            require_timestamp: true,
        }
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if self.require_timestamp && record.timestamp.is_none() {
            return false;
        }
        match &self.statuses {
            Some(statuses) => statuses.contains(&record.status),
            None => true,
        }
    }
}

/// Read-only access to the external store of transaction records.
///
/// Implementations must return records in a stable order.
pub trait RecordSource {
    fn fetch_records(&self, query: &RecordQuery) -> anyhow::Result<Vec<TransactionRecord>>;
}

/// Snapshot held in memory (tests, CSV-only runs, simulated data)
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<TransactionRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        InMemorySource { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for InMemorySource {
    fn fetch_records(&self, query: &RecordQuery) -> anyhow::Result<Vec<TransactionRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_status_aliases_and_labels() {
        assert_eq!(OrderStatus::from_raw("sale"), OrderStatus::Confirmed);
        assert_eq!(OrderStatus::from_raw("DONE"), OrderStatus::Locked);
        assert_eq!(OrderStatus::from_raw("cancel"), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::Sent.label(), "Quotation Sent");

        let custom = OrderStatus::from_raw("on_hold");
        assert_eq!(custom, OrderStatus::Other("on_hold".to_string()));
        assert_eq!(custom.label(), "on_hold");
        assert!(!custom.is_revenue());
    }

    #[test]
    fn test_status_serde_uses_raw_value() {
        let json = serde_json::to_string(&OrderStatus::Locked).unwrap();
        assert_eq!(json, "\"locked\"");
        let parsed: OrderStatus = serde_json::from_str("\"sale\"").unwrap();
        assert_eq!(parsed, OrderStatus::Confirmed);
    }

    #[test]
    fn test_qualifying_requires_status_and_timestamp() {
        let ok = create_test_record("A", Some(at(2025, 1, 5)), 10.0, OrderStatus::Confirmed, "x");
        let no_time = create_test_record("B", None, 10.0, OrderStatus::Locked, "x");
        let draft = create_test_record("C", Some(at(2025, 1, 5)), 10.0, OrderStatus::Draft, "x");

        assert!(ok.is_qualifying());
        assert!(!no_time.is_qualifying());
        assert!(!draft.is_qualifying());

        let query = RecordQuery::qualifying();
        assert!(query.matches(&ok));
        assert!(!query.matches(&no_time));
        assert!(!query.matches(&draft));
        assert!(RecordQuery::all().matches(&no_time));
    }

    #[test]
    fn test_validate_rejects_negative_amount_and_quantity() {
        let mut record = create_test_record("A", Some(at(2025, 1, 5)), -1.0, OrderStatus::Confirmed, "x");
        assert!(matches!(
            record.validate(),
            Err(AnalyticsError::InvalidRecord { .. })
        ));

        record.amount = 5.0;
        record.lines.push(line(Some("Widget"), -2.0, 5.0));
        assert!(record.validate().is_err());

        record.lines[0].quantity = 2.0;
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_display_names_fall_back_to_unknown() {
        let mut record = create_test_record("A", None, 1.0, OrderStatus::Draft, "x");
        record.customer_name = None;
        assert_eq!(record.customer_display_name(), UNKNOWN_NAME);
        record.customer_name = Some("  ".to_string());
        assert_eq!(record.customer_display_name(), UNKNOWN_NAME);
        assert_eq!(line(None, 1.0, 1.0).display_name(), UNKNOWN_NAME);
    }

    #[test]
    fn test_in_memory_source_preserves_order() {
        let source = InMemorySource::new(vec![
            create_test_record("A", Some(at(2025, 2, 1)), 1.0, OrderStatus::Confirmed, "x"),
            create_test_record("B", Some(at(2025, 1, 1)), 1.0, OrderStatus::Draft, "x"),
            create_test_record("C", Some(at(2025, 3, 1)), 1.0, OrderStatus::Locked, "x"),
        ]);

        let qualifying = source.fetch_records(&RecordQuery::qualifying()).unwrap();
        let refs: Vec<_> = qualifying.iter().map(|r| r.order_ref.as_str()).collect();
        assert_eq!(refs, vec!["A", "C"]);
        assert_eq!(source.fetch_records(&RecordQuery::all()).unwrap().len(), 3);
    }
}
