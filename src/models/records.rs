use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A calendar year-month bucket. Orders by calendar position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Period { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid period '{s}', expected YYYY-MM"))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in '{s}'"))?;
        Period::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

/// One product line of one sales invoice, fully reconstructed and typed.
/// Immutable once ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesLineItem {
    pub order_id: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub invoice_no: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub unit: Option<String>,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub line_subtotal: Option<Decimal>,
    pub line_cost: Option<Decimal>,
    /// Invoice-level grand total (總計金額), identical on every line of the
    /// order after reconstruction.
    pub order_total: Option<Decimal>,
    /// Invoice-level gross margin (毛利), likewise order-scoped.
    pub order_margin: Option<Decimal>,
    pub source_period: Period,
}

impl SalesLineItem {
    /// Line-level gross margin: subtotal minus cost, when both are known.
    pub fn gross_margin(&self) -> Option<Decimal> {
        match (self.line_subtotal, self.line_cost) {
            (Some(s), Some(c)) => Some(s - c),
            _ => None,
        }
    }
}

/// One product's stock snapshot from the BC products export.
/// Point-in-time: rebuilt on every load, never merged across snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    pub product_id: String,
    pub product_name: String,
    pub warehouse: Option<String>,
    pub unit: Option<String>,
    pub quantity_on_hand: i64,
    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub safety_stock: Option<Decimal>,
    pub vendor: Option<String>,
    pub category_major: Option<String>,
    pub category_mid: Option<String>,
    pub category_minor: Option<String>,
    pub is_delisted: bool,
    pub last_restock_date: Option<NaiveDate>,
}

impl InventoryRecord {
    pub fn in_stock(&self) -> bool {
        self.quantity_on_hand > 0
    }

    /// Positive stock below the configured safety threshold.
    pub fn is_low_stock(&self) -> bool {
        match self.safety_stock {
            Some(threshold) => {
                self.quantity_on_hand > 0 && Decimal::from(self.quantity_on_hand) < threshold
            }
            None => false,
        }
    }
}

/// All ingested sales lines across every loaded period, deduplicated.
///
/// Read-only after construction: the aggregation engine and any derived
/// views only ever borrow it. The version id changes on every build and is
/// the dataset component of external cache keys.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedSalesDataset {
    version: Uuid,
    rows: Vec<SalesLineItem>,
}

impl UnifiedSalesDataset {
    pub fn new(rows: Vec<SalesLineItem>) -> Self {
        UnifiedSalesDataset {
            version: Uuid::new_v4(),
            rows,
        }
    }

    pub fn version(&self) -> Uuid {
        self.version
    }

    pub fn rows(&self) -> &[SalesLineItem] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every source period present in the dataset, in calendar order.
    pub fn periods(&self) -> BTreeSet<Period> {
        self.rows.iter().map(|r| r.source_period).collect()
    }
}
