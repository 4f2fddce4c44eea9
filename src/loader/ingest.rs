use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::loader::discovery::SalesSource;
use crate::loader::workbook::read_workbook;
use crate::models::{
    Diagnostic, InventoryRecord, IssueKind, Period, RawTable, SalesLineItem, UnifiedSalesDataset,
};
use crate::processor::{
    INVENTORY_SCHEMA, SALES_SCHEMA, columns, fill_order_columns, normalize_date, parse_decimal,
    parse_quantity,
};

/// Loads source files on a bounded worker pool and merges the partial
/// results single-threaded. Per-file failures are isolated: a bad file
/// becomes a diagnostic entry, never an aborted run.
pub struct IngestEngine {
    max_workers: usize,
}

/// Result of a sales ingestion run. Zero usable data is a valid outcome:
/// an empty dataset plus a full diagnostics list.
#[derive(Debug)]
pub struct SalesIngest {
    pub dataset: UnifiedSalesDataset,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct InventoryIngest {
    pub records: Vec<InventoryRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

type SalesPartial = (Vec<SalesLineItem>, Vec<Diagnostic>);
type InventoryPartial = (Vec<InventoryRecord>, Vec<Diagnostic>);

impl IngestEngine {
    pub fn new(max_workers: usize) -> Self {
        IngestEngine {
            max_workers: max_workers.max(1),
        }
    }

    /// Loads every sales export concurrently (one worker per file, at most
    /// `max_workers` in flight) and merges them into the unified dataset.
    /// Merge order across periods is unspecified; chronology is recovered
    /// later from each row's own date and period tag.
    pub async fn ingest_sales(&self, sources: Vec<SalesSource>) -> SalesIngest {
        let total = sources.len();
        info!("loading {total} sales file(s) with up to {} workers", self.max_workers);

        let outcomes: Vec<(String, Result<SalesPartial, IngestError>)> = stream::iter(sources)
            .map(|src| async move {
                let name = src.file_name();
                let handle = tokio::task::spawn_blocking(move || load_sales_source(&src));
                let outcome = match handle.await {
                    Ok(result) => result,
                    Err(join_err) => Err(IngestError::Io(std::io::Error::other(format!(
                        "file load worker aborted: {join_err}"
                    )))),
                };
                (name, outcome)
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        merge_sales(outcomes)
    }

    /// Loads one inventory snapshot. Same isolation contract as sales:
    /// a bad file yields zero records plus diagnostics.
    pub async fn ingest_inventory(&self, path: &Path) -> InventoryIngest {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let owned: PathBuf = path.to_path_buf();

        let outcome = match tokio::task::spawn_blocking(move || load_inventory_file(&owned)).await {
            Ok(result) => result,
            Err(join_err) => Err(IngestError::Io(std::io::Error::other(format!(
                "file load worker aborted: {join_err}"
            )))),
        };

        match outcome {
            Ok((records, diagnostics)) => {
                info!("loaded {} inventory records from {name}", records.len());
                InventoryIngest {
                    records,
                    diagnostics,
                }
            }
            Err(e) => {
                warn!("excluding inventory file {name}: {e}");
                InventoryIngest {
                    records: Vec::new(),
                    diagnostics: vec![file_diagnostic(&name, &e)],
                }
            }
        }
    }
}

fn load_sales_source(src: &SalesSource) -> Result<SalesPartial, IngestError> {
    let mut table = read_workbook(&src.path)?;
    SALES_SCHEMA.validate(table.headers(), &src.file_name())?;
    fill_order_columns(&mut table);
    Ok(normalize_sales_table(&table, src.period))
}

fn load_inventory_file(path: &Path) -> Result<InventoryPartial, IngestError> {
    let table = read_workbook(path)?;
    INVENTORY_SCHEMA.validate(table.headers(), table.source())?;
    Ok(normalize_inventory_table(&table))
}

/// Converts a reconstructed raw table into typed line items. Field-level
/// parse failures coerce to missing and are recorded per (file, row,
/// column); they never drop the row.
pub fn normalize_sales_table(table: &RawTable, period: Period) -> SalesPartial {
    let mut items = Vec::with_capacity(table.row_count());
    let mut diagnostics = Vec::new();

    for row in 0..table.row_count() {
        let quantity = take_quantity(table, row, columns::QUANTITY, &mut diagnostics).unwrap_or(0);

        items.push(SalesLineItem {
            order_id: table.value(row, columns::ORDER_ID).as_key(),
            order_date: take_date(table, row, columns::ORDER_DATE, &mut diagnostics),
            customer_id: table.value(row, columns::CUSTOMER_ID).as_key(),
            customer_name: table.value(row, columns::CUSTOMER_NAME).as_key(),
            invoice_no: table.value(row, columns::INVOICE_NO).as_key(),
            product_id: table.value(row, columns::PRODUCT_ID).as_key(),
            product_name: table.value(row, columns::PRODUCT_NAME).as_key(),
            unit: table.value(row, columns::UNIT).as_key(),
            quantity,
            unit_price: take_decimal(table, row, columns::UNIT_PRICE, &mut diagnostics),
            line_subtotal: take_decimal(table, row, columns::LINE_SUBTOTAL, &mut diagnostics),
            line_cost: take_decimal(table, row, columns::LINE_COST, &mut diagnostics),
            order_total: take_decimal(table, row, columns::ORDER_TOTAL, &mut diagnostics),
            order_margin: take_decimal(table, row, columns::ORDER_MARGIN, &mut diagnostics),
            source_period: period,
        });
    }

    (items, diagnostics)
}

/// Converts a raw inventory table into typed records. product_id is the
/// unique key within one load: rows missing it are skipped, later
/// duplicates are dropped, both with diagnostics.
pub fn normalize_inventory_table(table: &RawTable) -> InventoryPartial {
    let mut records: Vec<InventoryRecord> = Vec::with_capacity(table.row_count());
    let mut diagnostics = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut missing_key = 0usize;
    let mut duplicates = 0usize;

    for row in 0..table.row_count() {
        let Some(product_id) = table.value(row, columns::PRODUCT_ID).as_key() else {
            missing_key += 1;
            continue;
        };
        if !seen.insert(product_id.clone()) {
            duplicates += 1;
            continue;
        }

        records.push(InventoryRecord {
            product_id,
            product_name: table
                .value(row, columns::PRODUCT_NAME)
                .as_key()
                .unwrap_or_default(),
            warehouse: table.value(row, columns::WAREHOUSE).as_key(),
            unit: table.value(row, columns::UNIT).as_key(),
            quantity_on_hand: take_quantity(table, row, columns::QUANTITY, &mut diagnostics)
                .unwrap_or(0),
            unit_cost: take_decimal(table, row, columns::UNIT_COST, &mut diagnostics),
            total_cost: take_decimal(table, row, columns::TOTAL_COST, &mut diagnostics),
            safety_stock: take_decimal(table, row, columns::SAFETY_STOCK, &mut diagnostics),
            vendor: table.value(row, columns::VENDOR).as_key(),
            category_major: table.value(row, columns::CATEGORY_MAJOR).as_key(),
            category_mid: table.value(row, columns::CATEGORY_MID).as_key(),
            category_minor: table.value(row, columns::CATEGORY_MINOR).as_key(),
            is_delisted: parse_flag(table.value(row, columns::DELISTED).as_key()),
            last_restock_date: take_date(table, row, columns::LAST_RESTOCK_DATE, &mut diagnostics),
        });
    }

    if missing_key > 0 {
        diagnostics.push(Diagnostic::new(
            table.source(),
            IssueKind::GroupingKeyMissing,
            format!("{missing_key} inventory row(s) without a 產品代號 skipped"),
        ));
    }
    if duplicates > 0 {
        diagnostics.push(Diagnostic::new(
            table.source(),
            IssueKind::DuplicateRow,
            format!("{duplicates} duplicate 產品代號 row(s) dropped, first occurrence kept"),
        ));
    }

    (records, diagnostics)
}

/// Single-threaded merge of per-file partials: collects diagnostics for
/// failed files, dedups rows by (order, product, period), and stamps a
/// fresh dataset version.
pub fn merge_sales(outcomes: Vec<(String, Result<SalesPartial, IngestError>)>) -> SalesIngest {
    let mut rows: Vec<SalesLineItem> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut seen: HashSet<(String, String, Period)> = HashSet::new();
    let mut loaded_files = 0usize;

    for (name, outcome) in outcomes {
        match outcome {
            Ok((items, mut diags)) => {
                loaded_files += 1;
                diagnostics.append(&mut diags);

                let mut dropped = 0usize;
                for item in items {
                    match (&item.order_id, &item.product_id) {
                        (Some(order), Some(product)) => {
                            let key = (order.clone(), product.clone(), item.source_period);
                            if seen.insert(key) {
                                rows.push(item);
                            } else {
                                dropped += 1;
                            }
                        }
                        // rows without a full key cannot be deduped; keep them
                        _ => rows.push(item),
                    }
                }

                if dropped > 0 {
                    diagnostics.push(Diagnostic::new(
                        &name,
                        IssueKind::DuplicateRow,
                        format!("{dropped} duplicate line(s) dropped during merge"),
                    ));
                }
            }
            Err(e) => {
                warn!("excluding {name}: {e}");
                diagnostics.push(file_diagnostic(&name, &e));
            }
        }
    }

    info!(
        "merged {} rows from {loaded_files} file(s), {} diagnostic(s)",
        rows.len(),
        diagnostics.len()
    );

    SalesIngest {
        dataset: UnifiedSalesDataset::new(rows),
        diagnostics,
    }
}

fn file_diagnostic(name: &str, error: &IngestError) -> Diagnostic {
    let issue = if error.is_schema_mismatch() {
        IssueKind::SchemaMismatch
    } else {
        IssueKind::ConcurrentLoadFailure
    };
    Diagnostic::new(name, issue, error.to_string())
}

fn take_decimal(
    table: &RawTable,
    row: usize,
    column: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Decimal> {
    match parse_decimal(table.value(row, column), column) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                table.source(),
                IssueKind::ParseError,
                format!("data row {}: {e}", row + 1),
            ));
            None
        }
    }
}

fn take_quantity(
    table: &RawTable,
    row: usize,
    column: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<i64> {
    match parse_quantity(table.value(row, column), column) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                table.source(),
                IssueKind::ParseError,
                format!("data row {}: {e}", row + 1),
            ));
            None
        }
    }
}

fn take_date(
    table: &RawTable,
    row: usize,
    column: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<NaiveDate> {
    match normalize_date(table.value(row, column), column) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                table.source(),
                IssueKind::ParseError,
                format!("data row {}: {e}", row + 1),
            ));
            None
        }
    }
}

fn parse_flag(value: Option<String>) -> bool {
    match value {
        Some(v) => matches!(
            v.trim().to_lowercase().as_str(),
            "y" | "v" | "1" | "true" | "是" | "停售"
        ),
        None => false,
    }
}
