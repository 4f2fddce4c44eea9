use crate::models::{RawTable, RawValue};
use crate::processor::schema::columns;

/// Columns whose value is constant across all lines of one sales order.
/// The export populates them only on the first line of each order.
pub const ORDER_SCOPED_COLUMNS: &[&str] = &[
    columns::ORDER_ID,
    columns::ORDER_REF,
    columns::ORDER_DATE,
    columns::CUSTOMER_ID,
    columns::CUSTOMER_NAME,
    columns::DEPT_ID,
    columns::DEPT_NAME,
    columns::INVOICE_NO,
    columns::SUBTOTAL_BEFORE_TAX,
    columns::SALES_TAX,
    columns::ALLOWANCE,
    columns::PRETAX_DISCOUNT,
    columns::ORDER_TOTAL,
    columns::AMOUNT_RECEIVED,
    columns::ORDER_COST,
    columns::ORDER_MARGIN,
    columns::ORDER_MARGIN_PCT,
];

/// Repairs the sparse-header layout in place: a non-missing 銷貨單號 seeds
/// the current-order state, and every following line with it missing
/// copies the missing order-scoped cells from that state.
///
/// Runs as a single fold over rows in original file order. Rows of one
/// order must be contiguous in the source file; if they are not, lines
/// are misattributed to the nearest preceding order (known limitation of
/// the export format, not detectable here).
pub fn fill_order_columns(table: &mut RawTable) {
    let scoped: Vec<usize> = ORDER_SCOPED_COLUMNS
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();

    if scoped.is_empty() {
        return;
    }

    match table.column_index(columns::ORDER_ID) {
        Some(order_col) => fill_grouped(table, order_col, &scoped),
        // No order identifier at all: plain forward fill per column.
        None => fill_columns_independently(table, &scoped),
    }
}

fn fill_grouped(table: &mut RawTable, order_col: usize, scoped: &[usize]) {
    let mut state: Option<Vec<RawValue>> = None;

    for row in 0..table.row_count() {
        let starts_order = !table.rows()[row][order_col].is_missing();

        if starts_order {
            state = Some(scoped.iter().map(|&c| table.rows()[row][c].clone()).collect());
            continue;
        }

        if let Some(current) = &state {
            for (i, &col) in scoped.iter().enumerate() {
                if table.rows()[row][col].is_missing() {
                    table.set_value(row, col, current[i].clone());
                }
            }
        }
    }
}

fn fill_columns_independently(table: &mut RawTable, scoped: &[usize]) {
    for &col in scoped {
        let mut last: Option<RawValue> = None;
        for row in 0..table.row_count() {
            if table.rows()[row][col].is_missing() {
                if let Some(v) = &last {
                    table.set_value(row, col, v.clone());
                }
            } else {
                last = Some(table.rows()[row][col].clone());
            }
        }
    }
}
