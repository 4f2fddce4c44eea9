use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::error::IngestError;
use crate::models::{RawTable, RawValue};
use crate::processor::columns;

// Exports sometimes carry a banner/title block above the real header row;
// the header is located by its 產品代號 anchor within the first few rows.
const HEADER_SCAN_ROWS: usize = 10;
const HEADER_ANCHOR: &str = columns::PRODUCT_ID;

/// Reads the first sheet of a workbook into a [`RawTable`].
pub fn read_workbook(path: &Path) -> Result<RawTable, IngestError> {
    let display = path.display().to_string();

    let mut workbook = open_workbook_auto(path).map_err(|source| IngestError::Workbook {
        path: display.clone(),
        source,
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::EmptyWorkbook {
            path: display.clone(),
        })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| IngestError::Workbook {
            path: display.clone(),
            source,
        })?;

    let rows: Vec<Vec<RawValue>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_value).collect())
        .collect();

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or(display);

    rows_to_table(source_name, rows)
}

/// Builds a table from already-extracted rows: locates the header row by
/// anchor, names columns from it, and keeps everything below as data.
pub fn rows_to_table(
    source: impl Into<String>,
    rows: Vec<Vec<RawValue>>,
) -> Result<RawTable, IngestError> {
    let source = source.into();

    let header_row = rows
        .iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| {
            row.iter()
                .any(|cell| cell.as_text() == Some(HEADER_ANCHOR))
        })
        .ok_or_else(|| IngestError::HeaderNotFound {
            path: source.clone(),
            anchor: HEADER_ANCHOR,
        })?;

    let headers: Vec<String> = rows[header_row]
        .iter()
        .map(|cell| cell.display().trim().to_string())
        .collect();

    let mut table = RawTable::new(source, headers);
    for row in rows.into_iter().skip(header_row + 1) {
        if row.iter().all(|c| c.is_missing()) {
            continue;
        }
        table.push_row(row);
    }
    Ok(table)
}

fn cell_to_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Missing,
        Data::String(s) => {
            if s.trim().is_empty() {
                RawValue::Missing
            } else {
                RawValue::Text(s.clone())
            }
        }
        Data::Int(i) => RawValue::Numeric(Decimal::from(*i)),
        Data::Float(f) => match Decimal::from_f64(*f) {
            Some(d) => RawValue::Numeric(d),
            None => RawValue::Missing,
        },
        // date cells come over as serial days; the date normalizer
        // interprets them
        Data::DateTime(dt) => match Decimal::from_f64(dt.as_f64()) {
            Some(d) => RawValue::Numeric(d),
            None => RawValue::Missing,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        Data::Error(_) => RawValue::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_value(&Data::Empty), RawValue::Missing);
        assert_eq!(
            cell_to_value(&Data::String("  ".to_string())),
            RawValue::Missing
        );
        assert_eq!(
            cell_to_value(&Data::String("1,000".to_string())),
            text("1,000")
        );
        assert_eq!(cell_to_value(&Data::Int(7)), RawValue::Numeric(dec!(7)));
        assert_eq!(
            cell_to_value(&Data::Float(12.5)),
            RawValue::Numeric(dec!(12.5))
        );
        assert_eq!(cell_to_value(&Data::Bool(true)), text("true"));
    }

    #[test]
    fn test_header_found_under_banner_rows() {
        let rows = vec![
            vec![text("銷貨單毛利分析表"), RawValue::Missing],
            vec![RawValue::Missing, RawValue::Missing],
            vec![text("產品代號"), text("數量")],
            vec![text("P1"), RawValue::Numeric(dec!(3))],
        ];
        let table = rows_to_table("a.xlsx", rows).unwrap();
        assert_eq!(table.headers(), &["產品代號", "數量"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.value(0, "產品代號"), &text("P1"));
    }

    #[test]
    fn test_blank_data_rows_skipped() {
        let rows = vec![
            vec![text("產品代號"), text("數量")],
            vec![RawValue::Missing, RawValue::Missing],
            vec![text("P1"), RawValue::Numeric(dec!(1))],
        ];
        let table = rows_to_table("a.xlsx", rows).unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_missing_anchor_is_header_not_found() {
        let rows = vec![vec![text("totally"), text("unrelated")]];
        let err = rows_to_table("a.xlsx", rows).unwrap_err();
        assert!(matches!(err, IngestError::HeaderNotFound { .. }));
    }
}
