use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::aggregate::engine::{JoinedProduct, PeriodAggregate, ProductTotals};
use crate::models::Period;

fn money(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(f64::NAN)
}

fn money_opt(d: Option<Decimal>) -> Option<f64> {
    d.and_then(|d| d.to_f64())
}

/// Per-product totals as a typed table, ready for rendering or export.
pub fn product_totals_frame(rows: &[ProductTotals]) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new(
            "product_id".into(),
            rows.iter().map(|r| r.product_id.clone()).collect::<Vec<String>>(),
        )
        .into(),
        Series::new(
            "product_name".into(),
            rows.iter()
                .map(|r| r.product_name.clone())
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
        Series::new(
            "unit".into(),
            rows.iter().map(|r| r.unit.clone()).collect::<Vec<Option<String>>>(),
        )
        .into(),
        Series::new(
            "total_quantity".into(),
            rows.iter().map(|r| r.total_quantity).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            "total_revenue".into(),
            rows.iter().map(|r| money(r.total_revenue)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "total_cost".into(),
            rows.iter().map(|r| money(r.total_cost)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "gross_margin".into(),
            rows.iter().map(|r| money(r.gross_margin)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "avg_unit_price".into(),
            rows.iter()
                .map(|r| money_opt(r.avg_unit_price))
                .collect::<Vec<Option<f64>>>(),
        )
        .into(),
        Series::new(
            "unit_price_by_quantity".into(),
            rows.iter()
                .map(|r| money_opt(r.unit_price_by_quantity))
                .collect::<Vec<Option<f64>>>(),
        )
        .into(),
    ];

    DataFrame::new(columns).context("failed to build product totals frame")
}

/// Per-(product, period) breakdown in long form.
pub fn period_breakdown_frame(rows: &[PeriodAggregate]) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new(
            "product_id".into(),
            rows.iter().map(|r| r.product_id.clone()).collect::<Vec<String>>(),
        )
        .into(),
        Series::new(
            "period".into(),
            rows.iter().map(|r| r.period.to_string()).collect::<Vec<String>>(),
        )
        .into(),
        Series::new(
            "total_quantity_sold".into(),
            rows.iter().map(|r| r.total_quantity_sold).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            "total_revenue".into(),
            rows.iter().map(|r| money(r.total_revenue)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "total_cost".into(),
            rows.iter().map(|r| money(r.total_cost)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "gross_margin".into(),
            rows.iter().map(|r| money(r.gross_margin)).collect::<Vec<f64>>(),
        )
        .into(),
    ];

    DataFrame::new(columns).context("failed to build period breakdown frame")
}

/// The dashboard's product summary pivot: one row per product with the
/// familiar Chinese column labels, a `"<period> 數量"` / `"<period> 小計"`
/// pair per selected period, and an optional 庫存 column mapped from the
/// inventory snapshot. All figures are numeric columns so any sort on
/// them is by value, never by display string.
pub fn summary_pivot_frame(
    totals: &[ProductTotals],
    breakdown: &[PeriodAggregate],
    periods: &BTreeSet<Period>,
    stock_by_product: Option<&BTreeMap<String, i64>>,
) -> Result<DataFrame> {
    let mut per_period: BTreeMap<(&str, Period), (i64, f64)> = BTreeMap::new();
    for row in breakdown {
        per_period.insert(
            (row.product_id.as_str(), row.period),
            (row.total_quantity_sold, money(row.total_revenue)),
        );
    }

    let mut columns: Vec<Column> = vec![
        Series::new(
            "產品代號".into(),
            totals.iter().map(|r| r.product_id.clone()).collect::<Vec<String>>(),
        )
        .into(),
        Series::new(
            "產品名稱".into(),
            totals
                .iter()
                .map(|r| r.product_name.clone())
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
        Series::new(
            "數量".into(),
            totals.iter().map(|r| r.total_quantity).collect::<Vec<i64>>(),
        )
        .into(),
    ];

    if let Some(stock) = stock_by_product {
        // products absent from the snapshot show zero stock, as the
        // dashboard does
        columns.push(
            Series::new(
                "庫存".into(),
                totals
                    .iter()
                    .map(|r| stock.get(&r.product_id).copied().unwrap_or(0))
                    .collect::<Vec<i64>>(),
            )
            .into(),
        );
    }

    columns.push(
        Series::new(
            "單位".into(),
            totals.iter().map(|r| r.unit.clone()).collect::<Vec<Option<String>>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            "單價".into(),
            totals
                .iter()
                .map(|r| money_opt(r.avg_unit_price))
                .collect::<Vec<Option<f64>>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            "單價（數量）".into(),
            totals
                .iter()
                .map(|r| money_opt(r.unit_price_by_quantity))
                .collect::<Vec<Option<f64>>>(),
        )
        .into(),
    );

    for period in periods {
        let quantities: Vec<i64> = totals
            .iter()
            .map(|r| {
                per_period
                    .get(&(r.product_id.as_str(), *period))
                    .map(|(q, _)| *q)
                    .unwrap_or(0)
            })
            .collect();
        let revenues: Vec<f64> = totals
            .iter()
            .map(|r| {
                per_period
                    .get(&(r.product_id.as_str(), *period))
                    .map(|(_, rev)| *rev)
                    .unwrap_or(0.0)
            })
            .collect();
        columns.push(Series::new(format!("{period} 數量").into(), quantities).into());
        columns.push(Series::new(format!("{period} 小計").into(), revenues).into());
    }

    columns.push(
        Series::new(
            "小計".into(),
            totals.iter().map(|r| money(r.total_revenue)).collect::<Vec<f64>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            "成本總值".into(),
            totals.iter().map(|r| money(r.total_cost)).collect::<Vec<f64>>(),
        )
        .into(),
    );

    DataFrame::new(columns).context("failed to build summary pivot frame")
}

/// The outer-joined sales + inventory view.
pub fn joined_frame(rows: &[JoinedProduct]) -> Result<DataFrame> {
    let inv = |f: &dyn Fn(&crate::models::InventoryRecord) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter()
            .map(|r| r.inventory.as_ref().and_then(|i| f(i)))
            .collect()
    };

    let columns: Vec<Column> = vec![
        Series::new(
            "product_id".into(),
            rows.iter().map(|r| r.totals.product_id.clone()).collect::<Vec<String>>(),
        )
        .into(),
        Series::new(
            "product_name".into(),
            rows.iter()
                .map(|r| r.totals.product_name.clone())
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
        Series::new(
            "total_quantity".into(),
            rows.iter().map(|r| r.totals.total_quantity).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            "total_revenue".into(),
            rows.iter().map(|r| money(r.totals.total_revenue)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "total_cost".into(),
            rows.iter().map(|r| money(r.totals.total_cost)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "gross_margin".into(),
            rows.iter().map(|r| money(r.totals.gross_margin)).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "quantity_on_hand".into(),
            rows.iter()
                .map(|r| r.inventory.as_ref().map(|i| i.quantity_on_hand))
                .collect::<Vec<Option<i64>>>(),
        )
        .into(),
        Series::new(
            "warehouse".into(),
            rows.iter()
                .map(|r| r.inventory.as_ref().and_then(|i| i.warehouse.clone()))
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
        Series::new("unit_cost".into(), inv(&|i| money_opt(i.unit_cost))).into(),
        Series::new("safety_stock".into(), inv(&|i| money_opt(i.safety_stock))).into(),
        Series::new(
            "vendor".into(),
            rows.iter()
                .map(|r| r.inventory.as_ref().and_then(|i| i.vendor.clone()))
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
        Series::new(
            "category_major".into(),
            rows.iter()
                .map(|r| r.inventory.as_ref().and_then(|i| i.category_major.clone()))
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
        Series::new(
            "is_delisted".into(),
            rows.iter()
                .map(|r| r.inventory.as_ref().map(|i| i.is_delisted))
                .collect::<Vec<Option<bool>>>(),
        )
        .into(),
        Series::new(
            "in_inventory".into(),
            rows.iter().map(|r| r.inventory.is_some()).collect::<Vec<bool>>(),
        )
        .into(),
    ];

    DataFrame::new(columns).context("failed to build joined frame")
}

/// Numeric sort on any output column, descending.
pub fn sort_descending(df: &DataFrame, column: &str) -> Result<DataFrame> {
    df.sort(
        [column],
        SortMultipleOptions::default().with_order_descending(true),
    )
    .with_context(|| format!("failed to sort by {column}"))
}

pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn totals(id: &str, qty: i64, revenue: Decimal) -> ProductTotals {
        ProductTotals {
            product_id: id.to_string(),
            product_name: Some(format!("品名{id}")),
            unit: Some("個".to_string()),
            total_quantity: qty,
            total_revenue: revenue,
            total_cost: revenue / dec!(2),
            gross_margin: revenue / dec!(2),
            avg_unit_price: None,
            unit_price_by_quantity: None,
        }
    }

    #[test]
    fn test_totals_frame_shape() {
        let rows = vec![totals("P1", 3, dec!(500)), totals("P2", 1, dec!(100))];
        let df = product_totals_frame(&rows).unwrap();
        assert_eq!(df.height(), 2);
        assert!(df.column("total_revenue").is_ok());
        assert!(df.column("gross_margin").is_ok());
    }

    #[test]
    fn test_sort_is_numeric_not_lexicographic() {
        // "1,000" vs "999" as strings would sort the wrong way round;
        // the frame stores parsed numbers, so 1000 ranks first
        let rows = vec![totals("P1", 1, dec!(999)), totals("P2", 1, dec!(1000))];
        let df = product_totals_frame(&rows).unwrap();
        let sorted = sort_descending(&df, "total_revenue").unwrap();

        let revenue = sorted.column("total_revenue").unwrap().f64().unwrap();
        assert_eq!(revenue.get(0), Some(1000.0));
        assert_eq!(revenue.get(1), Some(999.0));
    }

    #[test]
    fn test_pivot_has_per_period_columns() {
        let rows = vec![totals("P1", 5, dec!(500))];
        let jan: Period = "2024-01".parse().unwrap();
        let feb: Period = "2024-02".parse().unwrap();
        let breakdown = vec![
            PeriodAggregate {
                product_id: "P1".to_string(),
                period: jan,
                total_quantity_sold: 2,
                total_revenue: dec!(200),
                total_cost: dec!(100),
                gross_margin: dec!(100),
            },
            PeriodAggregate {
                product_id: "P1".to_string(),
                period: feb,
                total_quantity_sold: 3,
                total_revenue: dec!(300),
                total_cost: dec!(150),
                gross_margin: dec!(150),
            },
        ];
        let periods: BTreeSet<Period> = [jan, feb].into_iter().collect();
        let stock: BTreeMap<String, i64> = [("P1".to_string(), 42)].into_iter().collect();

        let df = summary_pivot_frame(&rows, &breakdown, &periods, Some(&stock)).unwrap();
        assert_eq!(df.height(), 1);
        assert!(df.column("2024-01 數量").is_ok());
        assert!(df.column("2024-02 小計").is_ok());

        let stock_col = df.column("庫存").unwrap().i64().unwrap();
        assert_eq!(stock_col.get(0), Some(42));
        let jan_qty = df.column("2024-01 數量").unwrap().i64().unwrap();
        assert_eq!(jan_qty.get(0), Some(2));
    }

    #[test]
    fn test_joined_frame_nulls_for_missing_inventory() {
        let rows = vec![
            JoinedProduct {
                totals: totals("P1", 3, dec!(500)),
                inventory: None,
            },
        ];
        let df = joined_frame(&rows).unwrap();
        let on_hand = df.column("quantity_on_hand").unwrap().i64().unwrap();
        assert_eq!(on_hand.get(0), None);
        let in_inv = df.column("in_inventory").unwrap().bool().unwrap();
        assert_eq!(in_inv.get(0), Some(false));
    }
}
