use crate::error::IngestError;

/// Column names as they appear in the ERP exports. Column identity is by
/// header name, never by position.
pub mod columns {
    // 銷貨單毛利分析表 (sales invoice profit report), order-scoped fields
    pub const ORDER_ID: &str = "銷貨單號";
    pub const ORDER_REF: &str = "訂單單號";
    pub const ORDER_DATE: &str = "銷貨日期";
    pub const CUSTOMER_ID: &str = "客戶代號";
    pub const CUSTOMER_NAME: &str = "客戶名稱";
    pub const DEPT_ID: &str = "部門代號";
    pub const DEPT_NAME: &str = "部門名稱";
    pub const INVOICE_NO: &str = "發票號碼";
    pub const SUBTOTAL_BEFORE_TAX: &str = "未稅小計";
    pub const SALES_TAX: &str = "營業稅";
    pub const ALLOWANCE: &str = "折讓金額";
    pub const PRETAX_DISCOUNT: &str = "稅前折價";
    pub const ORDER_TOTAL: &str = "總計金額";
    pub const AMOUNT_RECEIVED: &str = "實收總額";
    pub const ORDER_COST: &str = "成本總額";
    pub const ORDER_MARGIN: &str = "毛利";
    pub const ORDER_MARGIN_PCT: &str = "毛利率";

    // sales report, line-scoped fields
    pub const PRODUCT_ID: &str = "產品代號";
    pub const PRODUCT_NAME: &str = "產品名稱";
    pub const QUANTITY: &str = "數量";
    pub const UNIT: &str = "單位";
    pub const UNIT_PRICE: &str = "單價";
    pub const LINE_SUBTOTAL: &str = "小計";
    pub const LINE_COST: &str = "成本總值";

    // BC 產品資料 (product/stock snapshot)
    pub const WAREHOUSE: &str = "倉庫";
    pub const UNIT_COST: &str = "成本單價";
    pub const TOTAL_COST: &str = "成本總價";
    pub const SAFETY_STOCK: &str = "安全存量";
    pub const VENDOR: &str = "廠商簡稱";
    pub const CATEGORY_MAJOR: &str = "大類名稱";
    pub const CATEGORY_MID: &str = "中類名稱";
    pub const CATEGORY_MINOR: &str = "小類名稱";
    pub const DELISTED: &str = "停售";
    pub const LAST_RESTOCK_DATE: &str = "最後進貨日";
}

/// Which kind of export a file claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Sales,
    Inventory,
}

/// Required-column schema for one data kind. Files missing any required
/// header fail closed before merge.
#[derive(Debug, Clone, Copy)]
pub struct FileSchema {
    pub kind: DataKind,
    pub required: &'static [&'static str],
}

pub const SALES_SCHEMA: FileSchema = FileSchema {
    kind: DataKind::Sales,
    required: &[
        columns::ORDER_ID,
        columns::ORDER_DATE,
        columns::CUSTOMER_ID,
        columns::CUSTOMER_NAME,
        columns::PRODUCT_ID,
        columns::PRODUCT_NAME,
        columns::QUANTITY,
        columns::UNIT_PRICE,
        columns::LINE_SUBTOTAL,
        columns::LINE_COST,
        columns::ORDER_TOTAL,
        columns::ORDER_MARGIN,
    ],
};

pub const INVENTORY_SCHEMA: FileSchema = FileSchema {
    kind: DataKind::Inventory,
    required: &[
        columns::PRODUCT_ID,
        columns::PRODUCT_NAME,
        columns::QUANTITY,
        columns::UNIT_COST,
    ],
};

impl FileSchema {
    /// Checks that every required header is present. Extra columns are
    /// fine; order is irrelevant.
    pub fn validate(&self, headers: &[String], source_name: &str) -> Result<(), IngestError> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|req| !headers.iter().any(|h| h == *req))
            .map(|req| req.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::SchemaMismatch {
                source_name: source_name.to_string(),
                missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sales_schema_accepts_superset() {
        let mut cols: Vec<String> = SALES_SCHEMA.required.iter().map(|s| s.to_string()).collect();
        cols.push("產品毛利".to_string());
        cols.push("精準毛利".to_string());
        assert!(SALES_SCHEMA.validate(&cols, "a.xlsx").is_ok());
    }

    #[test]
    fn test_missing_columns_fail_closed() {
        let cols = headers(&[columns::ORDER_ID, columns::PRODUCT_ID]);
        let err = SALES_SCHEMA.validate(&cols, "bad.xlsx").unwrap_err();
        match err {
            IngestError::SchemaMismatch { source_name, missing } => {
                assert_eq!(source_name, "bad.xlsx");
                assert!(missing.contains(&columns::QUANTITY.to_string()));
                assert!(!missing.contains(&columns::ORDER_ID.to_string()));
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_inventory_schema() {
        let cols = headers(&[
            columns::PRODUCT_ID,
            columns::PRODUCT_NAME,
            columns::QUANTITY,
            columns::UNIT_COST,
        ]);
        assert!(INVENTORY_SCHEMA.validate(&cols, "bc.xlsx").is_ok());
        assert!(
            INVENTORY_SCHEMA
                .validate(&headers(&[columns::PRODUCT_ID]), "bc.xlsx")
                .is_err()
        );
    }
}
