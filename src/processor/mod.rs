pub mod dates;
pub mod numeric;
pub mod order_filler;
pub mod schema;

pub use dates::normalize_date;
pub use numeric::{parse_decimal, parse_quantity};
pub use order_filler::{ORDER_SCOPED_COLUMNS, fill_order_columns};
pub use schema::{DataKind, FileSchema, INVENTORY_SCHEMA, SALES_SCHEMA, columns};
