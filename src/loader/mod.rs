pub mod discovery;
pub mod ingest;
pub mod workbook;

pub use discovery::{SalesSource, discover_sales_files, latest_inventory_file, period_from_filename};
pub use ingest::{IngestEngine, InventoryIngest, SalesIngest};
pub use workbook::read_workbook;
