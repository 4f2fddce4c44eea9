pub mod diagnostics;
pub mod records;
pub mod table;
pub mod value;

pub use diagnostics::{Diagnostic, IssueKind};
pub use records::{InventoryRecord, Period, SalesLineItem, UnifiedSalesDataset};
pub use table::RawTable;
pub use value::RawValue;
