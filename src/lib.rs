//! Normalization and aggregation core for the ERP sales/inventory
//! dashboard: loads monthly 銷貨單毛利分析表 exports and BC product
//! snapshots, repairs their structural irregularities (banner rows,
//! sparse order headers, locale-formatted numbers, ROC dates), and
//! produces per-product / per-month aggregates joined against inventory.
//!
//! The presentation layer consumes the typed results and DataFrames
//! produced here; it is not part of this crate.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod processor;
