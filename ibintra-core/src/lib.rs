//! ibintra core — intraday bar downloads from a brokerage gateway to CSV.
//!
//! - Window planner: splits a symbol's history into bounded requests
//! - Row transformer: reshapes each raw batch into the fixed CSV layout
//! - Data source trait plus the blocking gateway adapter
//! - Batch driver: one request at a time, failed windows skipped and reported
//! - Instrument catalog and TOML configuration

pub mod catalog;
pub mod config;
pub mod download;
pub mod instrument;
pub mod plan;
pub mod source;
pub mod transform;

pub use catalog::{Catalog, CatalogError};
pub use config::{AccountMode, AppConfig, ConfigError, GatewayConfig};
pub use download::{
    download_historical, download_recent, run_plan, DownloadError, DownloadOptions, RunReport,
    WindowOutcome,
};
pub use instrument::{FieldSelector, InstrumentClass, SymbolInfo};
pub use plan::{plan_historical, plan_recent, PlanError, RequestDescriptor};
pub use source::{GatewaySession, HistoricalDataSource, RawBar, SourceError};
pub use transform::{clamp_volume, split_timestamp, transform, TransformError};
