//! Market-data source trait and structured error types.
//!
//! The HistoricalDataSource trait abstracts over the brokerage gateway so the
//! batch driver can run against a mock in tests.

pub mod gateway;

pub use gateway::GatewaySession;

use crate::plan::RequestDescriptor;
use thiserror::Error;

/// One bar as returned by the source, before the row transform.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    /// Combined `YYYY-MM-DD HH:MM:SS` timestamp.
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// May be negative for midpoint bars; the transform clamps it.
    pub volume: f64,
    pub average: Option<f64>,
    pub bar_count: Option<i64>,
}

/// Failures raised by the data source for a single request.
///
/// The batch driver logs these and moves on to the next window.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("no contract found for {symbol} ({sec_type})")]
    ContractNotFound { symbol: String, sec_type: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no data: {0}")]
    NoData(String),
}

/// Something that can serve one window of historical bars.
pub trait HistoricalDataSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the bars for one request window. Blocks until the response arrives.
    fn fetch_bars(&self, request: &RequestDescriptor) -> Result<Vec<RawBar>, SourceError>;
}
