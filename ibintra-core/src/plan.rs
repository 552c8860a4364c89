//! Window planner — splits a symbol's history into sequential bounded requests.
//!
//! Plans are ordered newest to oldest. The historical plan walks back through
//! fixed calendar checkpoints; the recent plan is a single window ending now.

use crate::instrument::{FieldSelector, InstrumentClass, SymbolInfo};
use chrono::NaiveDate;
use thiserror::Error;

/// Bar size used for every intraday request.
pub const BAR_SIZE: &str = "1 hour";

/// Largest lookback the source serves in one request, in days.
pub const MAX_RECENT_DAYS: u32 = 360;

/// Duration of each historical window.
pub const HISTORICAL_DURATION: &str = "360 D";

/// End timestamps of the historical plan, newest first. `None` means "now".
///
/// These are fixed dates, not offsets from today. The last entry is the
/// oldest window the source still serves.
pub const HISTORICAL_CHECKPOINTS: [Option<&str>; 10] = [
    None,
    Some("20170410 06:00:00"),
    Some("20151120 08:00:00"),
    Some("20140720 08:00:00"),
    Some("20130319 08:00:00"),
    Some("20111117 08:00:00"),
    Some("20100716 08:00:00"),
    Some("20090306 08:00:00"),
    Some("20071105 08:00:00"),
    Some("20060705 08:00:00"),
];

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("day count {0} is outside [0, 360]")]
    DayCountOutOfRange(i64),

    #[error("{selector} is not available for {class} instruments")]
    UnsupportedSelector {
        class: InstrumentClass,
        selector: FieldSelector,
    },
}

/// One bounded history request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    class: InstrumentClass,
    symbol: String,
    end_timestamp: Option<String>,
    duration: String,
    bar_size: String,
    field_selector: FieldSelector,
    display_name: String,
    venue: String,
    currency: String,
    conid: Option<i64>,
}

impl RequestDescriptor {
    /// Build a descriptor, rejecting selectors the class cannot be served with.
    pub fn new(
        info: &SymbolInfo,
        class: InstrumentClass,
        end_timestamp: Option<&str>,
        duration: &str,
        bar_size: &str,
        field_selector: FieldSelector,
    ) -> Result<Self, PlanError> {
        if !class.supports(field_selector) {
            return Err(PlanError::UnsupportedSelector {
                class,
                selector: field_selector,
            });
        }
        Ok(Self {
            class,
            symbol: info.symbol.clone(),
            end_timestamp: end_timestamp.filter(|ts| !ts.is_empty()).map(String::from),
            duration: duration.to_string(),
            bar_size: bar_size.to_string(),
            field_selector,
            display_name: info.full_name.clone(),
            venue: info.exchange.clone(),
            currency: info.currency.clone(),
            conid: info.conid,
        })
    }

    pub fn class(&self) -> InstrumentClass {
        self.class
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// `None` requests the most recent window.
    pub fn end_timestamp(&self) -> Option<&str> {
        self.end_timestamp.as_deref()
    }

    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn bar_size(&self) -> &str {
        &self.bar_size
    }

    pub fn field_selector(&self) -> FieldSelector {
        self.field_selector
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn conid(&self) -> Option<i64> {
        self.conid
    }

    /// The symbol in the shape the instrument class expects.
    pub fn symbol_info(&self) -> SymbolInfo {
        SymbolInfo {
            symbol: self.symbol.clone(),
            full_name: self.display_name.clone(),
            exchange: self.venue.clone(),
            currency: self.currency.clone(),
            conid: self.conid,
        }
    }

    /// Deterministic output filename for this window.
    ///
    /// `{symbol}_{bar_size}_{duration}_{end}.csv` with spaces and colons
    /// replaced by underscores. A most-recent window has an empty end part,
    /// or `download{YYYY-MM-DD}` when a start marker is given.
    pub fn csv_filename(&self, start_marker: Option<NaiveDate>) -> String {
        let end = match &self.end_timestamp {
            Some(ts) => ts.clone(),
            None => start_marker
                .map(|date| format!("download{}", date.format("%Y-%m-%d")))
                .unwrap_or_default(),
        };
        format!(
            "{}_{}_{}_{}.csv",
            self.symbol, self.bar_size, self.duration, end
        )
        .replace([' ', ':'], "_")
    }
}

/// Single window covering the last `day_count` days.
pub fn plan_recent(
    info: &SymbolInfo,
    class: InstrumentClass,
    day_count: i64,
) -> Result<Vec<RequestDescriptor>, PlanError> {
    if !(0..=i64::from(MAX_RECENT_DAYS)).contains(&day_count) {
        return Err(PlanError::DayCountOutOfRange(day_count));
    }
    let duration = format!("{day_count} D");
    let descriptor = RequestDescriptor::new(
        info,
        class,
        None,
        &duration,
        BAR_SIZE,
        class.field_selector(),
    )?;
    Ok(vec![descriptor])
}

/// Ten fixed windows reaching back to the oldest checkpoint.
pub fn plan_historical(info: &SymbolInfo, class: InstrumentClass) -> Vec<RequestDescriptor> {
    HISTORICAL_CHECKPOINTS
        .iter()
        .map(|end| RequestDescriptor {
            class,
            symbol: info.symbol.clone(),
            end_timestamp: end.map(String::from),
            duration: HISTORICAL_DURATION.to_string(),
            bar_size: BAR_SIZE.to_string(),
            field_selector: class.field_selector(),
            display_name: info.full_name.clone(),
            venue: info.exchange.clone(),
            currency: info.currency.clone(),
            conid: info.conid,
        })
        .collect()
}
