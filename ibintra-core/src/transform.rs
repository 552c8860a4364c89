//! Row transformer — reshapes one raw batch into the fixed CSV layout.
//!
//! Output columns, in order: `full_name, ticker, date, time, open, high, low,
//! close, volume`. The date loses its dashes, the combined timestamp is split
//! at the first space and negative volumes are clamped to zero.

use crate::source::RawBar;
use polars::prelude::*;

/// Column layout of a normalized batch. This is the on-disk contract.
pub const OUTPUT_COLUMNS: [&str; 9] = [
    "full_name",
    "ticker",
    "date",
    "time",
    "open",
    "high",
    "low",
    "close",
    "volume",
];

/// Columns a raw batch must carry.
pub const REQUIRED_PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// Combined "date time" column in a raw batch.
pub const TIMESTAMP_COLUMN: &str = "date";

pub const VOLUME_COLUMN: &str = "volume";

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("raw batch is missing required column '{0}'")]
    MissingColumn(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// `max(0, v)`; NaN counts as zero.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume > 0.0 {
        volume
    } else {
        0.0
    }
}

/// Split `"YYYY-MM-DD HH:MM:SS"` at the first space into `("YYYYMMDD", Some("HH:MM:SS"))`.
///
/// A stamp without a space (daily bars) has no time part.
pub fn split_timestamp(stamp: &str) -> (String, Option<String>) {
    match stamp.split_once(' ') {
        Some((date, time)) => (compact_date(date), Some(time.to_string())),
        None => (compact_date(stamp), None),
    }
}

fn compact_date(date: &str) -> String {
    date.replace('-', "")
}

/// Normalize a raw batch for one symbol.
///
/// Fails with [`TransformError::MissingColumn`] when any of open/high/low/close
/// is absent. Extra columns are dropped. A missing timestamp column gives null
/// date and time; a missing volume column gives zero volume. Row order is kept.
pub fn transform(
    raw: &DataFrame,
    full_name: &str,
    ticker: &str,
) -> Result<DataFrame, TransformError> {
    for name in REQUIRED_PRICE_COLUMNS {
        if raw.column(name).is_err() {
            return Err(TransformError::MissingColumn(name.to_string()));
        }
    }

    let height = raw.height();
    let (dates, times) = split_timestamp_column(raw)?;
    let volumes = clamped_volumes(raw)?;

    let mut columns = Vec::with_capacity(OUTPUT_COLUMNS.len());
    columns.push(Column::new("full_name".into(), vec![full_name; height]));
    columns.push(Column::new("ticker".into(), vec![ticker; height]));
    columns.push(Column::new("date".into(), dates));
    columns.push(Column::new("time".into(), times));
    for name in REQUIRED_PRICE_COLUMNS {
        columns.push(raw.column(name)?.cast(&DataType::Float64)?);
    }
    columns.push(Column::new(VOLUME_COLUMN.into(), volumes));

    Ok(DataFrame::new(columns)?)
}

fn split_timestamp_column(
    raw: &DataFrame,
) -> Result<(Vec<Option<String>>, Vec<Option<String>>), TransformError> {
    let height = raw.height();
    let Ok(stamps) = raw.column(TIMESTAMP_COLUMN) else {
        return Ok((vec![None; height], vec![None; height]));
    };

    let stamps = stamps.cast(&DataType::String)?;
    let mut dates = Vec::with_capacity(height);
    let mut times = Vec::with_capacity(height);
    for stamp in stamps.as_materialized_series().str()?.into_iter() {
        match stamp {
            Some(stamp) => {
                let (date, time) = split_timestamp(stamp);
                dates.push(Some(date));
                times.push(time);
            }
            None => {
                dates.push(None);
                times.push(None);
            }
        }
    }
    Ok((dates, times))
}

fn clamped_volumes(raw: &DataFrame) -> Result<Vec<f64>, TransformError> {
    let Ok(volume) = raw.column(VOLUME_COLUMN) else {
        return Ok(vec![0.0; raw.height()]);
    };
    let volume = volume.cast(&DataType::Float64)?;
    Ok(volume
        .f64()?
        .into_iter()
        .map(|v| clamp_volume(v.unwrap_or(0.0)))
        .collect())
}

/// Lay out a source batch the way the source names its fields.
pub fn bars_to_frame(bars: &[RawBar]) -> Result<DataFrame, TransformError> {
    let dates: Vec<&str> = bars.iter().map(|b| b.date.as_str()).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let averages: Vec<Option<f64>> = bars.iter().map(|b| b.average).collect();
    let bar_counts: Vec<Option<i64>> = bars.iter().map(|b| b.bar_count).collect();

    Ok(DataFrame::new(vec![
        Column::new(TIMESTAMP_COLUMN.into(), dates),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new(VOLUME_COLUMN.into(), volumes),
        Column::new("average".into(), averages),
        Column::new("barCount".into(), bar_counts),
    ])?)
}
