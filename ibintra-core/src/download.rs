//! Batch download driver — runs a plan window by window and writes one CSV each.
//!
//! Strictly sequential. A source failure skips its window and the loop goes on;
//! transform and file errors abort the run.

use crate::instrument::{InstrumentClass, SymbolInfo};
use crate::plan::{plan_historical, plan_recent, PlanError, RequestDescriptor};
use crate::source::{HistoricalDataSource, SourceError};
use crate::transform::{bars_to_frame, transform, TransformError};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("transform failed for {file}: {source}")]
    Transform {
        file: String,
        source: TransformError,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode CSV {path}: {source}")]
    Encode { path: PathBuf, source: PolarsError },
}

/// Where files go and how most-recent windows are named.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    /// Adds `download{date}` to most-recent filenames.
    pub start_marker: Option<NaiveDate>,
}

impl DownloadOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            start_marker: None,
        }
    }

    pub fn with_start_marker(mut self, date: NaiveDate) -> Self {
        self.start_marker = Some(date);
        self
    }
}

/// Result of one window.
#[derive(Debug)]
pub enum WindowOutcome {
    Written {
        request: RequestDescriptor,
        path: PathBuf,
        rows: usize,
    },
    Failed {
        request: RequestDescriptor,
        file_name: String,
        error: SourceError,
    },
}

impl WindowOutcome {
    pub fn request(&self) -> &RequestDescriptor {
        match self {
            WindowOutcome::Written { request, .. } | WindowOutcome::Failed { request, .. } => {
                request
            }
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, WindowOutcome::Written { .. })
    }
}

/// Per-window outcomes of a run, in plan order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<WindowOutcome>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn written_paths(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                WindowOutcome::Written { path, .. } => Some(path.as_path()),
                WindowOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SourceError)> {
        self.outcomes.iter().filter_map(|o| match o {
            WindowOutcome::Failed {
                file_name, error, ..
            } => Some((file_name.as_str(), error)),
            WindowOutcome::Written { .. } => None,
        })
    }

    pub fn merge(&mut self, other: RunReport) {
        self.outcomes.extend(other.outcomes);
    }
}

/// Run a plan against a source, one window at a time.
pub fn run_plan(
    source: &dyn HistoricalDataSource,
    plan: &[RequestDescriptor],
    options: &DownloadOptions,
) -> Result<RunReport, DownloadError> {
    fs::create_dir_all(&options.output_dir).map_err(|source| DownloadError::Write {
        path: options.output_dir.clone(),
        source,
    })?;

    let mut report = RunReport::default();
    for (index, request) in plan.iter().enumerate() {
        let file_name = request.csv_filename(options.start_marker);
        tracing::info!(index, file = %file_name, source = source.name(), "downloading");

        let bars = match source.fetch_bars(request) {
            Ok(bars) => bars,
            Err(error) => {
                tracing::warn!(
                    index,
                    file = %file_name,
                    symbol = request.symbol(),
                    end = request.end_timestamp().unwrap_or("most recent"),
                    error = %error,
                    "window failed, skipping"
                );
                report.outcomes.push(WindowOutcome::Failed {
                    request: request.clone(),
                    file_name,
                    error,
                });
                continue;
            }
        };

        let mut frame = bars_to_frame(&bars)
            .and_then(|raw| transform(&raw, request.display_name(), request.symbol()))
            .map_err(|source| DownloadError::Transform {
                file: file_name.clone(),
                source,
            })?;

        let path = options.output_dir.join(&file_name);
        write_csv(&mut frame, &path)?;
        tracing::debug!(file = %file_name, rows = frame.height(), "window written");

        report.outcomes.push(WindowOutcome::Written {
            request: request.clone(),
            path,
            rows: frame.height(),
        });
    }

    Ok(report)
}

/// Recent window for every symbol.
pub fn download_recent(
    source: &dyn HistoricalDataSource,
    symbols: &[SymbolInfo],
    class: InstrumentClass,
    day_count: i64,
    options: &DownloadOptions,
) -> Result<RunReport, DownloadError> {
    let mut report = RunReport::default();
    for info in symbols {
        let plan = plan_recent(info, class, day_count)?;
        report.merge(run_plan(source, &plan, options)?);
    }
    Ok(report)
}

/// Full checkpoint history for every symbol.
pub fn download_historical(
    source: &dyn HistoricalDataSource,
    symbols: &[SymbolInfo],
    class: InstrumentClass,
    options: &DownloadOptions,
) -> Result<RunReport, DownloadError> {
    let mut report = RunReport::default();
    for info in symbols {
        let plan = plan_historical(info, class);
        report.merge(run_plan(source, &plan, options)?);
    }
    Ok(report)
}

/// Write a normalized batch with a header row.
///
/// Writes to `{path}.tmp` then renames, so a file is either whole or absent.
pub fn write_csv(frame: &mut DataFrame, path: &Path) -> Result<(), DownloadError> {
    let tmp_path = path.with_extension("csv.tmp");
    let io_err = |source| DownloadError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
    if let Err(source) = CsvWriter::new(&mut file).include_header(true).finish(frame) {
        let _ = fs::remove_file(&tmp_path);
        return Err(DownloadError::Encode {
            path: path.to_path_buf(),
            source,
        });
    }
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawBar;

    struct FixedSource(Vec<RawBar>);

    impl HistoricalDataSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_bars(&self, _request: &RequestDescriptor) -> Result<Vec<RawBar>, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn bar(date: &str, volume: f64) -> RawBar {
        RawBar {
            date: date.to_string(),
            open: 1.1,
            high: 1.2,
            low: 1.0,
            close: 1.15,
            volume,
            average: Some(1.1),
            bar_count: Some(3),
        }
    }

    #[test]
    fn writes_one_file_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource(vec![bar("2017-04-18 09:30:00", -5.0)]);
        let plan = plan_recent(&SymbolInfo::forex("EURUSD"), InstrumentClass::Forex, 5).unwrap();

        let report = run_plan(&source, &plan, &DownloadOptions::new(dir.path())).unwrap();

        assert_eq!(report.succeeded(), 1);
        let path = dir.path().join("EURUSD_1_hour_5_D_.csv");
        assert_eq!(report.written_paths(), vec![path.as_path()]);
        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("full_name,ticker,date,time,open,high,low,close,volume")
        );
        assert!(lines.next().unwrap().starts_with("EURUSD,EURUSD,20170418,09:30:00,"));
        assert!(!dir.path().join("EURUSD_1_hour_5_D_.csv.tmp").exists());
    }

    #[test]
    fn creates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("recent");
        let source = FixedSource(vec![bar("2017-04-18 09:30:00", 10.0)]);
        let plan = plan_recent(&SymbolInfo::forex("USDJPY"), InstrumentClass::Forex, 1).unwrap();

        run_plan(&source, &plan, &DownloadOptions::new(&nested)).unwrap();
        assert!(nested.join("USDJPY_1_hour_1_D_.csv").exists());
    }

    #[test]
    fn empty_batch_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource(Vec::new());
        let plan = plan_recent(&SymbolInfo::forex("EURUSD"), InstrumentClass::Forex, 5).unwrap();

        let report = run_plan(&source, &plan, &DownloadOptions::new(dir.path())).unwrap();
        assert_eq!(report.succeeded(), 1);
        let content = fs::read_to_string(dir.path().join("EURUSD_1_hour_5_D_.csv")).unwrap();
        assert!(content.starts_with("full_name,ticker,date,time,"));
    }

    #[test]
    fn download_recent_rejects_bad_day_count() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource(Vec::new());
        let err = download_recent(
            &source,
            &[SymbolInfo::forex("EURUSD")],
            InstrumentClass::Forex,
            400,
            &DownloadOptions::new(dir.path()),
        )
        .unwrap_err();
        assert!(matches!(err, DownloadError::Plan(PlanError::DayCountOutOfRange(400))));
    }
}
