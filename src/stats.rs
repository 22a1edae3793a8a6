use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Population statistics of the reference raw scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
}

impl ReferenceStatistics {
    /// Mean and sample standard deviation (n - 1), matching what pandas reports.
    pub fn compute(data: &[f64]) -> Option<ReferenceStatistics> {
        if data.is_empty() {
            return None;
        }
        let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = data.iter().sum();
        let mean = sum / data.len() as f64;

        let variance = data
            .iter()
            .map(|value| (mean - value).powf(2.))
            .sum::<f64>()
            / (data.len() as f64 - 1.);

        Some(ReferenceStatistics {
            mean,
            std_dev: variance.sqrt(),
            count: data.len(),
            min,
            max,
        })
    }

    /// Reads the score column once and derives the statistics every
    /// submission is normalised against.
    pub fn load(dataset: &Path, column: &str) -> Result<ReferenceStatistics> {
        let scores = match extension(dataset).as_deref() {
            Some("csv") => read_csv_column(dataset, column)?,
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => {
                read_workbook_column(dataset, column)?
            }
            _ => {
                return Err(Error::data_unavailable(
                    dataset,
                    "unsupported dataset format, expected .csv, .xlsx, .xls or .ods",
                ))
            }
        };
        debug!(column, values = scores.len(), "read reference scores");

        let stats = ReferenceStatistics::compute(&scores).ok_or_else(|| {
            Error::data_unavailable(dataset, format!("column `{}` has no scores", column))
        })?;
        stats.validate()?;

        info!(
            mean = stats.mean,
            std_dev = stats.std_dev,
            count = stats.count,
            min = stats.min,
            max = stats.max,
            "loaded reference statistics"
        );
        Ok(stats)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.mean.is_finite() {
            return Err(Error::InvalidStatistics(format!(
                "mean is not finite ({})",
                self.mean
            )));
        }
        if !self.std_dev.is_finite() || self.std_dev <= 0. {
            return Err(Error::InvalidStatistics(format!(
                "standard deviation must be positive, got {} from {} value(s)",
                self.std_dev, self.count
            )));
        }
        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Cell texts read as a missing value, as pandas does by default.
const NA_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn parse_score(dataset: &Path, row: usize, cell: &str) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() || NA_MARKERS.contains(&cell) {
        return Ok(None);
    }
    let score = cell.parse::<f64>().map_err(|_| {
        Error::data_unavailable(dataset, format!("row {}: `{}` is not a number", row, cell))
    })?;
    finite_score(dataset, row, score).map(Some)
}

fn finite_score(dataset: &Path, row: usize, score: f64) -> Result<f64> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(Error::data_unavailable(
            dataset,
            format!("row {}: `{}` is not a finite score", row, score),
        ))
    }
}

fn read_csv_column(dataset: &Path, column: &str) -> Result<Vec<f64>> {
    let mut reader =
        csv::Reader::from_path(dataset).map_err(|e| Error::data_unavailable(dataset, e))?;
    let index = reader
        .headers()
        .map_err(|e| Error::data_unavailable(dataset, e))?
        .iter()
        .position(|header| header.trim() == column)
        .ok_or_else(|| {
            Error::data_unavailable(dataset, format!("column `{}` not found", column))
        })?;

    let mut scores = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::data_unavailable(dataset, e))?;
        // header is row 1
        let row = i + 2;
        if let Some(score) = parse_score(dataset, row, record.get(index).unwrap_or(""))? {
            scores.push(score);
        }
    }
    Ok(scores)
}

fn read_workbook_column(dataset: &Path, column: &str) -> Result<Vec<f64>> {
    let mut workbook =
        open_workbook_auto(dataset).map_err(|e| Error::data_unavailable(dataset, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::data_unavailable(dataset, "workbook has no worksheets"))?
        .map_err(|e| Error::data_unavailable(dataset, e))?;

    let mut rows = range.rows();
    let index = rows
        .next()
        .and_then(|header| {
            header
                .iter()
                .position(|cell| cell.to_string().trim() == column)
        })
        .ok_or_else(|| {
            Error::data_unavailable(dataset, format!("column `{}` not found", column))
        })?;

    let mut scores = Vec::new();
    for (i, row) in rows.enumerate() {
        let cell = match row.get(index) {
            Some(cell) => cell,
            None => continue,
        };
        let row = i + 2;
        match cell {
            // error cells such as #N/A are missing values
            Data::Empty | Data::Error(_) => {}
            Data::Int(_) | Data::Float(_) => {
                if let Some(score) = cell.as_f64() {
                    scores.push(finite_score(dataset, row, score)?);
                }
            }
            other => {
                if let Some(score) = parse_score(dataset, row, &other.to_string())? {
                    scores.push(score);
                }
            }
        }
    }
    Ok(scores)
}
