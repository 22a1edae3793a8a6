use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::stats::ReferenceStatistics;

pub const MIN_RAW_SCORE: i64 = 0;
pub const MAX_RAW_SCORE: i64 = 200;

pub const IQ_MEAN: f64 = 100.;
pub const IQ_SCALE: f64 = 15.;

/// Raw test score, bounded to `[MIN_RAW_SCORE, MAX_RAW_SCORE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RawScore(u8);

impl RawScore {
    pub fn new(value: i64) -> Result<RawScore> {
        if !(MIN_RAW_SCORE..=MAX_RAW_SCORE).contains(&value) {
            return Err(Error::InvalidInput(format!(
                "raw score must be between {} and {}, got {}",
                MIN_RAW_SCORE, MAX_RAW_SCORE, value
            )));
        }
        Ok(RawScore(value as u8))
    }

    pub fn value(self) -> i64 {
        i64::from(self.0)
    }
}

impl FromStr for RawScore {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().parse::<i64>().map_err(|_| {
            Error::InvalidInput(format!("raw score must be a whole number, got `{}`", s.trim()))
        })?;
        RawScore::new(value)
    }
}

impl fmt::Display for RawScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub name: String,
    pub raw_score: RawScore,
}

impl Submission {
    pub fn new(name: impl Into<String>, raw_score: i64) -> Result<Submission> {
        Ok(Submission {
            name: name.into(),
            raw_score: RawScore::new(raw_score)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    BelowAverage,
    Average,
    AboveAverage,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::BelowAverage => "Di bawah rata-rata",
            Category::Average => "Rata-rata",
            Category::AboveAverage => "Di atas rata-rata",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IqResult {
    pub iq: f64,
    pub category: Category,
    pub raw_score: RawScore,
}

impl IqResult {
    pub fn evaluate(raw_score: RawScore, stats: &ReferenceStatistics) -> Result<IqResult> {
        let iq = to_iq(raw_score.value(), stats)?;
        Ok(IqResult {
            iq,
            category: categorize(iq),
            raw_score,
        })
    }
}

/// Rescales the z-score of `raw_score` to mean 100 and scale 15.
pub fn to_iq(raw_score: i64, stats: &ReferenceStatistics) -> Result<f64> {
    if stats.std_dev == 0. || !stats.std_dev.is_finite() {
        return Err(Error::InvalidStatistics(format!(
            "cannot normalise against standard deviation {}",
            stats.std_dev
        )));
    }
    let z_score = (raw_score as f64 - stats.mean) / stats.std_dev;
    Ok(IQ_MEAN + IQ_SCALE * z_score)
}

/// Bands are tested in order and the first match wins, so `[85, 90)` falls
/// in `BelowAverage` even though the `Average` band starts at 85.
pub fn categorize(iq: f64) -> Category {
    if iq < 90. {
        Category::BelowAverage
    } else if (85. ..=110.).contains(&iq) {
        Category::Average
    } else {
        Category::AboveAverage
    }
}
