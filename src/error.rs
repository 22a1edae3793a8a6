use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Reference dataset missing, unreadable, or without usable scores.
    #[error("reference data unavailable ({}): {reason}", .path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("invalid reference statistics: {0}")]
    InvalidStatistics(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unable to render chart: {0}")]
    RenderError(String),

    #[error("chart image not found at {}", .0.display())]
    MissingArtifact(PathBuf),
}

impl Error {
    pub fn data_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Startup errors leave the process without reference statistics.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DataUnavailable { .. } | Error::InvalidStatistics(_)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fatal_split() {
        assert!(Error::data_unavailable("scores.csv", "no such file").is_fatal());
        assert!(Error::InvalidStatistics("zero deviation".to_string()).is_fatal());
        assert!(!Error::InvalidInput("-5".to_string()).is_fatal());
        assert!(!Error::RenderError("backend".to_string()).is_fatal());
        assert!(!Error::MissingArtifact(PathBuf::from("/tmp/x.png")).is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = Error::data_unavailable("scores.csv", "column `Skor Mentah` not found");
        assert_eq!(
            err.to_string(),
            "reference data unavailable (scores.csv): column `Skor Mentah` not found"
        );
        assert_eq!(
            Error::MissingArtifact(PathBuf::from("chart.png")).to_string(),
            "chart image not found at chart.png"
        );
    }
}
