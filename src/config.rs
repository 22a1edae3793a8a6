use std::path::PathBuf;

use anyhow::{ensure, Result};

pub const DEFAULT_DATASET: &str = "198_Peserta_Perhitungan_IQ.xlsx";
pub const DEFAULT_COLUMN: &str = "Skor Mentah";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Reference population, read once at startup.
    pub dataset: PathBuf,
    /// Header of the raw score column.
    pub column: String,
    /// Where per-submission chart images are created and removed.
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            dataset: PathBuf::from(DEFAULT_DATASET),
            column: DEFAULT_COLUMN.to_string(),
            scratch_dir: std::env::temp_dir(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.column.trim().is_empty(), "score column name is empty");
        ensure!(
            self.scratch_dir.is_dir(),
            "scratch directory {} does not exist",
            self.scratch_dir.display()
        );
        ensure!(
            self.output_dir.is_dir(),
            "output directory {} does not exist",
            self.output_dir.display()
        );
        Ok(())
    }
}
