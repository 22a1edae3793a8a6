//! Chart of the raw score to IQ line around a submitted raw score.
//!
//! Every chart lives in its own uniquely named temporary PNG. The file is
//! removed when its [`ChartArtifact`] is released or dropped, so a failed
//! submission never leaves an image behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::score::{RawScore, IQ_SCALE};
use crate::stats::ReferenceStatistics;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;
const SAMPLES: usize = 100;
const HALF_SPAN: f64 = 20.;

const TITLE: &str = "Grafik IQ Berdasarkan Skor Mentah";
const LINE_LABEL: &str = "Garis Tengah Skor Mentah & Nilai IQ";

#[derive(Debug)]
pub struct ChartArtifact {
    path: TempPath,
    pub mean: f64,
    pub std_dev: f64,
    pub raw_score: RawScore,
}

impl ChartArtifact {
    /// Reserves a fresh `iq-chart-*.png` in `scratch_dir`.
    pub fn allocate(
        scratch_dir: &Path,
        stats: &ReferenceStatistics,
        raw_score: RawScore,
    ) -> Result<ChartArtifact> {
        let path = tempfile::Builder::new()
            .prefix("iq-chart-")
            .suffix(".png")
            .tempfile_in(scratch_dir)
            .map_err(|e| {
                Error::RenderError(format!(
                    "unable to create chart file in {}: {}",
                    scratch_dir.display(),
                    e
                ))
            })?
            .into_temp_path();

        Ok(ChartArtifact {
            path,
            mean: stats.mean,
            std_dev: stats.std_dev,
            raw_score,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoded PNG bytes. An absent or never-written file is a missing artifact.
    pub fn load(&self) -> Result<Vec<u8>> {
        match fs::read(self.path()) {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            Ok(_) => Err(Error::MissingArtifact(self.path().to_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::MissingArtifact(self.path().to_owned()))
            }
            Err(e) => Err(Error::RenderError(format!(
                "unable to read {}: {}",
                self.path().display(),
                e
            ))),
        }
    }

    /// Deletes the backing file. Failures are logged, not returned.
    pub fn release(self) {
        let path: PathBuf = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => debug!(path = %path.display(), "removed chart artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "unable to remove chart artifact"
            ),
        }
    }
}

/// `SAMPLES` evenly spaced raw scores over `raw_score ± HALF_SPAN`, each
/// paired with `mean + (x - raw_score) * std_dev / 15`. The line therefore
/// reads `mean` at the submitted raw score.
pub fn line_points(stats: &ReferenceStatistics, raw_score: RawScore) -> Vec<(f64, f64)> {
    let raw = raw_score.value() as f64;
    let start = raw - HALF_SPAN;
    let step = 2. * HALF_SPAN / (SAMPLES - 1) as f64;
    (0..SAMPLES)
        .map(|i| {
            let x = if i == SAMPLES - 1 {
                raw + HALF_SPAN
            } else {
                start + i as f64 * step
            };
            (x, stats.mean + (x - raw) * stats.std_dev / IQ_SCALE)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    scratch_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> ChartRenderer {
        ChartRenderer {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn render(
        &self,
        stats: &ReferenceStatistics,
        raw_score: RawScore,
    ) -> Result<ChartArtifact> {
        let artifact = ChartArtifact::allocate(&self.scratch_dir, stats, raw_score)?;
        draw(artifact.path(), stats, raw_score)
            .map_err(|e| Error::RenderError(e.to_string()))?;
        debug!(
            path = %artifact.path().display(),
            mean = artifact.mean,
            std_dev = artifact.std_dev,
            %raw_score,
            "rendered chart"
        );
        Ok(artifact)
    }
}

fn draw(
    path: &Path,
    stats: &ReferenceStatistics,
    raw_score: RawScore,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let raw = raw_score.value() as f64;
    let (x_min, x_max) = (raw - HALF_SPAN, raw + HALF_SPAN);
    let rise = HALF_SPAN * stats.std_dev / IQ_SCALE;
    let margin = rise * 0.15;
    let (y_min, y_max) = (stats.mean - rise - margin, stats.mean + rise + margin);
    let label_offset = (y_max - y_min) * 0.02;

    let mean_label = format!("Mean IQ: {:.2}", stats.mean);
    let raw_label = format!("Skor Mentah: {}", raw_score);

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Skor Mentah")
        .y_desc("Nilai IQ")
        .draw()?;

    chart
        .draw_series(LineSeries::new(line_points(stats, raw_score), &BLUE))?
        .label(LINE_LABEL)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_series(DashedLineSeries::new(
            vec![(x_min, stats.mean), (x_max, stats.mean)],
            10,
            6,
            RED.stroke_width(2),
        ))?
        .label(mean_label.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .draw_series(DashedLineSeries::new(
            vec![(raw, y_min), (raw, y_max)],
            10,
            6,
            GREEN.stroke_width(2),
        ))?
        .label(raw_label.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &GREEN));

    chart.draw_series(std::iter::once(Text::new(
        raw_label.clone(),
        (raw + 1., stats.mean + label_offset),
        ("sans-serif", 16).into_font().color(&GREEN),
    )))?;
    chart.draw_series(std::iter::once(Text::new(
        mean_label.clone(),
        (x_min + 1., stats.mean + label_offset),
        ("sans-serif", 16).into_font().color(&RED),
    )))?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn stats() -> ReferenceStatistics {
        ReferenceStatistics {
            mean: 100.,
            std_dev: 15.,
            count: 198,
            min: 40.,
            max: 160.,
        }
    }

    fn raw(value: i64) -> RawScore {
        RawScore::new(value).unwrap()
    }

    #[test]
    fn test_line_points() {
        let stats = ReferenceStatistics {
            mean: 72.5,
            std_dev: 12.,
            ..stats()
        };
        let points = line_points(&stats, raw(130));
        assert_eq!(points.len(), 100);
        assert_eq!(points[0].0, 110.);
        assert_eq!(points[99].0, 150.);
        assert!(points.windows(2).all(|w| w[1].0 > w[0].0));
        for (x, y) in &points {
            let expected = 72.5 + (x - 130.) * 12. / 15.;
            assert!((y - expected).abs() < 1e-9);
        }
        // the line reads the population mean at the submitted score
        let slope = (points[99].1 - points[0].1) / 40.;
        assert!((points[0].1 + slope * 20. - 72.5).abs() < 1e-9);
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path());
        let chart = renderer.render(&stats(), raw(115)).unwrap();

        let bytes = chart.load().unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let name = chart.path().file_name().unwrap().to_str().unwrap().to_owned();
        assert!(name.starts_with("iq-chart-") && name.ends_with(".png"), "{}", name);
        assert_eq!(chart.raw_score, raw(115));
        assert_eq!(chart.mean, 100.);
    }

    #[test]
    fn test_render_then_release_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path());
        let chart = renderer.render(&stats(), raw(0)).unwrap();
        let path = chart.path().to_owned();
        assert!(path.exists());

        chart.release();
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let chart = ChartArtifact::allocate(dir.path(), &stats(), raw(10)).unwrap();
            chart.path().to_owned()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let first = ChartArtifact::allocate(dir.path(), &stats(), raw(100)).unwrap();
        let second = ChartArtifact::allocate(dir.path(), &stats(), raw(100)).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_load_unwritten_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let chart = ChartArtifact::allocate(dir.path(), &stats(), raw(100)).unwrap();
        assert!(matches!(chart.load(), Err(Error::MissingArtifact(_))));

        fs::remove_file(chart.path()).unwrap();
        assert!(matches!(chart.load(), Err(Error::MissingArtifact(_))));
        chart.release();
    }

    #[test]
    fn test_unwritable_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path().join("absent"));
        let err = renderer.render(&stats(), raw(100)).unwrap_err();
        assert!(matches!(err, Error::RenderError(_)), "{}", err);
    }
}
