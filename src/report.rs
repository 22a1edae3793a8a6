//! Single page A4 report: header band, result lines, chart, caption and a
//! closing quote.
//!
//! Text is set in the built-in Helvetica faces, which printpdf writes in the
//! single-byte WinAnsi encoding.

use std::io::Cursor;

use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfLayerReference, Rect, Rgb,
};
use tracing::debug;

use crate::chart::ChartArtifact;
use crate::error::{Error, Result};
use crate::score::IqResult;

pub const FILE_NAME: &str = "Hasil_Test_IQ.pdf";
pub const MIME_TYPE: &str = "application/pdf";

pub const TITLE: &str = "Aplikasi Tes IQ";
pub const QUOTE: &str =
    "~ Bukan tentang seberapa pintar Kamu, melainkan seberapa baik Kamu mengenali potensi diri sendiri ~";

const PAGE_WIDTH: f32 = 210.;
const PAGE_HEIGHT: f32 = 297.;
const MARGIN: f32 = 10.;
const HEADER_HEIGHT: f32 = 20.;
const LINE_HEIGHT: f32 = 10.;
const CAPTION_LINE_HEIGHT: f32 = 8.;
// light blue
const HIGHLIGHT: (f32, f32, f32) = (173. / 255., 216. / 255., 230. / 255.);

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub bytes: Vec<u8>,
    pub file_name: &'static str,
    pub mime: &'static str,
}

/// Every piece of text on the page, in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportText {
    pub title: String,
    pub details: Vec<String>,
    pub caption: Vec<String>,
    pub quote: String,
}

impl ReportText {
    pub fn new(result: &IqResult, name: &str, mean: f64) -> ReportText {
        ReportText {
            title: TITLE.to_string(),
            details: vec![
                format!("Nama: {}", single_byte(name)),
                format!("Nilai IQ: {:.2}", result.iq),
                format!("Kategori: {}", result.category),
                format!("Skor Mentah: {}", result.raw_score),
            ],
            caption: vec![
                "1. Grafik di atas menunjukkan hubungan antara skor mentah dan nilai IQ."
                    .to_string(),
                format!(
                    "2. Garis putus-putus merah menggambarkan nilai rata-rata IQ (Mean: {:.2}).",
                    mean
                ),
                format!(
                    "3. Garis putus-putus hijau menunjukkan posisi skor mentah pengguna (Skor Mentah: {}).",
                    result.raw_score
                ),
            ],
            quote: QUOTE.to_string(),
        }
    }
}

/// Replaces characters the WinAnsi encoding cannot carry.
fn single_byte(text: &str) -> String {
    text.chars()
        .map(|c| {
            if (' '..='~').contains(&c) || ('\u{a0}'..='\u{ff}').contains(&c) {
                c
            } else {
                '?'
            }
        })
        .collect()
}

/// Rough Helvetica advance widths, enough to centre a line.
fn text_width(text: &str, font_size: f32) -> Mm {
    let em: f32 = text
        .chars()
        .map(|c| match c {
            ' ' | '.' | ',' | ':' | ';' | '!' | 'i' | 'j' | 'l' | 'I' | '\'' => 0.278,
            'f' | 't' | 'r' | '(' | ')' | '-' => 0.333,
            'm' | 'M' | 'W' => 0.833,
            'w' => 0.722,
            '~' => 0.584,
            'A'..='Z' => 0.667,
            _ => 0.556,
        })
        .sum();
    Mm(em * font_size * 25.4 / 72.)
}

fn fill_color(layer: &PdfLayerReference, (r, g, b): (f32, f32, f32)) {
    layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
}

fn centered(
    layer: &PdfLayerReference,
    text: &str,
    font_size: f32,
    y: f32,
    font: &IndirectFontRef,
) {
    let Mm(width) = text_width(text, font_size);
    let x = ((PAGE_WIDTH - width) / 2.).max(0.);
    layer.use_text(text, font_size, Mm(x), Mm(y), font);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportGenerator;

impl ReportGenerator {
    /// Lays out the report around `chart`. The chart file is removed before
    /// returning, whether or not the document could be built.
    pub fn build(
        &self,
        result: &IqResult,
        name: &str,
        chart: ChartArtifact,
    ) -> Result<ReportDocument> {
        let document = self.compose(result, name, &chart);
        chart.release();
        document
    }

    fn compose(
        &self,
        result: &IqResult,
        name: &str,
        chart: &ChartArtifact,
    ) -> Result<ReportDocument> {
        let png = chart.load()?;
        let decoder = PngDecoder::new(Cursor::new(png.as_slice()))
            .map_err(|e| Error::RenderError(format!("chart is not a readable PNG: {}", e)))?;
        let image = Image::try_from(decoder)
            .map_err(|e| Error::RenderError(format!("unable to embed chart: {}", e)))?;

        let text = ReportText::new(result, name, chart.mean);

        let (doc, page, layer) =
            PdfDocument::new(TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let font = |face: BuiltinFont| {
            doc.add_builtin_font(face)
                .map_err(|e| Error::RenderError(format!("unable to load font: {}", e)))
        };
        let regular = font(BuiltinFont::Helvetica)?;
        let bold = font(BuiltinFont::HelveticaBold)?;
        let italic = font(BuiltinFont::HelveticaOblique)?;

        fill_color(&layer, HIGHLIGHT);
        layer.add_rect(Rect::new(
            Mm(0.),
            Mm(PAGE_HEIGHT - HEADER_HEIGHT),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
        ));
        fill_color(&layer, (0., 0., 0.));
        centered(&layer, &text.title, 16., PAGE_HEIGHT - 13., &bold);

        let mut y = PAGE_HEIGHT - HEADER_HEIGHT - 7.;
        for line in &text.details {
            layer.use_text(line.as_str(), 12., Mm(MARGIN), Mm(y), &regular);
            y -= LINE_HEIGHT;
        }

        // chart spans the page between the margins
        let image_width = PAGE_WIDTH - 2. * MARGIN;
        let (px_width, px_height) = (image.image.width.0 as f32, image.image.height.0 as f32);
        let image_height = image_width * px_height / px_width;
        let image_bottom = y - 3. - image_height;
        image.add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(image_bottom)),
                dpi: Some(px_width * 25.4 / image_width),
                ..Default::default()
            },
        );

        y = image_bottom - 12.;
        for line in &text.caption {
            layer.use_text(line.as_str(), 10., Mm(MARGIN), Mm(y), &regular);
            y -= CAPTION_LINE_HEIGHT;
        }

        y -= 6.;
        fill_color(&layer, HIGHLIGHT);
        layer.add_rect(Rect::new(
            Mm(MARGIN),
            Mm(y - 3.5),
            Mm(PAGE_WIDTH - MARGIN),
            Mm(y - 3.5 + LINE_HEIGHT),
        ));
        fill_color(&layer, (0., 0., 0.));
        centered(&layer, &text.quote, 10., y, &italic);

        let bytes = doc
            .save_to_bytes()
            .map_err(|e| Error::RenderError(format!("unable to serialize report: {}", e)))?;
        debug!(size = bytes.len(), "built report");

        Ok(ReportDocument {
            bytes,
            file_name: FILE_NAME,
            mime: MIME_TYPE,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    use pretty_assertions::assert_eq;
    use printpdf::image_crate::{ImageFormat, Rgb as Pixel, RgbImage};

    use crate::score::{Category, RawScore};
    use crate::stats::ReferenceStatistics;

    fn stats() -> ReferenceStatistics {
        ReferenceStatistics {
            mean: 98.5,
            std_dev: 14.2,
            count: 198,
            min: 40.,
            max: 160.,
        }
    }

    fn result() -> IqResult {
        IqResult {
            iq: 121.126,
            category: Category::AboveAverage,
            raw_score: RawScore::new(118).unwrap(),
        }
    }

    /// A chart artifact holding a plain PNG, independent of the chart backend.
    fn chart(dir: &std::path::Path) -> ChartArtifact {
        let chart = ChartArtifact::allocate(dir, &stats(), RawScore::new(118).unwrap()).unwrap();
        RgbImage::from_pixel(200, 120, Pixel([30, 60, 200]))
            .save_with_format(chart.path(), ImageFormat::Png)
            .unwrap();
        chart
    }

    #[test]
    fn test_text_order() {
        let text = ReportText::new(&result(), "Siti", 98.5);
        assert_eq!(text.title, "Aplikasi Tes IQ");
        assert_eq!(
            text.details,
            vec![
                "Nama: Siti".to_string(),
                "Nilai IQ: 121.13".to_string(),
                "Kategori: Di atas rata-rata".to_string(),
                "Skor Mentah: 118".to_string(),
            ]
        );
        assert!(text.caption[1].ends_with("(Mean: 98.50)."));
        assert!(text.caption[2].ends_with("(Skor Mentah: 118)."));
        assert_eq!(text.quote, QUOTE);
    }

    #[test]
    fn test_name_is_single_byte() {
        let text = ReportText::new(&result(), "José 李", 98.5);
        assert_eq!(text.details[0], "Nama: José ?");
        let text = ReportText::new(&result(), "", 98.5);
        assert_eq!(text.details[0], "Nama: ");
    }

    #[test]
    fn test_build_removes_chart() {
        let dir = tempfile::tempdir().unwrap();
        let chart = chart(dir.path());
        let path = chart.path().to_owned();

        let document = ReportGenerator.build(&result(), "Siti", chart).unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
        assert_eq!(document.file_name, "Hasil_Test_IQ.pdf");
        assert_eq!(document.mime, "application/pdf");
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_document_text_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let document = ReportGenerator.build(&result(), "Siti", chart(dir.path())).unwrap();

        let pdf = printpdf::lopdf::Document::load_mem(&document.bytes).unwrap();
        let extracted = pdf.extract_text(&[1]).unwrap();
        let expected = ReportText::new(&result(), "Siti", 98.5);
        let mut lines = vec![expected.title.clone()];
        lines.extend(expected.details.iter().cloned());
        lines.extend(expected.caption.iter().cloned());
        lines.push(expected.quote.clone());

        let mut cursor = 0;
        for line in lines {
            let found = extracted[cursor..]
                .find(line.as_str())
                .unwrap_or_else(|| panic!("`{}` missing or out of order in:\n{}", line, extracted));
            cursor += found + line.len();
        }
    }

    #[test]
    fn test_missing_chart() {
        let dir = tempfile::tempdir().unwrap();
        let chart = chart(dir.path());
        fs::remove_file(chart.path()).unwrap();

        let err = ReportGenerator.build(&result(), "Siti", chart).unwrap_err();
        assert!(matches!(err, Error::MissingArtifact(_)), "{}", err);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_chart_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let chart =
            ChartArtifact::allocate(dir.path(), &stats(), RawScore::new(5).unwrap()).unwrap();
        fs::write(chart.path(), b"not a png").unwrap();
        let path = chart.path().to_owned();

        let err = ReportGenerator.build(&result(), "Siti", chart).unwrap_err();
        assert!(matches!(err, Error::RenderError(_)), "{}", err);
        assert!(!path.exists());
    }
}
