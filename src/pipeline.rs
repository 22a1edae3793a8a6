use serde::Serialize;
use tracing::{debug, info_span};

use crate::chart::ChartRenderer;
use crate::config::Settings;
use crate::error::Result;
use crate::report::{ReportDocument, ReportGenerator};
use crate::score::{IqResult, Submission};
use crate::stats::ReferenceStatistics;

/// Everything the front end shows for one submission.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub result: IqResult,
    /// PNG shown inline; the file it was read from no longer exists.
    pub chart_png: Vec<u8>,
    pub document: ReportDocument,
}

#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub name: &'a str,
    #[serde(flatten)]
    pub result: &'a IqResult,
    pub category_label: &'static str,
    pub population: &'a ReferenceStatistics,
    pub document: &'a str,
}

/// Request handling over statistics fixed at startup. Submissions share
/// nothing mutable, so one pipeline can serve concurrent callers.
#[derive(Debug)]
pub struct Pipeline {
    stats: ReferenceStatistics,
    renderer: ChartRenderer,
    reports: ReportGenerator,
}

impl Pipeline {
    pub fn new(stats: ReferenceStatistics, settings: &Settings) -> Result<Pipeline> {
        stats.validate()?;
        Ok(Pipeline {
            stats,
            renderer: ChartRenderer::new(&settings.scratch_dir),
            reports: ReportGenerator,
        })
    }

    pub fn submit(&self, submission: &Submission) -> Result<Outcome> {
        let span = info_span!("submission", raw_score = %submission.raw_score);
        let _enter = span.enter();

        let result = IqResult::evaluate(submission.raw_score, &self.stats)?;
        debug!(iq = result.iq, category = %result.category, "scored submission");

        let chart = self.renderer.render(&self.stats, submission.raw_score)?;
        let chart_png = chart.load()?;
        let document = self.reports.build(&result, &submission.name, chart)?;

        Ok(Outcome {
            result,
            chart_png,
            document,
        })
    }

    pub fn summary<'a>(&'a self, name: &'a str, outcome: &'a Outcome) -> Summary<'a> {
        Summary {
            name,
            result: &outcome.result,
            category_label: outcome.result.category.label(),
            population: &self.stats,
            document: outcome.document.file_name,
        }
    }
}
