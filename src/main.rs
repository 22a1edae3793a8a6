mod chart;
mod config;
mod error;
mod logging;
mod pipeline;
mod report;
mod score;
mod stats;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use config::{Settings, DEFAULT_COLUMN, DEFAULT_DATASET};
use pipeline::{Outcome, Pipeline};
use score::{RawScore, Submission};
use stats::ReferenceStatistics;
use tracing::{info, warn};

#[derive(FromArgs, Debug)]
/// IQ test report
struct Args {
    /// dataset holding the reference raw scores (.csv, .xlsx, .xls or .ods)
    #[argh(option, short = 'd', default = "PathBuf::from(DEFAULT_DATASET)")]
    dataset: PathBuf,

    /// header of the raw score column
    #[argh(option, short = 'c', default = "DEFAULT_COLUMN.to_string()")]
    column: String,

    /// name printed on the report
    #[argh(option, short = 'n', default = "String::new()")]
    name: String,

    /// raw score between 0 and 200, prompted for when omitted
    #[argh(option, short = 'r')]
    raw_score: Option<RawScore>,

    /// directory the report is written to
    #[argh(option, short = 'o', default = "PathBuf::from(\".\")")]
    output_dir: PathBuf,

    /// directory for temporary chart images
    #[argh(option)]
    scratch_dir: Option<PathBuf>,

    /// also save the chart image to this path
    #[argh(option)]
    chart_out: Option<PathBuf>,

    /// print results as JSON
    #[argh(switch)]
    json: bool,

    /// enable debug logging
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// log filter, e.g. `info` or `iq_report=trace`
    #[argh(option)]
    log_level: Option<String>,

    /// emit logs as JSON
    #[argh(switch)]
    log_json: bool,
}

impl Args {
    fn settings(&self) -> Settings {
        let defaults = Settings::default();
        Settings {
            dataset: self.dataset.clone(),
            column: self.column.clone(),
            scratch_dir: self.scratch_dir.clone().unwrap_or(defaults.scratch_dir),
            output_dir: self.output_dir.clone(),
        }
    }
}

fn deliver(pipeline: &Pipeline, args: &Args, name: &str, outcome: &Outcome) -> Result<()> {
    let report_path = args.output_dir.join(outcome.document.file_name);
    fs::write(&report_path, &outcome.document.bytes)
        .context(format!("unable to write {}", report_path.display()))?;
    if let Some(chart_out) = &args.chart_out {
        fs::write(chart_out, &outcome.chart_png)
            .context(format!("unable to write {}", chart_out.display()))?;
    }
    info!(path = %report_path.display(), mime = outcome.document.mime, "report delivered");

    if args.json {
        let summary = pipeline.summary(name, outcome);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Nilai IQ Anda: {:.2}", outcome.result.iq);
        println!("Kategori: {}", outcome.result.category);
        println!("Skor Mentah Anda: {}", outcome.result.raw_score);
        println!("Hasil PDF: {}", report_path.display());
    }
    Ok(())
}

fn prompt<B: BufRead>(lines: &mut io::Lines<B>, label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    Ok(lines.next().transpose()?)
}

/// Reads name and score pairs until stdin closes. Rejected submissions are
/// reported and prompted for again.
fn interactive(pipeline: &Pipeline, args: &Args) -> Result<()> {
    println!("{}", report::TITLE);
    println!("Masukkan nama dan skor mentah untuk menghitung IQ Anda!");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let name = match prompt(&mut lines, "Masukkan Nama Anda: ")? {
            Some(name) => name.trim().to_string(),
            None => return Ok(()),
        };
        let raw_score = match prompt(&mut lines, "Masukkan Skor Mentah: ")? {
            Some(raw_score) => raw_score,
            None => return Ok(()),
        };

        handle(pipeline, args, &name, &raw_score)?;
    }
}

/// Runs and delivers one prompted submission. Only fatal errors are
/// returned; anything else is reported so the next submission can proceed.
fn handle(pipeline: &Pipeline, args: &Args, name: &str, raw_score: &str) -> Result<()> {
    let outcome = raw_score
        .parse::<RawScore>()
        .map(|raw_score| Submission {
            name: name.to_string(),
            raw_score,
        })
        .and_then(|submission| pipeline.submit(&submission));
    let delivered = match outcome {
        Ok(outcome) => deliver(pipeline, args, name, &outcome),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = delivered {
        let message = format!("{:#}", e);
        warn!(error = %message, "submission rejected");
        eprintln!("{}", message);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    logging::init_tracing(args.verbose, args.log_level.as_deref(), args.log_json)?;

    let settings = args.settings();
    settings.validate().context("invalid configuration")?;
    let stats = ReferenceStatistics::load(&settings.dataset, &settings.column)
        .context("unable to load reference statistics")?;
    let pipeline = Pipeline::new(stats, &settings)?;

    match args.raw_score {
        Some(raw_score) => {
            let submission = Submission {
                name: args.name.clone(),
                raw_score,
            };
            let outcome = pipeline.submit(&submission)?;
            deliver(&pipeline, &args, &submission.name, &outcome)
        }
        None => interactive(&pipeline, &args),
    }
}
