//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;
use datalog_slurper::{activity::ActivityLabel, Error};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Recorded frame log (4 byte big-endian tag + 6 byte payload per record), stdin if absent
    #[clap(short, long)]
    pub input: Option<PathBuf>,
    /// Directory to save the CSV files in
    #[clap(short, long, default_value = "PebbleDataLogging")]
    pub output_dir: PathBuf,
    /// Ring buffer capacity
    #[clap(short, long, default_value_t = 256)]
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    pub capacity: u32,
    /// Labeled activity as LABEL@START..END in POSIX ms, e.g. Walking@1449000000000..1449000060000
    #[clap(short, long, value_parser = activity_span)]
    pub activity: Vec<ActivitySpan>,
    /// Ignore activities and save everything each channel recorded
    #[clap(long)]
    pub all: bool,
    /// How far (ms) the data may sit from an activity's edges before warning
    #[clap(long, default_value_t = 1000)]
    pub tolerance_ms: i64,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ActivitySpan {
    pub label: ActivityLabel,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn parse_span(s: &str) -> Result<ActivitySpan, Error> {
    let invalid = || Error::InvalidSpan(s.to_owned());
    let (label, range) = s.rsplit_once('@').ok_or_else(invalid)?;
    let (start, end) = range.split_once("..").ok_or_else(invalid)?;
    Ok(ActivitySpan {
        label: label.parse()?,
        start_ms: start.trim().parse().map_err(|_| invalid())?,
        end_ms: end.trim().parse().map_err(|_| invalid())?,
    })
}

fn activity_span(s: &str) -> Result<ActivitySpan, String> {
    parse_span(s).map_err(|e| e.to_string())
}
