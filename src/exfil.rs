//! This module is responsible for exfilling reconstructed readings as CSV

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    ops::Range,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{info, warn};

use crate::{
    activity::{filter, Segmenter},
    channel::{ChannelLabel, ChannelState},
    error::{Error, Result},
    sample::Sample,
};

pub const CSV_HEADER: &str = "Time(ms),X(mG),Y(mG),Z(mG)";
/// Activity name used when dumping whole channels
pub const ALL_READINGS: &str = "All Readings";
// How far the data may be from the interval edges before we complain
const DEFAULT_TOLERANCE_MS: i64 = 1000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExportConfig {
    pub tolerance_ms: i64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: DEFAULT_TOLERANCE_MS,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExportMode {
    /// One file per labeled activity and channel
    PerActivity,
    /// One file per channel with everything it committed
    All,
}

/// Things that look wrong with an exported dataset. The file is written anyway
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExportWarning {
    NoReadings,
    StartedLate { first_ms: i64, start_ms: i64 },
    StoppedEarly { last_ms: i64, end_ms: i64 },
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportWarning::NoReadings => write!(f, "The dataset has no readings"),
            ExportWarning::StartedLate { first_ms, start_ms } => write!(
                f,
                "The dataset started later than expected ({} ms after {}), it may be incomplete",
                first_ms - start_ms,
                start_ms
            ),
            ExportWarning::StoppedEarly { last_ms, end_ms } => write!(
                f,
                "The dataset stopped sooner than expected ({} ms before {}), it may be incomplete",
                end_ms - last_ms,
                end_ms
            ),
        }
    }
}

/// A rendered CSV file, not yet on disk
#[derive(Clone, Debug)]
pub struct Export {
    pub name: String,
    pub body: String,
    pub rows: usize,
    pub warnings: Vec<ExportWarning>,
}

/// A file that made it to disk
#[derive(Clone, Debug)]
pub struct Written {
    pub path: PathBuf,
    pub rows: usize,
    pub warnings: Vec<ExportWarning>,
}

/// Timestamp used in file names, safe on every filesystem
fn file_timestamp(time: &DateTime<Utc>) -> String {
    format!(
        "{}-{:02}-{:02}T{:02}-{:02}-{:02}.{:03}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second(),
        time.timestamp_subsec_millis()
    )
}

/// `<activity> <channel> <generated>.csv`
pub fn suggested_name(
    activity: &str,
    channel: ChannelLabel,
    generated: &DateTime<Utc>,
) -> String {
    format!("{} {} {}.csv", activity, channel, file_timestamp(generated))
}

pub fn csv_row(sample: &Sample) -> String {
    format!(
        "{:14},{:+5},{:+5},{:+5}",
        sample.timestamp_ms, sample.x, sample.y, sample.z
    )
}

pub fn render(samples: &[Sample]) -> String {
    // Each row is 32 bytes with its newline
    let mut body = String::with_capacity(CSV_HEADER.len() + 1 + samples.len() * 32);
    body.push_str(CSV_HEADER);
    body.push('\n');
    for sample in samples {
        body.push_str(&csv_row(sample));
        body.push('\n');
    }
    body
}

/// Compare the first and last reading against the interval edges
pub fn validate(
    samples: &[Sample],
    bounds: &Range<i64>,
    tolerance_ms: i64,
) -> Vec<ExportWarning> {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (first.timestamp_ms, last.timestamp_ms),
        _ => return vec![ExportWarning::NoReadings],
    };
    let mut warnings = Vec::new();
    if first - tolerance_ms > bounds.start {
        warnings.push(ExportWarning::StartedLate {
            first_ms: first,
            start_ms: bounds.start,
        });
    }
    if last + tolerance_ms < bounds.end {
        warnings.push(ExportWarning::StoppedEarly {
            last_ms: last,
            end_ms: bounds.end,
        });
    }
    warnings
}

/// Render `samples` for one activity on one channel
pub fn export(
    activity: &str,
    channel: ChannelLabel,
    samples: &[Sample],
    bounds: Range<i64>,
    config: &ExportConfig,
    generated: &DateTime<Utc>,
) -> Export {
    let warnings = validate(samples, &bounds, config.tolerance_ms);
    for warning in &warnings {
        warn!(%channel, activity, "{}", warning);
    }
    Export {
        name: suggested_name(activity, channel, generated),
        body: render(samples),
        rows: samples.len(),
        warnings,
    }
}

/// Make sure `dir` is a directory we can save into
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::NotADirectory(dir.display().to_string()));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

// Never clobber an earlier export, number the new one instead
fn create_unique(dir: &Path, name: &str) -> io::Result<(PathBuf, File)> {
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    let mut n = 0usize;
    loop {
        let path = if n == 0 {
            dir.join(name)
        } else {
            dir.join(format!("{} ({}).{}", stem, n, ext))
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Write a rendered export into `dir`. The file is closed on every path out
pub fn write_export(dir: &Path, export: &Export) -> Result<Written> {
    ensure_dir(dir)?;
    let (path, file) = create_unique(dir, &export.name)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(export.body.as_bytes())?;
    writer.flush()?;
    info!("Saved {} readings to {}", export.rows, path.display());
    Ok(Written {
        path,
        rows: export.rows,
        warnings: export.warnings.clone(),
    })
}

/// Save every channel, either sliced per labeled activity or whole.
/// Each attempted file gets its own result so one failure doesn't hide the rest.
pub fn export_session(
    dir: &Path,
    channels: &[ChannelState],
    segmenter: &Segmenter,
    mode: ExportMode,
    config: &ExportConfig,
) -> Vec<Result<Written>> {
    let generated = Utc::now();
    let mut results = Vec::new();
    match mode {
        ExportMode::All => {
            for channel in channels {
                results.push(
                    channel
                        .start_time()
                        .and_then(|start| Ok(start..channel.stop_time()?))
                        .and_then(|bounds| {
                            let export = export(
                                ALL_READINGS,
                                channel.label(),
                                channel.committed(),
                                bounds,
                                config,
                                &generated,
                            );
                            write_export(dir, &export)
                        }),
                );
            }
        }
        ExportMode::PerActivity => {
            for (activity, interval) in segmenter.labeled() {
                for channel in channels {
                    results.push(filter(channel, interval).and_then(|samples| {
                        // Labeled intervals are always closed
                        let end = interval.end_ms().unwrap_or(interval.start_ms());
                        let export = export(
                            activity.as_str(),
                            channel.label(),
                            samples,
                            interval.start_ms()..end,
                            config,
                            &generated,
                        );
                        write_export(dir, &export)
                    }));
                }
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{activity::ActivityLabel, Axes, ErrorKind};
    use chrono::TimeZone;

    fn sample(timestamp_ms: i64, x: i16, y: i16, z: i16) -> Sample {
        Sample::new(Axes::new(x, y, z), timestamp_ms)
    }

    /// Readings every 100 ms from `from` (inclusive) to `to` (exclusive).
    /// `from` must be nonzero, zero means the channel has no start time
    fn channel(label: ChannelLabel, from: i64, to: i64) -> ChannelState {
        let mut ch = ChannelState::start(label, from);
        let n = ((to - from) / 100) as i16;
        for v in 0..n {
            ch.push_sample(Axes::new(v, -v, 1000)).unwrap();
        }
        ch.resync(from + 100 * (n as i64 + 1)).unwrap();
        ch
    }

    #[test]
    fn test_row_format() {
        assert_eq!(
            csv_row(&sample(5000, 1, -2, 300)),
            "          5000,   +1,   -2, +300"
        );
        assert_eq!(
            csv_row(&sample(1_449_000_123_456, 0, -1000, 32767)),
            " 1449000123456,   +0,-1000,+32767"
        );
    }

    #[test]
    fn test_render() {
        let body = render(&[sample(5000, 1, -2, 300)]);
        assert_eq!(
            body,
            "Time(ms),X(mG),Y(mG),Z(mG)\n          5000,   +1,   -2, +300\n"
        );
        assert_eq!(render(&[]), "Time(ms),X(mG),Y(mG),Z(mG)\n");
    }

    #[test]
    fn test_suggested_name() {
        let generated = Utc.timestamp_millis_opt(1_449_000_123_456).unwrap();
        assert_eq!(
            suggested_name("Walking", ChannelLabel::Chest, &generated),
            "Walking CHEST 2015-12-01T20-02-03.456.csv"
        );
    }

    #[test]
    fn test_validate_independent_checks() {
        let samples = [sample(2500, 0, 0, 0), sample(8500, 0, 0, 0)];
        // Both edges are off, both are reported
        assert_eq!(
            validate(&samples, &(0..10_000), 1000),
            vec![
                ExportWarning::StartedLate {
                    first_ms: 2500,
                    start_ms: 0
                },
                ExportWarning::StoppedEarly {
                    last_ms: 8500,
                    end_ms: 10_000
                },
            ]
        );
        assert!(validate(&samples, &(1500..9500), 1000).is_empty());
        assert_eq!(
            validate(&[], &(0..10), 1000),
            vec![ExportWarning::NoReadings]
        );
    }

    #[test]
    fn test_warning_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let samples = [sample(0, 1, 1, 1), sample(8500, 2, 2, 2)];
        let export = export(
            "Walking",
            ChannelLabel::Waist,
            &samples,
            0..10_000,
            &ExportConfig::default(),
            &Utc::now(),
        );
        assert_eq!(
            export.warnings,
            vec![ExportWarning::StoppedEarly {
                last_ms: 8500,
                end_ms: 10_000
            }]
        );
        let written = write_export(dir.path(), &export).unwrap();
        let contents = fs::read_to_string(&written.path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(written.warnings.len(), 1);
    }

    #[test]
    fn test_no_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let generated = Utc.timestamp_millis_opt(0).unwrap();
        let export = export(
            "Situps",
            ChannelLabel::Neck,
            &[sample(0, 0, 0, 0)],
            0..1,
            &ExportConfig::default(),
            &generated,
        );
        let first = write_export(dir.path(), &export).unwrap();
        let second = write_export(dir.path(), &export).unwrap();
        assert_ne!(first.path, second.path);
        assert!(second
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("(1).csv"));
    }

    #[test]
    fn test_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, "").unwrap();
        let err = ensure_dir(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        // Nested directories are created on demand
        ensure_dir(&dir.path().join("a/b")).unwrap();
    }

    #[test]
    fn test_export_session_per_activity() {
        let dir = tempfile::tempdir().unwrap();
        let channels = vec![
            channel(ChannelLabel::DominantWrist, 100, 10_100),
            channel(ChannelLabel::Chest, 100, 5_100),
        ];
        let mut seg = Segmenter::new();
        let i = seg.start_at(1000).unwrap();
        seg.stop_at(4000).unwrap();
        seg.label(i, ActivityLabel::Jogging).unwrap();
        // Never labeled, never exported
        seg.start_at(4000).unwrap();
        seg.stop_at(9000).unwrap();

        let results = export_session(
            dir.path(),
            &channels,
            &seg,
            ExportMode::PerActivity,
            &ExportConfig::default(),
        );
        assert_eq!(results.len(), 2);
        for result in &results {
            let written = result.as_ref().unwrap();
            assert_eq!(written.rows, 30);
            assert!(written.warnings.is_empty());
        }
        let contents = fs::read_to_string(&results[0].as_ref().unwrap().path).unwrap();
        assert_eq!(contents.lines().nth(1).unwrap(), "          1000,   +9,   -9,+1000");
    }

    #[test]
    fn test_export_session_all() {
        let dir = tempfile::tempdir().unwrap();
        let channels = vec![
            channel(ChannelLabel::Waist, 100, 1100),
            ChannelState::start(ChannelLabel::Neck, 500),
        ];
        let results = export_session(
            dir.path(),
            &channels,
            &Segmenter::new(),
            ExportMode::All,
            &ExportConfig::default(),
        );
        let written = results[0].as_ref().unwrap();
        assert_eq!(written.rows, 10);
        assert!(written
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("All Readings WAIST"));
        assert!(matches!(results[1], Err(Error::NoReadings { .. })));
    }
}
