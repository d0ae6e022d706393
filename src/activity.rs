//! Activity intervals and the start/stop recorder that produces them.

use std::{fmt, str::FromStr};

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    channel::ChannelState,
    error::{Error, Result},
    sample::Sample,
};

/// What the wearer was doing. Chosen after the interval is stopped
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ActivityLabel {
    Pushups,
    Situps,
    JumpingJacks,
    StayingStill,
    Jogging,
    Walking,
}

impl ActivityLabel {
    pub const ALL: [ActivityLabel; 6] = [
        ActivityLabel::Pushups,
        ActivityLabel::Situps,
        ActivityLabel::JumpingJacks,
        ActivityLabel::StayingStill,
        ActivityLabel::Jogging,
        ActivityLabel::Walking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Pushups => "Pushups",
            ActivityLabel::Situps => "Situps",
            ActivityLabel::JumpingJacks => "Jumping Jacks",
            ActivityLabel::StayingStill => "Staying Still",
            ActivityLabel::Jogging => "Jogging",
            ActivityLabel::Walking => "Walking",
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLabel {
    type Err = Error;

    /// Case and separator insensitive, so `jumping-jacks` works on a command line
    fn from_str(s: &str) -> Result<Self> {
        let squash = |s: &str| {
            s.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect::<String>()
        };
        let wanted = squash(s);
        Self::ALL
            .into_iter()
            .find(|label| squash(label.as_str()) == wanted)
            .ok_or_else(|| Error::UnknownActivity(s.to_owned()))
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ActivityInterval {
    label: Option<ActivityLabel>,
    start_ms: i64,
    end_ms: Option<i64>,
}

impl ActivityInterval {
    pub fn label(&self) -> Option<ActivityLabel> {
        self.label
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> Option<i64> {
        self.end_ms
    }

    pub fn is_finished(&self) -> bool {
        self.end_ms.is_some()
    }

    /// Closed and labeled, nothing about it can change any more
    pub fn is_terminal(&self) -> bool {
        self.is_finished() && self.label.is_some()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SegmenterState {
    Idle,
    Recording,
}

/// Records activity intervals for a session
#[derive(Default, Debug)]
pub struct Segmenter {
    intervals: Vec<ActivityInterval>,
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SegmenterState {
        match self.intervals.last() {
            Some(interval) if !interval.is_finished() => SegmenterState::Recording,
            _ => SegmenterState::Idle,
        }
    }

    pub fn intervals(&self) -> &[ActivityInterval] {
        &self.intervals
    }

    /// Intervals that take part in per-activity export
    pub fn labeled(&self) -> impl Iterator<Item = (ActivityLabel, &ActivityInterval)> {
        self.intervals
            .iter()
            .filter(|i| i.is_finished())
            .filter_map(|i| i.label.map(|label| (label, i)))
    }

    pub fn start(&mut self) -> Result<usize> {
        self.start_at(Utc::now().timestamp_millis())
    }

    pub fn stop(&mut self) -> Result<usize> {
        self.stop_at(Utc::now().timestamp_millis())
    }

    /// Open a new interval at `now_ms`, returning its index
    pub fn start_at(&mut self, now_ms: i64) -> Result<usize> {
        if self.state() == SegmenterState::Recording {
            return Err(Error::AlreadyRecording);
        }
        self.intervals.push(ActivityInterval {
            label: None,
            start_ms: now_ms,
            end_ms: None,
        });
        debug!("Recording activity from {}", now_ms);
        Ok(self.intervals.len() - 1)
    }

    /// Close the open interval at `now_ms`. It still needs a [`label`](Self::label)
    pub fn stop_at(&mut self, now_ms: i64) -> Result<usize> {
        let index = self.intervals.len().saturating_sub(1);
        match self.intervals.last_mut() {
            Some(interval) if !interval.is_finished() => {
                if now_ms < interval.start_ms {
                    return Err(Error::StopBeforeStart {
                        start_ms: interval.start_ms,
                        stop_ms: now_ms,
                    });
                }
                interval.end_ms = Some(now_ms);
                debug!("Stopped activity {} at {}", index, now_ms);
                Ok(index)
            }
            _ => Err(Error::NotRecording),
        }
    }

    /// Name a stopped interval. Labels are set once
    pub fn label(&mut self, index: usize, label: ActivityLabel) -> Result<()> {
        let interval = self
            .intervals
            .get_mut(index)
            .ok_or(Error::NoActivity { index })?;
        if !interval.is_finished() {
            return Err(Error::Unfinished { index });
        }
        if interval.label.is_some() {
            return Err(Error::AlreadyLabeled { index });
        }
        interval.label = Some(label);
        info!(
            "Activity {} labeled {} ({}..{})",
            index, label, interval.start_ms, interval.end_ms.unwrap_or_default()
        );
        Ok(())
    }
}

/// Committed readings with `start_ms <= timestamp_ms < end_ms`
pub fn filter<'a>(
    channel: &'a ChannelState,
    interval: &ActivityInterval,
) -> Result<&'a [Sample]> {
    let end_ms = interval.end_ms.ok_or(Error::OpenInterval {
        start_ms: interval.start_ms,
    })?;
    let committed = channel.committed();
    // Committed readings are sorted, so both ends can be found by bisection
    let lo = committed.partition_point(|s| s.timestamp_ms < interval.start_ms);
    let hi = committed.partition_point(|s| s.timestamp_ms < end_ms);
    Ok(&committed[lo..hi.max(lo)])
}
