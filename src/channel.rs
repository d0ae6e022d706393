//! Per body-location channel state and timestamp interpolation.
//!
//! The watch only sends a timestamp every so often. Readings between two
//! timestamps are buffered and, once the closing timestamp arrives, spread
//! linearly over the span. The first buffered reading sits exactly on the
//! previous timestamp.

use std::fmt;

use tracing::trace;

use crate::{
    error::{Error, Result},
    sample::{Axes, Sample},
};

/// Where the watch is worn. Ordering must match the watchapp menu
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ChannelLabel {
    DominantWrist,
    NonDominantWrist,
    Waist,
    RightAnkle,
    LeftAnkle,
    UpperDominantArm,
    UpperNonDominantArm,
    RightThigh,
    LeftThigh,
    Chest,
    Neck,
}

impl ChannelLabel {
    pub const ALL: [ChannelLabel; 11] = [
        ChannelLabel::DominantWrist,
        ChannelLabel::NonDominantWrist,
        ChannelLabel::Waist,
        ChannelLabel::RightAnkle,
        ChannelLabel::LeftAnkle,
        ChannelLabel::UpperDominantArm,
        ChannelLabel::UpperNonDominantArm,
        ChannelLabel::RightThigh,
        ChannelLabel::LeftThigh,
        ChannelLabel::Chest,
        ChannelLabel::Neck,
    ];

    /// Map a data log tag onto the vocabulary
    pub fn from_tag(tag: u32) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(Error::UnknownChannel {
                tag,
                vocabulary: Self::ALL.len(),
            })
    }

    pub fn tag(&self) -> u32 {
        *self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelLabel::DominantWrist => "DOMINANT_WRIST",
            ChannelLabel::NonDominantWrist => "NON_DOMINANT_WRIST",
            ChannelLabel::Waist => "WAIST",
            ChannelLabel::RightAnkle => "RIGHT_ANKLE",
            ChannelLabel::LeftAnkle => "LEFT_ANKLE",
            ChannelLabel::UpperDominantArm => "UPPER_DOMINANT_ARM",
            ChannelLabel::UpperNonDominantArm => "UPPER_NON_DOMINANT_ARM",
            ChannelLabel::RightThigh => "RIGHT_THIGH",
            ChannelLabel::LeftThigh => "LEFT_THIGH",
            ChannelLabel::Chest => "CHEST",
            ChannelLabel::Neck => "NECK",
        }
    }
}

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct ChannelState {
    label: ChannelLabel,
    /// Most recent trusted timestamp, zero while unset
    last_known_timestamp_ms: i64,
    /// Timestamped readings, sorted
    committed: Vec<Sample>,
    /// Readings seen since `last_known_timestamp_ms`
    pending: Vec<Axes>,
    desynced: bool,
}

impl ChannelState {
    /// Open a channel from its start marker
    pub fn start(label: ChannelLabel, timestamp_ms: i64) -> Self {
        Self {
            label,
            last_known_timestamp_ms: timestamp_ms,
            committed: Vec::new(),
            pending: Vec::new(),
            desynced: false,
        }
    }

    pub fn label(&self) -> ChannelLabel {
        self.label
    }

    pub fn last_known_timestamp_ms(&self) -> i64 {
        self.last_known_timestamp_ms
    }

    pub fn committed(&self) -> &[Sample] {
        &self.committed
    }

    pub fn pending(&self) -> &[Axes] {
        &self.pending
    }

    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    pub(crate) fn mark_desynced(&mut self) {
        self.desynced = true;
    }

    /// Buffer a reading until the next resync gives it a timestamp
    pub fn push_sample(&mut self, axes: Axes) -> Result<()> {
        if self.last_known_timestamp_ms == 0 {
            return Err(Error::Unanchored {
                channel: self.label,
            });
        }
        self.pending.push(axes);
        Ok(())
    }

    /// Timestamp every buffered reading against the new anchor and commit them.
    /// Returns how many readings were committed.
    pub fn resync(&mut self, timestamp_ms: i64) -> Result<usize> {
        let n = self.pending.len();
        if n == 0 {
            return Err(Error::EmptyResync {
                channel: self.label,
            });
        }
        let anchor = self.last_known_timestamp_ms;
        if timestamp_ms <= anchor {
            return Err(Error::ResyncRegression {
                channel: self.label,
                anchor_ms: anchor,
                timestamp_ms,
            });
        }
        let step = (timestamp_ms - anchor) as f64 / (n + 1) as f64;
        // i * step < span for every i < n + 1, so flooring keeps us strictly before the anchor
        self.committed
            .extend(self.pending.drain(..).enumerate().map(|(i, axes)| {
                let offset = (i as f64 * step).floor() as i64;
                Sample::new(axes, anchor + offset)
            }));
        trace!(
            channel = %self.label,
            committed = n,
            step_ms = step,
            "Resynced at {}",
            timestamp_ms
        );
        self.last_known_timestamp_ms = timestamp_ms;
        Ok(n)
    }

    /// Drop buffered readings and trust the stream again
    pub fn reset(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.desynced = false;
        dropped
    }

    /// Timestamp of the first committed reading
    pub fn start_time(&self) -> Result<i64> {
        self.committed
            .first()
            .map(|s| s.timestamp_ms)
            .ok_or(Error::NoReadings {
                channel: self.label,
            })
    }

    /// Timestamp of the last committed reading
    pub fn stop_time(&self) -> Result<i64> {
        self.committed
            .last()
            .map(|s| s.timestamp_ms)
            .ok_or(Error::NoReadings {
                channel: self.label,
            })
    }

    /// Span of the committed readings in ms, zero when there are none
    pub fn duration_ms(&self) -> i64 {
        match (self.start_time(), self.stop_time()) {
            (Ok(start), Ok(stop)) => stop - start,
            _ => 0,
        }
    }
}
