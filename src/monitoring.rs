//! In this module, we implement the monitoring for the decoder.
//! This includes counting what kind of frames came through and rendering
//! the one-line summary of each channel.

use tracing::info;

use crate::{channel::ChannelState, frame::Frame};

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct IngestStats {
    pub frames: u64,
    pub channel_starts: u64,
    pub samples: u64,
    pub resyncs: u64,
    pub desyncs: u64,
}

impl IngestStats {
    pub fn record(&mut self, frame: &Frame) {
        match frame {
            Frame::ChannelStart(_) => self.channel_starts += 1,
            Frame::Resync(_) => self.resyncs += 1,
            Frame::Sample(_) => self.samples += 1,
        }
    }

    pub fn log(&self) {
        info!(
            frames = self.frames,
            channel_starts = self.channel_starts,
            samples = self.samples,
            resyncs = self.resyncs,
            desyncs = self.desyncs,
            "Ingest totals"
        );
    }
}

/// How much data a channel holds, e.g. `120 readings taken over 1m 2s 500ms`
pub fn describe(channel: &ChannelState) -> String {
    let duration = channel.duration_ms();
    format!(
        "{} readings taken over {}m {}s {}ms",
        channel.committed().len(),
        duration / 60_000,
        duration % 60_000 / 1000,
        duration % 1000
    )
}
