//! Rebuilds timestamped readings for every channel from the frame stream.
//!
//! Frames have to come in one at a time, in the order the watch sent them.
//! Interpolation depends on where each reading sits between its two bounding
//! timestamps, so reordering would silently shift every reading in the run.

use std::collections::HashMap;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, trace, warn};

use crate::{
    channel::{ChannelLabel, ChannelState},
    error::Result,
    frame::{classify, Frame},
    monitoring::IngestStats,
};

/// Something changed on a channel. Meant for refreshing a display
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ChannelEvent {
    Started {
        channel: ChannelLabel,
        timestamp_ms: i64,
    },
    Updated {
        channel: ChannelLabel,
        committed: usize,
        total: usize,
    },
    Desynced {
        channel: ChannelLabel,
        reason: String,
    },
}

#[derive(Default, Debug)]
pub struct Reconstructor {
    channels: HashMap<ChannelLabel, ChannelState>,
    observers: Vec<Sender<ChannelEvent>>,
    stats: IngestStats,
}

// Observers that fall behind miss events, ones that hung up are forgotten
fn notify(observers: &mut Vec<Sender<ChannelEvent>>, event: ChannelEvent) {
    observers.retain(|tx| {
        !matches!(
            tx.try_send(event.clone()),
            Err(TrySendError::Disconnected(_))
        )
    });
}

impl Reconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for channel events, holding at most `capacity` undelivered ones
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<ChannelEvent> {
        let (tx, rx) = bounded(capacity);
        self.observers.push(tx);
        rx
    }

    pub fn channel(&self, label: ChannelLabel) -> Option<&ChannelState> {
        self.channels.get(&label)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelState> {
        self.channels.values()
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Process one inbound frame.
    ///
    /// An error only concerns the frame's own channel. It is flagged as out of
    /// sync, every other channel carries on and so can the caller.
    pub fn ingest(&mut self, tag: u32, payload: &[u8]) -> Result<()> {
        self.stats.frames += 1;
        let label = match ChannelLabel::from_tag(tag) {
            Ok(label) => label,
            Err(e) => {
                self.stats.desyncs += 1;
                warn!("Dropping frame: {}", e);
                return Err(e);
            }
        };
        let result = self.apply(label, payload);
        if let Err(e) = &result {
            self.stats.desyncs += 1;
            warn!(channel = %label, "{}", e);
            if let Some(state) = self.channels.get_mut(&label) {
                state.mark_desynced();
            }
            notify(
                &mut self.observers,
                ChannelEvent::Desynced {
                    channel: label,
                    reason: e.to_string(),
                },
            );
        }
        result
    }

    fn apply(&mut self, label: ChannelLabel, payload: &[u8]) -> Result<()> {
        let frame = classify(label, self.channels.contains_key(&label), payload)?;
        self.stats.record(&frame);
        match frame {
            Frame::ChannelStart(timestamp_ms) => {
                info!(channel = %label, "Channel started at {}", timestamp_ms);
                self.channels
                    .insert(label, ChannelState::start(label, timestamp_ms));
                notify(
                    &mut self.observers,
                    ChannelEvent::Started {
                        channel: label,
                        timestamp_ms,
                    },
                );
            }
            Frame::Sample(axes) => {
                if let Some(state) = self.channels.get_mut(&label) {
                    state.push_sample(axes)?;
                    trace!(
                        channel = %label,
                        ?axes,
                        magnitude = axes.magnitude(),
                        "Buffered reading"
                    );
                }
            }
            Frame::Resync(timestamp_ms) => {
                if let Some(state) = self.channels.get_mut(&label) {
                    let committed = state.resync(timestamp_ms)?;
                    let total = state.committed().len();
                    notify(
                        &mut self.observers,
                        ChannelEvent::Updated {
                            channel: label,
                            committed,
                            total,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Flush a channel's buffered readings and trust its stream again.
    /// Returns how many readings were dropped, or `None` for an unseen channel.
    pub fn reset_channel(&mut self, label: ChannelLabel) -> Option<usize> {
        let dropped = self.channels.get_mut(&label)?.reset();
        debug!(channel = %label, dropped, "Channel reset");
        Some(dropped)
    }

    /// End the session, returning every channel in vocabulary order.
    /// Readings still waiting for a timestamp can't be placed and are discarded.
    pub fn finish(self) -> Vec<ChannelState> {
        self.stats.log();
        let mut channels: Vec<_> = self.channels.into_values().collect();
        channels.sort_by_key(|c| c.label());
        for channel in channels.iter_mut() {
            if channel.is_desynced() {
                warn!(channel = %channel.label(), "Channel ended out of sync, data may be corrupted");
            }
            let dropped = channel.reset();
            if dropped > 0 {
                warn!(
                    channel = %channel.label(),
                    "Discarding {} readings with no closing timestamp", dropped
                );
            }
        }
        channels
    }
}
