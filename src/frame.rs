//! Classification of raw data log frames.
//!
//! Each frame is six bytes. If the top bit of the first byte is set the frame
//! carries a timestamp in the remaining bits, sign extended from bit 46, so
//! timestamps up to 2^46 - 1 ms fit. Otherwise it carries three
//! big-endian axis readings, the first of which loses its top bit to the tag.

use crate::{
    channel::ChannelLabel, decode_be, has_tag, strip_tag, Axes, Error, Result, FRAME_SIZE,
    TAG_BIT,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Frame {
    /// First frame ever seen on a channel
    ChannelStart(i64),
    Resync(i64),
    Sample(Axes),
}

fn decode_timestamp(payload: &[u8; FRAME_SIZE]) -> i64 {
    let mut bytes = *payload;
    bytes[0] = strip_tag(bytes[0]);
    decode_be(&bytes)
}

fn decode_axes(payload: &[u8; FRAME_SIZE]) -> Axes {
    // Two bytes always fit
    let axis = |hi: u8, lo: u8| decode_be(&[hi, lo]) as i16;
    Axes::new(
        axis(strip_tag(payload[0]), payload[1]),
        axis(payload[2], payload[3]),
        axis(payload[4], payload[5]),
    )
}

/// Decide what a frame for `channel` means.
///
/// Only the first [`FRAME_SIZE`] bytes are read. A channel that hasn't been
/// seen yet must open with a timestamp, anything else means the stream is out
/// of sync and nothing should be buffered for it.
pub fn classify(channel: ChannelLabel, channel_known: bool, payload: &[u8]) -> Result<Frame> {
    let payload: &[u8; FRAME_SIZE] = payload
        .get(..FRAME_SIZE)
        .and_then(|p| p.try_into().ok())
        .ok_or(Error::ShortFrame {
            expected: FRAME_SIZE,
            actual: payload.len(),
        })?;
    let tagged = has_tag(payload[0]);
    match (channel_known, tagged) {
        (false, true) => Ok(Frame::ChannelStart(decode_timestamp(payload))),
        (false, false) => Err(Error::MissingStartMarker { channel }),
        (true, true) => Ok(Frame::Resync(decode_timestamp(payload))),
        (true, false) => Ok(Frame::Sample(decode_axes(payload))),
    }
}

/// Pack a timestamp the way the watch does. Bit 46 is read back as the sign,
/// so only timestamps in `0..2^46` come back unchanged.
pub fn encode_timestamp(timestamp_ms: i64) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame.copy_from_slice(&timestamp_ms.to_be_bytes()[8 - FRAME_SIZE..]);
    frame[0] |= TAG_BIT;
    frame
}

/// Pack a reading the way the watch does. `x` must fit in 15 bits.
pub fn encode_axes(axes: Axes) -> [u8; FRAME_SIZE] {
    let [x0, x1] = axes.x.to_be_bytes();
    let [y0, y1] = axes.y.to_be_bytes();
    let [z0, z1] = axes.z.to_be_bytes();
    [x0 & !TAG_BIT, x1, y0, y1, z0, z1]
}
