//! This module contains all the capture logic

// The capture thread will do one thing: pull recorded frames off the
// transport, and that's it. The records go through an rtrb ring buffer to the
// decoder on another thread. The ring is single producer, single consumer, so
// frames reach the decoder in exactly the order they were read.

use std::{
    io::{self, Read},
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use tracing::{debug, warn};

use crate::{reconstruct::Reconstructor, FRAME_SIZE, RECORD_SIZE, TAG_SIZE};

pub type RecordBytes = [u8; RECORD_SIZE];

/// Split a record into its channel tag and payload
pub fn split_record(record: &RecordBytes) -> (u32, &[u8]) {
    let (tag, payload) = record.split_at(TAG_SIZE);
    (u32::from_be_bytes([tag[0], tag[1], tag[2], tag[3]]), payload)
}

pub fn encode_record(tag: u32, frame: &[u8; FRAME_SIZE]) -> RecordBytes {
    let mut record = [0u8; RECORD_SIZE];
    record[..TAG_SIZE].copy_from_slice(&tag.to_be_bytes());
    record[TAG_SIZE..].copy_from_slice(frame);
    record
}

// Like read_exact, but tells us how far it got before EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Push records into the ring until EOF or until `running` is cleared.
/// Returns how many records were captured.
///
/// `running` is checked between records. A read blocked on an idle pipe or
/// terminal is restarted after a signal, so clearing `running` takes effect
/// once the next record (or EOF) arrives.
pub fn capture_records<R: Read>(
    mut reader: R,
    producer: &mut rtrb::Producer<RecordBytes>,
    running: &AtomicBool,
) -> io::Result<u64> {
    let mut captured = 0u64;
    while running.load(Ordering::Relaxed) {
        let mut record = [0u8; RECORD_SIZE];
        let filled = read_full(&mut reader, &mut record)?;
        if filled == 0 {
            break;
        }
        // Skip bad records, there is nothing after them anyway
        if filled != RECORD_SIZE {
            warn!(
                "Skipping truncated record ({} of {} bytes)",
                filled, RECORD_SIZE
            );
            break;
        }
        // Never drop a frame, wait for the decoder to make room
        while let Err(rtrb::PushError::Full(r)) = producer.push(record) {
            record = r;
            std::hint::spin_loop();
        }
        captured += 1;
    }
    debug!("Captured {} records", captured);
    Ok(captured)
}

/// Ingest records until the producer hangs up and the ring is drained
pub fn consume_records(
    mut consumer: rtrb::Consumer<RecordBytes>,
    reconstructor: &mut Reconstructor,
) {
    loop {
        match consumer.pop() {
            Ok(record) => {
                let (tag, payload) = split_record(&record);
                // Errors only touch one channel and are logged by the reconstructor
                let _ = reconstructor.ingest(tag, payload);
            }
            Err(_) => {
                if consumer.is_abandoned() && consumer.is_empty() {
                    break;
                }
                std::hint::spin_loop();
            }
        }
    }
}

/// Run capture and decode on their own threads until the input is exhausted
/// or `running` is cleared
pub fn run_session<R: Read + Send>(
    reader: R,
    capacity: usize,
    running: &AtomicBool,
    reconstructor: &mut Reconstructor,
) -> io::Result<u64> {
    let (mut producer, consumer) = rtrb::RingBuffer::new(capacity);
    thread::scope(|s| {
        // The producer is dropped when this thread ends, which lets the consumer finish
        let capture = s.spawn(move || capture_records(reader, &mut producer, running));
        consume_records(consumer, reconstructor);
        capture.join().unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "capture thread panicked",
            ))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::ChannelLabel,
        frame::{encode_axes, encode_timestamp},
        Axes,
    };
    use std::io::Cursor;

    fn recording(readings_per_sync: usize, syncs: usize) -> Vec<u8> {
        let mut log = Vec::new();
        for tag in [2u32, 9] {
            log.extend(encode_record(tag, &encode_timestamp(10_000)));
        }
        let mut t = 10_000;
        for _ in 0..syncs {
            for i in 0..readings_per_sync {
                for tag in [2u32, 9] {
                    let axes = Axes::new(i as i16, tag as i16, -(i as i16));
                    log.extend(encode_record(tag, &encode_axes(axes)));
                }
            }
            t += 1000;
            for tag in [2u32, 9] {
                log.extend(encode_record(tag, &encode_timestamp(t)));
            }
        }
        log
    }

    #[test]
    fn test_split_record() {
        let record = encode_record(7, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(record, [0, 0, 0, 7, 1, 2, 3, 4, 5, 6]);
        assert_eq!(split_record(&record), (7, &[1u8, 2, 3, 4, 5, 6][..]));
    }

    #[test]
    fn test_run_session() {
        let log = recording(9, 50);
        let running = AtomicBool::new(true);
        let mut rec = Reconstructor::new();
        // Small ring so the capture thread has to wait on the decoder
        let captured = run_session(Cursor::new(log), 4, &running, &mut rec).unwrap();
        assert_eq!(captured, 2 + 50 * (9 * 2 + 2));
        for label in [ChannelLabel::Waist, ChannelLabel::Chest] {
            let ch = rec.channel(label).unwrap();
            assert_eq!(ch.committed().len(), 450);
            assert_eq!(ch.committed()[1].timestamp_ms, 10_100);
            assert!(!ch.is_desynced());
        }
    }

    #[test]
    fn test_truncated_tail() {
        let mut log = recording(1, 1);
        log.extend([0, 0, 0, 2, 0x80]);
        let running = AtomicBool::new(true);
        let mut rec = Reconstructor::new();
        let captured = run_session(Cursor::new(log), 16, &running, &mut rec).unwrap();
        assert_eq!(captured, 6);
        assert_eq!(rec.stats().frames, 6);
    }

    // Hands out its records one at a time and clears `running` after the first
    struct StopAfterFirst<'a> {
        log: Cursor<Vec<u8>>,
        running: &'a AtomicBool,
    }

    impl Read for StopAfterFirst<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(RECORD_SIZE);
            let read = self.log.read(&mut buf[..n])?;
            if self.log.position() >= RECORD_SIZE as u64 {
                self.running.store(false, Ordering::Relaxed);
            }
            Ok(read)
        }
    }

    #[test]
    fn test_stop_between_records() {
        let running = AtomicBool::new(true);
        let reader = StopAfterFirst {
            log: Cursor::new(recording(1, 1)),
            running: &running,
        };
        let mut rec = Reconstructor::new();
        let captured = run_session(reader, 16, &running, &mut rec).unwrap();
        // The record in flight is finished, nothing after it is read
        assert_eq!(captured, 1);
        assert_eq!(rec.channels().count(), 1);
    }

    #[test]
    fn test_stopped_before_start() {
        let running = AtomicBool::new(false);
        let mut rec = Reconstructor::new();
        let captured = run_session(Cursor::new(recording(1, 1)), 16, &running, &mut rec).unwrap();
        assert_eq!(captured, 0);
        assert_eq!(rec.channels().count(), 0);
    }
}
