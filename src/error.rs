//! Error types for frame decoding, activity segmentation and export

use thiserror::Error;

use crate::channel::ChannelLabel;

/// How far an error reaches
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// The stream for one channel can't be trusted until that channel is reset
    Desync,
    /// A call was made out of order, nothing changed
    Usage,
    /// The export target couldn't be written, in-memory state is untouched
    Resource,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{tag} is not a valid data log tag (vocabulary has {vocabulary} channels)")]
    UnknownChannel { tag: u32, vocabulary: usize },

    #[error("Frame too short: expected {expected} bytes, got {actual}")]
    ShortFrame { expected: usize, actual: usize },

    #[error("Data buffer for {channel} is out of sync: first frame must be a timestamp")]
    MissingStartMarker { channel: ChannelLabel },

    #[error("No starting timestamp set on {channel}")]
    Unanchored { channel: ChannelLabel },

    #[error("No readings buffered on {channel}, cannot add timestamp")]
    EmptyResync { channel: ChannelLabel },

    #[error("Resync on {channel} does not advance: {timestamp_ms} <= {anchor_ms}")]
    ResyncRegression {
        channel: ChannelLabel,
        anchor_ms: i64,
        timestamp_ms: i64,
    },

    #[error("An activity is already being recorded")]
    AlreadyRecording,

    #[error("No activity is being recorded")]
    NotRecording,

    #[error("Activity cannot stop at {stop_ms} before it started at {start_ms}")]
    StopBeforeStart { start_ms: i64, stop_ms: i64 },

    #[error("Activity {index} is incomplete, end time unavailable")]
    Unfinished { index: usize },

    #[error("Activity started at {start_ms} is incomplete, end time unavailable")]
    OpenInterval { start_ms: i64 },

    #[error("Activity {index} is already labeled")]
    AlreadyLabeled { index: usize },

    #[error("No activity at index {index}")]
    NoActivity { index: usize },

    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Invalid activity span: {0}")]
    InvalidSpan(String),

    #[error("No readings on {channel}, cannot determine bounds")]
    NoReadings { channel: ChannelLabel },

    #[error("Save path {0} exists, but is not a directory")]
    NotADirectory(String),

    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownChannel { .. }
            | Error::ShortFrame { .. }
            | Error::MissingStartMarker { .. }
            | Error::Unanchored { .. }
            | Error::EmptyResync { .. }
            | Error::ResyncRegression { .. } => ErrorKind::Desync,
            Error::AlreadyRecording
            | Error::NotRecording
            | Error::StopBeforeStart { .. }
            | Error::Unfinished { .. }
            | Error::OpenInterval { .. }
            | Error::AlreadyLabeled { .. }
            | Error::NoActivity { .. }
            | Error::UnknownActivity(_)
            | Error::InvalidSpan(_)
            | Error::NoReadings { .. } => ErrorKind::Usage,
            Error::NotADirectory(_) | Error::Io(_) => ErrorKind::Resource,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
