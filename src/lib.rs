//! # Overview
//!
//! `midicodec` is a byte-exact codec for the MIDI wire protocol and for Standard Midi Files (SMF).
//! It is meant for tooling that reads, writes or re-streams MIDI data without losing a single
//! byte, including the quirks of real hardware and of the broken files found in the wild.
//!
//! # Raw MIDI streams
//!
//! A raw MIDI stream is what travels through a MIDI cable: an undelimited sequence of bytes, with
//! running status and real-time messages sprinkled anywhere.
//! [`MessageDecoder`] turns such a stream into [`RawMessage`]s:
//!
//! ```rust
//! use midicodec::{MessageDecoder, StatusByte};
//!
//! let mut decoder = MessageDecoder::new();
//! // A NoteOn, then a second one using running status
//! let msgs = decoder.decode_all(&[0x90, 60, 127, 60, 0]);
//! assert_eq!(msgs.len(), 2);
//! assert_eq!(msgs[1].payload().as_slice(), &[60, 0]);
//! # let _ = StatusByte::TIMING_CLOCK;
//! ```
//!
//! Messages are written back with [`RawMessage::write`] or, omitting repeated statuses,
//! [`RawMessage::write_with_running_status`].
//!
//! # Standard Midi Files
//!
//! Files can be handled in three ways:
//!
//! - [`FileModel`] holds a whole file in memory, with absolute tick counts:
//!
//!   ```rust
//!   use midicodec::{FileModel, RawEvent, RawMessage, StatusByte, TimeDivision, TrackEvent};
//!
//!   let mut model = FileModel::new(TimeDivision::ticks_per_quarter_note(480).unwrap());
//!   let note_on = RawMessage::with_two(StatusByte::new(0x90).unwrap(), 60, 100).unwrap();
//!   model.tracks.push(vec![
//!       TrackEvent::new(0, RawEvent::Channel(note_on)),
//!       TrackEvent::new(480, RawEvent::end_of_track()),
//!   ]);
//!
//!   let bytes = model.to_bytes().unwrap();
//!   assert_eq!(FileModel::parse(&bytes).unwrap(), model);
//!   ```
//!
//! - [`FileReader`] pulls events out of a stream one at a time, without holding the file in
//!   memory.
//! - The [`FileSink`] trait pushes files event by event. It is implemented by the streaming
//!   [`FileWriter`], by [`FileModelBuilder`] and by [`TrackMerger`], which merges the tracks of a
//!   file into a single time-ordered track.
//!
//! # Errors
//!
//! Fatal problems are reported as [`Error`]s.
//! Recoverable ones never are: broken files are repaired and the repairs reported to a
//! [`ValidationHandler`], while anomalies in live streams are reported to a [`ProblemHandler`].
//!
//! # About features
//!
//! - The `parallel` feature (enabled by default)
//!
//!   Encodes the tracks of large [`FileModel`]s on several threads, through the `rayon`
//!   dependency.
//!
//! - The `strict` feature
//!
//!   Makes [`DefaultValidation`] reject files with any validation error, instead of repairing
//!   them.
//!
//! # Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events: every validation error and stream
//! problem at the `debug` level, skipped chunks at the `trace` level. No subscriber is installed.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{Error, Result, ResultExt},
        event::{MetaType, RawEvent, Track, TrackEvent},
        io::ReadCounter,
        merge::TrackMerger,
        message::{is_valid_payload_byte, RawMessage},
        payload::Payload,
        primitive::{encode_vlq, read_vlq, write_vlq_slice, Format, TimeDivision},
        reader::FileReader,
        sink::{FileSink, SinkState},
        status::{Channel, ChannelMessageType, PayloadLength, RunningStatus, StatusByte},
        validation::{DefaultValidation, FileValidationError, ValidationHandler},
    };
    pub(crate) use std::{fmt, io, mem, ops, sync::Arc};
    pub(crate) use tracing::{debug, trace, warn};
}

mod decoder;
mod event;
mod io;
mod merge;
mod message;
mod model;
mod payload;
mod primitive;
mod reader;
mod riff;
mod sink;
mod status;
mod validation;
mod writer;

pub use crate::{
    decoder::{Decoded, DecoderConfig, IgnoreProblems, MessageDecoder, Problem, ProblemHandler},
    error::{Error, Result},
    event::{MetaType, RawEvent, Track, TrackEvent},
    merge::TrackMerger,
    message::{is_valid_payload_byte, RawMessage},
    model::{FileModel, FileModelBuilder},
    payload::Payload,
    primitive::{Format, Fps, TimeDivision},
    reader::{FileReader, ReadState},
    sink::{FileSink, SinkState},
    status::{Channel, ChannelMessageType, PayloadLength, RunningStatus, StatusByte},
    validation::{DefaultValidation, FileValidationError, Lenient, Strict, ValidationHandler},
    writer::FileWriter,
};

/// Variable-length quantities, the integer encoding used for delta times and lengths in files.
pub mod vlq {
    pub use crate::primitive::{decode_vlq, encode_vlq, write_vlq, VLQ_MAX};

    /// Read a variable-length quantity from the start of a stream.
    pub fn read_vlq<R: std::io::Read>(src: R) -> crate::Result<u32> {
        crate::primitive::read_vlq(&mut crate::io::ReadCounter::new(src))
    }
}
