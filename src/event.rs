//! All sort of events and their parsers.

use crate::{prelude::*, validation};

/// The type byte of a meta event.
///
/// Any 7-bit value is a valid meta type; the constants name the ones defined by the SMF standard.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetaType(u8);
impl MetaType {
    pub const SEQUENCE_NUMBER: MetaType = MetaType(0x00);
    pub const TEXT: MetaType = MetaType(0x01);
    pub const COPYRIGHT: MetaType = MetaType(0x02);
    pub const TRACK_NAME: MetaType = MetaType(0x03);
    pub const INSTRUMENT_NAME: MetaType = MetaType(0x04);
    pub const LYRIC: MetaType = MetaType(0x05);
    pub const MARKER: MetaType = MetaType(0x06);
    pub const CUE_POINT: MetaType = MetaType(0x07);
    pub const PROGRAM_NAME: MetaType = MetaType(0x08);
    pub const DEVICE_NAME: MetaType = MetaType(0x09);
    pub const MIDI_CHANNEL: MetaType = MetaType(0x20);
    pub const MIDI_PORT: MetaType = MetaType(0x21);
    pub const END_OF_TRACK: MetaType = MetaType(0x2F);
    pub const TEMPO: MetaType = MetaType(0x51);
    pub const SMPTE_OFFSET: MetaType = MetaType(0x54);
    pub const TIME_SIGNATURE: MetaType = MetaType(0x58);
    pub const KEY_SIGNATURE: MetaType = MetaType(0x59);
    pub const SEQUENCER_SPECIFIC: MetaType = MetaType(0x7F);

    /// Build a meta type from its 7-bit type byte.
    pub fn new(kind: u8) -> Option<MetaType> {
        if kind < 0x80 {
            Some(MetaType(kind))
        } else {
            None
        }
    }

    /// Keep only the low 7 bits of the given byte.
    #[inline]
    pub const fn from_masked(kind: u8) -> MetaType {
        MetaType(kind & 0x7F)
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Whether this meta event belongs in the first track of a format 0 or 1 file, where it
    /// applies to the whole song.
    pub fn is_first_track_only(self) -> bool {
        matches!(
            self,
            MetaType::SEQUENCE_NUMBER
                | MetaType::TEMPO
                | MetaType::SMPTE_OFFSET
                | MetaType::TIME_SIGNATURE
        )
    }

    /// Text-like meta events, whose payload is free-form text.
    pub fn is_text(self) -> bool {
        (0x01..=0x0F).contains(&self.0)
    }
}
impl fmt::Debug for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            MetaType::SEQUENCE_NUMBER => "SequenceNumber",
            MetaType::TEXT => "Text",
            MetaType::COPYRIGHT => "Copyright",
            MetaType::TRACK_NAME => "TrackName",
            MetaType::INSTRUMENT_NAME => "InstrumentName",
            MetaType::LYRIC => "Lyric",
            MetaType::MARKER => "Marker",
            MetaType::CUE_POINT => "CuePoint",
            MetaType::PROGRAM_NAME => "ProgramName",
            MetaType::DEVICE_NAME => "DeviceName",
            MetaType::MIDI_CHANNEL => "MidiChannel",
            MetaType::MIDI_PORT => "MidiPort",
            MetaType::END_OF_TRACK => "EndOfTrack",
            MetaType::TEMPO => "Tempo",
            MetaType::SMPTE_OFFSET => "SmpteOffset",
            MetaType::TIME_SIGNATURE => "TimeSignature",
            MetaType::KEY_SIGNATURE => "KeySignature",
            MetaType::SEQUENCER_SPECIFIC => "SequencerSpecific",
            _ => return write!(f, "MetaType({:#04x})", self.0),
        };
        f.write_str(name)
    }
}

/// The body of an event in a Standard Midi File, without its timing.
///
/// Files hold three kinds of events: channel messages, escapes (SysEx packets and arbitrary
/// bytes to send over the wire) and meta events (data about the file itself).
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum RawEvent {
    /// A channel message. Only channel statuses (`0x80..=0xEF`) are allowed in files.
    Channel(RawMessage),
    /// An escape: `F0 <len> <bytes>` (`sysex == true`) or `F7 <len> <bytes>`.
    ///
    /// A SysEx escape holds the bytes after the `F0`, usually ending with `F7`. An `F7` escape is
    /// either the continuation of a split SysEx packet or a raw sequence of bytes to transmit.
    Escape { sysex: bool, payload: Payload },
    /// A meta event: `FF <kind> <len> <bytes>`.
    Meta { kind: MetaType, payload: Payload },
}
impl RawEvent {
    /// Wrap a channel message, rejecting system messages.
    pub fn channel(msg: RawMessage) -> Result<RawEvent> {
        ensure!(
            msg.is_channel_message(),
            err_invalid!("only channel messages can be stored in a track")
        );
        Ok(RawEvent::Channel(msg))
    }

    /// A SysEx escape holding the given message's data, framed with the closing `F7`.
    pub fn sysex(data: &[u8]) -> RawEvent {
        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.extend_from_slice(data);
        payload.push(StatusByte::END_OF_EXCLUSIVE.as_u8());
        RawEvent::Escape {
            sysex: true,
            payload: Payload::from_vec(payload),
        }
    }

    #[inline]
    pub fn escape(sysex: bool, payload: Payload) -> RawEvent {
        RawEvent::Escape { sysex, payload }
    }

    #[inline]
    pub fn meta(kind: MetaType, payload: Payload) -> RawEvent {
        RawEvent::Meta { kind, payload }
    }

    #[inline]
    pub fn end_of_track() -> RawEvent {
        RawEvent::Meta {
            kind: MetaType::END_OF_TRACK,
            payload: Payload::EMPTY,
        }
    }

    /// A tempo change, in microseconds per quarter note (24 bits).
    pub fn tempo(micros_per_quarter: u32) -> Result<RawEvent> {
        ensure!(
            micros_per_quarter < 1 << 24,
            err_invalid!("tempo exceeds 24 bits")
        );
        let [_, a, b, c] = micros_per_quarter.to_be_bytes();
        Ok(RawEvent::meta(MetaType::TEMPO, Payload::from([a, b, c])))
    }

    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        matches!(self, RawEvent::Meta { kind, .. } if *kind == MetaType::END_OF_TRACK)
    }

    #[inline]
    pub fn meta_type(&self) -> Option<MetaType> {
        match self {
            RawEvent::Meta { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[inline]
    pub fn as_message(&self) -> Option<&RawMessage> {
        match self {
            RawEvent::Channel(msg) => Some(msg),
            _ => None,
        }
    }

    /// The bytes of the event following its lead byte(s).
    pub fn payload(&self) -> &Payload {
        match self {
            RawEvent::Channel(msg) => msg.payload(),
            RawEvent::Escape { payload, .. } | RawEvent::Meta { payload, .. } => payload,
        }
    }

    /// Convert a wire message into a file event.
    ///
    /// Channel messages map to themselves and SysEx messages to `F0` escapes. Other system
    /// messages can only be stored as raw `F7` escapes.
    pub fn from_message(msg: RawMessage) -> RawEvent {
        if msg.is_channel_message() {
            RawEvent::Channel(msg)
        } else if msg.is_sysex() {
            RawEvent::sysex(msg.payload())
        } else {
            RawEvent::Escape {
                sysex: false,
                payload: Payload::from_vec(msg.to_bytes()),
            }
        }
    }

    /// Write the event body, omitting the status of channel messages when it matches the running
    /// status.
    ///
    /// Returns the amount of bytes written.
    pub(crate) fn write<W: io::Write>(
        &self,
        running_status: &mut RunningStatus,
        out: &mut W,
    ) -> Result<usize> {
        //Running Status rules:
        // - Channel messages (0x80 ..= 0xEF) alter and use running status
        // - Escapes (0xF0 and 0xF7) cancel and cannot use running status
        // - Meta Messages (0xFF) cancel and cannot use running status
        match self {
            RawEvent::Channel(msg) => {
                ensure!(
                    msg.is_channel_message(),
                    err_invalid!("only channel messages can be stored in a track")
                );
                let mut len = msg.payload().len();
                if !running_status.can_omit(msg.status()) {
                    out.write_all(&[msg.status().as_u8()])?;
                    len += 1;
                }
                running_status.on_new_status(msg.status());
                out.write_all(msg.payload())?;
                Ok(len)
            }
            RawEvent::Escape { sysex, payload } => {
                running_status.clear();
                out.write_all(&[if *sysex { 0xF0 } else { 0xF7 }])?;
                write_vlq_slice(out, payload)?;
                Ok(1 + vlq_len(payload.len()) + payload.len())
            }
            RawEvent::Meta { kind, payload } => {
                running_status.clear();
                out.write_all(&[0xFF, kind.as_u8()])?;
                write_vlq_slice(out, payload)?;
                Ok(2 + vlq_len(payload.len()) + payload.len())
            }
        }
    }
}

/// How many bytes a (valid) variable-length quantity takes.
fn vlq_len(int: usize) -> usize {
    match int {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
    }
}

/// An event in a track, positioned at an absolute tick count from the start of the track.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct TrackEvent {
    pub ticks: u64,
    pub event: RawEvent,
}
impl TrackEvent {
    #[inline]
    pub fn new(ticks: u64, event: RawEvent) -> TrackEvent {
        TrackEvent { ticks, event }
    }
}

/// A track is a time-ordered list of events.
pub type Track = Vec<TrackEvent>;

/// Encodes the events of one track chunk, checking them along the way.
///
/// Shared by the streaming [`FileWriter`](crate::FileWriter) and the in-memory
/// [`FileModel::write`](crate::FileModel::write).
#[derive(Debug)]
pub(crate) struct TrackEncoder {
    format: Format,
    track_index: usize,
    running_status: RunningStatus,
    /// Bytes written into the chunk body so far.
    len: u64,
    ended: bool,
}
impl TrackEncoder {
    pub fn new(format: Format, track_index: usize) -> TrackEncoder {
        TrackEncoder {
            format,
            track_index,
            running_status: RunningStatus::new(),
            len: 0,
            ended: false,
        }
    }

    /// Length of the chunk body, checked against the 32-bit chunk length field.
    pub fn chunk_len(&self) -> Result<u32> {
        u32::try_from(self.len).map_err(|_| err_invalid!("midi chunk size exceeds 32 bit range"))
    }

    #[inline]
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Write a delta-time and an event.
    pub fn push<W: io::Write, H: ValidationHandler>(
        &mut self,
        delta: u32,
        event: &RawEvent,
        handler: &mut H,
        out: &mut W,
    ) -> Result<()> {
        if self.ended {
            // Nothing can follow an End-of-Track, drop the event
            return validation::report(
                handler,
                FileValidationError::InvalidTrackTermination,
                Some(self.track_index),
            );
        }
        if let Some(kind) = event.meta_type() {
            if kind.is_first_track_only()
                && self.track_index > 0
                && !self.format.independent_tracks()
            {
                validation::report(
                    handler,
                    FileValidationError::InvalidTrackForMetaEvent,
                    Some(self.track_index),
                )?;
            }
        }
        let (buf, len) = encode_vlq(delta).context("delta time too large")?;
        out.write_all(&buf[..len])?;
        self.len += len as u64;
        self.len += event
            .write(&mut self.running_status, out)
            .context("failed to write track event")? as u64;
        self.ended = event.is_end_of_track();
        Ok(())
    }

    /// Append the End-of-Track event if the last event was not one.
    pub fn finish<W: io::Write, H: ValidationHandler>(
        &mut self,
        handler: &mut H,
        out: &mut W,
    ) -> Result<()> {
        if !self.ended() {
            self.push(0, &RawEvent::end_of_track(), handler, out)?;
        }
        Ok(())
    }
}
