//! Pull-based reading of Standard Midi Files.

use crate::{prelude::*, riff, validation};

/// What the last call to [`FileReader::read`] found.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ReadState {
    /// The header was parsed, no track was entered yet.
    PostHeader,
    /// A new track chunk starts.
    StartOfTrack,
    /// An event was read, available through [`FileReader::event`].
    Event,
    /// The current track chunk ended.
    EndOfTrack,
    /// There are no more track chunks.
    EndOfFile,
}

/// Reads a Standard Midi File from a stream, one event at a time.
///
/// The header is parsed on construction. Each call to [`read`](#method.read) then advances to the
/// next event or chunk boundary.
///
/// Recoverable anomalies are reported to the validation handler `H` and repaired as documented in
/// [`FileValidationError`]. Broken structure (bad magic, truncated events, invalid lead bytes) is
/// a fatal [`Error`].
///
/// Unknown chunks are skipped by seeking over them, and `RIFF RMID` wrapped files are unwrapped
/// transparently.
pub struct FileReader<R, H = DefaultValidation> {
    src: ReadCounter<R>,
    handler: H,
    format: Format,
    division: TimeDivision,
    declared_tracks: u16,
    state: ReadState,
    /// Track chunks entered so far.
    track_count: usize,
    chunk_end: u64,
    running_status: RunningStatus,
    /// The last channel status seen in this track, even if running status was cancelled since.
    last_channel_status: Option<StatusByte>,
    /// An `F0` packet is waiting for its closing `F7`.
    sysex_open: bool,
    end_of_track_seen: bool,
    event: Option<RawEvent>,
    delta: u32,
    ticks: u64,
}
impl<R: io::Read + io::Seek> FileReader<R> {
    /// Start reading a file, using the default validation handler.
    pub fn new(src: R) -> Result<FileReader<R>> {
        FileReader::with_handler(src, DefaultValidation::default())
    }
}
impl<R: io::Read + io::Seek, H: ValidationHandler> FileReader<R, H> {
    /// Start reading a file, reporting validation errors to the given handler.
    pub fn with_handler(src: R, handler: H) -> Result<FileReader<R, H>> {
        let mut reader = FileReader {
            src: ReadCounter::new(src),
            handler,
            format: Format::Parallel,
            division: TimeDivision::default(),
            declared_tracks: 0,
            state: ReadState::PostHeader,
            track_count: 0,
            chunk_end: 0,
            running_status: RunningStatus::new(),
            last_channel_status: None,
            sysex_open: false,
            end_of_track_seen: false,
            event: None,
            delta: 0,
            ticks: 0,
        };
        reader.read_header().context("failed to read smf header")?;
        Ok(reader)
    }

    fn report(&mut self, error: FileValidationError) -> Result<()> {
        let track = self.track_count.checked_sub(1);
        validation::report(&mut self.handler, error, track)
    }

    /// Find the `MThd` chunk, skipping anything before it.
    fn read_header(&mut self) -> Result<()> {
        loop {
            let mut header = [0; 8];
            let read = self.src.read_up_to(&mut header)?;
            ensure!(read == header.len(), err_invalid!("no header chunk"));
            let (id, len) = header.split_at(4);
            let len_bytes = [len[0], len[1], len[2], len[3]];
            match id {
                b"RIFF" => riff::enter_rmid(&mut self.src, len_bytes)?,
                b"MThd" => {
                    let len = u32::from_be_bytes(len_bytes) as u64;
                    ensure!(len >= 6, err_invalid!("header chunk too short"));
                    let format = self.src.read_u16()?;
                    self.declared_tracks = self.src.read_u16()?;
                    self.division = TimeDivision::from_raw(self.src.read_u16()?);
                    if len > 6 {
                        trace!(extra = len - 6, "skipping extra header bytes");
                        self.src.skip(len - 6)?;
                    }
                    self.format = match Format::from_bits(format) {
                        Some(format) => format,
                        None => {
                            self.report(FileValidationError::InvalidMThdFormat)?;
                            Format::Parallel
                        }
                    };
                    if self.format == Format::SingleTrack && self.declared_tracks > 1 {
                        self.report(FileValidationError::ExtraTracks)?;
                    }
                    if !self.division.is_valid() {
                        self.report(FileValidationError::InvalidMThdTimeDivision)?;
                    }
                    return Ok(());
                }
                _ => {
                    let len = u32::from_be_bytes(len_bytes) as u64;
                    trace!(id = ?String::from_utf8_lossy(id), len, "skipping chunk before header");
                    self.src.skip(len)?;
                }
            }
        }
    }

    /// Advance to the next event or chunk boundary.
    ///
    /// Once `EndOfFile` is reached, every further call returns `EndOfFile` again.
    pub fn read(&mut self) -> Result<ReadState> {
        self.event = None;
        self.state = match self.state {
            ReadState::PostHeader | ReadState::EndOfTrack => self.next_track()?,
            ReadState::StartOfTrack | ReadState::Event => self
                .next_event()
                .context("failed to read track event")?,
            ReadState::EndOfFile => ReadState::EndOfFile,
        };
        Ok(self.state)
    }

    /// Move to the next `MTrk` chunk, skipping other chunks.
    fn next_track(&mut self) -> Result<ReadState> {
        loop {
            let mut header = [0; 8];
            match self.src.read_up_to(&mut header)? {
                0 => {
                    if self.track_count < self.declared_tracks as usize {
                        debug!(
                            declared = self.declared_tracks,
                            found = self.track_count,
                            "file ended before the declared track count"
                        );
                    }
                    return Ok(ReadState::EndOfFile);
                }
                8 => {}
                read => {
                    debug!(read, "partial chunk header at end of file");
                    return Ok(ReadState::EndOfFile);
                }
            }
            let (id, len) = header.split_at(4);
            let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as u64;
            match id {
                b"MTrk" => {
                    self.track_count += 1;
                    if self.track_count > self.declared_tracks as usize {
                        self.report(FileValidationError::ExtraTracks)?;
                    }
                    trace!(track = self.track_count - 1, len, "entering track chunk");
                    self.chunk_end = self.src.position() + len;
                    self.running_status.clear();
                    self.last_channel_status = None;
                    self.sysex_open = false;
                    self.end_of_track_seen = false;
                    self.delta = 0;
                    self.ticks = 0;
                    return Ok(ReadState::StartOfTrack);
                }
                b"MThd" => {
                    self.report(FileValidationError::MultipleMThdChunks)?;
                    self.src.skip(len)?;
                }
                _ => {
                    trace!(id = ?String::from_utf8_lossy(id), len, "skipping unknown chunk");
                    self.src.skip(len)?;
                }
            }
        }
    }

    fn next_event(&mut self) -> Result<ReadState> {
        if self.src.position() >= self.chunk_end {
            if self.end_of_track_seen {
                return Ok(ReadState::EndOfTrack);
            }
            // Close the track properly
            if self.sysex_open {
                self.sysex_open = false;
                self.report(FileValidationError::UnterminatedSysEx)?;
            }
            self.report(FileValidationError::InvalidTrackTermination)?;
            self.end_of_track_seen = true;
            self.delta = 0;
            self.event = Some(RawEvent::end_of_track());
            return Ok(ReadState::Event);
        }
        if self.end_of_track_seen {
            self.report(FileValidationError::InvalidTrackTermination)?;
            let rest = self.chunk_end - self.src.position();
            trace!(rest, "skipping bytes after end of track");
            self.src.skip(rest)?;
            return Ok(ReadState::EndOfTrack);
        }
        let delta = read_vlq(&mut self.src)?;
        let event = self.read_event_body()?;
        ensure!(
            self.src.position() <= self.chunk_end,
            err_invalid!("track event overruns its chunk")
        );
        self.delta = delta;
        self.ticks += delta as u64;
        self.event = Some(event);
        Ok(ReadState::Event)
    }

    fn read_event_body(&mut self) -> Result<RawEvent> {
        let lead = self.src.read_u8()?;
        match lead {
            0x00..=0x7F => {
                let status = match self.running_status.get() {
                    Some(status) => status,
                    None => {
                        let status = self
                            .last_channel_status
                            .ok_or(err_invalid!("event with no status and no running status"))?;
                        self.report(FileValidationError::RunningStatusInvalidated)?;
                        self.running_status.on_new_status(status);
                        status
                    }
                };
                self.read_channel_event(status, Some(lead))
            }
            0x80..=0xEF => {
                let status = StatusByte::new(lead).ok_or(err_invalid!("not a status byte"))?;
                self.running_status.on_new_status(status);
                self.last_channel_status = Some(status);
                self.read_channel_event(status, None)
            }
            0xF0 | 0xF7 => {
                self.running_status.clear();
                let len = read_vlq(&mut self.src)?;
                let payload = self.read_event_payload(len)?;
                let terminated = payload.last() == Some(&0xF7);
                if lead == 0xF0 {
                    if self.sysex_open {
                        self.report(FileValidationError::UnterminatedSysEx)?;
                    }
                    self.sysex_open = !terminated;
                } else if terminated {
                    // Last part of a split packet
                    self.sysex_open = false;
                }
                Ok(RawEvent::Escape {
                    sysex: lead == 0xF0,
                    payload,
                })
            }
            0xFF => {
                self.running_status.clear();
                let mut kind = self.src.read_u8()?;
                if kind >= 0x80 {
                    self.report(FileValidationError::InvalidMessageData)?;
                    kind &= 0x7F;
                }
                let kind = MetaType::from_masked(kind);
                let len = read_vlq(&mut self.src)?;
                let payload = self.read_event_payload(len)?;
                if kind.is_first_track_only()
                    && self.track_count > 1
                    && !self.format.independent_tracks()
                {
                    self.report(FileValidationError::InvalidTrackForMetaEvent)?;
                }
                if kind == MetaType::END_OF_TRACK {
                    if self.sysex_open {
                        self.sysex_open = false;
                        self.report(FileValidationError::UnterminatedSysEx)?;
                    }
                    self.end_of_track_seen = true;
                }
                Ok(RawEvent::Meta { kind, payload })
            }
            0xF1..=0xF6 => bail!(err_invalid!(
                "standard midi files cannot contain system common events"
            )),
            0xF8..=0xFE => bail!(err_invalid!(
                "standard midi files cannot contain system realtime events"
            )),
        }
    }

    /// Read the body of an escape or meta event, which must fit in the current chunk.
    fn read_event_payload(&mut self, len: u32) -> Result<Payload> {
        let left = self.chunk_end.saturating_sub(self.src.position());
        ensure!(
            len as u64 <= left,
            err_invalid!("track event overruns its chunk")
        );
        self.src.read_payload(len as usize)
    }

    /// Read the data bytes of a channel event, the first of which may already be known.
    fn read_channel_event(&mut self, status: StatusByte, first: Option<u8>) -> Result<RawEvent> {
        if self.sysex_open {
            self.sysex_open = false;
            self.report(FileValidationError::UnterminatedSysEx)?;
        }
        let len = status.payload_len().fixed().unwrap_or(0);
        let mut data = [0; 2];
        let mut start = 0;
        if let Some(first) = first {
            data[0] = first;
            start = 1;
        }
        if len > start {
            self.src.read_exact(&mut data[start..len])?;
        }
        for byte in &mut data[..len] {
            if !is_valid_payload_byte(*byte) {
                self.report(FileValidationError::InvalidMessageData)?;
                *byte &= 0x7F;
            }
        }
        Ok(RawEvent::Channel(RawMessage::new_unchecked(
            status,
            Payload::from_slice(&data[..len]),
        )))
    }

    /// The event found by the last call to `read`, if it returned `Event`.
    #[inline]
    pub fn event(&self) -> Option<&RawEvent> {
        self.event.as_ref()
    }

    /// Take ownership of the event found by the last call to `read`.
    #[inline]
    pub fn take_event(&mut self) -> Option<RawEvent> {
        self.event.take()
    }

    /// Ticks between the current event and the previous one in the same track.
    #[inline]
    pub fn delta(&self) -> u32 {
        self.delta
    }

    /// Ticks from the start of the current track to the current event.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The index of the current track, if a track was entered.
    #[inline]
    pub fn track_index(&self) -> Option<usize> {
        self.track_count.checked_sub(1)
    }

    #[inline]
    pub fn state(&self) -> ReadState {
        self.state
    }

    /// The file format. Invalid formats read as [`Format::Parallel`].
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn time_division(&self) -> TimeDivision {
        self.division
    }

    /// The track count written in the header, which may not match the actual track chunks.
    #[inline]
    pub fn declared_track_count(&self) -> u16 {
        self.declared_tracks
    }

    #[inline]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    #[inline]
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Read the whole file, pushing its contents into a sink.
    ///
    /// Must be called right after construction, before any call to `read`.
    pub fn read_to_sink<S: FileSink>(&mut self, mut sink: S) -> Result<()> {
        assert_eq!(
            self.state,
            ReadState::PostHeader,
            "read_to_sink called after reading started"
        );
        sink.begin(self.format, self.division)?;
        loop {
            match self.read()? {
                ReadState::StartOfTrack => sink.begin_track()?,
                ReadState::Event => {
                    if let Some(event) = self.event.take() {
                        sink.add_event(self.delta, event)?;
                    }
                }
                ReadState::EndOfTrack => sink.end_track()?,
                ReadState::EndOfFile => break,
                ReadState::PostHeader => {}
            }
        }
        sink.end()
    }
}
impl<R, H: fmt::Debug> fmt::Debug for FileReader<R, H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("format", &self.format)
            .field("division", &self.division)
            .field("state", &self.state)
            .field("track_index", &self.track_count.checked_sub(1))
            .field("ticks", &self.ticks)
            .field("handler", &self.handler)
            .finish()
    }
}
