//! Streaming writing of Standard Midi Files.

use crate::{event::TrackEncoder, prelude::*, validation};

/// Writes a Standard Midi File as it is pushed through the [`FileSink`] interface.
///
/// Chunk lengths and the track count are not known upfront, so placeholders are written and
/// patched by seeking back once they are known. If the writer is dropped before [`end`] is
/// called, the track count is patched on a best-effort basis.
///
/// [`end`]: FileSink::end
pub struct FileWriter<W: io::Write + io::Seek, H: ValidationHandler = DefaultValidation> {
    out: W,
    handler: H,
    state: SinkState,
    format: Format,
    /// Stream position of the `MThd` chunk.
    header_pos: u64,
    track_count: usize,
    /// Stream position of the current `MTrk` chunk length field.
    track_len_pos: u64,
    track: Option<TrackEncoder>,
}
impl<W: io::Write + io::Seek> FileWriter<W> {
    /// Create a writer using the default validation handler.
    pub fn new(out: W) -> FileWriter<W> {
        FileWriter::with_handler(out, DefaultValidation::default())
    }
}
impl<W: io::Write + io::Seek, H: ValidationHandler> FileWriter<W, H> {
    pub fn with_handler(out: W, handler: H) -> FileWriter<W, H> {
        FileWriter {
            out,
            handler,
            state: SinkState::Initial,
            format: Format::Parallel,
            header_pos: 0,
            track_count: 0,
            track_len_pos: 0,
            track: None,
        }
    }

    #[inline]
    pub fn state(&self) -> SinkState {
        self.state
    }

    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    #[inline]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Write a big-endian value at an earlier position, then come back.
    fn patch(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        let end = self.out.stream_position()?;
        self.out.seek(io::SeekFrom::Start(pos))?;
        self.out.write_all(bytes)?;
        self.out.seek(io::SeekFrom::Start(end))?;
        Ok(())
    }

    fn patch_track_count(&mut self) -> Result<()> {
        let count = u16::try_from(self.track_count)
            .map_err(|_| err_invalid!("track count exceeds 16 bit range"))?;
        // Skip "MThd", the chunk length and the format
        self.patch(self.header_pos + 10, &count.to_be_bytes())
    }
}
impl<W: io::Write + io::Seek, H: ValidationHandler> FileSink for FileWriter<W, H> {
    fn begin(&mut self, format: Format, division: TimeDivision) -> Result<()> {
        self.state.begin();
        self.format = format;
        self.header_pos = self.out.stream_position()?;
        let mut header = [0; 4 + 4 + 6];
        header[0..4].copy_from_slice(b"MThd");
        header[4..8].copy_from_slice(&6u32.to_be_bytes());
        header[8..10].copy_from_slice(&format.as_bits().to_be_bytes());
        // Track count placeholder at 10..12
        header[12..14].copy_from_slice(&division.encode());
        self.out.write_all(&header)?;
        Ok(())
    }

    fn begin_track(&mut self) -> Result<()> {
        self.state.begin_track();
        ensure!(
            self.track_count < u16::MAX as usize,
            err_invalid!("track count exceeds 16 bit range")
        );
        if self.format == Format::SingleTrack && self.track_count >= 1 {
            validation::report(
                &mut self.handler,
                FileValidationError::ExtraTracks,
                Some(self.track_count),
            )?;
        }
        self.out.write_all(b"MTrk")?;
        self.track_len_pos = self.out.stream_position()?;
        self.out.write_all(&[0; 4])?;
        self.track = Some(TrackEncoder::new(self.format, self.track_count));
        self.track_count += 1;
        Ok(())
    }

    fn add_event(&mut self, delta: u32, event: RawEvent) -> Result<()> {
        self.state.add_event(&event);
        let track = self
            .track
            .as_mut()
            .ok_or(err_invalid!("event outside of a track"))?;
        track.push(delta, &event, &mut self.handler, &mut self.out)
    }

    fn end_track(&mut self) -> Result<()> {
        self.state.end_track();
        let mut track = self
            .track
            .take()
            .ok_or(err_invalid!("end_track outside of a track"))?;
        track.finish(&mut self.handler, &mut self.out)?;
        let len = track.chunk_len()?;
        self.patch(self.track_len_pos, &len.to_be_bytes())
    }

    fn end(&mut self) -> Result<()> {
        self.state.end();
        self.patch_track_count()?;
        self.out.flush()?;
        Ok(())
    }
}
impl<W: io::Write + io::Seek, H: ValidationHandler> Drop for FileWriter<W, H> {
    fn drop(&mut self) {
        if self.state == SinkState::BetweenTracks {
            warn!(
                tracks = self.track_count,
                "smf writer dropped without calling end"
            );
            let _ = self.patch_track_count().and_then(|()| {
                self.out.flush()?;
                Ok(())
            });
        }
    }
}
impl<W: io::Write + io::Seek, H: ValidationHandler + fmt::Debug> fmt::Debug for FileWriter<W, H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FileWriter")
            .field("state", &self.state)
            .field("format", &self.format)
            .field("track_count", &self.track_count)
            .field("handler", &self.handler)
            .finish()
    }
}
