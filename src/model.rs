//! In-memory Standard Midi Files.

use crate::{event::TrackEncoder, prelude::*};
use std::path::Path;

/// How many encoded bytes are worth spreading over several threads.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// Rough average size of an encoded event.
#[cfg(feature = "parallel")]
const EVENTS_TO_BYTES: usize = 3;

/// A whole Standard Midi File, held in memory.
///
/// Events are stored with absolute tick counts, measured from the start of their track.
///
/// The file format is implied by the contents: independent tracks are written as format 2, a
/// single track as format 0, anything else as format 1.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct FileModel {
    /// Whether each track is an independent sequence (format 2).
    pub independent_tracks: bool,
    pub time_division: TimeDivision,
    pub tracks: Vec<Track>,
}
impl FileModel {
    pub fn new(time_division: TimeDivision) -> FileModel {
        FileModel {
            independent_tracks: false,
            time_division,
            tracks: Vec::new(),
        }
    }

    /// Read a file from a seekable stream, using the default validation handler.
    pub fn read<R: io::Read + io::Seek>(src: R) -> Result<FileModel> {
        FileModel::read_with_handler(src, DefaultValidation::default())
    }

    pub fn read_with_handler<R, H>(src: R, handler: H) -> Result<FileModel>
    where
        R: io::Read + io::Seek,
        H: ValidationHandler,
    {
        let mut builder = FileModelBuilder::new();
        FileReader::with_handler(src, handler)?.read_to_sink(&mut builder)?;
        builder.finish()
    }

    /// Parse a file held in memory.
    pub fn parse(raw: &[u8]) -> Result<FileModel> {
        FileModel::read(io::Cursor::new(raw))
    }

    /// Read a file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileModel> {
        let file = std::fs::File::open(path.as_ref()).context("failed to open midi file")?;
        FileModel::read(io::BufReader::new(file))
    }

    /// The format this model is written as.
    pub fn format(&self) -> Format {
        if self.independent_tracks {
            Format::Sequential
        } else if self.tracks.len() == 1 {
            Format::SingleTrack
        } else {
            Format::Parallel
        }
    }

    /// Push the whole model into a sink.
    pub fn feed<S: FileSink>(&self, mut sink: S) -> Result<()> {
        sink.begin(self.format(), self.time_division)?;
        for track in &self.tracks {
            sink.begin_track()?;
            let mut last = 0;
            for ev in track {
                sink.add_event(delta_between(last, ev.ticks)?, ev.event.clone())?;
                last = ev.ticks;
            }
            sink.end_track()?;
        }
        sink.end()
    }

    /// Encode the model into any writer, using the default validation handler.
    ///
    /// No seeking is needed: tracks are encoded in memory first, on several threads if the
    /// `parallel` feature is enabled and the file is large enough to make it worth it.
    pub fn write<W: io::Write>(&self, out: &mut W) -> Result<()> {
        self.write_with_handler(out, &mut DefaultValidation::default())
    }

    pub fn write_with_handler<W, H>(&self, out: &mut W, handler: &mut H) -> Result<()>
    where
        W: io::Write,
        H: ValidationHandler,
    {
        let format = self.format();
        let track_count = u16::try_from(self.tracks.len())
            .map_err(|_| err_invalid!("track count exceeds 16 bit range"))?;
        //Write the header first
        let mut header = [0; 4 + 4 + 6];
        header[0..4].copy_from_slice(b"MThd");
        header[4..8].copy_from_slice(&6u32.to_be_bytes());
        header[8..10].copy_from_slice(&format.as_bits().to_be_bytes());
        header[10..12].copy_from_slice(&track_count.to_be_bytes());
        header[12..14].copy_from_slice(&self.time_division.encode());
        out.write_all(&header)?;

        //Try to write the file in parallel
        #[cfg(feature = "parallel")]
        {
            let event_count = self.tracks.iter().map(Vec::len).sum::<usize>();
            if event_count * EVENTS_TO_BYTES > PARALLEL_ENABLE_THRESHOLD {
                use rayon::prelude::*;

                //Write out the tracks in parallel into several different buffers
                let mut track_chunks = Vec::new();
                self.tracks
                    .par_iter()
                    .enumerate()
                    .map(|(idx, track)| {
                        let mut errors = Vec::new();
                        let mut chunk = Vec::new();
                        let mut collect = |err: FileValidationError| errors.push(err);
                        let result = encode_track(format, idx, track, &mut collect, &mut chunk);
                        (errors, result.map(|()| chunk))
                    })
                    .collect_into_vec(&mut track_chunks);

                //Replay validation errors and write down the tracks sequentially and in order
                for (errors, chunk) in track_chunks {
                    for err in errors {
                        handler.report(err)?;
                    }
                    out.write_all(&chunk?)?;
                }
                return Ok(());
            }
        }

        //Write the tracks into a buffer before writing out to the file
        let mut chunk = Vec::new();
        for (idx, track) in self.tracks.iter().enumerate() {
            chunk.clear();
            encode_track(format, idx, track, handler, &mut chunk)?;
            out.write_all(&chunk)?;
        }
        Ok(())
    }

    /// Encode the model into a new buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Write the model to a file on disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fn save_impl(model: &FileModel, path: &Path) -> Result<()> {
            use std::io::Write;

            let file = std::fs::File::create(path).context("failed to create midi file")?;
            let mut out = io::BufWriter::new(file);
            model.write(&mut out)?;
            out.flush()?;
            Ok(())
        }
        save_impl(self, path.as_ref())
    }

    /// Merge all tracks into a single, time-ordered track.
    ///
    /// Simultaneous events keep their track order, then their order within the track.
    pub fn merged(&self) -> Result<FileModel> {
        let mut merger = TrackMerger::new(FileModelBuilder::new());
        self.feed(&mut merger)?;
        merger.into_inner().finish()
    }
}

fn delta_between(last: u64, ticks: u64) -> Result<u32> {
    let delta = ticks
        .checked_sub(last)
        .ok_or(err_invalid!("track events out of order"))?;
    u32::try_from(delta).map_err(|_| err_invalid!("delta time too large"))
}

/// Encode a whole `MTrk` chunk into a buffer.
fn encode_track<H: ValidationHandler>(
    format: Format,
    idx: usize,
    track: &[TrackEvent],
    handler: &mut H,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.extend_from_slice(b"MTrk\0\0\0\0");
    let mut encoder = TrackEncoder::new(format, idx);
    let mut last = 0;
    for ev in track {
        encoder.push(delta_between(last, ev.ticks)?, &ev.event, handler, out)?;
        last = ev.ticks;
    }
    encoder.finish(handler, out)?;
    let len = encoder.chunk_len()?;
    out[4..8].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Builds a [`FileModel`] from events pushed through the [`FileSink`] interface.
///
/// Delta times are accumulated into absolute tick counts.
#[derive(Clone, Debug, Default)]
pub struct FileModelBuilder {
    state: SinkState,
    model: FileModel,
    ticks: u64,
}
impl FileModelBuilder {
    pub fn new() -> FileModelBuilder {
        FileModelBuilder::default()
    }

    #[inline]
    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Take the finished model.
    ///
    /// Fails if the sink was not ended.
    pub fn finish(self) -> Result<FileModel> {
        ensure!(
            self.state == SinkState::Ended,
            err_invalid!("file model is incomplete")
        );
        Ok(self.model)
    }

    fn current_track(&mut self) -> Result<&mut Track> {
        self.model
            .tracks
            .last_mut()
            .ok_or(err_invalid!("event outside of a track"))
    }
}
impl FileSink for FileModelBuilder {
    fn begin(&mut self, format: Format, division: TimeDivision) -> Result<()> {
        self.state.begin();
        self.model.independent_tracks = format.independent_tracks();
        self.model.time_division = division;
        Ok(())
    }

    fn begin_track(&mut self) -> Result<()> {
        self.state.begin_track();
        self.model.tracks.push(Track::new());
        self.ticks = 0;
        Ok(())
    }

    fn add_event(&mut self, delta: u32, event: RawEvent) -> Result<()> {
        self.state.add_event(&event);
        self.ticks += delta as u64;
        let ticks = self.ticks;
        self.current_track()?.push(TrackEvent::new(ticks, event));
        Ok(())
    }

    fn end_track(&mut self) -> Result<()> {
        if self.state.end_track() {
            let ticks = self.ticks;
            self.current_track()?
                .push(TrackEvent::new(ticks, RawEvent::end_of_track()));
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.state.end();
        Ok(())
    }
}
