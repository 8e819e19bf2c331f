use midicodec::{
    FileModel, FileModelBuilder, FileReader, FileSink, FileValidationError, FileWriter, Format,
    MessageDecoder, MetaType, Payload, RawEvent, RawMessage, ReadState, RunningStatus, Strict,
    TimeDivision, TrackMerger,
};
use pretty_assertions::assert_eq;
use std::io::Cursor;

/// A small two-track song built through the sink interface.
fn build_song<S: FileSink>(mut sink: S) -> midicodec::Result<()> {
    let note = |status: u8, key: u8, vel: u8| RawMessage::decode(&[status, key, vel]);
    sink.begin(Format::Parallel, TimeDivision::ticks_per_quarter_note(480)?)?;

    sink.begin_track()?;
    sink.add_meta_event(0, MetaType::TRACK_NAME, Payload::from_slice(b"conductor"))?;
    sink.add_event(0, RawEvent::tempo(500_000)?)?;
    sink.add_meta_event(0, MetaType::TIME_SIGNATURE, Payload::from_slice(&[4, 2, 24, 8]))?;
    sink.end_track()?;

    sink.begin_track()?;
    sink.add_channel_event(0, RawMessage::decode(&[0xC0, 19])?)?;
    for (i, key) in [60, 64, 67, 72].iter().enumerate() {
        sink.add_channel_event(if i == 0 { 0 } else { 240 }, note(0x90, *key, 90)?)?;
        sink.add_channel_event(240, note(0x90, *key, 0)?)?;
    }
    sink.add_event(0, RawEvent::sysex(&[0x7E, 0x7F, 0x09, 0x01]))?;
    sink.end_track()?;

    sink.end()
}

#[test]
fn writer_and_model_agree() {
    let mut builder = FileModelBuilder::new();
    build_song(&mut builder).unwrap();
    let model = builder.finish().unwrap();

    let mut cursor = Cursor::new(Vec::new());
    build_song(FileWriter::with_handler(&mut cursor, Strict)).unwrap();
    let streamed = cursor.into_inner();

    assert_eq!(model.to_bytes().unwrap(), streamed);
    assert_eq!(
        FileModel::read_with_handler(Cursor::new(&streamed), Strict).unwrap(),
        model
    );
}

#[test]
fn pull_reader_sees_every_event() {
    let mut builder = FileModelBuilder::new();
    build_song(&mut builder).unwrap();
    let model = builder.finish().unwrap();
    let raw = model.to_bytes().unwrap();

    let mut reader = FileReader::with_handler(Cursor::new(&raw), Strict).unwrap();
    let mut tracks: Vec<Vec<(u64, RawEvent)>> = Vec::new();
    loop {
        match reader.read().unwrap() {
            ReadState::StartOfTrack => tracks.push(Vec::new()),
            ReadState::Event => {
                let ticks = reader.ticks();
                let event = reader.take_event().unwrap();
                tracks.last_mut().unwrap().push((ticks, event));
            }
            ReadState::EndOfTrack | ReadState::PostHeader => {}
            ReadState::EndOfFile => break,
        }
    }
    let expected = model
        .tracks
        .iter()
        .map(|track| track.iter().map(|ev| (ev.ticks, ev.event.clone())).collect())
        .collect::<Vec<Vec<_>>>();
    assert_eq!(tracks, expected);
}

#[test]
fn merge_then_stream_to_wire() {
    let mut builder = FileModelBuilder::new();
    build_song(TrackMerger::new(&mut builder)).unwrap();
    let merged = builder.finish().unwrap();
    assert_eq!(merged.format(), Format::SingleTrack);
    assert_eq!(merged.tracks.len(), 1);
    let track = &merged.tracks[0];
    assert!(track.windows(2).all(|w| w[0].ticks <= w[1].ticks));
    assert_eq!(track.last().unwrap().ticks, 240 * 7);
    assert_eq!(track.iter().filter(|ev| ev.event.is_end_of_track()).count(), 1);

    // Send the channel messages over a simulated cable and decode them back
    let mut running_status = RunningStatus::new();
    let mut wire = Vec::new();
    let sent = track
        .iter()
        .filter_map(|ev| ev.event.as_message().cloned())
        .collect::<Vec<_>>();
    for msg in &sent {
        msg.write_with_running_status(&mut running_status, &mut wire)
            .unwrap();
    }
    let received = MessageDecoder::new().decode_all(&wire);
    assert_eq!(received, sent);
}

#[test]
fn lenient_repairs_are_reported() {
    // Format 0 with two tracks, the second one missing its end of track
    let mut raw = Vec::new();
    raw.extend_from_slice(b"MThd\0\0\0\x06\0\0\0\x02\0\x60");
    raw.extend_from_slice(b"MTrk\0\0\0\x04\0\xFF\x2F\0");
    raw.extend_from_slice(b"MTrk\0\0\0\x04\0\x90\x3C\x40");

    let mut errors = Vec::new();
    let model = FileModel::read_with_handler(Cursor::new(&raw), |err: FileValidationError| {
        errors.push(err)
    })
    .unwrap();
    assert_eq!(
        errors,
        vec![
            FileValidationError::ExtraTracks,
            FileValidationError::InvalidTrackTermination
        ]
    );
    assert_eq!(model.tracks[1].len(), 2);
    assert!(model.tracks[1][1].event.is_end_of_track());

    let err = FileModel::read_with_handler(Cursor::new(&raw), Strict).unwrap_err();
    assert_eq!(err.validation(), Some(FileValidationError::ExtraTracks));
}
