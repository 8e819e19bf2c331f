//! The push interface shared by everything that consumes a Standard Midi File event by event.

use crate::prelude::*;

/// Receives a Standard Midi File one piece at a time.
///
/// Calls must follow the order `begin`, then any number of `begin_track` / `add_event`... /
/// `end_track` groups, then `end`. Calling a method out of order is a programming error and
/// panics.
///
/// Every sink appends an End-of-Track event when a track is ended without one.
///
/// Implemented by [`FileWriter`](crate::FileWriter), [`FileModelBuilder`](crate::FileModelBuilder)
/// and [`TrackMerger`](crate::TrackMerger).
pub trait FileSink {
    fn begin(&mut self, format: Format, division: TimeDivision) -> Result<()>;

    fn begin_track(&mut self) -> Result<()>;

    /// Add an event, `delta` ticks after the previous event of the track.
    fn add_event(&mut self, delta: u32, event: RawEvent) -> Result<()>;

    /// Add a channel message. System messages are rejected.
    fn add_channel_event(&mut self, delta: u32, msg: RawMessage) -> Result<()> {
        let event = RawEvent::channel(msg)?;
        self.add_event(delta, event)
    }

    fn add_escape_event(&mut self, delta: u32, sysex: bool, payload: Payload) -> Result<()> {
        self.add_event(delta, RawEvent::Escape { sysex, payload })
    }

    fn add_meta_event(&mut self, delta: u32, kind: MetaType, payload: Payload) -> Result<()> {
        self.add_event(delta, RawEvent::Meta { kind, payload })
    }

    fn end_track(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}
impl<S: FileSink + ?Sized> FileSink for &mut S {
    #[inline]
    fn begin(&mut self, format: Format, division: TimeDivision) -> Result<()> {
        (**self).begin(format, division)
    }
    #[inline]
    fn begin_track(&mut self) -> Result<()> {
        (**self).begin_track()
    }
    #[inline]
    fn add_event(&mut self, delta: u32, event: RawEvent) -> Result<()> {
        (**self).add_event(delta, event)
    }
    #[inline]
    fn end_track(&mut self) -> Result<()> {
        (**self).end_track()
    }
    #[inline]
    fn end(&mut self) -> Result<()> {
        (**self).end()
    }
}

/// Where a sink stands in the `begin` ... `end` call sequence.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SinkState {
    Initial,
    BetweenTracks,
    InTrack,
    /// In a track, right after its End-of-Track event.
    AtEndOfTrackEvent,
    Ended,
}
impl SinkState {
    pub fn begin(&mut self) {
        assert_eq!(*self, SinkState::Initial, "sink already begun");
        *self = SinkState::BetweenTracks;
    }

    pub fn begin_track(&mut self) {
        assert_eq!(
            *self,
            SinkState::BetweenTracks,
            "begin_track called outside of a file or inside a track"
        );
        *self = SinkState::InTrack;
    }

    pub fn add_event(&mut self, event: &RawEvent) {
        assert_eq!(
            *self,
            SinkState::InTrack,
            "events can only be added inside a track, before its end-of-track"
        );
        if event.is_end_of_track() {
            *self = SinkState::AtEndOfTrackEvent;
        }
    }

    /// Close the track, returning whether an End-of-Track event has to be added.
    pub fn end_track(&mut self) -> bool {
        let needs_end = match *self {
            SinkState::InTrack => true,
            SinkState::AtEndOfTrackEvent => false,
            state => panic!("end_track called in state {:?}", state),
        };
        *self = SinkState::BetweenTracks;
        needs_end
    }

    pub fn end(&mut self) {
        assert_eq!(
            *self,
            SinkState::BetweenTracks,
            "end called before begin or inside a track"
        );
        *self = SinkState::Ended;
    }
}
impl Default for SinkState {
    fn default() -> SinkState {
        SinkState::Initial
    }
}
