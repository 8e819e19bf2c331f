//! Merging the tracks of a file into a single track.

use crate::prelude::*;
use std::collections::BTreeMap;

/// A sink that merges every track it receives into one, and replays the result into another
/// sink as a format 0 file.
///
/// Events are ordered by their absolute tick count. Events on the same tick keep the order they
/// were received in, so earlier tracks come first and each track keeps its own order.
///
/// The End-of-Track events of the input tracks are dropped. The merged track ends at the latest
/// of them.
#[derive(Debug)]
pub struct TrackMerger<S> {
    target: S,
    state: SinkState,
    division: TimeDivision,
    events: BTreeMap<(u64, u64), RawEvent>,
    /// Arrival counter, strictly increasing across all tracks.
    seq: u64,
    /// Absolute tick count in the current input track.
    ticks: u64,
    end_ticks: u64,
}
impl<S: FileSink> TrackMerger<S> {
    pub fn new(target: S) -> TrackMerger<S> {
        TrackMerger {
            target,
            state: SinkState::Initial,
            division: TimeDivision::default(),
            events: BTreeMap::new(),
            seq: 0,
            ticks: 0,
            end_ticks: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> SinkState {
        self.state
    }

    /// The amount of events waiting to be replayed.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Retrieve the target sink, usually after `end` was called.
    pub fn into_inner(self) -> S {
        self.target
    }

    fn track_ended(&mut self) {
        self.end_ticks = self.end_ticks.max(self.ticks);
    }
}
impl<S: FileSink> FileSink for TrackMerger<S> {
    fn begin(&mut self, _format: Format, division: TimeDivision) -> Result<()> {
        self.state.begin();
        self.division = division;
        Ok(())
    }

    fn begin_track(&mut self) -> Result<()> {
        self.state.begin_track();
        self.ticks = 0;
        Ok(())
    }

    fn add_event(&mut self, delta: u32, event: RawEvent) -> Result<()> {
        self.state.add_event(&event);
        self.ticks += delta as u64;
        if event.is_end_of_track() {
            self.track_ended();
        } else {
            self.events.insert((self.ticks, self.seq), event);
            self.seq += 1;
        }
        Ok(())
    }

    fn end_track(&mut self) -> Result<()> {
        if self.state.end_track() {
            self.track_ended();
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.state.end();
        trace!(events = self.events.len(), "replaying merged track");
        self.target.begin(Format::SingleTrack, self.division)?;
        self.target.begin_track()?;
        let mut last = 0;
        for ((ticks, _), event) in mem::take(&mut self.events) {
            let delta = u32::try_from(ticks - last)
                .map_err(|_| err_invalid!("delta time too large"))?;
            self.target.add_event(delta, event)?;
            last = ticks;
        }
        let delta = u32::try_from(self.end_ticks.saturating_sub(last))
            .map_err(|_| err_invalid!("delta time too large"))?;
        self.target.add_event(delta, RawEvent::end_of_track())?;
        self.target.end_track()?;
        self.target.end()
    }
}
