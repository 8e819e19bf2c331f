//! Reading MIDI messages from a raw, undelimited byte stream.
//!
//! Most OS MIDI APIs hand out complete messages (see [`RawMessage::decode`]), but device drivers,
//! serial ports and embedded hardware see the bytes exactly as they come off the cable.
//! [`MessageDecoder`] turns such a stream into messages, one byte at a time, handling every quirk
//! of the wire protocol: running status, real-time messages in the middle of other messages, and
//! SysEx dumps of any length.
//!
//! Malformed input never stops the decoder. Anomalies are reported as [`Problem`]s to a
//! [`ProblemHandler`] and decoding carries on with the best possible interpretation.

use crate::prelude::*;

/// A non-fatal anomaly found in a MIDI byte stream.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, thiserror::Error)]
pub enum Problem {
    /// A new status byte arrived before the previous message got all of its data bytes.
    /// The partial message is dropped.
    #[error("incomplete message")]
    IncompleteMessage,
    /// A SysEx dump was interrupted by a status byte other than `EndOfExclusive`.
    /// The dump is still delivered.
    #[error("sysex without end of exclusive")]
    MissingEndOfSysEx,
    /// A data byte arrived with no status or running status to attach it to. The byte is dropped.
    #[error("data byte without status")]
    MissingStatusByte,
    /// One of the undefined status bytes `0xF4`, `0xF5`, `0xF9` or `0xFD` was seen.
    #[error("unknown status byte")]
    UnknownStatusByte,
}

/// Receives the problems found by a [`MessageDecoder`].
///
/// Implemented by any `FnMut(Problem)` closure and by [`IgnoreProblems`].
pub trait ProblemHandler {
    fn report(&mut self, problem: Problem);
}
impl<F: FnMut(Problem)> ProblemHandler for F {
    #[inline]
    fn report(&mut self, problem: Problem) {
        self(problem)
    }
}

/// A problem handler that drops every problem.
#[derive(Copy, Clone, Debug, Default)]
pub struct IgnoreProblems;
impl ProblemHandler for IgnoreProblems {
    #[inline]
    fn report(&mut self, _problem: Problem) {}
}

/// Tunables for a [`MessageDecoder`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DecoderConfig {
    /// When an `EndOfExclusive` byte closes a SysEx dump, consume it silently.
    ///
    /// If disabled, the closing byte is also delivered as a standalone `EndOfExclusive` message.
    pub swallow_end_of_exclusive: bool,
}
impl Default for DecoderConfig {
    fn default() -> DecoderConfig {
        DecoderConfig {
            swallow_end_of_exclusive: true,
        }
    }
}

/// A streaming raw MIDI parser, taking raw, undelimited MIDI bytes, presumably from a cable.
///
/// Read the module documentation for more info.
///
/// A decoder owns the bytes of the message in progress, so each input stream needs its own
/// decoder.
#[derive(Clone, Debug)]
pub struct MessageDecoder<H = IgnoreProblems> {
    buffer: Vec<u8>,
    running_status: RunningStatus,
    current_status: Option<StatusByte>,
    config: DecoderConfig,
    problems: H,
}
impl MessageDecoder {
    /// Create a decoder that ignores problems.
    #[inline]
    pub fn new() -> MessageDecoder {
        MessageDecoder::with_handler(IgnoreProblems)
    }
}
impl Default for MessageDecoder {
    #[inline]
    fn default() -> MessageDecoder {
        MessageDecoder::new()
    }
}
impl<H: ProblemHandler> MessageDecoder<H> {
    /// Create a decoder that reports problems to the given handler.
    #[inline]
    pub fn with_handler(problems: H) -> MessageDecoder<H> {
        MessageDecoder::with_config(DecoderConfig::default(), problems)
    }

    pub fn with_config(config: DecoderConfig, problems: H) -> MessageDecoder<H> {
        MessageDecoder {
            buffer: Vec::new(),
            running_status: RunningStatus::new(),
            current_status: None,
            config,
            problems,
        }
    }

    #[inline]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    #[inline]
    pub fn running_status(&self) -> RunningStatus {
        self.running_status
    }

    #[inline]
    pub fn handler(&self) -> &H {
        &self.problems
    }

    #[inline]
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.problems
    }

    #[inline]
    pub fn into_handler(self) -> H {
        self.problems
    }

    /// Forget any message in progress and the running status, for example after the stream was
    /// interrupted.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.running_status.clear();
        self.current_status = None;
    }

    fn problem(&mut self, problem: Problem, byte: u8) {
        debug!(?problem, byte, "midi stream problem");
        self.problems.report(problem);
    }

    /// Take the current message out of the buffer.
    fn complete(&mut self, status: StatusByte) -> RawMessage {
        let payload = Payload::from_slice(&self.buffer);
        self.buffer.clear();
        self.current_status = None;
        RawMessage::new_unchecked(status, payload)
    }

    /// Feed a single byte to the decoder, returning the messages it completed.
    ///
    /// At most two messages are completed by a single byte: an interrupted SysEx dump and the
    /// message started by the interrupting status.
    pub fn feed_byte(&mut self, byte: u8) -> Decoded {
        let mut out = Decoded::new();
        let status = match StatusByte::new(byte) {
            Some(status) => status,
            None => {
                self.feed_data(byte, &mut out);
                return out;
            }
        };
        if status.is_real_time() {
            // These single-byte events are intended to transmit quick time-sensitive events, and
            // they should be invisible to other messages (that means, they don't alter any
            // decoder state).
            if status.is_undefined() {
                self.problem(Problem::UnknownStatusByte, byte);
            }
            out.push(RawMessage::new_unchecked(status, Payload::EMPTY));
            return out;
        }
        match self.current_status {
            Some(StatusByte::SYSTEM_EXCLUSIVE) => {
                if status != StatusByte::END_OF_EXCLUSIVE {
                    self.problem(Problem::MissingEndOfSysEx, byte);
                }
                out.push(self.complete(StatusByte::SYSTEM_EXCLUSIVE));
                if status == StatusByte::END_OF_EXCLUSIVE && self.config.swallow_end_of_exclusive
                {
                    // Running status is still cancelled by the dump
                    self.running_status.on_new_status(status);
                    return out;
                }
            }
            Some(_) => {
                self.problem(Problem::IncompleteMessage, byte);
                self.buffer.clear();
                self.current_status = None;
            }
            None => {}
        }
        self.running_status.on_new_status(status);
        if status.payload_len() == PayloadLength::Fixed(0) {
            out.push(RawMessage::new_unchecked(status, Payload::EMPTY));
        } else {
            if status.is_undefined() {
                self.problem(Problem::UnknownStatusByte, byte);
            }
            self.current_status = Some(status);
        }
        out
    }

    fn feed_data(&mut self, byte: u8, out: &mut Decoded) {
        let status = match self.current_status.or(self.running_status.get()) {
            Some(status) => status,
            None => {
                self.problem(Problem::MissingStatusByte, byte);
                return;
            }
        };
        self.current_status = Some(status);
        self.buffer.push(byte);
        // Midi messages have a known length, so they are completed as soon as their data quota is
        // fulfilled. SysEx only ends with another status byte.
        if let PayloadLength::Fixed(len) = status.payload_len() {
            if self.buffer.len() >= len as usize {
                out.push(self.complete(status));
            }
        }
    }

    /// Feeds a slice of bytes to the decoder, calling the `handle_msg` closure whenever a complete
    /// message is read.
    ///
    /// Calling `feed` with many small slices is equivalent to calling `feed` with one large
    /// concatenation of them all.
    pub fn feed(&mut self, bytes: &[u8], mut handle_msg: impl FnMut(RawMessage)) {
        for &byte in bytes {
            for msg in self.feed_byte(byte) {
                handle_msg(msg);
            }
        }
    }

    /// Feed a slice of bytes and collect the complete messages.
    pub fn decode_all(&mut self, bytes: &[u8]) -> Vec<RawMessage> {
        let mut msgs = Vec::new();
        self.feed(bytes, |msg| msgs.push(msg));
        msgs
    }
}

/// The messages completed by a single byte, as returned by
/// [`MessageDecoder::feed_byte`](struct.MessageDecoder.html#method.feed_byte).
#[derive(Clone, Debug, Default)]
pub struct Decoded {
    msgs: [Option<RawMessage>; 2],
    len: usize,
    next: usize,
}
impl Decoded {
    fn new() -> Decoded {
        Decoded::default()
    }

    fn push(&mut self, msg: RawMessage) {
        self.msgs[self.len] = Some(msg);
        self.len += 1;
    }
}
impl Iterator for Decoded {
    type Item = RawMessage;
    fn next(&mut self) -> Option<RawMessage> {
        if self.next < self.len {
            self.next += 1;
            self.msgs[self.next - 1].take()
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.next;
        (left, Some(left))
    }
}
impl ExactSizeIterator for Decoded {}
