//! Raw MIDI messages, as they travel over a wire.

use crate::prelude::*;

/// A single MIDI message: a status byte and its data bytes.
///
/// `RawMessage`s are always consistent: the payload has exactly as many bytes as the status
/// requires (any amount for SysEx), and every payload byte is a 7-bit data byte.
///
/// The default message is a `Reset` with no payload. It is a valid message, not a placeholder for
/// an error.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct RawMessage {
    status: StatusByte,
    payload: Payload,
}
impl RawMessage {
    /// The default message, a system `Reset`.
    pub const RESET: RawMessage = RawMessage {
        status: StatusByte::RESET,
        payload: Payload::EMPTY,
    };

    /// Create a message, checking that the payload fits the status.
    ///
    /// SysEx payloads exclude the leading `0xF0` and the trailing `0xF7`.
    pub fn new(status: StatusByte, payload: Payload) -> Result<RawMessage> {
        ensure!(
            status.payload_len().accepts(payload.len()),
            err_payload!("payload length does not match status")
        );
        ensure!(
            payload.iter().all(|&b| is_valid_payload_byte(b)),
            err_payload!("payload byte has the top bit set")
        );
        Ok(RawMessage { status, payload })
    }

    /// A message without data bytes, such as `TuneRequest` or any real-time message.
    #[inline]
    pub fn from_status(status: StatusByte) -> Result<RawMessage> {
        RawMessage::new(status, Payload::EMPTY)
    }

    #[inline]
    pub fn with_one(status: StatusByte, data: u8) -> Result<RawMessage> {
        RawMessage::new(status, Payload::one(data))
    }

    #[inline]
    pub fn with_two(status: StatusByte, data0: u8, data1: u8) -> Result<RawMessage> {
        RawMessage::new(status, Payload::two(data0, data1))
    }

    /// A SysEx message carrying the given data bytes (without the `F0`/`F7` framing).
    #[inline]
    pub fn sysex(data: &[u8]) -> Result<RawMessage> {
        RawMessage::new(StatusByte::SYSTEM_EXCLUSIVE, Payload::from_slice(data))
    }

    /// Skip validation. Only used where the bytes were already checked.
    #[inline]
    pub(crate) fn new_unchecked(status: StatusByte, payload: Payload) -> RawMessage {
        debug_assert!(status.payload_len().accepts(payload.len()));
        RawMessage { status, payload }
    }

    /// Parse one complete message from its raw bytes, as delivered by most OS MIDI APIs.
    ///
    /// SysEx packets must include the leading `F0`; a trailing `F7` is optional.
    pub fn decode(raw: &[u8]) -> Result<RawMessage> {
        let (&status, data) = raw
            .split_first()
            .ok_or(err_invalid!("no status byte"))?;
        let status = StatusByte::try_from(status)?;
        let data = match data.split_last() {
            Some((&0xF7, rest)) if status == StatusByte::SYSTEM_EXCLUSIVE => rest,
            _ => data,
        };
        RawMessage::new(status, Payload::from_slice(data))
    }

    #[inline]
    pub fn status(&self) -> StatusByte {
        self.status
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[inline]
    pub fn into_parts(self) -> (StatusByte, Payload) {
        (self.status, self.payload)
    }

    #[inline]
    pub fn channel(&self) -> Option<Channel> {
        self.status.channel()
    }

    #[inline]
    pub fn message_type(&self) -> Option<ChannelMessageType> {
        self.status.message_type()
    }

    #[inline]
    pub fn is_channel_message(&self) -> bool {
        self.status.is_channel_message()
    }

    #[inline]
    pub fn is_sysex(&self) -> bool {
        self.status == StatusByte::SYSTEM_EXCLUSIVE
    }

    /// Write a standalone message, always including its status byte.
    pub fn write<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.write_with_running_status(&mut RunningStatus::new(), out)
    }

    /// Write a message, skipping the status byte if it matches the running status.
    pub fn write_with_running_status<W: io::Write>(
        &self,
        running_status: &mut RunningStatus,
        out: &mut W,
    ) -> io::Result<()> {
        if !running_status.can_omit(self.status) {
            out.write_all(&[self.status.as_u8()])?;
        }
        running_status.on_new_status(self.status);
        out.write_all(&self.payload)?;
        if self.is_sysex() {
            out.write_all(&[StatusByte::END_OF_EXCLUSIVE.as_u8()])?;
        }
        Ok(())
    }

    /// Encode a standalone message into a new buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 2);
        // Writing to a `Vec` cannot fail
        let _ = self.write(&mut out);
        out
    }
}
impl Default for RawMessage {
    #[inline]
    fn default() -> RawMessage {
        RawMessage::RESET
    }
}

/// MIDI data bytes are 7-bit.
#[inline]
pub const fn is_valid_payload_byte(byte: u8) -> bool {
    byte < 0x80
}
