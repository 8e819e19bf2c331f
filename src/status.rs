//! Status bytes, channels and running status.

use crate::prelude::*;

/// The kind of a channel message, as encoded in the high nibble of its status byte.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum ChannelMessageType {
    NoteOff = 0x8,
    NoteOn = 0x9,
    NoteAftertouch = 0xA,
    /// Either a controller change or a channel mode message (controllers 120-127).
    ControlChangeOrMode = 0xB,
    ProgramChange = 0xC,
    ChannelAftertouch = 0xD,
    PitchBend = 0xE,
}
impl ChannelMessageType {
    pub fn from_nibble(nibble: u8) -> Option<ChannelMessageType> {
        use ChannelMessageType::*;
        Some(match nibble {
            0x8 => NoteOff,
            0x9 => NoteOn,
            0xA => NoteAftertouch,
            0xB => ControlChangeOrMode,
            0xC => ProgramChange,
            0xD => ChannelAftertouch,
            0xE => PitchBend,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_nibble(self) -> u8 {
        self as u8
    }

    /// How many data bytes follow a status of this kind.
    #[inline]
    pub fn payload_len(self) -> u8 {
        match self {
            ChannelMessageType::ProgramChange | ChannelMessageType::ChannelAftertouch => 1,
            _ => 2,
        }
    }
}

/// A MIDI channel, in the range `[0, 15]`.
///
/// User interfaces usually display channels as `1..=16`; [`number`](#method.number) gives that
/// form.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Channel(u8);
impl Channel {
    pub fn new(index: u8) -> Option<Channel> {
        if index < 16 {
            Some(Channel(index))
        } else {
            None
        }
    }

    /// Keep only the low nibble of the given byte.
    #[inline]
    pub const fn from_nibble(nibble: u8) -> Channel {
        Channel(nibble & 0xF)
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The 1-based channel number.
    #[inline]
    pub const fn number(self) -> u8 {
        self.0 + 1
    }
}
impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// How many payload bytes a status byte expects.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum PayloadLength {
    Fixed(u8),
    /// SysEx, plus the undefined `0xF4` and `0xF5` system common bytes.
    Variable,
}
impl PayloadLength {
    #[inline]
    pub fn fixed(self) -> Option<usize> {
        match self {
            PayloadLength::Fixed(len) => Some(len as usize),
            PayloadLength::Variable => None,
        }
    }

    /// Whether a payload of the given length fits.
    #[inline]
    pub fn accepts(self, len: usize) -> bool {
        match self {
            PayloadLength::Fixed(fixed) => fixed as usize == len,
            PayloadLength::Variable => true,
        }
    }
}

/// A MIDI status byte, always in the range `0x80..=0xFF`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusByte(u8);
impl StatusByte {
    pub const SYSTEM_EXCLUSIVE: StatusByte = StatusByte(0xF0);
    pub const MTC_QUARTER_FRAME: StatusByte = StatusByte(0xF1);
    pub const SONG_POSITION: StatusByte = StatusByte(0xF2);
    pub const SONG_SELECT: StatusByte = StatusByte(0xF3);
    pub const UNDEFINED_F4: StatusByte = StatusByte(0xF4);
    pub const UNDEFINED_F5: StatusByte = StatusByte(0xF5);
    pub const TUNE_REQUEST: StatusByte = StatusByte(0xF6);
    pub const END_OF_EXCLUSIVE: StatusByte = StatusByte(0xF7);
    pub const TIMING_CLOCK: StatusByte = StatusByte(0xF8);
    pub const UNDEFINED_F9: StatusByte = StatusByte(0xF9);
    pub const START: StatusByte = StatusByte(0xFA);
    pub const CONTINUE: StatusByte = StatusByte(0xFB);
    pub const STOP: StatusByte = StatusByte(0xFC);
    pub const UNDEFINED_FD: StatusByte = StatusByte(0xFD);
    pub const ACTIVE_SENSING: StatusByte = StatusByte(0xFE);
    pub const RESET: StatusByte = StatusByte(0xFF);

    /// Interpret a byte as a status byte, returning `None` for data bytes.
    #[inline]
    pub const fn new(byte: u8) -> Option<StatusByte> {
        if byte >= 0x80 {
            Some(StatusByte(byte))
        } else {
            None
        }
    }

    /// Build the status of a channel message.
    #[inline]
    pub const fn channel_message(kind: ChannelMessageType, channel: Channel) -> StatusByte {
        StatusByte((kind as u8) << 4 | channel.index())
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Whether the byte can act as a status at all.
    #[inline]
    pub const fn is_status(byte: u8) -> bool {
        byte >= 0x80
    }

    #[inline]
    pub const fn is_channel_message(self) -> bool {
        self.0 < 0xF0
    }

    /// System messages, both common and real-time.
    #[inline]
    pub const fn is_system(self) -> bool {
        self.0 >= 0xF0
    }

    /// System real-time messages may appear anywhere in a stream, even between the data bytes of
    /// another message.
    #[inline]
    pub const fn is_real_time(self) -> bool {
        self.0 >= 0xF8
    }

    #[inline]
    pub const fn is_system_common(self) -> bool {
        self.0 >= 0xF0 && self.0 < 0xF8
    }

    /// The four status bytes the MIDI standard leaves undefined.
    #[inline]
    pub const fn is_undefined(self) -> bool {
        matches!(self.0, 0xF4 | 0xF5 | 0xF9 | 0xFD)
    }

    pub fn message_type(self) -> Option<ChannelMessageType> {
        if self.is_channel_message() {
            ChannelMessageType::from_nibble(self.0 >> 4)
        } else {
            None
        }
    }

    pub fn channel(self) -> Option<Channel> {
        if self.is_channel_message() {
            Some(Channel::from_nibble(self.0))
        } else {
            None
        }
    }

    pub fn payload_len(self) -> PayloadLength {
        const LENGTH_BY_NIBBLE: [u8; 8] = [2, 2, 2, 2, 1, 1, 2, 0];
        match self.0 {
            0x80..=0xEF => PayloadLength::Fixed(LENGTH_BY_NIBBLE[(self.0 >> 4) as usize - 8]),
            0xF0 | 0xF4 | 0xF5 => PayloadLength::Variable,
            0xF1 | 0xF3 => PayloadLength::Fixed(1),
            0xF2 => PayloadLength::Fixed(2),
            _ => PayloadLength::Fixed(0),
        }
    }
}
impl TryFrom<u8> for StatusByte {
    type Error = Error;
    #[inline]
    fn try_from(byte: u8) -> Result<StatusByte> {
        StatusByte::new(byte).ok_or(err_invalid!("not a status byte"))
    }
}
impl From<StatusByte> for u8 {
    #[inline]
    fn from(status: StatusByte) -> u8 {
        status.0
    }
}
impl fmt::Debug for StatusByte {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.message_type(), self.channel()) {
            (Some(kind), Some(channel)) => write!(f, "{:?}_Channel{}", kind, channel),
            _ => write!(f, "StatusByte({:#04x})", self.0),
        }
    }
}

/// Running status as tracked over a single MIDI stream or SMF track.
///
/// Repeated channel messages may omit their status byte, in which case the status of the previous
/// channel message applies.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct RunningStatus {
    current: Option<StatusByte>,
}
impl RunningStatus {
    #[inline]
    pub const fn new() -> RunningStatus {
        RunningStatus { current: None }
    }

    #[inline]
    pub fn get(&self) -> Option<StatusByte> {
        self.current
    }

    #[inline]
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Update the running status after a status byte is seen.
    ///
    /// Channel statuses become the running status. Real-time statuses leave it alone, except for
    /// `Reset`. Anything else (system common, SysEx, `Reset`, and in files escape and meta events)
    /// cancels it.
    #[inline]
    pub fn on_new_status(&mut self, status: StatusByte) {
        if status.is_channel_message() {
            self.current = Some(status);
        } else if status.is_real_time() && status != StatusByte::RESET {
            // Invisible to running status
        } else {
            self.current = None;
        }
    }

    /// Whether a channel message with the given status can omit its status byte.
    #[inline]
    pub fn can_omit(&self, status: StatusByte) -> bool {
        status.is_channel_message() && self.current == Some(status)
    }
}
