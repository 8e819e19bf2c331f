//! Simple building-block data that can be read in one go.

use crate::prelude::*;

/// The largest value a variable-length quantity can hold (28 bits).
pub const VLQ_MAX: u32 = 0x0FFF_FFFF;

/// Encode a variable-length quantity into a stack buffer, returning the buffer and how many of its
/// bytes are used.
///
/// Values over 28 bits cannot be represented and produce an error.
#[inline]
pub fn encode_vlq(int: u32) -> Result<([u8; 4], usize)> {
    ensure!(int <= VLQ_MAX, err_invalid!("varlen integer exceeds 28 bits"));
    let mut buf = [0; 4];
    let mut len = 0;
    let mut skipping = true;
    for i in (0..4).rev() {
        let byte = ((int >> (i * 7)) & 0x7F) as u8;
        if skipping && byte == 0 && i != 0 {
            // Skip these leading zeros
        } else {
            // Write down this u7
            skipping = false;
            buf[len] = if i == 0 {
                // Last byte
                byte
            } else {
                // Leading byte
                byte | 0x80
            };
            len += 1;
        }
    }
    Ok((buf, len))
}

/// Decode a variable-length quantity from the start of a slice, returning its value and how many
/// bytes it took.
#[inline]
pub fn decode_vlq(raw: &[u8]) -> Result<(u32, usize)> {
    let mut int: u32 = 0;
    for (i, &byte) in raw.iter().take(4).enumerate() {
        int <<= 7;
        int |= (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((int, i + 1));
        }
    }
    if raw.len() < 4 {
        bail!(err_invalid!("truncated varlen integer"))
    }
    bail!(err_invalid!("varlen integer larger than 4 bytes"))
}

/// Read a variable-length quantity from a stream.
pub fn read_vlq<R: io::Read>(src: &mut ReadCounter<R>) -> Result<u32> {
    let mut int: u32 = 0;
    for _ in 0..4 {
        let byte = src.read_u8()?;
        int <<= 7;
        int |= (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok(int);
        }
    }
    bail!(err_invalid!("varlen integer larger than 4 bytes"))
}

/// Write a variable-length quantity to a stream.
#[inline]
pub fn write_vlq<W: io::Write>(out: &mut W, int: u32) -> Result<()> {
    let (buf, len) = encode_vlq(int)?;
    out.write_all(&buf[..len])?;
    Ok(())
}

/// Write a slice prefixed by its length as a variable-length quantity.
#[inline]
pub fn write_vlq_slice<W: io::Write>(out: &mut W, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .ok()
        .filter(|&len| len <= VLQ_MAX)
        .ok_or(err_invalid!("varlen slice length exceeds 28 bits"))?;
    write_vlq(out, len)?;
    out.write_all(data)?;
    Ok(())
}

/// The order in which tracks should be laid out when playing back an SMF file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum Format {
    /// Format 0: a single track.
    SingleTrack,
    /// Format 1: several tracks that play simultaneously.
    ///
    /// Usually the first track holds the tempo map and other song metadata.
    Parallel,
    /// Format 2: several tracks, each one an independent sequence.
    Sequential,
}
impl Format {
    /// Decode the format field of an `MThd` chunk. Formats 3 and above do not exist.
    pub fn from_bits(bits: u16) -> Option<Format> {
        Some(match bits {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_bits(self) -> u16 {
        self as u8 as u16
    }

    /// Whether the tracks are independent sequences rather than parts of one song.
    #[inline]
    pub fn independent_tracks(self) -> bool {
        self == Format::Sequential
    }
}

/// One of the four SMPTE frame rates.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Fps {
    Fps24,
    Fps25,
    /// Actually 29.97 fps ("30 drop frame").
    Fps2997,
    Fps30,
}
impl Fps {
    /// Decode the (positive) frame rate stored in an SMPTE time division.
    pub fn from_int(fps: u8) -> Option<Fps> {
        Some(match fps {
            24 => Fps::Fps24,
            25 => Fps::Fps25,
            29 => Fps::Fps2997,
            30 => Fps::Fps30,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_int(self) -> u8 {
        match self {
            Fps::Fps24 => 24,
            Fps::Fps25 => 25,
            Fps::Fps2997 => 29,
            Fps::Fps30 => 30,
        }
    }

    #[inline]
    pub fn as_f32(self) -> f32 {
        match self {
            Fps::Fps2997 => 29.97,
            _ => self.as_int() as f32,
        }
    }
}

/// The timing of an SMF file, exactly as stored in its header.
///
/// Either ticks per quarter note (top bit clear) or an SMPTE frame rate and ticks per frame (top
/// bit set, frame rate stored as a negative two's-complement byte).
///
/// The raw value is kept as-is, so files with a nonsensical division survive a round trip.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct TimeDivision(u16);
impl TimeDivision {
    /// Wrap a raw header value.
    #[inline]
    pub const fn from_raw(raw: u16) -> TimeDivision {
        TimeDivision(raw)
    }

    /// Metrical timing, with a 15-bit nonzero tick count per quarter note.
    pub fn ticks_per_quarter_note(ticks: u16) -> Result<TimeDivision> {
        ensure!(
            ticks != 0 && ticks < 0x8000,
            err_invalid!("ticks per quarter note out of range")
        );
        Ok(TimeDivision(ticks))
    }

    /// Timecode timing, with a nonzero tick count per frame.
    pub fn smpte(fps: Fps, ticks_per_frame: u8) -> Result<TimeDivision> {
        ensure!(
            ticks_per_frame != 0,
            err_invalid!("ticks per frame cannot be zero")
        );
        let fps = (-(fps.as_int() as i8)) as u8;
        Ok(TimeDivision(u16::from_be_bytes([fps, ticks_per_frame])))
    }

    #[inline]
    pub const fn as_raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_smpte(self) -> bool {
        self.0 & 0x8000 != 0
    }

    /// The tick count per quarter note, if the division is metrical.
    pub fn as_ticks_per_quarter_note(self) -> Option<u16> {
        if self.is_smpte() {
            None
        } else {
            Some(self.0)
        }
    }

    /// The frame rate and tick count per frame, if the division is SMPTE-based and the frame rate
    /// is one of the four standard ones.
    pub fn as_smpte(self) -> Option<(Fps, u8)> {
        if self.is_smpte() {
            let [fps, ticks] = self.0.to_be_bytes();
            let fps = Fps::from_int((fps as i8).wrapping_neg() as u8)?;
            Some((fps, ticks))
        } else {
            None
        }
    }

    /// Whether the division makes sense: a nonzero tick count, and a standard frame rate for SMPTE
    /// divisions.
    pub fn is_valid(self) -> bool {
        if self.is_smpte() {
            matches!(self.as_smpte(), Some((_, ticks)) if ticks != 0)
        } else {
            self.0 != 0
        }
    }

    #[inline]
    pub fn encode(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}
impl Default for TimeDivision {
    /// 96 ticks per quarter note.
    fn default() -> TimeDivision {
        TimeDivision(96)
    }
}
