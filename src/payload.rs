//! Implementation of `Payload`, the byte buffer carried by every MIDI message and file event.

use crate::prelude::*;
use core::hash;

/// An immutable sequence of bytes, optimized for MIDI message data.
///
/// # Performance
///
/// Almost all MIDI messages carry two data bytes or less, so payloads of up to two bytes are
/// stored inline and never touch the allocator.
/// Longer payloads (SysEx dumps, meta event text) are stored in a shared `Arc<[u8]>`, which makes
/// cloning them cheap.
///
/// The first two bytes can be read with [`first_two`](#method.first_two) without going through a
/// slice, which is what running status and channel dispatch use.
///
/// Two payloads compare equal whenever their bytes are equal, no matter how they are stored.
///
/// Payload constructors accept any byte. MIDI data bytes must be 7-bit, but enforcing that is left
/// to the places that need it (see [`RawMessage::new`](struct.RawMessage.html#method.new)).
#[derive(Clone)]
pub struct Payload(Repr);

/// Lengths 0 to 2 always use the inline variants.
#[derive(Clone)]
enum Repr {
    Empty,
    One(u8),
    Two([u8; 2]),
    Shared(Arc<[u8]>),
}

impl Payload {
    /// The zero-length payload.
    pub const EMPTY: Payload = Payload(Repr::Empty);

    #[inline]
    pub const fn new() -> Payload {
        Payload::EMPTY
    }

    #[inline]
    pub const fn one(byte: u8) -> Payload {
        Payload(Repr::One(byte))
    }

    #[inline]
    pub const fn two(first: u8, second: u8) -> Payload {
        Payload(Repr::Two([first, second]))
    }

    /// Copy bytes into a payload, allocating only if there are 3 bytes or more.
    pub fn from_slice(bytes: &[u8]) -> Payload {
        match *bytes {
            [] => Payload::EMPTY,
            [a] => Payload::one(a),
            [a, b] => Payload::two(a, b),
            _ => Payload(Repr::Shared(Arc::from(bytes))),
        }
    }

    /// Take ownership of a byte vector.
    ///
    /// Short vectors are stored inline and their allocation is released.
    pub fn from_vec(bytes: Vec<u8>) -> Payload {
        match bytes.len() {
            0..=2 => Payload::from_slice(&bytes),
            _ => Payload(Repr::Shared(Arc::from(bytes))),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.0 {
            Repr::Empty => 0,
            Repr::One(_) => 1,
            Repr::Two(_) => 2,
            Repr::Shared(bytes) => bytes.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Access the bytes as a slice.
    ///
    /// This never allocates, the inline forms are viewed in place.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.0 {
            Repr::Empty => &[],
            Repr::One(byte) => core::slice::from_ref(byte),
            Repr::Two(bytes) => &bytes[..],
            Repr::Shared(bytes) => bytes,
        }
    }

    /// Get a single byte, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<u8> {
        self.as_slice().get(idx).copied()
    }

    /// The first two bytes of the payload, whichever are present.
    #[inline]
    pub fn first_two(&self) -> (Option<u8>, Option<u8>) {
        match &self.0 {
            Repr::Empty => (None, None),
            Repr::One(a) => (Some(*a), None),
            Repr::Two([a, b]) => (Some(*a), Some(*b)),
            Repr::Shared(bytes) => (bytes.first().copied(), bytes.get(1).copied()),
        }
    }

    /// Whether the payload is stored without a heap allocation.
    #[inline]
    pub fn is_inline(&self) -> bool {
        !matches!(self.0, Repr::Shared(_))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}
impl Default for Payload {
    #[inline]
    fn default() -> Payload {
        Payload::EMPTY
    }
}
impl ops::Deref for Payload {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}
impl ops::Index<usize> for Payload {
    type Output = u8;
    #[inline]
    fn index(&self, idx: usize) -> &u8 {
        &self.as_slice()[idx]
    }
}
impl AsRef<[u8]> for Payload {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
impl PartialEq for Payload {
    #[inline]
    fn eq(&self, rhs: &Payload) -> bool {
        self.as_slice() == rhs.as_slice()
    }
}
impl Eq for Payload {}
impl PartialEq<[u8]> for Payload {
    #[inline]
    fn eq(&self, rhs: &[u8]) -> bool {
        self.as_slice() == rhs
    }
}
impl hash::Hash for Payload {
    #[inline]
    fn hash<H: hash::Hasher>(&self, h: &mut H) {
        <[u8] as hash::Hash>::hash(self.as_slice(), h)
    }
}
impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Payload[")?;
        for &byte in self.as_slice() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "]")?;
        Ok(())
    }
}
impl From<&[u8]> for Payload {
    #[inline]
    fn from(bytes: &[u8]) -> Payload {
        Payload::from_slice(bytes)
    }
}
impl<const N: usize> From<[u8; N]> for Payload {
    #[inline]
    fn from(bytes: [u8; N]) -> Payload {
        Payload::from_slice(&bytes)
    }
}
impl From<Vec<u8>> for Payload {
    #[inline]
    fn from(bytes: Vec<u8>) -> Payload {
        Payload::from_vec(bytes)
    }
}
