//! Recoverable anomalies in Standard Midi Files.
//!
//! Real-world files are often slightly broken. Instead of rejecting them, the reader repairs what
//! it can and reports each repair as a [`FileValidationError`] to a [`ValidationHandler`]. The
//! handler decides whether to carry on ([`Lenient`], or any closure) or give up ([`Strict`]).
//!
//! The writer reports the same taxonomy for the mistakes it can detect in the data it is given.

use crate::prelude::*;

/// A recoverable error found while reading or writing a Standard Midi File.
///
/// Every variant documents the repair applied when the handler lets processing continue.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, thiserror::Error)]
pub enum FileValidationError {
    /// The header declares a format other than 0, 1 or 2.
    /// The file is read as format 1.
    #[error("invalid smf format")]
    InvalidMThdFormat,
    /// A format 0 file with more than one track, or more track chunks than the header declared.
    /// The extra tracks are still read (or written).
    #[error("extra tracks")]
    ExtraTracks,
    /// The time division has zero ticks, or an unknown SMPTE frame rate.
    /// The raw value is kept as-is.
    #[error("invalid time division")]
    InvalidMThdTimeDivision,
    /// A second header chunk. It is skipped.
    #[error("multiple header chunks")]
    MultipleMThdChunks,
    /// A sequence number, tempo, SMPTE offset or time signature meta event outside the first
    /// track of a format 0 or 1 file. The event is kept.
    #[error("meta event not allowed in this track")]
    InvalidTrackForMetaEvent,
    /// A channel data byte or a meta event type with the top bit set.
    /// The byte is masked to 7 bits.
    #[error("data byte has the top bit set")]
    InvalidMessageData,
    /// An event relied on running status right after a SysEx or meta event cancelled it.
    /// The status of the last channel event is reused.
    #[error("running status used after it was cancelled")]
    RunningStatusInvalidated,
    /// A SysEx packet that never got its closing `F7`. The packet is kept as-is.
    #[error("unterminated sysex")]
    UnterminatedSysEx,
    /// A track without an End-of-Track event (one is added), or with events after it (they are
    /// skipped).
    #[error("invalid track termination")]
    InvalidTrackTermination,
}

/// Decides what happens to the validation errors of a reader or writer.
///
/// Returning `Ok` applies the documented repair and carries on. Returning an error aborts the
/// current operation with that error.
///
/// Implemented by [`Strict`], [`Lenient`] and any `FnMut(FileValidationError)` closure (which
/// always carries on).
pub trait ValidationHandler {
    fn report(&mut self, error: FileValidationError) -> Result<()>;
}
impl<F: FnMut(FileValidationError)> ValidationHandler for F {
    #[inline]
    fn report(&mut self, error: FileValidationError) -> Result<()> {
        self(error);
        Ok(())
    }
}

/// Turns every validation error into a fatal [`Error::Validation`].
#[derive(Copy, Clone, Debug, Default)]
pub struct Strict;
impl ValidationHandler for Strict {
    #[inline]
    fn report(&mut self, error: FileValidationError) -> Result<()> {
        Err(Error::Validation(error))
    }
}

/// Repairs everything it can and carries on.
#[derive(Copy, Clone, Debug, Default)]
pub struct Lenient;
impl ValidationHandler for Lenient {
    #[inline]
    fn report(&mut self, _error: FileValidationError) -> Result<()> {
        Ok(())
    }
}

/// The handler used by the convenience constructors.
///
/// [`Lenient`], unless the `strict` feature is enabled.
#[cfg(feature = "strict")]
pub type DefaultValidation = Strict;
/// The handler used by the convenience constructors.
///
/// [`Lenient`], unless the `strict` feature is enabled.
#[cfg(not(feature = "strict"))]
pub type DefaultValidation = Lenient;

/// Log a validation error and hand it to a handler.
#[inline]
pub(crate) fn report<H: ValidationHandler>(
    handler: &mut H,
    error: FileValidationError,
    track: Option<usize>,
) -> Result<()> {
    debug!(?error, track, "smf validation error");
    handler.report(error)
}
