use crate::validation::FileValidationError;
use std::io;

/// A fatal error while reading or writing MIDI data.
///
/// Recoverable problems are not reported through this type: they go through a
/// [`ValidationHandler`](crate::ValidationHandler) (files) or a
/// [`ProblemHandler`](crate::ProblemHandler) (live streams). A `Validation` error only shows up
/// when such a handler chose to escalate, as [`Strict`](crate::Strict) does.
///
/// Once an `Error` is returned the current read or write must be abandoned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The data is not MIDI, or it is corrupted beyond repair.
    #[error("invalid midi: {0}")]
    Invalid(&'static str),

    /// A message was constructed from a payload that does not fit its status.
    #[error("invalid payload: {0}")]
    InvalidPayload(&'static str),

    /// A validation handler escalated a recoverable error.
    #[error("midi validation failed: {0}")]
    Validation(#[from] FileValidationError),

    /// The underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Another error, annotated with what was being done at the time.
    #[error("{context}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<Error>,
    },
}
impl Error {
    /// The innermost error, skipping any context annotations.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// The validation error that caused this error, if any.
    pub fn validation(&self) -> Option<FileValidationError> {
        match self.root() {
            Error::Validation(err) => Some(*err),
            _ => None,
        }
    }

    /// Whether this error was caused by running out of input bytes.
    pub fn is_eof(&self) -> bool {
        match self.root() {
            Error::Io(err) => err.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

macro_rules! err_invalid {
    ($msg:expr) => {
        $crate::error::Error::Invalid($msg)
    };
}
macro_rules! err_payload {
    ($msg:expr) => {
        $crate::error::Error::InvalidPayload($msg)
    };
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: &'static str) -> Result<T>;
}
impl<T, E: Into<Error>> ResultExt<T> for StdResult<T, E> {
    #[inline]
    fn context(self, ctx: &'static str) -> Result<T> {
        self.map_err(|err| Error::Context {
            context: ctx,
            source: Box::new(err.into()),
        })
    }
}

/// The result type used throughout the crate.
pub type Result<T> = StdResult<T, Error>;
pub(crate) use core::result::Result as StdResult;
