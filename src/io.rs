//! Byte-level access to the caller's streams.

use crate::prelude::*;

/// Wraps a reader, keeping count of the bytes consumed so far.
///
/// SMF chunks are length-prefixed, so the reader needs to know where it is in the stream at all
/// times. Reads never go beyond what was asked for, so seeking past skipped chunks never loses
/// buffered data.
#[derive(Debug)]
pub struct ReadCounter<R> {
    inner: R,
    pos: u64,
    /// The end of the readable region, if the SMF data is embedded in a larger file.
    limit: Option<u64>,
}
impl<R: io::Read> ReadCounter<R> {
    pub fn new(inner: R) -> ReadCounter<R> {
        ReadCounter {
            inner,
            pos: 0,
            limit: None,
        }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    #[inline]
    pub fn remaining_in_limit(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.pos))
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Some(left) = self.remaining_in_limit() {
            if (buf.len() as u64) > left {
                bail!(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
        }
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Fill as much of the buffer as the stream allows, returning how many bytes were read.
    ///
    /// Only returns less than the buffer length when the stream (or the limit) ends.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let want = match self.remaining_in_limit() {
            Some(left) => buf.len().min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => buf.len(),
        };
        let mut filled = 0;
        while filled < want {
            match self.inner.read(&mut buf[filled..want]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => bail!(err),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Read a given amount of bytes into a payload.
    pub fn read_payload(&mut self, len: usize) -> Result<Payload> {
        match len {
            0 => Ok(Payload::EMPTY),
            1 => Ok(Payload::one(self.read_u8()?)),
            _ => {
                let mut buf = vec![0; len];
                self.read_exact(&mut buf)?;
                Ok(Payload::from_vec(buf))
            }
        }
    }
}
impl<R: io::Read + io::Seek> ReadCounter<R> {
    /// Skip over bytes without reading them.
    ///
    /// Skipping beyond the end of the stream is not detected here: the next read fails instead.
    pub fn skip(&mut self, len: u64) -> Result<()> {
        let offset = i64::try_from(len).map_err(|_| err_invalid!("chunk too large to skip"))?;
        self.inner.seek(io::SeekFrom::Current(offset))?;
        self.pos += len;
        Ok(())
    }
}
