//! There's an abomination called RMID, MIDI embedded in a RIFF file.
//! Support for these files is provided by positioning the reader at the start of the `data`
//! sub-chunk, which holds a raw SMF file, and limiting reads to that sub-chunk.

use crate::prelude::*;

/// Move from the start of a `RIFF` chunk body to the `RMID` data.
///
/// RIFF lengths are little-endian, so `riff_len` comes straight from the raw length bytes.
pub(crate) fn enter_rmid<R: io::Read + io::Seek>(
    src: &mut ReadCounter<R>,
    riff_len: [u8; 4],
) -> Result<()> {
    let riff_len = u32::from_le_bytes(riff_len) as u64;
    let riff_end = src.position() + riff_len;
    let mut formtype = [0; 4];
    src.read_exact(&mut formtype)
        .context("failed to read riff formtype")?;
    ensure!(&formtype == b"RMID", err_invalid!("not an rmid riff file"));
    while src.position() + 8 <= riff_end {
        let mut header = [0; 8];
        src.read_exact(&mut header)?;
        let (id, len) = header.split_at(4);
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as u64;
        if id == b"data" {
            trace!(len, "entering rmid data chunk");
            let end = (src.position() + len).min(riff_end);
            src.set_limit(end);
            return Ok(());
        }
        trace!(id = ?String::from_utf8_lossy(id), len, "skipping riff chunk");
        // Sub-chunks are padded to even lengths
        src.skip(len + len % 2)?;
    }
    bail!(err_invalid!("no rmid data chunk"))
}
