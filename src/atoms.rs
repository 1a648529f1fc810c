//! Low-level box (atom) writing primitives.
//!
//! An ISO-BMFF file is a tree of boxes, each prefixed by a 4-byte
//! big-endian size (covering the header) and a 4-byte ASCII tag. The size
//! of a container box is not known until its children have been written,
//! so every box goes through the same two-phase protocol: write a
//! placeholder header, write the body, then patch the size field with a
//! seek-write-seek-back that leaves the cursor where the body ended.
//!
//! [`write_box`] and [`write_full_box`] wrap that protocol in a scoped
//! closure so a box cannot be left with its size unpatched.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::MuxResult;

/// Movie-level timescale: 1000 ticks per second, i.e. milliseconds.
pub(crate) const MOVIE_TIMESCALE: u32 = 1000;

/// Seconds between 1904-01-01 (container epoch) and 1970-01-01 (Unix).
pub(crate) const MP4_EPOCH_OFFSET: u64 = 2_082_844_800;

/// Current wall-clock time in container epoch seconds.
pub(crate) fn creation_time_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
        + MP4_EPOCH_OFFSET
}

/// Write an 8-byte box header with a known size.
pub(crate) fn write_box_header<W: Write>(
    writer: &mut W,
    tag: &[u8; 4],
    size: u32,
) -> MuxResult<()> {
    writer.write_u32::<BigEndian>(size)?;
    writer.write_all(tag)?;
    Ok(())
}

/// Write a placeholder box header (size 0) and return the offset of the
/// header start for later patching.
pub(crate) fn begin_box<W: Write + Seek>(writer: &mut W, tag: &[u8; 4]) -> MuxResult<u64> {
    let start = writer.stream_position()?;
    write_box_header(writer, tag, 0)?;
    Ok(start)
}

/// Patch the size field of the box begun at `start` with the span from
/// `start` to the current position, restoring the cursor afterwards.
/// Returns the patched size.
pub(crate) fn end_box<W: Write + Seek>(writer: &mut W, start: u64) -> MuxResult<u64> {
    let end = writer.stream_position()?;
    let size = end - start;
    // Only mdat can outgrow 32 bits, and it is patched via patch_u32_at.
    debug_assert!(size <= u64::from(u32::MAX));
    writer.seek(SeekFrom::Start(start))?;
    writer.write_u32::<BigEndian>(size as u32)?;
    writer.seek(SeekFrom::Start(end))?;
    Ok(size)
}

/// Overwrite a 4-byte big-endian field at an arbitrary offset, restoring
/// the cursor afterwards.
pub(crate) fn patch_u32_at<W: Write + Seek>(
    writer: &mut W,
    offset: u64,
    value: u32,
) -> MuxResult<()> {
    let pos = writer.stream_position()?;
    writer.seek(SeekFrom::Start(offset))?;
    writer.write_u32::<BigEndian>(value)?;
    writer.seek(SeekFrom::Start(pos))?;
    Ok(())
}

/// Write one box: placeholder header, body closure, size patch.
/// Returns the total box size including the header.
pub(crate) fn write_box<W, F>(writer: &mut W, tag: &[u8; 4], body: F) -> MuxResult<u64>
where
    W: Write + Seek,
    F: FnOnce(&mut W) -> MuxResult<()>,
{
    let start = begin_box(writer, tag)?;
    body(writer)?;
    end_box(writer, start)
}

/// Write one "full box" (version byte + 24-bit flags after the header).
pub(crate) fn write_full_box<W, F>(
    writer: &mut W,
    tag: &[u8; 4],
    version: u8,
    flags: u32,
    body: F,
) -> MuxResult<u64>
where
    W: Write + Seek,
    F: FnOnce(&mut W) -> MuxResult<()>,
{
    write_box(writer, tag, |w| {
        w.write_u32::<BigEndian>((u32::from(version) << 24) | (flags & 0x00FF_FFFF))?;
        body(w)
    })
}

/// Write `count` zero bytes.
pub(crate) fn write_zeros<W: Write>(writer: &mut W, count: usize) -> MuxResult<()> {
    const ZEROS: [u8; 32] = [0; 32];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(ZEROS.len());
        writer.write_all(&ZEROS[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Write the identity transformation matrix (9 fixed-point values).
pub(crate) fn write_unity_matrix<W: Write>(writer: &mut W) -> MuxResult<()> {
    writer.write_u32::<BigEndian>(0x0001_0000)?;
    write_zeros(writer, 8)?;
    write_zeros(writer, 4)?;
    writer.write_u32::<BigEndian>(0x0001_0000)?;
    write_zeros(writer, 4)?;
    write_zeros(writer, 8)?;
    writer.write_u32::<BigEndian>(0x4000_0000)?;
    Ok(())
}

/// ISO 639-2/T language code packed into three 5-bit fields.
pub(crate) fn pack_language(lang: &[u8; 3]) -> u16 {
    let a = u16::from(lang[0] - 0x60);
    let b = u16::from(lang[1] - 0x60);
    let c = u16::from(lang[2] - 0x60);
    (a << 10) | (b << 5) | c
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn box_header_layout() {
        let mut buf = Vec::new();
        write_box_header(&mut buf, b"ftyp", 20).unwrap();
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x00, 0x14]);
        assert_eq!(&buf[4..8], b"ftyp");
    }

    #[test]
    fn begin_end_patches_size() {
        let mut cursor = Cursor::new(Vec::new());
        let start = begin_box(&mut cursor, b"moov").unwrap();
        cursor.write_all(&[0xAA; 20]).unwrap();
        let size = end_box(&mut cursor, start).unwrap();
        assert_eq!(size, 28);

        let buf = cursor.into_inner();
        assert_eq!(buf.len(), 28);
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x00, 28]);
        assert_eq!(&buf[4..8], b"moov");
    }

    #[test]
    fn end_box_restores_cursor() {
        let mut cursor = Cursor::new(Vec::new());
        let start = begin_box(&mut cursor, b"trak").unwrap();
        cursor.write_all(&[0x55; 11]).unwrap();
        let before = cursor.stream_position().unwrap();
        end_box(&mut cursor, start).unwrap();
        assert_eq!(cursor.stream_position().unwrap(), before);
    }

    #[test]
    fn patch_u32_restores_cursor() {
        let mut cursor = Cursor::new(vec![0u8; 16]);
        cursor.seek(SeekFrom::Start(12)).unwrap();
        patch_u32_at(&mut cursor, 4, 0xDEAD_BEEF).unwrap();
        assert_eq!(cursor.stream_position().unwrap(), 12);
        let buf = cursor.into_inner();
        assert_eq!(&buf[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn write_box_nests() {
        let mut cursor = Cursor::new(Vec::new());
        let outer = write_box(&mut cursor, b"moov", |w| {
            write_box(w, b"trak", |w| {
                w.write_all(&[0x01; 4])?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
        assert_eq!(outer, 8 + 8 + 4);

        let buf = cursor.into_inner();
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x00, 20]);
        assert_eq!(&buf[4..8], b"moov");
        assert_eq!(&buf[8..12], &[0x00, 0x00, 0x00, 12]);
        assert_eq!(&buf[12..16], b"trak");
    }

    #[test]
    fn full_box_version_flags() {
        let mut cursor = Cursor::new(Vec::new());
        write_full_box(&mut cursor, b"tkhd", 1, 0x000003, |_| Ok(())).unwrap();
        let buf = cursor.into_inner();
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[8..12], &[0x01, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn unity_matrix_bytes() {
        let mut buf = Vec::new();
        write_unity_matrix(&mut buf).unwrap();
        assert_eq!(buf.len(), 36);
        assert_eq!(&buf[0..4], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&buf[16..20], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&buf[32..36], &[0x40, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn language_und() {
        // u=0x15, n=0x0E, d=0x04 -> 0x55C4
        assert_eq!(pack_language(b"und"), 0x55C4);
    }

    #[test]
    fn creation_time_is_past_epoch() {
        assert!(creation_time_now() > MP4_EPOCH_OFFSET);
    }
}
