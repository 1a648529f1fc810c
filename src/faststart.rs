//! Fast-start relocation: move the moov box in front of the media data.
//!
//! After the normal finalize pass the file reads [ftyp][mdat][moov]. A
//! consumer that cannot seek ahead wants [ftyp][moov][mdat]. Inserting the
//! moov box shifts every sample forward, which can push chunk offsets past
//! the 32-bit boundary; widening a table to 64-bit grows the moov box,
//! which shifts the samples further. The displacement is therefore the
//! fixed point of the widening cost, found by iterating to exact equality.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::MuxResult;
use crate::mp4::{build_chunks, write_moov, Track};

/// Extra moov bytes needed if this track's chunk offsets are shifted
/// forward by `shift`: zero when the track is empty, already 64-bit, or
/// still fits in 32 bits; otherwise 4 bytes per chunk entry (the stco to
/// co64 widening).
pub(crate) fn co64_growth(track: &Track, shift: u64) -> u64 {
    let Some(last) = track.samples.last() else {
        return 0;
    };
    let end = last.offset + track.base_offset;
    if end > u64::from(u32::MAX) {
        return 0;
    }
    if end + shift <= u64::from(u32::MAX) {
        return 0;
    }
    4 * build_chunks(&track.samples).len() as u64
}

/// Fixed point of the offset-width widening cost for a moov box of `gap`
/// bytes. Monotonically non-decreasing and bounded by the total chunk
/// count, so the equality check always terminates.
pub(crate) fn displacement_extra(tracks: &[Track], gap: u64) -> u64 {
    let mut extra = 0u64;
    loop {
        let need: u64 = tracks.iter().map(|t| co64_growth(t, gap + extra)).sum();
        if need == extra {
            return extra;
        }
        extra = need;
    }
}

/// Rewrite the moov box with displaced chunk offsets and physically swap
/// it ahead of the media data.
///
/// `mdat_offset` is where the mdat header starts, `moov_start..moov_end`
/// the span of the moov box just written at the end of the file.
pub(crate) fn relocate<S: Read + Write + Seek>(
    sink: &mut S,
    mdat_offset: u64,
    moov_start: u64,
    moov_end: u64,
    tracks: &mut [Track],
    creation_time: u64,
    next_track_id: u32,
) -> MuxResult<()> {
    let gap = moov_end - moov_start;
    let extra = displacement_extra(tracks, gap);
    tracing::debug!(gap, extra, "relocating metadata ahead of media data");

    for track in tracks.iter_mut() {
        track.base_offset += gap + extra;
    }
    sink.seek(SeekFrom::Start(moov_start))?;
    write_moov(sink, tracks, creation_time, next_track_id)?;
    let rewritten_end = sink.stream_position()?;
    assert_eq!(
        rewritten_end - moov_start,
        gap + extra,
        "rewritten moov length does not match the computed displacement"
    );

    shift_tail(sink, mdat_offset, moov_start, (gap + extra) as usize)
}

fn alloc_buf(len: usize) -> MuxResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Shift the region `to..from` forward by `len` bytes so that the `len`
/// bytes starting at `from` land at `to`.
///
/// Uses two `len`-sized buffers ping-ponged through the file: each stride
/// reads the next chunk into the free buffer, writes the held buffer into
/// the slot just vacated, and swaps. The final partial stride writes only
/// the remaining byte count. Auxiliary memory stays at `2 * len`
/// regardless of how large the shifted region is.
pub(crate) fn shift_tail<S: Read + Write + Seek>(
    sink: &mut S,
    to: u64,
    from: u64,
    len: usize,
) -> MuxResult<()> {
    debug_assert!(to < from);
    let mut buffers = [alloc_buf(len)?, alloc_buf(len)?];

    sink.seek(SeekFrom::Start(from))?;
    sink.read_exact(&mut buffers[0])?;

    let mut held = 0usize;
    let mut pos = to;
    while pos < from {
        let free = held ^ 1;
        sink.seek(SeekFrom::Start(pos))?;
        sink.read_exact(&mut buffers[free])?;
        sink.seek(SeekFrom::Start(pos))?;
        sink.write_all(&buffers[held])?;
        held = free;
        pos += len as u64;
    }
    let rest = len - (pos - from) as usize;
    sink.write_all(&buffers[held][..rest])?;
    Ok(())
}
