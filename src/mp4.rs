//! Track/sample model and moov box writers.
//!
//! [`write_moov`] and everything below it are pure functions of the track
//! data they receive: writing the same tracks at the same position twice
//! produces byte-identical output. The fast-start pass relies on this to
//! re-emit the moov box with shifted chunk offsets.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Seek, Write};

use crate::atoms::{
    pack_language, write_box, write_full_box, write_unity_matrix, write_zeros, MOVIE_TIMESCALE,
};
use crate::codec::{AudioCodec, SubtitleCodec, VideoCodec};
use crate::error::MuxResult;

/// Sample-table growth step, in entries.
const SAMPLE_BLOCK: usize = 1024;

/// Metadata for one encoded access unit. The payload bytes themselves are
/// never retained; they go straight to the sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Sample {
    /// Absolute position of the sample's bytes in the output.
    pub offset: u64,
    /// Payload size in bytes.
    pub size: u32,
    /// Presentation timestamp in track timescale units.
    pub pts: i64,
    /// Decode timestamp in track timescale units.
    pub dts: i64,
    /// Sync-sample (keyframe) marker.
    pub sync: bool,
}

/// Append-only log of sample metadata for one track.
///
/// Grows in fixed blocks rather than per element, and reports allocation
/// failure instead of aborting.
#[derive(Debug, Default)]
pub(crate) struct SampleTable {
    samples: Vec<Sample>,
}

impl SampleTable {
    pub fn append(&mut self, sample: Sample) -> MuxResult<usize> {
        if self.samples.len() == self.samples.capacity() {
            self.samples.try_reserve_exact(SAMPLE_BLOCK)?;
        }
        self.samples.push(sample);
        Ok(self.samples.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

/// Codec-specific half of a track. The `extra_data` blobs are embedded in
/// the sample description verbatim; this crate never parses them.
#[derive(Clone, Debug)]
pub(crate) enum TrackMedia {
    Video {
        codec: VideoCodec,
        width: u32,
        height: u32,
        extra_data: Vec<u8>,
    },
    Audio {
        codec: AudioCodec,
        channels: u16,
        bits_per_sample: u16,
        sample_rate: u32,
        extra_data: Vec<u8>,
    },
    Subtitle {
        codec: SubtitleCodec,
        extra_data: Vec<u8>,
    },
}

impl TrackMedia {
    fn handler_type(&self) -> &'static [u8; 4] {
        match self {
            Self::Video { .. } => b"vide",
            Self::Audio { .. } => b"soun",
            Self::Subtitle { .. } => b"sbtl",
        }
    }

    fn handler_name(&self) -> &'static str {
        match self {
            Self::Video { .. } => "VideoHandler",
            Self::Audio { .. } => "SoundHandler",
            Self::Subtitle { .. } => "SubtitleHandler",
        }
    }
}

/// One elementary stream and its accumulated sample log.
#[derive(Debug)]
pub(crate) struct Track {
    /// 1-based id, assigned in creation order.
    pub track_id: u32,
    /// Ticks per second for this track's timestamps.
    pub timescale: u32,
    /// Media duration in track timescale units, set by
    /// [`Track::finalize_duration`].
    pub duration: u64,
    /// Displacement added to every sample offset when emitting chunk
    /// offset tables. Zero until fast-start relocation.
    pub base_offset: u64,
    pub media: TrackMedia,
    pub samples: SampleTable,
}

impl Track {
    pub fn new(track_id: u32, timescale: u32, media: TrackMedia) -> Self {
        Self {
            track_id,
            timescale,
            duration: 0,
            base_offset: 0,
            media,
            samples: SampleTable::default(),
        }
    }

    /// Rescale a millisecond value into track timescale units.
    /// Truncating division: remainders are dropped toward zero.
    pub fn rescale(&self, value_ms: i64) -> i64 {
        value_ms * i64::from(self.timescale) / 1000
    }

    /// Media duration is the decode-time span of the sample log.
    pub fn finalize_duration(&mut self) {
        if let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) {
            self.duration = u64::try_from(last.dts - first.dts).unwrap_or(0);
        }
    }

    /// Track duration rescaled into movie timescale units.
    pub fn movie_duration(&self) -> u64 {
        self.duration * u64::from(MOVIE_TIMESCALE) / u64::from(self.timescale)
    }
}

/// A run of samples stored back-to-back in the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Chunk {
    /// Index of the first sample in the run.
    pub first_sample: usize,
    /// Number of samples in the run.
    pub sample_count: u32,
}

/// Group consecutive samples whose bytes are contiguous in the file into
/// chunks. Interleaving with other tracks breaks a run.
///
/// Chunk structure only depends on relative positions, so it is invariant
/// under the uniform per-track shift applied by fast-start relocation.
pub(crate) fn build_chunks(samples: &SampleTable) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut prev_end = 0u64;
    for (index, sample) in samples.iter().enumerate() {
        match chunks.last_mut() {
            Some(last) if sample.offset == prev_end => last.sample_count += 1,
            _ => chunks.push(Chunk {
                first_sample: index,
                sample_count: 1,
            }),
        }
        prev_end = sample.offset + u64::from(sample.size);
    }
    chunks
}

/// Whether the track's chunk offsets need 64-bit entries, given its
/// current base offset.
pub(crate) fn needs_co64(track: &Track) -> bool {
    track
        .samples
        .last()
        .is_some_and(|s| s.offset + track.base_offset > u64::from(u32::MAX))
}

/// Run-length encode a sequence of values.
fn run_length<T: Copy + PartialEq>(values: &[T]) -> Vec<(u32, T)> {
    let mut runs: Vec<(u32, T)> = Vec::new();
    for &value in values {
        match runs.last_mut() {
            Some((count, current)) if *current == value => *count += 1,
            _ => runs.push((1, value)),
        }
    }
    runs
}

/// Per-sample decode deltas. The final sample reuses the previous delta
/// (zero for a single-sample track) so the sum matches the track duration.
fn sample_deltas(samples: &SampleTable) -> Vec<u32> {
    let mut deltas: Vec<u32> = samples
        .iter()
        .zip(samples.iter().skip(1))
        .map(|(a, b)| (b.dts - a.dts) as u32)
        .collect();
    match deltas.last().copied() {
        Some(last) => deltas.push(last),
        None if samples.len() == 1 => deltas.push(0),
        None => {}
    }
    deltas
}

/// 1-based sample numbers of sync samples.
fn sync_samples(samples: &SampleTable) -> Vec<u32> {
    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.sync)
        .map(|(i, _)| (i + 1) as u32)
        .collect()
}

/// Write the ftyp box.
pub(crate) fn write_ftyp<W: Write + Seek>(writer: &mut W) -> MuxResult<u64> {
    write_box(writer, b"ftyp", |w| {
        w.write_all(b"isom")?;
        w.write_u32::<BigEndian>(0x200)?;
        for brand in [b"isom", b"iso2", b"avc1", b"mp41"] {
            w.write_all(brand)?;
        }
        Ok(())
    })
}

/// Write the complete moov box: mvhd followed by one trak per track that
/// has at least one sample. Returns the box size.
pub(crate) fn write_moov<W: Write + Seek>(
    writer: &mut W,
    tracks: &[Track],
    creation_time: u64,
    next_track_id: u32,
) -> MuxResult<u64> {
    write_box(writer, b"moov", |w| {
        let duration = tracks
            .iter()
            .filter(|t| !t.samples.is_empty())
            .map(Track::movie_duration)
            .max()
            .unwrap_or(0);
        write_mvhd(w, creation_time, duration, next_track_id)?;
        for track in tracks.iter().filter(|t| !t.samples.is_empty()) {
            write_trak(w, track, creation_time)?;
        }
        Ok(())
    })
}

fn write_mvhd<W: Write + Seek>(
    writer: &mut W,
    creation_time: u64,
    duration: u64,
    next_track_id: u32,
) -> MuxResult<u64> {
    write_full_box(writer, b"mvhd", 0, 0, |w| {
        w.write_u32::<BigEndian>(creation_time as u32)?;
        w.write_u32::<BigEndian>(creation_time as u32)?;
        w.write_u32::<BigEndian>(MOVIE_TIMESCALE)?;
        w.write_u32::<BigEndian>(duration as u32)?;
        w.write_u32::<BigEndian>(0x0001_0000)?; // rate 1.0
        w.write_u16::<BigEndian>(0x0100)?; // volume 1.0
        write_zeros(w, 10)?;
        write_unity_matrix(w)?;
        write_zeros(w, 24)?; // pre_defined
        w.write_u32::<BigEndian>(next_track_id)?;
        Ok(())
    })
}

fn write_trak<W: Write + Seek>(writer: &mut W, track: &Track, creation_time: u64) -> MuxResult<u64> {
    write_box(writer, b"trak", |w| {
        write_tkhd(w, track, creation_time)?;
        write_mdia(w, track, creation_time)?;
        Ok(())
    })
}

fn write_tkhd<W: Write + Seek>(writer: &mut W, track: &Track, creation_time: u64) -> MuxResult<u64> {
    // flags: track enabled | track in movie
    write_full_box(writer, b"tkhd", 0, 0x000003, |w| {
        w.write_u32::<BigEndian>(creation_time as u32)?;
        w.write_u32::<BigEndian>(creation_time as u32)?;
        w.write_u32::<BigEndian>(track.track_id)?;
        write_zeros(w, 4)?;
        w.write_u32::<BigEndian>(track.movie_duration() as u32)?;
        write_zeros(w, 8)?;
        w.write_i16::<BigEndian>(0)?; // layer
        w.write_i16::<BigEndian>(0)?; // alternate group
        let volume: u16 = match track.media {
            TrackMedia::Audio { .. } => 0x0100,
            _ => 0,
        };
        w.write_u16::<BigEndian>(volume)?;
        write_zeros(w, 2)?;
        write_unity_matrix(w)?;
        let (width, height) = match track.media {
            TrackMedia::Video { width, height, .. } => (width, height),
            _ => (0, 0),
        };
        w.write_u32::<BigEndian>(width << 16)?;
        w.write_u32::<BigEndian>(height << 16)?;
        Ok(())
    })
}

fn write_mdia<W: Write + Seek>(writer: &mut W, track: &Track, creation_time: u64) -> MuxResult<u64> {
    write_box(writer, b"mdia", |w| {
        write_mdhd(w, track, creation_time)?;
        write_hdlr(w, &track.media)?;
        write_minf(w, track)?;
        Ok(())
    })
}

fn write_mdhd<W: Write + Seek>(writer: &mut W, track: &Track, creation_time: u64) -> MuxResult<u64> {
    write_full_box(writer, b"mdhd", 0, 0, |w| {
        w.write_u32::<BigEndian>(creation_time as u32)?;
        w.write_u32::<BigEndian>(creation_time as u32)?;
        w.write_u32::<BigEndian>(track.timescale)?;
        w.write_u32::<BigEndian>(track.duration as u32)?;
        w.write_u16::<BigEndian>(pack_language(b"und"))?;
        w.write_u16::<BigEndian>(0)?; // pre_defined
        Ok(())
    })
}

fn write_hdlr<W: Write + Seek>(writer: &mut W, media: &TrackMedia) -> MuxResult<u64> {
    write_full_box(writer, b"hdlr", 0, 0, |w| {
        write_zeros(w, 4)?; // pre_defined
        w.write_all(media.handler_type())?;
        write_zeros(w, 12)?;
        w.write_all(media.handler_name().as_bytes())?;
        w.write_u8(0)?;
        Ok(())
    })
}

fn write_minf<W: Write + Seek>(writer: &mut W, track: &Track) -> MuxResult<u64> {
    write_box(writer, b"minf", |w| {
        match track.media {
            TrackMedia::Video { .. } => {
                write_full_box(w, b"vmhd", 0, 0x000001, |w| {
                    w.write_u16::<BigEndian>(0)?; // graphics mode
                    write_zeros(w, 6)?; // opcolor
                    Ok(())
                })?;
            }
            TrackMedia::Audio { .. } => {
                write_full_box(w, b"smhd", 0, 0, |w| {
                    w.write_i16::<BigEndian>(0)?; // balance
                    write_zeros(w, 2)?;
                    Ok(())
                })?;
            }
            TrackMedia::Subtitle { .. } => {
                write_full_box(w, b"nmhd", 0, 0, |_| Ok(()))?;
            }
        }
        write_dinf(w)?;
        write_stbl(w, track)?;
        Ok(())
    })
}

fn write_dinf<W: Write + Seek>(writer: &mut W) -> MuxResult<u64> {
    write_box(writer, b"dinf", |w| {
        write_full_box(w, b"dref", 0, 0, |w| {
            w.write_u32::<BigEndian>(1)?; // entry count
            // flag 1: media data lives in this file
            write_full_box(w, b"url ", 0, 0x000001, |_| Ok(()))?;
            Ok(())
        })?;
        Ok(())
    })
}

fn write_stbl<W: Write + Seek>(writer: &mut W, track: &Track) -> MuxResult<u64> {
    let chunks = build_chunks(&track.samples);
    write_box(writer, b"stbl", |w| {
        write_stsd(w, track)?;
        write_stts(w, &track.samples)?;
        if track.samples.iter().any(|s| s.pts != s.dts) {
            write_ctts(w, &track.samples)?;
        }
        write_stsc(w, &chunks)?;
        write_stsz(w, &track.samples)?;
        if needs_co64(track) {
            write_co64(w, track, &chunks)?;
        } else {
            write_stco(w, track, &chunks)?;
        }
        if matches!(track.media, TrackMedia::Video { .. }) {
            let sync = sync_samples(&track.samples);
            // All-sync (or never flagged) tracks omit the table entirely.
            if !sync.is_empty() && sync.len() < track.samples.len() {
                write_stss(w, &sync)?;
            }
        }
        Ok(())
    })
}

fn write_stsd<W: Write + Seek>(writer: &mut W, track: &Track) -> MuxResult<u64> {
    write_full_box(writer, b"stsd", 0, 0, |w| {
        w.write_u32::<BigEndian>(1)?; // entry count
        match &track.media {
            TrackMedia::Video {
                codec,
                width,
                height,
                extra_data,
            } => write_visual_entry(w, *codec, *width, *height, extra_data)?,
            TrackMedia::Audio {
                codec,
                channels,
                bits_per_sample,
                sample_rate,
                extra_data,
            } => write_audio_entry(
                w,
                *codec,
                *channels,
                *bits_per_sample,
                *sample_rate,
                extra_data,
                track.track_id,
            )?,
            TrackMedia::Subtitle { codec, extra_data } => {
                write_text_entry(w, *codec, extra_data)?
            }
        };
        Ok(())
    })
}

fn write_visual_entry<W: Write + Seek>(
    writer: &mut W,
    codec: VideoCodec,
    width: u32,
    height: u32,
    extra_data: &[u8],
) -> MuxResult<u64> {
    write_box(writer, codec.sample_entry(), |w| {
        write_zeros(w, 6)?;
        w.write_u16::<BigEndian>(1)?; // data reference index
        write_zeros(w, 2)?; // pre_defined
        write_zeros(w, 2)?;
        write_zeros(w, 12)?; // pre_defined
        w.write_u16::<BigEndian>(width as u16)?;
        w.write_u16::<BigEndian>(height as u16)?;
        w.write_u32::<BigEndian>(0x0048_0000)?; // 72 dpi horizontal
        w.write_u32::<BigEndian>(0x0048_0000)?; // 72 dpi vertical
        write_zeros(w, 4)?;
        w.write_u16::<BigEndian>(1)?; // frame count
        write_zeros(w, 32)?; // compressor name
        w.write_u16::<BigEndian>(0x0018)?; // depth
        w.write_i16::<BigEndian>(-1)?; // pre_defined
        write_box(w, codec.config_box(), |w| {
            w.write_all(extra_data)?;
            Ok(())
        })?;
        Ok(())
    })
}

fn write_audio_entry<W: Write + Seek>(
    writer: &mut W,
    codec: AudioCodec,
    channels: u16,
    bits_per_sample: u16,
    sample_rate: u32,
    extra_data: &[u8],
    track_id: u32,
) -> MuxResult<u64> {
    write_box(writer, codec.sample_entry(), |w| {
        write_zeros(w, 6)?;
        w.write_u16::<BigEndian>(1)?; // data reference index
        write_zeros(w, 8)?;
        w.write_u16::<BigEndian>(channels)?;
        w.write_u16::<BigEndian>(bits_per_sample)?;
        write_zeros(w, 2)?; // pre_defined
        write_zeros(w, 2)?;
        w.write_u32::<BigEndian>((sample_rate & 0xFFFF) << 16)?;
        match codec {
            AudioCodec::Aac => write_esds(w, codec, extra_data, track_id)?,
            AudioCodec::Opus => write_dops(w, channels, sample_rate, extra_data)?,
        };
        Ok(())
    })
}

/// Number of bytes the expandable length encoding needs for `len`.
fn descr_len_bytes(len: usize) -> usize {
    match len {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x001F_FFFF => 3,
        _ => 4,
    }
}

/// Full encoded size of a descriptor with a `payload`-byte body.
fn descr_size(payload: usize) -> usize {
    1 + descr_len_bytes(payload) + payload
}

/// Write a descriptor tag and its expandable length field.
fn write_descr<W: Write>(writer: &mut W, tag: u8, payload_len: usize) -> MuxResult<()> {
    writer.write_u8(tag)?;
    let n = descr_len_bytes(payload_len);
    for i in (0..n).rev() {
        let byte = ((payload_len >> (7 * i)) & 0x7F) as u8;
        writer.write_u8(if i > 0 { byte | 0x80 } else { byte })?;
    }
    Ok(())
}

fn write_esds<W: Write + Seek>(
    writer: &mut W,
    codec: AudioCodec,
    extra_data: &[u8],
    track_id: u32,
) -> MuxResult<u64> {
    let specific = if extra_data.is_empty() {
        0
    } else {
        descr_size(extra_data.len())
    };
    let dec_config = 13 + specific;
    let es = 3 + descr_size(dec_config) + descr_size(1);

    write_full_box(writer, b"esds", 0, 0, |w| {
        write_descr(w, 0x03, es)?; // ES descriptor
        w.write_u16::<BigEndian>(track_id as u16)?; // ES id
        w.write_u8(0)?; // stream priority
        write_descr(w, 0x04, dec_config)?; // decoder config
        w.write_u8(codec.object_type())?;
        w.write_u8(0x15)?; // audio stream
        write_zeros(w, 3)?; // buffer size
        w.write_u32::<BigEndian>(0)?; // max bitrate unknown
        w.write_u32::<BigEndian>(0)?; // avg bitrate unknown
        if !extra_data.is_empty() {
            write_descr(w, 0x05, extra_data.len())?; // decoder specific info
            w.write_all(extra_data)?;
        }
        write_descr(w, 0x06, 1)?; // SL config
        w.write_u8(0x02)?;
        Ok(())
    })
}

fn write_dops<W: Write + Seek>(
    writer: &mut W,
    channels: u16,
    sample_rate: u32,
    extra_data: &[u8],
) -> MuxResult<u64> {
    write_box(writer, b"dOps", |w| {
        if extra_data.is_empty() {
            w.write_u8(0)?; // version
            w.write_u8(channels as u8)?;
            w.write_u16::<BigEndian>(312)?; // pre-skip
            w.write_u32::<BigEndian>(sample_rate)?;
            w.write_i16::<BigEndian>(0)?; // output gain
            w.write_u8(0)?; // mapping family
        } else {
            w.write_all(extra_data)?;
        }
        Ok(())
    })
}

fn write_text_entry<W: Write + Seek>(
    writer: &mut W,
    codec: SubtitleCodec,
    extra_data: &[u8],
) -> MuxResult<u64> {
    write_box(writer, codec.sample_entry(), |w| {
        write_zeros(w, 6)?;
        w.write_u16::<BigEndian>(1)?; // data reference index
        if extra_data.is_empty() {
            w.write_u32::<BigEndian>(0)?; // display flags
            w.write_i8(1)?; // horizontal justification
            w.write_i8(-1)?; // vertical justification
            write_zeros(w, 4)?; // background color
            write_zeros(w, 8)?; // default text box
            w.write_u16::<BigEndian>(0)?; // style: start char
            w.write_u16::<BigEndian>(0)?; // style: end char
            w.write_u16::<BigEndian>(1)?; // style: font id
            w.write_u8(0)?; // style: face flags
            w.write_u8(12)?; // style: font size
            w.write_all(&[0xFF, 0xFF, 0xFF, 0xFF])?; // style: text color
            write_box(w, b"ftab", |w| {
                w.write_u16::<BigEndian>(1)?; // entry count
                w.write_u16::<BigEndian>(1)?; // font id
                w.write_u8(5)?;
                w.write_all(b"Serif")?;
                Ok(())
            })?;
        } else {
            w.write_all(extra_data)?;
        }
        Ok(())
    })
}

fn write_stts<W: Write + Seek>(writer: &mut W, samples: &SampleTable) -> MuxResult<u64> {
    let runs = run_length(&sample_deltas(samples));
    write_full_box(writer, b"stts", 0, 0, |w| {
        w.write_u32::<BigEndian>(runs.len() as u32)?;
        for (count, delta) in &runs {
            w.write_u32::<BigEndian>(*count)?;
            w.write_u32::<BigEndian>(*delta)?;
        }
        Ok(())
    })
}

fn write_ctts<W: Write + Seek>(writer: &mut W, samples: &SampleTable) -> MuxResult<u64> {
    let offsets: Vec<i32> = samples.iter().map(|s| (s.pts - s.dts) as i32).collect();
    let runs = run_length(&offsets);
    // version 1: signed composition offsets
    write_full_box(writer, b"ctts", 1, 0, |w| {
        w.write_u32::<BigEndian>(runs.len() as u32)?;
        for (count, offset) in &runs {
            w.write_u32::<BigEndian>(*count)?;
            w.write_i32::<BigEndian>(*offset)?;
        }
        Ok(())
    })
}

fn write_stsc<W: Write + Seek>(writer: &mut W, chunks: &[Chunk]) -> MuxResult<u64> {
    // Runs of equal samples-per-chunk collapse to one entry.
    let mut entries: Vec<(u32, u32)> = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        match entries.last() {
            Some((_, count)) if *count == chunk.sample_count => {}
            _ => entries.push((index as u32 + 1, chunk.sample_count)),
        }
    }
    write_full_box(writer, b"stsc", 0, 0, |w| {
        w.write_u32::<BigEndian>(entries.len() as u32)?;
        for (first_chunk, samples_per_chunk) in &entries {
            w.write_u32::<BigEndian>(*first_chunk)?;
            w.write_u32::<BigEndian>(*samples_per_chunk)?;
            w.write_u32::<BigEndian>(1)?; // sample description index
        }
        Ok(())
    })
}

fn write_stsz<W: Write + Seek>(writer: &mut W, samples: &SampleTable) -> MuxResult<u64> {
    let uniform = samples
        .first()
        .filter(|first| samples.iter().all(|s| s.size == first.size))
        .map(|first| first.size);
    write_full_box(writer, b"stsz", 0, 0, |w| {
        match uniform {
            Some(size) => {
                w.write_u32::<BigEndian>(size)?;
                w.write_u32::<BigEndian>(samples.len() as u32)?;
            }
            None => {
                w.write_u32::<BigEndian>(0)?;
                w.write_u32::<BigEndian>(samples.len() as u32)?;
                for sample in samples.iter() {
                    w.write_u32::<BigEndian>(sample.size)?;
                }
            }
        }
        Ok(())
    })
}

fn write_stco<W: Write + Seek>(writer: &mut W, track: &Track, chunks: &[Chunk]) -> MuxResult<u64> {
    write_full_box(writer, b"stco", 0, 0, |w| {
        w.write_u32::<BigEndian>(chunks.len() as u32)?;
        for chunk in chunks {
            let offset = track.samples.get(chunk.first_sample).map_or(0, |s| s.offset);
            w.write_u32::<BigEndian>((offset + track.base_offset) as u32)?;
        }
        Ok(())
    })
}

fn write_co64<W: Write + Seek>(writer: &mut W, track: &Track, chunks: &[Chunk]) -> MuxResult<u64> {
    write_full_box(writer, b"co64", 0, 0, |w| {
        w.write_u32::<BigEndian>(chunks.len() as u32)?;
        for chunk in chunks {
            let offset = track.samples.get(chunk.first_sample).map_or(0, |s| s.offset);
            w.write_u64::<BigEndian>(offset + track.base_offset)?;
        }
        Ok(())
    })
}

fn write_stss<W: Write + Seek>(writer: &mut W, sync: &[u32]) -> MuxResult<u64> {
    write_full_box(writer, b"stss", 0, 0, |w| {
        w.write_u32::<BigEndian>(sync.len() as u32)?;
        for sample_number in sync {
            w.write_u32::<BigEndian>(*sample_number)?;
        }
        Ok(())
    })
}
