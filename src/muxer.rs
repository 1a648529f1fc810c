//! High-level progressive muxer API.
//!
//! Usage:
//! ```ignore
//! let mut writer = Mp4Writer::create("out.mp4", MuxerConfig { fast_start: false })?;
//! let video = writer.add_video_track(video_config)?;
//! let audio = writer.add_audio_track(audio_config)?;
//!
//! // Append encoded samples in decode order, any track interleaving
//! writer.write_sample(video, &frame, pts_ms, dts_ms, is_keyframe)?;
//! writer.write_sample(audio, &packet, pts_ms, pts_ms, true)?;
//!
//! // Writes the moov box and returns the sink
//! writer.finalize()?;
//! ```

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::atoms::{self, MOVIE_TIMESCALE};
use crate::codec::{AudioCodec, SubtitleCodec, VideoCodec};
use crate::error::{MuxError, MuxResult};
use crate::faststart;
use crate::mp4::{self, Sample, Track, TrackMedia};

/// Container-level options.
#[derive(Clone, Debug, Default)]
pub struct MuxerConfig {
    /// Relocate the moov box in front of the media data at finalize so
    /// playback can start after a single sequential read prefix.
    pub fast_start: bool,
}

/// Video track parameters.
#[derive(Clone, Debug)]
pub struct VideoTrackConfig {
    pub codec: VideoCodec,
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// Decoder configuration record (avcC/hvcC payload), embedded verbatim.
    pub extra_data: Vec<u8>,
}

/// Audio track parameters.
#[derive(Clone, Debug)]
pub struct AudioTrackConfig {
    pub codec: AudioCodec,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Codec-specific configuration, embedded verbatim (AudioSpecificConfig
    /// for AAC, dOps payload for Opus).
    pub extra_data: Vec<u8>,
}

/// Subtitle track parameters.
#[derive(Clone, Debug)]
pub struct SubtitleTrackConfig {
    pub codec: SubtitleCodec,
    /// Sample entry payload; a default text record is written when empty.
    pub extra_data: Vec<u8>,
}

/// Progressive MP4/MOV writer.
///
/// Sample payloads are appended to an open mdat box as they arrive; only
/// their metadata is buffered, so memory use is bounded by the sample
/// count, not the media size. [`Mp4Writer::finalize`] consumes the writer,
/// so samples cannot be appended to a finished container.
///
/// Timestamps are taken in milliseconds and rescaled into the track
/// timescale with truncating division.
pub struct Mp4Writer<S: Read + Write + Seek> {
    sink: S,
    fast_start: bool,
    tracks: Vec<Track>,
    /// File offset of the mdat box header.
    mdat_offset: u64,
    /// Media payload bytes written so far.
    mdat_size: u64,
    /// Captured once so every moov emission is byte-identical.
    creation_time: u64,
}

impl Mp4Writer<File> {
    /// Create a writer over a new file at `path`.
    ///
    /// The file is opened readable because fast-start relocation reads the
    /// media data back while shifting it.
    pub fn create<P: AsRef<Path>>(path: P, config: MuxerConfig) -> MuxResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::new(file, config)
    }
}

impl<S: Read + Write + Seek> Mp4Writer<S> {
    /// Create a writer over an arbitrary seekable sink. Writes the ftyp
    /// box and the mdat placeholder header immediately.
    pub fn new(mut sink: S, config: MuxerConfig) -> MuxResult<Self> {
        mp4::write_ftyp(&mut sink)?;
        let mdat_offset = atoms::begin_box(&mut sink, b"mdat")?;
        Ok(Self {
            sink,
            fast_start: config.fast_start,
            tracks: Vec::new(),
            mdat_offset,
            mdat_size: 0,
            creation_time: atoms::creation_time_now(),
        })
    }

    /// Add a video track. Returns the track index for `write_sample`.
    pub fn add_video_track(&mut self, config: VideoTrackConfig) -> MuxResult<usize> {
        let index = self.add_track(TrackMedia::Video {
            codec: config.codec,
            width: config.width,
            height: config.height,
            extra_data: config.extra_data,
        })?;
        tracing::info!(track = index, codec = ?config.codec, "added video track");
        Ok(index)
    }

    /// Add an audio track. Returns the track index for `write_sample`.
    pub fn add_audio_track(&mut self, config: AudioTrackConfig) -> MuxResult<usize> {
        let index = self.add_track(TrackMedia::Audio {
            codec: config.codec,
            channels: config.channels,
            bits_per_sample: config.bits_per_sample,
            sample_rate: config.sample_rate,
            extra_data: config.extra_data,
        })?;
        tracing::info!(track = index, codec = ?config.codec, "added audio track");
        Ok(index)
    }

    /// Add a subtitle track. Returns the track index for `write_sample`.
    pub fn add_subtitle_track(&mut self, config: SubtitleTrackConfig) -> MuxResult<usize> {
        let index = self.add_track(TrackMedia::Subtitle {
            codec: config.codec,
            extra_data: config.extra_data,
        })?;
        tracing::info!(track = index, codec = ?config.codec, "added subtitle track");
        Ok(index)
    }

    fn add_track(&mut self, media: TrackMedia) -> MuxResult<usize> {
        self.tracks.try_reserve(1)?;
        let track_id = self.tracks.len() as u32 + 1;
        self.tracks
            .push(Track::new(track_id, MOVIE_TIMESCALE, media));
        Ok(self.tracks.len() - 1)
    }

    /// Append one encoded sample to a track.
    ///
    /// The payload goes straight into the mdat box; timing and placement
    /// are recorded in the track's sample table. Samples must arrive in
    /// non-decreasing decode order per track; interleaving across tracks
    /// is free. A bad index fails with [`MuxError::InvalidTrack`] before
    /// any state changes.
    pub fn write_sample(
        &mut self,
        track: usize,
        data: &[u8],
        pts_ms: i64,
        dts_ms: i64,
        keyframe: bool,
    ) -> MuxResult<()> {
        let state = self
            .tracks
            .get_mut(track)
            .ok_or(MuxError::InvalidTrack(track))?;
        let pts = state.rescale(pts_ms);
        let dts = state.rescale(dts_ms);

        let offset = self.sink.stream_position()?;
        self.sink.write_all(data)?;
        state.samples.append(Sample {
            offset,
            size: data.len() as u32,
            pts,
            dts,
            sync: keyframe,
        })?;
        self.mdat_size += data.len() as u64;
        Ok(())
    }

    /// Number of samples recorded on a track.
    pub fn track_sample_count(&self, track: usize) -> MuxResult<usize> {
        self.tracks
            .get(track)
            .map(|t| t.samples.len())
            .ok_or(MuxError::InvalidTrack(track))
    }

    /// Media payload bytes written so far.
    pub fn mdat_bytes_written(&self) -> u64 {
        self.mdat_size
    }

    /// Finish the container: patch the mdat size, compute durations, write
    /// the moov box and, if configured, relocate it ahead of the media
    /// data. Returns the sink.
    pub fn finalize(mut self) -> MuxResult<S> {
        atoms::patch_u32_at(
            &mut self.sink,
            self.mdat_offset,
            (self.mdat_size + 8) as u32,
        )?;

        for track in &mut self.tracks {
            track.finalize_duration();
        }

        let moov_start = self.sink.stream_position()?;
        debug_assert_eq!(moov_start, self.mdat_offset + 8 + self.mdat_size);
        let next_track_id = self.tracks.len() as u32 + 1;
        mp4::write_moov(&mut self.sink, &self.tracks, self.creation_time, next_track_id)?;
        let moov_end = self.sink.stream_position()?;

        if self.fast_start {
            faststart::relocate(
                &mut self.sink,
                self.mdat_offset,
                moov_start,
                moov_end,
                &mut self.tracks,
                self.creation_time,
                next_track_id,
            )?;
        }

        self.sink.flush()?;
        tracing::info!(
            tracks = self.tracks.len(),
            media_bytes = self.mdat_size,
            fast_start = self.fast_start,
            "container finalized"
        );
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn cursor_writer(fast_start: bool) -> Mp4Writer<Cursor<Vec<u8>>> {
        Mp4Writer::new(Cursor::new(Vec::new()), MuxerConfig { fast_start }).unwrap()
    }

    fn test_video_config() -> VideoTrackConfig {
        VideoTrackConfig {
            codec: VideoCodec::H264,
            width: 1280,
            height: 720,
            extra_data: vec![0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1],
        }
    }

    fn test_audio_config() -> AudioTrackConfig {
        AudioTrackConfig {
            codec: AudioCodec::Aac,
            channels: 2,
            bits_per_sample: 16,
            sample_rate: 48_000,
            extra_data: vec![0x11, 0x90],
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("isomux_test_{name}.mp4"));
        path
    }

    /// Walk the top-level boxes of a finished file.
    fn top_level_boxes(buf: &[u8]) -> Vec<([u8; 4], u32)> {
        let mut boxes = Vec::new();
        let mut offset = 0usize;
        while offset + 8 <= buf.len() {
            let size = u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap());
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&buf[offset + 4..offset + 8]);
            boxes.push((tag, size));
            if size < 8 {
                break;
            }
            offset += size as usize;
        }
        boxes
    }

    fn find_box(buf: &[u8], tag: &[u8; 4]) -> usize {
        buf.windows(4).position(|w| w == tag).unwrap() - 4
    }

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn track_indices_count_up() {
        let mut writer = cursor_writer(false);
        assert_eq!(writer.add_video_track(test_video_config()).unwrap(), 0);
        assert_eq!(writer.add_audio_track(test_audio_config()).unwrap(), 1);
        assert_eq!(
            writer
                .add_subtitle_track(SubtitleTrackConfig {
                    codec: SubtitleCodec::Tx3g,
                    extra_data: vec![],
                })
                .unwrap(),
            2
        );
    }

    #[test]
    fn three_sample_accounting() {
        let mut writer = cursor_writer(false);
        let video = writer.add_video_track(test_video_config()).unwrap();

        writer.write_sample(video, &[0xAA; 100], 0, 0, true).unwrap();
        writer.write_sample(video, &[0xBB; 200], 40, 40, false).unwrap();
        writer.write_sample(video, &[0xCC; 150], 80, 80, false).unwrap();

        assert_eq!(writer.track_sample_count(video).unwrap(), 3);
        assert_eq!(writer.mdat_bytes_written(), 450);

        let buf = writer.finalize().unwrap().into_inner();

        // ftyp is 32 bytes; the mdat header follows immediately
        assert_eq!(u32_at(&buf, 32), 458);
        assert_eq!(&buf[36..40], b"mdat");

        // movie duration in the mvhd is 80 ms
        let mvhd = find_box(&buf, b"mvhd");
        assert_eq!(u32_at(&buf, mvhd + 20), 1000); // timescale
        assert_eq!(u32_at(&buf, mvhd + 24), 80); // duration

        // track duration in the mdhd matches
        let mdhd = find_box(&buf, b"mdhd");
        assert_eq!(u32_at(&buf, mdhd + 24), 80);
    }

    #[test]
    fn total_size_adds_up() {
        let mut writer = cursor_writer(false);
        let video = writer.add_video_track(test_video_config()).unwrap();
        let audio = writer.add_audio_track(test_audio_config()).unwrap();
        let mut media_bytes = 0usize;
        for i in 0..10 {
            writer
                .write_sample(video, &[0x11; 500], i * 40, i * 40, i == 0)
                .unwrap();
            writer
                .write_sample(audio, &[0x22; 120], i * 21, i * 21, true)
                .unwrap();
            media_bytes += 620;
        }
        let buf = writer.finalize().unwrap().into_inner();

        let moov_start = 32 + 8 + media_bytes;
        assert_eq!(&buf[moov_start + 4..moov_start + 8], b"moov");
        let moov_size = u32_at(&buf, moov_start) as usize;
        assert_eq!(buf.len(), moov_start + moov_size);
    }

    #[test]
    fn invalid_track_leaves_state_untouched() {
        let mut writer = cursor_writer(false);
        let video = writer.add_video_track(test_video_config()).unwrap();
        let audio = writer.add_audio_track(test_audio_config()).unwrap();
        writer.write_sample(video, &[0x01; 64], 0, 0, true).unwrap();

        let err = writer.write_sample(5, &[0x02; 64], 0, 0, false).unwrap_err();
        assert!(matches!(err, MuxError::InvalidTrack(5)));
        assert_eq!(writer.track_sample_count(video).unwrap(), 1);
        assert_eq!(writer.track_sample_count(audio).unwrap(), 0);
        assert_eq!(writer.mdat_bytes_written(), 64);

        assert!(matches!(
            writer.track_sample_count(9).unwrap_err(),
            MuxError::InvalidTrack(9)
        ));
    }

    #[test]
    fn box_order_without_fast_start() {
        let mut writer = cursor_writer(false);
        let video = writer.add_video_track(test_video_config()).unwrap();
        writer.write_sample(video, &[0xAB; 300], 0, 0, true).unwrap();
        let buf = writer.finalize().unwrap().into_inner();

        let tags: Vec<[u8; 4]> = top_level_boxes(&buf).iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![*b"ftyp", *b"mdat", *b"moov"]);
    }

    #[test]
    fn fast_start_reorders_and_preserves_length() {
        let build = |fast_start: bool| -> Vec<u8> {
            let mut writer = cursor_writer(fast_start);
            let video = writer.add_video_track(test_video_config()).unwrap();
            let audio = writer.add_audio_track(test_audio_config()).unwrap();
            for i in 0..20 {
                writer
                    .write_sample(video, &[i as u8; 333], i * 40, i * 40, i % 10 == 0)
                    .unwrap();
                if i % 2 == 0 {
                    writer
                        .write_sample(audio, &[0xA0 | i as u8; 57], i * 21, i * 21, true)
                        .unwrap();
                }
            }
            writer.finalize().unwrap().into_inner()
        };

        let plain = build(false);
        let fast = build(true);
        assert_eq!(plain.len(), fast.len());

        let tags: Vec<[u8; 4]> = top_level_boxes(&fast).iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![*b"ftyp", *b"moov", *b"mdat"]);

        // the media bytes themselves are untouched, just displaced
        let plain_mdat = 32usize;
        let moov_size = u32_at(&fast, 32) as usize;
        let fast_mdat = 32 + moov_size;
        let mdat_size = u32_at(&plain, plain_mdat) as usize;
        assert_eq!(u32_at(&fast, fast_mdat) as usize, mdat_size);
        assert_eq!(
            &plain[plain_mdat..plain_mdat + mdat_size],
            &fast[fast_mdat..fast_mdat + mdat_size]
        );

        // chunk offsets now point past the relocated moov: the first video
        // sample sits right after the mdat header
        let stco = find_box(&fast, b"stco");
        let first_offset = u32_at(&fast, stco + 16) as usize;
        assert_eq!(first_offset, fast_mdat + 8);
        assert_eq!(fast[first_offset], 0); // first video payload byte
    }

    #[test]
    fn empty_tracks_are_excluded_but_counted() {
        let mut writer = cursor_writer(false);
        let _video = writer.add_video_track(test_video_config()).unwrap();
        let audio = writer.add_audio_track(test_audio_config()).unwrap();
        writer.write_sample(audio, &[0x44; 32], 0, 0, true).unwrap();
        let buf = writer.finalize().unwrap().into_inner();

        // no video trak was emitted
        assert!(!buf.windows(4).any(|w| w == b"vide"));
        assert!(buf.windows(4).any(|w| w == b"soun"));

        // next_track_ID still accounts for the empty track
        let mvhd = find_box(&buf, b"mvhd");
        let mvhd_size = u32_at(&buf, mvhd) as usize;
        let next_track_id = u32_at(&buf, mvhd + mvhd_size - 4);
        assert_eq!(next_track_id, 3);
    }

    #[test]
    fn all_tracks_empty_still_finalizes() {
        let mut writer = cursor_writer(false);
        writer.add_video_track(test_video_config()).unwrap();
        let buf = writer.finalize().unwrap().into_inner();
        let tags: Vec<[u8; 4]> = top_level_boxes(&buf).iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![*b"ftyp", *b"mdat", *b"moov"]);
        assert_eq!(u32_at(&buf, 32), 8); // empty mdat
        assert!(!buf.windows(4).any(|w| w == b"trak"));
    }

    #[test]
    fn fast_start_with_empty_mdat() {
        let mut writer = cursor_writer(true);
        writer.add_video_track(test_video_config()).unwrap();
        let buf = writer.finalize().unwrap().into_inner();
        let tags: Vec<[u8; 4]> = top_level_boxes(&buf).iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![*b"ftyp", *b"moov", *b"mdat"]);
    }

    #[test]
    fn subtitle_samples_roundtrip() {
        let mut writer = cursor_writer(false);
        let text = writer
            .add_subtitle_track(SubtitleTrackConfig {
                codec: SubtitleCodec::Tx3g,
                extra_data: vec![],
            })
            .unwrap();
        writer
            .write_sample(text, b"\x00\x0bhello world", 0, 0, true)
            .unwrap();
        writer
            .write_sample(text, b"\x00\x07goodbye", 2000, 2000, true)
            .unwrap();
        let buf = writer.finalize().unwrap().into_inner();
        assert!(buf.windows(4).any(|w| w == b"tx3g"));
        assert!(buf.windows(4).any(|w| w == b"sbtl"));

        let mdhd = find_box(&buf, b"mdhd");
        assert_eq!(u32_at(&buf, mdhd + 24), 2000);
    }

    #[test]
    fn interleaved_writes_keep_per_track_counts() {
        let mut writer = cursor_writer(false);
        let video = writer.add_video_track(test_video_config()).unwrap();
        let audio = writer.add_audio_track(test_audio_config()).unwrap();
        for i in 0..30 {
            writer
                .write_sample(video, &[1u8; 64], i * 40, i * 40, i == 0)
                .unwrap();
            if i % 3 == 0 {
                writer.write_sample(audio, &[2u8; 16], i * 21, i * 21, true).unwrap();
            }
        }
        assert_eq!(writer.track_sample_count(video).unwrap(), 30);
        assert_eq!(writer.track_sample_count(audio).unwrap(), 10);
        writer.finalize().unwrap();
    }

    #[test]
    fn file_backed_fast_start() {
        let path = temp_path("file_backed_fast_start");
        let mut writer = Mp4Writer::create(&path, MuxerConfig { fast_start: true }).unwrap();
        let video = writer.add_video_track(test_video_config()).unwrap();
        for i in 0..5 {
            writer
                .write_sample(video, &[0x5A; 1000], i * 40, i * 40, i == 0)
                .unwrap();
        }
        writer.finalize().unwrap();

        let buf = std::fs::read(&path).unwrap();
        let tags: Vec<[u8; 4]> = top_level_boxes(&buf).iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![*b"ftyp", *b"moov", *b"mdat"]);
        std::fs::remove_file(&path).ok();
    }
}
