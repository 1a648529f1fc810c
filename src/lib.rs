//! `isomux` — progressive MP4/MOV container muxer.
//!
//! Assembles a standards-compliant ISO Base Media file (ISO 14496-12
//! subset) from a stream of encoded audio/video/subtitle samples.
//!
//! # Architecture
//!
//! - **Progressive write** — sample payloads go straight into an open
//!   `mdat` box; only per-sample metadata is buffered, so memory use is
//!   bounded by sample count, not media size
//! - **Moov-at-end** — the `moov` (metadata) box is assembled during
//!   [`Mp4Writer::finalize`] once all sample timing is known
//! - **Fast start** — optional post-pass relocates the moov box ahead of
//!   the media data using two bounded buffers, widening chunk-offset
//!   tables to 64-bit when the displacement pushes them past the 32-bit
//!   boundary
//! - **Codec support** — H.264/H.265 video, AAC/Opus audio, tx3g
//!   subtitles; decoder configuration blobs are embedded verbatim
//!
//! # Usage
//!
//! ```ignore
//! use isomux::{Mp4Writer, MuxerConfig, VideoCodec, VideoTrackConfig};
//!
//! let mut writer = Mp4Writer::create("out.mp4", MuxerConfig { fast_start: true })?;
//!
//! let video = writer.add_video_track(VideoTrackConfig {
//!     codec: VideoCodec::H264,
//!     width: 1280,
//!     height: 720,
//!     extra_data: avcc_record,
//! })?;
//!
//! // Append encoded samples in decode order
//! writer.write_sample(video, &frame, pts_ms, dts_ms, is_keyframe)?;
//!
//! // Finalize writes the metadata box and relocates it for fast start
//! writer.finalize()?;
//! ```

mod atoms;
mod faststart;
mod mp4;

pub mod codec;
pub mod error;
pub mod muxer;

// Re-export primary API types
pub use codec::{AudioCodec, SubtitleCodec, VideoCodec};
pub use error::{MuxError, MuxResult};
pub use muxer::{
    AudioTrackConfig, Mp4Writer, MuxerConfig, SubtitleTrackConfig, VideoTrackConfig,
};
