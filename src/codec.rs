//! Codec identifier enums and their container-level mappings.

/// Video codec identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    H264,
    H265,
}

impl VideoCodec {
    /// Sample entry fourcc for the stsd box.
    pub(crate) fn sample_entry(self) -> &'static [u8; 4] {
        match self {
            Self::H264 => b"avc1",
            Self::H265 => b"hvc1",
        }
    }

    /// Fourcc of the decoder configuration record box nested in the
    /// sample entry.
    pub(crate) fn config_box(self) -> &'static [u8; 4] {
        match self {
            Self::H264 => b"avcC",
            Self::H265 => b"hvcC",
        }
    }
}

/// Audio codec identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    Aac,
    Opus,
}

impl AudioCodec {
    /// Sample entry fourcc for the stsd box.
    pub(crate) fn sample_entry(self) -> &'static [u8; 4] {
        match self {
            Self::Aac => b"mp4a",
            Self::Opus => b"Opus",
        }
    }

    /// MPEG-4 objectTypeIndication carried in the esds descriptor.
    pub(crate) fn object_type(self) -> u8 {
        match self {
            Self::Aac => 0x40,
            Self::Opus => 0xAD,
        }
    }
}

/// Subtitle codec identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubtitleCodec {
    /// 3GPP timed text.
    Tx3g,
}

impl SubtitleCodec {
    /// Sample entry fourcc for the stsd box.
    pub(crate) fn sample_entry(self) -> &'static [u8; 4] {
        match self {
            Self::Tx3g => b"tx3g",
        }
    }
}
