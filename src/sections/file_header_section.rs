//! The file header: the fixed 26 bytes at the start of every document.

use serde::Serialize;
use thiserror::Error;

use crate::sections::{CursorError, PsdCursor};

/// Bytes representing the string "8BPS".
const EXPECTED_SIGNATURE: [u8; 4] = *b"8BPS";
/// Maximum width/height of a standard document.
const MAX_DIMENSION_STANDARD: u32 = 30_000;
/// Maximum width/height of a large (PSB) document.
const MAX_DIMENSION_LARGE: u32 = 300_000;
/// Maximum channel count, including alpha channels.
const MAX_CHANNELS: u16 = 56;

/// The FileHeaderSection comes from the first 26 bytes of the file.
///
/// | Length | Description                                                              |
/// |--------|--------------------------------------------------------------------------|
/// | 4      | Signature: always '8BPS'                                                 |
/// | 2      | Version: 1 for PSD, 2 for PSB (large document)                           |
/// | 6      | Reserved (ignored)                                                       |
/// | 2      | Number of channels, including alpha. 1 to 56                             |
/// | 4      | Height in pixels. 1 to 30,000 (PSB max 300,000)                          |
/// | 4      | Width in pixels. 1 to 30,000 (PSB max 300,000)                           |
/// | 2      | Depth: bits per channel. 1, 8, 16 or 32                                  |
/// | 2      | Color mode: Bitmap=0 Grayscale=1 Indexed=2 RGB=3 CMYK=4 Multichannel=7 Duotone=8 Lab=9 |
#[derive(Debug)]
pub(crate) struct FileHeaderSection {
    pub(crate) version: PsdVersion,
    pub(crate) channel_count: ChannelCount,
    pub(crate) width: PsdWidth,
    pub(crate) height: PsdHeight,
    pub(crate) depth: PsdDepth,
    pub(crate) color_mode: ColorMode,
}

/// Represents a malformed or unsupported file header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileHeaderError {
    /// The first four bytes are not '8BPS'.
    #[error("the file signature must be '8BPS'; this is not a Photoshop document")]
    InvalidSignature,
    /// The version is neither 1 (PSD) nor 2 (PSB).
    #[error("document version {version} is not supported; only 1 (PSD) and 2 (PSB) are")]
    UnsupportedVersion {
        /// Version found in the file
        version: u16,
    },
    /// Channel count outside 1..=56.
    #[error("invalid channel count {channel_count}. Must be 1 <= channel count <= 56")]
    ChannelCountOutOfRange {
        /// Count found in the file
        channel_count: u16,
    },
    /// Width outside the format's range.
    #[error("invalid width {width}. Must be 1 <= width <= {max}")]
    WidthOutOfRange {
        /// Width found in the file
        width: u32,
        /// Maximum for this format
        max: u32,
    },
    /// Height outside the format's range.
    #[error("invalid height {height}. Must be 1 <= height <= {max}")]
    HeightOutOfRange {
        /// Height found in the file
        height: u32,
        /// Maximum for this format
        max: u32,
    },
    /// Depth is not one of 1, 8, 16, 32.
    #[error("depth {depth} is invalid. Must be 1, 8, 16 or 32")]
    InvalidDepth {
        /// Depth found in the file
        depth: u16,
    },
    /// The header bytes ran out.
    #[error(transparent)]
    Cursor(#[from] CursorError),
}

impl FileHeaderSection {
    /// Read the header at the cursor's current position (the start of the
    /// file).
    pub fn from_cursor(cursor: &mut PsdCursor<'_>) -> Result<FileHeaderSection, FileHeaderError> {
        let signature = cursor.read_4()?;
        if signature != EXPECTED_SIGNATURE {
            return Err(FileHeaderError::InvalidSignature);
        }

        let version = PsdVersion::new(cursor.read_u16()?)?;

        // 6 reserved bytes; the format says zero but writers vary, so they
        // are skipped, not validated.
        cursor.skip(6)?;

        let channel_count = ChannelCount::new(cursor.read_u16()?)?;

        let height = cursor.read_u32()?;
        let height = PsdHeight::new(height, version.is_large())?;

        let width = cursor.read_u32()?;
        let width = PsdWidth::new(width, version.is_large())?;

        let depth = PsdDepth::new(cursor.read_u16()?)?;
        let color_mode = ColorMode::new(cursor.read_u16()?);

        Ok(FileHeaderSection {
            version,
            channel_count,
            width,
            height,
            depth,
            color_mode,
        })
    }
}

/// The document version: 1 for standard PSD, 2 for large-document PSB.
///
/// The version decides the maximum dimensions and the width of most length
/// fields (4 bytes vs 8 bytes).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum PsdVersion {
    /// Standard PSD
    One,
    /// Large document (PSB)
    Two,
}

impl PsdVersion {
    fn new(version: u16) -> Result<PsdVersion, FileHeaderError> {
        match version {
            1 => Ok(PsdVersion::One),
            2 => Ok(PsdVersion::Two),
            _ => Err(FileHeaderError::UnsupportedVersion { version }),
        }
    }

    /// True for the large-document variant.
    pub fn is_large(self) -> bool {
        self == PsdVersion::Two
    }
}

/// The number of channels in the image, including any alpha channels.
/// Supported range is 1 to 56.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChannelCount(u16);

impl ChannelCount {
    fn new(channel_count: u16) -> Result<ChannelCount, FileHeaderError> {
        if !(1..=MAX_CHANNELS).contains(&channel_count) {
            return Err(FileHeaderError::ChannelCountOutOfRange { channel_count });
        }
        Ok(ChannelCount(channel_count))
    }

    /// Return the channel count
    pub fn count(self) -> u16 {
        self.0
    }
}

/// The height of the image in pixels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PsdHeight(pub(crate) u32);

impl PsdHeight {
    fn new(height: u32, is_large: bool) -> Result<PsdHeight, FileHeaderError> {
        let max = if is_large {
            MAX_DIMENSION_LARGE
        } else {
            MAX_DIMENSION_STANDARD
        };
        if height < 1 || height > max {
            return Err(FileHeaderError::HeightOutOfRange { height, max });
        }
        Ok(PsdHeight(height))
    }
}

/// The width of the image in pixels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PsdWidth(pub(crate) u32);

impl PsdWidth {
    fn new(width: u32, is_large: bool) -> Result<PsdWidth, FileHeaderError> {
        let max = if is_large {
            MAX_DIMENSION_LARGE
        } else {
            MAX_DIMENSION_STANDARD
        };
        if width < 1 || width > max {
            return Err(FileHeaderError::WidthOutOfRange { width, max });
        }
        Ok(PsdWidth(width))
    }
}

/// Depth: the number of bits per channel. Supported values are 1, 8, 16 and
/// 32.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum PsdDepth {
    /// 1-bit (bitmap documents; rows pack eight pixels per byte)
    One = 1,
    /// 8 bits per channel
    Eight = 8,
    /// 16 bits per channel
    Sixteen = 16,
    /// 32 bits per channel
    ThirtyTwo = 32,
}

impl PsdDepth {
    /// Create a new PsdDepth
    pub(crate) fn new(depth: u16) -> Result<PsdDepth, FileHeaderError> {
        match depth {
            1 => Ok(PsdDepth::One),
            8 => Ok(PsdDepth::Eight),
            16 => Ok(PsdDepth::Sixteen),
            32 => Ok(PsdDepth::ThirtyTwo),
            _ => Err(FileHeaderError::InvalidDepth { depth }),
        }
    }

    /// Bits per channel as a number.
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Bytes each sample occupies. Zero for 1-bit documents, whose rows pack
    /// bits instead.
    pub fn bytes_per_sample(self) -> u32 {
        match self {
            PsdDepth::One => 0,
            PsdDepth::Eight => 1,
            PsdDepth::Sixteen => 2,
            PsdDepth::ThirtyTwo => 4,
        }
    }
}

/// The color mode of the file.
///
/// Values this library does not know are preserved numerically rather than
/// rejected, so documents written by newer Photoshop versions still parse.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum ColorMode {
    /// 1-bit bitmap
    Bitmap,
    /// Grayscale
    Grayscale,
    /// Indexed color; the palette lives in the color mode data section
    Indexed,
    /// RGB
    Rgb,
    /// CMYK
    Cmyk,
    /// Multichannel
    Multichannel,
    /// Duotone; duotone parameters live in the color mode data section
    Duotone,
    /// CIE Lab
    Lab,
    /// Any other numeric value, preserved as-is
    Unknown(u16),
}

impl ColorMode {
    /// Create a ColorMode from its on-disk value.
    pub fn new(color_mode: u16) -> ColorMode {
        match color_mode {
            0 => ColorMode::Bitmap,
            1 => ColorMode::Grayscale,
            2 => ColorMode::Indexed,
            3 => ColorMode::Rgb,
            4 => ColorMode::Cmyk,
            7 => ColorMode::Multichannel,
            8 => ColorMode::Duotone,
            9 => ColorMode::Lab,
            other => ColorMode::Unknown(other),
        }
    }

    /// The on-disk numeric value.
    pub fn as_u16(self) -> u16 {
        match self {
            ColorMode::Bitmap => 0,
            ColorMode::Grayscale => 1,
            ColorMode::Indexed => 2,
            ColorMode::Rgb => 3,
            ColorMode::Cmyk => 4,
            ColorMode::Multichannel => 7,
            ColorMode::Duotone => 8,
            ColorMode::Lab => 9,
            ColorMode::Unknown(value) => value,
        }
    }

    /// The number of base color channels this mode implies, if well defined.
    ///
    /// Useful as the `base_channel_count` argument of the background-layer
    /// predicate. Multichannel and unknown modes have no fixed answer.
    pub fn base_channel_count(self) -> Option<u16> {
        match self {
            ColorMode::Bitmap
            | ColorMode::Grayscale
            | ColorMode::Indexed
            | ColorMode::Duotone => Some(1),
            ColorMode::Rgb | ColorMode::Lab => Some(3),
            ColorMode::Cmyk => Some(4),
            ColorMode::Multichannel | ColorMode::Unknown(_) => None,
        }
    }
}
