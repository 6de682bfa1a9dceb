//! Layer channel records and their decode-on-first-use pixel planes.

use serde::Serialize;
use thiserror::Error;

use crate::compression::{
    deflate_decompress, deflate_decompress_predicted, packbits_decode_channel, CodecError,
};
use crate::sections::file_header_section::PsdDepth;

/// How a channel's pixel data is compressed on disk.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum ChannelCompression {
    /// Not compressed
    RawData = 0,
    /// [PackBits RLE compression](https://en.wikipedia.org/wiki/PackBits)
    RleCompressed = 1,
    /// Deflate without prediction
    ZipWithoutPrediction = 2,
    /// Deflate with a per-scanline PNG prediction filter
    ZipWithPrediction = 3,
}

impl ChannelCompression {
    /// Create a new ChannelCompression from its on-disk code.
    pub fn new(compression: u16) -> Result<ChannelCompression, ChannelError> {
        match compression {
            0 => Ok(ChannelCompression::RawData),
            1 => Ok(ChannelCompression::RleCompressed),
            2 => Ok(ChannelCompression::ZipWithoutPrediction),
            3 => Ok(ChannelCompression::ZipWithPrediction),
            _ => Err(ChannelError::InvalidCompression { compression }),
        }
    }
}

/// An error when working with a layer channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The on-disk compression code is not 0..=3.
    #[error("{compression} is an invalid channel compression. Must be 0, 1, 2 or 3")]
    InvalidCompression {
        /// The invalid code
        compression: u16,
    },
    /// A raw channel holds fewer bytes than its plane requires.
    #[error("channel {channel_id} holds {actual} raw bytes, expected at least {expected}")]
    RawDataTooShort {
        /// The channel's id
        channel_id: i16,
        /// Plane size required
        expected: usize,
        /// Bytes present
        actual: usize,
    },
    /// Decompression failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One planar channel of a layer.
///
/// The compressed bytes are owned from parse time; the decoded plane is a
/// separate allocation filled in on first request and cached. The two buffers
/// never alias.
#[derive(Debug)]
pub(crate) struct LayerChannel {
    /// Channel id: 0..n for color data, -1 transparency mask, -2 user
    /// supplied layer mask, -3 real user supplied layer mask
    pub(crate) id: i16,
    /// How the channel data is compressed
    pub(crate) compression: ChannelCompression,
    /// The channel payload as stored in the file
    pub(crate) compressed: Vec<u8>,
    /// Decoded plane, present once a consumer has asked for pixels
    pub(crate) decoded: Option<Vec<u8>>,
}

impl LayerChannel {
    /// Decompress this channel's plane if it has not been decoded yet.
    ///
    /// Mask channels (-2 / -3) are always 8-bit regardless of the document
    /// depth. With deflate support compiled out, deflate channels stay
    /// compressed and this still returns success; callers tell the two
    /// apart by the compression code.
    pub(crate) fn decode(
        &mut self,
        width: u32,
        height: u32,
        document_depth: PsdDepth,
        is_large: bool,
    ) -> Result<(), ChannelError> {
        if self.decoded.is_some() {
            return Ok(());
        }

        let depth = self.effective_depth(document_depth);
        let row_len = scanline_len(width, depth);
        let expected = row_len * u64::from(height);

        match self.compression {
            ChannelCompression::RawData => {
                // Real-world raw channels can be over-padded; copy only the
                // expected prefix into a fresh buffer.
                if (self.compressed.len() as u64) < expected {
                    return Err(ChannelError::RawDataTooShort {
                        channel_id: self.id,
                        expected: expected as usize,
                        actual: self.compressed.len(),
                    });
                }
                self.decoded = Some(self.compressed[..expected as usize].to_vec());
            }
            ChannelCompression::RleCompressed => {
                let decoded = packbits_decode_channel(
                    &self.compressed,
                    u64::from(height),
                    row_len,
                    is_large,
                )?;
                self.decoded = Some(decoded);
            }
            ChannelCompression::ZipWithoutPrediction => {
                match deflate_decompress(&self.compressed, expected as usize) {
                    Ok(decoded) => self.decoded = Some(decoded),
                    Err(CodecError::DeflateUnsupported) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            ChannelCompression::ZipWithPrediction => {
                let bytes_per_pixel = depth.bytes_per_sample().max(1) as usize;
                match deflate_decompress_predicted(
                    &self.compressed,
                    expected as usize,
                    row_len as usize,
                    bytes_per_pixel,
                ) {
                    Ok(decoded) => self.decoded = Some(decoded),
                    Err(CodecError::DeflateUnsupported) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }

        Ok(())
    }

    /// Mask channels are stored 8-bit no matter what the document depth is.
    fn effective_depth(&self, document_depth: PsdDepth) -> PsdDepth {
        if self.id == -2 || self.id == -3 {
            PsdDepth::Eight
        } else {
            document_depth
        }
    }
}

/// Bytes in one decoded scanline of a plane at the given depth.
pub(crate) fn scanline_len(width: u32, depth: PsdDepth) -> u64 {
    if depth == PsdDepth::One {
        (u64::from(width) + 7) / 8
    } else {
        u64::from(width) * u64::from(depth.bytes_per_sample())
    }
}

/// A view of one layer channel returned by
/// [`Psd::layer_channel_data`](crate::Psd::layer_channel_data).
#[derive(Debug, Clone, Copy)]
pub struct ChannelData<'a> {
    /// Channel id (0..n color, -1 alpha, -2 user mask, -3 real mask)
    pub id: i16,
    /// The channel's on-disk compression
    pub compression: ChannelCompression,
    /// Whether `data` is the decoded plane (`true`) or, because deflate
    /// support is compiled out, still the compressed payload (`false`)
    pub is_decoded: bool,
    /// The channel bytes; empty for zero-area layers
    pub data: &'a [u8],
}
