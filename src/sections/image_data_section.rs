//! The image data section: the flattened composite Photoshop saved with the
//! document.
//!
//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! | Length   | Description                                              |
//! |----------|----------------------------------------------------------|
//! | 2        | Compression method: 0 raw, 1 RLE, 2 ZIP, 3 ZIP+prediction |
//! | Variable | The image data, planar: all of plane 0, then plane 1, ... |
//!
//! There is no length field: the section runs to the end of the file, and a
//! file that ends before the compression code simply has no composite. The
//! composite is a convenience, never a requirement, so every decode failure
//! here degrades to "no composite" instead of failing the parse.

use log::{debug, warn};
use thiserror::Error;

use crate::compression::{
    deflate_decompress, deflate_decompress_predicted, packbits_decode_rows, CodecError,
};
use crate::psd_channel::{scanline_len, ChannelCompression};
use crate::sections::file_header_section::PsdDepth;
use crate::sections::{CursorError, PsdCursor};

#[derive(Debug)]
pub(crate) struct ImageDataSection {
    /// How the composite was stored on disk
    pub(crate) compression: ChannelCompression,
    /// Decoded planar pixel data: `channels` planes of `width * height`
    /// samples each
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Error)]
enum CompositeRleError {
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ImageDataSection {
    /// Read and decode the composite at the cursor's current position.
    ///
    /// Returns `None` when the file carries no composite or when its data
    /// cannot be decoded; the document stays valid either way.
    pub fn from_cursor(
        cursor: &mut PsdCursor<'_>,
        is_large: bool,
        width: u32,
        height: u32,
        channels: u16,
        depth: PsdDepth,
    ) -> Option<ImageDataSection> {
        // A file truncated right here has no composite.
        let compression_code = cursor.read_u16().ok()?;
        let compression = match ChannelCompression::new(compression_code) {
            Ok(compression) => compression,
            Err(err) => {
                warn!("composite: {err}");
                return None;
            }
        };

        let row_len = scanline_len(width, depth);
        let plane_len = row_len * u64::from(height);
        let expected = plane_len * u64::from(channels);
        let expected_usize = usize::try_from(expected).ok()?;
        if expected == 0 {
            return None;
        }

        let data = match compression {
            ChannelCompression::RawData => match cursor.read(expected) {
                Ok(bytes) => bytes.to_vec(),
                Err(err) => {
                    debug!("composite raw data is truncated: {err}");
                    return None;
                }
            },
            ChannelCompression::RleCompressed => {
                let scanlines = u64::from(height) * u64::from(channels);
                let counts_pos = cursor.position();

                // Standard documents usually store 2-byte scanline counts and
                // large ones 4-byte counts, but writers disagree; try the
                // format default first and the other width second.
                let widths: [u64; 2] = if is_large { [4, 2] } else { [2, 4] };
                let mut decoded = None;
                for count_width in widths {
                    match Self::try_decode_rle(cursor, counts_pos, scanlines, row_len, count_width)
                    {
                        Ok(bytes) => {
                            decoded = Some(bytes);
                            break;
                        }
                        Err(err) => {
                            debug!("composite RLE with {count_width}-byte counts failed: {err}");
                        }
                    }
                }

                match decoded {
                    Some(bytes) => bytes,
                    None => {
                        warn!("composite RLE data is corrupt, treating the composite as absent");
                        return None;
                    }
                }
            }
            ChannelCompression::ZipWithoutPrediction | ChannelCompression::ZipWithPrediction => {
                let compressed = match cursor.read(cursor.remaining()) {
                    Ok(bytes) => bytes,
                    Err(_) => return None,
                };

                let result = if compression == ChannelCompression::ZipWithoutPrediction {
                    deflate_decompress(compressed, expected_usize)
                } else {
                    let bytes_per_pixel = depth.bytes_per_sample().max(1) as usize;
                    deflate_decompress_predicted(
                        compressed,
                        expected_usize,
                        row_len as usize,
                        bytes_per_pixel,
                    )
                };

                match result {
                    Ok(bytes) => bytes,
                    Err(CodecError::DeflateUnsupported) => {
                        warn!("composite is deflate-compressed but deflate support is not compiled in");
                        return None;
                    }
                    Err(err) => {
                        warn!("composite deflate data is corrupt ({err}), treating the composite as absent");
                        return None;
                    }
                }
            }
        };

        Some(ImageDataSection { compression, data })
    }

    /// Attempt an RLE decode with one count-field width. The scanline count
    /// table has `height * channels` entries; summing it gives the size of
    /// the PackBits stream that follows.
    fn try_decode_rle(
        cursor: &mut PsdCursor<'_>,
        counts_pos: u64,
        scanlines: u64,
        row_len: u64,
        count_width: u64,
    ) -> Result<Vec<u8>, CompositeRleError> {
        cursor.seek(counts_pos)?;

        let mut compressed_len: u64 = 0;
        for _ in 0..scanlines {
            compressed_len += match count_width {
                2 => u64::from(cursor.read_u16()?),
                _ => u64::from(cursor.read_u32()?),
            };
        }

        let compressed = cursor.read(compressed_len)?;
        Ok(packbits_decode_rows(compressed, scanlines, row_len)?)
    }
}
