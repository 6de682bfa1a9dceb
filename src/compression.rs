//! Channel codecs: PackBits RLE, deflate, and the PNG prediction filter.
//!
//! PSD compresses channel planes one of four ways (raw, RLE, deflate,
//! deflate + prediction). The decoders here are strict about sizes: a row or
//! plane that does not decode to exactly the expected byte count is treated
//! as corrupt rather than padded or truncated.

use thiserror::Error;

#[cfg(feature = "deflate")]
use std::io::Read;

/// An error while decoding compressed channel data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A PackBits row did not consume its input and fill its output exactly.
    #[error(
        "corrupt PackBits row: consumed {consumed} of {src_len} compressed bytes, \
         produced {produced} of {expected} output bytes"
    )]
    PackBitsRow {
        /// Compressed bytes consumed
        consumed: usize,
        /// Compressed bytes available
        src_len: usize,
        /// Output bytes produced
        produced: usize,
        /// Output bytes required
        expected: usize,
    },
    /// Neither a 2-byte nor a 4-byte scanline count table fits the payload.
    #[error("RLE scanline count table does not match the compressed payload")]
    RleCountsTable,
    /// The deflate stream failed to decode as zlib-wrapped or raw DEFLATE.
    #[error("deflate stream is corrupt (not zlib-wrapped or raw DEFLATE)")]
    DeflateCorrupt,
    /// The deflate stream decoded, but not to the expected plane size.
    #[error("deflate output is {actual} bytes, expected exactly {expected}")]
    DeflateSizeMismatch {
        /// Expected plane size
        expected: usize,
        /// Decoded size
        actual: usize,
    },
    /// Deflate support is not compiled in.
    #[error("deflate-compressed data requires the `deflate` feature")]
    DeflateUnsupported,
    /// A prediction scanline starts with an unknown PNG filter code.
    #[error("unknown PNG prediction filter code {0}")]
    UnknownPredictionFilter(u8),
}

/// Decode one PackBits-compressed row.
///
/// Control byte `n`: 0..=127 copies the next `n + 1` bytes literally,
/// -127..=-1 repeats the next byte `1 - n` times, -128 is a no-op. The row
/// must consume exactly `src` and fill exactly `dst`, anything else is
/// corrupt data.
pub(crate) fn packbits_decode_row(src: &[u8], dst: &mut [u8]) -> Result<(), CodecError> {
    let mut si = 0;
    let mut di = 0;

    while si < src.len() && di < dst.len() {
        let n = src[si] as i8;
        si += 1;

        if n >= 0 {
            let count = n as usize + 1;
            if si + count > src.len() || di + count > dst.len() {
                return Err(mismatch(si, src.len(), di, dst.len()));
            }
            dst[di..di + count].copy_from_slice(&src[si..si + count]);
            si += count;
            di += count;
        } else if n != -128 {
            let count = (1 - isize::from(n)) as usize;
            if si >= src.len() || di + count > dst.len() {
                return Err(mismatch(si, src.len(), di, dst.len()));
            }
            let value = src[si];
            si += 1;
            dst[di..di + count].fill(value);
            di += count;
        }
        // n == -128 is a no-op per the PackBits spec
    }

    if si != src.len() || di != dst.len() {
        return Err(mismatch(si, src.len(), di, dst.len()));
    }
    Ok(())
}

fn mismatch(consumed: usize, src_len: usize, produced: usize, expected: usize) -> CodecError {
    CodecError::PackBitsRow {
        consumed,
        src_len,
        produced,
        expected,
    }
}

/// Sum a scanline byte-count table of the given field width.
///
/// Returns `(table_size, total_rle_bytes)` when the table and the payload it
/// describes both fit inside `compressed`.
fn sum_row_counts(compressed: &[u8], rows: u64, count_width: u64) -> Option<(u64, u64)> {
    let table_size = rows.checked_mul(count_width)?;
    if table_size > compressed.len() as u64 {
        return None;
    }

    let mut total: u64 = 0;
    for row in 0..rows {
        let at = (row * count_width) as usize;
        let value = match count_width {
            2 => u64::from(u16::from_be_bytes([compressed[at], compressed[at + 1]])),
            _ => u64::from(u32::from_be_bytes([
                compressed[at],
                compressed[at + 1],
                compressed[at + 2],
                compressed[at + 3],
            ])),
        };
        total += value;
        if total > compressed.len() as u64 - table_size {
            return None;
        }
    }

    Some((table_size, total))
}

/// Decode a whole RLE-compressed channel: a per-row byte-count table followed
/// by the PackBits bitstream.
///
/// The count field is 2 bytes wide in standard documents and 4 bytes in large
/// ones, but real-world writers disagree, so both widths are probed and the
/// one that exactly consumes the payload wins. Ties fall back to the
/// format-default width.
pub(crate) fn packbits_decode_channel(
    compressed: &[u8],
    rows: u64,
    row_len: u64,
    is_large: bool,
) -> Result<Vec<u8>, CodecError> {
    let probe2 = sum_row_counts(compressed, rows, 2);
    let probe4 = sum_row_counts(compressed, rows, 4);

    let exact = |probe: Option<(u64, u64)>| {
        probe.is_some_and(|(table, total)| table + total == compressed.len() as u64)
    };

    let count_width = match (exact(probe2), exact(probe4)) {
        (true, false) => 2,
        (false, true) => 4,
        _ => {
            // Neither (or both) consume exactly; prefer the format default.
            let default_width = if is_large { 4 } else { 2 };
            let default_probe = if is_large { probe4 } else { probe2 };
            if default_probe.is_some() {
                default_width
            } else if (if is_large { probe2 } else { probe4 }).is_some() {
                if is_large {
                    2
                } else {
                    4
                }
            } else {
                return Err(CodecError::RleCountsTable);
            }
        }
    };

    if count_width != if is_large { 4 } else { 2 } {
        log::debug!(
            "RLE count table uses {}-byte fields in a {} document",
            count_width,
            if is_large { "large" } else { "standard" }
        );
    }

    let (table_size, _total) =
        sum_row_counts(compressed, rows, count_width).ok_or(CodecError::RleCountsTable)?;

    let mut decoded = vec![0u8; (rows * row_len) as usize];
    let rle = &compressed[table_size as usize..];
    let mut rle_offset = 0usize;

    for row in 0..rows {
        let at = (row * count_width) as usize;
        let count = match count_width {
            2 => usize::from(u16::from_be_bytes([compressed[at], compressed[at + 1]])),
            _ => u32::from_be_bytes([
                compressed[at],
                compressed[at + 1],
                compressed[at + 2],
                compressed[at + 3],
            ]) as usize,
        };
        if rle_offset + count > rle.len() {
            return Err(CodecError::RleCountsTable);
        }

        let dst_start = (row * row_len) as usize;
        packbits_decode_row(
            &rle[rle_offset..rle_offset + count],
            &mut decoded[dst_start..dst_start + row_len as usize],
        )?;
        rle_offset += count;
    }

    Ok(decoded)
}

/// Decode `rows` PackBits rows laid end to end with no byte-count table.
///
/// The composite image stores its scanline counts up front in one table for
/// all channels, after which the rows are self-delimiting: each row is
/// decoded until it has produced exactly `row_len` bytes. The input must be
/// consumed completely by the final row.
pub(crate) fn packbits_decode_rows(
    src: &[u8],
    rows: u64,
    row_len: u64,
) -> Result<Vec<u8>, CodecError> {
    let mut out = vec![0u8; (rows * row_len) as usize];
    let mut si = 0usize;

    for row in 0..rows {
        let dst_start = (row * row_len) as usize;
        let dst = &mut out[dst_start..dst_start + row_len as usize];
        let mut di = 0;

        while di < dst.len() {
            if si >= src.len() {
                return Err(mismatch(si, src.len(), di, dst.len()));
            }
            let n = src[si] as i8;
            si += 1;

            if n >= 0 {
                let count = n as usize + 1;
                if si + count > src.len() || di + count > dst.len() {
                    return Err(mismatch(si, src.len(), di, dst.len()));
                }
                dst[di..di + count].copy_from_slice(&src[si..si + count]);
                si += count;
                di += count;
            } else if n != -128 {
                let count = (1 - isize::from(n)) as usize;
                if si >= src.len() || di + count > dst.len() {
                    return Err(mismatch(si, src.len(), di, dst.len()));
                }
                let value = src[si];
                si += 1;
                dst[di..di + count].fill(value);
                di += count;
            }
        }
    }

    if si != src.len() {
        return Err(mismatch(si, src.len(), out.len(), out.len()));
    }
    Ok(out)
}

/// Inflate a deflate stream to exactly `expected_len` bytes.
///
/// PSD writers emit both zlib-wrapped and raw DEFLATE streams; zlib is tried
/// first, raw second.
#[cfg(feature = "deflate")]
pub(crate) fn deflate_decompress(
    compressed: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(expected_len);
    if flate2::read::ZlibDecoder::new(compressed)
        .read_to_end(&mut out)
        .is_err()
    {
        out.clear();
        if flate2::read::DeflateDecoder::new(compressed)
            .read_to_end(&mut out)
            .is_err()
        {
            return Err(CodecError::DeflateCorrupt);
        }
    }

    if out.len() != expected_len {
        return Err(CodecError::DeflateSizeMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(not(feature = "deflate"))]
pub(crate) fn deflate_decompress(
    _compressed: &[u8],
    _expected_len: usize,
) -> Result<Vec<u8>, CodecError> {
    Err(CodecError::DeflateUnsupported)
}

/// Paeth predictor from the PNG specification.
fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let p = i32::from(a) + i32::from(b) - i32::from(c);
    let pa = (p - i32::from(a)).abs();
    let pb = (p - i32::from(b)).abs();
    let pc = (p - i32::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Reverse the PNG prediction filter on one filter-prefixed scanline.
///
/// `scanline[0]` is the filter code, the rest is filtered data. PSD applies
/// the filter to each scanline independently, so the scanline above is taken
/// as all zeroes. On return the unfiltered data occupies
/// `scanline[..scanline.len() - 1]`.
pub(crate) fn unpredict_scanline(
    scanline: &mut [u8],
    bytes_per_pixel: usize,
) -> Result<(), CodecError> {
    let filter = scanline[0];
    let data_len = scanline.len() - 1;

    match filter {
        0 | 2 => {
            // None, and Up against an all-zero row above: data is unchanged
        }
        1 => {
            // Sub: delta from the pixel to the left
            for i in bytes_per_pixel..data_len {
                scanline[1 + i] = scanline[1 + i].wrapping_add(scanline[1 + i - bytes_per_pixel]);
            }
        }
        3 => {
            // Average of left and the (zero) row above
            for i in bytes_per_pixel..data_len {
                let left = scanline[1 + i - bytes_per_pixel];
                scanline[1 + i] = scanline[1 + i].wrapping_add(left / 2);
            }
        }
        4 => {
            // Paeth with above and diagonal both zero
            for i in bytes_per_pixel..data_len {
                let left = scanline[1 + i - bytes_per_pixel];
                let pred = paeth_predictor(left, 0, 0);
                scanline[1 + i] = scanline[1 + i].wrapping_add(pred);
            }
        }
        other => return Err(CodecError::UnknownPredictionFilter(other)),
    }

    scanline.copy_within(1.., 0);
    Ok(())
}

/// Inflate a deflate-with-prediction stream and reverse the per-scanline
/// filter.
///
/// The filtered stream carries one extra byte per scanline (the PNG filter
/// code), so it inflates to `expected_len + rows` bytes; the unfiltered
/// output is exactly `expected_len`.
pub(crate) fn deflate_decompress_predicted(
    compressed: &[u8],
    expected_len: usize,
    scanline_width: usize,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>, CodecError> {
    if scanline_width == 0 || expected_len % scanline_width != 0 {
        return Err(CodecError::DeflateCorrupt);
    }
    let rows = expected_len / scanline_width;

    let decoded = deflate_decompress(compressed, expected_len + rows)?;

    let mut out = vec![0u8; expected_len];
    for row in 0..rows {
        let src_start = row * (scanline_width + 1);
        let mut scanline = decoded[src_start..src_start + scanline_width + 1].to_vec();
        unpredict_scanline(&mut scanline, bytes_per_pixel)?;
        out[row * scanline_width..(row + 1) * scanline_width]
            .copy_from_slice(&scanline[..scanline_width]);
    }

    Ok(out)
}
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packbits_literal_run() {
        let src = [3u8, 10, 20, 30, 40];
        let mut dst = [0u8; 4];
        packbits_decode_row(&src, &mut dst).unwrap();
        assert_eq!(dst, [10, 20, 30, 40]);
    }

    #[test]
    fn packbits_repeat_run() {
        // -3 as u8 = 253: repeat next byte 4 times
        let src = [253u8, 7];
        let mut dst = [0u8; 4];
        packbits_decode_row(&src, &mut dst).unwrap();
        assert_eq!(dst, [7, 7, 7, 7]);
    }

    #[test]
    fn packbits_noop_byte_is_skipped() {
        let src = [128u8, 1, 0x2A, 128];
        let mut dst = [0u8; 2];
        packbits_decode_row(&src, &mut dst).unwrap();
        assert_eq!(dst, [0x2A, 0x2A]);
    }

    #[test]
    fn packbits_row_must_consume_exactly() {
        // Produces 2 bytes but leaves 1 compressed byte unread
        let src = [1u8, 1, 2, 0];
        let mut dst = [0u8; 2];
        assert!(matches!(
            packbits_decode_row(&src, &mut dst),
            Err(CodecError::PackBitsRow { .. })
        ));
    }

    #[test]
    fn packbits_row_must_fill_exactly() {
        let src = [0u8, 9];
        let mut dst = [0u8; 3];
        assert!(matches!(
            packbits_decode_row(&src, &mut dst),
            Err(CodecError::PackBitsRow { .. })
        ));
    }

    #[test]
    fn channel_decode_picks_the_exactly_consuming_count_width() {
        // Two rows of four pixels, 2-byte counts. Each row: literal header + 4 bytes.
        let mut compressed = vec![0, 5, 0, 5];
        compressed.extend_from_slice(&[3, 1, 2, 3, 4]);
        compressed.extend_from_slice(&[3, 5, 6, 7, 8]);

        // A standard-format document...
        let decoded = packbits_decode_channel(&compressed, 2, 4, false).unwrap();
        assert_eq!(decoded, [1, 2, 3, 4, 5, 6, 7, 8]);

        // ...and a large-format document whose writer used 2-byte counts anyway.
        let decoded = packbits_decode_channel(&compressed, 2, 4, true).unwrap();
        assert_eq!(decoded, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn channel_decode_accepts_four_byte_counts() {
        let mut compressed = vec![0, 0, 0, 5];
        compressed.extend_from_slice(&[3, 9, 8, 7, 6]);

        let decoded = packbits_decode_channel(&compressed, 1, 4, true).unwrap();
        assert_eq!(decoded, [9, 8, 7, 6]);

        // 2-byte interpretation of the same bytes cannot consume exactly,
        // so the probe lands on 4 even for a standard document.
        let decoded = packbits_decode_channel(&compressed, 1, 4, false).unwrap();
        assert_eq!(decoded, [9, 8, 7, 6]);
    }

    #[test]
    fn unpredict_sub_filter() {
        let mut scanline = [1u8, 10, 5, 5, 5];
        unpredict_scanline(&mut scanline, 1).unwrap();
        assert_eq!(&scanline[..4], &[10, 15, 20, 25]);
    }

    #[test]
    fn unpredict_up_filter_with_zero_row_above_is_identity() {
        let mut scanline = [2u8, 10, 20, 30];
        unpredict_scanline(&mut scanline, 1).unwrap();
        assert_eq!(&scanline[..3], &[10, 20, 30]);
    }

    #[test]
    fn unpredict_paeth_filter() {
        // With above and diagonal zero, Paeth degenerates to Sub
        let mut scanline = [4u8, 3, 3, 3];
        unpredict_scanline(&mut scanline, 1).unwrap();
        assert_eq!(&scanline[..3], &[3, 6, 9]);
    }

    #[test]
    fn unpredict_rejects_unknown_filter() {
        let mut scanline = [9u8, 1, 2];
        assert_eq!(
            unpredict_scanline(&mut scanline, 1),
            Err(CodecError::UnknownPredictionFilter(9))
        );
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn deflate_accepts_zlib_and_raw_streams() {
        use std::io::Write;

        let plain = [1u8, 2, 3, 4, 5, 6, 7, 8];

        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
        zlib.write_all(&plain).unwrap();
        let zlib = zlib.finish().unwrap();
        assert_eq!(deflate_decompress(&zlib, plain.len()).unwrap(), plain);

        let mut raw = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::fast());
        raw.write_all(&plain).unwrap();
        let raw = raw.finish().unwrap();
        assert_eq!(deflate_decompress(&raw, plain.len()).unwrap(), plain);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn deflate_wrong_size_is_corrupt() {
        use std::io::Write;

        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
        enc.write_all(&[0u8; 16]).unwrap();
        let compressed = enc.finish().unwrap();

        assert_eq!(
            deflate_decompress(&compressed, 15),
            Err(CodecError::DeflateSizeMismatch {
                expected: 15,
                actual: 16
            })
        );
    }
}
