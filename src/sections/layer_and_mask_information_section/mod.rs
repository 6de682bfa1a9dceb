//! The layer and mask information section.
//!
//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! | Length   | Description                                                          |
//! |----------|----------------------------------------------------------------------|
//! | 4        | Length of the layer and mask information section (PSB: 8 bytes)      |
//! | Variable | Layer info: its own length (PSB: 8 bytes), layer count, layer records, channel image data |
//! | Variable | Global layer mask info                                               |
//! | Variable | Series of tagged blocks                                              |
//!
//! This is the hardest section to parse, because the width of its length
//! fields in large-format files varies across writers: the outer section
//! length, the layer-info length, and every per-channel length were written
//! as 8 bytes by some programs and 4 by others. Each of those reads probes
//! the wide interpretation and falls back to 32 bits when the result is not
//! plausible, so a document produced by either kind of writer parses.

use log::{debug, warn};
use thiserror::Error;

use crate::psd_channel::{ChannelCompression, ChannelError, LayerChannel};
use crate::sections::{CursorError, PsdCursor, SIGNATURE_EIGHT_B64, SIGNATURE_EIGHT_BIM};
use crate::unicode::{macroman_to_utf8, utf16be_to_utf8};

pub mod layer;

use layer::{LayerFeatures, PsdLayer, Rect};

/// Bounds coordinates beyond this magnitude flag a record as implausible.
const MAX_PLAUSIBLE_COORD: i32 = 1_000_000;
/// Extra-data lengths above this mark the layer as empty/unsupported.
const MAX_EXTRA_DATA_LEN: u32 = 1_000_000;
/// A layer may carry at most this many channels.
const MAX_LAYER_CHANNELS: u16 = 56;

/// Adjustment-layer keys that do not share the 'adj' prefix.
const ADJUSTMENT_KEYS: [[u8; 4]; 16] = [
    *b"brit", *b"brtC", *b"levl", *b"curv", *b"hue ", *b"hue2", *b"blnc", *b"vibA", //
    *b"expA", *b"mixr", *b"selc", *b"thrs", *b"post", *b"phfl", *b"grdm", *b"clrL",
];

/// An error while parsing the layer and mask information section.
#[derive(Debug, Error)]
pub enum LayerError {
    /// The byte stream ended or misbehaved.
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// The layer info subsection claims to extend past its parent section.
    #[error("the layer info subsection overruns the layer and mask section")]
    SubsectionOverrun,
    /// Layer records read past the end of the layer info subsection.
    #[error("layer records overran the layer info subsection")]
    RecordOverrun,
    /// A channel length too small to include its compression field.
    #[error("channel length {length} cannot include the 2-byte compression field")]
    ChannelLengthTooShort {
        /// The stored length
        length: u64,
    },
    /// An invalid channel compression code in the channel image data.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug)]
pub(crate) struct LayerAndMaskInformationSection {
    /// Layers in disk order; the bottom-most layer is last.
    pub(crate) layers: Vec<PsdLayer>,
    /// Set when the layer count was negative: the first alpha channel of the
    /// composite holds the transparency of the merged result.
    pub(crate) has_transparency_plane: bool,
}

impl LayerAndMaskInformationSection {
    fn empty() -> Self {
        LayerAndMaskInformationSection {
            layers: vec![],
            has_transparency_plane: false,
        }
    }

    /// Parse the section at the cursor's current position, leaving the
    /// cursor at the section end.
    pub fn from_cursor(
        cursor: &mut PsdCursor<'_>,
        is_large: bool,
    ) -> Result<Self, LayerError> {
        let section_len_pos = cursor.position();
        let mut section_length = cursor.read_length(is_large)?;

        if section_length == 0 {
            return Ok(Self::empty());
        }

        let mut section_start = cursor.position();
        let mut section_end = section_start + section_length;

        // Probe the 8-byte outer length by seeking to the end it implies; if
        // that is not a reachable offset the writer used 4 bytes.
        if is_large {
            if cursor.seek(section_end).is_ok() {
                cursor.seek(section_start)?;
            } else {
                debug!("8-byte section length {section_length} is not seekable, re-reading as 4 bytes");
                cursor.seek(section_len_pos)?;
                section_length = u64::from(cursor.read_u32()?);
                section_start = cursor.position();
                section_end = section_start + section_length;
            }
        }

        // Layer info subsection length, with the same dual-width fallback.
        let layer_info_len_pos = cursor.position();
        let mut layer_info_len = cursor.read_length(is_large)?;
        let mut layer_info_end = cursor.position() + layer_info_len;

        if layer_info_end > section_end && is_large {
            debug!("8-byte layer info length {layer_info_len} overruns the section, re-reading as 4 bytes");
            cursor.seek(layer_info_len_pos)?;
            layer_info_len = u64::from(cursor.read_u32()?);
            layer_info_end = cursor.position() + layer_info_len;
        }
        if layer_info_end > section_end {
            return Err(LayerError::SubsectionOverrun);
        }

        let mut section = Self::empty();

        if layer_info_len > 0 {
            section = Self::read_layer_info(cursor, is_large, layer_info_end, section_end)?;
        }
        if cursor.position() != layer_info_end {
            cursor.seek(layer_info_end)?;
        }

        // Global layer mask info: a length we skip over.
        if cursor.position() + 4 <= section_end {
            let global_mask_len = cursor.read_u32()?;
            if global_mask_len > 0 {
                cursor.skip(u64::from(global_mask_len))?;
            }
        }

        // Whatever follows (document-level tagged blocks) is skipped so the
        // image data section that comes next stays aligned.
        if cursor.position() < section_end {
            cursor.seek(section_end)?;
        } else if cursor.position() > section_end {
            return Err(LayerError::RecordOverrun);
        }

        Ok(section)
    }

    fn read_layer_info(
        cursor: &mut PsdCursor<'_>,
        is_large: bool,
        layer_info_end: u64,
        section_end: u64,
    ) -> Result<Self, LayerError> {
        // A negative layer count means the composite's first alpha channel is
        // a transparency plane for the merged result.
        let raw_layer_count = cursor.read_i16()?;
        let has_transparency_plane = raw_layer_count < 0;
        let layer_count = raw_layer_count.unsigned_abs();

        let mut layers: Vec<PsdLayer> = Vec::with_capacity(usize::from(layer_count));
        let mut channel_infos: Vec<Vec<(i16, u64)>> = Vec::with_capacity(usize::from(layer_count));
        let mut truncated = false;

        for _ in 0..layer_count {
            let mut bounds = Rect {
                top: cursor.read_i32()?,
                left: cursor.read_i32()?,
                bottom: cursor.read_i32()?,
                right: cursor.read_i32()?,
            };

            // Wildly out-of-range or inverted bounds suggest the record is
            // misaligned; the flag softens later validation instead of
            // failing outright.
            let bounds_implausible = bounds.top.abs() > MAX_PLAUSIBLE_COORD
                || bounds.left.abs() > MAX_PLAUSIBLE_COORD
                || bounds.bottom.abs() > MAX_PLAUSIBLE_COORD
                || bounds.right.abs() > MAX_PLAUSIBLE_COORD
                || bounds.bottom < bounds.top
                || bounds.right < bounds.left;

            let mut channel_count = cursor.read_u16()?;
            if channel_count > MAX_LAYER_CHANNELS {
                warn!("layer claims {channel_count} channels, treating it as empty");
                channel_count = 0;
            }

            let mut channel_info = Vec::with_capacity(usize::from(channel_count));
            for _ in 0..channel_count {
                let id = cursor.read_i16()?;

                let length_pos = cursor.position();
                let mut length = cursor.read_length(is_large)?;
                if is_large {
                    // Some large-format writers still store 4-byte channel
                    // lengths. A claimed length bigger than the bytes left in
                    // the subsection gives the narrow reading away.
                    let remaining_in_info = layer_info_end.saturating_sub(cursor.position());
                    if remaining_in_info > 0 && length > remaining_in_info {
                        debug!("8-byte channel length {length} is implausible, re-reading as 4 bytes");
                        cursor.seek(length_pos)?;
                        length = u64::from(cursor.read_u32()?);
                    }
                }
                channel_info.push((id, length));
            }

            let mut blend_mode_signature = cursor.read_4()?;
            let mut blend_mode_key = cursor.read_4()?;
            if blend_mode_signature != SIGNATURE_EIGHT_BIM
                && blend_mode_signature != SIGNATURE_EIGHT_B64
                && bounds_implausible
            {
                // Misalignment confirmed from two sides; fall back to
                // defaults rather than failing the document.
                debug!("implausible blend mode signature on a layer with implausible bounds, using 8BIM/norm");
                blend_mode_signature = SIGNATURE_EIGHT_BIM;
                blend_mode_key = *b"norm";
            }

            let opacity = cursor.read_u8()?;
            let clipping = cursor.read_u8()?;
            let flags = cursor.read_u8()?;
            cursor.read_u8()?; // filler

            let extra_length = cursor.read_u32()?;

            let mut name = String::new();
            let mut extra_data = vec![];
            let mut features = LayerFeatures::default();

            if extra_length > MAX_EXTRA_DATA_LEN {
                // Normal extra data is well under a megabyte; a huge value
                // means this record is something we cannot interpret. Treat
                // the layer as empty, but skip exactly the claimed bytes so
                // the next record stays aligned.
                warn!("layer extra data claims {extra_length} bytes, treating the layer as empty");
                channel_info.clear();
                bounds = Rect::default();

                if cursor.position() + u64::from(extra_length) > section_end {
                    // The claimed skip lands past the section: we have read
                    // into channel image data. Stop the layer loop entirely.
                    cursor.seek(section_end)?;
                    truncated = true;
                } else {
                    cursor.skip(u64::from(extra_length))?;
                }
            } else if extra_length > 0 {
                extra_data = cursor.read(u64::from(extra_length))?.to_vec();
                let scanned = parse_extra_data(&extra_data);
                name = scanned.0.unwrap_or_default();
                features = scanned.1;
            }

            layers.push(PsdLayer {
                bounds,
                channels: vec![],
                blend_mode_signature,
                blend_mode_key,
                opacity,
                clipping,
                flags,
                name,
                extra_data,
                features,
            });
            channel_infos.push(channel_info);

            if truncated {
                break;
            }
            if cursor.position() > layer_info_end {
                return Err(LayerError::RecordOverrun);
            }
        }

        if truncated {
            warn!("layer records were truncated; channel image data is unavailable");
        } else {
            Self::read_channel_image_data(cursor, layer_info_end, &mut layers, &channel_infos)?;
        }

        Ok(LayerAndMaskInformationSection {
            layers,
            has_transparency_plane,
        })
    }

    /// Read the concatenated channel image data that follows the layer
    /// records.
    ///
    /// Each channel's payload is preceded by a 2-byte compression code. Two
    /// writer conventions exist for the per-channel lengths stored in the
    /// records: they either include the compression field or they do not.
    /// Summing the lengths both ways against the bytes actually remaining in
    /// the subsection tells the conventions apart.
    fn read_channel_image_data(
        cursor: &mut PsdCursor<'_>,
        layer_info_end: u64,
        layers: &mut [PsdLayer],
        channel_infos: &[Vec<(i16, u64)>],
    ) -> Result<(), LayerError> {
        let remaining = layer_info_end
            .checked_sub(cursor.position())
            .ok_or(LayerError::RecordOverrun)?;

        let mut length_sum: u64 = 0;
        let mut total_channels: u64 = 0;
        for info in channel_infos {
            total_channels += info.len() as u64;
            for &(_, length) in info {
                length_sum += length;
            }
        }

        let lengths_exclude_compression = length_sum + 2 * total_channels == remaining;
        if lengths_exclude_compression && total_channels > 0 {
            debug!("per-channel lengths exclude the 2-byte compression field");
        }

        for (layer, info) in layers.iter_mut().zip(channel_infos) {
            for &(id, length) in info {
                let compression = ChannelCompression::new(cursor.read_u16()?)?;

                let data_len = if lengths_exclude_compression {
                    length
                } else {
                    length
                        .checked_sub(2)
                        .ok_or(LayerError::ChannelLengthTooShort { length })?
                };

                let compressed = cursor.read(data_len)?.to_vec();
                layer.channels.push(LayerChannel {
                    id,
                    compression,
                    compressed,
                    decoded: None,
                });
            }
        }

        Ok(())
    }
}

/// Scan a layer's extra data for its name and tagged-block features.
///
/// The extra data holds, in order: mask data, blending ranges, the Pascal
/// layer name (padded to a multiple of 4), and tagged blocks. A malformed
/// record stops the scan and keeps whatever was found up to that point;
/// extra data is descriptive, not structural.
fn parse_extra_data(extra: &[u8]) -> (Option<String>, LayerFeatures) {
    let mut name = None;
    let mut features = LayerFeatures::default();
    // Errors only cut the scan short
    let _ = scan_extra_data(extra, &mut name, &mut features);
    (name, features)
}

fn scan_extra_data(
    extra: &[u8],
    name: &mut Option<String>,
    features: &mut LayerFeatures,
) -> Result<(), CursorError> {
    let mut cursor = PsdCursor::new(extra);

    // Layer mask data: 4-byte length + data
    if cursor.remaining() >= 4 {
        let mask_len = u64::from(cursor.read_u32()?);
        if mask_len > 0 {
            if mask_len > cursor.remaining() {
                return Ok(());
            }
            cursor.skip(mask_len)?;
        }
    }

    // Layer blending ranges: 4-byte length + data
    if cursor.remaining() >= 4 {
        let ranges_len = u64::from(cursor.read_u32()?);
        if ranges_len > 0 {
            if ranges_len > cursor.remaining() {
                return Ok(());
            }
            cursor.skip(ranges_len)?;
        }
    }

    // Layer name: Pascal string padded to a multiple of 4 bytes, counting
    // the length byte. Legacy MacRoman; 'luni' below overrides it.
    if cursor.remaining() >= 1 {
        let name_len = cursor.read_u8()?;
        let mut name_total = 1 + u64::from(name_len);
        if name_total % 4 != 0 {
            name_total += 4 - name_total % 4;
        }
        if name_total - 1 > cursor.remaining() {
            return Ok(());
        }
        let raw = cursor.read(u64::from(name_len))?;
        if !raw.is_empty() {
            *name = Some(macroman_to_utf8(raw));
        }
        cursor.skip(name_total - 1 - u64::from(name_len))?;
    }

    // Tagged blocks: signature + key + length + payload (padded to even)
    while cursor.remaining() >= 12 {
        let signature = cursor.read_4()?;
        if signature != SIGNATURE_EIGHT_BIM && signature != SIGNATURE_EIGHT_B64 {
            break;
        }
        let key = cursor.read_4()?;
        let block_len = u64::from(cursor.read_u32()?);
        if block_len > cursor.remaining() {
            break;
        }
        let payload = cursor.read(block_len)?;

        apply_tagged_block(key, payload, name, features);

        if block_len % 2 != 0 && cursor.skip(1).is_err() {
            break;
        }
    }

    Ok(())
}

fn apply_tagged_block(
    key: [u8; 4],
    payload: &[u8],
    name: &mut Option<String>,
    features: &mut LayerFeatures,
) {
    match &key {
        b"TySh" | b"tySh" => features.has_text = true,
        b"SoLd" | b"SoLE" => features.has_smart_object = true,
        b"lfx2" => features.has_effects = true,
        b"vmsk" | b"vmns" => features.has_vector_mask = true,
        b"vtrk" => features.has_video = true,
        b"SoCo" | b"GdFl" | b"PtFl" => features.has_fill = true,
        b"lsct" => {
            // Layer section divider: the first u32 of the payload selects
            // the group role
            if payload.len() >= 4 {
                let section_type =
                    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                match section_type {
                    1 | 2 => features.is_group_start = true,
                    3 => features.is_group_end = true,
                    _ => {}
                }
            }
        }
        b"luni" => {
            // Unicode layer name: u32 character count + UTF-16BE units.
            // Overrides the legacy MacRoman name.
            if payload.len() >= 4 {
                let char_count =
                    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
                let utf16_len = char_count * 2;
                if 4 + utf16_len <= payload.len() {
                    *name = Some(utf16be_to_utf8(&payload[4..4 + utf16_len]));
                }
            }
        }
        _ => {
            if key.starts_with(b"adj") || ADJUSTMENT_KEYS.contains(&key) {
                features.has_adjustment = true;
            } else if key.starts_with(b"3dL") {
                features.has_3d = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_tagged_block(out: &mut Vec<u8>, key: &[u8; 4], payload: &[u8]) {
        out.extend_from_slice(b"8BIM");
        out.extend_from_slice(key);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 != 0 {
            out.push(0);
        }
    }

    /// Extra data with empty mask/ranges, a legacy name, and the given
    /// tagged blocks.
    fn extra_data(name: &[u8], blocks: &[u8]) -> Vec<u8> {
        let mut out = vec![];
        out.extend_from_slice(&0u32.to_be_bytes()); // mask data
        out.extend_from_slice(&0u32.to_be_bytes()); // blending ranges
        out.push(name.len() as u8);
        out.extend_from_slice(name);
        while (out.len() - 8) % 4 != 0 {
            out.push(0);
        }
        out.extend_from_slice(blocks);
        out
    }

    #[test]
    fn legacy_name_decodes_from_macroman() {
        let extra = extra_data(&[b'c', b'a', b'f', 0x8E], &[]);
        let (name, _) = parse_extra_data(&extra);
        assert_eq!(name.as_deref(), Some("caf\u{E9}"));
    }

    #[test]
    fn luni_overrides_the_legacy_name() {
        let mut blocks = vec![];
        let mut luni = vec![];
        luni.extend_from_slice(&2u32.to_be_bytes());
        luni.extend_from_slice(&[0x00, b'H', 0x00, b'i']);
        push_tagged_block(&mut blocks, b"luni", &luni);

        let extra = extra_data(b"old", &blocks);
        let (name, _) = parse_extra_data(&extra);
        assert_eq!(name.as_deref(), Some("Hi"));
    }

    #[test]
    fn feature_keys_set_their_flags() {
        let mut blocks = vec![];
        push_tagged_block(&mut blocks, b"TySh", &[]);
        push_tagged_block(&mut blocks, b"lfx2", &[]);
        push_tagged_block(&mut blocks, b"vmsk", &[]);
        push_tagged_block(&mut blocks, b"SoCo", &[]);
        push_tagged_block(&mut blocks, b"curv", &[]);
        push_tagged_block(&mut blocks, b"3dLr", &[]);
        push_tagged_block(&mut blocks, b"vtrk", &[]);
        push_tagged_block(&mut blocks, b"SoLd", &[]);

        let extra = extra_data(b"", &blocks);
        let (_, features) = parse_extra_data(&extra);

        assert!(features.has_text);
        assert!(features.has_effects);
        assert!(features.has_vector_mask);
        assert!(features.has_fill);
        assert!(features.has_adjustment);
        assert!(features.has_3d);
        assert!(features.has_video);
        assert!(features.has_smart_object);
        assert!(!features.is_group_start);
    }

    #[test]
    fn lsct_types_map_to_group_markers() {
        for (section_type, start, end) in [(1u32, true, false), (2, true, false), (3, false, true)]
        {
            let mut blocks = vec![];
            push_tagged_block(&mut blocks, b"lsct", &section_type.to_be_bytes());
            let extra = extra_data(b"", &blocks);
            let (_, features) = parse_extra_data(&extra);
            assert_eq!(features.is_group_start, start);
            assert_eq!(features.is_group_end, end);
        }
    }

    #[test]
    fn unknown_signature_stops_the_block_scan() {
        let mut blocks = vec![];
        push_tagged_block(&mut blocks, b"lfx2", &[]);
        blocks.extend_from_slice(b"XXXX");
        blocks.extend_from_slice(b"TySh");
        blocks.extend_from_slice(&0u32.to_be_bytes());

        let extra = extra_data(b"", &blocks);
        let (_, features) = parse_extra_data(&extra);
        assert!(features.has_effects);
        assert!(!features.has_text);
    }
}
