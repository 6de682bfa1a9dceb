//! Text layers: the 'TySh' payload, its lazily parsed descriptors, and the
//! single-run style extracted from the embedded text engine blob.
//!
//! Parsing descriptors is the expensive part, so only the transform, bounds
//! and raw payload are pulled out while the document parses. The descriptor
//! tree is built the first time a consumer asks for the text content or the
//! style and cached on the entry.

use serde::Serialize;
use thiserror::Error;

use crate::descriptor::{Descriptor, DescriptorError, DescriptorValue};
use crate::sections::layer_and_mask_information_section::layer::PsdLayer;
use crate::sections::{CursorError, PsdCursor, SIGNATURE_EIGHT_B64, SIGNATURE_EIGHT_BIM};
use crate::unicode::utf16be_to_utf8;

/// At most this many font names are collected from a `/FontSet` array.
const MAX_FONT_NAMES: usize = 64;

/// An error while working with a text layer.
#[derive(Debug, Error)]
pub enum TextError {
    /// The layer index does not belong to a text layer.
    #[error("layer {layer_index} is not a text layer")]
    NotATextLayer {
        /// The index that was asked for
        layer_index: usize,
    },
    /// The text layer has no usable payload to parse.
    #[error("the text layer payload is missing or empty")]
    EmptyPayload,
    /// The descriptor inside the payload failed to parse.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// The payload bytes ran out mid-structure.
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// The parsed descriptor carries no `"Txt "` string.
    #[error("the text descriptor has no \"Txt \" string property")]
    TextNotFound,
    /// The descriptor carries no engine data blob.
    #[error("the text descriptor has no engine data")]
    EngineDataMissing,
    /// The engine data did not yield a font name and a positive size.
    #[error("the engine data does not contain a usable font name and size")]
    InvalidStyle,
}

/// Which tagged block a text layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextSource {
    /// 'TySh' (Photoshop 6 and later)
    Modern,
    /// 'tySh' (Photoshop 5/5.5); only the raw payload is captured
    Legacy,
}

/// 2D affine transform of a text layer: xx, xy, yx, yy, tx, ty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct TextMatrix {
    pub xx: f64,
    pub xy: f64,
    pub yx: f64,
    pub yy: f64,
    pub tx: f64,
    pub ty: f64,
}

/// Text bounds rectangle, in the layer's coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct TextBounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Paragraph justification of the default style run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Justification {
    /// Left aligned
    Left,
    /// Right aligned
    Right,
    /// Centered
    Center,
    /// Fully justified
    Full,
}

/// The single-run style extracted from a text layer's engine data.
///
/// Text layers are treated as one style run; warp, stroke and per-character
/// runs are out of scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    /// UTF-8 font name (PostScript or family name)
    pub font_name: String,
    /// Font size in points
    pub size: f64,
    /// RGBA fill color, alpha 255 when unknown
    pub color_rgba: [u8; 4],
    /// Uniform adjustment of space between characters
    pub tracking: f64,
    /// Vertical space between lines; 0 when unknown
    pub leading: f64,
    /// Paragraph justification
    pub justification: Justification,
}

/// One text layer of the document.
#[derive(Debug)]
pub struct TextLayer {
    pub(crate) layer_index: usize,
    source: TextSource,
    tysh_version: u16,
    text_version: u16,
    text_descriptor_version: u32,
    warp_version: u16,
    warp_descriptor_version: u32,
    transform: TextMatrix,
    bounds: TextBounds,
    raw_payload: Vec<u8>,
    text_descriptor: Option<Descriptor>,
    warp_descriptor: Option<Descriptor>,
    has_rendered_pixels: bool,
}

impl TextLayer {
    /// Index of the layer this text belongs to.
    pub fn layer_index(&self) -> usize {
        self.layer_index
    }

    /// Which tagged block the text came from.
    pub fn source(&self) -> TextSource {
        self.source
    }

    /// The layer's 2D transform.
    pub fn transform(&self) -> TextMatrix {
        self.transform
    }

    /// The text bounds rectangle.
    pub fn bounds(&self) -> TextBounds {
        self.bounds
    }

    /// 'TySh' block version.
    pub fn tysh_version(&self) -> u16 {
        self.tysh_version
    }

    /// Text record version.
    pub fn text_version(&self) -> u16 {
        self.text_version
    }

    /// Text descriptor version.
    pub fn text_descriptor_version(&self) -> u32 {
        self.text_descriptor_version
    }

    /// Warp record version, zero until descriptors have been parsed.
    pub fn warp_version(&self) -> u16 {
        self.warp_version
    }

    /// Warp descriptor version, zero until descriptors have been parsed.
    pub fn warp_descriptor_version(&self) -> u32 {
        self.warp_descriptor_version
    }

    /// Whether the owning layer carries rendered pixels of the text.
    pub fn has_rendered_pixels(&self) -> bool {
        self.has_rendered_pixels
    }

    /// The raw 'TySh'/'tySh' payload bytes.
    pub fn raw_payload(&self) -> &[u8] {
        &self.raw_payload
    }

    /// The parsed text descriptor, if descriptors have been parsed.
    pub fn text_descriptor(&self) -> Option<&Descriptor> {
        self.text_descriptor.as_ref()
    }

    /// The parsed warp descriptor, if present and parsed.
    pub fn warp_descriptor(&self) -> Option<&Descriptor> {
        self.warp_descriptor.as_ref()
    }

    /// An entry that only carries the raw payload, used for the legacy block
    /// and for modern payloads whose eager scan failed.
    fn raw_only(layer_index: usize, source: TextSource, layer: &PsdLayer, payload: &[u8]) -> Self {
        TextLayer {
            layer_index,
            source,
            tysh_version: 0,
            text_version: 0,
            text_descriptor_version: 0,
            warp_version: 0,
            warp_descriptor_version: 0,
            transform: TextMatrix::default(),
            bounds: TextBounds::default(),
            raw_payload: payload.to_vec(),
            text_descriptor: None,
            warp_descriptor: None,
            has_rendered_pixels: layer_has_pixels(layer),
        }
    }

    /// Parse the text (and warp) descriptors from the raw payload if they
    /// have not been parsed yet.
    ///
    /// The text descriptor is required; the warp descriptor is optional and
    /// any failure reading it is ignored.
    pub(crate) fn ensure_descriptors_parsed(&mut self) -> Result<(), TextError> {
        if self.text_descriptor.is_some() {
            return Ok(());
        }
        if self.raw_payload.is_empty() {
            return Err(TextError::EmptyPayload);
        }

        let (tysh_version, text_version, text_descriptor_version, text_descriptor, warp) = {
            let mut cursor = PsdCursor::new(&self.raw_payload);

            let tysh_version = cursor.read_u16()?;
            cursor.skip(48)?; // 6 x f64 transform, already captured eagerly
            let text_version = cursor.read_u16()?;
            let text_descriptor_version = cursor.read_u32()?;
            let text_descriptor = Descriptor::from_cursor(&mut cursor)?;

            // Warp header and descriptor are optional; stop quietly wherever
            // they end.
            let warp = (|| {
                let warp_version = cursor.read_u16().ok()?;
                let warp_descriptor_version = cursor.read_u32().ok()?;
                let descriptor = Descriptor::from_cursor(&mut cursor).ok();
                Some((warp_version, warp_descriptor_version, descriptor))
            })();

            (
                tysh_version,
                text_version,
                text_descriptor_version,
                text_descriptor,
                warp,
            )
        };

        self.tysh_version = tysh_version;
        self.text_version = text_version;
        self.text_descriptor_version = text_descriptor_version;
        self.text_descriptor = Some(text_descriptor);
        if let Some((warp_version, warp_descriptor_version, warp_descriptor)) = warp {
            self.warp_version = warp_version;
            self.warp_descriptor_version = warp_descriptor_version;
            self.warp_descriptor = warp_descriptor;
        }

        Ok(())
    }

    /// Extract the layer's text content.
    pub(crate) fn text(&mut self) -> Result<String, TextError> {
        self.ensure_descriptors_parsed()?;
        let descriptor = self.text_descriptor.as_ref().ok_or(TextError::EmptyPayload)?;
        find_string(descriptor, "Txt ")
            .map(str::to_owned)
            .ok_or(TextError::TextNotFound)
    }

    /// Extract the default single-run style from the engine data.
    pub(crate) fn default_style(&mut self) -> Result<TextStyle, TextError> {
        self.ensure_descriptors_parsed()?;
        let descriptor = self.text_descriptor.as_ref().ok_or(TextError::EmptyPayload)?;
        let engine = find_raw(descriptor, "EngineData").ok_or(TextError::EngineDataMissing)?;

        let readable = engine_data_to_text(engine);
        extract_style(&readable)
    }
}

fn layer_has_pixels(layer: &PsdLayer) -> bool {
    layer.channel_count() > 0 && layer.width() > 0 && layer.height() > 0
}

/// Scan every text-flagged layer's tagged blocks and collect the text layer
/// table. Runs once at parse time.
pub(crate) fn scan_text_layers(layers: &[PsdLayer]) -> Vec<TextLayer> {
    let mut entries = vec![];
    for (index, layer) in layers.iter().enumerate() {
        if !layer.features().has_text || layer.extra_data.len() < 12 {
            continue;
        }
        // A malformed record only cuts this layer's scan short
        let _ = scan_layer_blocks(index, layer, &mut entries);
    }
    entries
}

fn scan_layer_blocks(
    index: usize,
    layer: &PsdLayer,
    entries: &mut Vec<TextLayer>,
) -> Result<(), CursorError> {
    let mut cursor = PsdCursor::new(&layer.extra_data);

    // Layer mask data
    if cursor.remaining() >= 4 {
        let mask_len = u64::from(cursor.read_u32()?);
        if mask_len > 0 && mask_len <= cursor.remaining() {
            cursor.skip(mask_len)?;
        }
    }
    // Layer blending ranges
    if cursor.remaining() >= 4 {
        let ranges_len = u64::from(cursor.read_u32()?);
        if ranges_len > 0 && ranges_len <= cursor.remaining() {
            cursor.skip(ranges_len)?;
        }
    }
    // Layer name, padded to a multiple of 4 including the length byte
    if cursor.remaining() >= 1 {
        let name_len = cursor.read_u8()?;
        let mut name_total = 1 + u64::from(name_len);
        if name_total % 4 != 0 {
            name_total += 4 - name_total % 4;
        }
        if name_total - 1 <= cursor.remaining() {
            cursor.skip(name_total - 1)?;
        }
    }

    while cursor.remaining() >= 12 {
        let signature = cursor.read_4()?;
        let key = cursor.read_4()?;
        let block_len = u64::from(cursor.read_u32()?);
        if block_len > cursor.remaining() {
            break;
        }
        let payload = cursor.read(block_len)?;

        if signature == SIGNATURE_EIGHT_BIM || signature == SIGNATURE_EIGHT_B64 {
            if &key == b"TySh" {
                let entry = parse_tysh_payload(index, layer, payload).unwrap_or_else(|_| {
                    // Keep the payload for on-demand parsing even when the
                    // eager scan fails
                    TextLayer::raw_only(index, TextSource::Modern, layer, payload)
                });
                entries.push(entry);
            } else if &key == b"tySh" {
                entries.push(TextLayer::raw_only(index, TextSource::Legacy, layer, payload));
            }
        }

        if block_len % 2 != 0 && cursor.skip(1).is_err() {
            break;
        }
    }

    Ok(())
}

/// Eagerly extract the rendering essentials from a 'TySh' payload:
/// version tags, the 6-double transform, and the 4-double text bounds that
/// sit in the last 32 bytes. Descriptors are left for on-demand parsing.
fn parse_tysh_payload(
    index: usize,
    layer: &PsdLayer,
    payload: &[u8],
) -> Result<TextLayer, CursorError> {
    let mut cursor = PsdCursor::new(payload);

    let tysh_version = cursor.read_u16()?;
    let transform = TextMatrix {
        xx: cursor.read_f64()?,
        xy: cursor.read_f64()?,
        yx: cursor.read_f64()?,
        yy: cursor.read_f64()?,
        tx: cursor.read_f64()?,
        ty: cursor.read_f64()?,
    };
    let text_version = cursor.read_u16()?;
    let text_descriptor_version = cursor.read_u32()?;

    // Bounds are positioned immediately before the end of the block; 70 is
    // the smallest payload that can hold the fixed fields plus bounds.
    let mut bounds = TextBounds::default();
    if payload.len() >= 70 {
        let bounds_start = payload.len() as u64 - 32;
        if bounds_start > cursor.position() {
            cursor.seek(bounds_start)?;
        }
        bounds = TextBounds {
            left: cursor.read_f64()?,
            top: cursor.read_f64()?,
            right: cursor.read_f64()?,
            bottom: cursor.read_f64()?,
        };
    }

    Ok(TextLayer {
        layer_index: index,
        source: TextSource::Modern,
        tysh_version,
        text_version,
        text_descriptor_version,
        warp_version: 0,
        warp_descriptor_version: 0,
        transform,
        bounds,
        raw_payload: payload.to_vec(),
        text_descriptor: None,
        warp_descriptor: None,
        has_rendered_pixels: layer_has_pixels(layer),
    })
}

/// Depth-first search for a string property with the given key.
///
/// A key match with a non-string value ends the search of that descriptor.
fn find_string<'d>(descriptor: &'d Descriptor, key: &str) -> Option<&'d str> {
    for property in &descriptor.properties {
        if property.key == key {
            return match &property.value {
                DescriptorValue::String(s) => Some(s),
                _ => None,
            };
        }
        match &property.value {
            DescriptorValue::Object { descriptor, .. } => {
                if let Some(found) = find_string(descriptor, key) {
                    return Some(found);
                }
            }
            DescriptorValue::List(items) => {
                for item in items {
                    if let DescriptorValue::Object { descriptor, .. } = item {
                        if let Some(found) = find_string(descriptor, key) {
                            return Some(found);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Depth-first search for an opaque-bytes property with the given key.
///
/// Engine data is written with a type tag this parser keeps opaque, so both
/// the 'raws' arm and the unknown-tag arm count as byte payloads.
fn find_raw<'d>(descriptor: &'d Descriptor, key: &str) -> Option<&'d [u8]> {
    for property in &descriptor.properties {
        if property.key == key {
            return match &property.value {
                DescriptorValue::RawData(data) | DescriptorValue::Unknown { data, .. }
                    if !data.is_empty() =>
                {
                    Some(data)
                }
                _ => None,
            };
        }
        match &property.value {
            DescriptorValue::Object { descriptor, .. } => {
                if let Some(found) = find_raw(descriptor, key) {
                    return Some(found);
                }
            }
            DescriptorValue::List(items) => {
                for item in items {
                    if let DescriptorValue::Object { descriptor, .. } = item {
                        if let Some(found) = find_raw(descriptor, key) {
                            return Some(found);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Turn the engine data blob into readable UTF-8.
///
/// The blob is a printed-PostScript-like structure whose string literals sit
/// in parentheses, BOM-prefixed and UTF-16 encoded. Each parenthesized run is
/// decoded (byte-swapped first when the BOM is little-endian); everything
/// else is copied through. The parentheses themselves are kept so token
/// scanning can find name boundaries.
pub(crate) fn engine_data_to_text(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());

    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        if byte != b'(' {
            out.push(char::from(byte));
            i += 1;
            continue;
        }

        // Find the matching ')' honoring backslash escapes
        let mut j = i + 1;
        let mut escaped = false;
        while j < data.len() {
            let current = data[j];
            if !escaped && current == b')' {
                break;
            }
            if !escaped && current == b'\\' {
                escaped = true;
                j += 1;
                continue;
            }
            escaped = false;
            j += 1;
        }
        if j >= data.len() {
            // Unmatched parenthesis: emit it and stop
            out.push('(');
            break;
        }

        let inner = &data[i + 1..j];
        out.push('(');
        if inner.len() >= 2 && inner[0] == 0xFE && inner[1] == 0xFF {
            out.push_str(&utf16be_to_utf8(&inner[2..]));
        } else if inner.len() >= 2 && inner[0] == 0xFF && inner[1] == 0xFE {
            let mut swapped = inner[2..].to_vec();
            for pair in swapped.chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
            out.push_str(&utf16be_to_utf8(&swapped));
        } else {
            out.push_str(&String::from_utf8_lossy(inner));
        }
        out.push(')');

        i = j + 1;
    }

    out
}

/// Extract the default style by token scanning the readable engine data.
fn extract_style(text: &str) -> Result<TextStyle, TextError> {
    let mut style = TextStyle {
        font_name: String::new(),
        size: 0.0,
        color_rgba: [0, 0, 0, 255],
        tracking: 0.0,
        leading: 0.0,
        justification: Justification::Left,
    };

    // Font: index into the /FontSet names, falling back to the first name
    let font_index = parse_int_after(text, "/Font");
    let names = fontset_names(text);
    if !names.is_empty() {
        let pick = match font_index {
            Some(i) if i >= 0 && (i as usize) < names.len() => i as usize,
            _ => 0,
        };
        style.font_name = names[pick].clone();
    } else if let Some(name) = first_name_fallback(text) {
        style.font_name = name;
    }

    if let Some(size) = parse_f64_after(text, "/FontSize") {
        style.size = size;
    }
    if let Some(tracking) = parse_f64_after(text, "/Tracking") {
        style.tracking = tracking;
    }

    // Explicit leading wins; otherwise AutoLeading is a multiplier on size
    match parse_f64_after(text, "/Leading") {
        Some(leading) => style.leading = leading,
        None => {
            if let Some(auto) = parse_f64_after(text, "/AutoLeading") {
                if style.size > 0.0 && auto > 0.0 {
                    style.leading = style.size * auto;
                }
            }
        }
    }

    if let Some(justification) = parse_int_after(text, "/Justification") {
        style.justification = match justification {
            1 => Justification::Right,
            2 => Justification::Center,
            3 => Justification::Full,
            _ => Justification::Left,
        };
    }

    if let Some(color) = parse_fill_color(text) {
        style.color_rgba = color;
    }

    if style.font_name.is_empty() || style.size <= 0.0 {
        return Err(TextError::InvalidStyle);
    }

    Ok(style)
}

fn parse_int_after(text: &str, token: &str) -> Option<i64> {
    let at = text.find(token)?;
    let rest = text[at + token.len()..].trim_start();
    scan_int(rest)
}

fn parse_f64_after(text: &str, token: &str) -> Option<f64> {
    let at = text.find(token)?;
    let rest = text[at + token.len()..].trim_start();
    scan_f64(rest).map(|(value, _)| value)
}

fn scan_int(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    text[..end].parse().ok()
}

/// Scan a leading floating-point literal, returning the value and the bytes
/// it occupied.
fn scan_f64(text: &str) -> Option<(f64, usize)> {
    let bytes = text.as_bytes();
    let mut end = 0;
    let mut any_digit = false;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        any_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            any_digit = true;
        }
    }
    if !any_digit {
        return None;
    }
    // Exponent, only when digits follow it
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    text[..end].parse().ok().map(|value| (value, end))
}

/// Collect the `/Name (...)` entries of the `/FontSet` array.
fn fontset_names(text: &str) -> Vec<String> {
    let Some(at) = text.find("/FontSet") else {
        return vec![];
    };
    let Some(bracket) = text[at..].find('[') else {
        return vec![];
    };
    let mut rest = &text[at + bracket + 1..];

    let mut names = vec![];
    while names.len() < MAX_FONT_NAMES {
        let Some(name_at) = rest.find("/Name") else {
            break;
        };
        let after = &rest[name_at + 5..];
        let Some(open) = after.find('(') else {
            break;
        };
        let Some(close) = after[open + 1..].find(')') else {
            rest = after;
            continue;
        };
        names.push(after[open + 1..open + 1 + close].to_string());
        rest = &after[open + 1 + close + 1..];
    }

    names
}

/// Fallback when no `/FontSet` exists: the first `/Name (...)` anywhere.
fn first_name_fallback(text: &str) -> Option<String> {
    let at = text.find("/Name")?;
    let after = &text[at..];
    let open = after.find('(')?;
    let close = after[open + 1..].find(')')?;
    if close == 0 {
        return None;
    }
    Some(after[open + 1..open + 1 + close].to_string())
}

/// Three doubles in the `[...]` after `/FillColor ... Values`, as RGB in
/// `[0, 1]`.
fn parse_fill_color(text: &str) -> Option<[u8; 4]> {
    let at = text.find("/FillColor")?;
    let mut region = &text[at..];
    if let Some(values) = region.find("Values") {
        region = &region[values..];
    }
    let bracket = region.find('[')?;
    let mut rest = region[bracket + 1..].trim_start();

    let mut rgb = [0.0f64; 3];
    for component in &mut rgb {
        let (value, consumed) = scan_f64(rest)?;
        *component = value;
        rest = rest[consumed..].trim_start();
    }

    let quantize = |v: f64| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    Some([quantize(rgb[0]), quantize(rgb[1]), quantize(rgb[2]), 255])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_data_decodes_utf16_in_parentheses() {
        let mut blob = b"/Text ".to_vec();
        blob.push(b'(');
        blob.extend_from_slice(&[0xFE, 0xFF, 0x00, b'H', 0x00, b'i']);
        blob.push(b')');

        assert_eq!(engine_data_to_text(&blob), "/Text (Hi)");
    }

    #[test]
    fn engine_data_swaps_little_endian_strings() {
        let mut blob = vec![b'('];
        blob.extend_from_slice(&[0xFF, 0xFE, b'H', 0x00, b'i', 0x00]);
        blob.push(b')');

        assert_eq!(engine_data_to_text(&blob), "(Hi)");
    }

    #[test]
    fn engine_data_keeps_ascii_interiors() {
        let blob = b"/Name (ArialMT) /FontSize 12.5";
        assert_eq!(engine_data_to_text(blob), "/Name (ArialMT) /FontSize 12.5");
    }

    #[test]
    fn engine_data_honors_escaped_parentheses() {
        let blob = b"(a\\)b) tail";
        assert_eq!(engine_data_to_text(blob), "(a\\)b) tail");
    }

    #[test]
    fn style_extraction_from_a_typical_blob() {
        let text = r#"
            /ResourceDict << /FontSet [ << /Name (ArialMT) >> << /Name (Courier) >> ]
            >> /EngineDict << /StyleRun << /StyleSheet << /StyleSheetData <<
            /Font 1 /FontSize 24.0 /AutoLeading 1.2 /Tracking 50
            /FillColor << /Type 1 /Values [ 1.0 0.5 0.0 ] >>
            >> >> >> /ParagraphRun << /Justification 2 >> >>
        "#;

        // The first "/Font" occurrence in the blob is "/FontSet", so the
        // font-index scan comes up empty and the first font wins. This is
        // the accepted heuristic behavior of the token scanner.
        let style = extract_style(text).unwrap();
        assert_eq!(style.font_name, "ArialMT");
        assert_eq!(style.size, 24.0);
        assert_eq!(style.tracking, 50.0);
        assert_eq!(style.leading, 24.0 * 1.2);
        assert_eq!(style.justification, Justification::Center);
        assert_eq!(style.color_rgba, [255, 128, 0, 255]);
    }

    #[test]
    fn missing_size_is_an_invalid_style() {
        let text = "/FontSet [ << /Name (ArialMT) >> ]";
        assert!(matches!(extract_style(text), Err(TextError::InvalidStyle)));
    }

    #[test]
    fn leading_prefers_the_explicit_value() {
        let text = "/FontSet [ << /Name (A) >> ] /FontSize 10 /Leading 14 /AutoLeading 1.2";
        let style = extract_style(text).unwrap();
        assert_eq!(style.leading, 14.0);
    }

    #[test]
    fn number_scanner_handles_signs_fractions_and_exponents() {
        assert_eq!(scan_f64("12.5]"), Some((12.5, 4)));
        assert_eq!(scan_f64("-3 next"), Some((-3.0, 2)));
        assert_eq!(scan_f64("1e2,"), Some((100.0, 3)));
        assert_eq!(scan_f64(".5"), Some((0.5, 2)));
        assert_eq!(scan_f64("abc"), None);
        assert_eq!(scan_int("-42abc"), Some(-42));
        assert_eq!(scan_int("x"), None);
    }
}
