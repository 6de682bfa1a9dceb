//! Layer records and the feature classification derived from their tagged
//! blocks.

use serde::Serialize;

use crate::psd_channel::{ChannelCompression, LayerChannel};

/// A rectangle in document coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rect {
    /// Top coordinate
    pub top: i32,
    /// Left coordinate
    pub left: i32,
    /// Bottom coordinate
    pub bottom: i32,
    /// Right coordinate
    pub right: i32,
}

impl Rect {
    /// Width of the rectangle, zero when the bounds are degenerate.
    pub fn width(&self) -> u32 {
        if self.right > self.left {
            (self.right - self.left) as u32
        } else {
            0
        }
    }

    /// Height of the rectangle, zero when the bounds are degenerate.
    pub fn height(&self) -> u32 {
        if self.bottom > self.top {
            (self.bottom - self.top) as u32
        } else {
            0
        }
    }
}

/// Features detected from a layer's additional information blocks.
///
/// A single layer may have several features set at once; see
/// [`PsdLayer::layer_type`] for the single classification derived from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayerFeatures {
    /// Layer opens a group/folder ('lsct' type 1 or 2)
    pub is_group_start: bool,
    /// Layer closes a group ('lsct' type 3)
    pub is_group_end: bool,
    /// Layer carries text ('TySh', legacy 'tySh')
    pub has_text: bool,
    /// Layer has a vector mask ('vmsk'/'vmns')
    pub has_vector_mask: bool,
    /// Layer is a smart object ('SoLd'/'SoLE')
    pub has_smart_object: bool,
    /// Layer is an adjustment layer ('adj' prefix or a known adjustment key)
    pub has_adjustment: bool,
    /// Layer is a fill layer ('SoCo'/'GdFl'/'PtFl')
    pub has_fill: bool,
    /// Layer has effects ('lfx2')
    pub has_effects: bool,
    /// Layer is 3D ('3dL' prefix)
    pub has_3d: bool,
    /// Layer is video ('vtrk')
    pub has_video: bool,
}

/// The single classification of a layer, derived from its features in
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LayerType {
    /// Opens a group
    GroupStart,
    /// Closes a group
    GroupEnd,
    /// Text layer
    Text,
    /// Smart object layer
    SmartObject,
    /// Adjustment layer
    Adjustment,
    /// Fill layer
    Fill,
    /// Layer with effects
    Effects,
    /// 3D layer
    ThreeD,
    /// Video layer
    Video,
    /// Ordinary pixel layer
    Pixel,
    /// Valid layer with no pixels
    Empty,
}

/// Information about one layer in the document.
///
/// Layers are stored in the order they appear on disk; the bottom-most layer
/// is the last one.
#[derive(Debug)]
pub struct PsdLayer {
    pub(crate) bounds: Rect,
    pub(crate) channels: Vec<LayerChannel>,
    pub(crate) blend_mode_signature: [u8; 4],
    pub(crate) blend_mode_key: [u8; 4],
    pub(crate) opacity: u8,
    pub(crate) clipping: u8,
    pub(crate) flags: u8,
    pub(crate) name: String,
    /// Raw extra data (mask data, blending ranges, name, tagged blocks),
    /// kept for the background predicate and the text-layer scan
    pub(crate) extra_data: Vec<u8>,
    pub(crate) features: LayerFeatures,
}

impl PsdLayer {
    /// The layer's name. Decoded from the legacy MacRoman Pascal string, or
    /// from the 'luni' Unicode block when one is present.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bounding rectangle of the layer's pixels.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Width of the layer's bounding box.
    pub fn width(&self) -> u32 {
        self.bounds.width()
    }

    /// Height of the layer's bounding box.
    pub fn height(&self) -> u32 {
        self.bounds.height()
    }

    /// Blend mode signature, normally `"8BIM"`.
    pub fn blend_mode_signature(&self) -> [u8; 4] {
        self.blend_mode_signature
    }

    /// Blend mode key, e.g. `"norm"` or `"mul "`.
    pub fn blend_mode_key(&self) -> [u8; 4] {
        self.blend_mode_key
    }

    /// Opacity: 0 transparent ..= 255 opaque.
    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    /// Clipping: 0 base, 1 non-base.
    pub fn clipping(&self) -> u8 {
        self.clipping
    }

    /// Layer flags byte. Bit 0 transparency protected, bit 1 visible, bit 2
    /// obsolete (identifies the background layer), bit 3 PS 5.0+, bit 4
    /// pixel data irrelevant.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Number of channels in this layer.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Channel id at `channel_index` (0..n color, -1 alpha, -2 user mask,
    /// -3 real mask).
    pub fn channel_id(&self, channel_index: usize) -> Option<i16> {
        self.channels.get(channel_index).map(|c| c.id)
    }

    /// Compression of the channel at `channel_index`.
    pub fn channel_compression(&self, channel_index: usize) -> Option<ChannelCompression> {
        self.channels.get(channel_index).map(|c| c.compression)
    }

    /// The raw extra-data bytes of the layer record: mask data, blending
    /// ranges, the Pascal name, and every tagged block, preserved verbatim
    /// for callers that interpret blocks this library does not.
    pub fn extra_data(&self) -> &[u8] {
        &self.extra_data
    }

    /// The features detected from the layer's additional information blocks.
    pub fn features(&self) -> LayerFeatures {
        self.features
    }

    /// Classify the layer from its features, in priority order.
    pub fn layer_type(&self) -> LayerType {
        let features = &self.features;
        if features.is_group_start {
            LayerType::GroupStart
        } else if features.is_group_end {
            LayerType::GroupEnd
        } else if features.has_text {
            LayerType::Text
        } else if features.has_smart_object {
            LayerType::SmartObject
        } else if features.has_adjustment {
            LayerType::Adjustment
        } else if features.has_fill {
            LayerType::Fill
        } else if features.has_effects {
            LayerType::Effects
        } else if features.has_3d {
            LayerType::ThreeD
        } else if features.has_video {
            LayerType::Video
        } else if !self.channels.is_empty() {
            LayerType::Pixel
        } else {
            LayerType::Empty
        }
    }

    /// Whether any channel is the transparency channel (id -1).
    pub(crate) fn has_transparency_channel(&self) -> bool {
        self.channels.iter().any(|c| c.id == -1)
    }

    /// Whether the layer's extra data starts with a non-empty mask-data
    /// record.
    pub(crate) fn has_mask_data(&self) -> bool {
        if self.extra_data.len() < 4 {
            return false;
        }
        let mask_len = u32::from_be_bytes([
            self.extra_data[0],
            self.extra_data[1],
            self.extra_data[2],
            self.extra_data[3],
        ]);
        mask_len > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_layer() -> PsdLayer {
        PsdLayer {
            bounds: Rect::default(),
            channels: vec![],
            blend_mode_signature: *b"8BIM",
            blend_mode_key: *b"norm",
            opacity: 255,
            clipping: 0,
            flags: 0,
            name: String::new(),
            extra_data: vec![],
            features: LayerFeatures::default(),
        }
    }

    #[test]
    fn degenerate_bounds_have_zero_size() {
        let rect = Rect {
            top: 10,
            left: 10,
            bottom: 5,
            right: 3,
        };
        assert_eq!(rect.width(), 0);
        assert_eq!(rect.height(), 0);
    }

    #[test]
    fn classification_follows_priority_order() {
        let mut layer = empty_layer();
        assert_eq!(layer.layer_type(), LayerType::Empty);

        layer.features.has_video = true;
        assert_eq!(layer.layer_type(), LayerType::Video);

        layer.features.has_effects = true;
        assert_eq!(layer.layer_type(), LayerType::Effects);

        layer.features.has_text = true;
        assert_eq!(layer.layer_type(), LayerType::Text);

        // Group markers outrank everything
        layer.features.is_group_end = true;
        assert_eq!(layer.layer_type(), LayerType::GroupEnd);
        layer.features.is_group_start = true;
        assert_eq!(layer.layer_type(), LayerType::GroupStart);
    }

    #[test]
    fn pixel_versus_empty_depends_on_channels() {
        use crate::psd_channel::{ChannelCompression, LayerChannel};

        let mut layer = empty_layer();
        assert_eq!(layer.layer_type(), LayerType::Empty);

        layer.channels.push(LayerChannel {
            id: 0,
            compression: ChannelCompression::RawData,
            compressed: vec![],
            decoded: None,
        });
        assert_eq!(layer.layer_type(), LayerType::Pixel);
    }
}
