//! Data structures and methods for reading PSD and PSB files.
//!
//! Parsing starts from [`Psd::from_bytes`], which consumes the whole input
//! and returns an owning document: header metadata, color mode data, image
//! resource blocks, the layer list, the text-layer table, and the flattened
//! composite. Layer channel planes and text descriptors are decoded lazily
//! on first access, which is why those accessors take `&mut self`.
//!
//! psd spec: <https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/>

#![deny(missing_docs)]

use std::io::Read;

use crate::psd_channel::LayerChannel;
use crate::render::{render_planar_rgba8, rgba8_len};
use crate::sections::color_mode_data_section::ColorModeDataSection;
use crate::sections::file_header_section::FileHeaderSection;
use crate::sections::image_data_section::ImageDataSection;
use crate::sections::image_resources_section::ImageResourcesSection;
use crate::sections::layer_and_mask_information_section::LayerAndMaskInformationSection;
use crate::sections::PsdCursor;

mod compression;
mod descriptor;
mod error;
mod psd_channel;
mod render;
mod sections;
mod text_layer;
mod unicode;

pub use crate::compression::CodecError;
pub use crate::descriptor::{
    Descriptor, DescriptorError, DescriptorProperty, DescriptorValue, ReferenceItem,
};
pub use crate::error::PsdError;
pub use crate::psd_channel::{ChannelCompression, ChannelData, ChannelError};
pub use crate::render::RenderError;
pub use crate::sections::file_header_section::{ColorMode, FileHeaderError, PsdDepth};
pub use crate::sections::image_resources_section::ImageResource;
pub use crate::sections::layer_and_mask_information_section::layer::{
    LayerFeatures, LayerType, PsdLayer, Rect,
};
pub use crate::sections::layer_and_mask_information_section::LayerError;
pub use crate::sections::CursorError;
pub use crate::text_layer::{
    Justification, TextBounds, TextError, TextLayer, TextMatrix, TextSource, TextStyle,
};

/// Represents the contents of a PSD or PSB file.
///
/// The document owns every decoded byte. Structural fields are immutable
/// after parse; the lazily decoded layer channels and text descriptors are
/// the only mutable state, which the `&mut self` accessors make explicit.
#[derive(Debug)]
pub struct Psd {
    file_header_section: FileHeaderSection,
    color_mode_data_section: ColorModeDataSection,
    image_resources_section: ImageResourcesSection,
    layer_and_mask_information_section: LayerAndMaskInformationSection,
    image_data_section: Option<ImageDataSection>,
    text_layers: Vec<TextLayer>,
}

impl Psd {
    /// Create a Psd from a byte slice.
    ///
    /// You'll typically get these bytes from a PSD file.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let psd_bytes = include_bytes!("./my-psd-file.psd");
    ///
    /// let psd = Psd::from_bytes(psd_bytes)?;
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Result<Psd, PsdError> {
        let mut cursor = PsdCursor::new(bytes);

        let file_header_section = FileHeaderSection::from_cursor(&mut cursor)?;
        let is_large = file_header_section.version.is_large();

        let color_mode_data_section = ColorModeDataSection::from_cursor(&mut cursor)?;
        let image_resources_section = ImageResourcesSection::from_cursor(&mut cursor)?;

        let layer_and_mask_information_section =
            LayerAndMaskInformationSection::from_cursor(&mut cursor, is_large)?;

        let text_layers =
            text_layer::scan_text_layers(&layer_and_mask_information_section.layers);

        let image_data_section = ImageDataSection::from_cursor(
            &mut cursor,
            is_large,
            file_header_section.width.0,
            file_header_section.height.0,
            file_header_section.channel_count.count(),
            file_header_section.depth,
        );

        Ok(Psd {
            file_header_section,
            color_mode_data_section,
            image_resources_section,
            layer_and_mask_information_section,
            image_data_section,
            text_layers,
        })
    }

    /// Create a Psd by reading any `Read` implementation to its end.
    pub fn from_reader(mut reader: impl Read) -> Result<Psd, PsdError> {
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes)?;
        Psd::from_bytes(&bytes)
    }
}

// Methods for working with the file header
impl Psd {
    /// The width of the document in pixels.
    pub fn width(&self) -> u32 {
        self.file_header_section.width.0
    }

    /// The height of the document in pixels.
    pub fn height(&self) -> u32 {
        self.file_header_section.height.0
    }

    /// The number of bits per channel: 1, 8, 16 or 32.
    pub fn depth(&self) -> u16 {
        self.file_header_section.depth.bits()
    }

    /// The number of channels in the image, including alpha channels.
    pub fn channel_count(&self) -> u16 {
        self.file_header_section.channel_count.count()
    }

    /// The color mode of the file.
    pub fn color_mode(&self) -> ColorMode {
        self.file_header_section.color_mode
    }

    /// Whether this is a large-format (PSB) document.
    pub fn is_large_format(&self) -> bool {
        self.file_header_section.version.is_large()
    }
}

// Methods for working with the color mode data section
impl Psd {
    /// The raw bytes of the color mode data section. For indexed documents
    /// this holds the 768-byte RGB palette; for most other modes it is
    /// empty.
    pub fn color_mode_data(&self) -> &[u8] {
        &self.color_mode_data_section.data
    }

    /// The indexed-color palette (256 reds, 256 greens, 256 blues), when the
    /// color mode data holds one.
    pub fn indexed_palette(&self) -> Option<&[u8]> {
        self.color_mode_data_section.rgb_palette()
    }
}

// Methods for working with image resources
impl Psd {
    /// All image resource blocks, in file order.
    pub fn resources(&self) -> &[ImageResource] {
        &self.image_resources_section.resources
    }

    /// Find the index of the first resource with the given id.
    pub fn resource_by_id(&self, id: u16) -> Option<usize> {
        self.image_resources_section
            .resources
            .iter()
            .position(|resource| resource.id() == id)
    }
}

// Methods for working with layers
impl Psd {
    /// All layers, in disk order. The bottom-most layer is the last one.
    pub fn layers(&self) -> &[PsdLayer] {
        &self.layer_and_mask_information_section.layers
    }

    /// The number of layers in the document.
    pub fn layer_count(&self) -> usize {
        self.layer_and_mask_information_section.layers.len()
    }

    /// A layer by index.
    pub fn layer(&self, index: usize) -> Option<&PsdLayer> {
        self.layer_and_mask_information_section.layers.get(index)
    }

    /// Whether the composite's first alpha channel holds the transparency of
    /// the merged result (signalled by a negative layer count on disk).
    pub fn has_transparency_plane(&self) -> bool {
        self.layer_and_mask_information_section.has_transparency_plane
    }

    /// Whether the layer at `index` is the document's true Background layer.
    ///
    /// A true background layer must meet all of these criteria:
    /// 1. it is the bottom-most layer,
    /// 2. its background flag (bit 2) is set,
    /// 3. it has no transparency channel (id -1),
    /// 4. it has no layer mask data,
    /// 5. it has no vector mask,
    /// 6. its channel count equals `base_channel_count` (RGB 3, CMYK 4,
    ///    grayscale 1, ...).
    ///
    /// At most one layer per document can satisfy this.
    pub fn is_background_layer(&self, index: usize, base_channel_count: u16) -> bool {
        let layers = self.layers();
        if layers.is_empty() || index != layers.len() - 1 {
            return false;
        }
        let layer = &layers[index];

        layer.flags() & 0x04 != 0
            && !layer.has_transparency_channel()
            && !layer.has_mask_data()
            && !layer.features().has_vector_mask
            && layer.channel_count() == usize::from(base_channel_count)
    }

    /// The pixel bytes of one layer channel, decoding them on first access.
    ///
    /// The decoded plane is cached on the channel, so asking twice returns
    /// the same bytes without re-decoding. For zero-area layers the returned
    /// data is empty. When deflate support is compiled out, deflate channels
    /// come back still compressed with `is_decoded == false`.
    pub fn layer_channel_data(
        &mut self,
        layer_index: usize,
        channel_index: usize,
    ) -> Result<ChannelData<'_>, PsdError> {
        let layer_count = self.layer_count();
        let depth = self.file_header_section.depth;
        let is_large = self.is_large_format();

        let layer = self
            .layer_and_mask_information_section
            .layers
            .get_mut(layer_index)
            .ok_or(PsdError::LayerIndexOutOfRange {
                index: layer_index,
                count: layer_count,
            })?;

        let width = layer.bounds().width();
        let height = layer.bounds().height();
        let channel_count = layer.channels.len();

        let channel: &mut LayerChannel = layer.channels.get_mut(channel_index).ok_or(
            PsdError::ChannelIndexOutOfRange {
                index: channel_index,
                count: channel_count,
            },
        )?;

        if width == 0 || height == 0 {
            return Ok(ChannelData {
                id: channel.id,
                compression: channel.compression,
                is_decoded: false,
                data: &[],
            });
        }

        channel.decode(width, height, depth, is_large)?;

        Ok(match &channel.decoded {
            Some(decoded) => ChannelData {
                id: channel.id,
                compression: channel.compression,
                is_decoded: true,
                data: decoded,
            },
            None => ChannelData {
                id: channel.id,
                compression: channel.compression,
                is_decoded: false,
                data: &channel.compressed,
            },
        })
    }
}

// Methods for working with the composite image
impl Psd {
    /// The flattened composite image as decoded planar bytes, along with its
    /// on-disk compression. `None` when the file carries no composite.
    pub fn composite(&self) -> Option<(ChannelCompression, &[u8])> {
        self.image_data_section
            .as_ref()
            .map(|section| (section.compression, section.data.as_slice()))
    }

    /// Render the composite into a caller-supplied RGBA8 buffer.
    ///
    /// On success returns the number of bytes written (`width * height * 4`).
    /// A short buffer fails with [`RenderError::BufferTooSmall`] carrying the
    /// required size.
    pub fn composite_rgba8_into(&self, rgba: &mut [u8]) -> Result<usize, PsdError> {
        let width = self.width();
        let height = self.height();
        let required = rgba8_len(width, height)?;
        if rgba.len() < required {
            return Err(RenderError::BufferTooSmall {
                required,
                provided: rgba.len(),
            }
            .into());
        }

        let section = self
            .image_data_section
            .as_ref()
            .ok_or(RenderError::NoComposite)?;

        let depth = self.file_header_section.depth;
        let plane_len = usize::try_from(
            psd_channel::scanline_len(width, depth) * u64::from(height),
        )
        .map_err(|_| RenderError::SizeOverflow)?;

        let channels = usize::from(self.channel_count());
        if plane_len == 0 || section.data.len() < channels * plane_len {
            return Err(RenderError::MissingPlaneData.into());
        }

        // Up to five planes matter for display: the mode's base channels
        // plus alpha
        let mut planes: Vec<Option<&[u8]>> = Vec::with_capacity(5);
        for i in 0..channels.min(5) {
            planes.push(Some(&section.data[i * plane_len..(i + 1) * plane_len]));
        }

        render_planar_rgba8(
            self.color_mode(),
            depth,
            width,
            height,
            &planes,
            self.color_mode_data(),
            rgba,
        )?;

        Ok(required)
    }

    /// Render the composite into a freshly allocated RGBA8 buffer.
    pub fn composite_rgba8(&self) -> Result<Vec<u8>, PsdError> {
        let required = rgba8_len(self.width(), self.height())?;
        let mut rgba = vec![0; required];
        self.composite_rgba8_into(&mut rgba)?;
        Ok(rgba)
    }

    /// Render one layer's bounding box into a caller-supplied RGBA8 buffer,
    /// decoding its channels on demand.
    ///
    /// On success returns the number of bytes written
    /// (`layer_width * layer_height * 4`, zero for zero-area layers).
    pub fn layer_rgba8_into(
        &mut self,
        layer_index: usize,
        rgba: &mut [u8],
    ) -> Result<usize, PsdError> {
        let layer_count = self.layer_count();
        let depth = self.file_header_section.depth;
        let is_large = self.is_large_format();
        let mode = self.color_mode();

        let layer = self
            .layer_and_mask_information_section
            .layers
            .get_mut(layer_index)
            .ok_or(PsdError::LayerIndexOutOfRange {
                index: layer_index,
                count: layer_count,
            })?;

        let width = layer.bounds().width();
        let height = layer.bounds().height();
        let required = rgba8_len(width, height)?;
        if rgba.len() < required {
            return Err(RenderError::BufferTooSmall {
                required,
                provided: rgba.len(),
            }
            .into());
        }
        if width == 0 || height == 0 {
            return Ok(0);
        }

        // Decode every channel first, then borrow the planes immutably.
        for channel in &mut layer.channels {
            channel.decode(width, height, depth, is_large)?;
        }

        // planes[0..4] by channel id, planes[4] holds alpha (-1)
        let mut by_id: [Option<&[u8]>; 5] = [None; 5];
        for channel in &layer.channels {
            let Some(decoded) = channel.decoded.as_deref() else {
                continue;
            };
            if decoded.is_empty() {
                continue;
            }
            if (0..4i16).contains(&channel.id) {
                by_id[channel.id as usize] = Some(decoded);
            } else if channel.id == -1 {
                by_id[4] = Some(decoded);
            }
        }

        // Order the planes the way the renderer expects them for the mode:
        // base channels first, then alpha when present.
        let alpha = by_id[4];
        let planes: Vec<Option<&[u8]>> = match mode {
            ColorMode::Rgb | ColorMode::Lab => {
                vec![by_id[0], by_id[1], by_id[2], alpha]
            }
            ColorMode::Grayscale | ColorMode::Duotone | ColorMode::Indexed | ColorMode::Bitmap => {
                vec![by_id[0], alpha]
            }
            ColorMode::Cmyk => vec![by_id[0], by_id[1], by_id[2], by_id[3], alpha],
            other => {
                return Err(RenderError::UnsupportedColorMode {
                    mode: other.as_u16(),
                }
                .into())
            }
        };

        render_planar_rgba8(
            mode,
            depth,
            width,
            height,
            &planes,
            &self.color_mode_data_section.data,
            rgba,
        )?;

        Ok(required)
    }

    /// Render one layer into a freshly allocated RGBA8 buffer.
    pub fn layer_rgba8(&mut self, layer_index: usize) -> Result<Vec<u8>, PsdError> {
        let (width, height) = {
            let layer = self
                .layer(layer_index)
                .ok_or(PsdError::LayerIndexOutOfRange {
                    index: layer_index,
                    count: self.layer_count(),
                })?;
            (layer.width(), layer.height())
        };
        let mut rgba = vec![0; rgba8_len(width, height)?];
        self.layer_rgba8_into(layer_index, &mut rgba)?;
        Ok(rgba)
    }
}

// Methods for working with text layers
impl Psd {
    /// The document's text layers, in layer order.
    pub fn text_layers(&self) -> &[TextLayer] {
        &self.text_layers
    }

    /// The text layer belonging to the layer at `layer_index`, if any.
    pub fn text_layer(&self, layer_index: usize) -> Option<&TextLayer> {
        self.text_layers
            .iter()
            .find(|entry| entry.layer_index == layer_index)
    }

    /// Extract the text content of the text layer at `layer_index`,
    /// parsing its descriptors on first access.
    pub fn text(&mut self, layer_index: usize) -> Result<String, PsdError> {
        Ok(self.text_layer_mut(layer_index)?.text()?)
    }

    /// Extract the default single-run style of the text layer at
    /// `layer_index`: font name, size, color, tracking, leading and
    /// justification.
    pub fn text_style(&mut self, layer_index: usize) -> Result<TextStyle, PsdError> {
        Ok(self.text_layer_mut(layer_index)?.default_style()?)
    }

    /// The transform matrix and text bounds of the text layer at
    /// `layer_index`.
    pub fn text_matrix_bounds(
        &self,
        layer_index: usize,
    ) -> Result<(TextMatrix, TextBounds), PsdError> {
        let entry = self
            .text_layer(layer_index)
            .ok_or(TextError::NotATextLayer { layer_index })?;
        Ok((entry.transform(), entry.bounds()))
    }

    fn text_layer_mut(&mut self, layer_index: usize) -> Result<&mut TextLayer, TextError> {
        self.text_layers
            .iter_mut()
            .find(|entry| entry.layer_index == layer_index)
            .ok_or(TextError::NotATextLayer { layer_index })
    }
}
