//! The crate-wide error type.
//!
//! Every concern keeps its own error enum next to its code; this module
//! aggregates them into the single [`PsdError`] the public API returns.
//! `Display` on `PsdError` is the human-readable message for every failure.

use thiserror::Error;

use crate::compression::CodecError;
use crate::descriptor::DescriptorError;
use crate::psd_channel::ChannelError;
use crate::render::RenderError;
use crate::sections::file_header_section::FileHeaderError;
use crate::sections::layer_and_mask_information_section::LayerError;
use crate::sections::CursorError;
use crate::text_layer::TextError;

/// Any error this crate can return.
#[derive(Debug, Error)]
pub enum PsdError {
    /// The byte stream ended early or a seek went out of range.
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// The file header is malformed or unsupported.
    #[error(transparent)]
    FileHeader(#[from] FileHeaderError),
    /// The layer and mask information section is corrupt.
    #[error(transparent)]
    Layer(#[from] LayerError),
    /// A layer channel failed to decode.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Compressed data failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// An action descriptor failed to parse.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// A text layer query failed.
    #[error(transparent)]
    Text(#[from] TextError),
    /// Rendering to RGBA failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// A layer index beyond the layer count.
    #[error("layer index {index} is out of range, the document has {count} layers")]
    LayerIndexOutOfRange {
        /// The requested index
        index: usize,
        /// Number of layers in the document
        count: usize,
    },
    /// A channel index beyond the layer's channel count.
    #[error("channel index {index} is out of range, the layer has {count} channels")]
    ChannelIndexOutOfRange {
        /// The requested index
        index: usize,
        /// Number of channels in the layer
        count: usize,
    },
    /// Reading the input failed before parsing began.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
