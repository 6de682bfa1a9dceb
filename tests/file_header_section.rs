//! Header parsing against both document formats and the invalid-header
//! cases.

mod common;

use common::DocBuilder;
use rawpsd::{ColorMode, FileHeaderError, Psd, PsdError};

/// A standard RGB document with no resources and no layers.
///
/// cargo test --test file_header_section standard_rgb_document -- --exact
#[test]
fn standard_rgb_document() {
    let bytes = DocBuilder::new(512, 256, 3, 8, 3).build();
    let psd = Psd::from_bytes(&bytes).unwrap();

    assert_eq!(psd.width(), 512);
    assert_eq!(psd.height(), 256);
    assert_eq!(psd.depth(), 8);
    assert_eq!(psd.channel_count(), 3);
    assert_eq!(psd.color_mode(), ColorMode::Rgb);
    assert!(!psd.is_large_format());
    assert_eq!(psd.resources().len(), 0);
    assert_eq!(psd.layer_count(), 0);
}

/// A large-format CMYK document whose dimensions exceed the standard
/// maximum.
///
/// cargo test --test file_header_section large_format_cmyk_document -- --exact
#[test]
fn large_format_cmyk_document() {
    let bytes = DocBuilder::new(40_960, 20_480, 4, 16, 4).large().build();
    let psd = Psd::from_bytes(&bytes).unwrap();

    assert_eq!(psd.width(), 40_960);
    assert_eq!(psd.height(), 20_480);
    assert_eq!(psd.depth(), 16);
    assert_eq!(psd.color_mode(), ColorMode::Cmyk);
    assert!(psd.is_large_format());
}

#[test]
fn invalid_signature_is_invalid_file_format() {
    let mut bytes = DocBuilder::new(1, 1, 1, 8, 1).build();
    bytes[0..4].copy_from_slice(&[0xFF; 4]);

    match Psd::from_bytes(&bytes).unwrap_err() {
        PsdError::FileHeader(FileHeaderError::InvalidSignature) => {}
        other => panic!("expected invalid signature, got {other:?}"),
    }
}

#[test]
fn version_three_is_unsupported() {
    let mut bytes = DocBuilder::new(1, 1, 1, 8, 1).build();
    bytes[4..6].copy_from_slice(&3u16.to_be_bytes());

    match Psd::from_bytes(&bytes).unwrap_err() {
        PsdError::FileHeader(FileHeaderError::UnsupportedVersion { version: 3 }) => {}
        other => panic!("expected unsupported version, got {other:?}"),
    }
}

#[test]
fn zero_channels_is_an_invalid_header() {
    let mut bytes = DocBuilder::new(1, 1, 1, 8, 1).build();
    bytes[12..14].copy_from_slice(&0u16.to_be_bytes());

    match Psd::from_bytes(&bytes).unwrap_err() {
        PsdError::FileHeader(FileHeaderError::ChannelCountOutOfRange { channel_count: 0 }) => {}
        other => panic!("expected channel count error, got {other:?}"),
    }
}

#[test]
fn standard_dimension_limit_is_enforced() {
    let bytes = DocBuilder::new(30_001, 10, 3, 8, 3).build();
    assert!(matches!(
        Psd::from_bytes(&bytes).unwrap_err(),
        PsdError::FileHeader(FileHeaderError::WidthOutOfRange { .. })
    ));

    // The same size parses as a large document
    let bytes = DocBuilder::new(30_001, 10, 3, 8, 3).large().build();
    assert!(Psd::from_bytes(&bytes).is_ok());
}

#[test]
fn unknown_color_mode_is_preserved_not_rejected() {
    let bytes = DocBuilder::new(4, 4, 3, 8, 12).build();
    let psd = Psd::from_bytes(&bytes).unwrap();
    assert_eq!(psd.color_mode(), ColorMode::Unknown(12));
    assert_eq!(psd.color_mode().as_u16(), 12);
}

#[test]
fn zero_byte_color_mode_data_parses_to_empty() {
    let bytes = DocBuilder::new(4, 4, 3, 8, 3).build();
    let psd = Psd::from_bytes(&bytes).unwrap();
    assert!(psd.color_mode_data().is_empty());
}

#[test]
fn indexed_palette_bytes_are_available() {
    let palette: Vec<u8> = (0..768).map(|i| (i % 251) as u8).collect();
    let bytes = DocBuilder::new(4, 4, 1, 8, 2)
        .color_mode_data(&palette)
        .build();
    let psd = Psd::from_bytes(&bytes).unwrap();

    assert_eq!(psd.color_mode(), ColorMode::Indexed);
    assert_eq!(psd.color_mode_data(), &palette[..]);
}

#[test]
fn from_reader_matches_from_bytes() {
    let bytes = DocBuilder::new(512, 256, 3, 8, 3).build();
    let psd = Psd::from_reader(&bytes[..]).unwrap();
    assert_eq!(psd.width(), 512);
    assert_eq!(psd.height(), 256);
}
