//! The color mode data section: a length-prefixed opaque blob.
//!
//! Indexed documents keep their 768-byte RGB palette here and duotone
//! documents their duotone parameters; every other mode usually leaves it
//! empty. The bytes are preserved without interpretation.

use crate::sections::{CursorError, PsdCursor};

/// Number of bytes in an indexed-color palette: 256 entries in three planar
/// runs (256 reds, 256 greens, 256 blues).
pub(crate) const PALETTE_LEN: usize = 768;

#[derive(Debug)]
pub(crate) struct ColorModeDataSection {
    pub(crate) data: Vec<u8>,
}

impl ColorModeDataSection {
    /// Read the section at the cursor's current position.
    pub fn from_cursor(cursor: &mut PsdCursor<'_>) -> Result<Self, CursorError> {
        let length = cursor.read_u32()?;
        let data = cursor.read(u64::from(length))?.to_vec();
        Ok(ColorModeDataSection { data })
    }

    /// The indexed-color palette, when one is present.
    pub fn rgb_palette(&self) -> Option<&[u8]> {
        if self.data.len() >= PALETTE_LEN {
            Some(&self.data[..PALETTE_LEN])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_section_is_empty_not_an_error() {
        let bytes = 0u32.to_be_bytes();
        let mut cursor = PsdCursor::new(&bytes);
        let section = ColorModeDataSection::from_cursor(&mut cursor).unwrap();

        assert!(section.data.is_empty());
        assert!(section.rgb_palette().is_none());
    }

    #[test]
    fn palette_bytes_are_preserved() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&(PALETTE_LEN as u32).to_be_bytes());
        bytes.extend((0..PALETTE_LEN).map(|i| (i % 256) as u8));

        let mut cursor = PsdCursor::new(&bytes);
        let section = ColorModeDataSection::from_cursor(&mut cursor).unwrap();

        let palette = section.rgb_palette().unwrap();
        assert_eq!(palette.len(), PALETTE_LEN);
        assert_eq!(palette[0], 0);
        assert_eq!(palette[255], 255);
    }
}
