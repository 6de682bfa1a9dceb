//! The image resources section: a sequence of id-tagged metadata blocks.
//!
//! Resources carry print settings, thumbnails, ICC profiles, XMP and the
//! like. Unknown ids are preserved verbatim so callers can interpret the
//! ones they care about; this parser is only responsible for the framing.

use crate::sections::{CursorError, PsdCursor, SIGNATURE_EIGHT_B64, SIGNATURE_EIGHT_BIM};

/// One resource block.
///
/// | Length   | Description                                          |
/// |----------|------------------------------------------------------|
/// | 4        | Signature: '8BIM' (or '8B64')                        |
/// | 2        | Resource ID                                          |
/// | Variable | Pascal string name, padded to even size including the length byte |
/// | 4        | Size of the resource data that follows               |
/// | Variable | Resource data, padded to even size                   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResource {
    pub(crate) id: u16,
    pub(crate) name: Vec<u8>,
    pub(crate) data: Vec<u8>,
}

impl ImageResource {
    /// The resource id, e.g. 1005 for resolution info or 1039 for an ICC
    /// profile.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The Pascal-string name bytes. Usually empty.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// The raw resource payload, uninterpreted.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug)]
pub(crate) struct ImageResourcesSection {
    pub(crate) resources: Vec<ImageResource>,
}

impl ImageResourcesSection {
    /// Read the section at the cursor's current position.
    ///
    /// Image resources are optional metadata: an unknown block signature or a
    /// truncated block stops the walk and re-aligns the cursor to the section
    /// end instead of failing the document.
    pub fn from_cursor(cursor: &mut PsdCursor<'_>) -> Result<Self, CursorError> {
        let section_length = cursor.read_u32()?;
        let section_end = cursor.position() + u64::from(section_length);

        let mut resources = vec![];

        while cursor.position() < section_end {
            match Self::read_resource_block(cursor) {
                Ok(Some(resource)) => resources.push(resource),
                Ok(None) => {
                    // Unknown signature. Some writers pad or append
                    // non-standard data here; stop and re-align.
                    cursor.seek(section_end)?;
                    break;
                }
                Err(err) => {
                    log::warn!("abandoning image resources mid-section: {err}");
                    cursor.seek(section_end)?;
                    break;
                }
            }
        }

        // The walk should land exactly on the section end; re-align if a
        // block's padding left us short.
        if cursor.position() != section_end {
            cursor.seek(section_end)?;
        }

        Ok(ImageResourcesSection { resources })
    }

    /// Read one block. `Ok(None)` means the bytes at the cursor do not start
    /// with a resource signature.
    fn read_resource_block(
        cursor: &mut PsdCursor<'_>,
    ) -> Result<Option<ImageResource>, CursorError> {
        let signature = cursor.read_4()?;
        if signature != SIGNATURE_EIGHT_BIM && signature != SIGNATURE_EIGHT_B64 {
            return Ok(None);
        }

        let id = cursor.read_u16()?;

        let name_len = cursor.read_u8()?;
        let name = cursor.read(u64::from(name_len))?.to_vec();
        // Name is padded to even length including the length byte
        if (1 + u64::from(name_len)) % 2 != 0 {
            cursor.skip(1)?;
        }

        let data_len = cursor.read_u32()?;
        let data = cursor.read(u64::from(data_len))?.to_vec();
        // Payload is padded to even length
        if data_len % 2 != 0 {
            cursor.skip(1)?;
        }

        Ok(Some(ImageResource { id, name, data }))
    }
}
