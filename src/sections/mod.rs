use thiserror::Error;

pub(crate) mod color_mode_data_section;
pub(crate) mod file_header_section;
pub(crate) mod image_data_section;
pub(crate) mod image_resources_section;
pub(crate) mod layer_and_mask_information_section;

/// One of the two signatures used by resource blocks and tagged blocks.
pub(crate) const SIGNATURE_EIGHT_BIM: [u8; 4] = *b"8BIM";
/// One of the two signatures used by resource blocks and tagged blocks.
pub(crate) const SIGNATURE_EIGHT_B64: [u8; 4] = *b"8B64";

/// An error while reading bytes from a [`PsdCursor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// Ran out of bytes mid-read.
    #[error(
        "unexpected end of stream: needed {needed} more bytes at offset {offset}, \
         but only {available} remain"
    )]
    UnexpectedEof {
        /// Offset the read started at
        offset: u64,
        /// Bytes the read required
        needed: u64,
        /// Bytes left in the stream
        available: u64,
    },
    /// Seek target lies outside the stream.
    #[error("cannot seek to offset {offset}, the stream is {len} bytes long")]
    SeekOutOfRange {
        /// Requested absolute offset
        offset: u64,
        /// Stream length
        len: u64,
    },
    /// A 64-bit length field holds a value this platform cannot address.
    #[error("length field value {value} does not fit in usize")]
    LengthOverflow {
        /// The out-of-range value
        value: u64,
    },
}

/// A cursor over the bytes of a PSD file.
///
/// Provides the primitive reads the section parsers are written in terms of:
/// big-endian integers, absolute seeks, and the 32-bit/64-bit length field
/// whose width depends on whether the document is in large (PSB) format.
///
/// All reads are bounds-checked; running off the end is an error, never a
/// panic.
pub(crate) struct PsdCursor<'a> {
    bytes: &'a [u8],
    position: u64,
}

impl<'a> PsdCursor<'a> {
    /// Create a new PsdCursor at offset zero.
    pub fn new(bytes: &'a [u8]) -> PsdCursor<'a> {
        PsdCursor { bytes, position: 0 }
    }

    /// The current absolute offset.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total length of the underlying byte slice.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Bytes left between the current position and the end.
    pub fn remaining(&self) -> u64 {
        self.len() - self.position
    }

    /// Move to an absolute offset. Seeking to the end is allowed, past it is
    /// not.
    pub fn seek(&mut self, offset: u64) -> Result<(), CursorError> {
        if offset > self.len() {
            return Err(CursorError::SeekOutOfRange {
                offset,
                len: self.len(),
            });
        }
        self.position = offset;
        Ok(())
    }

    /// Advance the position by `count` bytes without looking at them.
    pub fn skip(&mut self, count: u64) -> Result<(), CursorError> {
        self.read(count)?;
        Ok(())
    }

    /// Read exactly `count` bytes, advancing the position.
    pub fn read(&mut self, count: u64) -> Result<&'a [u8], CursorError> {
        if count > self.remaining() {
            return Err(CursorError::UnexpectedEof {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        let start = self.position as usize;
        let end = start + count as usize;
        self.position = end as u64;
        Ok(&self.bytes[start..end])
    }

    /// Read the next four bytes as an array, handy for signature and tag
    /// comparison.
    pub fn read_4(&mut self) -> Result<[u8; 4], CursorError> {
        let mut four = [0; 4];
        four.copy_from_slice(self.read(4)?);
        Ok(four)
    }

    /// Look at the next four bytes without advancing.
    pub fn peek_4(&self) -> Result<[u8; 4], CursorError> {
        if self.remaining() < 4 {
            return Err(CursorError::UnexpectedEof {
                offset: self.position,
                needed: 4,
                available: self.remaining(),
            });
        }
        let start = self.position as usize;
        let mut four = [0; 4];
        four.copy_from_slice(&self.bytes[start..start + 4]);
        Ok(four)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.read(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CursorError> {
        Ok(self.read(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        let bytes = self.read(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, CursorError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        let bytes = self.read(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, CursorError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        let bytes = self.read(8)?;
        let mut eight = [0; 8];
        eight.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(eight))
    }

    /// Read a big-endian IEEE 754 double.
    pub fn read_f64(&mut self) -> Result<f64, CursorError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a length field whose width depends on the document format.
    ///
    /// Standard documents store lengths as 4 bytes, large (PSB) documents as
    /// 8 bytes. The value is also checked against the platform's size type so
    /// later allocations cannot silently truncate it.
    pub fn read_length(&mut self, is_large: bool) -> Result<u64, CursorError> {
        let value = if is_large {
            self.read_u64()?
        } else {
            u64::from(self.read_u32()?)
        };

        if usize::try_from(value).is_err() {
            return Err(CursorError::LengthOverflow { value });
        }

        Ok(value)
    }
}
