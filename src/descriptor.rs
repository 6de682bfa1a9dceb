//! Recursive parser for Photoshop's action-descriptor value tree.
//!
//! Action descriptors are the self-describing key/value structures Photoshop
//! uses for text layers, effects, and other metadata. The on-wire format is a
//! class id, a property count, and then properties, each a key plus a 4-byte
//! type tag plus a tag-dependent payload. Nested descriptors and lists make
//! the format recursive.
//!
//! Two writer quirks shape the parser:
//! - descriptors (and `Obj ` values) sometimes carry a leading Unicode name
//!   and sometimes do not, so both layouts are tried with a rewind between
//!   them;
//! - unknown type tags are read as a 4-byte length plus opaque bytes and kept
//!   verbatim for forward compatibility.

use serde::Serialize;
use thiserror::Error;

use crate::sections::{CursorError, PsdCursor};
use crate::unicode::utf16be_to_utf8;

/// 'long' = 32-bit integer
const TAG_INTEGER: [u8; 4] = *b"long";
/// 'doub' = double
const TAG_DOUBLE: [u8; 4] = *b"doub";
/// 'UntF' = unit float
const TAG_UNIT_FLOAT: [u8; 4] = *b"UntF";
/// 'UntV' = unit value, same layout as 'UntF'
const TAG_UNIT_VALUE: [u8; 4] = *b"UntV";
/// 'bool' = boolean
const TAG_BOOLEAN: [u8; 4] = *b"bool";
/// 'TEXT' = Unicode string
const TAG_STRING: [u8; 4] = *b"TEXT";
/// 'enum' = enumerated
const TAG_ENUMERATED: [u8; 4] = *b"enum";
/// 'type' = class reference
const TAG_CLASS: [u8; 4] = *b"type";
/// 'raws' = raw bytes
const TAG_RAW_DATA: [u8; 4] = *b"raws";
/// 'VlLs' = ordered list
const TAG_LIST: [u8; 4] = *b"VlLs";
/// 'Obj ' = nested descriptor
const TAG_OBJECT: [u8; 4] = *b"Obj ";
/// 'ref ' = reference
const TAG_REFERENCE: [u8; 4] = *b"ref ";

/// Reference form tags
const FORM_PROPERTY: [u8; 4] = *b"prop";
const FORM_CLASS: [u8; 4] = *b"Clss";
const FORM_ENUMERATED: [u8; 4] = *b"Enmr";
const FORM_IDENTIFIER: [u8; 4] = *b"Idnt";
const FORM_INDEX: [u8; 4] = *b"indx";
const FORM_NAME: [u8; 4] = *b"name";

/// Counts in descriptor structures are sanity-capped so corrupt files cannot
/// request absurd allocations.
const MAX_COUNT: u32 = 1_000_000;
/// Unknown-tag payloads larger than this are treated as corruption.
const MAX_UNKNOWN_LEN: u32 = 100 * 1024 * 1024;

/// An error while parsing an action descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The underlying byte stream ended or misbehaved.
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// A structural sanity check failed.
    #[error("descriptor structure is corrupt: {0}")]
    Corrupt(&'static str),
    /// A reference item uses a form this parser does not recognize.
    #[error("unsupported descriptor reference form {form:?}")]
    UnsupportedReferenceForm {
        /// The unrecognized 4-byte form tag, lossily decoded
        form: String,
    },
}

/// A parsed action descriptor: a class id and an ordered property list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    /// Class identifier (an OSType or a longer ASCII name)
    pub class_id: String,
    /// Properties in on-wire order
    pub properties: Vec<DescriptorProperty>,
}

/// One key/value pair inside a [`Descriptor`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorProperty {
    /// Property key (an OSType such as `"Txt "` or a longer ASCII name)
    pub key: String,
    /// The property's value
    pub value: DescriptorValue,
}

/// A single value in the descriptor tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DescriptorValue {
    /// 'long'
    Integer(i32),
    /// 'doub'
    Double(f64),
    /// 'bool'
    Boolean(bool),
    /// 'TEXT', decoded from UTF-16BE
    String(String),
    /// 'enum', stored as `"type:value"`
    Enumerated(String),
    /// 'type', a class reference
    Class(String),
    /// 'UntF' / 'UntV', a unit tag plus a double
    UnitDouble {
        /// Unit tag such as `"#Pxl"` or `"#Prc"`
        unit: String,
        /// The value in that unit
        value: f64,
    },
    /// 'raws'
    RawData(Vec<u8>),
    /// 'Obj ', a class id plus a nested descriptor
    Object {
        /// The value-level class id preceding the descriptor
        class_id: String,
        /// The nested descriptor
        descriptor: Box<Descriptor>,
    },
    /// 'VlLs'
    List(Vec<DescriptorValue>),
    /// 'ref '
    Reference(Vec<ReferenceItem>),
    /// Any unrecognized tag: a 4-byte length plus opaque payload, preserved
    /// verbatim. Forward compatibility depends on this arm.
    Unknown {
        /// The unrecognized type tag, lossily decoded
        tag: String,
        /// The opaque payload
        data: Vec<u8>,
    },
}

/// One item of a 'ref ' reference value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReferenceItem {
    /// 'prop': a class id and a key id
    Property {
        /// Owning class
        class_id: String,
        /// Referenced property key
        key_id: String,
    },
    /// 'Clss': a bare class id
    Class(String),
    /// 'Enmr': class + enum type + enum value
    Enumerated {
        /// Owning class
        class_id: String,
        /// Enumeration type
        type_id: String,
        /// Enumeration value
        value: String,
    },
    /// 'Idnt': numeric identifier
    Identifier(u32),
    /// 'indx': numeric index
    Index(u32),
    /// 'name': a Unicode name
    Name(String),
}

impl Descriptor {
    /// Parse a descriptor at the cursor's current position.
    ///
    /// Tries the named layout (Unicode name, class id, count) first; if that
    /// fails, rewinds and retries without the name.
    pub(crate) fn from_cursor(cursor: &mut PsdCursor<'_>) -> Result<Descriptor, DescriptorError> {
        let start = cursor.position();

        let class_id = match skip_unicode_string(cursor).and_then(|_| read_class_id(cursor)) {
            Ok(class_id) => class_id,
            Err(_) => {
                cursor.seek(start)?;
                read_class_id(cursor)?
            }
        };

        let count = cursor.read_u32()?;
        if count > MAX_COUNT {
            return Err(DescriptorError::Corrupt("property count exceeds sanity cap"));
        }

        let mut properties = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = read_class_id(cursor)?;
            let tag = cursor.read_4()?;
            let value = read_value(cursor, tag)?;
            properties.push(DescriptorProperty { key, value });
        }

        Ok(Descriptor {
            class_id,
            properties,
        })
    }
}

/// Read a class-id token: a u32 length, then either a 4-byte OSType (length
/// zero) or that many ASCII bytes.
fn read_class_id(cursor: &mut PsdCursor<'_>) -> Result<String, DescriptorError> {
    let length = cursor.read_u32()?;
    let bytes = if length == 0 {
        cursor.read(4)?
    } else {
        cursor.read(u64::from(length))?
    };
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Read a 'TEXT' value: u32 code-unit count + UTF-16BE code units.
fn read_unicode_string(cursor: &mut PsdCursor<'_>) -> Result<String, DescriptorError> {
    let char_count = cursor.read_u32()?;
    let bytes = cursor.read(u64::from(char_count) * 2)?;
    Ok(utf16be_to_utf8(bytes))
}

/// Skip a Unicode string without decoding it, used when probing the
/// with-name descriptor layout.
fn skip_unicode_string(cursor: &mut PsdCursor<'_>) -> Result<(), DescriptorError> {
    let char_count = cursor.read_u32()?;
    if char_count > MAX_COUNT {
        return Err(DescriptorError::Corrupt("unicode string length exceeds sanity cap"));
    }
    cursor.skip(u64::from(char_count) * 2)?;
    Ok(())
}

fn read_value(
    cursor: &mut PsdCursor<'_>,
    tag: [u8; 4],
) -> Result<DescriptorValue, DescriptorError> {
    let value = match tag {
        TAG_INTEGER => DescriptorValue::Integer(cursor.read_i32()?),
        TAG_DOUBLE => DescriptorValue::Double(cursor.read_f64()?),
        TAG_BOOLEAN => DescriptorValue::Boolean(cursor.read_u8()? > 0),
        TAG_STRING => DescriptorValue::String(read_unicode_string(cursor)?),
        TAG_UNIT_FLOAT | TAG_UNIT_VALUE => {
            let unit = cursor.read_4()?;
            DescriptorValue::UnitDouble {
                unit: String::from_utf8_lossy(&unit).into_owned(),
                value: cursor.read_f64()?,
            }
        }
        TAG_ENUMERATED => {
            let enum_type = read_class_id(cursor)?;
            let enum_value = read_class_id(cursor)?;
            DescriptorValue::Enumerated(format!("{enum_type}:{enum_value}"))
        }
        TAG_CLASS => DescriptorValue::Class(read_class_id(cursor)?),
        TAG_RAW_DATA => {
            let length = cursor.read_u32()?;
            DescriptorValue::RawData(cursor.read(u64::from(length))?.to_vec())
        }
        TAG_LIST => {
            let count = cursor.read_u32()?;
            if count > MAX_COUNT {
                return Err(DescriptorError::Corrupt("list count exceeds sanity cap"));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let item_tag = cursor.read_4()?;
                items.push(read_value(cursor, item_tag)?);
            }
            DescriptorValue::List(items)
        }
        TAG_OBJECT => read_object(cursor)?,
        TAG_REFERENCE => read_reference(cursor)?,
        _ => {
            // Unknown tag: length-prefixed opaque payload
            let length = cursor.read_u32()?;
            if length > MAX_UNKNOWN_LEN {
                return Err(DescriptorError::Corrupt("unknown-tag payload exceeds sanity cap"));
            }
            DescriptorValue::Unknown {
                tag: String::from_utf8_lossy(&tag).into_owned(),
                data: cursor.read(u64::from(length))?.to_vec(),
            }
        }
    };

    Ok(value)
}

/// Read an 'Obj ' value.
///
/// Object values vary in the wild between two layouts:
/// (a) Unicode name + class id + descriptor, (b) class id + descriptor.
/// Layout (a) is tried first; on failure the cursor rewinds and (b) is
/// parsed.
fn read_object(cursor: &mut PsdCursor<'_>) -> Result<DescriptorValue, DescriptorError> {
    let start = cursor.position();

    let named = skip_unicode_string(cursor)
        .and_then(|_| read_class_id(cursor))
        .and_then(|class_id| Descriptor::from_cursor(cursor).map(|d| (class_id, d)));

    let (class_id, descriptor) = match named {
        Ok(parsed) => parsed,
        Err(_) => {
            cursor.seek(start)?;
            let class_id = read_class_id(cursor)?;
            let descriptor = Descriptor::from_cursor(cursor)?;
            (class_id, descriptor)
        }
    };

    Ok(DescriptorValue::Object {
        class_id,
        descriptor: Box::new(descriptor),
    })
}

fn read_reference(cursor: &mut PsdCursor<'_>) -> Result<DescriptorValue, DescriptorError> {
    let count = cursor.read_u32()?;
    if count > MAX_COUNT {
        return Err(DescriptorError::Corrupt("reference count exceeds sanity cap"));
    }

    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let form = cursor.read_4()?;
        let item = match form {
            FORM_PROPERTY => ReferenceItem::Property {
                class_id: read_class_id(cursor)?,
                key_id: read_class_id(cursor)?,
            },
            FORM_CLASS => ReferenceItem::Class(read_class_id(cursor)?),
            FORM_ENUMERATED => ReferenceItem::Enumerated {
                class_id: read_class_id(cursor)?,
                type_id: read_class_id(cursor)?,
                value: read_class_id(cursor)?,
            },
            FORM_IDENTIFIER => ReferenceItem::Identifier(cursor.read_u32()?),
            FORM_INDEX => ReferenceItem::Index(cursor.read_u32()?),
            FORM_NAME => ReferenceItem::Name(read_unicode_string(cursor)?),
            other => {
                return Err(DescriptorError::UnsupportedReferenceForm {
                    form: String::from_utf8_lossy(&other).into_owned(),
                })
            }
        };
        items.push(item);
    }

    Ok(DescriptorValue::Reference(items))
}
