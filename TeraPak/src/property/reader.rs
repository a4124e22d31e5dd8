//! Property parsing

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::warn;

use crate::error::{Error, Result};
use crate::package::{read_fstring, NameTable, NONE_NAME};

use super::{
    ByteValue, PropertyRecord, PropertyValue, ARRAY_PROPERTY, BOOL_PROPERTY, BYTE_PROPERTY,
    CLASS_PROPERTY, COMPONENT_PROPERTY, FLOAT_PROPERTY, INTERFACE_PROPERTY, INT_PROPERTY,
    NAME_PROPERTY, OBJECT_PROPERTY, STRUCT_PROPERTY, STR_PROPERTY,
};

/// Read properties up to and including the `None` terminator.
///
/// # Errors
/// Returns an error if a tag or value is malformed.
pub fn read_property_list(cursor: &mut Cursor<&[u8]>, names: &NameTable) -> Result<Vec<PropertyRecord>> {
    let mut properties = Vec::new();
    while let Some(property) = read_property(cursor, names)? {
        properties.push(property);
    }
    Ok(properties)
}

/// Read one property, or `None` at the list terminator.
///
/// Unknown types are logged and kept as [`PropertyValue::Unsupported`].
///
/// # Errors
/// Returns [`Error::InvalidProperty`] when the declared size does not fit the
/// type or the remaining data, or a name error for bad references.
pub fn read_property(cursor: &mut Cursor<&[u8]>, names: &NameTable) -> Result<Option<PropertyRecord>> {
    let name = names.read_name(cursor)?;
    if name == NONE_NAME {
        return Ok(None);
    }

    let type_tag = names.read_name(cursor)?;
    let declared_size = cursor.read_i32::<LittleEndian>()?;
    let array_index = cursor.read_i32::<LittleEndian>()?;

    let invalid = |message: String| Error::InvalidProperty {
        name: name.clone(),
        message,
    };

    let size = usize::try_from(declared_size)
        .map_err(|_| invalid(format!("negative size {declared_size}")))?;
    let expect_size = |wanted: usize| {
        if size == wanted {
            Ok(())
        } else {
            Err(invalid(format!("{type_tag} with size {size}, expected {wanted}")))
        }
    };

    let value = match type_tag.as_str() {
        INT_PROPERTY => {
            expect_size(4)?;
            PropertyValue::Int(cursor.read_i32::<LittleEndian>()?)
        }
        FLOAT_PROPERTY => {
            expect_size(4)?;
            PropertyValue::Float(cursor.read_f32::<LittleEndian>()?)
        }
        BOOL_PROPERTY => {
            expect_size(0)?;
            PropertyValue::Bool(cursor.read_u32::<LittleEndian>()? != 0)
        }
        NAME_PROPERTY => {
            expect_size(8)?;
            PropertyValue::Name(names.read_name(cursor)?)
        }
        STR_PROPERTY => {
            let raw = read_value_bytes(cursor, size).map_err(&invalid)?;
            let mut inner = Cursor::new(raw.as_slice());
            let value = read_fstring(&mut inner)?;
            if inner.position() as usize != size {
                return Err(invalid(format!("string used {} of {size} bytes", inner.position())));
            }
            PropertyValue::Str(value)
        }
        BYTE_PROPERTY => {
            let enum_name = names.read_name(cursor)?;
            let value = match size {
                8 => ByteValue::Name(names.read_name(cursor)?),
                1 => ByteValue::Raw(cursor.read_u8()?),
                _ => return Err(invalid(format!("{type_tag} with size {size}"))),
            };
            PropertyValue::Byte { enum_name, value }
        }
        OBJECT_PROPERTY | CLASS_PROPERTY | COMPONENT_PROPERTY | INTERFACE_PROPERTY => {
            expect_size(4)?;
            PropertyValue::Object(cursor.read_i32::<LittleEndian>()?)
        }
        STRUCT_PROPERTY => {
            let struct_name = names.read_name(cursor)?;
            let data = read_value_bytes(cursor, size).map_err(&invalid)?;
            PropertyValue::Struct { struct_name, data }
        }
        ARRAY_PROPERTY => {
            if size < 4 {
                return Err(invalid(format!("array with size {size}")));
            }
            let count = cursor.read_i32::<LittleEndian>()?;
            let data = read_value_bytes(cursor, size - 4).map_err(&invalid)?;
            PropertyValue::Array { count, data }
        }
        other => {
            warn!("Unknown property type '{other}' on '{name}', keeping {size} raw bytes");
            PropertyValue::Unsupported(read_value_bytes(cursor, size).map_err(&invalid)?)
        }
    };

    Ok(Some(PropertyRecord {
        name,
        type_tag,
        array_index,
        declared_size,
        value,
    }))
}

/// Read `size` bytes, failing with a message when fewer remain
fn read_value_bytes(cursor: &mut Cursor<&[u8]>, size: usize) -> std::result::Result<Vec<u8>, String> {
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if size > remaining {
        return Err(format!("size {size} exceeds the {remaining} remaining bytes"));
    }
    let mut data = vec![0u8; size];
    cursor
        .read_exact(&mut data)
        .map_err(|e| e.to_string())?;
    Ok(data)
}
