//! Property serialization and size accounting

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::warn;

use crate::error::Result;
use crate::package::{fstring_size, write_fstring, NameTable, NONE_NAME};

use super::{ByteValue, PropertyRecord, PropertyValue};

/// Size of the value as the tag declares it.
///
/// Enum and struct names written after the tag are not counted; a bool's
/// value is stored outside the declared size.
#[must_use]
pub fn recalculate_size(record: &PropertyRecord) -> i32 {
    let size = match &record.value {
        PropertyValue::Int(_) | PropertyValue::Float(_) | PropertyValue::Object(_) => 4,
        PropertyValue::Bool(_) => 0,
        PropertyValue::Name(_) => 8,
        PropertyValue::Str(s) => fstring_size(s),
        PropertyValue::Byte { value, .. } => match value {
            ByteValue::Name(_) => 8,
            ByteValue::Raw(_) => 1,
        },
        PropertyValue::Struct { data, .. } => data.len(),
        PropertyValue::Array { data, .. } => 4 + data.len(),
        PropertyValue::Unsupported(raw) => raw.len(),
    };
    size as i32
}

/// Write one property with its recomputed size.
///
/// # Errors
/// Returns an error if a referenced name is not in `names` or writing fails.
pub fn write_property<W: Write>(writer: &mut W, record: &PropertyRecord, names: &NameTable) -> Result<()> {
    let size = recalculate_size(record);
    if size != record.declared_size {
        warn!(
            "Property '{}' declared {} bytes, writing {size}",
            record.name, record.declared_size
        );
    }

    names.write_name(writer, &record.name)?;
    names.write_name(writer, &record.type_tag)?;
    writer.write_i32::<LittleEndian>(size)?;
    writer.write_i32::<LittleEndian>(record.array_index)?;

    match &record.value {
        PropertyValue::Int(v) | PropertyValue::Object(v) => writer.write_i32::<LittleEndian>(*v)?,
        PropertyValue::Float(v) => writer.write_f32::<LittleEndian>(*v)?,
        PropertyValue::Bool(v) => writer.write_u32::<LittleEndian>(u32::from(*v))?,
        PropertyValue::Name(n) => names.write_name(writer, n)?,
        PropertyValue::Str(s) => write_fstring(writer, s)?,
        PropertyValue::Byte { enum_name, value } => {
            names.write_name(writer, enum_name)?;
            match value {
                ByteValue::Name(n) => names.write_name(writer, n)?,
                ByteValue::Raw(b) => writer.write_u8(*b)?,
            }
        }
        PropertyValue::Struct { struct_name, data } => {
            names.write_name(writer, struct_name)?;
            writer.write_all(data)?;
        }
        PropertyValue::Array { count, data } => {
            writer.write_i32::<LittleEndian>(*count)?;
            writer.write_all(data)?;
        }
        PropertyValue::Unsupported(raw) => writer.write_all(raw)?,
    }
    Ok(())
}

/// Write a property list followed by the `None` terminator.
///
/// # Errors
/// Returns an error if any property fails to write.
pub fn write_property_list<W: Write>(writer: &mut W, properties: &[PropertyRecord], names: &NameTable) -> Result<()> {
    for property in properties {
        write_property(writer, property, names)?;
    }
    names.write_name(writer, NONE_NAME)
}
