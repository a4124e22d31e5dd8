//! Name table and length-prefixed strings
//!
//! Names are referenced by `(index, number)` pairs. A non-zero number adds a
//! `_{number - 1}` suffix, so `("Texture", 3)` reads as `Texture_2`.

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Longest string accepted from a file, in characters
const MAX_STRING_LEN: i32 = 1 << 20;

/// Terminator name closing every property list
pub const NONE_NAME: &str = "None";

/// Read a length-prefixed string.
///
/// A positive length is a count of single-byte characters, a negative one a
/// count of UTF-16 units. Both include the trailing null.
///
/// # Errors
/// Returns an error on a length beyond the sanity limit or a short read.
pub fn read_fstring<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_i32::<LittleEndian>()?;
    if len == 0 {
        return Ok(String::new());
    }
    if len.unsigned_abs() > MAX_STRING_LEN.unsigned_abs() {
        return Err(Error::InvalidSize {
            field: "string",
            value: i64::from(len),
        });
    }

    if len > 0 {
        let mut bytes = vec![0u8; len as usize];
        reader.read_exact(&mut bytes)?;
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    } else {
        let count = len.unsigned_abs() as usize;
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(reader.read_u16::<LittleEndian>()?);
        }
        if units.last() == Some(&0) {
            units.pop();
        }
        Ok(String::from_utf16_lossy(&units))
    }
}

/// Write a length-prefixed string, single-byte when every char fits.
///
/// # Errors
/// Returns an error if writing fails.
pub fn write_fstring<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    if value.is_empty() {
        writer.write_i32::<LittleEndian>(0)?;
        return Ok(());
    }

    if is_single_byte(value) {
        writer.write_i32::<LittleEndian>(value.chars().count() as i32 + 1)?;
        for c in value.chars() {
            writer.write_u8(c as u8)?;
        }
        writer.write_u8(0)?;
    } else {
        let units: Vec<u16> = value.encode_utf16().collect();
        writer.write_i32::<LittleEndian>(-(units.len() as i32 + 1))?;
        for unit in units {
            writer.write_u16::<LittleEndian>(unit)?;
        }
        writer.write_u16::<LittleEndian>(0)?;
    }
    Ok(())
}

/// Serialized size of `value` as written by [`write_fstring`]
#[must_use]
pub fn fstring_size(value: &str) -> usize {
    if value.is_empty() {
        4
    } else if is_single_byte(value) {
        4 + value.chars().count() + 1
    } else {
        4 + (value.encode_utf16().count() + 1) * 2
    }
}

fn is_single_byte(value: &str) -> bool {
    value.chars().all(|c| (c as u32) < 0x100)
}

/// One entry of the name table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub name: String,
    pub flags: u64,
}

/// Package name table with reverse lookup
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<NameEntry>,
    lookup: HashMap<String, usize>,
}

impl NameTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries in file order
    #[must_use]
    pub fn from_entries(entries: Vec<NameEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.push(entry);
        }
        table
    }

    fn push(&mut self, entry: NameEntry) {
        // First occurrence wins for lookups
        self.lookup
            .entry(entry.name.clone())
            .or_insert(self.entries.len());
        self.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[NameEntry] {
        &self.entries
    }

    /// Name for a raw `(index, number)` reference
    ///
    /// # Errors
    /// Returns [`Error::NameIndexOutOfRange`] for a bad index.
    pub fn resolve(&self, index: i32, number: i32) -> Result<String> {
        let entry = usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .ok_or(Error::NameIndexOutOfRange {
                index,
                len: self.entries.len(),
            })?;

        if number == 0 {
            Ok(entry.name.clone())
        } else {
            Ok(format!("{}_{}", entry.name, number - 1))
        }
    }

    /// Reference for a name, splitting a numeric suffix when needed
    ///
    /// # Errors
    /// Returns [`Error::NameNotInTable`] when neither the full name nor its
    /// base is present.
    pub fn find(&self, name: &str) -> Result<(i32, i32)> {
        if let Some(&index) = self.lookup.get(name) {
            return Ok((index as i32, 0));
        }
        if let Some((base, number)) = split_number(name)
            && let Some(&index) = self.lookup.get(base)
        {
            return Ok((index as i32, number + 1));
        }
        Err(Error::NameNotInTable(name.to_string()))
    }

    /// Make sure `name` can be referenced, adding it if missing
    pub fn intern(&mut self, name: &str) {
        if self.find(name).is_ok() {
            return;
        }
        let base = split_number(name).map_or(name, |(base, _)| base);
        self.push(NameEntry {
            name: base.to_string(),
            flags: 0,
        });
    }

    /// Read a name reference from a stream
    ///
    /// # Errors
    /// Returns an error on a short read or bad index.
    pub fn read_name<R: Read>(&self, reader: &mut R) -> Result<String> {
        let index = reader.read_i32::<LittleEndian>()?;
        let number = reader.read_i32::<LittleEndian>()?;
        self.resolve(index, number)
    }

    /// Write a name reference to a stream
    ///
    /// # Errors
    /// Returns an error if the name is not in the table or writing fails.
    pub fn write_name<W: Write>(&self, writer: &mut W, name: &str) -> Result<()> {
        let (index, number) = self.find(name)?;
        writer.write_i32::<LittleEndian>(index)?;
        writer.write_i32::<LittleEndian>(number)?;
        Ok(())
    }
}

/// Split `Name_12` into `("Name", 12)`; leading zeros are not a number suffix
fn split_number(name: &str) -> Option<(&str, i32)> {
    let (base, digits) = name.rsplit_once('_')?;
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    let number = digits.parse::<i32>().ok()?;
    (number < i32::MAX).then_some((base, number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table(names: &[&str]) -> NameTable {
        NameTable::from_entries(
            names
                .iter()
                .map(|n| NameEntry {
                    name: (*n).to_string(),
                    flags: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_fstring_ascii_and_unicode() {
        for value in ["", "Texture2D", "C:\\art\\rock.tga", "Mönch", "草地"] {
            let mut buf = Vec::new();
            write_fstring(&mut buf, value).unwrap();
            assert_eq!(buf.len(), fstring_size(value), "size of {value:?}");
            let read = read_fstring(&mut Cursor::new(buf)).unwrap();
            assert_eq!(read, value);
        }
    }

    #[test]
    fn test_fstring_negative_length_is_utf16() {
        let mut buf = Vec::new();
        write_fstring(&mut buf, "草").unwrap();
        assert_eq!(&buf[..4], &(-2i32).to_le_bytes());
    }

    #[test]
    fn test_fstring_rejects_huge_length() {
        let buf = i32::MAX.to_le_bytes();
        assert!(matches!(
            read_fstring(&mut Cursor::new(buf)),
            Err(Error::InvalidSize { field: "string", .. })
        ));
    }

    #[test]
    fn test_numbered_names() {
        let names = table(&["None", "Texture"]);
        assert_eq!(names.resolve(1, 0).unwrap(), "Texture");
        assert_eq!(names.resolve(1, 3).unwrap(), "Texture_2");
        assert_eq!(names.find("Texture_2").unwrap(), (1, 3));
        assert_eq!(names.find("Texture").unwrap(), (1, 0));
        assert!(matches!(names.find("Texture_02"), Err(Error::NameNotInTable(_))));
        assert!(matches!(
            names.resolve(7, 0),
            Err(Error::NameIndexOutOfRange { index: 7, len: 2 })
        ));
    }

    #[test]
    fn test_intern_adds_base_name() {
        let mut names = table(&["None"]);
        names.intern("Rock_4");
        assert_eq!(names.len(), 2);
        assert_eq!(names.find("Rock_4").unwrap(), (1, 5));
        names.intern("Rock");
        assert_eq!(names.len(), 2);
    }
}
