//! Tagged object properties
//!
//! Every export starts with a list of properties closed by the `None` name.
//! Each property is a tag (name, type, size, array index) followed by a value
//! whose layout depends on the type.

mod reader;
mod writer;

pub use reader::{read_property, read_property_list};
pub use writer::{recalculate_size, write_property, write_property_list};

pub const INT_PROPERTY: &str = "IntProperty";
pub const FLOAT_PROPERTY: &str = "FloatProperty";
pub const BOOL_PROPERTY: &str = "BoolProperty";
pub const NAME_PROPERTY: &str = "NameProperty";
pub const STR_PROPERTY: &str = "StrProperty";
pub const BYTE_PROPERTY: &str = "ByteProperty";
pub const OBJECT_PROPERTY: &str = "ObjectProperty";
pub const CLASS_PROPERTY: &str = "ClassProperty";
pub const COMPONENT_PROPERTY: &str = "ComponentProperty";
pub const INTERFACE_PROPERTY: &str = "InterfaceProperty";
pub const STRUCT_PROPERTY: &str = "StructProperty";
pub const ARRAY_PROPERTY: &str = "ArrayProperty";

/// Value of a `ByteProperty`
#[derive(Debug, Clone, PartialEq)]
pub enum ByteValue {
    /// Enum member stored as a name
    Name(String),
    /// Plain byte
    Raw(u8),
}

/// Decoded property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Name(String),
    Str(String),
    Byte { enum_name: String, value: ByteValue },
    /// Object, class, component and interface references
    Object(i32),
    /// Struct body kept opaque
    Struct { struct_name: String, data: Vec<u8> },
    /// Array element count plus opaque element data
    Array { count: i32, data: Vec<u8> },
    /// Unknown type, raw value bytes
    Unsupported(Vec<u8>),
}

/// One property of an export
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub name: String,
    /// Type name as stored (`IntProperty`, ...)
    pub type_tag: String,
    pub array_index: i32,
    /// Size from the tag; refreshed by `Package::prepare_for_save`
    pub declared_size: i32,
    pub value: PropertyValue,
}

impl PropertyRecord {
    /// Build a record with its size already computed
    #[must_use]
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>, value: PropertyValue) -> Self {
        let mut record = Self {
            name: name.into(),
            type_tag: type_tag.into(),
            array_index: 0,
            declared_size: 0,
            value,
        };
        record.declared_size = recalculate_size(&record);
        record
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            PropertyValue::Int(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self.value {
            PropertyValue::Float(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            PropertyValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Name, string or enum-name value as text
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::Name(s) | PropertyValue::Str(s) => Some(s),
            PropertyValue::Byte {
                value: ByteValue::Name(s),
                ..
            } => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<i32> {
        match self.value {
            PropertyValue::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Every name this record references, for name table upkeep
    pub(crate) fn referenced_names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str(), self.type_tag.as_str()];
        match &self.value {
            PropertyValue::Name(n) => names.push(n),
            PropertyValue::Byte { enum_name, value } => {
                names.push(enum_name);
                if let ByteValue::Name(n) = value {
                    names.push(n);
                }
            }
            PropertyValue::Struct { struct_name, .. } => names.push(struct_name),
            _ => {}
        }
        names
    }
}

/// First property called `name`
#[must_use]
pub fn find_property<'a>(properties: &'a [PropertyRecord], name: &str) -> Option<&'a PropertyRecord> {
    properties.iter().find(|p| p.name == name)
}
