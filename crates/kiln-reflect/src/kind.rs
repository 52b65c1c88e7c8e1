//! Semantic field kinds.

/// Semantic kind of a reflected field.
///
/// The discriminants are the raw type tags stored in the binary schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldKind {
    #[default]
    None = 0,
    /// Signed integer.
    Integer = 1,
    /// Unsigned integer.
    UnsignedInteger = 2,
    /// 32 or 64-bit float.
    FloatingPoint = 3,
    /// Nested reflected class.
    Class = 4,
    /// Enum stored as its member value.
    Enum = 5,
    Bool = 6,
    /// NUL-terminated string.
    CString = 7,
    String = 8,
    /// Fixed-size array of value-convertible elements.
    Array = 9,
    /// 2 to 4 component vector.
    Vector = 10,
    /// Fixed-size array of nested classes.
    ArrayClass = 11,
    /// Set of enum members stored as bits.
    EnumFlags = 12,
}

impl FieldKind {
    /// Parse from a raw schema tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Integer),
            2 => Some(Self::UnsignedInteger),
            3 => Some(Self::FloatingPoint),
            4 => Some(Self::Class),
            5 => Some(Self::Enum),
            6 => Some(Self::Bool),
            7 => Some(Self::CString),
            8 => Some(Self::String),
            9 => Some(Self::Array),
            10 => Some(Self::Vector),
            11 => Some(Self::ArrayClass),
            12 => Some(Self::EnumFlags),
            _ => None,
        }
    }

    /// Get the string name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Integer => "Integer",
            Self::UnsignedInteger => "UnsignedInteger",
            Self::FloatingPoint => "FloatingPoint",
            Self::Class => "Class",
            Self::Enum => "Enum",
            Self::Bool => "Bool",
            Self::CString => "CString",
            Self::String => "String",
            Self::Array => "Array",
            Self::Vector => "Vector",
            Self::ArrayClass => "ArrayClass",
            Self::EnumFlags => "EnumFlags",
        }
    }

    /// Check if the kind is a nested class or array of classes.
    pub const fn is_class(&self) -> bool {
        matches!(self, Self::Class | Self::ArrayClass)
    }

    /// Check if the kind is an array.
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array | Self::ArrayClass)
    }

    /// Check if the kind renders as a short scalar text value.
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Integer
                | Self::UnsignedInteger
                | Self::FloatingPoint
                | Self::Bool
                | Self::Enum
                | Self::CString
                | Self::String
        )
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
