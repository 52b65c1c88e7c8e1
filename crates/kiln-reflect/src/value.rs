//! Value-level text conversion for reflected field types.
//!
//! [`DynValue`] is the object-safe half used by the reflection protocol at
//! runtime, [`FieldValue`] adds the static shape used to build descriptors.

use std::any::Any;
use std::ffi::CString;
use std::fmt;
use std::marker::PhantomData;

use glam::{IVec2, IVec3, IVec4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use tracing::trace;

use crate::{EnumDescriptor, Error, FieldKind, Result};

/// Object-safe text access to a field value.
///
/// Scalar parse failures leave the value untouched; only configuration
/// errors such as an unknown enum member are reported.
pub trait DynValue: Any {
    /// Render the whole value as text.
    fn to_text(&self) -> String;

    /// Set the whole value from text.
    fn set_text(&mut self, text: &str) -> Result<()>;

    /// Array element.
    fn element(&self, _index: usize) -> Option<&dyn DynValue> {
        None
    }

    fn element_mut(&mut self, _index: usize) -> Option<&mut dyn DynValue> {
        None
    }

    /// Vector component by axis (0..4 maps to x, y, z, w).
    fn component(&self, _axis: usize) -> Option<String> {
        None
    }

    /// Returns false when the axis does not exist.
    fn set_component(&mut self, _axis: usize, _text: &str) -> bool {
        false
    }

    /// State of one enum-flags member.
    fn flag(&self, _value: u64) -> Option<bool> {
        None
    }

    /// Returns false when the value is not a flag set.
    fn set_flag(&mut self, _value: u64, _on: bool) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Static shape of a reflected field type.
pub trait FieldValue: DynValue + Sized {
    const KIND: FieldKind;
    const SUB_KIND: FieldKind = FieldKind::None;
    const SUB_SIZE: u8 = 0;
    const NUM_ITEMS: u16 = 0;

    /// Hash used to resolve nested class or enum descriptors.
    fn type_hash() -> u32 {
        0
    }
}

/// Reflected enum with a static descriptor.
pub trait ReflectedEnum: Copy + 'static {
    fn descriptor() -> &'static EnumDescriptor;

    fn to_value(self) -> u64;

    fn from_value(value: u64) -> Option<Self>;
}

#[doc(hidden)]
#[macro_export]
macro_rules! __impl_any {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

/// Strip matching outer delimiters.
fn strip_delimiters(text: &str, open: char, close: char) -> &str {
    let text = text.trim();
    text.strip_prefix(open)
        .and_then(|t| t.strip_suffix(close))
        .unwrap_or(text)
}

/// Split a comma separated list, respecting nested `[]` and `{}`.
pub(crate) fn split_items(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                items.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() || !items.is_empty() {
        items.push(tail);
    }
    items
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

macro_rules! impl_number {
    ($kind:ident: $($ty:ty),*) => {$(
        impl DynValue for $ty {
            fn to_text(&self) -> String {
                self.to_string()
            }

            fn set_text(&mut self, text: &str) -> Result<()> {
                match text.trim().parse::<$ty>() {
                    Ok(value) => *self = value,
                    Err(_) => trace!(text, ty = stringify!($ty), "ignoring unparsable value"),
                }
                Ok(())
            }

            __impl_any!();
        }

        impl FieldValue for $ty {
            const KIND: FieldKind = FieldKind::$kind;
        }
    )*};
}

impl_number!(Integer: i8, i16, i32, i64);
impl_number!(UnsignedInteger: u8, u16, u32, u64);
impl_number!(FloatingPoint: f32, f64);

impl DynValue for bool {
    fn to_text(&self) -> String {
        String::from(if *self { "true" } else { "false" })
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        match parse_bool(text) {
            Some(value) => *self = value,
            None => trace!(text, "ignoring unparsable bool"),
        }
        Ok(())
    }

    __impl_any!();
}

impl FieldValue for bool {
    const KIND: FieldKind = FieldKind::Bool;
}

impl DynValue for String {
    fn to_text(&self) -> String {
        self.clone()
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        text.clone_into(self);
        Ok(())
    }

    __impl_any!();
}

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::String;
}

impl DynValue for CString {
    fn to_text(&self) -> String {
        self.to_string_lossy().into_owned()
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        match CString::new(text) {
            Ok(value) => *self = value,
            Err(_) => trace!(text, "ignoring string with interior NUL"),
        }
        Ok(())
    }

    __impl_any!();
}

impl FieldValue for CString {
    const KIND: FieldKind = FieldKind::CString;
}

macro_rules! impl_vector {
    ($($ty:ty => $scalar:ty, $sub:ident, $n:literal;)*) => {$(
        impl DynValue for $ty {
            fn to_text(&self) -> String {
                let parts: Vec<String> = self.to_array().iter().map(|v| v.to_string()).collect();
                format!("[{}]", parts.join(", "))
            }

            fn set_text(&mut self, text: &str) -> Result<()> {
                let items = split_items(strip_delimiters(text, '[', ']'));
                for (axis, item) in items.into_iter().enumerate().take($n) {
                    self.set_component(axis, item);
                }
                Ok(())
            }

            fn component(&self, axis: usize) -> Option<String> {
                (axis < $n).then(|| self[axis].to_string())
            }

            fn set_component(&mut self, axis: usize, text: &str) -> bool {
                if axis >= $n {
                    return false;
                }
                match text.trim().parse::<$scalar>() {
                    Ok(value) => self[axis] = value,
                    Err(_) => trace!(text, axis, "ignoring unparsable component"),
                }
                true
            }

            __impl_any!();
        }

        impl FieldValue for $ty {
            const KIND: FieldKind = FieldKind::Vector;
            const SUB_KIND: FieldKind = FieldKind::$sub;
            const SUB_SIZE: u8 = 4;
            const NUM_ITEMS: u16 = $n;

            fn type_hash() -> u32 {
                FieldKind::$sub as u32 | 4 << 8 | $n << 16
            }
        }
    )*};
}

impl_vector! {
    Vec2 => f32, FloatingPoint, 2;
    Vec3 => f32, FloatingPoint, 3;
    Vec4 => f32, FloatingPoint, 4;
    IVec2 => i32, Integer, 2;
    IVec3 => i32, Integer, 3;
    IVec4 => i32, Integer, 4;
    UVec2 => u32, UnsignedInteger, 2;
    UVec3 => u32, UnsignedInteger, 3;
    UVec4 => u32, UnsignedInteger, 4;
}

impl<T: FieldValue, const N: usize> DynValue for [T; N] {
    fn to_text(&self) -> String {
        let parts: Vec<String> = self.iter().map(DynValue::to_text).collect();
        format!("{{{}}}", parts.join(", "))
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        let items = split_items(strip_delimiters(text, '{', '}'));
        for (slot, item) in self.iter_mut().zip(items) {
            slot.set_text(item)?;
        }
        Ok(())
    }

    fn element(&self, index: usize) -> Option<&dyn DynValue> {
        self.get(index).map(|v| v as &dyn DynValue)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn DynValue> {
        self.get_mut(index).map(|v| v as &mut dyn DynValue)
    }

    __impl_any!();
}

const fn saturate_u8(size: usize) -> u8 {
    if size > u8::MAX as usize {
        u8::MAX
    } else {
        size as u8
    }
}

impl<T: FieldValue, const N: usize> FieldValue for [T; N] {
    const KIND: FieldKind = if T::KIND.is_class() {
        FieldKind::ArrayClass
    } else {
        FieldKind::Array
    };
    const SUB_KIND: FieldKind = T::KIND;
    const SUB_SIZE: u8 = saturate_u8(std::mem::size_of::<T>());
    const NUM_ITEMS: u16 = N as u16;

    fn type_hash() -> u32 {
        T::type_hash()
    }
}

/// A set of enum members stored as bits indexed by member value.
pub struct EnumFlags<E> {
    bits: u64,
    _marker: PhantomData<E>,
}

impl<E: ReflectedEnum> EnumFlags<E> {
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self {
            bits,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    #[inline]
    pub fn contains(&self, member: E) -> bool {
        self.contains_value(member.to_value())
    }

    pub fn insert(&mut self, member: E) {
        self.set_value(member.to_value(), true);
    }

    pub fn remove(&mut self, member: E) {
        self.set_value(member.to_value(), false);
    }

    pub fn with(mut self, member: E) -> Self {
        self.insert(member);
        self
    }

    fn contains_value(&self, value: u64) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }

    fn set_value(&mut self, value: u64, on: bool) -> bool {
        if value >= 64 {
            return false;
        }
        if on {
            self.bits |= 1 << value;
        } else {
            self.bits &= !(1 << value);
        }
        true
    }
}

impl<E> Clone for EnumFlags<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EnumFlags<E> {}

impl<E> Default for EnumFlags<E> {
    fn default() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }
}

impl<E> PartialEq for EnumFlags<E> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<E> Eq for EnumFlags<E> {}

impl<E> fmt::Debug for EnumFlags<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumFlags({:#b})", self.bits)
    }
}

impl<E: ReflectedEnum> DynValue for EnumFlags<E> {
    fn to_text(&self) -> String {
        let names: Vec<&str> = E::descriptor()
            .members
            .iter()
            .filter(|m| self.contains_value(m.value))
            .map(|m| m.name.as_str())
            .collect();

        if names.is_empty() {
            "NULL".to_string()
        } else {
            names.join("|")
        }
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        let descriptor = E::descriptor();
        self.bits = 0;

        for name in text.split('|').map(str::trim) {
            if let Some(value) = descriptor.value_of(name) {
                self.set_value(value, true);
            }
        }
        Ok(())
    }

    fn flag(&self, value: u64) -> Option<bool> {
        Some(self.contains_value(value))
    }

    fn set_flag(&mut self, value: u64, on: bool) -> bool {
        self.set_value(value, on)
    }

    __impl_any!();
}

impl<E: ReflectedEnum> FieldValue for EnumFlags<E> {
    const KIND: FieldKind = FieldKind::EnumFlags;

    fn type_hash() -> u32 {
        E::descriptor().hash.raw()
    }
}

/// Render an enum member as text.
#[doc(hidden)]
pub fn enum_to_text<E: ReflectedEnum>(value: E) -> String {
    let raw = value.to_value();
    match E::descriptor().name_of(raw) {
        Some(name) => name.to_string(),
        None => raw.to_string(),
    }
}

/// Parse an enum member from its symbolic name.
#[doc(hidden)]
pub fn enum_from_text<E: ReflectedEnum>(text: &str) -> Result<E> {
    let descriptor = E::descriptor();
    descriptor
        .value_of(text.trim())
        .and_then(E::from_value)
        .ok_or_else(|| Error::UnknownEnumMember {
            name: descriptor.name.clone(),
            value: text.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_parse_failure_keeps_value() {
        let mut value = 42i32;
        value.set_text("forty").unwrap();
        assert_eq!(value, 42);
        value.set_text(" -7 ").unwrap();
        assert_eq!(value, -7);

        let mut flag = false;
        flag.set_text("TRUE").unwrap();
        assert!(flag);
    }

    #[test]
    fn test_vector_text() {
        let mut v = Vec3::new(1.0, 2.5, -3.0);
        assert_eq!(v.to_text(), "[1, 2.5, -3]");
        assert_eq!(v.component(1).as_deref(), Some("2.5"));
        assert_eq!(v.component(3), None);

        v.set_text("[4, 5, 6]").unwrap();
        assert_eq!(v, Vec3::new(4.0, 5.0, 6.0));
        assert!(v.set_component(2, "9"));
        assert_eq!(v.z, 9.0);
        assert!(!v.set_component(3, "1"));
    }

    #[test]
    fn test_array_text() {
        let mut values = [1u8, 2, 3];
        assert_eq!(values.to_text(), "{1, 2, 3}");
        values.set_text("{7, x, 9}").unwrap();
        assert_eq!(values, [7, 2, 9]);

        let mut nested = [Vec2::ZERO; 2];
        nested.set_text("{[1, 2], [3, 4]}").unwrap();
        assert_eq!(nested[1], Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_vector_type_hash() {
        assert_eq!(Vec3::type_hash(), 3 | 4 << 8 | 3 << 16);
        assert_eq!(<[Vec3; 4]>::KIND, FieldKind::Array);
        assert_eq!(<[Vec3; 4]>::SUB_KIND, FieldKind::Vector);
        assert_eq!(<[Vec3; 4]>::NUM_ITEMS, 4);
    }

    #[test]
    fn test_split_items() {
        assert_eq!(split_items("a, b ,c"), vec!["a", "b", "c"]);
        assert!(split_items("").is_empty());
        assert_eq!(split_items("[1, 2], {3}"), vec!["[1, 2]", "{3}"]);
    }
}
