//! Reflected instances: transient views pairing a class descriptor with an
//! object.
//!
//! Fields are addressed by index or by name hash. Container fields take an
//! extra sub-index whose meaning depends on the field kind:
//!
//! - arrays: the element index
//! - vectors: the axis (0..4 maps to x, y, z, w)
//! - enum flags: the member value, read and written as `true`/`false`
//!
//! Nested classes are not value convertible and are walked with
//! [`ReflectedRef::sub_class_at`] / [`ReflectedMut::sub_class_mut_at`].

use std::any::Any;

use kiln_common::JenHash;

use crate::registry::class_by_hash;
use crate::value::DynValue;
use crate::{ClassDescriptor, Error, FieldDescriptor, FieldKind, Result};

/// A type with a static class descriptor.
pub trait Reflected: Any {
    fn class() -> &'static ClassDescriptor;
}

/// Read-only reflected view over an instance.
#[derive(Clone, Copy)]
pub struct ReflectedRef<'a> {
    class: &'a ClassDescriptor,
    instance: &'a dyn Any,
}

/// Mutable reflected view over an instance.
pub struct ReflectedMut<'a> {
    class: &'a ClassDescriptor,
    instance: &'a mut dyn Any,
}

fn lookup<'c>(class: &'c ClassDescriptor, index: usize) -> Result<&'c FieldDescriptor> {
    class.field(index).ok_or(Error::FieldIndexOutOfRange {
        index,
        count: class.num_fields(),
    })
}

fn field_label(class: &ClassDescriptor, index: usize) -> String {
    format!("{}::{}", class.class_name, class.field_name(index))
}

fn nested_class(class: &ClassDescriptor, field: &FieldDescriptor) -> Result<&'static ClassDescriptor> {
    if !field.kind.is_class() {
        return Err(Error::NotSubClass(field_label(class, field.index as usize)));
    }
    class_by_hash(field.type_hash).ok_or(Error::ClassNotRegistered(field.type_hash))
}

fn sub_index_error(class: &ClassDescriptor, index: usize, sub: usize) -> Error {
    Error::SubIndexOutOfRange {
        field: field_label(class, index),
        index: sub,
    }
}

fn read_at(field: &FieldDescriptor, value: &dyn DynValue, sub: usize) -> Option<Result<String>> {
    match field.kind {
        FieldKind::Vector => value.component(sub).map(Ok),
        FieldKind::EnumFlags => value
            .flag(sub as u64)
            .map(|on| Ok(if on { "true" } else { "false" }.to_string())),
        FieldKind::Array => value.element(sub).map(|v| Ok(v.to_text())),
        FieldKind::ArrayClass | FieldKind::Class => {
            Some(Err(Error::NotValueConvertible(field.kind)))
        }
        _ => Some(Ok(value.to_text())),
    }
}

fn write_at(field: &FieldDescriptor, value: &mut dyn DynValue, sub: usize, text: &str) -> Option<Result<()>> {
    match field.kind {
        FieldKind::Vector => value.set_component(sub, text).then_some(Ok(())),
        FieldKind::EnumFlags => {
            let on = text.trim().eq_ignore_ascii_case("true") || text.trim() == "1";
            value.set_flag(sub as u64, on).then_some(Ok(()))
        }
        FieldKind::Array => value.element_mut(sub).map(|v| v.set_text(text)),
        FieldKind::ArrayClass | FieldKind::Class => {
            Some(Err(Error::NotValueConvertible(field.kind)))
        }
        _ => Some(value.set_text(text)),
    }
}

impl<'a> ReflectedRef<'a> {
    /// View a reflected object.
    pub fn new<T: Reflected>(instance: &'a T) -> Self {
        Self {
            class: T::class(),
            instance,
        }
    }

    /// View an object through an explicit descriptor.
    pub fn from_parts(class: &'a ClassDescriptor, instance: &'a dyn Any) -> Self {
        Self { class, instance }
    }

    #[inline]
    pub fn class(&self) -> &'a ClassDescriptor {
        self.class
    }

    #[inline]
    pub fn num_fields(&self) -> usize {
        self.class.num_fields()
    }

    pub fn field_type(&self, index: usize) -> Option<&'a FieldDescriptor> {
        self.class.field(index)
    }

    pub fn field_type_by_hash(&self, hash: JenHash) -> Option<&'a FieldDescriptor> {
        self.class
            .field_index_by_hash(hash)
            .and_then(|i| self.class.field(i))
    }

    pub fn is_sub_class(&self, index: usize) -> bool {
        self.class.field(index).is_some_and(|f| f.kind.is_class())
    }

    pub fn is_array(&self, index: usize) -> bool {
        self.class.field(index).is_some_and(|f| f.kind.is_array())
    }

    fn field_value(&self, index: usize) -> Result<&'a dyn DynValue> {
        let field = lookup(self.class, index)?;
        let accessors = field
            .accessors
            .ok_or_else(|| Error::NoAccessor(field_label(self.class, index)))?;
        (accessors.get)(self.instance)
            .ok_or_else(|| Error::InstanceMismatch(self.class.class_name.clone()))
    }

    /// Whole field value as text.
    pub fn value(&self, index: usize) -> Result<String> {
        let field = lookup(self.class, index)?;
        if field.kind.is_class() {
            return Err(Error::NotValueConvertible(field.kind));
        }
        Ok(self.field_value(index)?.to_text())
    }

    /// Array element, vector component or flag state.
    pub fn value_at(&self, index: usize, sub: usize) -> Result<String> {
        let field = lookup(self.class, index)?;
        let value = self.field_value(index)?;
        read_at(field, value, sub).unwrap_or_else(|| Err(sub_index_error(self.class, index, sub)))
    }

    /// Component of one element in an array of vectors.
    pub fn value_at_element(&self, index: usize, element: usize, axis: usize) -> Result<String> {
        let value = self
            .field_value(index)?
            .element(element)
            .ok_or_else(|| sub_index_error(self.class, index, element))?;
        value
            .component(axis)
            .ok_or_else(|| sub_index_error(self.class, index, axis))
    }

    /// Nested class of a class field, or the first element of a class array.
    pub fn sub_class(&self, index: usize) -> Result<ReflectedRef<'a>> {
        self.sub_class_at(index, 0)
    }

    /// Nested class at an array element.
    ///
    /// Fails with [`Error::ClassNotRegistered`] if the nested type's
    /// descriptor was never registered.
    pub fn sub_class_at(&self, index: usize, element: usize) -> Result<ReflectedRef<'a>> {
        let field = lookup(self.class, index)?;
        let class = nested_class(self.class, field)?;
        let value = self.field_value(index)?;
        let target = match field.kind {
            FieldKind::ArrayClass => value
                .element(element)
                .ok_or_else(|| sub_index_error(self.class, index, element))?,
            _ => value,
        };

        Ok(ReflectedRef {
            class,
            instance: target.as_any(),
        })
    }
}

impl<'a> ReflectedMut<'a> {
    /// Mutable view over a reflected object.
    pub fn new<T: Reflected>(instance: &'a mut T) -> Self {
        Self {
            class: T::class(),
            instance,
        }
    }

    pub fn from_parts(class: &'a ClassDescriptor, instance: &'a mut dyn Any) -> Self {
        Self { class, instance }
    }

    /// Read-only view of the same instance.
    pub fn view(&self) -> ReflectedRef<'_> {
        ReflectedRef {
            class: self.class,
            instance: &*self.instance,
        }
    }

    #[inline]
    pub fn class(&self) -> &'a ClassDescriptor {
        self.class
    }

    fn field_value_mut(&mut self, index: usize) -> Result<&mut dyn DynValue> {
        let class = self.class;
        let field = lookup(class, index)?;
        let accessors = field
            .accessors
            .ok_or_else(|| Error::NoAccessor(field_label(class, index)))?;
        (accessors.get_mut)(&mut *self.instance)
            .ok_or_else(|| Error::InstanceMismatch(class.class_name.clone()))
    }

    fn index_of(&self, hash: JenHash) -> Result<usize> {
        self.class
            .field_index_by_hash(hash)
            .ok_or(Error::FieldNotFound(hash.raw()))
    }

    /// Set the whole field value from text.
    pub fn set_value(&mut self, index: usize, text: &str) -> Result<()> {
        let field = lookup(self.class, index)?;
        if field.kind.is_class() {
            return Err(Error::NotValueConvertible(field.kind));
        }
        self.field_value_mut(index)?.set_text(text)
    }

    /// Set an array element, vector component or flag state.
    pub fn set_value_at(&mut self, index: usize, sub: usize, text: &str) -> Result<()> {
        let class = self.class;
        let field = lookup(class, index)?;
        let value = self.field_value_mut(index)?;
        write_at(field, value, sub, text).unwrap_or_else(|| Err(sub_index_error(class, index, sub)))
    }

    /// Set a component of one element in an array of vectors.
    pub fn set_value_at_element(&mut self, index: usize, element: usize, axis: usize, text: &str) -> Result<()> {
        let class = self.class;
        let value = self
            .field_value_mut(index)?
            .element_mut(element)
            .ok_or_else(|| sub_index_error(class, index, element))?;
        if value.set_component(axis, text) {
            Ok(())
        } else {
            Err(sub_index_error(class, index, axis))
        }
    }

    /// Set a field addressed by name or alias hash.
    pub fn set_value_by_hash(&mut self, hash: JenHash, text: &str) -> Result<()> {
        let index = self.index_of(hash)?;
        self.set_value(index, text)
    }

    /// Set an element of a field addressed by name or alias hash.
    pub fn set_value_by_hash_at(&mut self, hash: JenHash, sub: usize, text: &str) -> Result<()> {
        let index = self.index_of(hash)?;
        self.set_value_at(index, sub, text)
    }

    pub fn sub_class_mut(&mut self, index: usize) -> Result<ReflectedMut<'_>> {
        self.sub_class_mut_at(index, 0)
    }

    /// Mutable nested class at an array element.
    pub fn sub_class_mut_at(&mut self, index: usize, element: usize) -> Result<ReflectedMut<'_>> {
        let parent = self.class;
        let field = lookup(parent, index)?;
        let class = nested_class(parent, field)?;
        let value = self.field_value_mut(index)?;
        let target = match field.kind {
            FieldKind::ArrayClass => value
                .element_mut(element)
                .ok_or_else(|| sub_index_error(parent, index, element))?,
            _ => value,
        };

        Ok(ReflectedMut {
            class,
            instance: target.as_any_mut(),
        })
    }
}
