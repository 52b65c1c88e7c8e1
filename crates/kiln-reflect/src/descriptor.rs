//! Class, field and enum descriptors.
//!
//! Descriptors are plain data built once per type. Descriptors produced by
//! [`reflect_class!`](crate::reflect_class) carry accessor function pointers
//! for every field; descriptors reloaded from a schema carry metadata only.

use std::any::Any;
use std::borrow::Cow;

use kiln_common::JenHash;

use crate::value::{DynValue, FieldValue};
use crate::FieldKind;

/// Type-erased field projection.
pub type GetFn = fn(&dyn Any) -> Option<&dyn DynValue>;

/// Type-erased mutable field projection.
pub type GetMutFn = fn(&mut dyn Any) -> Option<&mut dyn DynValue>;

/// Accessor pair projecting an owning instance onto one of its fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldAccessors {
    pub get: GetFn,
    pub get_mut: GetMutFn,
}

/// Metadata for one reflected field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    /// Element kind for arrays and vectors.
    pub sub_kind: FieldKind,
    /// Element size in bytes for arrays and vectors, saturated at 255.
    pub sub_size: u8,
    /// Position in the owning class table.
    pub index: u16,
    pub num_items: u16,
    pub size: u16,
    /// Byte offset inside the owning type. Informational only.
    pub offset: u16,
    pub name_hash: JenHash,
    /// Hash used to resolve nested class and enum descriptors.
    pub type_hash: u32,
    pub accessors: Option<FieldAccessors>,
}

impl FieldDescriptor {
    /// Describe a field from a typed witness.
    ///
    /// The witness is never dereferenced; it only carries the field type.
    pub fn of<T: FieldValue>(
        _witness: Option<&T>,
        offset: usize,
        accessors: FieldAccessors,
    ) -> Self {
        Self {
            kind: T::KIND,
            sub_kind: T::SUB_KIND,
            sub_size: T::SUB_SIZE,
            index: 0,
            num_items: T::NUM_ITEMS,
            size: saturate(std::mem::size_of::<T>()),
            offset: saturate(offset),
            name_hash: JenHash::default(),
            type_hash: T::type_hash(),
            accessors: Some(accessors),
        }
    }

    /// Compare all metadata, ignoring accessors.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.sub_kind == other.sub_kind
            && self.sub_size == other.sub_size
            && self.index == other.index
            && self.num_items == other.num_items
            && self.size == other.size
            && self.offset == other.offset
            && self.name_hash == other.name_hash
            && self.type_hash == other.type_hash
    }
}

fn saturate(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Two-part human readable field description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub part1: String,
    pub part2: String,
}

impl From<&str> for Description {
    fn from(part1: &str) -> Self {
        Self {
            part1: part1.to_string(),
            part2: String::new(),
        }
    }
}

impl From<(&str, &str)> for Description {
    fn from((part1, part2): (&str, &str)) -> Self {
        Self {
            part1: part1.to_string(),
            part2: part2.to_string(),
        }
    }
}

/// Descriptor table for one reflected class.
///
/// The metadata vectors run parallel to `fields`.
#[derive(Debug, Clone, Default)]
pub struct ClassDescriptor {
    pub class_hash: JenHash,
    pub class_name: String,
    pub fields: Vec<FieldDescriptor>,
    pub names: Vec<Option<String>>,
    pub aliases: Vec<Option<String>>,
    pub alias_hashes: Vec<Option<JenHash>>,
    pub descriptions: Vec<Option<Description>>,
}

impl ClassDescriptor {
    /// Start building a class descriptor.
    pub fn builder(class_name: &str) -> ClassBuilder {
        ClassBuilder {
            class: ClassDescriptor {
                class_hash: JenHash::new(class_name),
                class_name: class_name.to_string(),
                ..Default::default()
            },
        }
    }

    /// Number of fields.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Get a field by index.
    #[inline]
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Find a field by name hash, then by alias hash.
    pub fn field_index_by_hash(&self, hash: JenHash) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name_hash == hash)
            .or_else(|| {
                self.alias_hashes
                    .iter()
                    .position(|alias| *alias == Some(hash))
            })
    }

    /// Display name of a field, or its `h:<HEX>` fallback.
    pub fn field_name(&self, index: usize) -> Cow<'_, str> {
        match self.names.get(index).and_then(Option::as_deref) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(
                self.fields
                    .get(index)
                    .map(|f| f.name_hash.to_name())
                    .unwrap_or_default(),
            ),
        }
    }

    /// Display names of all fields.
    pub fn type_names(&self) -> Vec<Cow<'_, str>> {
        (0..self.fields.len()).map(|i| self.field_name(i)).collect()
    }

    pub fn alias(&self, index: usize) -> Option<&str> {
        self.aliases.get(index).and_then(Option::as_deref)
    }

    pub fn description(&self, index: usize) -> Option<&Description> {
        self.descriptions.get(index).and_then(Option::as_ref)
    }
}

/// Builder for [`ClassDescriptor`].
///
/// `alias` and `description` apply to the most recently added field.
#[derive(Debug)]
pub struct ClassBuilder {
    class: ClassDescriptor,
}

impl ClassBuilder {
    /// Add a named field.
    pub fn field(self, descriptor: FieldDescriptor, name: &str) -> Self {
        self.push(descriptor, JenHash::new(name), Some(name.to_string()))
    }

    /// Add a field known only by its name hash.
    pub fn hashed_field(self, descriptor: FieldDescriptor, name_hash: JenHash) -> Self {
        self.push(descriptor, name_hash, None)
    }

    fn push(mut self, mut descriptor: FieldDescriptor, hash: JenHash, name: Option<String>) -> Self {
        descriptor.index = self.class.fields.len() as u16;
        descriptor.name_hash = hash;
        self.class.fields.push(descriptor);
        self.class.names.push(name);
        self.class.aliases.push(None);
        self.class.alias_hashes.push(None);
        self.class.descriptions.push(None);
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        if let Some(slot) = self.class.aliases.last_mut() {
            *slot = Some(alias.to_string());
        }
        if let Some(slot) = self.class.alias_hashes.last_mut() {
            *slot = Some(JenHash::new(alias));
        }
        self
    }

    pub fn description(mut self, description: impl Into<Description>) -> Self {
        if let Some(slot) = self.class.descriptions.last_mut() {
            *slot = Some(description.into());
        }
        self
    }

    pub fn build(self) -> ClassDescriptor {
        self.class
    }
}

/// One named member of a reflected enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: u64,
}

/// Descriptor for a reflected enum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumDescriptor {
    pub hash: JenHash,
    pub name: String,
    pub members: Vec<EnumMember>,
}

impl EnumDescriptor {
    pub fn new(name: &str, members: &[(&str, u64)]) -> Self {
        Self {
            hash: JenHash::new(name),
            name: name.to_string(),
            members: members
                .iter()
                .map(|&(name, value)| EnumMember {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }

    /// Look up a member value by name.
    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
    }

    /// Look up a member name by value.
    pub fn name_of(&self, value: u64) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.value == value)
            .map(|m| m.name.as_str())
    }
}
