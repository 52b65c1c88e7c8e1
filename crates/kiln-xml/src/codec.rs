//! Mapping between reflected instances and XML elements.
//!
//! Two layouts are supported:
//!
//! - [`save`] / [`load`]: one child element per field holding the field's
//!   text. Class fields nest, class arrays nest one `i:<n>` element per slot.
//! - [`save_v2`] / [`load_v2`]: scalars become attributes, vectors become an
//!   element with `x`/`y`/`z`/`w` attributes, enum flags an element with one
//!   `true`/`false` attribute per member, and array slots are suffixed
//!   `-<n>`.
//!
//! Names fall back to `h:<HEX>` when a field or class name is unknown.
//! Flags whose enum is not registered are saved as element text.
//! Loading tolerates keys that match no field; unregistered nested classes
//! and unknown enum members are errors.

use kiln_common::JenHash;
use kiln_reflect::registry::require_enum;
use kiln_reflect::{ClassDescriptor, FieldDescriptor, FieldKind, ReflectedMut, ReflectedRef};
use tracing::{debug, warn};

use crate::{Result, XmlNode};

const AXES: [&str; 4] = ["x", "y", "z", "w"];

/// Options for [`save_v2`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveFlags {
    /// Write into a new child element named after the class.
    pub class_node: bool,
    /// Write string fields as attributes instead of child elements.
    pub string_as_attribute: bool,
}

impl SaveFlags {
    pub fn class_node() -> Self {
        Self {
            class_node: true,
            ..Default::default()
        }
    }

    pub fn with_string_as_attribute(mut self) -> Self {
        self.string_as_attribute = true;
        self
    }
}

fn class_name(class: &ClassDescriptor) -> String {
    if class.class_name.is_empty() {
        class.class_hash.to_name()
    } else {
        class.class_name.clone()
    }
}

fn target<'n>(node: &'n mut XmlNode, class: &ClassDescriptor, as_new_node: bool) -> &'n mut XmlNode {
    if as_new_node {
        node.child_or_insert(&class_name(class))
    } else {
        node
    }
}

/// Save with one element per field.
pub fn save(instance: ReflectedRef<'_>, node: &mut XmlNode, as_new_node: bool) -> Result<()> {
    let class = instance.class();
    let this = target(node, class, as_new_node);

    for (t, field) in class.fields.iter().enumerate() {
        let name = class.field_name(t);
        let child = this.child_or_insert(&name);

        match field.kind {
            FieldKind::ArrayClass => {
                for s in 0..field.num_items as usize {
                    let sub = instance.sub_class_at(t, s)?;
                    save(sub, child.child_or_insert(&format!("i:{s}")), false)?;
                }
            }
            FieldKind::Class => save(instance.sub_class(t)?, child, false)?,
            _ => child.text = instance.value(t)?,
        }
    }
    Ok(())
}

/// Save a field that maps onto attributes or a vector/flags element.
///
/// Returns false if the field needs the generic handling.
fn save_v2_value(
    instance: ReflectedRef<'_>,
    field: &FieldDescriptor,
    node: &mut XmlNode,
    t: usize,
    name: &str,
    flags: SaveFlags,
) -> Result<bool> {
    match field.kind {
        FieldKind::String | FieldKind::CString if !flags.string_as_attribute => Ok(false),
        FieldKind::String
        | FieldKind::CString
        | FieldKind::Bool
        | FieldKind::Enum
        | FieldKind::FloatingPoint
        | FieldKind::Integer
        | FieldKind::UnsignedInteger => {
            node.set_attribute(name, instance.value(t)?);
            Ok(true)
        }
        FieldKind::Vector => {
            let child = node.child_or_insert(name);
            for (axis, letter) in AXES.iter().enumerate().take(field.num_items as usize) {
                child.set_attribute(letter, instance.value_at(t, axis)?);
            }
            Ok(true)
        }
        FieldKind::EnumFlags => {
            let descriptor = match require_enum(field.type_hash) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    debug!(field = name, %err, "saving flags as text");
                    return Ok(false);
                }
            };
            let child = node.child_or_insert(name);
            for member in &descriptor.members {
                child.set_attribute(&member.name, instance.value_at(t, member.value as usize)?);
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Save with scalars as attributes.
pub fn save_v2(instance: ReflectedRef<'_>, node: &mut XmlNode, flags: SaveFlags) -> Result<()> {
    let class = instance.class();
    let this = target(node, class, flags.class_node);
    let sub_flags = SaveFlags {
        class_node: false,
        ..flags
    };

    for (t, field) in class.fields.iter().enumerate() {
        let name = class.field_name(t);

        if save_v2_value(instance, field, this, t, &name, flags)? {
            continue;
        }

        match field.kind {
            FieldKind::ArrayClass => {
                for s in 0..field.num_items as usize {
                    let sub = instance.sub_class_at(t, s)?;
                    save_v2(sub, this.child_or_insert(&format!("{name}-{s}")), sub_flags)?;
                }
            }
            FieldKind::Class => {
                let sub = instance.sub_class(t)?;
                save_v2(sub, this.child_or_insert(&name), sub_flags)?;
            }
            FieldKind::Array => save_v2_array(instance, field, this, t, &name)?,
            _ => this.child_or_insert(&name).text = instance.value(t)?,
        }
    }
    Ok(())
}

fn save_v2_array(
    instance: ReflectedRef<'_>,
    field: &FieldDescriptor,
    node: &mut XmlNode,
    t: usize,
    name: &str,
) -> Result<()> {
    let count = field.num_items as usize;

    match field.sub_kind {
        FieldKind::Bool
        | FieldKind::Enum
        | FieldKind::FloatingPoint
        | FieldKind::Integer
        | FieldKind::UnsignedInteger => {
            for s in 0..count {
                node.set_attribute(&format!("{name}-{s}"), instance.value_at(t, s)?);
            }
        }
        FieldKind::Vector => {
            let axes = field.sub_size as usize / 4;
            for s in 0..count {
                let child = node.child_or_insert(&format!("{name}-{s}"));
                for (axis, letter) in AXES.iter().enumerate().take(axes) {
                    child.set_attribute(letter, instance.value_at_element(t, s, axis)?);
                }
            }
        }
        FieldKind::EnumFlags => match require_enum(field.type_hash) {
            Ok(descriptor) => {
                for s in 0..count {
                    let child = node.child_or_insert(&format!("{name}-{s}"));
                    let text = instance.value_at(t, s)?;
                    let set: Vec<&str> = text.split('|').collect();
                    for member in &descriptor.members {
                        let on = set.contains(&member.name.as_str());
                        child.set_attribute(&member.name, if on { "true" } else { "false" });
                    }
                }
            }
            Err(err) => {
                debug!(field = name, %err, "saving flags as text");
                node.child_or_insert(name).text = instance.value(t)?;
            }
        },
        _ => node.child_or_insert(name).text = instance.value(t)?,
    }
    Ok(())
}

/// Resolve an element or attribute name to a field hash.
fn name_hash(name: &str) -> JenHash {
    JenHash::from_name(name)
}

/// Split a trailing `-<index>` suffix off a name.
fn split_index(name: &str) -> (&str, Option<usize>) {
    if let Some(found) = name.rfind('-') {
        let digits = &name[found + 1..];
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        if end > 0 {
            if let Ok(index) = digits[..end].parse() {
                return (&name[..found], Some(index));
            }
        }
    }
    (name, None)
}

/// Locate the element for a class among a node's children.
pub fn find_class_node<'n>(node: &'n XmlNode, class: &ClassDescriptor) -> Option<&'n XmlNode> {
    node.children
        .iter()
        .find(|c| !c.name.is_empty() && name_hash(&c.name) == class.class_hash)
}

/// Ignore keys that match no field and out of range slots.
fn tolerate(result: kiln_reflect::Result<()>, key: &str) -> Result<()> {
    match result {
        Err(kiln_reflect::Error::FieldNotFound(hash)) => {
            debug!(key, hash = %JenHash::from_raw(hash), "skipping unknown key");
            Ok(())
        }
        Err(err @ kiln_reflect::Error::SubIndexOutOfRange { .. }) => {
            warn!(key, %err, "skipping out of range value");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

fn resolve<'n>(node: &'n XmlNode, class: &ClassDescriptor, lookup_class_node: bool) -> Option<&'n XmlNode> {
    if lookup_class_node {
        find_class_node(node, class)
    } else {
        Some(node)
    }
}

/// Load the one-element-per-field layout.
///
/// Returns false if `lookup_class_node` is set and no class element exists.
pub fn load(instance: &mut ReflectedMut<'_>, node: &XmlNode, lookup_class_node: bool) -> Result<bool> {
    let class = instance.class();
    let Some(this) = resolve(node, class, lookup_class_node) else {
        return Ok(false);
    };

    for child in &this.children {
        let hash = name_hash(&child.name);
        let field = class.field_index_by_hash(hash).and_then(|i| class.field(i));

        match field {
            Some(field) if field.kind == FieldKind::ArrayClass => {
                let index = field.index as usize;
                for slot in &child.children {
                    let element = slot
                        .name
                        .strip_prefix("i:")
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(0);
                    let mut sub = instance.sub_class_mut_at(index, element)?;
                    load(&mut sub, slot, false)?;
                }
            }
            Some(field) if field.kind == FieldKind::Class => {
                let mut sub = instance.sub_class_mut(field.index as usize)?;
                load(&mut sub, child, false)?;
            }
            _ => tolerate(instance.set_value_by_hash(hash, &child.text), &child.name)?,
        }
    }
    Ok(true)
}

/// Load the attribute layout written by [`save_v2`].
///
/// Returns false if `lookup_class_node` is set and no class element exists.
pub fn load_v2(instance: &mut ReflectedMut<'_>, node: &XmlNode, lookup_class_node: bool) -> Result<bool> {
    let class = instance.class();
    let Some(this) = resolve(node, class, lookup_class_node) else {
        return Ok(false);
    };

    for (key, value) in &this.attributes {
        let (name, index) = split_index(key);
        let hash = name_hash(name);
        let result = match index {
            Some(index) => instance.set_value_by_hash_at(hash, index, value),
            None => instance.set_value_by_hash(hash, value),
        };
        tolerate(result, key)?;
    }

    for child in &this.children {
        let (name, index) = split_index(&child.name);
        let hash = name_hash(name);
        let Some(field) = class.field_index_by_hash(hash).and_then(|i| class.field(i)) else {
            debug!(key = %child.name, "skipping unknown element");
            continue;
        };
        let t = field.index as usize;

        if field.kind.is_class() {
            let mut sub = instance.sub_class_mut_at(t, index.unwrap_or(0))?;
            load_v2(&mut sub, child, false)?;
            continue;
        }

        if child.attributes.is_empty() {
            let result = match index {
                Some(index) => instance.set_value_at(t, index, &child.text),
                None => instance.set_value(t, &child.text),
            };
            tolerate(result, &child.name)?;
            continue;
        }

        let kind = match field.kind {
            FieldKind::Array => field.sub_kind,
            kind => kind,
        };

        match kind {
            FieldKind::Vector => {
                for (letter, text) in &child.attributes {
                    let Some(axis) = AXES.iter().position(|a| a == letter) else {
                        continue;
                    };
                    let result = match index {
                        Some(index) => instance.set_value_at_element(t, index, axis, text),
                        None => instance.set_value_at(t, axis, text),
                    };
                    tolerate(result, &child.name)?;
                }
            }
            FieldKind::EnumFlags => {
                let set: Vec<&str> = child
                    .attributes
                    .iter()
                    .filter(|(_, v)| is_truthy(v))
                    .map(|(k, _)| k.as_str())
                    .collect();
                let text = if set.is_empty() {
                    "NULL".to_string()
                } else {
                    set.join("|")
                };
                let result = match index {
                    Some(index) => instance.set_value_at(t, index, &text),
                    None => instance.set_value(t, &text),
                };
                tolerate(result, &child.name)?;
            }
            _ => {}
        }
    }
    Ok(true)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim_start().chars().next(),
        Some('1' | 't' | 'T' | 'y' | 'Y')
    )
}
