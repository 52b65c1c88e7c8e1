//! Process-wide class and enum registries.
//!
//! Registration is idempotent and may happen from any thread; lookups are
//! read-mostly. Nested class and enum fields resolve their descriptors here
//! by type hash, so every nested type must be registered before its parent
//! is walked.

use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{ClassDescriptor, EnumDescriptor, Error, Reflected, ReflectedEnum, Result};

type Table<T> = RwLock<FxHashMap<u32, &'static T>>;

fn classes() -> &'static Table<ClassDescriptor> {
    static CLASSES: OnceLock<Table<ClassDescriptor>> = OnceLock::new();
    CLASSES.get_or_init(Default::default)
}

fn enums() -> &'static Table<EnumDescriptor> {
    static ENUMS: OnceLock<Table<EnumDescriptor>> = OnceLock::new();
    ENUMS.get_or_init(Default::default)
}

/// Register a class descriptor under its class hash.
pub fn register_class(class: &'static ClassDescriptor) {
    let previous = classes().write().insert(class.class_hash.raw(), class);
    if previous.is_none() {
        debug!(class = %class.class_name, hash = %class.class_hash, "registered class");
    }
}

/// Register an enum descriptor under its hash.
pub fn register_enum_descriptor(descriptor: &'static EnumDescriptor) {
    let previous = enums().write().insert(descriptor.hash.raw(), descriptor);
    if previous.is_none() {
        debug!(name = %descriptor.name, hash = %descriptor.hash, "registered enum");
    }
}

/// Register a reflected type.
pub fn register<T: Reflected>() {
    register_class(T::class());
}

/// Register a reflected enum.
pub fn register_enum<E: ReflectedEnum>() {
    register_enum_descriptor(E::descriptor());
}

/// Look up a class descriptor by class hash.
pub fn class_by_hash(hash: u32) -> Option<&'static ClassDescriptor> {
    classes().read().get(&hash).copied()
}

/// Look up an enum descriptor by hash.
pub fn enum_by_hash(hash: u32) -> Option<&'static EnumDescriptor> {
    enums().read().get(&hash).copied()
}

/// Look up an enum descriptor that must have been registered.
pub fn require_enum(hash: u32) -> Result<&'static EnumDescriptor> {
    enum_by_hash(hash).ok_or(Error::EnumNotRegistered(hash))
}
