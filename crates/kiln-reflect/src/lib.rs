//! Runtime reflection for kiln.
//!
//! Types describe their fields once through a [`ClassDescriptor`]; the
//! descriptor then drives type-erased access to any instance through
//! [`ReflectedRef`] and [`ReflectedMut`]. Field values are exchanged as text,
//! which is what the XML codec and the settings layer build on.
//!
//! # Example
//!
//! ```
//! use kiln_reflect::prelude::*;
//! use kiln_reflect::{reflect_class, reflect_enum};
//!
//! reflect_enum! {
//!     pub enum Filter: u8 {
//!         Nearest = 0,
//!         Linear = 1,
//!     }
//! }
//!
//! struct Sampler {
//!     filter: Filter,
//!     anisotropy: u32,
//! }
//!
//! reflect_class! {
//!     Sampler {
//!         filter,
//!         anisotropy,
//!     }
//! }
//!
//! let mut sampler = Sampler { filter: Filter::Nearest, anisotropy: 1 };
//! let mut view = ReflectedMut::new(&mut sampler);
//! view.set_value_by_hash(JenHash::new("filter"), "Linear")?;
//! view.set_value(1, "16")?;
//!
//! assert_eq!(sampler.filter, Filter::Linear);
//! assert_eq!(sampler.anisotropy, 16);
//! # Ok::<(), kiln_reflect::Error>(())
//! ```
//!
//! # Nested classes
//!
//! Class and class-array fields resolve their descriptor through the global
//! registry by type hash. Register every nested type with [`register`]
//! before walking it; an unregistered type yields
//! [`Error::ClassNotRegistered`].

mod descriptor;
mod error;
mod instance;
mod kind;
mod macros;
pub mod registry;
pub mod schema;
pub mod value;

pub use descriptor::{
    ClassBuilder, ClassDescriptor, Description, EnumDescriptor, EnumMember, FieldAccessors,
    FieldDescriptor, GetFn, GetMutFn,
};
pub use error::{Error, Result};
pub use instance::{Reflected, ReflectedMut, ReflectedRef};
pub use kind::FieldKind;
pub use registry::{register, register_enum};
pub use schema::ReflectorSchema;
pub use value::{DynValue, EnumFlags, FieldValue, ReflectedEnum};

#[doc(hidden)]
pub use value::{enum_from_text, enum_to_text};

pub use kiln_common::JenHash;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        ClassDescriptor, EnumFlags, FieldKind, JenHash, Reflected, ReflectedEnum, ReflectedMut,
        ReflectedRef,
    };
}
