//! Kiln - asset pipeline plumbing library.
//!
//! This crate provides a unified interface to the kiln library ecosystem.
//!
//! # Crates
//!
//! - [`kiln_common`] - Common utilities (binary reading, name hashing, CRC folding)
//! - [`kiln_reflect`] - Class descriptors and type-erased field access
//! - [`kiln_xml`] - XML serialization of reflected classes and settings files
//! - [`kiln_zip`] - Streaming ZIP/ZIP64 writer, part merging and cache sidecars
//! - [`kiln_gltf`] - GLTF documents and GLB containers
//!
//! # Example
//!
//! ```no_run
//! use kiln::prelude::*;
//!
//! // Pack a mesh payload into a GLB
//! let payload = std::fs::read("mesh.bin")?;
//! let mut document = Document::default();
//! document.buffers.push(Buffer::from_data(payload));
//! kiln::gltf::save_file(&document, "mesh.glb", true)?;
//!
//! // And store it in an archive with a cache sidecar
//! let mut zip = ZipWriter::create("assets.zip")?.with_cache(sidecar_path("assets.zip"));
//! zip.new_file("meshes/mesh.glb")?;
//! zip.send_data(&std::fs::read("mesh.glb")?)?;
//! zip.finish()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use kiln_common as common;
pub use kiln_gltf as gltf;
pub use kiln_reflect as reflect;
pub use kiln_xml as xml;
pub use kiln_zip as zip;

pub use kiln_reflect::{reflect_class, reflect_enum};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use kiln_common::{BinaryReader, JenHash};
    pub use kiln_gltf::{Buffer, Document, ReadQuotas};
    pub use kiln_reflect::{
        register, register_enum, EnumFlags, Reflected, ReflectedEnum, ReflectedMut, ReflectedRef,
    };
    pub use kiln_xml::{ConfigFile, SaveFlags, XmlNode};
    pub use kiln_zip::{sidecar_path, CacheIndex, ZipMerger, ZipPart, ZipWriter};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
