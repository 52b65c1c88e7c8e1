//! GLTF 2.0 / GLB document codec for kiln.
//!
//! - [`Document`] - the JSON document model (serde)
//! - [`load_from_binary`] / [`load_from_text`] - quota-checked readers that
//!   materialize every buffer
//! - [`save`] - writes `.glb` or `.gltf`, plus external buffer files
//! - [`stream_binary_headers`] / [`stream_binary_finish`] - GLB output whose
//!   binary payload is produced by the caller after the headers are written
//!
//! Every failure is reported as one [`Error`] ("invalid document") with a
//! reason, the offending value if any, and the underlying cause.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use std::path::Path;
//! use kiln_gltf::{load_from_binary, save, Buffer, Document, ReadQuotas};
//!
//! let document = Document {
//!     buffers: vec![Buffer::from_data(vec![1, 2, 3, 4, 5])],
//!     ..Default::default()
//! };
//!
//! let mut glb = Vec::new();
//! save(&document, &mut glb, Path::new(""), true)?;
//!
//! let loaded = load_from_binary(Cursor::new(glb), Path::new(""), &ReadQuotas::default())?;
//! assert_eq!(loaded.buffers[0].data, vec![1, 2, 3, 4, 5]);
//! # Ok::<(), kiln_gltf::Error>(())
//! ```

pub mod base64;
mod document;
mod error;
pub mod glb;
mod reader;
mod writer;

pub use document::*;
pub use error::{Error, Result};
pub use glb::{buffer_uri_path, document_root, ChunkHeader, GlbHeader};
pub use reader::{load_from_binary, load_from_binary_file, load_from_text, load_from_text_file, ReadQuotas};
pub use writer::{
    restream, save, save_file, stream_binary_finish, stream_binary_full, stream_binary_headers,
    validate_buffers, StreamState, RESTREAM_BLOCK_SIZE,
};
