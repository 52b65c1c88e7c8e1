//! Streaming ZIP/ZIP64 writer for kiln.
//!
//! Entries are always stored (no compression). The crate provides:
//!
//! - [`ZipWriter`] - streams entries into a seekable sink and finalizes the
//!   central directory, switching to ZIP64 records when any value overflows
//! - [`ZipMerger`] - splices [`ZipPart`]s built by worker threads into one
//!   primary archive, rebasing their central records
//! - [`CacheIndex`] - name to data-offset index saved as `<archive>.cache`
//!   and checkpointed inside the archive
//!
//! # Example
//!
//! ```no_run
//! use kiln_zip::{sidecar_path, CacheIndex, ZipWriter};
//!
//! let mut zip = ZipWriter::create("out.zip")?.with_cache(sidecar_path("out.zip"));
//! zip.new_file("textures/stone.dds")?;
//! zip.send_data(&[0u8; 128])?;
//! zip.finish()?;
//!
//! let cache = CacheIndex::open(sidecar_path("out.zip"))?;
//! let (offset, size) = cache.find("textures/stone.dds").unwrap();
//! # Ok::<(), kiln_zip::Error>(())
//! ```

mod cache;
mod directory;
mod error;
mod merger;
pub mod records;
mod time;
mod writer;

pub use cache::{sidecar_path, CacheEntry, CacheHeader, CacheIndex};
pub use error::{Error, Result};
pub use merger::{ZipMerger, COPY_BLOCK_SIZE, SCAN_WINDOW};
pub use time::DosDateTime;
pub use writer::{ZipPart, ZipWriter};
