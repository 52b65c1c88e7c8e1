//! Quota-checked GLTF and GLB reading.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;
use zerocopy::FromBytes;

use crate::document::Document;
use crate::glb::{buffer_uri_path, document_root, ChunkHeader, GlbHeader, CHUNK_BIN, CHUNK_JSON, GLB_MAGIC};
use crate::{Error, Result};

/// Limits applied before any buffer is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadQuotas {
    pub max_file_size: u64,
    pub max_buffer_count: usize,
    pub max_buffer_byte_length: u32,
}

impl Default for ReadQuotas {
    fn default() -> Self {
        Self {
            max_file_size: 32 * 1024 * 1024,
            max_buffer_count: 8,
            max_buffer_byte_length: 32 * 1024 * 1024,
        }
    }
}

/// Load a `.gltf` JSON document, resolving relative buffers against `root`.
pub fn load_from_text<R: Read>(input: R, root: &Path, quotas: &ReadQuotas) -> Result<Document> {
    let mut json = Vec::new();
    input.take(quotas.max_file_size + 1).read_to_end(&mut json)?;
    if json.len() as u64 > quotas.max_file_size {
        return Err(Error::new("Quota exceeded : file size > max_file_size"));
    }
    create(&json, root, quotas, None)
}

/// Load a `.gltf` file.
pub fn load_from_text_file(path: impl AsRef<Path>, quotas: &ReadQuotas) -> Result<Document> {
    let path = path.as_ref();
    let input = BufReader::new(File::open(path)?);
    load_from_text(input, &document_root(path), quotas)
}

/// Load a `.glb` container, resolving relative buffers against `root`.
pub fn load_from_binary<R: Read>(mut input: R, root: &Path, quotas: &ReadQuotas) -> Result<Document> {
    let mut raw = [0u8; GlbHeader::SIZE];
    input.read_exact(&mut raw)?;
    let header = GlbHeader::read_from_bytes(&raw[..]).map_err(|_| Error::new("Invalid GLB header"))?;

    let json_length = header.json.length as u64;
    if header.magic != GLB_MAGIC
        || header.json.chunk_type != CHUNK_JSON
        || json_length + GlbHeader::SIZE as u64 > header.length as u64
    {
        return Err(Error::new("Invalid GLB header"));
    }

    let mut total = GlbHeader::SIZE as u64 + json_length;
    if total > quotas.max_file_size {
        return Err(Error::new("Quota exceeded : file size > max_file_size"));
    }

    let mut json = vec![0u8; json_length as usize];
    input.read_exact(&mut json)?;

    let mut binary = None;
    if total < header.length as u64 {
        let mut raw = [0u8; ChunkHeader::SIZE];
        input.read_exact(&mut raw)?;
        let chunk = ChunkHeader::read_from_bytes(&raw[..]).map_err(|_| Error::new("Invalid GLB header"))?;
        if chunk.chunk_type != CHUNK_BIN {
            return Err(Error::new("Invalid GLB header").with_value(format!("chunk type {:#010x}", chunk.chunk_type)));
        }

        total += ChunkHeader::SIZE as u64 + chunk.length as u64;
        if total > quotas.max_file_size {
            return Err(Error::new("Quota exceeded : file size > max_file_size"));
        }

        let mut data = vec![0u8; chunk.length as usize];
        input.read_exact(&mut data)?;
        binary = Some(data);
    }

    debug!(
        length = header.length,
        json = json_length,
        binary = binary.as_ref().map_or(0, Vec::len),
        "read GLB container"
    );
    create(&json, root, quotas, binary.as_deref())
}

/// Load a `.glb` file.
pub fn load_from_binary_file(path: impl AsRef<Path>, quotas: &ReadQuotas) -> Result<Document> {
    let path = path.as_ref();
    let input = BufReader::new(File::open(path)?);
    load_from_binary(input, &document_root(path), quotas)
}

/// Parse the JSON and materialize every buffer.
fn create(json: &[u8], root: &Path, quotas: &ReadQuotas, binary: Option<&[u8]>) -> Result<Document> {
    let mut document = Document::from_json(json)?;

    if document.buffers.len() > quotas.max_buffer_count {
        return Err(Error::new("Quota exceeded : number of buffers > max_buffer_count")
            .with_value(document.buffers.len().to_string()));
    }

    for (index, buffer) in document.buffers.iter_mut().enumerate() {
        let length = buffer.byte_length;
        if length == 0 {
            return Err(Error::new("Invalid buffer.byteLength value : 0"));
        }
        if length > quotas.max_buffer_byte_length {
            return Err(Error::new("Quota exceeded : buffer.byteLength > max_buffer_byte_length")
                .with_value(length.to_string()));
        }

        if !buffer.uri.is_empty() {
            if buffer.is_embedded_resource() {
                buffer.materialize_embedded()?;
            } else {
                let path = buffer_uri_path(root, &buffer.uri)?;
                let mut file = File::open(&path)
                    .map_err(|e| Error::new("Invalid buffer.uri value").with_value(buffer.uri.clone()).with_source(e))?;
                let mut data = vec![0u8; length as usize];
                file.read_exact(&mut data)
                    .map_err(|e| Error::new("Invalid buffer.uri value").with_value(buffer.uri.clone()).with_source(e))?;
                buffer.data = data;
            }
        } else {
            let binary = binary.filter(|_| index == 0).ok_or_else(|| {
                Error::new("Invalid glTF document. Buffer with empty uri has no BIN chunk").with_value(index.to_string())
            })?;
            let data = binary
                .get(..length as usize)
                .ok_or_else(|| Error::new("Invalid GLB buffer data").with_value(format!("{} < {length}", binary.len())))?;
            buffer.data = data.to_vec();
        }
    }

    Ok(document)
}
