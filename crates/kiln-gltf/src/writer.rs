//! GLTF/GLB writing, including the streamed GLB form.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;
use zerocopy::IntoBytes;

use crate::document::{Buffer, Document};
use crate::glb::{
    buffer_uri_path, container_length, document_root, padded, ChunkHeader, GlbHeader, CHUNK_BIN,
};
use crate::{Error, Result};

/// Block size used when copying a streamed payload.
pub const RESTREAM_BLOCK_SIZE: usize = 0x80000;

const SPACES: [u8; 3] = [b' '; 3];
const NULLS: [u8; 3] = [0; 3];

/// Check buffer invariants before writing.
///
/// A streamed write skips the data-length check because the payload is
/// not held in memory.
pub fn validate_buffers(document: &Document, binary: bool, streamed: bool) -> Result<()> {
    if document.buffers.is_empty() {
        return Err(Error::new("Invalid glTF document. A document must have at least 1 buffer."));
    }

    let mut found_binary = false;
    for (index, buffer) in document.buffers.iter().enumerate() {
        if buffer.byte_length == 0 {
            return Err(Error::new("Invalid buffer.byteLength value : 0"));
        }
        if !streamed && !buffer.data.is_empty() && buffer.byte_length as usize != buffer.data.len() {
            return Err(Error::new("Invalid buffer.byteLength value : does not match buffer.data size")
                .with_value(format!("{} != {}", buffer.byte_length, buffer.data.len())));
        }
        if buffer.uri.is_empty() {
            found_binary = true;
            if index != 0 {
                return Err(Error::new(
                    "Invalid glTF document. Only the first buffer may have an empty buffer.uri field.",
                ));
            }
        }
    }

    if binary && !found_binary {
        return Err(Error::new(
            "Invalid glTF document. No buffer found which can meet the criteria for saving to a .glb file.",
        ));
    }
    Ok(())
}

/// Write a document as `.glb` (`binary`) or pretty `.gltf` JSON.
///
/// Buffers other than the GLB-embedded first one that are neither embedded
/// data URIs nor empty are written to files under `root`.
pub fn save<W: Write>(document: &Document, output: &mut W, root: &Path, binary: bool) -> Result<()> {
    validate_buffers(document, binary, false)?;

    let mut external_from = 0;
    if binary {
        let json = document.to_json(false)?;
        let json_length = to_u32(json.len())?;
        let json_padded = pad_json(json_length)?;

        let bin = &document.buffers[0];
        if bin.data.len() != bin.byte_length as usize {
            return Err(Error::new("Invalid GLB buffer data")
                .with_value(format!("{} != {}", bin.data.len(), bin.byte_length)));
        }
        let bin_padded = pad_binary(bin.byte_length)?;
        let length = container_length(json_padded, bin_padded).ok_or_else(|| too_large(bin.byte_length))?;

        output.write_all(GlbHeader::new(length, json_padded).as_bytes())?;
        output.write_all(json.as_bytes())?;
        output.write_all(&SPACES[..(json_padded - json_length) as usize])?;

        let chunk = ChunkHeader {
            length: bin_padded,
            chunk_type: CHUNK_BIN,
        };
        output.write_all(chunk.as_bytes())?;
        output.write_all(&bin.data)?;
        output.write_all(&NULLS[..(bin_padded - bin.byte_length) as usize])?;

        debug!(length, json = json_padded, binary = bin_padded, "wrote GLB container");
        external_from = 1;
    } else {
        output.write_all(document.to_json(true)?.as_bytes())?;
    }

    write_external_buffers(&document.buffers[external_from..], root)
}

/// Write a document to a file; relative buffers land beside it.
pub fn save_file(document: &Document, path: impl AsRef<Path>, binary: bool) -> Result<()> {
    let path = path.as_ref();
    let mut output = BufWriter::new(File::create(path)?);
    save(document, &mut output, &document_root(path), binary)?;
    output.flush()?;
    Ok(())
}

fn write_external_buffers(buffers: &[Buffer], root: &Path) -> Result<()> {
    for buffer in buffers {
        if buffer.is_embedded_resource() || buffer.data.is_empty() {
            continue;
        }
        let path = buffer_uri_path(root, &buffer.uri)?;
        std::fs::write(&path, &buffer.data)
            .map_err(|e| Error::new("Invalid buffer.uri value").with_value(buffer.uri.clone()).with_source(e))?;
        debug!(path = %path.display(), bytes = buffer.data.len(), "wrote external buffer");
    }
    Ok(())
}

fn to_u32(length: usize) -> Result<u32> {
    u32::try_from(length).map_err(|_| Error::new("GLB chunk too large").with_value(length.to_string()))
}

fn too_large(byte_length: u32) -> Error {
    Error::new("Invalid buffer.byteLength value : too large").with_value(byte_length.to_string())
}

fn pad_json(length: u32) -> Result<u32> {
    padded(length).ok_or_else(|| Error::new("GLB chunk too large").with_value(length.to_string()))
}

fn pad_binary(byte_length: u32) -> Result<u32> {
    padded(byte_length).ok_or_else(|| too_large(byte_length))
}

/// Positions recorded by [`stream_binary_headers`] for the final patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamState {
    pub header_begin: u64,
    pub binary_begin: u64,
    pub binary_padding: u32,
    pub json_length: u32,
}

/// Begin a streamed GLB whose first buffer holds `input_size` bytes.
///
/// Adds the first buffer if the document has none. The caller then writes
/// exactly `input_size` bytes to `output` and calls
/// [`stream_binary_finish`].
pub fn stream_binary_headers<W: Write + Seek>(
    document: &mut Document,
    output: &mut W,
    input_size: u32,
) -> Result<StreamState> {
    if document.buffers.is_empty() {
        document.buffers.push(Buffer::default());
    }
    document.buffers[0].byte_length = input_size;
    validate_buffers(document, true, true)?;

    let json = document.to_json(false)?;
    let json_length = to_u32(json.len())?;
    let json_padded = pad_json(json_length)?;
    let bin_padded = pad_binary(input_size)?;
    container_length(json_padded, bin_padded).ok_or_else(|| too_large(input_size))?;

    let header_begin = output.stream_position()?;
    output.write_all(GlbHeader::new(0, 0).as_bytes())?;
    output.write_all(json.as_bytes())?;
    output.write_all(&SPACES[..(json_padded - json_length) as usize])?;

    let chunk = ChunkHeader {
        length: bin_padded,
        chunk_type: CHUNK_BIN,
    };
    output.write_all(chunk.as_bytes())?;
    let binary_begin = output.stream_position()?;

    Ok(StreamState {
        header_begin,
        binary_begin,
        binary_padding: bin_padded - input_size,
        json_length: json_padded,
    })
}

/// Copy exactly `size` bytes from `input` in fixed-size blocks.
pub fn restream<R: Read, W: Write>(output: &mut W, input: &mut R, size: u64) -> Result<()> {
    let mut block = vec![0u8; RESTREAM_BLOCK_SIZE];
    let mut left = size;
    while left > 0 {
        let chunk = (left as usize).min(RESTREAM_BLOCK_SIZE);
        input.read_exact(&mut block[..chunk])?;
        output.write_all(&block[..chunk])?;
        left -= chunk as u64;
    }
    Ok(())
}

/// Pad the payload, patch the container header and write external buffers.
pub fn stream_binary_finish<W: Write + Seek>(
    document: &Document,
    state: &StreamState,
    output: &mut W,
    root: &Path,
) -> Result<()> {
    let written = output.stream_position()? - state.binary_begin;
    let expected = document.buffers.first().map_or(0, |b| b.byte_length as u64);
    if written != expected {
        return Err(Error::new("Buffer size does not match number of bytes written")
            .with_value(format!("{written} != {expected}")));
    }

    output.write_all(&NULLS[..state.binary_padding as usize])?;
    let end = output.stream_position()?;
    let length = to_u32((end - state.header_begin) as usize)?;

    output.seek(SeekFrom::Start(state.header_begin))?;
    output.write_all(GlbHeader::new(length, state.json_length).as_bytes())?;
    output.seek(SeekFrom::Start(end))?;
    output.flush()?;

    debug!(length, binary = written, "finished streamed GLB");
    write_external_buffers(document.buffers.get(1..).unwrap_or_default(), root)
}

/// Stream `input_size` bytes of `input` into a GLB in one call.
pub fn stream_binary_full<R: Read, W: Write + Seek>(
    document: &mut Document,
    input: &mut R,
    input_size: u32,
    output: &mut W,
    root: &Path,
) -> Result<()> {
    if document.buffers.is_empty() {
        document.buffers.push(Buffer {
            byte_length: input_size,
            ..Default::default()
        });
    }
    let state = stream_binary_headers(document, output, input_size)?;
    restream(output, input, input_size as u64)?;
    stream_binary_finish(document, &state, output, root)
}
