//! Path-aware primitives for the fixed-width, big-endian wire format.
//!
//! Every primitive takes the current [`AttributePath`] and the name of the
//! attribute being processed; a short read or write surfaces as
//! [`IffError::Io`] carrying both, plus the number of bytes that were still
//! expected.

use std::io::{Read, Seek, Write};

use binrw::{BinReaderExt, BinWriterExt};
use tracing::warn;

use crate::path::AttributePath;
use crate::{FourCC, IffError};

/// Reader bound for all parsing entry points.
///
/// `Seek` is required by the `binrw` codec; any `Cursor` or buffered file
/// qualifies.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Writer bound for all serializing entry points.
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// Reads an unsigned byte.
pub fn read_ubyte(
    mut reader: &mut dyn ReadSeek,
    path: &AttributePath,
    attribute: &'static str,
) -> Result<u8, IffError> {
    reader
        .read_be::<u8>()
        .map_err(|err| IffError::short_io(path, attribute, 1, err))
}

/// Writes an unsigned byte.
pub fn write_ubyte(
    mut writer: &mut dyn WriteSeek,
    path: &AttributePath,
    attribute: &'static str,
    value: u8,
) -> Result<(), IffError> {
    writer
        .write_be(&value)
        .map_err(|err| IffError::short_io(path, attribute, 1, err))
}

/// Reads an unsigned 16-bit big-endian word.
pub fn read_uword(
    mut reader: &mut dyn ReadSeek,
    path: &AttributePath,
    attribute: &'static str,
) -> Result<u16, IffError> {
    reader
        .read_be::<u16>()
        .map_err(|err| IffError::short_io(path, attribute, 2, err))
}

/// Writes an unsigned 16-bit big-endian word.
pub fn write_uword(
    mut writer: &mut dyn WriteSeek,
    path: &AttributePath,
    attribute: &'static str,
    value: u16,
) -> Result<(), IffError> {
    writer
        .write_be(&value)
        .map_err(|err| IffError::short_io(path, attribute, 2, err))
}

/// Reads a signed 16-bit big-endian word.
pub fn read_word(
    mut reader: &mut dyn ReadSeek,
    path: &AttributePath,
    attribute: &'static str,
) -> Result<i16, IffError> {
    reader
        .read_be::<i16>()
        .map_err(|err| IffError::short_io(path, attribute, 2, err))
}

/// Writes a signed 16-bit big-endian word.
pub fn write_word(
    mut writer: &mut dyn WriteSeek,
    path: &AttributePath,
    attribute: &'static str,
    value: i16,
) -> Result<(), IffError> {
    writer
        .write_be(&value)
        .map_err(|err| IffError::short_io(path, attribute, 2, err))
}

/// Reads an unsigned 32-bit big-endian long.
pub fn read_ulong(
    mut reader: &mut dyn ReadSeek,
    path: &AttributePath,
    attribute: &'static str,
) -> Result<u32, IffError> {
    reader
        .read_be::<u32>()
        .map_err(|err| IffError::short_io(path, attribute, 4, err))
}

/// Writes an unsigned 32-bit big-endian long.
pub fn write_ulong(
    mut writer: &mut dyn WriteSeek,
    path: &AttributePath,
    attribute: &'static str,
    value: u32,
) -> Result<(), IffError> {
    writer
        .write_be(&value)
        .map_err(|err| IffError::short_io(path, attribute, 4, err))
}

/// Reads a signed 32-bit big-endian long (the chunk size field type).
pub fn read_long(
    mut reader: &mut dyn ReadSeek,
    path: &AttributePath,
    attribute: &'static str,
) -> Result<i32, IffError> {
    reader
        .read_be::<i32>()
        .map_err(|err| IffError::short_io(path, attribute, 4, err))
}

/// Writes a signed 32-bit big-endian long.
pub fn write_long(
    mut writer: &mut dyn WriteSeek,
    path: &AttributePath,
    attribute: &'static str,
    value: i32,
) -> Result<(), IffError> {
    writer
        .write_be(&value)
        .map_err(|err| IffError::short_io(path, attribute, 4, err))
}

/// Reads a 4-byte identifier.
pub fn read_id(
    mut reader: &mut dyn ReadSeek,
    path: &AttributePath,
    attribute: &'static str,
) -> Result<FourCC, IffError> {
    reader
        .read_be::<FourCC>()
        .map_err(|err| IffError::short_io(path, attribute, 4, err))
}

/// Writes a 4-byte identifier.
pub fn write_id(
    mut writer: &mut dyn WriteSeek,
    path: &AttributePath,
    attribute: &'static str,
    value: FourCC,
) -> Result<(), IffError> {
    writer
        .write_be(&value)
        .map_err(|err| IffError::short_io(path, attribute, 4, err))
}

/// Consumes the remainder of a chunk body that the contents reader left
/// unprocessed. Returns the updated processed-byte count (the full body).
pub fn skip_unknown_bytes(
    reader: &mut dyn ReadSeek,
    path: &AttributePath,
    chunk_id: FourCC,
    chunk_size: i32,
    bytes_processed: i64,
) -> Result<i64, IffError> {
    let remainder = i64::from(chunk_size) - bytes_processed;
    if remainder <= 0 {
        return Ok(bytes_processed);
    }
    warn!("{chunk_id}: skipping {remainder} unparsed bytes");
    let copied = std::io::copy(
        &mut (&mut *reader).take(remainder as u64),
        &mut std::io::sink(),
    )
    .map_err(|err| IffError::short_io(path, "chunkData", remainder as u64, err.into()))?;
    if copied < remainder as u64 {
        return Err(IffError::short_io(
            path,
            "chunkData",
            remainder as u64,
            std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into(),
        ));
    }
    Ok(i64::from(chunk_size))
}

/// Emits zero bytes for the remainder of a chunk body that the contents
/// writer did not produce. Mirror of [`skip_unknown_bytes`].
pub fn write_zero_filler_bytes(
    writer: &mut dyn WriteSeek,
    path: &AttributePath,
    chunk_id: FourCC,
    chunk_size: i32,
    bytes_processed: i64,
) -> Result<i64, IffError> {
    let remainder = i64::from(chunk_size) - bytes_processed;
    if remainder <= 0 {
        return Ok(bytes_processed);
    }
    warn!("{chunk_id}: filling {remainder} unwritten bytes with zeroes");
    std::io::copy(
        &mut std::io::repeat(0).take(remainder as u64),
        &mut (&mut *writer),
    )
    .map_err(|err| IffError::short_io(path, "chunkData", remainder as u64, err.into()))?;
    Ok(i64::from(chunk_size))
}

/// Consumes the single zero pad byte that follows a chunk with an odd body
/// size. No-op for even sizes.
pub fn read_padding_byte(
    mut reader: &mut dyn ReadSeek,
    path: &AttributePath,
    chunk_size: i32,
) -> Result<(), IffError> {
    if chunk_size & 1 == 1 {
        reader
            .read_be::<u8>()
            .map_err(|err| IffError::short_io(path, "paddingByte", 1, err))?;
    }
    Ok(())
}

/// Emits the single zero pad byte after a chunk with an odd body size.
/// No-op for even sizes.
pub fn write_padding_byte(
    mut writer: &mut dyn WriteSeek,
    path: &AttributePath,
    chunk_size: i32,
) -> Result<(), IffError> {
    if chunk_size & 1 == 1 {
        writer
            .write_be(&0u8)
            .map_err(|err| IffError::short_io(path, "paddingByte", 1, err))?;
    }
    Ok(())
}
