//! Raw leaf chunks: uninterpreted byte payloads.
//!
//! Every chunk id the registry does not recognize falls back to this
//! representation, so unknown chunks survive a read/write round trip
//! byte-for-byte.

use std::io::Read;
use std::io::Write;

use itertools::Itertools;

use crate::chunk::print_indent;
use crate::io::{ReadSeek, WriteSeek};
use crate::path::AttributePath;
use crate::{FourCC, IffError};

/// Id of text chunks, which pretty-print as a string instead of hex.
pub const TEXT: FourCC = FourCC(*b"TEXT");

/// An uninterpreted chunk body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawContents {
    data: Vec<u8>,
}

impl RawContents {
    /// Wraps a byte buffer as raw chunk contents.
    pub fn new(data: Vec<u8>) -> Self {
        RawContents { data }
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the contents, returning the payload buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn read(
        reader: &mut dyn ReadSeek,
        path: &mut AttributePath,
        size: i32,
    ) -> Result<Self, IffError> {
        path.push_field("chunkData");
        // Allocate as bytes arrive rather than trusting the declared size.
        let mut data = Vec::new();
        let copied = (&mut *reader)
            .take(size as u64)
            .read_to_end(&mut data)
            .map_err(|err| IffError::short_io(path, "chunkData", size as u64, err.into()))?;
        if copied < size as usize {
            let err = IffError::short_io(
                path,
                "chunkData",
                (size as usize - copied) as u64,
                std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into(),
            );
            path.pop();
            return Err(err);
        }
        path.pop();
        Ok(RawContents { data })
    }

    pub(crate) fn write(
        &self,
        writer: &mut dyn WriteSeek,
        path: &mut AttributePath,
    ) -> Result<(), IffError> {
        path.push_field("chunkData");
        let result = writer
            .write_all(&self.data)
            .map_err(|err| IffError::short_io(path, "chunkData", self.data.len() as u64, err.into()));
        path.pop();
        result
    }

    pub(crate) fn print(
        &self,
        out: &mut dyn Write,
        chunk_id: FourCC,
        indent: usize,
    ) -> std::io::Result<()> {
        if chunk_id == TEXT {
            self.print_text(out, indent)
        } else {
            self.print_hex(out, indent)
        }
    }

    fn print_text(&self, out: &mut dyn Write, indent: usize) -> std::io::Result<()> {
        print_indent(out, indent)?;
        write!(out, ".chunkData = \"")?;
        for byte in &self.data {
            match byte {
                b'"' => write!(out, "\\\"")?,
                b'\\' => write!(out, "\\\\")?,
                _ => out.write_all(&[*byte])?,
            }
        }
        writeln!(out, "\",")
    }

    fn print_hex(&self, out: &mut dyn Write, indent: usize) -> std::io::Result<()> {
        print_indent(out, indent)?;
        if self.data.is_empty() {
            return writeln!(out, ".chunkData = {{}},");
        }
        writeln!(out, ".chunkData = {{")?;
        // 10 bytes per line keeps dumps of palette-sized chunks readable.
        let lines = self.data.len().div_ceil(10);
        let groups = self.data.iter().chunks(10);
        for (i, line) in groups.into_iter().enumerate() {
            print_indent(out, indent + 1)?;
            let hex = line.map(|byte| format!("0x{byte:02x}")).join(", ");
            if i + 1 < lines {
                writeln!(out, "{hex},")?;
            } else {
                writeln!(out, "{hex}")?;
            }
        }
        print_indent(out, indent)?;
        writeln!(out, "}},")
    }
}
