//! The chunk model: a tagged hierarchy of raw leaves, structural groups
//! and application-defined leaves.
//!
//! A [`Chunk`] owns its body outright; trees are freed recursively by
//! `Drop` from the root down. There are no parent back-references: code
//! that needs the enclosing form type receives it as an explicit
//! parameter.

pub mod group;
pub mod raw;

use std::io::Write;

pub use group::{GroupContents, GroupKind};
pub use raw::RawContents;

use crate::io::{self, ReadSeek, WriteSeek};
use crate::path::AttributePath;
use crate::registry::{AppContents, ChunkRegistry};
use crate::{FourCC, IffError, StructureError};

/// A node in an IFF chunk hierarchy.
#[derive(Debug)]
pub struct Chunk {
    /// The 4-byte chunk id.
    pub id: FourCC,
    /// Declared body length in bytes, excluding the 8-byte header and the
    /// pad byte. Signed on the wire.
    pub size: i32,
    /// The chunk payload.
    pub body: ChunkBody,
}

/// The payload variants a chunk can carry.
#[derive(Debug)]
pub enum ChunkBody {
    /// Uninterpreted bytes: the fallback for unregistered chunk ids.
    Raw(RawContents),
    /// One of `FORM`, `LIST`, `CAT `, `PROP` with nested children.
    Group(GroupContents),
    /// A payload interpreted by a registered [`AppContents`] type.
    App(Box<dyn AppContents>),
}

impl Chunk {
    /// Creates a raw leaf chunk; the size is the buffer length. Fails with
    /// [`StructureError::SizeOverflow`] when the buffer exceeds the signed
    /// 32-bit size field.
    pub fn raw(id: FourCC, data: Vec<u8>) -> Result<Chunk, StructureError> {
        let size =
            i32::try_from(data.len()).map_err(|_| StructureError::SizeOverflow { id })?;
        Ok(Chunk {
            id,
            size,
            body: ChunkBody::Raw(RawContents::new(data)),
        })
    }

    /// Creates a `TEXT` chunk from a string.
    pub fn text(text: &str) -> Result<Chunk, StructureError> {
        Chunk::raw(raw::TEXT, text.as_bytes().to_vec())
    }

    /// Creates an application leaf chunk with the given declared size.
    pub fn app(id: FourCC, size: i32, contents: Box<dyn AppContents>) -> Chunk {
        Chunk {
            id,
            size,
            body: ChunkBody::App(contents),
        }
    }

    fn group(
        kind: GroupKind,
        contents_type: FourCC,
        children: Vec<Chunk>,
    ) -> Result<Chunk, StructureError> {
        let contents = GroupContents {
            kind,
            contents_type,
            children,
        };
        let size = contents.body_size()?;
        Ok(Chunk {
            id: kind.id(),
            size: size as i32,
            body: ChunkBody::Group(contents),
        })
    }

    /// Creates a `FORM` group chunk; the size covers all children. Fails
    /// with [`StructureError::SizeOverflow`] when the summed child sizes
    /// exceed the signed 32-bit size field.
    pub fn form(form_type: FourCC, children: Vec<Chunk>) -> Result<Chunk, StructureError> {
        Chunk::group(GroupKind::Form, form_type, children)
    }

    /// Creates a `LIST` group chunk.
    pub fn list(contents_type: FourCC, children: Vec<Chunk>) -> Result<Chunk, StructureError> {
        Chunk::group(GroupKind::List, contents_type, children)
    }

    /// Creates a `CAT ` group chunk.
    pub fn cat(contents_type: FourCC, children: Vec<Chunk>) -> Result<Chunk, StructureError> {
        Chunk::group(GroupKind::Cat, contents_type, children)
    }

    /// Creates a `PROP` group chunk.
    pub fn prop(form_type: FourCC, children: Vec<Chunk>) -> Result<Chunk, StructureError> {
        Chunk::group(GroupKind::Prop, form_type, children)
    }

    /// Whether this chunk is one of the structural groups.
    pub fn is_group(&self) -> bool {
        matches!(self.body, ChunkBody::Group(_))
    }

    /// The group kind, or `None` for leaves.
    pub fn group_kind(&self) -> Option<GroupKind> {
        match &self.body {
            ChunkBody::Group(group) => Some(group.kind),
            _ => None,
        }
    }

    /// The group's contents type, or `None` for leaves.
    pub fn contents_type(&self) -> Option<FourCC> {
        match &self.body {
            ChunkBody::Group(group) => Some(group.contents_type),
            _ => None,
        }
    }

    /// The group's children, or an empty slice for leaves.
    pub fn children(&self) -> &[Chunk] {
        match &self.body {
            ChunkBody::Group(group) => &group.children,
            _ => &[],
        }
    }

    /// Collects every `FORM` of the given type in this tree, in document
    /// order, including the root itself.
    pub fn search_forms(&self, form_type: FourCC) -> Vec<&Chunk> {
        let mut forms = Vec::new();
        self.collect_forms(form_type, &mut forms);
        forms
    }

    fn collect_forms<'a>(&'a self, form_type: FourCC, forms: &mut Vec<&'a Chunk>) {
        if let ChunkBody::Group(group) = &self.body {
            if group.kind == GroupKind::Form && group.contents_type == form_type {
                forms.push(self);
            }
            // PROP bodies hold defaults, not documents.
            if group.kind != GroupKind::Prop {
                for child in &group.children {
                    child.collect_forms(form_type, forms);
                }
            }
        }
    }

    /// For a `LIST`, finds the `PROP` supplying defaults for `FORM`s of
    /// the given type.
    pub fn find_prop(&self, form_type: FourCC) -> Option<&Chunk> {
        match &self.body {
            ChunkBody::Group(group) if group.kind == GroupKind::List => {
                group.children.iter().find(|child| {
                    child.group_kind() == Some(GroupKind::Prop)
                        && child.contents_type() == Some(form_type)
                })
            }
            _ => None,
        }
    }

    // Body length in bytes as it will appear on the wire. Groups are
    // recomputed from their children; leaves report their declared size.
    pub(crate) fn body_size(&self) -> Result<i64, StructureError> {
        match &self.body {
            ChunkBody::Group(group) => group.body_size(),
            ChunkBody::Raw(_) | ChunkBody::App(_) => {
                if self.size < 0 {
                    Err(StructureError::NegativeSize {
                        id: self.id,
                        size: self.size,
                    })
                } else {
                    Ok(i64::from(self.size))
                }
            }
        }
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id || self.size != other.size {
            return false;
        }
        match (&self.body, &other.body) {
            (ChunkBody::Raw(a), ChunkBody::Raw(b)) => a == b,
            (ChunkBody::Group(a), ChunkBody::Group(b)) => a == b,
            (ChunkBody::App(a), ChunkBody::App(b)) => a.compare_contents(b.as_ref()),
            _ => false,
        }
    }
}

/// Reads one leaf chunk body, dispatching through the registry and
/// falling back to raw bytes. The caller has consumed the header and
/// pushed this chunk's path frame.
pub(crate) fn read_leaf(
    reader: &mut dyn ReadSeek,
    id: FourCC,
    size: i32,
    registry: &ChunkRegistry,
    form_context: Option<FourCC>,
    path: &mut AttributePath,
) -> Result<Chunk, IffError> {
    match registry.resolve(form_context, id) {
        Some(factory) => {
            let mut contents = factory(id, size);
            let processed = contents.read_contents(reader, registry, path)?;
            if processed > i64::from(size) {
                return Err(IffError::structure(
                    path,
                    StructureError::ContentsOverrun {
                        id,
                        declared: size,
                        processed,
                    },
                ));
            }
            if processed < i64::from(size) {
                io::skip_unknown_bytes(reader, path, id, size, processed)?;
            }
            if let Some(form_type) = form_context {
                contents.attached(form_type);
            }
            Ok(Chunk {
                id,
                size,
                body: ChunkBody::App(contents),
            })
        }
        None => {
            let contents = RawContents::read(reader, path, size)?;
            Ok(Chunk {
                id,
                size,
                body: ChunkBody::Raw(contents),
            })
        }
    }
}

/// Writes one chunk (header and body), returning the body size emitted so
/// the caller can account for the pad byte. The caller has pushed this
/// chunk's path frame.
pub(crate) fn write_chunk(
    writer: &mut dyn WriteSeek,
    chunk: &Chunk,
    registry: &ChunkRegistry,
    path: &mut AttributePath,
) -> Result<i64, IffError> {
    match &chunk.body {
        ChunkBody::Group(group) => {
            path.set_form_type(group.contents_type);
            let body = group
                .body_size()
                .map_err(|error| IffError::structure(path, error))?;
            io::write_id(writer, path, "chunkId", chunk.id)?;
            io::write_long(writer, path, "chunkSize", body as i32)?;
            io::write_id(
                writer,
                path,
                group.kind.contents_attribute(),
                group.contents_type,
            )?;
            for (index, child) in group.children.iter().enumerate() {
                path.push_indexed_chunk(child.id, index);
                let child_body = write_chunk(writer, child, registry, path)?;
                io::write_padding_byte(writer, path, child_body as i32)?;
                path.pop();
            }
            Ok(body)
        }
        ChunkBody::Raw(raw) => {
            if chunk.size < 0 {
                return Err(IffError::structure(
                    path,
                    StructureError::NegativeSize {
                        id: chunk.id,
                        size: chunk.size,
                    },
                ));
            }
            io::write_id(writer, path, "chunkId", chunk.id)?;
            io::write_long(writer, path, "chunkSize", chunk.size)?;
            let written = raw.data().len() as i64;
            if written > i64::from(chunk.size) {
                return Err(IffError::structure(
                    path,
                    StructureError::ContentsOverrun {
                        id: chunk.id,
                        declared: chunk.size,
                        processed: written,
                    },
                ));
            }
            raw.write(writer, path)?;
            if written < i64::from(chunk.size) {
                io::write_zero_filler_bytes(writer, path, chunk.id, chunk.size, written)?;
            }
            Ok(i64::from(chunk.size))
        }
        ChunkBody::App(app) => {
            if chunk.size < 0 {
                return Err(IffError::structure(
                    path,
                    StructureError::NegativeSize {
                        id: chunk.id,
                        size: chunk.size,
                    },
                ));
            }
            io::write_id(writer, path, "chunkId", chunk.id)?;
            io::write_long(writer, path, "chunkSize", chunk.size)?;
            let written = app.write_contents(writer, registry, path)?;
            if written > i64::from(chunk.size) {
                return Err(IffError::structure(
                    path,
                    StructureError::ContentsOverrun {
                        id: chunk.id,
                        declared: chunk.size,
                        processed: written,
                    },
                ));
            }
            if written < i64::from(chunk.size) {
                io::write_zero_filler_bytes(writer, path, chunk.id, chunk.size, written)?;
            }
            Ok(i64::from(chunk.size))
        }
    }
}

// Two spaces per nesting level.
pub(crate) fn print_indent(out: &mut dyn Write, indent: usize) -> std::io::Result<()> {
    write!(out, "{:width$}", "", width = indent * 2)
}

/// Prints one chunk and its descendants. The dump is informational; it is
/// not meant to round-trip.
pub(crate) fn print_chunk(
    out: &mut dyn Write,
    chunk: &Chunk,
    indent: usize,
) -> std::io::Result<()> {
    print_indent(out, indent)?;
    writeln!(out, "'{}' = {{", chunk.id)?;
    print_indent(out, indent + 1)?;
    writeln!(out, ".chunkSize = {},", chunk.size)?;
    match &chunk.body {
        ChunkBody::Raw(raw) => raw.print(out, chunk.id, indent + 1)?,
        ChunkBody::App(app) => app.print_contents(out, indent + 1)?,
        ChunkBody::Group(group) => {
            print_indent(out, indent + 1)?;
            writeln!(
                out,
                ".{} = '{}',",
                group.kind.contents_attribute(),
                group.contents_type
            )?;
            print_indent(out, indent + 1)?;
            writeln!(out, ".children = [")?;
            for child in &group.children {
                print_chunk(out, child, indent + 2)?;
            }
            print_indent(out, indent + 1)?;
            writeln!(out, "],")?;
        }
    }
    print_indent(out, indent)?;
    writeln!(out, "}},")
}
