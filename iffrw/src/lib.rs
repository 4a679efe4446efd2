#![doc = include_str!("lib.md")]

use core::fmt::{Debug, Display, Formatter};
use std::error;
use std::io::{Read, Seek, Write};

use binrw::binrw;
use tracing::instrument;

pub mod check;
pub mod chunk;
pub mod io;
pub mod path;
pub mod registry;
pub mod testing;

pub use check::{check, check_with_report, CheckMessage, QualityLevel};
pub use chunk::group::{GroupContents, GroupKind};
pub use chunk::raw::RawContents;
pub use chunk::{Chunk, ChunkBody};
pub use path::AttributePath;
pub use registry::{AppChunkFactory, AppContents, ChunkRegistry};

// identifiers
// ----

/// IFF identifier: four bytes, treated as an opaque big-endian word but
/// conventionally four printable ASCII characters.
///
/// Space padding is significant: `"CAT "` is not `"CAT\0"`.
#[binrw]
#[brw(big)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

/// Chunk id of the `FORM` group.
pub const FORM: FourCC = FourCC(*b"FORM");
/// Chunk id of the `LIST` group.
pub const LIST: FourCC = FourCC(*b"LIST");
/// Chunk id of the `CAT ` group (note the trailing space).
pub const CAT_: FourCC = FourCC(*b"CAT ");
/// Chunk id of the `PROP` group.
pub const PROP: FourCC = FourCC(*b"PROP");

impl FourCC {
    /// The all-spaces wildcard used as the contents type of heterogeneous
    /// `CAT `s (and accepted for `LIST`s).
    pub const BLANK: FourCC = FourCC(*b"    ");

    /// Whether this id names one of the four structural group chunks.
    pub fn is_group_id(self) -> bool {
        matches!(self, FORM | LIST | CAT_ | PROP)
    }

    /// Whether this is a legal identifier: four printable ASCII bytes, the
    /// first neither a space nor a digit, and space padding only at the
    /// tail.
    pub fn is_valid_id(self) -> bool {
        let bytes = self.0;
        if bytes.iter().any(|byte| !(0x20..=0x7e).contains(byte)) {
            return false;
        }
        if bytes[0] == b' ' || bytes[0].is_ascii_digit() {
            return false;
        }
        // Interior spaces are not padding.
        let mut padding = false;
        for byte in bytes {
            if byte == b' ' {
                padding = true;
            } else if padding {
                return false;
            }
        }
        true
    }

    /// Whether this id may appear as a `FORM` or `PROP` contents type: a
    /// legal identifier that is not itself a reserved group id.
    pub fn is_valid_form_type(self) -> bool {
        self.is_valid_id() && !self.is_group_id()
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(f, "FourCC(*b\"{}\")", self)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(value: &[u8; 4]) -> Self {
        FourCC(*value)
    }
}

impl<'a> PartialEq<&'a [u8; 4]> for FourCC {
    fn eq(&self, other: &&'a [u8; 4]) -> bool {
        self.0 == **other
    }
}

// errors
// ----

/// Reading or writing failed.
///
/// Both variants carry the [`AttributePath`] of the location where the
/// failure occurred, cloned by value so the error stays useful after the
/// partially built tree is gone.
#[derive(Debug)]
pub enum IffError {
    /// Short read, short write, or an underlying stream failure.
    Io {
        /// Where in the hierarchy the failure occurred.
        path: AttributePath,
        /// The attribute being processed.
        attribute: &'static str,
        /// How many more bytes were expected.
        expected: u64,
        /// The underlying cause.
        source: std::io::Error,
    },
    /// The bytes (or the in-memory tree) violate the container format.
    Structure {
        /// Where in the hierarchy the violation sits.
        path: AttributePath,
        /// What was violated.
        error: StructureError,
    },
}

/// The structural violations the parser and serializer can encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)] // variant fields are self-describing
pub enum StructureError {
    /// A contents type that is not a legal identifier.
    InvalidFormType(FourCC),
    /// A reserved group id used as a contents type.
    ReservedFormType(FourCC),
    /// A chunk declaring a negative body size.
    NegativeSize { id: FourCC, size: i32 },
    /// A group too small to hold its 4-byte type word.
    GroupTooSmall { id: FourCC, size: i32 },
    /// A `PROP` chunk at the top level of a file.
    PropOutsideList,
    /// A child id that is illegal inside its group kind.
    IllegalChildId { group: FourCC, child: FourCC },
    /// A child whose declared size exceeds the group's remaining body.
    ChildOverflow {
        child: FourCC,
        declared: i32,
        remaining: i64,
    },
    /// Group body bytes left over that cannot hold a chunk header.
    TrailingBytes { group: FourCC, remaining: i64 },
    /// Chunk contents processed more bytes than the declared size.
    ContentsOverrun {
        id: FourCC,
        declared: i32,
        processed: i64,
    },
    /// Summed child sizes overflow the signed 32-bit size field.
    SizeOverflow { id: FourCC },
}

impl IffError {
    pub(crate) fn short_io(
        path: &AttributePath,
        attribute: &'static str,
        expected: u64,
        err: binrw::Error,
    ) -> Self {
        let source = match err {
            binrw::Error::Io(err) => err,
            other => std::io::Error::other(other.to_string()),
        };
        IffError::Io {
            path: path.clone(),
            attribute,
            expected,
            source,
        }
    }

    pub(crate) fn structure(path: &AttributePath, error: StructureError) -> Self {
        IffError::Structure {
            path: path.clone(),
            error,
        }
    }

    // Raise the expected-byte count of an I/O error to the full unread
    // remainder of the enclosing group.
    pub(crate) fn widen_expected(self, at_least: u64) -> Self {
        match self {
            IffError::Io {
                path,
                attribute,
                expected,
                source,
            } => IffError::Io {
                path,
                attribute,
                expected: expected.max(at_least),
                source,
            },
            IffError::Structure { .. } => self,
        }
    }
}

impl Display for IffError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            IffError::Io {
                path,
                attribute,
                expected,
                source,
            } => write!(
                f,
                "I/O error at {path}: expected {expected} more bytes for {attribute}: {source}"
            ),
            IffError::Structure { path, error } => {
                write!(f, "structural error at {path}: {error}")
            }
        }
    }
}

impl error::Error for IffError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            IffError::Io { source, .. } => Some(source),
            IffError::Structure { .. } => None,
        }
    }
}

impl Display for StructureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            StructureError::InvalidFormType(id) => {
                write!(f, "{id:?} is not a valid form type identifier")
            }
            StructureError::ReservedFormType(id) => {
                write!(f, "group id {id} used as a form type")
            }
            StructureError::NegativeSize { id, size } => {
                write!(f, "chunk {id} declares negative size {size}")
            }
            StructureError::GroupTooSmall { id, size } => {
                write!(f, "group {id} size {size} cannot hold its type word")
            }
            StructureError::PropOutsideList => {
                write!(f, "PROP chunk is only valid inside a LIST")
            }
            StructureError::IllegalChildId { group, child } => {
                write!(f, "{child} is not a legal child of {group}")
            }
            StructureError::ChildOverflow {
                child,
                declared,
                remaining,
            } => write!(
                f,
                "child {child} declares {declared} bytes but only {remaining} remain in the group"
            ),
            StructureError::TrailingBytes { group, remaining } => write!(
                f,
                "{remaining} trailing bytes in {group} cannot hold a chunk header"
            ),
            StructureError::ContentsOverrun {
                id,
                declared,
                processed,
            } => write!(
                f,
                "chunk {id} contents processed {processed} bytes of a declared {declared}"
            ),
            StructureError::SizeOverflow { id } => {
                write!(f, "summed size of {id} overflows the signed 32-bit size field")
            }
        }
    }
}

impl error::Error for StructureError {}

// top-level operations
// ----

/// Reads one chunk hierarchy from a stream.
///
/// The top-level chunk is normally a `FORM`, `LIST` or `CAT `; a leaf is
/// accepted as a degenerate case and dispatched through the registry, but
/// a top-level `PROP` is a structural error. Freeing the returned tree is
/// `Drop`.
#[instrument(level = "debug", skip(reader, registry))]
pub fn read<R: Read + Seek>(
    reader: &mut R,
    registry: &ChunkRegistry,
) -> Result<Chunk, IffError> {
    let reader: &mut dyn io::ReadSeek = reader;
    let mut path = AttributePath::new();
    let id = io::read_id(reader, &path, "chunkId")?;
    let size = io::read_long(reader, &path, "chunkSize")?;
    if size < 0 {
        return Err(IffError::structure(
            &path,
            StructureError::NegativeSize { id, size },
        ));
    }
    match GroupKind::from_id(id) {
        Some(GroupKind::Prop) => {
            Err(IffError::structure(&path, StructureError::PropOutsideList))
        }
        Some(kind) => {
            path.push_chunk(id);
            let contents = chunk::group::read_group(reader, kind, size, registry, None, &mut path)?;
            io::read_padding_byte(reader, &path, size)?;
            path.pop();
            Ok(Chunk {
                id,
                size,
                body: ChunkBody::Group(contents),
            })
        }
        None => {
            path.push_chunk(id);
            let chunk = chunk::read_leaf(reader, id, size, registry, None, &mut path)?;
            io::read_padding_byte(reader, &path, size)?;
            path.pop();
            Ok(chunk)
        }
    }
}

/// Writes a chunk hierarchy to a stream.
///
/// Group sizes are recomputed from the children before emission; for a
/// tree produced by [`read`] they equal the parsed sizes, so the output is
/// byte-identical to the input.
#[instrument(level = "debug", skip(writer, chunk, registry))]
pub fn write<W: Write + Seek>(
    writer: &mut W,
    chunk: &Chunk,
    registry: &ChunkRegistry,
) -> Result<(), IffError> {
    let writer: &mut dyn io::WriteSeek = writer;
    let mut path = AttributePath::new();
    path.push_chunk(chunk.id);
    let body = chunk::write_chunk(writer, chunk, registry, &mut path)?;
    io::write_padding_byte(writer, &path, body as i32)?;
    path.pop();
    Ok(())
}

/// Prints a human-readable dump of a chunk hierarchy, starting at the
/// given indent level. Informational only; no round-trip guarantee.
pub fn print<W: Write>(out: &mut W, chunk: &Chunk, indent: usize) -> std::io::Result<()> {
    chunk::print_chunk(out, chunk, indent)
}

/// Deep structural equality of two chunk hierarchies.
pub fn compare(a: &Chunk, b: &Chunk) -> bool {
    a == b
}

#[allow(clippy::dbg_macro)]
#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::testing::hex_to_cursor;

    #[test]
    fn fourcc() {
        let f = FourCC(*b"TST ");

        assert_eq!(f.to_string(), "TST ");
        assert_eq!(format!("{f:?}"), r#"FourCC(*b"TST ")"#);
        assert_eq!(f, b"TST ");
    }

    #[test]
    fn fourcc_validity() {
        assert!(FourCC(*b"ILBM").is_valid_id());
        assert!(FourCC(*b"MD5 ").is_valid_id());
        assert!(FourCC(*b"a-z~").is_valid_id());

        // leading space, leading digit, interior space, unprintable
        assert!(!FourCC(*b" BAD").is_valid_id());
        assert!(!FourCC(*b"1BIT").is_valid_id());
        assert!(!FourCC(*b"A B ").is_valid_id());
        assert!(!FourCC(*b"AB\x01C").is_valid_id());
        assert!(!FourCC::BLANK.is_valid_id());

        assert!(FourCC(*b"ILBM").is_valid_form_type());
        assert!(!FORM.is_valid_form_type());
        assert!(!PROP.is_valid_form_type());
        assert!(CAT_.is_group_id());
    }

    #[test]
    fn prop_at_top_level_is_structural() {
        let mut buff = hex_to_cursor("50524F50 00000004 494C424D");
        let registry = ChunkRegistry::new();
        let err = read(&mut buff, &registry).unwrap_err();
        assert!(matches!(
            err,
            IffError::Structure {
                error: StructureError::PropOutsideList,
                ..
            }
        ));
    }

    #[test]
    fn negative_top_level_size_is_structural() {
        let mut buff = hex_to_cursor("464F524D 80000000 494C424D");
        let registry = ChunkRegistry::new();
        let err = read(&mut buff, &registry).unwrap_err();
        assert!(matches!(
            err,
            IffError::Structure {
                error: StructureError::NegativeSize { .. },
                ..
            }
        ));
    }

    #[test]
    fn top_level_leaf_is_a_degenerate_read() {
        // A bare odd-sized leaf: body plus pad byte.
        let mut buff = hex_to_cursor("424F4459 00000003 010203 00");
        let registry = ChunkRegistry::new();
        let chunk = read(&mut buff, &registry).unwrap();
        assert_eq!(chunk.id, FourCC(*b"BODY"));
        assert_eq!(chunk.size, 3);
        assert_eq!(buff.position(), 12);
    }

    #[test]
    fn unknown_chunks_fall_back_to_raw() {
        // FORM "XXXX" containing a chunk id the registry knows nothing
        // about; the body bytes must survive untouched.
        let wire = "464F524D 0000000E 58585858 59595959 00000002 AABB";
        let mut buff = hex_to_cursor(wire);
        let registry = ChunkRegistry::new();
        let chunk = read(&mut buff, &registry).unwrap();
        let leaf = &chunk.children()[0];
        assert_eq!(leaf.id, FourCC(*b"YYYY"));
        match &leaf.body {
            ChunkBody::Raw(raw) => assert_eq!(raw.data(), &[0xaa, 0xbb]),
            _ => panic!("expected raw fallback"),
        }

        let mut out = Cursor::new(Vec::new());
        write(&mut out, &chunk, &registry).unwrap();
        assert_eq!(out.get_ref(), hex_to_cursor(wire).get_ref());
    }

    #[test]
    fn truncated_header_is_io() {
        let mut buff = hex_to_cursor("464F52");
        let registry = ChunkRegistry::new();
        let err = read(&mut buff, &registry).unwrap_err();
        match err {
            IffError::Io { attribute, .. } => assert_eq!(attribute, "chunkId"),
            IffError::Structure { .. } => panic!("expected an I/O error"),
        }
    }

    #[test]
    fn error_display_carries_the_path() {
        let ilbm = FourCC(*b"ILBM");
        let list = Chunk::list(
            ilbm,
            vec![Chunk::raw(FourCC(*b"BODY"), vec![1]).unwrap()],
        )
        .unwrap();
        let registry = ChunkRegistry::new();
        let mut buff = Cursor::new(Vec::new());
        // LIST children must be PROP or FORM; serialization is permissive,
        // so the malformed tree writes fine and the reader flags it.
        write(&mut buff, &list, &registry).unwrap();
        buff.set_position(0);
        let err = read(&mut buff, &registry).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("structural error at LIST.ILBM / BODY[0]"), "{text}");
        assert!(text.contains("not a legal child"), "{text}");
    }

    #[test]
    fn roundtrip_equality_matches_comparator() {
        let registry = ChunkRegistry::new();
        let tree = Chunk::form(
            FourCC(*b"TEST"),
            vec![
                Chunk::text("hello").unwrap(),
                Chunk::raw(FourCC(*b"BODY"), vec![1, 2, 3, 4, 5]).unwrap(),
            ],
        )
        .unwrap();
        let mut buff = Cursor::new(Vec::new());
        write(&mut buff, &tree, &registry).unwrap();
        buff.set_position(0);
        let after = read(&mut buff, &registry).unwrap();
        assert!(compare(&tree, &after));
        assert_eq!(tree, after);
    }
}
