//! The structural group chunks: `FORM`, `LIST`, `CAT ` and `PROP`.
//!
//! Groups nest recursively and carry a 4-byte contents type as the first
//! word of their body. The grammar, per the EA IFF-85 standard:
//!
//! ```text
//! FORM ::= "FORM" #{ FormType (LocalChunk | FORM | LIST | CAT)* }
//! LIST ::= "LIST" #{ ContentsType PROP* (FORM | LIST | CAT)* }
//! CAT  ::= "CAT " #{ ContentsType (FORM | LIST | CAT)* }
//! PROP ::= "PROP" #{ FormType Property* }
//! ```
//!
//! Registry dispatch for leaves is keyed by the nearest enclosing `FORM`'s
//! contents type. A `PROP` body describes defaults for `FORM`s of its own
//! type, so inside a `PROP` that type is the dispatch context instead.

use crate::chunk::{read_leaf, Chunk, ChunkBody};
use crate::io::{self, ReadSeek};
use crate::path::AttributePath;
use crate::registry::ChunkRegistry;
use crate::{FourCC, IffError, StructureError, CAT_, FORM, LIST, PROP};

/// Which of the four structural chunks a group is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// `FORM`: a typed sequence of arbitrary chunks.
    Form,
    /// `LIST`: property defaults followed by forms of a common type.
    List,
    /// `CAT `: a concatenation of forms, lists and cats.
    Cat,
    /// `PROP`: shared defaults, legal only as a `LIST` child.
    Prop,
}

impl GroupKind {
    /// Maps a chunk id to its group kind, or `None` for leaf ids.
    pub fn from_id(id: FourCC) -> Option<GroupKind> {
        match id {
            FORM => Some(GroupKind::Form),
            LIST => Some(GroupKind::List),
            CAT_ => Some(GroupKind::Cat),
            PROP => Some(GroupKind::Prop),
            _ => None,
        }
    }

    /// The chunk id of this group kind.
    pub fn id(self) -> FourCC {
        match self {
            GroupKind::Form => FORM,
            GroupKind::List => LIST,
            GroupKind::Cat => CAT_,
            GroupKind::Prop => PROP,
        }
    }

    // Attribute name of the leading type word, for diagnostics.
    pub(crate) fn contents_attribute(self) -> &'static str {
        match self {
            GroupKind::Form | GroupKind::Prop => "formType",
            GroupKind::List | GroupKind::Cat => "contentsType",
        }
    }
}

/// Body of a structural group chunk.
#[derive(Debug, PartialEq)]
pub struct GroupContents {
    /// Which structural chunk this is.
    pub kind: GroupKind,
    /// The type word leading the group body.
    pub contents_type: FourCC,
    /// Child chunks in on-wire order.
    pub children: Vec<Chunk>,
}

impl GroupContents {
    /// Computes the group body size: the type word plus the encoded size
    /// of every child (header, body, pad byte for odd bodies).
    ///
    /// Sizes are summed in 64 bits; a result that no longer fits the
    /// signed 32-bit size field is an explicit error rather than a silent
    /// wrap.
    pub fn body_size(&self) -> Result<i64, StructureError> {
        let mut total: i64 = 4;
        for child in &self.children {
            let body = child.body_size()?;
            if body > i64::from(i32::MAX) {
                return Err(StructureError::SizeOverflow { id: child.id });
            }
            total += 8 + body + (body & 1);
        }
        if total > i64::from(i32::MAX) {
            return Err(StructureError::SizeOverflow { id: self.kind.id() });
        }
        Ok(total)
    }
}

fn check_child_id(
    kind: GroupKind,
    child_id: FourCC,
    child_kind: Option<GroupKind>,
    path: &AttributePath,
) -> Result<(), IffError> {
    let legal = match kind {
        // Any child id; nested groups recurse. Misplaced PROPs are the
        // validator's concern, not the parser's.
        GroupKind::Form => true,
        GroupKind::List => matches!(child_kind, Some(GroupKind::Prop | GroupKind::Form)),
        GroupKind::Cat => matches!(
            child_kind,
            Some(GroupKind::Form | GroupKind::List | GroupKind::Cat)
        ),
        GroupKind::Prop => child_kind.is_none(),
    };
    if legal {
        Ok(())
    } else {
        Err(IffError::structure(
            path,
            StructureError::IllegalChildId {
                group: kind.id(),
                child: child_id,
            },
        ))
    }
}

fn check_contents_type(
    kind: GroupKind,
    contents_type: FourCC,
    path: &AttributePath,
) -> Result<(), IffError> {
    if matches!(kind, GroupKind::List | GroupKind::Cat) && contents_type == FourCC::BLANK {
        return Ok(());
    }
    if contents_type.is_group_id() {
        return Err(IffError::structure(
            path,
            StructureError::ReservedFormType(contents_type),
        ));
    }
    if !contents_type.is_valid_form_type() {
        return Err(IffError::structure(
            path,
            StructureError::InvalidFormType(contents_type),
        ));
    }
    Ok(())
}

/// Reads a group body of `size` bytes. The caller has consumed the 8-byte
/// header and pushed this group's path frame.
pub(crate) fn read_group(
    reader: &mut dyn ReadSeek,
    kind: GroupKind,
    size: i32,
    registry: &ChunkRegistry,
    outer_context: Option<FourCC>,
    path: &mut AttributePath,
) -> Result<GroupContents, IffError> {
    if size < 4 {
        return Err(IffError::structure(
            path,
            StructureError::GroupTooSmall {
                id: kind.id(),
                size,
            },
        ));
    }
    let contents_type = io::read_id(reader, path, kind.contents_attribute())?;
    path.set_form_type(contents_type);
    check_contents_type(kind, contents_type, path)?;

    // Dispatch context for leaf children: the nearest enclosing FORM's
    // type. A PROP supplies defaults for FORMs of its own type, so its
    // body dispatches under that type.
    let child_context = match kind {
        GroupKind::Form | GroupKind::Prop => Some(contents_type),
        GroupKind::List | GroupKind::Cat => outer_context,
    };

    let mut remaining = i64::from(size) - 4;
    let mut children: Vec<Chunk> = Vec::new();
    while remaining > 0 {
        if remaining < 8 {
            return Err(IffError::structure(
                path,
                StructureError::TrailingBytes {
                    group: kind.id(),
                    remaining,
                },
            ));
        }
        let child_id = io::read_id(reader, path, "chunkId")
            .map_err(|err| err.widen_expected(remaining as u64))?;
        let child_size = io::read_long(reader, path, "chunkSize")
            .map_err(|err| err.widen_expected((remaining - 4) as u64))?;

        let index = children.len();
        path.push_indexed_chunk(child_id, index);
        if child_size < 0 {
            return Err(IffError::structure(
                path,
                StructureError::NegativeSize {
                    id: child_id,
                    size: child_size,
                },
            ));
        }
        let child_kind = GroupKind::from_id(child_id);
        check_child_id(kind, child_id, child_kind, path)?;

        let pad = i64::from(child_size & 1);
        if 8 + i64::from(child_size) + pad > remaining {
            return Err(IffError::structure(
                path,
                StructureError::ChildOverflow {
                    child: child_id,
                    declared: child_size,
                    remaining,
                },
            ));
        }

        let child = match child_kind {
            Some(child_kind) => {
                let contents =
                    read_group(reader, child_kind, child_size, registry, child_context, path)?;
                Chunk {
                    id: child_id,
                    size: child_size,
                    body: ChunkBody::Group(contents),
                }
            }
            None => read_leaf(reader, child_id, child_size, registry, child_context, path)?,
        };
        io::read_padding_byte(reader, path, child_size)?;
        path.pop();

        remaining -= 8 + i64::from(child_size) + pad;
        children.push(child);
    }

    Ok(GroupContents {
        kind,
        contents_type,
        children,
    })
}
