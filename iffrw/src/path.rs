//! Breadcrumb trail locating a position inside a chunk hierarchy.
//!
//! Every read and write threads an [`AttributePath`] along so that errors
//! can report exactly where they occurred, e.g.
//! `FORM.ILBM / BODY[12].chunkData`. Frames are pushed on descent and
//! popped on ascent; errors clone the path by value so they stay usable
//! after the partially built tree is gone.

use core::fmt::{Display, Formatter};

use crate::FourCC;

/// One step of an [`AttributePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A chunk frame: the chunk id, the group's contents type once known,
    /// and the chunk's position among its siblings (absent at top level).
    Chunk {
        /// Chunk id of the frame.
        id: FourCC,
        /// Contents type, filled in after the group header is read.
        form_type: Option<FourCC>,
        /// Position among siblings.
        index: Option<usize>,
    },
    /// A named field inside the current chunk.
    Field(&'static str),
    /// An array index inside the current field.
    Index(usize),
}

/// Ordered breadcrumb stack identifying a location in a chunk hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<PathSegment>,
}

impl AttributePath {
    /// Creates an empty path (the top level of a file).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a chunk without a sibling position (the top-level chunk).
    pub fn push_chunk(&mut self, id: FourCC) {
        self.segments.push(PathSegment::Chunk {
            id,
            form_type: None,
            index: None,
        });
    }

    /// Enters the `index`th child chunk of the current group.
    pub fn push_indexed_chunk(&mut self, id: FourCC, index: usize) {
        self.segments.push(PathSegment::Chunk {
            id,
            form_type: None,
            index: Some(index),
        });
    }

    /// Annotates the innermost chunk frame with its contents type, once
    /// the group header has been read.
    pub fn set_form_type(&mut self, form_type: FourCC) {
        if let Some(PathSegment::Chunk {
            form_type: slot, ..
        }) = self.segments.last_mut()
        {
            *slot = Some(form_type);
        }
    }

    /// Enters a named field of the current chunk.
    pub fn push_field(&mut self, name: &'static str) {
        self.segments.push(PathSegment::Field(name));
    }

    /// Enters an array element of the current field.
    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    /// Leaves the innermost segment.
    pub fn pop(&mut self) {
        self.segments.pop();
    }

    /// The segments from outermost to innermost.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl Display for AttributePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "(top level)");
        }
        let mut first = true;
        for segment in &self.segments {
            match segment {
                PathSegment::Chunk {
                    id,
                    form_type,
                    index,
                } => {
                    if !first {
                        write!(f, " / ")?;
                    }
                    write!(f, "{id}")?;
                    if let Some(form_type) = form_type {
                        write!(f, ".{form_type}")?;
                    }
                    if let Some(index) = index {
                        write!(f, "[{index}]")?;
                    }
                }
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
            first = false;
        }
        Ok(())
    }
}
