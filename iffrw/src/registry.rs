//! Dispatch from chunk ids to application-defined chunk implementations.
//!
//! The parser understands the structural chunks (`FORM`, `LIST`, `CAT `,
//! `PROP`) natively; everything else is a leaf. A [`ChunkRegistry`] teaches
//! the parser how to build typed leaves: it maps a chunk id — optionally
//! scoped to the form type of the enclosing `FORM` — to a factory producing
//! an [`AppContents`] implementation. Lookup falls back from the scoped
//! table to the global table, and finally to the built-in raw-bytes
//! handler, so unknown chunks are never an error.

use core::any::Any;
use core::fmt::Debug;
use std::collections::HashMap;
use std::io::Write;

use crate::check::{CheckMessage, QualityLevel};
use crate::io::{ReadSeek, WriteSeek};
use crate::path::AttributePath;
use crate::{FourCC, IffError};

/// Constructs an empty, typed chunk payload for the given id and declared
/// body size, ready for [`AppContents::read_contents`].
pub type AppChunkFactory = fn(id: FourCC, size: i32) -> Box<dyn AppContents>;

/// The capability record of an application-defined chunk type.
///
/// This is the extension seam of the library: implement it for a payload
/// struct, register a factory, and the parser, serializer, validator,
/// printer and comparator all pick the type up. Resource release has no
/// hook of its own; payloads free themselves through `Drop`.
pub trait AppContents: Debug {
    /// Parses the chunk body. Must consume at most the declared chunk size
    /// and return the number of bytes actually processed; any remainder is
    /// skipped by the caller.
    fn read_contents(
        &mut self,
        reader: &mut dyn ReadSeek,
        registry: &ChunkRegistry,
        path: &mut AttributePath,
    ) -> Result<i64, IffError>;

    /// Serializes the chunk body, returning the number of bytes written.
    /// Shortfalls against the declared chunk size are zero-filled by the
    /// caller.
    fn write_contents(
        &self,
        writer: &mut dyn WriteSeek,
        registry: &ChunkRegistry,
        path: &mut AttributePath,
    ) -> Result<i64, IffError>;

    /// Validates the payload, reporting problems through `report`.
    fn check_contents(
        &self,
        path: &mut AttributePath,
        report: &mut dyn FnMut(CheckMessage),
    ) -> QualityLevel {
        let _ = (path, report);
        QualityLevel::Perfect
    }

    /// Emits a human-readable dump of the payload fields.
    fn print_contents(&self, out: &mut dyn Write, indent: usize) -> std::io::Result<()>;

    /// Structural equality against another payload of (presumably) the
    /// same type. Implementations downcast via [`AppContents::as_any`].
    fn compare_contents(&self, other: &dyn AppContents) -> bool;

    /// Called once the chunk has been attached under a `FORM` (or `PROP`)
    /// context, so payloads can cache the form type they live in.
    fn attached(&mut self, form_type: FourCC) {
        let _ = form_type;
    }

    /// Upcast for [`AppContents::compare_contents`] downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Two-level dispatch table from chunk ids to [`AppChunkFactory`] entries.
///
/// Scoped entries take precedence over global ones; the structural group
/// chunks are handled by the parser itself and can never be registered.
#[derive(Debug, Default)]
pub struct ChunkRegistry {
    scoped: HashMap<(FourCC, FourCC), AppChunkFactory>,
    global: HashMap<FourCC, AppChunkFactory>,
}

impl ChunkRegistry {
    /// Creates an empty registry. Parsing with it yields raw chunks for
    /// every leaf.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `id` in any form context.
    ///
    /// # Panics
    ///
    /// Panics if `id` is one of the reserved group ids; their handling is
    /// built in and not overridable.
    pub fn register(&mut self, id: FourCC, factory: AppChunkFactory) -> &mut Self {
        assert!(
            !id.is_group_id(),
            "{id}: group chunk handling is built in and cannot be registered"
        );
        self.global.insert(id, factory);
        self
    }

    /// Registers a factory for `id` scoped to `FORM`s (and `PROP`s) of
    /// `form_type`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is one of the reserved group ids.
    pub fn register_scoped(
        &mut self,
        form_type: FourCC,
        id: FourCC,
        factory: AppChunkFactory,
    ) -> &mut Self {
        assert!(
            !id.is_group_id(),
            "{id}: group chunk handling is built in and cannot be registered"
        );
        self.scoped.insert((form_type, id), factory);
        self
    }

    /// Looks up the factory for `id` in the given form context: scoped
    /// table first, then global. `None` means the raw fallback applies.
    pub fn resolve(&self, form_context: Option<FourCC>, id: FourCC) -> Option<AppChunkFactory> {
        if let Some(form_type) = form_context {
            if let Some(factory) = self.scoped.get(&(form_type, id)) {
                return Some(*factory);
            }
        }
        self.global.get(&id).copied()
    }
}

#[allow(clippy::dbg_macro)]
#[cfg(test)]
mod test {
    use std::io::Cursor;

    use hexdump::hexdump;

    use super::*;
    use crate::chunk::ChunkBody;
    use crate::{io, Chunk};

    // Minimal app payload for exercising the dispatch machinery.
    #[derive(Debug, Default)]
    struct Stamp {
        year: u16,
        form: Option<FourCC>,
    }

    fn stamp_factory(_id: FourCC, _size: i32) -> Box<dyn AppContents> {
        Box::<Stamp>::default()
    }

    impl AppContents for Stamp {
        fn read_contents(
            &mut self,
            reader: &mut dyn ReadSeek,
            _registry: &ChunkRegistry,
            path: &mut AttributePath,
        ) -> Result<i64, IffError> {
            self.year = io::read_uword(reader, path, "year")?;
            Ok(2)
        }

        fn write_contents(
            &self,
            writer: &mut dyn WriteSeek,
            _registry: &ChunkRegistry,
            path: &mut AttributePath,
        ) -> Result<i64, IffError> {
            io::write_uword(writer, path, "year", self.year)?;
            Ok(2)
        }

        fn print_contents(&self, out: &mut dyn Write, _indent: usize) -> std::io::Result<()> {
            writeln!(out, ".year = {}", self.year)
        }

        fn compare_contents(&self, other: &dyn AppContents) -> bool {
            // The cached form context is incidental, not content.
            other
                .as_any()
                .downcast_ref::<Stamp>()
                .is_some_and(|other| other.year == self.year)
        }

        fn attached(&mut self, form_type: FourCC) {
            self.form = Some(form_type);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn year_of(chunk: &Chunk) -> (u16, Option<FourCC>) {
        match &chunk.body {
            ChunkBody::App(app) => {
                let stamp = app
                    .as_any()
                    .downcast_ref::<Stamp>()
                    .expect("expected a Stamp payload");
                (stamp.year, stamp.form)
            }
            _ => panic!("expected an app chunk, got {chunk:?}"),
        }
    }

    #[test]
    fn scoped_beats_global() {
        let mut registry = ChunkRegistry::new();
        registry.register(FourCC(*b"DATE"), stamp_factory);
        registry.register_scoped(FourCC(*b"ILBM"), FourCC(*b"DATE"), stamp_factory);

        assert!(registry.resolve(None, FourCC(*b"DATE")).is_some());
        assert!(registry
            .resolve(Some(FourCC(*b"ILBM")), FourCC(*b"DATE"))
            .is_some());
        assert!(registry.resolve(None, FourCC(*b"????")).is_none());
    }

    #[test]
    fn scoped_entry_invisible_outside_its_form() {
        let mut registry = ChunkRegistry::new();
        registry.register_scoped(FourCC(*b"ILBM"), FourCC(*b"CMAP"), stamp_factory);

        assert!(registry
            .resolve(Some(FourCC(*b"ILBM")), FourCC(*b"CMAP"))
            .is_some());
        assert!(registry
            .resolve(Some(FourCC(*b"ANIM")), FourCC(*b"CMAP"))
            .is_none());
        assert!(registry.resolve(None, FourCC(*b"CMAP")).is_none());
    }

    #[test]
    #[should_panic(expected = "built in")]
    fn group_ids_not_registrable() {
        let mut registry = ChunkRegistry::new();
        registry.register(FourCC(*b"FORM"), stamp_factory);
    }

    #[test]
    fn dispatch_uses_enclosing_form_type() {
        let ilbm = FourCC(*b"ILBM");
        let date = FourCC(*b"DATE");
        // Serialize with an empty registry (raw leaves), then parse the
        // wire data back with the scoped entry installed.
        let tree = Chunk::list(
            ilbm,
            vec![
                Chunk::prop(ilbm, vec![Chunk::raw(date, vec![0x07, 0xd0]).unwrap()]).unwrap(),
                Chunk::form(ilbm, vec![Chunk::raw(date, vec![0x07, 0xd1]).unwrap()]).unwrap(),
            ],
        )
        .unwrap();
        let empty = ChunkRegistry::new();
        let mut wire = Cursor::new(Vec::new());
        crate::write(&mut wire, &tree, &empty).unwrap();
        wire.set_position(0);

        let mut registry = ChunkRegistry::new();
        registry.register_scoped(ilbm, date, stamp_factory);
        let after = crate::read(&mut wire, &registry).unwrap();

        // Inside the PROP the dispatch context is the PROP's own form
        // type; inside the FORM it is the FORM's. Both hit the scoped
        // entry and both payloads get the attach hook.
        let prop_leaf = &after.children()[0].children()[0];
        assert_eq!(year_of(prop_leaf), (2000, Some(ilbm)));
        let form_leaf = &after.children()[1].children()[0];
        assert_eq!(year_of(form_leaf), (2001, Some(ilbm)));
    }

    #[test]
    fn app_chunks_roundtrip() {
        let ilbm = FourCC(*b"ILBM");
        let date = FourCC(*b"DATE");
        let mut registry = ChunkRegistry::new();
        registry.register(date, stamp_factory);

        let tree = Chunk::form(
            ilbm,
            vec![Chunk::app(
                date,
                2,
                Box::new(Stamp {
                    year: 1985,
                    form: None,
                }),
            )],
        )
        .unwrap();
        let mut wire = Cursor::new(Vec::new());
        crate::write(&mut wire, &tree, &registry).unwrap();
        hexdump(wire.get_ref());
        wire.set_position(0);
        let after = crate::read(&mut wire, &registry).unwrap();
        assert_eq!(after, tree);
        assert_eq!(year_of(&after.children()[0]), (1985, Some(ilbm)));
    }

    #[test]
    fn app_reader_shortfall_skips_tail() {
        // A DATE chunk with 2 trailing bytes the Stamp reader ignores;
        // the parser must still consume the whole declared body.
        let mut registry = ChunkRegistry::new();
        registry.register(FourCC(*b"DATE"), stamp_factory);
        let mut wire = crate::testing::hex_to_cursor(
            "464F524D 00000010 494C424D 44415445 00000004 07D0FFFF",
        );
        let chunk = crate::read(&mut wire, &registry).unwrap();
        assert_eq!(year_of(&chunk.children()[0]).0, 2000);
        assert_eq!(wire.position(), 24);
    }
}
