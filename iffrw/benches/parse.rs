#![allow(missing_docs)]
use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use iffrw::{Chunk, ChunkRegistry, FourCC};

fn synthetic_tree() -> Chunk {
    let ilbm = FourCC(*b"ILBM");
    let forms: Vec<Chunk> = (0..64)
        .map(|i| {
            Chunk::form(
                ilbm,
                vec![
                    Chunk::raw(FourCC(*b"BMHD"), vec![i as u8; 20]).expect("bench chunk"),
                    Chunk::raw(FourCC(*b"BODY"), vec![i as u8; 1024 + i]).expect("bench chunk"),
                ],
            )
            .expect("bench form")
        })
        .collect();
    let cmap = Chunk::raw(FourCC(*b"CMAP"), vec![0; 768]).expect("bench chunk");
    let prop = Chunk::prop(ilbm, vec![cmap]).expect("bench prop");
    Chunk::list(
        ilbm,
        vec![prop].into_iter().chain(forms).collect::<Vec<_>>(),
    )
    .expect("bench list")
}

fn roundtrip_benchmark(c: &mut Criterion) {
    let registry = ChunkRegistry::new();
    let tree = synthetic_tree();
    let mut wire = Cursor::new(Vec::new());
    iffrw::write(&mut wire, &tree, &registry).expect("serializing bench tree");
    let wire = wire.into_inner();

    c.bench_function("read", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(&wire));
            iffrw::read(&mut cursor, &registry).expect("parsing bench tree")
        });
    });

    c.bench_function("write", |b| {
        b.iter(|| {
            let mut out = Cursor::new(Vec::with_capacity(wire.len()));
            iffrw::write(&mut out, black_box(&tree), &registry).expect("serializing bench tree");
            out
        });
    });
}

criterion_group!(benches, roundtrip_benchmark);
criterion_main!(benches);
