// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::hint::black_box;
use std::io::IoSlice;

use chainbuf::{ChainBuf, Mempool};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

// Sized like a typical request: a few fields plus a payload.
const MESSAGE: &[u8] = &[0x42; 900];

type BenchBuf = ChainBuf<Mempool<4096>>;

fn new_buf() -> BenchBuf {
    ChainBuf::with_allocator(Mempool::<4096>::new()).expect("bench pool never fails")
}

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("ChainBuf");

    group.bench_function("add_back_900b", |b| {
        b.iter_batched_ref(
            new_buf,
            |buf| {
                buf.add_back(black_box(MESSAGE)).unwrap();
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("add_back_64kb_multi_block", |b| {
        let payload = vec![0x17u8; 64 * 1024];
        b.iter_batched_ref(
            new_buf,
            |buf| {
                buf.add_back(black_box(&payload)).unwrap();
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("get_iov_64kb", |b| {
        let mut buf = new_buf();
        buf.add_back(&vec![0x23u8; 64 * 1024]).unwrap();
        let start = buf.begin();
        let end = buf.end();

        b.iter(|| {
            let mut vecs = [IoSlice::new(&[]); 32];
            black_box(buf.get_iov(&start, &end, &mut vecs))
        });
    });

    group.bench_function("insert_release_cycle", |b| {
        b.iter_batched_ref(
            || {
                let mut buf = new_buf();
                buf.add_back(MESSAGE).unwrap();
                buf.add_back(MESSAGE).unwrap();
                buf
            },
            |buf| {
                let cursor = &buf.begin() + 450;
                buf.insert(&cursor, 16).unwrap();
                buf.release(&cursor, 16);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("append_flush_cycle", |b| {
        b.iter_batched_ref(
            new_buf,
            |buf| {
                buf.add_back(MESSAGE).unwrap();
                buf.flush();
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}
