//! Root computation benchmarks: streaming builder vs reference trie.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use stacktrie::merkle::MerkleTrie;
use stacktrie::StackTrie;

/// Sorted random 32-byte keys with 64-byte values.
fn sorted_entries(n: usize) -> Vec<([u8; 32], Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut keys: Vec<[u8; 32]> = (0..n)
        .map(|_| {
            let mut key = [0u8; 32];
            rng.fill_bytes(&mut key);
            key
        })
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys.into_iter()
        .map(|key| {
            let mut value = vec![0u8; 64];
            rng.fill_bytes(&mut value);
            (key, value)
        })
        .collect()
}

fn bench_root_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("root_hash");

    for size in [100usize, 1_000, 10_000] {
        let entries = sorted_entries(size);
        group.throughput(Throughput::Elements(entries.len() as u64));

        group.bench_with_input(BenchmarkId::new("stack_trie", size), &entries, |b, entries| {
            b.iter(|| {
                let mut trie = StackTrie::new();
                for (key, value) in entries {
                    trie.update(key, value).unwrap();
                }
                black_box(trie.hash())
            })
        });

        group.bench_with_input(BenchmarkId::new("merkle_trie", size), &entries, |b, entries| {
            b.iter(|| {
                let mut trie = MerkleTrie::new();
                for (key, value) in entries {
                    trie.insert(key, value.clone());
                }
                black_box(trie.root_hash())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_root_hash);
criterion_main!(benches);
