use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fixedmap::FixedTable;
use rand::{distr::Alphanumeric, Rng};
use std::collections::HashMap;
use tempfile::tempdir;

const KEY_SIZE: usize = 16;
const VALUE_SIZE: usize = 64;

/// Generates fixed-size keys and values for benchmarking.
fn generate_data(size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rng = rand::rng();
    (0..size)
        .map(|_| {
            let key: Vec<u8> = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(KEY_SIZE)
                .collect();
            let val_len = rng.random_range(1..=VALUE_SIZE);
            let value = (&mut rng).sample_iter(&Alphanumeric).take(val_len).collect();
            (key, value)
        })
        .collect()
}

fn benchmark_table_ops(c: &mut Criterion) {
    for &size in &[10_000, 100_000] {
        let mut group = c.benchmark_group(format!("size={size}"));

        let data = generate_data(size);
        let capacity = size * 2;
        let nbuckets = size * 4;

        let dir = tempdir().unwrap();

        let insert_path = dir.path().join("bench_insert.fxmp");
        group.bench_function("FixedTable - insert", |b| {
            b.iter_with_setup(
                || {
                    // A fresh file per iteration so every run starts empty.
                    let _ = std::fs::remove_file(&insert_path);
                    FixedTable::create(&insert_path, KEY_SIZE, VALUE_SIZE, capacity, nbuckets)
                        .unwrap()
                },
                |mut table| {
                    for (k, v) in data.iter() {
                        table.insert_bytes(black_box(k), black_box(v)).unwrap();
                    }
                },
            );
        });

        let get_path = dir.path().join("bench_get.fxmp");
        let mut table =
            FixedTable::create(&get_path, KEY_SIZE, VALUE_SIZE, capacity, nbuckets).unwrap();
        for (k, v) in data.iter() {
            table.insert_bytes(k, v).unwrap();
        }
        group.bench_function("FixedTable - get", |b| {
            b.iter(|| {
                for (k, _) in data.iter() {
                    black_box(table.get_bytes(black_box(k)).unwrap());
                }
            })
        });

        // --- std HashMap baseline ---
        group.bench_function("std HashMap - insert", |b| {
            b.iter(|| {
                let mut map = HashMap::new();
                for (k, v) in data.iter() {
                    map.insert(black_box(k.clone()), black_box(v.clone()));
                }
                map
            })
        });

        let mut std_map = HashMap::new();
        for (k, v) in data.iter() {
            std_map.insert(k.clone(), v.clone());
        }
        group.bench_function("std HashMap - get", |b| {
            b.iter(|| {
                for (k, _) in data.iter() {
                    black_box(std_map.get(black_box(k)));
                }
            })
        });
    }
}

criterion_group!(benches, benchmark_table_ops);
criterion_main!(benches);
