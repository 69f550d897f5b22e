use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::time::Duration;
use warehouse_core::{
    RetrievalPolicy, TargetSearch, WarehouseConfig, World, default_shelf_positions,
};

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(fallback)
}

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    let samples: usize = env_or("WH_BENCH_SAMPLES", 30).max(10);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(env_or("WH_BENCH_WARMUP_SECS", 2)));
    group.measurement_time(Duration::from_secs(env_or("WH_BENCH_MEASURE_SECS", 10)));
    let steps: usize = env_or("WH_BENCH_STEPS", 64).max(1);
    let side: u32 = env_or("WH_BENCH_SIDE", 128).max(8);
    let robots_list: Vec<usize> = std::env::var("WH_BENCH_ROBOTS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![50_usize, 200, 800]);

    let searches = [
        ("registry", TargetSearch::Registry),
        ("bucketed", TargetSearch::Bucketed { cell_size: 16 }),
    ];
    for &robots in &robots_list {
        for (label, search) in searches {
            group.bench_function(format!("{label}_steps{steps}_robots{robots}"), |b| {
                b.iter_batched(
                    || {
                        let config = WarehouseConfig {
                            width: side,
                            height: side,
                            num_robots: robots,
                            num_boxes: robots * 4,
                            shelf_positions: default_shelf_positions(side, side),
                            shelf_max_height: u32::MAX,
                            retrieval_policy: RetrievalPolicy::SeekNearest,
                            target_search: search,
                            rng_seed: Some(0xBEEF),
                            history_capacity: 1,
                            ..WarehouseConfig::default()
                        };
                        World::new(config).expect("world")
                    },
                    |mut world| {
                        for _ in 0..steps {
                            if world.step().is_err() {
                                break;
                            }
                        }
                    },
                    BatchSize::LargeInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
