use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vicsek_sim::{Flock, FlockParams, NeighborSearch};

fn flock_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("flock_step");

    for &count in &[40usize, 400, 2_000] {
        for search in [NeighborSearch::BruteForce, NeighborSearch::Grid] {
            let params = FlockParams {
                particle_count: count,
                radius: 0.05,
                noise: 0.3,
                neighbor_search: search,
                ..FlockParams::default()
            };
            let Ok(mut flock) = Flock::new(params, 0xBE7C) else {
                panic!("benchmark parameters must be valid");
            };

            group.bench_with_input(
                BenchmarkId::new(format!("{search:?}"), count),
                &count,
                |b, _| {
                    b.iter(|| {
                        flock.step();
                        black_box(flock.polarisation())
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, flock_step);
criterion_main!(benches);
