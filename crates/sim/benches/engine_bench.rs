use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use evodyn_sim::base::PayoffMap;
use evodyn_sim::model::{ConstantSelection, MatrixGame, PublicGoods};
use evodyn_sim::network::GeometryConfig;
use evodyn_sim::population::{FitnessLedger, ScoringMode};
use evodyn_sim::simulation::{MutationConfig, PopulationUpdate, SimulationBuilder};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::hint::black_box;

fn bench_pick_fit_focal(c: &mut Criterion) {
    let mut group = c.benchmark_group("pick_fit_focal");
    for size in [50usize, 1_000, 100_000] {
        let mut ledger = FitnessLedger::new(size, PayoffMap::Identity, ScoringMode::Average, true);
        for i in 0..size {
            ledger.set_score_at(i, 1.0 + (i % 7) as f64, 1);
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &ledger, |b, ledger| {
            b.iter(|| black_box(ledger.pick_fit_focal(&mut rng, None).unwrap()))
        });
    }
    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    let size = 1_024;
    group.throughput(Throughput::Elements(size as u64));

    group.bench_function("pd_well_mixed", |b| {
        b.iter_batched(
            || {
                SimulationBuilder::new()
                    .model(MatrixGame::prisoners_dilemma(1.2, 0.2))
                    .population_size(size)
                    .mutation(MutationConfig::temperature(0.01))
                    .seed(1)
                    .build()
                    .unwrap()
            },
            |mut sim| {
                sim.step(1.0).unwrap();
                black_box(sim)
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("pd_lattice", |b| {
        b.iter_batched(
            || {
                SimulationBuilder::new()
                    .model(MatrixGame::prisoners_dilemma(1.2, 0.2))
                    .population_size(size)
                    .geometry(GeometryConfig::Square { periodic: true })
                    .mutation(MutationConfig::temperature(0.01))
                    .seed(1)
                    .build()
                    .unwrap()
            },
            |mut sim| {
                sim.step(1.0).unwrap();
                black_box(sim)
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("public_goods_lattice", |b| {
        b.iter_batched(
            || {
                SimulationBuilder::new()
                    .model(PublicGoods::new(4.0, 1.0).unwrap())
                    .population_size(size)
                    .geometry(GeometryConfig::Square { periodic: true })
                    .mutation(MutationConfig::temperature(0.01))
                    .seed(1)
                    .build()
                    .unwrap()
            },
            |mut sim| {
                sim.step(1.0).unwrap();
                black_box(sim)
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("moran_constant", |b| {
        b.iter_batched(
            || {
                SimulationBuilder::new()
                    .model(ConstantSelection::mutant(1.1))
                    .population_size(size)
                    .update(PopulationUpdate::MoranBirthDeath)
                    .mutation(MutationConfig::temperature(0.001))
                    .seed(1)
                    .build()
                    .unwrap()
            },
            |mut sim| {
                sim.step(1.0).unwrap();
                black_box(sim)
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_pick_fit_focal, bench_generation);
criterion_main!(benches);
