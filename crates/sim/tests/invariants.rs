//! Bookkeeping invariants that must survive arbitrary event sequences.

use evodyn_sim::base::{PayoffMap, ACCOUNTING_TOLERANCE};
use evodyn_sim::model::{MatrixGame, PublicGoods, TraitModel};
use evodyn_sim::network::GeometryConfig;
use evodyn_sim::population::{Population, SamplingType, UpdateRule, VACANT};
use evodyn_sim::simulation::{
    MigrationConfig, MigrationType, MutationConfig, PopulationUpdate, Simulation,
    SimulationBuilder, SpeciesConfig, SpeciesUpdate,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

fn check_ledger<M: TraitModel>(pop: &Population<M>) -> Result<(), TestCaseError> {
    let ledger = pop.ledger();
    let expected = ledger.recomputed_sum();
    let tol = ACCOUNTING_TOLERANCE * ledger.sum_fitness().abs().max(1.0);
    prop_assert!(
        (ledger.sum_fitness() - expected).abs() <= tol,
        "running total {} vs recomputed {}",
        ledger.sum_fitness(),
        expected
    );
    let mut occupied = 0;
    for i in 0..pop.size() {
        if ledger.is_vacant(i) {
            prop_assert_eq!(ledger.score_at(i), 0.0);
            prop_assert_eq!(ledger.fitness_at(i), 0.0);
            prop_assert_eq!(ledger.interactions_at(i), VACANT);
        } else {
            occupied += 1;
            prop_assert!(ledger.fitness_at(i) <= ledger.max_fitness() + 1e-12);
        }
    }
    prop_assert_eq!(occupied, ledger.occupied());
    Ok(())
}

fn check_all<M: TraitModel>(sim: &Simulation<M>) -> Result<(), TestCaseError> {
    sim.species().iter().try_for_each(check_ledger)
}

/// Every occupied slot scores what a from-scratch rescoring gives it.
fn check_fresh<M: TraitModel + Clone>(pop: &Population<M>) -> Result<(), TestCaseError> {
    let mut fresh = pop.clone();
    fresh.rescore_all(&mut Xoshiro256PlusPlus::seed_from_u64(0));
    for i in (0..pop.size()).filter(|&i| !pop.ledger().is_vacant(i)) {
        let (now, expected) = (pop.ledger().score_at(i), fresh.ledger().score_at(i));
        prop_assert!(
            (now - expected).abs() <= 1e-8 * expected.abs().max(1.0),
            "slot {} scores {} instead of {}",
            i,
            now,
            expected
        );
    }
    Ok(())
}

fn run_fresh<M: TraitModel + Clone>(
    mut cfg: SpeciesConfig<M>,
    net: GeometryConfig,
    update: PopulationUpdate,
    mutation: f64,
    seed: u64,
) -> Result<(), TestCaseError> {
    cfg.interaction = net;
    cfg.update = update;
    cfg.mutation = MutationConfig::temperature(mutation);
    cfg.payoff_map = PayoffMap::Exponential {
        baseline: 1.0,
        selection: 0.5,
    };
    let mut sim = SimulationBuilder::new().species(cfg).seed(seed).build().unwrap();
    for _ in 0..5 {
        if sim.step(1.0).unwrap() < 0.0 {
            break;
        }
        sim.species().iter().try_for_each(check_fresh)?;
    }
    Ok(())
}

fn async_update() -> impl Strategy<Value = PopulationUpdate> {
    prop_oneof![
        Just(PopulationUpdate::Async),
        Just(PopulationUpdate::OnceEach),
        Just(PopulationUpdate::MoranBirthDeath),
        Just(PopulationUpdate::MoranDeathBirth),
        Just(PopulationUpdate::MoranImitate),
    ]
}

fn geometry() -> impl Strategy<Value = (usize, GeometryConfig)> {
    prop_oneof![
        (2usize..40).prop_map(|n| (n, GeometryConfig::WellMixed)),
        (3usize..40).prop_map(|n| (n, GeometryConfig::Ring)),
        (2usize..7).prop_map(|side| (side * side, GeometryConfig::Square { periodic: true })),
        (2usize..7).prop_map(|side| (side * side, GeometryConfig::Square { periodic: false })),
    ]
}

fn update() -> impl Strategy<Value = PopulationUpdate> {
    prop_oneof![
        Just(PopulationUpdate::Async),
        Just(PopulationUpdate::OnceEach),
        Just(PopulationUpdate::MoranBirthDeath),
        Just(PopulationUpdate::MoranDeathBirth),
        Just(PopulationUpdate::MoranImitate),
        Just(PopulationUpdate::Ecology),
    ]
}

fn rule() -> impl Strategy<Value = UpdateRule> {
    prop_oneof![
        Just(UpdateRule::Imitate),
        Just(UpdateRule::ImitateBetter),
        Just(UpdateRule::Thermal),
        Just(UpdateRule::Proportional),
        Just(UpdateRule::Best),
        Just(UpdateRule::BestRandom),
        Just(UpdateRule::BestResponse),
    ]
}

fn migration() -> impl Strategy<Value = MigrationConfig> {
    prop_oneof![
        Just(MigrationConfig::default()),
        (0.0..0.3f64).prop_map(|p| MigrationConfig::new(MigrationType::Diffusion, p)),
        (0.0..0.3f64).prop_map(|p| MigrationConfig::new(MigrationType::BirthDeath, p)),
        (0.0..0.3f64).prop_map(|p| MigrationConfig::new(MigrationType::DeathBirth, p)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn matrix_game_ledger_stays_consistent(
        (size, net) in geometry(),
        update in update(),
        rule in rule(),
        migration in migration(),
        benefit in 1.0..4.0f64,
        cost in 0.0..1.0f64,
        mutation in 0.0..0.2f64,
        seed in any::<u64>(),
    ) {
        let model = MatrixGame::prisoners_dilemma(benefit, cost).with_ecology(0.3);
        let mut cfg = SpeciesConfig::new("pd", size, model);
        cfg.interaction = net;
        cfg.update = update;
        cfg.rule = rule;
        cfg.migration = migration;
        cfg.mutation = MutationConfig::temperature(mutation);
        if update == PopulationUpdate::Ecology {
            cfg.vacancy = 0.3;
        }
        let mut sim = SimulationBuilder::new().species(cfg).seed(seed).build().unwrap();
        check_all(&sim)?;
        for _ in 0..10 {
            if sim.step(1.0).unwrap() < 0.0 {
                break;
            }
            check_all(&sim)?;
        }
        check_all(&sim)?;
    }

    #[test]
    fn public_goods_ledger_stays_consistent(
        (size, net) in geometry(),
        r in 1.0..5.0f64,
        mutation in 0.0..0.2f64,
        synchronous in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut cfg = SpeciesConfig::new("pgg", size, PublicGoods::new(r, 1.0).unwrap());
        cfg.interaction = net;
        cfg.mutation = MutationConfig::temperature(mutation);
        if synchronous {
            cfg.update = PopulationUpdate::Synchronous;
        }
        let mut sim = SimulationBuilder::new().species(cfg).seed(seed).build().unwrap();
        for _ in 0..5 {
            if sim.step(1.0).unwrap() < 0.0 {
                break;
            }
            check_all(&sim)?;
        }
    }

    #[test]
    fn matrix_game_scores_match_rescoring(
        (size, net) in geometry(),
        update in async_update(),
        mutation in 0.0..0.3f64,
        seed in any::<u64>(),
    ) {
        let cfg = SpeciesConfig::new("pd", size, MatrixGame::prisoners_dilemma(3.0, 1.0));
        run_fresh(cfg, net, update, mutation, seed)?;
    }

    #[test]
    fn public_goods_scores_match_rescoring(
        (size, net) in geometry(),
        update in async_update(),
        r in 1.0..5.0f64,
        mutation in 0.0..0.3f64,
        seed in any::<u64>(),
    ) {
        let cfg = SpeciesConfig::new("pgg", size, PublicGoods::new(r, 1.0).unwrap());
        run_fresh(cfg, net, update, mutation, seed)?;
    }

    #[test]
    fn sampled_partners_keep_slots_consistent(
        (size, net) in geometry(),
        partners in 1usize..4,
        group in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let sampling = SamplingType::Random(partners);
        if group {
            let mut cfg = SpeciesConfig::new("pgg", size, PublicGoods::new(3.0, 1.0).unwrap());
            cfg.interactions = sampling;
            cfg.interaction = net;
            cfg.mutation = MutationConfig::temperature(0.1);
            let mut sim = SimulationBuilder::new().species(cfg).seed(seed).build().unwrap();
            sim.step(3.0).unwrap();
            sampled_slots_consistent(&sim.species()[0], partners)?;
        } else {
            let mut cfg = SpeciesConfig::new("pd", size, MatrixGame::prisoners_dilemma(3.0, 1.0));
            cfg.interactions = sampling;
            cfg.interaction = net;
            cfg.mutation = MutationConfig::temperature(0.1);
            let mut sim = SimulationBuilder::new().species(cfg).seed(seed).build().unwrap();
            sim.step(3.0).unwrap();
            sampled_slots_consistent(&sim.species()[0], partners)?;
        }
    }

    #[test]
    fn two_species_ledgers_stay_consistent(
        sizes in (2usize..30, 2usize..30),
        scheme in prop_oneof![
            Just(SpeciesUpdate::Size),
            Just(SpeciesUpdate::Fitness),
            Just(SpeciesUpdate::Rate),
            Just(SpeciesUpdate::Turns),
            Just(SpeciesUpdate::Uniform),
        ],
        seed in any::<u64>(),
    ) {
        let mut a = SpeciesConfig::new("a", sizes.0, MatrixGame::snowdrift(3.0, 1.0));
        a.mutation = MutationConfig::temperature(0.05);
        let mut b = SpeciesConfig::new("b", sizes.1, MatrixGame::prisoners_dilemma(2.0, 0.5));
        b.interaction = GeometryConfig::Ring;
        b.rate = 2.0;
        b.mutation = MutationConfig::random(0.05);
        let mut sim = SimulationBuilder::new()
            .species(a)
            .species(b)
            .species_update(scheme)
            .seed(seed)
            .build()
            .unwrap();
        sim.step(5.0).unwrap();
        check_all(&sim)?;
    }
}

/// Under random partner sampling scores are estimates, but each slot's
/// fitness must still follow from its score and the sample size is bounded.
fn sampled_slots_consistent<M: TraitModel>(
    pop: &Population<M>,
    partners: usize,
) -> Result<(), TestCaseError> {
    check_ledger(pop)?;
    let ledger = pop.ledger();
    let map = ledger.payoff_map();
    for i in (0..pop.size()).filter(|&i| !ledger.is_vacant(i)) {
        let expected = map.fitness(ledger.score_at(i));
        prop_assert!((ledger.fitness_at(i) - expected).abs() <= 1e-12 * expected.abs().max(1.0));
        prop_assert!(ledger.interactions_at(i) >= 0);
        prop_assert!(ledger.interactions_at(i) as usize <= partners);
    }
    Ok(())
}
