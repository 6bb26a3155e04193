use evodyn_sim::model::TraitModel;
use evodyn_sim::simulation::{Configuration, Initialization, Simulation};
use std::fmt::Debug;

pub fn print_parameters<M: TraitModel + Debug>(config: &Configuration<M>) {
    let execution = &config.execution;
    eprintln!("\n📋 Simulation Configuration");
    eprintln!("  • Generations: {} [-g, --generations]", execution.generations);
    eprintln!("  • Report Interval: {}", execution.report_interval);
    match execution.seed {
        Some(seed) => eprintln!("  • Random Seed: {seed} [--seed]"),
        None => eprintln!("  • Random Seed: Random [--seed]"),
    }
    if config.species.len() > 1 {
        eprintln!("  • Species Update: {:?}", execution.species_update);
    }
    if execution.optimize_homo {
        eprintln!("  • Homogeneous States: skipped");
    }

    for species in &config.species {
        eprintln!("\n🧬 Species '{}'", species.name);
        eprintln!("  • Size: {} [-n, --population-size]", species.size);
        eprintln!("  • Model: {:?}", species.model);
        eprintln!("  • Interaction: {:?}", species.interaction);
        if let Some(competition) = &species.competition {
            eprintln!("  • Competition: {competition:?}");
        }
        eprintln!("  • Update: {:?} ({:?})", species.update, species.rule);
        eprintln!("  • Payoff Map: {:?}", species.payoff_map);
        if species.mutation.is_active() {
            eprintln!(
                "  • Mutation: {:?}, p = {:.2e}",
                species.mutation.kind, species.mutation.probability
            );
        } else {
            eprintln!("  • Mutation: Disabled");
        }
        if species.migration.is_active() {
            eprintln!(
                "  • Migration: {:?}, p = {:.2e}",
                species.migration.kind, species.migration.probability
            );
        }
        if species.vacancy > 0.0 {
            eprintln!("  • Vacancy: {:.2}", species.vacancy);
        }
        let init = match &species.init {
            Initialization::Uniform => "uniform",
            Initialization::Monomorphic { .. } => "monomorphic",
            Initialization::Mutant { .. } => "single mutant",
            Initialization::Frequencies { .. } => "frequencies",
            Initialization::Explicit { .. } => "explicit",
        };
        eprintln!("  • Initialization: {init}");
    }
    eprintln!();
}

pub const REPORT_HEADER: &str = "generation,time,species,occupied,mean_trait,mean_fitness";

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// One CSV line per species describing the current state.
pub fn report_lines<M: TraitModel>(sim: &Simulation<M>) -> Vec<String> {
    let traits = sim.mean_trait();
    let fitness = sim.mean_fitness();
    sim.species()
        .iter()
        .zip(traits.iter().zip(&fitness))
        .map(|(pop, (t, f))| {
            format!(
                "{:.4},{:.4},{},{},{},{}",
                sim.generation(),
                sim.real_time(),
                pop.name(),
                pop.occupied(),
                join(t),
                join(f)
            )
        })
        .collect()
}
