use anyhow::{anyhow, Context, Result};
use evodyn_sim::model::TraitModel;
use evodyn_sim::simulation::{Configuration, Simulation, SimulationBuilder, Snapshot};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::args::RunArgs;
use crate::config::{dispatch, RunConfig};
use crate::printing::{print_parameters, report_lines, REPORT_HEADER};

pub fn run_simulation(args: &RunArgs) -> Result<()> {
    eprintln!("🧬 evodyn - Running Simulation");
    eprintln!("============================================\n");

    let mut config = RunConfig::load(&args.config)?;
    tracing::info!(path = %args.config.display(), model = config.model_name(), "loaded configuration");
    let execution = config.execution_mut();
    if let Some(generations) = args.generations {
        execution.generations = generations;
    }
    if let Some(seed) = args.seed {
        execution.seed = Some(seed);
    }

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    dispatch!(config, c => {
        if args.replicates > 1 {
            run_replicates(c, args, &mut out)?
        } else {
            run_single(c, args, &mut out)?
        }
    });
    out.flush()?;
    Ok(())
}

fn progress_bar(total: f64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total.ceil() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn run_single<M>(config: Configuration<M>, args: &RunArgs, out: &mut dyn Write) -> Result<()>
where
    M: TraitModel + Clone + Debug,
{
    print_parameters(&config);
    let total = config.execution.generations;
    let interval = config.execution.report_interval;
    let mut sim = SimulationBuilder::from_config(config)
        .build()
        .map_err(|e| anyhow!("Failed to initialize simulation: {e}"))?;

    if let Some(path) = &args.resume {
        let snapshot = Snapshot::load(path).map_err(|e| anyhow!("Failed to resume: {e}"))?;
        sim.restore(snapshot).map_err(|e| anyhow!("Failed to resume: {e}"))?;
        eprintln!("📂 Resumed from generation {:.2}", sim.generation());
    } else if args.seed.is_none() {
        eprintln!("  • Seed: {}", sim.seed());
    }

    let pb = if args.progress {
        let pb = progress_bar(total)?;
        pb.set_position(sim.generation() as u64);
        Some(pb)
    } else {
        None
    };

    writeln!(out, "{REPORT_HEADER}")?;
    for line in report_lines(&sim) {
        writeln!(out, "{line}")?;
    }
    while !sim.is_converged() {
        let remaining = total - sim.generation();
        if remaining <= 0.0 {
            break;
        }
        let dt = sim
            .step(interval.min(remaining))
            .map_err(|e| anyhow!("Generation {:.2}: {e}", sim.generation()))?;
        if dt != 0.0 {
            for line in report_lines(&sim) {
                writeln!(out, "{line}")?;
            }
        }
        if let Some(pb) = &pb {
            pb.set_position(sim.generation() as u64);
        }
        if dt == 0.0 {
            break;
        }
    }
    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    if let Some(path) = &args.checkpoint {
        sim.snapshot()
            .save(path)
            .map_err(|e| anyhow!("Failed to write checkpoint: {e}"))?;
        eprintln!("💾 Checkpoint written to {}", path.display());
    }

    eprintln!("\n✓ Simulation complete!");
    eprintln!("  {}", sim.status());
    Ok(())
}

/// Final state of one replicate.
struct Outcome {
    seed: u64,
    generation: f64,
    converged: bool,
    lines: Vec<String>,
}

fn run_replicate<M: TraitModel + Clone>(
    config: &Configuration<M>,
    seed: Option<u64>,
) -> Result<Outcome> {
    let mut config = config.clone();
    config.execution.seed = seed;
    let mut sim: Simulation<M> = SimulationBuilder::from_config(config)
        .build()
        .map_err(|e| anyhow!("Failed to initialize simulation: {e}"))?;
    sim.run().map_err(|e| anyhow!("Seed {}: {e}", sim.seed()))?;
    Ok(Outcome {
        seed: sim.seed(),
        generation: sim.generation(),
        converged: sim.is_converged(),
        lines: report_lines(&sim),
    })
}

fn run_replicates<M>(config: Configuration<M>, args: &RunArgs, out: &mut dyn Write) -> Result<()>
where
    M: TraitModel + Clone + Debug,
{
    if args.resume.is_some() || args.checkpoint.is_some() {
        return Err(anyhow!("checkpoints are only supported for single runs"));
    }
    print_parameters(&config);
    eprintln!("Running {} replicates...", args.replicates);

    let base = config.execution.seed;
    let pb = if args.progress {
        Some(progress_bar(args.replicates as f64)?)
    } else {
        None
    };
    let outcomes = (0..args.replicates)
        .into_par_iter()
        .map(|r| {
            let outcome = run_replicate(&config, base.map(|s| s.wrapping_add(r as u64)));
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            outcome
        })
        .collect::<Result<Vec<_>>>()?;
    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    writeln!(out, "replicate,seed,converged,{REPORT_HEADER}")?;
    let mut converged = 0;
    for (r, outcome) in outcomes.iter().enumerate() {
        converged += usize::from(outcome.converged);
        for line in &outcome.lines {
            writeln!(out, "{r},{},{},{line}", outcome.seed, outcome.converged)?;
        }
    }
    let mean_generation =
        outcomes.iter().map(|o| o.generation).sum::<f64>() / outcomes.len() as f64;
    eprintln!("\n✓ {} replicates complete!", outcomes.len());
    eprintln!("  Converged: {converged}, mean generations: {mean_generation:.2}");
    Ok(())
}
