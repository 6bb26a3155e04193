use anyhow::Result;
use evodyn_sim::model::{ConstantSelection, ContinuousSnowdrift, MatrixGame, PublicGoods, TraitModel};
use evodyn_sim::network::GeometryConfig;
use evodyn_sim::population::UpdateRule;
use evodyn_sim::simulation::{
    Configuration, ExecutionConfig, MigrationConfig, MigrationType, MutationConfig,
    PopulationUpdate, SpeciesConfig,
};

use crate::args::{GeometryKind, InitArgs, MigrationKind, ModelKind, RuleKind, UpdateKind};
use crate::commands::validate::check;
use crate::config::{dispatch, RunConfig};
use crate::printing::print_parameters;

pub fn init_config(args: &InitArgs) -> Result<()> {
    eprintln!("🧬 evodyn - Evolutionary Dynamics Simulator");
    eprintln!("============================================\n");

    let config = build_config(args)?;
    dispatch!(&config, c => {
        check(c)?;
        print_parameters(c);
    });
    config.save(&args.output)?;

    println!("✓ Configuration written to {}", args.output.display());
    println!("💡 Use 'evodyn run -c {}' to start the simulation", args.output.display());
    Ok(())
}

pub fn build_config(args: &InitArgs) -> Result<RunConfig> {
    let death_rate = args.death_rate.unwrap_or(0.0);
    let with_ecology = args.death_rate.is_some();
    Ok(match args.model {
        ModelKind::PrisonersDilemma => {
            let game = MatrixGame::prisoners_dilemma(args.benefit, args.cost);
            let game = if with_ecology { game.with_ecology(death_rate) } else { game };
            RunConfig::Matrix(configuration(args, game))
        }
        ModelKind::Snowdrift => {
            let game = MatrixGame::snowdrift(args.benefit, args.cost);
            let game = if with_ecology { game.with_ecology(death_rate) } else { game };
            RunConfig::Matrix(configuration(args, game))
        }
        ModelKind::PublicGoods => RunConfig::PublicGoods(configuration(
            args,
            PublicGoods::new(args.factor, args.cost)?,
        )),
        ModelKind::Constant => {
            let model = ConstantSelection::mutant(args.mutant_fitness);
            let model = if with_ecology { model.with_ecology(death_rate) } else { model };
            RunConfig::Constant(configuration(args, model))
        }
        ModelKind::ContinuousSnowdrift => {
            RunConfig::ContinuousSnowdrift(configuration(args, ContinuousSnowdrift::default()))
        }
    })
}

fn configuration<M: TraitModel>(args: &InitArgs, model: M) -> Configuration<M> {
    let mut species = SpeciesConfig::new("species", args.population_size, model);
    species.interaction = match args.geometry {
        GeometryKind::WellMixed => GeometryConfig::WellMixed,
        GeometryKind::Ring => GeometryConfig::Ring,
        GeometryKind::Square => GeometryConfig::Square { periodic: true },
        GeometryKind::SquareBounded => GeometryConfig::Square { periodic: false },
    };
    species.update = match args.update {
        UpdateKind::Synchronous => PopulationUpdate::Synchronous,
        UpdateKind::OnceEach => PopulationUpdate::OnceEach,
        UpdateKind::Async => PopulationUpdate::Async,
        UpdateKind::MoranBirthDeath => PopulationUpdate::MoranBirthDeath,
        UpdateKind::MoranDeathBirth => PopulationUpdate::MoranDeathBirth,
        UpdateKind::MoranImitate => PopulationUpdate::MoranImitate,
        UpdateKind::Ecology => PopulationUpdate::Ecology,
    };
    species.rule = match args.rule {
        RuleKind::BestResponse => UpdateRule::BestResponse,
        RuleKind::Best => UpdateRule::Best,
        RuleKind::BestRandom => UpdateRule::BestRandom,
        RuleKind::Proportional => UpdateRule::Proportional,
        RuleKind::ImitateBetter => UpdateRule::ImitateBetter,
        RuleKind::Imitate => UpdateRule::Imitate,
        RuleKind::Thermal => UpdateRule::Thermal,
    };
    species.mutation = MutationConfig::temperature(args.mutation);
    let migration = match args.migration {
        MigrationKind::None => MigrationType::None,
        MigrationKind::Diffusion => MigrationType::Diffusion,
        MigrationKind::BirthDeath => MigrationType::BirthDeath,
        MigrationKind::DeathBirth => MigrationType::DeathBirth,
    };
    species.migration = MigrationConfig::new(migration, args.migration_probability);
    species.vacancy = args.vacancy;

    Configuration {
        execution: ExecutionConfig {
            seed: args.seed,
            generations: args.generations,
            report_interval: args.report_every,
            optimize_homo: args.optimize_homo,
            ..ExecutionConfig::default()
        },
        species: vec![species],
    }
}
