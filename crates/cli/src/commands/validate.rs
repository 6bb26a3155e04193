use anyhow::{anyhow, Result};
use evodyn_sim::model::TraitModel;
use evodyn_sim::simulation::{Configuration, SimulationBuilder};
use std::path::Path;

use crate::config::{dispatch, RunConfig};
use crate::printing::print_parameters;

/// Run the check phase of a configuration without simulating.
pub fn check<M: TraitModel + Clone>(config: &Configuration<M>) -> Result<()> {
    SimulationBuilder::from_config(config.clone())
        .build()
        .map_err(|e| anyhow!("Invalid configuration: {e}"))?;
    Ok(())
}

pub fn validate_config(path: &Path) -> Result<()> {
    eprintln!("🔍 Validating configuration: {}", path.display());
    let config = RunConfig::load(path)?;
    eprintln!("  • Model: {}", config.model_name());
    dispatch!(&config, c => {
        check(c)?;
        print_parameters(c);
    });
    println!("✓ Configuration is valid");
    Ok(())
}
