//! Writes `arango-cluster.toml`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use arango_testcluster::{ClusterConfig, init_cluster};

use super::{ClusterArgs, resolve_config};

pub fn run(dir: &str, force: bool, args: &ClusterArgs) -> Result<()> {
    let path = ClusterConfig::path_in(Path::new(dir));
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = resolve_config(dir, args)?;
    let path = init_cluster(Path::new(dir), &config)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {}", path.display());
    println!();
    println!("  Agents:       {}", config.agent_count);
    println!("  Data servers: {}", config.data_server_count);
    println!("  Coordinators: {}", config.coordinator_count);
    println!("  Image:        {}", config.image);
    println!();
    println!("Inspect the topology with:");
    println!("  arango-testcluster plan --dir {dir}");

    Ok(())
}
