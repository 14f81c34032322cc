//! Bestioles - headless runner.
//!
//! Evolves generations of creatures in an in-memory world and prints a
//! summary of the fitness history at the end.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use bestioles::simulation::ecosystem::Ecosystem;
use bestioles::simulation::host::{EntityHost, MemoryHost, Template};
use bestioles::simulation::params::Params;
use bestioles::simulation::random::SimRng;
use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "bestioles")]
#[command(version)]
#[command(about = "Generational artificial-life simulation with neural-network creatures")]
struct Cli {
    /// Parameter file (JSON); missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many generation boundaries
    #[arg(short, long, default_value = "10")]
    generations: u32,

    /// Hard cap on the number of ticks
    #[arg(long, default_value = "1000000")]
    max_ticks: u64,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let params = match &cli.config {
        Some(path) => {
            info!("Loading parameters from {}", path.display());
            Params::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => Params::default(),
    };

    let rng = match cli.seed {
        Some(seed) => {
            info!("Using seed {seed}");
            SimRng::seeded(seed)
        }
        None => SimRng::from_entropy(),
    };

    let mut ecosystem =
        Ecosystem::new(params, MemoryHost::new(), rng).context("invalid parameters")?;

    let started = Instant::now();
    let ticks = ecosystem.run_generations(cli.generations, cli.max_ticks, cli.dt);
    let elapsed = started.elapsed();

    println!();
    println!("=== Summary ===");
    println!(
        "Ticks: {} ({:.1} simulated s, {:.2?} wall, {:.0} ticks/s)",
        ticks,
        ecosystem.time,
        elapsed,
        ticks as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!("Generations: {}", ecosystem.generation());
    println!(
        "Alive: {} creatures, {} food",
        ecosystem.host.count(Template::Creature),
        ecosystem.host.count(Template::Food)
    );
    for report in &ecosystem.stats.reports {
        println!(
            "  gen {:>4}  avg {:>10.3}  best {:>10.3}  mutations {}",
            report.generation, report.avg_fitness, report.best_fitness, report.mutations
        );
    }
    if let Some(best) = ecosystem.stats.best_ever {
        println!(
            "Best ever: generation {} with fitness {:.3}",
            best.generation, best.best_fitness
        );
    }

    Ok(())
}
