//! tumble CLI - run canned physics scenes from the terminal
//!
//! Steps a built-in scene with an optional TOML world config, prints
//! periodic summaries and can checkpoint the body state as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tumble::{World, WorldConfig, WorldSnapshot};

mod scenes;

use scenes::Scene;

#[derive(Parser)]
#[command(name = "tumble")]
#[command(about = "Run rigid-body scenes with the tumble physics engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step a built-in scene
    Run {
        /// Scene to build
        #[arg(value_enum)]
        scene: Scene,
        /// Number of steps to take
        #[arg(short = 'n', long, default_value_t = 500)]
        steps: usize,
        /// Body count for scenes that scale (stack height, chain length)
        #[arg(long, default_value_t = 5)]
        size: usize,
        /// World config in TOML (see `tumble config`)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print a summary every this many steps (0 prints only the last)
        #[arg(long, default_value_t = 100)]
        every: usize,
        /// Restore body state from a JSON snapshot before stepping
        #[arg(long)]
        resume: Option<PathBuf>,
        /// Write the final body state as a JSON snapshot
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
    /// Print the default world config as TOML
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scene,
            steps,
            size,
            config,
            every,
            resume,
            snapshot,
        } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => WorldConfig::default(),
            };
            let mut world = World::with_config(config)?;
            world.set_error_hook(Box::new(|e: &tumble::PhysicsError| tracing::error!(error = %e, "step failed")));
            scenes::build(&mut world, scene, size)?;
            if let Some(path) = resume {
                let json = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                world.restore(&WorldSnapshot::from_json(&json)?)?;
                info!(path = %path.display(), "resumed from snapshot");
            }
            run(&mut world, steps, every)?;
            print_bodies(&world);
            if let Some(path) = snapshot {
                write_snapshot(&world, &path)?;
            }
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&WorldConfig::default())?);
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<WorldConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: WorldConfig = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn run(world: &mut World, steps: usize, every: usize) -> Result<()> {
    let dt = world.config().timestep;
    for i in 1..=steps {
        world.step(dt)?;
        if (every > 0 && i % every == 0) || i == steps {
            let stats = world.last_step_stats();
            println!(
                "t={:>7.3}s  bodies={:<4} contacts={:<4} rows={:<4} solver={:<11} iters={:<3} ke={:.4}",
                i as f64 * dt,
                stats.bodies,
                stats.contacts,
                stats.rows,
                stats.solver.map(|p| format!("{p:?}")).unwrap_or_else(|| "-".into()),
                stats.iterations,
                world.kinetic_energy(),
            );
        }
    }
    Ok(())
}

fn print_bodies(world: &World) {
    for (i, (_, body)) in world.bodies().enumerate() {
        let p = body.position();
        let v = body.linear_velocity();
        println!(
            "body {i:>3}: pos=({:.3}, {:.3}, {:.3}) vel=({:.3}, {:.3}, {:.3}){}",
            p.x,
            p.y,
            p.z,
            v.x,
            v.y,
            v.z,
            if body.is_enabled() { "" } else { " asleep" },
        );
    }
}

fn write_snapshot(world: &World, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&world.snapshot())?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote snapshot to {}", path.display());
    Ok(())
}
