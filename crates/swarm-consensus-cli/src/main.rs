use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use swarm_consensus_core::rng::replicate_seed;
use swarm_consensus_core::{Environment, SimConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swarm-consensus")]
#[command(about = "Swarm collective decision simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation until the swarm adapts or time runs out
    Run {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the seed from the config
        #[arg(long)]
        seed: Option<u64>,

        /// Replicate index; derives an independent seed from the base seed
        #[arg(long)]
        replicate: Option<usize>,

        /// Output directory for results (optional)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print agent positions and states while stepping a simulation
    Trace {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print one frame every N ticks
        #[arg(long, default_value_t = 200)]
        every: u64,

        /// Stop after this many ticks (default: the experiment length)
        #[arg(long)]
        ticks: Option<usize>,
    },
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let file = File::open(path)
        .with_context(|| format!("failed to open config file {}", path.display()))?;
    let config: SimConfig =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse config")?;
    config.validate().context("config validation error")?;
    Ok(config)
}

fn run(
    config: SimConfig,
    seed: Option<u64>,
    replicate: Option<usize>,
    out: Option<PathBuf>,
) -> Result<()> {
    let base_seed = seed.unwrap_or(config.seed);
    let seed = replicate.map_or(base_seed, |index| replicate_seed(base_seed, index));
    let config = SimConfig { seed, ..config };

    println!(
        "Simulating {} agents on a {}x{} grid for up to {} time units (seed {seed})...",
        config.num_agents, config.grid_width, config.grid_height, config.experiment_length
    );
    let mut env = Environment::new(config).context("failed to initialise environment")?;
    let outcome = env.run().context("simulation aborted")?;

    if let Some(out_dir) = out {
        std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
        let outcome_path = out_dir.join("outcome.json");
        let file = File::create(outcome_path).context("failed to create outcome file")?;
        serde_json::to_writer_pretty(file, &outcome).context("failed to write outcome")?;
        println!("Run complete. Results saved to {}", out_dir.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
    }
    Ok(())
}

fn trace(config: SimConfig, every: u64, max_ticks: Option<usize>) -> Result<()> {
    let every = every.max(1);
    let mut env = Environment::new(config).context("failed to initialise environment")?;
    let mut remaining = max_ticks.unwrap_or(usize::MAX);
    while remaining > 0 {
        let Some(report) = env.step().context("simulation aborted")? else {
            break;
        };
        remaining -= 1;
        if report.time % every == 0 {
            print_frame(&env, report.time);
        }
        if report.adapted {
            println!(
                "t={} adapted (first crossing at t={})",
                report.time,
                env.adaptation_time().unwrap_or(report.time)
            );
            break;
        }
    }
    Ok(())
}

fn print_frame(env: &Environment, time: u64) {
    let counts = env.state_counts();
    println!("t={time} states={counts:?}");
    for agent in env.agents() {
        let [x, y] = agent.position();
        println!(
            "  agent {:>4} at ({x:>8.3}, {y:>8.3}) state {:>2} estimate {:.3}",
            agent.id,
            agent.decision().index(),
            agent.committed_estimate()
        );
    }
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = SimConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run {
            config,
            seed,
            replicate,
            out,
        } => {
            let config = load_config(config.as_deref())?;
            run(config, seed, replicate, out)?;
        }
        Commands::Trace {
            config,
            every,
            ticks,
        } => {
            let config = load_config(config.as_deref())?;
            trace(config, every, ticks)?;
        }
    }
    Ok(())
}
