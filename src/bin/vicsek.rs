use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::info;
use vicsek_sim::epidemic::{validate_gamma, DEFAULT_GAMMA, DEFAULT_RING_SIZE};
use vicsek_sim::experiment::{entropy_seed, DEFAULT_HISTOGRAM_BINS};
use vicsek_sim::{
    run_sweep, survival_probability, EpidemicSweep, Flock, FlockParams, NeighborSearch,
    NoiseModel, Ring, SweepConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "vicsek",
    version,
    about = "Vicsek flocking noise sweeps and ring-epidemic runs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep the noise level and record the final polarisation of every trial.
    Sweep(SweepArgs),
    /// Run one flock and print every time step as a JSON line.
    Trace {
        #[arg(long, default_value_t = 40)]
        particles: usize,
        #[arg(long, default_value_t = 0.5)]
        radius: f64,
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 0.01)]
        dt: f64,
        #[arg(long, default_value_t = 1.0)]
        horizon: f64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, value_enum, default_value_t = NoiseArg::Scaled)]
        noise_model: NoiseArg,
        #[arg(long)]
        brute_force: bool,
    },
    /// Probability that the ring epidemic survives, per recovery probability.
    Epidemic {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        serial: bool,
    },
    /// Print the ring state after every step, one row per step.
    Ring {
        #[arg(long, default_value_t = DEFAULT_RING_SIZE)]
        size: usize,
        #[arg(long, default_value_t = DEFAULT_GAMMA)]
        gamma: f64,
        #[arg(long, default_value_t = 100)]
        steps: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// JSON file with a sweep configuration; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    particles: Option<usize>,
    #[arg(long)]
    radius: Option<f64>,
    #[arg(long)]
    dt: Option<f64>,
    #[arg(long)]
    horizon: Option<f64>,
    #[arg(long)]
    noise_min: Option<f64>,
    #[arg(long)]
    noise_max: Option<f64>,
    #[arg(long)]
    noise_steps: Option<usize>,
    #[arg(long)]
    trials: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum)]
    noise_model: Option<NoiseArg>,
    /// Run every trial on the current thread.
    #[arg(long)]
    serial: bool,
    #[arg(long, value_enum, default_value_t = SweepOutput::Records)]
    output: SweepOutput,
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    bins: usize,
}

impl SweepArgs {
    fn apply(&self, sweep: &mut SweepConfig) {
        if let Some(particles) = self.particles {
            sweep.particle_count = particles;
        }
        if let Some(radius) = self.radius {
            sweep.radius = radius;
        }
        if let Some(dt) = self.dt {
            sweep.dt = dt;
        }
        if let Some(horizon) = self.horizon {
            sweep.horizon = horizon;
        }
        if let Some(noise_min) = self.noise_min {
            sweep.noise_min = noise_min;
        }
        if let Some(noise_max) = self.noise_max {
            sweep.noise_max = noise_max;
        }
        if let Some(noise_steps) = self.noise_steps {
            sweep.noise_steps = noise_steps;
        }
        if let Some(trials) = self.trials {
            sweep.trials = trials;
        }
        if self.seed.is_some() {
            sweep.seed = self.seed;
        }
        if let Some(noise_model) = self.noise_model {
            sweep.noise_model = noise_model.into();
        }
        if self.serial {
            sweep.parallel = false;
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NoiseArg {
    Scaled,
    HalfWidth,
}

impl From<NoiseArg> for NoiseModel {
    fn from(value: NoiseArg) -> Self {
        match value {
            NoiseArg::Scaled => NoiseModel::Scaled,
            NoiseArg::HalfWidth => NoiseModel::HalfWidth,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SweepOutput {
    /// Full JSON result with every (noise, trial) record.
    Records,
    /// Mean and standard deviation per noise level.
    Summary,
    /// 2-D histogram of polarisation against noise.
    Histogram,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Sweep(args) => {
            let mut sweep: SweepConfig = load_json_or_default(args.config.clone())?;
            args.apply(&mut sweep);
            sweep_command(&sweep, args.output, args.bins)
        }
        Command::Trace {
            particles,
            radius,
            noise,
            dt,
            horizon,
            seed,
            noise_model,
            brute_force,
        } => {
            let params = FlockParams {
                particle_count: particles,
                radius,
                noise,
                dt,
                horizon,
                noise_model: noise_model.into(),
                neighbor_search: if brute_force {
                    NeighborSearch::BruteForce
                } else {
                    NeighborSearch::Grid
                },
            };
            trace_command(params, seed)
        }
        Command::Epidemic {
            config,
            seed,
            serial,
        } => {
            let mut sweep: EpidemicSweep = load_json_or_default(config)?;
            if seed.is_some() {
                sweep.seed = seed;
            }
            if serial {
                sweep.parallel = false;
            }
            let result = survival_probability(&sweep).context("epidemic sweep failed")?;
            write_json(&result)
        }
        Command::Ring {
            size,
            gamma,
            steps,
            seed,
        } => ring_command(size, gamma, steps, seed),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn load_json_or_default<T>(path: Option<PathBuf>) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let json = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse config {}", path.display()))
}

fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    serde_json::to_writer_pretty(&mut out, value).context("failed to write JSON")?;
    writeln!(out)?;
    Ok(())
}

fn sweep_command(sweep: &SweepConfig, output: SweepOutput, bins: usize) -> Result<()> {
    let result = run_sweep(sweep).context("noise sweep failed")?;
    info!(seed = result.seed, "Sweep seed");

    match output {
        SweepOutput::Records => write_json(&result),
        SweepOutput::Summary => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            writeln!(out, "{:>8} {:>8} {:>10} {:>10}", "eta", "trials", "mean", "std_dev")?;
            for summary in result.mean_by_noise() {
                writeln!(
                    out,
                    "{:>8.4} {:>8} {:>10.6} {:>10.6}",
                    summary.noise, summary.trials, summary.mean, summary.std_dev
                )?;
            }
            Ok(())
        }
        SweepOutput::Histogram => {
            let histogram = result.histogram2d(bins, bins).context("histogram failed")?;
            write_json(&histogram)
        }
    }
}

fn trace_command(params: FlockParams, seed: Option<u64>) -> Result<()> {
    let seed = match seed {
        Some(seed) => seed,
        None => entropy_seed()?,
    };
    let mut flock = Flock::new(params, seed).context("invalid flock parameters")?;
    info!(seed, steps = params.step_count(), "Tracing flock");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    serde_json::to_writer(&mut out, &flock.frame())?;
    writeln!(out)?;
    for _ in 0..params.step_count() {
        flock.step();
        serde_json::to_writer(&mut out, &flock.frame())?;
        writeln!(out)?;
    }
    Ok(())
}

fn ring_command(size: usize, gamma: f64, steps: usize, seed: Option<u64>) -> Result<()> {
    validate_gamma(gamma).context("invalid ring parameters")?;
    let seed = match seed {
        Some(seed) => seed,
        None => entropy_seed()?,
    };
    let mut ring = Ring::seeded(size)?;
    let mut rng = SmallRng::seed_from_u64(seed);
    info!(seed, size, gamma, steps, "Running ring epidemic");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_ring_row(&mut out, &ring)?;
    for _ in 0..steps {
        ring.step(gamma, &mut rng)?;
        write_ring_row(&mut out, &ring)?;
    }
    Ok(())
}

fn write_ring_row(out: &mut impl Write, ring: &Ring) -> Result<()> {
    let row: String = ring
        .cells()
        .iter()
        .map(|&infected| if infected { '#' } else { '.' })
        .collect();
    writeln!(out, "{row} {}", ring.infected_count())?;
    Ok(())
}
