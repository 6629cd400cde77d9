//! Noise sweeps: many independent flock runs, one polarisation per run.
//!
//! Every run owns an RNG seeded from `(seed, noise_index, trial)`, so a sweep
//! gives bit-identical records whether it runs on one thread or many.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{ensure, VicsekError};
use crate::flock::{
    Flock, FlockParams, NeighborSearch, NoiseModel, DEFAULT_DT, DEFAULT_HORIZON,
    DEFAULT_PARTICLE_COUNT, DEFAULT_RADIUS,
};

pub const DEFAULT_NOISE_STEPS: usize = 50;
pub const DEFAULT_TRIALS: usize = 50;
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub particle_count: usize,
    pub radius: f64,
    pub dt: f64,
    pub horizon: f64,
    pub noise_min: f64,
    pub noise_max: f64,
    pub noise_steps: usize,
    pub trials: usize,
    /// Drawn from OS entropy when absent; the value used is reported back.
    pub seed: Option<u64>,
    pub noise_model: NoiseModel,
    pub neighbor_search: NeighborSearch,
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            particle_count: DEFAULT_PARTICLE_COUNT,
            radius: DEFAULT_RADIUS,
            dt: DEFAULT_DT,
            horizon: DEFAULT_HORIZON,
            noise_min: 0.0,
            noise_max: 1.0,
            noise_steps: DEFAULT_NOISE_STEPS,
            trials: DEFAULT_TRIALS,
            seed: None,
            noise_model: NoiseModel::default(),
            neighbor_search: NeighborSearch::default(),
            parallel: true,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), VicsekError> {
        ensure(self.noise_steps > 0, "noise_steps must be positive")?;
        ensure(self.trials > 0, "trials must be positive")?;
        ensure(
            (0.0..=1.0).contains(&self.noise_min) && (0.0..=1.0).contains(&self.noise_max),
            "noise range must lie in [0, 1]",
        )?;
        ensure(
            self.noise_min <= self.noise_max,
            "noise_min must not exceed noise_max",
        )?;
        self.flock_params(self.noise_min).validate()?;
        self.flock_params(self.noise_max).validate()
    }

    /// Evenly spaced noise levels, both ends included.
    pub fn noise_levels(&self) -> Vec<f64> {
        linspace(self.noise_min, self.noise_max, self.noise_steps)
    }

    pub fn flock_params(&self, noise: f64) -> FlockParams {
        FlockParams {
            particle_count: self.particle_count,
            radius: self.radius,
            noise,
            dt: self.dt,
            horizon: self.horizon,
            noise_model: self.noise_model,
            neighbor_search: self.neighbor_search,
        }
    }
}

pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
            values[count - 1] = stop;
            values
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolarisationRecord {
    pub noise: f64,
    pub noise_index: usize,
    pub trial: usize,
    pub polarisation: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseSummary {
    pub noise: f64,
    pub trials: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Counts of (noise, polarisation) records, `counts[noise_bin][polarisation_bin]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram2d {
    pub noise_edges: Vec<f64>,
    pub polarisation_edges: Vec<f64>,
    pub counts: Vec<Vec<u32>>,
}

impl Histogram2d {
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .flat_map(|row| row.iter())
            .map(|&count| u64::from(count))
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub seed: u64,
    pub noise_levels: Vec<f64>,
    pub trials: usize,
    /// Ordered by noise index, then trial.
    pub records: Vec<PolarisationRecord>,
}

impl SweepResult {
    pub fn pairs(&self) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .map(|record| (record.noise, record.polarisation))
            .collect()
    }

    pub fn mean_by_noise(&self) -> Vec<NoiseSummary> {
        self.noise_levels
            .iter()
            .enumerate()
            .map(|(noise_index, &noise)| {
                let values: Vec<f64> = self
                    .records
                    .iter()
                    .filter(|record| record.noise_index == noise_index)
                    .map(|record| record.polarisation)
                    .collect();
                summarize(noise, &values)
            })
            .collect()
    }

    pub fn histogram2d(
        &self,
        noise_bins: usize,
        polarisation_bins: usize,
    ) -> Result<Histogram2d, VicsekError> {
        ensure(
            noise_bins > 0 && polarisation_bins > 0,
            "histogram bins must be positive",
        )?;

        let noise_lo = self.noise_levels.first().copied().unwrap_or(0.0);
        let noise_hi = self.noise_levels.last().copied().unwrap_or(1.0);
        let mut counts = vec![vec![0_u32; polarisation_bins]; noise_bins];

        for record in &self.records {
            let noise_bin = bin_index(record.noise, noise_lo, noise_hi, noise_bins);
            let polarisation_bin = bin_index(record.polarisation, 0.0, 1.0, polarisation_bins);
            counts[noise_bin][polarisation_bin] += 1;
        }

        Ok(Histogram2d {
            noise_edges: linspace(noise_lo, noise_hi, noise_bins + 1),
            polarisation_edges: linspace(0.0, 1.0, polarisation_bins + 1),
            counts,
        })
    }
}

fn summarize(noise: f64, values: &[f64]) -> NoiseSummary {
    if values.is_empty() {
        return NoiseSummary {
            noise,
            trials: 0,
            mean: 0.0,
            std_dev: 0.0,
        };
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / n;

    NoiseSummary {
        noise,
        trials: values.len(),
        mean,
        std_dev: variance.sqrt(),
    }
}

// Last bin is closed on the right, like numpy's histogram.
fn bin_index(value: f64, lo: f64, hi: f64, bins: usize) -> usize {
    let span = hi - lo;
    if span <= 0.0 {
        return 0;
    }
    let scaled = ((value - lo) / span * bins as f64).floor();
    (scaled.max(0.0) as usize).min(bins - 1)
}

/// Seed for one `(noise_index, trial)` run, decorrelated from its neighbors.
pub fn run_seed(base: u64, noise_index: usize, trial: usize) -> u64 {
    let slot = ((noise_index as u64) << 32) ^ trial as u64;
    splitmix64(base ^ splitmix64(slot))
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub fn entropy_seed() -> Result<u64, VicsekError> {
    getrandom::u64().map_err(|err| VicsekError::Entropy(err.to_string()))
}

pub fn run_sweep(config: &SweepConfig) -> Result<SweepResult, VicsekError> {
    config.validate()?;

    let seed = match config.seed {
        Some(seed) => seed,
        None => entropy_seed()?,
    };
    let noise_levels = config.noise_levels();
    let jobs: Vec<(usize, usize)> = (0..noise_levels.len())
        .flat_map(|noise_index| (0..config.trials).map(move |trial| (noise_index, trial)))
        .collect();

    info!(
        seed,
        noise_levels = noise_levels.len(),
        trials = config.trials,
        particles = config.particle_count,
        steps = config.flock_params(config.noise_min).step_count(),
        parallel = config.parallel,
        "Starting noise sweep",
    );

    let run = |&(noise_index, trial): &(usize, usize)| -> Result<PolarisationRecord, VicsekError> {
        let noise = noise_levels[noise_index];
        let mut flock = Flock::new(
            config.flock_params(noise),
            run_seed(seed, noise_index, trial),
        )?;
        let polarisation = flock.run_to_horizon();
        trace!(noise, trial, polarisation, "Run finished");
        Ok(PolarisationRecord {
            noise,
            noise_index,
            trial,
            polarisation,
        })
    };

    let records = if config.parallel {
        jobs.par_iter().map(run).collect::<Result<Vec<_>, _>>()?
    } else {
        jobs.iter().map(run).collect::<Result<Vec<_>, _>>()?
    };

    let result = SweepResult {
        seed,
        noise_levels,
        trials: config.trials,
        records,
    };

    for summary in result.mean_by_noise() {
        debug!(
            noise = summary.noise,
            mean = summary.mean,
            std_dev = summary.std_dev,
            "Noise level finished",
        );
    }
    info!(runs = result.records.len(), "Noise sweep complete");

    Ok(result)
}
