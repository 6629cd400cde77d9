//! Stochastic susceptible/infected automaton on a 1-D ring.
//!
//! Each step reads a frozen copy of the ring and writes a fresh one, the same
//! double-buffered shape as the flock update.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ensure, VicsekError};
use crate::experiment::{entropy_seed, linspace, run_seed};

pub const DEFAULT_RING_SIZE: usize = 100;
pub const DEFAULT_GAMMA: f64 = 0.3;
pub const DEFAULT_GAMMA_STEPS: usize = 10;
pub const DEFAULT_SIMULATIONS: usize = 100;
pub const DEFAULT_EPIDEMIC_STEPS: usize = 100;

#[derive(Clone, Debug)]
pub struct Ring {
    infected: Vec<bool>,
    scratch: Vec<bool>,
}

impl Ring {
    pub fn new(infected: Vec<bool>) -> Result<Self, VicsekError> {
        ensure(!infected.is_empty(), "ring size must be positive")?;
        let scratch = infected.clone();
        Ok(Self { infected, scratch })
    }

    /// All susceptible except the middle cell.
    pub fn seeded(size: usize) -> Result<Self, VicsekError> {
        ensure(size > 0, "ring size must be positive")?;
        let mut infected = vec![false; size];
        infected[size / 2] = true;
        Self::new(infected)
    }

    pub fn len(&self) -> usize {
        self.infected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infected.is_empty()
    }

    pub fn cells(&self) -> &[bool] {
        &self.infected
    }

    pub fn infected_count(&self) -> usize {
        self.infected.iter().filter(|&&cell| cell).count()
    }

    pub fn is_extinct(&self) -> bool {
        !self.infected.iter().any(|&cell| cell)
    }

    /// An infected cell recovers with probability `gamma`; any cell that did
    /// not just recover and has an infected neighbor becomes infected with
    /// probability `1 - gamma`.
    pub fn step<R: Rng + ?Sized>(&mut self, gamma: f64, rng: &mut R) -> Result<(), VicsekError> {
        validate_gamma(gamma)?;
        let n = self.infected.len();
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.infected);

        for i in 0..n {
            if self.infected[i] && rng.random::<f64>() <= gamma {
                self.scratch[i] = false;
                continue;
            }

            let left = self.infected[(i + n - 1) % n];
            let right = self.infected[(i + 1) % n];
            if (left || right) && rng.random::<f64>() <= 1.0 - gamma {
                self.scratch[i] = true;
            }
        }

        std::mem::swap(&mut self.infected, &mut self.scratch);
        Ok(())
    }
}

pub fn validate_gamma(gamma: f64) -> Result<(), VicsekError> {
    ensure((0.0..=1.0).contains(&gamma), "gamma must lie in [0, 1]")
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpidemicSweep {
    pub size: usize,
    pub gamma_min: f64,
    pub gamma_max: f64,
    pub gamma_steps: usize,
    pub simulations: usize,
    pub steps: usize,
    pub seed: Option<u64>,
    pub parallel: bool,
}

impl Default for EpidemicSweep {
    fn default() -> Self {
        Self {
            size: DEFAULT_RING_SIZE,
            gamma_min: 0.0,
            gamma_max: 0.9,
            gamma_steps: DEFAULT_GAMMA_STEPS,
            simulations: DEFAULT_SIMULATIONS,
            steps: DEFAULT_EPIDEMIC_STEPS,
            seed: None,
            parallel: true,
        }
    }
}

impl EpidemicSweep {
    pub fn validate(&self) -> Result<(), VicsekError> {
        ensure(self.size > 0, "ring size must be positive")?;
        ensure(self.gamma_steps > 0, "gamma_steps must be positive")?;
        ensure(self.simulations > 0, "simulations must be positive")?;
        validate_gamma(self.gamma_min)?;
        validate_gamma(self.gamma_max)?;
        ensure(
            self.gamma_min <= self.gamma_max,
            "gamma_min must not exceed gamma_max",
        )
    }

    pub fn gammas(&self) -> Vec<f64> {
        linspace(self.gamma_min, self.gamma_max, self.gamma_steps)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurvivalRecord {
    pub gamma: f64,
    pub survived: usize,
    pub simulations: usize,
    pub probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurvivalResult {
    pub seed: u64,
    pub records: Vec<SurvivalRecord>,
}

/// Fraction of runs, per recovery probability, still holding an infected
/// cell after the configured number of steps.
pub fn survival_probability(sweep: &EpidemicSweep) -> Result<SurvivalResult, VicsekError> {
    sweep.validate()?;

    let seed = match sweep.seed {
        Some(seed) => seed,
        None => entropy_seed()?,
    };
    let gammas = sweep.gammas();

    info!(
        seed,
        gammas = gammas.len(),
        simulations = sweep.simulations,
        size = sweep.size,
        steps = sweep.steps,
        "Starting epidemic survival sweep",
    );

    let run = |gamma_index: usize, simulation: usize| -> Result<bool, VicsekError> {
        let mut rng = SmallRng::seed_from_u64(run_seed(seed, gamma_index, simulation));
        let mut ring = Ring::seeded(sweep.size)?;
        for _ in 0..sweep.steps {
            ring.step(gammas[gamma_index], &mut rng)?;
        }
        Ok(!ring.is_extinct())
    };

    let mut records = Vec::with_capacity(gammas.len());
    for (gamma_index, &gamma) in gammas.iter().enumerate() {
        let outcomes = if sweep.parallel {
            (0..sweep.simulations)
                .into_par_iter()
                .map(|simulation| run(gamma_index, simulation))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            (0..sweep.simulations)
                .map(|simulation| run(gamma_index, simulation))
                .collect::<Result<Vec<_>, _>>()?
        };

        let survived = outcomes.iter().filter(|&&alive| alive).count();
        let probability = survived as f64 / sweep.simulations as f64;
        debug!(gamma, survived, probability, "Gamma finished");

        records.push(SurvivalRecord {
            gamma,
            survived,
            simulations: sweep.simulations,
            probability,
        });
    }

    Ok(SurvivalResult { seed, records })
}
