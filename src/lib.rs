use wasm_bindgen::prelude::*;

pub mod epidemic;
pub mod error;
pub mod experiment;
pub mod flock;
pub mod heading;
pub mod math;
pub mod neighbor_grid;

pub use epidemic::{survival_probability, EpidemicSweep, Ring, SurvivalRecord, SurvivalResult};
pub use error::VicsekError;
pub use experiment::{
    run_sweep, Histogram2d, NoiseSummary, PolarisationRecord, SweepConfig, SweepResult,
};
pub use flock::{step_state, Flock, FlockParams, FlockState, Frame, NeighborSearch, NoiseModel};
pub use heading::{average_heading, polarisation};
pub use math::{angle_to_unit_vector, toroidal_distance, vector_to_angle};
pub use neighbor_grid::{neighbors, NeighborGrid};

#[wasm_bindgen]
pub struct Sim {
    flock: Flock,
}

#[wasm_bindgen]
impl Sim {
    #[wasm_bindgen(constructor)]
    pub fn new(
        count: usize,
        seed: u32,
        radius: f64,
        noise: f64,
        dt: f64,
        noise_model: u32,
    ) -> Result<Sim, JsError> {
        let params = FlockParams {
            particle_count: count,
            radius,
            noise,
            dt,
            noise_model: NoiseModel::from_u32(noise_model),
            ..FlockParams::default()
        };
        let flock = Flock::new(params, u64::from(seed))?;
        Ok(Sim { flock })
    }

    pub fn step(&mut self) {
        self.flock.step();
    }

    pub fn step_many(&mut self, steps: u32) {
        for _ in 0..steps {
            self.flock.step();
        }
    }

    pub fn time(&self) -> f64 {
        self.flock.time()
    }

    pub fn polarisation(&self) -> f64 {
        self.flock.polarisation()
    }

    pub fn count(&self) -> usize {
        self.flock.state().len()
    }

    /// Interleaved `[x0, y0, x1, y1, ...]`.
    pub fn positions(&self) -> Vec<f64> {
        let state = self.flock.state();
        state
            .pos_x
            .iter()
            .zip(&state.pos_y)
            .flat_map(|(&x, &y)| [x, y])
            .collect()
    }

    pub fn headings(&self) -> Vec<f64> {
        self.flock.state().heading.clone()
    }
}

/// Runs a single-threaded noise sweep and returns interleaved
/// `[noise0, polarisation0, noise1, polarisation1, ...]`.
#[wasm_bindgen]
pub fn run_noise_sweep(
    count: usize,
    radius: f64,
    dt: f64,
    horizon: f64,
    noise_steps: usize,
    trials: usize,
    seed: u32,
) -> Result<Vec<f64>, JsError> {
    let config = SweepConfig {
        particle_count: count,
        radius,
        dt,
        horizon,
        noise_steps,
        trials,
        seed: Some(u64::from(seed)),
        parallel: false,
        ..SweepConfig::default()
    };
    let result = run_sweep(&config)?;
    Ok(result
        .pairs()
        .into_iter()
        .flat_map(|(noise, polarisation)| [noise, polarisation])
        .collect())
}
