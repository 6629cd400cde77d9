use std::f64::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ensure, VicsekError};
use crate::heading::{average_heading, polarisation};
use crate::math::{angle_to_unit_vector, random_angle, wrap_unit};
use crate::neighbor_grid::{neighbors_into, NeighborGrid};

pub const DEFAULT_PARTICLE_COUNT: usize = 40;
pub const DEFAULT_RADIUS: f64 = 0.5;
pub const DEFAULT_NOISE: f64 = 0.0;
pub const DEFAULT_DT: f64 = 0.01;
pub const DEFAULT_HORIZON: f64 = 1.0;

// Relative distance from a whole step count that is still treated as drift,
// so 1.0 / 0.01 counts as 100 steps.
const STEP_COUNT_TOLERANCE: f64 = 1.0e-12;

/// How the per-step noise angle is drawn from the noise level `eta`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    /// `eta * U[-pi, pi)`, i.e. uniform on [-eta*pi, eta*pi).
    #[default]
    Scaled,
    /// Uniform on [-eta*pi/2, eta*pi/2).
    HalfWidth,
}

impl NoiseModel {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::HalfWidth,
            _ => Self::Scaled,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Scaled => 0,
            Self::HalfWidth => 1,
        }
    }

    pub fn sample<R: Rng + ?Sized>(self, eta: f64, rng: &mut R) -> f64 {
        let angle = random_angle(rng);
        match self {
            Self::Scaled => eta * angle,
            Self::HalfWidth => 0.5 * eta * angle,
        }
    }

    pub fn bound(self, eta: f64) -> f64 {
        match self {
            Self::Scaled => eta * PI,
            Self::HalfWidth => 0.5 * eta * PI,
        }
    }
}

/// Both strategies return identical neighbor sets; the grid is faster once
/// the radius is small next to the unit square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearch {
    BruteForce,
    #[default]
    Grid,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockParams {
    pub particle_count: usize,
    pub radius: f64,
    pub noise: f64,
    pub dt: f64,
    pub horizon: f64,
    pub noise_model: NoiseModel,
    pub neighbor_search: NeighborSearch,
}

impl Default for FlockParams {
    fn default() -> Self {
        Self {
            particle_count: DEFAULT_PARTICLE_COUNT,
            radius: DEFAULT_RADIUS,
            noise: DEFAULT_NOISE,
            dt: DEFAULT_DT,
            horizon: DEFAULT_HORIZON,
            noise_model: NoiseModel::default(),
            neighbor_search: NeighborSearch::default(),
        }
    }
}

impl FlockParams {
    pub fn validate(&self) -> Result<(), VicsekError> {
        ensure(self.particle_count > 0, "particle_count must be positive")?;
        ensure(
            self.radius.is_finite() && self.radius > 0.0,
            "radius must be positive and finite",
        )?;
        ensure(
            (0.0..=1.0).contains(&self.noise),
            "noise must lie in [0, 1]",
        )?;
        ensure(
            self.dt.is_finite() && self.dt > 0.0,
            "dt must be positive and finite",
        )?;
        ensure(
            self.horizon.is_finite() && self.horizon >= 0.0,
            "horizon must be non-negative and finite",
        )?;
        Ok(())
    }

    pub fn step_count(&self) -> usize {
        step_count(self.horizon, self.dt)
    }
}

/// Number of `dt` increments needed for elapsed time to reach `horizon`.
pub fn step_count(horizon: f64, dt: f64) -> usize {
    if horizon <= 0.0 || dt <= 0.0 {
        return 0;
    }
    let ratio = horizon / dt;
    let nearest = ratio.round();
    let steps = if (ratio - nearest).abs() <= STEP_COUNT_TOLERANCE * nearest.max(1.0) {
        nearest
    } else {
        ratio.ceil()
    };
    // Any positive horizon needs at least one step to be reached.
    (steps as usize).max(1)
}

/// Particle set stored as parallel arrays, one entry per particle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlockState {
    pub pos_x: Vec<f64>,
    pub pos_y: Vec<f64>,
    pub heading: Vec<f64>,
}

impl FlockState {
    /// Uniform positions on [0, 1)^2, then uniform headings on [-pi, pi).
    pub fn random<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let mut pos_x = Vec::with_capacity(count);
        let mut pos_y = Vec::with_capacity(count);
        for _ in 0..count {
            pos_x.push(rng.random_range(0.0..1.0));
            pos_y.push(rng.random_range(0.0..1.0));
        }
        let heading = (0..count).map(|_| random_angle(rng)).collect();

        Self {
            pos_x,
            pos_y,
            heading,
        }
    }

    pub fn from_parts(
        pos_x: Vec<f64>,
        pos_y: Vec<f64>,
        heading: Vec<f64>,
    ) -> Result<Self, VicsekError> {
        ensure(
            pos_x.len() == pos_y.len() && pos_x.len() == heading.len(),
            "state arrays must have equal length",
        )?;
        ensure(
            pos_x
                .iter()
                .chain(&pos_y)
                .all(|value| (0.0..1.0).contains(value)),
            "positions must lie in [0, 1)",
        )?;
        ensure(
            heading.iter().all(|theta| theta.is_finite()),
            "headings must be finite",
        )?;

        Ok(Self {
            pos_x,
            pos_y,
            heading,
        })
    }

    pub fn len(&self) -> usize {
        self.heading.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heading.is_empty()
    }

    pub fn polarisation(&self) -> f64 {
        polarisation(&self.heading)
    }

    fn resize(&mut self, count: usize) {
        self.pos_x.resize(count, 0.0);
        self.pos_y.resize(count, 0.0);
        self.heading.resize(count, 0.0);
    }
}

/// One synchronous update of `current` into a fresh state, brute-force
/// neighbor search.
pub fn step_state<R: Rng + ?Sized>(
    current: &FlockState,
    params: &FlockParams,
    rng: &mut R,
) -> FlockState {
    let mut next = FlockState::default();
    let mut scratch = Vec::new();
    advance(current, &mut next, params, None, &mut scratch, rng);
    next
}

fn advance<R: Rng + ?Sized>(
    current: &FlockState,
    next: &mut FlockState,
    params: &FlockParams,
    grid: Option<&NeighborGrid>,
    scratch: &mut Vec<usize>,
    rng: &mut R,
) {
    let count = current.len();
    next.resize(count);

    for i in 0..count {
        let origin = (current.pos_x[i], current.pos_y[i]);
        match grid {
            Some(grid) => grid.neighbors_into(origin, scratch),
            None => neighbors_into(
                &current.pos_x,
                &current.pos_y,
                params.radius,
                origin,
                scratch,
            ),
        }

        let alignment = average_heading(&current.heading, scratch);
        let heading = alignment + params.noise_model.sample(params.noise, rng);
        let (ux, uy) = angle_to_unit_vector(heading);

        next.heading[i] = heading;
        next.pos_x[i] = wrap_unit(origin.0 + params.dt * ux);
        next.pos_y[i] = wrap_unit(origin.1 + params.dt * uy);
    }
}

/// A running simulation: parameters, double-buffered state and its own RNG.
pub struct Flock {
    params: FlockParams,
    current: FlockState,
    next: FlockState,
    neighbor_grid: NeighborGrid,
    scratch: Vec<usize>,
    rng: SmallRng,
    step_index: u64,
}

impl Flock {
    pub fn new(params: FlockParams, seed: u64) -> Result<Self, VicsekError> {
        params.validate()?;
        let mut rng = SmallRng::seed_from_u64(seed);
        let state = FlockState::random(params.particle_count, &mut rng);
        Ok(Self::assemble(params, state, rng))
    }

    pub fn with_state(
        params: FlockParams,
        state: FlockState,
        rng: SmallRng,
    ) -> Result<Self, VicsekError> {
        params.validate()?;
        ensure(
            state.len() == params.particle_count,
            "state length must equal particle_count",
        )?;
        Ok(Self::assemble(params, state, rng))
    }

    fn assemble(params: FlockParams, state: FlockState, rng: SmallRng) -> Self {
        let count = state.len();
        Self {
            params,
            current: state,
            next: FlockState::default(),
            neighbor_grid: NeighborGrid::new(count, params.radius),
            scratch: Vec::with_capacity(count),
            rng,
            step_index: 0,
        }
    }

    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    pub fn state(&self) -> &FlockState {
        &self.current
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn time(&self) -> f64 {
        self.step_index as f64 * self.params.dt
    }

    pub fn polarisation(&self) -> f64 {
        self.current.polarisation()
    }

    pub fn step(&mut self) {
        let grid = match self.params.neighbor_search {
            NeighborSearch::Grid => {
                self.neighbor_grid
                    .rebuild(&self.current.pos_x, &self.current.pos_y);
                Some(&self.neighbor_grid)
            }
            NeighborSearch::BruteForce => None,
        };

        advance(
            &self.current,
            &mut self.next,
            &self.params,
            grid,
            &mut self.scratch,
            &mut self.rng,
        );
        std::mem::swap(&mut self.current, &mut self.next);
        self.step_index += 1;
    }

    /// Steps until the horizon and returns the final polarisation.
    pub fn run_to_horizon(&mut self) -> f64 {
        let target = self.params.step_count() as u64;
        while self.step_index < target {
            self.step();
        }
        self.polarisation()
    }

    pub fn frame(&self) -> Frame<'_> {
        Frame {
            step: self.step_index,
            time: self.time(),
            polarisation: self.polarisation(),
            pos_x: &self.current.pos_x,
            pos_y: &self.current.pos_y,
            heading: &self.current.heading,
        }
    }
}

/// Borrowed snapshot of one time step, for trace output.
#[derive(Debug, Serialize)]
pub struct Frame<'a> {
    pub step: u64,
    pub time: f64,
    pub polarisation: f64,
    pub pos_x: &'a [f64],
    pub pos_y: &'a [f64],
    pub heading: &'a [f64],
}

#[cfg(test)]
mod tests {
    use super::{
        step_count, step_state, Flock, FlockParams, FlockState, NeighborSearch, NoiseModel,
    };
    use crate::error::VicsekError;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::f64::consts::PI;

    fn aligned_pair() -> FlockState {
        FlockState::from_parts(vec![0.2, 0.7], vec![0.3, 0.6], vec![0.0, 0.0]).unwrap()
    }

    #[test]
    fn rejects_invalid_parameters() {
        let cases = [
            FlockParams {
                particle_count: 0,
                ..FlockParams::default()
            },
            FlockParams {
                radius: 0.0,
                ..FlockParams::default()
            },
            FlockParams {
                noise: 1.5,
                ..FlockParams::default()
            },
            FlockParams {
                noise: -0.1,
                ..FlockParams::default()
            },
            FlockParams {
                dt: 0.0,
                ..FlockParams::default()
            },
            FlockParams {
                horizon: -1.0,
                ..FlockParams::default()
            },
            FlockParams {
                radius: f64::NAN,
                ..FlockParams::default()
            },
        ];

        for params in cases {
            assert!(matches!(
                params.validate(),
                Err(VicsekError::InvalidParameter(_))
            ));
            assert!(Flock::new(params, 1).is_err());
        }
        assert!(FlockParams::default().validate().is_ok());
    }

    #[test]
    fn step_count_tolerates_float_drift() {
        assert_eq!(step_count(1.0, 0.01), 100);
        assert_eq!(step_count(0.1, 0.01), 10);
        assert_eq!(step_count(2.0, 0.01), 200);
        assert_eq!(step_count(0.0, 0.01), 0);
        assert_eq!(step_count(0.015, 0.01), 2);
        assert_eq!(step_count(1.0e-12, 0.01), 1);
        assert_eq!(step_count(1.0000000001, 0.1), 11);
    }

    #[test]
    fn tiny_horizon_still_takes_one_step() {
        let params = FlockParams {
            horizon: 1.0e-12,
            dt: 0.01,
            ..FlockParams::default()
        };
        assert!(params.validate().is_ok());

        let mut flock = Flock::new(params, 4).unwrap();
        flock.run_to_horizon();
        assert_eq!(flock.step_index(), 1);
        assert!(flock.time() >= params.horizon);
    }

    #[test]
    fn rejects_mismatched_state() {
        assert!(FlockState::from_parts(vec![0.1], vec![0.1, 0.2], vec![0.0]).is_err());
        assert!(FlockState::from_parts(vec![1.0], vec![0.1], vec![0.0]).is_err());

        let params = FlockParams {
            particle_count: 3,
            ..FlockParams::default()
        };
        assert!(Flock::with_state(params, aligned_pair(), SmallRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn aligned_noiseless_pair_stays_aligned() {
        let params = FlockParams {
            particle_count: 2,
            radius: 2.0,
            noise: 0.0,
            dt: 0.01,
            horizon: 0.1,
            ..FlockParams::default()
        };
        let mut flock =
            Flock::with_state(params, aligned_pair(), SmallRng::seed_from_u64(3)).unwrap();

        let polarisation = flock.run_to_horizon();

        assert_eq!(flock.step_index(), 10);
        assert!(flock.state().heading.iter().all(|&theta| theta == 0.0));
        assert_eq!(polarisation, 1.0);
        assert!((flock.state().pos_x[0] - 0.3).abs() < 1.0e-12);
        assert!((flock.state().pos_y[1] - 0.6).abs() < 1.0e-12);
    }

    #[test]
    fn update_reads_only_the_previous_state() {
        // Particle 1 only sees particle 0; if particle 0 were updated in place
        // first, particle 1 would pick up its new heading instead of pi/2.
        let state = FlockState::from_parts(
            vec![0.50, 0.55, 0.90],
            vec![0.50, 0.50, 0.90],
            vec![PI / 2.0, 0.0, 0.0],
        )
        .unwrap();
        let params = FlockParams {
            particle_count: 3,
            radius: 0.1,
            noise: 0.0,
            ..FlockParams::default()
        };

        let next = step_state(&state, &params, &mut SmallRng::seed_from_u64(0));

        assert!((next.heading[0] - PI / 4.0).abs() < 1.0e-12);
        assert!((next.heading[1] - PI / 4.0).abs() < 1.0e-12);
        assert_eq!(next.heading[2], 0.0);
    }

    #[test]
    fn positions_wrap_into_unit_square() {
        let state = FlockState::from_parts(
            vec![0.999, 0.0, 0.5],
            vec![0.5, 0.0, 0.999],
            vec![0.0, PI, PI / 2.0],
        )
        .unwrap();
        let params = FlockParams {
            particle_count: 3,
            radius: 0.01,
            noise: 0.0,
            dt: 0.01,
            ..FlockParams::default()
        };

        let next = step_state(&state, &params, &mut SmallRng::seed_from_u64(0));

        for (&x, &y) in next.pos_x.iter().zip(&next.pos_y) {
            assert!((0.0..1.0).contains(&x));
            assert!((0.0..1.0).contains(&y));
        }
        assert!((next.pos_x[0] - 0.009).abs() < 1.0e-9);
        assert!((next.pos_x[1] - 0.99).abs() < 1.0e-9);
        assert!((next.pos_y[2] - 0.009).abs() < 1.0e-9);
    }

    #[test]
    fn noisy_steps_keep_positions_in_range() {
        let params = FlockParams {
            particle_count: 60,
            radius: 0.2,
            noise: 1.0,
            dt: 0.05,
            horizon: 5.0,
            ..FlockParams::default()
        };
        let mut flock = Flock::new(params, 99).unwrap();
        for _ in 0..params.step_count() {
            flock.step();
            let state = flock.state();
            assert!(state.pos_x.iter().all(|x| (0.0..1.0).contains(x)));
            assert!(state.pos_y.iter().all(|y| (0.0..1.0).contains(y)));
        }
    }

    #[test]
    fn grid_and_brute_force_runs_are_identical() {
        let base = FlockParams {
            particle_count: 80,
            radius: 0.12,
            noise: 0.4,
            horizon: 0.5,
            ..FlockParams::default()
        };
        let mut brute = Flock::new(
            FlockParams {
                neighbor_search: NeighborSearch::BruteForce,
                ..base
            },
            2024,
        )
        .unwrap();
        let mut grid = Flock::new(
            FlockParams {
                neighbor_search: NeighborSearch::Grid,
                ..base
            },
            2024,
        )
        .unwrap();

        assert_eq!(brute.run_to_horizon(), grid.run_to_horizon());
        assert_eq!(brute.state(), grid.state());
    }

    #[test]
    fn noise_models_respect_their_bounds() {
        let mut rng = SmallRng::seed_from_u64(5);
        for model in [NoiseModel::Scaled, NoiseModel::HalfWidth] {
            for _ in 0..500 {
                let sample = model.sample(0.5, &mut rng);
                assert!(sample.abs() <= model.bound(0.5));
            }
            assert_eq!(NoiseModel::from_u32(model.as_u32()), model);
        }
        assert_eq!(NoiseModel::Scaled.sample(0.0, &mut rng), 0.0);
    }

    #[test]
    fn same_seed_gives_same_trajectory() {
        let params = FlockParams {
            noise: 0.3,
            ..FlockParams::default()
        };
        let mut first = Flock::new(params, 77).unwrap();
        let mut second = Flock::new(params, 77).unwrap();
        assert_eq!(first.run_to_horizon(), second.run_to_horizon());
        assert_eq!(first.state(), second.state());
    }
}
