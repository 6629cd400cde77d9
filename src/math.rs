use std::f64::consts::PI;

use rand::Rng;

/// Largest distance between two points on the unit torus.
pub const MAX_TORUS_DISTANCE: f64 = std::f64::consts::FRAC_1_SQRT_2;

pub fn angle_to_unit_vector(theta: f64) -> (f64, f64) {
    let (sin, cos) = theta.sin_cos();
    (cos, sin)
}

/// Four-quadrant angle of `(x, y)` in (-pi, pi].
///
/// The zero vector has no direction; it maps to `0.0`. Signed zeros are
/// treated the same so `(-0.0, 0.0)` does not come back as `pi`.
pub fn vector_to_angle(x: f64, y: f64) -> f64 {
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }
    y.atan2(x)
}

pub fn euclidean_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x1 - x2;
    let dy = y1 - y2;
    (dx * dx + dy * dy).sqrt()
}

/// Per-axis separation on the unit circle, always in [0, 0.5].
pub fn wrapped_delta(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs();
    delta.min(1.0 - delta)
}

pub fn toroidal_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = wrapped_delta(x1, x2);
    let dy = wrapped_delta(y1, y2);
    (dx * dx + dy * dy).sqrt()
}

/// Folds a coordinate back into [0, 1).
///
/// `rem_euclid` can round up to exactly `1.0` for tiny negative inputs, which
/// is the same point as `0.0` on the torus.
pub fn wrap_unit(value: f64) -> f64 {
    let wrapped = value.rem_euclid(1.0);
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

pub fn random_angle<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random_range(-PI..PI)
}

#[cfg(test)]
mod tests {
    use super::{
        angle_to_unit_vector, euclidean_distance, random_angle, toroidal_distance,
        vector_to_angle, wrap_unit, MAX_TORUS_DISTANCE,
    };
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::{PI, TAU};

    const TOLERANCE: f64 = 1.0e-12;

    fn angular_gap(a: f64, b: f64) -> f64 {
        let gap = (a - b).rem_euclid(TAU);
        gap.min(TAU - gap)
    }

    #[test]
    fn angle_survives_vector_round_trip() {
        for theta in [-3.0, -PI / 2.0, 0.0, 0.25, PI / 2.0, PI, 5.0, 12.5] {
            let (x, y) = angle_to_unit_vector(theta);
            assert!((x * x + y * y - 1.0).abs() < TOLERANCE);
            assert!(angular_gap(vector_to_angle(x, y), theta) < TOLERANCE);
        }
    }

    #[test]
    fn zero_vector_maps_to_zero_angle() {
        assert_eq!(vector_to_angle(0.0, 0.0), 0.0);
        assert_eq!(vector_to_angle(-0.0, 0.0), 0.0);
        assert_eq!(vector_to_angle(-0.0, -0.0), 0.0);
    }

    #[test]
    fn vector_to_angle_stays_in_half_open_range() {
        assert_eq!(vector_to_angle(-1.0, 0.0), PI);
        assert!((vector_to_angle(0.0, -1.0) + PI / 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn toroidal_distance_wraps_across_seam() {
        let d = toroidal_distance(0.05, 0.5, 0.95, 0.5);
        assert!((d - 0.1).abs() < TOLERANCE);
        assert!(euclidean_distance(0.05, 0.5, 0.95, 0.5) > 0.89);

        let corner = toroidal_distance(0.0, 0.0, 0.5, 0.5);
        assert!((corner - MAX_TORUS_DISTANCE).abs() < TOLERANCE);
    }

    #[test]
    fn toroidal_distance_is_symmetric_and_bounded() {
        let mut rng = SmallRng::seed_from_u64(0x7041);
        for _ in 0..500 {
            let (x1, y1) = (rng.random::<f64>(), rng.random::<f64>());
            let (x2, y2) = (rng.random::<f64>(), rng.random::<f64>());
            let forward = toroidal_distance(x1, y1, x2, y2);
            let backward = toroidal_distance(x2, y2, x1, y1);
            assert_eq!(forward, backward);
            assert!(forward <= MAX_TORUS_DISTANCE + TOLERANCE);
        }
    }

    #[test]
    fn wrap_unit_lands_in_half_open_interval() {
        assert_eq!(wrap_unit(1.0), 0.0);
        assert_eq!(wrap_unit(0.0), 0.0);
        assert!((wrap_unit(1.25) - 0.25).abs() < TOLERANCE);
        assert!((wrap_unit(-0.25) - 0.75).abs() < TOLERANCE);
        let tiny = wrap_unit(-1.0e-18);
        assert!((0.0..1.0).contains(&tiny));
    }

    #[test]
    fn random_angles_cover_full_turn() {
        let mut rng = SmallRng::seed_from_u64(11);
        let samples: Vec<f64> = (0..2_000).map(|_| random_angle(&mut rng)).collect();
        assert!(samples.iter().all(|theta| (-PI..PI).contains(theta)));
        assert!(samples.iter().any(|theta| *theta < -3.0));
        assert!(samples.iter().any(|theta| *theta > 3.0));
    }
}
