use crate::math::{angle_to_unit_vector, vector_to_angle};

/// Circular mean of the headings picked out by `neighbor_indices`.
///
/// Unit vectors are summed in index order and the resultant is turned back
/// into an angle. Headings that cancel exactly, or an empty selection, give
/// `0.0`.
pub fn average_heading(headings: &[f64], neighbor_indices: &[usize]) -> f64 {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for &index in neighbor_indices {
        let (x, y) = angle_to_unit_vector(headings[index]);
        sum_x += x;
        sum_y += y;
    }
    vector_to_angle(sum_x, sum_y)
}

/// Vicsek order parameter: length of the mean heading vector, in [0, 1].
pub fn polarisation(headings: &[f64]) -> f64 {
    if headings.is_empty() {
        return 0.0;
    }

    let (cos_sum, sin_sum) = headings
        .iter()
        .fold((0.0_f64, 0.0_f64), |(cos_sum, sin_sum), &theta| {
            let (x, y) = angle_to_unit_vector(theta);
            (cos_sum + x, sin_sum + y)
        });

    let magnitude = (cos_sum * cos_sum + sin_sum * sin_sum).sqrt();
    (magnitude / headings.len() as f64).min(1.0)
}
