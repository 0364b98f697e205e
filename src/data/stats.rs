//! Per-axis reductions used to collapse scans and delays.

use ndarray::{Array, Array1, ArrayView, ArrayView1, ArrayView3, Axis, RemoveAxis};

/// Median of a lane. An empty lane yields NaN.
pub fn median(lane: ArrayView1<f64>) -> f64 {
    let mut values = lane.to_vec();
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Standard error of the mean with one degree of freedom removed.
///
/// Lanes shorter than two yield NaN.
pub fn sem(lane: ArrayView1<f64>) -> f64 {
    let n = lane.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = lane.sum() / n as f64;
    let var = lane.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (var / n as f64).sqrt()
}

pub fn median_axis<D: RemoveAxis>(a: ArrayView<f64, D>, axis: Axis) -> Array<f64, D::Smaller> {
    a.map_axis(axis, median)
}

pub fn sem_axis<D: RemoveAxis>(a: ArrayView<f64, D>, axis: Axis) -> Array<f64, D::Smaller> {
    a.map_axis(axis, sem)
}

/// Median over the two leading axes of `[pp_delay, scan, pixel]`, per pixel.
///
/// All delay × scan values of a pixel enter one median, which differs from a
/// median of medians.
pub fn median_per_pixel(a: ArrayView3<f64>) -> Array1<f64> {
    a.axis_iter(Axis(2))
        .map(|plane| {
            let flat: Array1<f64> = plane.iter().copied().collect();
            median(flat.view())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array3};

    #[test]
    fn median_odd_and_even() {
        assert_relative_eq!(median(array![3.0, 1.0, 2.0].view()), 2.0);
        assert_relative_eq!(median(array![4.0, 1.0, 3.0, 2.0].view()), 2.5);
        assert!(median(Array1::<f64>::zeros(0).view()).is_nan());
    }

    #[test]
    fn sem_matches_sample_std() {
        // std(ddof=1) of [1, 2, 3, 4] is 1.2909944
        assert_relative_eq!(sem(array![1.0, 2.0, 3.0, 4.0].view()), 0.6454972, epsilon = 1e-6);
        assert!(sem(array![1.0].view()).is_nan());
    }

    #[test]
    fn axis_reductions_drop_one_axis() {
        let a = array![[1.0, 10.0], [3.0, 30.0], [2.0, 20.0]];
        assert_eq!(median_axis(a.view(), Axis(0)), array![2.0, 20.0]);
        assert_eq!(sem_axis(a.view(), Axis(1)).len(), 3);
    }

    #[test]
    fn pixel_median_pools_delays_and_scans() {
        // pixel 0 holds 0..6, pixel 1 holds 100..106
        let a = Array3::from_shape_fn((2, 3, 2), |(d, s, p)| (d * 3 + s) as f64 + 100.0 * p as f64);
        assert_eq!(median_per_pixel(a.view()), array![2.5, 102.5]);
    }
}
