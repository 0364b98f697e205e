use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

// ---------------------------------------------------------------------------
// Heat model: exponential ingrowth of a thermal background after the pump
// ---------------------------------------------------------------------------

/// Time constant of the heat ingrowth, in the units of `pp_delay`.
pub const DEFAULT_HEAT_TAU: f64 = 700.0;

/// Heat at delay `t`: `H(t) = H0 (1 - e^(-t/tau)) + c`.
///
/// The model is unphysical before time zero, so `t <= 0` gives 0.
pub fn heat_time(t: f64, amplitude: f64, tau: f64, c: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    amplitude * (1.0 - (-t / tau).exp()) + c
}

/// Remove the heat background from a `(delay, wavenumber)` array.
///
/// The last delay row is taken as the fully developed heat spectrum `H0`.
/// Rows at `t <= 0` are left untouched.
pub fn heat_filter(input: ArrayView2<f64>, pp_delay: ArrayView1<f64>, tau: f64, c: f64) -> Array2<f64> {
    let mut out = input.to_owned();
    let Some(last) = input.axis_iter(Axis(0)).last() else {
        return out;
    };
    for (mut row, &t) in out.axis_iter_mut(Axis(0)).zip(pp_delay.iter()) {
        row.zip_mut_with(&last, |v, &h0| *v -= heat_time(t, h0, tau, c));
    }
    out
}

// ---------------------------------------------------------------------------
// Static difference: pumped and probed channels differ before time zero
// ---------------------------------------------------------------------------

/// Subtract the first delay row from every row.
pub fn static_difference(input: ArrayView2<f64>) -> Array2<f64> {
    match input.axis_iter(Axis(0)).next() {
        Some(first) => {
            let first: Array1<f64> = first.to_owned();
            &input - &first
        }
        None => input.to_owned(),
    }
}
