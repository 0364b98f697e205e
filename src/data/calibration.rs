use ndarray::Array1;

use super::error::{SfgError, SfgResult};
use super::raw::RawDataset;

/// Horizontal pixel count of the camera.
pub const DEFAULT_PIXEL_COUNT: usize = 1600;

/// nm -> cm⁻¹
const NM_TO_WAVENUMBER: f64 = 1e7;

// ---------------------------------------------------------------------------
// Calibration – pixel → wavelength → wavenumber
// ---------------------------------------------------------------------------

/// Pixel to wavelength / frequency / wavenumber calibration of a spectrometer.
///
/// All three axes are computed once at construction from the grating
/// polynomial and stay fixed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    central_wavelength: f64,
    visible_wavelength: f64,
    calibration_central_wavelength: f64,
    /// Polynomial coefficients, highest degree first.
    coefficients: Vec<f64>,
    wavelength: Array1<f64>,
    frequency: Array1<f64>,
    wavenumber: Array1<f64>,
}

impl Calibration {
    /// Calibration for a camera with [`DEFAULT_PIXEL_COUNT`] pixels.
    pub fn new(
        central_wavelength: f64,
        visible_wavelength: f64,
        calibration_central_wavelength: f64,
        coefficients: impl Into<Vec<f64>>,
    ) -> SfgResult<Self> {
        Self::with_pixel_count(
            central_wavelength,
            visible_wavelength,
            calibration_central_wavelength,
            coefficients,
            DEFAULT_PIXEL_COUNT,
        )
    }

    pub fn with_pixel_count(
        central_wavelength: f64,
        visible_wavelength: f64,
        calibration_central_wavelength: f64,
        coefficients: impl Into<Vec<f64>>,
        pixel_count: usize,
    ) -> SfgResult<Self> {
        let coefficients = coefficients.into();
        if !(visible_wavelength > 0.0) {
            return Err(SfgError::CalibrationDomain {
                pixel: 0,
                reason: format!("visible wavelength {visible_wavelength} nm is not positive"),
            });
        }

        // The grating is assumed to respond linearly, so moving it from the
        // calibration setting shifts the whole axis.
        let shift = central_wavelength - calibration_central_wavelength;
        let wavelength: Array1<f64> = (0..pixel_count)
            .map(|p| horner(&coefficients, p as f64) + shift)
            .collect();

        if let Some((pixel, wl)) = wavelength
            .iter()
            .enumerate()
            .find(|(_, wl)| !(**wl > 0.0) || !wl.is_finite())
        {
            return Err(SfgError::CalibrationDomain {
                pixel,
                reason: format!("wavelength {wl} nm is not a positive finite value"),
            });
        }

        let frequency = wavelength.mapv(|wl| NM_TO_WAVENUMBER / wl);
        let wavenumber = wavelength.mapv(|wl| {
            round2(NM_TO_WAVENUMBER / (1.0 / (1.0 / wl - 1.0 / visible_wavelength)))
        });

        if let Some(pixel) = wavenumber.iter().position(|wn| !wn.is_finite()) {
            return Err(SfgError::CalibrationDomain {
                pixel,
                reason: "wavenumber conversion is not finite".to_string(),
            });
        }

        Ok(Calibration {
            central_wavelength,
            visible_wavelength,
            calibration_central_wavelength,
            coefficients,
            wavelength,
            frequency,
            wavenumber,
        })
    }

    /// Calibration stored in a raw dataset header.
    pub fn from_raw(raw: &RawDataset) -> SfgResult<Self> {
        Self::with_pixel_count(
            raw.central_wavelength,
            raw.visible_wavelength,
            raw.calibration_central_wavelength,
            raw.calibration_coefficients.clone(),
            raw.pixel_count(),
        )
    }

    pub fn central_wavelength(&self) -> f64 {
        self.central_wavelength
    }

    pub fn visible_wavelength(&self) -> f64 {
        self.visible_wavelength
    }

    pub fn calibration_central_wavelength(&self) -> f64 {
        self.calibration_central_wavelength
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn pixel_count(&self) -> usize {
        self.wavelength.len()
    }

    /// Wavelength in nm per pixel.
    pub fn wavelength(&self) -> &Array1<f64> {
        &self.wavelength
    }

    /// Signal frequency in cm⁻¹, before removing the visible beam.
    pub fn frequency(&self) -> &Array1<f64> {
        &self.frequency
    }

    /// SFG wavenumber in cm⁻¹, rounded to two decimals.
    pub fn wavenumber(&self) -> &Array1<f64> {
        &self.wavenumber
    }
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc * x + c)
}

/// Round half to even on the second decimal.
fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn calibration() -> Calibration {
        Calibration::new(674.0, 811.7, 670.0, vec![0.034274, 642.101]).unwrap()
    }

    #[test]
    fn wavenumber_is_reproducible() {
        let a = calibration();
        let b = calibration();
        assert_eq!(a.wavenumber().len(), DEFAULT_PIXEL_COUNT);
        assert!(a
            .wavenumber()
            .iter()
            .zip(b.wavenumber().iter())
            .all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn known_axis_values() {
        let c = calibration();
        assert_relative_eq!(c.wavelength()[0], 646.101, epsilon = 1e-9);
        assert_relative_eq!(c.frequency()[0], 15477.456311, epsilon = 1e-5);
        assert_relative_eq!(c.wavenumber()[0], 3157.63);
        assert_relative_eq!(c.wavenumber()[1], 3156.81);
        assert_relative_eq!(c.wavenumber()[1599], 1947.44);
    }

    #[test]
    fn wavenumber_has_two_decimals() {
        let c = calibration();
        for wn in c.wavenumber() {
            assert_relative_eq!(*wn, (wn * 100.0).round() / 100.0);
        }
    }

    #[test]
    fn linear_polynomial_is_monotonic() {
        let c = calibration();
        assert!(c.wavelength().windows(2).into_iter().all(|w| w[1] > w[0]));
        assert!(c.wavenumber().windows(2).into_iter().all(|w| w[1] <= w[0]));
    }

    #[test]
    fn zero_wavelength_is_a_domain_error() {
        let err = Calibration::with_pixel_count(670.0, 800.0, 670.0, vec![1.0, -4.0], 10)
            .unwrap_err();
        assert!(matches!(err, SfgError::CalibrationDomain { pixel: 0, .. }));

        // pixel 4 lands exactly on 0 nm
        let err = Calibration::with_pixel_count(670.0, 800.0, 670.0, vec![-1.0, 4.0], 10)
            .unwrap_err();
        assert!(matches!(err, SfgError::CalibrationDomain { pixel: 4, .. }));
    }

    #[test]
    fn visible_wavelength_must_be_positive() {
        assert!(Calibration::new(674.0, 0.0, 670.0, vec![0.034274, 642.101]).is_err());
    }

    #[test]
    fn custom_pixel_count() {
        let c = Calibration::with_pixel_count(674.0, 811.7, 670.0, vec![0.034274, 642.101], 512)
            .unwrap();
        assert_eq!(c.pixel_count(), 512);
        assert_eq!(c.coefficients(), &[0.034274, 642.101]);
    }
}
