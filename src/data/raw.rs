use ndarray::{Array1, Array4};
use serde::{Deserialize, Serialize};

use super::error::{SfgError, SfgResult};

// ---------------------------------------------------------------------------
// RawDataset – one measurement as handed over by an instrument reader
// ---------------------------------------------------------------------------

/// Raw counts indexed `[pp_delay, scan, spectrum_channel, pixel]` plus the
/// header values needed for calibration.
///
/// Field names on disk follow the instrument header keys (`central_wl`,
/// `vis_wl`, `calib_central_wl`, `calib_coeff`, `timedelay`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataset {
    pub data: Array4<f64>,
    #[serde(rename = "central_wl")]
    pub central_wavelength: f64,
    #[serde(rename = "vis_wl")]
    pub visible_wavelength: f64,
    #[serde(rename = "calib_central_wl")]
    pub calibration_central_wavelength: f64,
    /// Grating polynomial, highest degree first, trailing zero terms stripped.
    #[serde(rename = "calib_coeff")]
    pub calibration_coefficients: Vec<f64>,
    #[serde(rename = "timedelay")]
    pub pp_delay: Array1<f64>,
    #[serde(default)]
    pub gain: Option<f64>,
    #[serde(default)]
    pub timestamps: Vec<String>,
}

impl RawDataset {
    pub fn new(
        data: Array4<f64>,
        pp_delay: Array1<f64>,
        central_wavelength: f64,
        visible_wavelength: f64,
        calibration_central_wavelength: f64,
        calibration_coefficients: Vec<f64>,
    ) -> SfgResult<Self> {
        let raw = RawDataset {
            data,
            central_wavelength,
            visible_wavelength,
            calibration_central_wavelength,
            calibration_coefficients,
            pp_delay,
            gain: None,
            timestamps: Vec::new(),
        };
        raw.validate()?;
        Ok(raw)
    }

    /// Check the delay axis against the data. Run after deserialization.
    pub fn validate(&self) -> SfgResult<()> {
        if self.pp_delay.len() != self.delay_count() {
            return Err(SfgError::shape(
                "timedelay",
                self.delay_count(),
                self.pp_delay.len(),
            ));
        }
        Ok(())
    }

    pub fn delay_count(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn scan_count(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn channel_count(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn pixel_count(&self) -> usize {
        self.data.shape()[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn delay_axis_must_match() {
        let data = Array::zeros((3, 2, 1, 5));
        let ok = RawDataset::new(data.clone(), Array1::zeros(3), 674.0, 800.0, 670.0, vec![1.0]);
        assert!(ok.is_ok());
        let err = RawDataset::new(data, Array1::zeros(2), 674.0, 800.0, 670.0, vec![1.0]);
        assert!(matches!(err, Err(SfgError::Shape { field: "timedelay", .. })));
    }

    #[test]
    fn json_uses_header_keys() {
        let raw = RawDataset::new(
            Array::zeros((2, 1, 1, 3)),
            ndarray::array![-1.0, 1.0],
            674.0,
            800.0,
            670.0,
            vec![0.03, 642.0],
        )
        .unwrap();
        let text = serde_json::to_string(&raw).unwrap();
        assert!(text.contains("\"central_wl\""));
        assert!(text.contains("\"timedelay\""));
        let back: RawDataset = serde_json::from_str(&text).unwrap();
        assert_eq!(back, raw);
        assert_eq!(back.pixel_count(), 3);
        assert_eq!(back.scan_count(), 1);
    }
}
