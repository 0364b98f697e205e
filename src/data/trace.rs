use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::error::{SfgError, SfgResult};
use super::pump_probe::PumpMetadata;
use super::spectrum::Layer;
use super::table::TraceRow;

/// Provenance of a trace along one axis: everything, or the listed values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Window {
    #[default]
    Unbounded,
    Values(Array1<f64>),
}

impl Window {
    /// `(min, max)` of the values, `None` when unbounded or empty.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Window::Unbounded => None,
            Window::Values(v) if v.is_empty() => None,
            Window::Values(v) => Some((
                v.iter().copied().fold(f64::INFINITY, f64::min),
                v.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )),
        }
    }

    fn from_option(values: Option<Vec<f64>>) -> Self {
        values.map_or(Window::Unbounded, |v| Window::Values(Array1::from(v)))
    }

    fn to_option(&self) -> Option<Vec<f64>> {
        match self {
            Window::Unbounded => None,
            Window::Values(v) => Some(v.to_vec()),
        }
    }
}

impl From<Array1<f64>> for Window {
    fn from(values: Array1<f64>) -> Self {
        Window::Values(values)
    }
}

// ---------------------------------------------------------------------------
// Trace – bleach reduced over a spectral window, as a function of delay
// ---------------------------------------------------------------------------

/// A kinetic trace, the input of the external fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TraceDocument", into = "TraceDocument")]
pub struct Trace {
    pp_delay: Array1<f64>,
    bleach: Array1<f64>,
    bleach_uncertainty: Array1<f64>,
    pixel: Window,
    wavenumber: Window,
    wavelength: Window,
    delay: Window,
    metadata: PumpMetadata,
}

impl Trace {
    /// `bleach` must have the length of `pp_delay`. A scalar uncertainty is
    /// used for every point, an array must match exactly.
    pub fn new(
        pp_delay: impl Into<Array1<f64>>,
        bleach: impl Into<Array1<f64>>,
        uncertainty: impl Into<Layer>,
    ) -> SfgResult<Trace> {
        let pp_delay = pp_delay.into();
        let bleach = bleach.into();
        if bleach.len() != pp_delay.len() {
            return Err(SfgError::shape("bleach", pp_delay.len(), bleach.len()));
        }
        let bleach_uncertainty = uncertainty
            .into()
            .exact("bleach_uncertainty", bleach.raw_dim())?;
        Ok(Trace {
            pp_delay,
            bleach,
            bleach_uncertainty,
            pixel: Window::Unbounded,
            wavenumber: Window::Unbounded,
            wavelength: Window::Unbounded,
            delay: Window::Unbounded,
            metadata: PumpMetadata::default(),
        })
    }

    pub fn with_pixel(mut self, pixel: impl Into<Window>) -> Self {
        self.pixel = pixel.into();
        self
    }

    pub fn with_wavenumber(mut self, wavenumber: impl Into<Window>) -> Self {
        self.wavenumber = wavenumber.into();
        self
    }

    pub fn with_wavelength(mut self, wavelength: impl Into<Window>) -> Self {
        self.wavelength = wavelength.into();
        self
    }

    pub fn with_delay(mut self, delay: impl Into<Window>) -> Self {
        self.delay = delay.into();
        self
    }

    pub fn with_metadata(mut self, metadata: PumpMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn len(&self) -> usize {
        self.pp_delay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pp_delay.is_empty()
    }

    pub fn pp_delay(&self) -> &Array1<f64> {
        &self.pp_delay
    }

    pub fn bleach(&self) -> &Array1<f64> {
        &self.bleach
    }

    pub fn bleach_uncertainty(&self) -> &Array1<f64> {
        &self.bleach_uncertainty
    }

    pub fn pixel(&self) -> &Window {
        &self.pixel
    }

    pub fn wavenumber(&self) -> &Window {
        &self.wavenumber
    }

    pub fn wavelength(&self) -> &Window {
        &self.wavelength
    }

    pub fn delay(&self) -> &Window {
        &self.delay
    }

    pub fn metadata(&self) -> PumpMetadata {
        self.metadata
    }

    /// Long form rows over `bleach` and `bleach_uncertainty`.
    ///
    /// Only the min / max of each window survive.
    pub fn table_rows(&self) -> Vec<TraceRow> {
        let pixel = self.pixel.bounds();
        let wavenumber = self.wavenumber.bounds();
        let wavelength = self.wavelength.bounds();
        let columns = [
            ("bleach", &self.bleach),
            ("bleach_uncertainty", &self.bleach_uncertainty),
        ];
        columns
            .into_iter()
            .flat_map(|(variable, values)| {
                self.pp_delay
                    .iter()
                    .zip(values.iter())
                    .map(move |(&pp_delay, &value)| TraceRow {
                        pp_delay,
                        variable: variable.to_string(),
                        value,
                        pixel_start: pixel.map(|b| b.0),
                        pixel_stop: pixel.map(|b| b.1),
                        wavenumber_start: wavenumber.map(|b| b.0),
                        wavenumber_stop: wavenumber.map(|b| b.1),
                        wavelength_start: wavelength.map(|b| b.0),
                        wavelength_stop: wavelength.map(|b| b.1),
                        cross_correlation_width: self.metadata.cross_correlation_width,
                        pump_frequency: self.metadata.pump_frequency,
                        pump_width: self.metadata.pump_width,
                    })
            })
            .collect()
    }
}

/// Flat on-disk form of a [`Trace`]. Unbounded windows are `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TraceDocument {
    pp_delay: Vec<f64>,
    bleach: Vec<f64>,
    bleach_uncertainty: Vec<f64>,
    #[serde(default)]
    pump_frequency: Option<f64>,
    #[serde(default)]
    pump_width: Option<f64>,
    #[serde(default)]
    cross_correlation_width: Option<f64>,
    #[serde(default)]
    pixel: Option<Vec<f64>>,
    #[serde(default)]
    wavenumber: Option<Vec<f64>>,
    #[serde(default)]
    wavelength: Option<Vec<f64>>,
    #[serde(default)]
    delay: Option<Vec<f64>>,
}

impl TryFrom<TraceDocument> for Trace {
    type Error = SfgError;

    fn try_from(doc: TraceDocument) -> SfgResult<Trace> {
        Ok(Trace::new(doc.pp_delay, doc.bleach, doc.bleach_uncertainty)?
            .with_pixel(Window::from_option(doc.pixel))
            .with_wavenumber(Window::from_option(doc.wavenumber))
            .with_wavelength(Window::from_option(doc.wavelength))
            .with_delay(Window::from_option(doc.delay))
            .with_metadata(PumpMetadata {
                pump_frequency: doc.pump_frequency,
                pump_width: doc.pump_width,
                cross_correlation_width: doc.cross_correlation_width,
            }))
    }
}

impl From<Trace> for TraceDocument {
    fn from(trace: Trace) -> Self {
        TraceDocument {
            pp_delay: trace.pp_delay.to_vec(),
            bleach: trace.bleach.to_vec(),
            bleach_uncertainty: trace.bleach_uncertainty.to_vec(),
            pump_frequency: trace.metadata.pump_frequency,
            pump_width: trace.metadata.pump_width,
            cross_correlation_width: trace.metadata.cross_correlation_width,
            pixel: trace.pixel.to_option(),
            wavenumber: trace.wavenumber.to_option(),
            wavelength: trace.wavelength.to_option(),
            delay: trace.delay.to_option(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn trace() -> Trace {
        Trace::new(array![-1.0, 0.0, 1.0], array![0.0, -0.2, -0.1], array![0.01, 0.02, 0.03])
            .unwrap()
            .with_pixel(array![402.0, 400.0, 401.0])
            .with_wavenumber(array![2600.5, 2601.3, 2602.1])
            .with_metadata(PumpMetadata {
                pump_frequency: Some(2600.0),
                pump_width: None,
                cross_correlation_width: Some(0.3),
            })
    }

    #[test]
    fn bleach_length_is_strict() {
        let err = Trace::new(array![0.0, 1.0], array![1.0], 0.1).unwrap_err();
        assert!(matches!(err, SfgError::Shape { field: "bleach", .. }));
        let err = Trace::new(array![0.0, 1.0], array![1.0, 2.0], vec![0.1]).unwrap_err();
        assert!(matches!(err, SfgError::Shape { field: "bleach_uncertainty", .. }));
    }

    #[test]
    fn scalar_uncertainty_is_broadcast() {
        let t = Trace::new(array![0.0, 1.0, 2.0], array![1.0, 2.0, 3.0], 0.5).unwrap();
        assert_eq!(t.bleach_uncertainty(), &array![0.5, 0.5, 0.5]);
        assert_eq!(t.pixel(), &Window::Unbounded);
    }

    #[test]
    fn window_bounds() {
        assert_eq!(Window::Unbounded.bounds(), None);
        assert_eq!(Window::from(array![3.0, 1.0, 2.0]).bounds(), Some((1.0, 3.0)));
    }

    #[test]
    fn json_round_trip() {
        let t = trace();
        let text = serde_json::to_string(&t).unwrap();
        assert!(text.contains("\"delay\":null"));
        let back: Trace = serde_json::from_str(&text).unwrap();
        assert_eq!(back.len(), t.len());
        for (a, b) in back.bleach().iter().zip(t.bleach()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }
        assert_eq!(back.pixel(), t.pixel());
        assert_eq!(back.metadata(), t.metadata());
    }

    #[test]
    fn json_import_is_validated() {
        let text = r#"{"pp_delay": [0, 1], "bleach": [1], "bleach_uncertainty": [0.1]}"#;
        assert!(serde_json::from_str::<Trace>(text).is_err());
    }

    #[test]
    fn table_rows_keep_window_bounds() {
        let rows = trace().table_rows();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].variable, "bleach");
        assert_eq!(rows[3].variable, "bleach_uncertainty");
        assert_relative_eq!(rows[4].value, 0.02);
        assert_eq!(rows[0].pixel_start, Some(400.0));
        assert_eq!(rows[0].pixel_stop, Some(402.0));
        assert_eq!(rows[0].wavelength_start, None);
        assert_eq!(rows[5].pump_frequency, Some(2600.0));
    }
}
