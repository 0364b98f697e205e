use std::ops::{Div, Sub};

use ndarray::{Array, Array1, Array2, ArrayD, Dimension, Ix2, Zip};
use serde::{Deserialize, Serialize};

use super::bleach::{Bleach, BleachParts};
use super::error::{SfgError, SfgResult};
use super::spectrum::{resolve_uncertainty, Layer, PixelSource, SpectralAggregate};

/// Pump settings recorded alongside a pump-probe measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpMetadata {
    /// Central pump frequency in cm⁻¹.
    pub pump_frequency: Option<f64>,
    /// Spectral width of the pump in cm⁻¹.
    pub pump_width: Option<f64>,
    /// Temporal width of the pump-probe cross correlation.
    pub cross_correlation_width: Option<f64>,
}

impl PumpMetadata {
    /// Fill unset values from `fallback`.
    pub fn or(self, fallback: PumpMetadata) -> PumpMetadata {
        PumpMetadata {
            pump_frequency: self.pump_frequency.or(fallback.pump_frequency),
            pump_width: self.pump_width.or(fallback.pump_width),
            cross_correlation_width: self
                .cross_correlation_width
                .or(fallback.cross_correlation_width),
        }
    }
}

// ---------------------------------------------------------------------------
// PumpProbe – delay × wavenumber intensities
// ---------------------------------------------------------------------------

/// A pump-probe measurement: one spectrum per pump-probe delay.
///
/// `intensity` has shape `(pp_delay.len(), wavenumber.len())`. Two
/// measurements on the same axes combine into a [`Bleach`]:
///
/// ```text
///  let bleach = (&pumped - &probed)?;
///  let ratio  = (&pumped / &probed)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PumpProbe {
    intensity: Array2<f64>,
    baseline: Array2<f64>,
    norm: Array2<f64>,
    wavenumber: Array1<f64>,
    pp_delay: Array1<f64>,
    intensity_uncertainty: Array2<f64>,
    pixel: Array1<usize>,
    metadata: PumpMetadata,
}

impl PumpProbe {
    pub fn builder<D: Dimension>(
        intensity: Array<f64, D>,
        wavenumber: impl Into<Array1<f64>>,
    ) -> PumpProbeBuilder {
        PumpProbeBuilder {
            intensity: intensity.into_dyn(),
            wavenumber: wavenumber.into(),
            baseline: None,
            norm: None,
            pp_delay: None,
            uncertainty: None,
            pixel: PixelSource::Default,
            metadata: PumpMetadata::default(),
        }
    }

    pub fn pp_delay(&self) -> &Array1<f64> {
        &self.pp_delay
    }

    pub fn metadata(&self) -> PumpMetadata {
        self.metadata
    }

    fn check_compatible(&self, other: &PumpProbe) -> SfgResult<()> {
        if self.wavenumber != other.wavenumber {
            return Err(SfgError::IncompatibleAggregates { axis: "wavenumber" });
        }
        if self.pp_delay != other.pp_delay {
            return Err(SfgError::IncompatibleAggregates { axis: "pp_delay" });
        }
        Ok(())
    }

    /// `self - other`: the bleach as a difference of two normalized channels.
    ///
    /// `normalized` is the difference of the two normalized signals, not the
    /// normalization of the raw difference. Uncertainties add in quadrature.
    pub fn difference(&self, other: &PumpProbe) -> SfgResult<Bleach> {
        self.check_compatible(other)?;
        Bleach::from_parts(BleachParts {
            intensity: Some(&self.intensity - &other.intensity),
            baseline: Some(mean(&self.baseline, &other.baseline)),
            norm: Some(mean(&self.norm, &other.norm)),
            wavenumber: Some(self.wavenumber.clone()),
            pp_delay: Some(self.pp_delay.clone()),
            basesubed: Some(self.basesubed() - other.basesubed()),
            normalized: Some(self.normalized() - other.normalized()),
            intensity_uncertainty: Some(quadrature(
                &self.intensity_uncertainty,
                &other.intensity_uncertainty,
            )),
            normalized_uncertainty: Some(quadrature(
                &self.normalized_uncertainty(),
                &other.normalized_uncertainty(),
            )),
            pixel: Some(self.pixel.clone()),
            metadata: self.metadata,
        })
    }

    /// `self / other`: the bleach as a ratio of two measurements.
    ///
    /// Uncertainties follow first order propagation for independent values.
    pub fn ratio(&self, other: &PumpProbe) -> SfgResult<Bleach> {
        self.check_compatible(other)?;
        let normalized_a = self.normalized();
        let normalized_b = other.normalized();
        Bleach::from_parts(BleachParts {
            intensity: Some(&self.intensity / &other.intensity),
            baseline: Some(&self.baseline / &other.baseline),
            norm: Some(mean(&self.norm, &other.norm)),
            wavenumber: Some(self.wavenumber.clone()),
            pp_delay: Some(self.pp_delay.clone()),
            basesubed: Some(self.basesubed() / other.basesubed()),
            normalized: Some(&normalized_a / &normalized_b),
            intensity_uncertainty: Some(ratio_uncertainty(
                &self.intensity,
                &self.intensity_uncertainty,
                &other.intensity,
                &other.intensity_uncertainty,
            )),
            normalized_uncertainty: Some(ratio_uncertainty(
                &normalized_a,
                &self.normalized_uncertainty(),
                &normalized_b,
                &other.normalized_uncertainty(),
            )),
            pixel: Some(self.pixel.clone()),
            metadata: self.metadata,
        })
    }
}

impl SpectralAggregate for PumpProbe {
    type Dim = Ix2;

    fn intensity(&self) -> &Array2<f64> {
        &self.intensity
    }

    fn baseline(&self) -> &Array2<f64> {
        &self.baseline
    }

    fn norm(&self) -> &Array2<f64> {
        &self.norm
    }

    fn intensity_uncertainty(&self) -> &Array2<f64> {
        &self.intensity_uncertainty
    }

    fn wavenumber(&self) -> &Array1<f64> {
        &self.wavenumber
    }

    fn pixel(&self) -> &Array1<usize> {
        &self.pixel
    }
}

impl Sub for &PumpProbe {
    type Output = SfgResult<Bleach>;

    fn sub(self, other: &PumpProbe) -> SfgResult<Bleach> {
        self.difference(other)
    }
}

impl Div for &PumpProbe {
    type Output = SfgResult<Bleach>;

    fn div(self, other: &PumpProbe) -> SfgResult<Bleach> {
        self.ratio(other)
    }
}

fn mean(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    (a + b) / 2.0
}

fn quadrature(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Zip::from(a).and(b).map_collect(|&a, &b| (a * a + b * b).sqrt())
}

/// σ of `a / b` for independent `a` and `b`.
fn ratio_uncertainty(
    a: &Array2<f64>,
    sigma_a: &Array2<f64>,
    b: &Array2<f64>,
    sigma_b: &Array2<f64>,
) -> Array2<f64> {
    Zip::from(a)
        .and(sigma_a)
        .and(b)
        .and(sigma_b)
        .map_collect(|&a, &sa, &b, &sb| ((sa / b).powi(2) + (a * sb / b.powi(2)).powi(2)).sqrt())
}

// ---------------------------------------------------------------------------
// PumpProbeBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PumpProbeBuilder {
    intensity: ArrayD<f64>,
    wavenumber: Array1<f64>,
    baseline: Option<Layer>,
    norm: Option<Layer>,
    pp_delay: Option<Array1<f64>>,
    uncertainty: Option<Layer>,
    pixel: PixelSource,
    metadata: PumpMetadata,
}

impl PumpProbeBuilder {
    /// Scalar, per-wavenumber row, or full `(delay, wavenumber)` array.
    pub fn baseline(mut self, baseline: impl Into<Layer>) -> Self {
        self.baseline = Some(baseline.into());
        self
    }

    pub fn norm(mut self, norm: impl Into<Layer>) -> Self {
        self.norm = Some(norm.into());
        self
    }

    pub fn pp_delay(mut self, pp_delay: impl Into<Array1<f64>>) -> Self {
        self.pp_delay = Some(pp_delay.into());
        self
    }

    pub fn intensity_uncertainty(mut self, uncertainty: impl Into<Layer>) -> Self {
        self.uncertainty = Some(uncertainty.into());
        self
    }

    pub fn pixel(mut self, pixel: impl Into<PixelSource>) -> Self {
        self.pixel = pixel.into();
        self
    }

    pub fn metadata(mut self, metadata: PumpMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(self) -> SfgResult<PumpProbe> {
        let ndim = self.intensity.ndim();
        let intensity = self
            .intensity
            .into_dimensionality::<Ix2>()
            .map_err(|_| SfgError::shape("intensity", "rank 2", format!("rank {ndim}")))?;
        let (rows, cols) = intensity.dim();
        let dim = intensity.raw_dim();

        let baseline = self
            .baseline
            .unwrap_or(Layer::Scalar(0.0))
            .broadcast_to("baseline", dim)?;
        let norm = self.norm.unwrap_or(Layer::Scalar(1.0)).broadcast_to("norm", dim)?;

        if self.wavenumber.len() != cols {
            return Err(SfgError::shape("wavenumber", cols, self.wavenumber.len()));
        }
        let pp_delay = self
            .pp_delay
            .unwrap_or_else(|| Array1::from_iter((0..rows).map(|v| v as f64)));
        if pp_delay.len() != rows {
            return Err(SfgError::shape("pp_delay", rows, pp_delay.len()));
        }

        let pixel = self.pixel.resolve(cols)?;
        let intensity_uncertainty = resolve_uncertainty(self.uncertainty, &intensity)?;

        Ok(PumpProbe {
            intensity,
            baseline,
            norm,
            wavenumber: self.wavenumber,
            pp_delay,
            intensity_uncertainty,
            pixel,
            metadata: self.metadata,
        })
    }
}
