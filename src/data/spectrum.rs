use ndarray::{Array, Array1, Array2, ArrayD, Dimension, Ix1};

use super::error::{SfgError, SfgResult};
use super::select::AxisSpec;

// ---------------------------------------------------------------------------
// SpectralAggregate – what every intensity-carrying aggregate can derive
// ---------------------------------------------------------------------------

/// Shared view of an intensity array with its baseline, norm and uncertainty.
///
/// `baseline`, `norm` and `intensity_uncertainty` always have the shape of
/// `intensity`; implementors guarantee it at construction.
pub trait SpectralAggregate {
    type Dim: Dimension;

    fn intensity(&self) -> &Array<f64, Self::Dim>;
    fn baseline(&self) -> &Array<f64, Self::Dim>;
    fn norm(&self) -> &Array<f64, Self::Dim>;
    fn intensity_uncertainty(&self) -> &Array<f64, Self::Dim>;
    fn wavenumber(&self) -> &Array1<f64>;
    fn pixel(&self) -> &Array1<usize>;

    fn shape(&self) -> &[usize] {
        self.intensity().shape()
    }

    /// Baseline subtracted intensity.
    fn basesubed(&self) -> Array<f64, Self::Dim> {
        self.intensity() - self.baseline()
    }

    fn normalized(&self) -> Array<f64, Self::Dim> {
        self.basesubed() / self.norm()
    }

    /// Uncertainty of [`normalized`](Self::normalized).
    ///
    /// Baseline and norm uncertainties are neglected.
    fn normalized_uncertainty(&self) -> Array<f64, Self::Dim> {
        self.intensity_uncertainty() / self.norm()
    }
}

// ---------------------------------------------------------------------------
// Construction inputs
// ---------------------------------------------------------------------------

/// A value that gets broadcast onto the intensity shape: a scalar, a row
/// vector, or a full array.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Scalar(f64),
    Array(ArrayD<f64>),
}

impl Layer {
    /// Fill `shape` from this layer.
    ///
    /// A scalar fills every element. An array must have exactly `shape`, or,
    /// for a 2D target, be one row that is repeated for every delay.
    pub(crate) fn broadcast_to<D: Dimension>(
        self,
        field: &'static str,
        shape: D,
    ) -> SfgResult<Array<f64, D>> {
        match self {
            Layer::Scalar(v) => Ok(Array::from_elem(shape, v)),
            Layer::Array(a) => {
                let target = shape.slice();
                let is_row = target.len() == 2 && a.ndim() == 1 && a.len() == target[1];
                if a.shape() != target && !is_row {
                    return Err(SfgError::shape(field, target, a.shape()));
                }
                let view = a
                    .broadcast(shape.clone().into_dyn())
                    .ok_or_else(|| SfgError::shape(field, shape.slice(), a.shape()))?;
                view.to_owned()
                    .into_dimensionality::<D>()
                    .map_err(|_| SfgError::shape(field, shape.slice(), a.shape()))
            }
        }
    }

    /// Like [`broadcast_to`](Self::broadcast_to) for scalars, but arrays must
    /// already have exactly `shape`.
    pub(crate) fn exact<D: Dimension>(self, field: &'static str, shape: D) -> SfgResult<Array<f64, D>> {
        match self {
            Layer::Array(a) if a.shape() != shape.slice() => {
                Err(SfgError::shape(field, shape.slice(), a.shape()))
            }
            other => other.broadcast_to(field, shape),
        }
    }
}

impl From<f64> for Layer {
    fn from(v: f64) -> Self {
        Layer::Scalar(v)
    }
}

impl From<Vec<f64>> for Layer {
    fn from(v: Vec<f64>) -> Self {
        Layer::Array(Array1::from(v).into_dyn())
    }
}

impl From<Array1<f64>> for Layer {
    fn from(a: Array1<f64>) -> Self {
        Layer::Array(a.into_dyn())
    }
}

impl From<Array2<f64>> for Layer {
    fn from(a: Array2<f64>) -> Self {
        Layer::Array(a.into_dyn())
    }
}

impl From<ArrayD<f64>> for Layer {
    fn from(a: ArrayD<f64>) -> Self {
        Layer::Array(a)
    }
}

/// Where the camera pixel numbers of an aggregate come from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PixelSource {
    /// `0..n`
    #[default]
    Default,
    /// The pixel spec of the selector that cut the data.
    Spec(AxisSpec),
    Values(Array1<usize>),
}

impl PixelSource {
    pub(crate) fn resolve(self, n: usize) -> SfgResult<Array1<usize>> {
        let pixel = match self {
            PixelSource::Default | PixelSource::Spec(AxisSpec::Unbounded) => Array1::from_iter(0..n),
            PixelSource::Spec(AxisSpec::Index(i)) => Array1::from_elem(1, i),
            PixelSource::Spec(AxisSpec::Range(start, stop)) => Array1::from_iter(start..stop),
            PixelSource::Values(values) => values,
        };
        if pixel.len() != n {
            return Err(SfgError::shape("pixel", n, pixel.len()));
        }
        Ok(pixel)
    }
}

impl From<AxisSpec> for PixelSource {
    fn from(spec: AxisSpec) -> Self {
        PixelSource::Spec(spec)
    }
}

impl From<Array1<usize>> for PixelSource {
    fn from(values: Array1<usize>) -> Self {
        PixelSource::Values(values)
    }
}

/// Intensity uncertainty: explicit, or 10 % of the intensity with a warning.
///
/// A scalar is read as a fraction of the intensity.
pub(crate) fn resolve_uncertainty<D: Dimension>(
    uncertainty: Option<Layer>,
    intensity: &Array<f64, D>,
) -> SfgResult<Array<f64, D>> {
    match uncertainty {
        None => {
            log::warn!("no intensity uncertainty given, using 10 % of the intensity");
            Ok(intensity * 0.1)
        }
        Some(Layer::Scalar(fraction)) => Ok(intensity * fraction),
        Some(layer) => layer.exact("intensity_uncertainty", intensity.raw_dim()),
    }
}

// ---------------------------------------------------------------------------
// Spectrum – a static 1D spectrum
// ---------------------------------------------------------------------------

/// A static SFG spectrum.
///
/// Every field has the length of `intensity`. Built through
/// [`Spectrum::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    intensity: Array1<f64>,
    baseline: Array1<f64>,
    norm: Array1<f64>,
    wavenumber: Array1<f64>,
    intensity_uncertainty: Array1<f64>,
    pixel: Array1<usize>,
}

impl Spectrum {
    pub fn builder<D: Dimension>(intensity: Array<f64, D>) -> SpectrumBuilder {
        SpectrumBuilder {
            intensity: intensity.into_dyn(),
            baseline: None,
            norm: None,
            wavenumber: None,
            uncertainty: None,
            pixel: PixelSource::Default,
        }
    }

    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }
}

impl SpectralAggregate for Spectrum {
    type Dim = Ix1;

    fn intensity(&self) -> &Array1<f64> {
        &self.intensity
    }

    fn baseline(&self) -> &Array1<f64> {
        &self.baseline
    }

    fn norm(&self) -> &Array1<f64> {
        &self.norm
    }

    fn intensity_uncertainty(&self) -> &Array1<f64> {
        &self.intensity_uncertainty
    }

    fn wavenumber(&self) -> &Array1<f64> {
        &self.wavenumber
    }

    fn pixel(&self) -> &Array1<usize> {
        &self.pixel
    }
}

#[derive(Debug, Clone)]
pub struct SpectrumBuilder {
    intensity: ArrayD<f64>,
    baseline: Option<Layer>,
    norm: Option<Layer>,
    wavenumber: Option<Array1<f64>>,
    uncertainty: Option<Layer>,
    pixel: PixelSource,
}

impl SpectrumBuilder {
    pub fn baseline(mut self, baseline: impl Into<Layer>) -> Self {
        self.baseline = Some(baseline.into());
        self
    }

    pub fn norm(mut self, norm: impl Into<Layer>) -> Self {
        self.norm = Some(norm.into());
        self
    }

    pub fn wavenumber(mut self, wavenumber: impl Into<Array1<f64>>) -> Self {
        self.wavenumber = Some(wavenumber.into());
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

    /// Validate every field against `intensity` and build the spectrum.
    pub fn build(self) -> SfgResult<Spectrum> {
        let ndim = self.intensity.ndim();
        let intensity = self
            .intensity
            .into_dimensionality::<Ix1>()
            .map_err(|_| SfgError::shape("intensity", "rank 1", format!("rank {ndim}")))?;
        let n = intensity.len();
        let dim = intensity.raw_dim();

        let baseline = self
            .baseline
            .unwrap_or(Layer::Scalar(0.0))
            .broadcast_to("baseline", dim)?;
        let norm = self.norm.unwrap_or(Layer::Scalar(1.0)).broadcast_to("norm", dim)?;

        // The camera records nm, so a missing axis at least gets the
        // descending wavenumber order right.
        let wavenumber = self
            .wavenumber
            .unwrap_or_else(|| Array1::from_iter((1..=n).rev().map(|v| v as f64)));
        if wavenumber.len() != n {
            return Err(SfgError::shape("wavenumber", n, wavenumber.len()));
        }

        let pixel = self.pixel.resolve(n)?;
        let intensity_uncertainty = resolve_uncertainty(self.uncertainty, &intensity)?;

        Ok(Spectrum {
            intensity,
            baseline,
            norm,
            wavenumber,
            intensity_uncertainty,
            pixel,
        })
    }
}
