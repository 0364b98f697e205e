use ndarray::{s, Array1, Array2, Axis};

use super::error::{SfgError, SfgResult};
use super::filter;
use super::pump_probe::PumpMetadata;
use super::select::AxisSpec;
use super::trace::{Trace, Window};

/// Fields of a [`Bleach`], all optional.
///
/// Used to assemble a bleach from arithmetic or from a partial file, and to
/// take one apart again.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BleachParts {
    pub intensity: Option<Array2<f64>>,
    pub baseline: Option<Array2<f64>>,
    pub norm: Option<Array2<f64>>,
    pub wavenumber: Option<Array1<f64>>,
    pub pp_delay: Option<Array1<f64>>,
    pub basesubed: Option<Array2<f64>>,
    pub normalized: Option<Array2<f64>>,
    pub intensity_uncertainty: Option<Array2<f64>>,
    pub normalized_uncertainty: Option<Array2<f64>>,
    pub pixel: Option<Array1<usize>>,
    pub metadata: PumpMetadata,
}

// ---------------------------------------------------------------------------
// Bleach – difference or ratio of two pump-probe measurements
// ---------------------------------------------------------------------------

/// Result of `PumpProbe - PumpProbe` or `PumpProbe / PumpProbe`.
///
/// Unlike the pump-probe inputs, the derived fields are stored: `normalized`
/// of a difference is the difference of the normalized inputs. Any field may
/// be absent, in which case operations that need it fail with
/// [`SfgError::MissingField`]. The fields that are present always agree in
/// shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Bleach {
    intensity: Option<Array2<f64>>,
    baseline: Option<Array2<f64>>,
    norm: Option<Array2<f64>>,
    wavenumber: Option<Array1<f64>>,
    pp_delay: Option<Array1<f64>>,
    basesubed: Option<Array2<f64>>,
    normalized: Option<Array2<f64>>,
    intensity_uncertainty: Option<Array2<f64>>,
    normalized_uncertainty: Option<Array2<f64>>,
    pixel: Option<Array1<usize>>,
    metadata: PumpMetadata,
}

impl Bleach {
    pub fn from_parts(parts: BleachParts) -> SfgResult<Bleach> {
        let planes = [
            ("intensity", &parts.intensity),
            ("baseline", &parts.baseline),
            ("norm", &parts.norm),
            ("basesubed", &parts.basesubed),
            ("normalized", &parts.normalized),
            ("intensity_uncertainty", &parts.intensity_uncertainty),
            ("normalized_uncertainty", &parts.normalized_uncertainty),
        ];
        let mut dim: Option<(usize, usize)> = None;
        for (field, plane) in planes {
            let Some(plane) = plane else { continue };
            match dim {
                None => dim = Some(plane.dim()),
                Some(expected) if expected != plane.dim() => {
                    return Err(SfgError::shape(field, expected, plane.dim()));
                }
                Some(_) => {}
            }
        }

        let rows = dim.map(|d| d.0).or(parts.pp_delay.as_ref().map(|v| v.len()));
        let cols = dim
            .map(|d| d.1)
            .or(parts.wavenumber.as_ref().map(|v| v.len()))
            .or(parts.pixel.as_ref().map(|v| v.len()));
        check_len("pp_delay", rows, parts.pp_delay.as_ref().map(|v| v.len()))?;
        check_len("wavenumber", cols, parts.wavenumber.as_ref().map(|v| v.len()))?;
        check_len("pixel", cols, parts.pixel.as_ref().map(|v| v.len()))?;

        Ok(Bleach {
            intensity: parts.intensity,
            baseline: parts.baseline,
            norm: parts.norm,
            wavenumber: parts.wavenumber,
            pp_delay: parts.pp_delay,
            basesubed: parts.basesubed,
            normalized: parts.normalized,
            intensity_uncertainty: parts.intensity_uncertainty,
            normalized_uncertainty: parts.normalized_uncertainty,
            pixel: parts.pixel,
            metadata: parts.metadata,
        })
    }

    pub fn into_parts(self) -> BleachParts {
        BleachParts {
            intensity: self.intensity,
            baseline: self.baseline,
            norm: self.norm,
            wavenumber: self.wavenumber,
            pp_delay: self.pp_delay,
            basesubed: self.basesubed,
            normalized: self.normalized,
            intensity_uncertainty: self.intensity_uncertainty,
            normalized_uncertainty: self.normalized_uncertainty,
            pixel: self.pixel,
            metadata: self.metadata,
        }
    }

    pub fn intensity(&self) -> SfgResult<&Array2<f64>> {
        require(&self.intensity, "intensity")
    }

    pub fn baseline(&self) -> SfgResult<&Array2<f64>> {
        require(&self.baseline, "baseline")
    }

    pub fn norm(&self) -> SfgResult<&Array2<f64>> {
        require(&self.norm, "norm")
    }

    pub fn wavenumber(&self) -> SfgResult<&Array1<f64>> {
        require(&self.wavenumber, "wavenumber")
    }

    pub fn pp_delay(&self) -> SfgResult<&Array1<f64>> {
        require(&self.pp_delay, "pp_delay")
    }

    pub fn basesubed(&self) -> SfgResult<&Array2<f64>> {
        require(&self.basesubed, "basesubed")
    }

    pub fn normalized(&self) -> SfgResult<&Array2<f64>> {
        require(&self.normalized, "normalized")
    }

    pub fn intensity_uncertainty(&self) -> SfgResult<&Array2<f64>> {
        require(&self.intensity_uncertainty, "intensity_uncertainty")
    }

    pub fn normalized_uncertainty(&self) -> SfgResult<&Array2<f64>> {
        require(&self.normalized_uncertainty, "normalized_uncertainty")
    }

    pub fn pixel(&self) -> SfgResult<&Array1<usize>> {
        require(&self.pixel, "pixel")
    }

    pub fn metadata(&self) -> PumpMetadata {
        self.metadata
    }

    /// Reduce the bleach over a pixel window into a kinetic trace.
    ///
    /// `pixel` selects columns by pixel number (`start <= p < stop`), `delay`
    /// selects rows by position. Both take a range; `AxisSpec::Unbounded`
    /// stands for the whole axis. An `Index` or an empty window is an
    /// [`SfgError::InvalidRange`].
    pub fn get_trace(&self, pixel: AxisSpec, delay: AxisSpec) -> SfgResult<Trace> {
        let normalized = self.normalized()?;
        let uncertainty = self.normalized_uncertainty()?;
        let pixels = self.pixel()?;
        let pp_delay = self.pp_delay()?;
        let (rows, _) = normalized.dim();

        let columns: Vec<usize> = match pixel {
            AxisSpec::Unbounded => (0..pixels.len()).collect(),
            AxisSpec::Range(start, stop) => pixels
                .iter()
                .enumerate()
                .filter(|(_, &p)| start <= p && p < stop)
                .map(|(i, _)| i)
                .collect(),
            AxisSpec::Index(i) => return Err(not_a_range("pixel", i)),
        };
        if columns.is_empty() {
            return Err(SfgError::InvalidRange {
                argument: "pixel",
                reason: format!("window {pixel} contains no pixel"),
            });
        }

        let delays = match delay {
            AxisSpec::Unbounded => 0..rows,
            AxisSpec::Range(start, stop) if start < stop && stop <= rows => start..stop,
            AxisSpec::Range(start, stop) => {
                return Err(SfgError::InvalidRange {
                    argument: "delay",
                    reason: format!("{start}:{stop} is empty or exceeds {rows} delays"),
                })
            }
            AxisSpec::Index(i) => return Err(not_a_range("delay", i)),
        };

        let width = columns.len() as f64;
        let window = normalized
            .slice(s![delays.clone(), ..])
            .select(Axis(1), &columns);
        let trace = window.sum_axis(Axis(1)) / width;
        let trace_uncertainty = uncertainty
            .slice(s![delays.clone(), ..])
            .select(Axis(1), &columns)
            .mapv(|v| v * v)
            .sum_axis(Axis(1))
            .mapv(f64::sqrt)
            / width;
        log::debug!(
            "trace over {} pixels and delays {}:{}",
            columns.len(),
            delays.start,
            delays.end
        );

        let mut trace = Trace::new(pp_delay.slice(s![delays.clone()]).to_owned(), trace, trace_uncertainty)?
            .with_metadata(self.metadata);
        if let AxisSpec::Range(..) = pixel {
            trace = trace.with_pixel(
                columns
                    .iter()
                    .map(|&c| pixels[c] as f64)
                    .collect::<Array1<f64>>(),
            );
        }
        if let Some(wavenumber) = &self.wavenumber {
            trace = trace.with_wavenumber(wavenumber.select(Axis(0), &columns));
        }
        if let AxisSpec::Range(..) = delay {
            trace = trace.with_delay(delays.map(|d| d as f64).collect::<Array1<f64>>());
        }
        Ok(trace)
    }

    /// Pixel window whose wavenumbers lie strictly between `lo` and `hi`.
    pub fn pixel_range_for_wavenumbers(&self, lo: f64, hi: f64) -> SfgResult<AxisSpec> {
        let wavenumber = self.wavenumber()?;
        let pixels = self.pixel()?;
        let inside = pixels
            .iter()
            .zip(wavenumber.iter())
            .filter(|(_, &wn)| lo < wn && wn < hi)
            .map(|(&p, _)| p);
        let (min, max) = inside.fold(None, |acc: Option<(usize, usize)>, p| match acc {
            None => Some((p, p)),
            Some((min, max)) => Some((min.min(p), max.max(p))),
        })
        .ok_or_else(|| SfgError::InvalidRange {
            argument: "wavenumber",
            reason: format!("no pixel between {lo} and {hi} cm⁻¹"),
        })?;
        Ok(AxisSpec::Range(min, max + 1))
    }

    // -----------------------------------------------------------------------
    // Corrections on `normalized`
    // -----------------------------------------------------------------------

    /// Replace `normalized`, keeping its shape.
    pub fn with_normalized(&self, normalized: Array2<f64>) -> SfgResult<Bleach> {
        let current = self.normalized()?;
        if current.dim() != normalized.dim() {
            return Err(SfgError::shape("normalized", current.dim(), normalized.dim()));
        }
        let mut out = self.clone();
        out.normalized = Some(normalized);
        Ok(out)
    }

    /// Shift `normalized` by `delta`, e.g. -1 to center a ratio on zero.
    pub fn offset_normalized(&self, delta: f64) -> SfgResult<Bleach> {
        self.with_normalized(self.normalized()? + delta)
    }

    /// Remove the difference between the channels that exists before the
    /// pump arrives, taken from the first delay.
    pub fn static_difference_corrected(&self) -> SfgResult<Bleach> {
        self.with_normalized(filter::static_difference(self.normalized()?.view()))
    }

    /// Remove an exponentially growing heat background, see
    /// [`filter::heat_filter`].
    pub fn heat_corrected(&self, tau: f64, c: f64) -> SfgResult<Bleach> {
        let corrected = filter::heat_filter(
            self.normalized()?.view(),
            self.pp_delay()?.view(),
            tau,
            c,
        );
        self.with_normalized(corrected)
    }
}

fn require<'a, T>(field: &'a Option<T>, name: &'static str) -> SfgResult<&'a T> {
    field.as_ref().ok_or(SfgError::MissingField(name))
}

fn check_len(field: &'static str, expected: Option<usize>, actual: Option<usize>) -> SfgResult<()> {
    match (expected, actual) {
        (Some(expected), Some(actual)) if expected != actual => {
            Err(SfgError::shape(field, expected, actual))
        }
        _ => Ok(()),
    }
}

fn not_a_range(argument: &'static str, index: usize) -> SfgError {
    SfgError::InvalidRange {
        argument,
        reason: format!("single index {index} given, expected a range or the full axis"),
    }
}
