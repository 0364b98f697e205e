use std::fmt;
use std::ops::Range;

use ndarray::{Array1, ArrayView1, ArrayView3, ArrayView4, ArrayViewD, Axis, Slice};
use serde::{Deserialize, Serialize};

use super::error::{SfgError, SfgResult};

/// Axis names of a raw measurement, in storage order.
pub const AXIS_NAMES: [&str; 4] = ["pp_delay", "scan", "spectrum_channel", "pixel"];

const PP_DELAY: usize = 0;
const SCAN: usize = 1;
const SPECTRUM_CHANNEL: usize = 2;
const PIXEL: usize = 3;

// ---------------------------------------------------------------------------
// AxisSpec – selection on a single axis
// ---------------------------------------------------------------------------

/// Selection on one axis of a `[pp_delay, scan, spectrum_channel, pixel]` array.
///
/// `Index` removes the axis when used with [`SelectorPP::apply`]. Call sites
/// that need a fixed rank use [`SelectorPP::apply_keep_rank`] or
/// [`SelectorPP::apply_channel`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "AxisSpecRepr", into = "AxisSpecRepr")]
pub enum AxisSpec {
    /// The full axis.
    #[default]
    Unbounded,
    /// A single position; collapses the axis.
    Index(usize),
    /// `start..stop`, stop exclusive.
    Range(usize, usize),
}

impl AxisSpec {
    /// Build a spec from optional bounds. Both or neither bound must be given.
    pub fn from_bounds(start: Option<usize>, stop: Option<usize>) -> SfgResult<Self> {
        match (start, stop) {
            (None, None) => Ok(AxisSpec::Unbounded),
            (Some(start), Some(stop)) if start <= stop => Ok(AxisSpec::Range(start, stop)),
            (Some(start), Some(stop)) => Err(SfgError::InvalidSelectorRange {
                axis: "range",
                reason: format!("start {start} is past stop {stop}"),
            }),
            (start, stop) => Err(SfgError::InvalidSelectorRange {
                axis: "range",
                reason: format!("both bounds are required, got {start:?}..{stop:?}"),
            }),
        }
    }

    /// Positions covered by this spec on an axis of length `len`.
    ///
    /// An `Index(i)` resolves to `i..i + 1`.
    pub fn resolve(&self, axis: &'static str, len: usize) -> SfgResult<Range<usize>> {
        let range = match *self {
            AxisSpec::Unbounded => 0..len,
            AxisSpec::Index(i) => i..i + 1,
            AxisSpec::Range(start, stop) => start..stop,
        };
        if range.start > range.end || range.end > len {
            return Err(SfgError::InvalidSelectorRange {
                axis,
                reason: format!("{self} is out of bounds for length {len}"),
            });
        }
        Ok(range)
    }

    /// Slice a 1D companion array (wavenumbers, delays) the way this spec
    /// slices the matching data axis.
    pub fn pick<A: Clone>(
        &self,
        axis: &'static str,
        values: ArrayView1<A>,
    ) -> SfgResult<Array1<A>> {
        let range = self.resolve(axis, values.len())?;
        Ok(values.slice_axis(Axis(0), Slice::from(range)).to_owned())
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, AxisSpec::Unbounded)
    }
}

impl fmt::Display for AxisSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisSpec::Unbounded => write!(f, ":"),
            AxisSpec::Index(i) => write!(f, "{i}"),
            AxisSpec::Range(start, stop) => write!(f, "{start}:{stop}"),
        }
    }
}

impl From<usize> for AxisSpec {
    fn from(i: usize) -> Self {
        AxisSpec::Index(i)
    }
}

/// Config representation: `null`, an integer, or `[start, stop]`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AxisSpecRepr {
    Index(usize),
    Bounds(Vec<Option<usize>>),
    Unbounded(()),
}

impl TryFrom<AxisSpecRepr> for AxisSpec {
    type Error = SfgError;

    fn try_from(repr: AxisSpecRepr) -> Result<Self, Self::Error> {
        match repr {
            AxisSpecRepr::Unbounded(()) => Ok(AxisSpec::Unbounded),
            AxisSpecRepr::Index(i) => Ok(AxisSpec::Index(i)),
            AxisSpecRepr::Bounds(bounds) => match bounds.as_slice() {
                [start, stop] => AxisSpec::from_bounds(*start, *stop),
                other => Err(SfgError::InvalidSelectorRange {
                    axis: "range",
                    reason: format!("expected [start, stop], got {} bounds", other.len()),
                }),
            },
        }
    }
}

impl From<AxisSpec> for AxisSpecRepr {
    fn from(spec: AxisSpec) -> Self {
        match spec {
            AxisSpec::Unbounded => AxisSpecRepr::Unbounded(()),
            AxisSpec::Index(i) => AxisSpecRepr::Index(i),
            AxisSpec::Range(start, stop) => AxisSpecRepr::Bounds(vec![Some(start), Some(stop)]),
        }
    }
}

// ---------------------------------------------------------------------------
// SelectorPP – the four-axis selection
// ---------------------------------------------------------------------------

/// Declarative selection over `[pp_delay, scan, spectrum_channel, pixel]` data.
///
/// ```text
///  data[:, :, 0, 400:1200]
///  SelectorPP::default()
///      .with_spectrum_channel(AxisSpec::Index(0))
///      .with_pixel(AxisSpec::Range(400, 1200))
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "SelectorRepr", into = "SelectorRepr")]
pub struct SelectorPP {
    axes: [AxisSpec; 4],
}

impl SelectorPP {
    pub fn new(
        pp_delay: AxisSpec,
        scan: AxisSpec,
        spectrum_channel: AxisSpec,
        pixel: AxisSpec,
    ) -> Self {
        SelectorPP {
            axes: [pp_delay, scan, spectrum_channel, pixel],
        }
    }

    /// The combined selection in storage order.
    pub fn as_array(&self) -> [AxisSpec; 4] {
        self.axes
    }

    pub fn pp_delay(&self) -> AxisSpec {
        self.axes[PP_DELAY]
    }

    pub fn scan(&self) -> AxisSpec {
        self.axes[SCAN]
    }

    pub fn spectrum_channel(&self) -> AxisSpec {
        self.axes[SPECTRUM_CHANNEL]
    }

    pub fn pixel(&self) -> AxisSpec {
        self.axes[PIXEL]
    }

    pub fn set_pp_delay(&mut self, spec: AxisSpec) {
        self.axes[PP_DELAY] = spec;
    }

    pub fn set_scan(&mut self, spec: AxisSpec) {
        self.axes[SCAN] = spec;
    }

    pub fn set_spectrum_channel(&mut self, spec: AxisSpec) {
        self.axes[SPECTRUM_CHANNEL] = spec;
    }

    pub fn set_pixel(&mut self, spec: AxisSpec) {
        self.axes[PIXEL] = spec;
    }

    pub fn with_pp_delay(mut self, spec: impl Into<AxisSpec>) -> Self {
        self.set_pp_delay(spec.into());
        self
    }

    pub fn with_scan(mut self, spec: impl Into<AxisSpec>) -> Self {
        self.set_scan(spec.into());
        self
    }

    pub fn with_spectrum_channel(mut self, spec: impl Into<AxisSpec>) -> Self {
        self.set_spectrum_channel(spec.into());
        self
    }

    pub fn with_pixel(mut self, spec: impl Into<AxisSpec>) -> Self {
        self.set_pixel(spec.into());
        self
    }

    /// Resolve every axis against `shape`, failing on any out-of-bounds spec.
    fn resolve_all(&self, shape: &[usize]) -> SfgResult<[Range<usize>; 4]> {
        Ok([
            self.axes[0].resolve(AXIS_NAMES[0], shape[0])?,
            self.axes[1].resolve(AXIS_NAMES[1], shape[1])?,
            self.axes[2].resolve(AXIS_NAMES[2], shape[2])?,
            self.axes[3].resolve(AXIS_NAMES[3], shape[3])?,
        ])
    }

    /// Select the data; every `Index` removes its axis.
    pub fn apply<'a, A>(&self, view: ArrayView4<'a, A>) -> SfgResult<ArrayViewD<'a, A>> {
        self.resolve_all(view.shape())?;
        let mut out = view.into_dyn();
        // Last axis first, so collapsing never shifts the axes still to visit.
        for (axis, spec) in self.axes.iter().enumerate().rev() {
            match *spec {
                AxisSpec::Unbounded => {}
                AxisSpec::Range(start, stop) => {
                    out.slice_axis_inplace(Axis(axis), Slice::from(start..stop))
                }
                AxisSpec::Index(i) => out = out.index_axis_move(Axis(axis), i),
            }
        }
        Ok(out)
    }

    /// Select without changing rank; `Index(i)` keeps a length-1 axis.
    pub fn apply_keep_rank<'a, A>(
        &self,
        view: ArrayView4<'a, A>,
    ) -> SfgResult<ArrayView4<'a, A>> {
        let ranges = self.resolve_all(view.shape())?;
        let mut out = view;
        for (axis, range) in ranges.into_iter().enumerate() {
            out.slice_axis_inplace(Axis(axis), Slice::from(range));
        }
        Ok(out)
    }

    /// Select one spectrum channel, yielding `[pp_delay, scan, pixel]`.
    ///
    /// The channel must be an `Index`; the other axes keep their rank.
    pub fn apply_channel<'a, A>(
        &self,
        view: ArrayView4<'a, A>,
    ) -> SfgResult<ArrayView3<'a, A>> {
        if !matches!(self.spectrum_channel(), AxisSpec::Index(_)) {
            return Err(SfgError::InvalidSelectorRange {
                axis: AXIS_NAMES[SPECTRUM_CHANNEL],
                reason: format!(
                    "a single channel index is required, got `{}`",
                    self.spectrum_channel()
                ),
            });
        }
        let kept = self.apply_keep_rank(view)?;
        Ok(kept.index_axis_move(Axis(SPECTRUM_CHANNEL), 0))
    }
}

impl fmt::Display for SelectorPP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = &self.axes;
        write!(f, "[{a}, {b}, {c}, {d}]")
    }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct SelectorRepr {
    pp_delay: AxisSpec,
    scan: AxisSpec,
    spectrum_channel: AxisSpec,
    pixel: AxisSpec,
}

impl From<SelectorRepr> for SelectorPP {
    fn from(r: SelectorRepr) -> Self {
        SelectorPP::new(r.pp_delay, r.scan, r.spectrum_channel, r.pixel)
    }
}

impl From<SelectorPP> for SelectorRepr {
    fn from(s: SelectorPP) -> Self {
        let [pp_delay, scan, spectrum_channel, pixel] = s.axes;
        SelectorRepr {
            pp_delay,
            scan,
            spectrum_channel,
            pixel,
        }
    }
}
