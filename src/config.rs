//! JSON pipeline configuration.
//!
//! A config file lists processing steps. Relative paths inside it resolve
//! against the directory of the config file. Calibration and pump settings
//! given at the top level apply to every step unless a step overrides them.
//!
//! ```json
//! {
//!   "calibration": { "vis_wl": 811.7 },
//!   "pump": { "pump_frequency": 2500.0 },
//!   "steps": [
//!     { "kind": "spectrum", "data": "quartz.json", "background": "dark.json",
//!       "select": { "pixel": [400, 1200] }, "out": "quartz_spectrum.json" },
//!     { "kind": "pump_probe", "data": "pumped.json", "background": 250.0,
//!       "norm": "quartz_spectrum.json", "out": "pumped_pp.json" },
//!     { "kind": "bleach", "pumped": "pumped_pp.json", "probed": "probed_pp.json",
//!       "mode": "ratio", "heat_correction": { "tau": 700 }, "out": "bleach.json" },
//!     { "kind": "trace", "bleach": "bleach.json",
//!       "traces": [{ "wavenumber": [2400, 2600], "out": "trace.json" }] }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::calibration::Calibration;
use crate::data::error::SfgResult;
use crate::data::filter::DEFAULT_HEAT_TAU;
use crate::data::pump_probe::PumpMetadata;
use crate::data::raw::RawDataset;
use crate::data::select::{AxisSpec, SelectorPP};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub calibration: CalibrationOverrides,
    #[serde(default)]
    pub pump: PumpMetadata,
    pub steps: Vec<Step>,
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

/// Calibration values that replace the ones stored in a raw dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOverrides {
    pub central_wl: Option<f64>,
    pub vis_wl: Option<f64>,
    pub calib_central_wl: Option<f64>,
    pub calib_coeff: Option<Vec<f64>>,
}

impl CalibrationOverrides {
    /// Values set here win over `fallback`.
    pub fn or(&self, fallback: &CalibrationOverrides) -> CalibrationOverrides {
        CalibrationOverrides {
            central_wl: self.central_wl.or(fallback.central_wl),
            vis_wl: self.vis_wl.or(fallback.vis_wl),
            calib_central_wl: self.calib_central_wl.or(fallback.calib_central_wl),
            calib_coeff: self.calib_coeff.clone().or_else(|| fallback.calib_coeff.clone()),
        }
    }

    /// Calibration of `raw` with the overridden values replaced.
    pub fn resolve(&self, raw: &RawDataset) -> SfgResult<Calibration> {
        Calibration::with_pixel_count(
            self.central_wl.unwrap_or(raw.central_wavelength),
            self.vis_wl.unwrap_or(raw.visible_wavelength),
            self.calib_central_wl
                .unwrap_or(raw.calibration_central_wavelength),
            self.calib_coeff
                .clone()
                .unwrap_or_else(|| raw.calibration_coefficients.clone()),
            raw.pixel_count(),
        )
    }
}

/// One processing step, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Raw dataset → static spectrum.
    Spectrum(SpectrumStep),
    /// Raw dataset → pump-probe measurement.
    PumpProbe(PumpProbeStep),
    /// Two pump-probe files → bleach, with optional corrections.
    Bleach(BleachStep),
    /// Bleach → one trace per output.
    Trace(TraceStep),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Spectrum(_) => "spectrum",
            Step::PumpProbe(_) => "pump_probe",
            Step::Bleach(_) => "bleach",
            Step::Trace(_) => "trace",
        }
    }
}

/// Background given as a number of counts or as a raw dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackgroundSource {
    Constant(f64),
    Path(PathBuf),
}

/// Norm given as a constant or as a saved spectrum file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormSource {
    Constant(f64),
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumStep {
    pub data: PathBuf,
    #[serde(default)]
    pub select: SelectorPP,
    #[serde(default)]
    pub background: Option<BackgroundSource>,
    #[serde(default)]
    pub background_select: SelectorPP,
    #[serde(default)]
    pub norm: Option<NormSource>,
    #[serde(default)]
    pub calibration: CalibrationOverrides,
    pub out: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpProbeStep {
    pub data: PathBuf,
    #[serde(default)]
    pub select: SelectorPP,
    #[serde(default)]
    pub background: Option<BackgroundSource>,
    /// Pixels always follow `select`.
    #[serde(default)]
    pub background_select: SelectorPP,
    #[serde(default)]
    pub norm: Option<NormSource>,
    #[serde(default)]
    pub calibration: CalibrationOverrides,
    #[serde(default)]
    pub pump: PumpMetadata,
    pub out: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BleachMode {
    #[default]
    Difference,
    Ratio,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatCorrection {
    #[serde(default = "default_heat_tau")]
    pub tau: f64,
    #[serde(default)]
    pub c: f64,
}

fn default_heat_tau() -> f64 {
    DEFAULT_HEAT_TAU
}

/// The bleach is `probed − pumped` or `probed / pumped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BleachStep {
    pub pumped: PathBuf,
    pub probed: PathBuf,
    #[serde(default)]
    pub mode: BleachMode,
    #[serde(default)]
    pub static_difference_correction: bool,
    #[serde(default)]
    pub heat_correction: Option<HeatCorrection>,
    pub out: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub bleach: PathBuf,
    pub traces: Vec<TraceOutput>,
}

/// One trace. A `wavenumber` window `[lo, hi]` replaces `pixel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceOutput {
    #[serde(default)]
    pub pixel: AxisSpec,
    #[serde(default)]
    pub wavenumber: Option<[f64; 2]>,
    #[serde(default)]
    pub delay: AxisSpec,
    pub out: PathBuf,
    /// Optional long form CSV export.
    #[serde(default)]
    pub table: Option<PathBuf>,
}
