//! Data reduction for sum-frequency-generation spectroscopy.
//!
//! Raw `[pp_delay, scan, spectrum_channel, pixel]` counts are selected,
//! calibrated and reduced into [`Spectrum`], [`PumpProbe`], [`Bleach`] and
//! finally [`Trace`] values. The [`pipeline`] module drives these steps from
//! a JSON [`config`].

pub mod config;
pub mod data;
pub mod pipeline;

pub use data::bleach::{Bleach, BleachParts};
pub use data::calibration::Calibration;
pub use data::error::{SfgError, SfgResult};
pub use data::pump_probe::{PumpMetadata, PumpProbe};
pub use data::raw::RawDataset;
pub use data::select::{AxisSpec, SelectorPP};
pub use data::spectrum::{SpectralAggregate, Spectrum};
pub use data::trace::{Trace, Window};
