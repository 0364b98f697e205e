/// Data layer: raw datasets, selection, calibration and the spectral aggregates.
///
/// Architecture:
/// ```text
///  raw .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RawDataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐   ┌─────────────┐
///   │  select   │ + │ calibration  │  [pp_delay, scan, channel, pixel] → wavenumber
///   └──────────┘   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  reduce   │  median / SEM over scans → Spectrum, PumpProbe
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  bleach   │  PumpProbe − / ÷ PumpProbe, corrections (filter)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  trace    │  mean over a pixel window → Trace
///   └──────────┘
///        │
///        ▼
///  .json / .csv / .parquet   (table + loader)
/// ```

pub mod bleach;
pub mod calibration;
pub mod error;
pub mod filter;
pub mod loader;
pub mod pump_probe;
pub mod raw;
pub mod reduce;
pub mod select;
pub mod spectrum;
pub mod stats;
pub mod table;
pub mod trace;
