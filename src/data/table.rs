//! Tabular forms of the aggregates, shared by every file format.
//!
//! ```text
//!  Spectrum  <──>  SpectrumTable   one column per field
//!  PumpProbe <──>  LongTable       one record per (field, delay) row
//!  Bleach    <──>  LongTable
//!  Trace      ──>  TraceRow        long form over bleach / uncertainty
//! ```
//!
//! Imports go back through the aggregate constructors, so a table read from
//! disk is validated exactly like freshly built data.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::bleach::{Bleach, BleachParts};
use super::error::{SfgError, SfgResult};
use super::pump_probe::{PumpMetadata, PumpProbe};
use super::spectrum::{SpectralAggregate, Spectrum};

// ---------------------------------------------------------------------------
// Spectrum
// ---------------------------------------------------------------------------

/// Column oriented [`Spectrum`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumTable {
    pub intensity: Vec<f64>,
    pub baseline: Vec<f64>,
    pub norm: Vec<f64>,
    pub wavenumber: Vec<f64>,
    pub pixel: Vec<usize>,
    pub intensity_uncertainty: Vec<f64>,
}

/// One line of a [`SpectrumTable`], as written to CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumRow {
    pub intensity: f64,
    pub baseline: f64,
    pub norm: f64,
    pub wavenumber: f64,
    pub pixel: usize,
    pub intensity_uncertainty: f64,
}

impl SpectrumTable {
    pub fn from_spectrum(spectrum: &Spectrum) -> Self {
        SpectrumTable {
            intensity: spectrum.intensity().to_vec(),
            baseline: spectrum.baseline().to_vec(),
            norm: spectrum.norm().to_vec(),
            wavenumber: spectrum.wavenumber().to_vec(),
            pixel: spectrum.pixel().to_vec(),
            intensity_uncertainty: spectrum.intensity_uncertainty().to_vec(),
        }
    }

    pub fn to_spectrum(&self) -> SfgResult<Spectrum> {
        Spectrum::builder(Array1::from(self.intensity.clone()))
            .baseline(self.baseline.clone())
            .norm(self.norm.clone())
            .wavenumber(self.wavenumber.clone())
            .pixel(Array1::from(self.pixel.clone()))
            .intensity_uncertainty(self.intensity_uncertainty.clone())
            .build()
    }

    pub fn rows(&self) -> Vec<SpectrumRow> {
        (0..self.intensity.len())
            .map(|i| SpectrumRow {
                intensity: self.intensity[i],
                baseline: self.baseline.get(i).copied().unwrap_or(f64::NAN),
                norm: self.norm.get(i).copied().unwrap_or(f64::NAN),
                wavenumber: self.wavenumber.get(i).copied().unwrap_or(f64::NAN),
                pixel: self.pixel.get(i).copied().unwrap_or(i),
                intensity_uncertainty: self
                    .intensity_uncertainty
                    .get(i)
                    .copied()
                    .unwrap_or(f64::NAN),
            })
            .collect()
    }

    pub fn from_rows(rows: &[SpectrumRow]) -> Self {
        SpectrumTable {
            intensity: rows.iter().map(|r| r.intensity).collect(),
            baseline: rows.iter().map(|r| r.baseline).collect(),
            norm: rows.iter().map(|r| r.norm).collect(),
            wavenumber: rows.iter().map(|r| r.wavenumber).collect(),
            pixel: rows.iter().map(|r| r.pixel).collect(),
            intensity_uncertainty: rows.iter().map(|r| r.intensity_uncertainty).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Long form: PumpProbe and Bleach
// ---------------------------------------------------------------------------

/// `(delay, wavenumber)` planes written to the long form, in order.
pub const PLANE_NAMES: [&str; 7] = [
    "intensity",
    "baseline",
    "norm",
    "basesubed",
    "normalized",
    "intensity_uncertainty",
    "normalized_uncertainty",
];

/// One row of one plane, or one axis / metadata line when `pp_delay` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub name: String,
    pub pp_delay: Option<f64>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LongTable {
    pub records: Vec<LongRecord>,
}

impl LongTable {
    pub fn from_pump_probe(pp: &PumpProbe) -> Self {
        let planes = [
            pp.intensity().clone(),
            pp.baseline().clone(),
            pp.norm().clone(),
            pp.basesubed(),
            pp.normalized(),
            pp.intensity_uncertainty().clone(),
            pp.normalized_uncertainty(),
        ];
        let mut table = LongTable::default();
        for (name, plane) in PLANE_NAMES.iter().zip(planes.iter()) {
            table.push_plane(name, plane, pp.pp_delay());
        }
        table.push_axes(Some(pp.wavenumber()), Some(pp.pixel()));
        table.push_metadata(pp.metadata());
        table
    }

    pub fn from_bleach(bleach: &Bleach) -> Self {
        let planes = [
            bleach.intensity(),
            bleach.baseline(),
            bleach.norm(),
            bleach.basesubed(),
            bleach.normalized(),
            bleach.intensity_uncertainty(),
            bleach.normalized_uncertainty(),
        ];
        let fallback;
        let pp_delay = match bleach.pp_delay() {
            Ok(pp_delay) => pp_delay,
            Err(_) => {
                let rows = planes.iter().flatten().map(|p| p.nrows()).next().unwrap_or(0);
                fallback = Array1::from_iter((0..rows).map(|r| r as f64));
                &fallback
            }
        };
        let mut table = LongTable::default();
        for (name, plane) in PLANE_NAMES.iter().zip(planes) {
            if let Ok(plane) = plane {
                table.push_plane(name, plane, pp_delay);
            }
        }
        // Without any plane the delays need a line of their own.
        if table.records.is_empty() {
            if let Ok(pp_delay) = bleach.pp_delay() {
                table.push_line("pp_delay", pp_delay.to_vec());
            }
        }
        table.push_axes(bleach.wavenumber().ok(), bleach.pixel().ok());
        table.push_metadata(bleach.metadata());
        table
    }

    /// Rebuild a pump-probe measurement; `intensity` and `wavenumber` rows
    /// are required, derived planes are recomputed.
    pub fn to_pump_probe(&self) -> SfgResult<PumpProbe> {
        let (intensity, pp_delay) = self
            .plane("intensity")?
            .ok_or(SfgError::MissingField("intensity"))?;
        let wavenumber = self
            .axis("wavenumber")
            .ok_or(SfgError::MissingField("wavenumber"))?;

        let mut builder = PumpProbe::builder(intensity, wavenumber)
            .pp_delay(pp_delay)
            .metadata(self.metadata());
        if let Some((baseline, _)) = self.plane("baseline")? {
            builder = builder.baseline(baseline);
        }
        if let Some((norm, _)) = self.plane("norm")? {
            builder = builder.norm(norm);
        }
        if let Some((sigma, _)) = self.plane("intensity_uncertainty")? {
            builder = builder.intensity_uncertainty(sigma);
        }
        if let Some(pixel) = self.pixel_axis()? {
            builder = builder.pixel(pixel);
        }
        builder.build()
    }

    /// Rebuild a bleach from whatever planes are present.
    pub fn to_bleach(&self) -> SfgResult<Bleach> {
        let mut planes: Vec<Option<Array2<f64>>> = Vec::with_capacity(PLANE_NAMES.len());
        let mut pp_delay = None;
        for name in PLANE_NAMES {
            match self.plane(name)? {
                Some((plane, delays)) => {
                    if pp_delay.is_none() {
                        pp_delay = Some(delays);
                    }
                    planes.push(Some(plane));
                }
                None => planes.push(None),
            }
        }
        let mut planes = planes.into_iter();
        let mut next = || planes.next().flatten();
        Bleach::from_parts(BleachParts {
            intensity: next(),
            baseline: next(),
            norm: next(),
            basesubed: next(),
            normalized: next(),
            intensity_uncertainty: next(),
            normalized_uncertainty: next(),
            wavenumber: self.axis("wavenumber"),
            pp_delay: pp_delay.or_else(|| self.axis("pp_delay")),
            pixel: self.pixel_axis()?,
            metadata: self.metadata(),
        })
    }

    fn push_plane(&mut self, name: &str, plane: &Array2<f64>, pp_delay: &Array1<f64>) {
        for (row, &delay) in plane.rows().into_iter().zip(pp_delay.iter()) {
            self.records.push(LongRecord {
                name: name.to_string(),
                pp_delay: Some(delay),
                values: row.to_vec(),
            });
        }
    }

    fn push_axes(&mut self, wavenumber: Option<&Array1<f64>>, pixel: Option<&Array1<usize>>) {
        if let Some(wavenumber) = wavenumber {
            self.push_line("wavenumber", wavenumber.to_vec());
        }
        if let Some(pixel) = pixel {
            self.push_line("pixel", pixel.iter().map(|&p| p as f64).collect());
        }
    }

    fn push_metadata(&mut self, metadata: PumpMetadata) {
        let lines = [
            ("pump_frequency", metadata.pump_frequency),
            ("pump_width", metadata.pump_width),
            ("cross_correlation_width", metadata.cross_correlation_width),
        ];
        for (name, value) in lines {
            if let Some(value) = value {
                self.push_line(name, vec![value]);
            }
        }
    }

    fn push_line(&mut self, name: &str, values: Vec<f64>) {
        self.records.push(LongRecord {
            name: name.to_string(),
            pp_delay: None,
            values,
        });
    }

    /// Rows of plane `name` stacked in file order, with their delays.
    fn plane(&self, name: &'static str) -> SfgResult<Option<(Array2<f64>, Array1<f64>)>> {
        let rows: Vec<&LongRecord> = self
            .records
            .iter()
            .filter(|r| r.name == name && r.pp_delay.is_some())
            .collect();
        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let cols = first.values.len();
        if let Some(bad) = rows.iter().find(|r| r.values.len() != cols) {
            return Err(SfgError::shape(name, cols, bad.values.len()));
        }
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.values.iter().copied()).collect();
        let plane = Array2::from_shape_vec((rows.len(), cols), flat)
            .map_err(|e| SfgError::shape(name, (rows.len(), cols), e.to_string()))?;
        let delays = rows.iter().filter_map(|r| r.pp_delay).collect();
        Ok(Some((plane, delays)))
    }

    fn axis(&self, name: &str) -> Option<Array1<f64>> {
        self.records
            .iter()
            .find(|r| r.name == name && r.pp_delay.is_none())
            .map(|r| Array1::from(r.values.clone()))
    }

    /// Pixel numbers are stored as floats and must be whole and non-negative.
    fn pixel_axis(&self) -> SfgResult<Option<Array1<usize>>> {
        let Some(values) = self.axis("pixel") else {
            return Ok(None);
        };
        if let Some(bad) = values.iter().find(|&&p| !p.is_finite() || p < 0.0 || p.fract() != 0.0) {
            return Err(SfgError::shape("pixel", "whole numbers >= 0", bad));
        }
        Ok(Some(values.mapv(|p| p as usize)))
    }

    fn metadata(&self) -> PumpMetadata {
        let single = |name: &str| self.axis(name).and_then(|a| a.first().copied());
        PumpMetadata {
            pump_frequency: single("pump_frequency"),
            pump_width: single("pump_width"),
            cross_correlation_width: single("cross_correlation_width"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

/// One line of the long form trace export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRow {
    pub pp_delay: f64,
    pub variable: String,
    pub value: f64,
    pub pixel_start: Option<f64>,
    pub pixel_stop: Option<f64>,
    pub wavenumber_start: Option<f64>,
    pub wavenumber_stop: Option<f64>,
    pub wavelength_start: Option<f64>,
    pub wavelength_stop: Option<f64>,
    pub cross_correlation_width: Option<f64>,
    pub pump_frequency: Option<f64>,
    pub pump_width: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::pump_probe::tests::{bump, pump_probe};
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn spectrum_columns_round_trip() {
        let spectrum = Spectrum::builder(array![2.0, 4.0, 6.0])
            .baseline(1.0)
            .norm(2.0)
            .wavenumber(array![3000.0, 2990.0, 2980.0])
            .intensity_uncertainty(vec![0.1, 0.2, 0.3])
            .build()
            .unwrap();
        let table = SpectrumTable::from_spectrum(&spectrum);
        assert_eq!(table.baseline, vec![1.0, 1.0, 1.0]);
        assert_eq!(table.to_spectrum().unwrap(), spectrum);
        assert_eq!(SpectrumTable::from_rows(&table.rows()), table);
    }

    #[test]
    fn spectrum_import_is_validated() {
        let table = SpectrumTable {
            intensity: vec![1.0, 2.0],
            baseline: vec![0.0, 0.0],
            norm: vec![1.0, 1.0],
            wavenumber: vec![1.0],
            pixel: vec![0, 1],
            intensity_uncertainty: vec![0.1, 0.1],
        };
        assert!(matches!(
            table.to_spectrum(),
            Err(SfgError::Shape { field: "wavenumber", .. })
        ));
    }

    #[test]
    fn pump_probe_long_form() {
        let pp = pump_probe(bump(4, 6, 2.0));
        let table = LongTable::from_pump_probe(&pp);
        // 7 planes × 4 delays, wavenumber, pixel and three metadata lines
        assert_eq!(table.records.len(), 7 * 4 + 2 + 3);
        assert_eq!(table.records[0].name, "intensity");
        assert_eq!(table.records[0].pp_delay, Some(pp.pp_delay()[0]));

        let back = table.to_pump_probe().unwrap();
        assert_eq!(back.pixel(), pp.pixel());
        assert_eq!(back.metadata(), pp.metadata());
        for (a, b) in back.normalized().iter().zip(pp.normalized().iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn pump_probe_needs_intensity_and_wavenumber() {
        let mut table = LongTable::from_pump_probe(&pump_probe(bump(2, 3, 1.0)));
        table.records.retain(|r| r.name != "wavenumber");
        assert_eq!(
            table.to_pump_probe().unwrap_err(),
            SfgError::MissingField("wavenumber")
        );
        assert_eq!(
            LongTable::default().to_pump_probe().unwrap_err(),
            SfgError::MissingField("intensity")
        );
    }

    #[test]
    fn bleach_long_form_round_trip() {
        let a = pump_probe(bump(5, 8, 3.0));
        let b = pump_probe(bump(5, 8, 4.0));
        let bleach = (&a - &b).unwrap();
        let back = LongTable::from_bleach(&bleach).to_bleach().unwrap();
        assert_eq!(back, bleach);
    }

    #[test]
    fn partial_bleach_keeps_what_is_there() {
        let bleach = Bleach::from_parts(BleachParts {
            normalized: Some(array![[0.1, 0.2], [0.3, 0.4]]),
            wavenumber: Some(array![2000.0, 1990.0]),
            ..Default::default()
        })
        .unwrap();
        let table = LongTable::from_bleach(&bleach);
        let back = table.to_bleach().unwrap();
        assert_eq!(back.normalized().unwrap(), bleach.normalized().unwrap());
        assert!(back.intensity().is_err());
        // missing delays are numbered
        assert_eq!(back.pp_delay().unwrap(), &array![0.0, 1.0]);
    }

    #[test]
    fn delays_survive_without_planes() {
        let bleach = Bleach::from_parts(BleachParts {
            wavenumber: Some(array![2000.0, 1990.0]),
            pp_delay: Some(array![-1.0, 0.5, 3.0]),
            ..Default::default()
        })
        .unwrap();
        let table = LongTable::from_bleach(&bleach);
        assert!(table
            .records
            .iter()
            .any(|r| r.name == "pp_delay" && r.pp_delay.is_none()));
        let back = table.to_bleach().unwrap();
        assert_eq!(back.pp_delay().unwrap(), &array![-1.0, 0.5, 3.0]);
        assert_eq!(back.wavenumber().unwrap(), bleach.wavenumber().unwrap());
    }

    #[test]
    fn bad_pixel_numbers_are_rejected() {
        for bad in [-5.0, f64::NAN, 2.7] {
            let mut table = LongTable::from_pump_probe(&pump_probe(bump(2, 3, 1.0)));
            for record in table.records.iter_mut().filter(|r| r.name == "pixel") {
                record.values[0] = bad;
            }
            assert!(
                matches!(table.to_pump_probe(), Err(SfgError::Shape { field: "pixel", .. })),
                "{bad}"
            );
            assert!(table.to_bleach().is_err(), "{bad}");
        }
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let table = LongTable {
            records: vec![
                LongRecord {
                    name: "intensity".into(),
                    pp_delay: Some(0.0),
                    values: vec![1.0, 2.0],
                },
                LongRecord {
                    name: "intensity".into(),
                    pp_delay: Some(1.0),
                    values: vec![1.0],
                },
            ],
        };
        assert!(matches!(
            table.to_bleach(),
            Err(SfgError::Shape { field: "intensity", .. })
        ));
    }
}
