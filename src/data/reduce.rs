//! Reductions from a [`RawDataset`] to [`Spectrum`] and [`PumpProbe`].
//!
//! Scans are repetitions of the same measurement, so intensities are medians
//! over scans and their spread gives the uncertainty.

use ndarray::{Array1, Axis};

use super::calibration::Calibration;
use super::error::SfgResult;
use super::pump_probe::{PumpMetadata, PumpProbe};
use super::raw::RawDataset;
use super::select::{AxisSpec, SelectorPP};
use super::spectrum::{Layer, SpectralAggregate, Spectrum};
use super::stats::{median_axis, median_per_pixel, sem_axis};

/// What gets subtracted as baseline.
#[derive(Debug, Clone, Copy)]
pub enum Background<'a> {
    None,
    Constant(f64),
    /// A dark measurement, reduced the same way as the data.
    Raw(&'a RawDataset, SelectorPP),
    /// The intensity of an earlier reduced spectrum.
    Spectrum(&'a Spectrum),
}

/// What the baseline subtracted intensity is divided by.
#[derive(Debug, Clone, Copy)]
pub enum Normalization<'a> {
    None,
    Constant(f64),
    /// A reference measurement; its baseline subtracted intensity is used.
    Spectrum(&'a Spectrum),
}

/// Selecting no spectrum channel leaves a channel axis nothing downstream
/// expects, so it falls back to the first channel.
pub fn with_default_channel(select: SelectorPP) -> SelectorPP {
    if select.spectrum_channel().is_unbounded() {
        select.with_spectrum_channel(AxisSpec::Index(0))
    } else {
        select
    }
}

/// Static spectrum: median over delays and scans per pixel.
///
/// The uncertainty is the SEM over scans of the per-scan median over delays.
/// Without `calibration` the one stored in `raw` is used.
pub fn spectrum(
    raw: &RawDataset,
    background: Background<'_>,
    norm: Normalization<'_>,
    data_select: SelectorPP,
    calibration: Option<&Calibration>,
) -> SfgResult<Spectrum> {
    let select = with_default_channel(data_select);
    let data = select.apply_channel(raw.data.view())?;
    log::debug!("spectrum selection {select} -> {:?}", data.shape());

    let intensity = median_per_pixel(data);
    let per_scan = median_axis(data, Axis(0));
    let uncertainty = scan_uncertainty(sem_axis(per_scan.view(), Axis(0)));

    let pixel = select.pixel();
    let baseline = match background {
        Background::None => Layer::Scalar(0.0),
        Background::Constant(v) => Layer::Scalar(v),
        Background::Raw(dark, dark_select) => {
            let dark_select = with_default_channel(dark_select).with_pixel(pixel);
            Layer::from(median_per_pixel(dark_select.apply_channel(dark.data.view())?))
        }
        Background::Spectrum(sp) => {
            cut_to_pixels(sp.intensity().clone(), pixel, raw.pixel_count())?
        }
    };

    let mut builder = Spectrum::builder(intensity)
        .baseline(baseline)
        .norm(norm_layer(norm, pixel, raw.pixel_count())?)
        .wavenumber(wavenumber(raw, calibration, pixel)?)
        .pixel(pixel);
    if let Some(uncertainty) = uncertainty {
        builder = builder.intensity_uncertainty(uncertainty);
    }
    builder.build()
}

/// Pump-probe measurement: median over scans per delay and pixel.
///
/// A raw background is cut to the pixels of the data and reduced per delay
/// when its delay axis matches, else pooled over all delays. Delays of the
/// result follow the `pp_delay` spec of `data_select`.
pub fn pump_probe(
    raw: &RawDataset,
    background: Background<'_>,
    norm: Normalization<'_>,
    data_select: SelectorPP,
    calibration: Option<&Calibration>,
    metadata: PumpMetadata,
) -> SfgResult<PumpProbe> {
    let select = with_default_channel(data_select);
    let data = select.apply_channel(raw.data.view())?;
    log::debug!("pump-probe selection {select} -> {:?}", data.shape());

    let intensity = median_axis(data, Axis(1));
    let uncertainty = if data.len_of(Axis(1)) > 1 {
        Some(sem_axis(data, Axis(1)))
    } else {
        log::warn!("fewer than two scans selected, no scan statistics available");
        None
    };

    let pixel = select.pixel();
    let baseline = match background {
        Background::None => Layer::Scalar(0.0),
        Background::Constant(v) => Layer::Scalar(v),
        Background::Raw(dark, dark_select) => {
            let dark_select = with_default_channel(dark_select).with_pixel(pixel);
            let dark_data = dark_select.apply_channel(dark.data.view())?;
            if dark_data.len_of(Axis(0)) == intensity.nrows() {
                Layer::from(median_axis(dark_data, Axis(1)))
            } else {
                // Delay axes differ, one dark spectrum for all delays.
                Layer::from(median_per_pixel(dark_data))
            }
        }
        Background::Spectrum(sp) => {
            cut_to_pixels(sp.intensity().clone(), pixel, raw.pixel_count())?
        }
    };

    let pp_delay = select.pp_delay().pick("pp_delay", raw.pp_delay.view())?;
    let mut builder = PumpProbe::builder(intensity, wavenumber(raw, calibration, pixel)?)
        .baseline(baseline)
        .norm(norm_layer(norm, pixel, raw.pixel_count())?)
        .pp_delay(pp_delay)
        .pixel(pixel)
        .metadata(metadata);
    if let Some(uncertainty) = uncertainty {
        builder = builder.intensity_uncertainty(uncertainty);
    }
    builder.build()
}

/// SEM values, or `None` when they are undefined (single scan).
fn scan_uncertainty(sem: Array1<f64>) -> Option<Array1<f64>> {
    if sem.iter().any(|v| v.is_nan()) {
        log::warn!("fewer than two scans selected, no scan statistics available");
        return None;
    }
    Some(sem)
}

fn wavenumber(
    raw: &RawDataset,
    calibration: Option<&Calibration>,
    pixel: AxisSpec,
) -> SfgResult<Array1<f64>> {
    let stored;
    let calibration = match calibration {
        Some(c) => c,
        None => {
            stored = Calibration::from_raw(raw)?;
            &stored
        }
    };
    pixel.pick("pixel", calibration.wavenumber().view())
}

fn norm_layer(norm: Normalization<'_>, pixel: AxisSpec, pixel_count: usize) -> SfgResult<Layer> {
    Ok(match norm {
        Normalization::None => Layer::Scalar(1.0),
        Normalization::Constant(v) => Layer::Scalar(v),
        Normalization::Spectrum(sp) => cut_to_pixels(sp.basesubed(), pixel, pixel_count)?,
    })
}

/// A full camera spectrum is cut to the selected pixels; anything else is
/// taken as already matching them.
fn cut_to_pixels(values: Array1<f64>, pixel: AxisSpec, pixel_count: usize) -> SfgResult<Layer> {
    if values.len() == pixel_count && !pixel.is_unbounded() {
        Ok(Layer::from(pixel.pick("pixel", values.view())?))
    } else {
        Ok(Layer::from(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::SfgError;
    use approx::assert_relative_eq;
    use ndarray::Array;

    const DELAYS: usize = 3;
    const SCANS: usize = 4;
    const PIXELS: usize = 10;

    /// `100 + pixel + scan + 10 * delay`, channel 1 offset by 1000.
    fn raw() -> RawDataset {
        let data = Array::from_shape_fn((DELAYS, SCANS, 2, PIXELS), |(d, s, c, p)| {
            100.0 + p as f64 + s as f64 + 10.0 * d as f64 + 1000.0 * c as f64
        });
        RawDataset::new(
            data,
            Array1::linspace(-1.0, 1.0, DELAYS),
            674.0,
            811.7,
            670.0,
            vec![0.034274, 642.101],
        )
        .unwrap()
    }

    fn dark() -> RawDataset {
        let mut dark = raw();
        dark.data.fill(100.0);
        dark
    }

    #[test]
    fn static_spectrum_from_raw() {
        let raw = raw();
        let dark = dark();
        let sp = spectrum(
            &raw,
            Background::Raw(&dark, SelectorPP::default()),
            Normalization::Constant(2.0),
            SelectorPP::default().with_pixel(AxisSpec::Range(2, 6)),
            None,
        )
        .unwrap();

        assert_eq!(sp.len(), 4);
        // pooled median over delays and scans: 100 + p + 1.5 + 10
        assert_relative_eq!(sp.intensity()[0], 113.5);
        assert_relative_eq!(sp.basesubed()[0], 13.5);
        assert_relative_eq!(sp.normalized()[3], 16.5 / 2.0);
        // SEM of 0, 1, 2, 3
        assert_relative_eq!(sp.intensity_uncertainty()[1], 0.6454972, epsilon = 1e-6);
        assert_eq!(sp.pixel(), &Array1::from_iter(2..6));

        let calibration = Calibration::from_raw(&raw).unwrap();
        assert_eq!(sp.wavenumber(), &calibration.wavenumber().slice(ndarray::s![2..6]));
    }

    #[test]
    fn channel_selection() {
        let raw = raw();
        let sp = spectrum(
            &raw,
            Background::Constant(1000.0),
            Normalization::None,
            SelectorPP::default().with_spectrum_channel(AxisSpec::Index(1)),
            None,
        )
        .unwrap();
        assert_relative_eq!(sp.basesubed()[0], 111.5);
    }

    #[test]
    fn norm_spectrum_is_cut_to_pixels() {
        let raw = raw();
        let quartz = Spectrum::builder(Array1::from_iter((0..PIXELS).map(|p| 1.0 + p as f64)))
            .build()
            .unwrap();
        let sp = spectrum(
            &raw,
            Background::None,
            Normalization::Spectrum(&quartz),
            SelectorPP::default().with_pixel(AxisSpec::Range(4, 7)),
            None,
        )
        .unwrap();
        assert_eq!(sp.norm().to_vec(), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn background_spectrum_is_cut_to_pixels() {
        let raw = raw();
        let dark = Spectrum::builder(Array1::from_iter((0..PIXELS).map(|p| p as f64)))
            .build()
            .unwrap();
        let sp = spectrum(
            &raw,
            Background::Spectrum(&dark),
            Normalization::None,
            SelectorPP::default().with_pixel(AxisSpec::Range(4, 7)),
            None,
        )
        .unwrap();
        assert_eq!(sp.baseline().to_vec(), vec![4.0, 5.0, 6.0]);
        // 100 + p + 11.5 - p
        assert_relative_eq!(sp.basesubed()[2], 111.5);

        let pp = pump_probe(
            &raw,
            Background::Spectrum(&dark),
            Normalization::None,
            SelectorPP::default().with_pixel(AxisSpec::Range(4, 7)),
            None,
            PumpMetadata::default(),
        )
        .unwrap();
        assert_relative_eq!(pp.baseline()[[0, 0]], 4.0);
        assert_relative_eq!(pp.baseline()[[2, 2]], 6.0);
    }

    #[test]
    fn pump_probe_from_raw() {
        let raw = raw();
        let dark = dark();
        let pp = pump_probe(
            &raw,
            Background::Raw(&dark, SelectorPP::default()),
            Normalization::None,
            SelectorPP::default()
                .with_pp_delay(AxisSpec::Range(1, 3))
                .with_pixel(AxisSpec::Range(0, 5)),
            None,
            PumpMetadata {
                pump_frequency: Some(2500.0),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(pp.shape(), &[2, 5]);
        assert_eq!(pp.pp_delay().to_vec(), vec![0.0, 1.0]);
        // median over scans: 100 + p + 1.5 + 10 d, delays 1 and 2
        assert_relative_eq!(pp.intensity()[[0, 0]], 111.5);
        assert_relative_eq!(pp.basesubed()[[1, 4]], 25.5);
        assert_relative_eq!(pp.intensity_uncertainty()[[1, 4]], 0.6454972, epsilon = 1e-6);
        assert_eq!(pp.metadata().pump_frequency, Some(2500.0));
    }

    #[test]
    fn single_scan_falls_back_to_default_uncertainty() {
        let raw = raw();
        let pp = pump_probe(
            &raw,
            Background::None,
            Normalization::None,
            SelectorPP::default().with_scan(AxisSpec::Index(2)),
            None,
            PumpMetadata::default(),
        )
        .unwrap();
        assert_relative_eq!(pp.intensity_uncertainty()[[0, 0]], pp.intensity()[[0, 0]] * 0.1);
    }

    #[test]
    fn bad_selection_is_reported() {
        let raw = raw();
        let err = spectrum(
            &raw,
            Background::None,
            Normalization::None,
            SelectorPP::default().with_pixel(AxisSpec::Range(5, 50)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SfgError::InvalidSelectorRange { axis: "pixel", .. }));
    }
}
