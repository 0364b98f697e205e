use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::config::{
    BackgroundSource, BleachMode, BleachStep, NormSource, PipelineConfig, PumpProbeStep,
    SpectrumStep, Step, TraceStep,
};
use crate::data::loader;
use crate::data::raw::RawDataset;
use crate::data::reduce::{self, Background, Normalization};
use crate::data::select::SelectorPP;
use crate::data::spectrum::Spectrum;

/// Load a config file and run it, resolving paths next to the file.
pub fn run_file(path: &Path) -> Result<()> {
    let config = PipelineConfig::from_path(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    run(&config, base_dir)
}

/// Run every step in order. The first failing step stops the run.
pub fn run(config: &PipelineConfig, base_dir: &Path) -> Result<()> {
    for (i, step) in config.steps.iter().enumerate() {
        info!("Step {}/{}: {}", i + 1, config.steps.len(), step.kind());
        match step {
            Step::Spectrum(step) => run_spectrum(config, step, base_dir),
            Step::PumpProbe(step) => run_pump_probe(config, step, base_dir),
            Step::Bleach(step) => run_bleach(step, base_dir),
            Step::Trace(step) => run_trace(step, base_dir),
        }
        .with_context(|| format!("step {} ({}) failed", i + 1, step.kind()))?;
    }
    Ok(())
}

fn run_spectrum(config: &PipelineConfig, step: &SpectrumStep, base_dir: &Path) -> Result<()> {
    let raw = loader::load_raw(&base_dir.join(&step.data))?;
    let calibration = step.calibration.or(&config.calibration).resolve(&raw)?;

    let mut dark = None;
    let mut quartz = None;
    let background = background(&step.background, step.background_select, base_dir, &mut dark)?;
    let norm = normalization(&step.norm, base_dir, &mut quartz)?;

    let spectrum = reduce::spectrum(&raw, background, norm, step.select, Some(&calibration))?;
    loader::save_spectrum(&base_dir.join(&step.out), &spectrum)
}

fn run_pump_probe(config: &PipelineConfig, step: &PumpProbeStep, base_dir: &Path) -> Result<()> {
    let raw = loader::load_raw(&base_dir.join(&step.data))?;
    let calibration = step.calibration.or(&config.calibration).resolve(&raw)?;

    let mut dark = None;
    let mut quartz = None;
    let background = background(&step.background, step.background_select, base_dir, &mut dark)?;
    let norm = normalization(&step.norm, base_dir, &mut quartz)?;

    let pp = reduce::pump_probe(
        &raw,
        background,
        norm,
        step.select,
        Some(&calibration),
        step.pump.or(config.pump),
    )?;
    loader::save_pump_probe(&base_dir.join(&step.out), &pp)
}

fn run_bleach(step: &BleachStep, base_dir: &Path) -> Result<()> {
    let pumped = loader::load_pump_probe(&base_dir.join(&step.pumped))?;
    let probed = loader::load_pump_probe(&base_dir.join(&step.probed))?;

    // Ratios are corrected around zero and shifted back afterwards.
    let mut bleach = match step.mode {
        BleachMode::Difference => {
            info!("Run difference mode");
            (&probed - &pumped)?
        }
        BleachMode::Ratio => {
            info!("Run ratio mode");
            (&probed / &pumped)?.offset_normalized(-1.0)?
        }
    };
    if step.static_difference_correction {
        info!("Running static difference correction");
        bleach = bleach.static_difference_corrected()?;
    }
    if let Some(heat) = step.heat_correction {
        info!("Running heat correction with tau={} c={}", heat.tau, heat.c);
        bleach = bleach.heat_corrected(heat.tau, heat.c)?;
    }
    if step.mode == BleachMode::Ratio {
        bleach = bleach.offset_normalized(1.0)?;
    }
    loader::save_bleach(&base_dir.join(&step.out), &bleach)
}

fn run_trace(step: &TraceStep, base_dir: &Path) -> Result<()> {
    let bleach = loader::load_bleach(&base_dir.join(&step.bleach))?;
    for output in &step.traces {
        let pixel = match output.wavenumber {
            Some([lo, hi]) => bleach.pixel_range_for_wavenumbers(lo, hi)?,
            None => output.pixel,
        };
        info!("Trace over pixels {pixel} and delays {}", output.delay);
        let trace = bleach.get_trace(pixel, output.delay)?;
        loader::save_trace(&base_dir.join(&output.out), &trace)?;
        if let Some(table) = &output.table {
            loader::export_trace_table(&base_dir.join(table), &trace)?;
        }
    }
    Ok(())
}

fn background<'a>(
    source: &Option<BackgroundSource>,
    select: SelectorPP,
    base_dir: &Path,
    slot: &'a mut Option<RawDataset>,
) -> Result<Background<'a>> {
    Ok(match source {
        None => Background::None,
        Some(BackgroundSource::Constant(v)) => Background::Constant(*v),
        Some(BackgroundSource::Path(path)) => {
            let dark = loader::load_raw(&base_dir.join(path))?;
            Background::Raw(&*slot.insert(dark), select)
        }
    })
}

fn normalization<'a>(
    source: &Option<NormSource>,
    base_dir: &Path,
    slot: &'a mut Option<Spectrum>,
) -> Result<Normalization<'a>> {
    Ok(match source {
        None => Normalization::None,
        Some(NormSource::Constant(v)) => Normalization::Constant(*v),
        Some(NormSource::Path(path)) => {
            let spectrum = loader::load_spectrum(&base_dir.join(path))?;
            Normalization::Spectrum(&*slot.insert(spectrum))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::SpectralAggregate;
    use ndarray::{Array, Array1};

    const PIXELS: usize = 16;

    /// 4 delays × 3 scans × 1 channel; `dip` is removed around pixel 8
    /// after time zero.
    fn raw(level: f64, dip: f64) -> RawDataset {
        let delays = Array1::from(vec![-1.0, 0.5, 2.0, 10.0]);
        let data = Array::from_shape_fn((4, 3, 1, PIXELS), |(d, s, _, p)| {
            let x = (p as f64 - 8.0) / 2.0;
            let late = if delays[d] > 0.0 { 1.0 } else { 0.0 };
            level + 10.0 * (-0.5 * x * x).exp() - late * dip * (-0.5 * x * x).exp() + s as f64
        });
        RawDataset::new(data, delays.clone(), 674.0, 811.7, 670.0, vec![0.034274, 642.101])
            .unwrap()
    }

    #[test]
    fn full_run_on_synthetic_data() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        loader::save_raw(&base.join("pumped.json"), &raw(200.0, 5.0)).unwrap();
        loader::save_raw(&base.join("probed.json"), &raw(200.0, 0.0)).unwrap();
        loader::save_raw(&base.join("quartz.json"), &raw(300.0, 0.0)).unwrap();
        loader::save_raw(&base.join("dark.json"), &raw(100.0, 0.0)).unwrap();

        let config = r#"{
            "pump": { "pump_frequency": 3152.0 },
            "steps": [
                { "kind": "spectrum", "data": "quartz.json", "background": "dark.json",
                  "out": "quartz.csv" },
                { "kind": "pump_probe", "data": "pumped.json", "background": 100.0,
                  "norm": "quartz.csv", "out": "pumped.parquet" },
                { "kind": "pump_probe", "data": "probed.json", "background": 100.0,
                  "norm": "quartz.csv", "out": "probed.json" },
                { "kind": "bleach", "pumped": "pumped.parquet", "probed": "probed.json",
                  "mode": "ratio", "static_difference_correction": true,
                  "heat_correction": {}, "out": "bleach.csv" },
                { "kind": "trace", "bleach": "bleach.csv",
                  "traces": [
                    { "wavenumber": [3150.0, 3156.0], "out": "trace.json", "table": "trace.csv" },
                    { "pixel": [0, 4], "delay": [1, 4], "out": "edge.json" }
                  ] }
            ]
        }"#;
        let config_path = base.join("config.json");
        std::fs::write(&config_path, config).unwrap();
        run_file(&config_path).unwrap();

        let pumped = loader::load_pump_probe(&base.join("pumped.parquet")).unwrap();
        assert_eq!(pumped.shape(), &[4, PIXELS]);
        assert_eq!(pumped.metadata().pump_frequency, Some(3152.0));

        let trace = loader::load_trace(&base.join("trace.json")).unwrap();
        assert_eq!(trace.len(), 4);
        assert_eq!(trace.metadata().pump_frequency, Some(3152.0));
        // static difference correction pins the first delay to the ratio 1
        assert!((trace.bleach()[0] - 1.0).abs() < 1e-9);

        let edge = loader::load_trace(&base.join("edge.json")).unwrap();
        assert_eq!(edge.len(), 3);
        assert!(base.join("trace.csv").exists());
    }

    #[test]
    fn failing_step_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "steps": [ { "kind": "bleach", "pumped": "a.json", "probed": "b.json",
                 "out": "c.json" } ] }"#,
        )
        .unwrap();
        let err = run(&config, dir.path()).unwrap_err();
        assert!(err.to_string().contains("step 1 (bleach)"));
    }
}
