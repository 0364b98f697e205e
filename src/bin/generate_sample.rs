//! Writes a synthetic pump-probe measurement set plus a pipeline config.
//!
//! ```text
//! cargo run --bin generate_sample -- sample
//! cargo run -- sample/config.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ndarray::{Array, Array1};
use serde_json::json;

use rusty_sfg::data::calibration::Calibration;
use rusty_sfg::data::loader;
use rusty_sfg::RawDataset;

const CENTRAL_WL: f64 = 674.0;
const VIS_WL: f64 = 811.7;
const CALIB_CENTRAL_WL: f64 = 670.0;
const CALIB_COEFF: [f64; 2] = [0.034274, 642.101];

const SCANS: usize = 4;

/// Write synthetic pumped, probed, quartz and dark measurements plus a
/// pipeline config that reduces them.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Args {
    /// Directory the sample files are written to
    #[arg(default_value = "sample")]
    out_dir: PathBuf,

    /// Seed of the noise generator
    #[arg(long, default_value_t = 42)]
    seed: u64,
}
const DARK_COUNTS: f64 = 250.0;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Spectral shape of one measurement: a broad IR profile times the sample
/// resonances.
struct Sample {
    /// (center cm⁻¹, width cm⁻¹, amplitude)
    resonances: Vec<(f64, f64, f64)>,
    /// Relative depth of the pump-induced bleach, 0 for an unpumped channel.
    bleach_depth: f64,
    /// Recovery time of the bleach in ps.
    recovery: f64,
}

fn ir_profile(wn: f64) -> f64 {
    gaussian(wn, 2550.0, 250.0, 2000.0)
}

fn measure(
    sample: &Sample,
    wavenumber: &Array1<f64>,
    pp_delay: &Array1<f64>,
    rng: &mut SimpleRng,
) -> Result<RawDataset> {
    let pixels = wavenumber.len();
    let data = Array::from_shape_fn((pp_delay.len(), SCANS, 1, pixels), |(d, _, _, p)| {
        let wn = wavenumber[p];
        let t = pp_delay[d];
        let resonance: f64 = sample
            .resonances
            .iter()
            .map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp))
            .sum();
        let bleach = if t > 0.0 {
            1.0 - sample.bleach_depth * (-t / sample.recovery).exp()
        } else {
            1.0
        };
        let signal = ir_profile(wn) * (1.0 + resonance) * bleach + DARK_COUNTS;
        signal + rng.gauss(0.0, signal.sqrt())
    });
    Ok(RawDataset::new(
        data,
        pp_delay.clone(),
        CENTRAL_WL,
        VIS_WL,
        CALIB_CENTRAL_WL,
        CALIB_COEFF.to_vec(),
    )?)
}

fn main() -> Result<()> {
    env_logger::init();
    let Args { out_dir, seed } = Args::parse();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(seed);
    let calibration = Calibration::new(CENTRAL_WL, VIS_WL, CALIB_CENTRAL_WL, CALIB_COEFF)?;
    let wavenumber = calibration.wavenumber().clone();

    let pp_delay = Array1::from(vec![
        -5.0, -1.0, -0.5, 0.0, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0, 10.0,
    ]);
    let static_delay = Array1::from(vec![0.0]);

    let sample = |bleach_depth| Sample {
        resonances: vec![(2450.0, 25.0, -0.6), (2900.0, 15.0, 0.8)],
        bleach_depth,
        recovery: 1.2,
    };
    let datasets = [
        ("pumped.json", measure(&sample(0.35), &wavenumber, &pp_delay, &mut rng)?),
        ("probed.json", measure(&sample(0.0), &wavenumber, &pp_delay, &mut rng)?),
        (
            "quartz.json",
            measure(
                &Sample {
                    resonances: Vec::new(),
                    bleach_depth: 0.0,
                    recovery: 1.0,
                },
                &wavenumber,
                &static_delay,
                &mut rng,
            )?,
        ),
    ];
    for (name, raw) in &datasets {
        loader::save_raw(&out_dir.join(name), raw)?;
    }

    let mut dark = datasets[2].1.clone();
    dark.data.mapv_inplace(|_| DARK_COUNTS + rng.gauss(0.0, DARK_COUNTS.sqrt()));
    loader::save_raw(&out_dir.join("dark.json"), &dark)?;

    let config = json!({
        "pump": { "pump_frequency": 2450.0, "pump_width": 60.0, "cross_correlation_width": 0.3 },
        "steps": [
            { "kind": "spectrum", "data": "quartz.json", "background": "dark.json",
              "out": "quartz_spectrum.json" },
            { "kind": "pump_probe", "data": "pumped.json", "background": DARK_COUNTS,
              "select": { "pixel": [200, 1400] }, "norm": "quartz_spectrum.json",
              "out": "pumped_pp.parquet" },
            { "kind": "pump_probe", "data": "probed.json", "background": DARK_COUNTS,
              "select": { "pixel": [200, 1400] }, "norm": "quartz_spectrum.json",
              "out": "probed_pp.parquet" },
            { "kind": "bleach", "pumped": "pumped_pp.parquet", "probed": "probed_pp.parquet",
              "mode": "ratio", "static_difference_correction": true,
              "heat_correction": { "tau": 700.0 }, "out": "bleach.csv" },
            { "kind": "trace", "bleach": "bleach.csv",
              "traces": [
                { "wavenumber": [2430.0, 2470.0], "out": "trace_2450.json", "table": "trace_2450.csv" },
                { "wavenumber": [2880.0, 2920.0], "out": "trace_2900.json" }
              ] }
        ]
    });
    let config_path = out_dir.join("config.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("writing {}", config_path.display()))?;

    println!(
        "Wrote {} delays × {SCANS} scans × {} pixels to {}, run with `rusty-sfg {}`",
        pp_delay.len(),
        wavenumber.len(),
        out_dir.display(),
        config_path.display()
    );
    Ok(())
}
