use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Float64Builder, Int64Array, LargeListArray,
    ListArray, ListBuilder, StringArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::bleach::Bleach;
use super::pump_probe::PumpProbe;
use super::raw::RawDataset;
use super::spectrum::Spectrum;
use super::table::{LongRecord, LongTable, SpectrumRow, SpectrumTable};
use super::trace::Trace;

/// On-disk table formats, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
    Parquet,
}

fn format_of(path: &Path) -> Result<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => Ok(Format::Parquet),
        "json" => Ok(Format::Json),
        "csv" => Ok(Format::Csv),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a raw dataset from its JSON document and check its delay axis.
pub fn load_raw(path: &Path) -> Result<RawDataset> {
    let raw: RawDataset = read_json(path)?;
    raw.validate()
        .with_context(|| format!("validating {}", path.display()))?;
    info!(
        "Loaded raw dataset {} with shape {:?}",
        path.display(),
        raw.data.shape()
    );
    Ok(raw)
}

pub fn save_raw(path: &Path, raw: &RawDataset) -> Result<()> {
    write_json(path, raw)
}

/// Save a spectrum. Dispatch by extension:
/// * `.json`    – `{ "intensity": [...], "baseline": [...], ... }`
/// * `.csv`     – one row per pixel
/// * `.parquet` – one column per field
pub fn save_spectrum(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let table = SpectrumTable::from_spectrum(spectrum);
    info!("Saving spectrum to {}", path.display());
    match format_of(path)? {
        Format::Json => write_json(path, &table),
        Format::Csv => write_csv_rows(path, &table.rows()),
        Format::Parquet => write_spectrum_parquet(path, &table),
    }
}

pub fn load_spectrum(path: &Path) -> Result<Spectrum> {
    let table = match format_of(path)? {
        Format::Json => read_json(path)?,
        Format::Csv => SpectrumTable::from_rows(&read_csv_rows::<SpectrumRow>(path)?),
        Format::Parquet => read_spectrum_parquet(path)?,
    };
    let spectrum = table
        .to_spectrum()
        .with_context(|| format!("invalid spectrum in {}", path.display()))?;
    info!("Loaded spectrum {} ({} pixels)", path.display(), spectrum.len());
    Ok(spectrum)
}

pub fn save_pump_probe(path: &Path, pp: &PumpProbe) -> Result<()> {
    info!("Saving pump-probe to {}", path.display());
    save_long(path, &LongTable::from_pump_probe(pp))
}

pub fn load_pump_probe(path: &Path) -> Result<PumpProbe> {
    load_long(path)?
        .to_pump_probe()
        .with_context(|| format!("invalid pump-probe data in {}", path.display()))
}

pub fn save_bleach(path: &Path, bleach: &Bleach) -> Result<()> {
    info!("Saving bleach to {}", path.display());
    save_long(path, &LongTable::from_bleach(bleach))
}

pub fn load_bleach(path: &Path) -> Result<Bleach> {
    load_long(path)?
        .to_bleach()
        .with_context(|| format!("invalid bleach data in {}", path.display()))
}

pub fn save_trace(path: &Path, trace: &Trace) -> Result<()> {
    info!("Saving trace to {}", path.display());
    write_json(path, trace)
}

pub fn load_trace(path: &Path) -> Result<Trace> {
    read_json(path)
}

/// Long form CSV of a trace for plotting and fitting tools.
pub fn export_trace_table(path: &Path, trace: &Trace) -> Result<()> {
    info!("Exporting trace table to {}", path.display());
    write_csv_rows(path, &trace.table_rows())
}

/// Save the long form of a pump-probe or bleach measurement.
///
/// * `.json`    – `[{ "name": "intensity", "pp_delay": -1.0, "values": [...] }, ...]`
/// * `.csv`     – `name, pp_delay, 0, 1, ..., N-1`
/// * `.parquet` – `name`, `pp_delay` and a `values` list column
pub fn save_long(path: &Path, table: &LongTable) -> Result<()> {
    debug!("Writing {} long form records", table.records.len());
    match format_of(path)? {
        Format::Json => write_json(path, table),
        Format::Csv => write_long_csv(path, table),
        Format::Parquet => write_long_parquet(path, table),
    }
}

pub fn load_long(path: &Path) -> Result<LongTable> {
    let table = match format_of(path)? {
        Format::Json => read_json(path)?,
        Format::Csv => read_long_csv(path)?,
        Format::Parquet => read_long_parquet(path)?,
    };
    debug!("Read {} long form records from {}", table.records.len(), path.display());
    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing JSON from {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .with_context(|| format!("writing JSON to {}", path.display()))?;
    writer.flush().context("flushing JSON")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn write_csv_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    for row in rows {
        writer.serialize(row).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn read_csv_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let rows = reader
        .deserialize()
        .enumerate()
        .map(|(row_no, row)| row.with_context(|| format!("CSV row {row_no}")))
        .collect::<Result<Vec<T>>>()?;
    Ok(rows)
}

/// Axis and metadata lines are shorter than the plane rows, so the
/// writer is flexible.
fn write_long_csv(path: &Path, table: &LongTable) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("creating CSV")?;
    let width = table.records.iter().map(|r| r.values.len()).max().unwrap_or(0);
    let mut header = vec!["name".to_string(), "pp_delay".to_string()];
    header.extend((0..width).map(|i| i.to_string()));
    writer.write_record(&header).context("writing CSV header")?;

    for record in &table.records {
        let mut line = vec![
            record.name.clone(),
            record.pp_delay.map(|d| d.to_string()).unwrap_or_default(),
        ];
        line.extend(record.values.iter().map(|v| v.to_string()));
        writer.write_record(&line).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn read_long_csv(path: &Path) -> Result<LongTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;

    let mut table = LongTable::default();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let name = record
            .get(0)
            .with_context(|| format!("CSV row {row_no}: missing name"))?
            .to_string();
        let pp_delay = match record.get(1).map(str::trim) {
            None | Some("") => None,
            Some(tok) => Some(
                tok.parse::<f64>()
                    .with_context(|| format!("Row {row_no}, pp_delay: '{tok}' is not a number"))?,
            ),
        };
        // Padding cells left by other writers are empty.
        let values = record
            .iter()
            .skip(2)
            .map(str::trim)
            .filter(|tok| !tok.is_empty())
            .enumerate()
            .map(|(j, tok)| {
                tok.parse::<f64>()
                    .with_context(|| format!("Row {row_no}, {name}[{j}]: '{tok}' is not a number"))
            })
            .collect::<Result<Vec<f64>>>()?;
        table.records.push(LongRecord {
            name,
            pp_delay,
            values,
        });
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(batch).context("writing parquet record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;
    reader
        .map(|batch| batch.context("reading parquet record batch"))
        .collect()
}

fn write_spectrum_parquet(path: &Path, table: &SpectrumTable) -> Result<()> {
    let float = |name: &str| Field::new(name, DataType::Float64, false);
    let schema = Schema::new(vec![
        float("intensity"),
        float("baseline"),
        float("norm"),
        float("wavenumber"),
        Field::new("pixel", DataType::UInt64, false),
        float("intensity_uncertainty"),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(table.intensity.clone())),
        Arc::new(Float64Array::from(table.baseline.clone())),
        Arc::new(Float64Array::from(table.norm.clone())),
        Arc::new(Float64Array::from(table.wavenumber.clone())),
        Arc::new(UInt64Array::from_iter_values(table.pixel.iter().map(|&p| p as u64))),
        Arc::new(Float64Array::from(table.intensity_uncertainty.clone())),
    ];
    let batch = RecordBatch::try_new(Arc::new(schema), columns).context("building record batch")?;
    write_batch(path, &batch)
}

fn read_spectrum_parquet(path: &Path) -> Result<SpectrumTable> {
    let mut table = SpectrumTable::default();
    for batch in read_batches(path)? {
        table.intensity.extend(f64_column(&batch, "intensity")?);
        table.baseline.extend(f64_column(&batch, "baseline")?);
        table.norm.extend(f64_column(&batch, "norm")?);
        table.wavenumber.extend(f64_column(&batch, "wavenumber")?);
        table.pixel.extend(index_column(&batch, "pixel")?);
        table
            .intensity_uncertainty
            .extend(f64_column(&batch, "intensity_uncertainty")?);
    }
    Ok(table)
}

fn write_long_parquet(path: &Path, table: &LongTable) -> Result<()> {
    let names = StringArray::from(
        table
            .records
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>(),
    );
    let delays = Float64Array::from(table.records.iter().map(|r| r.pp_delay).collect::<Vec<_>>());
    let mut values = ListBuilder::new(Float64Builder::new());
    for record in &table.records {
        values.values().append_slice(&record.values);
        values.append(true);
    }
    let values = values.finish();

    let schema = Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("pp_delay", DataType::Float64, true),
        Field::new("values", values.data_type().clone(), false),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![Arc::new(names), Arc::new(delays), Arc::new(values)],
    )
    .context("building record batch")?;
    write_batch(path, &batch)
}

fn read_long_parquet(path: &Path) -> Result<LongTable> {
    let mut table = LongTable::default();
    for batch in read_batches(path)? {
        let names = column(&batch, "name")?
            .as_any()
            .downcast_ref::<StringArray>()
            .context("'name' is not a string column")?;
        let delays = column(&batch, "pp_delay")?
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("'pp_delay' is not a Float64 column")?;
        let values = column(&batch, "values")?;

        for row in 0..batch.num_rows() {
            let values = extract_f64_list(values, row)
                .with_context(|| format!("Row {row}: failed to read 'values'"))?;
            table.records.push(LongRecord {
                name: names.value(row).to_string(),
                pp_delay: (!delays.is_null(row)).then(|| delays.value(row)),
                values,
            });
        }
    }
    Ok(table)
}

// -- Arrow helpers --

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))?;
    Ok(batch.column(idx))
}

/// Float64 or Float32 column as `f64`; nulls become NaN.
fn f64_column(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let col = column(batch, name)?;
    floats(col.as_ref()).with_context(|| format!("reading '{name}'"))
}

/// Unsigned or signed integer column as indices.
fn index_column(batch: &RecordBatch, name: &str) -> Result<Vec<usize>> {
    let col = column(batch, name)?;
    if let Some(arr) = col.as_any().downcast_ref::<UInt64Array>() {
        Ok(arr.values().iter().map(|&v| v as usize).collect())
    } else if let Some(arr) = col.as_any().downcast_ref::<Int64Array>() {
        arr.values()
            .iter()
            .map(|&v| usize::try_from(v).with_context(|| format!("negative '{name}' value {v}")))
            .collect()
    } else {
        bail!("'{name}' has type {:?}, expected an integer column", col.data_type())
    }
}

fn floats(values: &dyn Array) -> Result<Vec<f64>> {
    if let Some(f64_arr) = values.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!("column type is {:?}, expected Float64 or Float32", values.data_type())
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };
    floats(values_array.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::pump_probe::tests::{bump, pump_probe};
    use crate::data::spectrum::SpectralAggregate;
    use approx::assert_relative_eq;
    use ndarray::{array, Array};
    use tempfile::tempdir;

    fn spectrum() -> Spectrum {
        Spectrum::builder(array![2.0, 4.0, 6.0])
            .baseline(1.0)
            .norm(vec![2.0, 2.5, 3.0])
            .wavenumber(array![3010.25, 3005.5, 3000.75])
            .pixel(array![400usize, 401, 402])
            .intensity_uncertainty(vec![0.2, 0.3, 0.4])
            .build()
            .unwrap()
    }

    #[test]
    fn spectrum_round_trips_in_every_format() {
        let dir = tempdir().unwrap();
        let saved = spectrum();
        for name in ["sp.json", "sp.csv", "sp.parquet"] {
            let path = dir.path().join(name);
            save_spectrum(&path, &saved).unwrap();
            let back = load_spectrum(&path).unwrap();
            assert_eq!(back.pixel(), saved.pixel(), "{name}");
            for (a, b) in back.normalized().iter().zip(saved.normalized().iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn pump_probe_round_trips_in_every_format() {
        let dir = tempdir().unwrap();
        let saved = pump_probe(bump(4, 7, 3.0));
        for name in ["pp.json", "pp.csv", "pp.parquet"] {
            let path = dir.path().join(name);
            save_pump_probe(&path, &saved).unwrap();
            let back = load_pump_probe(&path).unwrap();
            assert_eq!(back.pp_delay(), saved.pp_delay(), "{name}");
            assert_eq!(back.metadata(), saved.metadata(), "{name}");
            for (a, b) in back
                .intensity_uncertainty()
                .iter()
                .zip(saved.intensity_uncertainty().iter())
            {
                assert_relative_eq!(*a, *b, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn bleach_round_trips_in_every_format() {
        let dir = tempdir().unwrap();
        let a = pump_probe(bump(4, 7, 3.0));
        let b = pump_probe(bump(4, 7, 2.0));
        let saved = (&a / &b).unwrap();
        for name in ["bl.json", "bl.csv", "bl.parquet"] {
            let path = dir.path().join(name);
            save_bleach(&path, &saved).unwrap();
            let back = load_bleach(&path).unwrap();
            let pairs = back
                .normalized()
                .unwrap()
                .iter()
                .zip(saved.normalized().unwrap().iter());
            for (x, y) in pairs {
                assert_relative_eq!(*x, *y, epsilon = 1e-4);
            }
            assert_eq!(back.pixel().unwrap(), saved.pixel().unwrap());
        }
    }

    #[test]
    fn trace_json_and_table() {
        let dir = tempdir().unwrap();
        let trace = Trace::new(array![0.0, 1.0], array![-0.1, -0.05], 0.01)
            .unwrap()
            .with_pixel(array![10.0, 11.0]);
        let json = dir.path().join("trace.json");
        save_trace(&json, &trace).unwrap();
        assert_eq!(load_trace(&json).unwrap(), trace);

        let csv = dir.path().join("trace.csv");
        export_trace_table(&csv, &trace).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        assert!(text.starts_with("pp_delay,variable,value,pixel_start"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn raw_dataset_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.json");
        let raw = RawDataset::new(
            Array::from_elem((2, 3, 1, 4), 5.0),
            array![-1.0, 1.0],
            674.0,
            811.7,
            670.0,
            vec![0.034274, 642.101],
        )
        .unwrap();
        save_raw(&path, &raw).unwrap();
        assert_eq!(load_raw(&path).unwrap(), raw);
    }

    #[test]
    fn raw_dataset_with_bad_delays_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.json");
        let mut raw = RawDataset::new(
            Array::zeros((2, 1, 1, 3)),
            array![0.0, 1.0],
            674.0,
            811.7,
            670.0,
            vec![1.0, 600.0],
        )
        .unwrap();
        raw.pp_delay = array![0.0];
        save_raw(&path, &raw).unwrap();
        assert!(load_raw(&path).is_err());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let err = save_spectrum(Path::new("spectrum.txt"), &spectrum()).unwrap_err();
        assert!(err.to_string().contains(".txt"));
    }
}
