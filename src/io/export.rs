use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::results::{SimulationResult, RESULT_KEYS};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize result for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write csv {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Per-target outcome of [`export_all`]. One target failing never aborts or
/// invalidates the other.
#[derive(Debug)]
pub struct ExportReport {
    pub csv: Result<PathBuf, ExportError>,
    pub json: Result<PathBuf, ExportError>,
}

/// Write the result as a single pretty-printed JSON object, keys in the
/// [`RESULT_KEYS`] order.
pub fn export_json(
    result: &SimulationResult,
    path: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, result).map_err(|source| ExportError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    out.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}

/// Write the result as CSV: one header row with the keys present, one row
/// per sample. A value that is not an array is treated as a constant and
/// repeated on every row. Undefined ratios render as `NaN`.
pub fn export_csv(
    result: &SimulationResult,
    path: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    let path = path.as_ref();
    let value = serde_json::to_value(result).map_err(|source| ExportError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    let map = value.as_object().expect("result serializes to an object");

    let keys: Vec<&str> = RESULT_KEYS
        .iter()
        .copied()
        .filter(|k| map.contains_key(*k))
        .collect();

    let mut writer = csv::Writer::from_path(path).map_err(|source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    writer.write_record(&keys).map_err(csv_err)?;

    let samples = map
        .get("t")
        .and_then(Value::as_array)
        .map_or(0, |t| t.len());
    for i in 0..samples {
        let row: Vec<String> = keys
            .iter()
            .map(|k| match &map[*k] {
                Value::Array(column) => column.get(i).map(format_cell).unwrap_or_default(),
                constant => format_cell(constant),
            })
            .collect();
        writer.write_record(&row).map_err(csv_err)?;
    }

    writer
        .flush()
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(path.to_path_buf())
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "NaN".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Export to both targets, reporting each outcome individually.
pub fn export_all(
    result: &SimulationResult,
    csv_path: impl AsRef<Path>,
    json_path: impl AsRef<Path>,
) -> ExportReport {
    ExportReport {
        csv: export_csv(result, csv_path),
        json: export_json(result, json_path),
    }
}
