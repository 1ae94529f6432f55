use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::params::{validate_values, ParameterSet, RawValue, ValidationFailed, ValidationIssue};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("parameter source not found: {path}")]
    SourceNotFound { path: PathBuf },
    #[error("parameter source is empty: {path}")]
    EmptySource { path: PathBuf },
    #[error("no supported parameter layout matched in {path}")]
    ParseAmbiguous { path: PathBuf },
    #[error("failed to read parameter source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CsvParamsError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Validation(#[from] ValidationFailed),
}

/// A parameter set loaded from disk, with everything the caller may want to
/// surface: advisory validation issues and keys no field matched.
#[derive(Debug)]
pub struct LoadedParameters {
    pub set: ParameterSet,
    pub issues: Vec<ValidationIssue>,
    pub unrecognized: Vec<String>,
}

/// Read a comma-separated parameter table into a name → value mapping.
///
/// Three layouts are sniffed, in order:
/// 1. a header row containing `name` (or `param`) and `value`, followed by
///    one (name, value) pair per row;
/// 2. a header row of field names with a second row of values, paired
///    positionally;
/// 3. fallback: every row with at least two cells is a (name, value) pair.
///
/// Rows too short for the detected layout are skipped, as are blank names.
pub fn load_params(path: impl AsRef<Path>) -> Result<BTreeMap<String, RawValue>, LoadError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(LoadError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(LoadError::EmptySource {
            path: path.to_path_buf(),
        });
    }

    let params = parse_rows(&rows);
    if params.is_empty() {
        return Err(LoadError::ParseAmbiguous {
            path: path.to_path_buf(),
        });
    }
    Ok(params)
}

fn parse_rows(rows: &[Vec<String>]) -> BTreeMap<String, RawValue> {
    let mut params = BTreeMap::new();

    let header: Vec<String> = rows[0].iter().map(|h| h.trim().to_lowercase()).collect();
    let name_col = header
        .iter()
        .position(|h| h == "name")
        .or_else(|| header.iter().position(|h| h == "param"));
    let value_col = header.iter().position(|h| h == "value");

    if let (Some(nc), Some(vc)) = (name_col, value_col) {
        for row in &rows[1..] {
            if row.len() <= nc.max(vc) {
                continue;
            }
            let name = row[nc].trim();
            if !name.is_empty() {
                params.insert(name.to_string(), RawValue::parse(&row[vc]));
            }
        }
    } else if rows.len() >= 2 && rows[0].iter().all(|c| !c.trim().is_empty()) {
        // header cells beyond the value row stay unset
        let values = &rows[1];
        for (i, key) in rows[0].iter().enumerate() {
            if i < values.len() {
                params.insert(key.trim().to_string(), RawValue::parse(&values[i]));
            }
        }
    } else {
        for row in rows {
            if row.len() >= 2 {
                let name = row[0].trim();
                if !name.is_empty() {
                    params.insert(name.to_string(), RawValue::parse(&row[1]));
                }
            }
        }
    }

    params
}

impl ParameterSet {
    /// Load, apply onto the defaults, and validate a parameter CSV.
    ///
    /// With `raise_on_error = true` a non-empty issue list becomes an error;
    /// otherwise issues are returned for the caller to surface. Fields the
    /// file does not name keep their defaults.
    pub fn from_csv(
        path: impl AsRef<Path>,
        raise_on_error: bool,
    ) -> Result<LoadedParameters, CsvParamsError> {
        let values = load_params(path)?;
        let issues = validate_values(&values, None);
        if raise_on_error && !issues.is_empty() {
            return Err(ValidationFailed { issues }.into());
        }
        let mut set = ParameterSet::default();
        let unrecognized = set.apply(&values);
        Ok(LoadedParameters {
            set,
            issues,
            unrecognized,
        })
    }
}
