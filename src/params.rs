use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One cell from a tabular parameter source, coerced to the narrowest type
/// that fits: integer literal, float, raw text, or empty.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl RawValue {
    /// Coerce a raw cell. Integers are preferred when the text carries no
    /// fractional or exponent marker; unparseable text is kept verbatim.
    pub fn parse(cell: &str) -> RawValue {
        let s = cell.trim();
        if s.is_empty() {
            return RawValue::Null;
        }
        let looks_float = s.contains('.') || s.contains('e') || s.contains('E');
        if !looks_float {
            if let Ok(i) = s.parse::<i64>() {
                return RawValue::Int(i);
            }
        }
        match s.parse::<f64>() {
            Ok(f) => RawValue::Float(f),
            Err(_) => RawValue::Text(s.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(i) => Some(*i as f64),
            RawValue::Float(f) => Some(*f),
            RawValue::Text(_) | RawValue::Null => None,
        }
    }
}

/// Epidemiological and demographic constants of the three-phase model.
///
/// `mu_v` and `r` describe the mosquito side; the human-side reduction does
/// not read them, but parameter files carry them and they stay validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    // demography
    pub mu: f64,
    pub mu_v: f64,
    pub r: f64,
    pub d: f64,

    // recovery and waning
    pub delta: f64,
    pub omega: f64,

    // vaccination rate per phase
    pub theta_1: f64,
    pub theta_2: f64,
    pub theta_3: f64,

    // phase-to-phase transition rates
    pub alpha_1: f64,
    pub alpha_2: f64,
    pub alpha_3: f64,

    // transmission
    pub beta: f64,
    pub c: f64,
    pub b_1: f64,
    pub b_2: f64,
    pub b_3: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            mu: 0.00004,
            mu_v: 0.1,
            r: 0.1,
            d: 0.005,
            delta: 0.05,
            omega: 0.002,
            theta_1: 0.01,
            theta_2: 0.005,
            theta_3: 0.001,
            alpha_1: 3.0,
            alpha_2: 3.0,
            alpha_3: 3.0,
            beta: 0.5,
            c: 0.3,
            b_1: 0.5,
            b_2: 1.0,
            b_3: 2.0,
        }
    }
}

impl ParameterSet {
    /// Phase-to-phase transition rate for phase `k` in 0..3.
    pub fn alpha(&self, k: usize) -> f64 {
        match k {
            0 => self.alpha_1,
            1 => self.alpha_2,
            2 => self.alpha_3,
            _ => panic!("phase index out of range: {k}"),
        }
    }

    /// Vaccination rate for phase `k` in 0..3.
    pub fn theta(&self, k: usize) -> f64 {
        match k {
            0 => self.theta_1,
            1 => self.theta_2,
            2 => self.theta_3,
            _ => panic!("phase index out of range: {k}"),
        }
    }

    /// Biting-rate multiplier for phase `k` in 0..3.
    pub fn b(&self, k: usize) -> f64 {
        match k {
            0 => self.b_1,
            1 => self.b_2,
            2 => self.b_3,
            _ => panic!("phase index out of range: {k}"),
        }
    }

    /// Field value by canonical name, if the name is recognized.
    pub fn get(&self, name: &str) -> Option<f64> {
        Some(match name {
            "mu" => self.mu,
            "mu_v" => self.mu_v,
            "r" => self.r,
            "d" => self.d,
            "delta" => self.delta,
            "omega" => self.omega,
            "theta_1" => self.theta_1,
            "theta_2" => self.theta_2,
            "theta_3" => self.theta_3,
            "alpha_1" => self.alpha_1,
            "alpha_2" => self.alpha_2,
            "alpha_3" => self.alpha_3,
            "beta" => self.beta,
            "c" => self.c,
            "b_1" => self.b_1,
            "b_2" => self.b_2,
            "b_3" => self.b_3,
            _ => return None,
        })
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut f64> {
        Some(match name {
            "mu" => &mut self.mu,
            "mu_v" => &mut self.mu_v,
            "r" => &mut self.r,
            "d" => &mut self.d,
            "delta" => &mut self.delta,
            "omega" => &mut self.omega,
            "theta_1" => &mut self.theta_1,
            "theta_2" => &mut self.theta_2,
            "theta_3" => &mut self.theta_3,
            "alpha_1" => &mut self.alpha_1,
            "alpha_2" => &mut self.alpha_2,
            "alpha_3" => &mut self.alpha_3,
            "beta" => &mut self.beta,
            "c" => &mut self.c,
            "b_1" => &mut self.b_1,
            "b_2" => &mut self.b_2,
            "b_3" => &mut self.b_3,
            _ => return None,
        })
    }

    /// Overwrite recognized fields from a loaded mapping. Names match exactly
    /// or after hyphen/space → underscore normalization. Fields the mapping
    /// does not name keep their current value; values that are not numeric
    /// are left for validation to flag. Returns the unrecognized keys.
    pub fn apply(&mut self, values: &BTreeMap<String, RawValue>) -> Vec<String> {
        let mut unrecognized = Vec::new();
        for (key, value) in values {
            let name = canonical_name(key);
            match self.field_mut(&name) {
                Some(slot) => {
                    if let Some(v) = value.as_f64() {
                        *slot = v;
                    }
                }
                None => unrecognized.push(key.clone()),
            }
        }
        unrecognized
    }

    /// Range-check every field against `default_ranges`.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for &(name, min, max) in default_ranges() {
            let value = self.get(name).expect("range table names a known field");
            if !(min <= value && value <= max) {
                issues.push(ValidationIssue::OutOfRange {
                    name: name.to_string(),
                    value,
                    min,
                    max,
                });
            }
        }
        issues
    }

    pub fn ensure_valid(&self) -> Result<(), ValidationFailed> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailed { issues })
        }
    }
}

fn canonical_name(key: &str) -> String {
    key.trim().replace(['-', ' '], "_")
}

/// Known-good range per field: (name, min, max).
pub fn default_ranges() -> &'static [(&'static str, f64, f64)] {
    &[
        ("mu", 0.0, 1.0),
        ("mu_v", 0.0, 1.0),
        ("r", 0.0, 10.0),
        ("d", 0.0, 1.0),
        ("delta", 0.0, 1.0),
        ("omega", 0.0, 1.0),
        ("theta_1", 0.0, 1.0),
        ("theta_2", 0.0, 1.0),
        ("theta_3", 0.0, 1.0),
        ("alpha_1", 0.0, 100.0),
        ("alpha_2", 0.0, 100.0),
        ("alpha_3", 0.0, 100.0),
        ("beta", 0.0, 10.0),
        ("c", 0.0, 1.0),
        ("b_1", 0.0, 100.0),
        ("b_2", 0.0, 100.0),
        ("b_3", 0.0, 100.0),
    ]
}

/// Check a raw mapping against a range table (`default_ranges` when `None`).
/// Keys without a range entry are ignored. Never mutates the input.
pub fn validate_values(
    values: &BTreeMap<String, RawValue>,
    ranges: Option<&[(&str, f64, f64)]>,
) -> Vec<ValidationIssue> {
    let ranges = ranges.unwrap_or(default_ranges());
    let mut issues = Vec::new();
    for (key, value) in values {
        let name = canonical_name(key);
        let Some(&(_, min, max)) = ranges.iter().find(|(n, _, _)| *n == name) else {
            continue;
        };
        match value {
            RawValue::Null => issues.push(ValidationIssue::Absent { name }),
            RawValue::Text(raw) => issues.push(ValidationIssue::NotNumeric {
                name,
                raw: raw.clone(),
            }),
            _ => {
                let v = value.as_f64().expect("int or float");
                if !(min <= v && v <= max) {
                    issues.push(ValidationIssue::OutOfRange {
                        name,
                        value: v,
                        min,
                        max,
                    });
                }
            }
        }
    }
    issues
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    Absent { name: String },
    NotNumeric { name: String, raw: String },
    OutOfRange { name: String, value: f64, min: f64, max: f64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Absent { name } => write!(f, "parameter '{name}' is absent"),
            ValidationIssue::NotNumeric { name, raw } => {
                write!(f, "parameter '{name}' = {raw:?} is not numeric")
            }
            ValidationIssue::OutOfRange { name, value, min, max } => {
                write!(f, "parameter '{name}' = {value} outside range [{min}, {max}]")
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("parameter validation failed: {}", format_issues(.issues))]
pub struct ValidationFailed {
    pub issues: Vec<ValidationIssue>,
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_prefers_integers() {
        assert_eq!(RawValue::parse("3"), RawValue::Int(3));
        assert_eq!(RawValue::parse("0.5"), RawValue::Float(0.5));
        assert_eq!(RawValue::parse("1e-3"), RawValue::Float(0.001));
        assert_eq!(RawValue::parse("abc"), RawValue::Text("abc".to_string()));
        assert_eq!(RawValue::parse("  "), RawValue::Null);
    }

    #[test]
    fn apply_normalizes_aliases_and_reports_unknown_keys() {
        let mut set = ParameterSet::default();
        let mut values = BTreeMap::new();
        values.insert("theta-1".to_string(), RawValue::Float(0.02));
        values.insert("alpha 2".to_string(), RawValue::Int(4));
        values.insert("bednets".to_string(), RawValue::Float(1.0));

        let unknown = set.apply(&values);
        assert_eq!(set.theta_1, 0.02);
        assert_eq!(set.alpha_2, 4.0);
        assert_eq!(unknown, vec!["bednets".to_string()]);
    }

    #[test]
    fn non_numeric_values_leave_fields_untouched() {
        let mut set = ParameterSet::default();
        let mut values = BTreeMap::new();
        values.insert("beta".to_string(), RawValue::Text("fast".to_string()));
        set.apply(&values);
        assert_eq!(set.beta, 0.5);
    }

    #[test]
    fn defaults_are_within_range() {
        assert!(ParameterSet::default().validate().is_empty());
    }
}
