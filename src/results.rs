use serde::{Deserialize, Serialize};

use crate::math::ode::Trajectory;

/// Serialization key order relied on by downstream consumers of the CSV and
/// JSON artifacts. `couverture` is the vaccination-coverage series; the name
/// is part of the published schema.
pub const RESULT_KEYS: [&str; 16] = [
    "t", "S11", "V11", "I11", "S12", "V12", "I12", "S13", "V13", "I13", "S_total", "V_total",
    "I_total", "N_total", "prevalence", "couverture",
];

/// Per-sample aggregates over the three phases of each class.
///
/// `prevalence` and `couverture` are NaN wherever `n_total` is zero: the
/// ratio is undefined there and the sentinel keeps the row exportable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedMetrics {
    pub s_total: Vec<f64>,
    pub v_total: Vec<f64>,
    pub i_total: Vec<f64>,
    pub n_total: Vec<f64>,
    pub prevalence: Vec<f64>,
    pub couverture: Vec<f64>,
}

/// Elementwise totals, prevalence and vaccination coverage of a trajectory.
pub fn derive_metrics(traj: &Trajectory) -> DerivedMetrics {
    let n = traj.len();
    let mut m = DerivedMetrics {
        s_total: Vec::with_capacity(n),
        v_total: Vec::with_capacity(n),
        i_total: Vec::with_capacity(n),
        n_total: Vec::with_capacity(n),
        prevalence: Vec::with_capacity(n),
        couverture: Vec::with_capacity(n),
    };
    for y in &traj.y {
        let s = y[0] + y[3] + y[6];
        let v = y[1] + y[4] + y[7];
        let i = y[2] + y[5] + y[8];
        let total = s + v + i;
        m.s_total.push(s);
        m.v_total.push(v);
        m.i_total.push(i);
        m.n_total.push(total);
        if total == 0.0 {
            m.prevalence.push(f64::NAN);
            m.couverture.push(f64::NAN);
        } else {
            m.prevalence.push(i / total);
            m.couverture.push(v / total);
        }
    }
    m
}

/// Trajectory columns plus derived metrics of one run. Field order matches
/// [`RESULT_KEYS`] so serde emits the published key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub t: Vec<f64>,
    #[serde(rename = "S11")]
    pub s11: Vec<f64>,
    #[serde(rename = "V11")]
    pub v11: Vec<f64>,
    #[serde(rename = "I11")]
    pub i11: Vec<f64>,
    #[serde(rename = "S12")]
    pub s12: Vec<f64>,
    #[serde(rename = "V12")]
    pub v12: Vec<f64>,
    #[serde(rename = "I12")]
    pub i12: Vec<f64>,
    #[serde(rename = "S13")]
    pub s13: Vec<f64>,
    #[serde(rename = "V13")]
    pub v13: Vec<f64>,
    #[serde(rename = "I13")]
    pub i13: Vec<f64>,
    #[serde(rename = "S_total")]
    pub s_total: Vec<f64>,
    #[serde(rename = "V_total")]
    pub v_total: Vec<f64>,
    #[serde(rename = "I_total")]
    pub i_total: Vec<f64>,
    #[serde(rename = "N_total")]
    pub n_total: Vec<f64>,
    // strict JSON has no NaN; undefined ratios travel as null
    #[serde(with = "nan_as_null")]
    pub prevalence: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub couverture: Vec<f64>,
}

impl SimulationResult {
    /// Pure derivation: split the trajectory into named columns and attach
    /// the per-sample metrics.
    pub fn from_trajectory(traj: &Trajectory) -> Self {
        let column = |c: usize| traj.y.iter().map(|y| y[c]).collect::<Vec<f64>>();
        let m = derive_metrics(traj);
        Self {
            t: traj.t.clone(),
            s11: column(0),
            v11: column(1),
            i11: column(2),
            s12: column(3),
            v12: column(4),
            i12: column(5),
            s13: column(6),
            v13: column(7),
            i13: column(8),
            s_total: m.s_total,
            v_total: m.v_total,
            i_total: m.i_total,
            n_total: m.n_total,
            prevalence: m.prevalence,
            couverture: m.couverture,
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

mod nan_as_null {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], ser: S) -> Result<S::Ok, S::Error> {
        let mut seq = ser.serialize_seq(Some(values.len()))?;
        for v in values {
            if v.is_finite() {
                seq.serialize_element(&Some(*v))?;
            } else {
                seq.serialize_element(&None::<f64>)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(de)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_trajectory() -> Trajectory {
        Trajectory {
            t: vec![0.0, 1.0],
            y: vec![
                vec![3000.0, 500.0, 100.0, 3000.0, 500.0, 100.0, 3000.0, 500.0, 100.0],
                vec![0.0; 9],
            ],
        }
    }

    #[test]
    fn totals_sum_phases_per_class() {
        let m = derive_metrics(&toy_trajectory());
        assert_eq!(m.s_total[0], 9000.0);
        assert_eq!(m.v_total[0], 1500.0);
        assert_eq!(m.i_total[0], 300.0);
        assert_eq!(m.n_total[0], 10800.0);
        assert!((m.prevalence[0] - 300.0 / 10800.0).abs() < 1e-15);
        assert!((m.couverture[0] - 1500.0 / 10800.0).abs() < 1e-15);
    }

    #[test]
    fn zero_population_yields_nan_sentinels() {
        let m = derive_metrics(&toy_trajectory());
        assert_eq!(m.n_total[1], 0.0);
        assert!(m.prevalence[1].is_nan());
        assert!(m.couverture[1].is_nan());
    }

    #[test]
    fn json_key_order_is_fixed() {
        let result = SimulationResult::from_trajectory(&toy_trajectory());
        let json = serde_json::to_string(&result).unwrap();
        let mut last = 0;
        for key in RESULT_KEYS {
            let pos = json
                .find(&format!("\"{key}\":"))
                .unwrap_or_else(|| panic!("key {key} missing"));
            assert!(pos >= last, "key {key} out of order");
            last = pos;
        }
    }

    #[test]
    fn nan_ratios_serialize_as_null_and_read_back_as_nan() {
        let result = SimulationResult::from_trajectory(&toy_trajectory());
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("null"));
        let back: SimulationResult = serde_json::from_str(&json).unwrap();
        assert!(back.prevalence[1].is_nan());
        assert_eq!(back.n_total, result.n_total);
    }
}
