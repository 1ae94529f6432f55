use palu::io::export::{export_all, export_csv, export_json};
use palu::math::ode::Trajectory;
use palu::results::RESULT_KEYS;
use palu::{ParameterSet, PhaseModel, PhaseState, RunConfig, SimulationResult};

fn small_result() -> SimulationResult {
    let model = PhaseModel::new(ParameterSet::default()).expect("default params valid");
    let cfg = RunConfig {
        t0: 0.0,
        t1: 10.0,
        samples: 20,
        rtol: 1e-6,
    };
    model
        .run(&PhaseState::reference(), &cfg)
        .expect("run succeeds")
}

#[test]
fn json_round_trip_preserves_every_series() {
    let result = small_result();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = export_json(&result, dir.path().join("out.json")).expect("json export");

    let text = std::fs::read_to_string(path).expect("read back");
    let back: SimulationResult = serde_json::from_str(&text).expect("reparse");
    assert_eq!(back, result);
}

#[test]
fn csv_round_trip_preserves_columns_and_order() {
    let result = small_result();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = export_csv(&result, dir.path().join("out.csv")).expect("csv export");

    let mut rdr = csv::Reader::from_path(path).expect("open csv");
    let headers: Vec<String> = rdr
        .headers()
        .expect("headers")
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(headers, RESULT_KEYS.to_vec());

    let mut rows = 0usize;
    for (i, record) in rdr.records().enumerate() {
        let record = record.expect("record");
        rows += 1;
        let cell = |c: usize| record[c].parse::<f64>().expect("numeric cell");
        assert_eq!(cell(0), result.t[i]);
        assert_eq!(cell(1), result.s11[i]);
        assert_eq!(cell(9), result.i13[i]);
        assert_eq!(cell(13), result.n_total[i]);
        assert_eq!(cell(14), result.prevalence[i]);
        assert_eq!(cell(15), result.couverture[i]);
    }
    assert_eq!(rows, result.len());
}

#[test]
fn undefined_ratios_export_without_failing() {
    // all-zero sample: ratios are the NaN sentinel
    let traj = Trajectory {
        t: vec![0.0, 1.0],
        y: vec![vec![0.0; 9], vec![1.0; 9]],
    };
    let result = SimulationResult::from_trajectory(&traj);
    let dir = tempfile::tempdir().expect("tempdir");

    let json_path = export_json(&result, dir.path().join("nan.json")).expect("json export");
    let text = std::fs::read_to_string(json_path).expect("read json");
    assert!(text.contains("null"));

    let csv_path = export_csv(&result, dir.path().join("nan.csv")).expect("csv export");
    let mut rdr = csv::Reader::from_path(csv_path).expect("open csv");
    let first = rdr.records().next().expect("one row").expect("record");
    assert!(first[14].parse::<f64>().expect("prevalence cell").is_nan());
}

#[test]
fn one_failed_target_does_not_abort_the_other() {
    let result = small_result();
    let dir = tempfile::tempdir().expect("tempdir");
    let bad_csv = dir.path().join("no_such_dir").join("out.csv");
    let good_json = dir.path().join("out.json");

    let report = export_all(&result, &bad_csv, &good_json);
    assert!(report.csv.is_err());
    assert!(report.json.is_ok());
    assert!(good_json.is_file());
}
