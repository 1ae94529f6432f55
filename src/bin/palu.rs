use anyhow::Context;

use palu::io::export::export_all;
use palu::{ParameterSet, PhaseModel, PhaseState, RunConfig};

fn main() -> anyhow::Result<()> {
    let mut params_path: Option<String> = None;
    let mut csv_out = "simulation_results.csv".to_string();
    let mut json_out = "simulation_results.json".to_string();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--params" => params_path = Some(args.next().context("--params needs a path")?),
            "--csv" => csv_out = args.next().context("--csv needs a path")?,
            "--json" => json_out = args.next().context("--json needs a path")?,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    let params = match &params_path {
        Some(path) => {
            let loaded = ParameterSet::from_csv(path, false)
                .with_context(|| format!("loading parameters from {path}"))?;
            for issue in &loaded.issues {
                eprintln!("warning: {issue}");
            }
            for key in &loaded.unrecognized {
                eprintln!("warning: ignoring unknown parameter '{key}'");
            }
            loaded.set
        }
        None => ParameterSet::default(),
    };

    let cfg = RunConfig::default();
    cfg.check()?;
    let model = PhaseModel::new(params)?;

    println!("running {} samples over [{}, {}] days...", cfg.samples, cfg.t0, cfg.t1);
    let result = model.run(&PhaseState::reference(), &cfg)?;

    let last = result.len() - 1;
    println!("final day {:.0}:", result.t[last]);
    println!("  total population: {:.0}", result.n_total[last]);
    println!(
        "  susceptible: {:.0} ({:.1}%)",
        result.s_total[last],
        100.0 * result.s_total[last] / result.n_total[last]
    );
    println!(
        "  vaccinated:  {:.0} ({:.1}%)",
        result.v_total[last],
        100.0 * result.couverture[last]
    );
    println!(
        "  infected:    {:.0} ({:.1}%)",
        result.i_total[last],
        100.0 * result.prevalence[last]
    );

    let report = export_all(&result, &csv_out, &json_out);
    match &report.csv {
        Ok(path) => println!("csv written to {}", path.display()),
        Err(e) => eprintln!("csv export failed: {e}"),
    }
    match &report.json {
        Ok(path) => println!("json written to {}", path.display()),
        Err(e) => eprintln!("json export failed: {e}"),
    }

    Ok(())
}
