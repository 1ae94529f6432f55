use palu::{ParameterSet, PhaseModel, PhaseState, RunConfig};

fn main() -> anyhow::Result<()> {
    let model = PhaseModel::new(ParameterSet::default())?;
    let cfg = RunConfig::default();

    let result = model.run(&PhaseState::reference(), &cfg)?;

    // Print roughly one line per five days
    println!("day,S_total,V_total,I_total,N_total,prevalence,couverture");
    for (idx, t) in result.t.iter().enumerate() {
        if idx % 10 != 0 && idx != result.len() - 1 {
            continue;
        }
        println!(
            "{:.1},{:.0},{:.0},{:.0},{:.0},{:.4},{:.4}",
            t,
            result.s_total[idx],
            result.v_total[idx],
            result.i_total[idx],
            result.n_total[idx],
            result.prevalence[idx],
            result.couverture[idx]
        );
    }

    Ok(())
}
