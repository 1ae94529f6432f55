use serde::{Deserialize, Serialize};

use crate::math::ode::{integrate, IntegrationError, OdeOptions, Trajectory};
use crate::params::{ParameterSet, ValidationFailed};
use crate::results::SimulationResult;

/// Number of phases in a day (morning, evening, night).
pub const N_PHASES: usize = 3;
/// Compartments per phase: susceptible, vaccinated, infected.
pub const N_CLASSES: usize = 3;
/// Total state size of the single-group reduction.
pub const N_COMPARTMENTS: usize = N_PHASES * N_CLASSES;

// Fixed inflows per phase and per day, identical across phases.
const BIRTH_S: f64 = 10.0;
const BIRTH_V: f64 = 5.0;
const BIRTH_I: f64 = 1.0;

/// Fixed mosquito population seen by the human-side reduction. The vector
/// compartments carry no dynamics of their own here; these counts enter the
/// force of infection only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorPopulation {
    pub total: f64,
    pub infected: f64,
}

impl Default for VectorPopulation {
    fn default() -> Self {
        // 10% prevalence
        Self {
            total: 50_000.0,
            infected: 5_000.0,
        }
    }
}

/// State vector layout: `[S11, V11, I11, S12, V12, I12, S13, V13, I13]`,
/// phase-major with the class order S, V, I inside each phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseState {
    pub y: [f64; N_COMPARTMENTS],
}

impl PhaseState {
    /// Same (susceptible, vaccinated, infected) counts in every phase.
    pub fn uniform(s: f64, v: f64, i: f64) -> Self {
        Self {
            y: [s, v, i, s, v, i, s, v, i],
        }
    }

    /// Reference initial condition: 3000/500/100 per phase.
    pub fn reference() -> Self {
        Self::uniform(3000.0, 500.0, 100.0)
    }
}

/// Span, sampling and tolerance of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub t0: f64,
    pub t1: f64,
    pub samples: usize,
    pub rtol: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        // 100 days, 200 samples
        Self {
            t0: 0.0,
            t1: 100.0,
            samples: 200,
            rtol: 1e-6,
        }
    }
}

impl RunConfig {
    pub fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.t1 > self.t0, "t1 must be greater than t0");
        anyhow::ensure!(self.samples >= 2, "at least two samples are required");
        anyhow::ensure!(self.rtol > 0.0, "rtol must be positive");
        Ok(())
    }
}

/// The nine-equation human-side transmission model over three daily phases.
///
/// Individuals cycle morning → evening → night → morning at the `alpha`
/// rates; within a phase they move between the S/V/I classes through
/// vaccination, waning, recovery and infection.
pub struct PhaseModel {
    pub params: ParameterSet,
    pub vectors: VectorPopulation,
}

impl PhaseModel {
    pub fn new(params: ParameterSet) -> Result<Self, ValidationFailed> {
        params.ensure_valid()?;
        Ok(Self {
            params,
            vectors: VectorPopulation::default(),
        })
    }

    pub fn with_vectors(mut self, vectors: VectorPopulation) -> Self {
        self.vectors = vectors;
        self
    }

    /// Per-susceptible infection rate in phase `k`, constant in time.
    pub fn force_of_infection(&self, k: usize) -> f64 {
        let p = &self.params;
        p.beta * p.b(k) * p.c * self.vectors.infected / self.vectors.total
    }

    /// Right-hand side of the ODE system. The system is autonomous; `t` is
    /// taken for integrator compatibility only.
    pub fn deriv(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        let p = &self.params;
        for k in 0..N_PHASES {
            let pred = (k + N_PHASES - 1) % N_PHASES;
            let base = N_CLASSES * k;
            let pb = N_CLASSES * pred;

            let (s, v, i) = (y[base], y[base + 1], y[base + 2]);
            let (s_pred, v_pred, i_pred) = (y[pb], y[pb + 1], y[pb + 2]);
            let lambda = self.force_of_infection(k);

            dy[base] = (BIRTH_S + p.alpha(pred) * s_pred + p.omega * v + p.delta * i)
                - (p.mu * s + p.alpha(k) * s + lambda * s);
            dy[base + 1] = (p.theta(k) * s + p.alpha(pred) * v_pred + BIRTH_V)
                - (p.mu * v + p.omega * v + p.alpha(k) * v);
            dy[base + 2] = (lambda * s + p.alpha(pred) * i_pred + BIRTH_I)
                - ((p.d + p.mu) * i + p.delta * i + p.alpha(k) * i);
        }
    }

    /// Integrate the system from `state` over the configured span.
    pub fn simulate(
        &self,
        state: &PhaseState,
        cfg: &RunConfig,
    ) -> Result<Trajectory, IntegrationError> {
        let opts = OdeOptions {
            rtol: cfg.rtol,
            ..Default::default()
        };
        self.simulate_with(state, cfg, &opts)
    }

    /// Like [`simulate`](Self::simulate) with full solver options, e.g. a
    /// cancellation flag or a different step budget.
    pub fn simulate_with(
        &self,
        state: &PhaseState,
        cfg: &RunConfig,
        opts: &OdeOptions,
    ) -> Result<Trajectory, IntegrationError> {
        integrate(
            |t, y, dy| self.deriv(t, y, dy),
            &state.y,
            (cfg.t0, cfg.t1),
            cfg.samples,
            opts,
        )
    }

    /// One full run: integrate, then derive totals, prevalence and coverage.
    /// This is the only entry point; constructing the model does no work.
    pub fn run(
        &self,
        state: &PhaseState,
        cfg: &RunConfig,
    ) -> Result<SimulationResult, IntegrationError> {
        let traj = self.simulate(state, cfg)?;
        Ok(SimulationResult::from_trajectory(&traj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_of_infection_scales_with_phase_biting_rate() {
        let model = PhaseModel::new(ParameterSet::default()).unwrap();
        // beta * b_k * c * Iv / Nv with the reference values
        assert!((model.force_of_infection(0) - 0.0075).abs() < 1e-12);
        assert!((model.force_of_infection(1) - 0.0150).abs() < 1e-12);
        assert!((model.force_of_infection(2) - 0.0300).abs() < 1e-12);
    }

    #[test]
    fn deriv_is_autonomous() {
        let model = PhaseModel::new(ParameterSet::default()).unwrap();
        let y = PhaseState::reference().y;
        let mut d0 = [0.0; N_COMPARTMENTS];
        let mut d1 = [0.0; N_COMPARTMENTS];
        model.deriv(0.0, &y, &mut d0);
        model.deriv(42.0, &y, &mut d1);
        assert_eq!(d0, d1);
    }

    #[test]
    fn net_inflow_is_positive_at_the_reference_state() {
        // 3 * (10 + 5 + 1) inflow against mu*N + d*I at t = 0
        let model = PhaseModel::new(ParameterSet::default()).unwrap();
        let y = PhaseState::reference().y;
        let mut dy = [0.0; N_COMPARTMENTS];
        model.deriv(0.0, &y, &mut dy);
        let total_rate: f64 = dy.iter().sum();
        assert!(total_rate > 0.0, "total rate {total_rate} should be positive");
    }

    #[test]
    fn phase_cycle_wraps_night_to_morning() {
        // with alpha_3 isolated, leaving-night mass must arrive in morning
        let mut params = ParameterSet::default();
        params.alpha_1 = 0.0;
        params.alpha_2 = 0.0;
        params.alpha_3 = 1.0;
        params.mu = 0.0;
        params.d = 0.0;
        params.delta = 0.0;
        params.omega = 0.0;
        params.theta_1 = 0.0;
        params.theta_2 = 0.0;
        params.theta_3 = 0.0;
        params.beta = 0.0;
        let model = PhaseModel::new(params).unwrap();

        let mut y = [0.0; N_COMPARTMENTS];
        y[6] = 100.0; // S13
        let mut dy = [0.0; N_COMPARTMENTS];
        model.deriv(0.0, &y, &mut dy);
        assert_eq!(dy[0], BIRTH_S + 100.0); // S11 gains the night outflow
        assert_eq!(dy[6], BIRTH_S - 100.0); // S13 loses it
    }

    #[test]
    fn invalid_parameters_are_rejected_at_construction() {
        let mut params = ParameterSet::default();
        params.beta = -0.1;
        assert!(PhaseModel::new(params).is_err());
    }
}
