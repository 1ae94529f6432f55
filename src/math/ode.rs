//! Adaptive Dormand–Prince 5(4) integrator for systems of ODEs.
//! State and derivative are represented as `&[f64]` / `&mut [f64]`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const STAGES: usize = 7;

// Dormand–Prince Butcher tableau.
const C: [f64; STAGES] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A: [[f64; 6]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];
// 5th-order solution weights; the 7th stage is the FSAL evaluation at y_new.
const B: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
// Difference between the 5th- and embedded 4th-order weights.
const E: [f64; STAGES] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Tuning knobs for [`integrate`]. The cancellation flag is additive: left
/// unset, behavior matches the plain solver.
#[derive(Debug, Clone)]
pub struct OdeOptions {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for OdeOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
            max_steps: 100_000,
            cancel: None,
        }
    }
}

/// Regularly sampled solution: `y[i]` is the state vector at `t[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub y: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Why an integration could not be completed. Solver faults are returned,
/// never panicked, so a caller can retry with other tolerances or inputs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("integration span must satisfy t1 > t0 (got {t0} .. {t1})")]
    EmptySpan { t0: f64, t1: f64 },
    #[error("at least two sample points are required (got {samples})")]
    TooFewSamples { samples: usize },
    #[error("step budget of {max_steps} exhausted at t = {t}")]
    StepBudgetExhausted { t: f64, max_steps: usize },
    #[error("step size underflow at t = {t}; requested tolerance cannot be met")]
    StepSizeUnderflow { t: f64 },
    #[error("state became non-finite at t = {t}; the rate function produced NaN or infinity")]
    NonFiniteState { t: f64 },
    #[error("integration cancelled at t = {t}")]
    Cancelled { t: f64 },
}

/// Integrate `dy/dt = f(t, y)` over `[t0, t1]`, sampling the solution at
/// `samples` equally spaced points (the first sample is `y0` at `t0`).
///
/// Steps are chosen adaptively from the embedded error estimate and clipped
/// so that every sample time is hit exactly. Faults inside the rate function
/// surface here as [`IntegrationError::NonFiniteState`].
pub fn integrate<F>(
    mut f: F,
    y0: &[f64],
    t_span: (f64, f64),
    samples: usize,
    opts: &OdeOptions,
) -> Result<Trajectory, IntegrationError>
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let (t0, t1) = t_span;
    if !(t1 > t0) {
        return Err(IntegrationError::EmptySpan { t0, t1 });
    }
    if samples < 2 {
        return Err(IntegrationError::TooFewSamples { samples });
    }

    let n = y0.len();
    let mut t = t0;
    let mut y = y0.to_vec();

    let mut out_t = Vec::with_capacity(samples);
    let mut out_y = Vec::with_capacity(samples);
    out_t.push(t);
    out_y.push(y.clone());

    let dt_sample = (t1 - t0) / (samples - 1) as f64;
    let mut h = (t1 - t0) / 100.0;
    let mut steps = 0usize;

    let mut k = vec![vec![0.0; n]; STAGES];
    let mut y_stage = vec![0.0; n];
    let mut y_new = vec![0.0; n];

    for s in 1..samples {
        let t_target = if s == samples - 1 {
            t1
        } else {
            t0 + s as f64 * dt_sample
        };

        while t < t_target {
            if let Some(flag) = &opts.cancel {
                if flag.load(Ordering::Relaxed) {
                    return Err(IntegrationError::Cancelled { t });
                }
            }
            steps += 1;
            if steps > opts.max_steps {
                return Err(IntegrationError::StepBudgetExhausted {
                    t,
                    max_steps: opts.max_steps,
                });
            }

            let h_min = 10.0 * f64::EPSILON * t.abs().max(1.0);
            let clipped = h >= t_target - t;
            let h_step = if clipped { t_target - t } else { h };

            // Stage evaluations.
            f(t, &y, &mut k[0]);
            for stage in 1..STAGES {
                for i in 0..n {
                    let mut acc = 0.0;
                    for (j, kj) in k.iter().enumerate().take(stage) {
                        acc += A[stage][j] * kj[i];
                    }
                    y_stage[i] = y[i] + h_step * acc;
                }
                // the last stage is evaluated at the candidate y_new
                f(t + C[stage] * h_step, &y_stage, &mut k[stage]);
            }

            for i in 0..n {
                let mut acc = 0.0;
                for (j, kj) in k.iter().enumerate() {
                    acc += B[j] * kj[i];
                }
                y_new[i] = y[i] + h_step * acc;
            }

            // Scaled RMS error of the embedded 4th-order difference.
            let mut err_sq = 0.0;
            for i in 0..n {
                let mut e = 0.0;
                for (j, kj) in k.iter().enumerate() {
                    e += E[j] * kj[i];
                }
                e *= h_step;
                let scale = opts.atol + opts.rtol * y[i].abs().max(y_new[i].abs());
                err_sq += (e / scale) * (e / scale);
            }
            let err_norm = (err_sq / n as f64).sqrt();

            if !err_norm.is_finite() {
                // NaN/inf escaped the rate function; shrink hard, and give up
                // once the step cannot shrink further.
                if h_step <= h_min {
                    return Err(IntegrationError::NonFiniteState { t });
                }
                h = (h_step * MIN_FACTOR).max(h_min);
                continue;
            }

            if err_norm <= 1.0 {
                t = if clipped { t_target } else { t + h_step };
                std::mem::swap(&mut y, &mut y_new);
                let factor = if err_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                let h_next = h_step * factor;
                // a clipped step must not shrink the working step size
                h = if clipped { h.max(h_next) } else { h_next };
            } else {
                if h_step <= h_min {
                    return Err(IntegrationError::StepSizeUnderflow { t });
                }
                let factor = (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, 1.0);
                h = (h_step * factor).max(h_min);
            }
        }

        out_t.push(t_target);
        out_y.push(y.clone());
    }

    Ok(Trajectory { t: out_t, y: out_y })
}
