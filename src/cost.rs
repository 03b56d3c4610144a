use crate::propagate::{check_rollout, pullback};
use crate::{Control, ControlMatrix, Dynamics, Error, Result, State, StateMatrix, CONTROL_DIM, STATE_DIM};

// 半正定値判定の許容誤差
const PSD_TOLERANCE: f64 = 1e-12;

/// Quadratic weights: `R` on control effort, `Q` on terminal state error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    r: ControlMatrix,
    q: StateMatrix,
}

impl Weights {
    pub fn new(r: ControlMatrix, q: StateMatrix) -> Result<Self> {
        if r.iter().chain(q.iter()).any(|w| !w.is_finite()) {
            return Err(Error::InvalidWeights {
                reason: "weights must be finite",
            });
        }
        if !is_positive_semidefinite(r) {
            return Err(Error::InvalidWeights {
                reason: "R must be positive semi-definite",
            });
        }
        if !is_positive_semidefinite(q) {
            return Err(Error::InvalidWeights {
                reason: "Q must be positive semi-definite",
            });
        }
        Ok(Self { r, q })
    }

    /// Row-major slices of `R` (iu×iu) and `Q` (ix×ix).
    pub fn from_row_slices(r: &[f64], q: &[f64]) -> Result<Self> {
        if r.len() != CONTROL_DIM * CONTROL_DIM {
            return Err(Error::DimensionMismatch {
                what: "R",
                expected: CONTROL_DIM * CONTROL_DIM,
                found: r.len(),
            });
        }
        if q.len() != STATE_DIM * STATE_DIM {
            return Err(Error::DimensionMismatch {
                what: "Q",
                expected: STATE_DIM * STATE_DIM,
                found: q.len(),
            });
        }
        Self::new(ControlMatrix::from_row_slice(r), StateMatrix::from_row_slice(q))
    }

    /// `Σ w·|u|²` energy penalty folded into `R = w·I`.
    pub fn with_energy_weight(self, weight: f64) -> Result<Self> {
        Self::new(ControlMatrix::identity() * weight, self.q)
    }

    pub fn r(&self) -> &ControlMatrix {
        &self.r
    }

    pub fn q(&self) -> &StateMatrix {
        &self.q
    }
}

// 対称部分 + εI がコレスキー分解できれば半正定値とみなす
fn is_positive_semidefinite<const D: usize>(m: na::SMatrix<f64, D, D>) -> bool {
    let sym = (m + m.transpose()) / 2.0;
    let shifted = sym + na::SMatrix::<f64, D, D>::identity() * PSD_TOLERANCE;
    na::Cholesky::new(shifted).is_some()
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            r: ControlMatrix::identity(),
            q: StateMatrix::identity(),
        }
    }
}

pub fn control_cost(controls: &[Control], weights: &Weights) -> f64 {
    controls
        .iter()
        .map(|u| (u.transpose() * weights.r * u)[0])
        .sum()
}

pub fn terminal_cost(states: &[State], x_f: &State, weights: &Weights) -> f64 {
    let Some(last) = states.last() else {
        return 0.0;
    };
    let e = last - x_f;
    (e.transpose() * weights.q * e)[0]
}

/// `J = Σ uᵀRu + (x_N - x_f)ᵀ Q (x_N - x_f)`
pub fn cost(states: &[State], controls: &[Control], x_f: &State, weights: &Weights) -> f64 {
    control_cost(controls, weights) + terminal_cost(states, x_f, weights)
}

/// Gradient of [`cost`] with respect to the flattened controls, through the
/// dynamics that produced `states`.
pub fn gradient<D: Dynamics>(
    model: &D,
    states: &[State],
    controls: &[Control],
    dt: f64,
    x_f: &State,
    weights: &Weights,
    grad: &mut [f64],
) -> Result<()> {
    check_rollout(states, controls, grad)?;
    let last = controls.len();
    let e = states[last] - x_f;
    let terminal = (weights.q + weights.q.transpose()) * e;
    pullback(
        model,
        states,
        controls,
        dt,
        |k| if k == last { terminal } else { State::zeros() },
        grad,
    )?;

    let r_sym = weights.r + weights.r.transpose();
    for (g, u) in grad.chunks_exact_mut(CONTROL_DIM).zip(controls) {
        let du = r_sym * u;
        for (gi, di) in g.iter_mut().zip(du.iter()) {
            *gi += di;
        }
    }
    Ok(())
}
