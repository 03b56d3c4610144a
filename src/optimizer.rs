use std::time::Duration;

use log::{debug, info, warn};
use optimization_engine::{alm::*, constraints::*, core::ExitStatus, panoc::*, SolverError};

use crate::propagate::{propagate, pullback};
use crate::{
    cost, flatten, unflatten, Bounds, Control, Dynamics, Error, Problem, Result, State,
    StateBoundMode, Weights, STATE_DIM,
};

// ラグランジュ乗数の許容範囲
const LAGRANGE_BOUND: f64 = 1e12;

type SolverResult = std::result::Result<(), SolverError>;

/// Settings of the augmented Lagrangian solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Inner (PANOC) fixed-point residual tolerance.
    pub tolerance: f64,
    /// Allowed constraint infeasibility at convergence.
    pub constraint_tolerance: f64,
    /// Half-width of the box the final state must land in around the target.
    pub terminal_tolerance: f64,
    pub initial_inner_tolerance: f64,
    pub lbfgs_memory: usize,
    pub max_outer_iterations: usize,
    pub max_inner_iterations: usize,
    pub max_duration: Option<Duration>,
    pub initial_penalty: f64,
    pub penalty_update_factor: f64,
    pub state_bounds: StateBoundMode,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            constraint_tolerance: 1e-4,
            terminal_tolerance: 1e-3,
            initial_inner_tolerance: 1e-2,
            lbfgs_memory: 20,
            max_outer_iterations: 40,
            max_inner_iterations: 2000,
            max_duration: None,
            initial_penalty: 10.0,
            penalty_update_factor: 5.0,
            state_bounds: StateBoundMode::Enforced,
        }
    }
}

impl SolverSettings {
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    pub fn with_constraint_tolerance(self, constraint_tolerance: f64) -> Self {
        Self {
            constraint_tolerance,
            ..self
        }
    }

    pub fn with_terminal_tolerance(self, terminal_tolerance: f64) -> Self {
        Self {
            terminal_tolerance,
            ..self
        }
    }

    pub fn with_max_outer_iterations(self, max_outer_iterations: usize) -> Self {
        Self {
            max_outer_iterations,
            ..self
        }
    }

    pub fn with_max_inner_iterations(self, max_inner_iterations: usize) -> Self {
        Self {
            max_inner_iterations,
            ..self
        }
    }

    pub fn with_max_duration(self, max_duration: Duration) -> Self {
        Self {
            max_duration: Some(max_duration),
            ..self
        }
    }

    pub fn with_state_bounds(self, state_bounds: StateBoundMode) -> Self {
        Self {
            state_bounds,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.tolerance) {
            return Err(Error::InvalidConfig {
                reason: "tolerance must be finite and strictly positive",
            });
        }
        if !positive(self.constraint_tolerance) {
            return Err(Error::InvalidConfig {
                reason: "constraint_tolerance must be finite and strictly positive",
            });
        }
        if !self.terminal_tolerance.is_finite() || self.terminal_tolerance < 0.0 {
            return Err(Error::InvalidConfig {
                reason: "terminal_tolerance must be finite and non-negative",
            });
        }
        if !positive(self.initial_inner_tolerance) || self.initial_inner_tolerance < self.tolerance
        {
            return Err(Error::InvalidConfig {
                reason: "initial_inner_tolerance must be at least tolerance",
            });
        }
        if self.lbfgs_memory == 0 {
            return Err(Error::InvalidConfig {
                reason: "lbfgs_memory must be at least 1",
            });
        }
        if self.max_outer_iterations == 0 || self.max_inner_iterations == 0 {
            return Err(Error::InvalidConfig {
                reason: "iteration limits must be at least 1",
            });
        }
        if !positive(self.initial_penalty) {
            return Err(Error::InvalidConfig {
                reason: "initial_penalty must be finite and strictly positive",
            });
        }
        if !self.penalty_update_factor.is_finite() || self.penalty_update_factor <= 1.0 {
            return Err(Error::InvalidConfig {
                reason: "penalty_update_factor must be greater than 1",
            });
        }
        Ok(())
    }
}

/// N states and the N-1 controls that produce them.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub states: Vec<State>,
    pub controls: Vec<Control>,
}

impl Trajectory {
    pub fn final_state(&self) -> Option<&State> {
        self.states.last()
    }

    /// Time indices of states outside `bounds`.
    pub fn state_violations(&self, bounds: &Bounds) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, x)| !bounds.state_in_bounds(x))
            .map(|(k, _)| k)
            .collect()
    }

    /// Time indices of controls outside `bounds`.
    pub fn control_violations(&self, bounds: &Bounds) -> Vec<usize> {
        self.controls
            .iter()
            .enumerate()
            .filter(|(_, u)| !bounds.control_in_bounds(u))
            .map(|(k, _)| k)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub trajectory: Trajectory,
    /// Cost of the returned trajectory, without penalty terms.
    pub cost: f64,
    pub outer_iterations: usize,
    pub inner_iterations: usize,
    /// Time indices of states outside the state box. With
    /// [`StateBoundMode::Enforced`] any such state is within the constraint
    /// tolerance of the box.
    pub state_violations: Vec<usize>,
}

impl Solution {
    pub fn into_parts(self) -> (Vec<State>, Vec<Control>) {
        (self.trajectory.states, self.trajectory.controls)
    }
}

// 最適化問題の評価器: 入力列 -> 状態列 -> コスト/制約
struct Rollout<'a, D> {
    model: &'a D,
    x0: State,
    x_f: State,
    dt: f64,
    weights: Weights,
    enforce_states: bool,
}

impl<D: Dynamics> Rollout<'_, D> {
    fn rollout(&self, u: &[f64]) -> (Vec<Control>, Vec<State>) {
        let controls = unflatten(u);
        let states = propagate(self.model, &self.x0, &controls, self.dt);
        (controls, states)
    }

    fn cost(&self, u: &[f64], c: &mut f64) -> SolverResult {
        let (controls, states) = self.rollout(u);
        *c = cost::cost(&states, &controls, &self.x_f, &self.weights);
        if c.is_finite() {
            Ok(())
        } else {
            Err(SolverError::Cost)
        }
    }

    fn gradient(&self, u: &[f64], grad: &mut [f64]) -> SolverResult {
        let (controls, states) = self.rollout(u);
        cost::gradient(
            self.model,
            &states,
            &controls,
            self.dt,
            &self.x_f,
            &self.weights,
            grad,
        )
        .map_err(|_| SolverError::Cost)?;
        if grad.iter().all(|g| g.is_finite()) {
            Ok(())
        } else {
            Err(SolverError::Cost)
        }
    }

    // F1(u) = [x_{N-1} - x_f, x_1, ..., x_{N-1}]; x_k は STATE_DIM * k から
    fn constraint_dim(&self, steps: usize) -> usize {
        if self.enforce_states {
            STATE_DIM * steps
        } else {
            STATE_DIM
        }
    }

    fn constraints(&self, u: &[f64], out: &mut [f64]) -> SolverResult {
        let (controls, states) = self.rollout(u);
        let last = controls.len();
        out[..STATE_DIM].copy_from_slice((states[last] - self.x_f).as_slice());
        if self.enforce_states {
            for (k, x) in states.iter().enumerate().skip(1) {
                out[STATE_DIM * k..STATE_DIM * (k + 1)].copy_from_slice(x.as_slice());
            }
        }
        Ok(())
    }

    fn constraints_pullback(
        &self,
        u: &[f64],
        d: &[f64],
        out: &mut [f64],
    ) -> SolverResult {
        let (controls, states) = self.rollout(u);
        let last = controls.len();
        pullback(
            self.model,
            &states,
            &controls,
            self.dt,
            |k| {
                let mut c = State::zeros();
                if self.enforce_states {
                    c += State::from_column_slice(&d[STATE_DIM * k..STATE_DIM * (k + 1)]);
                }
                if k == last {
                    c += State::from_column_slice(&d[..STATE_DIM]);
                }
                c
            },
            out,
        )
        .map_err(|_| SolverError::Cost)
    }

    fn constraint_box(&self, steps: usize, bounds: &Bounds, tol: f64) -> (Vec<f64>, Vec<f64>) {
        let n1 = self.constraint_dim(steps);
        let mut lo = Vec::with_capacity(n1);
        let mut hi = Vec::with_capacity(n1);
        lo.extend(std::iter::repeat(-tol).take(STATE_DIM));
        hi.extend(std::iter::repeat(tol).take(STATE_DIM));
        if self.enforce_states {
            for _ in 1..steps {
                lo.extend(bounds.state_min().iter());
                hi.extend(bounds.state_max().iter());
            }
        }
        (lo, hi)
    }
}

/// Constrained trajectory optimizer. Holds only settings; every call to
/// [`TrajectoryOptimizer::optimize`] is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrajectoryOptimizer {
    settings: SolverSettings,
}

impl TrajectoryOptimizer {
    pub fn new(settings: SolverSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn optimize<D: Dynamics>(
        &self,
        model: &D,
        problem: &Problem,
        initial_guess: &[Control],
    ) -> Result<Solution> {
        problem.validate()?;
        let nu = problem.control_steps();
        if initial_guess.len() != nu {
            return Err(Error::DimensionMismatch {
                what: "initial control guess",
                expected: nu,
                found: initial_guess.len(),
            });
        }
        if initial_guess.iter().flat_map(|u| u.iter()).any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig {
                reason: "initial control guess must be finite",
            });
        }

        let settings = &self.settings;
        let bounds = &problem.bounds;
        let rollout = Rollout {
            model,
            x0: problem.initial_state,
            x_f: problem.desired_final_state,
            dt: problem.dt(),
            weights: problem.weights,
            enforce_states: settings.state_bounds == StateBoundMode::Enforced,
        };
        let rollout = &rollout;

        // 入力制約 (ボックス) は射影で扱う
        let guess: Vec<Control> = initial_guess.iter().map(|u| bounds.clamp_control(u)).collect();
        let mut u = flatten(&guess);
        let umin = flatten(&vec![*bounds.control_min(); nu]);
        let umax = flatten(&vec![*bounds.control_max(); nu]);
        let control_box = Rectangle::new(Some(&umin), Some(&umax));

        // 終端条件と状態制約は ALM で扱う
        let n1 = rollout.constraint_dim(problem.steps);
        let (cmin, cmax) = rollout.constraint_box(problem.steps, bounds, settings.terminal_tolerance);
        let set_y = BallInf::new(None, LAGRANGE_BOUND);

        let f = |u: &[f64], c: &mut f64| -> SolverResult {
            rollout.cost(u, c)
        };
        let df = |u: &[f64], grad: &mut [f64]| -> SolverResult {
            rollout.gradient(u, grad)
        };
        let f1 = |u: &[f64], out: &mut [f64]| -> SolverResult {
            rollout.constraints(u, out)
        };
        let jf1 = |u: &[f64], d: &[f64], out: &mut [f64]| -> SolverResult {
            rollout.constraints_pullback(u, d, out)
        };

        let factory = AlmFactory::new(
            f,
            df,
            Some(f1),
            Some(jf1),
            NO_MAPPING,
            NO_JACOBIAN_MAPPING,
            Some(Rectangle::new(Some(&cmin), Some(&cmax))),
            0,
        );
        let alm_problem = AlmProblem::new(
            control_box,
            Some(Rectangle::new(Some(&cmin), Some(&cmax))),
            Some(set_y),
            |u: &[f64], xi: &[f64], c: &mut f64| -> SolverResult {
                factory.psi(u, xi, c)
            },
            |u: &[f64], xi: &[f64], grad: &mut [f64]| -> SolverResult {
                factory.d_psi(u, xi, grad)
            },
            Some(f1),
            NO_MAPPING,
            n1,
            0,
        );

        let panoc_cache = PANOCCache::new(u.len(), settings.tolerance, settings.lbfgs_memory);
        let mut alm_cache = AlmCache::new(panoc_cache, n1, 0);
        let mut alm = AlmOptimizer::new(&mut alm_cache, alm_problem)
            .with_epsilon_tolerance(settings.tolerance)
            .with_delta_tolerance(settings.constraint_tolerance)
            .with_initial_inner_tolerance(settings.initial_inner_tolerance)
            .with_max_outer_iterations(settings.max_outer_iterations)
            .with_max_inner_iterations(settings.max_inner_iterations)
            .with_initial_penalty(settings.initial_penalty)
            .with_penalty_update_factor(settings.penalty_update_factor);
        if let Some(max_duration) = settings.max_duration {
            alm = alm.with_max_duration(max_duration);
        }

        debug!(
            "solving: N = {}, dt = {}, {} controls, {} constraint rows",
            problem.steps,
            problem.dt(),
            u.len(),
            n1
        );
        let status = alm.solve(&mut u).map_err(|e| {
            warn!("solver error: {e:?}");
            Error::OptimizationFailure {
                reason: format!("solver error: {e:?}"),
            }
        })?;
        if status.exit_status() != ExitStatus::Converged {
            warn!("solver did not converge: {:?}", status.exit_status());
            return Err(Error::OptimizationFailure {
                reason: format!(
                    "{:?} after {} outer / {} inner iterations",
                    status.exit_status(),
                    status.num_outer_iterations(),
                    status.num_inner_iterations()
                ),
            });
        }

        // 最終的な入力列から状態列を再計算
        let controls: Vec<Control> = unflatten(&u)
            .iter()
            .map(|u| bounds.clamp_control(u))
            .collect();
        let states = propagate(model, &problem.initial_state, &controls, problem.dt());
        let trajectory = Trajectory { states, controls };
        let cost = cost::cost(
            &trajectory.states,
            &trajectory.controls,
            &problem.desired_final_state,
            &problem.weights,
        );

        let state_violations = trajectory.state_violations(bounds);
        if !state_violations.is_empty() {
            warn!(
                "{} states outside bounds, first at step {}",
                state_violations.len(),
                state_violations[0]
            );
        }

        if let Some(x) = trajectory.final_state() {
            info!(
                "converged: cost = {:.6}, outer = {}, inner = {}, final = ({:.4}, {:.4})",
                cost,
                status.num_outer_iterations(),
                status.num_inner_iterations(),
                x[0],
                x[1]
            );
        }

        Ok(Solution {
            trajectory,
            cost,
            outer_iterations: status.num_outer_iterations(),
            inner_iterations: status.num_inner_iterations(),
            state_violations,
        })
    }
}
