use std::f64::consts::PI;

use crate::{Bounds, Error, Result, State, Weights};

/// One planning run: horizon discretization, boundary states, bounds and
/// weights. Immutable for the duration of a solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Problem {
    /// Number of states N; the plan holds N-1 controls.
    pub steps: usize,
    /// Total planned time; `dt = horizon / steps`.
    pub horizon: f64,
    pub initial_state: State,
    pub desired_final_state: State,
    pub bounds: Bounds,
    pub weights: Weights,
}

impl Problem {
    // 参照シナリオ: (0, 0) -> (pi/3, 5pi), N = 1000, tf = 100 s
    pub const REFERENCE_STEPS: usize = 1000;
    pub const REFERENCE_HORIZON: f64 = 100.0;

    pub fn reference() -> Self {
        Self {
            steps: Self::REFERENCE_STEPS,
            horizon: Self::REFERENCE_HORIZON,
            initial_state: State::zeros(),
            desired_final_state: State::new(PI / 3.0, 5.0 * PI),
            bounds: Bounds::reference(),
            weights: Weights::default(),
        }
    }

    pub fn with_steps(self, steps: usize) -> Self {
        Self { steps, ..self }
    }

    pub fn with_horizon(self, horizon: f64) -> Self {
        Self { horizon, ..self }
    }

    pub fn with_initial_state(self, initial_state: State) -> Self {
        Self {
            initial_state,
            ..self
        }
    }

    pub fn with_desired_final_state(self, desired_final_state: State) -> Self {
        Self {
            desired_final_state,
            ..self
        }
    }

    pub fn with_bounds(self, bounds: Bounds) -> Self {
        Self { bounds, ..self }
    }

    pub fn with_weights(self, weights: Weights) -> Self {
        Self { weights, ..self }
    }

    pub fn dt(&self) -> f64 {
        self.horizon / self.steps as f64
    }

    /// Number of control samples in a plan.
    pub fn control_steps(&self) -> usize {
        self.steps.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps < 2 {
            return Err(Error::InvalidConfig {
                reason: "steps must be at least 2",
            });
        }
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(Error::InvalidConfig {
                reason: "horizon must be finite and strictly positive",
            });
        }
        if self.initial_state.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig {
                reason: "initial state must be finite",
            });
        }
        if self.desired_final_state.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig {
                reason: "desired final state must be finite",
            });
        }
        Ok(())
    }
}
