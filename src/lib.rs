extern crate nalgebra as na;

pub mod batch;
pub mod constraints;
pub mod cost;
pub mod dynamics;
pub mod error;
pub mod optimizer;
pub mod problem;
pub mod propagate;
pub mod restart;

pub use constraints::{Bounds, StateBoundMode};
pub use cost::Weights;
pub use dynamics::{CarDynamics, Dynamics};
pub use error::{Error, Result};
pub use optimizer::{Solution, SolverSettings, Trajectory, TrajectoryOptimizer};
pub use problem::Problem;

// 状態空間の次元 (theta, omega)
pub const STATE_DIM: usize = 2;
// 入力の次元 (torque)
pub const CONTROL_DIM: usize = 1;

pub type State = na::SVector<f64, STATE_DIM>;
pub type Control = na::SVector<f64, CONTROL_DIM>;
pub type StateMatrix = na::SMatrix<f64, STATE_DIM, STATE_DIM>;
pub type ControlMatrix = na::SMatrix<f64, CONTROL_DIM, CONTROL_DIM>;
pub type InputMatrix = na::SMatrix<f64, STATE_DIM, CONTROL_DIM>;

/// Builds a state from a runtime slice, checking its length.
pub fn state_from_slice(values: &[f64]) -> Result<State> {
    if values.len() != STATE_DIM {
        return Err(Error::DimensionMismatch {
            what: "state",
            expected: STATE_DIM,
            found: values.len(),
        });
    }
    Ok(State::from_column_slice(values))
}

/// Builds a control sample from a runtime slice, checking its length.
pub fn control_from_slice(values: &[f64]) -> Result<Control> {
    if values.len() != CONTROL_DIM {
        return Err(Error::DimensionMismatch {
            what: "control",
            expected: CONTROL_DIM,
            found: values.len(),
        });
    }
    Ok(Control::from_column_slice(values))
}

// 入力列を一次元に展開
pub fn flatten(controls: &[Control]) -> Vec<f64> {
    controls.iter().flat_map(|u| u.iter().copied()).collect()
}

// 一次元ベクトルを入力列に戻す
pub fn unflatten(u: &[f64]) -> Vec<Control> {
    u.chunks_exact(CONTROL_DIM)
        .map(Control::from_column_slice)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_with_wrong_length_are_rejected() {
        assert!(state_from_slice(&[0.0, 1.0]).is_ok());
        assert_eq!(
            state_from_slice(&[0.0]),
            Err(Error::DimensionMismatch {
                what: "state",
                expected: 2,
                found: 1
            })
        );
        assert!(control_from_slice(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn flatten_and_unflatten_agree() {
        let controls = vec![Control::new(1.0), Control::new(-2.5), Control::new(3.0)];
        let flat = flatten(&controls);
        assert_eq!(flat, vec![1.0, -2.5, 3.0]);
        assert_eq!(unflatten(&flat), controls);
    }
}
