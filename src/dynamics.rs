use crate::{Control, Error, InputMatrix, Result, State, StateMatrix};

/// Continuous-time dynamics discretized with forward Euler.
pub trait Dynamics {
    fn derivative(&self, x: &State, u: &Control) -> State;

    /// Jacobians of `derivative` with respect to the state and the control.
    fn derivative_jacobians(&self, x: &State, u: &Control) -> (StateMatrix, InputMatrix);

    fn step(&self, x: &State, u: &Control, dt: f64) -> State {
        x + dt * self.derivative(x, u)
    }

    fn step_jacobians(&self, x: &State, u: &Control, dt: f64) -> (StateMatrix, InputMatrix) {
        let (fx, fu) = self.derivative_jacobians(x, u);
        (StateMatrix::identity() + dt * fx, dt * fu)
    }
}

// 系ダイナミクス: theta_dot = 0.5 * omega * theta, omega_dot = u / m
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarDynamics {
    mass: f64,
}

impl CarDynamics {
    pub fn new(mass: f64) -> Result<Self> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidModel {
                reason: "mass must be finite and strictly positive",
            });
        }
        Ok(Self { mass })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }
}

impl Default for CarDynamics {
    fn default() -> Self {
        Self { mass: 1.0 }
    }
}

impl Dynamics for CarDynamics {
    fn derivative(&self, x: &State, u: &Control) -> State {
        let (theta, omega) = (x[0], x[1]);
        State::new(0.5 * omega * theta, u[0] / self.mass)
    }

    fn derivative_jacobians(&self, x: &State, _u: &Control) -> (StateMatrix, InputMatrix) {
        let (theta, omega) = (x[0], x[1]);
        let fx = na::matrix![
            0.5 * omega, 0.5 * theta;
            0.0, 0.0
        ];
        let fu = na::matrix![
            0.0;
            1.0 / self.mass
        ];
        (fx, fu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn non_positive_mass_is_rejected() {
        assert!(CarDynamics::new(0.0).is_err());
        assert!(CarDynamics::new(-1.0).is_err());
        assert!(CarDynamics::new(f64::NAN).is_err());
        assert!(CarDynamics::new(f64::INFINITY).is_err());
        assert_eq!(CarDynamics::new(2.0).map(|m| m.mass()), Ok(2.0));
    }

    #[test]
    fn derivative_couples_angle_and_rate() {
        let model = CarDynamics::new(2.0).unwrap();
        let dx = model.derivative(&State::new(0.4, 3.0), &Control::new(5.0));
        assert_relative_eq!(dx[0], 0.6, epsilon = 1e-12);
        assert_relative_eq!(dx[1], 2.5);
    }

    #[test]
    fn step_is_forward_euler_and_deterministic() {
        let model = CarDynamics::default();
        let x = State::new(0.2, -1.5);
        let u = Control::new(4.0);
        let first = model.step(&x, &u, 0.1);
        assert_eq!(first, model.step(&x, &u, 0.1));
        assert_relative_eq!(first[0], 0.2 - 0.015, epsilon = 1e-12);
        assert_relative_eq!(first[1], -1.1, epsilon = 1e-12);
    }

    #[test]
    fn zero_angle_and_zero_torque_is_a_fixed_point() {
        let model = CarDynamics::default();
        let x = State::new(0.0, 3.7);
        let next = model.step(&x, &Control::zeros(), 0.1);
        assert_eq!(next, x);
    }

    #[test]
    fn step_jacobians_match_finite_differences() {
        let model = CarDynamics::new(1.5).unwrap();
        let x = State::new(0.3, 2.0);
        let u = Control::new(1.2);
        let dt = 0.05;
        let (a, b) = model.step_jacobians(&x, &u, dt);
        let h = 1e-6;
        for j in 0..2 {
            let mut xp = x;
            let mut xm = x;
            xp[j] += h;
            xm[j] -= h;
            let col = (model.step(&xp, &u, dt) - model.step(&xm, &u, dt)) / (2.0 * h);
            for i in 0..2 {
                assert_relative_eq!(a[(i, j)], col[i], epsilon = 1e-8);
            }
        }
        let up = u.add_scalar(h);
        let um = u.add_scalar(-h);
        let col = (model.step(&x, &up, dt) - model.step(&x, &um, dt)) / (2.0 * h);
        assert_relative_eq!(b[(0, 0)], col[0], epsilon = 1e-8);
        assert_relative_eq!(b[(1, 0)], col[1], epsilon = 1e-8);
    }
}
