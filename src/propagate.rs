use crate::{Control, Dynamics, Error, Result, State, CONTROL_DIM};

/// Rolls the dynamics forward from `x0`.
///
/// `N-1` controls produce `N` states; `states[0]` is `x0` itself and every
/// control moves the trajectory one step.
pub fn propagate<D: Dynamics>(model: &D, x0: &State, controls: &[Control], dt: f64) -> Vec<State> {
    let mut states = Vec::with_capacity(controls.len() + 1);
    states.push(*x0);
    for u in controls {
        // 状態の更新
        let x = model.step(&states[states.len() - 1], u, dt);
        states.push(x);
    }
    states
}

/// Checks that `states` and `grad` fit a rollout of `controls`.
pub fn check_rollout(states: &[State], controls: &[Control], grad: &[f64]) -> Result<()> {
    if states.len() != controls.len() + 1 {
        return Err(Error::DimensionMismatch {
            what: "states",
            expected: controls.len() + 1,
            found: states.len(),
        });
    }
    if grad.len() != controls.len() * CONTROL_DIM {
        return Err(Error::DimensionMismatch {
            what: "gradient",
            expected: controls.len() * CONTROL_DIM,
            found: grad.len(),
        });
    }
    Ok(())
}

/// Reverse-mode sweep through a rollout.
///
/// `cotangent(k)` is the sensitivity of a scalar quantity with respect to
/// `states[k]` for `k >= 1` (the initial state is fixed). Writes the
/// sensitivity with respect to every control into `grad`, laid out like the
/// flattened control sequence.
pub fn pullback<D, F>(
    model: &D,
    states: &[State],
    controls: &[Control],
    dt: f64,
    mut cotangent: F,
    grad: &mut [f64],
) -> Result<()>
where
    D: Dynamics,
    F: FnMut(usize) -> State,
{
    check_rollout(states, controls, grad)?;

    let last = controls.len();
    if last == 0 {
        return Ok(());
    }
    // 終端から随伴変数を逆伝播
    let mut lambda = cotangent(last);
    for k in (0..last).rev() {
        let (a, b) = model.step_jacobians(&states[k], &controls[k], dt);
        let g = b.transpose() * lambda;
        grad[k * CONTROL_DIM..(k + 1) * CONTROL_DIM].copy_from_slice(g.as_slice());
        if k > 0 {
            lambda = a.transpose() * lambda + cotangent(k);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CarDynamics;
    use approx::assert_relative_eq;

    fn ramp(n: usize) -> Vec<Control> {
        (0..n).map(|i| Control::new(0.5 + 0.1 * i as f64)).collect()
    }

    #[test]
    fn states_are_one_longer_than_controls() {
        let model = CarDynamics::default();
        let x0 = State::new(0.1, -0.2);
        for n in [0, 1, 7, 100] {
            let states = propagate(&model, &x0, &ramp(n), 0.1);
            assert_eq!(states.len(), n + 1);
            assert_eq!(states[0], x0);
        }
    }

    #[test]
    fn consecutive_states_follow_the_step() {
        let model = CarDynamics::new(2.0).unwrap();
        let x0 = State::new(0.3, 0.0);
        let controls = ramp(12);
        let states = propagate(&model, &x0, &controls, 0.05);
        for (k, u) in controls.iter().enumerate() {
            assert_eq!(states[k + 1], model.step(&states[k], u, 0.05));
        }
    }

    #[test]
    fn zero_angle_stays_zero() {
        let model = CarDynamics::default();
        let states = propagate(&model, &State::zeros(), &ramp(50), 0.1);
        assert!(states.iter().all(|x| x[0] == 0.0));
        assert!(states[50][1] > 0.0);
    }

    #[test]
    fn pullback_matches_finite_differences() {
        let model = CarDynamics::new(1.3).unwrap();
        let x0 = State::new(0.2, 0.4);
        let controls = ramp(6);
        let dt = 0.1;
        let w = State::new(1.7, -0.6);
        // 終端状態と中間状態の線形結合
        let probe = |states: &[State]| w.dot(&states[6]) + 0.3 * states[3][0];

        let states = propagate(&model, &x0, &controls, dt);
        let mut grad = vec![0.0; 6];
        pullback(
            &model,
            &states,
            &controls,
            dt,
            |k| match k {
                6 => w,
                3 => State::new(0.3, 0.0),
                _ => State::zeros(),
            },
            &mut grad,
        )
        .unwrap();

        let h = 1e-6;
        for k in 0..6 {
            let mut up = controls.clone();
            let mut down = controls.clone();
            up[k][0] += h;
            down[k][0] -= h;
            let fd = (probe(&propagate(&model, &x0, &up, dt))
                - probe(&propagate(&model, &x0, &down, dt)))
                / (2.0 * h);
            assert_relative_eq!(grad[k], fd, epsilon = 1e-7, max_relative = 1e-6);
        }
    }

    #[test]
    fn pullback_of_empty_rollout_is_a_no_op() {
        let model = CarDynamics::default();
        let states = propagate(&model, &State::zeros(), &[], 0.1);
        let mut grad: Vec<f64> = vec![];
        pullback(&model, &states, &[], 0.1, |_| State::zeros(), &mut grad).unwrap();
        assert!(grad.is_empty());
    }

    #[test]
    fn mismatched_rollout_is_rejected() {
        let model = CarDynamics::default();
        let controls = ramp(3);
        let states = propagate(&model, &State::zeros(), &controls, 0.1);
        let mut grad = vec![0.0; 3];

        assert_eq!(
            pullback(&model, &[], &controls, 0.1, |_| State::zeros(), &mut grad),
            Err(Error::DimensionMismatch {
                what: "states",
                expected: 4,
                found: 0
            })
        );
        assert_eq!(
            pullback(&model, &states, &controls, 0.1, |_| State::zeros(), &mut grad[..2]),
            Err(Error::DimensionMismatch {
                what: "gradient",
                expected: 3,
                found: 2
            })
        );
    }
}
