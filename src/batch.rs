use rayon::prelude::*;

use crate::{Control, Dynamics, Problem, Result, Solution, TrajectoryOptimizer};

/// One independent planning request.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub problem: Problem,
    pub initial_guess: Vec<Control>,
}

impl Scenario {
    pub fn new(problem: Problem, initial_guess: Vec<Control>) -> Self {
        Self {
            problem,
            initial_guess,
        }
    }

    /// Starts from zero torque at every step.
    pub fn from_rest(problem: Problem) -> Self {
        let initial_guess = vec![Control::zeros(); problem.control_steps()];
        Self::new(problem, initial_guess)
    }
}

// 各シナリオは独立なので並列に解く
pub fn optimize_all<D>(
    optimizer: &TrajectoryOptimizer,
    model: &D,
    scenarios: &[Scenario],
) -> Vec<Result<Solution>>
where
    D: Dynamics + Sync,
{
    scenarios
        .par_iter()
        .map(|s| optimizer.optimize(model, &s.problem, &s.initial_guess))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CarDynamics, Error, SolverSettings, State};

    #[test]
    fn results_keep_scenario_order() {
        let optimizer = TrajectoryOptimizer::new(
            SolverSettings::default()
                .with_max_outer_iterations(15)
                .with_max_inner_iterations(500),
        )
        .unwrap();
        let model = CarDynamics::default();
        let base = Problem::reference().with_steps(11).with_horizon(1.1);
        let scenarios = vec![
            Scenario::from_rest(base.with_desired_final_state(State::new(0.0, 3.0))),
            // 10 ステップ * 0.1 s * 15 = 15 rad/s を超える
            Scenario::from_rest(base.with_desired_final_state(State::new(0.0, 20.0))),
            Scenario::new(base, vec![Control::zeros(); 3]),
        ];

        let results = optimize_all(&optimizer, &model, &scenarios);
        assert_eq!(results.len(), 3);
        let reached = results[0].as_ref().unwrap().trajectory.final_state().unwrap()[1];
        assert!((reached - 3.0).abs() < 1e-2);
        assert!(matches!(results[1], Err(Error::OptimizationFailure { .. })));
        assert!(matches!(results[2], Err(Error::DimensionMismatch { .. })));
    }
}
