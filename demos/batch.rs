use log::LevelFilter;
use torque_planner::batch::{optimize_all, Scenario};
use torque_planner::restart::MultiStart;
use torque_planner::{CarDynamics, Control, Problem, State, TrajectoryOptimizer};

// cargo run --example batch --release

const N: usize = 200;
const T: f64 = 20.0;

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .init()?;

    let model = CarDynamics::new(1.0)?;
    let optimizer = TrajectoryOptimizer::default();
    let base = Problem::reference().with_steps(N).with_horizon(T);

    // 初期角度と目標角速度の組み合わせを並列に解く (角度は 2 倍に)
    let scenarios: Vec<Scenario> = [0.0, 0.01, 0.02]
        .iter()
        .flat_map(|&theta0| {
            [2.0, 5.0, 10.0].into_iter().map(move |omega_f| {
                Scenario::from_rest(
                    base.with_initial_state(State::new(theta0, 0.0))
                        .with_desired_final_state(State::new(2.0 * theta0, omega_f)),
                )
            })
        })
        .collect();

    let now = std::time::Instant::now();
    let results = optimize_all(&optimizer, &model, &scenarios);
    for (s, r) in scenarios.iter().zip(&results) {
        let x0 = s.problem.initial_state;
        let x_f = s.problem.desired_final_state;
        match r {
            Ok(sol) => {
                let x = sol.trajectory.final_state().copied().unwrap_or(x0);
                println!(
                    "({:5.2},{:5.2}) -> ({:5.2},{:5.2}): cost {:9.4}, final ({:6.3},{:6.3})",
                    x0[0], x0[1], x_f[0], x_f[1], sol.cost, x[0], x[1]
                );
            }
            Err(e) => println!(
                "({:5.2},{:5.2}) -> ({:5.2},{:5.2}): {e}",
                x0[0], x0[1], x_f[0], x_f[1]
            ),
        }
    }
    println!("elapsed: {:.2} sec", now.elapsed().as_secs_f64());

    let problem = base
        .with_initial_state(State::new(0.05, 0.0))
        .with_desired_final_state(State::new(0.3, 4.0));
    let multi = MultiStart::new(8, 2.0, 0)?;
    let guess = vec![Control::new(0.5); problem.control_steps()];
    match multi.optimize(&optimizer, &model, &problem, &guess) {
        Ok(sol) => println!(
            "multi-start: cost {:.4}, final {:?}",
            sol.cost,
            sol.trajectory.final_state().map(|x| x.as_slice())
        ),
        Err(e) => println!("multi-start: {e}"),
    }

    Ok(())
}
