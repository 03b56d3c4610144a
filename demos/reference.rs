use std::f64::consts::PI;

use log::LevelFilter;
use torque_planner::{CarDynamics, Control, Problem, State, TrajectoryOptimizer};

// cargo run --example reference --release

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()?;

    let model = CarDynamics::new(1.0)?;
    let optimizer = TrajectoryOptimizer::default();

    // 参照シナリオ: theta = 0 は不変なので pi/3 には到達できない
    let problem = Problem::reference();
    let guess = vec![Control::zeros(); problem.control_steps()];
    let now = std::time::Instant::now();
    match optimizer.optimize(&model, &problem, &guess) {
        Ok(s) => println!("unexpected success: final = {:?}", s.trajectory.final_state()),
        Err(e) => println!("reference scenario: {e}"),
    }
    println!("elapsed: {:.2} sec", now.elapsed().as_secs_f64());

    // 到達可能な目標 (0, 5pi)
    let problem = problem.with_desired_final_state(State::new(0.0, 5.0 * PI));
    let now = std::time::Instant::now();
    let solution = optimizer.optimize(&model, &problem, &guess)?;
    println!("elapsed: {:.2} sec", now.elapsed().as_secs_f64());

    let dt = problem.dt();
    let (states, controls) = solution.into_parts();
    for (k, x) in states.iter().enumerate().step_by(100) {
        let u = controls.get(k).map_or(f64::NAN, |u| u[0]);
        println!("t: {:6.2}, u: {:6.3}, x: [{:6.3}, {:7.3}]", k as f64 * dt, u, x[0], x[1]);
    }
    let x = states[states.len() - 1];
    println!("final: [{:.4}, {:.4}]", x[0], x[1]);

    Ok(())
}
