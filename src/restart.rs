use log::{debug, warn};
use rand::prelude::*;
use rand_distr::Normal;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::{Control, Dynamics, Error, Problem, Result, Solution, TrajectoryOptimizer};

/// Restarts with randomly perturbed initial guesses.
///
/// Attempt 0 uses the guess as given, attempt `i > 0` adds Gaussian noise
/// drawn from a generator seeded with `seed + i`, clamped into the control
/// box. Attempts run in parallel; the lowest-cost success wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiStart {
    attempts: usize,
    std_dev: f64,
    seed: u64,
}

impl MultiStart {
    pub fn new(attempts: usize, std_dev: f64, seed: u64) -> Result<Self> {
        if attempts == 0 {
            return Err(Error::InvalidConfig {
                reason: "attempts must be at least 1",
            });
        }
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(Error::InvalidConfig {
                reason: "std_dev must be finite and non-negative",
            });
        }
        Ok(Self {
            attempts,
            std_dev,
            seed,
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    // 乱数で摂動した初期入力列
    pub fn perturbed_guess(&self, attempt: usize, problem: &Problem, guess: &[Control]) -> Vec<Control> {
        if attempt == 0 || self.std_dev == 0.0 {
            return guess.to_vec();
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed.wrapping_add(attempt as u64));
        let dist = match Normal::new(0.0, self.std_dev) {
            Ok(dist) => dist,
            Err(_) => return guess.to_vec(),
        };
        guess
            .iter()
            .map(|u| {
                let noisy = u.map(|v| v + dist.sample(&mut rng));
                problem.bounds.clamp_control(&noisy)
            })
            .collect()
    }

    pub fn optimize<D>(
        &self,
        optimizer: &TrajectoryOptimizer,
        model: &D,
        problem: &Problem,
        initial_guess: &[Control],
    ) -> Result<Solution>
    where
        D: Dynamics + Sync,
    {
        let results: Vec<Result<Solution>> = (0..self.attempts)
            .into_par_iter()
            .map(|i| {
                let guess = self.perturbed_guess(i, problem, initial_guess);
                optimizer.optimize(model, problem, &guess)
            })
            .collect();

        let mut best: Option<Solution> = None;
        let mut last_err = None;
        for (i, r) in results.into_iter().enumerate() {
            match r {
                Ok(s) => {
                    debug!("attempt {i}: cost = {:.6}", s.cost);
                    if best.as_ref().is_none_or(|b| s.cost < b.cost) {
                        best = Some(s);
                    }
                }
                Err(e) => {
                    debug!("attempt {i}: {e}");
                    last_err = Some(e);
                }
            }
        }

        match (best, last_err) {
            (Some(s), _) => Ok(s),
            (None, Some(e)) => {
                warn!("all {} attempts failed", self.attempts);
                Err(e)
            }
            (None, None) => Err(Error::InvalidConfig {
                reason: "attempts must be at least 1",
            }),
        }
    }
}
