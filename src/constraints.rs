use std::f64::consts::PI;

use crate::{control_from_slice, state_from_slice, Control, Error, Result, State};

/// How the state box is treated by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateBoundMode {
    /// Every propagated state after the initial one is a solver constraint.
    #[default]
    Enforced,
    /// The solver only sees the control box; states are checked after the solve.
    PostHoc,
}

/// Inclusive box bounds on state and control samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    state_min: State,
    state_max: State,
    control_min: Control,
    control_max: Control,
}

impl Bounds {
    pub fn new(
        state_min: State,
        state_max: State,
        control_min: Control,
        control_max: Control,
    ) -> Result<Self> {
        check_box("state", state_min.as_slice(), state_max.as_slice())?;
        check_box("control", control_min.as_slice(), control_max.as_slice())?;
        Ok(Self {
            state_min,
            state_max,
            control_min,
            control_max,
        })
    }

    pub fn from_slices(
        state_min: &[f64],
        state_max: &[f64],
        control_min: &[f64],
        control_max: &[f64],
    ) -> Result<Self> {
        Self::new(
            state_from_slice(state_min)?,
            state_from_slice(state_max)?,
            control_from_slice(control_min)?,
            control_from_slice(control_max)?,
        )
    }

    // theta: [-pi/2, pi/2], omega: [-7pi, 7pi], u: [0, 15]
    pub fn reference() -> Self {
        Self {
            state_min: State::new(-PI / 2.0, -7.0 * PI),
            state_max: State::new(PI / 2.0, 7.0 * PI),
            control_min: Control::new(0.0),
            control_max: Control::new(15.0),
        }
    }

    pub fn state_in_bounds(&self, x: &State) -> bool {
        within(x.as_slice(), self.state_min.as_slice(), self.state_max.as_slice())
    }

    pub fn control_in_bounds(&self, u: &Control) -> bool {
        within(u.as_slice(), self.control_min.as_slice(), self.control_max.as_slice())
    }

    pub fn clamp_control(&self, u: &Control) -> Control {
        u.zip_zip_map(&self.control_min, &self.control_max, |v, lo, hi| v.clamp(lo, hi))
    }

    pub fn state_min(&self) -> &State {
        &self.state_min
    }

    pub fn state_max(&self) -> &State {
        &self.state_max
    }

    pub fn control_min(&self) -> &Control {
        &self.control_min
    }

    pub fn control_max(&self) -> &Control {
        &self.control_max
    }
}

fn within(v: &[f64], lo: &[f64], hi: &[f64]) -> bool {
    v.iter()
        .zip(lo.iter().zip(hi))
        .all(|(v, (lo, hi))| lo <= v && v <= hi)
}

fn check_box(what: &str, lo: &[f64], hi: &[f64]) -> Result<()> {
    for (i, (lo, hi)) in lo.iter().zip(hi).enumerate() {
        if lo.is_nan() || hi.is_nan() {
            return Err(Error::InvalidBounds {
                reason: format!("{what} bound {i} is NaN"),
            });
        }
        if lo > hi {
            return Err(Error::InvalidBounds {
                reason: format!("{what} bound {i}: min {lo} exceeds max {hi}"),
            });
        }
    }
    Ok(())
}
