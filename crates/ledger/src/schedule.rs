//! Schedules: on which steps a transaction is active.
//!
//! Schedules come in two families:
//! - **Discrete**: fixed step indices (once, periodic, an explicit list)
//! - **Probabilistic**: each step fires with a probability drawn from the
//!   trial's generator (one shared probability, or one per step)
//!
//! Probabilistic schedules consume exactly one draw per evaluated step, so
//! the generator's sequence depends only on ledger order and the step.

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use types::Step;

/// Classification of a schedule, mirroring how it decides to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fires at exactly one step.
    DiscreteOnce,
    /// Fires every K steps.
    DiscretePeriodic,
    /// Fires at an explicit list of steps.
    DiscreteAperiodic,
    /// Fires with one probability at every step.
    ProbabilisticPeriodic,
    /// Fires with a per-step probability.
    ProbabilisticAperiodic,
}

fn default_every() -> Step {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    Once {
        at: Step,
    },
    Periodic {
        #[serde(default = "default_every")]
        every: Step,
        #[serde(default)]
        start: Step,
        /// Inclusive last step.
        #[serde(default)]
        end: Option<Step>,
    },
    AtSteps {
        steps: Vec<Step>,
    },
    Probabilistic {
        probability: f64,
    },
    /// One probability for every step (length 1) or one per step (length
    /// equal to the horizon).
    ProbabilisticSteps {
        probabilities: Vec<f64>,
    },
}

impl Schedule {
    /// Every `every` steps starting at step 0.
    pub fn every(every: Step) -> Self {
        Schedule::Periodic {
            every,
            start: 0,
            end: None,
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        match self {
            Schedule::Once { .. } => ScheduleKind::DiscreteOnce,
            Schedule::Periodic { .. } => ScheduleKind::DiscretePeriodic,
            Schedule::AtSteps { .. } => ScheduleKind::DiscreteAperiodic,
            Schedule::Probabilistic { .. } => ScheduleKind::ProbabilisticPeriodic,
            Schedule::ProbabilisticSteps { .. } => ScheduleKind::ProbabilisticAperiodic,
        }
    }

    /// Sort and de-duplicate explicit step lists.
    pub fn normalized(self) -> Self {
        match self {
            Schedule::AtSteps { mut steps } => {
                steps.sort_unstable();
                steps.dedup();
                Schedule::AtSteps { steps }
            }
            other => other,
        }
    }

    /// Check the schedule against the simulation horizon.
    ///
    /// Returns a human-readable reason on failure; the caller attaches the
    /// transaction name.
    pub fn validate(&self, horizon: Step) -> Result<(), String> {
        let in_horizon = |step: Step, what: &str| {
            if step < horizon {
                Ok(())
            } else {
                Err(format!("{what} {step} is outside the horizon 0..{horizon}"))
            }
        };

        match self {
            Schedule::Once { at } => in_horizon(*at, "step"),
            Schedule::Periodic { every, start, end } => {
                if *every == 0 {
                    return Err("period must be at least 1".into());
                }
                in_horizon(*start, "start step")?;
                if let Some(end) = end {
                    in_horizon(*end, "end step")?;
                    if end < start {
                        return Err(format!("end step {end} precedes start step {start}"));
                    }
                }
                Ok(())
            }
            Schedule::AtSteps { steps } => {
                if steps.is_empty() {
                    return Err("step list must not be empty".into());
                }
                steps.iter().try_for_each(|s| in_horizon(*s, "step"))
            }
            Schedule::Probabilistic { probability } => check_probability(*probability),
            Schedule::ProbabilisticSteps { probabilities } => {
                let len = probabilities.len() as u64;
                if len != 1 && len != horizon {
                    return Err(format!(
                        "{len} probabilities cannot be broadcast over a horizon of {horizon}"
                    ));
                }
                probabilities.iter().try_for_each(|p| check_probability(*p))
            }
        }
    }

    /// Whether the schedule is active at `step`.
    pub fn fires(&self, step: Step, rng: &mut StdRng) -> bool {
        match self {
            Schedule::Once { at } => step == *at,
            Schedule::Periodic { every, start, end } => {
                step >= *start
                    && end.is_none_or(|end| step <= end)
                    && (step - start) % (*every).max(1) == 0
            }
            Schedule::AtSteps { steps } => steps.binary_search(&step).is_ok(),
            Schedule::Probabilistic { probability } => rng.random::<f64>() < *probability,
            Schedule::ProbabilisticSteps { probabilities } => {
                let p = if probabilities.len() == 1 {
                    probabilities[0]
                } else {
                    probabilities.get(step as usize).copied().unwrap_or(0.0)
                };
                rng.random::<f64>() < p
            }
        }
    }

    /// Number of steps in `0..horizon` on which a discrete schedule fires.
    ///
    /// `None` for probabilistic schedules.
    pub fn discrete_count(&self, horizon: Step) -> Option<u64> {
        match self {
            Schedule::Once { at } => Some(u64::from(*at < horizon)),
            Schedule::Periodic { every, start, end } => {
                let last = end.map_or(horizon.saturating_sub(1), |e| e.min(horizon.saturating_sub(1)));
                if horizon == 0 || *start > last {
                    return Some(0);
                }
                Some((last - start) / (*every).max(1) + 1)
            }
            Schedule::AtSteps { steps } => {
                Some(steps.iter().filter(|s| **s < horizon).count() as u64)
            }
            Schedule::Probabilistic { .. } | Schedule::ProbabilisticSteps { .. } => None,
        }
    }
}

fn check_probability(p: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(format!("probability {p} must lie in [0, 1]"))
    }
}
