//! Amounts: how much a transaction moves when it fires.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp, LogNormal, Normal, Uniform};
use serde::{Deserialize, Serialize};
use types::{Cash, StateVector};

use crate::context::TransactionContext;
use crate::error::{ConfigError, TransactionError};
use crate::field::FieldRef;

/// Random distribution for stochastic amounts.
///
/// Parameters are in currency units; samples below zero are floored at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountDistribution {
    Normal { mean: f64, std_dev: f64 },
    /// `mu`/`sigma` of the underlying normal.
    LogNormal { mu: f64, sigma: f64 },
    Uniform { low: f64, high: f64 },
    /// Rate parameter λ (mean 1/λ).
    Exponential { lambda: f64 },
}

impl AmountDistribution {
    fn validate(&self) -> Result<(), String> {
        let finite = |name: &str, v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(format!("{name} must be finite, got {v}"))
            }
        };
        match self {
            AmountDistribution::Normal { mean, std_dev } => {
                finite("mean", *mean)?;
                finite("std_dev", *std_dev)?;
                if *std_dev < 0.0 {
                    return Err(format!("std_dev must be non-negative, got {std_dev}"));
                }
            }
            AmountDistribution::LogNormal { mu, sigma } => {
                finite("mu", *mu)?;
                finite("sigma", *sigma)?;
                if *sigma < 0.0 {
                    return Err(format!("sigma must be non-negative, got {sigma}"));
                }
            }
            AmountDistribution::Uniform { low, high } => {
                finite("low", *low)?;
                finite("high", *high)?;
                if low >= high {
                    return Err(format!("uniform range [{low}, {high}) is empty"));
                }
            }
            AmountDistribution::Exponential { lambda } => {
                finite("lambda", *lambda)?;
                if *lambda <= 0.0 {
                    return Err(format!("lambda must be positive, got {lambda}"));
                }
            }
        }
        Ok(())
    }

    fn sample(&self, rng: &mut StdRng) -> Result<f64, TransactionError> {
        let value = match self {
            AmountDistribution::Normal { mean, std_dev } => {
                Normal::new(*mean, *std_dev).map_err(invalid)?.sample(rng)
            }
            AmountDistribution::LogNormal { mu, sigma } => {
                LogNormal::new(*mu, *sigma).map_err(invalid)?.sample(rng)
            }
            AmountDistribution::Uniform { low, high } => {
                Uniform::new(*low, *high).map_err(invalid)?.sample(rng)
            }
            AmountDistribution::Exponential { lambda } => {
                Exp::new(*lambda).map_err(invalid)?.sample(rng)
            }
        };
        Ok(value.max(0.0))
    }
}

fn invalid(e: impl std::fmt::Display) -> TransactionError {
    TransactionError::InvalidAmount(e.to_string())
}

/// How much a transaction moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amount {
    Fixed(Cash),
    /// `rate` times the current value of a field (interest, a share of an
    /// external balance, ...).
    Proportional { of: FieldRef, rate: f64 },
    /// A fresh draw from the trial's generator each time it fires.
    Random(AmountDistribution),
}

impl Amount {
    /// A constant amount in currency units.
    ///
    /// Fails for NaN, infinities and values outside the fixed-point range.
    pub fn fixed(value: f64) -> Result<Self, ConfigError> {
        Cash::try_from(value)
            .map(Amount::Fixed)
            .map_err(ConfigError::invalid)
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Amount::Fixed(_) => Ok(()),
            Amount::Proportional { rate, .. } => {
                if rate.is_finite() {
                    Ok(())
                } else {
                    Err(format!("rate must be finite, got {rate}"))
                }
            }
            Amount::Random(dist) => dist.validate(),
        }
    }

    /// Evaluate the amount against the current state.
    pub fn resolve(
        &self,
        state: &StateVector,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<Cash, TransactionError> {
        match self {
            Amount::Fixed(value) => Ok(*value),
            Amount::Proportional { of, rate } => {
                let base = of.read(state, ctx)?;
                base.checked_scale(*rate).ok_or_else(|| {
                    TransactionError::InvalidAmount(format!("{rate} x {of} ({base}) overflows"))
                })
            }
            Amount::Random(dist) => {
                let draw = dist.sample(ctx.rng())?;
                Cash::try_from_float(draw).ok_or_else(|| {
                    TransactionError::InvalidAmount(format!("sampled value {draw} overflows"))
                })
            }
        }
    }
}
