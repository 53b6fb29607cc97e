use std::collections::BTreeMap;

use thiserror::Error;

use super::growth::Growth;
use super::rng::ReturnModel;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("growth spec is empty")]
    EmptyGrowthSpec,
    #[error("unsupported growth operator '{0}' (expected one of + - * /)")]
    UnsupportedGrowthOperator(char),
    #[error("growth coefficient '{0}' is not a finite number")]
    BadGrowthCoefficient(String),
    #[error("growth spec divides by zero")]
    ZeroGrowthDivisor,
    #[error("asset '{asset}': {field} {reason}")]
    InvalidField {
        asset: String,
        field: &'static str,
        reason: &'static str,
    },
    #[error("duplicate asset name '{0}'")]
    DuplicateAsset(String),
    #[error("portfolio has no assets")]
    EmptyPortfolio,
    #[error("initial cash must be a finite number")]
    NonFiniteCash,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(
        "cash balance fell to {cash:.2} on replication {replication} at day {elapsed_day} \
         (after ticking asset '{asset}')"
    )]
    Insolvent {
        replication: u32,
        asset: String,
        elapsed_day: f64,
        cash: f64,
    },
}

#[derive(Debug, Clone)]
pub enum AssetConfig {
    RealEstate(RealEstateConfig),
    CashFlow(CashFlowConfig),
}

impl AssetConfig {
    pub fn name(&self) -> &str {
        match self {
            AssetConfig::RealEstate(c) => &c.name,
            AssetConfig::CashFlow(c) => &c.name,
        }
    }

    pub fn freq(&self) -> u32 {
        match self {
            AssetConfig::RealEstate(c) => c.freq,
            AssetConfig::CashFlow(c) => c.freq,
        }
    }

    pub fn set_inflation(&mut self, rate: f64) {
        match self {
            AssetConfig::RealEstate(c) => c.inflation = rate,
            AssetConfig::CashFlow(c) => c.inflation = rate,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            AssetConfig::RealEstate(c) => c.validate(),
            AssetConfig::CashFlow(c) => c.validate(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RealEstateConfig {
    pub name: String,
    pub property_value: f64,
    pub mortgage_amount: f64,
    /// Outstanding balance at simulation start; `None` means the full amount.
    pub mortgage_remaining: Option<f64>,
    pub mortgage_rate: f64,
    pub mortgage_term_years: u32,
    pub maintenance_fee: f64,
    pub property_tax_rate: f64,
    pub inflation: f64,
    pub returns: ReturnModel,
    pub freq: u32,
}

impl RealEstateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |field, reason| ConfigError::InvalidField {
            asset: self.name.clone(),
            field,
            reason,
        };

        if !(1..=366).contains(&self.freq) {
            return Err(field("freq", "must be between 1 and 366 ticks per year"));
        }
        if !(self.property_value.is_finite() && self.property_value > 0.0) {
            return Err(field("property_value", "must be a positive finite number"));
        }
        if !(self.mortgage_amount.is_finite() && self.mortgage_amount > 0.0) {
            return Err(field("mortgage_amount", "must be a positive finite number"));
        }
        if let Some(remaining) = self.mortgage_remaining {
            if !(remaining.is_finite() && remaining >= 0.0) {
                return Err(field(
                    "mortgage_remaining",
                    "must be a non-negative finite number",
                ));
            }
            if remaining > self.mortgage_amount {
                return Err(field(
                    "mortgage_remaining",
                    "cannot exceed the original mortgage amount",
                ));
            }
        }
        if !(self.mortgage_rate.is_finite() && self.mortgage_rate >= 0.0) {
            return Err(field("mortgage_rate", "must be a non-negative finite number"));
        }
        if !(1..=100).contains(&self.mortgage_term_years) {
            return Err(field("mortgage_term", "must be between 1 and 100 years"));
        }
        if !(self.maintenance_fee.is_finite() && self.maintenance_fee >= 0.0) {
            return Err(field(
                "maintenance_fee",
                "must be a non-negative finite number",
            ));
        }
        if !(self.property_tax_rate.is_finite() && self.property_tax_rate >= 0.0) {
            return Err(field(
                "property_tax_rate",
                "must be a non-negative finite number",
            ));
        }
        if !self.inflation.is_finite() {
            return Err(field("inflation", "must be a finite number"));
        }
        self.returns.validate().map_err(|reason| field("returns", reason))
    }
}

#[derive(Debug, Clone)]
pub struct CashFlowConfig {
    pub name: String,
    pub inflation: f64,
    pub freq: u32,
    pub profile: Profile,
}

#[derive(Debug, Clone)]
pub enum Profile {
    Constant {
        amount: f64,
    },
    LinearInterpolation {
        /// Anchor points as (tick, value), strictly increasing in tick.
        points: Vec<(u32, f64)>,
    },
    StepFunction {
        first_step: u32,
        step_stride: u32,
        step_size_init: f64,
        step_growth: Growth,
    },
    Discrete {
        transactions: BTreeMap<u32, f64>,
    },
}

impl CashFlowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |field, reason| ConfigError::InvalidField {
            asset: self.name.clone(),
            field,
            reason,
        };

        if !(1..=366).contains(&self.freq) {
            return Err(field("freq", "must be between 1 and 366 ticks per year"));
        }
        if !self.inflation.is_finite() {
            return Err(field("inflation", "must be a finite number"));
        }
        match &self.profile {
            Profile::Constant { amount } => {
                if !amount.is_finite() {
                    return Err(field("amount", "must be a finite number"));
                }
            }
            Profile::LinearInterpolation { points } => {
                if points.is_empty() {
                    return Err(field("points", "must contain at least one anchor"));
                }
                for window in points.windows(2) {
                    if window[1].0 <= window[0].0 {
                        return Err(field("points", "ticks must be strictly increasing"));
                    }
                }
                if points.iter().any(|(_, value)| !value.is_finite()) {
                    return Err(field("points", "values must be finite numbers"));
                }
            }
            Profile::StepFunction {
                step_stride,
                step_size_init,
                ..
            } => {
                if *step_stride == 0 {
                    return Err(field("step_stride", "must be at least 1 tick"));
                }
                if !step_size_init.is_finite() {
                    return Err(field("step_size_init", "must be a finite number"));
                }
            }
            Profile::Discrete { transactions } => {
                if transactions.values().any(|amount| !amount.is_finite()) {
                    return Err(field("transactions", "amounts must be finite numbers"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::growth::Growth;

    fn real_estate() -> RealEstateConfig {
        RealEstateConfig {
            name: "flat".to_string(),
            property_value: 536_000.0,
            mortgage_amount: 427_000.0,
            mortgage_remaining: None,
            mortgage_rate: 0.0279,
            mortgage_term_years: 30,
            maintenance_fee: 480.0,
            property_tax_rate: 0.008,
            inflation: 0.02,
            returns: ReturnModel::Normal {
                mean: 0.0036,
                std: 0.0043,
            },
            freq: 12,
        }
    }

    #[test]
    fn valid_real_estate_config_passes() {
        assert!(real_estate().validate().is_ok());
    }

    #[test]
    fn remaining_balance_cannot_exceed_mortgage() {
        let mut config = real_estate();
        config.mortgage_remaining = Some(500_000.0);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "mortgage_remaining",
                ..
            }
        ));
    }

    #[test]
    fn negative_return_std_is_rejected() {
        let mut config = real_estate();
        config.returns = ReturnModel::Normal {
            mean: 0.0,
            std: -0.1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let mut config = real_estate();
        config.freq = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn freq_above_daily_ticks_is_rejected() {
        let mut config = real_estate();
        config.freq = 1_000;
        assert!(config.validate().is_err());
    }

    // Unbounded terms would overflow the payment count at instantiation.
    #[test]
    fn implausibly_long_mortgage_terms_are_rejected() {
        let mut config = real_estate();
        config.mortgage_term_years = 400_000_000;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "mortgage_term",
                ..
            }
        ));
    }

    #[test]
    fn linear_interpolation_needs_increasing_ticks() {
        let config = CashFlowConfig {
            name: "salary".to_string(),
            inflation: 0.0,
            freq: 12,
            profile: Profile::LinearInterpolation {
                points: vec![(0, 100.0), (0, 200.0)],
            },
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn step_function_needs_positive_stride() {
        let config = CashFlowConfig {
            name: "rent".to_string(),
            inflation: 0.0,
            freq: 12,
            profile: Profile::StepFunction {
                first_step: 0,
                step_stride: 0,
                step_size_init: 100.0,
                step_growth: Growth::parse("*1.1").unwrap(),
            },
        };
        assert!(config.validate().is_err());
    }
}
