use std::collections::BTreeMap;

use super::growth::Growth;
use super::rng::{ReturnModel, Rng};
use super::types::{AssetConfig, CashFlowConfig, Profile, RealEstateConfig};

/// One tick of an asset. `cash_flow` is a signed delta to the cash account:
/// income is positive, costs (mortgage payments, tax, maintenance) negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub asset_value: f64,
    pub debt_value: f64,
    pub cash_flow: f64,
}

pub trait Asset {
    fn advance(&mut self, rng: &mut Rng) -> Tick;
    fn set_inflation(&mut self, rate: f64);
}

impl AssetConfig {
    /// Fresh instance for one replication. Configs must be validated first;
    /// instantiation itself cannot fail.
    pub fn instantiate(&self) -> Box<dyn Asset> {
        match self {
            AssetConfig::RealEstate(config) => Box::new(RealEstate::new(config)),
            AssetConfig::CashFlow(config) => Box::new(CashFlow::new(config)),
        }
    }
}

/// Level payment of an amortizing loan, rounded to cents.
pub fn amortized_payment(principal: f64, periodic_rate: f64, payments: u32) -> f64 {
    let raw = if periodic_rate == 0.0 {
        principal / payments as f64
    } else {
        let factor = (1.0 + periodic_rate).powi(payments as i32);
        principal * (periodic_rate * factor) / (factor - 1.0)
    };
    (raw * 100.0).round() / 100.0
}

pub struct RealEstate {
    asset_value: f64,
    debt: f64,
    maintenance_fee: f64,
    property_tax_rate: f64,
    inflation: f64,
    returns: ReturnModel,
    freq: f64,
    periodic_rate: f64,
    payment: f64,
}

impl RealEstate {
    pub fn new(config: &RealEstateConfig) -> Self {
        let periodic_rate = config.mortgage_rate / config.freq as f64;
        let payments = config.mortgage_term_years * config.freq;
        Self {
            asset_value: config.property_value,
            debt: config.mortgage_remaining.unwrap_or(config.mortgage_amount),
            maintenance_fee: config.maintenance_fee,
            property_tax_rate: config.property_tax_rate,
            inflation: config.inflation,
            returns: config.returns,
            freq: config.freq as f64,
            periodic_rate,
            payment: amortized_payment(config.mortgage_amount, periodic_rate, payments),
        }
    }

    pub fn payment(&self) -> f64 {
        self.payment
    }
}

impl Asset for RealEstate {
    fn advance(&mut self, rng: &mut Rng) -> Tick {
        // Tax is assessed on the pre-return value of the tick.
        let tax = self.asset_value * self.property_tax_rate / self.freq;
        self.maintenance_fee *= 1.0 + self.inflation / self.freq;
        self.asset_value *= 1.0 + self.returns.sample(rng);

        let carrying = tax + self.maintenance_fee;
        let outflow = if self.debt < 0.0 {
            // Floating-point guard; an amortized loan never goes below zero.
            self.debt = 0.0;
            carrying
        } else if self.debt < self.payment {
            // Final payment clears the balance, not the full scheduled amount.
            let settled = self.debt;
            self.debt = 0.0;
            settled + carrying
        } else {
            let interest = self.debt * self.periodic_rate;
            let principal = self.payment - interest;
            self.debt = (self.debt - principal).max(0.0);
            self.payment + carrying
        };

        Tick {
            asset_value: self.asset_value,
            debt_value: self.debt,
            cash_flow: -outflow,
        }
    }

    fn set_inflation(&mut self, rate: f64) {
        self.inflation = rate;
    }
}

pub struct CashFlow {
    inflation: f64,
    age: i64,
    profile: ProfileState,
}

enum ProfileState {
    Constant {
        amount: f64,
    },
    Linear {
        points: Vec<(u32, f64)>,
    },
    Step {
        first_step: u32,
        stride: u32,
        size_init: f64,
        growth: Growth,
        last_index: Option<u32>,
        last_value: f64,
    },
    Discrete {
        transactions: BTreeMap<u32, f64>,
    },
}

impl CashFlow {
    pub fn new(config: &CashFlowConfig) -> Self {
        let profile = match &config.profile {
            Profile::Constant { amount } => ProfileState::Constant { amount: *amount },
            Profile::LinearInterpolation { points } => ProfileState::Linear {
                points: points.clone(),
            },
            Profile::StepFunction {
                first_step,
                step_stride,
                step_size_init,
                step_growth,
            } => ProfileState::Step {
                first_step: *first_step,
                stride: *step_stride,
                size_init: *step_size_init,
                growth: *step_growth,
                last_index: None,
                last_value: 0.0,
            },
            Profile::Discrete { transactions } => ProfileState::Discrete {
                transactions: transactions.clone(),
            },
        };
        Self {
            inflation: config.inflation,
            age: -1,
            profile,
        }
    }
}

impl Asset for CashFlow {
    fn advance(&mut self, _rng: &mut Rng) -> Tick {
        self.age += 1;
        let age = self.age as u32;

        let amount = match &mut self.profile {
            ProfileState::Constant { amount } => *amount,
            ProfileState::Linear { points } => interpolate(points, age),
            ProfileState::Step {
                first_step,
                stride,
                size_init,
                growth,
                last_index,
                last_value,
            } => {
                if age < *first_step {
                    0.0
                } else {
                    let index = (age - *first_step) / *stride;
                    match *last_index {
                        None => {
                            // First active step; later ticks reuse the cache so
                            // the value moves exactly once per stride boundary.
                            *last_index = Some(index);
                            *last_value = *size_init;
                            *last_value
                        }
                        Some(previous) if index != previous => {
                            *last_value = growth.apply(*last_value, self.inflation);
                            *last_index = Some(index);
                            *last_value
                        }
                        Some(_) => *last_value,
                    }
                }
            }
            ProfileState::Discrete { transactions } => {
                transactions.get(&age).copied().unwrap_or(0.0)
            }
        };

        Tick {
            asset_value: 0.0,
            debt_value: 0.0,
            cash_flow: amount,
        }
    }

    fn set_inflation(&mut self, rate: f64) {
        self.inflation = rate;
    }
}

fn interpolate(points: &[(u32, f64)], age: u32) -> f64 {
    let Some(&(first_tick, first_value)) = points.first() else {
        return 0.0;
    };
    if age <= first_tick {
        return first_value;
    }

    for window in points.windows(2) {
        let (left_tick, left_value) = window[0];
        let (right_tick, right_value) = window[1];
        if age <= right_tick {
            let span = (right_tick - left_tick) as f64;
            let w = (age - left_tick) as f64 / span;
            return left_value * (1.0 - w) + right_value * w;
        }
    }

    points.last().map(|&(_, value)| value).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::Rng;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn real_estate_config() -> RealEstateConfig {
        RealEstateConfig {
            name: "flat".to_string(),
            property_value: 536_000.0,
            mortgage_amount: 427_000.0,
            mortgage_remaining: None,
            mortgage_rate: 0.0279,
            mortgage_term_years: 30,
            maintenance_fee: 0.0,
            property_tax_rate: 0.0,
            inflation: 0.0,
            returns: ReturnModel::Normal { mean: 0.0, std: 0.0 },
            freq: 12,
        }
    }

    fn cash_flow(profile: Profile) -> CashFlow {
        CashFlow::new(&CashFlowConfig {
            name: "flow".to_string(),
            inflation: 0.0,
            freq: 12,
            profile,
        })
    }

    #[test]
    fn zero_rate_loan_splits_principal_evenly() {
        assert_approx(amortized_payment(120_000.0, 0.0, 120), 1_000.0);
    }

    #[test]
    fn payment_is_rounded_to_cents() {
        let p = amortized_payment(427_000.0, 0.0279 / 12.0, 360);
        assert_approx(p * 100.0, (p * 100.0).round());
        assert!(p > 1_700.0 && p < 1_800.0, "implausible payment: {p}");
    }

    proptest! {
        #[test]
        fn payment_present_value_recovers_principal(
            principal in 10_000.0f64..2_000_000.0,
            annual_rate in 0.001f64..0.12,
            term_years in 1u32..40,
        ) {
            let i = annual_rate / 12.0;
            let n = term_years * 12;
            let p = amortized_payment(principal, i, n);

            let mut present_value = 0.0;
            for k in 1..=n {
                present_value += p / (1.0 + i).powi(k as i32);
            }

            // Cent rounding of p perturbs the PV by at most half a cent per
            // discounted payment.
            let tolerance = 0.005 * n as f64 + 1e-6 * principal;
            prop_assert!(
                (present_value - principal).abs() <= tolerance,
                "PV {} vs principal {}", present_value, principal
            );
        }
    }

    #[test]
    fn loan_fully_amortizes_with_zero_returns() {
        let mut config = real_estate_config();
        config.mortgage_amount = 100_000.0;
        config.property_value = 100_000.0;
        config.mortgage_rate = 0.05;
        config.mortgage_term_years = 10;

        let mut asset = RealEstate::new(&config);
        let p = asset.payment();
        let mut rng = Rng::new(1);

        let mut last = asset.advance(&mut rng);
        for _ in 1..120 {
            last = asset.advance(&mut rng);
        }

        assert_approx(last.debt_value, 0.0);
        // Final payment settles the remaining balance, never more than p.
        assert!(-last.cash_flow <= p + EPS, "overpaid: {}", -last.cash_flow);

        // Once paid off there is nothing left to pay.
        let after = asset.advance(&mut rng);
        assert_approx(after.cash_flow, 0.0);
        assert_approx(after.debt_value, 0.0);
    }

    #[test]
    fn debt_decreases_monotonically_while_amortizing() {
        let mut asset = RealEstate::new(&real_estate_config());
        let mut rng = Rng::new(1);
        let mut previous = f64::INFINITY;
        for _ in 0..360 {
            let tick = asset.advance(&mut rng);
            assert!(tick.debt_value < previous);
            previous = tick.debt_value;
        }
        assert_approx(previous, 0.0);
    }

    #[test]
    fn remaining_balance_override_shortens_the_loan() {
        let mut config = real_estate_config();
        config.mortgage_remaining = Some(1_000.0);
        let mut asset = RealEstate::new(&config);
        let mut rng = Rng::new(1);

        let tick = asset.advance(&mut rng);
        assert_approx(tick.debt_value, 0.0);
        assert_approx(tick.cash_flow, -1_000.0);
    }

    #[test]
    fn property_tax_is_assessed_on_pre_return_value() {
        let mut config = real_estate_config();
        config.property_value = 120_000.0;
        config.property_tax_rate = 0.012;
        // Deterministic doubling so pre- and post-return values differ.
        config.returns = ReturnModel::Normal { mean: 1.0, std: 0.0 };
        config.mortgage_remaining = Some(0.0);

        let mut asset = RealEstate::new(&config);
        let mut rng = Rng::new(1);
        let tick = asset.advance(&mut rng);

        assert_approx(tick.asset_value, 240_000.0);
        // 120_000 * 0.012 / 12, not 240_000 * 0.012 / 12.
        assert_approx(tick.cash_flow, -120.0);
    }

    #[test]
    fn maintenance_fee_compounds_with_inflation() {
        let mut config = real_estate_config();
        config.maintenance_fee = 480.0;
        config.inflation = 0.12;
        config.mortgage_remaining = Some(0.0);

        let mut asset = RealEstate::new(&config);
        let mut rng = Rng::new(1);

        let first = asset.advance(&mut rng);
        assert_approx(first.cash_flow, -480.0 * 1.01);
        let second = asset.advance(&mut rng);
        assert_approx(second.cash_flow, -480.0 * 1.01 * 1.01);
    }

    #[test]
    fn set_inflation_changes_future_maintenance_growth() {
        let mut config = real_estate_config();
        config.maintenance_fee = 100.0;
        config.inflation = 0.0;
        config.mortgage_remaining = Some(0.0);

        let mut asset = RealEstate::new(&config);
        let mut rng = Rng::new(1);
        assert_approx(asset.advance(&mut rng).cash_flow, -100.0);

        asset.set_inflation(0.12);
        assert_approx(asset.advance(&mut rng).cash_flow, -101.0);
    }

    #[test]
    fn constant_profile_emits_fixed_amount() {
        let mut flow = cash_flow(Profile::Constant { amount: 2_500.0 });
        let mut rng = Rng::new(1);
        for _ in 0..5 {
            let tick = flow.advance(&mut rng);
            assert_approx(tick.cash_flow, 2_500.0);
            assert_approx(tick.asset_value, 0.0);
            assert_approx(tick.debt_value, 0.0);
        }
    }

    #[test]
    fn step_function_grows_exactly_once_per_stride() {
        let mut flow = cash_flow(Profile::StepFunction {
            first_step: 0,
            step_stride: 12,
            step_size_init: 100.0,
            step_growth: Growth::parse("*1.1").unwrap(),
        });
        let mut rng = Rng::new(1);

        let mut emitted = Vec::new();
        for _ in 0..=24 {
            emitted.push(flow.advance(&mut rng).cash_flow);
        }

        for tick in 0..=11 {
            assert_approx(emitted[tick], 100.0);
        }
        assert_approx(emitted[12], 110.0);
        assert_approx(emitted[23], 110.0);
        assert_approx(emitted[24], 121.0);
    }

    #[test]
    fn step_function_waits_for_first_step() {
        let mut flow = cash_flow(Profile::StepFunction {
            first_step: 3,
            step_stride: 2,
            step_size_init: 50.0,
            step_growth: Growth::parse("+10").unwrap(),
        });
        let mut rng = Rng::new(1);

        let emitted: Vec<f64> = (0..8).map(|_| flow.advance(&mut rng).cash_flow).collect();
        assert_eq!(&emitted[0..3], &[0.0, 0.0, 0.0]);
        assert_approx(emitted[3], 50.0); // tick 3, step 0
        assert_approx(emitted[4], 50.0); // tick 4, still step 0
        assert_approx(emitted[5], 60.0); // tick 5, step 1
        assert_approx(emitted[6], 60.0);
        assert_approx(emitted[7], 70.0); // tick 7, step 2
    }

    #[test]
    fn inflation_linked_step_growth_reads_the_live_rate() {
        let mut flow = cash_flow(Profile::StepFunction {
            first_step: 0,
            step_stride: 1,
            step_size_init: 100.0,
            step_growth: Growth::Inflation,
        });
        flow.set_inflation(0.10);
        let mut rng = Rng::new(1);

        assert_approx(flow.advance(&mut rng).cash_flow, 100.0);
        assert_approx(flow.advance(&mut rng).cash_flow, 110.0);
        flow.set_inflation(0.0);
        assert_approx(flow.advance(&mut rng).cash_flow, 110.0);
    }

    #[test]
    fn discrete_profile_emits_only_listed_ticks() {
        let mut transactions = BTreeMap::new();
        transactions.insert(1, 123.0);
        transactions.insert(3, 100.0);
        transactions.insert(50, 34.0);

        let mut flow = cash_flow(Profile::Discrete { transactions });
        let mut rng = Rng::new(1);

        for tick in 0..100u32 {
            let expected = match tick {
                1 => 123.0,
                3 => 100.0,
                50 => 34.0,
                _ => 0.0,
            };
            assert_approx(flow.advance(&mut rng).cash_flow, expected);
        }
    }

    #[test]
    fn linear_interpolation_clamps_outside_anchor_range() {
        let mut flow = cash_flow(Profile::LinearInterpolation {
            points: vec![(2, 100.0), (10, 500.0)],
        });
        let mut rng = Rng::new(1);

        let emitted: Vec<f64> = (0..=12).map(|_| flow.advance(&mut rng).cash_flow).collect();
        assert_approx(emitted[0], 100.0); // before first anchor
        assert_approx(emitted[2], 100.0);
        assert_approx(emitted[6], 300.0); // midway
        assert_approx(emitted[10], 500.0);
        assert_approx(emitted[12], 500.0); // past last anchor
    }
}
