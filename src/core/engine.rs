use serde::Serialize;

use super::assets::Asset;
use super::rng::{Rng, derive_seed};
use super::schedule::{Horizon, build_schedule};
use super::types::{AssetConfig, ConfigError, SimulationError};

/// One recorded observation of one asset: its state and the portfolio's
/// running cash right after the asset ticked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TickRow {
    pub replication: u32,
    pub elapsed_day: f64,
    pub asset_value: f64,
    pub debt_value: f64,
    pub cash: f64,
}

/// Dense per-asset result grid: row `replication * ticks + tick`, written
/// exactly once per (replication, tick) and immutable once simulation ends.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSeries {
    pub name: String,
    pub ticks: usize,
    rows: Vec<TickRow>,
}

impl AssetSeries {
    fn new(name: String, ticks: usize, replications: u32) -> Self {
        Self {
            name,
            ticks,
            rows: vec![TickRow::default(); ticks * replications as usize],
        }
    }

    fn record(&mut self, replication: u32, tick: usize, row: TickRow) {
        self.rows[replication as usize * self.ticks + tick] = row;
    }

    pub fn row(&self, replication: u32, tick: usize) -> &TickRow {
        &self.rows[replication as usize * self.ticks + tick]
    }

    pub fn rows(&self) -> &[TickRow] {
        &self.rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub replications: u32,
    pub series: Vec<AssetSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSummary {
    pub name: String,
    pub ticks: usize,
    pub final_asset_value: Percentiles,
    pub final_debt_value: Percentiles,
    pub final_cash: Percentiles,
}

impl SimulationResult {
    /// Cross-replication spread of each asset's final recorded tick.
    pub fn summary(&self) -> Vec<AssetSummary> {
        self.series
            .iter()
            .map(|series| {
                let mut values = Vec::with_capacity(self.replications as usize);
                let mut debts = Vec::with_capacity(self.replications as usize);
                let mut cash = Vec::with_capacity(self.replications as usize);
                if series.ticks > 0 {
                    for r in 0..self.replications {
                        let row = series.row(r, series.ticks - 1);
                        values.push(row.asset_value);
                        debts.push(row.debt_value);
                        cash.push(row.cash);
                    }
                }
                AssetSummary {
                    name: series.name.clone(),
                    ticks: series.ticks,
                    final_asset_value: spread(&mut values),
                    final_debt_value: spread(&mut debts),
                    final_cash: spread(&mut cash),
                }
            })
            .collect()
    }
}

fn spread(values: &mut [f64]) -> Percentiles {
    Percentiles {
        p10: percentile(values, 10.0),
        p50: percentile(values, 50.0),
        p90: percentile(values, 90.0),
    }
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

/// Lockstep grid: every asset ticks every step, indexed
/// `[replication][step][asset]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LockstepGrid {
    pub replications: u32,
    pub steps: usize,
    pub assets: Vec<String>,
    cells: Vec<LockstepCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LockstepCell {
    pub asset_value: f64,
    pub debt_value: f64,
    pub cash: f64,
}

impl LockstepGrid {
    pub fn cell(&self, replication: u32, step: usize, asset: usize) -> &LockstepCell {
        let per_replication = self.steps * self.assets.len();
        &self.cells[replication as usize * per_replication + step * self.assets.len() + asset]
    }
}

#[derive(Debug)]
pub struct Portfolio {
    assets: Vec<AssetConfig>,
    cash_init: f64,
}

impl Portfolio {
    pub fn new(assets: Vec<AssetConfig>, cash_init: f64) -> Result<Self, ConfigError> {
        if assets.is_empty() {
            return Err(ConfigError::EmptyPortfolio);
        }
        if !cash_init.is_finite() {
            return Err(ConfigError::NonFiniteCash);
        }
        for (idx, config) in assets.iter().enumerate() {
            config.validate()?;
            if assets[..idx].iter().any(|other| other.name() == config.name()) {
                return Err(ConfigError::DuplicateAsset(config.name().to_string()));
            }
        }
        Ok(Self { assets, cash_init })
    }

    /// Override the inflation rate for every asset in subsequent simulations.
    pub fn set_inflation(&mut self, rate: f64) {
        for config in &mut self.assets {
            config.set_inflation(rate);
        }
    }

    pub fn asset_names(&self) -> Vec<&str> {
        self.assets.iter().map(|config| config.name()).collect()
    }

    /// Monte Carlo run over the merged multi-frequency schedule. Replications
    /// are independent: fresh asset instances, an independently derived seed,
    /// and a disjoint slice of every result grid.
    pub fn simulate(
        &self,
        horizon: Horizon,
        replications: u32,
        seed: u64,
    ) -> Result<SimulationResult, SimulationError> {
        let freqs: Vec<u32> = self.assets.iter().map(|config| config.freq()).collect();
        let schedule = build_schedule(&freqs, horizon.total_days());

        let mut series: Vec<AssetSeries> = self
            .assets
            .iter()
            .zip(&schedule.ticks_per_asset)
            .map(|(config, &ticks)| {
                AssetSeries::new(config.name().to_string(), ticks, replications)
            })
            .collect();

        for replication in 0..replications {
            let mut rng = Rng::new(derive_seed(seed, replication));
            let mut instances: Vec<Box<dyn Asset>> =
                self.assets.iter().map(|config| config.instantiate()).collect();
            let mut cash = self.cash_init;

            for entry in &schedule.entries {
                let tick = instances[entry.asset].advance(&mut rng);
                cash += tick.cash_flow;
                series[entry.asset].record(
                    replication,
                    entry.tick,
                    TickRow {
                        replication,
                        elapsed_day: entry.elapsed_day,
                        asset_value: tick.asset_value,
                        debt_value: tick.debt_value,
                        cash,
                    },
                );
                if cash <= 0.0 {
                    return Err(SimulationError::Insolvent {
                        replication,
                        asset: self.assets[entry.asset].name().to_string(),
                        elapsed_day: entry.elapsed_day,
                        cash,
                    });
                }
            }
        }

        Ok(SimulationResult {
            replications,
            series,
        })
    }

    /// Fixed-horizon variant: frequencies are ignored and every asset ticks on
    /// every step. `elapsed_day` in the insolvency error carries the step
    /// index.
    pub fn simulate_lockstep(
        &self,
        steps: usize,
        replications: u32,
        seed: u64,
    ) -> Result<LockstepGrid, SimulationError> {
        let asset_count = self.assets.len();
        let mut cells = vec![LockstepCell::default(); steps * asset_count * replications as usize];

        for replication in 0..replications {
            let mut rng = Rng::new(derive_seed(seed, replication));
            let mut instances: Vec<Box<dyn Asset>> =
                self.assets.iter().map(|config| config.instantiate()).collect();
            let mut cash = self.cash_init;

            for step in 0..steps {
                for (asset, instance) in instances.iter_mut().enumerate() {
                    let tick = instance.advance(&mut rng);
                    cash += tick.cash_flow;
                    let idx = replication as usize * steps * asset_count
                        + step * asset_count
                        + asset;
                    cells[idx] = LockstepCell {
                        asset_value: tick.asset_value,
                        debt_value: tick.debt_value,
                        cash,
                    };
                    if cash <= 0.0 {
                        return Err(SimulationError::Insolvent {
                            replication,
                            asset: self.assets[asset].name().to_string(),
                            elapsed_day: step as f64,
                            cash,
                        });
                    }
                }
            }
        }

        Ok(LockstepGrid {
            replications,
            steps,
            assets: self
                .assets
                .iter()
                .map(|config| config.name().to_string())
                .collect(),
            cells,
        })
    }
}
