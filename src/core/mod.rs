mod assets;
mod engine;
mod growth;
mod rng;
mod schedule;
mod types;

pub use assets::{Asset, CashFlow, RealEstate, Tick, amortized_payment};
pub use engine::{
    AssetSeries, AssetSummary, LockstepCell, LockstepGrid, Percentiles, Portfolio,
    SimulationResult, TickRow,
};
pub use growth::{Growth, GrowthOp};
pub use rng::{Rng, ReturnModel, derive_seed};
pub use schedule::{DAYS_PER_MONTH, Horizon, Schedule, ScheduleEntry, build_schedule};
pub use types::{
    AssetConfig, CashFlowConfig, ConfigError, Profile, RealEstateConfig, SimulationError,
};
