pub const DAYS_PER_MONTH: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl Horizon {
    pub fn years(years: u32) -> Self {
        Self {
            years,
            months: 0,
            days: 0,
        }
    }

    pub fn total_days(&self) -> u32 {
        self.days + DAYS_PER_MONTH * (self.months + 12 * self.years)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleEntry {
    pub asset: usize,
    pub tick: usize,
    pub elapsed_day: f64,
}

/// Global event order for a portfolio of assets ticking at different
/// frequencies, plus the per-asset tick counts within the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
    pub ticks_per_asset: Vec<usize>,
}

pub fn build_schedule(freqs: &[u32], total_days: u32) -> Schedule {
    let mut entries = Vec::new();
    let mut ticks_per_asset = Vec::with_capacity(freqs.len());

    for (asset, &freq) in freqs.iter().enumerate() {
        let day_len = (12.0 / freq as f64) * DAYS_PER_MONTH as f64;
        let ticks = (total_days as f64 / day_len) as usize;
        ticks_per_asset.push(ticks);
        for tick in 0..ticks {
            entries.push(ScheduleEntry {
                asset,
                tick,
                elapsed_day: (tick as f64 + 1.0) * day_len,
            });
        }
    }

    // Ties on elapsed day fall back to declaration order, so merged runs are
    // deterministic for any asset mix.
    entries.sort_by(|a, b| {
        a.elapsed_day
            .total_cmp(&b.elapsed_day)
            .then(a.asset.cmp(&b.asset))
    });

    Schedule {
        entries,
        ticks_per_asset,
    }
}
