use std::f64::consts::PI;

/// xorshift64* generator with a Box-Muller cache for normal draws.
/// Every random draw in a simulation goes through one of these, seeded per
/// replication, so runs are bit-reproducible.
pub struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self {
            state,
            cached_normal: None,
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    pub fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    pub fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        let z0 = r * theta.cos();
        let z1 = r * theta.sin();
        self.cached_normal = Some(z1);
        z0
    }
}

/// Independent seed for one replication of a simulation.
pub fn derive_seed(base_seed: u64, replication: u32) -> u64 {
    let mixed = base_seed ^ ((replication as u64) << 32) ^ replication as u64;
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Per-tick return distribution for an appreciating asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnModel {
    Normal { mean: f64, std: f64 },
}

impl ReturnModel {
    pub fn sample(&self, rng: &mut Rng) -> f64 {
        match *self {
            ReturnModel::Normal { mean, std } => mean + std * rng.standard_normal(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        match *self {
            ReturnModel::Normal { mean, std } => {
                if !mean.is_finite() {
                    return Err("normal distribution mean must be a finite number");
                }
                if !(std.is_finite() && std >= 0.0) {
                    return Err(
                        "normal distribution standard deviation must be a non-negative finite number",
                    );
                }
                Ok(())
            }
        }
    }
}
