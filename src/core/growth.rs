use super::types::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A parsed growth spec: either `"inflation"` or `"<op><coefficient>"`,
/// e.g. `"*1.02"` grows a value by 2% each time it is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Growth {
    Inflation,
    Op { op: GrowthOp, coefficient: f64 },
}

impl Growth {
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ConfigError::EmptyGrowthSpec);
        }
        if spec == "inflation" {
            return Ok(Growth::Inflation);
        }

        let mut chars = spec.chars();
        let Some(op_char) = chars.next() else {
            return Err(ConfigError::EmptyGrowthSpec);
        };
        let op = match op_char {
            '+' => GrowthOp::Add,
            '-' => GrowthOp::Sub,
            '*' => GrowthOp::Mul,
            '/' => GrowthOp::Div,
            other => return Err(ConfigError::UnsupportedGrowthOperator(other)),
        };

        let raw = chars.as_str().trim();
        let coefficient = raw
            .parse::<f64>()
            .map_err(|_| ConfigError::BadGrowthCoefficient(raw.to_string()))?;
        if !coefficient.is_finite() {
            return Err(ConfigError::BadGrowthCoefficient(raw.to_string()));
        }
        if op == GrowthOp::Div && coefficient == 0.0 {
            return Err(ConfigError::ZeroGrowthDivisor);
        }

        Ok(Growth::Op { op, coefficient })
    }

    /// The inflation rate is passed explicitly so the transform stays pure;
    /// inflation-linked growth reads whatever the asset's rate is right now.
    pub fn apply(self, value: f64, inflation: f64) -> f64 {
        match self {
            Growth::Inflation => value * (1.0 + inflation),
            Growth::Op { op, coefficient } => match op {
                GrowthOp::Add => value + coefficient,
                GrowthOp::Sub => value - coefficient,
                GrowthOp::Mul => value * coefficient,
                GrowthOp::Div => value / coefficient,
            },
        }
    }
}
