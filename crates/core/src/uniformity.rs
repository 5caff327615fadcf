//! Dripper uniformity trial: coefficient of variation over the volumes
//! collected from a set of drippers in a fixed time window.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const MIN_TRIAL_SAMPLES: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniformityBand {
    Excellent,
    VeryGood,
    Acceptable,
    Low,
}

impl UniformityBand {
    pub fn from_cv(cv: f64) -> Self {
        if cv < 5.0 {
            Self::Excellent
        } else if cv < 7.0 {
            Self::VeryGood
        } else if cv < 10.0 {
            Self::Acceptable
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::VeryGood => "Very good",
            Self::Acceptable => "Acceptable",
            Self::Low => "Low uniformity (review)",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DerivedStat {
    pub mean: f64,
    pub sample_std_dev: f64,
    pub cv: f64,
    pub band: UniformityBand,
}

impl DerivedStat {
    pub fn compute(values: &[f64]) -> Result<Self, DomainError> {
        if values.is_empty() {
            return Err(DomainError::InsufficientSamples { found: 0, required: 1 });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let sample_std_dev = if values.len() > 1 {
            let squares = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>();
            (squares / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let cv = if mean == 0.0 { 0.0 } else { 100.0 * sample_std_dev / mean };

        Ok(Self { mean, sample_std_dev, cv, band: UniformityBand::from_cv(cv) })
    }

    pub fn display_mean(&self) -> f64 {
        round_one_decimal(self.mean)
    }

    pub fn display_cv(&self) -> f64 {
        round_one_decimal(self.cv)
    }
}

/// Measurements typed by the operator on a single comma-separated line.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialSample {
    values: Vec<f64>,
}

impl TrialSample {
    /// Tokens that are not numbers are dropped and do not count towards the
    /// minimum.
    pub fn parse(line: &str) -> Result<Self, DomainError> {
        let values = parse_measurement_line(line);
        if values.len() < MIN_TRIAL_SAMPLES {
            return Err(DomainError::InsufficientSamples {
                found: values.len(),
                required: MIN_TRIAL_SAMPLES,
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn stats(&self) -> Result<DerivedStat, DomainError> {
        DerivedStat::compute(&self.values)
    }
}

pub fn parse_measurement_line(line: &str) -> Vec<f64> {
    line.split(',')
        .map(|token| token.chars().filter(|ch| !ch.is_whitespace()).collect::<String>())
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .collect()
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
