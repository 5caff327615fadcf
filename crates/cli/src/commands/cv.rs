//! Offline dripper-uniformity computation, the same figures the chat trial shows.

use riego_core::errors::DomainError;
use riego_core::uniformity::TrialSample;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct CvReport {
    command: &'static str,
    status: &'static str,
    samples: usize,
    mean: f64,
    sample_std_dev: f64,
    cv: f64,
    band: &'static str,
}

/// `values` may be separate arguments or one comma-separated line.
pub fn run(values: &[String]) -> CommandResult {
    let line = values.join(",");

    let sample = match TrialSample::parse(&line) {
        Ok(sample) => sample,
        Err(error @ DomainError::InsufficientSamples { .. }) => {
            return CommandResult::failure("cv", "insufficient_samples", error.to_string(), 3);
        }
        Err(error) => return CommandResult::failure("cv", "invalid_input", error.to_string(), 3),
    };
    let stat = match sample.stats() {
        Ok(stat) => stat,
        Err(error) => return CommandResult::failure("cv", "invalid_input", error.to_string(), 3),
    };

    let report = CvReport {
        command: "cv",
        status: "ok",
        samples: sample.len(),
        mean: stat.display_mean(),
        sample_std_dev: stat.sample_std_dev,
        cv: stat.display_cv(),
        band: stat.band.label(),
    };
    match serde_json::to_string(&report) {
        Ok(output) => CommandResult::text(output),
        Err(error) => CommandResult::failure("cv", "serialization", error.to_string(), 1),
    }
}
