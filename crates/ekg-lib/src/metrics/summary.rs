use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::EkgError;

/// Amplitude extremes and mean, in the units of the input (µV for exports).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub sample_count: usize,
    pub max: f64,
    pub min: f64,
    pub mean: f64,
}

/// Samples whose jump from the previous sample exceeds the threshold.
///
/// This is a placeholder outlier rule, not a clinical arrhythmia detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrhythmiaReport {
    pub indices: Vec<usize>,
    pub count: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub summary: SignalSummary,
    pub arrhythmias: ArrhythmiaReport,
    pub sampling_rate: Option<f64>,
    pub duration_s: Option<f64>,
}

pub fn summarize(samples: &[f64]) -> Result<SignalSummary, EkgError> {
    if samples.is_empty() {
        return Err(EkgError::InsufficientData {
            needed: 1,
            actual: 0,
        });
    }
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Ok(SignalSummary {
        sample_count: samples.len(),
        max,
        min,
        mean,
    })
}

/// Standard deviation with `n` in the denominator.
pub fn population_std(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

/// Flag interior samples `1..=len-2` whose absolute step from the preceding
/// sample is larger than `factor` population standard deviations.
///
/// The first and last samples are never candidates.
pub fn detect_arrhythmias(samples: &[f64], factor: f64) -> ArrhythmiaReport {
    let threshold = factor * population_std(samples).unwrap_or(0.0);
    let mut indices = Vec::new();
    for i in 1..samples.len().saturating_sub(1) {
        if (samples[i] - samples[i - 1]).abs() > threshold {
            indices.push(i);
        }
    }
    ArrhythmiaReport {
        count: indices.len(),
        indices,
        threshold,
    }
}

pub fn analyze(
    samples: &[f64],
    sampling_rate: Option<f64>,
    config: &AnalysisConfig,
) -> Result<AnalysisSummary, EkgError> {
    let summary = summarize(samples)?;
    let arrhythmias = detect_arrhythmias(samples, config.threshold_factor);
    Ok(AnalysisSummary {
        summary,
        arrhythmias,
        sampling_rate,
        duration_s: sampling_rate.map(|fs| samples.len() as f64 / fs),
    })
}
