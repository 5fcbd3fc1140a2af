//! Approximate response size and threshold math.

use serde::Serialize;

use crate::http::envelope::ResponseEnvelope;
use crate::protocol::{DEFAULT_SIZE_LIMIT_MB, TO_MB_FACTOR};

/// Threshold configuration shared by the guard and the observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Fraction of `size_limit_mb` that triggers a warning.
    pub warn: f64,
    /// Fraction of `size_limit_mb` that triggers the error path.
    pub error: f64,
    pub size_limit_mb: f64,
}

impl Thresholds {
    pub fn new(warn: f64, error: f64, size_limit_mb: f64) -> Self {
        Self {
            warn,
            error,
            size_limit_mb,
        }
    }

    pub fn warn_mb(&self) -> f64 {
        self.warn * self.size_limit_mb
    }

    pub fn error_mb(&self) -> f64 {
        self.error * self.size_limit_mb
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(0.8, 0.95, DEFAULT_SIZE_LIMIT_MB)
    }
}

/// Where a measured size falls relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBand {
    BelowWarn,
    Warn,
    Error,
}

/// Size of one response measured against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeAssessment {
    pub approx_bytes: usize,
    pub approx_mb: f64,
    pub warn_threshold_mb: f64,
    pub error_threshold_mb: f64,
}

impl SizeAssessment {
    /// Measure `body + "k: v" headers joined by spaces`. This over-approximates
    /// the wire size on purpose.
    pub fn measure(envelope: &ResponseEnvelope, thresholds: &Thresholds) -> Self {
        let approx_bytes = envelope.body.len() + envelope.headers.serialized_len();
        Self {
            approx_bytes,
            approx_mb: approx_bytes as f64 / TO_MB_FACTOR,
            warn_threshold_mb: thresholds.warn_mb(),
            error_threshold_mb: thresholds.error_mb(),
        }
    }

    /// Pass is checked first, so a misconfigured `error < warn` never
    /// escalates a response that sits below the warn threshold.
    pub fn band(&self) -> SizeBand {
        if self.approx_mb < self.warn_threshold_mb {
            SizeBand::BelowWarn
        } else if self.approx_mb < self.error_threshold_mb {
            SizeBand::Warn
        } else {
            SizeBand::Error
        }
    }

    /// Size in MB rounded to two decimals, as reported to clients.
    pub fn size_mb_display(&self) -> String {
        format!("{:.2}", self.approx_mb)
    }
}
