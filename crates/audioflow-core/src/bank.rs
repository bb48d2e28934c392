//! Named detector aggregation with per-instrument presets.
//!
//! The bank owns one detector per instrument and fans the same 8-band
//! energy vector into each detector's specialized variant once per tick.
//! Detector state never leaves the bank; hosts reach individual detectors
//! through name-keyed accessors.

use crate::transient::{DetectionResult, DetectorConfig, TransientDetector};
use crate::{CoreError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Name of the kick detector
pub const KICK: &str = "kick";
/// Name of the snare detector
pub const SNARE: &str = "snare";
/// Name of the hi-hat detector
pub const HIHAT: &str = "hihat";
/// Name of the general-purpose detector (monitors band 0)
pub const GENERAL: &str = "general";

/// Multi-detector aggregator with instrument presets.
///
/// The presets assume 8-band resolution; see [`TransientDetector`] for the
/// band indices each instrument variant monitors.
pub struct DetectorBank {
    detectors: HashMap<String, TransientDetector>,
}

impl DetectorBank {
    /// Create a bank with the four instrument presets
    pub fn new() -> Self {
        let mut detectors = HashMap::new();
        detectors.insert(
            KICK.to_string(),
            TransientDetector::new(DetectorConfig {
                threshold: 0.3,
                sensitivity: 0.5,
                min_interval_ms: 100.0,
            }),
        );
        detectors.insert(
            SNARE.to_string(),
            TransientDetector::new(DetectorConfig {
                threshold: 0.35,
                sensitivity: 0.6,
                min_interval_ms: 80.0,
            }),
        );
        detectors.insert(
            HIHAT.to_string(),
            TransientDetector::new(DetectorConfig {
                threshold: 0.25,
                sensitivity: 0.7,
                min_interval_ms: 50.0,
            }),
        );
        detectors.insert(
            GENERAL.to_string(),
            TransientDetector::new(DetectorConfig {
                threshold: 0.3,
                sensitivity: 0.5,
                min_interval_ms: 100.0,
            }),
        );

        debug!("DetectorBank created with {} detectors", detectors.len());
        Self { detectors }
    }

    /// Evaluate every detector against the same band vector.
    ///
    /// The instrument names route to their specialized variants; any other
    /// (host-added) detector monitors band 0 as a generic band detector.
    pub fn evaluate_all(
        &mut self,
        bands: &[f32],
        now_ms: f64,
    ) -> HashMap<String, DetectionResult> {
        let mut results = HashMap::with_capacity(self.detectors.len());
        for (name, detector) in &mut self.detectors {
            let result = match name.as_str() {
                KICK => detector.detect_kick(bands, now_ms),
                SNARE => detector.detect_snare(bands, now_ms),
                HIHAT => detector.detect_hihat(bands, now_ms),
                _ => detector.detect_band(bands, 0, now_ms),
            };
            results.insert(name.clone(), result);
        }
        results
    }

    /// Look up a detector by name
    pub fn detector(&self, name: &str) -> Option<&TransientDetector> {
        self.detectors.get(name)
    }

    /// Look up a detector by name for mutation (tuning, callbacks)
    pub fn detector_mut(&mut self, name: &str) -> Option<&mut TransientDetector> {
        self.detectors.get_mut(name)
    }

    /// Insert or replace a detector under the given name
    pub fn set_detector(&mut self, name: impl Into<String>, detector: TransientDetector) {
        let name = name.into();
        debug!("DetectorBank: detector '{}' installed", name);
        self.detectors.insert(name, detector);
    }

    /// Reconfigure a named detector, clamping per the usual rules
    pub fn configure(&mut self, name: &str, config: DetectorConfig) -> Result<()> {
        let detector = self
            .detectors
            .get_mut(name)
            .ok_or_else(|| CoreError::UnknownDetector(name.to_string()))?;
        detector.set_threshold(config.threshold);
        detector.set_sensitivity(config.sensitivity);
        detector.set_min_interval(config.min_interval_ms);
        Ok(())
    }

    /// Names of all registered detectors
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }

    /// Number of registered detectors
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Whether the bank has no detectors
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Reset every detector, preserving per-detector configuration
    pub fn reset_all(&mut self) {
        for detector in self.detectors.values_mut() {
            detector.reset();
        }
        debug!("DetectorBank reset");
    }
}

impl Default for DetectorBank {
    fn default() -> Self {
        Self::new()
    }
}
