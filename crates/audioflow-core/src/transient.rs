//! Adaptive transient (onset) detection.
//!
//! Every detection variant shares one skeleton: debounce check, signal
//! derivation, bounded history update, adaptive threshold recomputation,
//! trigger decision, callback dispatch. The variants differ only in the
//! signal they monitor and, for spectral flux, in how sensitivity combines
//! with the rolling mean:
//!
//! - energy / band / kick / snare / hihat: `mean(history) + threshold * sensitivity`
//! - spectral flux: `mean(history) * (1 + sensitivity)`
//!
//! The two combination rules are intentionally kept distinct; unifying
//! them would change detection behavior for existing hosts.
//!
//! A suppressed (debounced) evaluation freezes the detector completely:
//! neither the history nor the adaptive threshold is touched until the
//! minimum interval has elapsed.
//!
//! The kick/snare/hihat variants hard-code band indices that are only
//! meaningful at 8-band resolution (kick: bands 0-1, snare: bands 2-3,
//! hihat: last two bands). Feeding them another resolution silently
//! monitors the wrong frequency content.

use crate::callbacks::{CallbackId, CallbackRegistry, OnsetCallback};
use crate::extractor::HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// History length required before the adaptive threshold replaces the
/// configured base threshold.
const ADAPTIVE_WARMUP: usize = 10;

/// Floor for the strength divisor, preventing blow-ups near silence
const MIN_STRENGTH_DIVISOR: f32 = 0.01;

/// Configuration for a [`TransientDetector`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Base detection threshold in `[0, 1]`
    pub threshold: f32,
    /// Detection sensitivity in `[0, 1]`; higher triggers more easily on
    /// the additive rule and less easily on the flux rule
    pub sensitivity: f32,
    /// Minimum time between triggers in milliseconds
    pub min_interval_ms: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            sensitivity: 0.5,
            min_interval_ms: 100.0,
        }
    }
}

/// Result of one detector evaluation
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DetectionResult {
    /// Whether a transient fired this evaluation
    pub triggered: bool,
    /// `signal / adaptive_threshold` when triggered, 0.0 otherwise
    pub strength: f32,
    /// Adaptive threshold at evaluation time
    pub threshold: f32,
    /// Host timestamp of the evaluation in milliseconds
    pub time_ms: f64,
}

/// Detector statistics snapshot for periodic external logging
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DetectorStats {
    /// Total triggers since construction or the last reset
    pub total_triggers: u64,
    /// Strength of the most recent trigger
    pub last_strength: f32,
    /// Current adaptive threshold
    pub adaptive_threshold: f32,
    /// Mean of the monitored-signal history
    pub history_mean: f32,
}

/// How sensitivity combines with the rolling mean
#[derive(Debug, Clone, Copy)]
enum ThresholdRule {
    /// `mean + threshold * sensitivity`
    Additive,
    /// `mean * (1 + sensitivity)`
    Multiplicative,
}

/// Single adaptive, debounced transient detector.
///
/// The detector owns all of its state exclusively; hosts that need
/// cross-thread access must synchronize the whole tick externally.
pub struct TransientDetector {
    threshold: f32,
    sensitivity: f32,
    min_interval_ms: f64,

    /// Timestamp of the last trigger; `None` until the first trigger, so a
    /// host clock starting at 0 is never debounced on its first tick
    last_trigger_ms: Option<f64>,

    /// Bounded history of the monitored signal
    history: VecDeque<f32>,
    adaptive_threshold: f32,

    /// Previous spectrum snapshot (spectral-flux variant only)
    prev_spectrum: Vec<f32>,

    total_triggers: u64,
    last_strength: f32,

    callbacks: CallbackRegistry,
}

impl TransientDetector {
    /// Create a detector. Threshold and sensitivity are clamped to
    /// `[0, 1]`, the interval to `>= 0`.
    pub fn new(config: DetectorConfig) -> Self {
        let threshold = config.threshold.clamp(0.0, 1.0);
        let sensitivity = config.sensitivity.clamp(0.0, 1.0);
        let min_interval_ms = config.min_interval_ms.max(0.0);

        debug!(
            "TransientDetector created: threshold={} sensitivity={} min_interval={}ms",
            threshold, sensitivity, min_interval_ms
        );

        Self {
            threshold,
            sensitivity,
            min_interval_ms,
            last_trigger_ms: None,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            adaptive_threshold: threshold,
            prev_spectrum: Vec::new(),
            total_triggers: 0,
            last_strength: 0.0,
            callbacks: CallbackRegistry::new(),
        }
    }

    /// Energy-based detection: monitors the raw peak level.
    pub fn detect_energy(&mut self, peak_level: f32, now_ms: f64) -> DetectionResult {
        if self.suppressed(now_ms) {
            return self.idle_result(now_ms);
        }
        self.evaluate(peak_level, ThresholdRule::Additive, "energy", now_ms)
    }

    /// Spectral-flux detection: monitors the sum of positive frame-to-frame
    /// magnitude increases. The first evaluation only seeds the spectrum
    /// snapshot and never triggers.
    pub fn detect_spectral_flux(&mut self, spectrum: &[f32], now_ms: f64) -> DetectionResult {
        if self.suppressed(now_ms) {
            return self.idle_result(now_ms);
        }

        if self.prev_spectrum.is_empty() {
            self.prev_spectrum = spectrum.to_vec();
            return self.idle_result(now_ms);
        }

        let flux: f32 = spectrum
            .iter()
            .zip(&self.prev_spectrum)
            .map(|(curr, prev)| (curr - prev).max(0.0))
            .sum();

        let result = self.evaluate(flux, ThresholdRule::Multiplicative, "spectral_flux", now_ms);

        self.prev_spectrum.clear();
        self.prev_spectrum.extend_from_slice(spectrum);

        result
    }

    /// Band detection: monitors one caller-selected index of a band-energy
    /// vector. An out-of-range index never triggers and leaves the
    /// detector state untouched.
    pub fn detect_band(&mut self, bands: &[f32], band_index: usize, now_ms: f64) -> DetectionResult {
        if self.suppressed(now_ms) {
            return self.idle_result(now_ms);
        }
        let Some(&signal) = bands.get(band_index) else {
            return self.idle_result(now_ms);
        };
        let label = format!("band_{band_index}");
        self.evaluate(signal, ThresholdRule::Additive, &label, now_ms)
    }

    /// Kick detection: average of bands 0-1 (8-band resolution).
    pub fn detect_kick(&mut self, bands: &[f32], now_ms: f64) -> DetectionResult {
        if self.suppressed(now_ms) {
            return self.idle_result(now_ms);
        }
        if bands.len() < 2 {
            return self.idle_result(now_ms);
        }
        let signal = (bands[0] + bands[1]) / 2.0;
        self.evaluate(signal, ThresholdRule::Additive, "kick", now_ms)
    }

    /// Snare detection: average of bands 2-3 (8-band resolution).
    pub fn detect_snare(&mut self, bands: &[f32], now_ms: f64) -> DetectionResult {
        if self.suppressed(now_ms) {
            return self.idle_result(now_ms);
        }
        if bands.len() < 4 {
            return self.idle_result(now_ms);
        }
        let signal = (bands[2] + bands[3]) / 2.0;
        self.evaluate(signal, ThresholdRule::Additive, "snare", now_ms)
    }

    /// Hi-hat detection: average of the last two bands (8-band resolution).
    pub fn detect_hihat(&mut self, bands: &[f32], now_ms: f64) -> DetectionResult {
        if self.suppressed(now_ms) {
            return self.idle_result(now_ms);
        }
        if bands.len() < 6 {
            return self.idle_result(now_ms);
        }
        let signal = (bands[bands.len() - 2] + bands[bands.len() - 1]) / 2.0;
        self.evaluate(signal, ThresholdRule::Additive, "hihat", now_ms)
    }

    /// Shared evaluation skeleton for every non-suppressed variant call.
    fn evaluate(
        &mut self,
        signal: f32,
        rule: ThresholdRule,
        label: &str,
        now_ms: f64,
    ) -> DetectionResult {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(signal);

        self.adaptive_threshold = if self.history.len() > ADAPTIVE_WARMUP {
            let mean = self.history_mean();
            match rule {
                ThresholdRule::Additive => mean + self.threshold * self.sensitivity,
                ThresholdRule::Multiplicative => mean * (1.0 + self.sensitivity),
            }
        } else {
            self.threshold
        };

        let triggered = signal > self.adaptive_threshold;
        let strength = if triggered {
            signal / self.adaptive_threshold.max(MIN_STRENGTH_DIVISOR)
        } else {
            0.0
        };

        if triggered {
            self.last_trigger_ms = Some(now_ms);
            self.total_triggers += 1;
            self.last_strength = strength;
            trace!(
                label,
                strength,
                threshold = self.adaptive_threshold,
                "transient triggered"
            );
            self.callbacks.fire(strength, label);
        }

        DetectionResult {
            triggered,
            strength,
            threshold: self.adaptive_threshold,
            time_ms: now_ms,
        }
    }

    fn suppressed(&self, now_ms: f64) -> bool {
        matches!(self.last_trigger_ms, Some(t) if now_ms - t < self.min_interval_ms)
    }

    /// Non-triggered result that reflects current state without mutating it
    fn idle_result(&self, now_ms: f64) -> DetectionResult {
        DetectionResult {
            triggered: false,
            strength: 0.0,
            threshold: self.adaptive_threshold,
            time_ms: now_ms,
        }
    }

    fn history_mean(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    /// Register a trigger subscriber
    pub fn add_callback(&mut self, callback: OnsetCallback) -> CallbackId {
        self.callbacks.add(callback)
    }

    /// Remove a trigger subscriber
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(id)
    }

    /// Number of subscriber invocations that have failed
    pub fn callback_failures(&self) -> u64 {
        self.callbacks.failures()
    }

    /// Set the base threshold, clamped to `[0, 1]`
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    /// Set the sensitivity, clamped to `[0, 1]`
    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity.clamp(0.0, 1.0);
    }

    /// Set the minimum inter-trigger interval, clamped to `>= 0`
    pub fn set_min_interval(&mut self, interval_ms: f64) {
        self.min_interval_ms = interval_ms.max(0.0);
    }

    /// Current configuration
    pub fn config(&self) -> DetectorConfig {
        DetectorConfig {
            threshold: self.threshold,
            sensitivity: self.sensitivity,
            min_interval_ms: self.min_interval_ms,
        }
    }

    /// Clear trigger state, history and the spectrum snapshot while
    /// preserving threshold/sensitivity/interval configuration.
    pub fn reset(&mut self) {
        self.last_trigger_ms = None;
        self.history.clear();
        self.adaptive_threshold = self.threshold;
        self.prev_spectrum.clear();
        self.total_triggers = 0;
        self.last_strength = 0.0;
        debug!("TransientDetector reset");
    }

    /// Statistics snapshot
    pub fn statistics(&self) -> DetectorStats {
        DetectorStats {
            total_triggers: self.total_triggers,
            last_strength: self.last_strength,
            adaptive_threshold: self.adaptive_threshold,
            history_mean: self.history_mean(),
        }
    }
}

impl Default for TransientDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
