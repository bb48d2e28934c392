//! Smoothed spectral and level feature extraction.
//!
//! The extractor follows Web Audio `AnalyserNode` conventions: the host
//! supplies a magnitude spectrum (FFT already done upstream) and a raw
//! waveform window once per tick, and the extractor maintains the smoothed
//! state across ticks:
//!
//! - Per-bin exponential smoothing: `out = c * prev + (1 - c) * new`
//! - RMS and peak levels over the waveform window
//! - An asymmetric attack/release envelope follower on the peak
//! - Band energies at 8/16/32 band resolutions over the smoothed spectrum
//!
//! Band boundaries are `floor(bin_count / num_bands * i)`. When the bin
//! count is smaller than the band count some groups are empty and report
//! 0.0; that truncation artifact is part of the contract, not a defect.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Capacity of the RMS/peak (and detector signal) history buffers.
pub const HISTORY_CAPACITY: usize = 60;

/// Configuration for [`FeatureExtractor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// FFT size used by the host analyzer (power of 2). The extractor
    /// tracks `fft_size / 2` magnitude bins.
    pub fft_size: usize,
    /// Smoothing time constant in `[0, 1]`. 1.0 holds the previous value,
    /// 0.0 replaces it instantly (Web Audio convention).
    pub smoothing: f32,
    /// Envelope attack time in milliseconds
    pub attack_ms: f32,
    /// Envelope release time in milliseconds
    pub release_ms: f32,
    /// Analysis tick rate in ticks per second (host frame clock)
    pub tick_rate: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            attack_ms: 16.0,
            release_ms: 500.0,
            tick_rate: 60.0,
        }
    }
}

/// Band resolutions produced every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandResolution {
    /// 8 bands (used by the instrument detectors)
    Eight,
    /// 16 bands
    Sixteen,
    /// 32 bands
    ThirtyTwo,
}

impl BandResolution {
    /// Number of bands at this resolution
    pub fn count(self) -> usize {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32,
        }
    }
}

/// Band energies at every configured resolution
#[derive(Debug, Clone, Serialize)]
pub struct BandSet {
    /// 8-band energies
    pub bands_8: [f32; 8],
    /// 16-band energies
    pub bands_16: [f32; 16],
    /// 32-band energies
    pub bands_32: [f32; 32],
}

impl Default for BandSet {
    fn default() -> Self {
        Self {
            bands_8: [0.0; 8],
            bands_16: [0.0; 16],
            bands_32: [0.0; 32],
        }
    }
}

impl BandSet {
    /// Band vector at the given resolution
    pub fn at(&self, resolution: BandResolution) -> &[f32] {
        match resolution {
            BandResolution::Eight => &self.bands_8,
            BandResolution::Sixteen => &self.bands_16,
            BandResolution::ThirtyTwo => &self.bands_32,
        }
    }
}

/// Immutable per-tick feature snapshot
#[derive(Debug, Clone, Serialize)]
pub struct FeatureFrame {
    /// Exponentially smoothed magnitude spectrum (`fft_size / 2` bins)
    pub spectrum: Vec<f32>,
    /// RMS level of the current waveform window
    pub rms: f32,
    /// Peak level of the current waveform window
    pub peak: f32,
    /// Envelope follower output (0.0 - 1.0)
    pub envelope: f32,
    /// Band energies at 8/16/32 band resolutions
    pub bands: BandSet,
}

/// Per-tick feature extractor with persistent smoothing state
pub struct FeatureExtractor {
    config: ExtractorConfig,
    bin_count: usize,

    /// Smoothed magnitude spectrum (persists across ticks)
    spectrum: Vec<f32>,

    /// Envelope follower state
    envelope: f32,
    attack_ticks: u32,
    release_ticks: u32,

    /// Level histories for windowed statistics
    rms_history: VecDeque<f32>,
    peak_history: VecDeque<f32>,

    tick_count: u64,
}

/// Convert a millisecond time constant to a whole tick count (>= 1)
fn ms_to_ticks(ms: f32, tick_rate: f32) -> u32 {
    ((ms / 1000.0) * tick_rate).round().max(1.0) as u32
}

impl FeatureExtractor {
    /// Create a new extractor. Smoothing is clamped to `[0, 1]`.
    pub fn new(config: ExtractorConfig) -> Self {
        let mut config = config;
        config.smoothing = config.smoothing.clamp(0.0, 1.0);

        let bin_count = config.fft_size / 2;
        let attack_ticks = ms_to_ticks(config.attack_ms, config.tick_rate);
        let release_ticks = ms_to_ticks(config.release_ms, config.tick_rate);

        debug!(
            "FeatureExtractor created: fft_size={}, bins={}, smoothing={}, attack={}t, release={}t",
            config.fft_size, bin_count, config.smoothing, attack_ticks, release_ticks
        );

        Self {
            config,
            bin_count,
            spectrum: vec![0.0; bin_count],
            envelope: 0.0,
            attack_ticks,
            release_ticks,
            rms_history: VecDeque::with_capacity(HISTORY_CAPACITY),
            peak_history: VecDeque::with_capacity(HISTORY_CAPACITY),
            tick_count: 0,
        }
    }

    /// Process one tick of host data and produce a feature snapshot.
    ///
    /// An empty spectrum or waveform yields a frame of zeros at the
    /// configured sizes and leaves all smoothing state untouched;
    /// downstream consumers rely on the stable shape.
    pub fn process(&mut self, spectrum: &[f32], waveform: &[f32]) -> FeatureFrame {
        if spectrum.is_empty() || waveform.is_empty() {
            return self.empty_frame();
        }

        self.tick_count += 1;

        // Exponential smoothing per bin. Bins past the shorter of the two
        // lengths keep their previous value.
        let c = self.config.smoothing;
        let bins = spectrum.len().min(self.bin_count);
        for i in 0..bins {
            let sample = if spectrum[i].is_finite() { spectrum[i] } else { 0.0 };
            self.spectrum[i] = c * self.spectrum[i] + (1.0 - c) * sample;
        }

        let rms = Self::calculate_rms(waveform);
        let peak = waveform
            .iter()
            .map(|s| if s.is_finite() { s.abs() } else { 0.0 })
            .fold(0.0f32, f32::max);

        // Attack/release envelope on the peak
        if peak > self.envelope {
            self.envelope += (peak - self.envelope) / self.attack_ticks as f32;
        } else {
            self.envelope -= (self.envelope - peak) / self.release_ticks as f32;
        }
        self.envelope = self.envelope.clamp(0.0, 1.0);

        push_bounded(&mut self.rms_history, rms);
        push_bounded(&mut self.peak_history, peak);

        let bands = BandSet {
            bands_8: self.band_energies(),
            bands_16: self.band_energies(),
            bands_32: self.band_energies(),
        };

        if self.tick_count % 100 == 0 {
            trace!(
                "tick #{}: rms={:.4} peak={:.4} env={:.4} low_bands={:?}",
                self.tick_count,
                rms,
                peak,
                self.envelope,
                &bands.bands_8[..3]
            );
        }

        FeatureFrame {
            spectrum: self.spectrum.clone(),
            rms,
            peak,
            envelope: self.envelope,
            bands,
        }
    }

    /// Average magnitude of the current smoothed spectrum within a Hz range.
    ///
    /// Returns 0.0 for an empty or inverted range, or a range entirely
    /// outside the tracked bins.
    pub fn frequency_range_energy(&self, min_hz: f32, max_hz: f32, sample_rate: f32) -> f32 {
        let freq_per_bin = sample_rate / self.config.fft_size as f32;
        if freq_per_bin <= 0.0 || !freq_per_bin.is_finite() || self.bin_count == 0 {
            return 0.0;
        }

        // A range that falls entirely past the tracked bins yields 0 rather
        // than clamping onto the topmost bin.
        let start = (min_hz / freq_per_bin) as usize;
        let end = ((max_hz / freq_per_bin) as usize).min(self.bin_count);
        if end <= start {
            return 0.0;
        }

        let sum: f32 = self.spectrum[start..end].iter().sum();
        sum / (end - start) as f32
    }

    /// Average RMS over the most recent `ticks` history entries (or fewer
    /// if the history is shorter). Returns 0.0 for an empty history.
    pub fn history_average(&self, ticks: usize) -> f32 {
        recent(&self.rms_history, ticks)
            .map(|window| window.iter().sum::<f32>() / window.len() as f32)
            .unwrap_or(0.0)
    }

    /// Maximum peak over the most recent `ticks` history entries (or fewer
    /// if the history is shorter). Returns 0.0 for an empty history.
    pub fn history_max(&self, ticks: usize) -> f32 {
        recent(&self.peak_history, ticks)
            .map(|window| window.iter().copied().fold(0.0f32, f32::max))
            .unwrap_or(0.0)
    }

    /// Reconfigure the envelope follower time constants at runtime.
    pub fn set_attack_release(&mut self, attack_ms: f32, release_ms: f32) {
        self.config.attack_ms = attack_ms;
        self.config.release_ms = release_ms;
        self.attack_ticks = ms_to_ticks(attack_ms, self.config.tick_rate);
        self.release_ticks = ms_to_ticks(release_ms, self.config.tick_rate);
        debug!(
            "envelope reconfigured: attack={}t release={}t",
            self.attack_ticks, self.release_ticks
        );
    }

    /// Reset all smoothed state and histories. Configuration is preserved.
    pub fn reset(&mut self) {
        self.spectrum.fill(0.0);
        self.envelope = 0.0;
        self.rms_history.clear();
        self.peak_history.clear();
        self.tick_count = 0;
        debug!("FeatureExtractor reset");
    }

    /// Current smoothed spectrum
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    /// Number of tracked magnitude bins (`fft_size / 2`)
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Current envelope follower value
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Extractor configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = samples
            .iter()
            .map(|s| if s.is_finite() { s * s } else { 0.0 })
            .sum();
        (sum / samples.len() as f32).sqrt()
    }

    /// Partition the smoothed spectrum into `N` contiguous groups and
    /// average each. Empty groups (bin_count < N) report 0.0.
    fn band_energies<const N: usize>(&self) -> [f32; N] {
        let mut out = [0.0f32; N];
        for band in 0..N {
            // floor(bin_count / N * band); exact for power-of-two N
            let start = self.bin_count * band / N;
            let end = self.bin_count * (band + 1) / N;
            if end > start {
                let sum: f32 = self.spectrum[start..end].iter().sum();
                out[band] = sum / (end - start) as f32;
            }
        }
        out
    }

    fn empty_frame(&self) -> FeatureFrame {
        FeatureFrame {
            spectrum: vec![0.0; self.bin_count],
            rms: 0.0,
            peak: 0.0,
            envelope: 0.0,
            bands: BandSet::default(),
        }
    }
}

fn push_bounded(history: &mut VecDeque<f32>, value: f32) {
    if history.len() >= HISTORY_CAPACITY {
        history.pop_front();
    }
    history.push_back(value);
}

fn recent(history: &VecDeque<f32>, ticks: usize) -> Option<Vec<f32>> {
    if history.is_empty() || ticks == 0 {
        return None;
    }
    let skip = history.len().saturating_sub(ticks);
    Some(history.iter().skip(skip).copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_config() -> ExtractorConfig {
        ExtractorConfig {
            fft_size: 16,
            smoothing: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_rms_calculation() {
        // Full-scale sine has RMS of ~0.707
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.1).sin()).collect();
        let rms = FeatureExtractor::calculate_rms(&samples);
        assert!(rms > 0.6 && rms < 0.8, "RMS was {}", rms);
    }

    #[test]
    fn test_empty_input_returns_zero_frame() {
        let mut extractor = FeatureExtractor::new(ExtractorConfig::default());
        let frame = extractor.process(&[], &[0.5; 128]);

        assert_eq!(frame.spectrum.len(), 1024);
        assert!(frame.spectrum.iter().all(|&m| m == 0.0));
        assert_eq!(frame.rms, 0.0);
        assert_eq!(frame.peak, 0.0);
        assert_eq!(frame.envelope, 0.0);
        assert!(frame.bands.bands_32.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_empty_input_leaves_state_untouched() {
        let mut extractor = FeatureExtractor::new(small_config());
        extractor.process(&[1.0; 8], &[0.5; 64]);
        let before = extractor.spectrum().to_vec();

        extractor.process(&[], &[]);
        assert_eq!(extractor.spectrum(), &before[..]);
    }

    #[test]
    fn test_smoothing_instant_at_zero() {
        let mut extractor = FeatureExtractor::new(small_config());
        let frame = extractor.process(&[0.25; 8], &[0.1; 64]);
        assert!(frame.spectrum[..8].iter().all(|&m| m == 0.25));
    }

    #[test]
    fn test_smoothing_partial_update() {
        let mut extractor = FeatureExtractor::new(ExtractorConfig {
            fft_size: 16,
            smoothing: 0.8,
            ..Default::default()
        });

        extractor.process(&[1.0; 8], &[0.1; 64]);
        // out = 0.8 * 0.0 + 0.2 * 1.0
        assert!((extractor.spectrum()[0] - 0.2).abs() < 1e-6);

        extractor.process(&[1.0; 8], &[0.1; 64]);
        // out = 0.8 * 0.2 + 0.2 * 1.0
        assert!((extractor.spectrum()[0] - 0.36).abs() < 1e-6);
    }

    #[test]
    fn test_short_spectrum_leaves_tail_bins() {
        let mut extractor = FeatureExtractor::new(small_config());
        extractor.process(&[1.0; 8], &[0.1; 64]);
        // Only 4 bins supplied this tick; bins 4..8 keep their value
        extractor.process(&[0.5; 4], &[0.1; 64]);

        assert_eq!(extractor.spectrum()[0], 0.5);
        assert_eq!(extractor.spectrum()[5], 1.0);
    }

    #[test]
    fn test_envelope_attack_and_release() {
        // attack 16ms @ 60Hz -> 1 tick, release 500ms -> 30 ticks
        let mut extractor = FeatureExtractor::new(ExtractorConfig {
            fft_size: 16,
            ..Default::default()
        });

        let frame = extractor.process(&[0.1; 8], &[1.0; 64]);
        assert!((frame.envelope - 1.0).abs() < 1e-6, "instant attack");

        let frame = extractor.process(&[0.1; 8], &[0.0; 64]);
        let expected = 1.0 - 1.0 / 30.0;
        assert!(
            (frame.envelope - expected).abs() < 1e-6,
            "slow release, envelope={}",
            frame.envelope
        );
    }

    #[test]
    fn test_band_partition_boundaries() {
        // 10 bins, instant smoothing: bands_8 boundaries are floor(10/8 * i)
        let mut extractor = FeatureExtractor::new(ExtractorConfig {
            fft_size: 20,
            smoothing: 0.0,
            ..Default::default()
        });

        let spectrum: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let frame = extractor.process(&spectrum, &[0.1; 64]);

        let expected = [0.0, 1.0, 2.0, 3.5, 5.0, 6.0, 7.0, 8.5];
        for (band, (&got, &want)) in frame.bands.bands_8.iter().zip(&expected).enumerate() {
            assert!((got - want).abs() < 1e-6, "band {}: {} != {}", band, got, want);
        }
    }

    #[test]
    fn test_band_truncation_artifact() {
        // 10 bins into 16 bands leaves empty groups that must report 0.0
        let mut extractor = FeatureExtractor::new(ExtractorConfig {
            fft_size: 20,
            smoothing: 0.0,
            ..Default::default()
        });

        let frame = extractor.process(&[1.0; 10], &[0.1; 64]);
        let empty = frame.bands.bands_16.iter().filter(|&&b| b == 0.0).count();
        let filled = frame.bands.bands_16.iter().filter(|&&b| b > 0.0).count();
        assert!(empty > 0, "expected at least one empty group");
        assert!(filled > 0);
    }

    #[test]
    fn test_frequency_range_energy() {
        let mut extractor = FeatureExtractor::new(ExtractorConfig {
            fft_size: 2048,
            smoothing: 0.0,
            ..Default::default()
        });

        // Flat spectrum of 0.5
        extractor.process(&vec![0.5; 1024], &[0.1; 64]);

        let energy = extractor.frequency_range_energy(100.0, 1000.0, 44100.0);
        assert!((energy - 0.5).abs() < 1e-6);

        // Degenerate and out-of-range queries return 0
        assert_eq!(extractor.frequency_range_energy(0.0, 0.0, 44100.0), 0.0);
        assert_eq!(
            extractor.frequency_range_energy(30_000.0, 40_000.0, 44100.0),
            0.0
        );
        assert_eq!(extractor.frequency_range_energy(500.0, 100.0, 44100.0), 0.0);
    }

    #[test]
    fn test_history_statistics() {
        let mut extractor = FeatureExtractor::new(small_config());
        assert_eq!(extractor.history_average(30), 0.0);
        assert_eq!(extractor.history_max(30), 0.0);

        // Three ticks of known levels; history shorter than the window
        for level in [0.2f32, 0.4, 0.6] {
            extractor.process(&[0.1; 8], &[level; 64]);
        }
        assert!((extractor.history_average(30) - 0.4).abs() < 1e-6);
        assert!((extractor.history_max(30) - 0.6).abs() < 1e-6);

        // Window of 1 sees only the newest entry
        assert!((extractor.history_average(1) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut extractor = FeatureExtractor::new(small_config());
        for i in 0..(HISTORY_CAPACITY + 20) {
            let level = if i < 20 { 1.0 } else { 0.1 };
            extractor.process(&[0.1; 8], &[level; 64]);
        }
        // The early 1.0 peaks have been evicted
        assert!((extractor.history_max(HISTORY_CAPACITY) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_reset_matches_fresh_instance() {
        let mut used = FeatureExtractor::new(ExtractorConfig::default());
        for _ in 0..10 {
            used.process(&[0.7; 1024], &[0.5; 128]);
        }
        used.reset();

        let mut fresh = FeatureExtractor::new(ExtractorConfig::default());

        let spectrum: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.01).sin().abs()).collect();
        let waveform: Vec<f32> = (0..128).map(|i| (i as f32 * 0.3).sin()).collect();

        let a = used.process(&spectrum, &waveform);
        let b = fresh.process(&spectrum, &waveform);

        assert_eq!(a.spectrum, b.spectrum);
        assert_eq!(a.rms, b.rms);
        assert_eq!(a.peak, b.peak);
        assert_eq!(a.envelope, b.envelope);
        assert_eq!(a.bands.bands_8, b.bands.bands_8);
    }

    #[test]
    fn test_set_attack_release_tick_conversion() {
        let mut extractor = FeatureExtractor::new(ExtractorConfig::default());
        // Sub-tick times round up to a single tick
        extractor.set_attack_release(0.1, 0.1);
        assert_eq!(extractor.attack_ticks, 1);
        assert_eq!(extractor.release_ticks, 1);

        extractor.set_attack_release(100.0, 1000.0);
        assert_eq!(extractor.attack_ticks, 6);
        assert_eq!(extractor.release_ticks, 60);
    }

    #[test]
    fn test_non_finite_input_is_sanitized() {
        let mut extractor = FeatureExtractor::new(small_config());
        let frame = extractor.process(
            &[f32::NAN, f32::INFINITY, 0.5, 0.5],
            &[f32::NAN, f32::NEG_INFINITY, 0.0],
        );

        assert!(frame.rms.is_finite());
        assert!(frame.peak.is_finite());
        assert!(frame.spectrum.iter().all(|m| m.is_finite()));
    }

    proptest! {
        #[test]
        fn prop_smoothing_converges_monotonically(
            c in 0.0f32..=1.0,
            target in 0.0f32..=1.0,
        ) {
            let mut extractor = FeatureExtractor::new(ExtractorConfig {
                fft_size: 16,
                smoothing: c,
                ..Default::default()
            });

            let spectrum = [target; 8];
            let mut prev_err = target.abs();
            for _ in 0..50 {
                extractor.process(&spectrum, &[0.1; 32]);
                let err = (extractor.spectrum()[0] - target).abs();
                prop_assert!(err <= prev_err + 1e-6);
                prev_err = err;
            }

            if c == 0.0 {
                prop_assert!((extractor.spectrum()[0] - target).abs() < 1e-6);
            }
        }
    }
}
