//! AudioFlow Core - Real-Time Audio Feature Extraction and Onset Detection
//!
//! This crate contains the analysis core for AudioFlow, including:
//! - Spectral/level feature extraction with Web Audio style smoothing
//! - Attack/release envelope following
//! - Multi-resolution frequency band energies (8/16/32 bands)
//! - Adaptive, debounced transient detection (kick/snare/hihat/generic)
//! - Per-tick pipeline composition for host frame clocks
//!
//! The core is single-threaded and tick-driven: the host feeds one spectral
//! snapshot and one waveform window per frame, and consumes the resulting
//! [`FeatureFrame`] and per-detector [`DetectionResult`]s synchronously.
//! Control routing (MIDI) and network export (OSC) live outside this crate
//! and consume the serialized outputs.
//!
//! ## Modules
//!
//! - [`extractor`] - Smoothed spectral/level feature extraction
//! - [`transient`] - Adaptive-threshold transient detection
//! - [`bank`] - Named detector aggregation with instrument presets
//! - [`callbacks`] - Subscriber registry for trigger notifications
//! - [`engine`] - Per-tick extraction + detection pipeline
//! - [`presets`] - Named frequency range presets (EQ, instruments, octaves)
//! - [`logging`] - Tracing initialization for embedding hosts

#![warn(missing_docs)]

use thiserror::Error;

pub mod bank;
pub mod callbacks;
pub mod engine;
pub mod extractor;
pub mod logging;
pub mod presets;
pub mod transient;

// --- Re-exports grouped by category ---

// Feature extraction
pub use extractor::{
    BandResolution, BandSet, ExtractorConfig, FeatureExtractor, FeatureFrame, HISTORY_CAPACITY,
};

// Transient detection
pub use bank::DetectorBank;
pub use transient::{DetectionResult, DetectorConfig, DetectorStats, TransientDetector};

// Pipeline
pub use callbacks::{CallbackId, CallbackRegistry, OnsetCallback};
pub use engine::{AnalysisEngine, TickOutput};

// Presets & Logging
pub use logging::LogConfig;
pub use presets::{BandPreset, FrequencyRange};

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Detector lookup by name failed
    #[error("Unknown detector: {0}")]
    UnknownDetector(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
