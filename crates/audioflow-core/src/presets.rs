//! Named frequency range presets for use with
//! [`FeatureExtractor::frequency_range_energy`](crate::FeatureExtractor::frequency_range_energy).

use serde::{Deserialize, Serialize};

/// A contiguous frequency range in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    /// Lower bound in Hz (inclusive)
    pub min_hz: f32,
    /// Upper bound in Hz (exclusive)
    pub max_hz: f32,
}

impl FrequencyRange {
    /// Shorthand constructor
    pub const fn new(min_hz: f32, max_hz: f32) -> Self {
        Self { min_hz, max_hz }
    }
}

/// Standard EQ bands
const EQ_BANDS: &[(&str, FrequencyRange)] = &[
    ("sub_bass", FrequencyRange::new(20.0, 60.0)),
    ("bass", FrequencyRange::new(60.0, 250.0)),
    ("low_mid", FrequencyRange::new(250.0, 500.0)),
    ("mid", FrequencyRange::new(500.0, 2000.0)),
    ("high_mid", FrequencyRange::new(2000.0, 4000.0)),
    ("presence", FrequencyRange::new(4000.0, 6000.0)),
    ("brilliance", FrequencyRange::new(6000.0, 20000.0)),
];

/// Typical instrument energy ranges
const INSTRUMENT_RANGES: &[(&str, FrequencyRange)] = &[
    ("kick", FrequencyRange::new(40.0, 100.0)),
    ("bass", FrequencyRange::new(40.0, 250.0)),
    ("snare", FrequencyRange::new(150.0, 250.0)),
    ("vocals", FrequencyRange::new(300.0, 3400.0)),
    ("hi_hat", FrequencyRange::new(5000.0, 10000.0)),
    ("cymbals", FrequencyRange::new(8000.0, 16000.0)),
];

/// ISO octave bands, keyed by center frequency
const OCTAVE_BANDS: &[(&str, FrequencyRange)] = &[
    ("31.5", FrequencyRange::new(22.0, 44.0)),
    ("63", FrequencyRange::new(44.0, 88.0)),
    ("125", FrequencyRange::new(88.0, 177.0)),
    ("250", FrequencyRange::new(177.0, 355.0)),
    ("500", FrequencyRange::new(355.0, 710.0)),
    ("1k", FrequencyRange::new(710.0, 1420.0)),
    ("2k", FrequencyRange::new(1420.0, 2840.0)),
    ("4k", FrequencyRange::new(2840.0, 5680.0)),
    ("8k", FrequencyRange::new(5680.0, 11360.0)),
    ("16k", FrequencyRange::new(11360.0, 22720.0)),
];

/// Preset families of named frequency ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandPreset {
    /// Standard EQ bands (sub_bass .. brilliance)
    Eq,
    /// Musical instrument ranges (kick, snare, vocals, ...)
    Instruments,
    /// ISO standard octave bands (31.5 Hz .. 16 kHz centers)
    Octaves,
}

impl BandPreset {
    /// All `(name, range)` pairs in this preset, in ascending frequency order
    pub fn table(self) -> &'static [(&'static str, FrequencyRange)] {
        match self {
            Self::Eq => EQ_BANDS,
            Self::Instruments => INSTRUMENT_RANGES,
            Self::Octaves => OCTAVE_BANDS,
        }
    }

    /// Band names in this preset
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        self.table().iter().map(|(name, _)| *name)
    }

    /// Range for a named band, if the preset defines it
    pub fn range(self, name: &str) -> Option<FrequencyRange> {
        self.table()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, range)| *range)
    }
}
