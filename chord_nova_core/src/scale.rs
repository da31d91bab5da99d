// Pitch-class scales that restrict the search universe.
//
// A `Scale` is a 12-bit pitch-class mask. Configuration documents carry the
// scale as a list of pitch classes (`overall_scale`); an empty list falls
// back to the full chromatic set rather than producing an empty universe.
//
// This module provides:
// - Named presets (Chromatic, Major, Natural Minor, Harmonic Minor,
//   Pentatonic, Blues, Whole Tone) with the tonic at pitch class 0
// - Transposition of a scale to another tonic
// - Membership tests and range listing used by the search space (space.rs)

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::pitch::mask_pitch_classes;

const CHROMATIC_MASK: u16 = 0x0FFF;

/// The scale presets offered by the configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalePreset {
    Chromatic,
    Major,
    #[serde(rename = "Natural Minor")]
    NaturalMinor,
    #[serde(rename = "Harmonic Minor")]
    HarmonicMinor,
    Pentatonic,
    Blues,
    #[serde(rename = "Whole Tone")]
    WholeTone,
}

impl ScalePreset {
    pub const ALL: [ScalePreset; 7] = [
        ScalePreset::Chromatic,
        ScalePreset::Major,
        ScalePreset::NaturalMinor,
        ScalePreset::HarmonicMinor,
        ScalePreset::Pentatonic,
        ScalePreset::Blues,
        ScalePreset::WholeTone,
    ];

    /// Pitch classes above the tonic.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScalePreset::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ScalePreset::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScalePreset::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            ScalePreset::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScalePreset::Pentatonic => &[0, 2, 4, 7, 9],
            ScalePreset::Blues => &[0, 3, 5, 6, 7, 10],
            ScalePreset::WholeTone => &[0, 2, 4, 6, 8, 10],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalePreset::Chromatic => "Chromatic",
            ScalePreset::Major => "Major",
            ScalePreset::NaturalMinor => "Natural Minor",
            ScalePreset::HarmonicMinor => "Harmonic Minor",
            ScalePreset::Pentatonic => "Pentatonic",
            ScalePreset::Blues => "Blues",
            ScalePreset::WholeTone => "Whole Tone",
        }
    }

    /// Look a preset up by its display name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

/// A set of permitted pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale {
    mask: u16,
}

impl Default for Scale {
    fn default() -> Self {
        Scale::chromatic()
    }
}

impl Scale {
    pub fn chromatic() -> Self {
        Scale {
            mask: CHROMATIC_MASK,
        }
    }

    pub fn preset(preset: ScalePreset, tonic: u8) -> Self {
        let mask = preset
            .intervals()
            .iter()
            .fold(0u16, |m, &iv| m | (1 << ((iv + tonic) % 12)));
        Scale { mask }
    }

    /// Build from a configuration list of pitch classes.
    ///
    /// An empty list means chromatic. Entries above 11 are a configuration
    /// error.
    pub fn from_pitch_classes(pcs: &[u8]) -> Result<Self, EngineError> {
        if let Some(bad) = pcs.iter().find(|&&pc| pc > 11) {
            return Err(EngineError::invalid_config(format!(
                "scale entry {bad} is not a pitch class (0-11)"
            )));
        }
        let mask = pcs.iter().fold(0u16, |m, &pc| m | (1 << pc));
        if mask == 0 {
            Ok(Scale::chromatic())
        } else {
            Ok(Scale { mask })
        }
    }

    /// Rotate every member up by `semitones`.
    pub fn transpose(self, semitones: u8) -> Self {
        let s = (semitones % 12) as u32;
        let rotated = ((self.mask as u32) << s | (self.mask as u32) >> (12 - s)) & 0x0FFF;
        Scale {
            mask: rotated as u16,
        }
    }

    pub fn mask(self) -> u16 {
        self.mask
    }

    pub fn contains_pc(self, pc: u8) -> bool {
        self.mask & (1 << (pc % 12)) != 0
    }

    pub fn contains(self, pitch: u8) -> bool {
        self.contains_pc(pitch % 12)
    }

    pub fn pitch_classes(self) -> Vec<u8> {
        mask_pitch_classes(self.mask).into_vec()
    }

    /// In-scale pitches in `low..=high`.
    pub fn pitches_in_range(self, low: u8, high: u8) -> Vec<u8> {
        if low > high {
            return Vec::new();
        }
        (low..=high).filter(|&p| self.contains(p)).collect()
    }
}
