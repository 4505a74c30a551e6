//! Difficulty bands and the calibration-step → band mapping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of calibration steps before a learner enters practice.
pub const CALIBRATION_STEPS: u8 = 20;

/// Calibration steps spent in each band.
const STEPS_PER_BAND: u8 = 5;

// ---------------------------------------------------------------------------
// DifficultyLevel
// ---------------------------------------------------------------------------

/// Ordered vocabulary difficulty bands, lowest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    #[default]
    Beginner,
    Elementary,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 4] = [
        DifficultyLevel::Beginner,
        DifficultyLevel::Elementary,
        DifficultyLevel::Intermediate,
        DifficultyLevel::Advanced,
    ];

    pub const BOTTOM: DifficultyLevel = DifficultyLevel::Beginner;
    pub const TOP: DifficultyLevel = DifficultyLevel::Advanced;

    /// Zero-based band index.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The next harder band, or `None` at the top.
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// The next easier band, or `None` at the bottom.
    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Stable lowercase name used in config files and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Elementary => "elementary",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Advanced => "advanced",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the lowercase name (`"intermediate"`) or the band index (`"2"`).
impl FromStr for DifficultyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| format!("band index out of range: {index}"));
        }
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown difficulty level: {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// band_index
// ---------------------------------------------------------------------------

/// Band index for a calibration step: `clamp(floor((step-1)/5), 0, 3)`.
///
/// ```
/// use pronunciation_coach::progression::band_index;
///
/// assert_eq!(band_index(1), 0);
/// assert_eq!(band_index(6), 1);
/// assert_eq!(band_index(20), 3);
/// ```
pub fn band_index(step: u8) -> usize {
    let band = usize::from(step.saturating_sub(1) / STEPS_PER_BAND);
    band.min(DifficultyLevel::TOP.index())
}

/// [`band_index`] as a [`DifficultyLevel`].
pub fn calibration_band(step: u8) -> DifficultyLevel {
    DifficultyLevel::from_index(band_index(step)).unwrap_or(DifficultyLevel::TOP)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
