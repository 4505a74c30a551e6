//! Word pools: fixed calibration lists and random practice draws.
//!
//! Pools are keyed by language, then band.  Each band has an ordered
//! `calibration` list, consumed one word per calibration step, and a
//! `practice` list drawn from at random.  `word-pools.json` has the shape
//!
//! ```json
//! {
//!   "en": {
//!     "beginner": {
//!       "calibration": [{ "word": "cat", "transcriptions": ["kæt"] }],
//!       "practice":    [{ "word": "dog", "transcriptions": ["dɔɡ", "dɑɡ"] }]
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::progression::{band_index, calibration_band, DifficultyLevel, PracticeWord};

// ---------------------------------------------------------------------------
// Pool types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    /// Stable id; derived from language, band and word when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub word: String,
    pub transcriptions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandPool {
    #[serde(default)]
    pub calibration: Vec<WordEntry>,
    #[serde(default)]
    pub practice: Vec<WordEntry>,
}

/// All word pools, by language and band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordPools {
    languages: HashMap<String, HashMap<DifficultyLevel, BandPool>>,
}

impl WordPools {
    /// Load pools from a JSON file.
    ///
    /// Returns [`WordPools::builtin`] when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("words: {} not found, using built-in pools", path.display());
            return Ok(Self::builtin());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading word pools from {}", path.display()))?;
        let pools = Self::from_json(&content)
            .with_context(|| format!("parsing word pools from {}", path.display()))?;
        Ok(pools)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut pools: Self = serde_json::from_str(json)?;
        // Language keys are matched case-insensitively.
        pools.languages = pools
            .languages
            .into_iter()
            .map(|(lang, bands)| (lang.to_ascii_lowercase(), bands))
            .collect();
        pools.validate()?;
        Ok(pools)
    }

    fn validate(&self) -> Result<()> {
        for (lang, bands) in &self.languages {
            for (band, pool) in bands {
                for entry in pool.calibration.iter().chain(&pool.practice) {
                    let usable = !entry.word.trim().is_empty()
                        && !entry.transcriptions.is_empty()
                        && entry.transcriptions.iter().all(|t| !t.trim().is_empty());
                    if !usable {
                        anyhow::bail!("{lang}/{band}: entry {:?} has no usable transcription", entry.word);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, language: &str, band: DifficultyLevel, pool: BandPool) {
        self.languages
            .entry(language.to_ascii_lowercase())
            .or_default()
            .insert(band, pool);
    }

    fn band(&self, language: &str, band: DifficultyLevel) -> Option<&BandPool> {
        self.languages
            .get(&language.to_ascii_lowercase())
            .and_then(|bands| bands.get(&band))
    }

    /// The word for calibration `step`, in listed order within its band.
    ///
    /// `None` when the band has no calibration list.
    pub fn calibration_word(&self, language: &str, step: u8) -> Option<PracticeWord> {
        let band = calibration_band(step);
        let list = &self.band(language, band)?.calibration;
        if list.is_empty() {
            return None;
        }
        let first_step_of_band = (1..=step).find(|s| band_index(*s) == band.index()).unwrap_or(1);
        let position = usize::from(step.saturating_sub(first_step_of_band)) % list.len();
        Some(to_practice_word(&list[position], language, band))
    }

    /// A uniformly random practice word for `band`, never `exclude_id`.
    ///
    /// `None` when nothing is left after the exclusion.
    pub fn random_word<R: Rng + ?Sized>(
        &self,
        language: &str,
        band: DifficultyLevel,
        exclude_id: Option<&str>,
        rng: &mut R,
    ) -> Option<PracticeWord> {
        let pool = self.band(language, band)?;
        let candidates: Vec<PracticeWord> = pool
            .practice
            .iter()
            .map(|entry| to_practice_word(entry, language, band))
            .filter(|word| Some(word.id.as_str()) != exclude_id)
            .collect();
        candidates.choose(rng).cloned()
    }

    /// Built-in English pools: ten words per band, the first five of which
    /// double as the calibration list.
    pub fn builtin() -> Self {
        let mut pools = Self::default();
        for (band, words) in ENGLISH {
            let entries: Vec<WordEntry> = words
                .iter()
                .map(|(word, ipa)| WordEntry {
                    id: None,
                    word: word.to_string(),
                    transcriptions: ipa.iter().map(|t| t.to_string()).collect(),
                })
                .collect();
            pools.insert(
                "en",
                *band,
                BandPool {
                    calibration: entries.iter().take(5).cloned().collect(),
                    practice: entries,
                },
            );
        }
        pools
    }
}

fn to_practice_word(entry: &WordEntry, language: &str, band: DifficultyLevel) -> PracticeWord {
    let id = entry.id.clone().unwrap_or_else(|| {
        format!(
            "{}-{}-{}",
            language.to_ascii_lowercase(),
            band,
            entry.word.to_lowercase().replace(' ', "_")
        )
    });
    PracticeWord::new(id, entry.word.clone(), entry.transcriptions.clone())
}

// ---------------------------------------------------------------------------
// Built-in English list
// ---------------------------------------------------------------------------

type BuiltinBand = (DifficultyLevel, &'static [(&'static str, &'static [&'static str])]);

const ENGLISH: &[BuiltinBand] = &[
    (
        DifficultyLevel::Beginner,
        &[
            ("cat", &["kæt"]),
            ("dog", &["dɔɡ", "dɑɡ"]),
            ("sun", &["sʌn"]),
            ("fish", &["fɪʃ"]),
            ("bed", &["bɛd"]),
            ("hat", &["hæt"]),
            ("cup", &["kʌp"]),
            ("pen", &["pɛn"]),
            ("map", &["mæp"]),
            ("red", &["rɛd"]),
        ],
    ),
    (
        DifficultyLevel::Elementary,
        &[
            ("ship", &["ʃɪp"]),
            ("chair", &["tʃɛr", "tʃɛə"]),
            ("thin", &["θɪn"]),
            ("this", &["ðɪs"]),
            ("jump", &["dʒʌmp"]),
            ("rain", &["reɪn"]),
            ("boat", &["boʊt", "bəʊt"]),
            ("light", &["laɪt"]),
            ("house", &["haʊs"]),
            ("green", &["ɡriːn"]),
        ],
    ),
    (
        DifficultyLevel::Intermediate,
        &[
            ("thirsty", &["ˈθɜrsti", "ˈθɜːsti"]),
            ("treasure", &["ˈtrɛʒər", "ˈtrɛʒə"]),
            ("kitchen", &["ˈkɪtʃən"]),
            ("weather", &["ˈwɛðər", "ˈwɛðə"]),
            ("orange", &["ˈɔrɪndʒ", "ˈɒrɪndʒ"]),
            ("yellow", &["ˈjɛloʊ", "ˈjɛləʊ"]),
            ("window", &["ˈwɪndoʊ", "ˈwɪndəʊ"]),
            ("measure", &["ˈmɛʒər", "ˈmɛʒə"]),
            ("breakfast", &["ˈbrɛkfəst"]),
            ("birthday", &["ˈbɜrθdeɪ", "ˈbɜːθdeɪ"]),
        ],
    ),
    (
        DifficultyLevel::Advanced,
        &[
            ("squirrel", &["ˈskwɜrəl", "ˈskwɪrəl"]),
            ("rhythm", &["ˈrɪðəm"]),
            ("particularly", &["pərˈtɪkjələrli", "pəˈtɪkjələli"]),
            ("thoroughly", &["ˈθɜroʊli", "ˈθʌrəli"]),
            ("vulnerable", &["ˈvʌlnərəbəl"]),
            ("specific", &["spəˈsɪfɪk"]),
            ("comfortable", &["ˈkʌmftərbəl", "ˈkʌmfərtəbəl"]),
            ("phenomenon", &["fəˈnɑmənɑn", "fəˈnɒmɪnən"]),
            ("entrepreneur", &["ˌɑntrəprəˈnɜr", "ˌɒntrəprəˈnɜː"]),
            ("anemone", &["əˈnɛməni"]),
        ],
    ),
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
