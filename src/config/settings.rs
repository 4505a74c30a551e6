//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides what it names.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Bounds applied to `timeout_secs`.
const MIN_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 30;

/// Hard ceiling on transport retries.
const MAX_RETRIES: u32 = 2;

/// Settings for the external speech service.
///
/// Endpoint URLs and the API key are never stored here: only the *names* of
/// the secrets that hold them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Endpoint secret is `"{prefix}_{LANG}"`, e.g. `SPEECH_ENDPOINT_EN`.
    pub endpoint_secret_prefix: String,
    /// Name of the secret holding the shared bearer key.
    pub api_key_secret: String,
    /// Path appended to the endpoint for recognition calls.
    pub recognize_path: String,
    /// Path appended to the endpoint for word generation calls.
    pub generate_path: String,
    /// Per-request timeout; clamped to 10–30 s.
    pub timeout_secs: u64,
    /// Retries after a transport failure; capped at 2.
    pub max_retries: u32,
    /// Base backoff between retries, multiplied by the attempt number.
    pub retry_backoff_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint_secret_prefix: "SPEECH_ENDPOINT".into(),
            api_key_secret: "SPEECH_API_KEY".into(),
            recognize_path: "/recognize".into(),
            generate_path: "/generate".into(),
            timeout_secs: 20,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
    }

    pub fn retries(&self) -> u32 {
        self.max_retries.min(MAX_RETRIES)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ---------------------------------------------------------------------------
// ProgressionConfig
// ---------------------------------------------------------------------------

/// Streak thresholds for practice mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Consecutive successes that move the learner up one band.
    pub advance_after: u32,
    /// Consecutive failures that move the learner down one band.
    pub regress_after: u32,
    /// An attempt succeeds when its error rate is at most this value.
    pub success_max_error_rate: f64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            advance_after: 3,
            regress_after: 3,
            success_max_error_rate: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// CalibrationConfig
// ---------------------------------------------------------------------------

/// Policy that turns calibration samples into a suggested band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// A band passes when its aggregate error rate is at most this value.
    pub max_error_rate: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_error_rate: 0.25,
        }
    }
}

// ---------------------------------------------------------------------------
// WordsConfig
// ---------------------------------------------------------------------------

/// Where practice words come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordSource {
    /// Draw from the local pool; generate only when the pool runs dry.
    #[default]
    Pool,
    /// Always ask the speech service for a new word in practice mode.
    Generate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordsConfig {
    /// Language assigned to newly enrolled learners.
    pub default_language: String,
    pub source: WordSource,
    /// Word pool file; `None` uses `word-pools.json` in the config dir and
    /// falls back to the built-in English pool when that is absent.
    pub pool_file: Option<PathBuf>,
    /// How long a service instance may hold a learner's word claim before
    /// another instance can take it over.
    pub claim_timeout_secs: u64,
}

impl Default for WordsConfig {
    fn default() -> Self {
        Self {
            default_language: "en".into(),
            source: WordSource::default(),
            pool_file: None,
            claim_timeout_secs: 120,
        }
    }
}

impl WordsConfig {
    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    /// One JSON file per learner.
    #[default]
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Progress directory; `None` uses the platform data dir.
    pub data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use pronunciation_coach::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// External speech service settings.
    pub gateway: GatewayConfig,
    /// Practice-mode streak thresholds.
    pub progression: ProgressionConfig,
    /// Calibration aggregation policy.
    pub calibration: CalibrationConfig,
    /// Word pool / generation settings.
    pub words: WordsConfig,
    /// Progress persistence.
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolved progress directory.
    pub fn progress_dir(&self, paths: &AppPaths) -> PathBuf {
        self.store
            .data_dir
            .clone()
            .unwrap_or_else(|| paths.progress_dir.clone())
    }

    /// Resolved word pool file.
    pub fn word_pools_file(&self, paths: &AppPaths) -> PathBuf {
        self.words
            .pool_file
            .clone()
            .unwrap_or_else(|| paths.word_pools_file.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(
            original.gateway.endpoint_secret_prefix,
            loaded.gateway.endpoint_secret_prefix
        );
        assert_eq!(original.gateway.api_key_secret, loaded.gateway.api_key_secret);
        assert_eq!(original.gateway.timeout_secs, loaded.gateway.timeout_secs);
        assert_eq!(original.gateway.max_retries, loaded.gateway.max_retries);

        assert_eq!(
            original.progression.advance_after,
            loaded.progression.advance_after
        );
        assert_eq!(
            original.progression.regress_after,
            loaded.progression.regress_after
        );
        assert_eq!(
            original.calibration.max_error_rate,
            loaded.calibration.max_error_rate
        );

        assert_eq!(original.words.default_language, loaded.words.default_language);
        assert_eq!(original.words.source, loaded.words.source);
        assert_eq!(original.store.backend, loaded.store.backend);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.gateway.timeout_secs, 20);
        assert_eq!(config.words.default_language, "en");
        assert_eq!(config.store.backend, StoreBackend::File);
    }

    /// A file naming only one section keeps defaults everywhere else.
    #[test]
    fn partial_file_overrides_named_fields_only() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[progression]\nregress_after = 2\n\n[words]\nsource = \"generate\"\n",
        )
        .expect("write");

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.progression.regress_after, 2);
        assert_eq!(config.progression.advance_after, 3);
        assert_eq!(config.words.source, WordSource::Generate);
        assert_eq!(config.gateway.api_key_secret, "SPEECH_API_KEY");
    }

    #[test]
    fn gateway_timeout_and_retries_are_clamped() {
        let mut gw = GatewayConfig::default();
        assert_eq!(gw.timeout(), Duration::from_secs(20));

        gw.timeout_secs = 1;
        assert_eq!(gw.timeout(), Duration::from_secs(10));
        gw.timeout_secs = 300;
        assert_eq!(gw.timeout(), Duration::from_secs(30));

        gw.max_retries = 9;
        assert_eq!(gw.retries(), 2);
        gw.max_retries = 0;
        assert_eq!(gw.retries(), 0);
    }

    #[test]
    fn word_claim_timeout_defaults_to_two_minutes() {
        let mut words = WordsConfig::default();
        assert_eq!(words.claim_timeout(), Duration::from_secs(120));
        words.claim_timeout_secs = 5;
        assert_eq!(words.claim_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn explicit_store_dir_wins_over_default_layout() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::under(dir.path());
        let mut config = AppConfig::default();
        assert_eq!(config.progress_dir(&paths), dir.path().join("progress"));
        assert_eq!(config.word_pools_file(&paths), dir.path().join("word-pools.json"));

        config.store.data_dir = Some(PathBuf::from("/tmp/coach"));
        config.words.pool_file = Some(PathBuf::from("/etc/coach/pools.json"));
        assert_eq!(config.progress_dir(&paths), PathBuf::from("/tmp/coach"));
        assert_eq!(config.word_pools_file(&paths), PathBuf::from("/etc/coach/pools.json"));
    }
}
