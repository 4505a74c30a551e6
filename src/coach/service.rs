//! [`CoachService`]: the operations exposed to the presentation layer.
//!
//! # Submission pipeline
//!
//! 1. Claim the learner's in-flight slot (`Busy` if taken).
//! 2. Replay: a used idempotency key returns the recorded diagnosis.
//! 3. Recognize the audio through the [`SpeechBackend`].
//! 4. Diagnose, decide, apply the transition and commit it (first write).
//!    When the action needs a new word the same write sets `awaiting_word`
//!    and records this instance's [`WordClaim`]; other instances sharing the
//!    store answer `Busy` while the claim is live.
//! 5. Select the word and commit it (second write), clearing the claim.  On
//!    failure or cancellation nothing more is written: the learner stays
//!    `awaiting_word`, the error is returned next to the diagnosis and
//!    `select_next_word` retries.
//!
//! Nothing is written before step 4, so cancellation or a gateway failure up
//! to that point leaves progress untouched.  A first write that loses a race
//! with another writer fails with `VersionConflict` and changes nothing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::coach::decision::decide;
use crate::coach::words::WordPools;
use crate::config::{AppConfig, ProgressionConfig, WordSource};
use crate::diagnosis::{diagnose, tokenize, DiagnosisResult};
use crate::error::CoachError;
use crate::gateway::{AudioClip, GenerationRequest, SpeechBackend};
use crate::progression::{
    current_band, current_item, Action, CurrentItem, LearnerProgress, Mode, PracticeWord,
    ProgressionMachine, Transition, WordClaim,
};
use crate::store::{ProgressStore, Versioned};

/// Focus phoneme used when neither a diagnosis nor a current word offers one.
const DEFAULT_FOCUS: &str = "ə";

// ---------------------------------------------------------------------------
// SubmitOutcome
// ---------------------------------------------------------------------------

/// Result of one submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub diagnosis: DiagnosisResult,
    pub action: Action,
    /// Progress after every write that succeeded.
    pub progress: LearnerProgress,
    /// `true` when this is a replay of an earlier submission with the same key.
    pub replayed: bool,
    /// Why no next word could be selected.  The diagnosis is committed
    /// regardless; `select_next_word` retries.
    pub word_error: Option<CoachError>,
}

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

type InFlightSet = Arc<Mutex<HashSet<String>>>;

/// Holds a learner's in-flight slot until dropped.
struct InFlightGuard {
    set: InFlightSet,
    learner_id: String,
}

impl InFlightGuard {
    fn claim(set: &InFlightSet, learner_id: &str) -> Result<Self, CoachError> {
        let mut learners = set.lock().unwrap_or_else(|e| e.into_inner());
        if !learners.insert(learner_id.to_string()) {
            log::debug!("coach: {} busy", learner_id);
            return Err(CoachError::Busy(learner_id.to_string()));
        }
        Ok(Self {
            set: Arc::clone(set),
            learner_id: learner_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut learners = self.set.lock().unwrap_or_else(|e| e.into_inner());
        learners.remove(&self.learner_id);
    }
}

// ---------------------------------------------------------------------------
// CoachService
// ---------------------------------------------------------------------------

/// Calibration / practice orchestration over a store and a speech backend.
pub struct CoachService {
    store: Arc<dyn ProgressStore>,
    backend: Arc<dyn SpeechBackend>,
    words: WordPools,
    machine: ProgressionMachine,
    progression: ProgressionConfig,
    word_source: WordSource,
    default_language: String,
    in_flight: InFlightSet,
    /// Owner name written into this instance's word claims.
    instance_id: String,
    claim_timeout: chrono::Duration,
    rng: Mutex<StdRng>,
}

impl CoachService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ProgressStore>,
        backend: Arc<dyn SpeechBackend>,
        words: WordPools,
    ) -> Self {
        let mut rng = StdRng::from_entropy();
        let instance_id = format!("coach-{:016x}", rng.gen::<u64>());
        let claim_timeout = chrono::Duration::from_std(config.words.claim_timeout())
            .unwrap_or_else(|_| chrono::Duration::seconds(120));
        Self {
            store,
            backend,
            words,
            machine: ProgressionMachine::new(config.calibration.clone()),
            progression: config.progression.clone(),
            word_source: config.words.source,
            default_language: config.words.default_language.clone(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            instance_id,
            claim_timeout,
            rng: Mutex::new(rng),
        }
    }

    /// Replace the word-draw RNG with a seeded one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Create a learner at `Calibration(1)` with the first calibration word.
    ///
    /// Enrolment succeeds even when no first word can be found; the learner
    /// is then left `awaiting_word`.
    pub async fn enroll_learner(
        &self,
        learner_id: &str,
        language: &str,
    ) -> Result<LearnerProgress, CoachError> {
        let learner_id = learner_id.trim();
        let language = language.trim();
        if learner_id.is_empty() || language.is_empty() {
            return Err(CoachError::InvalidInput(
                "learner id and language are required".into(),
            ));
        }

        let _guard = InFlightGuard::claim(&self.in_flight, learner_id)?;

        if self.store.read(learner_id).await?.is_some() {
            return Err(CoachError::InvalidInput(format!(
                "learner {learner_id:?} is already enrolled"
            )));
        }

        let blank = LearnerProgress::new(learner_id, language, None);
        let first_word = self
            .first_calibration_word(&blank, &CancellationToken::new())
            .await;

        let progress = LearnerProgress::new(learner_id, language, first_word);
        self.store.write(learner_id, &progress, 0).await?;
        log::info!("coach: enrolled {} ({})", learner_id, language);
        Ok(progress)
    }

    /// Submit one spoken attempt at the current word.
    pub async fn submit_attempt(
        &self,
        learner_id: &str,
        audio: AudioClip,
        idempotency_key: &str,
    ) -> Result<SubmitOutcome, CoachError> {
        self.submit_attempt_cancellable(learner_id, audio, idempotency_key, &CancellationToken::new())
            .await
    }

    /// [`submit_attempt`](Self::submit_attempt) with caller-controlled
    /// cancellation.  Cancelling before the first commit leaves progress
    /// untouched; cancelling during word selection writes nothing further,
    /// so the committed diagnosis stands and the learner stays
    /// `awaiting_word`.
    pub async fn submit_attempt_cancellable(
        &self,
        learner_id: &str,
        audio: AudioClip,
        idempotency_key: &str,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, CoachError> {
        if idempotency_key.trim().is_empty() {
            return Err(CoachError::InvalidInput("idempotency key is required".into()));
        }

        let _guard = InFlightGuard::claim(&self.in_flight, learner_id)?;
        let Versioned { version, value: progress } = self.load(learner_id).await?;

        if let Some(entry) = progress.find_submission(idempotency_key) {
            if let (Some(diagnosis), Some(action)) = (entry.diagnosis.clone(), entry.action) {
                log::debug!("coach: {} replayed key {}", learner_id, idempotency_key);
                return Ok(SubmitOutcome {
                    diagnosis,
                    action,
                    progress,
                    replayed: true,
                    word_error: None,
                });
            }
        }

        let Some(word) = progress.cur_word.clone().filter(|_| !progress.awaiting_word) else {
            return Err(self.awaiting_word_error(&progress, "submit attempt"));
        };

        audio.validate()?;
        let recognized = self
            .backend
            .recognize(&audio, &progress.language, cancel)
            .await?;
        if cancel.is_cancelled() {
            return Err(CoachError::Cancelled);
        }

        let diagnosis = diagnose(&word.transcriptions, &recognized)?;
        let action = decide(&progress, &diagnosis, &self.progression);
        let word_claim = action
            .needs_new_word()
            .then(|| WordClaim::new(&self.instance_id));
        let transition = match progress.mode {
            Mode::Calibration => Transition::CalibrationStep {
                diagnosis: diagnosis.clone(),
                idempotency_key: Some(idempotency_key.to_string()),
                word_claim,
            },
            Mode::Practice => Transition::PracticeOutcome {
                diagnosis: diagnosis.clone(),
                action,
                idempotency_key: Some(idempotency_key.to_string()),
                word_claim,
            },
        };

        let committed = self.machine.apply(&progress, transition)?;
        let version = self.store.write(learner_id, &committed, version).await?;
        log::info!(
            "coach: {} {} word={} errors={}/{} action={:?}",
            learner_id,
            progress.mode.label(),
            word.id,
            diagnosis.error_count,
            diagnosis.phoneme_count,
            action
        );

        if !action.needs_new_word() {
            return Ok(SubmitOutcome {
                diagnosis,
                action,
                progress: committed,
                replayed: false,
                word_error: None,
            });
        }

        let focus = diagnosis.focus_phoneme().map(str::to_string);
        let (progress, word_error) = self
            .replace_word(learner_id, committed, version, focus.as_deref(), cancel)
            .await;

        Ok(SubmitOutcome {
            diagnosis,
            action,
            progress,
            replayed: false,
            word_error,
        })
    }

    /// The word, band and mode the learner is currently on.
    pub async fn get_current_item(&self, learner_id: &str) -> Result<CurrentItem, CoachError> {
        let stored = self.load(learner_id).await?;
        Ok(current_item(&stored.value))
    }

    /// Administrative restart of calibration.  History is kept.
    pub async fn reset_calibration(&self, learner_id: &str) -> Result<LearnerProgress, CoachError> {
        let _guard = InFlightGuard::claim(&self.in_flight, learner_id)?;
        let Versioned { version, value: progress } = self.load(learner_id).await?;

        let mut restarted = progress.clone();
        restarted.mode = Mode::Calibration;
        restarted.calibration_index = 1;
        let first_word = self
            .first_calibration_word(&restarted, &CancellationToken::new())
            .await;

        let next = self
            .machine
            .apply(&progress, Transition::AdminReset { first_word })?;
        self.store.write(learner_id, &next, version).await?;
        log::info!("coach: {} calibration reset", learner_id);
        Ok(next)
    }

    /// Retry word selection for a learner left `awaiting_word`.
    pub async fn select_next_word(&self, learner_id: &str) -> Result<LearnerProgress, CoachError> {
        let _guard = InFlightGuard::claim(&self.in_flight, learner_id)?;
        let Versioned { version, value: progress } = self.load(learner_id).await?;

        if !progress.awaiting_word {
            return Err(CoachError::InvalidStateTransition {
                from: "a learner with a current word".into(),
                attempted: "select next word".into(),
            });
        }
        if self.claimed_elsewhere(&progress) {
            log::debug!("coach: {} word claimed by another instance", learner_id);
            return Err(CoachError::Busy(learner_id.to_string()));
        }

        // Claim first so that only one instance generates.
        let claim = WordClaim::new(&self.instance_id);
        let claimed = self.machine.apply(&progress, Transition::ClaimWord { claim })?;
        let version = self.store.write(learner_id, &claimed, version).await?;

        let focus = claimed
            .diagnoses()
            .last()
            .and_then(|d| d.focus_phoneme())
            .map(str::to_string);
        let word = self
            .next_word(&claimed, focus.as_deref(), &CancellationToken::new())
            .await?;
        let next = self.machine.apply(&claimed, Transition::ReplaceWord { word })?;
        self.store.write(learner_id, &next, version).await?;
        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn load(&self, learner_id: &str) -> Result<Versioned<LearnerProgress>, CoachError> {
        self.store
            .read(learner_id)
            .await?
            .ok_or_else(|| CoachError::UnknownLearner(learner_id.to_string()))
    }

    /// `true` when another instance holds a live claim on the learner's
    /// next word.  Claims of this instance never block: the in-flight guard
    /// already serialises its own operations.
    fn claimed_elsewhere(&self, progress: &LearnerProgress) -> bool {
        progress.word_claim.as_ref().is_some_and(|claim| {
            claim.owner != self.instance_id && claim.is_live(Utc::now(), self.claim_timeout)
        })
    }

    fn awaiting_word_error(&self, progress: &LearnerProgress, attempted: &str) -> CoachError {
        if self.claimed_elsewhere(progress) {
            CoachError::Busy(progress.learner_id.clone())
        } else {
            CoachError::InvalidStateTransition {
                from: "awaiting a word".into(),
                attempted: attempted.into(),
            }
        }
    }

    /// Second write of the commit protocol.  Never fails: a selection or
    /// write error is reported alongside the already-committed progress,
    /// which is left as the first write stored it.
    async fn replace_word(
        &self,
        learner_id: &str,
        committed: LearnerProgress,
        version: u64,
        focus: Option<&str>,
        cancel: &CancellationToken,
    ) -> (LearnerProgress, Option<CoachError>) {
        let word = match self.next_word(&committed, focus, cancel).await {
            Ok(_) if cancel.is_cancelled() => return (committed, Some(CoachError::Cancelled)),
            Ok(word) => word,
            Err(e) => {
                log::warn!("coach: {} no next word: {}", learner_id, e);
                return (committed, Some(e));
            }
        };

        let next = match self.machine.apply(&committed, Transition::ReplaceWord { word }) {
            Ok(next) => next,
            Err(e) => return (committed, Some(e.into())),
        };

        match self.store.write(learner_id, &next, version).await {
            Ok(_) => (next, None),
            Err(e) => {
                log::error!("coach: {} word commit failed: {}", learner_id, e);
                (committed, Some(e.into()))
            }
        }
    }

    /// Pick the next word for `progress` as it stands after the transition.
    async fn next_word(
        &self,
        progress: &LearnerProgress,
        focus: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PracticeWord, CoachError> {
        let band = current_band(progress);

        let from_pool = match progress.mode {
            Mode::Calibration => self
                .words
                .calibration_word(&progress.language, progress.calibration_index),
            Mode::Practice if self.word_source == WordSource::Pool => {
                let previous = progress.cur_word.as_ref().map(|w| w.id.as_str());
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                self.words
                    .random_word(&progress.language, band, previous, &mut *rng)
            }
            Mode::Practice => None,
        };
        if let Some(word) = from_pool {
            return Ok(word);
        }

        let phoneme = focus
            .map(str::to_string)
            .or_else(|| {
                progress
                    .cur_word
                    .as_ref()
                    .and_then(|w| w.transcriptions.first())
                    .and_then(|t| tokenize(t).into_iter().next())
            })
            .unwrap_or_else(|| DEFAULT_FOCUS.to_string());

        let request = GenerationRequest::new(phoneme, band, progress.language.clone());
        log::debug!(
            "coach: {} generating {} word for /{}/",
            progress.learner_id,
            band,
            request.phoneme
        );
        let generated = self.backend.generate(&request, cancel).await?;
        Ok(generated.into_practice_word(&progress.language))
    }

    async fn first_calibration_word(
        &self,
        progress: &LearnerProgress,
        cancel: &CancellationToken,
    ) -> Option<PracticeWord> {
        match self.next_word(progress, None, cancel).await {
            Ok(word) => Some(word),
            Err(e) => {
                log::warn!(
                    "coach: no first calibration word for {}: {}",
                    progress.learner_id,
                    e
                );
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
