//! Request and response payloads exchanged with the speech service.
//!
//! Responses are deserialized into typed structs and then `validate()`d
//! before anything else sees them.  [`GeneratedWord`] also keeps the raw
//! JSON so the generation endpoint can pass it through unchanged.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gateway::GatewayError;
use crate::progression::{DifficultyLevel, PracticeWord};

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// Recorded learner audio, sent as-is to recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    /// MIME type of the multipart part, e.g. `audio/wav`.
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Read a clip from disk, guessing the MIME type from the extension.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("ogg") | Some("oga") => "audio/ogg",
            Some("webm") => "audio/webm",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            _ => "application/octet-stream",
        };
        Ok(Self::new(bytes, mime_type))
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.bytes.is_empty() {
            return Err(GatewayError::InvalidInput("audio clip is empty".into()));
        }
        if self.mime_type.trim().is_empty() {
            return Err(GatewayError::InvalidInput("audio clip has no MIME type".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// Body of a successful recognition call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    pub transcription: String,
}

impl RecognitionResponse {
    /// Parse and validate; returns the trimmed transcription.
    ///
    /// An empty transcription is valid: the learner said nothing
    /// recognisable and the diagnosis will count every phoneme as deleted.
    pub fn parse(raw: serde_json::Value) -> Result<String, GatewayError> {
        let response: Self = serde_json::from_value(raw)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        Ok(response.transcription.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Arguments of a generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Phoneme the new word should exercise.
    pub phoneme: String,
    pub difficulty_level: DifficultyLevel,
    pub language: String,
}

impl GenerationRequest {
    pub fn new(
        phoneme: impl Into<String>,
        difficulty_level: DifficultyLevel,
        language: impl Into<String>,
    ) -> Self {
        Self {
            phoneme: phoneme.into(),
            difficulty_level,
            language: language.into(),
        }
    }

    /// Build from submitted form fields; all three are required.
    ///
    /// `difficulty_level` accepts a band name or index.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, GatewayError> {
        let field = |name: &str| {
            form.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| GatewayError::InvalidInput(format!("missing field: {name}")))
        };

        let phoneme = field("phoneme")?;
        let level = field("difficulty_level")?;
        let language = field("language")?;
        let difficulty_level = level.parse::<DifficultyLevel>().map_err(GatewayError::InvalidInput)?;

        Ok(Self::new(phoneme, difficulty_level, language))
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.phoneme.trim().is_empty() {
            return Err(GatewayError::InvalidInput("missing field: phoneme".into()));
        }
        if self.language.trim().is_empty() {
            return Err(GatewayError::InvalidInput("missing field: language".into()));
        }
        Ok(())
    }
}

/// Accepts either `"kæt"` or `["kæt", "kat"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedWordBody {
    word: String,
    phoneme_count: usize,
    #[serde(alias = "ipa")]
    transcriptions: OneOrMany,
}

/// A validated generation response.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedWord {
    pub word: String,
    pub phoneme_count: usize,
    /// Canonical transcriptions, preference order, none empty.
    pub transcriptions: Vec<String>,
    /// The response body exactly as received.
    pub raw: serde_json::Value,
}

impl GeneratedWord {
    pub fn parse(raw: serde_json::Value) -> Result<Self, GatewayError> {
        let body: GeneratedWordBody = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        let word = Self {
            word: body.word.trim().to_string(),
            phoneme_count: body.phoneme_count,
            transcriptions: Vec::<String>::from(body.transcriptions)
                .into_iter()
                .map(|t| t.trim().to_string())
                .collect(),
            raw,
        };
        word.validate()?;
        Ok(word)
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.word.is_empty() {
            return Err(GatewayError::MalformedResponse("word is empty".into()));
        }
        if self.phoneme_count == 0 {
            return Err(GatewayError::MalformedResponse("phoneme_count is 0".into()));
        }
        if self.transcriptions.is_empty() || self.transcriptions.iter().any(|t| t.is_empty()) {
            return Err(GatewayError::MalformedResponse(
                "transcriptions missing or empty".into(),
            ));
        }
        Ok(())
    }

    /// Convert into a practice word with a generated id.
    pub fn into_practice_word(self, language: &str) -> PracticeWord {
        let id = format!("gen-{}-{}", language.to_ascii_lowercase(), self.word.to_lowercase());
        PracticeWord::new(id, self.word, self.transcriptions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognition_response_requires_transcription_field() {
        assert_eq!(
            RecognitionResponse::parse(json!({"transcription": " θɪŋk "})).unwrap(),
            "θɪŋk"
        );
        assert!(matches!(
            RecognitionResponse::parse(json!({"text": "θɪŋk"})),
            Err(GatewayError::MalformedResponse(_))
        ));
    }

    #[test]
    fn generated_word_accepts_ipa_alias_and_single_string() {
        let raw = json!({"word": "think", "phoneme_count": 4, "ipa": "θɪŋk", "extra": true});
        let word = GeneratedWord::parse(raw.clone()).unwrap();
        assert_eq!(word.transcriptions, vec!["θɪŋk".to_string()]);
        assert_eq!(word.raw, raw);
    }

    #[test]
    fn generated_word_rejects_invalid_payloads() {
        for raw in [
            json!({"word": "", "phoneme_count": 3, "transcriptions": ["kæt"]}),
            json!({"word": "cat", "phoneme_count": 0, "transcriptions": ["kæt"]}),
            json!({"word": "cat", "phoneme_count": 3, "transcriptions": []}),
            json!({"word": "cat", "phoneme_count": 3}),
            json!({"word": "cat", "phoneme_count": -1, "transcriptions": ["kæt"]}),
        ] {
            assert!(
                matches!(GeneratedWord::parse(raw.clone()), Err(GatewayError::MalformedResponse(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn generated_word_becomes_practice_word() {
        let word = GeneratedWord::parse(
            json!({"word": "Think", "phoneme_count": 4, "transcriptions": ["θɪŋk"]}),
        )
        .unwrap()
        .into_practice_word("EN");
        assert_eq!(word.id, "gen-en-think");
        assert_eq!(word.word, "Think");
    }

    #[test]
    fn generation_form_requires_all_fields() {
        let mut form = HashMap::new();
        form.insert("phoneme".to_string(), "θ".to_string());
        form.insert("language".to_string(), "en".to_string());
        assert_eq!(
            GenerationRequest::from_form(&form),
            Err(GatewayError::InvalidInput("missing field: difficulty_level".into()))
        );

        form.insert("difficulty_level".to_string(), "2".to_string());
        let req = GenerationRequest::from_form(&form).unwrap();
        assert_eq!(req.difficulty_level, DifficultyLevel::Intermediate);

        form.insert("difficulty_level".to_string(), "legendary".to_string());
        assert!(GenerationRequest::from_form(&form).is_err());
    }

    #[test]
    fn empty_audio_is_invalid() {
        assert!(AudioClip::new(Vec::new(), "audio/wav").validate().is_err());
        assert!(AudioClip::new(vec![0, 1], "audio/wav").validate().is_ok());
    }
}
