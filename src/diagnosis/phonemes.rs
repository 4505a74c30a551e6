//! IPA tokenizer: splits a transcription into phoneme tokens.
//!
//! Alignment runs over phonemes, not `char`s: `t͡ʃ`, `aː` and `pʰ` are one
//! unit each even though they span several code points.  [`tokenize`]
//! applies these rules:
//!
//! * Stress marks (`ˈ ˌ`), syllable breaks (`.`), IPA delimiters (`/ [ ]`)
//!   and whitespace separate tokens and are dropped.
//! * A base symbol absorbs any following combining diacritics and modifier
//!   letters (length, aspiration, palatalisation, …).
//! * A tie bar joins the next base symbol into the same token and is then
//!   dropped, so `t͡ʃ` and `tʃ` compare equal.
//! * A small table of untied affricates and diphthongs (`tʃ`, `dʒ`, `aɪ`, …)
//!   is read as single tokens.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Character classes
// ---------------------------------------------------------------------------

/// Two-symbol sequences read as one phoneme even without a tie bar.
const DIGRAPHS: &[(char, char)] = &[
    ('t', 'ʃ'),
    ('d', 'ʒ'),
    ('a', 'ɪ'),
    ('a', 'ʊ'),
    ('e', 'ɪ'),
    ('o', 'ʊ'),
    ('ɔ', 'ɪ'),
    ('ə', 'ʊ'),
];

/// Spacing modifier letters that attach to the preceding phoneme.
const MODIFIERS: &[char] = &[
    'ː', 'ˑ', 'ʰ', 'ʱ', 'ʲ', 'ʷ', 'ˠ', 'ˤ', 'ˡ', 'ⁿ', '˞', 'ʼ',
];

const VOWELS: &str = "aeiouyæɑɒɐəɘɛɜɞɪʊʌɔøœɶɤɯɨʉʏɵɚɝ";

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, 'ˈ' | 'ˌ' | '.' | '/' | '[' | ']' | '|' | '‖')
}

fn is_tie(c: char) -> bool {
    matches!(c, '\u{0361}' | '\u{035C}')
}

fn is_attachment(c: char) -> bool {
    let combining = ('\u{0300}'..='\u{036F}').contains(&c) && !is_tie(c);
    combining || MODIFIERS.contains(&c)
}

// ---------------------------------------------------------------------------
// PhonemeClass
// ---------------------------------------------------------------------------

/// Coarse articulatory class of a phoneme token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonemeClass {
    Vowel,
    Consonant,
    Other,
}

impl PhonemeClass {
    /// Classify a token by its first (base) symbol.
    pub fn of(token: &str) -> Self {
        match token.chars().next() {
            Some(c) if VOWELS.contains(c) => PhonemeClass::Vowel,
            Some(c) if c.is_alphabetic() => PhonemeClass::Consonant,
            _ => PhonemeClass::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// tokenize
// ---------------------------------------------------------------------------

/// Split an IPA transcription into phoneme tokens.
///
/// ```
/// use pronunciation_coach::diagnosis::tokenize;
///
/// assert_eq!(tokenize("ˈkæt"), vec!["k", "æ", "t"]);
/// assert_eq!(tokenize("t͡ʃiːz"), vec!["tʃ", "iː", "z"]);
/// assert_eq!(tokenize("/ˈpʰaɪ/"), vec!["pʰ", "aɪ"]);
/// ```
pub fn tokenize(ipa: &str) -> Vec<String> {
    let chars: Vec<char> = ipa.chars().collect();
    let mut tokens: Vec<String> = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if is_separator(c) {
            continue;
        }

        if is_tie(c) {
            continue;
        }

        // Stray diacritic without a base: attach to the previous token, if any.
        if is_attachment(c) {
            if let Some(last) = tokens.last_mut() {
                last.push(c);
            }
            continue;
        }

        let mut token = String::from(c);

        if let Some(&next) = chars.get(i) {
            if DIGRAPHS.contains(&(c, next)) {
                token.push(next);
                i += 1;
            }
        }

        while let Some(&next) = chars.get(i) {
            if is_tie(next) {
                i += 1;
                if let Some(&joined) = chars.get(i) {
                    if !is_separator(joined) {
                        token.push(joined);
                        i += 1;
                    }
                }
            } else if is_attachment(next) {
                token.push(next);
                i += 1;
            } else {
                break;
            }
        }

        tokens.push(token);
    }

    tokens
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_symbols_are_one_token_each() {
        assert_eq!(tokenize("kæt"), vec!["k", "æ", "t"]);
    }

    #[test]
    fn stress_and_syllable_marks_are_dropped() {
        assert_eq!(tokenize("ˈwɔː.tə"), vec!["w", "ɔː", "t", "ə"]);
        assert_eq!(tokenize("ˌʌn.dəˈstænd").len(), 9);
    }

    #[test]
    fn delimiters_and_whitespace_are_separators() {
        assert_eq!(tokenize("/k æ t/"), tokenize("kæt"));
        assert_eq!(tokenize("[kæt]"), tokenize("kæt"));
    }

    #[test]
    fn tie_bar_joins_affricate() {
        assert_eq!(tokenize("t͡ʃ"), vec!["tʃ"]);
        assert_eq!(tokenize("d͡ʒɒb"), vec!["dʒ", "ɒ", "b"]);
        assert_eq!(tokenize("k\u{35C}p"), vec!["kp"]);
    }

    #[test]
    fn tied_and_untied_spellings_match() {
        assert_eq!(tokenize("t͡ʃiːz"), tokenize("tʃiːz"));
        assert_eq!(tokenize("ˈd͡ʒʌd͡ʒ"), tokenize("dʒʌdʒ"));
    }

    #[test]
    fn stray_tie_bar_is_dropped() {
        assert_eq!(tokenize("\u{361}kæt"), vec!["k", "æ", "t"]);
    }

    #[test]
    fn untied_affricates_and_diphthongs_are_single_tokens() {
        assert_eq!(tokenize("tʃɜːtʃ"), vec!["tʃ", "ɜː", "tʃ"]);
        assert_eq!(tokenize("haʊs"), vec!["h", "aʊ", "s"]);
        assert_eq!(tokenize("beɪ"), vec!["b", "eɪ"]);
    }

    #[test]
    fn plural_s_after_t_stays_separate() {
        assert_eq!(tokenize("kæts"), vec!["k", "æ", "t", "s"]);
    }

    #[test]
    fn modifiers_attach_to_preceding_symbol() {
        assert_eq!(tokenize("pʰɪn"), vec!["pʰ", "ɪ", "n"]);
        assert_eq!(tokenize("kʷa"), vec!["kʷ", "a"]);
        // Combining tilde (nasalisation).
        assert_eq!(tokenize("bo\u{303}"), vec!["b", "o\u{303}"]);
    }

    #[test]
    fn leading_stray_modifier_is_ignored() {
        assert_eq!(tokenize("ːa"), vec!["a"]);
    }

    #[test]
    fn empty_and_separator_only_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ˈ. / ").is_empty());
    }

    #[test]
    fn phoneme_class_of_tokens() {
        assert_eq!(PhonemeClass::of("æ"), PhonemeClass::Vowel);
        assert_eq!(PhonemeClass::of("aɪ"), PhonemeClass::Vowel);
        assert_eq!(PhonemeClass::of("tʃ"), PhonemeClass::Consonant);
        assert_eq!(PhonemeClass::of("ʔ"), PhonemeClass::Consonant);
        assert_eq!(PhonemeClass::of("1"), PhonemeClass::Other);
    }
}
