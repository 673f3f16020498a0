//! Supported-language tags and detection.
//!
//! The answering pipeline is bilingual (English and Arabic). The language
//! of a request is resolved exactly once, at request start: an explicit
//! tag from the caller wins, otherwise a detection heuristic over the
//! message text decides, defaulting to English.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ar,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "en" => Some(Language::En),
            "ar" => Some(Language::Ar),
            _ => None,
        }
    }

    /// Resolve the request language: explicit tag, else detection, else English.
    pub fn resolve(tag: Option<&str>, text: &str) -> Self {
        tag.and_then(Language::from_tag)
            .unwrap_or_else(|| Language::detect(text))
    }

    /// Detect the language of `text`.
    ///
    /// Texts shorter than 3 characters are too ambiguous to classify and
    /// fall back to English. Otherwise a majority of Arabic-block
    /// codepoints among the alphabetic characters selects Arabic.
    pub fn detect(text: &str) -> Self {
        let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.chars().count() < 3 {
            return Language::En;
        }

        let mut arabic = 0usize;
        let mut alphabetic = 0usize;
        for c in cleaned.chars() {
            if c.is_alphabetic() {
                alphabetic += 1;
                if ('\u{0600}'..='\u{06FF}').contains(&c) {
                    arabic += 1;
                }
            }
        }

        if alphabetic > 0 && arabic * 2 > alphabetic {
            Language::Ar
        } else {
            Language::En
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_english() {
        assert_eq!(Language::detect("How do I reset my password?"), Language::En);
    }

    #[test]
    fn test_detect_arabic() {
        assert_eq!(Language::detect("كيف أعيد تعيين كلمة المرور؟"), Language::Ar);
    }

    #[test]
    fn test_short_text_defaults_to_english() {
        assert_eq!(Language::detect("ok"), Language::En);
        assert_eq!(Language::detect(""), Language::En);
    }

    #[test]
    fn test_mixed_text_majority_wins() {
        assert_eq!(Language::detect("error message: خطأ في الدفع عند الطلب"), Language::Ar);
        assert_eq!(
            Language::detect("the word خطأ appears in an english sentence"),
            Language::En
        );
    }

    #[test]
    fn test_explicit_tag_wins_over_detection() {
        assert_eq!(Language::resolve(Some("ar"), "hello there"), Language::Ar);
        assert_eq!(Language::resolve(Some("EN"), "مرحبا بكم في الدعم"), Language::En);
    }

    #[test]
    fn test_unknown_tag_falls_back_to_detection() {
        assert_eq!(Language::resolve(Some("fr"), "مرحبا بكم في الدعم"), Language::Ar);
        assert_eq!(Language::resolve(None, "plain question"), Language::En);
    }
}
