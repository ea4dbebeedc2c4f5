//! Translation decision.
//!
//! A job may request an English translation pass after transcription.
//! Whether that pass runs, and which source language it uses, depends
//! on the requested language code and on what recognition detected.

use hark_models::{LANGUAGE_AUTO, LANGUAGE_ENGLISH};

/// Decide whether a translation pass should run.
///
/// Returns the source language for the pass, or `None` when no
/// translation is warranted. `detected` of `None` means detection did
/// not produce a usable code.
///
/// An explicit non-English request always translates with that code;
/// the user's stated language wins over detection. `auto` translates
/// only when detection found a non-English language.
pub fn decide_translation(requested: &str, detected: Option<&str>) -> Option<String> {
    if requested == LANGUAGE_AUTO {
        match detected {
            Some(code) if code != LANGUAGE_ENGLISH => Some(code.to_string()),
            _ => None,
        }
    } else if requested != LANGUAGE_ENGLISH {
        Some(requested.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_translates_detected_non_english() {
        assert_eq!(decide_translation("auto", Some("es")), Some("es".to_string()));
    }

    #[test]
    fn test_auto_skips_detected_english() {
        assert_eq!(decide_translation("auto", Some("en")), None);
    }

    #[test]
    fn test_auto_skips_unknown_detection() {
        assert_eq!(decide_translation("auto", None), None);
    }

    #[test]
    fn test_explicit_code_always_translates() {
        assert_eq!(decide_translation("es", Some("es")), Some("es".to_string()));
    }

    #[test]
    fn test_explicit_code_wins_over_detection() {
        assert_eq!(decide_translation("es", Some("fr")), Some("es".to_string()));
    }

    #[test]
    fn test_english_never_translates() {
        assert_eq!(decide_translation("en", Some("es")), None);
        assert_eq!(decide_translation("en", None), None);
    }
}
