//! Suppression of warnings that only concern open sea.

use crate::models::Warning;

// ---

/// Lower-case substrings that mark an area description as marine.
pub const MARINE_KEYWORDS: &[&str] = &[
    "baltijas jūra",
    "baltijas juras",
    "jūra",
    "juras",
    "jūrā",
    "jūrās",
    "atklātā jūra",
    "atklata jura",
    "akvatorija",
    "akvatōrija",
    "sea",
];

#[derive(Debug, Clone)]
pub struct MarineFilter {
    // ---
    enabled: bool,
    keywords: Vec<String>,
}

impl MarineFilter {
    // ---
    pub fn new(enabled: bool) -> Self {
        // ---
        Self::with_keywords(enabled, MARINE_KEYWORDS.iter().copied())
    }

    pub fn with_keywords<I, S>(enabled: bool, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // ---
        Self {
            enabled,
            keywords: keywords.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }

    /// True only when the filter is enabled, the warning names at least one
    /// area, and every area looks marine. Mixed or empty area lists are kept.
    pub fn is_suppressed(&self, warning: &Warning) -> bool {
        // ---
        self.enabled
            && !warning.areas.is_empty()
            && warning.areas.iter().all(|area| self.looks_marine(area))
    }

    /// Drop suppressed warnings, preserving feed order.
    pub fn retain(&self, warnings: Vec<Warning>) -> Vec<Warning> {
        // ---
        warnings
            .into_iter()
            .filter(|w| {
                let suppressed = self.is_suppressed(w);
                if suppressed {
                    tracing::debug!("Suppressing marine-only warning {}", w.identifier);
                }
                !suppressed
            })
            .collect()
    }

    fn looks_marine(&self, area: &str) -> bool {
        let area = area.to_lowercase();
        self.keywords.iter().any(|k| area.contains(k.as_str()))
    }
}
