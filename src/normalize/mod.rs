//! Conversion of raw feed payloads into canonical [`Warning`] records.
//!
//! Gateway for the normalizer: `shape` classifies a feed entry into a
//! [`RawAlert`], `extract` owns the per-field strategy tables. Callers only
//! see [`AlertNormalizer`].

use std::collections::HashMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::Config;
use crate::error::NormalizeError;
use crate::models::{Level, Warning, DESCRIPTION_MAX_CHARS};

mod extract;
mod shape;

pub use shape::RawAlert;

// ---

/// Outcome of normalizing one feed entry.
pub type Normalized = Result<Warning, NormalizeError>;

#[derive(Debug, Clone)]
pub struct AlertNormalizer {
    // ---
    language: String,
    default_source: String,
}

impl AlertNormalizer {
    // ---
    pub fn new(language: impl Into<String>, default_source: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            default_source: default_source.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.feed_language, &cfg.default_source_url)
    }

    /// Normalize every entry of a payload, keeping the per-entry outcome.
    pub fn normalize_entries(&self, payload: &Value) -> Vec<Normalized> {
        // ---
        shape::entries(payload)
            .into_iter()
            .map(|entry| self.normalize_entry(entry))
            .collect()
    }

    /// Normalize a payload into the warnings of one feed snapshot.
    ///
    /// Entries that cannot be normalized are logged and skipped. Identifiers
    /// are unique in the result: a later entry with the same identifier
    /// replaces the earlier one in place.
    pub fn normalize(&self, payload: &Value) -> Vec<Warning> {
        self.collect(self.normalize_entries(payload))
    }

    /// Keep the successful outcomes, logging the skipped ones and applying
    /// the later-entry-wins rule for repeated identifiers.
    pub fn collect(&self, outcomes: Vec<Normalized>) -> Vec<Warning> {
        // ---
        let mut warnings: Vec<Warning> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for outcome in outcomes {
            let warning = match outcome {
                Ok(warning) => warning,
                Err(reason) => {
                    debug!("Skipping alert: {}", reason);
                    continue;
                }
            };
            match positions.get(&warning.identifier) {
                Some(&idx) => {
                    debug!("Duplicate identifier {}, keeping the later entry", warning.identifier);
                    warnings[idx] = warning;
                }
                None => {
                    positions.insert(warning.identifier.clone(), warnings.len());
                    warnings.push(warning);
                }
            }
        }
        warnings
    }

    pub fn normalize_entry(&self, entry: &Value) -> Normalized {
        // ---
        let raw = RawAlert::classify(entry, &self.language)?;
        let native_id = extract::first_of(extract::IDENTIFIER, &raw);

        let level = extract::first_of(extract::LEVEL, &raw)
            .map(|name| Level::parse(&name))
            .unwrap_or_default();
        let hazard = extract::first_of(extract::HAZARD, &raw).unwrap_or_default();
        let areas = extract::areas(&raw);

        let event = extract::first_of(extract::EVENT, &raw);
        if level == Level::Unspecified && hazard.is_empty() && areas.is_empty() && event.is_none() {
            return Err(NormalizeError::Empty {
                identifier: native_id.unwrap_or_else(|| "<unidentified>".to_string()),
            });
        }

        let onset = extract::first_of(extract::ONSET, &raw).unwrap_or_default();
        let expires = extract::first_of(extract::EXPIRES, &raw).unwrap_or_default();
        let description: String = extract::first_of(extract::DESCRIPTION, &raw)
            .unwrap_or_default()
            .chars()
            .take(DESCRIPTION_MAX_CHARS)
            .collect();
        let source = extract::first_of(extract::SOURCE, &raw)
            .unwrap_or_else(|| self.default_source.clone());

        let identifier = native_id
            .unwrap_or_else(|| synthesize_identifier(level, &hazard, &areas, &onset, &expires));

        Ok(Warning {
            identifier,
            level,
            event: event.unwrap_or_else(|| hazard.clone()),
            hazard,
            areas,
            onset,
            expires,
            description,
            source,
        })
    }
}

/// Deterministic identifier for alerts that do not carry one.
pub fn synthesize_identifier(
    level: Level,
    hazard: &str,
    areas: &[String],
    onset: &str,
    expires: &str,
) -> String {
    // ---
    let tuple = serde_json::json!([level.as_str(), hazard, areas, onset, expires]);
    let digest = Sha256::digest(tuple.to_string().as_bytes());
    format!("synth-{}", &hex::encode(digest)[..24])
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn normalizer() -> AlertNormalizer {
        AlertNormalizer::new("lv", "https://bridinajumi.meteo.lv/")
    }

    fn meteoalarm_payload() -> Value {
        // ---
        json!({
            "warnings": [{
                "alert": {
                    "identifier": "2.49.0.0.428.0.LV.260115.1",
                    "info": [
                        {
                            "language": "en-GB",
                            "event": "Orange wind warning",
                            "area": [{ "areaDesc": "Riga district" }]
                        },
                        {
                            "language": "lv",
                            "event": "Oranžais brīdinājums par vēju",
                            "onset": "2026-01-15T04:00:00+02:00",
                            "expires": "2026-01-15T20:00:00+02:00",
                            "description": "Brāzmas\nlīdz 25 m/s.  ",
                            "web": "https://bridinajumi.meteo.lv/?id=1",
                            "parameter": [
                                { "valueName": "awareness_level", "value": "3; orange; Severe" },
                                { "valueName": "awareness_type", "value": "1; vējš" }
                            ],
                            "area": [{ "areaDesc": "Rīgas rajons" }]
                        }
                    ]
                }
            }]
        })
    }

    #[test]
    fn test_meteoalarm_shape() {
        // ---
        let warnings = normalizer().normalize(&meteoalarm_payload());
        assert_eq!(warnings.len(), 1);

        let w = &warnings[0];
        assert_eq!(w.identifier, "2.49.0.0.428.0.LV.260115.1");
        assert_eq!(w.level, Level::Orange);
        assert_eq!(w.hazard, "vējš");
        assert_eq!(w.event, "Oranžais brīdinājums par vēju");
        assert_eq!(w.areas, vec!["Rīgas rajons"]);
        assert_eq!(w.onset, "2026-01-15T04:00:00+02:00");
        assert_eq!(w.expires, "2026-01-15T20:00:00+02:00");
        assert_eq!(w.description, "Brāzmas līdz 25 m/s.");
        assert_eq!(w.source, "https://bridinajumi.meteo.lv/?id=1");
    }

    #[test]
    fn test_flat_shape_with_defaults() {
        // ---
        let payload = json!([{
            "id": "flat-1",
            "color": "yellow",
            "hazard": "flood",
            "areas": ["Jelgava"],
            "effective": "2026-03-01T00:00:00Z"
        }]);
        let warnings = normalizer().normalize(&payload);
        let w = &warnings[0];

        assert_eq!(w.identifier, "flat-1");
        assert_eq!(w.level, Level::Yellow);
        assert_eq!(w.event, "flood");
        assert_eq!(w.onset, "2026-03-01T00:00:00Z");
        assert_eq!(w.expires, "");
        assert_eq!(w.source, "https://bridinajumi.meteo.lv/");
    }

    #[test]
    fn test_synthesized_identifier_is_deterministic() {
        // ---
        let raw = r#"{"alerts":[{"level":"red","hazard":"snow","areas":["Liepāja"],"onset":"a","expires":"b"}]}"#;
        let first = normalizer().normalize(&serde_json::from_str(raw).unwrap());
        let second = normalizer().normalize(&serde_json::from_str(raw).unwrap());

        assert!(first[0].identifier.starts_with("synth-"));
        assert_eq!(first[0].identifier, second[0].identifier);
    }

    #[test]
    fn test_synthesized_identifier_tracks_timing() {
        // ---
        let areas = vec!["Liepāja".to_string()];
        let a = synthesize_identifier(Level::Red, "snow", &areas, "a", "b");
        let b = synthesize_identifier(Level::Red, "snow", &areas, "a", "c");
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_identifiers_last_write_wins() {
        // ---
        let payload = json!([
            { "id": "dup", "level": "yellow", "hazard": "wind" },
            { "id": "other", "level": "yellow", "hazard": "rain" },
            { "id": "dup", "level": "red", "hazard": "wind" }
        ]);
        let warnings = normalizer().normalize(&payload);

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].identifier, "dup");
        assert_eq!(warnings[0].level, Level::Red);
        assert_eq!(warnings[1].identifier, "other");
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        // ---
        let payload = json!({
            "warnings": [
                42,
                { "alert": { "identifier": "en-only", "info": [{ "language": "en" }] } },
                { "id": "empty" },
                { "id": "good", "level": "orange", "hazard": "fog" }
            ]
        });
        let outcomes = normalizer().normalize_entries(&payload);
        assert_eq!(outcomes[0], Err(NormalizeError::NotAnObject));
        assert!(matches!(outcomes[1], Err(NormalizeError::NoMatchingLanguage { .. })));
        assert_eq!(
            outcomes[2],
            Err(NormalizeError::Empty { identifier: "empty".to_string() })
        );

        let warnings = normalizer().normalize(&payload);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].identifier, "good");
    }
}
