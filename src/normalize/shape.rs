//! Raw alert shapes accepted from the feed.

use serde_json::{Map, Value};

use crate::error::NormalizeError;

// ---

/// One alert as it appears in the feed, before field extraction.
#[derive(Debug, Clone, Copy)]
pub enum RawAlert<'a> {
    // ---
    /// Common-alerting-protocol style: an `alert` envelope with one info
    /// block already selected for the target language.
    Cap {
        alert: &'a Map<String, Value>,
        info: &'a Map<String, Value>,
    },
    /// A single object carrying the warning fields directly.
    Flat(&'a Map<String, Value>),
}

impl<'a> RawAlert<'a> {
    // ---
    /// Classify one feed entry and, for the nested shape, pick the info block
    /// tagged for `language`.
    pub fn classify(entry: &'a Value, language: &str) -> Result<Self, NormalizeError> {
        // ---
        let object = entry.as_object().ok_or(NormalizeError::NotAnObject)?;

        // meteoalarm wraps each alert as `{ "alert": { ... }, "uuid": ... }`
        let alert = match object.get("alert") {
            Some(Value::Object(inner)) => inner,
            _ => object,
        };

        let blocks: Vec<&Map<String, Value>> = match alert.get("info") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(Value::Object(single)) => vec![single],
            _ => return Self::flat(alert, language),
        };

        blocks
            .into_iter()
            .find(|info| language_matches(info.get("language"), language))
            .map(|info| RawAlert::Cap { alert, info })
            .ok_or_else(|| NormalizeError::NoMatchingLanguage {
                identifier: identifier_hint(alert),
                language: language.to_string(),
            })
    }

    fn flat(object: &'a Map<String, Value>, language: &str) -> Result<Self, NormalizeError> {
        // ---
        let tagged = object.get("language").or_else(|| object.get("lang"));
        if tagged.is_some() && !language_matches(tagged, language) {
            return Err(NormalizeError::NoMatchingLanguage {
                identifier: identifier_hint(object),
                language: language.to_string(),
            });
        }
        Ok(RawAlert::Flat(object))
    }

    /// The object holding the warning's own fields.
    pub fn body(&self) -> &'a Map<String, Value> {
        match self {
            RawAlert::Cap { info, .. } => info,
            RawAlert::Flat(object) => object,
        }
    }

    /// The outer envelope; the same object as [`Self::body`] for flat alerts.
    pub fn envelope(&self) -> &'a Map<String, Value> {
        match self {
            RawAlert::Cap { alert, .. } => alert,
            RawAlert::Flat(object) => object,
        }
    }
}

/// `lv` matches `lv`, `LV` and `lv-LV`.
fn language_matches(tag: Option<&Value>, language: &str) -> bool {
    // ---
    let Some(tag) = tag.and_then(Value::as_str) else {
        return false;
    };
    let tag = tag.trim().to_lowercase();
    let wanted = language.trim().to_lowercase();
    tag == wanted || tag.split(['-', '_']).next() == Some(wanted.as_str())
}

fn identifier_hint(object: &Map<String, Value>) -> String {
    // ---
    object
        .get("identifier")
        .or_else(|| object.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("<unidentified>")
        .to_string()
}

/// Split a payload into its alert entries.
///
/// Accepts a bare array, or an object holding the list under one of the known
/// keys, or a single alert object.
pub fn entries(payload: &Value) -> Vec<&Value> {
    // ---
    const LIST_KEYS: [&str; 4] = ["warnings", "alerts", "items", "features"];

    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(object) => {
            for key in LIST_KEYS {
                if let Some(Value::Array(items)) = object.get(key) {
                    return items.iter().collect();
                }
            }
            if object.contains_key("alert") || object.contains_key("info") {
                vec![payload]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}
