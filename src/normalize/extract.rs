//! Field extraction strategies.
//!
//! Every canonical field has an ordered list of [`Strategy`] values. They are
//! tried in turn against a [`RawAlert`] and the first one that yields a
//! non-empty value wins. Supporting a new feed shape means adding strategies
//! to these tables, not touching the normalizer.

use serde_json::{Map, Value};

use super::shape::RawAlert;

// ---

#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    // ---
    /// A coded `"<code>; <name>; <description>"` value, taking the name.
    /// Looked up in the nested `parameter` list by `valueName`, or as a
    /// direct field of a flat alert.
    Coded(&'static str),
    /// A plain field on the info block (nested) or the object (flat).
    Field(&'static str),
    /// A plain field on the outer envelope.
    Envelope(&'static str),
}

pub const IDENTIFIER: &[Strategy] = &[
    Strategy::Envelope("identifier"),
    Strategy::Field("identifier"),
    Strategy::Field("id"),
];

pub const LEVEL: &[Strategy] = &[
    Strategy::Coded("awareness_level"),
    Strategy::Field("level"),
    Strategy::Field("color"),
    Strategy::Field("colour"),
];

pub const HAZARD: &[Strategy] = &[
    Strategy::Coded("awareness_type"),
    Strategy::Field("hazard"),
    Strategy::Field("phenomenon"),
    Strategy::Field("type"),
];

pub const EVENT: &[Strategy] = &[
    Strategy::Field("event"),
    Strategy::Field("headline"),
    Strategy::Field("title"),
];

pub const ONSET: &[Strategy] = &[
    Strategy::Field("onset"),
    Strategy::Field("effective"),
    Strategy::Field("start"),
];

pub const EXPIRES: &[Strategy] = &[Strategy::Field("expires"), Strategy::Field("end")];

pub const DESCRIPTION: &[Strategy] = &[Strategy::Field("description"), Strategy::Field("text")];

pub const SOURCE: &[Strategy] = &[
    Strategy::Field("web"),
    Strategy::Field("source"),
    Strategy::Field("url"),
    Strategy::Envelope("web"),
];

/// Area lists are looked up under these keys, in order.
pub const AREA_KEYS: &[&str] = &["area", "areas", "regions"];

impl Strategy {
    // ---
    pub fn extract(&self, raw: &RawAlert<'_>) -> Option<String> {
        // ---
        let value = match (self, raw) {
            (Strategy::Coded(name), RawAlert::Cap { info, .. }) => {
                return coded_parameter(info, name);
            }
            (Strategy::Coded(name), RawAlert::Flat(object)) => {
                return scalar(object.get(*name)?).and_then(|v| coded_name(&v));
            }
            (Strategy::Field(name), _) => raw.body().get(*name)?,
            (Strategy::Envelope(name), _) => raw.envelope().get(*name)?,
        };
        scalar(value)
    }
}

/// First non-empty value produced by `strategies`, cleaned.
pub fn first_of(strategies: &[Strategy], raw: &RawAlert<'_>) -> Option<String> {
    // ---
    strategies
        .iter()
        .filter_map(|strategy| strategy.extract(raw))
        .map(|value| clean_text(&value))
        .find(|value| !value.is_empty())
}

/// Area descriptions from the first key that yields any.
pub fn areas(raw: &RawAlert<'_>) -> Vec<String> {
    // ---
    AREA_KEYS
        .iter()
        .filter_map(|key| raw.body().get(*key))
        .map(area_list)
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}

fn area_list(value: &Value) -> Vec<String> {
    // ---
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(area) => ["areaDesc", "name", "description"]
                    .iter()
                    .find_map(|key| area.get(*key).and_then(scalar)),
                other => scalar(other),
            })
            .collect(),
        Value::String(joined) => joined.split([',', ';']).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    raw.iter()
        .map(|area| clean_text(area))
        .filter(|area| !area.is_empty())
        .collect()
}

fn coded_parameter(info: &Map<String, Value>, name: &str) -> Option<String> {
    // ---
    info.get("parameter")?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .filter(|p| p.get("valueName").and_then(Value::as_str) == Some(name))
        .find_map(|p| p.get("value").and_then(scalar).and_then(|v| coded_name(&v)))
}

/// `"3; orange; Severe"` → `orange`. Values without separators are taken whole.
fn coded_name(raw: &str) -> Option<String> {
    // ---
    let mut parts = raw.split(';').map(str::trim);
    let first = parts.next()?;
    let name = match parts.next() {
        Some(name) => name,
        None => first,
    };
    (!name.is_empty()).then(|| name.to_string())
}

fn scalar(value: &Value) -> Option<String> {
    // ---
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Trim and collapse every whitespace run, newlines included, to one space.
pub fn clean_text(raw: &str) -> String {
    // ---
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn cap_info(info: Value) -> Value {
        // ---
        let mut info = info;
        info["language"] = json!("lv");
        json!({ "alert": { "identifier": "id-1", "info": [info] } })
    }

    #[test]
    fn test_coded_parameter_takes_name_segment() {
        // ---
        let entry = cap_info(json!({
            "parameter": [
                { "valueName": "awareness_type", "value": "1; wind" },
                { "valueName": "awareness_level", "value": "3; orange; Severe" }
            ]
        }));
        let raw = RawAlert::classify(&entry, "lv").unwrap();
        assert_eq!(first_of(LEVEL, &raw).as_deref(), Some("orange"));
        assert_eq!(first_of(HAZARD, &raw).as_deref(), Some("wind"));
    }

    #[test]
    fn test_falls_through_to_direct_field() {
        // ---
        let entry = cap_info(json!({
            "parameter": [{ "valueName": "other", "value": "x; y" }],
            "color": "Yellow"
        }));
        let raw = RawAlert::classify(&entry, "lv").unwrap();
        assert_eq!(first_of(LEVEL, &raw).as_deref(), Some("Yellow"));
    }

    #[test]
    fn test_empty_values_fall_through() {
        // ---
        let entry = json!({ "event": "   ", "headline": "Stiprs vējš" });
        let raw = RawAlert::classify(&entry, "lv").unwrap();
        assert_eq!(first_of(EVENT, &raw).as_deref(), Some("Stiprs vējš"));
    }

    #[test]
    fn test_identifier_read_from_envelope_first() {
        // ---
        let entry = cap_info(json!({ "identifier": "inner" }));
        let raw = RawAlert::classify(&entry, "lv").unwrap();
        assert_eq!(first_of(IDENTIFIER, &raw).as_deref(), Some("id-1"));
    }

    #[test]
    fn test_flat_coded_field() {
        // ---
        let entry = json!({ "awareness_level": "4; red; Extreme" });
        let raw = RawAlert::classify(&entry, "lv").unwrap();
        assert_eq!(first_of(LEVEL, &raw).as_deref(), Some("red"));
    }

    #[test]
    fn test_area_shapes() {
        // ---
        let nested = cap_info(json!({
            "area": [{ "areaDesc": " Rīga " }, { "areaDesc": "" }, { "areaDesc": "Vidzeme" }]
        }));
        let raw = RawAlert::classify(&nested, "lv").unwrap();
        assert_eq!(areas(&raw), vec!["Rīga", "Vidzeme"]);

        let listed = json!({ "areas": ["Kurzeme", "Zemgale"] });
        let raw = RawAlert::classify(&listed, "lv").unwrap();
        assert_eq!(areas(&raw), vec!["Kurzeme", "Zemgale"]);

        let joined = json!({ "areas": "Latgale, Sēlija" });
        let raw = RawAlert::classify(&joined, "lv").unwrap();
        assert_eq!(areas(&raw), vec!["Latgale", "Sēlija"]);

        let none = json!({ "level": "red" });
        let raw = RawAlert::classify(&none, "lv").unwrap();
        assert!(areas(&raw).is_empty());
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        // ---
        assert_eq!(clean_text("  Stiprs\n vējš\r\n\tpiekrastē  "), "Stiprs vējš piekrastē");
        assert_eq!(clean_text("\n\n"), "");
    }
}
