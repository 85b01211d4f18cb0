//! Message text for the digest and escalation channels.

use std::cmp::Reverse;

use super::Notice;
use crate::models::Warning;

// ---

const DIGEST_SEPARATOR: &str = "\n\n---\n\n";
const DEFAULT_HEADLINE: &str = "LVĢMC brīdinājums";

/// Order used by the digest: most severe first, then hazard and area.
pub fn sort_for_digest(warnings: &mut [&Warning]) {
    // ---
    warnings.sort_by_key(|w| (Reverse(w.level), w.hazard.clone(), w.areas_joined()));
}

/// One message for the whole run, one block per changed warning.
pub fn digest(changed: &[Warning]) -> Notice {
    // ---
    let mut ordered: Vec<&Warning> = changed.iter().collect();
    sort_for_digest(&mut ordered);

    let blocks: Vec<String> = ordered.iter().map(|w| digest_block(w)).collect();
    Notice {
        subject: format!("LVĢMC brīdinājumu izmaiņas: {}", blocks.len()),
        body: blocks.join(DIGEST_SEPARATOR),
        params: Vec::new(),
    }
}

pub fn digest_block(w: &Warning) -> String {
    // ---
    let headline = headline(w);
    let level = match w.level.as_str() {
        "" => "N/A".to_string(),
        name => name.to_uppercase(),
    };
    let hazard = match w.hazard.as_str() {
        "" => String::new(),
        hazard => format!(" — {hazard}"),
    };

    [
        format!("⚠️ {headline} [{level}{hazard}]"),
        format!("Teritorija: {}", or_placeholder(&w.areas_joined(), "(nav norādīts)")),
        format!(
            "Spēkā: {} → {}",
            or_placeholder(&w.onset, "(nav)"),
            or_placeholder(&w.expires, "(nav)")
        ),
        String::new(),
        w.description.clone(),
        String::new(),
        format!("Avots: {}", w.source),
    ]
    .join("\n")
    .trim()
    .to_string()
}

/// Short per-warning alert for escalation channels.
///
/// `params` carries the positional template values:
/// level label, hazard, areas, onset, expires.
pub fn escalation(w: &Warning) -> Notice {
    // ---
    let level = match w.level.as_str() {
        "" => "N/A".to_string(),
        name => name.to_uppercase(),
    };
    let areas = or_placeholder(&w.areas_joined(), "-").to_string();
    let onset = or_placeholder(&w.onset, "-").to_string();
    let expires = or_placeholder(&w.expires, "-").to_string();
    let hazard = or_placeholder(&w.hazard, "-").to_string();

    let body = [
        format!("⚠️ LVĢMC ALERT ({level})"),
        headline(w).to_string(),
        format!("Tips: {hazard}"),
        format!("Teritorija: {areas}"),
        format!("Spēkā: {onset} → {expires}"),
        format!("Avots: {}", w.source),
    ]
    .join("\n");

    Notice {
        subject: format!("LVĢMC {} — {}", w.level.label(), hazard),
        body,
        params: vec![w.level.label().to_string(), hazard, areas, onset, expires],
    }
}

fn headline(w: &Warning) -> &str {
    or_placeholder(&w.event, DEFAULT_HEADLINE)
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}
