//! Response Parser & Recovery
//!
//! Extracts the threat array from free-form model output. Handles fenced
//! blocks, surrounding prose, and output truncated mid-element: recovery
//! cuts the text after the last complete top-level element and re-parses.
//! Each element is then normalized on its own; malformed elements are
//! dropped without failing the batch.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::{RecoveryError, ValidationError};
use crate::model::{Mitigation, StrideCategory, ThreatDraft};
use crate::risk::{ImpactFactors, LikelihoodFactors};

pub const DEFAULT_TEXT: &str = "Not specified";
pub const DEFAULT_TITLE: &str = "Untitled threat";
pub const DEFAULT_TRUST_BOUNDARY: &str = "Internal Network";
pub const DEFAULT_CATEGORY: StrideCategory = StrideCategory::Tampering;

/// Drafts recovered from one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub drafts: Vec<ThreatDraft>,
    /// The direct parse failed and truncation recovery produced the elements
    pub recovered: bool,
    /// Elements rejected by normalization
    pub dropped: usize,
}

/// Parse a model response into normalized threat drafts.
pub fn parse_threats(text: &str) -> Result<ParseOutcome, RecoveryError> {
    let (elements, recovered) = parse_elements(text)?;

    let mut drafts = Vec::with_capacity(elements.len());
    let mut dropped = 0;
    for (index, element) in elements.iter().enumerate() {
        match normalize_element(index, element) {
            Ok(draft) => drafts.push(draft),
            Err(e) => {
                warn!("Dropping threat element: {}", e);
                dropped += 1;
            }
        }
    }

    Ok(ParseOutcome {
        drafts,
        recovered,
        dropped,
    })
}

/// Raw array elements, plus whether recovery was needed.
pub fn parse_elements(text: &str) -> Result<(Vec<Value>, bool), RecoveryError> {
    let body = strip_fence(text);
    let slice = locate_array(body)?;

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(slice) {
        return Ok((items, false));
    }

    debug!("Direct parse failed; attempting truncation recovery");
    // The last `]` may sit inside a cut-off element; scan to end of text.
    let tail = &body[array_start(body)?..];
    let Some(cut) = last_complete_element_end(tail) else {
        return Err(RecoveryError::NoCompleteElement);
    };
    let repaired = format!("{}]", &tail[..cut]);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Array(items)) => Ok((items, true)),
        Ok(_) => Err(RecoveryError::Malformed("not an array".to_string())),
        Err(e) => Err(RecoveryError::Malformed(e.to_string())),
    }
}

/// Contents of the fenced block wrapping the array, or the input when the
/// array is not fenced. Fences inside JSON string literals never open or
/// close the block. An unterminated fence runs to the end of the text.
pub fn strip_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.find("```") else {
        return text;
    };
    if matches!(array_start(text), Ok(start) if start < open) {
        return text;
    }

    let after_marker = &text[open + 3..];
    // Skip the info string (e.g. "json") up to the end of the line.
    let body = match after_marker.split_once('\n') {
        Some((info, rest)) if is_info_string(info) => rest,
        _ => after_marker,
    };
    match closing_fence(body) {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn is_info_string(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_' | '.'))
}

/// Offset of the first fence outside a string literal.
fn closing_fence(body: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escape = false;

    for (index, ch) in body.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '`' if body[index..].starts_with("```") => return Some(index),
            _ => {}
        }
    }
    None
}

/// Slice from the array opener to the last closer, or to end-of-text when
/// the closer is missing. An opener directly followed by an object is
/// preferred over a stray bracket in surrounding prose.
pub fn locate_array(text: &str) -> Result<&str, RecoveryError> {
    let start = array_start(text)?;
    match text.rfind(']') {
        Some(end) if end > start => Ok(&text[start..=end]),
        _ => Ok(&text[start..]),
    }
}

/// Byte offset of the array opener.
pub fn array_start(text: &str) -> Result<usize, RecoveryError> {
    find_object_array_start(text)
        .or_else(|| text.find('['))
        .ok_or(RecoveryError::NoArray)
}

fn find_object_array_start(text: &str) -> Option<usize> {
    text.match_indices('[')
        .map(|(i, _)| i)
        .find(|&i| text[i + 1..].trim_start().starts_with('{'))
}

/// Byte offset just past the last `}` that closes an element of the
/// top-level array. String contents and escapes are tracked so brackets
/// inside literals are ignored.
pub fn last_complete_element_end(slice: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape = false;
    let mut last_cut = None;

    for (index, ch) in slice.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                if ch == '}' && depth == 2 {
                    last_cut = Some(index + ch.len_utf8());
                }
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    // Top-level array closed; nothing after it belongs to it.
                    break;
                }
            }
            _ => {}
        }
    }
    last_cut
}

/// Number of complete top-level elements recoverable from a slice.
pub fn recover_complete_elements(slice: &str) -> Vec<Value> {
    let Some(cut) = last_complete_element_end(slice) else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(&format!("{}]", &slice[..cut])) {
        Ok(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

/// Coerce a value to display text; blank or structured values are `None`.
fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or(obj: &Map<String, Value>, keys: &[&str], fallback: &str) -> String {
    coerce_text(field(obj, keys)).unwrap_or_else(|| fallback.to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| coerce_text(Some(v))).collect(),
        Some(v @ Value::String(_)) => coerce_text(Some(v)).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn mitigation_from(value: &Value) -> Option<Mitigation> {
    match value {
        Value::String(_) => coerce_text(Some(value)).map(Mitigation::prose),
        Value::Object(obj) => {
            let file = coerce_text(field(obj, &["file", "path"]));
            let original = coerce_text(field(obj, &["original", "originalCode", "original_code"]));
            let fixed = coerce_text(field(obj, &["fixed", "fixedCode", "fixed_code"]));
            match (file, original, fixed) {
                (Some(file), Some(original), Some(fixed)) => Some(Mitigation::Code {
                    file,
                    original,
                    fixed,
                }),
                _ => coerce_text(field(obj, &["text", "description", "mitigation"]))
                    .map(Mitigation::prose),
            }
        }
        _ => None,
    }
}

fn mitigations(value: Option<&Value>) -> Vec<Mitigation> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(mitigation_from).collect(),
        Some(v) => mitigation_from(v).into_iter().collect(),
        None => Vec::new(),
    }
}

fn cve(value: Option<&Value>) -> Option<String> {
    let text = coerce_text(value)?;
    let lower = text.to_ascii_lowercase();
    if matches!(lower.as_str(), "n/a" | "na" | "none" | "null" | "-") {
        return None;
    }
    Some(text)
}

/// Normalize one element against the allow-lists and defaults.
pub fn normalize_element(index: usize, value: &Value) -> Result<ThreatDraft, ValidationError> {
    let obj = value
        .as_object()
        .ok_or(ValidationError::NotAnObject { index })?;

    let stride_category = coerce_text(field(
        obj,
        &["strideCategory", "stride_category", "category", "stride"],
    ))
    .and_then(|raw| StrideCategory::parse(&raw))
    .unwrap_or(DEFAULT_CATEGORY);

    Ok(ThreatDraft {
        title: text_or(obj, &["title", "name"], DEFAULT_TITLE),
        stride_category,
        threat_source: text_or(obj, &["threatSource", "threat_source"], DEFAULT_TEXT),
        prerequisites: text_or(obj, &["prerequisites"], DEFAULT_TEXT),
        threat_action: text_or(obj, &["threatAction", "threat_action"], DEFAULT_TEXT),
        threat_impact: text_or(obj, &["threatImpact", "threat_impact"], DEFAULT_TEXT),
        impacted_assets: string_list(field(obj, &["impactedAssets", "impacted_assets"])),
        trust_boundary: text_or(
            obj,
            &["trustBoundary", "trust_boundary"],
            DEFAULT_TRUST_BOUNDARY,
        ),
        assumptions: string_list(field(obj, &["assumptions"])),
        mitigations: mitigations(field(obj, &["mitigations", "mitigation"])),
        cve: cve(field(obj, &["cve", "CVE"])),
        likelihood: LikelihoodFactors::from_value(field(
            obj,
            &["likelihood", "likelihoodFactors", "likelihood_factors"],
        )),
        impact: ImpactFactors::from_value(field(obj, &["impact", "impactFactors", "impact_factors"])),
        suggested_severity: coerce_text(field(obj, &["severity"])),
    })
}
