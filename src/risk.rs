//! OWASP Risk Rating engine
//!
//! Pure function from eight likelihood and four technical-impact sub-factors
//! to a discrete severity. This is the only place severity is decided; any
//! severity suggested upstream is advisory and always overwritten.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Severity;

/// Neutral value used for missing or unparseable sub-factors.
pub const NEUTRAL_FACTOR: u8 = 5;
/// Upper bound of every sub-factor.
pub const MAX_FACTOR: u8 = 9;

/// Threat-agent and vulnerability factors (each 0-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikelihoodFactors {
    pub skill_level: u8,
    pub motive: u8,
    pub opportunity: u8,
    pub size: u8,
    pub ease_of_discovery: u8,
    pub ease_of_exploit: u8,
    pub awareness: u8,
    pub intrusion_detection: u8,
}

/// Technical impact factors (each 0-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactFactors {
    pub loss_of_confidentiality: u8,
    pub loss_of_integrity: u8,
    pub loss_of_availability: u8,
    pub loss_of_accountability: u8,
}

const LIKELIHOOD_KEYS: [(&str, &str); 8] = [
    ("skill_level", "skillLevel"),
    ("motive", "motive"),
    ("opportunity", "opportunity"),
    ("size", "size"),
    ("ease_of_discovery", "easeOfDiscovery"),
    ("ease_of_exploit", "easeOfExploit"),
    ("awareness", "awareness"),
    ("intrusion_detection", "intrusionDetection"),
];

const IMPACT_KEYS: [(&str, &str); 4] = [
    ("loss_of_confidentiality", "lossOfConfidentiality"),
    ("loss_of_integrity", "lossOfIntegrity"),
    ("loss_of_availability", "lossOfAvailability"),
    ("loss_of_accountability", "lossOfAccountability"),
];

impl LikelihoodFactors {
    pub fn new(values: [u8; 8]) -> Self {
        let v = values.map(clamp_factor);
        Self {
            skill_level: v[0],
            motive: v[1],
            opportunity: v[2],
            size: v[3],
            ease_of_discovery: v[4],
            ease_of_exploit: v[5],
            awareness: v[6],
            intrusion_detection: v[7],
        }
    }

    /// Same value for all eight sub-factors.
    pub fn uniform(value: u8) -> Self {
        Self::new([value; 8])
    }

    pub fn values(&self) -> [u8; 8] {
        [
            self.skill_level,
            self.motive,
            self.opportunity,
            self.size,
            self.ease_of_discovery,
            self.ease_of_exploit,
            self.awareness,
            self.intrusion_detection,
        ]
    }

    /// Read factors from an untrusted JSON object. Missing or invalid
    /// entries fall back to the neutral midpoint.
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut out = [NEUTRAL_FACTOR; 8];
        if let Some(obj) = value.and_then(Value::as_object) {
            for (slot, (snake, camel)) in out.iter_mut().zip(LIKELIHOOD_KEYS.iter()) {
                *slot = factor_from_value(obj.get(*snake).or_else(|| obj.get(*camel)));
            }
        }
        Self::new(out)
    }
}

impl Default for LikelihoodFactors {
    fn default() -> Self {
        Self::uniform(NEUTRAL_FACTOR)
    }
}

impl ImpactFactors {
    pub fn new(values: [u8; 4]) -> Self {
        let v = values.map(clamp_factor);
        Self {
            loss_of_confidentiality: v[0],
            loss_of_integrity: v[1],
            loss_of_availability: v[2],
            loss_of_accountability: v[3],
        }
    }

    pub fn uniform(value: u8) -> Self {
        Self::new([value; 4])
    }

    pub fn values(&self) -> [u8; 4] {
        [
            self.loss_of_confidentiality,
            self.loss_of_integrity,
            self.loss_of_availability,
            self.loss_of_accountability,
        ]
    }

    pub fn from_value(value: Option<&Value>) -> Self {
        let mut out = [NEUTRAL_FACTOR; 4];
        if let Some(obj) = value.and_then(Value::as_object) {
            for (slot, (snake, camel)) in out.iter_mut().zip(IMPACT_KEYS.iter()) {
                *slot = factor_from_value(obj.get(*snake).or_else(|| obj.get(*camel)));
            }
        }
        Self::new(out)
    }
}

impl Default for ImpactFactors {
    fn default() -> Self {
        Self::uniform(NEUTRAL_FACTOR)
    }
}

fn clamp_factor(v: u8) -> u8 {
    v.min(MAX_FACTOR)
}

/// Coerce one untrusted JSON value into a sub-factor.
///
/// Numbers (and numeric strings) are rounded and clamped to 0-9; anything
/// else yields the neutral midpoint.
pub fn factor_from_value(value: Option<&Value>) -> u8 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => n.round().clamp(0.0, MAX_FACTOR as f64) as u8,
        _ => NEUTRAL_FACTOR,
    }
}

/// Bucketed level of a likelihood or impact score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

impl RiskLevel {
    /// `< 3` is LOW, `< 6` is MEDIUM, everything else HIGH.
    pub fn from_score(score: f64) -> Self {
        if score < 3.0 {
            RiskLevel::Low
        } else if score < 6.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn all() -> [RiskLevel; 3] {
        [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High]
    }
}

/// Raw cell of the OWASP severity matrix. `Note` is reported as `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwaspRating {
    Note,
    Low,
    Medium,
    High,
    Critical,
}

impl OwaspRating {
    pub fn severity(self) -> Severity {
        match self {
            OwaspRating::Critical => Severity::Critical,
            OwaspRating::High => Severity::High,
            OwaspRating::Medium => Severity::Medium,
            OwaspRating::Low | OwaspRating::Note => Severity::Low,
        }
    }
}

/// Overall severity matrix indexed by (impact level, likelihood level).
pub fn severity_matrix(impact: RiskLevel, likelihood: RiskLevel) -> OwaspRating {
    use RiskLevel::*;
    match (impact, likelihood) {
        (High, High) => OwaspRating::Critical,
        (High, Medium) | (Medium, High) => OwaspRating::High,
        (High, Low) | (Medium, Medium) | (Low, High) => OwaspRating::Medium,
        (Medium, Low) | (Low, Medium) => OwaspRating::Low,
        (Low, Low) => OwaspRating::Note,
    }
}

/// Full derived rating for one threat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRating {
    pub likelihood: LikelihoodFactors,
    pub impact: ImpactFactors,
    pub likelihood_score: f64,
    pub impact_score: f64,
    pub likelihood_level: RiskLevel,
    pub impact_level: RiskLevel,
    pub matrix_rating: OwaspRating,
    pub severity: Severity,
    /// likelihoodScore x impactScore; used for ranking only
    pub overall_risk_score: f64,
}

impl RiskRating {
    pub fn compute(likelihood: LikelihoodFactors, impact: ImpactFactors) -> Self {
        // Fields are public; re-clamp so hand-built inputs obey the range.
        let likelihood = LikelihoodFactors::new(likelihood.values());
        let impact = ImpactFactors::new(impact.values());

        let likelihood_score = mean(&likelihood.values());
        let impact_score = mean(&impact.values());
        let likelihood_level = RiskLevel::from_score(likelihood_score);
        let impact_level = RiskLevel::from_score(impact_score);
        let matrix_rating = severity_matrix(impact_level, likelihood_level);

        Self {
            likelihood,
            impact,
            likelihood_score,
            impact_score,
            likelihood_level,
            impact_level,
            matrix_rating,
            severity: matrix_rating.severity(),
            overall_risk_score: round2(likelihood_score * impact_score),
        }
    }
}

fn mean(values: &[u8]) -> f64 {
    if values.is_empty() {
        return NEUTRAL_FACTOR as f64;
    }
    let sum: u32 = values.iter().map(|v| *v as u32).sum();
    round2(sum as f64 / values.len() as f64)
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
